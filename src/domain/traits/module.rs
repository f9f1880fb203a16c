use crate::domain::entities::HandlerDecl;

/// Module trait - a unit of bot functionality declaring its event handlers
///
/// Handlers are declared as an explicit table; the module service registers
/// the whole table on load and removes it on unload.
pub trait Module: Send + Sync {
    /// Unique module name
    fn name(&self) -> &str;

    /// The handler table to register on load
    fn handlers(&self) -> Vec<HandlerDecl>;
}
