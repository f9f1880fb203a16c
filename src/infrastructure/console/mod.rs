//! Console event source for development runs

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::domain::entities::Event;

/// Turns stdin lines into `message` events; the development stand-in
/// for a chat protocol client
pub struct ConsoleSource {
    lines: Lines<BufReader<Stdin>>,
}

impl ConsoleSource {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Next event, or `None` at end of input
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            let line = self.lines.next_line().await.ok()??;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            return Some(Event::message("console", line));
        }
    }
}

impl Default for ConsoleSource {
    fn default() -> Self {
        Self::new()
    }
}
