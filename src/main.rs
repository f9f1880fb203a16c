use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use modubot::application::events::{EventDispatcher, ListenerRegistry};
use modubot::application::services::ModuleService;
use modubot::domain::entities::Event;
use modubot::infrastructure::config::Config;
use modubot::infrastructure::console::ConsoleSource;
use modubot::infrastructure::storage::StorageProvider;
use modubot::modules::{ActivityModule, StatsModule};

#[derive(Parser)]
#[command(name = "modubot")]
#[command(about = "A modular event-driven bot core", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Database path (overrides config)
    #[arg(short, long)]
    data_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            run_bot(cli.config, cli.data_path);
        }
        Commands::Version => {
            println!("modubot v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::InitConfig => {
            init_config(cli.config);
        }
    }
}

fn run_bot(config_path: String, data_path_override: Option<PathBuf>) {
    // Load config
    let mut config = if std::path::Path::new(&config_path).exists() {
        Config::load(&config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {}, using defaults", e);
            Config::load_env()
        })
    } else {
        Config::load_env()
    };

    if let Some(path) = data_path_override {
        config.bot.data_path = Some(path);
    }

    tracing::info!("Starting modubot: {}", config.bot.name);

    // A locked or unrepairable database is fatal; anything else falls
    // back to the in-memory engine inside the provider.
    let provider = match StorageProvider::open(config.bot.data_path.as_deref()) {
        Ok(provider) => provider,
        Err(e) => {
            tracing::error!("Failed to open storage: {}", e);
            std::process::exit(1);
        }
    };

    // Wire the event system
    let registry = Arc::new(ListenerRegistry::new());
    let dispatcher = EventDispatcher::new(registry.clone());
    let mut modules = ModuleService::new(registry);

    if config.is_module_enabled("activity") {
        let store = provider.namespaced("activity");
        if let Err(e) = modules.load(Arc::new(ActivityModule::new(store))) {
            tracing::error!("Failed to load activity module: {}", e);
        }
    }
    if config.is_module_enabled("stats") {
        let store = provider.namespaced("stats");
        if let Err(e) = modules.load(Arc::new(StatsModule::new(store))) {
            tracing::error!("Failed to load stats module: {}", e);
        }
    }
    tracing::info!("Module system initialized with {} module(s)", modules.len());

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        dispatcher.dispatch(Event::bare("start")).await;

        tracing::info!("Reading messages from stdin, Ctrl-D to stop");
        let mut console = ConsoleSource::new();
        while let Some(event) = console.next_event().await {
            dispatcher.dispatch(event).await;
        }

        dispatcher.dispatch(Event::bare("stop")).await;
    });

    provider.close();
}

fn init_config(path: String) {
    if std::path::Path::new(&path).exists() {
        tracing::error!("Config file '{}' already exists, not overwriting it", path);
        std::process::exit(1);
    }

    let config = Config::default();
    if let Err(e) = config.save(&path) {
        tracing::error!("Failed to write config: {}", e);
        std::process::exit(1);
    }

    let yaml = serde_yaml::to_string(&config).unwrap();
    println!("{}", yaml);
    println!("\nSaved to {} - adjust as needed.", path);
}
