use clap::{Parser, Subcommand};
use sitelimit_core::Config;

mod commands;

#[derive(Parser)]
#[command(name = "sitelimit", version, about = "Daily time limit for distracting sites")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Today's counters
    Stats {
        /// Print a readable summary instead of JSON
        #[arg(long)]
        human: bool,
    },
    /// Snooze the limit warning
    Snooze {
        /// Snooze length in minutes (configured default when omitted)
        #[arg(long)]
        minutes: Option<u32>,
    },
    /// Reset today's counter, reminder, snooze and session
    Reset,
    /// Re-arm today's warning without touching the counter
    ResetReminder,
    /// Run the warning check against the precise elapsed time
    Check,
    /// Run one tick against the given host state
    Tick(commands::control::TickArgs),
    /// Daily limit management
    Limit {
        #[command(subcommand)]
        action: commands::limit::LimitAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Run the tracker, speaking JSON lines on stdin/stdout
    Daemon,
}

fn init_tracing(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.as_str().into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    let config = Config::load_or_default();
    init_tracing(&config);

    let result = match cli.command {
        Commands::Stats { human } => commands::stats::run(&config, human),
        Commands::Snooze { minutes } => commands::control::snooze(&config, minutes),
        Commands::Reset => commands::control::reset(&config),
        Commands::ResetReminder => commands::control::reset_reminder(&config),
        Commands::Check => commands::control::check(&config),
        Commands::Tick(args) => commands::control::tick(&config, args),
        Commands::Limit { action } => commands::limit::run(&config, action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Daemon => commands::daemon::run(&config),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
