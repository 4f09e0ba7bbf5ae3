use clap::Parser;
use habit_app::{
    app::{run, AppConfig},
    cli::{Cli, Command},
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(%err, "ignoring invalid environment configuration");
            AppConfig::default()
        }
    };
    if let Err(err) = run(config, cli.command.unwrap_or(Command::Today)) {
        eprintln!("habits: {err:#}");
        std::process::exit(1);
    }
}
