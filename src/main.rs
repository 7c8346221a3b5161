use clap::Parser;
use servicemart::cli::{run, Cli};
use servicemart::config::Config;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::from_env()?;
    let cli = Cli::parse();

    if let Err(e) = run(cli, cfg) {
        tracing::error!(error = %e, "command failed");
        return Err(e);
    }
    Ok(())
}
