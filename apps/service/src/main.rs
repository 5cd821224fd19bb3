use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use uptime_engine::build_engine;
use uptime_engine::config::Config;

#[derive(Debug, Parser)]
#[command(version, about = "Uptime check monitoring and alerting engine")]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/uptime-engine/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logger::init_tracing();

    let cli = Cli::parse();

    let mut config = Config::from_config(cli.config.as_ref())?;
    config.apply_env_overrides();

    if cli.print_config {
        print!("{config}");
        return Ok(());
    }
    config.validate()?;

    let mut engine = build_engine(&config).await?;

    if cli.once {
        let report = engine.run_cycle().await;
        println!("{report}");
        return Ok(());
    }

    engine.start()?;
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    engine.stop().await;

    Ok(())
}
