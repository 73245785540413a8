use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;
use retirewise::advice::AdviceConfig;
use retirewise::api::{self, AppState, PlanArgs};

#[derive(Parser, Debug)]
#[command(name = "retirewise", about = "Retirement savings projection engine and HTTP API")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API.
    Serve {
        #[arg(long, env = "RETIREWISE_PORT", default_value_t = 3000)]
        port: u16,
    },
    /// Print the projection and plan metrics as JSON.
    Project(PlanArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Command::Serve { port } => {
            let config = AdviceConfig::from_env();
            info!("advice configuration: {config:?}");
            api::run_http_server(port, AppState::from_config(&config))
                .await
                .with_context(|| format!("HTTP server on port {port} failed"))?;
        }
        Command::Project(args) => {
            let json = api::projection_json(&args).map_err(anyhow::Error::msg)?;
            println!("{json}");
        }
    }
    Ok(())
}
