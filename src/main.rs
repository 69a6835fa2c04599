use anyhow::Result;
use clap::{Parser, Subcommand};
use rficb_alba::{AlbaConfig, PaymentClient};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rficb-alba")]
#[command(about = "Query the RFI Bank Alba payment API", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the payment types enabled for the service
    PayTypes,

    /// Show the state of a transaction
    Details {
        /// Transaction id
        #[arg(value_name = "TID")]
        tid: u64,
    },

    /// Show limits and settings of a payment gateway
    GateDetails {
        /// Gateway name
        #[arg(value_name = "GATE")]
        gate: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr, stdout carries the JSON answer
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = AlbaConfig::from_env()?;
    tracing::info!(
        "Using Alba service {} ({} API) at {}",
        config.service_id,
        config.variant,
        config.endpoints.base_url
    );

    let client = PaymentClient::from_config(&config)?;

    let output = match cli.command {
        Commands::PayTypes => serde_json::to_value(client.list_payment_types().await?)?,
        Commands::Details { tid } => client.transaction_details(tid).await?.into_value(),
        Commands::GateDetails { gate } => client.gate_details(&gate).await?.into_value(),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
