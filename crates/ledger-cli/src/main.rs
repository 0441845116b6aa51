use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the proof-of-work ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the whole chain
    Chain,
    /// Print the head block
    Head,
    /// Print the chain length
    Length,
    /// Mine a block carrying the given data
    Mine {
        /// Opaque payload for the new block
        #[arg(long)]
        data: String,
    },
}

#[derive(Serialize)]
struct MineRequest {
    data: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/');
    let client = reqwest::Client::new();

    let req = match cli.cmd {
        Command::Chain => client.get(format!("{node}/blocks")),
        Command::Head => client.get(format!("{node}/blocks/head")),
        Command::Length => client.get(format!("{node}/blocks/length")),
        Command::Mine { data } => client
            .post(format!("{node}/blocks/mine"))
            .json(&MineRequest { data }),
    };
    debug!(?req, "sending request");

    let res = req.send().await?;
    let status = res.status();
    let body: serde_json::Value = res.json().await?;
    println!("status: {}", status);
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
