//! CLI for linesub
//!
//! Subcommands:
//! - `server`: run the broker
//! - `client`: interactive console client reading commands from stdin

use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};
use linesub::client::PubSubClient;
use linesub::config::{Settings, load_config};
use linesub::console::{ConsoleCommand, HELP};
use linesub::transport::Server;
use linesub::utils::logging;
use linesub::Broker;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "linesub", about = "Line-protocol publish/subscribe broker")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the broker
    Server {
        /// Address to bind (defaults to the configured server.host)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (defaults to the configured server.port)
        port: Option<u16>,
    },
    /// Run the interactive client
    Client {
        /// Server host (defaults to the configured client.host)
        #[arg(long)]
        host: Option<String>,
        /// Server port (defaults to the configured client.port)
        #[arg(long)]
        port: Option<u16>,
        /// Name announced to the server (defaults to the configured client.name)
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let level = match cli.verbose {
        0 => config.log.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    logging::init(level);

    let result = match cli.command {
        Command::Server { host, port } => run_server(config, host, port).await,
        Command::Client { host, port, name } => run_client(config, host, port, name).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_server(
    config: Settings,
    host: Option<String>,
    port: Option<u16>,
) -> linesub::Result<()> {
    let host = host.unwrap_or(config.server.host);
    let port = port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let broker = Arc::new(Broker::new());
    let server = Server::bind(&addr, broker, config.broker).await?;

    tokio::select! {
        _ = server.run() => {
            error!("Server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

async fn run_client(
    config: Settings,
    host: Option<String>,
    port: Option<u16>,
    name: Option<String>,
) -> linesub::Result<()> {
    let default_host = host.unwrap_or(config.client.host);
    let default_port = port.unwrap_or(config.client.port);
    let name = name.unwrap_or(config.client.name);

    let mut client = PubSubClient::with_settings(name, config.broker);
    client.set_message_handler(|topic, data| {
        println!("[Message] Topic: \"{topic}\" Data: \"{data}\"");
    });
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match ConsoleCommand::parse(&line) {
            Ok(ConsoleCommand::Connect { host, port, name }) => {
                if let Some(name) = name {
                    if let Err(e) = client.set_name(name) {
                        error!("{}", e);
                        continue;
                    }
                }
                let host = host.as_deref().unwrap_or(&default_host);
                let port = port.unwrap_or(default_port);
                if let Err(e) = client.connect(host, port).await {
                    error!("{}", e);
                }
            }
            Ok(ConsoleCommand::Disconnect) => client.disconnect(),
            Ok(ConsoleCommand::Publish { topic, data }) => client.publish(&topic, &data),
            Ok(ConsoleCommand::Subscribe { topic }) => client.subscribe(&topic),
            Ok(ConsoleCommand::Unsubscribe { topic }) => client.unsubscribe(&topic),
            Ok(ConsoleCommand::Help) => println!("{HELP}"),
            Ok(ConsoleCommand::Quit) => break,
            Ok(ConsoleCommand::Empty) => {}
            Err(e) => error!("{}", e),
        }
    }

    client.shutdown().await;
    Ok(())
}
