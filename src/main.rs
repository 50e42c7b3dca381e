use std::time::Duration;

use clap::{Parser, Subcommand};
use fwdlog::config::Config;
use fwdlog::{unix_now, Client, FieldValue, Receiver, ReceiverError, Record};

#[derive(Parser)]
#[command(name = "fwdlog", about = "Fluentd forward-protocol client and receiver")]
struct Cli {
    /// Write debug logs to /tmp/fwdlog-debug.log (tail -f to inspect).
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one record and exit.
    Send {
        /// Receiver port (defaults to the configured client port).
        port: Option<u16>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long, default_value = "fluent.test")]
        tag: String,
        /// Seconds since the epoch (defaults to now).
        #[arg(long)]
        timestamp: Option<u64>,
        /// Payload field as key=value; repeatable.
        #[arg(short, long = "field", value_parser = parse_field)]
        fields: Vec<(String, FieldValue)>,
    },
    /// Receive records and print each one as a JSON line until Ctrl-C.
    Listen {
        /// Port to bind (0 picks an ephemeral port).
        #[arg(long, default_value_t = 24224)]
        port: u16,
        #[arg(long)]
        host: Option<String>,
    },
}

/// `key=value`; values that parse as an integer or bool keep that type.
fn parse_field(raw: &str) -> Result<(String, FieldValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))?;
    if key.is_empty() {
        return Err(format!("empty key in {raw:?}"));
    }
    let value = if let Ok(n) = value.parse::<i64>() {
        FieldValue::Int(n)
    } else if let Ok(b) = value.parse::<bool>() {
        FieldValue::Bool(b)
    } else {
        FieldValue::from(value)
    };
    Ok((key.to_string(), value))
}

fn init_tracing(debug: bool) -> anyhow::Result<()> {
    if debug {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open("/tmp/fwdlog-debug.log")?;
        tracing_subscriber::fmt()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .init();
        tracing::info!("fwdlog debug log started; tail -f /tmp/fwdlog-debug.log");
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug)?;

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "could not load config, using defaults");
        Config::defaults()
    });

    match cli.command {
        Command::Send {
            port,
            host,
            tag,
            timestamp,
            fields,
        } => {
            let host = host.unwrap_or_else(|| config.client.host.clone());
            let port = port.unwrap_or(config.client.port);
            let payload: Record = fields.into_iter().collect();
            Client::new(config.client)
                .send(&host, port, &tag, timestamp.unwrap_or_else(unix_now), payload)
                .await?;
        }
        Command::Listen { port, host } => {
            let mut receiver_config = config.receiver;
            if let Some(host) = host {
                receiver_config.bind_host = host;
            }
            listen(Receiver::bind(&receiver_config, port).await?).await?;
        }
    }
    Ok(())
}

async fn listen(mut receiver: Receiver) -> anyhow::Result<()> {
    tracing::info!(addr = %receiver.local_addr(), "listening");
    let mut printed = 0;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            waited = receiver.wait_for_count(printed + 1, Duration::from_secs(60)) => match waited {
                Ok(_) => {
                    for event in receiver.received_since(printed) {
                        println!("{}", serde_json::to_string(&event)?);
                        printed += 1;
                    }
                }
                Err(ReceiverError::Timeout { .. }) => continue,
                Err(e) => return Err(e.into()),
            },
        }
    }
    receiver.stop().await;
    Ok(())
}
