use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader, stdin};
use tokio::sync::mpsc;
use yomiage::{BridgeState, Owner, ReadNotification, ReadingObserver, SpeechOutput, load_settings};

/// Send text to the screen reader over the accessibility bus
#[derive(Parser)]
#[command(name = "yomiage")]
#[command(version)]
#[command(about = "Send text to the screen reader over the accessibility bus")]
struct Cli {
    /// Config file layered over the user config
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read text; a later read may interrupt it
    Read {
        text: String,

        /// How long to wait for the stop/cancel signal
        #[arg(long, default_value_t = 30)]
        wait_secs: u64,
    },
    /// Read text to completion
    ForceRead {
        text: String,

        /// How long to wait for the stop/cancel signal
        #[arg(long, default_value_t = 30)]
        wait_secs: u64,
    },
    /// Read every stdin line and print replies and signals as JSON lines
    Listen,
}

/// Forwards notifications for one request to the CLI loop.
struct ChannelObserver {
    request: usize,
    tx: mpsc::UnboundedSender<(usize, ReadNotification)>,
}

impl ReadingObserver for ChannelObserver {
    fn notify(&self, notification: ReadNotification) {
        let _ = self.tx.send((self.request, notification));
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListenEvent {
    event: &'static str,
    request: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    command_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ListenEvent {
    fn new(event: &'static str, request: usize) -> Self {
        Self {
            event,
            request,
            command_id: None,
            error: None,
        }
    }

    fn failed(request: usize, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new("failed", request)
        }
    }

    fn print(&self) {
        match serde_json::to_string(self) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("Error: could not encode event: {}", e),
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let outcome = load_settings(cli.config.as_deref());
    for event in &outcome.events {
        event.log();
    }

    let output = SpeechOutput::new(outcome.settings);
    if let Err(e) = output.init() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    match output.wait_until_settled().await {
        BridgeState::Bound => {}
        BridgeState::Failed(reason) => {
            eprintln!("Error: {}", reason);
            std::process::exit(1);
        }
        other => {
            eprintln!("Error: speech output not available ({:?})", other);
            std::process::exit(1);
        }
    }

    let code = match cli.command {
        Commands::Read { text, wait_secs } => read_once(&output, &text, false, wait_secs).await,
        Commands::ForceRead { text, wait_secs } => {
            read_once(&output, &text, true, wait_secs).await
        }
        Commands::Listen => {
            listen(&output).await;
            0
        }
    };

    output.shutdown().await;
    std::process::exit(code);
}

async fn read_once(output: &SpeechOutput, text: &str, force: bool, wait_secs: u64) -> i32 {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let owner: Owner = Arc::new(ChannelObserver { request: 0, tx });

    let pending = if force {
        output.force_read(Some(&owner), text)
    } else {
        output.read(Some(&owner), text)
    };
    let pending = match pending {
        Ok(pending) => pending,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    match pending.command_id().await {
        Ok(id) => println!("command id: {}", id),
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    }

    match tokio::time::timeout(Duration::from_secs(wait_secs), rx.recv()).await {
        Ok(Some((_, notification))) => {
            println!("{}", notification);
            0
        }
        Ok(None) => 1,
        Err(_) => {
            eprintln!("Error: no stop/cancel signal within {}s", wait_secs);
            1
        }
    }
}

async fn listen(output: &SpeechOutput) {
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ListenEvent>();
    let mut lines = BufReader::new(stdin()).lines();
    let mut owners: HashMap<usize, Owner> = HashMap::new();
    let mut next_request = 0usize;
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            line = lines.next_line(), if stdin_open => {
                let text = match line {
                    Ok(Some(text)) => text,
                    Ok(None) => {
                        stdin_open = false;
                        if owners.is_empty() {
                            break;
                        }
                        continue;
                    }
                    Err(e) => {
                        eprintln!("Error: reading stdin: {}", e);
                        stdin_open = false;
                        continue;
                    }
                };

                let request = next_request;
                next_request += 1;
                let owner: Owner = Arc::new(ChannelObserver {
                    request,
                    tx: notify_tx.clone(),
                });
                let pending = match output.read(Some(&owner), &text) {
                    Ok(pending) => pending,
                    Err(e) => {
                        ListenEvent::failed(request, e).print();
                        continue;
                    }
                };
                owners.insert(request, owner);

                let event_tx = event_tx.clone();
                tokio::spawn(async move {
                    let event = match pending.command_id().await {
                        Ok(id) => ListenEvent {
                            command_id: Some(id.as_i32()),
                            ..ListenEvent::new("accepted", request)
                        },
                        Err(e) => ListenEvent::failed(request, e),
                    };
                    let _ = event_tx.send(event);
                });
            }

            Some(event) = event_rx.recv() => {
                if event.error.is_some() {
                    owners.remove(&event.request);
                }
                event.print();
                if !stdin_open && owners.is_empty() {
                    break;
                }
            }

            Some((request, notification)) = notify_rx.recv() => {
                owners.remove(&request);
                ListenEvent::new(notification.signal_name(), request).print();
                if !stdin_open && owners.is_empty() {
                    break;
                }
            }
        }
    }
}
