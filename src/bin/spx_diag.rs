use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::timeout;

use speech_bridge::adapters::TtsEngineAdapter;
use speech_bridge::config::BridgeConfig;
use speech_bridge::factory::{mock_tts_module, module_factory, transport_module, ModuleFactory};
use speech_bridge::handles::{ConnectionEventKind, ConnectionMessageEventKind, Handle};
use speech_bridge::message::{CONTENT_TYPE_PROPERTY, PATH_PROPERTY};
use speech_bridge::telemetry::TelemetrySnapshot;
use speech_bridge::SpeechContext;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.execute().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("spx_diag error: {err:?}");
            ExitCode::from(1)
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "spx_diag", about = "Speech bridge diagnostics CLI")]
struct Cli {
    /// Config file; defaults to SPEECH_BRIDGE_CONFIG or the bundled asset.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    async fn execute(self) -> Result<()> {
        let config = match &self.config {
            Some(path) => BridgeConfig::load_from_file(path),
            None => BridgeConfig::load(),
        };
        speech_bridge::init_logging(&config.logging.filter);

        match self.command {
            Command::Loopback(args) => loopback_command(args, config).await,
            Command::Factory(args) => factory_command(args, config),
            Command::Config => print_json(&config),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a loopback connection, send messages and report the echoes.
    Loopback(LoopbackArgs),
    /// Resolve a class/interface pair through the module factory.
    Factory(FactoryArgs),
    /// Print the effective configuration.
    Config,
}

#[derive(Args, Debug, Clone)]
struct LoopbackArgs {
    /// Message path.
    #[arg(long, default_value = "speech.context")]
    path: String,
    /// Text payload.
    #[arg(long, default_value = "{}")]
    payload: String,
    /// Number of messages to send.
    #[arg(long, default_value_t = 1)]
    count: usize,
    /// Open the connection in continuous mode.
    #[arg(long, default_value_t = false)]
    continuous: bool,
    /// Message properties formatted as KEY=VALUE.
    #[arg(long = "property", value_name = "KEY=VALUE")]
    properties: Vec<String>,
    /// How long to wait for each event (milliseconds).
    #[arg(long, default_value_t = 2_000)]
    wait_ms: u64,
}

impl LoopbackArgs {
    fn property_pairs(&self) -> Result<Vec<(String, String)>> {
        self.properties
            .iter()
            .map(|entry| {
                let (key, value) = entry
                    .split_once('=')
                    .ok_or_else(|| anyhow!("property must use KEY=VALUE format: {entry}"))?;
                if key.is_empty() || value.is_empty() {
                    bail!("property key and value cannot be empty: {entry}");
                }
                Ok((key.to_string(), value.to_string()))
            })
            .collect()
    }
}

#[derive(Args, Debug, Clone)]
struct FactoryArgs {
    /// Class name to construct.
    #[arg(long)]
    class: Option<String>,
    /// Interface name to view the instance through.
    #[arg(long)]
    interface: Option<String>,
    /// Text to synthesize when the result is a TTS engine adapter.
    #[arg(long)]
    text: Option<String>,
}

#[derive(Serialize)]
struct ReceivedReport {
    path: String,
    size: u32,
    properties: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct LoopbackReport {
    session_id: Option<String>,
    continuous: bool,
    sent: usize,
    received: Vec<ReceivedReport>,
    live_handles: BTreeMap<String, usize>,
    telemetry: TelemetrySnapshot,
}

#[derive(Serialize)]
struct FactoryReport {
    class: String,
    interface: String,
    resolved: bool,
    synthesized_bytes: Option<usize>,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serializing report")?;
    println!("{json}");
    Ok(())
}

async fn loopback_command(args: LoopbackArgs, config: BridgeConfig) -> Result<()> {
    if args.count == 0 {
        bail!("count must be at least 1");
    }
    let properties = args.property_pairs()?;
    let wait = Duration::from_millis(args.wait_ms);
    let context = SpeechContext::new(config);

    let recognizer = context.create_session_recognizer("spx_diag")?;
    let connection = context.connection_from_recognizer(recognizer)?;

    let (connected_tx, mut connected_rx) = mpsc::unbounded_channel();
    context.connection_set_connected_callback(
        connection,
        Some(Arc::new(move |event: Handle<ConnectionEventKind>| {
            let _ = connected_tx.send(event);
        })),
    )?;
    let (message_tx, mut message_rx) = mpsc::unbounded_channel();
    context.connection_set_message_received_callback(
        connection,
        Some(Arc::new(move |event: Handle<ConnectionMessageEventKind>| {
            let _ = message_tx.send(event);
        })),
    )?;

    for (name, value) in &properties {
        context.connection_set_message_property(connection, &args.path, name, value)?;
    }
    context.connection_open(connection, args.continuous)?;

    let session_id = match timeout(wait, connected_rx.recv()).await {
        Ok(Some(event)) => {
            let id = context.connection_event_session_id(event)?;
            context.handle_release(event)?;
            Some(id)
        }
        _ => None,
    };

    for _ in 0..args.count {
        context.connection_send_message(connection, &args.path, &args.payload)?;
    }

    let mut header_names = vec![PATH_PROPERTY.to_string(), CONTENT_TYPE_PROPERTY.to_string()];
    header_names.extend(properties.iter().map(|(name, _)| name.clone()));

    let mut received = Vec::new();
    while received.len() < args.count {
        let event = match timeout(wait, message_rx.recv()).await {
            Ok(Some(event)) => event,
            _ => break,
        };
        let message = context.connection_message_received_event_get_message(event)?;
        let bag = context.connection_message_get_property_bag(message)?;

        let mut headers = BTreeMap::new();
        for name in &header_names {
            if let Some(value) = context.property_bag_get(bag, name)? {
                headers.insert(name.clone(), value);
            }
        }
        received.push(ReceivedReport {
            path: headers.get(PATH_PROPERTY).cloned().unwrap_or_default(),
            size: context.connection_message_get_data_size(message)?,
            properties: headers,
        });

        context.handle_release(bag)?;
        context.handle_release(message)?;
        context.handle_release(event)?;
    }

    context.connection_close(connection)?;
    context.handle_release(connection)?;
    context.handle_release(recognizer)?;

    print_json(&LoopbackReport {
        session_id,
        continuous: args.continuous,
        sent: args.count,
        received,
        live_handles: context.live_handles(),
        telemetry: context.telemetry().snapshot(),
    })
}

fn factory_command(args: FactoryArgs, config: BridgeConfig) -> Result<()> {
    let factory = module_factory(&config.transport);
    let (class, interface) = match (args.class, args.interface) {
        (Some(class), Some(interface)) => (class, interface),
        (None, None) => {
            let mut modules = BTreeMap::new();
            modules.insert("tts_mock", mock_tts_module().classes());
            modules.insert("transport", transport_module(config.transport).classes());
            return print_json(&modules);
        }
        _ => bail!("provide both --class and --interface, or neither"),
    };

    let object = factory.create(&class, &interface);
    let resolved = object.is_some();
    let synthesized_bytes = match (object, args.text) {
        (Some(object), Some(text)) => {
            let tts = object
                .into_interface::<dyn TtsEngineAdapter>()
                .ok_or_else(|| anyhow!("{class} as {interface} is not a TTS engine adapter"))?;
            Some(tts.synthesize(&text)?.len())
        }
        _ => None,
    };

    print_json(&FactoryReport {
        class,
        interface,
        resolved,
        synthesized_bytes,
    })
}
