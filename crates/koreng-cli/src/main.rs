//! koreng CLI — bilingual listening drill.
//!
//! ```text
//! koreng serve [--port 2004] [--config koreng.toml] [--content-dir content]
//! koreng play Sleep [--repeat] [--rate 2x]
//! koreng subjects / select Sleep / start / stop / reset / status [--server ...]
//! koreng repeat on / rate 2x / voices / set-voices --source ko-KR-InJoonNeural
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use koreng_lib::audio::{AudioSink, NullSink, RodioSink};
use koreng_lib::content::ContentStore;
use koreng_lib::drill::{DrillDeps, DrillEngine};
use koreng_lib::koreng_core::types::{DrillConfig, PlaybackState, RateFactor, SynthBackend};
use koreng_lib::voices::{EdgeVoiceCatalog, VoiceCatalog};
use koreng_lib::{server, synth};

const DEFAULT_SERVER: &str = "http://localhost:2004";

/// koreng — narrated sentence-pair drill
#[derive(Parser)]
#[command(name = "koreng", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Options shared by the commands that run an engine in-process.
#[derive(Args)]
struct EngineArgs {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory of subject tables (<Subject>.csv)
    #[arg(long)]
    content_dir: Option<PathBuf>,
    /// Speech backend: edge or kokoro
    #[arg(long)]
    backend: Option<SynthBackend>,
    /// Source-language voice
    #[arg(long)]
    source_voice: Option<String>,
    /// Target-language voice
    #[arg(long)]
    target_voice: Option<String>,
    /// Playback rate: 1x or 2x
    #[arg(long)]
    rate: Option<RateFactor>,
    /// Start over after the last sentence
    #[arg(long)]
    repeat: bool,
    /// Discard audio instead of playing it
    #[arg(long)]
    no_audio: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Start the drill server
    Serve {
        /// Listen port
        #[arg(long, default_value = "2004")]
        port: u16,
        /// Listen host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Play one subject in this process and print each sentence as it is narrated
    Play {
        /// Subject name
        subject: String,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// List subjects
    Subjects {
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Select a subject (rewinds and stops)
    Select {
        subject: String,
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Start playback
    Start {
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Stop playback
    Stop {
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Rewind to the first sentence
    Reset {
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Turn repeat on or off
    Repeat {
        #[arg(value_parser = parse_switch, action = clap::ArgAction::Set)]
        enabled: bool,
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Set playback rate (1x or 2x)
    Rate {
        rate: RateFactor,
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// List voices for the source and target locales
    Voices {
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Choose narration voices
    SetVoices {
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        target: Option<String>,
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Get drill status
    Status {
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("koreng: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<(), String> {
    match command {
        Command::Serve { port, host, engine } => {
            let config = resolve_config(&engine)?;
            let engine = build_engine(&config, engine.no_audio)?;
            let app = server::router(engine);

            let addr = format!("{host}:{port}");
            info!("koreng listening on {addr}");

            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .map_err(|e| format!("failed to bind {addr}: {e}"))?;
            axum::serve(listener, app)
                .await
                .map_err(|e| format!("server error: {e}"))
        }

        Command::Play { subject, engine } => {
            let config = resolve_config(&engine)?;
            let engine = build_engine(&config, engine.no_audio)?;
            play(&engine, &subject).await
        }

        Command::Subjects { server } => get(&server, "subjects").await,
        Command::Select { subject, server } => {
            post_json(&server, "select", serde_json::json!({ "subject": subject })).await
        }
        Command::Start { server } => post_simple(&server, "start").await,
        Command::Stop { server } => post_simple(&server, "stop").await,
        Command::Reset { server } => post_simple(&server, "reset").await,
        Command::Repeat { enabled, server } => {
            post_json(&server, "repeat", serde_json::json!({ "enabled": enabled })).await
        }
        Command::Rate { rate, server } => {
            post_json(&server, "rate", serde_json::json!({ "rate": rate })).await
        }
        Command::Voices { server } => get(&server, "voices").await,
        Command::SetVoices {
            source,
            target,
            server,
        } => {
            post_json(
                &server,
                "voices",
                serde_json::json!({ "source": source, "target": target }),
            )
            .await
        }
        Command::Status { server } => get(&server, "status").await,
    }
}

// ─── Config ───────────────────────────────────────────────────────────────

/// Defaults, then the TOML file, then command-line flags.
fn resolve_config(args: &EngineArgs) -> Result<DrillConfig, String> {
    let mut config = match &args.config {
        Some(path) => load_config_file(path)?,
        None => DrillConfig::default(),
    };

    if let Some(dir) = &args.content_dir {
        config.content_dir = dir.clone();
    }
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    if let Some(voice) = &args.source_voice {
        config.source_voice = voice.clone();
    }
    if let Some(voice) = &args.target_voice {
        config.target_voice = voice.clone();
    }
    if let Some(rate) = args.rate {
        config.rate = rate;
    }
    if args.repeat {
        config.repeat = true;
    }
    Ok(config)
}

fn load_config_file(path: &Path) -> Result<DrillConfig, String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read config {}: {e}", path.display()))?;
    toml::from_str(&raw).map_err(|e| format!("invalid config {}: {e}", path.display()))
}

fn build_engine(config: &DrillConfig, no_audio: bool) -> Result<DrillEngine, String> {
    let content = ContentStore::load(&config.content_dir, &config.subject_order)
        .map_err(|e| e.to_string())?;

    let sink: Arc<dyn AudioSink> = if no_audio {
        Arc::new(NullSink)
    } else {
        match RodioSink::new() {
            Ok(sink) => Arc::new(sink),
            Err(e) => {
                warn!("{e}; continuing without audio");
                Arc::new(NullSink)
            }
        }
    };

    // Kokoro voice ids carry no locale, so they cannot be checked.
    let catalog: Option<Arc<dyn VoiceCatalog>> = match config.backend {
        SynthBackend::Edge => Some(Arc::new(EdgeVoiceCatalog::new())),
        SynthBackend::Kokoro => None,
    };

    Ok(DrillEngine::new(
        config,
        DrillDeps {
            content: Arc::new(content),
            synth: synth::from_config(config),
            sink,
            catalog,
        },
    ))
}

// ─── In-process playback ──────────────────────────────────────────────────

async fn play(engine: &DrillEngine, subject: &str) -> Result<(), String> {
    let mut rx = engine.subscribe_status();
    engine.select_subject(subject).await.map_err(|e| e.to_string())?;
    engine.start().await.map_err(|e| e.to_string())?;

    let mut shown = (None, None);
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Err("drill engine stopped".into());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                engine.stop();
                println!();
                return Ok(());
            }
        }

        let status = rx.borrow_and_update().clone();
        if let Some(error) = &status.last_error {
            return Err(error.clone());
        }

        let reveal = (status.source_text.clone(), status.target_text.clone());
        if reveal != shown {
            match &reveal {
                (Some(source), None) => println!("[{}] {source}", status.position_label),
                (Some(_), Some(target)) => println!("        {target}"),
                _ => {}
            }
            shown = reveal;
        }

        if matches!(status.state, PlaybackState::Finished | PlaybackState::Ready) {
            return Ok(());
        }
    }
}

// ─── HTTP client ──────────────────────────────────────────────────────────

fn parse_switch(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(format!("expected on/off, got '{other}'")),
    }
}

async fn get(server: &str, endpoint: &str) -> Result<(), String> {
    let resp = reqwest::Client::new()
        .get(format!("{server}/{endpoint}"))
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;
    print_response(resp).await
}

async fn post_simple(server: &str, endpoint: &str) -> Result<(), String> {
    let resp = reqwest::Client::new()
        .post(format!("{server}/{endpoint}"))
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;
    print_response(resp).await
}

async fn post_json(server: &str, endpoint: &str, body: serde_json::Value) -> Result<(), String> {
    let resp = reqwest::Client::new()
        .post(format!("{server}/{endpoint}"))
        .json(&body)
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;
    print_response(resp).await
}

async fn print_response(resp: reqwest::Response) -> Result<(), String> {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    println!("{body}");
    if status.is_success() {
        Ok(())
    } else {
        Err(format!("server returned {status}"))
    }
}
