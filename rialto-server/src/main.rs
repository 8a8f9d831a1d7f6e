//! Rialto session server: a Unix-domain-socket command endpoint in
//! front of `SessionManager`. Grounded on
//! `kaleidux-daemon::main`'s logging/config/IPC-accept-loop shape —
//! same `clap::Parser` args, the same tiered `--log` verbosity, the
//! same `UnixListener` accept loop reading one JSON message per
//! connection and writing one JSON response back.

mod session;

use clap::Parser;
use rialto_common::{ClientEvent, Command};
use rialto_player::config::PlayerConfig;
use session::SessionManager;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixListener;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

const MAX_MESSAGE_SIZE: usize = 64 * 1024;

struct CustomTimer;

impl tracing_subscriber::fmt::time::FormatTime for CustomTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = chrono::Local::now();
        write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Verbosity: 1=warn, 2=info (default), 3=debug, 4=trace.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
    log: Option<u8>,

    /// Path to a TOML config file overriding `PlayerConfig` defaults.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(serde::Serialize)]
#[serde(tag = "status")]
enum Response {
    Ok { result: serde_json::Value },
    Error { message: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log);

    let config = args
        .config
        .or_else(default_config_path)
        .map(|path| PlayerConfig::load(&path))
        .unwrap_or_default();
    let config = Arc::new(config);

    gstreamer::init()?;
    info!("GStreamer initialized.");

    let manager = Arc::new(SessionManager::new(config));

    let mut events = manager.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_client_event(&event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "client event receiver lagged, dropping the oldest events");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let socket_path = socket_path();
    let _ = std::fs::remove_file(&socket_path);
    let listener = UnixListener::bind(&socket_path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = std::fs::metadata(&socket_path) {
            let mut perms = metadata.permissions();
            perms.set_mode(0o600);
            let _ = std::fs::set_permissions(&socket_path, perms);
        }
    }
    info!(path = %socket_path.display(), "listening for session commands");

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        warn!("received shutdown signal, closing the listener");
        shutdown_signal.store(true, Ordering::SeqCst);
    });

    while !shutdown.load(Ordering::SeqCst) {
        let (mut stream, _) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(%err, "accept failed");
                    continue;
                }
            },
            _ = tokio::time::sleep(std::time::Duration::from_millis(200)) => continue,
        };

        let manager = manager.clone();
        tokio::spawn(async move {
            let mut buf = [0u8; MAX_MESSAGE_SIZE];
            let n = match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) if n >= MAX_MESSAGE_SIZE => return,
                Ok(n) => n,
            };
            let Ok(text) = std::str::from_utf8(&buf[..n]) else { return };
            let response = match serde_json::from_str::<Command>(text.trim()) {
                Ok(command) => match manager.dispatch(command) {
                    Ok(result) => Response::Ok { result },
                    Err(err) => Response::Error { message: err.to_string() },
                },
                Err(err) => Response::Error { message: format!("malformed command: {err}") },
            };
            if let Ok(json) = serde_json::to_string(&response) {
                let _ = stream.write_all(json.as_bytes()).await;
            }
        });
    }

    let _ = std::fs::remove_file(&socket_path);
    info!("shutdown complete");
    Ok(())
}

fn init_logging(log_level: Option<u8>) {
    let filter = match log_level {
        Some(1) => LevelFilter::WARN,
        Some(3) => LevelFilter::DEBUG,
        Some(4) => LevelFilter::TRACE,
        Some(2) | None => LevelFilter::INFO,
        Some(_) => LevelFilter::INFO,
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(filter.into())
        .from_env_lossy()
        .add_directive("gstreamer=warn".parse().unwrap());

    let stdout_layer = subscriber_fmt::layer().with_writer(std::io::stdout).with_timer(CustomTimer);
    Registry::default().with(env_filter).with(stdout_layer).init();
    info!(level = ?log_level, "rialto-server starting");
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("rialto").join("rialto.toml"))
}

fn socket_path() -> PathBuf {
    dirs::runtime_dir().map(|dir| dir.join("rialto.sock")).unwrap_or_else(|| {
        let user = std::env::var("USER").unwrap_or_else(|_| "rialto".to_string());
        PathBuf::from(format!("/tmp/rialto-{user}.sock"))
    })
}

/// Bridges player notifications into the log until a real transport
/// carries `ClientEvent`s back to a specific connection (IPC framing is
/// out of scope for this crate).
fn log_client_event(event: &ClientEvent) {
    match event {
        ClientEvent::PlaybackError { session_id, message } => {
            warn!(session_id, message = %message, "playback error");
        }
        other => info!(?other, "client event"),
    }
}
