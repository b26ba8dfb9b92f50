//! # Debate Voice Backend
//!
//! Real-time speech recognition server for the debate practice app. Clients
//! stream float32 PCM audio over `/ws/recognition/{session_id}` and receive
//! partial and final transcription results as JSON; the finished transcript is
//! persisted when the session ends. The chat, voice-call and video-call
//! signaling rooms are served from the same process under `/ws/rooms/`.
//!
//! ## Application Architecture:
//! - **config**: Layered configuration (defaults, config.toml, environment)
//! - **state**: Shared runtime config and server-wide metrics
//! - **audio**: Chunking, gain normalization and silence tracking
//! - **recognition**: Speech decoder abstraction and the segment decoder
//! - **session**: Per-connection pipeline coordination and persistence
//! - **rooms / websocket**: Connection actors and the room registry
//! - **health / handlers / middleware**: HTTP surface

mod audio;
mod config;
mod error;
mod handlers;
mod health;
mod middleware;
mod recognition;
mod rooms;
mod session;
mod state;
mod storage;
mod websocket;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use recognition::SharedDecoderFactory;
use rooms::RoomRegistry;
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use storage::TranscriptStore;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Set by the signal handler task; polled by the main task to stop the server.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting debate-voice-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    let factory = build_decoder_factory(&config)?;
    info!(backend = factory.backend_name(), "speech decoder backend ready");

    let store = TranscriptStore::new(&config.storage.transcript_dir)?;

    let app_state = AppState::new(config.clone());
    let registry = web::Data::new(RoomRegistry::new());
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::new(factory.clone()))
            .app_data(web::Data::new(store.clone()))
            .app_data(registry.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .route("/config", web::get().to(handlers::config::get_config))
                    .route("/config", web::put().to(handlers::config::update_config)),
            )
            .route("/", web::get().to(health::health_check))
            .route("/health", web::get().to(health::health_check))
            .route(
                "/ws/recognition/{session_id}",
                web::get().to(websocket::recognition_websocket),
            )
            .route(
                "/ws/rooms/{kind}/{room_id}",
                web::get().to(websocket::room_websocket),
            )
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Pick the speech decoder backend compiled into this build.
#[cfg(feature = "vosk-backend")]
fn build_decoder_factory(config: &AppConfig) -> Result<SharedDecoderFactory> {
    let factory = recognition::vosk::VoskFactory::new(&config.recognition.model_path)
        .map_err(|err| anyhow::anyhow!("failed to load recognition model: {}", err))?;
    Ok(Arc::new(factory))
}

/// Without a recognizer backend the pipeline runs end to end but every decode
/// yields no text. Useful for transport and load testing.
#[cfg(not(feature = "vosk-backend"))]
fn build_decoder_factory(_config: &AppConfig) -> Result<SharedDecoderFactory> {
    tracing::warn!("no recognizer backend compiled in, decodes will yield no text");
    Ok(Arc::new(recognition::NullDecoderFactory))
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debate_voice_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Install SIGTERM/SIGINT handlers that flip the shutdown flag.
fn setup_signal_handlers() {
    tokio::spawn(async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
