//! Departure Board HTTP API Server
//!
//! Drives a departure board display split into three animated rows. Any
//! device on the LAN can push new row content and movements via HTTP.
//!
//! ## Architecture
//! - **Animator thread** (std::thread): ticks the board and renders frames
//! - **HTTP server** (tokio/axum): applies section updates to the shared board
//!
//! ## Rust concepts
//! - `#[tokio::main]` async entry point
//! - `Arc<Mutex<T>>` for the board shared by both worlds
//! - `spawn_blocking` to await a blocking shutdown signal from async code
//!
//! ## Usage
//! ```sh
//! ./target/release/departure-board --port 8080 --snapshot last-frame.png
//! sudo ./target/release/departure-board --renderer led-matrix   # with --features hardware
//! ```

use clap::Parser;
use departure_board::animator::Animator;
use departure_board::renderer::{self, FrameSize, FrameSnapshot, PixelStyle, RendererKind, RendererOptions};
use departure_board::server::{self, AppState};
use departure_board::{BoardConfig, Shutdown, setup_signal_handler, shared_board};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Departure Board HTTP API Server
#[derive(Parser)]
#[command(name = "departure-board")]
#[command(about = "HTTP API server driving an animated departure board display")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Display width in pixels
    #[arg(long, default_value = "192")]
    width: u32,

    /// Display height in pixels
    #[arg(long, default_value = "32")]
    height: u32,

    /// Animation step in milliseconds
    #[arg(long, default_value = "50")]
    tick_ms: u64,

    /// Where frames are drawn
    #[arg(long, value_enum, default_value_t = RendererKind::Image)]
    renderer: RendererKind,

    /// Emulator: physical pixels per board pixel
    #[arg(long, default_value = "5")]
    scale: u32,

    /// Emulator: how each board pixel is drawn
    #[arg(long, value_enum, default_value_t = PixelStyle::Blob)]
    pixel_style: PixelStyle,

    /// Brightness level (0-100)
    #[arg(long, default_value = "100", value_parser = clap::value_parser!(u8).range(0..=100))]
    brightness: u8,

    /// Emulator: save the last frame as PNG here on shutdown
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    let args = Args::parse();
    let config = BoardConfig::new(args.width, args.height, args.tick_ms);

    tracing::info!("Departure Board Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Display: {}x{}, step {} ms", config.width, config.height, config.tick_ms);
    tracing::info!("Renderer: {:?}", args.renderer);
    tracing::info!("Port: {}", args.port);

    let board = shared_board(config.build_board());
    let shutdown = Shutdown::new();

    if let Err(e) = setup_signal_handler(&shutdown) {
        tracing::warn!("Could not install Ctrl+C handler: {}", e);
    }

    // Only the emulator produces frames the HTTP server can serve.
    let snapshot = (args.renderer == RendererKind::Image).then(FrameSnapshot::new);

    let options = RendererOptions {
        kind: args.renderer,
        scale: args.scale,
        style: args.pixel_style,
        brightness: args.brightness,
        snapshot_path: args.snapshot,
    };

    let animator = Animator::new(board.clone(), config.tick(), shutdown.clone());
    let animator_status = animator.status();
    let factory = renderer::renderer_factory(options, snapshot.clone());

    let handle = match animator.start(factory, Some(FrameSize::new(config.width, config.height))) {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!("Failed to start renderer: {}", e);
            std::process::exit(1);
        }
    };

    let app_state = AppState {
        board,
        config,
        animator: animator_status,
        snapshot,
        shutdown: shutdown.clone(),
    };

    let app = server::create_router(app_state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            handle.stop();
            std::process::exit(1);
        }
    };

    tracing::info!("Listening on http://{}", addr);
    tracing::info!("API Documentation: http://localhost:{}/docs", args.port);
    tracing::info!("Try: curl http://localhost:{}/api/v1/status", args.port);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(server::wait_for_shutdown(shutdown.clone()))
        .await;

    if let Err(e) = served {
        tracing::error!("Server error: {}", e);
    }

    // The server can also end on its own; make sure the animator follows.
    handle.stop();
    tracing::info!("Departure board stopped");
}
