//! Screen Recorder - real-time screen and audio capture.
//!
//! This is the main library crate. It captures a screen region at a fixed
//! frame rate alongside system and microphone audio, and muxes the result
//! into a single video file with FFmpeg.

pub mod capture;
pub mod commands;
pub mod config;
pub mod export;
pub mod recorder;
pub mod utils;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
///
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "screen_recorder_lib=debug,screen_recorder=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
