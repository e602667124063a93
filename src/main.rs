use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use screen_recorder_lib::commands::recording::{
    get_audio_devices, get_displays, record_until_interrupted, RecorderState,
    StartRecordingRequest,
};
use screen_recorder_lib::config::load_config;
use std::path::PathBuf;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    screen_recorder_lib::init_tracing();

    let matches = Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON capture configuration")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Output video file (.mp4, .webm or .gif)")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("seconds")
                .short('s')
                .long("seconds")
                .value_name("SECONDS")
                .help("Stop after this many seconds instead of waiting for Ctrl-C")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("fps")
                .long("fps")
                .value_name("FPS")
                .help("Capture frame rate")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("system-audio")
                .long("system-audio")
                .help("Record system audio")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("microphone")
                .long("mic")
                .help("Record the default microphone")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("list")
                .long("list")
                .help("List displays and audio devices, then exit")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    if matches.get_flag("list") {
        for display in get_displays() {
            println!(
                "display {} {} {}x{}{}",
                display.id,
                display.name,
                display.width,
                display.height,
                if display.is_primary { " (primary)" } else { "" }
            );
        }
        for device in get_audio_devices() {
            println!(
                "audio {}{}",
                device.name,
                if device.is_default { " (default)" } else { "" }
            );
        }
        return Ok(());
    }

    let request = StartRecordingRequest {
        frame_rate: matches.get_one::<u32>("fps").copied(),
        record_system_audio: matches.get_flag("system-audio"),
        record_microphone: matches.get_flag("microphone"),
        output_path: matches.get_one::<PathBuf>("output").cloned(),
        ..Default::default()
    };

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => {
            let mut config = load_config(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            request.override_config(&mut config);
            config
        }
        None => {
            let resolver = screen_recorder_lib::capture::default_region_resolver();
            request
                .into_config(resolver.as_ref())
                .context("failed to resolve capture region")?
        }
    };

    let limit = matches.get_one::<u64>("seconds").map(|s| Duration::from_secs(*s));
    let state = RecorderState::default();

    tracing::info!("Recording {} to {}", config.region, config.output_path.display());
    let output = record_until_interrupted(&state, config, limit)
        .await
        .map_err(|e| anyhow::anyhow!("{}: {}", e.code, e.message))?;

    for source in &output.unavailable_sources {
        tracing::warn!("{} was not recorded: {}", source.input, source.reason);
    }
    println!("{}", output.output_path);
    Ok(())
}
