use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use aria_voice::audio::{AudioCapture, AudioPlayback, rms};
use aria_voice::engine::TurnEngine;
use aria_voice::events::EventBus;
use aria_voice::moshi::{MoshiCodec, MoshiModel};
use aria_voice::{Config, Daemon};

/// Aria - full-duplex voice conversation engine
#[derive(Parser)]
#[command(name = "aria", version, about)]
struct Cli {
    /// API server port
    #[arg(long, env = "ARIA_PORT")]
    port: Option<u16>,

    /// Speech-model inference server URL
    #[arg(long, env = "ARIA_MODEL_URL")]
    model_url: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable local audio (for headless/telephony-only servers)
    #[arg(long, env = "ARIA_DISABLE_AUDIO")]
    disable_audio: bool,

    /// Speak a greeting when the session starts
    #[arg(long)]
    greet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Generate a greeting turn and play it
    Greet,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,aria_voice=info",
        1 => "info,aria_voice=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load();
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(url) = cli.model_url {
        config.model.server_url = url;
    }
    if cli.disable_audio {
        config.audio.enabled = false;
    }
    if cli.greet {
        config.greet_on_start = true;
    }

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::Greet => greet(&config).await,
        };
    }

    tracing::info!(
        port = config.server.port,
        model = %config.model.server_url,
        audio = config.audio.enabled,
        "starting aria"
    );

    // ctrl-c cancels; the conversation loop finishes its iteration and
    // drains playback before exiting
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    Daemon::new(config).run(shutdown).await?;
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    let sample_rate = capture.sample_rate();
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        // Clear buffer each second
        capture.clear_buffer();
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let mut playback = AudioPlayback::new()?;
    playback.start()?;

    let sample_rate = aria_voice::SAMPLE_RATE;
    let frequency = 440.0_f32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let num_samples = (sample_rate * 2) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);

    playback.enqueue(&samples);
    playback.drain(Duration::from_secs(5)).await;
    playback.stop();

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Generate a greeting turn against the model server and play it
#[allow(clippy::future_not_send)]
async fn greet(config: &Config) -> anyhow::Result<()> {
    println!("Connecting to {}...", config.model.server_url);

    let codec = Arc::new(MoshiCodec::connect(&config.model.server_url).await?);
    let model = Arc::new(MoshiModel::new(config.model.server_url.clone()));

    let mut engine = TurnEngine::new(
        codec,
        model,
        EventBus::default(),
        config.turn.clone(),
        config.vad.clone(),
        config.amplitude.clone(),
    );
    if let Some(context) = &config.context {
        engine.set_turn_context(context.clone());
    }
    engine.start().await?;

    println!("Generating greeting...");
    let record = engine.generate_greeting().await?;
    println!("Text: {}", record.text);

    let samples = engine.take_output();
    if samples.is_empty() {
        println!("Model produced no audio");
        return Ok(());
    }

    println!("Playing {} samples...", samples.len());
    let mut playback = AudioPlayback::new()?;
    playback.start()?;
    playback.enqueue(&samples);
    playback.drain(Duration::from_secs(30)).await;
    playback.stop();

    Ok(())
}
