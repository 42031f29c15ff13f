//! fskmodem - acoustic FSK modem command line
//!
//! Sends and receives short text messages through the default speaker and
//! microphone, or renders/decodes them as WAV files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fskmodem::audio::wav::{read_wav, write_wav};
use fskmodem::{decode_offline, render_text, BitEvent, BitFramer, ModemConfig, ModemEvent};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "fskmodem", version)]
#[command(about = "Acoustic binary FSK modem for short text messages")]
struct Cli {
    /// JSON config file (defaults when omitted)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List audio devices
    Devices {
        /// Print the device list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as JSON
    Config {
        /// Also write it to this file
        #[arg(long, value_name = "PATH")]
        save: Option<PathBuf>,
    },

    /// Transmit text through the speaker
    Send {
        /// Message to send
        text: String,

        /// Output device name (default device when omitted)
        #[arg(short, long)]
        device: Option<String>,
    },

    /// Listen on the microphone and print decoded messages
    Listen {
        /// Input device name (default device when omitted)
        #[arg(short, long)]
        device: Option<String>,

        /// Measure the noise floor for this many seconds first
        #[arg(long, value_name = "SECS")]
        calibrate: Option<f32>,

        /// Stop after this many seconds (runs until Ctrl+C when omitted)
        #[arg(long, value_name = "SECS")]
        duration: Option<f32>,

        /// Print the final receiver statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render text to a WAV file
    Encode {
        /// Message to encode
        text: String,

        /// Output WAV file
        #[arg(value_name = "OUT.WAV")]
        output: PathBuf,
    },

    /// Decode every message in a WAV file
    Decode {
        /// Input WAV file
        #[arg(value_name = "IN.WAV")]
        input: PathBuf,

        /// Print sync, state and timeout events as well
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fskmodem=info".parse()?)
                .add_directive("fskmodem_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Devices { json } => list_devices(json),
        Commands::Config { save } => show_config(&config, save.as_deref()),
        Commands::Send { text, device } => send(&config, &text, device.as_deref()),
        Commands::Listen {
            device,
            calibrate,
            duration,
            json,
        } => listen(
            &config,
            device.as_deref(),
            calibrate.map(secs).transpose()?,
            duration.map(secs).transpose()?,
            json,
        ),
        Commands::Encode { text, output } => encode(&config, &text, &output),
        Commands::Decode { input, verbose } => decode(&config, &input, verbose),
    }
}

fn load_config(path: Option<&Path>) -> Result<ModemConfig> {
    match path {
        Some(path) => ModemConfig::load_strict(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(ModemConfig::default()),
    }
}

fn secs(value: f32) -> Result<Duration> {
    Duration::try_from_secs_f32(value).with_context(|| format!("Invalid duration: {value}"))
}

fn show_config(config: &ModemConfig, save: Option<&Path>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    if let Some(path) = save {
        config
            .save(path)
            .with_context(|| format!("Failed to save config to {}", path.display()))?;
        eprintln!("Saved to {}", path.display());
    }
    Ok(())
}

fn encode(config: &ModemConfig, text: &str, output: &Path) -> Result<()> {
    let payload = BitFramer::text_to_bits(text);
    let samples = render_text(text, config, config.sample_rate);
    write_wav(output, &samples, config.sample_rate)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Payload: {}", BitFramer::format_bits(&payload));
    println!(
        "Wrote {} ({} bits framed, {:.2}s @ {} Hz)",
        output.display(),
        BitFramer::frame(&payload).len(),
        samples.len() as f64 / config.sample_rate as f64,
        config.sample_rate
    );
    Ok(())
}

fn decode(config: &ModemConfig, input: &Path, verbose: bool) -> Result<()> {
    let audio =
        read_wav(input).with_context(|| format!("Failed to read {}", input.display()))?;
    info!(
        "Decoding {} ({:.2}s @ {} Hz)",
        input.display(),
        audio.duration_secs(),
        audio.sample_rate
    );

    let events = decode_offline(audio.samples, audio.sample_rate, config)?;
    let mut messages = 0;
    for event in &events {
        match event {
            ModemEvent::DataDecoded { text, lossy } => {
                messages += 1;
                let marker = if *lossy { " (lossy)" } else { "" };
                println!("{text}{marker}");
            }
            ModemEvent::BitDetected(BitEvent::Sync) if verbose => println!("[sync]"),
            ModemEvent::StateChanged(state) if verbose => println!("[{state}]"),
            ModemEvent::FrameAbandoned { bits } if verbose => {
                println!("[abandoned after {bits} bits]")
            }
            _ => {}
        }
    }

    if messages == 0 {
        eprintln!("No message found in {}", input.display());
    }
    Ok(())
}

/// Ctrl+C flag shared with the handler
#[cfg(feature = "live-audio")]
fn interrupt_flag() -> std::sync::Arc<std::sync::atomic::AtomicBool> {
    let running = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, std::sync::atomic::Ordering::SeqCst);
    })
    .ok();
    running
}

#[cfg(feature = "live-audio")]
fn list_devices(json: bool) -> Result<()> {
    let devices = fskmodem::audio::device::list_devices()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }
    if devices.is_empty() {
        println!("No audio devices found.");
        return Ok(());
    }

    println!("Found {} device(s):", devices.len());
    println!();
    for (i, device) in devices.iter().enumerate() {
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        println!("  {}. {}{}", i + 1, device.name, default_marker);
        println!(
            "     Channels: {} in, {} out",
            device.input_channels, device.output_channels
        );
        if !device.sample_rates.is_empty() {
            println!("     Sample rates: {:?}", device.sample_rates);
        }
    }
    Ok(())
}

#[cfg(feature = "live-audio")]
fn send(config: &ModemConfig, text: &str, device: Option<&str>) -> Result<()> {
    use crossbeam_channel::RecvTimeoutError;
    use fskmodem::audio::output::CpalOutput;
    use fskmodem::{Modulator, TxEvent};
    use std::io::{self, Write};
    use std::sync::atomic::Ordering;

    let (output, sink) = CpalOutput::open(device, config)?;
    let mut modulator = Modulator::new(sink, config);
    let events = modulator.subscribe();
    let running = interrupt_flag();

    println!("Sending \"{}\" via {}", text, output.device_name());
    modulator.transmit_text(text)?;

    let mut stdout = io::stdout();
    loop {
        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(TxEvent::BitSent { bit, .. }) => {
                print!("{bit}");
                stdout.flush()?;
            }
            Ok(TxEvent::Complete) | Ok(TxEvent::Cancelled) => break,
            Err(RecvTimeoutError::Timeout) => {
                if !running.load(Ordering::SeqCst) {
                    modulator.stop();
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    println!();

    // Let the scheduled tail play out
    while running.load(Ordering::SeqCst) && modulator.output_time() < modulator.end_time() {
        std::thread::sleep(Duration::from_millis(20));
    }
    modulator.stop();
    println!("Done.");
    Ok(())
}

#[cfg(feature = "live-audio")]
fn listen(
    config: &ModemConfig,
    device: Option<&str>,
    calibrate: Option<Duration>,
    duration: Option<Duration>,
    json: bool,
) -> Result<()> {
    use crossbeam_channel::RecvTimeoutError;
    use fskmodem::audio::input::CpalInput;
    use fskmodem::Demodulator;
    use std::io::{self, Write};
    use std::sync::atomic::Ordering;
    use std::time::Instant;

    let (input, source) = CpalInput::open(device, config)?;
    let mut demodulator = Demodulator::new(config);
    let events = demodulator.subscribe();
    let running = interrupt_flag();

    if let Some(window) = calibrate {
        println!("Calibrating for {:.1}s, keep quiet...", window.as_secs_f32());
        demodulator.start_calibration(window);
    }
    demodulator.start(source)?;
    println!("Listening on {}. Press Ctrl+C to stop.", input.device_name());

    let deadline = duration.map(|d| Instant::now() + d);
    let mut stdout = io::stdout();
    while running.load(Ordering::SeqCst) && deadline.map_or(true, |d| Instant::now() < d) {
        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(ModemEvent::BitDetected(BitEvent::Bit(bit))) => {
                print!("{bit}");
                stdout.flush()?;
            }
            Ok(ModemEvent::BitDetected(BitEvent::Sync)) => println!("[sync]"),
            Ok(ModemEvent::DataDecoded { text, lossy }) => {
                let marker = if lossy { " (lossy)" } else { "" };
                println!();
                println!("> {text}{marker}");
            }
            Ok(ModemEvent::CalibrationComplete { noise_floor }) => {
                let t = demodulator.thresholds();
                println!(
                    "Noise floor: {:.1} (thresholds high={} low={} min={})",
                    noise_floor, t.high, t.low, t.min_detect
                );
            }
            Ok(ModemEvent::FrameAbandoned { bits }) => {
                println!();
                println!("[frame abandoned after {bits} bits]");
            }
            Ok(ModemEvent::StateChanged(state)) => info!("Receiver state: {}", state),
            Ok(ModemEvent::SignalStats { .. }) => {}
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    demodulator.stop();
    let stats = demodulator.stats();
    let s = stats.stats();
    println!();
    if json {
        println!("{}", serde_json::to_string_pretty(s)?);
    } else {
        println!(
            "Ticks: {} | Bits: {} | Syncs: {} | Frames: {} | Avg strength: {:.1}%",
            s.ticks, s.bits_admitted, s.syncs, s.frames_decoded, s.avg_strength
        );
    }
    if input.overruns() > 0 {
        tracing::warn!("{} captured samples dropped", input.overruns());
    }
    Ok(())
}

#[cfg(not(feature = "live-audio"))]
fn list_devices(_json: bool) -> Result<()> {
    anyhow::bail!("built without the live-audio feature")
}

#[cfg(not(feature = "live-audio"))]
fn send(_config: &ModemConfig, _text: &str, _device: Option<&str>) -> Result<()> {
    anyhow::bail!("built without the live-audio feature")
}

#[cfg(not(feature = "live-audio"))]
fn listen(
    _config: &ModemConfig,
    _device: Option<&str>,
    _calibrate: Option<Duration>,
    _duration: Option<Duration>,
    _json: bool,
) -> Result<()> {
    anyhow::bail!("built without the live-audio feature")
}
