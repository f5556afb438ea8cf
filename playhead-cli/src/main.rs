//! Headless practice host: loads a compiled score, listens to a MIDI keyboard and prints
//! how each beat was played.

use anyhow::{anyhow, Context};
use clap::{Parser, ValueEnum};
use parking_lot::Mutex;
use playhead_core::{AppCore, Command, Event, PracticeConfig, ScoreSource, Subdivision};
use playhead_infra_audio_cpal::{CpalAudioOutputPort, DEFAULT_OUTPUT_ID};
use playhead_infra_midi_midir::MidirMidiInputPort;
use playhead_infra_storage_fs::FsStorage;
use playhead_ports::audio::AudioOutputPort;
use playhead_ports::midi::MidiInputPort;
use playhead_ports::storage::StoragePort;
use playhead_ports::types::DeviceId;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Metronome {
    Off,
    Beat,
    Half,
    Quarter,
}

impl From<Metronome> for Subdivision {
    fn from(value: Metronome) -> Self {
        match value {
            Metronome::Off => Subdivision::Off,
            Metronome::Beat => Subdivision::Beat,
            Metronome::Half => Subdivision::Half,
            Metronome::Quarter => Subdivision::Quarter,
        }
    }
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Compiled practice score (JSON)
    score: Option<PathBuf>,

    /// How long past its target a beat may still be played before it counts as missed
    #[clap(long, value_parser)]
    grace_ms: Option<f64>,

    /// Overrides the score's tempo
    #[clap(long, value_parser)]
    bpm: Option<f64>,

    #[clap(long, value_parser, default_value_t = 300.0)]
    timing_window_ms: f64,

    #[clap(long, value_parser, default_value_t = 80.0)]
    chord_group_ms: f64,

    #[clap(long, value_enum, default_value_t = Metronome::Off)]
    metronome: Metronome,

    #[clap(long, value_parser, default_value_t = 100.0)]
    lookahead_ms: f64,

    #[clap(long, value_parser, default_value_t = 3)]
    loop_copies: u32,

    /// Stop after this many passes instead of looping forever
    #[clap(long, value_parser)]
    passes: Option<u32>,

    /// Start at this measure, skipping everything before it
    #[clap(long, value_parser)]
    from_measure: Option<u32>,

    /// MIDI input: full device id or part of its name. Defaults to the first input.
    #[clap(long, value_parser)]
    midi_in: Option<String>,

    /// Audio output device id
    #[clap(long, value_parser)]
    audio_out: Option<String>,

    /// Run without a metronome output
    #[clap(long, value_parser)]
    no_audio: bool,

    /// Where settings and session logs are kept
    #[clap(long, value_parser)]
    data_dir: Option<PathBuf>,

    #[clap(long, value_parser, default_value_t = 16)]
    tick_ms: u64,

    /// List MIDI inputs and audio outputs, then exit
    #[clap(short, long, value_parser)]
    list_devices: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let midi_port = MidirMidiInputPort::new("Playhead");
    let audio_port = (!args.no_audio).then(CpalAudioOutputPort::new);

    if args.list_devices {
        return list_devices(&midi_port, audio_port.as_ref());
    }

    let score_path = args
        .score
        .clone()
        .ok_or_else(|| anyhow!("a score file is required"))?;
    let grace_ms = args
        .grace_ms
        .ok_or_else(|| anyhow!("--grace-ms is required"))?;

    let midi_in = pick_midi_input(&midi_port, args.midi_in.as_deref())?;
    let storage = match args.data_dir.clone() {
        Some(dir) => FsStorage::new(dir),
        None => FsStorage::default(),
    };

    let mut core = AppCore::new(
        audio_port.map(|port| Box::new(port) as Box<dyn AudioOutputPort>),
        Box::new(midi_port),
        None,
        Some(Box::new(storage) as Box<dyn StoragePort>),
    )?;

    core.handle_command(Command::SelectMidiInput { device_id: midi_in })?;
    if !args.no_audio {
        let device_id = DeviceId(
            args.audio_out
                .clone()
                .unwrap_or_else(|| DEFAULT_OUTPUT_ID.to_string()),
        );
        if let Err(err) = core.handle_command(Command::SelectAudioOutput {
            device_id,
            config: None,
        }) {
            log::warn!("continuing without metronome: {err}");
        }
    }

    core.handle_command(Command::LoadScore {
        source: ScoreSource::JsonFile(score_path.to_string_lossy().into_owned()),
    })?;
    core.handle_command(Command::Configure {
        config: practice_config(&args, grace_ms),
    })?;
    core.handle_command(match args.from_measure {
        Some(measure) => Command::StartFromMeasure { measure },
        None => Command::StartPractice,
    })
    .context("could not start session")?;

    println!("playing. commands: p = pause, r = resume, t <bpm> = tempo, q = quit");
    let core = Arc::new(Mutex::new(core));
    spawn_console(core.clone());

    let tick = Duration::from_millis(args.tick_ms.max(1));
    loop {
        let events = {
            let mut core = core.lock();
            core.tick(Instant::now());
            core.drain_events()
        };
        let mut finished = false;
        for event in events {
            finished |= report(&event)?;
        }
        if finished {
            break;
        }
        std::thread::sleep(tick);
    }

    core.lock().flush_store();
    Ok(())
}

fn practice_config(args: &Args, grace_ms: f64) -> PracticeConfig {
    PracticeConfig {
        bpm: args.bpm,
        timing_window_ms: args.timing_window_ms,
        chord_group_ms: args.chord_group_ms,
        metronome: args.metronome.into(),
        lookahead_ms: args.lookahead_ms,
        loop_copies: args.loop_copies,
        max_passes: args.passes,
        ..PracticeConfig::new(grace_ms)
    }
}

fn list_devices(
    midi_port: &MidirMidiInputPort,
    audio_port: Option<&CpalAudioOutputPort>,
) -> anyhow::Result<()> {
    println!("MIDI inputs:");
    for device in midi_port.list_inputs()? {
        println!("  {}  ({})", device.id, device.name);
    }
    if let Some(audio_port) = audio_port {
        println!("Audio outputs:");
        for device in audio_port.list_outputs()? {
            println!(
                "  {}  ({} Hz)",
                device.id, device.default_config.sample_rate_hz
            );
        }
    }
    Ok(())
}

fn pick_midi_input(port: &MidirMidiInputPort, wanted: Option<&str>) -> anyhow::Result<DeviceId> {
    let devices = port.list_inputs()?;
    let found = match wanted {
        Some(wanted) => devices
            .into_iter()
            .find(|device| device.id.0 == wanted || device.name.contains(wanted)),
        None => devices.into_iter().next(),
    };
    found
        .map(|device| device.id)
        .ok_or_else(|| anyhow!("no matching MIDI input, try --list-devices"))
}

/// Reads single-line commands from stdin and feeds them to the core.
fn spawn_console(core: Arc<Mutex<AppCore>>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let mut parts = line.split_whitespace();
            let cmd = match (parts.next(), parts.next()) {
                (Some("p"), _) => Command::PausePractice,
                (Some("r"), _) => Command::ResumePractice,
                (Some("q"), _) => Command::StopPractice,
                (Some("t"), Some(bpm)) => match bpm.parse() {
                    Ok(bpm) => Command::SetTempo { bpm },
                    Err(_) => {
                        println!("tempo must be a number");
                        continue;
                    }
                },
                _ => continue,
            };
            if let Err(err) = core.lock().handle_command(cmd) {
                println!("{err}");
            }
        }
    });
}

/// Prints one event. Returns true once the session is over.
fn report(event: &Event) -> anyhow::Result<bool> {
    match event {
        Event::MatchFeedback {
            global_index,
            result,
            timing_error_ms,
            expected,
            played,
        } => {
            let timing = timing_error_ms
                .map(|ms| format!("{ms:+.0} ms"))
                .unwrap_or_default();
            match global_index {
                Some(index) => println!(
                    "beat {index}: {result:?} {timing} expected {expected:?} played {played:?}"
                ),
                None => println!("stray chord {played:?}"),
            }
        }
        Event::BeatStateChanged {
            global_index,
            state,
            ..
        } => log::debug!("beat {global_index} -> {state:?}"),
        Event::Teleported { loop_count, .. } => println!("loop {loop_count}"),
        Event::HideRegionBefore { measure } => println!("starting at measure {measure}"),
        Event::StatsUpdated { summary } => log::debug!(
            "score {} streak {} accuracy {:.2}",
            summary.score,
            summary.streak,
            summary.accuracy
        ),
        Event::SessionFinished { summary } => {
            println!("{}", serde_json::to_string_pretty(summary)?);
            return Ok(true);
        }
        Event::SessionStateUpdated { state, .. } => log::info!("session {state:?}"),
        Event::PositionUpdated { .. }
        | Event::MidiInputsUpdated { .. }
        | Event::AudioOutputsUpdated { .. } => {}
    }
    Ok(false)
}
