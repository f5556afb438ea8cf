use crate::audio_params::AudioParams;
use crate::click_graph::{AudioClock, ClickGraph, ScheduledCue};
use crate::config::{ConfigError, PracticeConfig};
use crate::input_aggregator::{FlushedChord, InputAggregator};
use crate::ipc::{Command, Event, ScoreSource, SessionState};
use crate::metronome::Cue;
use crate::scroll_clock::{ClockError, ScrollClock, StartReport, TickReport};
use crate::store_writer::StoreWriter;
use playhead_domain_eval::{BeatChange, MatchConfig, MatchOutcome, Matcher, SessionRecorder};
use playhead_domain_score::{PracticeScore, Tempo};
use playhead_ports::audio::{AudioError, AudioOutputPort, AudioStreamHandle};
use playhead_ports::layout::{LayoutPort, ViewGeometry};
use playhead_ports::midi::{MidiError, MidiInputPort, MidiInputStream, PlayerEvent};
use playhead_ports::storage::{SessionSummary, SettingsDto, StorageError, StoragePort};
use playhead_ports::types::{AudioConfig, DeviceId, ElapsedMs, Generation};
use parking_lot::Mutex;
use rtrb::{Consumer, Producer, RingBuffer};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

const POSITION_EMIT_INTERVAL: Duration = Duration::from_millis(33);

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("audio error: {0}")]
    Audio(#[from] AudioError),
    #[error("midi error: {0}")]
    Midi(#[from] MidiError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
    #[error("could not start session: {0}")]
    Start(ClockError),
    #[error(transparent)]
    Clock(#[from] ClockError),
    #[error("score load failed: {0}")]
    ScoreLoad(String),
    #[error("no score loaded")]
    NoScore,
    #[error("practice config not set")]
    NotConfigured,
    #[error("no audio backend available")]
    AudioUnavailable,
    #[error("store writer could not start: {0}")]
    StoreThread(#[from] std::io::Error),
}

pub struct AppCore {
    audio_port: Option<Box<dyn AudioOutputPort>>,
    midi_port: Box<dyn MidiInputPort>,
    layout: Option<Box<dyn LayoutPort>>,
    store: Option<StoreWriter>,
    settings: SettingsDto,
    config: Option<PracticeConfig>,
    session_state: SessionState,
    score: Option<PracticeScore>,
    clock: Option<ScrollClock>,
    aggregator: InputAggregator,
    matcher: Matcher,
    recorder: Option<SessionRecorder>,
    generation: Generation,
    cue_generation: Generation,
    audio_params: Arc<AudioParams>,
    audio_clock: Arc<AudioClock>,
    audio_stream: Option<Box<dyn AudioStreamHandle>>,
    cue_queue_tx: Option<Producer<ScheduledCue>>,
    sample_rate_hz: u32,
    midi_stream: Option<Box<dyn MidiInputStream>>,
    midi_queue_rx: Option<Consumer<PlayerEvent>>,
    events: VecDeque<Event>,
    last_position_emit: Option<Instant>,
}

impl AppCore {
    pub fn new(
        audio_port: Option<Box<dyn AudioOutputPort>>,
        midi_port: Box<dyn MidiInputPort>,
        layout: Option<Box<dyn LayoutPort>>,
        storage: Option<Box<dyn StoragePort>>,
    ) -> Result<Self, AppError> {
        let settings = match storage.as_ref() {
            Some(storage) => storage.load_settings().unwrap_or_else(|err| {
                log::warn!("falling back to default settings: {err}");
                SettingsDto::default()
            }),
            None => SettingsDto::default(),
        };
        let store = storage.map(StoreWriter::spawn).transpose()?;
        let audio_params = Arc::new(AudioParams::new(&settings));

        Ok(Self {
            audio_port,
            midi_port,
            layout,
            store,
            settings,
            config: None,
            session_state: SessionState::Idle,
            score: None,
            clock: None,
            aggregator: InputAggregator::new(0.0),
            matcher: Matcher::new(MatchConfig {
                timing_window_ms: 0.0,
            }),
            recorder: None,
            generation: Generation::default(),
            cue_generation: Generation::default(),
            audio_params,
            audio_clock: Arc::new(AudioClock::new()),
            audio_stream: None,
            cue_queue_tx: None,
            sample_rate_hz: 48_000,
            midi_stream: None,
            midi_queue_rx: None,
            events: VecDeque::new(),
            last_position_emit: None,
        })
    }

    pub fn session_state(&self) -> SessionState {
        self.session_state
    }

    pub fn settings(&self) -> &SettingsDto {
        &self.settings
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn clock(&self) -> Option<&ScrollClock> {
        self.clock.as_ref()
    }

    pub fn summary(&self) -> Option<SessionSummary> {
        self.recorder.as_ref().map(SessionRecorder::summary)
    }

    pub fn handle_command(&mut self, cmd: Command) -> Result<(), AppError> {
        self.handle_command_at(cmd, Instant::now())
    }

    pub fn handle_command_at(&mut self, cmd: Command, now: Instant) -> Result<(), AppError> {
        match cmd {
            Command::ListMidiInputs => {
                let devices = self.midi_port.list_inputs()?;
                self.events.push_back(Event::MidiInputsUpdated { devices });
            }
            Command::SelectMidiInput { device_id } => {
                self.open_midi_input(device_id)?;
            }
            Command::ListAudioOutputs => {
                let port = self.audio_port.as_ref().ok_or(AppError::AudioUnavailable)?;
                let devices = port.list_outputs()?;
                self.events.push_back(Event::AudioOutputsUpdated { devices });
            }
            Command::SelectAudioOutput { device_id, config } => {
                self.open_audio_output(device_id, config)?;
            }
            Command::LoadScore { source } => {
                self.load_score(source)?;
            }
            Command::Configure { config } => {
                config.validate()?;
                if self.clock.is_some() {
                    log::info!("new practice config takes effect on the next start");
                }
                self.config = Some(config);
                self.emit_session_state();
            }
            Command::StartPractice => {
                self.start_session(None, now)?;
            }
            Command::StartFromMeasure { measure } => {
                self.start_session(Some(measure), now)?;
            }
            Command::PausePractice => {
                if let Some(clock) = self.clock.as_mut() {
                    clock.pause(now)?;
                    self.aggregator.cancel(self.generation);
                    self.bump_cue_generation();
                    self.session_state = SessionState::Paused;
                    self.emit_session_state();
                    self.emit_position(now, true);
                }
            }
            Command::ResumePractice => {
                if let Some(clock) = self.clock.as_mut() {
                    clock.resume(now)?;
                    self.session_state = SessionState::Running;
                    self.emit_session_state();
                    self.emit_position(now, true);
                }
            }
            Command::StopPractice => {
                self.stop_session();
            }
            Command::SetTempo { bpm } => {
                if let Some(clock) = self.clock.as_mut() {
                    clock.set_tempo(bpm, now)?;
                    self.bump_cue_generation();
                    self.emit_position(now, true);
                } else {
                    Tempo::new(bpm).map_err(ClockError::from)?;
                }
                if let Some(config) = self.config.as_mut() {
                    config.bpm = Some(bpm);
                }
            }
            Command::SetMetronome { subdivision } => {
                if let Some(config) = self.config.as_mut() {
                    config.metronome = subdivision;
                }
                if let Some(clock) = self.clock.as_mut() {
                    clock.set_metronome(subdivision, now);
                    self.bump_cue_generation();
                }
            }
            Command::SetMetronomeVolume { volume } => {
                self.settings.metronome_volume = volume;
                self.audio_params.set_metronome_volume(volume);
                self.emit_session_state();
                self.save_settings();
            }
            Command::SetInputOffsetMs { ms } => {
                self.settings.input_offset_ms = ms;
                self.emit_session_state();
                self.save_settings();
            }
        }
        Ok(())
    }

    /// Drives one frame: chords are judged first, then the clock advances.
    pub fn tick(&mut self, now: Instant) {
        let chords = self.collect_chords(now);
        for chord in chords {
            self.judge_chord(chord);
        }
        self.advance_clock(now);
        self.emit_position(now, false);
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    /// Waits for queued store writes to land.
    pub fn flush_store(&self) {
        if let Some(store) = self.store.as_ref() {
            store.flush();
        }
    }

    fn open_audio_output(
        &mut self,
        device_id: DeviceId,
        config: Option<AudioConfig>,
    ) -> Result<(), AppError> {
        if let Some(stream) = self.audio_stream.take() {
            stream.close();
        }
        self.cue_queue_tx = None;
        let port = self.audio_port.as_ref().ok_or(AppError::AudioUnavailable)?;

        let config = config.unwrap_or(AudioConfig {
            sample_rate_hz: 48_000,
            channels: 2,
            buffer_size_frames: self.settings.audio_buffer_size_frames,
        });

        let (producer, consumer) = RingBuffer::new(1024);
        let graph = ClickGraph::new(
            self.audio_params.clone(),
            consumer,
            self.audio_clock.clone(),
            config.sample_rate_hz,
        );
        let stream = port.open_output(&device_id, config, Box::new(graph))?;

        log::info!("audio output {} opened at {} Hz", device_id, config.sample_rate_hz);
        self.audio_stream = Some(stream);
        self.cue_queue_tx = Some(producer);
        self.sample_rate_hz = config.sample_rate_hz;
        self.settings.selected_audio_out = Some(device_id);
        self.emit_session_state();
        self.save_settings();
        Ok(())
    }

    fn open_midi_input(&mut self, device_id: DeviceId) -> Result<(), AppError> {
        if let Some(stream) = self.midi_stream.take() {
            stream.close();
        }

        let (producer, consumer) = RingBuffer::new(2048);
        let producer = Arc::new(Mutex::new(producer));
        let cb = Arc::new(move |event: PlayerEvent| {
            if let Some(mut guard) = producer.try_lock() {
                let _ = guard.push(event);
            }
        });

        let stream = self.midi_port.open_input(&device_id, cb)?;
        log::info!("midi input {} opened", device_id);
        self.midi_stream = Some(stream);
        self.midi_queue_rx = Some(consumer);
        self.settings.selected_midi_in = Some(device_id);
        self.emit_session_state();
        self.save_settings();
        Ok(())
    }

    fn load_score(&mut self, source: ScoreSource) -> Result<(), AppError> {
        let score = match source {
            ScoreSource::JsonFile(path) => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| AppError::ScoreLoad(format!("{path}: {e}")))?;
                serde_json::from_str::<PracticeScore>(&text)
                    .map_err(|e| AppError::ScoreLoad(format!("{path}: {e}")))?
            }
            ScoreSource::Inline(score) => score,
        };
        score
            .validate()
            .map_err(|e| AppError::ScoreLoad(e.to_string()))?;

        self.stop_session();
        log::info!(
            "score loaded: {} slots, {} beats per pass",
            score.slots.len(),
            score.beats_per_pass
        );
        self.score = Some(score);
        self.session_state = SessionState::Ready;
        self.emit_session_state();
        Ok(())
    }

    fn start_session(&mut self, measure: Option<u32>, now: Instant) -> Result<(), AppError> {
        let score = self.score.clone().ok_or(AppError::NoScore)?;
        let config = self.config.clone().ok_or(AppError::NotConfigured)?;
        self.stop_session();

        let (geometry, anchors) = match self.layout.as_ref() {
            Some(layout) => (layout.geometry(), layout.beat_anchors()),
            None => (ViewGeometry::default(), Vec::new()),
        };

        let mut clock = ScrollClock::new(score, &config, geometry).map_err(AppError::Start)?;
        let report = match measure {
            Some(measure) => clock.start_from_measure(measure, now, &anchors),
            None => clock.start(now, &anchors),
        }
        .map_err(AppError::Start)?;

        self.generation = self.generation.next();
        self.bump_cue_generation();
        self.aggregator.cancel(self.generation);
        self.aggregator.set_window_ms(config.chord_group_ms);
        self.matcher = Matcher::new(MatchConfig {
            timing_window_ms: config.timing_window_ms,
        });
        self.recorder = Some(SessionRecorder::new(self.generation));
        self.clock = Some(clock);
        self.session_state = SessionState::Running;
        log::info!("session {} started", self.generation.0);

        self.emit_start(report);
        self.emit_session_state();
        self.emit_position(now, true);
        Ok(())
    }

    fn emit_start(&mut self, report: StartReport) {
        for change in &report.skipped {
            self.emit_beat_change(change);
        }
        if let Some(measure) = report.hide_before {
            self.events.push_back(Event::HideRegionBefore { measure });
        }
    }

    /// Ends the running session, if any. Late chords and queued clicks become stale.
    fn stop_session(&mut self) {
        let Some(mut clock) = self.clock.take() else {
            return;
        };
        clock.stop();
        self.finish_session();
    }

    fn finish_session(&mut self) {
        self.generation = self.generation.next();
        self.bump_cue_generation();
        self.aggregator.cancel(self.generation);

        if let Some(recorder) = self.recorder.take() {
            let summary = recorder.summary();
            log::info!(
                "session {} finished: score {}, accuracy {:.2}",
                summary.generation.0,
                summary.score,
                summary.accuracy
            );
            if let Some(store) = self.store.as_ref() {
                store.save_summary(summary.clone());
            }
            self.events.push_back(Event::SessionFinished { summary });
        }

        self.session_state = if self.score.is_some() {
            SessionState::Ready
        } else {
            SessionState::Idle
        };
        self.last_position_emit = None;
        self.emit_session_state();
    }

    fn collect_chords(&mut self, now: Instant) -> Vec<FlushedChord> {
        let mut chords = Vec::new();
        while let Some(Ok(event)) = self.midi_queue_rx.as_mut().map(|rx| rx.pop()) {
            if let Some(chord) = self.aggregator.push(&event) {
                chords.push(chord);
            }
        }
        if let Some(chord) = self.aggregator.poll(now) {
            chords.push(chord);
        }
        chords
    }

    fn judge_chord(&mut self, flushed: FlushedChord) {
        if flushed.generation != self.generation || self.session_state != SessionState::Running {
            log::debug!("dropping chord {:?} from a stale session", flushed.chord.pitches());
            return;
        }
        let Some(clock) = self.clock.as_mut() else {
            return;
        };

        let played_at: ElapsedMs =
            clock.elapsed_at(flushed.onset) - self.settings.input_offset_ms as f64;
        let snapshot = clock.snapshot_at(played_at);
        let Some(timeline) = clock.timeline_mut() else {
            return;
        };
        let outcome = self.matcher.match_chord(timeline, &snapshot, &flushed.chord);
        log::debug!(
            "chord {:?} at {:.1} ms -> {:?}",
            outcome.played,
            played_at,
            outcome.result
        );

        self.emit_match(&outcome);
        let Some(recorder) = self.recorder.as_mut() else {
            return;
        };
        let record = recorder.record_match(&outcome);
        let summary = recorder.summary();
        if let (Some(store), Some(record)) = (self.store.as_ref(), record) {
            store.append_outcomes(vec![record]);
        }
        self.events.push_back(Event::StatsUpdated { summary });
    }

    fn emit_match(&mut self, outcome: &MatchOutcome) {
        if let (true, Some(beat)) = (outcome.consumed(), outcome.beat.as_ref()) {
            if let Some(state) = self
                .clock
                .as_ref()
                .and_then(ScrollClock::timeline)
                .and_then(|timeline| timeline.get(beat.global_index))
                .map(|event| event.state())
            {
                self.events.push_back(Event::BeatStateChanged {
                    global_index: beat.global_index,
                    visual: beat.visual,
                    state,
                });
            }
        }
        self.events.push_back(Event::MatchFeedback {
            global_index: outcome.beat.as_ref().map(|beat| beat.global_index),
            result: outcome.result,
            timing_error_ms: outcome.timing_error_ms,
            expected: outcome
                .beat
                .as_ref()
                .map(|beat| beat.expected.clone())
                .unwrap_or_default(),
            played: outcome.played.clone(),
        });
    }

    fn advance_clock(&mut self, now: Instant) {
        if self.session_state != SessionState::Running {
            return;
        }
        let Some(clock) = self.clock.as_mut() else {
            return;
        };
        // A burst still being collected is judged at its onset, so the scan must not
        // run past that point yet.
        let hold = self.aggregator.onset().map(|onset| {
            clock.elapsed_at(onset) - self.settings.input_offset_ms as f64
        });
        let report = clock.tick_holding(now, hold);
        self.apply_tick(report);
    }

    fn apply_tick(&mut self, report: TickReport) {
        for teleport in &report.teleports {
            self.events.push_back(Event::Teleported {
                loop_count: teleport.loop_count,
                origin_px: teleport.origin_px,
                copy: teleport.copy,
                new_pass: teleport.new_pass,
            });
            if let Some(recorder) = self.recorder.as_mut() {
                recorder.set_loops_completed(teleport.loop_count);
            }
        }

        let mut records = Vec::new();
        for change in &report.changes {
            self.emit_beat_change(change);
            if let Some(record) = self
                .recorder
                .as_mut()
                .and_then(|recorder| recorder.record_change(change))
            {
                records.push(record);
            }
        }
        if !records.is_empty() {
            if let Some(summary) = self.summary() {
                self.events.push_back(Event::StatsUpdated { summary });
            }
            if let Some(store) = self.store.as_ref() {
                store.append_outcomes(records);
            }
        }

        self.push_cues(&report.cues, report.elapsed_ms);

        if report.finished {
            self.clock = None;
            self.finish_session();
        }
    }

    fn emit_beat_change(&mut self, change: &BeatChange) {
        self.events.push_back(Event::BeatStateChanged {
            global_index: change.global_index,
            visual: change.visual,
            state: change.state,
        });
    }

    /// Places cues on the output device clock. Without an open stream this does nothing.
    fn push_cues(&mut self, cues: &[Cue], elapsed: ElapsedMs) {
        let Some(producer) = self.cue_queue_tx.as_mut() else {
            return;
        };
        let now_sample = self.audio_clock.get();
        for cue in cues {
            let lead_ms = (cue.at_ms - elapsed).max(0.0);
            let offset = (lead_ms * self.sample_rate_hz as f64 / 1000.0).round() as u64;
            let scheduled = ScheduledCue {
                sample_time: now_sample.saturating_add(offset),
                kind: cue.kind,
                generation: self.cue_generation,
            };
            if producer.push(scheduled).is_err() {
                log::warn!("click queue full, dropping cue {}", cue.index);
            }
        }
    }

    fn bump_cue_generation(&mut self) {
        self.cue_generation = self.cue_generation.next();
        self.audio_params.set_generation(self.cue_generation);
    }

    fn emit_session_state(&mut self) {
        self.events.push_back(Event::SessionStateUpdated {
            state: self.session_state,
            settings: self.settings.clone(),
        });
    }

    fn emit_position(&mut self, now: Instant, force: bool) {
        if !force {
            if let Some(last) = self.last_position_emit {
                if now.saturating_duration_since(last) < POSITION_EMIT_INTERVAL {
                    return;
                }
            }
        }
        let Some(clock) = self.clock.as_ref() else {
            return;
        };
        let elapsed = clock.elapsed_at(now);
        let musical_position = clock.musical_position_at(elapsed).unwrap_or(0.0);
        let score = clock.score();
        let measure = if musical_position < 0.0 {
            None
        } else {
            score.measure_at(musical_position.rem_euclid(score.beats_per_pass))
        };
        self.events.push_back(Event::PositionUpdated {
            elapsed_ms: elapsed,
            scroll_offset_px: clock.scroll_offset_px(elapsed),
            musical_position,
            measure,
            loop_count: clock.loop_count(),
            playing: self.session_state == SessionState::Running,
        });
        self.last_position_emit = Some(now);
    }

    fn save_settings(&self) {
        if let Some(store) = self.store.as_ref() {
            store.save_settings(&self.settings);
        }
    }
}
