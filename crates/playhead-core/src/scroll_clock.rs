use crate::config::{ConfigError, PracticeConfig, Subdivision};
use crate::metronome::{Cue, MetronomeScheduler};
use playhead_domain_eval::{BeatChange, MissConfig, MissScanner, ScrollSnapshot};
use playhead_domain_score::{BeatTimeline, PracticeScore, Tempo, TimelineError};
use playhead_ports::layout::{BeatAnchor, ViewGeometry};
use playhead_ports::types::ElapsedMs;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockState {
    Stopped,
    Playing,
    Paused,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ClockError {
    #[error(transparent)]
    Timeline(#[from] TimelineError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid view geometry: {0}")]
    InvalidGeometry(String),
    #[error("cannot {action} while {state:?}")]
    InvalidState {
        action: &'static str,
        state: ClockState,
    },
}

/// One seamless loop jump.
#[derive(Clone, Debug, PartialEq)]
pub struct Teleport {
    pub loop_count: u32,
    pub origin_px: f64,
    pub new_pass: u32,
    /// Visual copy slot the new pass is drawn in.
    pub copy: u32,
    pub elapsed_ms: ElapsedMs,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StartReport {
    pub approach_ms: f64,
    pub elapsed_ms: ElapsedMs,
    pub skipped: Vec<BeatChange>,
    pub hide_before: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    pub elapsed_ms: ElapsedMs,
    pub scroll_offset_px: f64,
    pub teleports: Vec<Teleport>,
    pub changes: Vec<BeatChange>,
    pub cues: Vec<Cue>,
    /// Passes dropped from the window this tick, oldest first.
    pub retired: Vec<u32>,
    /// Set on the tick that finishes a bounded session.
    pub finished: bool,
}

/// Maps wall-clock time onto the scrolling playhead and owns the materialized passes.
pub struct ScrollClock {
    state: ClockState,
    score: PracticeScore,
    geometry: ViewGeometry,
    tempo: Tempo,
    copies: u32,
    max_passes: Option<u32>,
    timeline: Option<BeatTimeline>,
    scanner: MissScanner,
    metronome: MetronomeScheduler,
    scroll_start: Option<Instant>,
    /// Elapsed time accumulated before `scroll_start`.
    bias_ms: f64,
    px_per_ms: f64,
    origin_px: f64,
    loop_count: u32,
    /// Approach expressed in beats, so a tempo change keeps the lead-in distance.
    lead_beats: f64,
}

impl ScrollClock {
    pub fn new(
        score: PracticeScore,
        config: &PracticeConfig,
        geometry: ViewGeometry,
    ) -> Result<Self, ClockError> {
        config.validate()?;
        score.validate()?;
        validate_geometry(&geometry)?;
        let tempo = Tempo::new(config.bpm.unwrap_or(score.bpm))?;

        Ok(Self {
            state: ClockState::Stopped,
            score,
            geometry,
            tempo,
            copies: config.loop_copies,
            max_passes: config.max_passes,
            timeline: None,
            scanner: MissScanner::new(MissConfig {
                grace_ms: config.grace_ms,
            }),
            metronome: MetronomeScheduler::new(config.metronome, config.lookahead_ms),
            scroll_start: None,
            bias_ms: 0.0,
            px_per_ms: geometry.px_per_beat / tempo.ms_per_beat(),
            origin_px: 0.0,
            loop_count: 0,
            lead_beats: 0.0,
        })
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn score(&self) -> &PracticeScore {
        &self.score
    }

    pub fn geometry(&self) -> ViewGeometry {
        self.geometry
    }

    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    pub fn origin_px(&self) -> f64 {
        self.origin_px
    }

    pub fn px_per_ms(&self) -> f64 {
        self.px_per_ms
    }

    pub fn timeline(&self) -> Option<&BeatTimeline> {
        self.timeline.as_ref()
    }

    pub fn timeline_mut(&mut self) -> Option<&mut BeatTimeline> {
        self.timeline.as_mut()
    }

    pub fn start(&mut self, now: Instant, anchors: &[BeatAnchor]) -> Result<StartReport, ClockError> {
        self.start_at(0.0, None, now, anchors)
    }

    /// Starts with every first-pass beat before `measure` skipped and the scroll already
    /// advanced to that measure.
    pub fn start_from_measure(
        &mut self,
        measure: u32,
        now: Instant,
        anchors: &[BeatAnchor],
    ) -> Result<StartReport, ClockError> {
        let position = self.score.measure_start(measure)?;
        self.start_at(position, Some(measure), now, anchors)
    }

    fn start_at(
        &mut self,
        start_position: f64,
        measure: Option<u32>,
        now: Instant,
        anchors: &[BeatAnchor],
    ) -> Result<StartReport, ClockError> {
        let ms_per_beat = self.tempo.ms_per_beat();
        self.px_per_ms = self.geometry.px_per_beat / ms_per_beat;

        let mut approach_ms = self.approach_for(anchors);
        if measure.is_some() {
            approach_ms = approach_ms.max(0.0);
        }
        self.lead_beats = approach_ms / ms_per_beat;

        let mut timeline = BeatTimeline::new(&self.score, self.tempo, approach_ms, self.copies)?;
        let initial = match self.max_passes {
            Some(max) => self.copies.min(max),
            None => self.copies,
        };
        timeline.materialize(0, initial);

        let skipped = if start_position > 0.0 {
            timeline
                .skip_before(start_position)
                .into_iter()
                .filter_map(|index| timeline.get(index).map(BeatChange::of))
                .collect()
        } else {
            Vec::new()
        };

        self.bias_ms = start_position * ms_per_beat;
        self.scroll_start = Some(now);
        self.origin_px = 0.0;
        self.loop_count = 0;
        self.scanner.reset(0);
        self.metronome.configure(ms_per_beat, approach_ms);
        self.metronome.seek(self.bias_ms);
        self.timeline = Some(timeline);
        self.state = ClockState::Playing;

        log::info!(
            "scroll started at {:.3} beats, approach {:.1} ms, {} bpm",
            start_position,
            approach_ms,
            self.tempo.bpm()
        );

        Ok(StartReport {
            approach_ms,
            elapsed_ms: self.bias_ms,
            skipped,
            hide_before: measure.filter(|_| start_position > 0.0),
        })
    }

    /// Lead-in before position 0 crosses the target line, chosen so the first sounding
    /// slot crosses it exactly when it reaches the line on screen.
    fn approach_for(&self, anchors: &[BeatAnchor]) -> f64 {
        let geometry = self.geometry;
        let ms_per_beat = self.tempo.ms_per_beat();
        let Some((local, slot)) = self.score.first_sounding_slot() else {
            return (geometry.viewport_width_px - geometry.target_x_px) / self.px_per_ms;
        };

        let screen_x = anchors
            .iter()
            .find(|anchor| anchor.global_index == local as u64)
            .map(|anchor| anchor.screen_x)
            .unwrap_or(geometry.viewport_width_px);
        let arrival_ms = ((screen_x - geometry.target_x_px) / self.px_per_ms).max(0.0);

        arrival_ms - slot.position_beats * ms_per_beat
    }

    pub fn elapsed_at(&self, now: Instant) -> ElapsedMs {
        match (self.state, self.scroll_start) {
            (ClockState::Playing, Some(start)) => {
                self.bias_ms + now.saturating_duration_since(start).as_secs_f64() * 1000.0
            }
            (ClockState::Paused, _) => self.bias_ms,
            _ => 0.0,
        }
    }

    pub fn scroll_offset_px(&self, elapsed: ElapsedMs) -> f64 {
        self.origin_px + elapsed * self.px_per_ms
    }

    pub fn musical_position_at(&self, elapsed: ElapsedMs) -> Option<f64> {
        self.timeline
            .as_ref()
            .map(|timeline| timeline.musical_position_at(elapsed))
    }

    pub fn snapshot_at(&self, elapsed: ElapsedMs) -> ScrollSnapshot {
        ScrollSnapshot {
            elapsed_ms: elapsed,
            px_per_ms: self.px_per_ms,
            target_x_px: self.geometry.target_x_px,
        }
    }

    /// Advances one frame: teleports first, then the miss scan, then metronome cues.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        self.tick_holding(now, None)
    }

    /// Like [`ScrollClock::tick`], but the miss scan does not look past `hold_ms`. Used
    /// while a played chord is still being collected, so beats it may match stay pending.
    pub fn tick_holding(&mut self, now: Instant, hold_ms: Option<ElapsedMs>) -> TickReport {
        let elapsed = self.elapsed_at(now);
        let mut report = TickReport {
            elapsed_ms: elapsed,
            scroll_offset_px: self.scroll_offset_px(elapsed),
            ..TickReport::default()
        };
        if self.state != ClockState::Playing {
            return report;
        }
        let Some(timeline) = self.timeline.as_mut() else {
            return report;
        };

        while let Some(last) = timeline.last_pass() {
            let may_extend = self.max_passes.map_or(true, |max| last + 1 < max);
            if !may_extend || elapsed < timeline.pass_start_ms(last) {
                break;
            }
            let new_pass = timeline.push_next_pass();

            self.loop_count += 1;
            self.origin_px -= timeline.beats_per_pass() * self.geometry.px_per_beat;
            log::info!("teleport {}: pass {} materialized", self.loop_count, new_pass);
            report.teleports.push(Teleport {
                loop_count: self.loop_count,
                origin_px: self.origin_px,
                new_pass,
                copy: new_pass % self.copies,
                elapsed_ms: elapsed,
            });
        }
        report.scroll_offset_px = self.origin_px + elapsed * self.px_per_ms;

        let scan_until = hold_ms.map_or(elapsed, |hold| hold.min(elapsed));
        report.changes.extend(self.scanner.scan(timeline, scan_until));

        let keep = self.copies.min(self.max_passes.unwrap_or(u32::MAX)) as usize;
        report.retired = timeline.retire_settled(keep);
        if !report.retired.is_empty() {
            log::debug!("retired passes {:?}", report.retired);
        }

        if let Some(max) = self.max_passes {
            let on_final_pass = timeline.last_pass() == Some(max - 1);
            if on_final_pass && self.scanner.is_exhausted(timeline) {
                report.finished = true;
                self.state = ClockState::Stopped;
                self.scroll_start = None;
                self.bias_ms = elapsed;
                log::info!("session finished after {} passes", max);
                return report;
            }
        }

        report.cues = self.metronome.schedule(elapsed);
        report
    }

    pub fn pause(&mut self, now: Instant) -> Result<ElapsedMs, ClockError> {
        self.expect_state(ClockState::Playing, "pause")?;
        self.bias_ms = self.elapsed_at(now);
        self.scroll_start = None;
        self.state = ClockState::Paused;
        Ok(self.bias_ms)
    }

    pub fn resume(&mut self, now: Instant) -> Result<ElapsedMs, ClockError> {
        self.expect_state(ClockState::Paused, "resume")?;
        self.scroll_start = Some(now);
        self.state = ClockState::Playing;
        self.metronome.seek(self.bias_ms);
        Ok(self.bias_ms)
    }

    pub fn stop(&mut self) {
        self.state = ClockState::Stopped;
        self.timeline = None;
        self.scroll_start = None;
        self.bias_ms = 0.0;
        self.origin_px = 0.0;
        self.loop_count = 0;
        self.scanner.reset(0);
    }

    /// Changes tempo in place. The musical position, the scroll offset and every resolved
    /// beat state survive; only target times move.
    pub fn set_tempo(&mut self, bpm: f64, now: Instant) -> Result<(), ClockError> {
        let tempo = Tempo::new(bpm)?;
        let elapsed = self.elapsed_at(now);
        let musical_position = self.musical_position_at(elapsed);
        self.tempo = tempo;

        let ms_per_beat = tempo.ms_per_beat();
        self.px_per_ms = self.geometry.px_per_beat / ms_per_beat;
        let (Some(timeline), Some(position)) = (self.timeline.as_mut(), musical_position) else {
            return Ok(());
        };

        let approach_ms = self.lead_beats * ms_per_beat;
        timeline.retime(tempo, approach_ms);
        self.bias_ms = approach_ms + position * ms_per_beat;
        if self.state == ClockState::Playing {
            self.scroll_start = Some(now);
        }
        self.metronome.configure(ms_per_beat, approach_ms);
        self.metronome.seek(self.bias_ms);
        log::info!("tempo changed to {} bpm at beat {:.3}", tempo.bpm(), position);
        Ok(())
    }

    pub fn set_metronome(&mut self, subdivision: Subdivision, now: Instant) {
        let elapsed = self.elapsed_at(now);
        self.metronome.set_subdivision(subdivision, elapsed);
    }

    fn expect_state(&self, expected: ClockState, action: &'static str) -> Result<(), ClockError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ClockError::InvalidState {
                action,
                state: self.state,
            })
        }
    }
}

fn validate_geometry(geometry: &ViewGeometry) -> Result<(), ClockError> {
    if !(geometry.px_per_beat.is_finite() && geometry.px_per_beat > 0.0) {
        return Err(ClockError::InvalidGeometry(format!(
            "px_per_beat must be positive, got {}",
            geometry.px_per_beat
        )));
    }
    if !(geometry.target_x_px.is_finite() && geometry.viewport_width_px.is_finite())
        || geometry.target_x_px < 0.0
        || geometry.target_x_px > geometry.viewport_width_px
    {
        return Err(ClockError::InvalidGeometry(format!(
            "target line {} outside viewport of width {}",
            geometry.target_x_px, geometry.viewport_width_px
        )));
    }
    Ok(())
}
