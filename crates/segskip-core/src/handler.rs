//! Per-media-item skip handler.
//!
//! Lifecycle: `Idle → Loading → Active → Destroyed`. The first three
//! transitions happen once each; `Destroyed` is terminal and repeat destroys
//! are no-ops. While `Active` the handler probes for the media surface, then
//! re-plans the next skip on every play/pause/timeupdate. At most one skip
//! timer is pending at any time: every pass cancels the previous one first.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::ConfigStore;
use crate::overlay::{OverlayHost, OverlayRenderer};
use crate::policy::CategoryPolicy;
use crate::segments::{Segment, SegmentSet};
use crate::surface::{MediaEvent, MediaSurfaceProvider, Notifier};
use crate::timer::{TimerId, TimerSlot, Timers};

/// Look-back window when searching for the next segment. Tolerates timer
/// jitter and catches segments playback has only just entered.
pub const LOOKBACK_EPSILON: f64 = 0.3;

/// Added to a segment's end when jumping past it so the landing position
/// does not sit on the boundary.
pub const SKIP_OFFSET: f64 = 0.1;

pub const ATTACH_PROBE_INTERVAL: Duration = Duration::from_millis(100);

pub const TOAST_TITLE: &str = "SponsorBlock";

const ATTACH_LOG_EVERY: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Idle,
    Loading,
    Active,
    Destroyed,
}

/// Host capabilities lent to the handler for the duration of one call.
pub struct HandlerEnv<'a> {
    pub surfaces: &'a mut dyn MediaSurfaceProvider,
    pub overlay_host: &'a mut dyn OverlayHost,
    pub timers: &'a mut dyn Timers,
    pub notifier: &'a mut dyn Notifier,
    pub config: &'a ConfigStore,
}

impl HandlerEnv<'_> {
    fn policy(&self) -> CategoryPolicy {
        CategoryPolicy::from_config(&self.config.snapshot().sponsorblock)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerStatus {
    pub media_id: String,
    pub lifecycle: Lifecycle,
    pub segments: Vec<Segment>,
    pub cursor: usize,
    pub surface_attached: bool,
    pub skip_pending: bool,
    pub overlay_markers: usize,
}

enum Plan {
    SkipNow(usize),
    Arm { idx: usize, delay: f64 },
}

pub struct SkipHandler {
    media_id: String,
    lifecycle: Lifecycle,
    segments: SegmentSet,
    surface_attached: bool,
    attach_probe: TimerSlot,
    attach_attempts: u32,
    pending_skip: TimerSlot,
    /// Segment the pending skip timer was armed for.
    pending_segment: Option<usize>,
    overlay: OverlayRenderer,
}

impl SkipHandler {
    pub fn new(media_id: impl Into<String>) -> Self {
        Self {
            media_id: media_id.into(),
            lifecycle: Lifecycle::Idle,
            segments: SegmentSet::default(),
            surface_attached: false,
            attach_probe: TimerSlot::default(),
            attach_attempts: 0,
            pending_skip: TimerSlot::default(),
            pending_segment: None,
            overlay: OverlayRenderer::default(),
        }
    }

    pub fn media_id(&self) -> &str {
        &self.media_id
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn segments(&self) -> &SegmentSet {
        &self.segments
    }

    pub fn cursor(&self) -> usize {
        self.segments.cursor()
    }

    pub fn overlay(&self) -> &OverlayRenderer {
        &self.overlay
    }

    pub fn is_surface_attached(&self) -> bool {
        self.surface_attached
    }

    pub fn has_pending_skip(&self) -> bool {
        self.pending_skip.is_armed()
    }

    pub fn status(&self) -> HandlerStatus {
        HandlerStatus {
            media_id: self.media_id.clone(),
            lifecycle: self.lifecycle,
            segments: self.segments.as_slice().to_vec(),
            cursor: self.segments.cursor(),
            surface_attached: self.surface_attached,
            skip_pending: self.pending_skip.is_armed(),
            overlay_markers: self.overlay.strip().map_or(0, |s| s.markers.len()),
        }
    }

    // ── lifecycle ─────────────────────────────────────────────────────────────

    /// `Idle → Loading`. Returns false from any other state.
    pub fn begin_loading(&mut self) -> bool {
        if self.lifecycle != Lifecycle::Idle {
            return false;
        }
        debug!("SkipHandler: {}: loading segments", self.media_id);
        self.lifecycle = Lifecycle::Loading;
        true
    }

    /// `Loading → Active` with the fetched set, which may be empty. An empty
    /// set leaves the handler inert: no surface probe, no timers, no overlay.
    pub fn finish_loading(&mut self, segments: SegmentSet, env: &mut HandlerEnv<'_>) {
        if self.lifecycle != Lifecycle::Loading {
            debug!(
                "SkipHandler: {}: ignoring segments delivered in {:?}",
                self.media_id, self.lifecycle
            );
            return;
        }
        self.segments = segments;
        self.lifecycle = Lifecycle::Active;

        if self.segments.is_empty() {
            info!("SkipHandler: {}: no segments, staying inert", self.media_id);
            return;
        }
        info!(
            "SkipHandler: {}: active with {} segments",
            self.media_id,
            self.segments.len()
        );
        self.attach_surface(env);
    }

    /// Release every timer, listener and overlay. Idempotent.
    pub fn destroy(&mut self, env: &mut HandlerEnv<'_>) {
        if self.lifecycle == Lifecycle::Destroyed {
            return;
        }
        info!("SkipHandler: {}: destroying", self.media_id);
        self.lifecycle = Lifecycle::Destroyed;

        self.pending_skip.cancel(env.timers);
        self.pending_segment = None;
        self.attach_probe.cancel(env.timers);
        self.overlay.teardown(env.overlay_host, env.timers);

        if self.surface_attached {
            if let Some(surface) = env.surfaces.surface() {
                surface.unsubscribe();
            }
            self.surface_attached = false;
        }
    }

    // ── host events ───────────────────────────────────────────────────────────

    /// Dispatch a fired timer. Returns false if the id is not ours.
    pub fn on_timer(&mut self, id: TimerId, env: &mut HandlerEnv<'_>) -> bool {
        if self.attach_probe.take_if(id) {
            self.attach_surface(env);
            return true;
        }
        if self.pending_skip.take_if(id) {
            self.fire_pending_skip(env);
            return true;
        }
        self.overlay.on_timer(id, env.overlay_host, env.timers)
    }

    pub fn on_media_event(&mut self, event: MediaEvent, env: &mut HandlerEnv<'_>) {
        if self.lifecycle != Lifecycle::Active || !self.surface_attached {
            return;
        }
        match event {
            MediaEvent::Play | MediaEvent::Pause | MediaEvent::TimeUpdate => {
                self.schedule_skip(env)
            }
            MediaEvent::DurationChange => self.build_overlay(env),
        }
    }

    /// The overlay host's container or focus state changed.
    pub fn on_overlay_host_changed(&mut self, env: &mut HandlerEnv<'_>) {
        if self.lifecycle == Lifecycle::Active {
            self.overlay.on_host_changed(env.overlay_host);
        }
    }

    /// Category settings changed; re-plan against the new policy.
    pub fn on_policy_changed(&mut self, env: &mut HandlerEnv<'_>) {
        if self.lifecycle == Lifecycle::Active {
            self.schedule_skip(env);
        }
    }

    // ── surface attach ────────────────────────────────────────────────────────

    fn attach_surface(&mut self, env: &mut HandlerEnv<'_>) {
        self.attach_probe.cancel(env.timers);
        if self.lifecycle != Lifecycle::Active || self.surface_attached {
            return;
        }

        match env.surfaces.surface() {
            Some(surface) => {
                surface.subscribe();
                self.surface_attached = true;
                info!(
                    "SkipHandler: {}: media surface found after {} probes, binding",
                    self.media_id, self.attach_attempts
                );
            }
            None => {
                if self.attach_attempts % ATTACH_LOG_EVERY == 0 {
                    debug!("SkipHandler: {}: no media surface yet, retrying", self.media_id);
                }
                self.attach_attempts += 1;
                self.attach_probe.arm(env.timers, ATTACH_PROBE_INTERVAL);
                return;
            }
        }

        self.build_overlay(env);
        self.schedule_skip(env);
    }

    fn build_overlay(&mut self, env: &mut HandlerEnv<'_>) {
        let duration = env.surfaces.surface().and_then(|s| s.duration());
        self.overlay
            .build(&self.segments, duration, env.overlay_host, env.timers);
    }

    // ── scheduling ────────────────────────────────────────────────────────────

    /// Plan the next skip from the current playback position.
    ///
    /// Scans forward from the cursor for the first segment whose end lies
    /// after `now - LOOKBACK_EPSILON` and moves the cursor there. The first
    /// auto-skippable segment found is either skipped right away (playback is
    /// inside it) or gets the single pending timer (it lies ahead).
    pub fn schedule_skip(&mut self, env: &mut HandlerEnv<'_>) {
        self.pending_skip.cancel(env.timers);
        self.pending_segment = None;

        if self.lifecycle != Lifecycle::Active || !self.surface_attached {
            return;
        }
        let Some(surface) = env.surfaces.surface() else {
            return;
        };
        if surface.paused() {
            return;
        }
        let now = surface.current_time();
        let policy = env.policy();

        let mut first_live = None;
        let mut plan = None;
        for (idx, segment) in self
            .segments
            .iter()
            .enumerate()
            .skip(self.segments.cursor())
        {
            if segment.end <= now - LOOKBACK_EPSILON {
                continue;
            }
            first_live.get_or_insert(idx);
            if !policy.rule(segment.category).skips_automatically() {
                continue;
            }
            if segment.contains(now) {
                plan = Some(Plan::SkipNow(idx));
                break;
            }
            if now < segment.start {
                plan = Some(Plan::Arm {
                    idx,
                    delay: segment.start - now,
                });
                break;
            }
            // just left this one, inside the look-back window
        }
        self.segments
            .advance_cursor(first_live.unwrap_or(self.segments.len()));

        match plan {
            Some(Plan::SkipNow(idx)) => self.skip_segment(idx, env),
            Some(Plan::Arm { idx, delay }) => {
                let Ok(after) = Duration::try_from_secs_f64(delay) else {
                    debug!(
                        "SkipHandler: {}: segment {} starts out of timer range ({}s)",
                        self.media_id, idx, delay
                    );
                    return;
                };
                debug!(
                    "SkipHandler: {}: next skip in {:.2}s (segment {})",
                    self.media_id, delay, idx
                );
                self.pending_skip.arm(env.timers, after);
                self.pending_segment = Some(idx);
            }
            None => {}
        }
    }

    fn fire_pending_skip(&mut self, env: &mut HandlerEnv<'_>) {
        let Some(idx) = self.pending_segment.take() else {
            return;
        };
        if self.lifecycle != Lifecycle::Active {
            return;
        }
        let paused = env.surfaces.surface().map_or(true, |s| s.paused());
        if paused {
            debug!("SkipHandler: {}: paused before skip fired", self.media_id);
            return;
        }
        self.skip_segment(idx, env);
    }

    /// Skip `idx` if the current policy auto-skips its category, then plan
    /// the next one straight away so adjacent segments chain without
    /// waiting for a time update.
    fn skip_segment(&mut self, idx: usize, env: &mut HandlerEnv<'_>) {
        let Some(segment) = self.segments.get(idx).cloned() else {
            return;
        };
        let rule = env.policy().rule(segment.category);
        if !rule.auto_skip {
            debug!(
                "SkipHandler: {}: segment {} is not skippable, ignoring",
                self.media_id, segment.category
            );
            return;
        }
        if rule.manual_only {
            debug!(
                "SkipHandler: {}: segment {} is manual-skip, ignoring",
                self.media_id, segment.category
            );
            return;
        }
        if self.jump_past(&segment, env) {
            self.schedule_skip(env);
        }
    }

    /// Skip whatever segment contains the current position, regardless of
    /// policy. This is the user-triggered skip for manual-only categories.
    pub fn skip_manual(&mut self, env: &mut HandlerEnv<'_>) -> Option<Segment> {
        if self.lifecycle != Lifecycle::Active || !self.surface_attached {
            return None;
        }
        let now = env.surfaces.surface()?.current_time();
        let idx = self.segments.position_containing(now)?;
        let segment = self.segments.get(idx)?.clone();
        info!(
            "SkipHandler: {}: manual skip of {} at {:.1}s",
            self.media_id, segment.category, now
        );
        if self.jump_past(&segment, env) {
            self.schedule_skip(env);
        }
        Some(segment)
    }

    /// Seek past `segment` and notify. Returns false when the host did not
    /// land beyond the segment (clamped or refused seek).
    fn jump_past(&mut self, segment: &Segment, env: &mut HandlerEnv<'_>) -> bool {
        let Some(surface) = env.surfaces.surface() else {
            return false;
        };
        info!(
            "SkipHandler: {}: skipping {} [{:.1}s, {:.1}s]",
            self.media_id, segment.category, segment.start, segment.end
        );
        surface.set_current_time(segment.end + SKIP_OFFSET);
        let landed = surface.current_time();

        env.notifier.show_toast(
            TOAST_TITLE,
            &format!("Skipping {}", segment.category.display_name()),
        );
        landed >= segment.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::overlay::OverlayStrip;
    use crate::segments::Category;
    use crate::surface::MediaSurface;
    use crate::timer::ManualTimers;

    struct NoSurface;

    impl MediaSurfaceProvider for NoSurface {
        fn surface(&mut self) -> Option<&mut dyn MediaSurface> {
            None
        }
    }

    struct NoHost;

    impl OverlayHost for NoHost {
        fn container_present(&self) -> bool {
            false
        }
        fn contains_overlay(&self) -> bool {
            false
        }
        fn render(&mut self, _strip: &OverlayStrip) {}
        fn remove(&mut self) {}
        fn host_focused(&self) -> bool {
            true
        }
    }

    struct Silent;

    impl Notifier for Silent {
        fn show_toast(&mut self, _title: &str, _message: &str) {}
    }

    #[test]
    fn test_lifecycle_transitions_once() {
        let config = ConfigStore::in_memory(Config::default());
        let mut timers = ManualTimers::new();
        let mut env = HandlerEnv {
            surfaces: &mut NoSurface,
            overlay_host: &mut NoHost,
            timers: &mut timers,
            notifier: &mut Silent,
            config: &config,
        };

        let mut handler = SkipHandler::new("abc");
        assert_eq!(handler.lifecycle(), Lifecycle::Idle);
        assert!(handler.begin_loading());
        assert!(!handler.begin_loading());

        let set = SegmentSet::new(vec![Segment::new(Category::Sponsor, 1.0, 2.0)]);
        handler.finish_loading(set.clone(), &mut env);
        assert_eq!(handler.lifecycle(), Lifecycle::Active);

        // surface absent: probing
        assert!(!handler.is_surface_attached());
        handler.finish_loading(SegmentSet::default(), &mut env);
        assert_eq!(handler.segments().len(), 1);

        handler.destroy(&mut env);
        assert_eq!(handler.lifecycle(), Lifecycle::Destroyed);
        assert!(!handler.begin_loading());
        drop(env);
        assert_eq!(timers.armed_count(), 0);
    }
}
