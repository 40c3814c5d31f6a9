#![allow(dead_code)]

use std::time::Duration;

use segskip_core::config::{Config, ConfigStore};
use segskip_core::handler::{HandlerEnv, SkipHandler};
use segskip_core::overlay::{OverlayHost, OverlayStrip};
use segskip_core::segments::{Category, Segment, SegmentSet};
use segskip_core::surface::{MediaEvent, MediaSurface, MediaSurfaceProvider, Notifier};
use segskip_core::timer::ManualTimers;

/// Interval between simulated `timeupdate` events.
pub const TICK: f64 = 0.25;

#[derive(Debug, Default)]
pub struct FakeSurface {
    pub present: bool,
    pub time: f64,
    pub paused: bool,
    pub duration: Option<f64>,
    pub subscribed: bool,
    /// Every requested seek target, in order.
    pub seeks: Vec<f64>,
    /// Seeks beyond this position land here instead.
    pub clamp_to: Option<f64>,
}

impl MediaSurface for FakeSurface {
    fn current_time(&self) -> f64 {
        self.time
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.seeks.push(seconds);
        self.time = self.clamp_to.map_or(seconds, |max| seconds.min(max));
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn paused(&self) -> bool {
        self.paused
    }

    fn subscribe(&mut self) {
        self.subscribed = true;
    }

    fn unsubscribe(&mut self) {
        self.subscribed = false;
    }
}

impl MediaSurfaceProvider for FakeSurface {
    fn surface(&mut self) -> Option<&mut dyn MediaSurface> {
        if self.present {
            Some(self as &mut dyn MediaSurface)
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeOverlayHost {
    pub container: bool,
    pub focused: bool,
    pub shown: Option<OverlayStrip>,
    pub renders: usize,
    pub removes: usize,
}

impl OverlayHost for FakeOverlayHost {
    fn container_present(&self) -> bool {
        self.container
    }

    fn contains_overlay(&self) -> bool {
        self.shown.is_some()
    }

    fn render(&mut self, strip: &OverlayStrip) {
        self.shown = Some(strip.clone());
        self.renders += 1;
    }

    fn remove(&mut self) {
        self.shown = None;
        self.removes += 1;
    }

    fn host_focused(&self) -> bool {
        self.focused
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub toasts: Vec<(String, String)>,
}

impl Notifier for RecordingNotifier {
    fn show_toast(&mut self, title: &str, message: &str) {
        self.toasts.push((title.to_string(), message.to_string()));
    }
}

/// A playing 100 s video with a visible progress bar and default settings.
pub struct Harness {
    pub surface: FakeSurface,
    pub host: FakeOverlayHost,
    pub timers: ManualTimers,
    pub notifier: RecordingNotifier,
    pub config: ConfigStore,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            surface: FakeSurface {
                present: true,
                duration: Some(100.0),
                ..FakeSurface::default()
            },
            host: FakeOverlayHost {
                container: true,
                focused: true,
                ..FakeOverlayHost::default()
            },
            timers: ManualTimers::new(),
            notifier: RecordingNotifier::default(),
            config: ConfigStore::in_memory(Config::default()),
        }
    }

    pub fn env(&mut self) -> HandlerEnv<'_> {
        HandlerEnv {
            surfaces: &mut self.surface,
            overlay_host: &mut self.host,
            timers: &mut self.timers,
            notifier: &mut self.notifier,
            config: &self.config,
        }
    }

    /// A handler that has finished loading `segments`.
    pub fn active_handler(&mut self, segments: Vec<Segment>) -> SkipHandler {
        let mut handler = SkipHandler::new("dQw4w9WgXcQ");
        handler.begin_loading();
        handler.finish_loading(SegmentSet::new(segments), &mut self.env());
        handler
    }

    /// Fire timers due within the next `seconds`, moving the playback clock
    /// along with the timer clock. No `timeupdate` events are delivered.
    pub fn run_timers(&mut self, handler: &mut SkipHandler, seconds: f64) {
        let limit = self.timers.now() + Duration::from_secs_f64(seconds);
        loop {
            let before = self.timers.now();
            let due = self.timers.fire_next(limit);
            if due.is_empty() {
                break;
            }
            self.move_clock(before);
            for id in due {
                handler.on_timer(id, &mut self.env());
            }
        }
        let before = self.timers.now();
        let late = self.timers.advance(limit.saturating_sub(before));
        self.move_clock(before);
        for id in late {
            handler.on_timer(id, &mut self.env());
        }
    }

    /// Play for `seconds`, delivering a `timeupdate` every [`TICK`].
    pub fn play(&mut self, handler: &mut SkipHandler, seconds: f64) {
        let ticks = (seconds / TICK).round() as usize;
        for _ in 0..ticks {
            self.run_timers(handler, TICK);
            handler.on_media_event(MediaEvent::TimeUpdate, &mut self.env());
        }
    }

    fn move_clock(&mut self, since: Duration) {
        if !self.surface.paused {
            self.surface.time += (self.timers.now() - since).as_secs_f64();
        }
    }
}

pub fn seg(category: Category, start: f64, end: f64) -> Segment {
    Segment::new(category, start, end)
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}
