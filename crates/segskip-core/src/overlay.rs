//! Segment marker strip drawn over the host's progress bar.
//!
//! The host may tear its progress-bar container down and rebuild it at any
//! time. The renderer keeps its own copy of the strip so it can put it back
//! whenever the host reports a change, and it copies the host's
//! focus/highlight state onto the strip.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::segments::{Category, Segment, SegmentSet};
use crate::timer::{TimerId, TimerSlot, Timers};

/// How often to look for the host container before it first appears.
pub const HOST_PROBE_INTERVAL: Duration = Duration::from_millis(500);

/// One marker, positioned as fractions of the strip width.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub category: Category,
    /// Left edge, `start / duration`.
    pub offset: f64,
    /// Width, `(end - start) / duration`.
    pub width: f64,
    pub color: &'static str,
    pub opacity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayStrip {
    pub markers: Vec<Marker>,
    pub focused: bool,
}

/// The host surface that carries the strip.
pub trait OverlayHost {
    /// Whether the host's progress-bar container exists right now.
    fn container_present(&self) -> bool;
    /// Whether the strip is currently inside the container.
    fn contains_overlay(&self) -> bool;
    /// Insert the strip, replacing any earlier rendering of it.
    fn render(&mut self, strip: &OverlayStrip);
    fn remove(&mut self);
    /// The host's own progress-bar focus/highlight state.
    fn host_focused(&self) -> bool;
}

/// Lay out one marker per segment over a strip representing `duration` seconds.
pub fn layout_markers(segments: &[Segment], duration: f64) -> Vec<Marker> {
    segments
        .iter()
        .map(|segment| {
            let style = segment.category.bar_style();
            let offset = (segment.start / duration).clamp(0.0, 1.0);
            let width = (segment.duration() / duration).clamp(0.0, 1.0 - offset);
            Marker {
                category: segment.category,
                offset,
                width,
                color: style.color,
                opacity: style.opacity,
            }
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct OverlayRenderer {
    strip: Option<OverlayStrip>,
    /// True once the strip has been handed to a present container.
    observing: bool,
    host_probe: TimerSlot,
}

impl OverlayRenderer {
    pub fn strip(&self) -> Option<&OverlayStrip> {
        self.strip.as_ref()
    }

    pub fn is_built(&self) -> bool {
        self.strip.is_some()
    }

    pub fn is_attached(&self) -> bool {
        self.observing
    }

    /// Build the strip once. Returns false when it already exists, when there
    /// is nothing to draw, or when the duration is not known yet (the caller
    /// retries on the next duration change).
    pub fn build(
        &mut self,
        segments: &SegmentSet,
        duration: Option<f64>,
        host: &mut dyn OverlayHost,
        timers: &mut dyn Timers,
    ) -> bool {
        if self.strip.is_some() {
            debug!("Overlay: already built");
            return false;
        }
        if segments.is_empty() {
            return false;
        }
        let Some(duration) = duration.filter(|d| d.is_finite() && *d > 0.0) else {
            debug!("Overlay: no media duration yet");
            return false;
        };

        let markers = layout_markers(segments.as_slice(), duration);
        debug!(
            "Overlay: built {} markers over {:.1}s",
            markers.len(),
            duration
        );
        self.strip = Some(OverlayStrip {
            markers,
            focused: host.host_focused(),
        });
        self.try_attach(host, timers);
        true
    }

    fn try_attach(&mut self, host: &mut dyn OverlayHost, timers: &mut dyn Timers) {
        let Some(strip) = self.strip.as_mut() else {
            return;
        };
        if host.container_present() {
            strip.focused = host.host_focused();
            host.render(strip);
            self.observing = true;
            self.host_probe.cancel(timers);
            debug!("Overlay: attached to host container");
        } else {
            self.host_probe.arm(timers, HOST_PROBE_INTERVAL);
        }
    }

    /// Handle a fired timer. Returns false if `id` is not the host probe.
    pub fn on_timer(
        &mut self,
        id: TimerId,
        host: &mut dyn OverlayHost,
        timers: &mut dyn Timers,
    ) -> bool {
        if !self.host_probe.take_if(id) {
            return false;
        }
        self.try_attach(host, timers);
        true
    }

    /// The host changed its container or focus state.
    pub fn on_host_changed(&mut self, host: &mut dyn OverlayHost) {
        if !self.observing {
            return;
        }
        let Some(strip) = self.strip.as_mut() else {
            return;
        };
        if !host.container_present() {
            return;
        }

        let focused = host.host_focused();
        if !host.contains_overlay() {
            info!("Overlay: re-attaching segment markers");
            strip.focused = focused;
            host.render(strip);
        } else if strip.focused != focused {
            strip.focused = focused;
            host.render(strip);
        }
    }

    pub fn teardown(&mut self, host: &mut dyn OverlayHost, timers: &mut dyn Timers) {
        self.host_probe.cancel(timers);
        if self.strip.take().is_some() && self.observing && host.contains_overlay() {
            host.remove();
        }
        self.observing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ManualTimers;

    #[derive(Default)]
    struct Host {
        present: bool,
        contains: bool,
        focused: bool,
        renders: Vec<OverlayStrip>,
    }

    impl OverlayHost for Host {
        fn container_present(&self) -> bool {
            self.present
        }
        fn contains_overlay(&self) -> bool {
            self.contains
        }
        fn render(&mut self, strip: &OverlayStrip) {
            self.contains = true;
            self.renders.push(strip.clone());
        }
        fn remove(&mut self) {
            self.contains = false;
        }
        fn host_focused(&self) -> bool {
            self.focused
        }
    }

    fn set() -> SegmentSet {
        SegmentSet::new(vec![
            Segment::new(Category::Sponsor, 10.0, 20.0),
            Segment::new(Category::Filler, 150.0, 250.0),
        ])
    }

    #[test]
    fn test_layout_is_proportional_and_clamped() {
        let markers = layout_markers(set().as_slice(), 200.0);
        assert_eq!(markers[0].offset, 0.05);
        assert_eq!(markers[0].width, 0.05);
        assert_eq!(markers[0].color, "#00d400");
        assert_eq!(markers[1].offset, 0.75);
        assert_eq!(markers[1].width, 0.25);
        assert_eq!(markers[1].opacity, 0.9);
    }

    #[test]
    fn test_build_is_idempotent_and_needs_duration() {
        let mut host = Host {
            present: true,
            ..Default::default()
        };
        let mut timers = ManualTimers::new();
        let mut overlay = OverlayRenderer::default();

        assert!(!overlay.build(&set(), None, &mut host, &mut timers));
        assert!(!overlay.is_built());
        assert!(overlay.build(&set(), Some(200.0), &mut host, &mut timers));
        assert!(!overlay.build(&set(), Some(200.0), &mut host, &mut timers));
        assert_eq!(host.renders.len(), 1);
    }

    #[test]
    fn test_probes_until_container_exists() {
        let mut host = Host::default();
        let mut timers = ManualTimers::new();
        let mut overlay = OverlayRenderer::default();

        assert!(overlay.build(&set(), Some(200.0), &mut host, &mut timers));
        assert!(!overlay.is_attached());
        let fired = timers.advance(HOST_PROBE_INTERVAL);
        assert_eq!(fired.len(), 1);
        assert!(overlay.on_timer(fired[0], &mut host, &mut timers));
        assert_eq!(timers.armed_count(), 1);

        host.present = true;
        let fired = timers.advance(HOST_PROBE_INTERVAL);
        assert!(overlay.on_timer(fired[0], &mut host, &mut timers));
        assert!(overlay.is_attached());
        assert_eq!(timers.armed_count(), 0);
    }

    #[test]
    fn test_reattaches_and_mirrors_focus() {
        let mut host = Host {
            present: true,
            focused: true,
            ..Default::default()
        };
        let mut timers = ManualTimers::new();
        let mut overlay = OverlayRenderer::default();
        overlay.build(&set(), Some(200.0), &mut host, &mut timers);

        host.contains = false;
        overlay.on_host_changed(&mut host);
        assert!(host.contains);
        assert_eq!(host.renders.len(), 2);

        host.focused = false;
        overlay.on_host_changed(&mut host);
        assert_eq!(host.renders.len(), 3);
        assert!(!host.renders[2].focused);

        // nothing changed, nothing re-rendered
        overlay.on_host_changed(&mut host);
        assert_eq!(host.renders.len(), 3);

        overlay.teardown(&mut host, &mut timers);
        assert!(!host.contains);
        assert!(!overlay.is_built());
    }
}
