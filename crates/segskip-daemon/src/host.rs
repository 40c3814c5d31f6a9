//! mpv-backed implementations of the engine's host capabilities.
//!
//! Every type here is a cache of observed mpv properties plus a handle for
//! fire-and-forget commands. They live side by side in `DaemonCore` so a
//! `HandlerEnv` can borrow each one independently.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::Duration;

use segskip_core::overlay::{OverlayHost, OverlayStrip};
use segskip_core::surface::{MediaSurface, MediaSurfaceProvider, Notifier};
use segskip_core::timer::{TimerId, Timers};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info};

use crate::core::DaemonEvent;
use crate::mpv::MpvHandle;

/// time-pos reports this far behind a seek target are pre-seek leftovers.
const STALE_SEEK_TOLERANCE: f64 = 0.5;

// ── media surface ─────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MpvSurface {
    handle: Option<MpvHandle>,
    time_pos: Option<f64>,
    paused: bool,
    duration: Option<f64>,
    subscribed: bool,
    seek_target: Option<f64>,
}

impl MpvSurface {
    pub fn set_handle(&mut self, handle: Option<MpvHandle>) {
        self.handle = handle;
        self.time_pos = None;
        self.duration = None;
        self.seek_target = None;
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Record an observed `time-pos`. Returns false when the value was
    /// dropped as a leftover from before our last seek.
    pub fn observe_time_pos(&mut self, pos: Option<f64>) -> bool {
        if let (Some(target), Some(p)) = (self.seek_target, pos) {
            if p + STALE_SEEK_TOLERANCE < target {
                return false;
            }
            self.seek_target = None;
        }
        self.time_pos = pos;
        true
    }

    pub fn observe_pause(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn observe_duration(&mut self, duration: Option<f64>) {
        self.duration = duration;
    }

    /// mpv finished a seek; whatever it reports next is authoritative.
    pub fn seek_settled(&mut self) {
        self.seek_target = None;
    }

    /// A new file is loading: forget everything about the previous one.
    pub fn reset_media(&mut self) {
        self.time_pos = None;
        self.duration = None;
        self.seek_target = None;
    }

    pub fn time_pos(&self) -> Option<f64> {
        self.time_pos
    }
}

impl MediaSurface for MpvSurface {
    fn current_time(&self) -> f64 {
        self.time_pos.unwrap_or(0.0)
    }

    fn set_current_time(&mut self, seconds: f64) {
        if let Some(handle) = &self.handle {
            handle.seek_to(seconds);
        }
        self.time_pos = Some(seconds);
        self.seek_target = Some(seconds);
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

impl MediaSurfaceProvider for MpvSurface {
    /// Available once mpv is connected and reports a playback position.
    fn surface(&mut self) -> Option<&mut dyn MediaSurface> {
        if self.handle.is_some() && self.time_pos.is_some() {
            Some(self as &mut dyn MediaSurface)
        } else {
            None
        }
    }
}

// ── overlay host ──────────────────────────────────────────────────────────────

/// osd-overlay slot used for the marker strip.
pub const OVERLAY_ID: u64 = 1;

#[derive(Default)]
pub struct MpvOverlay {
    handle: Option<MpvHandle>,
    osd: Option<(u32, u32)>,
    focused: bool,
    shown: bool,
}

impl MpvOverlay {
    /// A fresh connection starts with an empty OSD.
    pub fn set_handle(&mut self, handle: Option<MpvHandle>) {
        self.handle = handle;
        self.shown = false;
    }

    /// Returns true when the size changed; mpv drops overlays on resize.
    pub fn observe_osd_dimensions(&mut self, width: u32, height: u32) -> bool {
        let dims = Some((width, height)).filter(|(w, h)| *w > 0 && *h > 0);
        if dims == self.osd {
            return false;
        }
        self.osd = dims;
        self.shown = false;
        true
    }

    /// Returns true when the focus state changed.
    pub fn observe_focused(&mut self, focused: bool) -> bool {
        let changed = self.focused != focused;
        self.focused = focused;
        changed
    }
}

impl OverlayHost for MpvOverlay {
    fn container_present(&self) -> bool {
        self.handle.is_some() && self.osd.is_some()
    }

    fn contains_overlay(&self) -> bool {
        self.shown
    }

    fn render(&mut self, strip: &OverlayStrip) {
        let (Some(handle), Some((width, height))) = (&self.handle, self.osd) else {
            return;
        };
        let ass = render_ass(strip, width, height);
        debug!("Overlay: drawing {} markers at {}x{}", strip.markers.len(), width, height);
        handle.set_osd_overlay(OVERLAY_ID, &ass, width, height);
        self.shown = true;
    }

    fn remove(&mut self) {
        if let Some(handle) = &self.handle {
            handle.remove_osd_overlay(OVERLAY_ID);
        }
        self.shown = false;
    }

    fn host_focused(&self) -> bool {
        self.focused
    }
}

/// Draw each marker as a filled rectangle along the bottom edge of a
/// `width`×`height` OSD. Unfocused strips are drawn at half opacity.
pub fn render_ass(strip: &OverlayStrip, width: u32, height: u32) -> String {
    let bar = (f64::from(height) * 0.012).round().max(4.0);
    let y1 = f64::from(height);
    let y0 = y1 - bar;
    let factor = if strip.focused { 1.0 } else { 0.5 };

    let mut out = String::new();
    for marker in &strip.markers {
        let x0 = (marker.offset * f64::from(width)).round();
        let x1 = ((marker.offset + marker.width) * f64::from(width))
            .round()
            .max(x0 + 1.0);
        let opacity = f64::from(marker.opacity) * factor;
        let alpha = ((1.0 - opacity.clamp(0.0, 1.0)) * 255.0).round() as u8;
        let _ = writeln!(
            out,
            "{{\\an7\\pos(0,0)\\bord0\\shad0\\1c&H{}&\\1a&H{:02X}&\\p1}}m {x0} {y0} l {x1} {y0} {x1} {y1} {x0} {y1}{{\\p0}}",
            ass_color(marker.color),
            alpha,
        );
    }
    out
}

/// `#rrggbb` → ASS `BBGGRR`. Anything unparseable draws white.
fn ass_color(hex: &str) -> String {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return "FFFFFF".to_string();
    }
    format!("{}{}{}", &hex[4..6], &hex[2..4], &hex[0..2]).to_ascii_uppercase()
}

// ── notifications ─────────────────────────────────────────────────────────────

const TOAST_MS: u64 = 2000;

#[derive(Default)]
pub struct MpvNotifier {
    handle: Option<MpvHandle>,
}

impl MpvNotifier {
    pub fn set_handle(&mut self, handle: Option<MpvHandle>) {
        self.handle = handle;
    }
}

impl Notifier for MpvNotifier {
    fn show_toast(&mut self, title: &str, message: &str) {
        info!("Notify: {}: {}", title, message);
        if let Some(handle) = &self.handle {
            handle.show_text(&format!("{title}: {message}"), TOAST_MS);
        }
    }
}

// ── timers ────────────────────────────────────────────────────────────────────

/// One sleeping task per armed timer; expiry arrives as `DaemonEvent::Timer`.
pub struct TokioTimers {
    tx: mpsc::Sender<DaemonEvent>,
    next_id: u64,
    tasks: HashMap<TimerId, AbortHandle>,
}

impl TokioTimers {
    pub fn new(tx: mpsc::Sender<DaemonEvent>) -> Self {
        Self {
            tx,
            next_id: 0,
            tasks: HashMap::new(),
        }
    }

    /// Claim a fired timer. False means it was cancelled after its task had
    /// already queued the event, and the event must be ignored.
    pub fn fired(&mut self, id: TimerId) -> bool {
        self.tasks.remove(&id).is_some()
    }

    pub fn cancel_all(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

impl Timers for TokioTimers {
    fn arm(&mut self, delay: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(DaemonEvent::Timer(id)).await;
        });
        self.tasks.insert(id, task.abort_handle());
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(task) = self.tasks.remove(&id) {
            task.abort();
        }
    }
}
