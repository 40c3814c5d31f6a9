//! Capabilities the host player provides to the engine.

/// Playback notifications the handler reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    Play,
    Pause,
    TimeUpdate,
    DurationChange,
}

/// The playing media element.
pub trait MediaSurface {
    /// Playback position in seconds.
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, seconds: f64);
    /// `None` until the host knows it.
    fn duration(&self) -> Option<f64>;
    fn paused(&self) -> bool;
    /// Start delivering [`MediaEvent`]s for this surface.
    fn subscribe(&mut self);
    fn unsubscribe(&mut self);
}

/// Hands out the media surface once the host has one.
///
/// Returning `None` is normal while the host is still building its player;
/// callers retry on their own schedule.
pub trait MediaSurfaceProvider {
    fn surface(&mut self) -> Option<&mut dyn MediaSurface>;
}

/// Fire-and-forget user notifications.
pub trait Notifier {
    fn show_toast(&mut self, title: &str, message: &str);
}
