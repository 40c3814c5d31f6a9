//! Tracks the current media item and owns at most one live [`SkipHandler`].

use tracing::{debug, info};

use crate::config::{ConfigChange, ConfigKey, ConfigValue};
use crate::handler::{HandlerEnv, SkipHandler};
use crate::segments::{Category, SegmentSet};
use crate::surface::MediaEvent;
use crate::timer::TimerId;

/// A segment fetch the host should start for a freshly created handler.
///
/// The result goes back through [`Navigator::deliver_segments`] with the same
/// `generation`; results for older generations are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub generation: u64,
    pub media_id: String,
    pub categories: Vec<Category>,
}

#[derive(Default)]
pub struct Navigator {
    current: Option<SkipHandler>,
    generation: u64,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&SkipHandler> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut SkipHandler> {
        self.current.as_mut()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The host navigated. A missing id or the id already being handled is a
    /// no-op; anything else replaces the live handler.
    pub fn navigate(
        &mut self,
        media_id: Option<&str>,
        env: &mut HandlerEnv<'_>,
    ) -> Option<LoadRequest> {
        let media_id = media_id.filter(|id| !id.is_empty())?;
        if self.current.as_ref().is_some_and(|h| h.media_id() == media_id) {
            debug!("Navigator: already handling {media_id}");
            return None;
        }

        self.destroy_current(env);
        if !env.config.snapshot().sponsorblock.enabled {
            info!("Navigator: skipping disabled, not handling {media_id}");
            return None;
        }
        Some(self.create(media_id, env))
    }

    /// Unconditionally start a handler for `media_id`, destroying any previous
    /// one first.
    pub fn create(&mut self, media_id: &str, env: &mut HandlerEnv<'_>) -> LoadRequest {
        self.destroy_current(env);
        self.generation += 1;

        let mut handler = SkipHandler::new(media_id);
        handler.begin_loading();
        self.current = Some(handler);
        info!("Navigator: handling {media_id} (generation {})", self.generation);

        LoadRequest {
            generation: self.generation,
            media_id: media_id.to_string(),
            categories: Category::ALL.to_vec(),
        }
    }

    /// Destroy and drop the live handler, if any.
    pub fn destroy_current(&mut self, env: &mut HandlerEnv<'_>) {
        if let Some(mut handler) = self.current.take() {
            handler.destroy(env);
        }
    }

    /// Hand fetched segments to the handler that asked for them. Returns false
    /// when the result is stale.
    pub fn deliver_segments(
        &mut self,
        generation: u64,
        segments: SegmentSet,
        env: &mut HandlerEnv<'_>,
    ) -> bool {
        if generation != self.generation {
            debug!(
                "Navigator: dropping segments for generation {generation} (current {})",
                self.generation
            );
            return false;
        }
        match self.current.as_mut() {
            Some(handler) => {
                handler.finish_loading(segments, env);
                true
            }
            None => false,
        }
    }

    pub fn on_timer(&mut self, id: TimerId, env: &mut HandlerEnv<'_>) -> bool {
        self.current
            .as_mut()
            .is_some_and(|h| h.on_timer(id, env))
    }

    pub fn on_media_event(&mut self, event: MediaEvent, env: &mut HandlerEnv<'_>) {
        if let Some(handler) = self.current.as_mut() {
            handler.on_media_event(event, env);
        }
    }

    pub fn on_overlay_host_changed(&mut self, env: &mut HandlerEnv<'_>) {
        if let Some(handler) = self.current.as_mut() {
            handler.on_overlay_host_changed(env);
        }
    }

    /// Apply a settings change. Turning the master switch off tears the live
    /// handler down; turning it back on takes effect at the next navigation.
    pub fn on_config_change(&mut self, change: &ConfigChange, env: &mut HandlerEnv<'_>) {
        match (&change.key, &change.value) {
            (ConfigKey::Enabled, ConfigValue::Bool(false)) => {
                info!("Navigator: skipping disabled");
                self.destroy_current(env);
            }
            (ConfigKey::Enabled, _) => {}
            _ => {
                if let Some(handler) = self.current.as_mut() {
                    handler.on_policy_changed(env);
                }
            }
        }
    }
}
