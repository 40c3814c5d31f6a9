/// DaemonCore: single-owner event loop for all mutable state.
///
/// Every input (mpv property changes, timer expiries, fetched segments, config
/// edits, API requests) arrives as a `DaemonEvent` on one channel. DaemonCore
/// owns the mpv driver, the host adapters and the `Navigator` exclusively, so
/// the engine's synchronous calls never race with each other.
///
/// mpv integration is property-observation-driven: on every fresh connection
/// we observe path, pause, time-pos, duration, osd-dimensions and focused.
/// The 10-second heartbeat only checks liveness and reconnects.
use std::sync::Arc;

use segskip_core::config::{ConfigChange, ConfigStore};
use segskip_core::handler::{HandlerEnv, HandlerStatus};
use segskip_core::navigator::{LoadRequest, Navigator};
use segskip_core::repository::SegmentRepository;
use segskip_core::segments::{Segment, SegmentSet};
use segskip_core::surface::MediaEvent;
use segskip_core::timer::TimerId;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::host::{MpvNotifier, MpvOverlay, MpvSurface, TokioTimers};
use crate::media_id::extract_media_id;
use crate::mpv::{
    MpvDriver, MpvEvent, MpvHandle, OBS_DURATION, OBS_FOCUSED, OBS_OSD_DIMENSIONS, OBS_PATH,
    OBS_PAUSE, OBS_TIME_POS,
};

// ── DaemonEvent ───────────────────────────────────────────────────────────────

/// All inputs into the DaemonCore loop.
pub enum DaemonEvent {
    /// Raw mpv unsolicited event (forwarded from reader task).
    Mpv(MpvEvent),
    /// A timer armed through `TokioTimers` expired.
    Timer(TimerId),
    /// A segment fetch finished.
    SegmentsLoaded { generation: u64, segments: SegmentSet },
    /// A runtime configuration edit.
    Config(ConfigChange),
    /// A request from the HTTP API.
    Api(ApiRequest),
    /// Heartbeat: check liveness.
    HeartbeatTick,
    Shutdown,
}

pub enum ApiRequest {
    Status(oneshot::Sender<CoreStatus>),
    Skip(oneshot::Sender<Option<Segment>>),
    Open {
        url: String,
        reply: oneshot::Sender<anyhow::Result<()>>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct CoreStatus {
    pub mpv_connected: bool,
    pub path: Option<String>,
    pub time_pos: Option<f64>,
    pub handler: Option<HandlerStatus>,
}

// ── host adapters ─────────────────────────────────────────────────────────────

/// The engine-facing side of mpv, kept apart from the navigator so both can
/// be borrowed at once.
struct Hosts {
    surface: MpvSurface,
    overlay: MpvOverlay,
    notifier: MpvNotifier,
    timers: TokioTimers,
}

impl Hosts {
    fn env<'a>(&'a mut self, config: &'a ConfigStore) -> HandlerEnv<'a> {
        HandlerEnv {
            surfaces: &mut self.surface,
            overlay_host: &mut self.overlay,
            timers: &mut self.timers,
            notifier: &mut self.notifier,
            config,
        }
    }

    fn set_handle(&mut self, handle: Option<MpvHandle>) {
        self.surface.set_handle(handle.clone());
        self.overlay.set_handle(handle.clone());
        self.notifier.set_handle(handle);
    }
}

// ── DaemonCore ────────────────────────────────────────────────────────────────

pub struct DaemonCore {
    config: Arc<ConfigStore>,
    repository: SegmentRepository,
    mpv_driver: MpvDriver,
    /// Live handle to the mpv IO tasks. `None` when mpv is not connected.
    mpv_handle: Option<MpvHandle>,
    hosts: Hosts,
    navigator: Navigator,
    /// Channel back into our own event loop.
    event_tx: mpsc::Sender<DaemonEvent>,
    fetch_task: Option<AbortHandle>,
    /// Last observed mpv `path`.
    path: Option<String>,
    /// URL to load once mpv is up.
    initial_url: Option<String>,
    /// mpv announced it is quitting.
    mpv_quit: bool,
}

impl DaemonCore {
    pub fn new(
        config: Arc<ConfigStore>,
        event_tx: mpsc::Sender<DaemonEvent>,
        initial_url: Option<String>,
    ) -> Self {
        let snapshot = config.snapshot();
        Self {
            repository: SegmentRepository::from_config(&snapshot.sponsorblock),
            mpv_driver: MpvDriver::new(snapshot.mpv.binary, snapshot.mpv.extra_args),
            mpv_handle: None,
            hosts: Hosts {
                surface: MpvSurface::default(),
                overlay: MpvOverlay::default(),
                notifier: MpvNotifier::default(),
                timers: TokioTimers::new(event_tx.clone()),
            },
            navigator: Navigator::new(),
            event_tx,
            fetch_task: None,
            path: None,
            initial_url,
            mpv_quit: false,
            config,
        }
    }

    /// Run the core event loop. Returns on `Shutdown`, when mpv quits, or
    /// when the event channel closes.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<DaemonEvent>) -> anyhow::Result<()> {
        info!("DaemonCore: starting event loop");

        let heartbeat_tx = self.event_tx.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(tokio::time::Duration::from_secs(10)).await;
                if heartbeat_tx.send(DaemonEvent::HeartbeatTick).await.is_err() {
                    break;
                }
            }
        });

        if self.ensure_mpv_handle().await.is_none() {
            anyhow::bail!("could not start mpv");
        }
        if let Some(url) = self.initial_url.take() {
            if let Err(e) = self.open_url(&url).await {
                error!("DaemonCore: failed to open {}: {}", url, e);
            }
        }

        while !self.mpv_quit {
            match event_rx.recv().await {
                None => {
                    info!("DaemonCore: event channel closed, shutting down");
                    break;
                }
                Some(DaemonEvent::Shutdown) => {
                    info!("DaemonCore: shutdown requested");
                    break;
                }
                Some(DaemonEvent::Mpv(evt)) => self.handle_mpv_event(evt),
                Some(DaemonEvent::Timer(id)) => {
                    if self.hosts.timers.fired(id) {
                        let env = &mut self.hosts.env(&self.config);
                        self.navigator.on_timer(id, env);
                    }
                }
                Some(DaemonEvent::SegmentsLoaded {
                    generation,
                    segments,
                }) => {
                    if generation == self.navigator.generation() {
                        self.fetch_task = None;
                    }
                    let env = &mut self.hosts.env(&self.config);
                    self.navigator.deliver_segments(generation, segments, env);
                }
                Some(DaemonEvent::Config(change)) => {
                    debug!("DaemonCore: config change {:?}", change);
                    let env = &mut self.hosts.env(&self.config);
                    self.navigator.on_config_change(&change, env);
                }
                Some(DaemonEvent::Api(req)) => self.handle_api(req).await,
                Some(DaemonEvent::HeartbeatTick) => self.heartbeat().await,
            }
        }

        self.cleanup().await;
        Ok(())
    }

    // ── mpv event handler ─────────────────────────────────────────────────────

    fn handle_mpv_event(&mut self, evt: MpvEvent) {
        let Some((obs_id, data)) = evt.as_property_change() else {
            match evt.event_name() {
                Some("playback-restart") => self.hosts.surface.seek_settled(),
                Some("shutdown") => {
                    info!("DaemonCore: mpv is quitting");
                    self.mpv_quit = true;
                }
                _ => {}
            }
            return;
        };

        match obs_id {
            OBS_PATH => self.on_path_changed(data.as_str().map(str::to_string)),
            OBS_PAUSE => {
                let paused = data.as_bool().unwrap_or(false);
                self.hosts.surface.observe_pause(paused);
                self.media_event(if paused {
                    MediaEvent::Pause
                } else {
                    MediaEvent::Play
                });
            }
            OBS_TIME_POS => {
                if self.hosts.surface.observe_time_pos(data.as_f64()) {
                    self.media_event(MediaEvent::TimeUpdate);
                }
            }
            OBS_DURATION => {
                self.hosts.surface.observe_duration(data.as_f64());
                self.media_event(MediaEvent::DurationChange);
            }
            OBS_OSD_DIMENSIONS => {
                let dim = |key: &str| data.get(key).and_then(|v| v.as_u64()).unwrap_or(0) as u32;
                if self.hosts.overlay.observe_osd_dimensions(dim("w"), dim("h")) {
                    self.overlay_host_changed();
                }
            }
            OBS_FOCUSED => {
                if self
                    .hosts
                    .overlay
                    .observe_focused(data.as_bool().unwrap_or(true))
                {
                    self.overlay_host_changed();
                }
            }
            _ => {}
        }
    }

    fn media_event(&mut self, event: MediaEvent) {
        if !self.hosts.surface.is_subscribed() {
            return;
        }
        let env = &mut self.hosts.env(&self.config);
        self.navigator.on_media_event(event, env);
    }

    fn overlay_host_changed(&mut self) {
        let env = &mut self.hosts.env(&self.config);
        self.navigator.on_overlay_host_changed(env);
    }

    fn on_path_changed(&mut self, path: Option<String>) {
        if self.path == path {
            return;
        }
        self.path = path;

        let media_id = self.path.as_deref().and_then(extract_media_id);
        let Some(media_id) = media_id else {
            if let Some(path) = &self.path {
                debug!("DaemonCore: no video id in {}", path);
            }
            self.abort_fetch();
            let env = &mut self.hosts.env(&self.config);
            self.navigator.destroy_current(env);
            return;
        };

        if self
            .navigator
            .current()
            .is_some_and(|h| h.media_id() == media_id)
        {
            return;
        }
        info!("DaemonCore: now playing {}", media_id);
        // drop the previous file's position before the new handler probes
        self.hosts.surface.reset_media();

        let env = &mut self.hosts.env(&self.config);
        match self.navigator.navigate(Some(media_id.as_str()), env) {
            Some(req) => self.start_fetch(req),
            None => self.abort_fetch(),
        }
    }

    fn start_fetch(&mut self, req: LoadRequest) {
        self.abort_fetch();
        let repository = self.repository.clone();
        let tx = self.event_tx.clone();
        let task = tokio::spawn(async move {
            let segments = repository
                .fetch_segments(&req.media_id, &req.categories)
                .await;
            let _ = tx
                .send(DaemonEvent::SegmentsLoaded {
                    generation: req.generation,
                    segments,
                })
                .await;
        });
        self.fetch_task = Some(task.abort_handle());
    }

    fn abort_fetch(&mut self) {
        if let Some(task) = self.fetch_task.take() {
            task.abort();
        }
    }

    // ── API requests ──────────────────────────────────────────────────────────

    async fn handle_api(&mut self, req: ApiRequest) {
        match req {
            ApiRequest::Status(reply) => {
                let _ = reply.send(self.status());
            }
            ApiRequest::Skip(reply) => {
                let env = &mut self.hosts.env(&self.config);
                let skipped = self
                    .navigator
                    .current_mut()
                    .and_then(|handler| handler.skip_manual(env));
                let _ = reply.send(skipped);
            }
            ApiRequest::Open { url, reply } => {
                let result = self.open_url(&url).await;
                let _ = reply.send(result);
            }
        }
    }

    fn status(&self) -> CoreStatus {
        CoreStatus {
            mpv_connected: self.mpv_handle.is_some(),
            path: self.path.clone(),
            time_pos: self.hosts.surface.time_pos(),
            handler: self.navigator.current().map(|h| h.status()),
        }
    }

    async fn open_url(&mut self, url: &str) -> anyhow::Result<()> {
        let handle = self
            .ensure_mpv_handle()
            .await
            .ok_or_else(|| anyhow::anyhow!("mpv is not running"))?;
        info!("DaemonCore: loading {}", url);
        handle.load_url(url).await
    }

    // ── mpv handle management ─────────────────────────────────────────────────

    async fn ensure_mpv_handle(&mut self) -> Option<MpvHandle> {
        if self.mpv_handle.is_none() {
            // one forwarder per connection; it ends when the reader task does
            let (event_tx, mut event_rx) = mpsc::channel::<MpvEvent>(256);
            let core_tx = self.event_tx.clone();
            tokio::spawn(async move {
                while let Some(evt) = event_rx.recv().await {
                    if core_tx.send(DaemonEvent::Mpv(evt)).await.is_err() {
                        break;
                    }
                }
            });

            let handle = match self.mpv_driver.try_reconnect(event_tx.clone()).await {
                Some(h) => h,
                None => match self.mpv_driver.spawn_and_connect(event_tx).await {
                    Ok(h) => h,
                    Err(e) => {
                        warn!("DaemonCore: failed to start mpv: {}", e);
                        return None;
                    }
                },
            };

            self.hosts.set_handle(Some(handle.clone()));
            let observer = handle.clone();
            tokio::spawn(async move {
                observer.observe_all_properties().await;
            });
            self.mpv_handle = Some(handle);
        }

        self.mpv_handle.clone()
    }

    fn drop_mpv_handle(&mut self) {
        self.mpv_handle = None;
        self.hosts.set_handle(None);
        self.path = None;
        self.abort_fetch();
        let env = &mut self.hosts.env(&self.config);
        self.navigator.destroy_current(env);
    }

    async fn heartbeat(&mut self) {
        if let Some(handle) = self.mpv_handle.clone() {
            if let Err(e) = handle.ping().await {
                warn!("DaemonCore: heartbeat: mpv unresponsive ({}), reconnecting", e);
                self.drop_mpv_handle();
            }
        }
        if self.mpv_handle.is_none() {
            self.ensure_mpv_handle().await;
        }
    }

    async fn cleanup(&mut self) {
        info!("DaemonCore: cleanup");
        self.abort_fetch();
        let env = &mut self.hosts.env(&self.config);
        self.navigator.destroy_current(env);
        self.hosts.timers.cancel_all();
        self.mpv_handle = None;
        self.mpv_driver.kill().await;
    }
}

/// Forward config edits into the core loop.
pub fn spawn_config_forwarder(config: &ConfigStore, tx: mpsc::Sender<DaemonEvent>) {
    let mut rx = config.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(change) => {
                    if tx.send(DaemonEvent::Config(change)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("DaemonCore: dropped {} config changes", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
