/// mpv IPC driver with separated reader/writer tasks.
///
/// ```text
///   MpvDriver::spawn_and_connect()
///         │
///         ├── writer_task   ← receives PendingRequest via mpsc, serialises → socket
///         └── reader_task   ← reads JSON lines from socket
///                                ├── response (has request_id) → matched oneshot::Sender
///                                └── event / property-change   → event_tx channel
/// ```
///
/// `MpvHandle::send` awaits the reply. `MpvHandle::post` queues a command
/// without waiting, which keeps seeks and OSD updates in submission order
/// when issued from synchronous code.
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

// ── observation property IDs ──────────────────────────────────────────────────

pub const OBS_PATH: u64 = 1;
pub const OBS_PAUSE: u64 = 2;
pub const OBS_TIME_POS: u64 = 3;
pub const OBS_DURATION: u64 = 4;
pub const OBS_OSD_DIMENSIONS: u64 = 5;
pub const OBS_FOCUSED: u64 = 6;

const OBSERVED: [(u64, &str); 6] = [
    (OBS_PATH, "path"),
    (OBS_PAUSE, "pause"),
    (OBS_TIME_POS, "time-pos"),
    (OBS_DURATION, "duration"),
    (OBS_OSD_DIMENSIONS, "osd-dimensions"),
    (OBS_FOCUSED, "focused"),
];

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

struct PendingRequest {
    req_id: u64,
    payload: String, // serialised JSON line (already has '\n')
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// An mpv event / property-change that arrived unsolicited (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// Returns `Some((obs_id, data))` if this is a property-change event.
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.raw.get("event")?.as_str()? == "property-change" {
            let id = self.raw.get("id")?.as_u64()?;
            let data = self.raw.get("data").unwrap_or(&Value::Null);
            Some((id, data))
        } else {
            None
        }
    }

    /// Returns the event name, e.g. "end-file", "playback-restart", "shutdown".
    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }
}

// ── public handle ─────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    fn encode(command: Value) -> anyhow::Result<(u64, String)> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)?;
        raw.push('\n');
        Ok((req_id, raw))
    }

    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let (req_id, raw) = Self::encode(command)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(tokio::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    /// Queue a command and forget about the reply.
    pub fn post(&self, command: Value) {
        let (req_id, raw) = match Self::encode(command) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("mpv: failed to encode command: {}", e);
                return;
            }
        };
        let (reply_tx, _) = oneshot::channel();
        let req = PendingRequest {
            req_id,
            payload: raw,
            reply: reply_tx,
        };
        if let Err(e) = self.tx.try_send(req) {
            warn!("mpv: dropping command req={}: {}", req_id, e);
        }
    }

    /// Register observe_property for everything the core reacts to. Must be
    /// called after every fresh connection.
    pub async fn observe_all_properties(&self) {
        for (id, name) in OBSERVED {
            match self.send(json!(["observe_property", id, name])).await {
                Ok(_) => debug!("mpv: observe_property id={} name={}", id, name),
                Err(e) => warn!("mpv: observe_property {} failed: {}", name, e),
            }
        }
    }

    pub async fn load_url(&self, url: &str) -> anyhow::Result<()> {
        self.send(json!(["loadfile", url, "replace"])).await?;
        Ok(())
    }

    pub fn seek_to(&self, secs: f64) {
        self.post(json!(["set_property", "time-pos", secs]));
    }

    pub fn show_text(&self, text: &str, duration_ms: u64) {
        self.post(json!(["show-text", text, duration_ms]));
    }

    /// Replace the ASS overlay `id`, with coordinates in a `res_x`×`res_y` space.
    pub fn set_osd_overlay(&self, id: u64, data: &str, res_x: u32, res_y: u32) {
        self.post(json!({
            "name": "osd-overlay",
            "id": id,
            "format": "ass-events",
            "data": data,
            "res_x": res_x,
            "res_y": res_y,
            "z": 0,
        }));
    }

    pub fn remove_osd_overlay(&self, id: u64) {
        self.post(json!({
            "name": "osd-overlay",
            "id": id,
            "format": "none",
            "data": "",
        }));
    }

    /// Health-check: returns Ok(()) if mpv is responsive.
    pub async fn ping(&self) -> anyhow::Result<()> {
        self.send(json!(["get_property", "mpv-version"])).await?;
        Ok(())
    }
}

// ── driver ────────────────────────────────────────────────────────────────────

/// Owns the mpv child process and manages (re)connection.
pub struct MpvDriver {
    socket_name: String,
    binary: Option<PathBuf>,
    extra_args: Vec<String>,
    process: Option<tokio::process::Child>,
}

impl MpvDriver {
    pub fn new(binary: Option<PathBuf>, extra_args: Vec<String>) -> Self {
        Self {
            socket_name: segskip_core::platform::mpv_socket_name(),
            binary,
            extra_args,
            process: None,
        }
    }

    pub async fn kill(&mut self) {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
    }

    fn spawn_process(&mut self) -> anyhow::Result<()> {
        let mpv_binary = self
            .binary
            .clone()
            .filter(|p| p.exists())
            .or_else(find_mpv_binary)
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;

        info!("mpv: spawning {:?}", mpv_binary);
        let child = tokio::process::Command::new(mpv_binary)
            .arg("--idle=yes")
            .arg("--force-window=yes")
            .arg(segskip_core::platform::mpv_socket_arg())
            .arg("--quiet")
            .args(&self.extra_args)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()?;
        self.process = Some(child);
        Ok(())
    }

    #[cfg(unix)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;

        let socket_path = PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;
        self.spawn_process()?;

        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to IPC socket");
        Ok(start_io_tasks(stream, event_tx))
    }

    /// Try to connect to an already-running mpv socket without spawning.
    #[cfg(unix)]
    pub async fn try_reconnect(&mut self, event_tx: mpsc::Sender<MpvEvent>) -> Option<MpvHandle> {
        let socket_path = PathBuf::from(&self.socket_name);
        if !socket_path.exists() {
            return None;
        }
        match UnixStream::connect(&socket_path).await {
            Ok(stream) => {
                info!("mpv: reconnected to existing IPC socket");
                Some(start_io_tasks(stream, event_tx))
            }
            Err(e) => {
                warn!("mpv: failed to reconnect: {}", e);
                None
            }
        }
    }

    #[cfg(windows)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;
        self.spawn_process()?;

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to named pipe");
                return Ok(start_io_tasks(client, event_tx));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }

    #[cfg(windows)]
    pub async fn try_reconnect(&mut self, event_tx: mpsc::Sender<MpvEvent>) -> Option<MpvHandle> {
        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        match ClientOptions::new().open(&pipe_path) {
            Ok(client) => {
                info!("mpv: reconnected to named pipe");
                Some(start_io_tasks(client, event_tx))
            }
            Err(e) => {
                warn!("mpv: failed to reconnect to named pipe: {}", e);
                None
            }
        }
    }
}

/// First `mpv` executable on PATH.
pub fn find_mpv_binary() -> Option<PathBuf> {
    let exe_name = if cfg!(windows) { "mpv.exe" } else { "mpv" };
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(exe_name))
        .find(|candidate| candidate.exists())
}

fn start_io_tasks<S>(stream: S, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

    tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));

    MpvHandle { tx: cmd_tx }
}

// ── reader task ───────────────────────────────────────────────────────────────

async fn reader_task<R>(mut reader: BufReader<R>, pending: PendingMap, event_tx: mpsc::Sender<MpvEvent>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                let mut map = pending.lock().await;
                for (_, tx) in map.drain() {
                    let _ = tx.send(Err(anyhow::anyhow!("mpv IPC connection closed")));
                }
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(|v| v.as_u64()) {
                    let mut map = pending.lock().await;
                    if let Some(tx) = map.remove(&req_id) {
                        let result = if val["error"].as_str() == Some("success") {
                            Ok(val)
                        } else {
                            let err = val["error"].as_str().unwrap_or("unknown error").to_string();
                            debug!("mpv reader: response req={} err={}", req_id, err);
                            Err(anyhow::anyhow!("mpv error: {}", err))
                        };
                        let _ = tx.send(result);
                    }
                } else {
                    // no per-event log: time-pos changes arrive many times a second
                    if event_tx.send(MpvEvent { raw: val }).await.is_err() {
                        break;
                    }
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                let mut map = pending.lock().await;
                for (_, tx) in map.drain() {
                    let _ = tx.send(Err(anyhow::anyhow!("mpv IPC read error: {}", e)));
                }
                break;
            }
        }
    }
}

// ── writer task ───────────────────────────────────────────────────────────────

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // register before writing so the reader can match the reply
        if !req.reply.is_closed() {
            pending.lock().await.insert(req.req_id, req.reply);
        }
        debug!("mpv writer: send req={} payload={}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_change_parsing() {
        let evt = MpvEvent {
            raw: json!({"event": "property-change", "id": OBS_TIME_POS, "name": "time-pos", "data": 12.5}),
        };
        let (id, data) = evt.as_property_change().unwrap();
        assert_eq!(id, OBS_TIME_POS);
        assert_eq!(data.as_f64(), Some(12.5));

        let evt = MpvEvent {
            raw: json!({"event": "playback-restart"}),
        };
        assert!(evt.as_property_change().is_none());
        assert_eq!(evt.event_name(), Some("playback-restart"));
    }

    #[tokio::test]
    async fn test_request_reply_and_events_over_duplex() {
        let (client, server) = tokio::io::duplex(4096);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let handle = start_io_tasks(client, event_tx);

        let (server_read, mut server_write) = tokio::io::split(server);
        let fake_mpv = tokio::spawn(async move {
            let mut lines = BufReader::new(server_read).lines();
            let line = lines.next_line().await.unwrap().unwrap();
            let req: Value = serde_json::from_str(&line).unwrap();
            assert_eq!(req["command"], json!(["get_property", "mpv-version"]));
            let event = json!({"event": "property-change", "id": OBS_PAUSE, "data": true});
            let reply = json!({"request_id": req["request_id"], "error": "success", "data": "mpv 0.38"});
            server_write
                .write_all(format!("{event}\n{reply}\n").as_bytes())
                .await
                .unwrap();
        });

        handle.ping().await.unwrap();
        let evt = event_rx.recv().await.unwrap();
        assert_eq!(evt.as_property_change().map(|(id, _)| id), Some(OBS_PAUSE));
        fake_mpv.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_reply_is_err() {
        let (client, server) = tokio::io::duplex(4096);
        let (event_tx, _event_rx) = mpsc::channel(8);
        let handle = start_io_tasks(client, event_tx);

        let (server_read, mut server_write) = tokio::io::split(server);
        tokio::spawn(async move {
            let mut lines = BufReader::new(server_read).lines();
            let line = lines.next_line().await.unwrap().unwrap();
            let req: Value = serde_json::from_str(&line).unwrap();
            let reply = json!({"request_id": req["request_id"], "error": "property unavailable"});
            server_write
                .write_all(format!("{reply}\n").as_bytes())
                .await
                .unwrap();
        });

        let err = handle.send(json!(["get_property", "duration"])).await.unwrap_err();
        assert!(err.to_string().contains("property unavailable"));
    }
}
