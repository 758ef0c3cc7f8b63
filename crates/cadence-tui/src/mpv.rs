/// mpv IPC driver plus the `AudioEngine` adapter the playback session drives.
///
/// ```text
///   PlaybackSession ──AudioEngine──► MpvEngine ──EngineCommand──► command_pump
///                                      │ MountTracker                 │ MpvHandle::send
///                                      ▲                              ▼
///   PlayerCore ◄──MpvEvent── reader_task ◄──── socket ◄──── writer_task
/// ```
///
/// While connected, every `load` queues its `MountId` in the tracker. mpv
/// answers each `loadfile` with a `start-file` event; the tracker attaches the
/// oldest pending mount at that point and tags subsequent `time-pos` /
/// `duration` changes with it. An `end-file` with reason `eof` ends the mount.
///
/// Platform notes:
/// - Unix:   Unix domain sockets
/// - Windows: Named pipes  \\.\pipe\<name>
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cadence_core::session::{AudioEngine, EngineEvent, MountId};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

// ── observation property IDs ──────────────────────────────────────────────────

// Pause and mute are owned by the session and only ever written.
pub const OBS_TIME_POS: u64 = 1;
pub const OBS_DURATION: u64 = 2;

const OBSERVED: [(u64, &str); 2] = [(OBS_TIME_POS, "time-pos"), (OBS_DURATION, "duration")];

type Reply = oneshot::Sender<anyhow::Result<Value>>;
type PendingMap = Arc<Mutex<HashMap<u64, Reply>>>;

struct PendingRequest {
    req_id: u64,
    payload: String,
    reply: Reply,
}

/// An unsolicited mpv event or property change.
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// `Some((obs_id, data))` for property-change events.
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.event_name()? != "property-change" {
            return None;
        }
        let id = self.raw.get("id")?.as_u64()?;
        Some((id, self.raw.get("data").unwrap_or(&Value::Null)))
    }

    /// e.g. "start-file", "end-file", "file-loaded".
    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }
}

// ── handle ────────────────────────────────────────────────────────────────────

/// Cloneable handle to the writer task.
#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let mut payload = serde_json::to_string(&json!({
            "command": command,
            "request_id": req_id,
        }))?;
        payload.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(tokio::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    /// Replace whatever is playing with `url`.
    pub async fn load_file(&self, url: &str) -> anyhow::Result<()> {
        debug!("mpv: loadfile {}", url);
        self.send(json!(["loadfile", url, "replace"])).await?;
        Ok(())
    }

    pub async fn set_pause(&self, paused: bool) -> anyhow::Result<()> {
        self.send(json!(["set_property", "pause", paused])).await?;
        Ok(())
    }

    pub async fn set_mute(&self, muted: bool) -> anyhow::Result<()> {
        self.send(json!(["set_property", "mute", muted])).await?;
        Ok(())
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.send(json!(["stop"])).await?;
        Ok(())
    }

    /// Must be called after every fresh connection.
    pub async fn observe_properties(&self) {
        for (id, name) in OBSERVED {
            match self.send(json!(["observe_property", id, name])).await {
                Ok(_) => debug!("mpv: observe_property id={} name={}", id, name),
                Err(e) => warn!("mpv: observe_property {} failed: {}", name, e),
            }
        }
    }

    pub async fn ping(&self) -> anyhow::Result<()> {
        self.send(json!(["get_property", "mute"])).await?;
        Ok(())
    }
}

// ── driver ────────────────────────────────────────────────────────────────────

/// Owns the mpv child process.
pub struct MpvDriver {
    pub socket_name: String,
    process: Option<tokio::process::Child>,
    /// 0.0..=1.0, passed as `--volume` on spawn.
    pub volume: f32,
    /// Overrides the platform lookup when set.
    pub binary: Option<PathBuf>,
}

impl MpvDriver {
    pub fn new(volume: f32, binary: Option<PathBuf>) -> Self {
        Self {
            socket_name: cadence_core::platform::mpv_socket_name(),
            process: None,
            volume,
            binary,
        }
    }

    pub fn process_alive(&mut self) -> bool {
        let Some(child) = self.process.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                match status.code() {
                    Some(code) => warn!("mpv process exited with code: {}", code),
                    None => warn!("mpv process terminated by signal"),
                }
                false
            }
            Err(e) => {
                warn!("mpv process_alive check failed: {}", e);
                false
            }
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
            .or_else(cadence_core::platform::find_mpv_binary)
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;

        let stderr_path = cadence_core::platform::data_dir().join("mpv-stderr.log");
        let stderr_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stderr_path)?;
        info!("mpv: logging stderr to {:?}", stderr_path);

        let child = tokio::process::Command::new(&mpv_binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg("--quiet")
            .arg(cadence_core::platform::mpv_socket_arg())
            .arg(format!(
                "--volume={}",
                (self.volume * 100.0).clamp(0.0, 100.0).round() as i64
            ))
            .stdout(std::process::Stdio::null())
            .stderr(stderr_file)
            .kill_on_drop(true)
            .spawn()?;
        info!("mpv: spawned process with pid {:?}", child.id());
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
        let (read_half, write_half) = stream.into_split();
        Ok(start_io_tasks(read_half, write_half, event_tx))
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
                let (read_half, write_half) = tokio::io::split(client);
                return Ok(start_io_tasks(read_half, write_half, event_tx));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }
}

fn start_io_tasks<R, W>(read_half: R, write_half: W, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);
    tokio::spawn(writer_task(write_half, cmd_rx, Arc::clone(&pending)));
    tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));
    MpvHandle { tx: cmd_tx }
}

async fn fail_all(pending: &PendingMap, reason: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(anyhow::anyhow!("{}", reason)));
    }
}

async fn reader_task<R>(
    mut reader: BufReader<R>,
    pending: PendingMap,
    event_tx: mpsc::Sender<MpvEvent>,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_all(&pending, "mpv IPC connection closed").await;
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

                let Some(req_id) = val.get("request_id").and_then(Value::as_u64) else {
                    if event_tx.send(MpvEvent { raw: val }).await.is_err() {
                        break;
                    }
                    continue;
                };

                let Some(tx) = pending.lock().await.remove(&req_id) else {
                    debug!("mpv reader: response for unknown req={}", req_id);
                    continue;
                };
                let result = if val["error"].as_str() == Some("success") {
                    Ok(val)
                } else {
                    let err = val["error"].as_str().unwrap_or("unknown error");
                    Err(anyhow::anyhow!("mpv error: {}", err))
                };
                let _ = tx.send(result);
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_all(&pending, "mpv IPC read error").await;
                break;
            }
        }
    }
}

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register before writing so the reader can always match the reply.
        pending.lock().await.insert(req.req_id, req.reply);
        debug!("mpv writer: req={} {}", req.req_id, req.payload.trim());
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

// ── mount tracking ────────────────────────────────────────────────────────────

/// Attributes mpv's untagged property changes to the mount that caused them.
#[derive(Debug, Default)]
pub struct MountTracker {
    pending: VecDeque<MountId>,
    attached: Option<MountId>,
    duration: Option<f64>,
}

impl MountTracker {
    pub fn push_pending(&mut self, mount: MountId) {
        self.pending.push_back(mount);
    }

    pub fn attached(&self) -> Option<MountId> {
        self.attached
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Forget everything; used when the mpv process is replaced.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.attached = None;
        self.duration = None;
    }

    /// Translate one mpv event into an engine notification, if it is one.
    pub fn translate(&mut self, event: &MpvEvent) -> Option<EngineEvent> {
        if let Some((id, data)) = event.as_property_change() {
            let mount = self.attached?;
            return match id {
                OBS_DURATION => {
                    let secs = data.as_f64()?;
                    self.duration = Some(secs);
                    Some(EngineEvent::MetadataLoaded {
                        mount,
                        duration_secs: secs,
                    })
                }
                OBS_TIME_POS => Some(EngineEvent::TimeUpdate {
                    mount,
                    current_secs: data.as_f64()?,
                    duration_secs: self.duration?,
                }),
                _ => None,
            };
        }

        match event.event_name() {
            Some("start-file") => {
                self.attached = self.pending.pop_front();
                self.duration = None;
                debug!("mpv: start-file attaches {:?}", self.attached);
                None
            }
            // "stop" is a replaced file; "error" is logged by the core.
            Some("end-file") if event.raw.get("reason").and_then(Value::as_str) == Some("eof") => {
                let mount = self.attached.take()?;
                Some(EngineEvent::Ended { mount })
            }
            _ => None,
        }
    }
}

// ── AudioEngine adapter ───────────────────────────────────────────────────────

#[derive(Debug)]
pub enum EngineCommand {
    Load(String),
    SetPause(bool),
    SetMute(bool),
}

/// Non-blocking `AudioEngine`: commands are queued in order for the pump.
pub struct MpvEngine {
    tx: mpsc::UnboundedSender<EngineCommand>,
    pub tracker: MountTracker,
    connected: bool,
}

impl MpvEngine {
    pub fn new(tx: mpsc::UnboundedSender<EngineCommand>) -> Self {
        Self {
            tx,
            tracker: MountTracker::default(),
            connected: false,
        }
    }

    /// Mounts are only tracked while an mpv connection can answer them.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
        if !connected {
            self.tracker.reset();
        }
    }

    fn push(&self, cmd: EngineCommand) {
        if self.tx.send(cmd).is_err() {
            warn!("mpv: command pump gone, dropping command");
        }
    }
}

impl AudioEngine for MpvEngine {
    fn load(&mut self, mount: MountId, source: &str) {
        if self.connected {
            self.tracker.push_pending(mount);
        } else {
            debug!("mpv: not connected, {:?} will not report", mount);
        }
        self.push(EngineCommand::Load(source.to_string()));
    }

    fn play(&mut self) {
        self.push(EngineCommand::SetPause(false));
    }

    fn pause(&mut self) {
        self.push(EngineCommand::SetPause(true));
    }

    fn set_muted(&mut self, muted: bool) {
        self.push(EngineCommand::SetMute(muted));
    }
}

/// Drain engine commands into whichever mpv connection is current.
///
/// Commands that arrive while no connection exists are dropped.
pub async fn command_pump(
    mut rx: mpsc::UnboundedReceiver<EngineCommand>,
    mut handle_rx: tokio::sync::watch::Receiver<Option<MpvHandle>>,
) {
    while let Some(cmd) = rx.recv().await {
        let Some(handle) = handle_rx.borrow_and_update().clone() else {
            debug!("mpv: no connection, dropping {:?}", cmd);
            continue;
        };
        let result = match &cmd {
            EngineCommand::Load(url) => handle.load_file(url).await,
            EngineCommand::SetPause(paused) => handle.set_pause(*paused).await,
            EngineCommand::SetMute(muted) => handle.set_mute(*muted).await,
        };
        if let Err(e) = result {
            warn!("mpv: {:?} failed: {}", cmd, e);
        }
    }
    debug!("mpv: command pump exiting");
}
