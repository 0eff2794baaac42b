//! Session hub: viewer membership and the shared frame source.
//!
//! Membership lives behind the registry lock and never waits on the frame
//! source. `FrameSource` blocks on device reads and inference, so it sits
//! behind a std mutex that is only locked from the blocking pool, and every
//! wait on it is bounded by the source budget.
//!
//! Connect and disconnect record whether the camera is wanted (anyone
//! registered) under the registry lock, then on the first and last viewer
//! transitions spawn a reconcile that opens or closes the device to match.
//! Reconciles read the wanted flag once they hold the source, so however
//! they interleave the last one to run leaves the camera open exactly while
//! viewers are registered.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use chrono::Local;
use lookout_core::{
    ClientInfo, ClientRegistry, CodecError, FrameSource, encode_data_uri, recording_filename,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::error::ServerError;
use crate::outbox::{self, Outbox};
use crate::ws::{RecordingState, ServerMessage};

/// Longest a hub operation waits on the frame source.
pub const DEFAULT_SOURCE_BUDGET: Duration = Duration::from_millis(500);

/// A captured frame, already encoded for the wire.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub data_uri: String,
    pub detections: usize,
}

pub struct SessionHub {
    clients: Mutex<ClientRegistry<Outbox>>,
    source: Arc<StdMutex<FrameSource>>,
    /// Shared with the source; flipped without taking its lock.
    detection: Arc<AtomicBool>,
    camera_wanted: Arc<AtomicBool>,
    camera_open: Arc<AtomicBool>,
    max_clients: usize,
    recordings_dir: PathBuf,
    source_budget: Duration,
}

impl SessionHub {
    pub fn new(source: FrameSource, max_clients: usize, recordings_dir: impl Into<PathBuf>) -> Self {
        let detection = source.detection_switch();
        let camera_open = Arc::new(AtomicBool::new(source.is_running()));
        Self {
            clients: Mutex::new(ClientRegistry::new()),
            source: Arc::new(StdMutex::new(source)),
            detection,
            camera_wanted: Arc::new(AtomicBool::new(false)),
            camera_open,
            max_clients,
            recordings_dir: recordings_dir.into(),
            source_budget: DEFAULT_SOURCE_BUDGET,
        }
    }

    /// Bound every wait on the frame source to `budget`.
    pub fn with_source_budget(mut self, budget: Duration) -> Self {
        self.source_budget = budget;
        self
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    pub fn recordings_dir(&self) -> &Path {
        &self.recordings_dir
    }

    /// Run `f` against the frame source on the blocking pool, waiting at
    /// most the source budget. On timeout `f` still runs once the source
    /// frees up.
    async fn with_source<T, F>(&self, f: F) -> Result<T, ServerError>
    where
        T: Send + 'static,
        F: FnOnce(&mut FrameSource) -> T + Send + 'static,
    {
        let source = Arc::clone(&self.source);
        let task = tokio::task::spawn_blocking(move || {
            let mut guard = source.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        });
        match timeout(self.source_budget, task).await {
            Ok(joined) => joined
                .map_err(|e| ServerError::Internal(format!("frame source task failed: {}", e))),
            Err(_) => Err(ServerError::SourceBusy(self.source_budget)),
        }
    }

    /// Open or close the camera to match the wanted flag as it stands when
    /// the source lock is acquired.
    fn spawn_reconcile(&self) -> JoinHandle<()> {
        let source = Arc::clone(&self.source);
        let wanted = Arc::clone(&self.camera_wanted);
        let open = Arc::clone(&self.camera_open);
        tokio::task::spawn_blocking(move || {
            let mut source = source.lock().unwrap_or_else(PoisonError::into_inner);
            if wanted.load(Ordering::SeqCst) {
                if let Err(e) = source.start() {
                    warn!("Camera unavailable, continuing without frames: {}", e);
                }
            } else {
                source.stop();
            }
            open.store(source.is_running(), Ordering::SeqCst);
        })
    }

    async fn await_transition(&self, transition: JoinHandle<()>) {
        match timeout(self.source_budget, transition).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Camera transition failed: {}", e),
            Err(_) => warn!(
                "Camera transition still pending after {:?}, continuing",
                self.source_budget
            ),
        }
    }

    /// Register a viewer.
    ///
    /// The first viewer opens the camera; failure to open is logged and the
    /// session continues without frames. Everyone receives the new viewer
    /// list and the newcomer receives the current detection state.
    #[instrument(name = "hub::connect", skip(self, outbox))]
    pub async fn connect(&self, id: &str, outbox: Outbox) -> Result<(), ServerError> {
        let transition = {
            let mut clients = self.clients.lock().await;
            if clients.len() >= self.max_clients {
                return Err(ServerError::CapacityExceeded {
                    max: self.max_clients,
                });
            }
            if !clients.add(id, outbox.clone()) {
                return Err(ServerError::Internal(format!("duplicate session id {}", id)));
            }

            let transition = (clients.len() == 1).then(|| {
                self.camera_wanted.store(true, Ordering::SeqCst);
                self.spawn_reconcile()
            });

            info!(clients = clients.len(), "Viewer connected");
            let update = ServerMessage::client_update(clients.snapshot());
            outbox::fan_out(&clients.handles(), &update);
            let enabled = self.detection.load(Ordering::SeqCst);
            if let Ok(payload) = outbox::encode(&ServerMessage::ProcessingStatus { enabled }) {
                outbox.send(payload);
            }
            transition
        };

        if let Some(transition) = transition {
            self.await_transition(transition).await;
        }
        Ok(())
    }

    /// Deregister a viewer. The last one out closes the camera.
    #[instrument(name = "hub::disconnect", skip(self))]
    pub async fn disconnect(&self, id: &str) {
        let transition = {
            let mut clients = self.clients.lock().await;
            let Some(info) = clients.remove(id) else {
                debug!("Disconnect for unknown session");
                return;
            };

            let transition = clients.is_empty().then(|| {
                self.camera_wanted.store(false, Ordering::SeqCst);
                self.spawn_reconcile()
            });

            info!(username = %info.username, clients = clients.len(), "Viewer disconnected");
            let update = ServerMessage::client_update(clients.snapshot());
            outbox::fan_out(&clients.handles(), &update);
            transition
        };

        if let Some(transition) = transition {
            self.await_transition(transition).await;
        }
    }

    /// Set a viewer's display name and announce the new list.
    pub async fn identify(&self, id: &str, username: Option<&str>) {
        let mut clients = self.clients.lock().await;
        if !clients.set_name(id, username.unwrap_or_default()) {
            return;
        }
        debug!(client = %id, username = clients.name(id).unwrap_or_default(), "Viewer identified");
        let update = ServerMessage::client_update(clients.snapshot());
        outbox::fan_out(&clients.handles(), &update);
    }

    pub async fn chat(&self, username: String, message: String) {
        self.broadcast(&ServerMessage::ChatMessage { username, message })
            .await;
    }

    /// Switch detection for everyone and announce the new state.
    ///
    /// The flag changes under the registry lock, the same lock
    /// [`publish_frame`](Self::publish_frame) holds, so no frame queued after
    /// the announcement carries a count from before it.
    pub async fn set_detection_enabled(&self, enabled: bool) {
        let clients = self.clients.lock().await;
        self.detection.store(enabled, Ordering::SeqCst);
        info!("Detection toggled: {}", enabled);
        outbox::fan_out(&clients.handles(), &ServerMessage::ProcessingStatus { enabled });
    }

    /// Start recording to a timestamped file in the recordings directory.
    ///
    /// Returns the status to send back to the requester, or `None` if a
    /// recording was already running or could not be created.
    #[instrument(name = "hub::start_recording", skip(self))]
    pub async fn start_recording(&self) -> Option<ServerMessage> {
        let filename = recording_filename(Local::now());
        let path = self.recordings_dir.join(&filename);
        match self
            .with_source(move |source| source.start_recording(&path))
            .await
        {
            Ok(Ok(true)) => Some(ServerMessage::RecordingStatus {
                status: RecordingState::Started,
                filename: Some(filename),
            }),
            Ok(Ok(false)) => None,
            Ok(Err(e)) => {
                warn!("Failed to start recording: {}", e);
                None
            }
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    /// Finalize the running recording, if any.
    #[instrument(name = "hub::stop_recording", skip(self))]
    pub async fn stop_recording(&self) -> Option<ServerMessage> {
        match self.with_source(|source| source.stop_recording()).await {
            Ok(Ok(Some(_))) => Some(ServerMessage::RecordingStatus {
                status: RecordingState::Stopped,
                filename: None,
            }),
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                warn!("Failed to finalize recording: {}", e);
                None
            }
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    /// Queue a message on every registered viewer.
    pub async fn broadcast(&self, msg: &ServerMessage) -> usize {
        let clients = self.clients.lock().await;
        outbox::fan_out(&clients.handles(), msg)
    }

    /// Queue a captured frame on every viewer, returning how many took it.
    ///
    /// The count is zeroed if detection was switched off while the frame
    /// was being captured.
    pub async fn publish_frame(&self, frame: EncodedFrame) -> Result<usize, ServerError> {
        let clients = self.clients.lock().await;
        let targets = clients.handles();
        if targets.is_empty() {
            return Ok(0);
        }

        let num_faces = if self.detection.load(Ordering::SeqCst) {
            frame.detections
        } else {
            0
        };
        let payload = outbox::encode(&ServerMessage::ProcessedFrame {
            frame: frame.data_uri,
            num_faces,
            client_count: targets.len(),
        })?;
        Ok(targets
            .iter()
            .filter(|target| target.send_frame(Arc::clone(&payload)))
            .count())
    }

    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn clients(&self) -> Vec<ClientInfo> {
        self.clients.lock().await.snapshot()
    }

    pub async fn is_full(&self) -> bool {
        self.clients.lock().await.len() >= self.max_clients
    }

    /// Camera state as of the last completed open or close.
    pub fn camera_open(&self) -> bool {
        self.camera_open.load(Ordering::SeqCst)
    }

    /// Capture and encode one frame on the blocking pool.
    ///
    /// The handle is returned unawaited so the caller can bound the wait
    /// without abandoning a capture that is still holding the device.
    pub fn spawn_capture(&self, quality: u8) -> JoinHandle<Result<Option<EncodedFrame>, CodecError>> {
        let source = Arc::clone(&self.source);
        tokio::task::spawn_blocking(move || {
            let frame = {
                let mut source = source.lock().unwrap_or_else(PoisonError::into_inner);
                source.capture_annotated()
            };
            let Some(frame) = frame else {
                return Ok(None);
            };
            let data_uri = encode_data_uri(&frame.image, quality)?;
            Ok(Some(EncodedFrame {
                data_uri,
                detections: frame.detections,
            }))
        })
    }

    /// Close the camera regardless of who is still connected.
    pub async fn shutdown(&self) {
        let transition = {
            let _clients = self.clients.lock().await;
            self.camera_wanted.store(false, Ordering::SeqCst);
            self.spawn_reconcile()
        };
        self.await_transition(transition).await;
    }
}
