//! The frame broadcast loop.
//!
//! One task for the whole process, independent of any viewer. Each cycle
//! re-reads the registry; with nobody watching it only ticks.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use lookout_core::CodecError;

use crate::BroadcastConfig;
use crate::error::ServerError;
use crate::hub::{EncodedFrame, SessionHub};

/// Pause after a failed cycle.
pub const FAILURE_BACKOFF: Duration = Duration::from_millis(100);

type CaptureHandle = JoinHandle<Result<Option<EncodedFrame>, CodecError>>;

pub struct Broadcaster {
    hub: Arc<SessionHub>,
    config: BroadcastConfig,
    shutdown: CancellationToken,
    /// A capture that overran its budget. Awaited again next cycle instead
    /// of starting another, so at most one is ever in flight.
    pending: Option<CaptureHandle>,
}

impl Broadcaster {
    pub fn new(hub: Arc<SessionHub>, config: BroadcastConfig, shutdown: CancellationToken) -> Self {
        Self {
            hub,
            config,
            shutdown,
            pending: None,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Loop until the shutdown token is cancelled.
    pub async fn run(mut self) {
        let period = self.config.period();
        info!(
            fps = self.config.fps,
            quality = self.config.jpeg_quality,
            "Broadcaster started"
        );

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.cycle().await {
                Ok(delivered) => trace!(delivered, "Broadcast cycle"),
                Err(e) => {
                    warn!("Broadcast cycle failed: {}", e);
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = sleep(FAILURE_BACKOFF) => {}
                    }
                }
            }
        }

        info!("Broadcaster stopped");
    }

    /// Capture one frame and queue it on every viewer. Returns how many
    /// viewers it was queued for.
    async fn cycle(&mut self) -> Result<usize, ServerError> {
        if self.hub.client_count().await == 0 {
            return Ok(0);
        }

        let mut capture = match self.pending.take() {
            Some(handle) => handle,
            None => self.hub.spawn_capture(self.config.jpeg_quality),
        };

        let joined = match timeout(self.config.frame_budget(), &mut capture).await {
            Ok(joined) => joined,
            Err(_) => {
                self.pending = Some(capture);
                return Err(ServerError::FrameBudgetExceeded);
            }
        };
        let frame = joined.map_err(|e| ServerError::Internal(format!("capture task failed: {}", e)))??;

        let Some(frame) = frame else {
            debug!("No frame available");
            return Ok(0);
        };

        self.hub.publish_frame(frame).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox;
    use lookout_core::{
        BoundingBox, CameraConfig, Detection, DetectionConfig, FrameSource, MockCamera,
        MockCameraProbe, MockDetector,
    };

    fn hub_with(detector: MockDetector) -> (Arc<SessionHub>, MockCameraProbe) {
        let camera = MockCamera::new();
        let probe = camera.probe();
        let source = FrameSource::new(
            Box::new(camera),
            Box::new(detector),
            CameraConfig {
                device: "mock://".to_string(),
                width: 32,
                height: 24,
                fps: 30,
            },
            &DetectionConfig::default(),
        );
        (Arc::new(SessionHub::new(source, 5, "unused")), probe)
    }

    fn broadcaster(hub: Arc<SessionHub>) -> Broadcaster {
        Broadcaster::new(hub, BroadcastConfig::default(), CancellationToken::new())
    }

    #[tokio::test]
    async fn idle_cycle_does_not_touch_camera() {
        let (hub, probe) = hub_with(MockDetector::new());
        let mut b = broadcaster(hub);
        assert_eq!(b.cycle().await.unwrap(), 0);
        assert_eq!(probe.reads(), 0);
    }

    #[tokio::test]
    async fn frame_reaches_every_viewer_with_counts() {
        let detector = MockDetector::with_detections(vec![Detection::new(
            BoundingBox::new(2.0, 2.0, 10.0, 10.0),
            0.9,
            0,
        )]);
        let (hub, _probe) = hub_with(detector);
        let (a, mut rx_a) = outbox::channel(16);
        let (b, mut rx_b) = outbox::channel(16);
        hub.connect("a", a).await.unwrap();
        hub.connect("b", b).await.unwrap();
        while rx_a.try_recv().is_ok() {}
        while rx_b.try_recv().is_ok() {}

        let mut caster = broadcaster(Arc::clone(&hub));
        assert_eq!(caster.cycle().await.unwrap(), 2);

        let frame: serde_json::Value = serde_json::from_str(&rx_a.recv().await.unwrap()).unwrap();
        assert_eq!(frame["type"], "processed_frame");
        assert_eq!(frame["num_faces"], 1);
        assert_eq!(frame["client_count"], 2);
        assert!(rx_b.recv().await.is_some());
    }

    #[tokio::test]
    async fn disabled_detection_reports_zero() {
        let detector = MockDetector::with_detections(vec![Detection::new(
            BoundingBox::new(2.0, 2.0, 10.0, 10.0),
            0.9,
            0,
        )]);
        let (hub, _probe) = hub_with(detector);
        let (a, mut rx_a) = outbox::channel(16);
        hub.connect("a", a).await.unwrap();
        hub.set_detection_enabled(false).await;
        while rx_a.try_recv().is_ok() {}

        let mut caster = broadcaster(Arc::clone(&hub));
        caster.cycle().await.unwrap();
        let frame: serde_json::Value = serde_json::from_str(&rx_a.recv().await.unwrap()).unwrap();
        assert_eq!(frame["num_faces"], 0);
    }

    #[tokio::test]
    async fn read_failure_skips_cycle() {
        let (hub, probe) = hub_with(MockDetector::new());
        let (a, mut rx_a) = outbox::channel(16);
        hub.connect("a", a).await.unwrap();
        while rx_a.try_recv().is_ok() {}
        probe.set_fail_read(true);

        let mut caster = broadcaster(Arc::clone(&hub));
        assert_eq!(caster.cycle().await.unwrap(), 0);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn run_exits_on_cancel() {
        let (hub, _probe) = hub_with(MockDetector::new());
        let token = CancellationToken::new();
        let handle = Broadcaster::new(hub, BroadcastConfig::default(), token.clone()).spawn();

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("broadcaster should stop")
            .unwrap();
    }
}
