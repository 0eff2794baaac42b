//! lookout-core: capture, detection and viewer bookkeeping for lookout
//!
//! This crate owns everything that touches pixels or tracks viewers:
//!
//! - **Camera backends** - [`camera::Camera`] with a synthetic `stub://` source
//!   and an optional V4L2 device source
//! - **Detection** - [`detect::Detector`] as a narrow black-box interface over
//!   pretrained models, plus the confidence/class acceptance policy
//! - **Frame source** - [`FrameSource`] ties camera, detector, overlay and
//!   recording together behind a start/stop lifecycle
//! - **Recording** - [`recording::AviWriter`] appends annotated frames to an
//!   MJPEG AVI file
//! - **Viewer registry** - [`ClientRegistry`] maps connected sessions to their
//!   display names
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────── FrameSource ─────────────────────────────┐
//! │  Camera ──► RgbImage ──► Detector ──► overlay ──► AnnotatedFrame     │
//! │                                                      │               │
//! │                                                      └──► AviWriter  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

pub mod camera;
pub mod codec;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame_source;
pub mod overlay;
pub mod recording;
pub mod registry;

pub use camera::{Camera, MockCamera, MockCameraProbe, SyntheticCamera};
pub use codec::{DATA_URI_PREFIX, decode_data_uri, encode_data_uri, encode_jpeg};
pub use config::{CameraConfig, DetectionConfig, DetectorKind};
pub use detect::{BoundingBox, Detection, Detector, MockDetector, StubDetector};
pub use error::{CameraError, CodecError, DetectError, RecordingError};
pub use frame_source::{AnnotatedFrame, FrameSource};
pub use recording::{AviWriter, recording_filename};
pub use registry::{ClientId, ClientInfo, ClientRegistry};
