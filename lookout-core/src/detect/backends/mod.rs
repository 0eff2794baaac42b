mod mock;
mod stub;

#[cfg(feature = "backend-tract")]
mod tract;

pub use mock::MockDetector;
pub use stub::StubDetector;

#[cfg(feature = "backend-tract")]
pub use tract::TractDetector;
