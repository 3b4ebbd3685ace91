pub mod motion;
pub mod scripted;
#[cfg(feature = "backend-tract")]
pub mod tract;

pub use motion::MotionDetector;
pub use scripted::{ScriptedDetector, ScriptedStep};
#[cfg(feature = "backend-tract")]
pub use tract::TractDetector;
