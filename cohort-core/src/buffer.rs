//! Experience buffer of one rollout window.
mod base;
mod config;
mod transition;
pub use base::RolloutBuffer;
pub use config::RolloutBufferConfig;
pub use transition::Transition;
