//! Per-game draw tracking: decide when a draw has published results,
//! store them once, and back off while the provider is not ready.

pub mod backoff;
pub mod fleet;
pub mod sync;
pub mod watcher;

pub use backoff::BackoffPolicy;
pub use fleet::Fleet;
pub use sync::DrawSync;
