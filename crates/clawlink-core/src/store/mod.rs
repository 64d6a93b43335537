// ── Reactive state repository ──
//
// Concurrent entity and rule storage with push-based change notification.

mod apply;
mod collection;
mod repository;

pub use repository::StateRepository;
