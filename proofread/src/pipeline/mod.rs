pub mod debounce;
pub mod dedup;

pub use debounce::{DEFAULT_DEBOUNCE_MS, DebounceState, Debouncer};
pub use dedup::{DedupGate, LengthBounds, Rejection};
