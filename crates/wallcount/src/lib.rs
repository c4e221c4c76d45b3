//! Wallcount: occupancy extraction, relative-time normalization, and observation tracking.

pub mod decode;
pub mod relative_time;
pub mod sanitize;
pub mod scanner;
pub mod store;
pub mod types;

pub use decode::{decode_registry, extract_registry};
pub use relative_time::{normalize, truncate_to_minute};
pub use sanitize::sanitize_literal;
pub use scanner::{find_marker_text, DATA_MARKER};
pub use store::{ObservationStore, PendingThreshold, StoreOutcome, Threshold, ThresholdCallback};
pub use types::*;
