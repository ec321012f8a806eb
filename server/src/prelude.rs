pub use gatehouse_core::app::App;
pub use gatehouse_types::error::{Error, GhResult};
pub use gatehouse_types::types::{Timestamp, now};

pub use tracing::{debug, debug_span, error, error_span, info, info_span, warn, warn_span};

// vim: ts=4
