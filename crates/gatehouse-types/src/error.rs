//! The shared error type for the Gatehouse platform.
//!
//! Every fallible operation in the workspace returns `GhResult<T>`. The
//! variants are deliberately coarse: callers that need to distinguish policy
//! outcomes use their own closed enums (see the license validator) and keep
//! this type for infrastructure failures only. The HTTP mapping never leaks
//! storage internals.

use axum::{Json, http::StatusCode, response::IntoResponse};

pub type GhResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	/// Requested record does not exist
	NotFound,
	/// Caller is not allowed to perform the operation
	PermissionDenied,
	/// Storage layer failed; details are logged, never surfaced
	DbError,
	/// Storage call exceeded its bounded timeout
	Timeout,
	/// Input failed validation
	ValidationError(String),
	/// Configuration is missing or inconsistent
	ConfigError(String),
	/// Invariant violation inside the process
	Internal(String),

	// externals
	Io(std::io::Error),
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Error::NotFound => write!(f, "not found"),
			Error::PermissionDenied => write!(f, "permission denied"),
			Error::DbError => write!(f, "storage error"),
			Error::Timeout => write!(f, "storage timeout"),
			Error::ValidationError(msg) => write!(f, "validation error: {}", msg),
			Error::ConfigError(msg) => write!(f, "config error: {}", msg),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Io(err) => write!(f, "io error: {}", err),
		}
	}
}

impl std::error::Error for Error {}

impl IntoResponse for Error {
	fn into_response(self) -> axum::response::Response {
		match self {
			Error::NotFound => (
				StatusCode::NOT_FOUND,
				Json(serde_json::json!({ "error": "Not found" })),
			)
				.into_response(),
			Error::PermissionDenied => (
				StatusCode::FORBIDDEN,
				Json(serde_json::json!({ "error": "Access denied" })),
			)
				.into_response(),
			Error::ValidationError(msg) => (
				StatusCode::BAD_REQUEST,
				Json(serde_json::json!({ "error": msg })),
			)
				.into_response(),
			// Storage and internal failures share one opaque body
			_ => (
				StatusCode::INTERNAL_SERVER_ERROR,
				Json(serde_json::json!({ "error": "Internal error" })),
			)
				.into_response(),
		}
	}
}

// vim: ts=4
