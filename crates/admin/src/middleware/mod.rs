//! HTTP middleware for the management API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (`http_request` span)
//! 3. Request ID (recorded in the span, echoed in the response)
//! 4. API token guard (`/api` routes only)
//! 5. Store resolution (`/api/stores/{store_id}/...` routes only)

pub mod auth;
pub mod request_id;
pub mod store;

pub use auth::require_api_token;
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use store::require_store;
