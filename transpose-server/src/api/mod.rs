//! HTTP API handlers for transpose-server
//!
//! The boundary only validates parameters, dispatches into the
//! orchestrator and maps failures to status codes; business logic lives in
//! the transposer and provider layers.

pub mod convert;
pub mod health;
pub mod refresh;
pub mod transpose;

pub use convert::convert_routes;
pub use health::health_routes;
pub use refresh::refresh_routes;
pub use transpose::transpose_routes;
