//! Middleware layer.
//!
//! Cross-cutting concerns that wrap every dispatch. The router applies them
//! around each handler call, matched or not.
//!
//! - [`trace`]: per-request span with method, path, status and latency

mod trace;

pub(crate) use trace::trace;
