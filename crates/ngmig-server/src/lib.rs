//! Host-service plumbing for CG to NG migrations.
//!
//! Wraps the engine's discovery and import runs in persisted asynchronous
//! tasks with per-account submission dedup and a bounded worker pool.
//!
//! # Modules
//!
//! - [`config`]: environment-driven `ServerConfig`
//! - [`error`]: `ServerError`
//! - [`tasks`]: `AsyncTaskHandler`, the task wrapper
//! - [`handlers`]: discovery and import task handlers
//! - [`state`]: `AppState` wiring engine, stores and handlers together

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;
pub mod tasks;

pub use config::{ServerConfig, TaskHandlerConfig};
pub use error::ServerError;
pub use handlers::{
    DiscoveryRequest, DiscoveryResponse, DiscoveryTaskHandler, ImportRequest, ImportTaskHandler,
};
pub use state::AppState;
pub use tasks::{AsyncTaskHandler, SharedTaskStore, TaskBody};
