//! Application layer for taskboard.
//!
//! Configuration loading and the [`TaskBoard`] synchronization layer shared by
//! every front end.

pub mod config;
pub mod sync;

pub use config::{AppConfig, BackendConfig, ConnectionConfig, default_data_dir};
pub use sync::{BoardState, TaskBoard};
