//! Scan state module
//!
//! Tracks how far incremental extraction of each stream has progressed.
//!
//! # Overview
//!
//! The state module provides:
//! - `ScanState` - phase plus composite cursor key of one stream
//! - `CursorValue` - one comparable, serializable key element
//! - `StateManager` - file-based persistence of every stream's state

mod manager;
mod types;

pub use manager::StateManager;
pub use types::{CursorValue, ScanPhase, ScanState, SyncState};
