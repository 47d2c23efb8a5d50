//! Util Module - Shared Utilities

pub mod atomic;

pub use atomic::{AtomicArcCell, CellValue, InstallRejected};
