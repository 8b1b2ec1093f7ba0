//! # hollowscan-core
//!
//! Core library for recovering PE image structure from raw process memory.
//!
//! This crate provides:
//! - Structural validators for section and file headers
//! - Anchor search for section tables and file headers
//! - Section table walking and image size estimation
//! - The artefact scanner, including the backward walk through preceding regions
//! - Remote memory access (offline snapshots everywhere, live processes on Windows)
//!
//! ## Example
//!
//! ```
//! use hollowscan_core::{ScanConfig, SnapshotMemory, scan};
//!
//! let memory = SnapshotMemory::builder()
//!     .allocation(0x10000)
//!     .region(0x10000, vec![0xCC; 0x1000], 0x20)
//!     .build()
//!     .unwrap();
//! let result = scan(&memory, &ScanConfig::default(), 0x10000).unwrap();
//! assert!(result.is_none());
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod scanner;

pub use config::{Architecture, ScanConfig, ScanConfigBuilder};
pub use error::{Error, Result};
#[cfg(target_os = "windows")]
pub use memory::{ProcessHandle, ProcessMemory};
pub use memory::{MemoryRegion, RegionInfo, RemoteMemory, SnapshotBuilder, SnapshotMemory};
pub use scanner::{ArtefactScanner, ReconstructedArtefacts, ScanResult, Verdict, scan};
