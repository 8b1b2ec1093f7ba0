pub mod bounds;
pub mod layout;
#[cfg(target_os = "windows")]
mod process;
mod region;
mod snapshot;

pub use bounds::{read_u16, read_u32, validate_bounds, view_at};
#[cfg(target_os = "windows")]
pub use process::{ProcessHandle, ProcessMemory};
pub use region::{MemoryRegion, RegionInfo, RemoteMemory};
pub use snapshot::{SnapshotBuilder, SnapshotMemory};
