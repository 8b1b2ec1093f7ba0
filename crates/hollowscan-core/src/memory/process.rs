//! Live process access on Windows

use std::ffi::c_void;
use std::mem::size_of;

use tracing::debug;
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, MODULEENTRY32W, Module32FirstW, Module32NextW, TH32CS_SNAPMODULE,
    TH32CS_SNAPMODULE32,
};
use windows::Win32::System::Memory::{MEM_COMMIT, MEMORY_BASIC_INFORMATION, VirtualQueryEx};
use windows::Win32::System::Threading::{
    OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
};

use crate::error::{Error, Result};
use crate::memory::{RegionInfo, RemoteMemory};

/// Open handle to a target process
pub struct ProcessHandle {
    pub pid: u32,
    handle: HANDLE,
    /// (base, size) of every module in the loader's list when the handle was opened
    modules: Vec<(u64, u64)>,
}

impl ProcessHandle {
    pub fn open(pid: u32) -> Result<Self> {
        // SAFETY: OpenProcess has no memory-safety preconditions.
        let access = PROCESS_QUERY_INFORMATION | PROCESS_VM_READ;
        let handle = unsafe { OpenProcess(access, false, pid) }.map_err(|e| {
            Error::ProcessOpenFailed {
                pid,
                message: e.to_string(),
            }
        })?;

        let modules = list_modules(pid);
        debug!("Opened process {} ({} listed modules)", pid, modules.len());

        Ok(Self {
            pid,
            handle,
            modules,
        })
    }

    fn is_listed(&self, address: u64) -> bool {
        self.modules
            .iter()
            .any(|&(base, size)| address >= base && address < base + size)
    }

    fn query(&self, address: u64) -> Option<MEMORY_BASIC_INFORMATION> {
        let mut mbi = MEMORY_BASIC_INFORMATION::default();
        // SAFETY: mbi is a valid, writable MEMORY_BASIC_INFORMATION of the size passed.
        let written = unsafe {
            VirtualQueryEx(
                self.handle,
                Some(address as *const c_void),
                &mut mbi,
                size_of::<MEMORY_BASIC_INFORMATION>(),
            )
        };
        (written != 0).then_some(mbi)
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // SAFETY: handle was returned by OpenProcess and is closed exactly once.
        let _ = unsafe { CloseHandle(self.handle) };
    }
}

/// Snapshot of the loader's module list, empty if ToolHelp is unavailable
fn list_modules(pid: u32) -> Vec<(u64, u64)> {
    let mut modules = Vec::new();
    // SAFETY: CreateToolhelp32Snapshot has no memory-safety preconditions.
    let Ok(snapshot) =
        (unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, pid) })
    else {
        return modules;
    };

    let mut entry = MODULEENTRY32W {
        dwSize: size_of::<MODULEENTRY32W>() as u32,
        ..Default::default()
    };
    // SAFETY: entry is initialized with its dwSize as ToolHelp requires.
    let mut next = unsafe { Module32FirstW(snapshot, &mut entry) };
    while next.is_ok() {
        modules.push((entry.modBaseAddr as u64, entry.modBaseSize as u64));
        // SAFETY: same entry buffer, reused for the next record.
        next = unsafe { Module32NextW(snapshot, &mut entry) };
    }

    // SAFETY: snapshot handle is owned here and closed once.
    let _ = unsafe { CloseHandle(snapshot) };
    modules
}

/// [`RemoteMemory`] over an open process
pub struct ProcessMemory<'a> {
    process: &'a ProcessHandle,
}

impl<'a> ProcessMemory<'a> {
    pub fn new(process: &'a ProcessHandle) -> Self {
        Self { process }
    }
}

impl RemoteMemory for ProcessMemory<'_> {
    fn query_region(&self, address: u64) -> Result<RegionInfo> {
        let mbi = self
            .process
            .query(address)
            .ok_or(Error::RegionQueryFailed { address })?;
        let region_start = mbi.BaseAddress as u64;
        Ok(RegionInfo {
            base_address: address,
            region_start,
            region_end: region_start + mbi.RegionSize as u64,
            allocation_base: mbi.AllocationBase as u64,
            protection: mbi.Protect.0,
            is_listed_module: self.process.is_listed(region_start),
        })
    }

    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; size];
        let mut read = 0usize;
        // SAFETY: buffer is valid for `size` writable bytes.
        unsafe {
            ReadProcessMemory(
                self.process.handle,
                address as *const c_void,
                buffer.as_mut_ptr().cast(),
                size,
                Some(&mut read),
            )
        }
        .map_err(|e| Error::MemoryReadFailed {
            address,
            message: e.to_string(),
        })?;
        buffer.truncate(read);
        Ok(buffer)
    }

    fn region_committed_size(&self, address: u64) -> usize {
        match self.process.query(address) {
            Some(mbi) if mbi.State == MEM_COMMIT => {
                let offset = address.saturating_sub(mbi.BaseAddress as u64) as usize;
                mbi.RegionSize.saturating_sub(offset)
            }
            _ => 0,
        }
    }
}
