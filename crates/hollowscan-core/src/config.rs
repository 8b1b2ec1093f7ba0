//! Scanner configuration
//!
//! Page granularity and the supported architecture table are configuration
//! rather than compiled-in constants, so synthetic layouts can be scanned in
//! tests. Defaults match x86/x64 Windows.
//!
//! ```toml
//! page_size = 4096
//! max_file_header_sections = 100
//!
//! [[architectures]]
//! name = "amd64"
//! machine = 0x8664
//! optional_header_size = 240
//! required_characteristics = 0x22
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::memory::layout::{PAGE_SIZE, file_flags, machine, optional_header};

/// Sanity ceiling on NumberOfSections in a plausible file header
pub const DEFAULT_MAX_FILE_HEADER_SECTIONS: u16 = 100;

/// One supported machine type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Architecture {
    pub name: String,
    /// Machine word as it appears in the file header
    pub machine: u16,
    /// Minimum SizeOfOptionalHeader for this machine
    pub optional_header_size: u16,
    /// File header characteristics a loaded image of this machine always carries
    pub required_characteristics: u16,
}

impl Architecture {
    pub fn i386() -> Self {
        Self {
            name: "i386".to_string(),
            machine: machine::I386,
            optional_header_size: optional_header::SIZE_32,
            required_characteristics: file_flags::EXECUTABLE_IMAGE | file_flags::MACHINE_32BIT,
        }
    }

    pub fn amd64() -> Self {
        Self {
            name: "amd64".to_string(),
            machine: machine::AMD64,
            optional_header_size: optional_header::SIZE_64,
            required_characteristics: file_flags::EXECUTABLE_IMAGE
                | file_flags::LARGE_ADDRESS_AWARE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub page_size: usize,
    pub max_file_header_sections: u16,
    /// Searched in order when looking for a file header
    pub architectures: Vec<Architecture>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            max_file_header_sections: DEFAULT_MAX_FILE_HEADER_SECTIONS,
            architectures: vec![Architecture::i386(), Architecture::amd64()],
        }
    }
}

impl ScanConfig {
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Load a TOML configuration; absent fields keep their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config: ScanConfig = toml::from_str(&content)?;
        config.validate()?;
        debug!("Loaded scan config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.page_size.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "page_size must be a non-zero power of two, got {}",
                self.page_size
            )));
        }
        if self.architectures.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one architecture is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn architecture_for(&self, machine: u16) -> Option<&Architecture> {
        self.architectures.iter().find(|a| a.machine == machine)
    }
}

/// Builder for ScanConfig
#[derive(Debug, Clone, Default)]
pub struct ScanConfigBuilder {
    page_size: Option<usize>,
    max_file_header_sections: Option<u16>,
    architectures: Option<Vec<Architecture>>,
}

impl ScanConfigBuilder {
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn max_file_header_sections(mut self, count: u16) -> Self {
        self.max_file_header_sections = Some(count);
        self
    }

    pub fn architectures(mut self, architectures: Vec<Architecture>) -> Self {
        self.architectures = Some(architectures);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<ScanConfig> {
        let default = ScanConfig::default();
        let config = ScanConfig {
            page_size: self.page_size.unwrap_or(default.page_size),
            max_file_header_sections: self
                .max_file_header_sections
                .unwrap_or(default.max_file_header_sections),
            architectures: self.architectures.unwrap_or(default.architectures),
        };
        config.validate()?;
        Ok(config)
    }
}
