//! # Translator Configuration
//!
//! Per-hart translation state that the CSR layer supplies: the mode and root
//! table from `satp`, and the SUM / MXR bits from `sstatus`. The page size
//! is fixed when the translator is created.

use core::fmt;

use crate::mode::TranslationMode;

/// Smallest supported page size
pub const MIN_PAGE_SIZE: u64 = 2048;
/// Largest supported page size
///
/// A 44-bit PPN shifted by at most 20 page bits still fits in 64 bits.
pub const MAX_PAGE_SIZE: u64 = 1 << 20;
/// Architectural page size
pub const DEFAULT_PAGE_SIZE: u64 = 4096;

static_assertions::const_assert!(MIN_PAGE_SIZE.is_power_of_two());
static_assertions::const_assert!(MAX_PAGE_SIZE.is_power_of_two());
static_assertions::const_assert!(MIN_PAGE_SIZE <= DEFAULT_PAGE_SIZE && DEFAULT_PAGE_SIZE <= MAX_PAGE_SIZE);

// ============================================================================
// Configuration Error
// ============================================================================

/// Invalid translator configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Page size is not a power of two
    PageSizeNotPowerOfTwo(u64),
    /// Page size is below [`MIN_PAGE_SIZE`]
    PageSizeTooSmall(u64),
    /// Page size is above [`MAX_PAGE_SIZE`]
    PageSizeTooLarge(u64),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PageSizeNotPowerOfTwo(size) => {
                write!(f, "Page size {size:#x} is not a power of two")
            },
            Self::PageSizeTooSmall(size) => {
                write!(f, "Page size {size:#x} is below minimum {MIN_PAGE_SIZE:#x}")
            },
            Self::PageSizeTooLarge(size) => {
                write!(f, "Page size {size:#x} exceeds maximum {MAX_PAGE_SIZE:#x}")
            },
        }
    }
}

/// Check a page size and return its log2
pub const fn page_bits(page_size: u64) -> Result<u32, ConfigError> {
    if !page_size.is_power_of_two() {
        return Err(ConfigError::PageSizeNotPowerOfTwo(page_size));
    }
    if page_size < MIN_PAGE_SIZE {
        return Err(ConfigError::PageSizeTooSmall(page_size));
    }
    if page_size > MAX_PAGE_SIZE {
        return Err(ConfigError::PageSizeTooLarge(page_size));
    }
    Ok(page_size.trailing_zeros())
}

// ============================================================================
// Translation Configuration
// ============================================================================

/// Translation configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationConfig {
    /// Paging mode
    pub mode: TranslationMode,
    /// PPN of the root page table
    pub page_table_root: u64,
    /// Supervisor may access user pages (SUM)
    pub supervisor_ok: bool,
    /// Loads may read execute-only pages (MXR)
    pub exec_readable: bool,
    /// Page size in bytes
    pub page_size: u64,
}

impl TranslationConfig {
    /// Create a configuration with SUM and MXR clear and 4 KiB pages
    pub const fn new(mode: TranslationMode, page_table_root: u64) -> Self {
        Self {
            mode,
            page_table_root,
            supervisor_ok: false,
            exec_readable: false,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Set the page size
    pub const fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set SUM
    pub const fn with_supervisor_ok(mut self, supervisor_ok: bool) -> Self {
        self.supervisor_ok = supervisor_ok;
        self
    }

    /// Set MXR
    pub const fn with_exec_readable(mut self, exec_readable: bool) -> Self {
        self.exec_readable = exec_readable;
        self
    }

    /// Validate the configuration
    pub const fn validate(&self) -> Result<(), ConfigError> {
        match page_bits(self.page_size) {
            Ok(_) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self::new(TranslationMode::default(), 0)
    }
}
