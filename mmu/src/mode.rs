//! # Translation Modes
//!
//! The address-translation scheme selected by the `satp` CSR.
//!
//! ## Modes
//!
//! - Bare: no translation, `pa == va`
//! - Sv32: 32-bit virtual address, 2-level page table, 4-byte PTEs
//! - Sv39: 39-bit virtual address, 3-level page table, 8-byte PTEs
//! - Sv48: 48-bit virtual address, 4-level page table, 8-byte PTEs

use core::fmt;

// ============================================================================
// Translation Mode
// ============================================================================

/// Virtual memory schemes understood by the translator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranslationMode {
    /// No translation (identity)
    Bare,
    /// Sv32: 32-bit virtual address, 2-level page table
    Sv32,
    /// Sv39: 39-bit virtual address, 3-level page table
    Sv39,
    /// Sv48: 48-bit virtual address, 4-level page table
    Sv48,
}

impl TranslationMode {
    /// All modes, in ascending order of table depth
    pub const ALL: [Self; 4] = [Self::Bare, Self::Sv32, Self::Sv39, Self::Sv48];

    /// Get the number of page table levels
    pub const fn levels(self) -> usize {
        match self {
            Self::Bare => 0,
            Self::Sv32 => 2,
            Self::Sv39 => 3,
            Self::Sv48 => 4,
        }
    }

    /// Get the virtual address width in bits, assuming 4 KiB pages
    pub const fn va_bits(self) -> u32 {
        match self {
            Self::Bare => 64,
            Self::Sv32 => 32,
            Self::Sv39 => 39,
            Self::Sv48 => 48,
        }
    }

    /// Get the page table entry size in bytes
    pub const fn entry_size(self) -> u64 {
        match self {
            Self::Bare => 0,
            Self::Sv32 => 4,
            Self::Sv39 | Self::Sv48 => 8,
        }
    }

    /// Check if this mode walks page tables
    pub const fn is_paged(self) -> bool {
        !matches!(self, Self::Bare)
    }

    /// Get the mode name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bare => "Bare",
            Self::Sv32 => "Sv32",
            Self::Sv39 => "Sv39",
            Self::Sv48 => "Sv48",
        }
    }
}

impl Default for TranslationMode {
    fn default() -> Self {
        Self::Sv32
    }
}

impl fmt::Display for TranslationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Tests
// ============================================================================
