//! # Access Intents
//!
//! What a memory access wants to do with the page it touches. A request
//! normally carries exactly one intent; when several are set, every one of
//! them must be permitted by the leaf entry.

use core::fmt;

bitflags::bitflags! {
    /// Set of access intents for one translation request
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Access: u8 {
        /// Data load
        const READ = 1 << 0;
        /// Data store
        const WRITE = 1 << 1;
        /// Instruction fetch
        const EXEC = 1 << 2;
    }
}

impl Access {
    /// Build an intent set from the three request booleans
    pub const fn from_bools(read: bool, write: bool, exec: bool) -> Self {
        let mut bits = 0;
        if read {
            bits |= Self::READ.bits();
        }
        if write {
            bits |= Self::WRITE.bits();
        }
        if exec {
            bits |= Self::EXEC.bits();
        }
        Self::from_bits_truncate(bits)
    }

    /// The access category reported with a fault for this intent set
    pub const fn access_type(self) -> AccessType {
        if self.contains(Self::WRITE) {
            AccessType::Store
        } else if self.contains(Self::EXEC) {
            AccessType::Fetch
        } else {
            AccessType::Load
        }
    }
}

impl Default for Access {
    fn default() -> Self {
        Self::READ
    }
}

// ============================================================================
// Access Type
// ============================================================================

/// Architectural category of the access that triggered a translation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessType {
    /// Instruction fetch
    Fetch,
    /// Load
    Load,
    /// Store or AMO
    Store,
}

impl AccessType {
    /// The single intent matching this category
    pub const fn intent(self) -> Access {
        match self {
            Self::Fetch => Access::EXEC,
            Self::Load => Access::READ,
            Self::Store => Access::WRITE,
        }
    }
}

impl From<AccessType> for Access {
    fn from(ty: AccessType) -> Self {
        ty.intent()
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => write!(f, "fetch"),
            Self::Load => write!(f, "load"),
            Self::Store => write!(f, "store"),
        }
    }
}
