//! # Translation Faults
//!
//! A translation ends in one of two architectural verdicts:
//!
//! - **Page fault**: the walk read everything it needed but the mapping is
//!   invalid, forbidden, misaligned, or lacks its A/D bits.
//! - **Access fault**: a memory transaction the walk itself required failed.
//!
//! [`FaultReason`] records which check produced the verdict, and
//! [`ExceptionCause`] is what the trap dispatcher vectors on.

use core::fmt;

use crate::access::AccessType;
use crate::address::VirtualAddress;

// ============================================================================
// Verdict
// ============================================================================

/// Architectural fault category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// Structural or permission failure of the mapping
    PageFault,
    /// A page table read failed on the bus
    AccessFault,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PageFault => write!(f, "page fault"),
            Self::AccessFault => write!(f, "access fault"),
        }
    }
}

/// The check that stopped the walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultReason {
    /// Upper VA bits are not a sign (or zero) extension of the VA width
    NonCanonical,
    /// Reading the entry at `addr` failed
    BusError {
        /// Physical address of the entry
        addr: u64,
    },
    /// V bit clear
    Invalid,
    /// R=0, W=1
    ReservedEncoding,
    /// Pointer entry at level 0
    DepthExceeded,
    /// User access to a page without U
    NotUserPage,
    /// Supervisor access to a U page with SUM clear
    UserPageFromSupervisor,
    /// Requested intent not granted by R/W/X (after MXR)
    PermissionDenied,
    /// Superpage with a non-zero lower PPN slice
    MisalignedSuperpage,
    /// A bit clear
    AccessedClear,
    /// Store to a page with D clear
    DirtyClear,
}

impl FaultReason {
    /// The verdict this reason produces
    pub const fn kind(self) -> FaultKind {
        match self {
            Self::BusError { .. } => FaultKind::AccessFault,
            _ => FaultKind::PageFault,
        }
    }
}

impl fmt::Display for FaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonCanonical => write!(f, "Address is not canonical"),
            Self::BusError { addr } => write!(f, "Bus error reading entry at {:#x}", addr),
            Self::Invalid => write!(f, "Entry not valid"),
            Self::ReservedEncoding => write!(f, "Reserved R/W encoding"),
            Self::DepthExceeded => write!(f, "Pointer entry at last level"),
            Self::NotUserPage => write!(f, "User access to supervisor page"),
            Self::UserPageFromSupervisor => write!(f, "Supervisor access to user page"),
            Self::PermissionDenied => write!(f, "Permission denied"),
            Self::MisalignedSuperpage => write!(f, "Misaligned superpage"),
            Self::AccessedClear => write!(f, "Accessed bit clear"),
            Self::DirtyClear => write!(f, "Dirty bit clear"),
        }
    }
}

// ============================================================================
// Translation Fault
// ============================================================================

/// A failed translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationFault {
    /// Why the walk stopped
    pub reason: FaultReason,
    /// The address being translated
    pub va: VirtualAddress,
    /// Page table level the walk was at
    pub level: usize,
    /// Originating access category
    pub access: AccessType,
}

impl TranslationFault {
    /// Create a new fault
    pub const fn new(
        reason: FaultReason,
        va: VirtualAddress,
        level: usize,
        access: AccessType,
    ) -> Self {
        Self {
            reason,
            va,
            level,
            access,
        }
    }

    /// The architectural verdict
    pub const fn kind(&self) -> FaultKind {
        self.reason.kind()
    }

    /// Check for a page fault
    pub const fn is_page_fault(&self) -> bool {
        matches!(self.kind(), FaultKind::PageFault)
    }

    /// Check for an access fault
    pub const fn is_access_fault(&self) -> bool {
        matches!(self.kind(), FaultKind::AccessFault)
    }

    /// The exception the trap dispatcher should raise
    pub const fn cause(&self) -> ExceptionCause {
        ExceptionCause::for_fault(self.kind(), self.access)
    }
}

impl fmt::Display for TranslationFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} at {} (level {}): {}",
            self.access,
            self.kind(),
            self.va,
            self.level,
            self.reason
        )
    }
}

// ============================================================================
// Exception Causes
// ============================================================================

/// The subset of RISC-V exception causes a translation can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ExceptionCause {
    /// Instruction access fault
    InstAccessFault  = 1,
    /// Load access fault
    LoadAccessFault  = 5,
    /// Store/AMO access fault
    StoreAccessFault = 7,
    /// Instruction page fault
    InstPageFault    = 12,
    /// Load page fault
    LoadPageFault    = 13,
    /// Store/AMO page fault
    StorePageFault   = 15,
}

impl ExceptionCause {
    /// Map a verdict and access category to its cause
    pub const fn for_fault(kind: FaultKind, access: AccessType) -> Self {
        match (kind, access) {
            (FaultKind::AccessFault, AccessType::Fetch) => Self::InstAccessFault,
            (FaultKind::AccessFault, AccessType::Load) => Self::LoadAccessFault,
            (FaultKind::AccessFault, AccessType::Store) => Self::StoreAccessFault,
            (FaultKind::PageFault, AccessType::Fetch) => Self::InstPageFault,
            (FaultKind::PageFault, AccessType::Load) => Self::LoadPageFault,
            (FaultKind::PageFault, AccessType::Store) => Self::StorePageFault,
        }
    }

    /// The `mcause`/`scause` exception code
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Decode an exception code, if it is one of the translation causes
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::InstAccessFault),
            5 => Some(Self::LoadAccessFault),
            7 => Some(Self::StoreAccessFault),
            12 => Some(Self::InstPageFault),
            13 => Some(Self::LoadPageFault),
            15 => Some(Self::StorePageFault),
            _ => None,
        }
    }

    /// Get the cause name
    pub const fn name(self) -> &'static str {
        match self {
            Self::InstAccessFault => "INST_ACC_FAULT",
            Self::LoadAccessFault => "LOAD_ACC_FAULT",
            Self::StoreAccessFault => "STORE_ACC_FAULT",
            Self::InstPageFault => "INST_PAGE_FAULT",
            Self::LoadPageFault => "LOAD_PAGE_FAULT",
            Self::StorePageFault => "STORE_PAGE_FAULT",
        }
    }
}

impl fmt::Display for ExceptionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

// ============================================================================
// Tests
// ============================================================================
