//! # Page Table Entries
//!
//! The page table entry value type shared by Sv32, Sv39 and Sv48. A 32-bit
//! Sv32 word is zero-extended into the same representation; the status bits
//! sit at identical positions in every scheme and the PPN always starts at
//! bit 10. How the PPN splits into per-level slices is a property of the
//! scheme (see [`crate::scheme`]).
//!
//! ## PTE Format (Sv39)
//!
//! ```text
//! 63    54 53    28 27    19 18    10 9  8 7 6 5 4 3 2 1 0
//! +-------+--------+--------+--------+----+-+-+-+-+-+-+-+-+
//! |Reserved| PPN[2] | PPN[1] | PPN[0] |RSW |D|A|G|U|X|W|R|V|
//! +-------+--------+--------+--------+----+-+-+-+-+-+-+-+-+
//!  10 bits  26 bits   9 bits   9 bits  2b  1 1 1 1 1 1 1 1
//! ```
//!
//! ## Permission Encoding
//!
//! | R | W | X | Meaning                          |
//! |---|---|---|----------------------------------|
//! | 0 | 0 | 0 | Pointer to next level            |
//! | 0 | 0 | 1 | Execute-only page                |
//! | 0 | 1 | 0 | Reserved (invalid)               |
//! | 0 | 1 | 1 | Reserved (invalid)               |
//! | 1 | 0 | 0 | Read-only page                   |
//! | 1 | 0 | 1 | Read-Execute page                |
//! | 1 | 1 | 0 | Read-Write page                  |
//! | 1 | 1 | 1 | Read-Write-Execute page          |

use core::fmt;

// ============================================================================
// Page Table Entry
// ============================================================================

/// Page table entry, widened to 64 bits
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct PageTableEntry(u64);

impl PageTableEntry {
    // PTE bit positions
    /// Valid bit
    pub const V_BIT: u64 = 1 << 0;
    /// Read permission
    pub const R_BIT: u64 = 1 << 1;
    /// Write permission
    pub const W_BIT: u64 = 1 << 2;
    /// Execute permission
    pub const X_BIT: u64 = 1 << 3;
    /// User mode accessible
    pub const U_BIT: u64 = 1 << 4;
    /// Global mapping
    pub const G_BIT: u64 = 1 << 5;
    /// Accessed
    pub const A_BIT: u64 = 1 << 6;
    /// Dirty
    pub const D_BIT: u64 = 1 << 7;

    /// Full PPN shift
    pub const PPN_SHIFT: u32 = 10;
    /// Widest PPN of any supported scheme (Sv39/Sv48)
    pub const MAX_PPN_BITS: u32 = 44;

    /// RWX permission mask
    pub const RWX_MASK: u64 = Self::R_BIT | Self::W_BIT | Self::X_BIT;

    /// All flags mask (bits 0-9)
    pub const FLAGS_MASK: u64 = (1 << Self::PPN_SHIFT) - 1;

    /// Create an invalid (zero) entry
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Create from raw bits
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Get raw bits
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Check if entry is valid
    pub const fn is_valid(self) -> bool {
        self.0 & Self::V_BIT != 0
    }

    /// Check if readable
    pub const fn is_readable(self) -> bool {
        self.0 & Self::R_BIT != 0
    }

    /// Check if writable
    pub const fn is_writable(self) -> bool {
        self.0 & Self::W_BIT != 0
    }

    /// Check if executable
    pub const fn is_executable(self) -> bool {
        self.0 & Self::X_BIT != 0
    }

    /// Check if user accessible
    pub const fn is_user(self) -> bool {
        self.0 & Self::U_BIT != 0
    }

    /// Check if global
    pub const fn is_global(self) -> bool {
        self.0 & Self::G_BIT != 0
    }

    /// Check if accessed
    pub const fn is_accessed(self) -> bool {
        self.0 & Self::A_BIT != 0
    }

    /// Check if dirty
    pub const fn is_dirty(self) -> bool {
        self.0 & Self::D_BIT != 0
    }

    /// `W` without `R`: an encoding reserved for future use
    pub const fn is_reserved_encoding(self) -> bool {
        !self.is_readable() && self.is_writable()
    }

    /// Check if entry is a leaf (R or X set)
    ///
    /// Only meaningful once the entry is known to be valid and not reserved.
    pub const fn is_leaf(self) -> bool {
        self.is_readable() || self.is_executable()
    }

    /// Check if entry points to the next level table
    pub const fn is_pointer(self) -> bool {
        self.is_valid() && self.0 & Self::RWX_MASK == 0
    }

    /// Get the concatenated physical page number, unmasked beyond 44 bits
    pub const fn ppn(self) -> u64 {
        (self.0 >> Self::PPN_SHIFT) & ((1 << Self::MAX_PPN_BITS) - 1)
    }

    /// Get the two RSW bits
    pub const fn rsw(self) -> u8 {
        ((self.0 >> 8) & 0b11) as u8
    }

    /// Get the flags
    pub const fn flags(self) -> PteFlags {
        PteFlags::from_bits_truncate(self.0 as u16)
    }

    /// Create a leaf entry for physical page `ppn`
    pub const fn new_page(ppn: u64, flags: PteFlags) -> Self {
        Self((ppn << Self::PPN_SHIFT) | flags.bits() as u64 | Self::V_BIT)
    }

    /// Create a pointer to the next level table at physical page `ppn`
    pub const fn new_table(ppn: u64) -> Self {
        Self((ppn << Self::PPN_SHIFT) | Self::V_BIT)
    }
}

impl Default for PageTableEntry {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for PageTableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageTableEntry")
            .field("valid", &self.is_valid())
            .field("leaf", &self.is_leaf())
            .field("ppn", &format_args!("{:#x}", self.ppn()))
            .field("flags", &self.flags())
            .finish()
    }
}

impl fmt::Display for PageTableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |set: bool, c: char| if set { c } else { '-' };
        write!(
            f,
            "ppn={:#x} {}{}{}{}{}{}{}{}",
            self.ppn(),
            flag(self.is_dirty(), 'D'),
            flag(self.is_accessed(), 'A'),
            flag(self.is_global(), 'G'),
            flag(self.is_user(), 'U'),
            flag(self.is_executable(), 'X'),
            flag(self.is_writable(), 'W'),
            flag(self.is_readable(), 'R'),
            flag(self.is_valid(), 'V'),
        )
    }
}

// ============================================================================
// Page Flags
// ============================================================================

bitflags::bitflags! {
    /// Page table entry flags (bits 0-9)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PteFlags: u16 {
        /// Valid
        const VALID = 1 << 0;
        /// Readable
        const READ = 1 << 1;
        /// Writable
        const WRITE = 1 << 2;
        /// Executable
        const EXEC = 1 << 3;
        /// User accessible
        const USER = 1 << 4;
        /// Global mapping
        const GLOBAL = 1 << 5;
        /// Accessed
        const ACCESSED = 1 << 6;
        /// Dirty
        const DIRTY = 1 << 7;
        /// Reserved for software 0
        const RSW0 = 1 << 8;
        /// Reserved for software 1
        const RSW1 = 1 << 9;
    }
}

impl PteFlags {
    /// Read-only page
    pub const RO: Self = Self::READ;
    /// Read-write page
    pub const RW: Self = Self::READ.union(Self::WRITE);
    /// Read-execute page
    pub const RX: Self = Self::READ.union(Self::EXEC);
    /// Read-write-execute page
    pub const RWX: Self = Self::READ.union(Self::WRITE).union(Self::EXEC);
    /// Execute-only page
    pub const XO: Self = Self::EXEC;

    /// Accessed and dirty, as set by software that pre-marks its mappings
    pub const AD: Self = Self::ACCESSED.union(Self::DIRTY);

    /// User data (RW, user, A/D)
    pub const USER_DATA: Self = Self::RW.union(Self::USER).union(Self::AD).union(Self::VALID);
    /// User code (RX, user, A)
    pub const USER_CODE: Self = Self::RX.union(Self::USER).union(Self::ACCESSED).union(Self::VALID);
    /// Supervisor data (RW, global, A/D)
    pub const KERNEL_DATA: Self = Self::RW.union(Self::GLOBAL).union(Self::AD).union(Self::VALID);
}

impl Default for PteFlags {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// Entry Builder
// ============================================================================

/// Builder for page table entries
#[derive(Debug, Clone, Copy)]
pub struct PageEntryBuilder {
    bits: u64,
}

impl PageEntryBuilder {
    /// Create a new builder
    pub const fn new() -> Self {
        Self { bits: 0 }
    }

    /// Set the physical page number
    pub const fn ppn(mut self, ppn: u64) -> Self {
        let field = ((1u64 << PageTableEntry::MAX_PPN_BITS) - 1) << PageTableEntry::PPN_SHIFT;
        self.bits = (self.bits & !field) | ((ppn << PageTableEntry::PPN_SHIFT) & field);
        self
    }

    /// Add flags
    pub const fn flags(mut self, flags: PteFlags) -> Self {
        self.bits |= flags.bits() as u64;
        self
    }

    /// Set valid bit
    pub const fn valid(mut self) -> Self {
        self.bits |= PageTableEntry::V_BIT;
        self
    }

    /// Set readable
    pub const fn readable(mut self) -> Self {
        self.bits |= PageTableEntry::R_BIT;
        self
    }

    /// Set writable
    pub const fn writable(mut self) -> Self {
        self.bits |= PageTableEntry::W_BIT;
        self
    }

    /// Set executable
    pub const fn executable(mut self) -> Self {
        self.bits |= PageTableEntry::X_BIT;
        self
    }

    /// Set user accessible
    pub const fn user(mut self) -> Self {
        self.bits |= PageTableEntry::U_BIT;
        self
    }

    /// Set global
    pub const fn global(mut self) -> Self {
        self.bits |= PageTableEntry::G_BIT;
        self
    }

    /// Set accessed
    pub const fn accessed(mut self) -> Self {
        self.bits |= PageTableEntry::A_BIT;
        self
    }

    /// Set dirty
    pub const fn dirty(mut self) -> Self {
        self.bits |= PageTableEntry::D_BIT;
        self
    }

    /// Build the entry
    pub const fn build(self) -> PageTableEntry {
        PageTableEntry(self.bits)
    }
}

impl Default for PageEntryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(PageTableEntry: Copy, Send, Sync);

// ============================================================================
// Tests
// ============================================================================
