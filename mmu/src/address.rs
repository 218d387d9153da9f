//! # Address Types
//!
//! Type-safe virtual and physical addresses. Both wrap a full `u64`; the
//! active paging scheme decides which bits are significant.

use core::fmt;

// =============================================================================
// Virtual Address
// =============================================================================

/// A virtual address as issued by the hart
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct VirtualAddress(u64);

impl VirtualAddress {
    /// Create a new virtual address
    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Get the raw address value
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Get the offset within a page of `1 << page_bits` bytes
    #[inline]
    pub const fn page_offset(self, page_bits: u32) -> u64 {
        self.0 & ((1 << page_bits) - 1)
    }

    /// Check that bits `[63:width]` replicate bit `width - 1`
    #[inline]
    pub const fn is_sign_extended(self, width: u32) -> bool {
        if width >= 64 {
            return true;
        }
        let shift = 64 - width;
        (((self.0 << shift) as i64) >> shift) as u64 == self.0
    }

    /// Check that no bit at or above `width` is set
    #[inline]
    pub const fn is_zero_extended(self, width: u32) -> bool {
        width >= 64 || self.0 >> width == 0
    }

    /// Align down to a power-of-two boundary
    #[inline]
    pub const fn align_down(self, align: u64) -> Self {
        Self(self.0 & !(align - 1))
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualAddress({:#x})", self.0)
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for VirtualAddress {
    fn from(addr: u64) -> Self {
        Self::new(addr)
    }
}

// =============================================================================
// Physical Address
// =============================================================================

/// A physical memory address
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    /// Create a new physical address
    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Address of the first byte of physical page `ppn`
    #[inline]
    pub const fn from_ppn(ppn: u64, page_bits: u32) -> Self {
        Self(ppn << page_bits)
    }

    /// Get the raw address value
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Get the physical page number
    #[inline]
    pub const fn ppn(self, page_bits: u32) -> u64 {
        self.0 >> page_bits
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalAddress({:#x})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<PhysicalAddress> for u64 {
    fn from(addr: PhysicalAddress) -> Self {
        addr.0
    }
}

// =============================================================================
// Tests
// =============================================================================
