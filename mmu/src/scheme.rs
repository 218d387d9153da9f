//! # Paging Schemes
//!
//! Layout descriptors for the three page-based virtual memory systems. Each
//! scheme is a zero-sized type whose associated constants describe how a
//! virtual address splits into table indices and how a page table entry's
//! PPN splits into per-level slices. The walker is generic over
//! [`PagingScheme`], so each scheme gets its own monomorphized walk with the
//! geometry folded into constants.
//!
//! ## Virtual Address Layouts (4 KiB pages)
//!
//! ```text
//! Sv32:                     31     22 21     12 11        0
//!                           | VPN[1] | VPN[0] |  offset   |
//!                             10 bits  10 bits   12 bits
//!
//! Sv39:        38     30 29     21 20     12 11        0
//!              | VPN[2] | VPN[1] | VPN[0] |  offset   |
//!                9 bits   9 bits   9 bits   12 bits
//!
//! Sv48: 47     39 38     30 29     21 20     12 11        0
//!       | VPN[3] | VPN[2] | VPN[1] | VPN[0] |  offset   |
//! ```
//!
//! With a page size other than 4 KiB the offset field widens or narrows and
//! every index moves with it.

use crate::address::VirtualAddress;
use crate::entries::PageTableEntry;
use crate::memory::{BusError, PhysicalMemory};
use crate::mode::TranslationMode;

use static_assertions::{const_assert, const_assert_eq};

/// Deepest table of any supported scheme
pub const MAX_LEVELS: usize = 4;

/// Sum of a list of field widths
pub(crate) const fn total_width(widths: &[u32]) -> u32 {
    let mut sum = 0;
    let mut i = 0;
    while i < widths.len() {
        sum += widths[i];
        i += 1;
    }
    sum
}

#[inline]
const fn low_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1 << bits) - 1
    }
}

// ============================================================================
// Scheme Descriptor
// ============================================================================

/// Geometry of one page-based virtual memory scheme
pub trait PagingScheme {
    /// Mode this scheme implements
    const MODE: TranslationMode;
    /// Number of page table levels
    const LEVELS: usize;
    /// Index bits consumed per level
    const VPN_BITS: u32;
    /// Width of each PPN slice, level 0 first
    const PPN_WIDTHS: &'static [u32];
    /// Page table entry size in bytes
    const PTE_SIZE: u64;
    /// Whether the bits above the VA width must replicate its top bit
    /// (RV64 schemes) or be zero (Sv32 on RV32)
    const SIGN_EXTENDED_VA: bool;

    /// Width of the concatenated PPN
    const PPN_BITS: u32 = total_width(Self::PPN_WIDTHS);

    /// Fetch one raw entry from physical memory
    fn read_entry<M: PhysicalMemory + ?Sized>(
        memory: &M,
        addr: u64,
    ) -> Result<PageTableEntry, BusError>;

    /// Number of entries in one table
    #[inline]
    fn table_entries() -> u64 {
        1 << Self::VPN_BITS
    }

    /// Significant virtual address bits for the given page size
    #[inline]
    fn va_bits(page_bits: u32) -> u32 {
        page_bits + Self::LEVELS as u32 * Self::VPN_BITS
    }

    /// Check the bits above the significant VA width
    #[inline]
    fn is_canonical(va: VirtualAddress, page_bits: u32) -> bool {
        let width = Self::va_bits(page_bits);
        if Self::SIGN_EXTENDED_VA {
            va.is_sign_extended(width)
        } else {
            va.is_zero_extended(width)
        }
    }

    /// Table index used at `level`
    #[inline]
    fn index_at(va: VirtualAddress, level: usize, page_bits: u32) -> u64 {
        (va.as_u64() >> (page_bits + level as u32 * Self::VPN_BITS)) & low_mask(Self::VPN_BITS)
    }

    /// The concatenated PPN of an entry, limited to this scheme's width
    #[inline]
    fn entry_ppn(pte: PageTableEntry) -> u64 {
        pte.ppn() & low_mask(Self::PPN_BITS)
    }

    /// Mask a root PPN to this scheme's width
    #[inline]
    fn root_ppn(root: u64) -> u64 {
        root & low_mask(Self::PPN_BITS)
    }

    /// The `level`-th PPN slice of an entry
    #[inline]
    fn ppn_slice(pte: PageTableEntry, level: usize) -> u64 {
        let offset = total_width(&Self::PPN_WIDTHS[..level]);
        (pte.ppn() >> offset) & low_mask(Self::PPN_WIDTHS[level])
    }

    /// Bit position of slice `level` in the output physical address
    #[inline]
    fn ppn_shift(level: usize, page_bits: u32) -> u32 {
        page_bits + total_width(&Self::PPN_WIDTHS[..level])
    }

    /// Whether every PPN slice below `level` is zero, as a superpage requires
    #[inline]
    fn is_superpage_aligned(pte: PageTableEntry, level: usize) -> bool {
        (0..level).all(|lower| Self::ppn_slice(pte, lower) == 0)
    }
}

// ============================================================================
// Sv32
// ============================================================================

/// Sv32: 2 levels of 10-bit indices, 4-byte entries, 22-bit PPN
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sv32;

impl PagingScheme for Sv32 {
    const MODE: TranslationMode = TranslationMode::Sv32;
    const LEVELS: usize = 2;
    const VPN_BITS: u32 = 10;
    const PPN_WIDTHS: &'static [u32] = &[10, 12];
    const PTE_SIZE: u64 = 4;
    const SIGN_EXTENDED_VA: bool = false;

    fn read_entry<M: PhysicalMemory + ?Sized>(
        memory: &M,
        addr: u64,
    ) -> Result<PageTableEntry, BusError> {
        memory
            .read_u32(addr)
            .map(|word| PageTableEntry::from_bits(u64::from(word)))
    }
}

// ============================================================================
// Sv39
// ============================================================================

/// Sv39: 3 levels of 9-bit indices, 8-byte entries, 44-bit PPN
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sv39;

impl PagingScheme for Sv39 {
    const MODE: TranslationMode = TranslationMode::Sv39;
    const LEVELS: usize = 3;
    const VPN_BITS: u32 = 9;
    const PPN_WIDTHS: &'static [u32] = &[9, 9, 26];
    const PTE_SIZE: u64 = 8;
    const SIGN_EXTENDED_VA: bool = true;

    fn read_entry<M: PhysicalMemory + ?Sized>(
        memory: &M,
        addr: u64,
    ) -> Result<PageTableEntry, BusError> {
        memory.read_u64(addr).map(PageTableEntry::from_bits)
    }
}

// ============================================================================
// Sv48
// ============================================================================

/// Sv48: 4 levels of 9-bit indices, 8-byte entries, 44-bit PPN
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sv48;

impl PagingScheme for Sv48 {
    const MODE: TranslationMode = TranslationMode::Sv48;
    const LEVELS: usize = 4;
    const VPN_BITS: u32 = 9;
    const PPN_WIDTHS: &'static [u32] = &[9, 9, 9, 17];
    const PTE_SIZE: u64 = 8;
    const SIGN_EXTENDED_VA: bool = true;

    fn read_entry<M: PhysicalMemory + ?Sized>(
        memory: &M,
        addr: u64,
    ) -> Result<PageTableEntry, BusError> {
        memory.read_u64(addr).map(PageTableEntry::from_bits)
    }
}

// Geometry must agree with the mode table.
const_assert_eq!(Sv32::PPN_WIDTHS.len(), Sv32::LEVELS);
const_assert_eq!(Sv39::PPN_WIDTHS.len(), Sv39::LEVELS);
const_assert_eq!(Sv48::PPN_WIDTHS.len(), Sv48::LEVELS);
const_assert_eq!(Sv32::LEVELS, TranslationMode::Sv32.levels());
const_assert_eq!(Sv39::LEVELS, TranslationMode::Sv39.levels());
const_assert_eq!(Sv48::LEVELS, TranslationMode::Sv48.levels());
const_assert_eq!(Sv32::PTE_SIZE, TranslationMode::Sv32.entry_size());
const_assert_eq!(Sv39::PTE_SIZE, TranslationMode::Sv39.entry_size());
const_assert_eq!(Sv48::PTE_SIZE, TranslationMode::Sv48.entry_size());
const_assert_eq!(12 + Sv32::LEVELS as u32 * Sv32::VPN_BITS, TranslationMode::Sv32.va_bits());
const_assert_eq!(12 + Sv39::LEVELS as u32 * Sv39::VPN_BITS, TranslationMode::Sv39.va_bits());
const_assert_eq!(12 + Sv48::LEVELS as u32 * Sv48::VPN_BITS, TranslationMode::Sv48.va_bits());
const_assert_eq!(Sv32::PPN_BITS, 22);
const_assert_eq!(Sv39::PPN_BITS, PageTableEntry::MAX_PPN_BITS);
const_assert_eq!(Sv48::PPN_BITS, PageTableEntry::MAX_PPN_BITS);
const_assert!(Sv48::LEVELS <= MAX_LEVELS);

// ============================================================================
// Tests
// ============================================================================
