//! # Physical Memory
//!
//! The read side of the physical address space, as seen by the page table
//! walker. Words are little-endian. A failed read is a bus error, which the
//! walker reports as an access fault.
//!
//! [`SparseMemory`] is a simple backing store for simulators and tests:
//! declared regions of zero-initialised RAM kept in 4 KiB chunks.

use core::fmt;
use core::ops::Range;

use alloc::boxed::Box;
use alloc::vec::Vec;
use hashbrown::HashMap;

// ============================================================================
// Bus Error
// ============================================================================

/// A physical memory transaction that could not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusError {
    /// Physical address of the failed access
    pub addr: u64,
}

impl BusError {
    /// Create a bus error at `addr`
    pub const fn new(addr: u64) -> Self {
        Self { addr }
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bus error at physical address {:#x}", self.addr)
    }
}

// ============================================================================
// Physical Memory Interface
// ============================================================================

/// Source of page table entries
pub trait PhysicalMemory {
    /// Read a little-endian 32-bit word
    fn read_u32(&self, addr: u64) -> Result<u32, BusError>;

    /// Read a little-endian 64-bit word
    fn read_u64(&self, addr: u64) -> Result<u64, BusError>;
}

impl<M: PhysicalMemory + ?Sized> PhysicalMemory for &M {
    #[inline]
    fn read_u32(&self, addr: u64) -> Result<u32, BusError> {
        (**self).read_u32(addr)
    }

    #[inline]
    fn read_u64(&self, addr: u64) -> Result<u64, BusError> {
        (**self).read_u64(addr)
    }
}

/// Memory shared between harts; each read takes the lock for its duration
impl<M: PhysicalMemory> PhysicalMemory for spin::Mutex<M> {
    fn read_u32(&self, addr: u64) -> Result<u32, BusError> {
        self.lock().read_u32(addr)
    }

    fn read_u64(&self, addr: u64) -> Result<u64, BusError> {
        self.lock().read_u64(addr)
    }
}

// ============================================================================
// Sparse Memory
// ============================================================================

/// Backing chunk size
pub const CHUNK_SIZE: usize = 4096;

const CHUNK_SHIFT: u32 = CHUNK_SIZE.trailing_zeros();

static_assertions::const_assert!(CHUNK_SIZE.is_power_of_two());

/// Sparse physical memory made of declared RAM regions
///
/// Bytes inside a region read as zero until written. Any access touching a
/// byte outside every region fails with [`BusError`].
#[derive(Default)]
pub struct SparseMemory {
    /// Declared RAM regions
    regions: Vec<Range<u64>>,
    /// Chunk number to chunk contents
    chunks: HashMap<u64, Box<[u8; CHUNK_SIZE]>>,
}

impl SparseMemory {
    /// Create an empty address space with no RAM
    pub fn new() -> Self {
        Self::default()
    }

    /// Create memory with a single RAM region
    pub fn with_region(base: u64, len: u64) -> Self {
        let mut memory = Self::new();
        memory.add_region(base, len);
        memory
    }

    /// Declare `[base, base + len)` as RAM
    pub fn add_region(&mut self, base: u64, len: u64) {
        let end = base.saturating_add(len);
        log::debug!("SparseMemory: region {:#x}..{:#x}", base, end);
        self.regions.push(base..end);
    }

    /// Declared regions
    pub fn regions(&self) -> &[Range<u64>] {
        &self.regions
    }

    /// Number of chunks that have been written
    pub fn resident_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Check that `[addr, addr + len)` lies inside one region
    fn check(&self, addr: u64, len: usize) -> Result<(), BusError> {
        let end = addr.checked_add(len as u64).ok_or(BusError::new(addr))?;
        if self
            .regions
            .iter()
            .any(|region| region.start <= addr && end <= region.end)
        {
            Ok(())
        } else {
            Err(BusError::new(addr))
        }
    }

    /// Read bytes into `buf`
    pub fn read_bytes(&self, addr: u64, buf: &mut [u8]) -> Result<(), BusError> {
        self.check(addr, buf.len())?;
        for (i, byte) in buf.iter_mut().enumerate() {
            let at = addr + i as u64;
            *byte = self
                .chunks
                .get(&(at >> CHUNK_SHIFT))
                .map_or(0, |chunk| chunk[(at as usize) & (CHUNK_SIZE - 1)]);
        }
        Ok(())
    }

    /// Write bytes from `buf`
    pub fn write_bytes(&mut self, addr: u64, buf: &[u8]) -> Result<(), BusError> {
        self.check(addr, buf.len())?;
        for (i, byte) in buf.iter().enumerate() {
            let at = addr + i as u64;
            let chunk = self
                .chunks
                .entry(at >> CHUNK_SHIFT)
                .or_insert_with(|| Box::new([0; CHUNK_SIZE]));
            chunk[(at as usize) & (CHUNK_SIZE - 1)] = *byte;
        }
        Ok(())
    }

    /// Write a little-endian 32-bit word
    pub fn write_u32(&mut self, addr: u64, value: u32) -> Result<(), BusError> {
        self.write_bytes(addr, &value.to_le_bytes())
    }

    /// Write a little-endian 64-bit word
    pub fn write_u64(&mut self, addr: u64, value: u64) -> Result<(), BusError> {
        self.write_bytes(addr, &value.to_le_bytes())
    }
}

impl PhysicalMemory for SparseMemory {
    fn read_u32(&self, addr: u64) -> Result<u32, BusError> {
        let mut bytes = [0; 4];
        self.read_bytes(addr, &mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_u64(&self, addr: u64) -> Result<u64, BusError> {
        let mut bytes = [0; 8];
        self.read_bytes(addr, &mut bytes)?;
        Ok(u64::from_le_bytes(bytes))
    }
}

impl fmt::Debug for SparseMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseMemory")
            .field("regions", &self.regions)
            .field("resident_chunks", &self.chunks.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
