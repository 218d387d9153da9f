//! # Page Table Walker
//!
//! Virtual-to-physical translation for one hart. The [`Translator`] borrows
//! the physical memory that holds the page tables and carries the
//! per-hart configuration; every call to [`Translator::translate`] is an
//! independent, bounded walk of at most `LEVELS` entry reads.
//!
//! ## Walk
//!
//! ```text
//!   Descend(L-1) ──fetch──► invalid / reserved ────────────► Fault
//!        │                  bus error ──────────────────────► Fault
//!        │                  pointer, i == 0 ────────────────► Fault
//!        │                  pointer, i > 0 ──► Descend(i-1)
//!        ▼
//!      Leaf ──► U/S gating ─► R/W/X (+MXR) ─► superpage alignment ─► A/D ─► Ok
//! ```
//!
//! The order of the leaf checks decides which fault is reported when
//! several conditions hold at once.

use core::fmt;

use arrayvec::ArrayVec;

use crate::access::Access;
use crate::address::{PhysicalAddress, VirtualAddress};
use crate::config::{self, ConfigError, TranslationConfig};
use crate::entries::PageTableEntry;
use crate::fault::{FaultReason, TranslationFault};
use crate::memory::PhysicalMemory;
use crate::mode::TranslationMode;
use crate::privilege::PrivilegeMode;
use crate::scheme::{PagingScheme, Sv32, Sv39, Sv48, MAX_LEVELS};

// =============================================================================
// Translation Result
// =============================================================================

/// One entry read during a walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkStep {
    /// Level of the table the entry was read from
    pub level: usize,
    /// Physical address of the entry
    pub entry_addr: PhysicalAddress,
    /// The entry as read
    pub entry: PageTableEntry,
}

/// A successful translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Virtual address that was translated
    pub virtual_address: VirtualAddress,

    /// Physical address it maps to
    pub physical_address: PhysicalAddress,

    /// Level of the leaf entry (0 for a base page)
    pub level: usize,

    /// Bytes covered by the leaf mapping
    pub page_size: u64,

    /// Entries read, root first; empty in Bare mode
    pub steps: ArrayVec<WalkStep, MAX_LEVELS>,
}

impl Translation {
    fn identity(va: VirtualAddress, page_size: u64) -> Self {
        Self {
            virtual_address: va,
            physical_address: PhysicalAddress::new(va.as_u64()),
            level: 0,
            page_size,
            steps: ArrayVec::new(),
        }
    }

    /// The leaf entry, if a walk took place
    #[inline]
    pub fn leaf(&self) -> Option<&WalkStep> {
        self.steps.last()
    }

    /// Check if the mapping is a superpage
    #[inline]
    pub const fn is_superpage(&self) -> bool {
        self.level > 0
    }
}

impl fmt::Display for Translation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} (level {}, {:#x} bytes)",
            self.virtual_address, self.physical_address, self.level, self.page_size
        )
    }
}

// =============================================================================
// Translator
// =============================================================================

/// Page table walker for one hart
pub struct Translator<'m, M: PhysicalMemory + ?Sized> {
    /// Backing store holding the page tables
    memory: &'m M,

    /// Mode, root, SUM, MXR and page size
    config: TranslationConfig,

    /// log2 of the page size
    page_bits: u32,
}

impl<'m, M: PhysicalMemory + ?Sized> Translator<'m, M> {
    /// Create a translator in Sv32 mode with root PPN 0
    pub fn new(memory: &'m M, page_size: u64) -> Result<Self, ConfigError> {
        Self::with_config(memory, TranslationConfig::default().with_page_size(page_size))
    }

    /// Create a translator from a full configuration
    pub fn with_config(memory: &'m M, config: TranslationConfig) -> Result<Self, ConfigError> {
        let page_bits = config::page_bits(config.page_size)?;
        log::debug!(
            "Translator: {} root={:#x} page_size={:#x}",
            config.mode,
            config.page_table_root,
            config.page_size
        );
        Ok(Self {
            memory,
            config,
            page_bits,
        })
    }

    /// Select the translation mode
    pub fn set_mode(&mut self, mode: TranslationMode) {
        log::debug!("Translator: mode {} -> {}", self.config.mode, mode);
        self.config.mode = mode;
    }

    /// Set the PPN of the root page table
    pub fn set_page_table_root(&mut self, root: u64) {
        log::debug!("Translator: root {:#x}", root);
        self.config.page_table_root = root;
    }

    /// Allow supervisor access to user pages (SUM)
    pub fn set_supervisor_ok(&mut self, enabled: bool) {
        self.config.supervisor_ok = enabled;
    }

    /// Allow loads from execute-only pages (MXR)
    pub fn set_exec_readable(&mut self, enabled: bool) {
        self.config.exec_readable = enabled;
    }

    /// Current mode
    #[inline]
    pub const fn mode(&self) -> TranslationMode {
        self.config.mode
    }

    /// Current root PPN
    #[inline]
    pub const fn page_table_root(&self) -> u64 {
        self.config.page_table_root
    }

    /// SUM state
    #[inline]
    pub const fn supervisor_ok(&self) -> bool {
        self.config.supervisor_ok
    }

    /// MXR state
    #[inline]
    pub const fn exec_readable(&self) -> bool {
        self.config.exec_readable
    }

    /// Page size in bytes
    #[inline]
    pub const fn page_size(&self) -> u64 {
        self.config.page_size
    }

    /// log2 of the page size
    #[inline]
    pub const fn page_bits(&self) -> u32 {
        self.page_bits
    }

    /// Full configuration
    #[inline]
    pub const fn config(&self) -> &TranslationConfig {
        &self.config
    }

    /// The memory the tables are read from
    #[inline]
    pub const fn memory(&self) -> &'m M {
        self.memory
    }

    /// Translate `va` for the given intents
    ///
    /// Exactly one of `read`, `write` and `exec` is normally set; when several
    /// are, all of them must be permitted.
    pub fn translate(
        &self,
        va: u64,
        privilege: PrivilegeMode,
        read: bool,
        write: bool,
        exec: bool,
    ) -> Result<u64, TranslationFault> {
        self.translate_detailed(
            VirtualAddress::new(va),
            privilege,
            Access::from_bools(read, write, exec),
        )
        .map(|translation| translation.physical_address.as_u64())
    }

    /// Translate `va` and report the walk that produced the mapping
    pub fn translate_detailed(
        &self,
        va: VirtualAddress,
        privilege: PrivilegeMode,
        access: Access,
    ) -> Result<Translation, TranslationFault> {
        match self.config.mode {
            TranslationMode::Bare => Ok(Translation::identity(va, self.config.page_size)),
            TranslationMode::Sv32 => self.walk::<Sv32>(va, privilege, access),
            TranslationMode::Sv39 => self.walk::<Sv39>(va, privilege, access),
            TranslationMode::Sv48 => self.walk::<Sv48>(va, privilege, access),
        }
    }

    /// Check if `va` translates for the given intents
    pub fn is_mapped(&self, va: u64, privilege: PrivilegeMode, access: Access) -> bool {
        self.translate_detailed(VirtualAddress::new(va), privilege, access)
            .is_ok()
    }

    /// Check that every page of `[start, start + len)` translates
    pub fn is_range_accessible(
        &self,
        start: u64,
        len: u64,
        privilege: PrivilegeMode,
        access: Access,
    ) -> bool {
        if len == 0 {
            return true;
        }
        let Some(end) = start.checked_add(len) else {
            return false;
        };
        // Identity maps every address
        if self.config.mode == TranslationMode::Bare {
            return true;
        }

        let mut current = VirtualAddress::new(start).align_down(self.config.page_size);
        while current.as_u64() < end {
            match self.translate_detailed(current, privilege, access) {
                Ok(info) => {
                    let base = current.align_down(info.page_size).as_u64();
                    match base.checked_add(info.page_size) {
                        Some(next) => current = VirtualAddress::new(next),
                        None => return true,
                    }
                },
                Err(_) => return false,
            }
        }

        true
    }

    fn fault(
        &self,
        reason: FaultReason,
        va: VirtualAddress,
        level: usize,
        access: Access,
    ) -> TranslationFault {
        let fault = TranslationFault::new(reason, va, level, access.access_type());
        log::debug!("{}: {}", self.config.mode, fault);
        fault
    }

    /// Walk the tables of scheme `S`
    fn walk<S: PagingScheme>(
        &self,
        va: VirtualAddress,
        privilege: PrivilegeMode,
        access: Access,
    ) -> Result<Translation, TranslationFault> {
        let page_bits = self.page_bits;
        let mut level = S::LEVELS - 1;

        if !S::is_canonical(va, page_bits) {
            return Err(self.fault(FaultReason::NonCanonical, va, level, access));
        }

        let mut table = S::root_ppn(self.config.page_table_root);
        let mut steps = ArrayVec::<WalkStep, MAX_LEVELS>::new();

        let pte = loop {
            let entry_addr = (table << page_bits) + S::index_at(va, level, page_bits) * S::PTE_SIZE;
            let pte = S::read_entry(self.memory, entry_addr).map_err(|err| {
                self.fault(FaultReason::BusError { addr: err.addr }, va, level, access)
            })?;

            log::trace!(
                "{}: va={} level={} entry@{:#x} = {:#x}",
                S::MODE,
                va,
                level,
                entry_addr,
                pte.bits()
            );
            steps.push(WalkStep {
                level,
                entry_addr: PhysicalAddress::new(entry_addr),
                entry: pte,
            });

            if !pte.is_valid() {
                return Err(self.fault(FaultReason::Invalid, va, level, access));
            }
            if pte.is_reserved_encoding() {
                return Err(self.fault(FaultReason::ReservedEncoding, va, level, access));
            }
            if pte.is_leaf() {
                break pte;
            }
            if level == 0 {
                return Err(self.fault(FaultReason::DepthExceeded, va, level, access));
            }

            level -= 1;
            table = S::entry_ppn(pte);
        };

        if let Err(reason) = self.check_leaf::<S>(pte, level, privilege, access) {
            return Err(self.fault(reason, va, level, access));
        }

        // Levels below the leaf pass the VA index straight through.
        let mut pa = va.page_offset(page_bits);
        for lower in 0..level {
            pa |= S::index_at(va, lower, page_bits) << S::ppn_shift(lower, page_bits);
        }
        for upper in level..S::LEVELS {
            pa |= S::ppn_slice(pte, upper) << S::ppn_shift(upper, page_bits);
        }

        Ok(Translation {
            virtual_address: va,
            physical_address: PhysicalAddress::new(pa),
            level,
            page_size: 1 << S::ppn_shift(level, page_bits),
            steps,
        })
    }

    /// Leaf checks, in architectural order
    fn check_leaf<S: PagingScheme>(
        &self,
        pte: PageTableEntry,
        level: usize,
        privilege: PrivilegeMode,
        access: Access,
    ) -> Result<(), FaultReason> {
        match privilege {
            PrivilegeMode::User if !pte.is_user() => return Err(FaultReason::NotUserPage),
            PrivilegeMode::Supervisor if pte.is_user() && !self.config.supervisor_ok => {
                return Err(FaultReason::UserPageFromSupervisor);
            },
            _ => {},
        }

        let readable = pte.is_readable() || (self.config.exec_readable && pte.is_executable());
        if (access.contains(Access::READ) && !readable)
            || (access.contains(Access::WRITE) && !pte.is_writable())
            || (access.contains(Access::EXEC) && !pte.is_executable())
        {
            return Err(FaultReason::PermissionDenied);
        }

        if !S::is_superpage_aligned(pte, level) {
            return Err(FaultReason::MisalignedSuperpage);
        }

        // A/D are never updated here; a clear bit is reported to the caller.
        if !pte.is_accessed() {
            return Err(FaultReason::AccessedClear);
        }
        if access.contains(Access::WRITE) && !pte.is_dirty() {
            return Err(FaultReason::DirtyClear);
        }

        Ok(())
    }
}

// =============================================================================
// Debug/Dump Utilities
// =============================================================================

#[cfg(feature = "debug")]
impl<'m, M: PhysicalMemory + ?Sized> Translator<'m, M> {
    /// Log every valid entry reachable from the root table
    ///
    /// Returns the number of valid entries found.
    pub fn dump_page_tables(&self) -> usize {
        match self.config.mode {
            TranslationMode::Bare => {
                log::debug!("Page Table Dump: Bare mode, no tables");
                0
            },
            TranslationMode::Sv32 => self.dump::<Sv32>(),
            TranslationMode::Sv39 => self.dump::<Sv39>(),
            TranslationMode::Sv48 => self.dump::<Sv48>(),
        }
    }

    fn dump<S: PagingScheme>(&self) -> usize {
        let root = S::root_ppn(self.config.page_table_root);
        log::debug!("Page Table Dump ({}, root: {:#x})", S::MODE, root);
        self.dump_level::<S>(root, S::LEVELS - 1, 0)
    }

    fn dump_level<S: PagingScheme>(&self, table: u64, level: usize, depth: usize) -> usize {
        const INDENT: [&str; MAX_LEVELS] = ["", "  ", "    ", "      "];

        let prefix = INDENT[depth.min(MAX_LEVELS - 1)];
        let mut found = 0;

        for index in 0..S::table_entries() {
            let addr = (table << self.page_bits) + index * S::PTE_SIZE;
            let entry = match S::read_entry(self.memory, addr) {
                Ok(entry) => entry,
                Err(err) => {
                    log::debug!("{}L{}: {}", prefix, level, err);
                    return found;
                },
            };
            if !entry.is_valid() {
                continue;
            }

            found += 1;
            log::debug!("{}L{} [{}]: {}", prefix, level, index, entry);

            if entry.is_pointer() && level > 0 {
                found += self.dump_level::<S>(S::entry_ppn(entry), level - 1, depth + 1);
            }
        }

        found
    }
}

impl<M: PhysicalMemory + ?Sized> fmt::Debug for Translator<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Translator")
            .field("mode", &self.config.mode)
            .field("root", &format_args!("{:#x}", self.config.page_table_root))
            .field("supervisor_ok", &self.config.supervisor_ok)
            .field("exec_readable", &self.config.exec_readable)
            .field("page_size", &self.config.page_size)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessType;
    use crate::entries::{PageEntryBuilder, PteFlags};
    use crate::fault::{ExceptionCause, FaultKind};
    use crate::memory::SparseMemory;
    use proptest::{prop_assert, prop_assert_eq, proptest};

    use crate::privilege::PrivilegeMode::{Machine, Supervisor, User};

    /// PPN of the root table; lower tables follow at ROOT + 1, ROOT + 2, ...
    const ROOT: u64 = 0x100;

    fn table_memory(page_bits: u32) -> SparseMemory {
        SparseMemory::with_region(0, (ROOT + 8) << page_bits)
    }

    /// Write the pointer chain for `va` down to `leaf_level` and store `leaf` there
    fn map<S: PagingScheme>(
        memory: &mut SparseMemory,
        page_bits: u32,
        va: u64,
        leaf: PageTableEntry,
        leaf_level: usize,
    ) {
        let va = VirtualAddress::new(va);
        for level in (leaf_level..S::LEVELS).rev() {
            let table = ROOT + (S::LEVELS - 1 - level) as u64;
            let addr = (table << page_bits) + S::index_at(va, level, page_bits) * S::PTE_SIZE;
            let entry = if level == leaf_level {
                leaf
            } else {
                PageTableEntry::new_table(table + 1)
            };
            if S::PTE_SIZE == 4 {
                memory.write_u32(addr, entry.bits() as u32).unwrap();
            } else {
                memory.write_u64(addr, entry.bits()).unwrap();
            }
        }
    }

    fn paged<M: PhysicalMemory + ?Sized>(memory: &M, mode: TranslationMode) -> Translator<'_, M> {
        Translator::with_config(memory, TranslationConfig::new(mode, ROOT)).unwrap()
    }

    fn sv39(memory: &SparseMemory) -> Translator<'_, SparseMemory> {
        paged(memory, TranslationMode::Sv39)
    }

    fn user_leaf(ppn: u64) -> PageTableEntry {
        PageEntryBuilder::new().valid().readable().user().accessed().ppn(ppn).build()
    }

    const VA: u64 = 0x0000_0000_0020_1abc;

    /// The user page of the 4 KiB hit scenario
    fn scenario_memory() -> SparseMemory {
        let mut memory = table_memory(12);
        map::<Sv39>(&mut memory, 12, VA, user_leaf(0x55555), 0);
        memory
    }

    fn reason(result: Result<u64, TranslationFault>) -> FaultReason {
        result.unwrap_err().reason
    }

    fn load<M: PhysicalMemory + ?Sized>(
        translator: &Translator<'_, M>,
        va: u64,
        privilege: PrivilegeMode,
    ) -> Result<u64, TranslationFault> {
        translator.translate(va, privilege, true, false, false)
    }

    // -------------------------------------------------------------------------
    // Concrete scenarios (Sv39, 4 KiB pages)
    // -------------------------------------------------------------------------

    #[test]
    fn test_bare_identity() {
        let memory = SparseMemory::new();
        let mut translator = Translator::new(&memory, 4096).unwrap();
        translator.set_mode(TranslationMode::Bare);
        assert_eq!(
            translator.translate(0xDEAD_BEEF_1234, User, true, false, false),
            Ok(0xDEAD_BEEF_1234)
        );
    }

    #[test]
    fn test_user_page_hit() {
        let memory = scenario_memory();
        let translator = sv39(&memory);
        assert_eq!(
            translator.translate(VA, User, true, false, false),
            Ok((0x55555 << 12) | 0xabc)
        );
    }

    #[test]
    fn test_table_layout_of_scenario() {
        let memory = scenario_memory();
        assert_eq!(memory.read_u64(ROOT << 12), Ok(PageTableEntry::new_table(0x101).bits()));
        assert_eq!(
            memory.read_u64((0x101 << 12) + 8),
            Ok(PageTableEntry::new_table(0x102).bits())
        );
        assert_eq!(memory.read_u64((0x102 << 12) + 8), Ok(user_leaf(0x55555).bits()));
    }

    #[test]
    fn test_supervisor_to_user_denied() {
        let memory = scenario_memory();
        let mut translator = sv39(&memory);
        let fault = translator.translate(VA, Supervisor, true, false, false).unwrap_err();
        assert_eq!(fault.kind(), FaultKind::PageFault);
        assert_eq!(fault.reason, FaultReason::UserPageFromSupervisor);
        assert_eq!(fault.cause(), ExceptionCause::LoadPageFault);

        translator.set_supervisor_ok(true);
        assert_eq!(translator.translate(VA, Supervisor, true, false, false), Ok(0x5555_5abc));
    }

    #[test]
    fn test_reserved_encoding() {
        let mut memory = table_memory(12);
        let leaf = PageEntryBuilder::new()
            .valid()
            .writable()
            .user()
            .accessed()
            .dirty()
            .ppn(0x55555)
            .build();
        map::<Sv39>(&mut memory, 12, VA, leaf, 0);
        let fault = sv39(&memory).translate(VA, User, false, true, false).unwrap_err();
        assert_eq!(fault.reason, FaultReason::ReservedEncoding);
        assert_eq!(fault.level, 0);
        assert_eq!(fault.cause(), ExceptionCause::StorePageFault);
    }

    #[test]
    fn test_misaligned_superpage() {
        let mut memory = table_memory(12);
        map::<Sv39>(&mut memory, 12, VA, user_leaf(0x201), 1);
        let fault = sv39(&memory).translate(VA, User, true, false, false).unwrap_err();
        assert_eq!(fault.reason, FaultReason::MisalignedSuperpage);
        assert_eq!(fault.level, 1);
    }

    #[test]
    fn test_missing_accessed_bit() {
        let mut memory = table_memory(12);
        let leaf = PageEntryBuilder::new().valid().readable().user().ppn(0x55555).build();
        map::<Sv39>(&mut memory, 12, VA, leaf, 0);
        let fault = sv39(&memory).translate(VA, User, true, false, false).unwrap_err();
        assert_eq!(fault.reason, FaultReason::AccessedClear);
        assert!(fault.is_page_fault());
    }

    #[test]
    fn test_bus_fault_on_root() {
        let memory = SparseMemory::new();
        let fault = sv39(&memory).translate(VA, User, true, false, false).unwrap_err();
        assert_eq!(fault.kind(), FaultKind::AccessFault);
        assert_eq!(fault.reason, FaultReason::BusError { addr: ROOT << 12 });
        assert_eq!(fault.level, 2);
        assert_eq!(fault.cause(), ExceptionCause::LoadAccessFault);
    }

    // -------------------------------------------------------------------------
    // Walk structure
    // -------------------------------------------------------------------------

    #[test]
    fn test_bus_fault_mid_walk() {
        let mut memory = table_memory(12);
        memory.write_u64(ROOT << 12, PageTableEntry::new_table(0x9_0000).bits()).unwrap();
        let fault = sv39(&memory).translate(VA, User, false, false, true).unwrap_err();
        assert!(fault.is_access_fault());
        assert_eq!(fault.reason, FaultReason::BusError { addr: (0x9_0000 << 12) + 8 });
        assert_eq!(fault.level, 1);
        assert_eq!(fault.cause(), ExceptionCause::InstAccessFault);
    }

    #[test]
    fn test_invalid_entry() {
        let memory = table_memory(12);
        let fault = sv39(&memory).translate(VA, User, true, false, false).unwrap_err();
        assert_eq!(fault.reason, FaultReason::Invalid);
        assert_eq!(fault.level, 2);
    }

    #[test]
    fn test_pointer_at_level_zero() {
        let mut memory = table_memory(12);
        map::<Sv39>(&mut memory, 12, VA, PageTableEntry::new_table(ROOT), 0);
        let fault = sv39(&memory).translate(VA, User, true, false, false).unwrap_err();
        assert_eq!(fault.reason, FaultReason::DepthExceeded);
        assert_eq!(fault.level, 0);
    }

    #[test]
    fn test_non_canonical_faults_before_any_read() {
        // No RAM at all: a read would be an access fault
        let memory = SparseMemory::new();
        let translator = sv39(&memory);
        let fault = load(&translator, 0x0000_0040_0000_0000, User).unwrap_err();
        assert_eq!(fault.reason, FaultReason::NonCanonical);
        assert!(fault.is_page_fault());
    }

    #[test]
    fn test_upper_half_address() {
        let va = 0xFFFF_FFC0_0000_0123;
        let mut memory = table_memory(12);
        map::<Sv39>(&mut memory, 12, va, user_leaf(0x80000), 0);
        assert_eq!(sv39(&memory).translate(va, User, true, false, false), Ok(0x8000_0123));
    }

    #[test]
    fn test_sv48_upper_half_address() {
        let mut memory = table_memory(12);
        map::<Sv48>(&mut memory, 12, 0xFFFF_8000_0000_1234, user_leaf(0x80000), 0);
        map::<Sv48>(&mut memory, 12, 0xFFFF_FF80_0000_1042, user_leaf(0x90000), 0);
        let translator = paged(&memory, TranslationMode::Sv48);
        assert_eq!(load(&translator, 0xFFFF_8000_0000_1234, User), Ok(0x8000_1234));
        assert_eq!(load(&translator, 0xFFFF_FF80_0000_1042, User), Ok(0x9000_0042));
        let hole = load(&translator, 0xFFFF_0000_0000_0000, User);
        assert_eq!(reason(hole), FaultReason::NonCanonical);
    }

    #[test]
    fn test_walk_trace() {
        let memory = scenario_memory();
        let info = sv39(&memory)
            .translate_detailed(VirtualAddress::new(VA), User, Access::READ)
            .unwrap();
        assert_eq!(info.level, 0);
        assert_eq!(info.page_size, 4096);
        assert!(!info.is_superpage());
        assert_eq!(info.steps.len(), 3);
        assert_eq!(info.steps[0].entry_addr, PhysicalAddress::new(ROOT << 12));
        assert_eq!(info.steps[1].level, 1);
        let leaf = info.leaf().unwrap();
        assert_eq!(leaf.entry_addr, PhysicalAddress::new((0x102 << 12) + 8));
        assert_eq!(leaf.entry, user_leaf(0x55555));
    }

    // -------------------------------------------------------------------------
    // Leaf permission checks
    // -------------------------------------------------------------------------

    fn single_leaf(leaf: PageTableEntry) -> SparseMemory {
        let mut memory = table_memory(12);
        map::<Sv39>(&mut memory, 12, VA, leaf, 0);
        memory
    }

    #[test]
    fn test_user_access_to_supervisor_page() {
        let memory = single_leaf(PageTableEntry::new_page(0x55555, PteFlags::KERNEL_DATA));
        let translator = sv39(&memory);
        assert_eq!(reason(load(&translator, VA, User)), FaultReason::NotUserPage);
        assert!(translator.translate(VA, Supervisor, true, true, false).is_ok());
    }

    #[test]
    fn test_machine_mode_skips_user_gating() {
        let memory = scenario_memory();
        assert!(sv39(&memory).translate(VA, Machine, true, false, false).is_ok());
    }

    #[test]
    fn test_execute_requires_x() {
        let memory = scenario_memory();
        let translator = sv39(&memory);
        let fault = translator.translate(VA, User, false, false, true).unwrap_err();
        assert_eq!(fault.reason, FaultReason::PermissionDenied);
        assert_eq!(fault.cause(), ExceptionCause::InstPageFault);

        let memory = single_leaf(PageTableEntry::new_page(0x55555, PteFlags::USER_CODE));
        assert_eq!(sv39(&memory).translate(VA, User, false, false, true), Ok(0x5555_5abc));
    }

    #[test]
    fn test_exec_readable() {
        let leaf = PageEntryBuilder::new()
            .valid()
            .executable()
            .user()
            .accessed()
            .ppn(0x55555)
            .build();
        let memory = single_leaf(leaf);
        let mut translator = sv39(&memory);
        assert_eq!(reason(load(&translator, VA, User)), FaultReason::PermissionDenied);

        translator.set_exec_readable(true);
        assert_eq!(translator.translate(VA, User, true, false, false), Ok(0x5555_5abc));
        // MXR never grants writes
        let store = translator.translate(VA, User, false, true, false);
        assert_eq!(reason(store), FaultReason::PermissionDenied);
    }

    #[test]
    fn test_store_requires_dirty() {
        let leaf = PageEntryBuilder::new()
            .valid()
            .readable()
            .writable()
            .user()
            .accessed()
            .ppn(0x55555)
            .build();
        let memory = single_leaf(leaf);
        let translator = sv39(&memory);
        assert!(translator.translate(VA, User, true, false, false).is_ok());
        let store = translator.translate(VA, User, false, true, false);
        assert_eq!(reason(store), FaultReason::DirtyClear);

        let memory = single_leaf(PageTableEntry::new_page(0x55555, PteFlags::USER_DATA));
        assert!(sv39(&memory).translate(VA, User, false, true, false).is_ok());
    }

    #[test]
    fn test_intent_union() {
        let memory = scenario_memory();
        let fault = sv39(&memory).translate(VA, User, true, true, false).unwrap_err();
        assert_eq!(fault.reason, FaultReason::PermissionDenied);
        assert_eq!(fault.access, AccessType::Store);

        let rwx = PteFlags::USER_DATA | PteFlags::EXEC;
        let memory = single_leaf(PageTableEntry::new_page(0x55555, rwx));
        assert!(sv39(&memory).translate(VA, User, true, true, true).is_ok());
    }

    #[test]
    fn test_check_order() {
        // Not user, no read permission, misaligned superpage and A clear: U/S wins
        let leaf = PageEntryBuilder::new().valid().executable().ppn(0x1).build();
        let mut memory = table_memory(12);
        map::<Sv39>(&mut memory, 12, VA, leaf, 1);
        let translator = sv39(&memory);
        assert_eq!(reason(load(&translator, VA, User)), FaultReason::NotUserPage);
        // Then permissions
        assert_eq!(reason(load(&translator, VA, Supervisor)), FaultReason::PermissionDenied);
        // Then alignment, ahead of A/D
        assert_eq!(
            reason(translator.translate(VA, Supervisor, false, false, true)),
            FaultReason::MisalignedSuperpage
        );
    }

    // -------------------------------------------------------------------------
    // Superpages and other schemes
    // -------------------------------------------------------------------------

    #[test]
    fn test_sv39_megapage() {
        let mut memory = table_memory(12);
        map::<Sv39>(&mut memory, 12, VA, user_leaf(0x200), 1);
        let info = sv39(&memory)
            .translate_detailed(VirtualAddress::new(VA), User, Access::READ)
            .unwrap();
        assert_eq!(info.physical_address.as_u64(), 0x0020_1abc);
        assert_eq!(info.page_size, 2 << 20);
        assert!(info.is_superpage());
        assert_eq!(info.steps.len(), 2);
    }

    #[test]
    fn test_sv39_gigapage() {
        let va = 0x0000_0000_4123_4567;
        let mut memory = table_memory(12);
        map::<Sv39>(&mut memory, 12, va, user_leaf(3 << 18), 2);
        assert_eq!(sv39(&memory).translate(va, User, true, false, false), Ok(0xC123_4567));
    }

    #[test]
    fn test_sv32_walk() {
        let va = 0x0040_1abc;
        let mut memory = table_memory(12);
        map::<Sv32>(&mut memory, 12, va, user_leaf(0x3F_FFFF), 0);
        let translator = paged(&memory, TranslationMode::Sv32);
        assert_eq!(translator.translate(va, User, true, false, false), Ok(0x3_FFFF_FABC));
        let pointer = PageTableEntry::new_table(ROOT + 1).bits() as u32;
        assert_eq!(memory.read_u32((ROOT << 12) + 4), Ok(pointer));
        assert_eq!(
            reason(translator.translate(0x1_0000_0000 | va, User, true, false, false)),
            FaultReason::NonCanonical
        );
    }

    #[test]
    fn test_sv32_megapage() {
        let va = 0x0040_1abc;
        let mut memory = table_memory(12);
        map::<Sv32>(&mut memory, 12, va, user_leaf(0x400), 1);
        let translator = paged(&memory, TranslationMode::Sv32);
        assert_eq!(translator.translate(va, User, true, false, false), Ok(0x0040_1abc));

        let mut memory = table_memory(12);
        map::<Sv32>(&mut memory, 12, va, user_leaf(0x401), 1);
        let translator = paged(&memory, TranslationMode::Sv32);
        assert_eq!(reason(load(&translator, va, User)), FaultReason::MisalignedSuperpage);
    }

    #[test]
    fn test_sv48_walk() {
        let va = 0x0000_7F80_1234_5678;
        let mut memory = table_memory(12);
        map::<Sv48>(&mut memory, 12, va, user_leaf(0xABCDE), 0);
        let translator = paged(&memory, TranslationMode::Sv48);
        let info = translator
            .translate_detailed(VirtualAddress::new(va), User, Access::READ)
            .unwrap();
        assert_eq!(info.physical_address.as_u64(), 0xABCD_E678);
        assert_eq!(info.steps.len(), 4);
        let upper = load(&translator, 0x0000_8000_0000_0000, User);
        assert_eq!(reason(upper), FaultReason::NonCanonical);
    }

    #[test]
    fn test_sv48_terapage() {
        let va = 0x0000_0080_0000_0042;
        let mut memory = table_memory(12);
        map::<Sv48>(&mut memory, 12, va, user_leaf(1 << 27), 3);
        let translator = paged(&memory, TranslationMode::Sv48);
        let info = translator
            .translate_detailed(VirtualAddress::new(va), User, Access::READ)
            .unwrap();
        assert_eq!(info.physical_address.as_u64(), (1 << 39) | 0x42);
        assert_eq!(info.page_size, 1 << 39);
    }

    #[test]
    fn test_page_size_8k() {
        let va = (1 << 13) | 0x1abc;
        let mut memory = table_memory(13);
        map::<Sv39>(&mut memory, 13, va, user_leaf(0x777), 0);
        let config = TranslationConfig::new(TranslationMode::Sv39, ROOT).with_page_size(8192);
        let translator = Translator::with_config(&memory, config).unwrap();
        assert_eq!(translator.page_bits(), 13);
        assert_eq!(translator.translate(va, User, true, false, false), Ok((0x777 << 13) | 0x1abc));
    }

    #[test]
    fn test_page_size_2k() {
        // 512 eight-byte entries span two 2 KiB pages, so tables sit two PPNs apart
        let va = (3 << 29) | (5 << 20) | (0x1ff << 11) | 0x7ab;
        assert_eq!(Sv39::index_at(VirtualAddress::new(va), 2, 11), 3);
        assert_eq!(Sv39::index_at(VirtualAddress::new(va), 1, 11), 5);
        assert_eq!(Sv39::index_at(VirtualAddress::new(va), 0, 11), 0x1ff);

        let mut memory = table_memory(11);
        let root = ROOT << 11;
        memory.write_u64(root + 3 * 8, PageTableEntry::new_table(ROOT + 2).bits()).unwrap();
        let pointer = PageTableEntry::new_table(ROOT + 4).bits();
        memory.write_u64(((ROOT + 2) << 11) + 5 * 8, pointer).unwrap();
        let leaf_addr = ((ROOT + 4) << 11) + 0x1ff * 8;
        memory.write_u64(leaf_addr, user_leaf(0x777).bits()).unwrap();

        let config = TranslationConfig::new(TranslationMode::Sv39, ROOT).with_page_size(2048);
        let translator = Translator::with_config(&memory, config).unwrap();
        assert_eq!(translator.page_bits(), 11);
        let info = translator
            .translate_detailed(VirtualAddress::new(va), User, Access::READ)
            .unwrap();
        assert_eq!(info.physical_address.as_u64(), (0x777 << 11) | 0x7ab);
        assert_eq!(info.page_size, 2048);
        assert_eq!(info.leaf().unwrap().entry_addr, PhysicalAddress::new(leaf_addr));

        // Bit 37 is the top of the 38-bit VA at this page size
        let upper = load(&translator, 1 << 37, User);
        assert_eq!(reason(upper), FaultReason::NonCanonical);
    }

    #[test]
    fn test_invalid_page_size_rejected() {
        let memory = SparseMemory::new();
        let err = Translator::new(&memory, 1024).unwrap_err();
        assert_eq!(err, ConfigError::PageSizeTooSmall(1024));
        let err = Translator::new(&memory, 6000).unwrap_err();
        assert_eq!(err, ConfigError::PageSizeNotPowerOfTwo(6000));
    }

    #[test]
    fn test_setters() {
        let memory = SparseMemory::new();
        let mut translator = Translator::new(&memory, 4096).unwrap();
        assert_eq!(translator.mode(), TranslationMode::Sv32);
        assert!(!translator.supervisor_ok());
        assert!(!translator.exec_readable());

        translator.set_mode(TranslationMode::Sv48);
        translator.set_page_table_root(0x1234);
        translator.set_supervisor_ok(true);
        translator.set_exec_readable(true);
        assert_eq!(translator.config().mode, TranslationMode::Sv48);
        assert_eq!(translator.page_table_root(), 0x1234);
        assert!(translator.supervisor_ok() && translator.exec_readable());
        assert_eq!(translator.page_size(), 4096);
    }

    // -------------------------------------------------------------------------
    // Shared memory and range queries
    // -------------------------------------------------------------------------

    #[test]
    fn test_sees_external_writes_between_calls() {
        let shared = spin::Mutex::new(scenario_memory());
        let hart0 = paged(&shared, TranslationMode::Sv39);
        let hart1 = paged(&shared, TranslationMode::Sv39);
        assert_eq!(hart0.translate(VA, User, true, false, false), Ok(0x5555_5abc));

        shared.lock().write_u64((0x102 << 12) + 8, user_leaf(0x66666).bits()).unwrap();
        assert_eq!(hart0.translate(VA, User, true, false, false), Ok(0x6666_6abc));
        assert_eq!(hart1.translate(VA, User, true, false, false), Ok(0x6666_6abc));
    }

    #[test]
    fn test_range_queries() {
        let mut memory = table_memory(12);
        map::<Sv39>(&mut memory, 12, 0x20_0000, user_leaf(0x500), 0);
        map::<Sv39>(&mut memory, 12, 0x20_1000, user_leaf(0x501), 0);
        let translator = sv39(&memory);

        assert!(translator.is_mapped(0x20_0010, User, Access::READ));
        assert!(!translator.is_mapped(0x20_2000, User, Access::READ));
        assert!(translator.is_range_accessible(0x20_0800, 0x1000, User, Access::READ));
        assert!(!translator.is_range_accessible(0x20_0800, 0x2000, User, Access::READ));
        assert!(!translator.is_range_accessible(0x20_0000, 0x10, User, Access::WRITE));
        assert!(translator.is_range_accessible(0x30_0000, 0, User, Access::READ));
        assert!(!translator.is_range_accessible(u64::MAX, 2, User, Access::READ));
    }

    #[test]
    fn test_bare_range_is_bounded() {
        let memory = SparseMemory::new();
        let mut translator = Translator::new(&memory, 2048).unwrap();
        translator.set_mode(TranslationMode::Bare);
        assert!(translator.is_range_accessible(0, u64::MAX, User, Access::WRITE));
        assert!(!translator.is_range_accessible(u64::MAX, 2, User, Access::READ));
    }

    #[test]
    fn test_range_over_superpage() {
        let mut memory = table_memory(12);
        map::<Sv39>(&mut memory, 12, 0x4000_0000, user_leaf(1 << 18), 2);
        let translator = sv39(&memory);
        assert!(translator.is_range_accessible(0x4000_0000, 1 << 30, User, Access::READ));
        assert!(!translator.is_range_accessible(0x4000_0000, (1 << 30) + 1, User, Access::READ));
    }

    #[cfg(feature = "debug")]
    #[test]
    fn test_dump_counts_valid_entries() {
        let memory = scenario_memory();
        assert_eq!(sv39(&memory).dump_page_tables(), 3);
    }

    // -------------------------------------------------------------------------
    // Properties
    // -------------------------------------------------------------------------

    fn sign_extend_39(va: u64) -> u64 {
        (((va << 25) as i64) >> 25) as u64
    }

    #[test]
    fn test_bare_is_identity() {
        let memory = SparseMemory::new();
        let mut translator = Translator::new(&memory, 4096).unwrap();
        translator.set_mode(TranslationMode::Bare);
        proptest!(|(va in proptest::num::u64::ANY, bits in 0_u8..8)| {
            let access = Access::from_bits_truncate(bits);
            let info = translator
                .translate_detailed(VirtualAddress::new(va), User, access)
                .unwrap();
            prop_assert_eq!(info.physical_address.as_u64(), va);
            prop_assert!(info.steps.is_empty());
        });
    }

    #[test]
    fn test_round_trip() {
        proptest!(|(
            frame in 0_u64..(1 << 44),
            vpn in 0_u64..(1 << 27),
            offset in 0_u64..4096,
            bits in 0_u8..8,
        )| {
            let va = sign_extend_39((vpn << 12) | offset);
            let flags = PteFlags::RWX | PteFlags::USER | PteFlags::AD;
            let leaf = PageTableEntry::new_page(frame, flags);
            let mut memory = table_memory(12);
            map::<Sv39>(&mut memory, 12, va, leaf, 0);

            let access = Access::from_bits_truncate(bits);
            let pa = sv39(&memory)
                .translate_detailed(VirtualAddress::new(va), User, access)
                .map(|info| info.physical_address.as_u64());
            prop_assert_eq!(pa, Ok((frame << 12) | offset));
        });
    }

    #[test]
    fn test_reserved_encodings_always_fault() {
        proptest!(|(flags in 0_u64..(1 << 10), level in 0_usize..3, bits in 0_u8..8)| {
            let flags = (flags | PageTableEntry::V_BIT | PageTableEntry::W_BIT)
                & !PageTableEntry::R_BIT;
            let mut memory = table_memory(12);
            map::<Sv39>(&mut memory, 12, VA, PageTableEntry::from_bits(flags), level);

            let fault = sv39(&memory)
                .translate_detailed(VirtualAddress::new(VA), User, Access::from_bits_truncate(bits))
                .unwrap_err();
            prop_assert_eq!(fault.reason, FaultReason::ReservedEncoding);
            prop_assert_eq!(fault.level, level);
        });
    }

    #[test]
    fn test_superpage_alignment() {
        proptest!(|(
            ppn in 0_u64..(1 << 20),
            vpn in 0_u64..(1 << 27),
            offset in 0_u64..4096,
            level in 1_usize..3,
        )| {
            let va = sign_extend_39((vpn << 12) | offset);
            let mut memory = table_memory(12);
            map::<Sv39>(&mut memory, 12, va, user_leaf(ppn), level);

            let result = sv39(&memory).translate(va, User, true, false, false);
            let low_bits = 12 + 9 * level as u32;
            let low_mask = (1_u64 << (low_bits - 12)) - 1;
            if ppn & low_mask != 0 {
                prop_assert_eq!(
                    result.map_err(|fault| fault.reason),
                    Err(FaultReason::MisalignedSuperpage)
                );
            } else {
                let pa = result.unwrap();
                prop_assert_eq!(pa & ((1 << low_bits) - 1), va & ((1 << low_bits) - 1));
                prop_assert_eq!(pa >> 12, ppn | ((va >> 12) & low_mask));
            }
        });
    }
}
