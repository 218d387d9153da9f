//! # RISC-V Virtual Memory
//!
//! Virtual-to-physical address translation for RISC-V harts: the Bare, Sv32,
//! Sv39 and Sv48 modes of the privileged architecture, walked in software
//! against a caller-supplied physical memory.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       Translator                         │
//! │   mode · root PPN · SUM · MXR · page size                │
//! ├──────────────────────────────────────────────────────────┤
//! │  walk::<Sv32>      walk::<Sv39>      walk::<Sv48>        │
//! │        └────────── PagingScheme ──────────┘              │
//! ├──────────────────────────────────────────────────────────┤
//! │  PageTableEntry  ·  TranslationFault  ·  ExceptionCause  │
//! ├──────────────────────────────────────────────────────────┤
//! │                PhysicalMemory (read_u32/u64)             │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use riscv_vmem::{
//!     PageTableEntry, PrivilegeMode, PteFlags, SparseMemory, TranslationConfig,
//!     TranslationMode, Translator,
//! };
//!
//! let mut memory = SparseMemory::with_region(0x8000_0000, 0x10_0000);
//! // Root table at PPN 0x80000 maps VA 0..1 GiB with a single gigapage
//! let leaf = PageTableEntry::new_page(0x40000, PteFlags::KERNEL_DATA);
//! memory.write_u64(0x8000_0000, leaf.bits()).unwrap();
//!
//! let config = TranslationConfig::new(TranslationMode::Sv39, 0x80000);
//! let translator = Translator::with_config(&memory, config).unwrap();
//! let pa = translator
//!     .translate(0x1234, PrivilegeMode::Supervisor, true, false, false)
//!     .unwrap();
//! assert_eq!(pa, 0x4000_1234);
//! ```
//!
//! A translation never writes memory; a clear A or D bit is reported as a
//! page fault for the caller to resolve.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod access;
pub mod address;
pub mod config;
pub mod entries;
pub mod fault;
pub mod memory;
pub mod mode;
pub mod privilege;
pub mod scheme;
pub mod walker;

pub use access::{Access, AccessType};
pub use address::{PhysicalAddress, VirtualAddress};
pub use config::{ConfigError, TranslationConfig};
pub use entries::{PageEntryBuilder, PageTableEntry, PteFlags};
pub use fault::{ExceptionCause, FaultKind, FaultReason, TranslationFault};
pub use memory::{BusError, PhysicalMemory, SparseMemory};
pub use mode::TranslationMode;
pub use privilege::PrivilegeMode;
pub use scheme::{PagingScheme, Sv32, Sv39, Sv48};
pub use walker::{Translation, Translator, WalkStep};
