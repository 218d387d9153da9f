//! # Privilege Modes
//!
//! The privilege level an access is performed at. Encoding 2 is reserved by
//! the privileged architecture and has no variant here.

use core::fmt;

/// RISC-V privilege mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PrivilegeMode {
    /// User mode
    User       = 0,
    /// Supervisor mode
    Supervisor = 1,
    /// Machine mode
    Machine    = 3,
}

impl PrivilegeMode {
    /// Decode a raw two-bit privilege value. The reserved encoding yields `None`.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::User),
            1 => Some(Self::Supervisor),
            3 => Some(Self::Machine),
            _ => None,
        }
    }

    /// Get the raw encoding
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Single-letter name, as used in `mstatus.MPP` documentation
    pub const fn letter(self) -> char {
        match self {
            Self::User => 'U',
            Self::Supervisor => 'S',
            Self::Machine => 'M',
        }
    }
}

impl fmt::Display for PrivilegeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "User"),
            Self::Supervisor => write!(f, "Supervisor"),
            Self::Machine => write!(f, "Machine"),
        }
    }
}
