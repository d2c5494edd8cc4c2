//! Common identifier types
//!
//! Identifiers that cross crate boundaries: the PLMN broadcast in system
//! information and the short-lived RNTI that keys every UE context.

use std::fmt;

use serde::{Deserialize, Serialize};

/// PLMN (Public Land Mobile Network) identifier.
///
/// - MCC (Mobile Country Code): 3 decimal digits (001-999)
/// - MNC (Mobile Network Code): 2 or 3 decimal digits
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Plmn {
    /// Mobile Country Code (range 0-999)
    pub mcc: u16,
    /// Mobile Network Code (range 0-999)
    pub mnc: u16,
    /// True if MNC is 3 digits, false if 2 digits
    #[serde(default)]
    pub long_mnc: bool,
}

impl Plmn {
    /// Creates a new PLMN with the given MCC and MNC.
    pub const fn new(mcc: u16, mnc: u16, long_mnc: bool) -> Self {
        Self { mcc, mnc, long_mnc }
    }

    /// Returns true if this PLMN has valid values set.
    pub fn has_value(&self) -> bool {
        self.mcc > 0 || self.mnc > 0
    }

    /// Returns true if both MCC and MNC fit in three decimal digits.
    pub fn is_valid(&self) -> bool {
        self.mcc <= 999 && self.mnc <= 999 && (self.long_mnc || self.mnc <= 99)
    }
}

impl fmt::Debug for Plmn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Plmn({self})")
    }
}

impl fmt::Display for Plmn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.long_mnc {
            write!(f, "{:03}-{:03}", self.mcc, self.mnc)
        } else {
            write!(f, "{:03}-{:02}", self.mcc, self.mnc)
        }
    }
}

/// Radio Network Temporary Identifier.
///
/// A 16-bit session identifier unique among the live UE contexts of one
/// gNB. `0x0000` and `0xFFFF` are reserved and never allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rnti(u16);

impl Rnti {
    /// Lowest allocatable value.
    pub const MIN: u16 = 1;
    /// Highest allocatable value.
    pub const MAX: u16 = 0xFFFE;

    /// Creates an RNTI, returning `None` for the reserved values.
    pub const fn new(value: u16) -> Option<Self> {
        if value >= Self::MIN && value <= Self::MAX {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Returns the raw value.
    #[inline]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Returns the RNTI following this one, wrapping past `MAX` back to `MIN`.
    pub const fn next(self) -> Self {
        if self.0 >= Self::MAX {
            Self(Self::MIN)
        } else {
            Self(self.0 + 1)
        }
    }
}

impl fmt::Display for Rnti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Rnti> for u16 {
    fn from(rnti: Rnti) -> u16 {
        rnti.0
    }
}

/// Cell identifier.
pub type CellId = u16;

/// GTP tunnel endpoint identifier.
pub type Teid = u32;
