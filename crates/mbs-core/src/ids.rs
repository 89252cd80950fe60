//! Strongly typed, zero-cost index wrappers and owner-tagged handles.
//!
//! All indices are `Copy + Ord + Hash`.  Continuous-variable and error-slot
//! indices ([`QIndex`], [`UErrIndex`], …) are *offsets into the owning
//! subsystem's block*: allocating 3 q's then 2 more returns `QIndex(0)` and
//! `QIndex(3)`.  They never change, even when the global vectors are
//! re-assembled.
//!
//! Discrete variables and cache entries are addressed through handles that
//! carry their owning [`SubsystemIndex`] so a handle presented against a
//! different subsystem is rejected instead of silently aliasing.

use std::fmt;

/// Generate a typed index wrapper around a primitive integer.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name(pub $inner);

        impl $name {
            /// Sentinel meaning "no valid index".
            pub const INVALID: $name = $name(<$inner>::MAX);

            /// Cast to `usize` for direct use as a `Vec` index.
            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl Default for $name {
            /// Returns the `INVALID` sentinel so uninitialized indices are visibly invalid.
            #[inline(always)]
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<$name> for usize {
            #[inline(always)]
            fn from(id: $name) -> usize {
                id.0 as usize
            }
        }

        impl TryFrom<usize> for $name {
            type Error = std::num::TryFromIntError;
            fn try_from(n: usize) -> Result<$name, Self::Error> {
                <$inner>::try_from(n).map($name)
            }
        }
    };
}

typed_id! {
    /// Registration-order index of a subsystem.
    pub struct SubsystemIndex(u32);
}

typed_id! {
    /// Offset of an allocation within its subsystem's Q block.
    pub struct QIndex(u32);
}

typed_id! {
    /// Offset of an allocation within its subsystem's U block.
    pub struct UIndex(u32);
}

typed_id! {
    /// Offset of an allocation within its subsystem's Z block.
    pub struct ZIndex(u32);
}

typed_id! {
    /// Offset of an allocation within its subsystem's QErr block.
    pub struct QErrIndex(u32);
}

typed_id! {
    /// Offset of an allocation within its subsystem's UErr block.
    pub struct UErrIndex(u32);
}

typed_id! {
    /// Offset of an allocation within its subsystem's UDotErr block.
    pub struct UDotErrIndex(u32);
}

typed_id! {
    /// Slot of a discrete variable in its subsystem's arena.
    pub struct DiscreteVariableIndex(u32);
}

typed_id! {
    /// Slot of a cache entry in its subsystem's arena.
    pub struct CacheEntryIndex(u32);
}

// ── Owner-tagged handles ──────────────────────────────────────────────────────

/// Handle to a discrete variable: owning subsystem plus arena slot.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscreteVariableHandle {
    pub subsystem: SubsystemIndex,
    pub index:     DiscreteVariableIndex,
}

/// Handle to a cache entry: owning subsystem plus arena slot.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheEntryHandle {
    pub subsystem: SubsystemIndex,
    pub index:     CacheEntryIndex,
}

impl fmt::Display for DiscreteVariableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subsystem, self.index)
    }
}

impl fmt::Display for CacheEntryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subsystem, self.index)
    }
}
