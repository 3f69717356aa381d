//! Strongly typed, zero-cost identifier wrappers.
//!
//! Nodes, edges and vehicles live in dense arenas (`Vec`s) and refer to each
//! other only through these handles.  All IDs are `Copy + Ord + Hash`, so
//! they work as `BTreeMap` keys for deterministic iteration order.

use std::fmt;

/// Generate a typed ID wrapper around a primitive integer.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name(pub $inner);

        impl $name {
            /// Sentinel meaning "no valid ID".
            pub const INVALID: $name = $name(<$inner>::MAX);

            /// Cast to `usize` for direct use as an arena index.
            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            #[inline(always)]
            pub fn is_valid(self) -> bool {
                self != Self::INVALID
            }
        }

        impl Default for $name {
            /// Returns the `INVALID` sentinel so uninitialized IDs are visibly invalid.
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
    /// Index of an intersection (or dead end) in the graph's node arena.
    pub struct NodeId(u32);
}

typed_id! {
    /// Index of a directed street segment in the graph's edge arena.
    pub struct EdgeId(u32);
}

typed_id! {
    /// Index of a vehicle in the scenario's vehicle container.
    ///
    /// Also the stable tie-break key of the crossing arbiter: between two
    /// vehicles that have not spawned yet, the greater id wins.
    pub struct VehicleId(u32);
}
