//! Type-safe identifier wrappers around `u32`.
//!
//! Robots and tasks are numbered by whatever controller reports them. The
//! wrappers keep the two numbering spaces from being mixed up at compile
//! time while serializing as plain JSON numbers (or decimal strings when
//! used as map keys).
//!
//! Deserialization accepts either form. Map keys arrive as strings, and a
//! flattened map is buffered before the key type is known, so the id must
//! parse a decimal string as readily as a number.

use core::fmt;

use serde::de::{self, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

/// Reads a `u32` id from a JSON number or a decimal string.
struct IdVisitor;

impl Visitor<'_> for IdVisitor {
    type Value = u32;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative 32-bit id as a number or decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u32, E> {
        u32::try_from(v)
            .ok()
            .ok_or_else(|| E::invalid_value(Unexpected::Unsigned(v), &self))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u32, E> {
        u32::try_from(v)
            .ok()
            .ok_or_else(|| E::invalid_value(Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<u32, E> {
        v.parse::<u32>()
            .ok()
            .ok_or_else(|| E::invalid_value(Unexpected::Str(v), &self))
    }
}

/// Generates a newtype wrapper around `u32` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub u32);

        impl $name {
            /// Return the inner numeric value.
            pub const fn into_inner(self) -> u32 {
                self.0
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserializer.deserialize_any(IdVisitor).map(Self)
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl core::str::FromStr for $name {
            type Err = core::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<u32>().map(Self)
            }
        }

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Identifier of a robot, unique within one snapshot.
    RobotId
}

define_id! {
    /// Identifier of a task, unique within one snapshot.
    TaskId
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_bare_numbers() {
        let json = serde_json::to_string(&RobotId(7)).unwrap();
        assert_eq!(json, "7");
    }

    #[test]
    fn ids_parse_from_decimal_strings() {
        let id: TaskId = "42".parse().unwrap();
        assert_eq!(id, TaskId(42));
        assert!("-1".parse::<TaskId>().is_err());
        assert!("abc".parse::<RobotId>().is_err());
    }

    #[test]
    fn ids_deserialize_from_numbers_and_decimal_strings() {
        assert_eq!(serde_json::from_str::<RobotId>("7").unwrap(), RobotId(7));
        assert_eq!(serde_json::from_str::<TaskId>("\"12\"").unwrap(), TaskId(12));
        assert!(serde_json::from_str::<RobotId>("-1").is_err());
        assert!(serde_json::from_str::<RobotId>("4294967296").is_err());
        assert!(serde_json::from_str::<TaskId>("\"x1\"").is_err());
        assert!(serde_json::from_str::<TaskId>("1.5").is_err());
    }

    #[test]
    fn display_matches_inner_value() {
        assert_eq!(RobotId(3).to_string(), "3");
        assert_eq!(u32::from(TaskId(9)), 9);
    }
}
