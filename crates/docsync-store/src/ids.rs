//! Opaque document and revision identifiers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

macro_rules! opaque_id {
    ($(#[$doc:meta])* $name:ident, $kind:literal) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Vec<u8>);

        impl $name {
            pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
                Self(bytes.into())
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            /// Parse a lowercase or uppercase hex rendering.
            pub fn from_hex(s: &str) -> Result<Self> {
                if s.is_empty() {
                    return Err(Error::InvalidId {
                        kind: $kind,
                        value: s.to_string(),
                    });
                }
                hex::decode(s).map(Self).map_err(|_| Error::InvalidId {
                    kind: $kind,
                    value: s.to_string(),
                })
            }

            pub fn to_hex(&self) -> String {
                hex::encode(&self.0)
            }

            /// First `n` hex digits, for disambiguating names and log lines.
            pub fn short_hex(&self, n: usize) -> String {
                let mut hex = self.to_hex();
                hex.truncate(n);
                hex
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::from_hex(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

opaque_id!(
    /// Names a mutable, versioned document.
    DocId,
    "document"
);

opaque_id!(
    /// Names one immutable snapshot of a document.
    RevId,
    "revision"
);
