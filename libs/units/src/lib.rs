#![forbid(unsafe_code)]
//! Symbolic unit algebra: unit kinds, unit terms with rational exponents,
//! and unit definitions with equivalence, composition and exponentiation.

mod error;
mod kind;
mod parser;
mod unit;

pub use error::{Error, Result};
pub use kind::{UnitKind, AVOGADRO_NUMBER};
pub use num_rational::Rational64;
pub use parser::parse;
pub use unit::{IntoExponent, UnitDefinition, UnitTerm};

#[cfg(feature = "serde")]
mod serde_impl {
    use super::UnitDefinition;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    impl Serialize for UnitDefinition {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    impl<'de> Deserialize<'de> for UnitDefinition {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let text = String::deserialize(deserializer)?;
            text.parse().map_err(D::Error::custom)
        }
    }
}
