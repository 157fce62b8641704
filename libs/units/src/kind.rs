use crate::error::{Error, Result};
use phf::phf_map;
use std::fmt;
use std::str::FromStr;

/// Base and derived unit kinds a unit term may name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnitKind {
    Ampere,
    Avogadro,
    Becquerel,
    Candela,
    Celsius,
    Coulomb,
    Dimensionless,
    Farad,
    Gram,
    Gray,
    Henry,
    Hertz,
    Item,
    Joule,
    Katal,
    Kelvin,
    Kilogram,
    Liter,
    Litre,
    Lumen,
    Lux,
    Meter,
    Metre,
    Mole,
    Newton,
    Ohm,
    Pascal,
    Radian,
    Second,
    Siemens,
    Sievert,
    Steradian,
    Tesla,
    Volt,
    Watt,
    Weber,
    Invalid,
}

static KINDS_BY_NAME: phf::Map<&'static str, UnitKind> = phf_map! {
    "ampere" => UnitKind::Ampere,
    "avogadro" => UnitKind::Avogadro,
    "becquerel" => UnitKind::Becquerel,
    "candela" => UnitKind::Candela,
    "celsius" => UnitKind::Celsius,
    "coulomb" => UnitKind::Coulomb,
    "dimensionless" => UnitKind::Dimensionless,
    "farad" => UnitKind::Farad,
    "gram" => UnitKind::Gram,
    "gray" => UnitKind::Gray,
    "henry" => UnitKind::Henry,
    "hertz" => UnitKind::Hertz,
    "item" => UnitKind::Item,
    "joule" => UnitKind::Joule,
    "katal" => UnitKind::Katal,
    "kelvin" => UnitKind::Kelvin,
    "kilogram" => UnitKind::Kilogram,
    "liter" => UnitKind::Liter,
    "litre" => UnitKind::Litre,
    "lumen" => UnitKind::Lumen,
    "lux" => UnitKind::Lux,
    "meter" => UnitKind::Meter,
    "metre" => UnitKind::Metre,
    "mole" => UnitKind::Mole,
    "newton" => UnitKind::Newton,
    "ohm" => UnitKind::Ohm,
    "pascal" => UnitKind::Pascal,
    "radian" => UnitKind::Radian,
    "second" => UnitKind::Second,
    "siemens" => UnitKind::Siemens,
    "sievert" => UnitKind::Sievert,
    "steradian" => UnitKind::Steradian,
    "tesla" => UnitKind::Tesla,
    "volt" => UnitKind::Volt,
    "watt" => UnitKind::Watt,
    "weber" => UnitKind::Weber,
};

/// Value of the avogadro unit kind relative to dimensionless.
pub const AVOGADRO_NUMBER: f64 = 6.022_140_76e23;

use UnitKind::*;

impl UnitKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Ampere => "ampere",
            Avogadro => "avogadro",
            Becquerel => "becquerel",
            Candela => "candela",
            Celsius => "celsius",
            Coulomb => "coulomb",
            Dimensionless => "dimensionless",
            Farad => "farad",
            Gram => "gram",
            Gray => "gray",
            Henry => "henry",
            Hertz => "hertz",
            Item => "item",
            Joule => "joule",
            Katal => "katal",
            Kelvin => "kelvin",
            Kilogram => "kilogram",
            Liter => "liter",
            Litre => "litre",
            Lumen => "lumen",
            Lux => "lux",
            Meter => "meter",
            Metre => "metre",
            Mole => "mole",
            Newton => "newton",
            Ohm => "ohm",
            Pascal => "pascal",
            Radian => "radian",
            Second => "second",
            Siemens => "siemens",
            Sievert => "sievert",
            Steradian => "steradian",
            Tesla => "tesla",
            Volt => "volt",
            Watt => "watt",
            Weber => "weber",
            Invalid => "invalid",
        }
    }

    /// Folds the spelling aliases (`liter`/`litre`, `meter`/`metre`) onto one kind.
    pub fn canonical(self) -> Self {
        match self {
            Liter => Litre,
            Meter => Metre,
            other => other,
        }
    }

    pub fn is_dimensionless(self) -> bool {
        matches!(self, Dimensionless)
    }

    /// SI base kinds survive [`UnitKind::si_decomposition`] unchanged.
    pub fn is_si_base(self) -> bool {
        matches!(
            self,
            Ampere | Candela | Item | Kelvin | Kilogram | Metre | Meter | Mole | Second
        )
    }

    /// Expresses this kind as a factor times a product of SI base kinds.
    ///
    /// `item` is kept as its own base kind; `radian`, `steradian` and
    /// `avogadro` collapse to dimensionless.
    pub fn si_decomposition(self) -> (f64, &'static [(UnitKind, i64)]) {
        match self {
            Ampere => (1.0, &[(Ampere, 1)]),
            Avogadro => (AVOGADRO_NUMBER, &[]),
            Becquerel | Hertz => (1.0, &[(Second, -1)]),
            Candela | Lumen => (1.0, &[(Candela, 1)]),
            Celsius | Kelvin => (1.0, &[(Kelvin, 1)]),
            Coulomb => (1.0, &[(Ampere, 1), (Second, 1)]),
            Dimensionless | Radian | Steradian | Invalid => (1.0, &[]),
            Farad => (
                1.0,
                &[(Metre, -2), (Kilogram, -1), (Second, 4), (Ampere, 2)],
            ),
            Gram => (1e-3, &[(Kilogram, 1)]),
            Gray | Sievert => (1.0, &[(Metre, 2), (Second, -2)]),
            Henry => (
                1.0,
                &[(Metre, 2), (Kilogram, 1), (Second, -2), (Ampere, -2)],
            ),
            Item => (1.0, &[(Item, 1)]),
            Joule => (1.0, &[(Metre, 2), (Kilogram, 1), (Second, -2)]),
            Katal => (1.0, &[(Mole, 1), (Second, -1)]),
            Kilogram => (1.0, &[(Kilogram, 1)]),
            Liter | Litre => (1e-3, &[(Metre, 3)]),
            Lux => (1.0, &[(Candela, 1), (Metre, -2)]),
            Meter | Metre => (1.0, &[(Metre, 1)]),
            Mole => (1.0, &[(Mole, 1)]),
            Newton => (1.0, &[(Metre, 1), (Kilogram, 1), (Second, -2)]),
            Ohm => (
                1.0,
                &[(Metre, 2), (Kilogram, 1), (Second, -3), (Ampere, -2)],
            ),
            Pascal => (1.0, &[(Metre, -1), (Kilogram, 1), (Second, -2)]),
            Second => (1.0, &[(Second, 1)]),
            Siemens => (
                1.0,
                &[(Metre, -2), (Kilogram, -1), (Second, 3), (Ampere, 2)],
            ),
            Tesla => (1.0, &[(Kilogram, 1), (Second, -2), (Ampere, -1)]),
            Volt => (
                1.0,
                &[(Metre, 2), (Kilogram, 1), (Second, -3), (Ampere, -1)],
            ),
            Watt => (1.0, &[(Metre, 2), (Kilogram, 1), (Second, -3)]),
            Weber => (
                1.0,
                &[(Metre, 2), (Kilogram, 1), (Second, -2), (Ampere, -1)],
            ),
        }
    }
}

impl FromStr for UnitKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        KINDS_BY_NAME
            .get(s)
            .copied()
            .ok_or_else(|| Error::UnknownKind(s.to_string()))
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for (name, kind) in KINDS_BY_NAME.entries() {
            assert_eq!(kind.as_str(), *name);
            assert_eq!(name.parse::<UnitKind>().unwrap(), *kind);
        }
    }

    #[test]
    fn invalid_is_not_parseable() {
        assert!("invalid".parse::<UnitKind>().is_err());
        assert!("Mole".parse::<UnitKind>().is_err());
    }

    #[test]
    fn aliases_share_a_canonical_kind() {
        assert_eq!(Liter.canonical(), Litre.canonical());
        assert_eq!(Meter.canonical(), Metre);
        assert_eq!(Mole.canonical(), Mole);
    }
}
