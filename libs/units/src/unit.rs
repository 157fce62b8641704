use crate::error::{Error, Result};
use crate::kind::UnitKind;
use num_rational::Rational64;
use num_traits::{CheckedAdd, CheckedMul, One, Zero};
use std::fmt;

/// Integer or rational exponent accepted by the term builders.
pub trait IntoExponent {
    fn into_exponent(self) -> Rational64;
}

impl IntoExponent for i32 {
    fn into_exponent(self) -> Rational64 {
        Rational64::from_integer(i64::from(self))
    }
}

impl IntoExponent for i64 {
    fn into_exponent(self) -> Rational64 {
        Rational64::from_integer(self)
    }
}

impl IntoExponent for Rational64 {
    fn into_exponent(self) -> Rational64 {
        self
    }
}

/// One factor of a compound unit: `(multiplier * 10^scale * kind)^exponent`.
#[derive(Clone, Debug, PartialEq)]
pub struct UnitTerm {
    pub kind: UnitKind,
    pub exponent: Rational64,
    pub scale: i32,
    pub multiplier: f64,
}

impl UnitTerm {
    pub fn new(kind: UnitKind) -> Self {
        Self {
            kind,
            exponent: Rational64::one(),
            scale: 0,
            multiplier: 1.0,
        }
    }

    pub fn with_exponent(mut self, exponent: impl IntoExponent) -> Self {
        self.exponent = exponent.into_exponent();
        self
    }

    pub fn with_scale(mut self, scale: i32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// `multiplier * 10^scale`, the numeric factor inside the exponent.
    pub fn factor(&self) -> f64 {
        self.multiplier * 10f64.powi(self.scale)
    }

    fn has_unit_factor(&self) -> bool {
        self.scale == 0 && self.multiplier == 1.0
    }
}

/// An ordered product of unit terms.
///
/// Term order is kept for output but carries no meaning for
/// [`UnitDefinition::equivalent`] or [`UnitDefinition::identical`]. The empty
/// product is dimensionless.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct UnitDefinition {
    terms: Vec<UnitTerm>,
}

pub(crate) fn pow_rational(base: f64, exponent: Rational64) -> f64 {
    if exponent.is_integer() {
        match i32::try_from(*exponent.numer()) {
            Ok(e) => base.powi(e),
            Err(_) => base.powf(*exponent.numer() as f64),
        }
    } else {
        base.powf(*exponent.numer() as f64 / *exponent.denom() as f64)
    }
}

/// Exponent arithmetic result, rejected when it overflowed or landed on
/// `i64::MIN`, whose negation does not exist.
pub(crate) fn bounded(value: Option<Rational64>) -> Option<Rational64> {
    value.filter(|r| *r.numer() != i64::MIN && *r.denom() != i64::MIN)
}

fn negated(exponent: Rational64) -> Rational64 {
    Rational64::new(exponent.numer().saturating_neg(), *exponent.denom())
}

fn is_unit_factor(value: f64) -> bool {
    (value - 1.0).abs() <= 1e-12
}

struct KindGroup {
    kind: UnitKind,
    exponent: Rational64,
    factor: f64,
    first: UnitTerm,
    merged: bool,
}

impl UnitDefinition {
    pub fn dimensionless() -> Self {
        Self::default()
    }

    pub fn from_terms(terms: Vec<UnitTerm>) -> Self {
        Self { terms }
    }

    /// A definition made of one plain `kind^exponent` term.
    pub fn of(kind: UnitKind, exponent: impl IntoExponent) -> Self {
        Self {
            terms: vec![UnitTerm::new(kind).with_exponent(exponent)],
        }
    }

    pub fn terms(&self) -> &[UnitTerm] {
        &self.terms
    }

    pub fn push(&mut self, term: UnitTerm) {
        self.terms.push(term);
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Merges terms of the same kind, folds dimensionless terms and zero
    /// exponents into the remaining multipliers.
    ///
    /// A term that has no partner of the same kind is kept verbatim, so its
    /// scale and multiplier survive untouched. When merged exponents would
    /// overflow, the terms are returned unmerged.
    pub fn simplify(&self) -> UnitDefinition {
        self.try_simplify().unwrap_or_else(|| self.clone())
    }

    fn try_simplify(&self) -> Option<UnitDefinition> {
        let mut leftover = 1.0;
        let mut groups: Vec<KindGroup> = Vec::new();

        for term in &self.terms {
            let contribution = pow_rational(term.factor(), term.exponent);
            if term.kind.is_dimensionless() {
                leftover *= contribution;
                continue;
            }
            let kind = term.kind.canonical();
            match groups.iter_mut().find(|g| g.kind == kind) {
                Some(group) => {
                    group.exponent = bounded(group.exponent.checked_add(&term.exponent))?;
                    group.factor *= contribution;
                    group.merged = true;
                }
                None => groups.push(KindGroup {
                    kind,
                    exponent: term.exponent,
                    factor: contribution,
                    first: term.clone(),
                    merged: false,
                }),
            }
        }

        let mut terms = Vec::with_capacity(groups.len());
        for group in groups {
            if group.exponent.is_zero() {
                leftover *= group.factor;
            } else if group.merged {
                terms.push(UnitTerm {
                    kind: group.kind,
                    exponent: group.exponent,
                    scale: 0,
                    multiplier: pow_rational(group.factor, group.exponent.recip()),
                });
            } else {
                terms.push(group.first);
            }
        }

        if !is_unit_factor(leftover) {
            match terms.first_mut() {
                Some(first) => {
                    first.multiplier *= pow_rational(leftover, first.exponent.recip());
                }
                None => terms.push(UnitTerm::new(UnitKind::Dimensionless).with_multiplier(leftover)),
            }
        }

        Some(UnitDefinition { terms })
    }

    /// Rewrites every term in SI base kinds, folding conversion factors into
    /// the multiplier of the first remaining term.
    pub fn to_si(&self) -> UnitDefinition {
        let mut factor = 1.0;
        let mut terms = Vec::new();
        for term in &self.terms {
            let (kind_factor, parts) = term.kind.si_decomposition();
            let exponents: Option<Vec<(UnitKind, Rational64)>> = parts
                .iter()
                .map(|(base, power)| {
                    bounded(term.exponent.checked_mul(&Rational64::from_integer(*power)))
                        .map(|exponent| (*base, exponent))
                })
                .collect();
            match exponents {
                Some(exponents) => {
                    factor *= pow_rational(term.factor() * kind_factor, term.exponent);
                    terms.extend(
                        exponents
                            .into_iter()
                            .map(|(base, exponent)| UnitTerm::new(base).with_exponent(exponent)),
                    );
                }
                // Out of range once decomposed; left in its own kind.
                None => terms.push(term.clone()),
            }
        }
        if !is_unit_factor(factor) {
            terms.insert(0, UnitTerm::new(UnitKind::Dimensionless).with_multiplier(factor));
        }
        UnitDefinition { terms }.simplify()
    }

    /// Sorted `(kind, exponent)` pairs of the SI form, dimensionless dropped.
    fn dimension_key(&self) -> Vec<(UnitKind, Rational64)> {
        let mut key: Vec<_> = self
            .to_si()
            .terms
            .iter()
            .filter(|t| !t.kind.is_dimensionless())
            .map(|t| (t.kind.canonical(), t.exponent))
            .collect();
        key.sort();
        key
    }

    /// Same physical dimension; scales and multipliers may differ.
    pub fn equivalent(&self, other: &UnitDefinition) -> bool {
        self.dimension_key() == other.dimension_key()
    }

    /// Same terms after simplification, including exact scale and multiplier.
    pub fn identical(&self, other: &UnitDefinition) -> bool {
        fn sorted(def: &UnitDefinition) -> Vec<UnitTerm> {
            let mut terms = def.simplify().terms;
            for term in &mut terms {
                term.kind = term.kind.canonical();
            }
            terms.sort_by(|a, b| (a.kind, a.exponent).cmp(&(b.kind, b.exponent)));
            terms
        }
        sorted(self) == sorted(other)
    }

    pub fn is_dimensionless(&self) -> bool {
        self.dimension_key().is_empty()
    }

    pub fn multiply(&self, other: &UnitDefinition) -> UnitDefinition {
        let mut terms = self.terms.clone();
        terms.extend(other.terms.iter().cloned());
        UnitDefinition { terms }.simplify()
    }

    pub fn divide(&self, other: &UnitDefinition) -> UnitDefinition {
        self.multiply(&other.invert())
    }

    pub fn invert(&self) -> UnitDefinition {
        let terms = self
            .terms
            .iter()
            .map(|t| UnitTerm {
                exponent: negated(t.exponent),
                ..t.clone()
            })
            .collect();
        UnitDefinition { terms }.simplify()
    }

    /// Multiplies every term's exponent by `power`.
    ///
    /// Fails with [`Error::ExponentOverflow`] when a resulting exponent does
    /// not fit in a `Rational64`.
    pub fn raise(&self, power: Rational64) -> Result<UnitDefinition> {
        let terms = self
            .terms
            .iter()
            .map(|t| {
                let exponent =
                    bounded(t.exponent.checked_mul(&power)).ok_or(Error::ExponentOverflow)?;
                Ok(UnitTerm {
                    exponent,
                    ..t.clone()
                })
            })
            .collect::<Result<Vec<_>>>()?;
        UnitDefinition { terms }
            .try_simplify()
            .ok_or(Error::ExponentOverflow)
    }
}

impl fmt::Display for UnitTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_unit_factor() {
            write!(f, "{}", self.kind)?;
        } else {
            f.write_str("(")?;
            if self.multiplier != 1.0 {
                write!(f, "{}*", self.multiplier)?;
            }
            if self.scale != 0 {
                write!(f, "10^{}*", self.scale)?;
            }
            write!(f, "{})", self.kind)?;
        }
        if self.exponent.is_integer() {
            if !self.exponent.is_one() {
                write!(f, "^{}", self.exponent.numer())?;
            }
        } else {
            write!(f, "^({})", self.exponent)?;
        }
        Ok(())
    }
}

impl fmt::Display for UnitDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return f.write_str("dimensionless");
        }
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str("*")?;
            }
            write!(f, "{}", term)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use UnitKind::*;

    fn r(n: i64, d: i64) -> Rational64 {
        Rational64::new(n, d)
    }

    #[test]
    fn simplify_merges_and_drops_zero_exponents() {
        let def = UnitDefinition::from_terms(vec![
            UnitTerm::new(Mole),
            UnitTerm::new(Litre).with_exponent(-1),
            UnitTerm::new(Liter),
        ]);
        let simple = def.simplify();
        assert_eq!(simple.terms().len(), 1);
        assert_eq!(simple.terms()[0].kind, Mole);
    }

    #[test]
    fn simplify_keeps_lonely_term_verbatim() {
        let def = UnitDefinition::from_terms(vec![UnitTerm::new(Mole).with_scale(-3)]);
        assert_eq!(def.simplify(), def);
    }

    #[test]
    fn simplify_folds_dimensionless_multiplier() {
        let def = UnitDefinition::from_terms(vec![
            UnitTerm::new(Dimensionless).with_multiplier(1000.0),
            UnitTerm::new(Second),
        ]);
        let simple = def.simplify();
        assert_eq!(simple.terms().len(), 1);
        assert_eq!(simple.terms()[0].kind, Second);
        assert!((simple.terms()[0].multiplier - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn litre_is_equivalent_to_cubic_metre() {
        let litre = UnitDefinition::of(Litre, 1);
        let m3 = UnitDefinition::of(Metre, 3);
        assert!(litre.equivalent(&m3));
        assert!(!litre.identical(&m3));
    }

    #[test]
    fn newton_decomposes() {
        let newton = UnitDefinition::of(Newton, 1);
        let manual = UnitDefinition::from_terms(vec![
            UnitTerm::new(Kilogram),
            UnitTerm::new(Metre),
            UnitTerm::new(Second).with_exponent(-2),
        ]);
        assert!(newton.equivalent(&manual));
    }

    #[test]
    fn identical_requires_matching_scale() {
        let mm = UnitDefinition::from_terms(vec![UnitTerm::new(Mole).with_scale(-3)]);
        let mol = UnitDefinition::of(Mole, 1);
        assert!(mm.equivalent(&mol));
        assert!(!mm.identical(&mol));
        assert!(mm.identical(&mm.clone()));
    }

    #[test]
    fn divide_subtracts_exponents() {
        let conc = UnitDefinition::of(Mole, 1).divide(&UnitDefinition::of(Litre, 1));
        let rate = conc.divide(&UnitDefinition::of(Second, 1));
        assert_eq!(rate.terms().len(), 3);
        assert_eq!(rate.terms()[2].exponent, r(-1, 1));
        assert!(rate.divide(&rate).is_dimensionless());
        assert!(rate.divide(&rate).is_empty());
    }

    #[test]
    fn raise_scales_exponents() {
        let m4 = UnitDefinition::of(Metre, 4);
        assert_eq!(m4.raise(r(1, 2)).unwrap(), UnitDefinition::of(Metre, 2));
        assert_eq!(
            UnitDefinition::of(Metre, 3).raise(r(1, 2)).unwrap().terms()[0].exponent,
            r(3, 2)
        );
    }

    #[test]
    fn raise_reports_exponent_overflow() {
        let m2 = UnitDefinition::of(Metre, 2);
        assert_eq!(
            m2.raise(Rational64::from_integer(i64::MAX)),
            Err(Error::ExponentOverflow)
        );
        let huge = UnitDefinition::of(Metre, i64::MAX);
        assert_eq!(huge.raise(r(1, 1)).unwrap(), huge);
        assert_eq!(huge.invert().terms()[0].exponent, r(-i64::MAX, 1));
    }

    #[test]
    fn overflowing_merge_keeps_terms_apart() {
        let def = UnitDefinition::from_terms(vec![
            UnitTerm::new(Metre).with_exponent(i64::MAX),
            UnitTerm::new(Metre).with_exponent(i64::MAX),
        ]);
        assert_eq!(def.simplify(), def);
        assert_eq!(def.multiply(&def).terms().len(), 4);
        assert!(!def.is_dimensionless());
    }

    #[test]
    fn radian_is_dimensionless() {
        assert!(UnitDefinition::of(Radian, 1).is_dimensionless());
        assert!(UnitDefinition::dimensionless().is_dimensionless());
        assert!(!UnitDefinition::of(Item, 1).is_dimensionless());
    }

    #[test]
    fn display_forms() {
        let def = UnitDefinition::from_terms(vec![
            UnitTerm::new(Mole).with_scale(-3),
            UnitTerm::new(Litre).with_exponent(-1),
            UnitTerm::new(Metre).with_exponent(r(1, 2)),
        ]);
        assert_eq!(def.to_string(), "(10^-3*mole)*litre^-1*metre^(1/2)");
        assert_eq!(UnitDefinition::dimensionless().to_string(), "dimensionless");
    }
}
