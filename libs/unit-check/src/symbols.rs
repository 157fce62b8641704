//! Symbol tables: what the unit checker knows about the model
//!
//! [`SymbolTable`] is the read-only view the checker consumes. [`ModelSymbols`]
//! is an in-memory table that can be loaded from JSON:
//!
//! ```json
//! {
//!   "timeUnits": "second",
//!   "substanceUnits": "mole",
//!   "unitDefinitions": { "per_second": "second^-1" },
//!   "compartments": { "cell": { "units": "litre" } },
//!   "species": { "S1": { "compartment": "cell" } },
//!   "parameters": { "k1": { "units": "per_second" } },
//!   "reactions": ["R1"],
//!   "functionDefinitions": { "sq": "lambda(x, x * x)" }
//! }
//! ```
//!
//! Unit fields name an entry of `unitDefinitions`, a unit kind, or a unit
//! expression such as `mole*litre^-1`.

use crate::error::{Error, Result};
use sbmlmath_formula::{parse_formula, ExprNode, Lambda};
use sbmlmath_units::{UnitDefinition, UnitKind};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Compartment,
    Species,
    Parameter,
    /// A reaction id, standing for its rate of extent.
    Reaction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSymbol {
    pub kind: SymbolKind,
    /// `None` when the model does not declare units for the symbol.
    pub units: Option<UnitDefinition>,
}

/// Model context the unit checker resolves names against.
pub trait SymbolTable {
    fn resolve(&self, name: &str) -> Option<ResolvedSymbol>;

    fn function_definition(&self, name: &str) -> Option<&Lambda>;

    fn time_units(&self) -> Option<UnitDefinition>;

    /// Units of the avogadro constant; `None` uses the checker's default.
    fn avogadro_units(&self) -> Option<UnitDefinition> {
        None
    }

    /// Resolve the `units` attribute of a literal.
    fn unit_definition(&self, id: &str) -> Option<UnitDefinition> {
        id.parse::<UnitKind>()
            .ok()
            .map(|kind| UnitDefinition::of(kind, 1))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Species {
    compartment: String,
    substance_units: Option<UnitDefinition>,
    has_only_substance_units: bool,
}

/// In-memory symbol table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(try_from = "SymbolsFile")]
pub struct ModelSymbols {
    time_units: Option<UnitDefinition>,
    substance_units: Option<UnitDefinition>,
    extent_units: Option<UnitDefinition>,
    unit_definitions: HashMap<String, UnitDefinition>,
    compartments: HashMap<String, Option<UnitDefinition>>,
    species: HashMap<String, Species>,
    parameters: HashMap<String, Option<UnitDefinition>>,
    reactions: HashSet<String>,
    function_definitions: HashMap<String, Lambda>,
}

impl ModelSymbols {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a table from its JSON form.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Units named by `text`, resolved against the table's own definitions
    /// first.
    pub fn units(&self, text: &str) -> std::result::Result<UnitDefinition, sbmlmath_units::Error> {
        match self.unit_definitions.get(text) {
            Some(def) => Ok(def.clone()),
            None => text.parse(),
        }
    }

    fn declared(&self, id: &str, units: Option<&str>) -> Result<Option<UnitDefinition>> {
        units
            .map(|text| {
                self.units(text).map_err(|source| Error::UnknownUnits {
                    id: id.to_string(),
                    units: text.to_string(),
                    source,
                })
            })
            .transpose()
    }

    pub fn with_unit_definition(mut self, id: impl Into<String>, def: UnitDefinition) -> Self {
        self.unit_definitions.insert(id.into(), def);
        self
    }

    pub fn with_time_units(mut self, units: &str) -> Result<Self> {
        self.time_units = self.declared("timeUnits", Some(units))?;
        Ok(self)
    }

    pub fn with_substance_units(mut self, units: &str) -> Result<Self> {
        self.substance_units = self.declared("substanceUnits", Some(units))?;
        Ok(self)
    }

    pub fn with_extent_units(mut self, units: &str) -> Result<Self> {
        self.extent_units = self.declared("extentUnits", Some(units))?;
        Ok(self)
    }

    pub fn with_compartment(mut self, id: &str, units: Option<&str>) -> Result<Self> {
        let units = self.declared(id, units)?;
        self.compartments.insert(id.to_string(), units);
        Ok(self)
    }

    pub fn with_parameter(mut self, id: &str, units: Option<&str>) -> Result<Self> {
        let units = self.declared(id, units)?;
        self.parameters.insert(id.to_string(), units);
        Ok(self)
    }

    /// Adds a species; `substance_units` falls back to the model's.
    pub fn with_species(
        mut self,
        id: &str,
        compartment: &str,
        substance_units: Option<&str>,
        has_only_substance_units: bool,
    ) -> Result<Self> {
        if !self.compartments.contains_key(compartment) {
            return Err(Error::UnknownCompartment {
                species: id.to_string(),
                compartment: compartment.to_string(),
            });
        }
        let substance_units = self.declared(id, substance_units)?;
        self.species.insert(
            id.to_string(),
            Species {
                compartment: compartment.to_string(),
                substance_units,
                has_only_substance_units,
            },
        );
        Ok(self)
    }

    pub fn with_reaction(mut self, id: &str) -> Self {
        self.reactions.insert(id.to_string());
        self
    }

    /// Adds a function definition written in infix form, e.g.
    /// `lambda(x, y, x * y)`.
    pub fn with_function(mut self, id: &str, formula: &str) -> Result<Self> {
        let node = parse_formula(formula).map_err(|source| Error::FunctionDefinition {
            id: id.to_string(),
            source,
        })?;
        match node {
            ExprNode::Lambda(lambda) => {
                self.function_definitions.insert(id.to_string(), lambda);
                Ok(self)
            }
            _ => Err(Error::NotALambda { id: id.to_string() }),
        }
    }

    fn species_units(&self, species: &Species) -> Option<UnitDefinition> {
        let substance = species
            .substance_units
            .clone()
            .or_else(|| self.substance_units.clone())?;
        if species.has_only_substance_units {
            return Some(substance);
        }
        let size = self.compartments.get(&species.compartment)?.as_ref()?;
        Some(substance.divide(size))
    }
}

impl SymbolTable for ModelSymbols {
    fn resolve(&self, name: &str) -> Option<ResolvedSymbol> {
        let (kind, units) = if let Some(species) = self.species.get(name) {
            (SymbolKind::Species, self.species_units(species))
        } else if let Some(units) = self.compartments.get(name) {
            (SymbolKind::Compartment, units.clone())
        } else if let Some(units) = self.parameters.get(name) {
            (SymbolKind::Parameter, units.clone())
        } else if self.reactions.contains(name) {
            let rate = match (&self.extent_units, &self.time_units) {
                (Some(extent), Some(time)) => Some(extent.divide(time)),
                _ => None,
            };
            (SymbolKind::Reaction, rate)
        } else {
            return None;
        };
        Some(ResolvedSymbol { kind, units })
    }

    fn function_definition(&self, name: &str) -> Option<&Lambda> {
        self.function_definitions.get(name)
    }

    fn time_units(&self) -> Option<UnitDefinition> {
        self.time_units.clone()
    }

    fn unit_definition(&self, id: &str) -> Option<UnitDefinition> {
        self.units(id).ok()
    }
}

// ============================================
// JSON form
// ============================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SymbolsFile {
    time_units: Option<String>,
    substance_units: Option<String>,
    extent_units: Option<String>,
    unit_definitions: HashMap<String, UnitDefinition>,
    compartments: HashMap<String, UnitsEntry>,
    species: HashMap<String, SpeciesEntry>,
    parameters: HashMap<String, UnitsEntry>,
    reactions: Vec<String>,
    function_definitions: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct UnitsEntry {
    units: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpeciesEntry {
    compartment: String,
    #[serde(default)]
    substance_units: Option<String>,
    #[serde(default)]
    has_only_substance_units: bool,
}

impl TryFrom<SymbolsFile> for ModelSymbols {
    type Error = Error;

    fn try_from(file: SymbolsFile) -> Result<Self> {
        let mut symbols = ModelSymbols {
            unit_definitions: file.unit_definitions,
            ..ModelSymbols::default()
        };
        if let Some(units) = &file.time_units {
            symbols = symbols.with_time_units(units)?;
        }
        if let Some(units) = &file.substance_units {
            symbols = symbols.with_substance_units(units)?;
        }
        if let Some(units) = &file.extent_units {
            symbols = symbols.with_extent_units(units)?;
        }
        for (id, entry) in &file.compartments {
            symbols = symbols.with_compartment(id, entry.units.as_deref())?;
        }
        for (id, entry) in &file.parameters {
            symbols = symbols.with_parameter(id, entry.units.as_deref())?;
        }
        for (id, entry) in &file.species {
            symbols = symbols.with_species(
                id,
                &entry.compartment,
                entry.substance_units.as_deref(),
                entry.has_only_substance_units,
            )?;
        }
        for id in &file.reactions {
            symbols = symbols.with_reaction(id);
        }
        for (id, formula) in &file.function_definitions {
            symbols = symbols.with_function(id, formula)?;
        }
        Ok(symbols)
    }
}
