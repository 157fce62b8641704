//! Errors raised while building a symbol table

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("'{id}' declares unknown units '{units}': {source}")]
    UnknownUnits {
        id: String,
        units: String,
        #[source]
        source: sbmlmath_units::Error,
    },

    #[error("species '{species}' is placed in unknown compartment '{compartment}'")]
    UnknownCompartment { species: String, compartment: String },

    #[error("function definition '{id}' does not parse: {source}")]
    FunctionDefinition {
        id: String,
        #[source]
        source: sbmlmath_formula::Error,
    },

    #[error("function definition '{id}' is not a lambda")]
    NotALambda { id: String },
}
