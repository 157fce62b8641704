use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("unit expression must be ASCII")]
    NonAscii,

    #[error("invalid unit syntax at byte {pos}: {message}")]
    Syntax { pos: usize, message: &'static str },

    #[error("unknown unit kind '{0}'")]
    UnknownKind(String),

    #[error("rational exponent has a zero denominator")]
    ZeroDenominator,

    #[error("unit exponent does not fit in a 64-bit rational")]
    ExponentOverflow,
}
