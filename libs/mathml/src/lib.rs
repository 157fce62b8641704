//! Content MathML for model formulas
//!
//! ```text
//! <math> ... </math>
//!      |
//!   XmlReader (quick-xml) -> XmlToken stream
//!      |
//!   reader -> ExprNode
//!      |
//!   writer -> <math> ... </math>
//! ```
//!
//! `read_math(&write_math(tree)?)?` gives back `tree`; the bytes may differ
//! in whitespace and attribute order.

pub mod error;
pub mod reader;
pub mod stream;
pub mod writer;

pub use error::{Error, Result};
pub use reader::{read_all_math, read_all_math_with, read_math, read_math_with, ReadOptions};
pub use stream::{XmlElement, XmlReader, XmlStream, XmlToken};
pub use writer::{write_math, write_math_with, WriteOptions};

pub const MATHML_NS: &str = "http://www.w3.org/1998/Math/MathML";
/// Namespace of the `units` attribute on `<cn>`.
pub const SBML_NS: &str = "http://www.sbml.org/sbml/level3/version1/core";

pub const TIME_URL: &str = "http://www.sbml.org/sbml/symbols/time";
pub const DELAY_URL: &str = "http://www.sbml.org/sbml/symbols/delay";
pub const AVOGADRO_URL: &str = "http://www.sbml.org/sbml/symbols/avogadro";
