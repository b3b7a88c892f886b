//! Textual IR serialization (§4.3): a scanner, a recoverable recursive-descent
//! parser, and a deterministic printer, all sharing the position-bundle types
//! in [`positions`] so diagnostics and debug output can point back into
//! source text.

pub mod error;
pub mod issues;
pub mod positions;
pub mod printer;
pub mod scanner;
pub mod parser;

pub use error::{SerializationError, SerializationResult};
pub use issues::ParseIssueKind;
pub use parser::{parse_into_program, parse_program};
pub use positions::{BlockPositions, FuncPositions, InstrPositions, ProgramPositions};
pub use printer::print_program;
