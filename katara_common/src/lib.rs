//! Position tracking and diagnostic issue tracking shared by every Katara IR
//! crate. Nothing in here knows about IR instructions or types; it is the
//! leaf layer (component A of the design) that the rest of the workspace is
//! built on.

pub mod error;
pub mod issues;
pub mod position;

pub use error::{CommonError, CommonResult};
pub use issues::{Format, Issue, IssueKind, IssueTracker, Origin, Severity};
pub use position::{FileSet, LineNumberRange, Pos, Range, ResolvedPosition, NO_POS, NO_RANGE};
