//! Pointer-lowering passes and ownership optimizers (§4.5): shared and
//! unique pointers down to primitive pointers, the optimizers that promote
//! one pointer kind to a cheaper one or erase it entirely, and the §4.6
//! pipeline that composes them into the single entry point a build tool
//! calls.

pub mod error;
pub mod pipeline;
pub mod remove_unused;
pub mod runtime;
pub mod shared_pointer;
pub mod shared_to_unique;
pub mod unique_pointer;
pub mod unique_to_local;

pub use error::{LoweringError, LoweringResult};
pub use pipeline::{run_pipeline, PipelineIssues, PipelineOptions};
pub use remove_unused::remove_unused_functions;
pub use runtime::{add_shared_pointer_runtime_funcs, SharedPointerRuntimeFuncs};
pub use shared_pointer::lower_shared_pointers_in_program;
pub use shared_to_unique::convert_shared_to_unique_pointers_in_program;
pub use unique_pointer::lower_unique_pointers_in_program;
pub use unique_to_local::promote_unique_pointers_to_locals_in_program;
