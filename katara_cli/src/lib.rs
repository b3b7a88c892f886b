//! Shared plumbing for the `ir-tool` and `build-tool` binaries (§6.1): the
//! injectable [`SurfaceTranslator`]/[`LivenessAnalyzer`]/[`InterferenceAnalyzer`]
//! seams (§6.4) and the `--debug-dir` artifact writer both binaries share.

pub mod debug_artifacts;
pub mod error;
pub mod traits;

pub use debug_artifacts::{write_function_artifacts, write_program_stage};
pub use error::{CliError, CliResult};
pub use traits::{
    InterferenceAnalyzer, InterferenceGraph, LiveRangeInfo, LivenessAnalyzer, StubSurfaceTranslator,
    SurfaceTranslator, TranslationError,
};
