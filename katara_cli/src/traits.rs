//! The programmatic seams `build-tool` hangs off of (§6.4): the
//! surface-language front end `build-tool` delegates AST-to-IR translation
//! to, and the CFG/liveness/interference analyses its `--debug-dir` artifact
//! writer delegates to. Both front ends are out of scope here, so this
//! crate only defines the traits and ships a test double for each.

use katara_ir::function::Function;
use katara_ir::program::Program;
use std::path::PathBuf;
use thiserror::Error;

/// Why `build-tool` couldn't produce a [`Program`] from surface-language
/// source. Distinguishes the two non-OK exit codes §6.1 documents for the
/// `build` subcommand that originate on the translator's side.
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("no main package found among the given paths")]
    NoMainPackage,
    #[error("translation to IR failed: {0}")]
    Failed(String),
}

/// Translates surface-language source into IR. The real implementation
/// (type-checking the surface language and lowering its AST) lives outside
/// this crate; `build-tool` is generic over this trait so its exit-code
/// contract is testable without it.
pub trait SurfaceTranslator {
    fn translate(&self, paths: &[PathBuf]) -> Result<Program, TranslationError>;
}

/// Always reports [`TranslationError::Failed`]. The translator `build-tool`
/// ships with until a real surface-language front end is wired in; its
/// `--help` text says so.
pub struct StubSurfaceTranslator;

impl SurfaceTranslator for StubSurfaceTranslator {
    fn translate(&self, _paths: &[PathBuf]) -> Result<Program, TranslationError> {
        Err(TranslationError::Failed(
            "no surface-language front end is wired into this build; \
             pass a SurfaceTranslator implementation to run a real build"
                .to_string(),
        ))
    }
}

/// Per-value live ranges within one function, as produced by an external
/// liveness analysis. Opaque here: this crate only renders whatever a
/// supplied [`LivenessAnalyzer`] hands back.
#[derive(Debug, Clone, Default)]
pub struct LiveRangeInfo {
    pub lines: Vec<String>,
}

/// An interference graph over value numbers, as produced by an external
/// register-allocation front end.
#[derive(Debug, Clone, Default)]
pub struct InterferenceGraph {
    pub edges: Vec<(u32, u32)>,
}

/// Computes live ranges for a function. Consumed only by the `--debug-dir`
/// artifact writer; not implemented beyond a test double, since the
/// algorithm itself is out of scope here.
pub trait LivenessAnalyzer {
    fn analyze(&self, func: &Function) -> LiveRangeInfo;
}

/// Computes an interference graph from a function's live ranges. Consumed
/// only by the `--debug-dir` artifact writer.
pub trait InterferenceAnalyzer {
    fn analyze(&self, func: &Function, live: &LiveRangeInfo) -> InterferenceGraph;
}

#[cfg(test)]
mod tests {
    use super::*;
    use katara_ir::program::Program;

    #[test]
    fn stub_translator_always_reports_translation_failed() {
        let translator = StubSurfaceTranslator;
        let result = translator.translate(&[]);
        assert!(matches!(result, Err(TranslationError::Failed(_))));
    }

    struct NoLiveness;
    impl LivenessAnalyzer for NoLiveness {
        fn analyze(&self, _func: &Function) -> LiveRangeInfo {
            LiveRangeInfo { lines: vec!["%0: [0, 4)".to_string()] }
        }
    }

    #[test]
    fn liveness_analyzer_trait_is_object_safe() {
        let mut program = Program::new();
        let f = program.add_func(None);
        program.func_mut(f).unwrap().add_block(None);

        let analyzer: &dyn LivenessAnalyzer = &NoLiveness;
        let func = program.func(f).unwrap();
        let info = analyzer.analyze(func);
        assert_eq!(info.lines.len(), 1);
    }
}
