//! Writes the `--debug-dir` artifacts §6.1 specifies: one `ir.<stage>.txt`
//! per pipeline stage, plus per-function `.cfg.dot`/`.dom.dot` (derived
//! directly from the IR's own edges and dominator table) and
//! `.live_range_info.txt`/`.interference_graph.{txt,dot}` (derived from
//! whichever [`LivenessAnalyzer`]/[`InterferenceAnalyzer`] was supplied, or
//! a placeholder noting none was).

use crate::error::CliResult;
use crate::traits::{InterferenceAnalyzer, LivenessAnalyzer};
use katara_ir::function::Function;
use katara_ir::program::Program;
use katara_ir_serialization::print_program;
use std::fs;
use std::path::Path;

/// Writes `ir.<stage>.txt` with the program's current textual form. Called
/// once per named pipeline boundary (`init`, `ext_optimized`, `lowered`,
/// `optimized`).
pub fn write_program_stage(debug_dir: &Path, stage: &str, program: &Program) -> CliResult<()> {
    fs::create_dir_all(debug_dir)?;
    let (text, _positions) = print_program(program);
    fs::write(debug_dir.join(format!("ir.{stage}.txt")), text)?;
    Ok(())
}

fn func_label(func: &Function) -> String {
    func.name().map(|n| n.to_string()).unwrap_or_else(|| format!("f{}", func.number()))
}

fn cfg_dot(func: &Function) -> String {
    let label = func_label(func);
    let mut out = format!("digraph \"{label}\" {{\n");
    for block in func.blocks() {
        for child in block.children() {
            out.push_str(&format!("  b{} -> b{};\n", block.number(), child));
        }
    }
    out.push_str("}\n");
    out
}

fn dom_dot(func: &Function) -> String {
    let label = func_label(func);
    let mut out = format!("digraph \"{label}_dom\" {{\n");
    for (block, idom) in func.immediate_dominators() {
        if block != idom {
            out.push_str(&format!("  b{idom} -> b{block};\n"));
        }
    }
    out.push_str("}\n");
    out
}

const NO_ANALYSIS_NOTE: &str = "liveness/interference analysis not run: no analyzer was supplied\n";

/// Writes the per-function artifacts for every function in `program`.
/// `liveness`/`interference` are `None` unless a caller wires up real
/// analyses (§6.4); the CLI binaries in this crate never do, so by default
/// these always fall back to the placeholder note rather than failing.
pub fn write_function_artifacts(
    debug_dir: &Path,
    program: &Program,
    liveness: Option<&dyn LivenessAnalyzer>,
    interference: Option<&dyn InterferenceAnalyzer>,
) -> CliResult<()> {
    fs::create_dir_all(debug_dir)?;
    for func in program.funcs() {
        let label = func_label(func);
        fs::write(debug_dir.join(format!("{label}.cfg.dot")), cfg_dot(func))?;
        fs::write(debug_dir.join(format!("{label}.dom.dot")), dom_dot(func))?;

        match liveness.map(|l| l.analyze(func)) {
            Some(info) => {
                fs::write(debug_dir.join(format!("{label}.live_range_info.txt")), info.lines.join("\n"))?;
                if let Some(interference) = interference {
                    let graph = interference.analyze(func, &info);
                    let text = graph.edges.iter().map(|(a, b)| format!("%{a} -- %{b}")).collect::<Vec<_>>().join("\n");
                    fs::write(debug_dir.join(format!("{label}.interference_graph.txt")), text)?;
                    let mut dot = format!("graph \"{label}_interference\" {{\n");
                    for (a, b) in &graph.edges {
                        dot.push_str(&format!("  v{a} -- v{b};\n"));
                    }
                    dot.push_str("}\n");
                    fs::write(debug_dir.join(format!("{label}.interference_graph.dot")), dot)?;
                } else {
                    write_no_interference_placeholder(debug_dir, &label)?;
                }
            }
            None => {
                fs::write(debug_dir.join(format!("{label}.live_range_info.txt")), NO_ANALYSIS_NOTE)?;
                write_no_interference_placeholder(debug_dir, &label)?;
            }
        }
    }
    Ok(())
}

fn write_no_interference_placeholder(debug_dir: &Path, label: &str) -> CliResult<()> {
    fs::write(debug_dir.join(format!("{label}.interference_graph.txt")), NO_ANALYSIS_NOTE)?;
    fs::write(debug_dir.join(format!("{label}.interference_graph.dot")), NO_ANALYSIS_NOTE)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use katara_ir::instr::Instr;
    use katara_ir::program::Program;
    use katara_ir::types::TypeTable;
    use katara_ir::value::Value;

    fn sample_program() -> Program {
        let mut program = Program::new();
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        func.set_name("main");
        let b0 = func.add_block(None);
        func.block_mut(b0).unwrap().push_instr(Instr::Return { values: vec![] });
        program
    }

    #[test]
    fn stage_file_lands_in_debug_dir() {
        let dir = tempfile::tempdir().unwrap();
        let program = sample_program();
        write_program_stage(dir.path(), "init", &program).unwrap();
        let contents = fs::read_to_string(dir.path().join("ir.init.txt")).unwrap();
        assert!(contents.contains("@0 main"));
    }

    #[test]
    fn function_artifacts_fall_back_to_placeholder_without_an_analyzer() {
        let dir = tempfile::tempdir().unwrap();
        let program = sample_program();
        write_function_artifacts(dir.path(), &program, None, None).unwrap();

        assert!(dir.path().join("main.cfg.dot").exists());
        assert!(dir.path().join("main.dom.dot").exists());
        let live = fs::read_to_string(dir.path().join("main.live_range_info.txt")).unwrap();
        assert_eq!(live, NO_ANALYSIS_NOTE);
    }

    #[test]
    fn cfg_dot_has_one_edge_per_control_flow_edge() {
        let mut program = Program::new();
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        let cond = func.add_arg(TypeTable::BOOL);
        let b0 = func.add_block(None);
        let b1 = func.add_block(None);
        func.block_mut(b0).unwrap().push_instr(Instr::JumpCond {
            condition: Value::Computed(cond),
            target_true: b1,
            target_false: b1,
        });
        func.add_control_flow(b0, b1);
        func.block_mut(b1).unwrap().push_instr(Instr::Return { values: vec![] });

        let dot = cfg_dot(program.func(f).unwrap());
        assert!(dot.contains("b0 -> b1"));
    }
}
