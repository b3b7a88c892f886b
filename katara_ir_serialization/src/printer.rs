//! Deterministic printer for the textual IR format (§4.3.4), grounded on
//! `examples/original_source/src/ir/serialization/printer.cc` and
//! `print.cc`. Printing and parsing are meant to round-trip (§6.2): every
//! textual choice the printer makes (omitted type annotations, operand
//! order) is one the parser already resolves the same way.
//!
//! As it writes, the printer records the same position bundles
//! [`crate::parser`] produces, but relative to the start of the printed
//! text (offset `0`) rather than to any [`katara_common::position::FileSet`]
//! slot — callers that add the result as a `File` can rebase with
//! `file.start()`.

use crate::positions::{BlockPositions, FuncPositions, InstrPositions, ProgramPositions};
use katara_common::position::{Pos, Range, NO_RANGE};
use katara_ir::block::Block;
use katara_ir::function::Function;
use katara_ir::instr::Instr;
use katara_ir::program::Program;
use katara_ir::types::{TypeKey, TypeTable};
use katara_ir::value::{Constant, FuncNumber, InheritedValue, Value};

struct Printer<'t> {
    buf: String,
    types: &'t TypeTable,
}

impl<'t> Printer<'t> {
    fn pos(&self) -> Pos {
        self.buf.len() as Pos
    }

    fn emit(&mut self, s: &str) -> Range {
        let start = self.pos();
        self.buf.push_str(s);
        Range::new(start, self.pos())
    }

    fn emit_type(&mut self, ty: TypeKey) -> Range {
        let rendered = self.types.display(ty);
        self.emit(&rendered)
    }

    /// A value at a use site: computed values never carry a type suffix
    /// (resolved from wherever they were defined, §4.3.3); constants
    /// default to `i64` when unannotated, so an `int` constant of any other
    /// type needs an explicit `:Type` suffix to round-trip.
    fn emit_value(&mut self, value: &Value) -> Range {
        let start = self.pos();
        match value {
            Value::Constant(Constant::Int { ty, value }) if *ty != TypeTable::I64 => {
                self.emit(&format!("#{value}:"));
                self.emit_type(*ty);
            }
            other => {
                self.emit(&other.to_string());
            }
        }
        Range::new(start, self.pos())
    }

    fn emit_inherited(&mut self, arg: &InheritedValue) -> Range {
        let start = self.pos();
        self.emit_value(&arg.value);
        self.emit(&format!("{{{}}}", arg.origin));
        Range::new(start, self.pos())
    }

    fn emit_joined<T>(&mut self, items: &[T], mut one: impl FnMut(&mut Self, &T) -> Range) -> Vec<Range> {
        let mut ranges = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.emit(", ");
            }
            ranges.push(one(self, item));
        }
        ranges
    }

    fn combine_all(ranges: &[Range]) -> Range {
        ranges.iter().copied().reduce(|a, b| a.combine(b)).unwrap_or(NO_RANGE)
    }

    fn print_instr(&mut self, instr: &Instr) -> InstrPositions {
        let defined = instr.defined();
        let defined_ranges = self.emit_joined(&defined, |p, c| {
            let start = p.pos();
            p.emit(&format!("%{}: ", c.number));
            p.emit_type(c.ty);
            Range::new(start, p.pos())
        });
        let defined_all = Self::combine_all(&defined_ranges);
        if !defined.is_empty() {
            self.emit(" = ");
        }
        let opcode = self.emit(instr.mnemonic());

        let mut used_ranges = Vec::new();
        match instr {
            Instr::Phi { args, .. } => {
                self.emit(" ");
                used_ranges = self.emit_joined(args, |p, a| p.emit_inherited(a));
            }
            Instr::Jump { target } => {
                self.emit(&format!(" {{{target}}}"));
            }
            Instr::JumpCond { condition, target_true, target_false } => {
                self.emit(" ");
                used_ranges.push(self.emit_value(condition));
                self.emit(&format!(", {{{target_true}}}, {{{target_false}}}"));
            }
            Instr::Call { callee, args, .. } => {
                self.emit(" ");
                used_ranges.push(self.emit_value(callee));
                self.emit("(");
                let arg_ranges = self.emit_joined(args, |p, v| p.emit_value(v));
                used_ranges.extend(arg_ranges);
                self.emit(")");
            }
            Instr::Return { values } => {
                if !values.is_empty() {
                    self.emit(" ");
                    used_ranges = self.emit_joined(values, |p, v| p.emit_value(v));
                }
            }
            other => {
                let values = other.used_values();
                if !values.is_empty() {
                    self.emit(" ");
                    used_ranges = self.emit_joined(&values, |p, v| p.emit_value(v));
                }
            }
        }
        let used_all = Self::combine_all(&used_ranges);
        self.emit("\n");

        InstrPositions { opcode, defined: defined_ranges, defined_all, used: used_ranges, used_all }
    }

    fn print_block(&mut self, block: &Block, positions: &mut ProgramPositions, func_num: FuncNumber) {
        let number = self.emit(&format!("{{{}}}", block.number()));
        let name = block.name().map(|n| {
            self.emit(" ");
            self.emit(n)
        });
        self.emit("\n");
        let body_start = self.pos();
        for (index, instr) in block.instrs().iter().enumerate() {
            let instr_positions = self.print_instr(instr);
            positions.instrs.insert((func_num, block.number(), index), instr_positions);
        }
        let body = Range::new(body_start, self.pos());
        positions.blocks.insert((func_num, block.number()), BlockPositions { number, name, body });
    }

    fn print_func(&mut self, func: &Function, positions: &mut ProgramPositions) {
        let func_start = self.pos();
        self.emit("@");
        let number = self.emit(&func.number().to_string());
        let name = func.name().map(|n| {
            self.emit(" ");
            self.emit(n)
        });

        self.emit("(");
        let args_outer_start = self.pos();
        let args = self.emit_joined(func.args(), |p, c| {
            let start = p.pos();
            p.emit(&format!("%{}: ", c.number));
            p.emit_type(c.ty);
            Range::new(start, p.pos())
        });
        self.emit(")");
        let args_outer = Range::new(args_outer_start, self.pos());

        self.emit(" => (");
        let results_outer_start = self.pos();
        let results = self.emit_joined(func.result_types(), |p, &ty| p.emit_type(ty));
        self.emit(")");
        let results_outer = Range::new(results_outer_start, self.pos());

        self.emit(" {\n");
        let body_start = self.pos();
        for block in func.blocks() {
            self.print_block(block, positions, func.number());
        }
        self.emit("}\n\n");
        let func_end = self.pos();

        positions.funcs.insert(
            func.number(),
            FuncPositions {
                number,
                name,
                args_outer,
                args,
                results_outer,
                results,
                body: Range::new(body_start, func_end),
            },
        );
        let _ = func_start;
    }
}

/// Prints every function in `program` in ascending function-number order
/// (§4.3.4), returning the text alongside position bundles anchored at
/// offset `0` of that text.
pub fn print_program(program: &Program) -> (String, ProgramPositions) {
    let mut printer = Printer { buf: String::new(), types: program.types() };
    let mut positions = ProgramPositions::new();
    for func in program.funcs() {
        printer.print_func(func, &mut positions);
    }
    (printer.buf, positions)
}

/// Prints a single function, useful for debug-artifact dumps of one
/// function at a time (§6.1's `--debug-dir` output).
pub fn print_func(func: &Function, types: &TypeTable) -> String {
    let mut printer = Printer { buf: String::new(), types };
    let mut positions = ProgramPositions::new();
    printer.print_func(func, &mut positions);
    printer.buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;
    use crate::issues::ParseIssueKind;
    use katara_common::issues::IssueTracker;
    use katara_common::position::FileSet;
    use katara_ir::value::Computed;

    fn parse(text: &str) -> Program {
        let mut files = FileSet::new();
        let file = files.add_file("t.ir", text.to_string());
        let mut issues: IssueTracker<ParseIssueKind> = IssueTracker::new();
        let (program, _) = parse_program(files.file(file), &mut issues);
        assert!(!issues.has_errors(), "unexpected parse errors: {:?}", issues.issues());
        program
    }

    #[test]
    fn prints_minimal_function() {
        let mut program = Program::new();
        let f = program.add_func(None);
        program.func_mut(f).unwrap().set_name("f");
        let func = program.func_mut(f).unwrap();
        let b0 = func.add_block(None);
        func.block_mut(b0).unwrap().push_instr(Instr::Return { values: vec![] });
        let (text, _) = print_program(&program);
        assert_eq!(text, "@0 f() => () {\n{0}\nret\n}\n\n");
    }

    #[test]
    fn round_trips_through_parse() {
        let mut program = Program::new();
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        let arg = func.add_arg(TypeTable::I64);
        func.result_types_mut().push(TypeTable::I64);
        let b0 = func.add_block(None);
        let result = Computed::new(func.fresh_value_number(None), TypeTable::I64);
        func.block_mut(b0).unwrap().push_instr(Instr::IntBinary {
            result,
            op: katara_ir::IntBinaryOp::Add,
            lhs: Value::Computed(arg),
            rhs: Value::Constant(Constant::Int { ty: TypeTable::I64, value: 1 }),
        });
        func.block_mut(b0).unwrap().push_instr(Instr::Return { values: vec![Value::Computed(result)] });

        let (text, _) = print_program(&program);
        let reparsed = parse(&text);
        assert!(katara_ir::programs_equal(&program, &reparsed));
    }

    #[test]
    fn int_constant_with_non_default_type_prints_with_suffix() {
        let mut program = Program::new();
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        func.result_types_mut().push(TypeTable::I32);
        let b0 = func.add_block(None);
        func.block_mut(b0).unwrap().push_instr(Instr::Return {
            values: vec![Value::Constant(Constant::Int { ty: TypeTable::I32, value: 7 })],
        });
        let (text, _) = print_program(&program);
        assert!(text.contains("#7:i32"), "got: {text}");
    }
}
