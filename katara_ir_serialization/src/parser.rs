//! Recoverable recursive-descent parser for the textual IR format (§4.3.3),
//! grounded on `examples/original_source/src/ir/serialization/func_parser.cc`,
//! `type_parser.cc`, and `constant_parser.cc`.
//!
//! The grammar allows a computed value's use sites to omit their type
//! (`'%' Num (':' Type)?`, §4.3.2) and §8.3's scenario S2 shows a phi operand
//! referencing a value defined in a block that appears *later* in the text.
//! To resolve those forward references this parser prescans each function
//! body once (a throwaway scan building a `value number -> type` table, using
//! the real type table so keys match) before parsing it for real — the same
//! "resolve forward references once every block is known" idea
//! `FuncParser::ConnectBlocks` applies to jump destinations, generalized to
//! value types.

use crate::issues::ParseIssueKind;
use crate::positions::{BlockPositions, FuncPositions, InstrPositions, ProgramPositions};
use crate::scanner::{Scanner, Token};
use katara_common::issues::IssueTracker;
use katara_common::position::{File, Pos, Range, NO_RANGE};
use katara_ir::instr::{BoolBinaryOp, Instr, IntBinaryOp, IntCompareOp, IntShiftOp, IntUnaryOp};
use katara_ir::program::Program;
use katara_ir::types::{IntType, MethodSignature, PointerStrength, StructField, Type, TypeKey, TypeTable};
use katara_ir::value::{BlockNumber, Computed, Constant, FuncNumber, InheritedValue, Value, ValueNumber};
use std::collections::HashMap;

/// Parses a whole file into a fresh [`Program`] with no function-number
/// offset.
pub fn parse_program(
    file: &File,
    issues: &mut IssueTracker<ParseIssueKind>,
) -> (Program, ProgramPositions) {
    let mut program = Program::new();
    let mut positions = ProgramPositions::new();
    parse_into_program(file, issues, &mut program, &mut positions, 0);
    (program, positions)
}

/// Parses a whole file's functions into an existing program, shifting every
/// parsed function number (and function-reference constant) by
/// `func_num_offset` (§4.3.3 offset composition — splices multiple IR
/// snippets into one program).
pub fn parse_into_program(
    file: &File,
    issues: &mut IssueTracker<ParseIssueKind>,
    program: &mut Program,
    positions: &mut ProgramPositions,
    func_num_offset: i64,
) {
    let mut scanner = Scanner::new(file, issues);
    scanner.next();
    let mut parser = Parser { scanner, program, positions, func_num_offset };
    parser.parse_program_body();
}

struct Parser<'a, 'b, 'p> {
    scanner: Scanner<'a, 'b>,
    program: &'p mut Program,
    positions: &'p mut ProgramPositions,
    func_num_offset: i64,
}

impl<'a, 'b, 'p> Parser<'a, 'b, 'p> {
    fn file(&self) -> &'a File {
        self.scanner.file()
    }

    fn add_issue(&mut self, kind: ParseIssueKind, range: Range, message: impl Into<String>) {
        self.scanner.issues_mut().add_at(kind, range, message.into());
    }

    fn consume(&mut self, token: Token) -> bool {
        if self.scanner.token() == token {
            self.scanner.next();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, expected: &[Token]) -> bool {
        if self.consume(token) {
            true
        } else {
            self.unexpected_token(expected);
            false
        }
    }

    fn unexpected_token(&mut self, expected: &[Token]) {
        let descs: Vec<&str> = expected.iter().map(|t| t.describe()).collect();
        self.add_issue(
            ParseIssueKind::UnexpectedToken,
            self.scanner.token_range(),
            format!(
                "unexpected {} token, expected one of: {}",
                self.scanner.token().describe(),
                descs.join(", ")
            ),
        );
    }

    /// Advances past tokens until a newline or `}` (inclusive for `}`),
    /// mirroring `Scanner::SkipPastTokenSequence`'s use at call sites.
    fn sync_to_newline_or_brace(&mut self) {
        loop {
            match self.scanner.token() {
                Token::Eof => break,
                Token::NewLine => {
                    self.scanner.next();
                    break;
                }
                Token::CurlyClose => {
                    self.scanner.next();
                    break;
                }
                _ => self.scanner.next(),
            }
        }
    }

    // Program ::= (Func | NL)*
    fn parse_program_body(&mut self) {
        loop {
            match self.scanner.token() {
                Token::NewLine => self.scanner.next(),
                Token::AtSign => self.parse_func(),
                Token::Eof => break,
                _ => {
                    self.unexpected_token(&[Token::NewLine, Token::AtSign, Token::Eof]);
                    self.sync_to_newline_or_brace();
                }
            }
        }
    }

    // Func ::= '@' Num Name? '(' Computed? (',' Computed)* ')' '=>' '(' Type? (',' Type)* ')' Body
    fn parse_func(&mut self) {
        let func_start = self.scanner.token_range().start;
        if !self.consume(Token::AtSign) {
            self.sync_to_newline_or_brace();
            return;
        }

        let num_range = self.scanner.token_range();
        let raw_num = if self.scanner.token() == Token::Number {
            let n = self.scanner.token_number();
            self.scanner.next();
            n
        } else {
            self.unexpected_token(&[Token::Number]);
            None
        };

        let mut func_num = raw_num.map(|n| (n + self.func_num_offset) as FuncNumber);
        if let Some(n) = func_num {
            if self.program.has_func(n) {
                self.add_issue(
                    ParseIssueKind::DuplicateFuncNumber,
                    num_range,
                    format!("@{n} is already used"),
                );
                func_num = None;
            }
        }
        let func_num = self.program.add_func(func_num);

        let mut name_range = None;
        if self.scanner.token() == Token::Identifier {
            let name = self.scanner.token_text().to_string();
            name_range = Some(self.scanner.token_range());
            self.scanner.next();
            if name == "main" {
                self.program.set_entry_func_num(func_num);
            }
            self.program.func_mut(func_num).unwrap().set_name(name);
        }

        let args_outer_start = self.scanner.token_range().start;
        let (args, args_ranges) = self.parse_func_args();
        let args_outer_end = self.scanner.token_range().start;
        self.expect(Token::Arrow, &[Token::Arrow]);
        let results_outer_start = self.scanner.token_range().start;
        let (results, results_ranges) = self.parse_func_result_types();
        let results_outer_end = self.scanner.token_range().start;

        for &ty in &results {
            self.program.func_mut(func_num).unwrap().result_types_mut().push(ty);
        }
        for (number, ty) in args {
            let computed = self.program.func_mut(func_num).unwrap().add_arg(ty);
            debug_assert_eq!(computed.number, number, "argument numbers are issued in declared order");
        }

        let (body_range, func_end) = self.parse_func_body(func_num);

        self.positions.funcs.insert(
            func_num,
            FuncPositions {
                number: num_range,
                name: name_range,
                args_outer: Range::new(args_outer_start, args_outer_end),
                args: args_ranges,
                results_outer: Range::new(results_outer_start, results_outer_end),
                results: results_ranges,
                body: body_range,
            },
        );
        let _ = func_start;
        let _ = func_end;
    }

    // FuncArgs ::= '(' (Computed (',' Computed)*)? ')'
    fn parse_func_args(&mut self) -> (Vec<(ValueNumber, TypeKey)>, Vec<Range>) {
        let mut args = Vec::new();
        let mut ranges = Vec::new();
        if !self.expect(Token::ParenOpen, &[Token::ParenOpen]) {
            return (args, ranges);
        }
        if self.scanner.token() != Token::ParenClose {
            loop {
                let start = self.scanner.token_range().start;
                if self.expect(Token::PercentSign, &[Token::PercentSign]) {
                    let number = self.scanner.token_number().unwrap_or(0) as ValueNumber;
                    self.consume(Token::Number);
                    let ty = if self.consume(Token::Colon) {
                        self.parse_type()
                    } else {
                        TypeTable::BOOL
                    };
                    args.push((number, ty));
                    ranges.push(Range::new(start, self.scanner.token_range().start));
                }
                if !self.consume(Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::ParenClose, &[Token::ParenClose]);
        (args, ranges)
    }

    // FuncResultTypes ::= '(' (Type (',' Type)*)? ')'
    fn parse_func_result_types(&mut self) -> (Vec<TypeKey>, Vec<Range>) {
        let mut results = Vec::new();
        let mut ranges = Vec::new();
        if !self.expect(Token::ParenOpen, &[Token::ParenOpen]) {
            return (results, ranges);
        }
        if self.scanner.token() != Token::ParenClose {
            loop {
                let start = self.scanner.token_range().start;
                results.push(self.parse_type());
                ranges.push(Range::new(start, self.scanner.token_range().start));
                if !self.consume(Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::ParenClose, &[Token::ParenClose]);
        (results, ranges)
    }

    // FuncBody ::= '{' NL (NL | Block)* '}'
    fn parse_func_body(&mut self, func_num: FuncNumber) -> (Range, Pos) {
        let body_start = self.scanner.token_range().start;
        if self.scanner.token() != Token::CurlyOpen {
            self.unexpected_token(&[Token::CurlyOpen]);
            return (NO_RANGE, body_start);
        }
        let body_close = find_matching_close_brace(self.file(), body_start);
        let value_types = self.prescan_value_types(Range::new(body_start + 1, body_close.saturating_sub(1)));

        self.scanner.next(); // consume '{'
        self.consume(Token::NewLine);

        let func_end;
        loop {
            match self.scanner.token() {
                Token::CurlyClose => {
                    func_end = self.scanner.token_range().end;
                    self.scanner.next();
                    break;
                }
                Token::NewLine => self.scanner.next(),
                Token::CurlyOpen => self.parse_block(func_num, &value_types),
                Token::Eof => {
                    func_end = self.scanner.token_range().end;
                    self.unexpected_token(&[Token::CurlyOpen, Token::CurlyClose, Token::NewLine]);
                    break;
                }
                _ => {
                    func_end = self.scanner.token_range().end;
                    self.unexpected_token(&[Token::CurlyOpen, Token::CurlyClose, Token::NewLine]);
                    break;
                }
            }
        }
        self.consume(Token::NewLine);
        self.connect_blocks(func_num);
        (Range::new(body_start, func_end), func_end)
    }

    /// Builds `value number -> type` by re-walking the body's raw bytes with
    /// a throwaway scanner and issue tracker, recording every `%Num:Type`
    /// occurrence. Diagnostics from this pass are discarded — the real pass
    /// re-reports anything that still looks wrong.
    fn prescan_value_types(&mut self, body_range: Range) -> HashMap<ValueNumber, TypeKey> {
        let mut map = HashMap::new();
        if !body_range.is_valid() {
            return map;
        }
        let mut scratch_issues = IssueTracker::new();
        let mut scratch = Scanner::new_at(self.file(), &mut scratch_issues, body_range.start);
        scratch.next();
        loop {
            if scratch.token() == Token::Eof || scratch.token_range().start > body_range.end {
                break;
            }
            if scratch.token() == Token::PercentSign {
                scratch.next();
                let number = scratch.token_number();
                if scratch.token() == Token::Number {
                    scratch.next();
                }
                if scratch.token() == Token::Colon {
                    scratch.next();
                    if let (Some(number), Some(ty)) = (number, self.try_parse_type_scratch(&mut scratch)) {
                        map.entry(number as ValueNumber).or_insert(ty);
                    }
                    continue;
                }
            } else {
                scratch.next();
            }
        }
        map
    }

    /// Parses one type off `scratch` for the prescan pass, interning into
    /// the real program's type table so the resulting keys match the main
    /// parse. Returns `None` on malformed input rather than recovering.
    fn try_parse_type_scratch(&mut self, scratch: &mut Scanner) -> Option<TypeKey> {
        parse_type_tokens(scratch, self.program.types_mut())
    }

    // Block ::= '{' Num '}' Name? NL Instr*
    fn parse_block(&mut self, func_num: FuncNumber, value_types: &HashMap<ValueNumber, TypeKey>) {
        let block_start = self.scanner.token_range().start;
        self.scanner.next(); // consume '{'
        let num_range = self.scanner.token_range();
        let raw_num = self.scanner.token_number();
        self.consume(Token::Number);
        self.expect(Token::CurlyClose, &[Token::CurlyClose]);

        let requested = raw_num.map(|n| n as BlockNumber);
        let func = self.program.func_mut(func_num).unwrap();
        let block_num = match requested {
            Some(n) if func.has_block(n) => {
                self.add_issue(
                    ParseIssueKind::DuplicateBlockNumber,
                    num_range,
                    format!("{{{n}}} is already used"),
                );
                self.program.func_mut(func_num).unwrap().add_block(None)
            }
            other => self.program.func_mut(func_num).unwrap().add_block(other),
        };

        let mut name_range = None;
        if self.scanner.token() == Token::Identifier {
            name_range = Some(self.scanner.token_range());
            let name = self.scanner.token_text().to_string();
            self.program.func_mut(func_num).unwrap().block_mut(block_num).unwrap().set_name(name);
            self.scanner.next();
        }
        self.consume(Token::NewLine);

        let body_start = self.scanner.token_range().start;
        loop {
            match self.scanner.token() {
                Token::CurlyOpen | Token::CurlyClose | Token::Eof => break,
                Token::NewLine => self.scanner.next(),
                _ => self.parse_instr(func_num, block_num, value_types),
            }
        }
        let body_end = self.scanner.token_range().start;

        self.positions.blocks.insert(
            (func_num, block_num),
            BlockPositions { number: num_range, name: name_range, body: Range::new(body_start, body_end) },
        );
        let _ = block_start;
    }

    // Instr ::= (Computed (',' Computed)* '=')? OpName Operands NL
    fn parse_instr(&mut self, func_num: FuncNumber, block_num: BlockNumber, value_types: &HashMap<ValueNumber, TypeKey>) {
        let instr_start = self.scanner.token_range().start;
        let mut defined = Vec::new();
        let mut defined_ranges = Vec::new();

        if self.scanner.token() == Token::PercentSign {
            loop {
                let start = self.scanner.token_range().start;
                self.scanner.next(); // '%'
                let number = self.scanner.token_number().unwrap_or(0) as ValueNumber;
                self.consume(Token::Number);
                let ty = if self.consume(Token::Colon) { self.parse_type() } else { TypeTable::BOOL };
                self.program.func_mut(func_num).unwrap().fresh_value_number(Some(number));
                defined.push(Computed::new(number, ty));
                defined_ranges.push(Range::new(start, self.scanner.token_range().start));
                if !self.consume(Token::Comma) {
                    break;
                }
            }
            if !self.expect(Token::EqualSign, &[Token::EqualSign]) {
                self.sync_to_newline_or_brace();
                return;
            }
        }

        let defined_all =
            defined_ranges.iter().copied().reduce(|a, b| a.combine(b)).unwrap_or(NO_RANGE);

        if self.scanner.token() != Token::Identifier {
            self.unexpected_token(&[Token::Identifier]);
            self.sync_to_newline_or_brace();
            return;
        }
        let opcode = self.scanner.token_text().to_string();
        let opcode_range = self.scanner.token_range();
        self.scanner.next();

        let mut used_ranges = Vec::new();
        let instr = self.parse_instr_operands(&opcode, &opcode_range, &defined, value_types, &mut used_ranges);
        let used_all = used_ranges.iter().copied().reduce(|a, b| a.combine(b)).unwrap_or(NO_RANGE);

        let index = {
            let block = self.program.func_mut(func_num).unwrap().block_mut(block_num).unwrap();
            let index = block.instrs().len();
            if let Some(instr) = instr {
                block.push_instr(instr);
            }
            index
        };
        self.positions.instrs.insert(
            (func_num, block_num, index),
            InstrPositions { opcode: opcode_range, defined: defined_ranges, defined_all, used: used_ranges, used_all },
        );

        self.consume(Token::NewLine);
        let _ = instr_start;
    }

    fn one_result(&mut self, defined: &[Computed], range: Range, name: &str) -> Computed {
        if defined.len() != 1 {
            self.add_issue(
                ParseIssueKind::WrongNumberOfResults,
                range,
                format!("'{name}' must have exactly one result, found {}", defined.len()),
            );
        }
        defined.first().copied().unwrap_or(Computed::new(0, TypeTable::BOOL))
    }

    fn no_results(&mut self, defined: &[Computed], range: Range, name: &str) {
        if !defined.is_empty() {
            self.add_issue(
                ParseIssueKind::WrongNumberOfResults,
                range,
                format!("'{name}' must not produce results, found {}", defined.len()),
            );
        }
    }

    fn parse_value_tracked(&mut self, value_types: &HashMap<ValueNumber, TypeKey>, out: &mut Vec<Range>) -> Value {
        let start = self.scanner.token_range().start;
        let value = self.parse_value(value_types);
        out.push(Range::new(start, self.scanner.token_range().start));
        value
    }

    fn parse_instr_operands(
        &mut self,
        opcode: &str,
        opcode_range: &Range,
        defined: &[Computed],
        value_types: &HashMap<ValueNumber, TypeKey>,
        used_ranges: &mut Vec<Range>,
    ) -> Option<Instr> {
        macro_rules! one {
            ($name:expr) => {
                self.one_result(defined, *opcode_range, $name)
            };
        }
        macro_rules! val {
            () => {
                self.parse_value_tracked(value_types, used_ranges)
            };
        }

        Some(match opcode {
            "mov" => Instr::Mov { result: one!("mov"), origin: val!() },
            "phi" => {
                let result = one!("phi");
                let mut args = Vec::new();
                loop {
                    let start = self.scanner.token_range().start;
                    let value = self.parse_value(value_types);
                    self.expect(Token::CurlyOpen, &[Token::CurlyOpen]);
                    let origin = self.scanner.token_number().unwrap_or(0) as BlockNumber;
                    self.consume(Token::Number);
                    self.expect(Token::CurlyClose, &[Token::CurlyClose]);
                    used_ranges.push(Range::new(start, self.scanner.token_range().start));
                    args.push(InheritedValue::new(value, origin));
                    if !self.consume(Token::Comma) {
                        break;
                    }
                }
                Instr::Phi { result, args }
            }
            "conv" => Instr::Conv { result: one!("conv"), operand: val!() },
            "bnot" => Instr::BoolNot { result: one!("bnot"), operand: val!() },
            "band" => {
                let result = one!("band");
                let lhs = val!();
                self.consume(Token::Comma);
                let rhs = val!();
                Instr::BoolBinary { result, op: BoolBinaryOp::And, lhs, rhs }
            }
            "bor" => {
                let result = one!("bor");
                let lhs = val!();
                self.consume(Token::Comma);
                let rhs = val!();
                Instr::BoolBinary { result, op: BoolBinaryOp::Or, lhs, rhs }
            }
            "ineg" => Instr::IntUnary { result: one!("ineg"), op: IntUnaryOp::Neg, operand: val!() },
            "inot" => Instr::IntUnary { result: one!("inot"), op: IntUnaryOp::Not, operand: val!() },
            "ieq" | "ineq" | "ilss" | "ileq" | "igtr" | "igeq" => {
                let op = match opcode {
                    "ieq" => IntCompareOp::Eq,
                    "ineq" => IntCompareOp::Neq,
                    "ilss" => IntCompareOp::Lss,
                    "ileq" => IntCompareOp::Leq,
                    "igtr" => IntCompareOp::Gtr,
                    _ => IntCompareOp::Geq,
                };
                let result = one!("icmp");
                let lhs = val!();
                self.consume(Token::Comma);
                let rhs = val!();
                Instr::IntCompare { result, op, lhs, rhs }
            }
            "iadd" | "isub" | "imul" | "idiv" | "irem" | "iand" | "ior" | "ixor" | "iandn" => {
                let op = match opcode {
                    "iadd" => IntBinaryOp::Add,
                    "isub" => IntBinaryOp::Sub,
                    "imul" => IntBinaryOp::Mul,
                    "idiv" => IntBinaryOp::Div,
                    "irem" => IntBinaryOp::Rem,
                    "iand" => IntBinaryOp::And,
                    "ior" => IntBinaryOp::Or,
                    "ixor" => IntBinaryOp::Xor,
                    _ => IntBinaryOp::Andn,
                };
                let result = one!("ibin");
                let lhs = val!();
                self.consume(Token::Comma);
                let rhs = val!();
                Instr::IntBinary { result, op, lhs, rhs }
            }
            "ishl" | "ishr" => {
                let op = if opcode == "ishl" { IntShiftOp::Shl } else { IntShiftOp::Shr };
                let result = one!("ishift");
                let shifted = val!();
                self.consume(Token::Comma);
                let offset = val!();
                Instr::IntShift { result, op, shifted, offset }
            }
            "poff" => {
                let result = one!("poff");
                let pointer = val!();
                self.consume(Token::Comma);
                let offset = val!();
                Instr::PointerOffset { result, pointer, offset }
            }
            "niltest" => Instr::NilTest { result: one!("niltest"), operand: val!() },
            "malloc" => Instr::Malloc { result: one!("malloc"), size: val!() },
            "load" => Instr::Load { result: one!("load"), address: val!() },
            "store" => {
                self.no_results(defined, *opcode_range, "store");
                let address = val!();
                self.consume(Token::Comma);
                let value = val!();
                Instr::Store { address, value }
            }
            "free" => {
                self.no_results(defined, *opcode_range, "free");
                Instr::Free { address: val!() }
            }
            "jmp" => {
                self.no_results(defined, *opcode_range, "jmp");
                self.expect(Token::CurlyOpen, &[Token::CurlyOpen]);
                let target = self.scanner.token_number().unwrap_or(0) as BlockNumber;
                self.consume(Token::Number);
                self.expect(Token::CurlyClose, &[Token::CurlyClose]);
                Instr::Jump { target }
            }
            "jcc" => {
                self.no_results(defined, *opcode_range, "jcc");
                let condition = val!();
                self.consume(Token::Comma);
                self.expect(Token::CurlyOpen, &[Token::CurlyOpen]);
                let target_true = self.scanner.token_number().unwrap_or(0) as BlockNumber;
                self.consume(Token::Number);
                self.expect(Token::CurlyClose, &[Token::CurlyClose]);
                self.consume(Token::Comma);
                self.expect(Token::CurlyOpen, &[Token::CurlyOpen]);
                let target_false = self.scanner.token_number().unwrap_or(0) as BlockNumber;
                self.consume(Token::Number);
                self.expect(Token::CurlyClose, &[Token::CurlyClose]);
                Instr::JumpCond { condition, target_true, target_false }
            }
            "syscall" => {
                let result = one!("syscall");
                let number = val!();
                let mut args = Vec::new();
                while self.consume(Token::Comma) {
                    args.push(val!());
                }
                Instr::Syscall { result, number, args }
            }
            "call" => {
                let callee = val!();
                self.expect(Token::ParenOpen, &[Token::ParenOpen]);
                let mut args = Vec::new();
                if self.scanner.token() != Token::ParenClose {
                    loop {
                        args.push(val!());
                        if !self.consume(Token::Comma) {
                            break;
                        }
                    }
                }
                self.expect(Token::ParenClose, &[Token::ParenClose]);
                Instr::Call { results: defined.to_vec(), callee, args }
            }
            "ret" => {
                self.no_results(defined, *opcode_range, "ret");
                let mut values = Vec::new();
                if matches!(self.scanner.token(), Token::NewLine | Token::CurlyClose | Token::Eof) {
                    // no return values
                } else {
                    loop {
                        values.push(val!());
                        if !self.consume(Token::Comma) {
                            break;
                        }
                    }
                }
                Instr::Return { values }
            }
            "make_shared" => Instr::MakeShared { result: one!("make_shared"), size: val!() },
            "copy_shared" => {
                let result = one!("copy_shared");
                let source = val!();
                self.consume(Token::Comma);
                let offset = val!();
                Instr::CopyShared { result, source, offset }
            }
            "delete_shared" => {
                self.no_results(defined, *opcode_range, "delete_shared");
                Instr::DeleteShared { source: val!() }
            }
            "make_unique" => Instr::MakeUnique { result: one!("make_unique"), size: val!() },
            "delete_unique" => {
                self.no_results(defined, *opcode_range, "delete_unique");
                Instr::DeleteUnique { source: val!() }
            }
            "str_index" => {
                let result = one!("str_index");
                let string = val!();
                self.consume(Token::Comma);
                let index = val!();
                Instr::StrIndex { result, string, index }
            }
            "str_concat" => {
                let result = one!("str_concat");
                let mut operands = vec![val!()];
                while self.consume(Token::Comma) {
                    operands.push(val!());
                }
                Instr::StrConcat { result, operands }
            }
            other => {
                self.add_issue(
                    ParseIssueKind::UnknownInstructionName,
                    *opcode_range,
                    format!("unknown instruction '{other}'"),
                );
                return None;
            }
        })
    }

    fn parse_value(&mut self, value_types: &HashMap<ValueNumber, TypeKey>) -> Value {
        match self.scanner.token() {
            Token::PercentSign => {
                self.scanner.next();
                let number = self.scanner.token_number().unwrap_or(0) as ValueNumber;
                if !self.consume(Token::Number) {
                    self.unexpected_token(&[Token::Number]);
                }
                let ty = if self.consume(Token::Colon) {
                    self.parse_type()
                } else {
                    value_types.get(&number).copied().unwrap_or(TypeTable::BOOL)
                };
                Value::Computed(Computed::new(number, ty))
            }
            Token::HashSign => {
                self.scanner.next();
                if self.scanner.token() == Token::Identifier && self.scanner.token_text() == "t" {
                    self.scanner.next();
                    Value::Constant(Constant::Bool { ty: TypeTable::BOOL, value: true })
                } else if self.scanner.token() == Token::Identifier && self.scanner.token_text() == "f" {
                    self.scanner.next();
                    Value::Constant(Constant::Bool { ty: TypeTable::BOOL, value: false })
                } else if self.scanner.token() == Token::Number {
                    let value = self.scanner.token_number().unwrap_or(0);
                    self.scanner.next();
                    let ty = if self.consume(Token::Colon) { self.parse_type() } else { TypeTable::I64 };
                    Value::Constant(Constant::Int { ty, value })
                } else {
                    self.unexpected_token(&[Token::Identifier, Token::Number]);
                    Value::Constant(Constant::Int { ty: TypeTable::I64, value: 0 })
                }
            }
            Token::Address => {
                let value = self.scanner.token_address().unwrap_or(0);
                self.scanner.next();
                Value::Constant(Constant::Address { ty: TypeTable::PTR, value })
            }
            Token::AtSign => {
                self.scanner.next();
                let n = self.scanner.token_number();
                if !self.consume(Token::Number) {
                    self.unexpected_token(&[Token::Number]);
                }
                match n {
                    Some(-1) | None => Value::Constant(Constant::Func { ty: TypeTable::FUNC, value: None }),
                    Some(n) => Value::Constant(Constant::Func {
                        ty: TypeTable::FUNC,
                        value: Some((n + self.func_num_offset) as FuncNumber),
                    }),
                }
            }
            Token::Str => {
                let value = self.scanner.token_string().unwrap_or("").to_string();
                self.scanner.next();
                Value::Constant(Constant::Str { ty: TypeTable::STR, value })
            }
            _ => {
                self.unexpected_token(&[Token::PercentSign, Token::HashSign, Token::Address, Token::AtSign, Token::Str]);
                self.scanner.next();
                Value::Constant(Constant::Int { ty: TypeTable::I64, value: 0 })
            }
        }
    }

    fn parse_type(&mut self) -> TypeKey {
        if self.scanner.token() != Token::Identifier {
            self.unexpected_token(&[Token::Identifier]);
            return TypeTable::BOOL;
        }
        match parse_type_tokens(&mut self.scanner, self.program.types_mut()) {
            Some(key) => key,
            None => {
                let range = self.scanner.token_range();
                let text = self.scanner.token_text().to_string();
                self.scanner.next();
                self.add_issue(ParseIssueKind::UnknownTypeName, range, format!("unknown type name '{text}'"));
                TypeTable::BOOL
            }
        }
    }

    /// Resolves control-flow edges for every block in `func_num` from each
    /// block's terminator, reporting `UndefinedJumpDestination` for any
    /// target not defined anywhere in the function (§4.3.3: forward block
    /// references are resolved once all blocks are known).
    fn connect_blocks(&mut self, func_num: FuncNumber) {
        let func = self.program.func_mut(func_num).unwrap();
        let edges: Vec<(BlockNumber, BlockNumber)> = func
            .blocks()
            .flat_map(|block| {
                let from = block.number();
                block.instrs().last().map(|i| i.successors()).unwrap_or_default().into_iter().map(move |to| (from, to))
            })
            .collect();
        for (from, to) in edges {
            if self.program.func(func_num).unwrap().has_block(to) {
                self.program.func_mut(func_num).unwrap().add_control_flow(from, to);
            } else {
                self.add_issue(
                    ParseIssueKind::UndefinedJumpDestination,
                    NO_RANGE,
                    format!("{{{to}}} does not exist"),
                );
            }
        }
    }
}

/// Finds the position of the `}` matching the `{` at `open_pos`, skipping
/// over string-literal contents so a stray brace inside a string doesn't
/// confuse the depth count.
fn find_matching_close_brace(file: &File, open_pos: Pos) -> Pos {
    let mut depth = 0i32;
    let mut pos = open_pos;
    let mut in_string = false;
    while pos <= file.end() {
        let byte = file.at(pos);
        if in_string {
            if byte == b'\\' {
                pos += 1; // skip escaped char too
            } else if byte == b'"' {
                in_string = false;
            }
        } else {
            match byte {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return pos;
                    }
                }
                _ => {}
            }
        }
        pos += 1;
    }
    file.end()
}

/// Shared type-grammar parsing, usable with either the main scanner or a
/// throwaway prescan scanner, since both just need a `Token` stream and the
/// real program's type table to intern into.
fn parse_type_tokens(scanner: &mut Scanner, types: &mut TypeTable) -> Option<TypeKey> {
    if scanner.token() != Token::Identifier {
        return None;
    }
    let name = scanner.token_text().to_string();
    scanner.next();
    Some(match name.as_str() {
        "b" => TypeTable::BOOL,
        "i8" => types.int_key(IntType::I8),
        "i16" => types.int_key(IntType::I16),
        "i32" => types.int_key(IntType::I32),
        "i64" => types.int_key(IntType::I64),
        "u8" => types.int_key(IntType::U8),
        "u16" => types.int_key(IntType::U16),
        "u32" => types.int_key(IntType::U32),
        "u64" => types.int_key(IntType::U64),
        "ptr" => TypeTable::PTR,
        "func" => TypeTable::FUNC,
        "lstr" => TypeTable::STR,
        "ltypeid" => TypeTable::TYPE_ID,
        "lshared_ptr" => {
            if scanner.token() != Token::AngleOpen {
                return None;
            }
            scanner.next();
            let elem = parse_type_tokens(scanner, types)?;
            if scanner.token() != Token::Comma {
                return None;
            }
            scanner.next();
            let strength = if scanner.token() == Token::Identifier && scanner.token_text() == "s" {
                PointerStrength::Strong
            } else if scanner.token() == Token::Identifier && scanner.token_text() == "w" {
                PointerStrength::Weak
            } else {
                return None;
            };
            scanner.next();
            if scanner.token() != Token::AngleClose {
                return None;
            }
            scanner.next();
            types.intern(Type::SharedPointer { elem, strength })
        }
        "lunique_ptr" => {
            if scanner.token() != Token::AngleOpen {
                return None;
            }
            scanner.next();
            let elem = parse_type_tokens(scanner, types)?;
            if scanner.token() != Token::AngleClose {
                return None;
            }
            scanner.next();
            types.intern(Type::UniquePointer { elem })
        }
        "larray" => {
            if scanner.token() != Token::AngleOpen {
                return None;
            }
            scanner.next();
            let elem = parse_type_tokens(scanner, types)?;
            let count = if scanner.token() == Token::Comma {
                scanner.next();
                let n = scanner.token_number().map(|n| n as u64);
                scanner.next();
                n
            } else {
                None
            };
            if scanner.token() != Token::AngleClose {
                return None;
            }
            scanner.next();
            types.intern(Type::Array { elem, count })
        }
        "lstruct" => {
            let mut fields = Vec::new();
            if scanner.token() == Token::AngleOpen {
                scanner.next();
                loop {
                    if scanner.token() != Token::Identifier {
                        return None;
                    }
                    let field_name = scanner.token_text().to_string();
                    scanner.next();
                    if scanner.token() != Token::Colon {
                        return None;
                    }
                    scanner.next();
                    let ty = parse_type_tokens(scanner, types)?;
                    fields.push(StructField { name: field_name, ty });
                    if scanner.token() == Token::Comma {
                        scanner.next();
                        continue;
                    }
                    break;
                }
                if scanner.token() != Token::AngleClose {
                    return None;
                }
                scanner.next();
            }
            types.intern(Type::Struct { fields })
        }
        "linterface" => {
            let mut methods = Vec::new();
            if scanner.token() == Token::AngleOpen {
                scanner.next();
                loop {
                    if scanner.token() != Token::Identifier {
                        return None;
                    }
                    let method_name = scanner.token_text().to_string();
                    scanner.next();
                    if scanner.token() != Token::ParenOpen {
                        return None;
                    }
                    scanner.next();
                    let mut params = Vec::new();
                    if scanner.token() != Token::ParenClose {
                        loop {
                            params.push(parse_type_tokens(scanner, types)?);
                            if scanner.token() == Token::Comma {
                                scanner.next();
                                continue;
                            }
                            break;
                        }
                    }
                    if scanner.token() != Token::ParenClose {
                        return None;
                    }
                    scanner.next();
                    if scanner.token() != Token::Arrow {
                        return None;
                    }
                    scanner.next();
                    if scanner.token() != Token::ParenOpen {
                        return None;
                    }
                    scanner.next();
                    let mut results = Vec::new();
                    if scanner.token() != Token::ParenClose {
                        loop {
                            results.push(parse_type_tokens(scanner, types)?);
                            if scanner.token() == Token::Comma {
                                scanner.next();
                                continue;
                            }
                            break;
                        }
                    }
                    if scanner.token() != Token::ParenClose {
                        return None;
                    }
                    scanner.next();
                    methods.push(MethodSignature { name: method_name, params, results });
                    if scanner.token() == Token::Comma {
                        scanner.next();
                        continue;
                    }
                    break;
                }
                if scanner.token() != Token::AngleClose {
                    return None;
                }
                scanner.next();
            }
            types.intern(Type::Interface { methods })
        }
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use katara_common::position::FileSet;

    fn parse(text: &str) -> (Program, ProgramPositions, IssueTracker<ParseIssueKind>) {
        let mut set = FileSet::new();
        let idx = set.add_file("t.ir", text);
        let mut issues = IssueTracker::new();
        let (program, positions) = parse_program(set.file(idx), &mut issues);
        (program, positions, issues)
    }

    #[test]
    fn parses_minimal_function() {
        let (program, _, issues) = parse(
            "@0 main() => (i64) {\n  {0}\n    ret #123:i64\n}\n",
        );
        assert!(issues.is_empty(), "unexpected issues: {:?}", issues.issues());
        assert_eq!(program.func_count(), 1);
        let f = program.func(0).unwrap();
        assert_eq!(f.name(), Some("main"));
        assert_eq!(program.entry_func_num(), Some(0));
        let block = f.block(0).unwrap();
        assert_eq!(block.instrs().len(), 1);
    }

    #[test]
    fn resolves_forward_phi_reference_across_blocks() {
        let text = "@0 main() => (i64) {\n  {0}  jmp {1}\n  {1}  %0:i64 = phi %3{2}, #0{0}\n       %1:i64 = phi %4{2}, #0{0}\n       %2:b = ilss %0, #10:i64\n       jcc %2, {2}, {3}\n  {2}  %3:i64 = iadd %0, #1:i64\n       %4:i64 = iadd %0, %1\n       jmp {1}\n  {3}  ret %1\n}\n";
        let (program, _, issues) = parse(text);
        assert!(issues.is_empty(), "unexpected issues: {:?}", issues.issues());
        let f = program.func(0).unwrap();
        let block1 = f.block(1).unwrap();
        let phi0 = &block1.instrs()[0];
        if let Instr::Phi { args, .. } = phi0 {
            assert_eq!(args[0].value.ty(), f.result_types()[0]);
        } else {
            panic!("expected phi");
        }
    }

    #[test]
    fn duplicate_block_number_is_reported_and_recovered() {
        let text = "@0 f() => () {\n  {0}  ret\n  {0}  ret\n}\n";
        let (program, _, issues) = parse(text);
        assert!(issues.issues().iter().any(|i| i.kind == ParseIssueKind::DuplicateBlockNumber));
        assert_eq!(program.func(0).unwrap().block_count(), 2);
    }

    /// §8.2 boundary behavior: "Parsing `@` without a digit: parser emits a
    /// diagnostic and recovers."
    #[test]
    fn func_reference_constant_without_a_digit_is_reported_and_recovered() {
        let text = "@0 f() => (func) {\n  {0}  ret @\n}\n";
        let (program, _, issues) = parse(text);
        assert!(issues.issues().iter().any(|i| i.kind == ParseIssueKind::UnexpectedToken));
        let f = program.func(0).unwrap();
        let block = f.block(0).unwrap();
        assert_eq!(block.instrs().len(), 1);
        if let Instr::Return { values } = &block.instrs()[0] {
            assert!(matches!(values[0], Value::Constant(Constant::Func { value: None, .. })));
        } else {
            panic!("expected ret");
        }
    }
}
