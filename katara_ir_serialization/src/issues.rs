//! Scanner and parser diagnostic kinds (§6.3: `1000-1999` scanner,
//! `2000-2999` parser), grounded on `examples/original_source/src/ir/issues/issues.h`.

use katara_common::issues::{IssueKind, Origin, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseIssueKind {
    // Scanner (1000s).
    UnexpectedByte,
    NumberCannotBeRepresented,
    AddressCannotBeRepresented,
    EofInsteadOfEscapedCharacter,
    EofInsteadOfStringEndQuote,

    // Parser (2000s).
    UnexpectedToken,
    DuplicateFuncNumber,
    DuplicateBlockNumber,
    UnknownTypeName,
    UnexpectedAddress,
    UnexpectedBoolConstant,
    UnexpectedFuncConstant,
    UnknownInstructionName,
    WrongNumberOfResults,
    UnexpectedType,
    UndefinedJumpDestination,
}

impl ParseIssueKind {
    fn base_id(self) -> i64 {
        use ParseIssueKind::*;
        match self {
            UnexpectedByte => 1001,
            NumberCannotBeRepresented => 1002,
            AddressCannotBeRepresented => 1003,
            EofInsteadOfEscapedCharacter => 1004,
            EofInsteadOfStringEndQuote => 1005,

            UnexpectedToken => 2001,
            DuplicateFuncNumber => 2002,
            DuplicateBlockNumber => 2003,
            UnknownTypeName => 2004,
            UnexpectedAddress => 2005,
            UnexpectedBoolConstant => 2006,
            UnexpectedFuncConstant => 2007,
            UnknownInstructionName => 2008,
            WrongNumberOfResults => 2009,
            UnexpectedType => 2010,
            UndefinedJumpDestination => 2011,
        }
    }
}

impl IssueKind for ParseIssueKind {
    fn id(&self) -> i64 {
        self.base_id()
    }

    fn origin(&self) -> Origin {
        if self.base_id() < 2000 {
            Origin::Scanner
        } else {
            Origin::Parser
        }
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }
}
