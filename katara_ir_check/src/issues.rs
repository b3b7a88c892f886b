//! Diagnostic kinds for the base checker (`3000s`) and the extension checker
//! (`4000s`), grounded on `examples/original_source/src/ir/issues/issues.h`
//! and `examples/original_source/src/lang/processors/ir/check/checker.h`.

use katara_common::issues::{IssueKind, Origin, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckerIssueKind {
    // Control flow and function structure (3000s).
    FuncHasNoEntryBlock,
    EntryBlockHasParents,
    NonEntryBlockHasNoParents,
    BlockDoesNotEndInControlFlow,
    ControlFlowInstrNotLastInBlock,
    PhisNotAtBlockStart,
    PhiInBlockWithoutMultipleParents,
    JumpTargetDoesNotExist,
    JumpTargetNotRecordedAsChild,
    JccDuplicateDestinations,

    // SSA well-formedness.
    ComputedValueDefinedMultipleTimes,
    ComputedValueUsedWithoutDefinition,
    ComputedValueDefinitionDoesNotDominateUse,
    PhiArgOriginDoesNotDominatePredecessor,
    PhiMissingArgForParent,
    PhiHasArgForNonParent,

    // Per-instruction type well-formedness.
    MovTypeMismatch,
    ConvOperandNotConvertible,
    BoolInstrOperandNotBool,
    IntInstrOperandNotInt,
    IntInstrOperandTypeMismatch,
    PointerOffsetOperandNotPointer,
    PointerOffsetAmountNotInt,
    NilTestOperandNotNilable,
    MallocSizeNotInt,
    LoadAddressNotPointer,
    StoreAddressNotPointer,
    FreeAddressNotPointer,
    JumpCondConditionNotBool,
    SyscallNumberNotInt,
    SyscallArgNotInt,
    CallCalleeNotFunc,
    CallResultArityMismatch,
    ReturnArityMismatch,
    ReturnTypeMismatch,

    // Extension checks (4000s): shared/unique pointers and strings.
    SharedPointerOperandTypeMismatch,
    SharedPointerOffsetNotInt,
    UniquePointerOperandTypeMismatch,
    StringOperandNotString,
    StringIndexNotInt,
    LoadFromSmartPointerHasMismatchedElementType,
    StoreToSmartPointerHasMismatchedElementType,
}

impl CheckerIssueKind {
    fn base_id(self) -> i64 {
        use CheckerIssueKind::*;
        match self {
            FuncHasNoEntryBlock => 3001,
            EntryBlockHasParents => 3002,
            BlockDoesNotEndInControlFlow => 3003,
            ControlFlowInstrNotLastInBlock => 3004,
            PhisNotAtBlockStart => 3005,
            JumpTargetDoesNotExist => 3006,
            JumpTargetNotRecordedAsChild => 3007,
            ComputedValueDefinedMultipleTimes => 3008,
            ComputedValueUsedWithoutDefinition => 3009,
            ComputedValueDefinitionDoesNotDominateUse => 3010,
            PhiArgOriginDoesNotDominatePredecessor => 3011,
            PhiMissingArgForParent => 3012,
            PhiHasArgForNonParent => 3013,
            MovTypeMismatch => 3014,
            ConvOperandNotConvertible => 3015,
            BoolInstrOperandNotBool => 3016,
            IntInstrOperandNotInt => 3017,
            IntInstrOperandTypeMismatch => 3018,
            PointerOffsetOperandNotPointer => 3019,
            PointerOffsetAmountNotInt => 3020,
            NilTestOperandNotNilable => 3021,
            MallocSizeNotInt => 3022,
            LoadAddressNotPointer => 3023,
            StoreAddressNotPointer => 3024,
            FreeAddressNotPointer => 3025,
            JumpCondConditionNotBool => 3026,
            SyscallNumberNotInt => 3027,
            SyscallArgNotInt => 3028,
            CallCalleeNotFunc => 3029,
            CallResultArityMismatch => 3030,
            ReturnArityMismatch => 3031,
            ReturnTypeMismatch => 3032,
            PhiInBlockWithoutMultipleParents => 3033,
            JccDuplicateDestinations => 3034,
            NonEntryBlockHasNoParents => 3035,

            SharedPointerOperandTypeMismatch => 4001,
            SharedPointerOffsetNotInt => 4002,
            UniquePointerOperandTypeMismatch => 4003,
            StringOperandNotString => 4004,
            StringIndexNotInt => 4005,
            LoadFromSmartPointerHasMismatchedElementType => 4006,
            StoreToSmartPointerHasMismatchedElementType => 4007,
        }
    }
}

impl IssueKind for CheckerIssueKind {
    fn id(&self) -> i64 {
        self.base_id()
    }

    fn origin(&self) -> Origin {
        if self.base_id() < 4000 {
            Origin::Checker
        } else {
            Origin::ExtChecker
        }
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }
}
