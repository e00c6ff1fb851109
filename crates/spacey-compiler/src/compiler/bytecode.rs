// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bytecode definitions and the instruction stream.

use std::fmt;
use std::rc::Rc;

use crate::ast::{FunctionRef, StatementRef};
use crate::compiler::constants::{ConstantCheckpoint, ConstantPool, DoubleId, IdentId, StrId};
use crate::compiler::labels::Label;
use crate::error::{CompileError, Result, index_u32};

/// Lookup flag: create the binding if the name does not resolve.
pub const NAME_ENSURE: u32 = 0x02;

/// Initial enumeration state pushed before a for-in loop.
pub const ENUM_START: i32 = -1;

/// Regular expression flag bits carried by [`OpCode::RegExp`].
pub const REGEXP_IGNORE_CASE: u32 = 0x01;
/// `g`
pub const REGEXP_GLOBAL: u32 = 0x02;
/// `m`
pub const REGEXP_MULTILINE: u32 = 0x04;

/// Runtime error raised by the throwing opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RuntimeErrorCode {
    /// Assignment to something that is not a reference
    IllegalAssignment = 1,
    /// `delete` applied to a non-reference
    InvalidDelete = 2,
}

/// Kind of value an operand slot carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// Slot unused
    None,
    /// Signed 32-bit integer
    Int,
    /// Unsigned 32-bit integer
    Uint,
    /// Double constant
    Double,
    /// String constant
    Str,
    /// Interned identifier
    Ident,
    /// Interned identifier or nothing
    OptIdent,
    /// Jump target
    Addr,
    /// AST statement for the interpreter
    Stat,
    /// Function expression
    Func,
}

impl OperandType {
    /// Whether `operand` is acceptable in a slot of this type.
    pub fn accepts(self, operand: &Operand) -> bool {
        matches!(
            (self, operand),
            (OperandType::None, Operand::None)
                | (OperandType::Int, Operand::Int(_))
                | (OperandType::Uint, Operand::Uint(_))
                | (OperandType::Double, Operand::Double(_))
                | (OperandType::Str, Operand::Str(_))
                | (OperandType::Ident, Operand::Ident(_))
                | (OperandType::OptIdent, Operand::Ident(_) | Operand::None)
                | (OperandType::Addr, Operand::Addr(_))
                | (OperandType::Stat, Operand::Stat(_))
                | (OperandType::Func, Operand::Func(_))
        )
    }
}

macro_rules! opcodes {
    ($($(#[$doc:meta])* $name:ident($first:ident, $second:ident) => $mnemonic:literal,)*) => {
        /// Operation codes for the VM.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum OpCode {
            $($(#[$doc])* $name,)*
        }

        impl OpCode {
            /// Every opcode, in table order.
            pub const ALL: &'static [OpCode] = &[$(OpCode::$name,)*];

            /// Assembly name of the opcode.
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(OpCode::$name => $mnemonic,)*
                }
            }

            /// Operand types of the two slots.
            pub fn signature(self) -> (OperandType, OperandType) {
                match self {
                    $(OpCode::$name => (OperandType::$first, OperandType::$second),)*
                }
            }
        }
    };
}

opcodes! {
    // Literals
    /// Push a boolean (slot 1 is 0 or 1)
    Bool(Int, None) => "bool",
    /// Push an integer
    Int(Int, None) => "int",
    /// Push a double constant
    Double(Double, None) => "double",
    /// Push a string constant
    Str(Str, None) => "str",
    /// Create a regular expression from pattern and flag bits
    RegExp(Str, Uint) => "regexp",
    /// Push null
    Null(None, None) => "null",
    /// Push undefined
    Undefined(None, None) => "undefined",
    /// Push this
    This(None, None) => "this",

    // Binary operators
    /// Add top two values
    Add(None, None) => "add",
    /// Subtract
    Sub(None, None) => "sub",
    /// Multiply
    Mul(None, None) => "mul",
    /// Divide
    Div(None, None) => "div",
    /// Modulo
    Mod(None, None) => "mod",
    /// ==
    Eq(None, None) => "eq",
    /// ===
    StrictEq(None, None) => "strict_eq",
    /// !=
    Ne(None, None) => "ne",
    /// !==
    StrictNe(None, None) => "strict_ne",
    /// <
    Lt(None, None) => "lt",
    /// <=
    Le(None, None) => "le",
    /// >
    Gt(None, None) => "gt",
    /// >=
    Ge(None, None) => "ge",
    /// &
    BitAnd(None, None) => "bit_and",
    /// |
    BitOr(None, None) => "bit_or",
    /// ^
    BitXor(None, None) => "bit_xor",
    /// <<
    Shl(None, None) => "shl",
    /// >>
    Shr(None, None) => "shr",
    /// >>>
    Ushr(None, None) => "ushr",
    /// in
    In(None, None) => "in",
    /// instanceof
    InstanceOf(None, None) => "instance_of",
    /// Pop object and key, push the property value
    Index(None, None) => "index",

    // Unary operators
    /// !
    Not(None, None) => "not",
    /// Unary -
    Minus(None, None) => "minus",
    /// Unary +
    ToNumber(None, None) => "to_number",
    /// ~
    BitNot(None, None) => "bit_not",
    /// void
    Void(None, None) => "void",
    /// typeof on a value
    TypeOf(None, None) => "typeof",

    // Names and properties
    /// Push the value of a name
    Ident(Ident, None) => "ident",
    /// typeof on a name without throwing if unresolved
    TypeOfIdent(Ident, None) => "typeof_ident",
    /// delete a name
    DeleteIdent(Ident, None) => "delete_ident",
    /// Pop object, push a named property
    Member(Ident, None) => "member",
    /// Pop object and key, push the delete result
    Delete(None, None) => "delete",

    // References (two stack cells each)
    /// Push a reference to a name
    IdentRef(Ident, Uint) => "ident_ref",
    /// Pop object, push a reference to a named property
    PropRef(Ident, Uint) => "prop_ref",
    /// Pop object and key, push a reference to the property
    MemberRef(Uint, None) => "member_ref",
    /// Push the value of the reference below, keeping the reference
    RefValue(None, None) => "ref_value",
    /// Pop reference and value, store, push the value
    Assign(None, None) => "assign",
    /// Pop reference, add slot 1, store, push the new value
    PreInc(Int, None) => "pre_inc",
    /// Pop reference, add slot 1, store, push the old value
    PostInc(Int, None) => "post_inc",
    /// typeof on a reference
    TypeOfRef(None, None) => "typeof_ref",

    // Errors
    /// Throw the top value
    Throw(None, None) => "throw",
    /// Throw a reference error
    ThrowRef(Uint, None) => "throw_ref",
    /// Throw a type error with a message
    ThrowType(Uint, Str) => "throw_type",

    // Aggregates
    /// Push a new empty object
    NewObject(None, None) => "new_object",
    /// Pop a value and define it on the object below
    ObjProp(Ident, None) => "obj_prop",
    /// Pop slot 1 values, push an array of them
    NewArray(Uint, None) => "new_array",
    /// Push a closure for a function expression
    Func(Func, None) => "func",

    // Calls
    /// Call a value with slot 1 arguments; slot 2 is 1 if the result is kept
    Call(Uint, Int) => "call",
    /// Call through a reference so `this` is bound
    CallMember(Uint, Int) => "call_member",
    /// Construct with slot 1 arguments
    New(Uint, None) => "new",

    // Control flow
    /// Unconditional jump
    Jmp(Addr, None) => "jmp",
    /// Pop; jump if falsy
    JmpZ(Addr, None) => "jmp_z",
    /// Jump keeping the value if falsy, otherwise pop it
    CndZ(Addr, None) => "cnd_z",
    /// Jump keeping the value if truthy, otherwise pop it
    CndNz(Addr, None) => "cnd_nz",
    /// Pop a case value; on strict match also pop the discriminant and jump
    Case(Addr, None) => "case",
    /// Advance enumeration; jump and release the loop state when done
    ForIn(Addr, None) => "forin",

    // Scopes and exceptions
    /// Pop an object and push it as a scope
    PushScope(None, None) => "push_scope",
    /// Pop the innermost scope
    PopScope(None, None) => "pop_scope",
    /// Install an exception handler; slot 2 names the catch binding
    PushExcept(Addr, OptIdent) => "push_except",
    /// Remove the innermost exception handler
    PopExcept(None, None) => "pop_except",
    /// Rethrow or resume after a finally body
    EndFinally(None, None) => "end_finally",

    // Misc
    /// Pop the top value
    Pop(None, None) => "pop",
    /// Pop a value and store it in a variable
    VarSet(Ident, None) => "var_set",
    /// Evaluate a statement with the tree-walking interpreter
    Tree(Stat, None) => "tree",
    /// Return the top value from the chunk
    Ret(None, None) => "ret",
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A jump target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    /// Resolved instruction offset
    Offset(u32),
    /// Symbolic label, rewritten by the label resolution pass
    Label(Label),
}

impl Address {
    /// Placeholder for a forward jump patched once the target is known.
    pub const PENDING: Address = Address::Offset(0);
}

/// Instruction operands.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Empty slot
    None,
    /// Signed integer
    Int(i32),
    /// Unsigned integer
    Uint(u32),
    /// Double constant index
    Double(DoubleId),
    /// String constant index
    Str(StrId),
    /// Interned identifier index
    Ident(IdentId),
    /// Jump target
    Addr(Address),
    /// Statement handed to the interpreter
    Stat(StatementRef),
    /// Function expression
    Func(FunctionRef),
}

/// A single bytecode instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The operation code
    pub opcode: OpCode,
    /// First operand
    pub arg1: Operand,
    /// Second operand
    pub arg2: Operand,
}

impl Instruction {
    /// Creates a new instruction with no operand.
    pub fn simple(opcode: OpCode) -> Self {
        Self::with_operands(opcode, Operand::None, Operand::None)
    }

    /// Creates a new instruction with one operand.
    pub fn with_operand(opcode: OpCode, operand: Operand) -> Self {
        Self::with_operands(opcode, operand, Operand::None)
    }

    /// Creates a new instruction with both operands.
    pub fn with_operands(opcode: OpCode, arg1: Operand, arg2: Operand) -> Self {
        Self { opcode, arg1, arg2 }
    }

    /// Creates a jump-family instruction.
    pub fn jump(opcode: OpCode, target: Address) -> Self {
        Self::with_operand(opcode, Operand::Addr(target))
    }

    /// Jump target carried in slot 1, if any.
    pub fn target(&self) -> Option<Address> {
        match self.arg1 {
            Operand::Addr(address) => Some(address),
            _ => None,
        }
    }

    /// Whether both operands match the opcode's signature.
    pub fn is_well_formed(&self) -> bool {
        let (first, second) = self.opcode.signature();
        first.accepts(&self.arg1) && second.accepts(&self.arg2)
    }
}

/// Handle to an emitted instruction, used for back-patching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct InstrRef(pub(crate) u32);

impl InstrRef {
    /// Offset of the instruction in the stream.
    pub fn offset(self) -> u32 {
        self.0
    }
}

/// Stream and constant sizes at a point in time, for rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeCheckpoint {
    code_len: usize,
    constants: ConstantCheckpoint,
}

impl CodeCheckpoint {
    /// Stream length when the checkpoint was taken.
    pub fn code_len(&self) -> usize {
        self.code_len
    }
}

/// The instruction stream of a compilation unit.
///
/// Every chunk of the unit is appended to the same stream; chunks are
/// identified by their start offset.
#[derive(Debug, Clone, Default)]
pub struct Bytecode {
    instructions: Vec<Instruction>,
    /// The constant pool
    pub constants: ConstantPool,
    max_len: Option<usize>,
}

impl Bytecode {
    /// Creates a new empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a stream with room for `capacity` instructions and an
    /// optional hard cap on its length.
    pub fn with_capacity(capacity: usize, max_len: Option<usize>) -> Result<Self> {
        let mut instructions = Vec::new();
        instructions.try_reserve_exact(capacity)?;
        Ok(Self {
            instructions,
            constants: ConstantPool::new(),
            max_len,
        })
    }

    /// Appends an instruction and returns its handle.
    pub fn emit(&mut self, instruction: Instruction) -> Result<InstrRef> {
        debug_assert!(
            instruction.is_well_formed(),
            "operands do not match signature of {}",
            instruction.opcode
        );

        let len = self.instructions.len();
        if self.max_len.is_some_and(|max| len >= max) {
            return Err(CompileError::OutOfMemory);
        }
        let index = index_u32(len)?;
        self.instructions.try_reserve(1)?;
        self.instructions.push(instruction);
        Ok(InstrRef(index))
    }

    /// Offset the next instruction will occupy.
    pub fn current_offset(&self) -> u32 {
        // `emit` never lets the length exceed u32::MAX
        self.instructions.len() as u32
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the stream is empty.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// All instructions.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// The instruction behind a handle.
    pub fn instruction(&self, instr: InstrRef) -> &Instruction {
        &self.instructions[instr.0 as usize]
    }

    /// Instructions from `start` to the end, for in-place rewriting.
    pub(crate) fn instructions_from_mut(&mut self, start: u32) -> &mut [Instruction] {
        &mut self.instructions[start as usize..]
    }

    /// Rewrites the jump target of an emitted instruction.
    pub fn patch_target(&mut self, instr: InstrRef, target: Address) {
        let instruction = &mut self.instructions[instr.0 as usize];
        debug_assert!(
            instruction.target().is_some(),
            "{} has no jump target",
            instruction.opcode
        );
        instruction.arg1 = Operand::Addr(target);
    }

    /// Records the current stream and constant sizes.
    pub fn checkpoint(&self) -> CodeCheckpoint {
        CodeCheckpoint {
            code_len: self.instructions.len(),
            constants: self.constants.checkpoint(),
        }
    }

    /// Discards every instruction and constant added after `checkpoint`.
    pub fn rollback(&mut self, checkpoint: CodeCheckpoint) {
        debug_assert!(checkpoint.code_len <= self.instructions.len());
        self.instructions.truncate(checkpoint.code_len);
        self.constants.rollback(checkpoint.constants);
    }
}

/// Shared statement handle for a [`OpCode::Tree`] operand.
pub(crate) fn stat_operand(stat: &StatementRef) -> Operand {
    Operand::Stat(Rc::clone(stat))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_returns_offsets() {
        let mut code = Bytecode::new();
        let a = code.emit(Instruction::simple(OpCode::Undefined)).unwrap();
        let b = code.emit(Instruction::simple(OpCode::Ret)).unwrap();
        assert_eq!(a.offset(), 0);
        assert_eq!(b.offset(), 1);
        assert_eq!(code.current_offset(), 2);
    }

    #[test]
    fn test_patch_target() {
        let mut code = Bytecode::new();
        let jump = code
            .emit(Instruction::jump(OpCode::Jmp, Address::PENDING))
            .unwrap();
        code.patch_target(jump, Address::Offset(7));
        assert_eq!(code.instruction(jump).target(), Some(Address::Offset(7)));
    }

    #[test]
    fn test_max_len_is_oom() {
        let mut code = Bytecode::with_capacity(2, Some(2)).unwrap();
        code.emit(Instruction::simple(OpCode::Null)).unwrap();
        code.emit(Instruction::simple(OpCode::Pop)).unwrap();
        let err = code.emit(Instruction::simple(OpCode::Null)).unwrap_err();
        assert_eq!(err, CompileError::OutOfMemory);
        assert_eq!(code.len(), 2);
    }

    #[test]
    fn test_rollback_truncates_code_and_constants() {
        let mut code = Bytecode::new();
        code.emit(Instruction::simple(OpCode::This)).unwrap();
        let checkpoint = code.checkpoint();

        let id = code.constants.add_string("gone").unwrap();
        code.emit(Instruction::with_operand(OpCode::Str, Operand::Str(id)))
            .unwrap();
        code.rollback(checkpoint);

        assert_eq!(code.len(), 1);
        assert_eq!(code.checkpoint(), checkpoint);
    }

    #[test]
    fn test_signatures() {
        assert_eq!(
            OpCode::PushExcept.signature(),
            (OperandType::Addr, OperandType::OptIdent)
        );
        assert!(Instruction::simple(OpCode::Add).is_well_formed());
        assert!(!Instruction::simple(OpCode::Jmp).is_well_formed());
        assert!(
            Instruction::with_operands(OpCode::Call, Operand::Uint(2), Operand::Int(1))
                .is_well_formed()
        );
    }

    #[test]
    fn test_only_first_slot_is_an_address() {
        for op in OpCode::ALL {
            assert_ne!(op.signature().1, OperandType::Addr, "{op}");
        }
    }

    #[test]
    fn test_mnemonics_are_unique() {
        let mut names: Vec<_> = OpCode::ALL.iter().map(|op| op.mnemonic()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), OpCode::ALL.len());
    }
}
