/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! Types for working with MTMC-16 instructions.
//!
//! An instruction is a single 16-bit word.  The top nibble selects the
//! instruction type, and the meaning of the remaining three nibbles depends on
//! the type (see the `Instruction` enum for the layout of each).  Some
//! instructions are followed by a second "data" word holding an immediate value
//! or an absolute address; whether an instruction has one is recorded in the
//! mnemonic table (see `table::is_double_word`), not here.
//!
//! The `Instruction` type is decoded once from an `Opcode` and then matched
//! exhaustively by the emulator and the disassembler, so neither of them has to
//! pick apart nibbles by hand.  The reverse conversion (`Opcode::from`) is what
//! the assembler uses to produce machine code.

use std::fmt;
use std::str::FromStr;

use failure::Error;
use num::FromPrimitive;

use table;

/// An error resulting from an invalid opcode.
#[derive(Debug, Fail, PartialEq, Eq)]
#[fail(display = "invalid opcode: {}", _0)]
pub struct InvalidOpcodeError(pub Opcode);

/// An error resulting from an unknown register name.
#[derive(Debug, Fail, PartialEq, Eq)]
#[fail(display = "invalid register")]
pub struct InvalidRegisterError(pub String);

/// The number of registers in the register file.
pub const REGISTER_COUNT: usize = 22;

/// The lowercase names of all registers, in register file order.
const REGISTER_NAMES: [&str; REGISTER_COUNT] = [
    "t0", "t1", "t2", "t3", "t4", "t5", "a0", "a1", "a2", "a3", "rv", "ra", "fp", "sp", "bp",
    "pc", "ir", "dr", "cb", "db", "io", "flags",
];

enum_from_primitive! {
/// An MTMC-16 register.
///
/// Only the first sixteen registers (`T0` through `PC`) can be named in an
/// instruction; the rest are internal to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    T0 = 0,
    T1,
    T2,
    T3,
    T4,
    T5,
    A0,
    A1,
    A2,
    A3,
    RV,
    RA,
    FP,
    SP,
    BP,
    PC,
    IR,
    DR,
    CB,
    DB,
    IO,
    FLAGS,
}
}

impl Register {
    /// Returns the register addressed by the given instruction nibble.
    pub fn from_nibble(n: u8) -> Self {
        match Register::from_u8(n & 0xF) {
            Some(reg) => reg,
            None => unreachable!("4-bit quantity didn't match a register"),
        }
    }

    /// Returns the lowercase name of this register.
    pub fn name(&self) -> &'static str {
        REGISTER_NAMES[*self as usize]
    }

    /// Returns whether this register can be named in an instruction.
    pub fn is_addressable(&self) -> bool {
        (*self as usize) < 16
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Register {
    type Err = InvalidRegisterError;

    /// Parses one of the sixteen addressable register names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        REGISTER_NAMES
            .iter()
            .take(16)
            .position(|&name| name == s)
            .map(|n| Register::from_nibble(n as u8))
            .ok_or_else(|| InvalidRegisterError(s.to_owned()))
    }
}

enum_from_primitive! {
/// The type of an instruction, as given by its top nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionType {
    Misc = 0,
    Alu,
    Stack,
    Test,
    Lwr,
    Lbr,
    Swr,
    Sbr,
    Load,
    JumpReg,
    Jump = 0xC,
    JumpZ,
    JumpNz,
    JumpAl,
}
}

enum_from_primitive! {
/// An arithmetic or logical operation.
///
/// The same sub-opcodes are shared by plain ALU instructions, immediate ALU
/// instructions and the stack `sop` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add = 0,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Min,
    Max,
    Not,
    Lnot,
    Neg,
}
}

impl AluOp {
    /// Returns whether this operation only takes a single operand.
    pub fn is_unary(&self) -> bool {
        match *self {
            AluOp::Not | AluOp::Lnot | AluOp::Neg => true,
            _ => false,
        }
    }

    /// Applies the operation to the given operands at full precision.
    ///
    /// Unary operations ignore `source`.  Returns `None` for a division or
    /// remainder by zero.
    pub fn apply(&self, target: i32, source: i32) -> Option<i32> {
        use self::AluOp::*;

        Some(match *self {
            Add => target + source,
            Sub => target - source,
            Mul => target * source,
            Div => target.checked_div(source)?,
            Mod => target.checked_rem(source)?,
            And => target & source,
            Or => target | source,
            Xor => target ^ source,
            Shl => target.checked_shl(source as u32).unwrap_or(0),
            Shr => target.checked_shr(source as u32).unwrap_or(target >> 31),
            Min => target.min(source),
            Max => target.max(source),
            Not => !target,
            Lnot => if target != 0 { 0 } else { 1 },
            Neg => -target,
        })
    }

    /// Returns the mnemonic of this operation.
    pub fn name(&self) -> &'static str {
        table::name_of(InstructionType::Alu, *self as u8).unwrap_or("?")
    }
}

impl fmt::Display for AluOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

enum_from_primitive! {
/// A comparison performed by a `TEST` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOp {
    Eq = 0,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}
}

impl TestOp {
    /// Evaluates the comparison.
    pub fn test(&self, a: i16, b: i16) -> bool {
        use self::TestOp::*;

        match *self {
            Eq => a == b,
            Neq => a != b,
            Gt => a > b,
            Gte => a >= b,
            Lt => a < b,
            Lte => a <= b,
        }
    }
}

/// A stack operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOp {
    Push = 0x0,
    Pop = 0x1,
    Dup = 0x2,
    Swap = 0x3,
    Drop = 0x4,
    Over = 0x5,
    Rot = 0x6,
    Sop = 0x7,
    Pushi = 0xF,
}

impl StackOp {
    /// Returns the stack operation with the given sub-opcode.
    pub fn from_code(code: u8) -> Option<Self> {
        use self::StackOp::*;

        Some(match code {
            0x0 => Push,
            0x1 => Pop,
            0x2 => Dup,
            0x3 => Swap,
            0x4 => Drop,
            0x5 => Over,
            0x6 => Rot,
            0x7 => Sop,
            0xF => Pushi,
            _ => return None,
        })
    }
}

/// An absolute load or store performed by a `LOAD` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp {
    Lw = 0x0,
    Lwo = 0x1,
    Lb = 0x2,
    Lbo = 0x3,
    Sw = 0x4,
    Swo = 0x5,
    Sb = 0x6,
    Sbo = 0x7,
    Li = 0xF,
}

impl LoadOp {
    /// Returns the load operation with the given sub-opcode.
    pub fn from_code(code: u8) -> Option<Self> {
        use self::LoadOp::*;

        Some(match code {
            0x0 => Lw,
            0x1 => Lwo,
            0x2 => Lb,
            0x3 => Lbo,
            0x4 => Sw,
            0x5 => Swo,
            0x6 => Sb,
            0x7 => Sbo,
            0xF => Li,
            _ => return None,
        })
    }

    /// Returns whether the address is offset by a register.
    pub fn has_offset(&self) -> bool {
        match *self {
            LoadOp::Lwo | LoadOp::Lbo | LoadOp::Swo | LoadOp::Sbo => true,
            _ => false,
        }
    }
}

/// An MTMC-16 opcode.
///
/// The nibbles are numbered from the least significant: nibble 3 is the
/// instruction type and nibble 2 is usually the sub-opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode(pub u16);

impl Opcode {
    /// Returns the opcode made up of the given bytes (big-endian).
    pub fn from_bytes(high: u8, low: u8) -> Self {
        Opcode((high as u16) << 8 | low as u16)
    }

    /// Returns the opcode assembled from the given nibbles.
    pub fn from_nibbles(n3: u8, n2: u8, n1: u8, n0: u8) -> Self {
        Opcode(
            (n3 as u16 & 0xF) << 12 | (n2 as u16 & 0xF) << 8 | (n1 as u16 & 0xF) << 4
                | n0 as u16 & 0xF,
        )
    }

    /// Returns the bytes of this opcode (big-endian).
    pub fn bytes(&self) -> (u8, u8) {
        ((self.0 >> 8) as u8, self.0 as u8)
    }

    /// Returns the given nibble of this opcode.
    pub fn nibble(&self, n: u32) -> u8 {
        (self.0 >> (4 * n)) as u8 & 0xF
    }

    /// Returns the instruction type, if the top nibble names one.
    pub fn kind(&self) -> Option<InstructionType> {
        InstructionType::from_u8(self.nibble(3))
    }

    /// Returns the sub-opcode (nibble 2).
    ///
    /// This does not guarantee that the result is actually meaningful.
    pub fn code(&self) -> u8 {
        self.nibble(2)
    }

    /// Returns the low byte of the opcode.
    ///
    /// This does not guarantee that the result is actually meaningful.
    pub fn byte(&self) -> u8 {
        self.0 as u8
    }

    /// Returns the 12-bit jump target of the opcode.
    ///
    /// This does not guarantee that the result is actually meaningful.
    pub fn target(&self) -> u16 {
        self.0 & 0x0FFF
    }

    /// Returns whether this opcode is followed by a data word.
    pub fn is_double_word(&self) -> bool {
        table::is_double_word(*self)
    }

    /// Returns the register in the given nibble.
    ///
    /// This does not guarantee that the result is actually meaningful.
    fn reg(&self, n: u32) -> Register {
        Register::from_nibble(self.nibble(n))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// An MTMC-16 instruction, decoded from a single word.
///
/// The operands of each variant are listed in the same order as they appear in
/// assembly source.  The data word of a double-word instruction is not part of
/// the instruction itself; the emulator keeps it in the `DR` register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// `sys N`: perform system call `N`.
    Sys(u8),
    /// `mov DST SRC`.
    Mov(Register, Register),
    /// `inc REG N`.
    Inc(Register, u8),
    /// `dec REG N`.
    Dec(Register, u8),
    /// `seti REG N`: set a register to a 4-bit value.
    Seti(Register, u8),
    /// `mcp`: reserved memory copy instruction.
    Mcp(Register, Register),
    /// `debug N`: reserved debugger hook.
    Debug(u8),
    /// `nop`.
    Nop,
    /// `OP TARGET SOURCE`; the source is ignored by unary operations.
    Alu(AluOp, Register, Register),
    /// `OPi TARGET IMM`: the immediate operand is in the data word.
    AluImm(AluOp, Register),
    /// `push VALUE STACK`.
    Push(Register, Register),
    /// `pop VALUE STACK`.
    Pop(Register, Register),
    /// `dup STACK`.
    Dup(Register),
    /// `swap STACK`.
    Swap(Register),
    /// `drop STACK`.
    Drop(Register),
    /// `over STACK`.
    Over(Register),
    /// `rot STACK`.
    Rot(Register),
    /// `sop OP STACK`: apply an operation to the top of the stack.
    Sop(AluOp, Register),
    /// `pushi IMM STACK`: the immediate operand is in the data word.
    Pushi(Register),
    /// `OP A B`: compare two registers.
    Test(TestOp, Register, Register),
    /// `OPi A N`: compare a register with a 4-bit value.
    TestImm(TestOp, Register, u8),
    /// `lwr DST BASE OFFSET`.
    Lwr(Register, Register, Register),
    /// `lbr DST BASE OFFSET`.
    Lbr(Register, Register, Register),
    /// `swr SRC BASE OFFSET`.
    Swr(Register, Register, Register),
    /// `sbr SRC BASE OFFSET`.
    Sbr(Register, Register, Register),
    /// `OP TARGET [OFFSET] ADDR`: the address is in the data word.
    Load(LoadOp, Register, Register),
    /// `jr REG` (or `ret`, when the register is `RA`).
    Jr(Register),
    /// `j ADDR`.
    Jump(u16),
    /// `jz ADDR`.
    Jz(u16),
    /// `jnz ADDR`.
    Jnz(u16),
    /// `jal ADDR`.
    Jal(u16),
}

impl Instruction {
    /// Decodes the given opcode.
    pub fn from_opcode(opcode: Opcode) -> Result<Self, Error> {
        use self::Instruction::*;

        let kind = match opcode.kind() {
            Some(kind) => kind,
            None => Err(InvalidOpcodeError(opcode))?,
        };
        let (r2, r1, r0) = (opcode.reg(2), opcode.reg(1), opcode.reg(0));

        Ok(match kind {
            InstructionType::Misc => match opcode.code() {
                0x0 => Sys(opcode.byte()),
                0x1 => Mov(r1, r0),
                0x2 => Inc(r1, opcode.nibble(0)),
                0x3 => Dec(r1, opcode.nibble(0)),
                0x4 => Seti(r1, opcode.nibble(0)),
                0x5 => Mcp(r1, r0),
                0x8 => Debug(opcode.byte()),
                0xF => Nop,
                _ => Err(InvalidOpcodeError(opcode))?,
            },
            InstructionType::Alu => match AluOp::from_u8(opcode.code()) {
                Some(op) => Alu(op, r1, r0),
                None => match AluOp::from_u8(opcode.nibble(0)) {
                    Some(op) => AluImm(op, r1),
                    None => Err(InvalidOpcodeError(opcode))?,
                },
            },
            InstructionType::Stack => match StackOp::from_code(opcode.code()) {
                Some(StackOp::Push) => Push(r1, r0),
                Some(StackOp::Pop) => Pop(r1, r0),
                Some(StackOp::Dup) => Dup(r0),
                Some(StackOp::Swap) => Swap(r0),
                Some(StackOp::Drop) => Drop(r0),
                Some(StackOp::Over) => Over(r0),
                Some(StackOp::Rot) => Rot(r0),
                Some(StackOp::Sop) => match AluOp::from_u8(opcode.nibble(1)) {
                    Some(op) => Sop(op, r0),
                    None => Err(InvalidOpcodeError(opcode))?,
                },
                Some(StackOp::Pushi) => Pushi(r0),
                None => Err(InvalidOpcodeError(opcode))?,
            },
            InstructionType::Test => {
                let code = opcode.code();
                match TestOp::from_u8(code & 0x7) {
                    Some(op) if code & 0x8 == 0 => Test(op, r1, r0),
                    Some(op) => TestImm(op, r1, opcode.nibble(0)),
                    None => Err(InvalidOpcodeError(opcode))?,
                }
            }
            InstructionType::Lwr => Lwr(r2, r1, r0),
            InstructionType::Lbr => Lbr(r2, r1, r0),
            InstructionType::Swr => Swr(r2, r1, r0),
            InstructionType::Sbr => Sbr(r2, r1, r0),
            InstructionType::Load => match LoadOp::from_code(opcode.code()) {
                Some(op) => Load(op, r1, r0),
                None => Err(InvalidOpcodeError(opcode))?,
            },
            InstructionType::JumpReg => Jr(r0),
            InstructionType::Jump => Jump(opcode.target()),
            InstructionType::JumpZ => Jz(opcode.target()),
            InstructionType::JumpNz => Jnz(opcode.target()),
            InstructionType::JumpAl => Jal(opcode.target()),
        })
    }

    /// Returns the mnemonic used to write this instruction.
    pub fn mnemonic(&self) -> &'static str {
        table::find(Opcode::from(*self))
            .map(|m| m.name)
            .unwrap_or("?")
    }
}

impl From<Instruction> for Opcode {
    fn from(ins: Instruction) -> Opcode {
        use self::Instruction::*;
        use self::InstructionType as T;

        fn op(kind: T, code: u8, n1: u8, n0: u8) -> Opcode {
            Opcode::from_nibbles(kind as u8, code, n1, n0)
        }
        fn jump(kind: T, target: u16) -> Opcode {
            Opcode((kind as u16) << 12 | target & 0x0FFF)
        }

        match ins {
            Sys(n) => op(T::Misc, 0x0, n >> 4, n),
            Mov(dst, src) => op(T::Misc, 0x1, dst as u8, src as u8),
            Inc(reg, n) => op(T::Misc, 0x2, reg as u8, n),
            Dec(reg, n) => op(T::Misc, 0x3, reg as u8, n),
            Seti(reg, n) => op(T::Misc, 0x4, reg as u8, n),
            Mcp(a, b) => op(T::Misc, 0x5, a as u8, b as u8),
            Debug(n) => op(T::Misc, 0x8, n >> 4, n),
            Nop => op(T::Misc, 0xF, 0xF, 0xF),
            Alu(alu, target, source) => op(T::Alu, alu as u8, target as u8, source as u8),
            AluImm(alu, target) => op(T::Alu, 0xF, target as u8, alu as u8),
            Push(value, stack) => op(T::Stack, StackOp::Push as u8, value as u8, stack as u8),
            Pop(value, stack) => op(T::Stack, StackOp::Pop as u8, value as u8, stack as u8),
            Dup(stack) => op(T::Stack, StackOp::Dup as u8, 0, stack as u8),
            Swap(stack) => op(T::Stack, StackOp::Swap as u8, 0, stack as u8),
            Drop(stack) => op(T::Stack, StackOp::Drop as u8, 0, stack as u8),
            Over(stack) => op(T::Stack, StackOp::Over as u8, 0, stack as u8),
            Rot(stack) => op(T::Stack, StackOp::Rot as u8, 0, stack as u8),
            Sop(alu, stack) => op(T::Stack, StackOp::Sop as u8, alu as u8, stack as u8),
            Pushi(stack) => op(T::Stack, StackOp::Pushi as u8, 0, stack as u8),
            Test(test, a, b) => op(T::Test, test as u8, a as u8, b as u8),
            TestImm(test, a, n) => op(T::Test, test as u8 | 0x8, a as u8, n),
            Lwr(a, b, c) => Opcode::from_nibbles(T::Lwr as u8, a as u8, b as u8, c as u8),
            Lbr(a, b, c) => Opcode::from_nibbles(T::Lbr as u8, a as u8, b as u8, c as u8),
            Swr(a, b, c) => Opcode::from_nibbles(T::Swr as u8, a as u8, b as u8, c as u8),
            Sbr(a, b, c) => Opcode::from_nibbles(T::Sbr as u8, a as u8, b as u8, c as u8),
            Load(load, target, offset) => op(T::Load, load as u8, target as u8, offset as u8),
            Jr(reg) => op(T::JumpReg, 0, 0, reg as u8),
            Jump(target) => jump(T::Jump, target),
            Jz(target) => jump(T::JumpZ, target),
            Jnz(target) => jump(T::JumpNz, target),
            Jal(target) => jump(T::JumpAl, target),
        }
    }
}

/// Writes the stack register operand, which is omitted when it is `SP`.
fn fmt_stack(f: &mut fmt::Formatter, stack: Register) -> fmt::Result {
    if stack == Register::SP {
        Ok(())
    } else {
        write!(f, " {}", stack)
    }
}

impl fmt::Display for Instruction {
    /// Formats the instruction as assembly source.
    ///
    /// The data word of a double-word instruction is not known here, so it is
    /// left out; the disassembler adds it.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::Instruction::*;

        let name = self.mnemonic();
        match *self {
            Sys(n) => match table::syscall_name(n) {
                Some(call) => write!(f, "{} {}", name, call),
                None => write!(f, "{} {:#04x}", name, n),
            },
            Mov(a, b) | Mcp(a, b) => write!(f, "{} {} {}", name, a, b),
            Inc(reg, n) | Dec(reg, n) => if n == 1 {
                write!(f, "{} {}", name, reg)
            } else {
                write!(f, "{} {} {}", name, reg, n)
            },
            Seti(reg, n) => write!(f, "{} {} {}", name, reg, n),
            Debug(n) => write!(f, "{} {}", name, n),
            Nop => write!(f, "{}", name),
            Alu(op, target, _) if op.is_unary() => write!(f, "{} {}", name, target),
            Alu(_, target, source) => write!(f, "{} {} {}", name, target, source),
            AluImm(op, target) => {
                let short = format!("{}i", op.name());
                if table::lookup(&short).is_some() {
                    write!(f, "{} {}", short, target)
                } else {
                    write!(f, "{} {} {}", name, op, target)
                }
            }
            Push(value, stack) | Pop(value, stack) => {
                write!(f, "{} {}", name, value)?;
                fmt_stack(f, stack)
            }
            Dup(stack) | Swap(stack) | Drop(stack) | Over(stack) | Rot(stack) | Pushi(stack) => {
                write!(f, "{}", name)?;
                fmt_stack(f, stack)
            }
            Sop(op, stack) => {
                write!(f, "{} {}", name, op)?;
                fmt_stack(f, stack)
            }
            Test(_, a, b) => write!(f, "{} {} {}", name, a, b),
            TestImm(_, a, n) => write!(f, "{} {} {}", name, a, n),
            Lwr(a, b, c) | Lbr(a, b, c) | Swr(a, b, c) | Sbr(a, b, c) => {
                write!(f, "{} {} {} {}", name, a, b, c)
            }
            Load(op, target, offset) => if op.has_offset() {
                write!(f, "{} {} {}", name, target, offset)
            } else {
                write!(f, "{} {}", name, target)
            },
            Jr(Register::RA) => write!(f, "{}", name),
            Jr(reg) => write!(f, "{} {}", name, reg),
            Jump(target) | Jz(target) | Jnz(target) | Jal(target) => {
                write!(f, "{} {:#06x}", name, target)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that every opcode which decodes re-encodes to itself, apart from
    /// the bits the instruction ignores.
    #[test]
    fn decode_encode() {
        let cases = [
            (0x0000, Instruction::Sys(0x00)),
            (0x003A, Instruction::Sys(0x3A)),
            (0x0110, Instruction::Mov(Register::T1, Register::T0)),
            (0x0202, Instruction::Inc(Register::T0, 2)),
            (0x0403, Instruction::Seti(Register::T0, 3)),
            (0x0FFF, Instruction::Nop),
            (0x1001, Instruction::Alu(AluOp::Add, Register::T0, Register::T1)),
            (0x1C50, Instruction::Alu(AluOp::Not, Register::T5, Register::T0)),
            (0x1F00, Instruction::AluImm(AluOp::Add, Register::T0)),
            (0x20AD, Instruction::Push(Register::RV, Register::SP)),
            (0x2700, Instruction::Sop(AluOp::Add, Register::T0)),
            (0x2F0D, Instruction::Pushi(Register::SP)),
            (0x3012, Instruction::Test(TestOp::Eq, Register::T1, Register::T2)),
            (0x3D15, Instruction::TestImm(TestOp::Lte, Register::T1, 5)),
            (0x4123, Instruction::Lwr(Register::T1, Register::T2, Register::T3)),
            (0x8F10, Instruction::Load(LoadOp::Li, Register::T1, Register::T0)),
            (0x900B, Instruction::Jr(Register::RA)),
            (0xC010, Instruction::Jump(0x010)),
            (0xFFFF, Instruction::Jal(0xFFF)),
        ];

        for &(opcode, ins) in cases.iter() {
            let case = (opcode, ins);
            assert_eq!(
                Instruction::from_opcode(Opcode(opcode)).unwrap(),
                ins,
                "case {:?}",
                case
            );
            assert_eq!(Opcode::from(ins), Opcode(opcode), "case {:?}", case);
        }
    }

    /// Tests that undefined opcodes are rejected.
    #[test]
    fn invalid_opcodes() {
        let cases = [
            0x0600, 0x0900, 0x1FFF, 0x2800, 0x2EFF, 0x27F0, 0x3600, 0x3F00, 0x8800, 0xA000,
            0xBFFF,
        ];

        for &opcode in cases.iter() {
            assert!(
                Instruction::from_opcode(Opcode(opcode)).is_err(),
                "case {:#06x}",
                opcode
            );
        }
    }

    #[test]
    fn register_names() {
        assert_eq!("t0".parse::<Register>().unwrap(), Register::T0);
        assert_eq!("pc".parse::<Register>().unwrap(), Register::PC);
        assert_eq!("rv".parse::<Register>().unwrap(), Register::RV);
        assert!("ir".parse::<Register>().is_err());
        assert!("T0".parse::<Register>().is_err());
        assert_eq!(Register::FLAGS.to_string(), "flags");
    }

    #[test]
    fn alu_ops() {
        let cases = [
            (AluOp::Add, 30000, 10000, Some(40000)),
            (AluOp::Sub, 5, 7, Some(-2)),
            (AluOp::Div, 7, 2, Some(3)),
            (AluOp::Div, 7, 0, None),
            (AluOp::Mod, -7, 2, Some(-1)),
            (AluOp::Mod, 1, 0, None),
            (AluOp::Shl, 1, 4, Some(16)),
            (AluOp::Shr, -16, 2, Some(-4)),
            (AluOp::Min, 3, -3, Some(-3)),
            (AluOp::Max, 3, -3, Some(3)),
            (AluOp::Not, 0, 99, Some(-1)),
            (AluOp::Lnot, 5, 0, Some(0)),
            (AluOp::Lnot, 0, 0, Some(1)),
            (AluOp::Neg, 4, 0, Some(-4)),
        ];

        for &(op, t, s, result) in cases.iter() {
            let case = (op, t, s, result);
            assert_eq!(op.apply(t, s), result, "case {:?}", case);
        }
    }

    #[test]
    fn display() {
        let cases = [
            (Instruction::Sys(0), "sys exit"),
            (Instruction::Sys(0x99), "sys 0x99"),
            (Instruction::Inc(Register::T0, 1), "inc t0"),
            (Instruction::Dec(Register::T0, 3), "dec t0 3"),
            (Instruction::Alu(AluOp::Neg, Register::A0, Register::T0), "neg a0"),
            (Instruction::AluImm(AluOp::Add, Register::T0), "addi t0"),
            (Instruction::AluImm(AluOp::Not, Register::T0), "imm not t0"),
            (Instruction::Push(Register::T0, Register::SP), "push t0"),
            (Instruction::Push(Register::T0, Register::FP), "push t0 fp"),
            (Instruction::Sop(AluOp::Mul, Register::SP), "sop mul"),
            (Instruction::TestImm(TestOp::Gt, Register::T2, 9), "gti t2 9"),
            (Instruction::Load(LoadOp::Lwo, Register::T0, Register::T1), "lwo t0 t1"),
            (Instruction::Load(LoadOp::Li, Register::T0, Register::T0), "li t0"),
            (Instruction::Jr(Register::RA), "ret"),
            (Instruction::Jr(Register::T3), "jr t3"),
            (Instruction::Jz(16), "jz 0x0010"),
        ];

        for &(ins, text) in cases.iter() {
            assert_eq!(ins.to_string(), text, "case {:?}", ins);
        }
    }
}
