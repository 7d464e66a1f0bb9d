/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! The mnemonic and system call tables.
//!
//! This is the vocabulary shared by the assembler, which looks mnemonics up by
//! name, and the disassembler and emulator, which look them up by opcode.

use instruction::{InstructionType, Opcode, Register};

/// A single entry in the mnemonic table.
#[derive(Debug, PartialEq, Eq)]
pub struct Mnemonic {
    /// The name used in assembly source.
    pub name: &'static str,
    /// The instruction type (top nibble).
    pub kind: InstructionType,
    /// The sub-opcode (nibble 2), where the type has one.
    pub code: u8,
    /// The minimum number of operands.
    pub arity: usize,
    /// The maximum number of operands.
    pub max_arity: usize,
    /// Whether the instruction is followed by a data word.
    pub double_word: bool,
}

macro_rules! mnemonics {
    ($( $name:expr => $kind:ident $code:expr, $arity:expr, $max:expr, $dw:expr; )*) => {
        &[$(
            Mnemonic {
                name: $name,
                kind: InstructionType::$kind,
                code: $code,
                arity: $arity,
                max_arity: $max,
                double_word: $dw,
            },
        )*]
    }
}

/// Every mnemonic, in lookup order.
///
/// When several mnemonics share an encoding, the first one is the one the
/// disassembler uses.
pub static MNEMONICS: &'static [Mnemonic] = mnemonics! {
    "sys" => Misc 0x0, 1, 1, false;
    "mov" => Misc 0x1, 2, 2, false;
    "inc" => Misc 0x2, 1, 2, false;
    "dec" => Misc 0x3, 1, 2, false;
    "seti" => Misc 0x4, 2, 2, false;
    "mcp" => Misc 0x5, 3, 3, true;
    "debug" => Misc 0x8, 1, 1, false;
    "nop" => Misc 0xF, 0, 0, false;

    "add" => Alu 0x0, 2, 2, false;
    "sub" => Alu 0x1, 2, 2, false;
    "mul" => Alu 0x2, 2, 2, false;
    "div" => Alu 0x3, 2, 2, false;
    "mod" => Alu 0x4, 2, 2, false;
    "and" => Alu 0x5, 2, 2, false;
    "or" => Alu 0x6, 2, 2, false;
    "xor" => Alu 0x7, 2, 2, false;
    "shl" => Alu 0x8, 2, 2, false;
    "shr" => Alu 0x9, 2, 2, false;
    "min" => Alu 0xA, 2, 2, false;
    "max" => Alu 0xB, 2, 2, false;
    "not" => Alu 0xC, 1, 1, false;
    "lnot" => Alu 0xD, 1, 1, false;
    "neg" => Alu 0xE, 1, 1, false;
    "imm" => Alu 0xF, 3, 3, true;
    "addi" => Alu 0xF, 2, 2, true;
    "subi" => Alu 0xF, 2, 2, true;
    "muli" => Alu 0xF, 2, 2, true;
    "divi" => Alu 0xF, 2, 2, true;
    "modi" => Alu 0xF, 2, 2, true;
    "andi" => Alu 0xF, 2, 2, true;
    "ori" => Alu 0xF, 2, 2, true;
    "xori" => Alu 0xF, 2, 2, true;
    "shli" => Alu 0xF, 2, 2, true;
    "shri" => Alu 0xF, 2, 2, true;
    "mini" => Alu 0xF, 2, 2, true;
    "maxi" => Alu 0xF, 2, 2, true;

    "push" => Stack 0x0, 1, 2, false;
    "pop" => Stack 0x1, 1, 2, false;
    "dup" => Stack 0x2, 0, 1, false;
    "swap" => Stack 0x3, 0, 1, false;
    "drop" => Stack 0x4, 0, 1, false;
    "over" => Stack 0x5, 0, 1, false;
    "rot" => Stack 0x6, 0, 1, false;
    "sop" => Stack 0x7, 1, 2, false;
    "pushi" => Stack 0xF, 1, 2, true;

    "eq" => Test 0x0, 2, 2, false;
    "neq" => Test 0x1, 2, 2, false;
    "gt" => Test 0x2, 2, 2, false;
    "gte" => Test 0x3, 2, 2, false;
    "lt" => Test 0x4, 2, 2, false;
    "lte" => Test 0x5, 2, 2, false;
    "eqi" => Test 0x8, 2, 2, false;
    "neqi" => Test 0x9, 2, 2, false;
    "gti" => Test 0xA, 2, 2, false;
    "gtei" => Test 0xB, 2, 2, false;
    "lti" => Test 0xC, 2, 2, false;
    "ltei" => Test 0xD, 2, 2, false;

    "lwr" => Lwr 0x0, 3, 3, false;
    "lbr" => Lbr 0x0, 3, 3, false;
    "swr" => Swr 0x0, 3, 3, false;
    "sbr" => Sbr 0x0, 3, 3, false;

    "lw" => Load 0x0, 2, 2, true;
    "lwo" => Load 0x1, 3, 3, true;
    "lb" => Load 0x2, 2, 2, true;
    "lbo" => Load 0x3, 3, 3, true;
    "sw" => Load 0x4, 2, 2, true;
    "swo" => Load 0x5, 3, 3, true;
    "sb" => Load 0x6, 2, 2, true;
    "sbo" => Load 0x7, 3, 3, true;
    "li" => Load 0xF, 2, 2, true;
    "la" => Load 0xF, 2, 2, true;

    "jr" => JumpReg 0x0, 1, 1, false;
    "ret" => JumpReg 0x0, 0, 0, false;

    "j" => Jump 0x0, 1, 1, false;
    "jz" => JumpZ 0x0, 1, 1, false;
    "jnz" => JumpNz 0x0, 1, 1, false;
    "jal" => JumpAl 0x0, 1, 1, false;
};

/// Returns the mnemonic with the given name.
pub fn lookup(name: &str) -> Option<&'static Mnemonic> {
    MNEMONICS.iter().find(|m| m.name == name)
}

/// Returns the mnemonic that the given opcode should be written as.
///
/// Register-indexed loads/stores and jumps are identified by their type alone,
/// since their remaining nibbles are all operands.  `JUMPREG` is written as
/// `ret` when it jumps to `RA`.
pub fn find(opcode: Opcode) -> Option<&'static Mnemonic> {
    use instruction::InstructionType::*;

    let kind = opcode.kind()?;
    match kind {
        Lwr | Lbr | Swr | Sbr | Jump | JumpZ | JumpNz | JumpAl => {
            MNEMONICS.iter().find(|m| m.kind == kind)
        }
        JumpReg => lookup(if opcode.nibble(0) == Register::RA as u8 {
            "ret"
        } else {
            "jr"
        }),
        _ => MNEMONICS
            .iter()
            .find(|m| m.kind == kind && m.code == opcode.code()),
    }
}

/// Returns the name of the first mnemonic with the given type and sub-opcode.
pub fn name_of(kind: InstructionType, code: u8) -> Option<&'static str> {
    MNEMONICS
        .iter()
        .find(|m| m.kind == kind && m.code == code)
        .map(|m| m.name)
}

/// Returns whether the given opcode is followed by a data word.
pub fn is_double_word(opcode: Opcode) -> bool {
    find(opcode).map_or(false, |m| m.double_word)
}

/// The names of all system calls, with their selectors.
pub static SYSCALLS: &'static [(&'static str, u8)] = &[
    ("exit", 0x00),
    ("rint", 0x01),
    ("wint", 0x02),
    ("rstr", 0x03),
    ("wchr", 0x04),
    ("rchr", 0x05),
    ("wstr", 0x06),
    ("printf", 0x07),
    ("atoi", 0x08),
    ("rfile", 0x10),
    ("wfile", 0x11),
    ("cwd", 0x12),
    ("chdir", 0x13),
    ("dirent", 0x14),
    ("dfile", 0x15),
    ("rnd", 0x20),
    ("sleep", 0x21),
    ("timer", 0x22),
    ("fbreset", 0x30),
    ("fbstat", 0x31),
    ("fbset", 0x32),
    ("fbline", 0x33),
    ("fbrect", 0x34),
    ("fbflush", 0x35),
    ("joystick", 0x3A),
    ("scolor", 0x3B),
    ("memcopy", 0x40),
    ("drawimg", 0x50),
    ("drawimgsz", 0x51),
    ("drawimgclip", 0x52),
    ("error", 0xFF),
];

/// Returns the selector of the named system call.
pub fn syscall_code(name: &str) -> Option<u8> {
    SYSCALLS.iter().find(|c| c.0 == name).map(|c| c.1)
}

/// Returns the name of the system call with the given selector.
pub fn syscall_name(code: u8) -> Option<&'static str> {
    SYSCALLS.iter().find(|c| c.1 == code).map(|c| c.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name() {
        let add = lookup("add").unwrap();
        assert_eq!(add.kind, InstructionType::Alu);
        assert_eq!(add.code, 0x0);
        assert!(!add.double_word);
        assert!(lookup("ADD").is_none());
        assert!(lookup("foo").is_none());
        assert_eq!(lookup("push").unwrap().max_arity, 2);
    }

    #[test]
    fn lookup_by_opcode() {
        let cases = [
            (0x0FFF, "nop"),
            (0x1F00, "imm"),
            (0x1E00, "neg"),
            (0x4123, "lwr"),
            (0x7123, "sbr"),
            (0x8F00, "li"),
            (0x900B, "ret"),
            (0x900C, "jr"),
            (0xD123, "jz"),
        ];

        for &(opcode, name) in cases.iter() {
            assert_eq!(
                find(Opcode(opcode)).map(|m| m.name),
                Some(name),
                "case {:#06x}",
                opcode
            );
        }
        assert!(find(Opcode(0xA000)).is_none());
        assert!(find(Opcode(0x0700)).is_none());
    }

    #[test]
    fn double_words() {
        let cases = [
            (0x0510, true),
            (0x0410, false),
            (0x1F00, true),
            (0x1000, false),
            (0x2F0D, true),
            (0x200D, false),
            (0x8000, true),
            (0x8F00, true),
            (0xC000, false),
            (0xA000, false),
        ];

        for &(opcode, dw) in cases.iter() {
            assert_eq!(is_double_word(Opcode(opcode)), dw, "case {:#06x}", opcode);
        }
    }

    #[test]
    fn syscalls() {
        assert_eq!(syscall_code("exit"), Some(0x00));
        assert_eq!(syscall_code("joystick"), Some(0x3A));
        assert_eq!(syscall_code("error"), Some(0xFF));
        assert_eq!(syscall_code("exi"), None);
        assert_eq!(syscall_name(0x35), Some("fbflush"));
        assert_eq!(syscall_name(0x36), None);
    }
}
