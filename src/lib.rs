/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! A toolchain for the MTMC-16 teaching computer.
//!
//! The crate is split along the same lines as the toolchain itself: the
//! `assembler` turns source text into an `Object`, which the `executable`
//! module links into the Orc1 container format; the `emulator` loads and runs
//! an `Executable`, and the `disassembler` turns one back into text.  All of
//! these share the instruction encoding defined in `instruction` and the
//! mnemonic table in `table`.

#[macro_use]
extern crate combine;
#[macro_use]
extern crate enum_primitive;
extern crate failure;
#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate log;
#[cfg(test)]
#[macro_use]
extern crate maplit;
extern crate num;
extern crate png;
extern crate rand;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_json;
extern crate time;

/// The size of the MTMC-16's memory, in bytes.
pub const MEM_SIZE: usize = 4096;
/// The default emulation speed, in instructions per second.
pub const DEFAULT_SPEED: u32 = 1_000_000;
/// The maximum number of sprites in an executable.
pub const MAX_GRAPHICS: usize = 10;
/// The maximum size of an encoded sprite, in bytes.
pub const MAX_GRAPHIC_BYTES: usize = 10_000;
/// The maximum width of a sprite, in pixels.
pub const MAX_GRAPHIC_WIDTH: usize = 500;
/// The maximum height of a sprite, in pixels.
pub const MAX_GRAPHIC_HEIGHT: usize = 200;
/// The maximum length of a single assembler token.
pub const MAX_TOKEN_LEN: usize = 64;

pub mod assembler;
pub mod disassembler;
pub mod display;
pub mod emulator;
pub mod executable;
pub mod input;
pub mod instruction;
pub mod platform;
pub mod sprite;
mod syscall;
pub mod table;
mod timer;
mod util;

pub use assembler::{Assembler, Object};
pub use disassembler::Disassembler;
pub use emulator::{Emulator, Status};
pub use executable::Executable;
pub use instruction::{AluOp, Instruction, InstructionType, LoadOp, Opcode, Register, StackOp,
                      TestOp};
pub use platform::{Console, Platform};
pub use sprite::Sprite;
