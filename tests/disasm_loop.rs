/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! Tests whether a simple assemble -> disassemble -> assemble process produces
//! an executable identical to the first one.

extern crate mtmc16;

use std::io::Cursor;

use mtmc16::disassembler::Options;
use mtmc16::{Assembler, Disassembler, Executable};

static FIB: &str = include_str!("programs/fib.asm");
static GREET: &str = include_str!("programs/greet.asm");
static ECHO: &str = include_str!("programs/echo.asm");
static STACK: &str = include_str!("programs/stack.asm");

fn assemble(source: &str) -> Executable {
    let object = Assembler::new().compile(source).unwrap();
    Executable::link(&object).unwrap()
}

fn round_trip(source: &str) {
    let exe = assemble(source);

    // Go through the container format, as the command-line tools do.
    let mut file = Vec::new();
    exe.write(&mut file).unwrap();
    let loaded = Executable::read(Cursor::new(file)).unwrap();
    assert_eq!(loaded, exe);

    let mut output = Vec::new();
    Disassembler::with_options(loaded, Options::source())
        .dump(&mut output)
        .unwrap();
    let text = String::from_utf8(output).unwrap();

    assert_eq!(assemble(&text), exe, "disassembly:\n{}", text);
}

#[test]
fn fib() {
    round_trip(FIB);
}

#[test]
fn greet() {
    round_trip(GREET);
}

#[test]
fn echo() {
    round_trip(ECHO);
}

#[test]
fn stack() {
    round_trip(STACK);
}

#[test]
fn listing() {
    let mut output = Vec::new();
    Disassembler::new(assemble(ECHO)).dump(&mut output).unwrap();
    let text = String::from_utf8(output).unwrap();

    let expected = "\
0000: mov t0 a0
0002: eqi t0 0
0004: jnz 0x000a
0006: sys wstr
0008: sys exit
000A: li a0 0x0010  # data[0]
000E: sys error
0010: \"no argument\"
";
    assert_eq!(text, expected);
}
