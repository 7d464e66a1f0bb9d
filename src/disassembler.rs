/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! The MTMC-16 disassembler.
//!
//! The code segment is decoded one instruction at a time.  The data segment
//! has no type information, so it is rendered using a few heuristics: a run of
//! printable characters becomes a string, a run of zeros becomes a `.byte`
//! directive and anything else is shown as a word.
//!
//! There are two output styles.  A listing prefixes every line with its
//! address (and optionally the raw code word), while source output contains
//! only what the assembler needs to reproduce the same executable.

use std::default::Default;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use failure::{Error, ResultExt};

use executable::Executable;
use instruction::{Instruction, Opcode};

/// Options to be used with the disassembler.
#[derive(Debug, Clone)]
pub struct Options {
    /// Whether to show the raw code words in a listing (default `false`).
    pub code_bytes: bool,
    /// Whether to produce a listing with addresses (default `true`).  When
    /// this is `false`, the output is assembler source.
    pub listing: bool,
}

impl Options {
    /// Returns the default set of options.
    pub fn new() -> Self {
        Options {
            code_bytes: false,
            listing: true,
        }
    }

    /// Returns a set of options for producing assembler source.
    pub fn source() -> Self {
        Options {
            code_bytes: false,
            listing: false,
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Options::new()
    }
}

/// A disassembler for a single executable.
pub struct Disassembler {
    exe: Executable,
    code_bytes: bool,
    listing: bool,
}

impl Disassembler {
    /// Creates a new disassembler for the given executable using the default
    /// options.
    pub fn new(exe: Executable) -> Self {
        Disassembler::with_options(exe, Options::new())
    }

    /// Creates a new disassembler for the given executable using the given
    /// options.
    pub fn with_options(exe: Executable, options: Options) -> Self {
        Disassembler {
            exe,
            code_bytes: options.code_bytes && options.listing,
            listing: options.listing,
        }
    }

    /// Returns the executable being disassembled.
    pub fn executable(&self) -> &Executable {
        &self.exe
    }

    /// Writes the disassembly to the given output.
    pub fn dump<W: Write>(&self, output: &mut W) -> Result<(), Error> {
        if !self.listing {
            writeln!(output, ".text")?;
        }
        let code = &self.exe.code;
        let mut pc = 0;
        while pc < code.len() {
            let opcode = Opcode::from_bytes(code[pc], byte_at(code, pc + 1));
            self.prefix(output, pc)?;
            if self.code_bytes {
                write!(output, "{:04x}  ", opcode.0)?;
            }
            pc += 2;

            let ins = match Instruction::from_opcode(opcode) {
                Ok(ins) => ins,
                Err(_) => {
                    if self.listing {
                        writeln!(output, "(unknown)")?;
                    } else {
                        writeln!(output, "# unknown opcode {:#06x}", opcode.0)?;
                    }
                    continue;
                }
            };
            if opcode.is_double_word() {
                let word = (byte_at(code, pc) as u16) << 8 | byte_at(code, pc + 1) as u16;
                pc += 2;
                writeln!(output, "{}", self.with_word(ins, word as i16))?;
            } else {
                writeln!(output, "{}", ins)?;
            }
        }

        if !self.listing && !self.exe.data.is_empty() {
            writeln!(output, ".data")?;
        }
        let data = &self.exe.data;
        let mut i = 0;
        while i < data.len() {
            self.prefix(output, code.len() + i)?;
            if self.code_bytes {
                write!(output, "      ")?;
            }
            let (text, n) = self.data_item(&data[i..]);
            writeln!(output, "{}", text)?;
            i += n;
        }

        Ok(())
    }

    /// Writes the address column of a listing.
    fn prefix<W: Write>(&self, output: &mut W, addr: usize) -> Result<(), Error> {
        if self.listing {
            write!(output, "{:04X}: ", addr)?;
        }
        Ok(())
    }

    /// Formats a double-word instruction along with its data word.
    ///
    /// A word that points into the data segment is shown in hex, with a
    /// comment giving its offset in the data.
    fn with_word(&self, ins: Instruction, word: i16) -> String {
        let start = self.exe.code.len() as i32;
        let end = start + self.exe.data.len() as i32;
        let (value, note) = if word as i32 >= start && (word as i32) < end {
            (
                format!("{:#06x}", word),
                format!("  # data[{}]", word as i32 - start),
            )
        } else {
            (word.to_string(), String::new())
        };

        match ins {
            // The immediate comes before the optional stack register.
            Instruction::Pushi(_) => {
                let text = ins.to_string();
                let (name, stack) = text.split_at(ins.mnemonic().len());
                format!("{} {}{}{}", name, value, stack, note)
            }
            _ => format!("{} {}{}", ins, value, note),
        }
    }

    /// Formats the data item at the start of `data`, returning its text and
    /// the number of bytes it covers.
    fn data_item(&self, data: &[u8]) -> (String, usize) {
        if let Some(item) = self.string_item(data) {
            return item;
        }
        if let Some(item) = zero_run(data) {
            return item;
        }
        if data.len() == 1 {
            if !self.listing {
                if data[0] == 0 {
                    return (".byte 1".to_owned(), 1);
                }
                warn!("trailing data byte {} will assemble as a word", data[0]);
            }
            return (data[0].to_string(), 1);
        }
        let word = ((data[0] as u16) << 8 | data[1] as u16) as i16;
        (word.to_string(), 2)
    }

    /// Formats a string starting at the start of `data`, if there is one.
    ///
    /// The string runs up to and including a NUL byte, or up to the first
    /// byte that can't be shown.  Assembler source only uses strings which
    /// are terminated, since the assembler always adds the terminator.
    fn string_item(&self, data: &[u8]) -> Option<(String, usize)> {
        if !is_text(data[0]) {
            return None;
        }
        let end = data.iter().position(|&c| !is_text(c)).unwrap_or(data.len());
        let terminated = data.get(end) == Some(&0);
        if terminated {
            Some((format!("\"{}\"", escape(&data[..end])), end + 1))
        } else if self.listing {
            Some((format!("\"{}\"", escape(&data[..end])), end))
        } else {
            None
        }
    }

    /// Writes each sprite of the executable to a PNG file named
    /// `NAME_graphicN.png` in the given directory.
    ///
    /// Returns the paths of the files written.
    pub fn export_graphics<P: AsRef<Path>>(&self, dir: P, name: &str) -> Result<Vec<PathBuf>, Error> {
        let mut paths = Vec::new();
        for (i, sprite) in self.exe.graphics.iter().enumerate() {
            let path = dir.as_ref().join(format!("{}_graphic{}.png", name, i));
            let file = File::create(&path)
                .with_context(|_| format!("could not create file '{}'", path.display()))?;
            sprite.encode_png(BufWriter::new(file))?;
            info!("wrote {}", path.display());
            paths.push(path);
        }
        Ok(paths)
    }
}

fn byte_at(bytes: &[u8], i: usize) -> u8 {
    bytes.get(i).cloned().unwrap_or(0)
}

/// Returns whether a byte can appear in a disassembled string.
fn is_text(c: u8) -> bool {
    match c {
        b'\t' | b'\n' | b'\r' | b' '..=b'~' => true,
        _ => false,
    }
}

/// Formats a run of zero bytes, if there are at least two.
///
/// Runs are kept to an even length, so that the words after them stay
/// aligned, unless they reach the end of the data.
fn zero_run(data: &[u8]) -> Option<(String, usize)> {
    let mut n = data.iter().take_while(|&&b| b == 0).count();
    if n < 2 {
        return None;
    }
    if n == 2 {
        return Some(("0".to_owned(), 2));
    }
    if n < data.len() {
        n -= n & 1;
    }
    Some((format!(".byte {}", n), n))
}

/// Escapes a string for assembler source.
fn escape(s: &[u8]) -> String {
    let mut escaped = String::new();
    for &c in s {
        match c {
            b'"' => escaped.push_str("\\\""),
            b'\\' => escaped.push_str("\\\\"),
            b'\t' => escaped.push_str("\\t"),
            b'\n' => escaped.push_str("\\n"),
            b'\r' => escaped.push_str("\\r"),
            c => escaped.push(c as char),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use assembler::Assembler;

    fn disassemble(source: &str, options: Options) -> String {
        let object = Assembler::new().compile(source).unwrap();
        let exe = Executable::link(&object).unwrap();
        let mut output = Vec::new();
        Disassembler::with_options(exe, options)
            .dump(&mut output)
            .unwrap();
        String::from_utf8(output).unwrap()
    }

    fn listing(source: &str) -> String {
        disassemble(source, Options::new())
    }

    #[test]
    fn instructions() {
        // Test cases, in the format (source, listing line).
        let cases = [
            ("sys exit", "0000: sys exit"),
            ("sys 0x09", "0000: sys 0x09"),
            ("mov t0 a1", "0000: mov t0 a1"),
            ("inc t1", "0000: inc t1"),
            ("dec t1 3", "0000: dec t1 3"),
            ("seti rv 12", "0000: seti rv 12"),
            ("add t0 t1", "0000: add t0 t1"),
            ("neg t2", "0000: neg t2"),
            ("addi t0 -3", "0000: addi t0 -3"),
            ("push ra", "0000: push ra"),
            ("pop t0 fp", "0000: pop t0 fp"),
            ("sop mul", "0000: sop mul"),
            ("dup t5", "0000: dup t5"),
            ("pushi 99", "0000: pushi 99"),
            ("pushi 7 t5", "0000: pushi 7 t5"),
            ("gt t0 t1", "0000: gt t0 t1"),
            ("eqi t0 4", "0000: eqi t0 4"),
            ("lbr t0 t1 t2", "0000: lbr t0 t1 t2"),
            ("li t0 1000", "0000: li t0 1000"),
            ("lwo t0 t1 1000", "0000: lwo t0 t1 1000"),
            ("ret", "0000: ret"),
            ("jr t3", "0000: jr t3"),
            ("jnz 0x0123", "0000: jnz 0x0123"),
            ("nop", "0000: nop"),
        ];

        for &(source, expected) in cases.iter() {
            let text = listing(source);
            assert_eq!(text.trim_right(), expected, "case {:?}", source);
        }
    }

    #[test]
    fn code_bytes() {
        let options = Options {
            code_bytes: true,
            ..Options::new()
        };
        let text = disassemble(".data\n7\n.text\nseti t0 3\nlw t1 0\n", options);
        assert_eq!(
            text,
            "0000: 0403  seti t0 3\n0002: 8010  lw t1 0\n0006:       7\n"
        );
    }

    #[test]
    fn data_addresses() {
        let text = listing(".data\nfoo:\n.int 1\n.text\nla t0 foo");
        assert_eq!(text, "0000: li t0 0x0004  # data[0]\n0004: 0\n");

        let text = listing(".data\n1 2\nbar: 3\n.text\nlw t0 bar\nj 0x0002");
        assert!(text.starts_with("0000: lw t0 0x000a  # data[4]\n"), "{}", text);
    }

    #[test]
    fn data_items() {
        // Test cases, in the format (data segment, rendered items).
        let cases: [(&[u8], &[&str]); 7] = [
            (b"hi\0", &["\"hi\""]),
            (b"say \"\\\"\n\0", &["\"say \\\"\\\\\\\"\\n\""]),
            (&[0, 0, 0, 0, 0, 1], &[".byte 4", "1"]),
            (&[0, 0, 0, 0xFF, 0xFE], &["0", "255", "254"]),
            (&[0, 0, 0], &[".byte 3"]),
            (&[0xFF, 0xFF, 0x12], &["-1", "18"]),
            (b"ab\x01\x02", &["\"ab\"", "258"]),
        ];

        for &(data, expected) in cases.iter() {
            let exe = Executable {
                data: data.to_vec(),
                ..Executable::default()
            };
            let mut output = Vec::new();
            Disassembler::new(exe).dump(&mut output).unwrap();
            let text = String::from_utf8(output).unwrap();
            let items: Vec<&str> = text.lines().map(|line| &line[6..]).collect();
            assert_eq!(items, expected, "case {:?}", data);
        }
    }

    #[test]
    fn unknown_opcodes() {
        let exe = Executable {
            code: vec![0x0F, 0xFF, 0x06, 0x00],
            ..Executable::default()
        };
        let mut output = Vec::new();
        Disassembler::new(exe.clone()).dump(&mut output).unwrap();
        assert_eq!(output, b"0000: nop\n0002: (unknown)\n".to_vec());

        let mut output = Vec::new();
        Disassembler::with_options(exe, Options::source())
            .dump(&mut output)
            .unwrap();
        assert_eq!(output, b".text\nnop\n# unknown opcode 0x0600\n".to_vec());
    }

    #[test]
    fn source_round_trip() {
        let source = "\
            .data\n\
            msg: \"Hello, \\\"world\\\"!\\n\"\n\
            n: 42\n\
            .byte 5\n\
            -7 0\n\
            buf: .byte 4\n\
            .text\n\
            start: la a0 msg\n\
            sys wstr\n\
            lw t0 n\n\
            loop: dec t0\n\
            gti t0 0\n\
            jnz loop\n\
            pushi 3 t5\n\
            sop add t5\n\
            swo t0 t1 buf\n\
            imm shr t0 1\n\
            jal sub\n\
            sys exit\n\
            sub: ret\n";
        let object = Assembler::new().compile(source).unwrap();
        let exe = Executable::link(&object).unwrap();

        let mut text = Vec::new();
        Disassembler::with_options(exe.clone(), Options::source())
            .dump(&mut text)
            .unwrap();
        let text = String::from_utf8(text).unwrap();
        let again = Executable::link(&Assembler::new().compile(&text).unwrap()).unwrap();

        assert_eq!(again, exe, "disassembly:\n{}", text);
    }
}
