/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! The system calls made by the `sys` instruction.
//!
//! Arguments are passed in `A0` through `A3` and results returned in `RV`.
//! Strings and buffers live in the machine's memory and are passed by
//! address.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use failure::Error;
use num::FromPrimitive;
use rand::Rng;

use display::{self, Blit};
use emulator::{Emulator, Status};
use instruction::Register::{self, A0, A1, A2, A3, IO, RV};
use platform::Platform;
use sprite::Sprite;
use util;

enum_from_primitive! {
/// A system call selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    Exit = 0x00,
    Rint = 0x01,
    Wint = 0x02,
    Rstr = 0x03,
    Wchr = 0x04,
    Rchr = 0x05,
    Wstr = 0x06,
    Printf = 0x07,
    Atoi = 0x08,
    Rfile = 0x10,
    Wfile = 0x11,
    Cwd = 0x12,
    Chdir = 0x13,
    Dirent = 0x14,
    Dfile = 0x15,
    Rnd = 0x20,
    Sleep = 0x21,
    Timer = 0x22,
    FbReset = 0x30,
    FbStat = 0x31,
    FbSet = 0x32,
    FbLine = 0x33,
    FbRect = 0x34,
    FbFlush = 0x35,
    Joystick = 0x3A,
    SetColor = 0x3B,
    MemCopy = 0x40,
    DrawImg = 0x50,
    DrawImgSize = 0x51,
    DrawImgClip = 0x52,
    Abort = 0xFF,
}
}

/// The `dirent` command that counts the entries of a directory.
const DIRENT_COUNT: i16 = 0;
/// The `dirent` command that reads a single entry.
const DIRENT_ENTRY: i16 = 1;
/// The `dirent` flag marking a directory.
const DIRENT_DIR: i16 = 1;

impl<P: Platform> Emulator<P> {
    /// Performs the system call with the given selector.
    pub(crate) fn syscall(&mut self, selector: u8) -> Result<(), Error> {
        use self::Call::*;

        let call = match Call::from_u8(selector) {
            Some(call) => call,
            None => {
                self.fault(format!("unhandled system call {:#04x}", selector));
                return Ok(());
            }
        };
        trace!("system call {:?}", call);

        match call {
            Exit => self.status = Status::Finished,
            Rint => {
                let x = match self.platform.read_line()? {
                    Some(line) => word(util::atoi(&line)),
                    None => 0,
                };
                self.set_register(RV, x);
            }
            Wint => {
                let x = self.register(A0);
                self.platform.write(x.to_string().as_bytes())?;
            }
            Rstr => self.rstr()?,
            Wchr => {
                let c = self.register(A0) as u8;
                self.platform.write(&[c])?;
            }
            Rchr => {
                let c = match self.platform.read_line()? {
                    Some(ref line) if !line.is_empty() => line[0],
                    _ => 0,
                };
                self.set_register(RV, c as i16);
            }
            Wstr => {
                let s = self.string_arg(A0);
                self.platform.write(&s)?;
            }
            Printf => self.printf()?,
            Atoi => {
                let s = self.string_arg(A0);
                self.set_register(RV, word(util::atoi(&s)));
            }

            Rfile => self.rfile(),
            Wfile => self.wfile(),
            Cwd => {
                let (addr, size) = (self.arg(A0), self.arg(A1));
                let cwd = self.cwd.clone().into_bytes();
                let n = self.write_string(addr, &cwd, size);
                self.set_register(RV, n as i16);
            }
            Chdir => self.chdir(),
            Dirent => self.dirent(),
            Dfile => {
                let name = self.path_arg(A0);
                let ok = match self.disk.resolve(&self.cwd, &name) {
                    Some(path) => fs::remove_file(&path)
                        .map_err(|e| warn!("could not delete '{}': {}", path.display(), e))
                        .is_ok(),
                    None => false,
                };
                self.set_register(RV, if ok { 0 } else { 1 });
            }

            Rnd => {
                let (mut lo, mut hi) = (self.register(A0), self.register(A1));
                if lo > hi {
                    ::std::mem::swap(&mut lo, &mut hi);
                }
                let x = self.rng.gen_range(lo as i32, hi as i32 + 1);
                self.set_register(RV, x as i16);
            }
            Sleep => {
                let ms = self.register(A0);
                if ms > 0 {
                    self.platform.sleep(ms as u32);
                }
            }
            Timer => {
                let ms = self.register(A0);
                if ms > 0 {
                    self.timer.start(ms as u32);
                }
                let left = self.timer.remaining().min(i16::max_value() as u32);
                self.set_register(RV, left as i16);
            }

            FbReset => {
                self.display.clear(display::BACKGROUND);
                self.color = 0;
            }
            FbStat => {
                let (x, y) = (self.arg(A0), self.arg(A1));
                let color = self.display.pixel(x, y).unwrap_or(0);
                self.set_register(RV, color as i16);
            }
            FbSet => {
                let (x, y, color) = (self.arg(A0), self.arg(A1), self.color);
                self.display.set_pixel(x, y, color);
            }
            FbLine => {
                let (x0, y0) = (self.arg(A0), self.arg(A1));
                let (x1, y1) = (self.arg(A2), self.arg(A3));
                let color = self.color;
                self.display.line(x0, y0, x1, y1, color);
            }
            FbRect => {
                let (x, y) = (self.arg(A0), self.arg(A1));
                let (w, h) = (self.arg(A2), self.arg(A3));
                let color = self.color;
                self.display.fill_rect(x, y, w, h, color);
            }
            FbFlush => self.platform.present(&mut self.display)?,
            Joystick => {
                self.platform.poll(&mut self.input)?;
                let buttons = self.input.bits() as i16;
                self.set_register(IO, buttons);
                self.set_register(RV, buttons);
            }
            SetColor => self.color = (self.register(A0) & 3) as u8,

            MemCopy => {
                let (src, dst, n) = (self.arg(A0), self.arg(A1), self.arg(A2));
                for i in 0..n {
                    let b = self.read_byte(src + i);
                    self.write_byte(dst + i, b);
                    if self.status == Status::PermanentError {
                        break;
                    }
                }
            }
            DrawImg => self.draw_image(|sprite, _| Blit::whole(sprite)),
            DrawImgSize => self.draw_image(|sprite, emu| {
                let addr = emu.arg(A3);
                let (w, h) = (emu.read_word(addr), emu.read_word(addr + 2));
                Blit::scaled(sprite, w as i32, h as i32)
            }),
            DrawImgClip => self.draw_image(|_, emu| {
                let addr = emu.arg(A3);
                let (sx, sy) = (emu.read_word(addr), emu.read_word(addr + 2));
                let (w, h) = (emu.read_word(addr + 4), emu.read_word(addr + 6));
                Blit::clipped(sx as i32, sy as i32, w as i32, h as i32)
            }),

            Abort => {
                let message = self.string_arg(A0);
                self.fault(format!(
                    "program error: {}",
                    String::from_utf8_lossy(&message)
                ));
            }
        }

        if self.platform.closed() && self.status == Status::Executing {
            self.status = Status::Finished;
        }
        Ok(())
    }

    /// Returns a register as an address or count.
    fn arg(&self, reg: Register) -> i32 {
        self.register(reg) as i32
    }

    /// Returns the string addressed by a register.
    fn string_arg(&mut self, reg: Register) -> Vec<u8> {
        let addr = self.arg(reg);
        self.read_string(addr)
    }

    /// Returns the path addressed by a register.
    fn path_arg(&mut self, reg: Register) -> String {
        String::from_utf8_lossy(&self.string_arg(reg)).into_owned()
    }

    /// Copies a string into a buffer of the given size, truncating it to
    /// leave room for a NUL terminator.
    ///
    /// Returns the number of bytes written, including the terminator.
    fn write_string(&mut self, addr: i32, s: &[u8], size: i32) -> i32 {
        if size <= 0 {
            return 0;
        }
        let n = (s.len() as i32).min(size - 1);
        for i in 0..n {
            self.write_byte(addr + i, s[i as usize]);
        }
        self.write_byte(addr + n, 0);
        n + 1
    }

    fn rstr(&mut self) -> Result<(), Error> {
        let (addr, size) = (self.arg(A0), self.arg(A1));
        let mut line = self.platform.read_line()?.unwrap_or_default();
        while line.last() == Some(&b'\n') || line.last() == Some(&b'\r') {
            line.pop();
        }
        let n = self.write_string(addr, &line, size);
        self.set_register(RV, (n - 1).max(0) as i16);
        Ok(())
    }

    fn printf(&mut self) -> Result<(), Error> {
        let format = self.string_arg(A0);
        let mut args = self.arg(A1);
        let mut out = Vec::new();

        let mut chars = format.iter().cloned();
        while let Some(c) = chars.next() {
            if c != b'%' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some(b'%') => out.push(b'%'),
                Some(conv @ b'd') | Some(conv @ b'c') | Some(conv @ b's') => {
                    let val = self.read_word(args);
                    args += 2;
                    match conv {
                        b'd' => out.extend_from_slice(val.to_string().as_bytes()),
                        b'c' => out.push(val as u8),
                        _ => {
                            let s = self.read_string(val as i32);
                            out.extend_from_slice(&s);
                        }
                    }
                }
                Some(other) => out.extend_from_slice(&[b'%', other]),
                None => out.push(b'%'),
            }
        }

        self.platform.write(&out)?;
        self.set_register(A1, args as i16);
        self.set_register(RV, out.len() as i16);
        Ok(())
    }

    fn rfile(&mut self) {
        let name = self.path_arg(A0);
        let (addr, size, lines) = (self.arg(A1), self.arg(A2), self.arg(A3));
        let path = match self.disk.resolve(&self.cwd, &name) {
            Some(path) => path,
            None => {
                warn!("cannot read '{}': not on disk", name);
                self.set_register(RV, 1);
                return;
            }
        };

        let mut contents = Vec::new();
        if let Err(e) = File::open(&path).and_then(|mut f| f.read_to_end(&mut contents)) {
            warn!("cannot read '{}': {}", name, e);
            self.set_register(RV, 1);
            return;
        }

        let res = if path.extension().map_or(false, |ext| ext == "cells") {
            let grid = decode_cells(&contents, size, lines);
            for (i, &b) in grid.iter().enumerate() {
                self.write_byte(addr + i as i32, b);
            }
            0
        } else if contents.is_empty() {
            -1
        } else {
            let n = (contents.len() as i32).min(size.max(0));
            for i in 0..n {
                self.write_byte(addr + i, contents[i as usize]);
            }
            0
        };
        self.set_register(RV, res);
    }

    fn wfile(&mut self) {
        let name = self.path_arg(A0);
        let (addr, size) = (self.arg(A1), self.arg(A2));
        let contents: Vec<u8> = (0..size.max(0)).map(|i| self.read_byte(addr + i)).collect();

        let ok = match self.disk.resolve(&self.cwd, &name) {
            Some(path) => File::create(&path)
                .and_then(|mut f| f.write_all(&contents))
                .map_err(|e| warn!("cannot write '{}': {}", name, e))
                .is_ok(),
            None => {
                warn!("cannot write '{}': not on disk", name);
                false
            }
        };
        self.set_register(RV, if ok { 0 } else { 1 });
    }

    fn chdir(&mut self) {
        let name = self.path_arg(A0);
        let cwd = match self.disk.resolve(&self.cwd, &name) {
            Some(ref path) if path.is_dir() => self.disk.name_of(path),
            _ => None,
        };
        match cwd {
            Some(cwd) => {
                debug!("changed directory to {}", cwd);
                self.cwd = cwd;
                self.set_register(RV, 0);
            }
            None => self.set_register(RV, 1),
        }
    }

    fn dirent(&mut self) {
        let name = self.path_arg(A0);
        let cmd = self.register(A1);
        let entries = self.disk
            .resolve(&self.cwd, &name)
            .and_then(|path| list_dir(&path));
        let entries = match entries {
            Some(entries) => entries,
            None => {
                self.set_register(RV, -1);
                return;
            }
        };

        match cmd {
            DIRENT_COUNT => self.set_register(RV, entries.len() as i16),
            DIRENT_ENTRY => {
                let index = self.register(A2);
                let addr = self.arg(A3);
                let &(ref name, is_dir) = match entries.get(index as usize) {
                    Some(entry) if index >= 0 => entry,
                    _ => {
                        self.set_register(RV, -1);
                        return;
                    }
                };
                self.write_word(addr, if is_dir { DIRENT_DIR } else { 0 });
                let size = self.read_word(addr + 2) as i32;
                let n = self.write_string(addr + 4, name.as_bytes(), size);
                self.set_register(RV, (n - 1).max(0) as i16);
            }
            _ => self.set_register(RV, -1),
        }
    }

    /// Draws the sprite selected by `A0` at (`A1`, `A2`), with the part and
    /// size given by `blit`.
    fn draw_image<F>(&mut self, blit: F)
    where
        F: FnOnce(&Sprite, &mut Self) -> Blit,
    {
        let index = self.register(A0);
        let (x, y) = (self.arg(A1), self.arg(A2));
        let sprite = if index >= 0 {
            self.graphics.get(index as usize).cloned()
        } else {
            None
        };
        let sprite = match sprite {
            Some(sprite) => sprite,
            None => {
                self.set_register(RV, 1);
                return;
            }
        };

        let blit = blit(&sprite, self);
        self.display.draw_sprite(&sprite, x, y, blit);
        self.set_register(RV, 0);
    }
}

/// Clamps a parsed integer to a word, yielding 0 for out-of-range values.
fn word(x: i64) -> i16 {
    if x >= i16::min_value() as i64 && x <= i16::max_value() as i64 {
        x as i16
    } else {
        0
    }
}

/// Returns the entries of a directory as (name, is directory) pairs, sorted by
/// name.
fn list_dir(path: &Path) -> Option<Vec<(String, bool)>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(path).ok()? {
        let entry = entry.ok()?;
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        entries.push((entry.file_name().to_string_lossy().into_owned(), is_dir));
    }
    entries.sort();
    Some(entries)
}

/// Decodes a Life pattern in plaintext format into a grid of `rows` rows, each
/// holding `cols` cells packed eight to a byte (first cell in the least
/// significant bit).
///
/// Lines starting with `!` are comments, and `O` marks a live cell.  Blank
/// lines before the pattern are skipped; cells past the edges of the grid
/// are dropped.
fn decode_cells(text: &[u8], cols: i32, rows: i32) -> Vec<u8> {
    let cols = cols.max(0) as usize;
    let stride = (cols + 7) / 8;
    let rows = rows.max(0) as usize;
    let mut grid = vec![0; stride * rows];

    let lines = text.split(|&b| b == b'\n')
        .filter(|line| !line.starts_with(b"!"))
        .skip_while(|line| line.iter().all(|b| b.is_ascii_whitespace()));
    for (row, line) in lines.take(rows).enumerate() {
        for (col, &c) in line.iter().enumerate().take(cols) {
            if c == b'O' {
                grid[row * stride + col / 8] |= 1 << (col % 8);
            }
        }
    }
    grid
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::io::Cursor;

    use super::*;
    use assembler::Assembler;
    use emulator::Options;
    use executable::Executable;
    use instruction::Register::*;
    use platform::Console;

    type TestEmulator = Emulator<Console<Cursor<Vec<u8>>, Vec<u8>>>;

    fn boot(source: &str, input: &str, options: Options) -> TestEmulator {
        let object = Assembler::new().compile(source).unwrap();
        let exe = Executable::link(&object).unwrap();
        let console = Console::new(Cursor::new(input.as_bytes().to_vec()), Vec::new());
        let mut emulator = Emulator::with_options(console, options);
        emulator.load(&exe);
        emulator
    }

    fn run(source: &str, input: &str) -> (TestEmulator, String) {
        let mut emulator = boot(source, input, Options::testing());
        emulator.run().unwrap();
        let output = String::from_utf8(emulator.platform().output().clone()).unwrap();
        (emulator, output)
    }

    fn scratch_disk(name: &str) -> Options {
        let root = env::temp_dir().join(format!("mtmc16-syscall-{}", name));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("hello.txt"), "hello").unwrap();
        fs::write(root.join("empty.txt"), "").unwrap();
        fs::write(root.join("glider.cells"), "!Name: Glider\n.O\n..O\nOOO\n").unwrap();
        Options {
            disk: root,
            ..Options::testing()
        }
    }

    #[test]
    fn console_output() {
        let source = "\
            .data\n\
            msg: \"hi\\n\"\n\
            .text\n\
            li a0 -42\n\
            sys wint\n\
            seti a0 10\n\
            sys wchr\n\
            la a0 msg\n\
            sys wstr\n\
            sys exit\n";
        let (emulator, output) = run(source, "");

        assert_eq!(emulator.status(), Status::Finished);
        assert_eq!(output, "-42\nhi\n");
    }

    #[test]
    fn console_input() {
        let source = "\
            .data\n\
            buf: .byte 8\n\
            .text\n\
            sys rint\n\
            mov t0 rv\n\
            sys rint\n\
            mov t1 rv\n\
            sys rchr\n\
            mov t2 rv\n\
            la a0 buf\n\
            li a1 4\n\
            sys rstr\n\
            mov t3 rv\n\
            sys rint\n\
            mov t4 rv\n\
            sys exit\n";
        let (emulator, _) = run(source, "  123\n99999\nxyz\nabcdef\r\n");
        let buf = emulator.register(CB) as usize + 1;

        assert_eq!(emulator.register(T0), 123);
        assert_eq!(emulator.register(T1), 0);
        assert_eq!(emulator.register(T2), b'x' as i16);
        assert_eq!(emulator.register(T3), 3);
        assert_eq!(emulator.mem()[buf..buf + 4], *b"abc\0");
        assert_eq!(emulator.register(T4), 0);
    }

    #[test]
    fn printf() {
        let source = "\
            .data\n\
            fmt: \"%d%% of %s is %c%q%\"\n\
            name: \"pie\"\n\
            args: -5\n\
            ptr: 0\n\
            chr: 65\n\
            .text\n\
            la t0 name\n\
            sw t0 ptr\n\
            la a0 fmt\n\
            la a1 args\n\
            sys printf\n\
            sys exit\n";
        let (emulator, output) = run(source, "");
        let args = emulator.register(CB) as i32 + 1 + 20 + 4;

        assert_eq!(output, "-5% of pie is A%q%");
        assert_eq!(emulator.register(RV), output.len() as i16);
        assert_eq!(emulator.register(A1) as i32, args + 6);
    }

    #[test]
    fn atoi_and_rnd() {
        let source = "\
            .data\n\
            num: \" -310xyz\"\n\
            .text\n\
            la a0 num\n\
            sys atoi\n\
            mov t0 rv\n\
            seti a0 9\n\
            seti a1 3\n\
            sys rnd\n\
            mov t1 rv\n\
            seti a0 4\n\
            seti a1 4\n\
            sys rnd\n\
            sys exit\n";
        let (emulator, _) = run(source, "");

        assert_eq!(emulator.register(T0), -310);
        let x = emulator.register(T1);
        assert!(x >= 3 && x <= 9, "rnd gave {}", x);
        assert_eq!(emulator.register(RV), 4);
    }

    #[test]
    fn frame_buffer() {
        let source = "\
            .data\n\
            size: 4\n\
            4\n\
            .text\n\
            sys fbreset\n\
            seti a0 1\n\
            sys scolor\n\
            seti a0 2\n\
            seti a1 3\n\
            seti a2 2\n\
            seti a3 2\n\
            sys fbrect\n\
            seti a0 7\n\
            sys scolor\n\
            li a0 100\n\
            li a1 100\n\
            sys fbset\n\
            li a0 3\n\
            li a1 4\n\
            sys fbstat\n\
            mov t0 rv\n\
            li a0 -1\n\
            sys fbstat\n\
            mov t1 rv\n\
            seti a0 0\n\
            seti a1 10\n\
            seti a2 0\n\
            la a3 size\n\
            sys drawimgsz\n\
            mov t2 rv\n\
            seti a0 1\n\
            sys drawimg\n\
            mov t3 rv\n\
            sys fbflush\n\
            sys exit\n";
        let mut emulator = boot(source, "", Options::testing());
        let mut sprite = Sprite::new(2, 2);
        sprite.set_pixel(1, 1, None);
        emulator.graphics.push(sprite);
        emulator.run().unwrap();
        let display = emulator.display();

        assert_eq!(emulator.status(), Status::Finished);
        assert_eq!(display.pixel(0, 0), Some(display::BACKGROUND));
        assert_eq!(display.pixel(2, 3), Some(1));
        assert_eq!(display.pixel(3, 4), Some(1));
        assert_eq!(display.pixel(4, 3), Some(display::BACKGROUND));
        assert_eq!(display.pixel(100, 100), Some(3));
        assert_eq!(emulator.register(T0), 1);
        assert_eq!(emulator.register(T1), 0);
        assert_eq!(emulator.register(T2), 0);
        assert_eq!(display.pixel(10, 0), Some(0));
        assert_eq!(display.pixel(11, 1), Some(0));
        assert_eq!(display.pixel(12, 2), Some(display::BACKGROUND));
        assert_eq!(display.pixel(13, 3), Some(display::BACKGROUND));
        assert_eq!(emulator.register(T3), 1);
    }

    #[test]
    fn lines_and_clips() {
        let source = "\
            .data\n\
            clip: 1\n\
            0\n\
            1\n\
            2\n\
            .text\n\
            seti a0 2\n\
            sys scolor\n\
            seti a0 0\n\
            seti a1 0\n\
            seti a2 3\n\
            seti a3 0\n\
            sys fbline\n\
            seti a0 0\n\
            seti a1 5\n\
            seti a2 5\n\
            la a3 clip\n\
            sys drawimgclip\n\
            sys exit\n";
        let mut emulator = boot(source, "", Options::testing());
        let mut sprite = Sprite::new(2, 2);
        sprite.set_pixel(1, 0, Some(1));
        sprite.set_pixel(1, 1, Some(2));
        emulator.graphics.push(sprite);
        emulator.run().unwrap();
        let display = emulator.display();

        for x in 0..4 {
            assert_eq!(display.pixel(x, 0), Some(2), "x = {}", x);
        }
        assert_eq!(display.pixel(4, 0), Some(display::BACKGROUND));
        assert_eq!(display.pixel(5, 5), Some(1));
        assert_eq!(display.pixel(5, 6), Some(2));
        assert_eq!(display.pixel(6, 5), Some(display::BACKGROUND));
    }

    #[test]
    fn memcopy_and_joystick() {
        let source = "\
            .data\n\
            src: \"abc\"\n\
            .text\n\
            la a0 src\n\
            li a1 300\n\
            seti a2 4\n\
            sys memcopy\n\
            sys joystick\n\
            sys exit\n";
        let mut emulator = boot(source, "", Options::testing());
        emulator.input_mut().press(::input::Button::Right);
        emulator.input_mut().press(::input::Button::A);
        emulator.run().unwrap();

        assert_eq!(emulator.mem()[300..304], *b"abc\0");
        assert_eq!(emulator.register(RV), 0x12);
        assert_eq!(emulator.register(IO), 0x12);
    }

    #[test]
    fn timer() {
        let source = "\
            li a0 5000\n\
            sys timer\n\
            mov t0 rv\n\
            seti a0 0\n\
            sys timer\n\
            sys exit\n";
        let (emulator, _) = run(source, "");

        let (t0, rv) = (emulator.register(T0), emulator.register(RV));
        assert!(t0 > 4000 && t0 <= 5000, "timer started at {}", t0);
        assert!(rv > 0 && rv <= t0, "timer read {}", rv);
    }

    #[test]
    fn program_error() {
        let source = "\
            .data\n\
            msg: \"oops\"\n\
            .text\n\
            la a0 msg\n\
            sys error\n\
            seti t0 1\n";
        let (emulator, _) = run(source, "");

        assert_eq!(emulator.status(), Status::PermanentError);
        assert_eq!(emulator.register(T0), 0);

        let (emulator, _) = run("sys 0x09\nseti t0 1", "");
        assert_eq!(emulator.status(), Status::PermanentError);
        assert_eq!(emulator.register(T0), 0);
    }

    #[test]
    fn files() {
        let options = scratch_disk("files");
        let root = options.disk.clone();
        let source = "\
            .data\n\
            hello: \"hello.txt\"\n\
            empty: \"/empty.txt\"\n\
            out: \"sub/out.txt\"\n\
            escape: \"../x.txt\"\n\
            buf: .byte 8\n\
            .text\n\
            la a0 hello\n\
            la a1 buf\n\
            seti a2 4\n\
            sys rfile\n\
            mov t0 rv\n\
            la a0 empty\n\
            sys rfile\n\
            mov t1 rv\n\
            la a0 escape\n\
            sys rfile\n\
            mov t2 rv\n\
            la a0 out\n\
            la a1 buf\n\
            seti a2 3\n\
            sys wfile\n\
            mov t3 rv\n\
            la a0 escape\n\
            sys wfile\n\
            mov t4 rv\n\
            la a0 hello\n\
            sys dfile\n\
            mov t5 rv\n\
            sys exit\n";
        let mut emulator = boot(source, "", options);
        emulator.run().unwrap();

        assert_eq!(emulator.register(T0), 0);
        assert_eq!(emulator.register(T1), -1);
        assert_eq!(emulator.register(T2), 1);
        assert_eq!(emulator.register(T3), 0);
        assert_eq!(emulator.register(T4), 1);
        assert_eq!(emulator.register(T5), 0);
        assert_eq!(fs::read(root.join("sub").join("out.txt")).unwrap(), b"hel");
        assert!(!root.join("hello.txt").exists());
    }

    #[test]
    fn cells() {
        let options = scratch_disk("cells");
        let source = "\
            .data\n\
            name: \"glider.cells\"\n\
            grid: .byte 8\n\
            .text\n\
            la a0 name\n\
            la a1 grid\n\
            li a2 12\n\
            seti a3 4\n\
            sys rfile\n\
            sys exit\n";
        let mut emulator = boot(source, "", options);
        emulator.run().unwrap();
        let grid = emulator.register(CB) as usize + 1 + 13;

        assert_eq!(emulator.register(RV), 0);
        assert_eq!(
            emulator.mem()[grid..grid + 8],
            [0b010, 0, 0b100, 0, 0b111, 0, 0, 0]
        );
    }

    #[test]
    fn directories() {
        let options = scratch_disk("directories");
        let source = "\
            .data\n\
            root: \"/\"\n\
            sub: \"sub\"\n\
            up: \"..\"\n\
            entry: 0\n\
            16\n\
            .byte 16\n\
            cwd: .byte 16\n\
            .text\n\
            la a0 root\n\
            seti a1 0\n\
            sys dirent\n\
            mov t0 rv\n\
            seti a1 1\n\
            seti a2 3\n\
            la a3 entry\n\
            sys dirent\n\
            mov t1 rv\n\
            la a0 sub\n\
            sys chdir\n\
            mov t2 rv\n\
            la a0 cwd\n\
            seti a1 10\n\
            sys cwd\n\
            mov t3 rv\n\
            la a0 up\n\
            sys chdir\n\
            mov t4 rv\n\
            sys exit\n";
        let mut emulator = boot(source, "", options);
        emulator.run().unwrap();
        let entry = emulator.register(CB) as usize + 1 + 9;
        let cwd = entry + 20;

        // Entries: empty.txt, glider.cells, hello.txt, sub.
        assert_eq!(emulator.register(T0), 4);
        assert_eq!(emulator.register(T1), 3);
        assert_eq!(emulator.mem()[entry..entry + 2], [0, 1]);
        assert_eq!(emulator.mem()[entry + 4..entry + 8], *b"sub\0");
        assert_eq!(emulator.register(T2), 0);
        assert_eq!(emulator.register(T3), 5);
        assert_eq!(emulator.mem()[cwd..cwd + 5], *b"/sub\0");
        assert_eq!(emulator.register(T4), 0);
        assert_eq!(emulator.cwd, "/");
    }

    #[test]
    fn decode_cells_grid() {
        let grid = decode_cells(b"\n!c\nO.O\n\nOOOOOOOOOO\n", 9, 4);
        assert_eq!(grid, vec![0b101, 0, 0, 0, 0xFF, 0b1, 0, 0]);
    }
}
