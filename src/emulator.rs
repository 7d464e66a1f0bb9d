/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! The MTMC-16 emulator.
//!
//! The main focus of this module is the `Emulator` struct, which owns the
//! memory and register file of a single machine along with the `Platform`
//! it talks to.  A machine is loaded from an `Executable`, after which it can
//! be stepped one instruction at a time or run at a configured speed until a
//! program exits or faults.
//!
//! Runtime faults (bad memory accesses, division by zero and the like) are
//! not Rust errors: they are logged and leave the machine in the
//! `PermanentError` state.  The errors returned from this module are for
//! instructions the emulator cannot execute at all and for failures of the
//! host platform.

use std::cmp;
use std::default::Default;
use std::fmt;
use std::path::PathBuf;

use failure::Error;
use rand::{self, Rng, SeedableRng, StdRng};

use display;
use executable::Executable;
use input;
use instruction::{AluOp, Instruction, LoadOp, Opcode, Register, REGISTER_COUNT};
use platform::{Disk, Platform};
use sprite::Sprite;
use timer::Timer;
use util;
use {DEFAULT_SPEED, MEM_SIZE};

/// The bit of `FLAGS` set when the last result was nonzero.
pub const FLAG_TEST: i16 = 0b01;
/// The bit of `FLAGS` set when the last result did not fit in a word.
pub const FLAG_OVERFLOW: i16 = 0b10;

/// An error resulting from an instruction that is defined but has no
/// implementation.
#[derive(Debug, Fail)]
#[fail(display = "unsupported instruction: {}", _0)]
pub struct UnsupportedInstructionError(pub Instruction);

/// The execution state of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Loaded, but not yet started.
    Ready,
    /// Running.
    Executing,
    /// Stopped normally.
    Finished,
    /// Stopped by a runtime fault.
    PermanentError,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            Status::Ready => "READY",
            Status::Executing => "EXECUTING",
            Status::Finished => "FINISHED",
            Status::PermanentError => "PERMANENT_ERROR",
        };
        write!(f, "{}", name)
    }
}

/// Options for the emulator.
#[derive(Debug, Clone)]
pub struct Options {
    /// The number of instructions to execute per second (default
    /// `DEFAULT_SPEED`); 0 selects the default.
    pub speed: u32,
    /// The trace level (default 0).  At level 1 and above, the loaded memory
    /// and every executed instruction are printed to standard error.
    pub trace: u32,
    /// The host directory that file system calls are confined to (default
    /// `./disk`).
    pub disk: PathBuf,
    /// The seed of the random number generator (default random).
    pub seed: Option<u64>,
    /// Whether to sleep between pulses to keep to the configured speed
    /// (default `true`).
    pub throttle: bool,
}

impl Options {
    /// Returns the default set of options.
    pub fn new() -> Self {
        Options {
            speed: DEFAULT_SPEED,
            trace: 0,
            disk: PathBuf::from("./disk"),
            seed: None,
            throttle: true,
        }
    }

    /// Returns a set of options useful for testing (no throttling and a fixed
    /// seed).
    pub fn testing() -> Self {
        Options {
            seed: Some(0),
            throttle: false,
            ..Options::new()
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Options::new()
    }
}

/// An MTMC-16 machine.
pub struct Emulator<P> {
    /// The main memory.
    mem: [u8; MEM_SIZE],
    /// The register file, indexed by `Register`.
    regs: [i16; REGISTER_COUNT],
    /// The execution state.
    pub(crate) status: Status,
    /// The frame buffer.
    pub(crate) display: display::Buffer,
    /// The joystick state.
    pub(crate) input: input::State,
    /// The countdown behind the `timer` system call.
    pub(crate) timer: Timer,
    /// The generator behind the `rnd` system call.
    pub(crate) rng: StdRng,
    /// The colour used by the frame buffer system calls.
    pub(crate) color: u8,
    /// The current directory, as seen by the program.
    pub(crate) cwd: String,
    /// The file system sandbox.
    pub(crate) disk: Disk,
    /// The sprites of the loaded executable.
    pub(crate) graphics: Vec<Sprite>,
    /// The host platform.
    pub(crate) platform: P,

    /// The configured speed, in instructions per second.
    speed: u32,
    /// The trace level.
    trace: u32,
    /// Whether to sleep between pulses.
    throttle: bool,
}

impl<P: Platform> Emulator<P> {
    /// Returns a new emulator on the given platform with the default
    /// options.
    pub fn new(platform: P) -> Self {
        Emulator::with_options(platform, Options::default())
    }

    /// Returns a new emulator on the given platform using the given options.
    pub fn with_options(platform: P, options: Options) -> Self {
        let seed = match options.seed {
            Some(seed) => seed,
            None => rand::thread_rng().gen(),
        };

        let mut emulator = Emulator {
            mem: [0; MEM_SIZE],
            regs: [0; REGISTER_COUNT],
            status: Status::Ready,
            display: display::Buffer::new(),
            input: input::State::new(),
            timer: Timer::new(),
            rng: StdRng::from_seed(&[seed as usize, (seed >> 32) as usize][..]),
            color: 0,
            cwd: "/".to_owned(),
            disk: Disk::new(options.disk),
            graphics: Vec::new(),
            platform,

            speed: if options.speed == 0 {
                DEFAULT_SPEED
            } else {
                options.speed
            },
            trace: options.trace,
            throttle: options.throttle,
        };
        emulator.regs[Register::SP as usize] = MEM_SIZE as i16;
        emulator
    }

    /// Loads an executable, resetting the memory and registers.
    ///
    /// Code and data are each truncated to whatever fits in memory.
    pub fn load(&mut self, exe: &Executable) {
        self.mem = [0; MEM_SIZE];
        self.regs = [0; REGISTER_COUNT];
        self.set_register(Register::SP, MEM_SIZE as i16);

        let boundary = cmp::min(exe.code.len(), MEM_SIZE);
        self.mem[..boundary].copy_from_slice(&exe.code[..boundary]);
        let data_size = cmp::min(exe.data.len(), MEM_SIZE - boundary);
        let total = boundary + data_size;
        self.mem[boundary..total].copy_from_slice(&exe.data[..data_size]);

        self.set_register(Register::CB, boundary as i16 - 1);
        self.set_register(Register::DB, total as i16 - 1);
        self.set_register(Register::BP, total as i16);
        self.graphics = exe.graphics.clone();
        self.fetch();
        self.status = Status::Ready;

        debug!(
            "loaded {} code bytes and {} data bytes",
            boundary, data_size
        );
        if self.trace > 0 {
            eprintln!("memory:");
            eprint!("{}", util::hexdump(&self.mem[..total]));
        }
    }

    /// Passes a command-line argument to the program.
    ///
    /// The argument is stored as a NUL-terminated string at `BP`, which is
    /// advanced past it, and its address is put in `A0`.  Empty arguments and
    /// arguments that don't fit in memory are ignored.
    pub fn set_arg(&mut self, arg: &str) {
        let bp = self.register(Register::BP) as i32;
        let n = arg.len() as i32;
        if n == 0 || bp < 0 || bp + n + 1 > MEM_SIZE as i32 {
            if n > 0 {
                warn!("argument of {} bytes does not fit in memory", n);
            }
            return;
        }

        let start = bp as usize;
        self.mem[start..start + arg.len()].copy_from_slice(arg.as_bytes());
        self.mem[start + arg.len()] = 0;
        self.set_register(Register::A0, bp as i16);
        self.set_register(Register::BP, (bp + n + 1) as i16);
    }

    /// Returns the execution state.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Returns the value of the given register.
    pub fn register(&self, reg: Register) -> i16 {
        self.regs[reg as usize]
    }

    /// Sets the value of the given register.
    pub fn set_register(&mut self, reg: Register, val: i16) {
        self.regs[reg as usize] = val;
    }

    /// Returns a reference to the memory.
    pub fn mem(&self) -> &[u8; MEM_SIZE] {
        &self.mem
    }

    /// Returns a reference to the frame buffer.
    pub fn display(&self) -> &display::Buffer {
        &self.display
    }

    /// Returns a mutable reference to the joystick state.
    pub fn input_mut(&mut self) -> &mut input::State {
        &mut self.input
    }

    /// Returns a reference to the platform.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Returns a mutable reference to the platform.
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Consumes the emulator, returning its platform.
    pub fn into_platform(self) -> P {
        self.platform
    }

    /// Reads a byte from memory.
    ///
    /// An address outside memory is a runtime fault, and reads as 0.
    pub fn read_byte(&mut self, addr: i32) -> u8 {
        match checked(addr) {
            Some(i) => self.mem[i],
            None => {
                self.fault(format!(
                    "bad memory address on read: {} ({:#06x})",
                    addr, addr as u16
                ));
                0
            }
        }
    }

    /// Reads a big-endian word from memory.
    pub fn read_word(&mut self, addr: i32) -> i16 {
        let high = self.read_byte(addr);
        let low = self.read_byte(addr + 1);
        ((high as u16) << 8 | low as u16) as i16
    }

    /// Writes a byte to memory.
    ///
    /// An address outside memory is a runtime fault, and the write is
    /// dropped.
    pub fn write_byte(&mut self, addr: i32, val: u8) {
        match checked(addr) {
            Some(i) => self.mem[i] = val,
            None => self.fault(format!(
                "bad memory address on write: {} ({:#06x})",
                addr, addr as u16
            )),
        }
    }

    /// Writes a big-endian word to memory.
    pub fn write_word(&mut self, addr: i32, val: i16) {
        self.write_byte(addr, (val >> 8) as u8);
        self.write_byte(addr + 1, val as u8);
    }

    /// Reads a NUL-terminated string from memory, without the terminator.
    ///
    /// A string running off the end of memory is a runtime fault.
    pub fn read_string(&mut self, addr: i32) -> Vec<u8> {
        let mut s = Vec::new();
        let mut i = addr;
        loop {
            if checked(i).is_none() {
                self.read_byte(i);
                return s;
            }
            match self.read_byte(i) {
                0 => return s,
                b => s.push(b),
            }
            i += 1;
        }
    }

    /// Returns the instruction in `IR`.
    pub fn current_instruction(&self) -> Result<Instruction, Error> {
        Instruction::from_opcode(self.current_opcode())
    }

    /// Returns the opcode in `IR`.
    pub fn current_opcode(&self) -> Opcode {
        Opcode(self.register(Register::IR) as u16)
    }

    /// Puts the machine in the running state without executing anything.
    pub fn start(&mut self) {
        self.status = Status::Executing;
    }

    /// Performs a single execution step: fetches the instruction at `PC`,
    /// advances `PC` past it and executes it.
    pub fn step(&mut self) -> Result<(), Error> {
        self.fetch();
        if self.status == Status::PermanentError {
            return Ok(());
        }

        let pc = self.register(Register::PC);
        let opcode = self.current_opcode();
        if self.trace > 0 {
            eprintln!("{:04X}: {:04x}", pc as u16, opcode.0);
        }
        let size = if opcode.is_double_word() { 4 } else { 2 };
        self.set_register(Register::PC, pc.wrapping_add(size));

        let ins = Instruction::from_opcode(opcode)?;
        self.execute(ins)
    }

    /// Executes up to `n` steps, stopping early if the machine stops.
    ///
    /// Returns the number of steps executed.
    pub fn pulse(&mut self, n: usize) -> Result<usize, Error> {
        let mut count = 0;
        while count < n && self.status == Status::Executing {
            self.step()?;
            count += 1;
        }
        Ok(count)
    }

    /// Runs the machine until it stops or the platform is closed.
    ///
    /// Instructions are executed in pulses, with a short sleep after each
    /// pulse so that the machine runs at roughly the configured speed.
    pub fn run(&mut self) -> Result<(), Error> {
        let window = if self.speed > 1000 {
            1
        } else {
            1000 / self.speed
        };
        let pulse = cmp::max(self.speed as u64 * window as u64 / 1000, 1) as usize;
        debug!("running with pulses of {} every {} ms", pulse, window);

        self.start();
        if self.trace > 0 {
            eprintln!("executing:");
        }
        while self.status == Status::Executing {
            self.pulse(pulse)?;
            if self.throttle {
                self.platform.sleep(window);
            }
            if self.platform.closed() {
                self.status = Status::Finished;
            }
        }
        if self.trace > 0 {
            eprintln!("stopped");
        }
        debug!("stopped with status {}", self.status);

        Ok(())
    }

    /// Executes the given instruction in the current machine context.
    ///
    /// The machine will behave as if the given instruction had just been
    /// fetched, with `DR` holding its data word.
    pub fn execute(&mut self, ins: Instruction) -> Result<(), Error> {
        use self::Instruction::*;
        use instruction::Register::*;

        match ins {
            Sys(n) => self.syscall(n)?,
            Mov(dst, src) => {
                let val = self.register(src);
                self.set_register(dst, val);
            }
            Inc(reg, n) => {
                let val = self.register(reg) as i32 + n as i32;
                self.set_checked(reg, val);
            }
            Dec(reg, n) => {
                let val = self.register(reg) as i32 - n as i32;
                self.set_checked(reg, val);
            }
            Seti(reg, n) => self.set_register(reg, n as i16),
            Mcp(..) | Debug(_) => Err(UnsupportedInstructionError(ins))?,
            Nop => {}

            Alu(op, target, source) => {
                let source = if op.is_unary() { target } else { source };
                let val = self.register(source);
                self.alu(op, target, val);
            }
            AluImm(op, target) => {
                let val = self.register(DR);
                self.alu(op, target, val);
            }

            Push(reg, stack) => {
                let val = self.register(reg);
                self.push(stack, val);
            }
            Pop(reg, stack) => {
                let addr = self.register(stack) as i32;
                let val = self.read_word(addr);
                // The stack register is written last, so popping into it
                // still leaves it just past the popped word.
                self.set_register(reg, val);
                self.set_register(stack, (addr + 2) as i16);
            }
            Dup(stack) => {
                let addr = self.register(stack) as i32;
                let val = self.read_word(addr);
                self.push(stack, val);
            }
            Swap(stack) => {
                let addr = self.register(stack) as i32;
                let (v1, v2) = (self.read_word(addr), self.read_word(addr + 2));
                self.write_word(addr, v2);
                self.write_word(addr + 2, v1);
            }
            Drop(stack) => {
                let addr = self.register(stack);
                self.set_register(stack, addr.wrapping_add(2));
            }
            Over(stack) => {
                let addr = self.register(stack) as i32;
                let val = self.read_word(addr + 2);
                self.push(stack, val);
            }
            Rot(stack) => {
                let addr = self.register(stack) as i32;
                let v1 = self.read_word(addr);
                let v2 = self.read_word(addr + 2);
                let v3 = self.read_word(addr + 4);
                self.write_word(addr, v3);
                self.write_word(addr + 2, v1);
                self.write_word(addr + 4, v2);
            }
            Sop(op, stack) => {
                let addr = self.register(stack) as i32;
                if op.is_unary() {
                    let val = self.read_word(addr) as i32;
                    if let Some(result) = self.apply(op, val, val) {
                        self.write_word(addr, result as i16);
                        self.set_flags(result);
                    }
                } else {
                    let source = self.read_word(addr) as i32;
                    let target = self.read_word(addr + 2) as i32;
                    self.set_register(stack, (addr + 2) as i16);
                    if let Some(result) = self.apply(op, target, source) {
                        self.write_word(addr + 2, result as i16);
                        self.set_flags(result);
                    }
                }
            }
            Pushi(stack) => {
                let val = self.register(DR);
                self.push(stack, val);
            }

            Test(op, a, b) => {
                let (a, b) = (self.register(a), self.register(b));
                self.set_test_flag(op.test(a, b));
            }
            TestImm(op, a, n) => {
                let a = self.register(a);
                self.set_test_flag(op.test(a, n as i16));
            }

            Lwr(reg, base, offset) => {
                let addr = self.indexed(base, offset);
                let val = self.read_word(addr);
                self.set_register(reg, val);
            }
            Lbr(reg, base, offset) => {
                let addr = self.indexed(base, offset);
                let val = self.read_byte(addr);
                self.set_register(reg, val as i16);
            }
            Swr(reg, base, offset) => {
                let addr = self.indexed(base, offset);
                let val = self.register(reg);
                self.write_word(addr, val);
            }
            Sbr(reg, base, offset) => {
                let addr = self.indexed(base, offset);
                let val = self.register(reg);
                self.write_byte(addr, val as u8);
            }

            Load(op, reg, offset) => {
                let mut addr = self.register(DR) as i32;
                if op.has_offset() {
                    addr += self.register(offset) as i32;
                }
                match op {
                    LoadOp::Lw | LoadOp::Lwo => {
                        let val = self.read_word(addr);
                        self.set_register(reg, val);
                    }
                    LoadOp::Lb | LoadOp::Lbo => {
                        let val = self.read_byte(addr);
                        self.set_register(reg, val as i16);
                    }
                    LoadOp::Sw | LoadOp::Swo => {
                        let val = self.register(reg);
                        self.write_word(addr, val);
                    }
                    LoadOp::Sb | LoadOp::Sbo => {
                        let val = self.register(reg);
                        self.write_byte(addr, val as u8);
                    }
                    LoadOp::Li => self.set_register(reg, addr as i16),
                }
            }

            Jr(reg) => {
                let addr = self.register(reg);
                self.set_register(PC, addr);
            }
            Jump(addr) => self.set_register(PC, addr as i16),
            Jz(addr) => if self.register(FLAGS) & FLAG_TEST == 0 {
                self.set_register(PC, addr as i16)
            },
            Jnz(addr) => if self.register(FLAGS) & FLAG_TEST != 0 {
                self.set_register(PC, addr as i16)
            },
            Jal(addr) => {
                let ret = self.register(PC);
                self.set_register(RA, ret);
                self.set_register(PC, addr as i16);
            }
        }

        Ok(())
    }

    /// Logs a runtime fault and stops the machine.
    pub(crate) fn fault<S: AsRef<str>>(&mut self, message: S) {
        error!("{}", message.as_ref());
        self.status = Status::PermanentError;
    }

    /// Loads `IR` and `DR` from the instruction at `PC`.
    fn fetch(&mut self) {
        let pc = self.register(Register::PC) as i32;
        let ir = self.read_word(pc);
        self.set_register(Register::IR, ir);
        let dr = if Opcode(ir as u16).is_double_word() {
            self.read_word(pc + 2)
        } else {
            0
        };
        self.set_register(Register::DR, dr);
    }

    /// Pushes a value onto the stack addressed by the given register.
    fn push(&mut self, stack: Register, val: i16) {
        let addr = self.register(stack).wrapping_sub(2);
        self.set_register(stack, addr);
        self.write_word(addr as i32, val);
    }

    /// Returns the address `base + offset` for the register-addressed loads
    /// and stores.
    fn indexed(&self, base: Register, offset: Register) -> i32 {
        self.register(base) as i32 + self.register(offset) as i32
    }

    /// Applies an ALU operation, faulting on division by zero.
    fn apply(&mut self, op: AluOp, target: i32, source: i32) -> Option<i32> {
        let result = op.apply(target, source);
        if result.is_none() {
            self.fault(format!("division by zero in {}", op));
        }
        result
    }

    /// Applies an ALU operation to a register.
    fn alu(&mut self, op: AluOp, target: Register, source: i16) {
        let val = self.register(target) as i32;
        if let Some(result) = self.apply(op, val, source as i32) {
            self.set_checked(target, result);
        }
    }

    /// Sets a register to a result, updating the flags.
    fn set_checked(&mut self, reg: Register, val: i32) {
        self.set_register(reg, val as i16);
        self.set_flags(val);
    }

    /// Sets the flags according to a full-precision result.
    fn set_flags(&mut self, val: i32) {
        let word = val as i16;
        let mut flags = 0;
        if word != 0 {
            flags |= FLAG_TEST;
        }
        if word as i32 != val {
            flags |= FLAG_OVERFLOW;
        }
        self.set_register(Register::FLAGS, flags);
    }

    fn set_test_flag(&mut self, set: bool) {
        let flags = self.register(Register::FLAGS);
        let flags = if set {
            flags | FLAG_TEST
        } else {
            flags & !FLAG_TEST
        };
        self.set_register(Register::FLAGS, flags);
    }
}

fn checked(addr: i32) -> Option<usize> {
    if addr >= 0 && (addr as usize) < MEM_SIZE {
        Some(addr as usize)
    } else {
        None
    }
}
