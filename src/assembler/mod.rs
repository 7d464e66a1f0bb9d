/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! The MTMC-16 assembler.
//!
//! Source text is consumed in a single pass: the tokenizer in `lex` feeds a
//! small state machine which writes code and data as soon as each statement is
//! complete.  Every address operand which names a label is recorded as a
//! forward reference and left as zero, and all of them are patched once the
//! whole source has been read, so it doesn't matter whether a label is defined
//! before or after its first use.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::mem;
use std::path::PathBuf;

use failure::{Backtrace, Error, Fail};
use num::FromPrimitive;

use instruction::{AluOp, Instruction, InstructionType, LoadOp, Opcode, Register, StackOp, TestOp};
use table::{self, Mnemonic};
use {MAX_GRAPHICS, MEM_SIZE};

pub mod lex;
pub mod parse;

use self::lex::{Lexer, Token, TokenType};

/// An error resulting from a token which doesn't fit where it appears.
#[derive(Debug, Fail)]
#[fail(display = "unexpected token")]
pub struct UnexpectedTokenError;

/// An error resulting from an unknown directive.
#[derive(Debug, Fail)]
#[fail(display = "invalid directive")]
pub struct InvalidDirectiveError;

/// An error resulting from an unknown mnemonic.
#[derive(Debug, Fail)]
#[fail(display = "invalid instruction")]
pub struct InvalidInstructionError;

/// An error resulting from an instruction with too few operands.
#[derive(Debug, Fail)]
#[fail(display = "incomplete instruction")]
pub struct IncompleteInstructionError;

/// An error resulting from an unknown system call name.
#[derive(Debug, Fail)]
#[fail(display = "invalid syscall")]
pub struct InvalidSyscallError;

/// An error resulting from a 4-bit operand which is out of range.
#[derive(Debug, Fail)]
#[fail(display = "invalid number argument")]
pub struct InvalidNumberArgumentError;

/// An error resulting from an operand which should name an ALU operation.
#[derive(Debug, Fail)]
#[fail(display = "invalid ALU operation")]
pub struct InvalidAluOpError;

/// An error resulting from an instruction which the assembler can't encode.
#[derive(Debug, Fail)]
#[fail(display = "unhandled MISC instruction")]
pub struct UnhandledInstructionError;

/// An error resulting from an address operand which is neither a label nor a
/// number inside memory.
#[derive(Debug, Fail)]
#[fail(display = "invalid address")]
pub struct InvalidAddressError;

/// An error resulting from too many `.image` imports.
#[derive(Debug, Fail)]
#[fail(display = "too many images")]
pub struct TooManyImagesError;

/// An error resulting from code which no longer fits in memory.
#[derive(Debug, Fail)]
#[fail(display = "program is too large")]
pub struct ProgramTooLargeError;

/// An error resulting from data which no longer fits in memory.
#[derive(Debug, Fail)]
#[fail(display = "data is too large")]
pub struct DataTooLargeError;

/// An error resulting from a reference to a label that was never defined.
#[derive(Debug, Fail)]
#[fail(display = "undefined label '{}'", _0)]
pub struct UndefinedLabelError(pub String);

/// An error with an associated source position.
#[derive(Debug)]
pub struct ErrorWithPosition {
    /// The line where the error occurred.
    pub line: usize,
    /// The column where the error occurred.
    pub col: usize,
    /// The type and text of the offending token, if there is one.
    pub token: Option<(TokenType, String)>,
    /// The underlying error.
    inner: Error,
}

impl fmt::Display for ErrorWithPosition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, ":{}:{}: {}", self.line, self.col, self.inner)?;
        if let Some((kind, ref text)) = self.token {
            write!(f, " [{}] \"{}\"", kind, text)?;
        }
        Ok(())
    }
}

impl Fail for ErrorWithPosition {
    fn cause(&self) -> Option<&Fail> {
        Some(self.inner.cause())
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        Some(self.inner.backtrace())
    }
}

/// Attaches the position and text of the given token to an error.
fn at<E: Into<Error>>(token: &Token, e: E) -> ErrorWithPosition {
    ErrorWithPosition {
        line: token.line,
        col: token.col,
        token: Some((token.kind, token.text.clone())),
        inner: e.into(),
    }
}

/// The output of the assembler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Object {
    /// The code segment.
    pub code: Vec<u8>,
    /// The data segment.
    pub data: Vec<u8>,
    /// The paths of the imported sprite images, in import order.
    pub graphics: Vec<PathBuf>,
}

/// Options for use with the assembler.
pub struct Options {
    /// The directory that `.image` paths are relative to.
    pub source_dir: PathBuf,
}

impl Options {
    /// Returns the default set of options.
    pub fn new() -> Self {
        Options {
            source_dir: PathBuf::from("."),
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Options::new()
    }
}

/// An interned label name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Symbol(usize);

/// Interns label names, so that labels and references can be matched by
/// identity.
#[derive(Debug, Default)]
struct SymbolTable {
    names: Vec<String>,
    index: HashMap<String, Symbol>,
}

impl SymbolTable {
    /// Returns the symbol for the given name, creating it on first use.
    fn intern(&mut self, name: &str) -> Symbol {
        if let Some(&symbol) = self.index.get(name) {
            return symbol;
        }
        let symbol = Symbol(self.names.len());
        self.names.push(name.to_owned());
        self.index.insert(name.to_owned(), symbol);
        symbol
    }

    fn name(&self, symbol: Symbol) -> &str {
        &self.names[symbol.0]
    }
}

/// The segment a label belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Code,
    Data,
}

/// A label definition.
///
/// The address is an offset into the label's segment; data labels only get
/// their final address once the size of the code segment is known.
#[derive(Debug)]
struct LabelDef {
    symbol: Symbol,
    segment: Segment,
    addr: usize,
}

/// A use of a label which will be patched at the end of assembly.
#[derive(Debug)]
struct ForwardRef {
    line: usize,
    col: usize,
    /// The code offset of the instruction to patch.
    addr: usize,
    symbol: Symbol,
}

/// The state of the assembler between tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Before any segment directive.
    None,
    /// In the data segment.
    Data,
    /// Inside a string which was split into chunks.
    DataChunk,
    /// After `.byte`, waiting for the count.
    DataBytes,
    /// After `.int`, waiting for the count.
    DataWords,
    /// After `.image`, waiting for the path.
    DataImage,
    /// In the code segment.
    Code,
    /// Collecting the operands of an instruction.
    Instruction,
}

/// An MTMC-16 assembler.
///
/// An assembler is good for a single program; `compile` and `assemble`
/// consume it.
pub struct Assembler {
    object: Object,
    state: State,
    symbols: SymbolTable,
    labels: Vec<LabelDef>,
    forward_refs: Vec<ForwardRef>,
    /// The instruction whose operands are being collected, with its token.
    instruction: Option<(&'static Mnemonic, Token)>,
    args: Vec<Token>,
    source_dir: PathBuf,
}

impl Assembler {
    /// Returns a new assembler using the default options.
    pub fn new() -> Self {
        Assembler::with_options(Options::default())
    }

    /// Returns a new assembler using the given options.
    pub fn with_options(options: Options) -> Self {
        Assembler {
            object: Object::default(),
            state: State::None,
            symbols: SymbolTable::default(),
            labels: Vec::new(),
            forward_refs: Vec::new(),
            instruction: None,
            args: Vec::new(),
            source_dir: options.source_dir,
        }
    }

    /// Assembles the program read from the given input.
    pub fn assemble<R: Read>(self, input: &mut R) -> Result<Object, Error> {
        let mut source = String::new();
        input.read_to_string(&mut source)?;
        self.compile(&source)
    }

    /// Assembles the given source text.
    pub fn compile(mut self, source: &str) -> Result<Object, Error> {
        let mut lexer = Lexer::new(source);
        loop {
            let token = lexer.next_token()?;
            let eof = token.kind == TokenType::Eof;
            self.process(token)?;
            if eof {
                break;
            }
        }
        self.patch()?;

        debug!(
            "assembled {} code bytes, {} data bytes, {} images, {} labels",
            self.object.code.len(),
            self.object.data.len(),
            self.object.graphics.len(),
            self.labels.len()
        );
        Ok(self.object)
    }

    /// Feeds a single token to the state machine.
    fn process(&mut self, token: Token) -> Result<(), Error> {
        use self::lex::TokenType::*;

        match self.state {
            State::None => match token.kind {
                Eof | Newline => {}
                Directive => match token.text.as_str() {
                    ".data" => self.state = State::Data,
                    ".text" => self.state = State::Code,
                    _ => Err(at(&token, InvalidDirectiveError))?,
                },
                Label | Identifier => {
                    self.state = State::Code;
                    return self.process(token);
                }
                _ => Err(at(&token, UnexpectedTokenError))?,
            },

            State::Data => match token.kind {
                Eof | Newline => {}
                Directive => match token.text.as_str() {
                    ".text" => self.state = State::Code,
                    ".byte" => self.state = State::DataBytes,
                    ".int" => self.state = State::DataWords,
                    ".image" => self.state = State::DataImage,
                    ".data" => Err(at(&token, UnexpectedTokenError))?,
                    _ => Err(at(&token, InvalidDirectiveError))?,
                },
                Number => {
                    let value = number(&token)?;
                    self.write_data_word(value).map_err(|e| at(&token, e))?;
                }
                String => self.write_data_string(&token, true)?,
                StrChunk => {
                    self.write_data_string(&token, false)?;
                    self.state = State::DataChunk;
                }
                Label => self.define_label(&token, Segment::Data),
                _ => Err(at(&token, UnexpectedTokenError))?,
            },

            State::DataChunk => match token.kind {
                String => {
                    self.write_data_string(&token, true)?;
                    self.state = State::Data;
                }
                StrChunk => self.write_data_string(&token, false)?,
                _ => Err(at(&token, UnexpectedTokenError))?,
            },

            State::DataBytes | State::DataWords => match token.kind {
                Number => {
                    let count = number(&token)?;
                    if count < 0 {
                        return Err(at(&token, parse::InvalidNumberError(token.text.clone())).into());
                    }
                    for _ in 0..count {
                        let written = if self.state == State::DataBytes {
                            self.write_data_byte(0)
                        } else {
                            self.write_data_word(0)
                        };
                        written.map_err(|e| at(&token, e))?;
                    }
                    self.state = State::Data;
                }
                _ => Err(at(&token, UnexpectedTokenError))?,
            },

            State::DataImage => match token.kind {
                String => {
                    let index = self.object.graphics.len();
                    if index >= MAX_GRAPHICS {
                        return Err(at(&token, TooManyImagesError).into());
                    }
                    self.write_data_word(index as i16)
                        .map_err(|e| at(&token, e))?;
                    let path = self.source_dir.join(token.text.trim_left_matches('/'));
                    self.object.graphics.push(path);
                    self.state = State::Data;
                }
                _ => Err(at(&token, UnexpectedTokenError))?,
            },

            State::Code => match token.kind {
                Eof | Newline => {}
                Label => self.define_label(&token, Segment::Code),
                Identifier => match table::lookup(&token.text) {
                    Some(mnemonic) => {
                        self.instruction = Some((mnemonic, token));
                        self.args.clear();
                        self.state = State::Instruction;
                    }
                    None => Err(at(&token, InvalidInstructionError))?,
                },
                Directive => match token.text.as_str() {
                    ".data" => self.state = State::Data,
                    ".text" => {}
                    _ => Err(at(&token, InvalidDirectiveError))?,
                },
                _ => Err(at(&token, UnexpectedTokenError))?,
            },

            State::Instruction => match token.kind {
                Eof | Newline => {
                    self.emit()?;
                    self.state = State::Code;
                }
                Number | Identifier => {
                    let max_arity = self.instruction.as_ref().map_or(0, |&(m, _)| m.max_arity);
                    if self.args.len() >= max_arity {
                        return Err(at(&token, UnexpectedTokenError).into());
                    }
                    self.args.push(token);
                }
                _ => Err(at(&token, UnexpectedTokenError))?,
            },
        }

        Ok(())
    }

    /// Records a label at the current offset of the given segment.
    fn define_label(&mut self, token: &Token, segment: Segment) {
        let symbol = self.symbols.intern(&token.text);
        if self.labels.iter().any(|l| l.symbol == symbol) {
            warn!(
                ":{}:{}: label '{}' is already defined; the first definition is used",
                token.line, token.col, token.text
            );
        }
        let addr = match segment {
            Segment::Code => self.object.code.len(),
            Segment::Data => self.object.data.len(),
        };
        self.labels.push(LabelDef {
            symbol,
            segment,
            addr,
        });
    }

    /// Encodes the pending instruction and writes it to the code segment.
    fn emit(&mut self) -> Result<(), Error> {
        let (mnemonic, token) = match self.instruction.take() {
            Some(instruction) => instruction,
            None => return Ok(()),
        };
        let args = mem::replace(&mut self.args, Vec::new());
        if args.len() < mnemonic.arity {
            return Err(at(&token, IncompleteInstructionError).into());
        }

        let (ins, word) = self.encode(mnemonic, &token, &args)?;
        self.write_code_word(Opcode::from(ins).0)
            .map_err(|e| at(&token, e))?;
        if mnemonic.double_word {
            self.write_code_word(word as u16)
                .map_err(|e| at(&token, e))?;
        }

        Ok(())
    }

    /// Encodes an instruction from its mnemonic and operands.
    ///
    /// Returns the instruction along with its data word (which is only
    /// meaningful for double-word instructions).
    fn encode(
        &mut self,
        mnemonic: &Mnemonic,
        token: &Token,
        args: &[Token],
    ) -> Result<(Instruction, i16), ErrorWithPosition> {
        use instruction::Instruction::*;
        use instruction::InstructionType as T;

        let mut word = 0;
        let ins = match mnemonic.kind {
            T::Misc => match mnemonic.code {
                0x0 => Sys(syscall(&args[0])?),
                0x1 => Mov(register(&args[0])?, register(&args[1])?),
                0x2 => Inc(register(&args[0])?, optional_count(args.get(1))?),
                0x3 => Dec(register(&args[0])?, optional_count(args.get(1))?),
                0x4 => Seti(register(&args[0])?, small_number(&args[1])?),
                0xF => Nop,
                _ => return Err(at(token, UnhandledInstructionError)),
            },

            T::Alu if mnemonic.code == 0xF => {
                let (op, target, value) = if mnemonic.arity == 2 {
                    // `addi` and friends name their operation.
                    let name = &mnemonic.name[..mnemonic.name.len() - 1];
                    let op = match alu_op_named(name) {
                        Some(op) => op,
                        None => unreachable!("immediate mnemonic without an ALU operation"),
                    };
                    (op, &args[0], &args[1])
                } else {
                    (alu_op(&args[0])?, &args[1], &args[2])
                };
                word = number(value)?;
                AluImm(op, register(target)?)
            }
            T::Alu => {
                let op = match AluOp::from_u8(mnemonic.code) {
                    Some(op) => op,
                    None => unreachable!("ALU mnemonic with an invalid operation"),
                };
                if mnemonic.arity == 2 {
                    Alu(op, register(&args[0])?, register(&args[1])?)
                } else {
                    Alu(op, register(&args[0])?, Register::T0)
                }
            }

            T::Stack => match StackOp::from_code(mnemonic.code) {
                Some(StackOp::Push) => Push(register(&args[0])?, stack_register(args, 1)?),
                Some(StackOp::Pop) => Pop(register(&args[0])?, stack_register(args, 1)?),
                Some(StackOp::Dup) => Dup(stack_register(args, 0)?),
                Some(StackOp::Swap) => Swap(stack_register(args, 0)?),
                Some(StackOp::Drop) => Drop(stack_register(args, 0)?),
                Some(StackOp::Over) => Over(stack_register(args, 0)?),
                Some(StackOp::Rot) => Rot(stack_register(args, 0)?),
                Some(StackOp::Sop) => Sop(alu_op(&args[0])?, stack_register(args, 1)?),
                Some(StackOp::Pushi) => {
                    word = number(&args[0])?;
                    Pushi(stack_register(args, 1)?)
                }
                None => unreachable!("stack mnemonic with an invalid operation"),
            },

            T::Test => {
                let op = match TestOp::from_u8(mnemonic.code & 0x7) {
                    Some(op) => op,
                    None => unreachable!("test mnemonic with an invalid comparison"),
                };
                if mnemonic.code & 0x8 == 0 {
                    Test(op, register(&args[0])?, register(&args[1])?)
                } else {
                    TestImm(op, register(&args[0])?, small_number(&args[1])?)
                }
            }

            T::Lwr => Lwr(register(&args[0])?, register(&args[1])?, register(&args[2])?),
            T::Lbr => Lbr(register(&args[0])?, register(&args[1])?, register(&args[2])?),
            T::Swr => Swr(register(&args[0])?, register(&args[1])?, register(&args[2])?),
            T::Sbr => Sbr(register(&args[0])?, register(&args[1])?, register(&args[2])?),

            T::Load => {
                let op = match LoadOp::from_code(mnemonic.code) {
                    Some(op) => op,
                    None => unreachable!("load mnemonic with an invalid operation"),
                };
                let target = register(&args[0])?;
                if op.has_offset() {
                    // The offset register may come before or after the address.
                    let (offset, address) = match args[2].text.parse::<Register>() {
                        Ok(offset) => (offset, &args[1]),
                        Err(_) => (register(&args[1])?, &args[2]),
                    };
                    word = self.resolve_address(address)? as i16;
                    Load(op, target, offset)
                } else {
                    word = match op {
                        LoadOp::Li => match parse::number(&args[1].text) {
                            Ok(value) => value,
                            Err(_) => self.resolve_address(&args[1])? as i16,
                        },
                        _ => self.resolve_address(&args[1])? as i16,
                    };
                    Load(op, target, Register::T0)
                }
            }

            T::JumpReg => Jr(if mnemonic.arity > 0 {
                register(&args[0])?
            } else {
                Register::RA
            }),

            T::Jump | T::JumpZ | T::JumpNz | T::JumpAl => {
                let target = self.resolve_address(&args[0])?;
                match mnemonic.kind {
                    T::Jump => Jump(target),
                    T::JumpZ => Jz(target),
                    T::JumpNz => Jnz(target),
                    _ => Jal(target),
                }
            }
        };

        Ok((ins, word))
    }

    /// Resolves an address operand.
    ///
    /// Numbers are used as-is; labels are always recorded as forward
    /// references against the instruction about to be written, and resolve to
    /// zero until they are patched.
    fn resolve_address(&mut self, token: &Token) -> Result<u16, ErrorWithPosition> {
        match token.kind {
            TokenType::Number => {
                let value = number(token)?;
                if value < 0 || value as usize >= MEM_SIZE {
                    Err(at(token, InvalidAddressError))
                } else {
                    Ok(value as u16)
                }
            }
            TokenType::Identifier => {
                let symbol = self.symbols.intern(&token.text);
                self.forward_refs.push(ForwardRef {
                    line: token.line,
                    col: token.col,
                    addr: self.object.code.len(),
                    symbol,
                });
                Ok(0)
            }
            _ => Err(at(token, InvalidAddressError)),
        }
    }

    /// Patches every forward reference with the address of its label.
    fn patch(&mut self) -> Result<(), Error> {
        let code_size = self.object.code.len();
        for r in &self.forward_refs {
            let label = match self.labels.iter().find(|l| l.symbol == r.symbol) {
                Some(label) => label,
                None => Err(ErrorWithPosition {
                    line: r.line,
                    col: r.col,
                    token: None,
                    inner: UndefinedLabelError(self.symbols.name(r.symbol).to_owned()).into(),
                })?,
            };
            let addr = match label.segment {
                Segment::Code => label.addr,
                Segment::Data => label.addr + code_size,
            };

            let code = &mut self.object.code;
            let opcode = Opcode::from_bytes(code[r.addr], code[r.addr + 1]);
            match opcode.kind() {
                Some(InstructionType::Load) => {
                    code[r.addr + 2] = (addr >> 8) as u8;
                    code[r.addr + 3] = addr as u8;
                }
                Some(InstructionType::Jump)
                | Some(InstructionType::JumpZ)
                | Some(InstructionType::JumpNz)
                | Some(InstructionType::JumpAl) => {
                    // A label just past the end of a full image has no
                    // 12-bit target.
                    if addr >= MEM_SIZE {
                        Err(ErrorWithPosition {
                            line: r.line,
                            col: r.col,
                            token: None,
                            inner: InvalidAddressError.into(),
                        })?;
                    }
                    let (high, low) = Opcode(opcode.0 & 0xF000 | addr as u16 & 0x0FFF).bytes();
                    code[r.addr] = high;
                    code[r.addr + 1] = low;
                }
                _ => unreachable!("forward reference from {} which takes no address", opcode),
            }
        }

        Ok(())
    }

    fn write_code_word(&mut self, value: u16) -> Result<(), ProgramTooLargeError> {
        if self.object.code.len() + self.object.data.len() + 2 > MEM_SIZE {
            return Err(ProgramTooLargeError);
        }
        self.object.code.push((value >> 8) as u8);
        self.object.code.push(value as u8);
        Ok(())
    }

    fn write_data_byte(&mut self, value: u8) -> Result<(), DataTooLargeError> {
        if self.object.code.len() + self.object.data.len() + 1 > MEM_SIZE {
            return Err(DataTooLargeError);
        }
        self.object.data.push(value);
        Ok(())
    }

    fn write_data_word(&mut self, value: i16) -> Result<(), DataTooLargeError> {
        self.write_data_byte((value as u16 >> 8) as u8)?;
        self.write_data_byte(value as u8)
    }

    /// Writes the text of a string token, NUL-terminated unless it is a chunk
    /// of a longer string.
    fn write_data_string(&mut self, token: &Token, terminate: bool) -> Result<(), Error> {
        for &b in token.text.as_bytes() {
            self.write_data_byte(b).map_err(|e| at(token, e))?;
        }
        if terminate {
            self.write_data_byte(0).map_err(|e| at(token, e))?;
        }
        Ok(())
    }
}

fn number(token: &Token) -> Result<i16, ErrorWithPosition> {
    parse::number(&token.text).map_err(|e| at(token, e))
}

fn register(token: &Token) -> Result<Register, ErrorWithPosition> {
    token.text.parse().map_err(|e| at(token, e))
}

/// Parses the optional stack register operand at the given position, which
/// defaults to `SP`.
fn stack_register(args: &[Token], n: usize) -> Result<Register, ErrorWithPosition> {
    args.get(n).map_or(Ok(Register::SP), register)
}

/// Parses a 4-bit operand.
fn small_number(token: &Token) -> Result<u8, ErrorWithPosition> {
    match number(token)? {
        n @ 0..=15 => Ok(n as u8),
        _ => Err(at(token, InvalidNumberArgumentError)),
    }
}

/// Parses the optional count of `inc` and `dec`, which defaults to 1.
fn optional_count(token: Option<&Token>) -> Result<u8, ErrorWithPosition> {
    token.map_or(Ok(1), small_number)
}

/// Parses a system call operand, which is either a name or a selector.
fn syscall(token: &Token) -> Result<u8, ErrorWithPosition> {
    let code = match token.kind {
        TokenType::Identifier => table::syscall_code(&token.text),
        _ => match parse::number(&token.text) {
            Ok(n @ 0..=255) => Some(n as u8),
            _ => None,
        },
    };
    code.ok_or_else(|| at(token, InvalidSyscallError))
}

/// Returns the ALU operation performed by the given (non-immediate)
/// mnemonic.
fn alu_op_named(name: &str) -> Option<AluOp> {
    match table::lookup(name) {
        Some(m) if m.kind == InstructionType::Alu => AluOp::from_u8(m.code),
        _ => None,
    }
}

/// Parses an operand naming an ALU operation.
fn alu_op(token: &Token) -> Result<AluOp, ErrorWithPosition> {
    alu_op_named(&token.text).ok_or_else(|| at(token, InvalidAluOpError))
}
