/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! The assembler's tokenizer.
//!
//! Tokens are produced one at a time by a small state machine that consumes a
//! single character per step.  Lines and columns are counted from 1; a
//! token's position is that of its first character.

use std::fmt;
use std::str::Chars;

use MAX_TOKEN_LEN;

/// An error produced while tokenizing.
#[derive(Debug, Fail)]
#[fail(display = ":{}:{}: {}", line, col, message)]
pub struct LexError {
    /// The line where the error occurred.
    pub line: usize,
    /// The column where the error occurred.
    pub col: usize,
    /// A description of the problem.
    pub message: String,
}

/// The type of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Invalid = 0,
    Eof,
    Newline,
    Number,
    String,
    /// A part of a string literal which was too long for a single token; the
    /// following token continues it.
    StrChunk,
    Identifier,
    Label,
    Directive,
}

impl TokenType {
    /// Returns the name of this token type.
    pub fn name(&self) -> &'static str {
        match *self {
            TokenType::Invalid => "invalid",
            TokenType::Eof => "eof",
            TokenType::Newline => "newline",
            TokenType::Number => "number",
            TokenType::String => "string",
            TokenType::StrChunk => "strchunk",
            TokenType::Identifier => "identifier",
            TokenType::Label => "label",
            TokenType::Directive => "directive",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{} {}", *self as u8, self.name())
    }
}

/// A single token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The token type.
    pub kind: TokenType,
    /// The line where the token starts.
    pub line: usize,
    /// The column where the token starts.
    pub col: usize,
    /// The text of the token.
    ///
    /// Labels do not include the trailing `:`, strings do not include their
    /// quotes and have their escapes processed, and directives include the
    /// leading `.`.
    pub text: String,
}

impl Token {
    fn new(kind: TokenType, line: usize, col: usize) -> Self {
        Token {
            kind,
            line,
            col,
            text: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    None,
    Comment,
    Number,
    String,
    Escape,
    Identifier,
    Directive,
}

/// A tokenizer over assembly source.
pub struct Lexer<'a> {
    chars: Chars<'a>,
    /// A character to be read again before continuing with `chars`.
    pending: Option<char>,
    line: usize,
    col: usize,
    state: State,
}

impl<'a> Lexer<'a> {
    /// Returns a tokenizer for the given source.
    pub fn new(source: &'a str) -> Self {
        Lexer {
            chars: source.chars(),
            pending: None,
            line: 1,
            col: 0,
            state: State::None,
        }
    }

    /// Reads the next token.
    ///
    /// Once the end of the input is reached, every call returns an `Eof`
    /// token.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        use self::TokenType::*;

        let mut token = Token::new(Invalid, self.line, self.col);
        loop {
            let c = self.read();
            self.col += 1;

            let c = match c {
                Some(c) => c,
                None => match self.state {
                    State::None | State::Comment => {
                        self.state = State::None;
                        return Ok(Token::new(Eof, self.line, self.col));
                    }
                    State::Number | State::Identifier | State::Directive => {
                        self.col -= 1;
                        self.state = State::None;
                        return Ok(token);
                    }
                    State::String | State::Escape => return Err(self.error("unexpected EOF")),
                },
            };

            if c == '\n' {
                match self.state {
                    State::None | State::Comment => {
                        let newline = Token::new(Newline, self.line, self.col);
                        self.line += 1;
                        self.col = 0;
                        self.state = State::None;
                        return Ok(newline);
                    }
                    State::Number | State::Identifier | State::Directive => {
                        self.unread(c);
                        self.state = State::None;
                        return Ok(token);
                    }
                    State::String | State::Escape => return Err(self.error("unexpected EOL")),
                }
            }

            match self.state {
                State::None => {
                    if c.is_ascii_whitespace() {
                        continue;
                    }
                    token = Token::new(Invalid, self.line, self.col);
                    match c {
                        '#' => self.state = State::Comment,
                        '-' | '0'..='9' => {
                            token.kind = Number;
                            token.text.push(c);
                            self.state = State::Number;
                        }
                        '"' => {
                            token.kind = String;
                            self.state = State::String;
                        }
                        '.' => {
                            token.kind = Directive;
                            token.text.push(c);
                            self.state = State::Directive;
                        }
                        c if c.is_ascii_alphabetic() || c == '_' => {
                            token.kind = Identifier;
                            token.text.push(c);
                            self.state = State::Identifier;
                        }
                        c => return Err(self.error(format!("unexpected symbol '{}'", c))),
                    }
                }

                State::Comment => {}

                State::Number => {
                    let hex = token.text.starts_with("0x") || token.text.starts_with("0X");
                    if c == '#' {
                        self.state = State::Comment;
                        return Ok(token);
                    } else if c.is_ascii_digit() || hex && c.is_ascii_hexdigit() {
                        if token.text.len() >= MAX_TOKEN_LEN {
                            return Err(self.error(format!("invalid number '{}'", token.text)));
                        }
                        token.text.push(c);
                    } else if token.text == "0" && (c == 'x' || c == 'X' || c == 'b') {
                        token.text.push(c);
                    } else if c == '_' {
                        // Digit separator.
                    } else if c.is_ascii_whitespace() {
                        self.state = State::None;
                        return Ok(token);
                    } else {
                        return Err(self.error(format!(
                            "number '{}' invalid symbol '{}'",
                            token.text, c
                        )));
                    }
                }

                State::String => {
                    if c == '"' {
                        token.kind = String;
                        self.state = State::None;
                        return Ok(token);
                    } else if token.text.len() >= MAX_TOKEN_LEN {
                        self.unread(c);
                        token.kind = StrChunk;
                        return Ok(token);
                    } else if c == '\\' {
                        self.state = State::Escape;
                    } else {
                        token.text.push(c);
                    }
                }

                State::Escape => {
                    token.text.push(match c {
                        'b' => '\x08',
                        't' => '\t',
                        'n' => '\n',
                        'f' => '\x0C',
                        'r' => '\r',
                        c => c,
                    });
                    self.state = State::String;
                }

                State::Identifier => {
                    if c == '#' {
                        self.state = State::Comment;
                        return Ok(token);
                    } else if c == ':' {
                        token.kind = Label;
                        self.state = State::None;
                        return Ok(token);
                    } else if c.is_ascii_alphanumeric() || c == '_' {
                        if token.text.len() >= MAX_TOKEN_LEN {
                            return Err(self.error(format!("invalid identifier '{}'", token.text)));
                        }
                        token.text.push(c);
                    } else if c.is_ascii_whitespace() {
                        self.state = State::None;
                        return Ok(token);
                    } else {
                        return Err(self.error(format!(
                            "identifier '{}' invalid symbol '{}'",
                            token.text, c
                        )));
                    }
                }

                State::Directive => {
                    if c == '#' {
                        self.state = State::Comment;
                        return Ok(token);
                    } else if c.is_ascii_whitespace() {
                        self.state = State::None;
                        return Ok(token);
                    } else {
                        if token.text.len() >= MAX_TOKEN_LEN {
                            return Err(self.error(format!("invalid directive '{}'", token.text)));
                        }
                        token.text.push(c);
                    }
                }
            }
        }
    }

    fn read(&mut self) -> Option<char> {
        self.pending.take().or_else(|| self.chars.next())
    }

    fn unread(&mut self, c: char) {
        self.pending = Some(c);
        self.col -= 1;
    }

    fn error<S: Into<String>>(&self, message: S) -> LexError {
        LexError {
            line: self.line,
            col: self.col,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<(TokenType, String)> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            let eof = token.kind == TokenType::Eof;
            tokens.push((token.kind, token.text));
            if eof {
                return tokens;
            }
        }
    }

    #[test]
    fn simple_line() {
        use self::TokenType::*;

        assert_eq!(
            tokens("loop: addi t0 1_000 # count\n"),
            vec![
                (Label, "loop".to_owned()),
                (Identifier, "addi".to_owned()),
                (Identifier, "t0".to_owned()),
                (Number, "1000".to_owned()),
                (Newline, "".to_owned()),
                (Eof, "".to_owned()),
            ]
        );
    }

    #[test]
    fn numbers() {
        use self::TokenType::*;

        assert_eq!(
            tokens("-12 0x1F 0b101 7#x"),
            vec![
                (Number, "-12".to_owned()),
                (Number, "0x1F".to_owned()),
                (Number, "0b101".to_owned()),
                (Number, "7".to_owned()),
                (Eof, "".to_owned()),
            ]
        );
    }

    #[test]
    fn strings_and_directives() {
        use self::TokenType::*;

        assert_eq!(
            tokens(".data\n\"a\\tb\\\"\"\n"),
            vec![
                (Directive, ".data".to_owned()),
                (Newline, "".to_owned()),
                (String, "a\tb\"".to_owned()),
                (Newline, "".to_owned()),
                (Eof, "".to_owned()),
            ]
        );
    }

    #[test]
    fn long_string_is_chunked() {
        let text: String = ::std::iter::repeat('x').take(MAX_TOKEN_LEN + 10).collect();
        let source = format!("\"{}\"", text);
        let tokens = tokens(&source);

        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].0, TokenType::StrChunk);
        assert_eq!(tokens[0].1.len(), MAX_TOKEN_LEN);
        assert_eq!(tokens[1].0, TokenType::String);
        assert_eq!(tokens[1].1.len(), 10);
    }

    #[test]
    fn positions() {
        let mut lexer = Lexer::new("nop\n  jz end\n");
        let expected = [(1, 1), (1, 4), (2, 3), (2, 6), (2, 9)];

        for &(line, col) in expected.iter() {
            let token = lexer.next_token().unwrap();
            assert_eq!((token.line, token.col), (line, col), "token {:?}", token);
        }
    }

    #[test]
    fn errors() {
        let cases = [
            ("mov t0 $", "unexpected symbol '$'"),
            ("12a", "number '12' invalid symbol 'a'"),
            ("foo-bar", "identifier 'foo' invalid symbol '-'"),
            ("\"abc\n", "unexpected EOL"),
            ("\"abc", "unexpected EOF"),
        ];

        for &(source, message) in cases.iter() {
            let mut lexer = Lexer::new(source);
            let err = loop {
                match lexer.next_token() {
                    Ok(ref token) if token.kind == TokenType::Eof => panic!("no error for {:?}", source),
                    Ok(_) => continue,
                    Err(e) => break e,
                }
            };
            assert_eq!(err.message, message, "case {:?}", source);
        }
    }
}
