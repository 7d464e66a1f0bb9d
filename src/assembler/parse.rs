/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! Parsing functions for number literals.

use combine::{eof, many1, optional, satisfy, token, try};
use combine::{Parser, Stream};

use util;

/// An error resulting from a malformed or out-of-range number.
#[derive(Debug, Fail)]
#[fail(display = "invalid number")]
pub struct InvalidNumberError(pub String);

/// A number literal, before its range is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literal {
    /// A signed decimal literal.
    Decimal(i64),
    /// An unsigned hexadecimal literal (`0x...`).
    Hex(i64),
    /// An unsigned binary literal (`0b...`).
    Binary(i64),
}

/// Returns the value of the given digits in the given radix, saturating well
/// beyond any 16-bit value.
fn fold_digits(s: &str, radix: u32) -> i64 {
    s.chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0, |x, d| (x * radix as i64 + d as i64).min(1 << 32))
}

/// Parses a number literal, which must make up the entire input.
parser!{
    pub fn literal[I]()(I) -> Literal
    where [I: Stream<Item = char>]
    {
        let hex = try(token('0').and(satisfy(|c| c == 'x' || c == 'X')))
            .with(many1(satisfy(|c: char| c.is_digit(16))))
            .map(|s: String| Literal::Hex(fold_digits(&s, 16)));
        let binary = try(token('0').and(token('b')))
            .with(many1(satisfy(|c| c == '0' || c == '1')))
            .map(|s: String| Literal::Binary(fold_digits(&s, 2)));
        let decimal = optional(token('-'))
            .and(many1(satisfy(|c: char| c.is_digit(10))))
            .map(|(sign, s): (Option<char>, String)| {
                let x = fold_digits(&s, 10);
                Literal::Decimal(if sign.is_some() { -x } else { x })
            });

        hex.or(binary).or(decimal).skip(eof()).expected("number")
    }
}

/// Parses a 16-bit number.
///
/// Decimal literals must lie in the signed range; hexadecimal and binary ones
/// in the unsigned range, and are reinterpreted as signed.
pub fn number(text: &str) -> Result<i16, InvalidNumberError> {
    let literal = match literal().parse(text) {
        Ok((literal, _)) => literal,
        Err(e) => {
            debug!("number '{}': {}", text, util::describe_parse_error(&e));
            return Err(InvalidNumberError(text.to_owned()));
        }
    };

    match literal {
        Literal::Decimal(x) if x >= -32768 && x <= 32767 => Ok(x as i16),
        Literal::Hex(x) | Literal::Binary(x) if x <= 0xFFFF => Ok(x as u16 as i16),
        _ => Err(InvalidNumberError(text.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_numbers() {
        let cases = [
            ("0", 0),
            ("7", 7),
            ("010", 10),
            ("-1", -1),
            ("32767", 32767),
            ("-32768", -32768),
            ("0x10", 16),
            ("0XfF", 255),
            ("0xFFFF", -1),
            ("0b101", 5),
            ("0b1111111111111111", -1),
        ];

        for &(text, value) in cases.iter() {
            assert_eq!(number(text).unwrap(), value, "case {:?}", text);
        }
    }

    #[test]
    fn literal_errors() {
        let e = literal().parse("abc").unwrap_err();
        let text = util::describe_parse_error(&e);
        assert!(text.starts_with("unexpected 'a'"), "{}", text);
        assert!(text.contains("expected number"), "{}", text);
    }

    #[test]
    fn invalid_numbers() {
        let cases = [
            "", "-", "0x", "0b", "0b102", "32768", "-32769", "0x10000", "-0x10", "1x", "12 ",
        ];

        for &text in cases.iter() {
            assert!(number(text).is_err(), "case {:?}", text);
        }
    }
}
