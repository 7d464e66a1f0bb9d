/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! Various utility functions.

use std::fmt::{Display, Write};

use combine::{ParseError, Stream};

/// Describes why a number literal failed to parse, e.g.
/// `unexpected 'z', expected number or digit`.
///
/// Everything the parser expected is gathered into a single clause.
pub fn describe_parse_error<S>(e: &ParseError<S>) -> String
where
    S: Stream,
    S::Range: Display,
    S::Item: Display,
{
    use combine::primitives::Error;
    use combine::primitives::Info;

    fn describe<T: Display, R: Display>(info: &Info<T, R>) -> String {
        match *info {
            Info::Token(ref t) => format!("'{}'", t),
            Info::Range(ref r) => format!("'{}'", r),
            Info::Owned(ref s) => s.clone(),
            Info::Borrowed(s) => s.to_owned(),
        }
    }

    let mut unexpected = None;
    let mut expected: Vec<String> = Vec::new();
    let mut notes = Vec::new();
    for error in &e.errors {
        match *error {
            Error::Unexpected(ref info) => {
                unexpected.get_or_insert_with(|| describe(info));
            }
            Error::Expected(ref info) => {
                let what = describe(info);
                if !expected.contains(&what) {
                    expected.push(what);
                }
            }
            Error::Message(ref info) => notes.push(describe(info)),
            Error::Other(ref err) => notes.push(err.to_string()),
        }
    }

    let mut parts = Vec::new();
    parts.push(format!(
        "unexpected {}",
        unexpected.unwrap_or_else(|| "end of input".to_owned())
    ));
    if let Some((last, rest)) = expected.split_last() {
        if rest.is_empty() {
            parts.push(format!("expected {}", last));
        } else {
            parts.push(format!("expected {} or {}", rest.join(", "), last));
        }
    }
    let mut text = parts.join(", ");
    for note in notes {
        text.push_str("; ");
        text.push_str(&note);
    }
    text
}

/// Formats bytes as a hex dump, eight bytes per line, each line followed by
/// the printable ASCII characters of its bytes.
pub fn hexdump(data: &[u8]) -> String {
    let mut out = String::new();
    for (n, chunk) in data.chunks(8).enumerate() {
        let _ = write!(out, "{:04X}:", n * 8);
        for b in chunk {
            let _ = write!(out, " {:02x}", b);
        }
        for _ in chunk.len()..8 {
            out.push_str("   ");
        }
        out.push_str("  ");
        out.extend(chunk.iter().map(|&b| {
            if b >= b' ' && b <= b'~' {
                b as char
            } else {
                '.'
            }
        }));
        out.push('\n');
    }
    out
}

/// Parses the leading decimal integer of some text, after any whitespace.
///
/// Parsing stops at the first character which isn't a digit, and yields 0 if
/// there are no digits at all.  The result saturates far outside the 16-bit
/// range.
pub fn atoi(text: &[u8]) -> i64 {
    let mut bytes = text.iter()
        .skip_while(|&&b| b == b' ' || (b >= b'\t' && b <= b'\r'))
        .peekable();
    let negative = match bytes.peek() {
        Some(&&b'-') => true,
        _ => false,
    };
    if negative || bytes.peek() == Some(&&b'+') {
        bytes.next();
    }

    let x = bytes
        .take_while(|b| b.is_ascii_digit())
        .fold(0i64, |x, &b| (x * 10 + (b - b'0') as i64).min(1 << 32));
    if negative {
        -x
    } else {
        x
    }
}
