/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! Executables and the Orc1 container format.
//!
//! An Orc1 container is a JSON object holding the code and data segments as
//! arrays of signed bytes, and (optionally) the sprites as arrays of signed
//! bytes holding PNG files:
//!
//! ```text
//! {"format":"Orc1","code":[16,1,0,0],"data":[],"graphics":[[-119,80,...]]}
//! ```

use std::fs::File;
use std::io::{BufReader, Read, Write};

use failure::{Error, ResultExt};
use serde_json;

use assembler::Object;
use sprite::Sprite;
use {MAX_GRAPHICS, MAX_GRAPHIC_BYTES, MEM_SIZE};

/// The only supported container format.
pub const FORMAT_ORC1: &str = "Orc1";

/// An error resulting from an unknown container format.
#[derive(Debug, Fail)]
#[fail(display = "unexpected executable format '{}'", _0)]
pub struct UnknownFormatError(pub String);

/// An error resulting from a segment which doesn't fit in memory.
#[derive(Debug, Fail)]
#[fail(display = "{} is over {} bytes: {}", segment, limit, size)]
pub struct SegmentTooLargeError {
    pub segment: &'static str,
    pub limit: usize,
    pub size: usize,
}

/// An error resulting from a number which is not a signed byte.
#[derive(Debug, Fail)]
#[fail(display = "invalid byte value {}", _0)]
pub struct InvalidByteError(pub i64);

/// The JSON layout of an Orc1 container.
#[derive(Debug, Serialize, Deserialize)]
struct Container {
    format: String,
    #[serde(default)]
    code: Vec<i64>,
    #[serde(default)]
    data: Vec<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    graphics: Vec<Vec<i64>>,
}

/// A loaded (or linked) MTMC-16 program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Executable {
    /// The code segment.
    pub code: Vec<u8>,
    /// The data segment.
    pub data: Vec<u8>,
    /// The sprites available to the `drawimg` system calls.
    pub graphics: Vec<Sprite>,
}

impl Executable {
    /// Reads an executable from an Orc1 container.
    ///
    /// Sprites past the supported number are skipped.
    pub fn read<R: Read>(input: R) -> Result<Self, Error> {
        let container: Container = serde_json::from_reader(input).context("invalid JSON")?;
        if container.format != FORMAT_ORC1 {
            Err(UnknownFormatError(container.format.clone()))?;
        }

        let code = to_bytes(&container.code, "code", MEM_SIZE)?;
        let data = to_bytes(&container.data, "data", MEM_SIZE)?;
        let mut graphics = Vec::new();
        for (i, g) in container.graphics.iter().enumerate() {
            if i >= MAX_GRAPHICS {
                error!("skipping graphic {}: at most {} are supported", i, MAX_GRAPHICS);
                continue;
            }
            let png = to_bytes(g, "graphic", MAX_GRAPHIC_BYTES)?;
            let sprite =
                Sprite::decode_png(&png[..]).with_context(|_| format!("in graphic {}", i))?;
            graphics.push(sprite);
        }

        debug!(
            "loaded executable: {} code bytes, {} data bytes, {} graphics",
            code.len(),
            data.len(),
            graphics.len()
        );
        Ok(Executable {
            code,
            data,
            graphics,
        })
    }

    /// Writes the executable as an Orc1 container.
    pub fn write<W: Write>(&self, output: W) -> Result<(), Error> {
        let mut graphics = Vec::with_capacity(self.graphics.len());
        for sprite in &self.graphics {
            let mut png = Vec::new();
            sprite.encode_png(&mut png)?;
            if png.len() > MAX_GRAPHIC_BYTES {
                Err(SegmentTooLargeError {
                    segment: "graphic",
                    limit: MAX_GRAPHIC_BYTES,
                    size: png.len(),
                })?;
            }
            graphics.push(from_bytes(&png));
        }

        let container = Container {
            format: FORMAT_ORC1.to_owned(),
            code: from_bytes(&self.code),
            data: from_bytes(&self.data),
            graphics,
        };
        serde_json::to_writer(output, &container)?;
        Ok(())
    }

    /// Links an assembled object into an executable, loading the sprites it
    /// imports.
    pub fn link(object: &Object) -> Result<Self, Error> {
        let mut graphics = Vec::with_capacity(object.graphics.len());
        for path in &object.graphics {
            let file = File::open(path)
                .with_context(|_| format!("could not open image '{}'", path.display()))?;
            let sprite = Sprite::decode_png(BufReader::new(file))
                .with_context(|_| format!("could not load image '{}'", path.display()))?;
            graphics.push(sprite);
        }

        Ok(Executable {
            code: object.code.clone(),
            data: object.data.clone(),
            graphics,
        })
    }
}

/// Converts the JSON representation of a byte array, checking its length and
/// the range of every byte.
fn to_bytes(values: &[i64], segment: &'static str, limit: usize) -> Result<Vec<u8>, Error> {
    if values.len() > limit {
        Err(SegmentTooLargeError {
            segment,
            limit,
            size: values.len(),
        })?;
    }
    values
        .iter()
        .map(|&x| {
            if x >= -128 && x <= 127 {
                Ok(x as u8)
            } else {
                Err(InvalidByteError(x).into())
            }
        })
        .collect()
}

fn from_bytes(bytes: &[u8]) -> Vec<i64> {
    bytes.iter().map(|&b| b as i8 as i64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_simple() {
        let json = r#"{"format": "Orc1", "code": [16, 1, -1, 0], "data": [104, 105, 0], "extra": 5}"#;
        let exe = Executable::read(json.as_bytes()).unwrap();

        assert_eq!(exe.code, vec![0x10, 0x01, 0xFF, 0x00]);
        assert_eq!(exe.data, b"hi\0".to_vec());
        assert!(exe.graphics.is_empty());
    }

    #[test]
    fn read_invalid() {
        let big = format!(
            r#"{{"format": "Orc1", "code": [{}]}}"#,
            vec!["0"; MEM_SIZE + 1].join(",")
        );
        let cases = [
            r#"{"format": "Orc2", "code": [], "data": []}"#,
            r#"{"code": [], "data": []}"#,
            r#"{"format": "Orc1", "code": [128], "data": []}"#,
            r#"{"format": "Orc1", "code": [], "data": [-129]}"#,
            r#"{"format": "Orc1", "code": ["a"]}"#,
            r#"{"format": "Orc1", "code": [], "graphics": [[1, 2, 3]]}"#,
            r#"[]"#,
            big.as_str(),
        ];

        for &json in cases.iter() {
            assert!(Executable::read(json.as_bytes()).is_err(), "case {:?}", json);
        }
    }

    #[test]
    fn write_and_read() {
        let mut sprite = Sprite::new(3, 2);
        sprite.set_pixel(1, 1, Some(2));
        sprite.set_pixel(2, 0, None);
        let exe = Executable {
            code: vec![0x00, 0x00],
            data: vec![0x80, 0x7F],
            graphics: vec![sprite],
        };

        let mut out = Vec::new();
        exe.write(&mut out).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        assert!(text.starts_with(r#"{"format":"Orc1","code":[0,0],"data":[-128,127],"graphics":[["#));
        assert_eq!(Executable::read(&out[..]).unwrap(), exe);
    }

    #[test]
    fn write_without_graphics() {
        let exe = Executable {
            code: vec![0x0F, 0xFF],
            data: vec![],
            graphics: vec![],
        };

        let mut out = Vec::new();
        exe.write(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"{"format":"Orc1","code":[15,-1],"data":[]}"#
        );
    }

    #[test]
    fn extra_graphics_are_skipped() {
        let mut png = Vec::new();
        Sprite::new(1, 1).encode_png(&mut png).unwrap();
        let bytes: Vec<String> = from_bytes(&png).iter().map(|b| b.to_string()).collect();
        let graphic = format!("[{}]", bytes.join(","));
        let json = format!(
            r#"{{"format": "Orc1", "code": [], "data": [], "graphics": [{}]}}"#,
            vec![graphic; MAX_GRAPHICS + 2].join(",")
        );

        let exe = Executable::read(json.as_bytes()).unwrap();
        assert_eq!(exe.graphics.len(), MAX_GRAPHICS);
    }
}
