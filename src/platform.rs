/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! The host side of the emulator.
//!
//! Everything the emulated machine does outside of its own memory and
//! registers goes through a `Platform`: console I/O, presenting the frame
//! buffer, reading the joystick and sleeping between pulses.  File access is
//! confined to a sandbox directory by `Disk`.

use std::io::{BufRead, Write};
use std::path::{Component, Path, PathBuf};
use std::thread;
use std::time::Duration;

use failure::Error;

use display;
use input;

/// The services the emulator needs from its host.
pub trait Platform {
    /// Reads a line from the console, including its line terminator (if
    /// any).
    ///
    /// Returns `None` at the end of input.
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, Error>;

    /// Writes raw bytes to the console.
    fn write(&mut self, bytes: &[u8]) -> Result<(), Error>;

    /// Shows the frame buffer to the user.
    fn present(&mut self, _display: &mut display::Buffer) -> Result<(), Error> {
        Ok(())
    }

    /// Updates the joystick state with any pending events.
    fn poll(&mut self, _input: &mut input::State) -> Result<(), Error> {
        Ok(())
    }

    /// Returns whether the user has asked to close the machine.
    fn closed(&self) -> bool {
        false
    }

    /// Blocks for the given number of milliseconds.
    fn sleep(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(ms as u64));
    }
}

/// A headless platform that only has a console.
///
/// The frame buffer is never shown and the joystick never reports a button.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    /// Returns a console reading from `input` and writing to `output`.
    pub fn new(input: R, output: W) -> Self {
        Console { input, output }
    }

    /// Returns a reference to the console output.
    pub fn output(&self) -> &W {
        &self.output
    }

    /// Consumes the console, returning its output.
    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> Platform for Console<R, W> {
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, Error> {
        self.output.flush()?;
        let mut line = Vec::new();
        if self.input.read_until(b'\n', &mut line)? == 0 {
            Ok(None)
        } else {
            Ok(Some(line))
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.output.write_all(bytes)?;
        Ok(())
    }
}

/// The directory tree that programs may access.
#[derive(Debug, Clone)]
pub struct Disk {
    root: PathBuf,
}

impl Disk {
    /// Returns a sandbox rooted at the given host directory.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Disk { root: root.into() }
    }

    /// Returns the host directory at the root of the sandbox.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a program-supplied path to a host path.
    ///
    /// Absolute names start at the disk root; others start at `cwd`.  The
    /// result is canonical and must lie inside the disk root.  A path to a
    /// file which does not exist yet is accepted if its parent directory
    /// does.
    pub fn resolve(&self, cwd: &str, name: &str) -> Option<PathBuf> {
        let root = self.root.canonicalize().ok()?;
        let relative = if name.starts_with('/') {
            Path::new(name.trim_start_matches('/')).to_path_buf()
        } else {
            Path::new(cwd.trim_start_matches('/')).join(name)
        };
        let path = root.join(relative);

        let resolved = match path.canonicalize() {
            Ok(path) => path,
            Err(_) => {
                let file = match path.components().last() {
                    Some(Component::Normal(file)) => file.to_owned(),
                    _ => return None,
                };
                path.parent()?.canonicalize().ok()?.join(file)
            }
        };

        if resolved.starts_with(&root) {
            Some(resolved)
        } else {
            debug!("path '{}' is not on disk", resolved.display());
            None
        }
    }

    /// Returns the name of a resolved host path as seen by programs, e.g.
    /// `/games/life`.
    pub fn name_of(&self, path: &Path) -> Option<String> {
        let root = self.root.canonicalize().ok()?;
        let relative = path.strip_prefix(&root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(format!("/{}", parts.join("/")))
    }
}

impl Default for Disk {
    fn default() -> Self {
        Disk::new("./disk")
    }
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io::Cursor;

    use super::*;

    /// Creates a fresh sandbox with a single subdirectory and file.
    fn scratch_disk(name: &str) -> Disk {
        let root = env::temp_dir().join(format!("mtmc16-platform-{}", name));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("games")).unwrap();
        fs::write(root.join("games").join("life.cells"), "O\n").unwrap();
        Disk::new(root)
    }

    #[test]
    fn console_lines() {
        let mut console = Console::new(Cursor::new(&b"one\ntwo"[..]), Vec::new());

        assert_eq!(console.read_line().unwrap(), Some(b"one\n".to_vec()));
        assert_eq!(console.read_line().unwrap(), Some(b"two".to_vec()));
        assert_eq!(console.read_line().unwrap(), None);

        console.write(b"hi").unwrap();
        assert_eq!(console.output(), &b"hi".to_vec());
    }

    #[test]
    fn resolve_paths() {
        let disk = scratch_disk("resolve");
        let root = disk.root().canonicalize().unwrap();

        // Test cases, in the format (cwd, name, expected path under root).
        let cases = [
            ("/", "games", Some("games")),
            ("/", "/games/life.cells", Some("games/life.cells")),
            ("/games", "life.cells", Some("games/life.cells")),
            ("/games", "../games/./life.cells", Some("games/life.cells")),
            ("/games", "new.txt", Some("games/new.txt")),
            ("/games", "/", Some("")),
            ("/", "..", None),
            ("/games", "../../etc", None),
            ("/", "missing/new.txt", None),
        ];

        for &(cwd, name, expected) in cases.iter() {
            let case = (cwd, name);
            let expected = expected.map(|p| {
                if p.is_empty() {
                    root.clone()
                } else {
                    root.join(p)
                }
            });
            assert_eq!(disk.resolve(cwd, name), expected, "case {:?}", case);
        }
    }

    #[test]
    fn names() {
        let disk = scratch_disk("names");
        let root = disk.root().canonicalize().unwrap();

        assert_eq!(disk.name_of(&root), Some("/".to_owned()));
        assert_eq!(
            disk.name_of(&root.join("games")),
            Some("/games".to_owned())
        );
        assert_eq!(disk.name_of(Path::new("/")), None);
    }
}
