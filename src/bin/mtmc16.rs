/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! The `mtmc16` binary program.

extern crate clap;
extern crate env_logger;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;
#[cfg(feature = "sdl")]
#[macro_use]
extern crate maplit;
extern crate mtmc16;
#[cfg(feature = "sdl")]
extern crate sdl2;

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::process;

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use failure::{Error, ResultExt};
use log::LevelFilter;

use mtmc16::assembler::{self, Assembler};
use mtmc16::disassembler::{self, Disassembler};
use mtmc16::emulator::{self, Emulator, Status};
use mtmc16::{Executable, Platform, Sprite};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The default window scale.
const DEFAULT_SCALE: u32 = 4;

/// An error resulting from a program that stopped on a runtime fault.
#[derive(Debug, Fail)]
#[fail(display = "program stopped with status {}", _0)]
struct ProgramError(Status);

fn verbose_arg() -> Arg<'static, 'static> {
    Arg::with_name("verbose")
        .short("v")
        .long("verbose")
        .multiple(true)
        .help("increase verbosity")
}

fn output_arg() -> Arg<'static, 'static> {
    Arg::with_name("output")
        .short("o")
        .long("output")
        .value_name("OUT")
        .help("set output file name")
        .takes_value(true)
        .default_value("-")
}

fn main() {
    let matches = App::new("mtmc16")
        .version(VERSION)
        .author("Ian Johnson <ianprime0509@gmail.com>")
        .about("MTMC-16, the Montana Mini-Computer")
        .help_message("show this help message and exit")
        .version_message("show version information and exit")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .setting(AppSettings::VersionlessSubcommands)
        .subcommand(
            SubCommand::with_name("run")
                .about("execute binary")
                .arg(
                    Arg::with_name("speed")
                        .short("s")
                        .long("speed")
                        .value_name("SPEED")
                        .help("set CPU speed in cycles per second")
                        .takes_value(true)
                        .allow_hyphen_values(true),
                )
                .arg(
                    Arg::with_name("trace")
                        .short("t")
                        .long("trace")
                        .value_name("TRACE")
                        .help("set tracing level")
                        .takes_value(true)
                        .allow_hyphen_values(true),
                )
                .arg(
                    Arg::with_name("scale")
                        .short("x")
                        .long("scale")
                        .value_name("SCALE")
                        .help("set window scale")
                        .takes_value(true)
                        .allow_hyphen_values(true),
                )
                .arg(
                    Arg::with_name("disk")
                        .long("disk")
                        .value_name("DIR")
                        .help("set the directory that programs can access")
                        .takes_value(true),
                )
                .arg(verbose_arg())
                .arg(
                    Arg::with_name("FILE")
                        .help("executable binary")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("ARG")
                        .help("argument to the executable binary")
                        .index(2),
                ),
        )
        .subcommand(
            SubCommand::with_name("asm")
                .about("assemble binary")
                .arg(output_arg())
                .arg(verbose_arg())
                .arg(
                    Arg::with_name("FILE")
                        .help("assembly source file")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            SubCommand::with_name("disasm")
                .about("disassemble binary")
                .arg(
                    Arg::with_name("bytes")
                        .short("b")
                        .long("bytes")
                        .help("print code bytes"),
                )
                .arg(
                    Arg::with_name("graphics")
                        .short("g")
                        .long("graphics")
                        .help("extract graphics"),
                )
                .arg(
                    Arg::with_name("source")
                        .long("source")
                        .help("print assembler source instead of a listing"),
                )
                .arg(output_arg())
                .arg(verbose_arg())
                .arg(
                    Arg::with_name("FILE")
                        .help("binary file")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            SubCommand::with_name("img")
                .about("convert an image to MTMC-16 graphics")
                .arg(output_arg())
                .arg(verbose_arg())
                .arg(
                    Arg::with_name("FILE")
                        .help("image file")
                        .required(true)
                        .index(1),
                ),
        )
        .get_matches();

    let verbosity = match matches.subcommand() {
        (_, Some(sub)) => sub.occurrences_of("verbose"),
        _ => 0,
    };
    let filter = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter(None, filter)
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .init();

    if let Err(e) = run(&matches) {
        error!("{}", e);
        for cause in e.causes().skip(1) {
            info!("caused by: {}", cause);
        }
        trace!("backtrace: {}", e.backtrace());
        process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<(), Error> {
    match matches.subcommand() {
        ("run", Some(m)) => run_program(m),
        ("asm", Some(m)) => assemble(m),
        ("disasm", Some(m)) => disassemble(m),
        ("img", Some(m)) => convert_image(m),
        _ => Ok(()),
    }
}

/// Opens the named input file, where `-` is standard input.
fn open_input(name: &str) -> Result<Box<Read>, Error> {
    Ok(if name == "-" {
        Box::new(io::stdin())
    } else {
        Box::new(BufReader::new(File::open(name).with_context(|_| {
            format!("could not open input file '{}'", name)
        })?))
    })
}

/// Creates the named output file, where `-` is standard output.
fn open_output(name: &str) -> Result<Box<Write>, Error> {
    Ok(if name == "-" {
        Box::new(io::stdout())
    } else {
        Box::new(BufWriter::new(File::create(name).with_context(|_| {
            format!("could not open output file '{}'", name)
        })?))
    })
}

/// Parses an optional integer argument.
fn int_arg(matches: &ArgMatches, name: &str) -> Result<Option<i64>, Error> {
    match matches.value_of(name) {
        Some(s) => Ok(Some(s.parse::<i64>()
            .with_context(|_| format!("invalid {} argument '{}'", name, s))?)),
        None => Ok(None),
    }
}

fn run_program(matches: &ArgMatches) -> Result<(), Error> {
    let mut opts = emulator::Options::new();
    if let Some(speed) = int_arg(matches, "speed")? {
        opts.speed = if speed > 0 && speed <= u32::max_value() as i64 {
            speed as u32
        } else {
            mtmc16::DEFAULT_SPEED
        };
    }
    if let Some(trace) = int_arg(matches, "trace")? {
        opts.trace = if trace > 0 { trace as u32 } else { 0 };
    }
    if let Some(disk) = matches.value_of("disk") {
        opts.disk = disk.into();
    }
    let scale = match int_arg(matches, "scale")? {
        Some(scale) if scale > 0 => scale as u32,
        Some(_) => 1,
        None => DEFAULT_SCALE,
    };

    let filename = matches.value_of("FILE").unwrap();
    let exe = Executable::read(open_input(filename)?)
        .with_context(|_| format!("could not load executable from file '{}'", filename))?;
    let arg = matches.value_of("ARG");

    #[cfg(feature = "sdl")]
    let platform = sdl::SdlPlatform::new(scale)?;
    #[cfg(not(feature = "sdl"))]
    let platform = {
        debug!("no display available; ignoring scale {}", scale);
        mtmc16::Console::new(BufReader::new(io::stdin()), io::stdout())
    };

    execute(Emulator::with_options(platform, opts), &exe, arg)
}

/// Runs an executable to completion on the given emulator.
fn execute<P: Platform>(
    mut emulator: Emulator<P>,
    exe: &Executable,
    arg: Option<&str>,
) -> Result<(), Error> {
    emulator.load(exe);
    if let Some(arg) = arg {
        emulator.set_arg(arg);
    }
    emulator.run()?;

    match emulator.status() {
        Status::PermanentError => Err(ProgramError(Status::PermanentError))?,
        status => info!("program stopped with status {}", status),
    }
    Ok(())
}

fn assemble(matches: &ArgMatches) -> Result<(), Error> {
    let filename = matches.value_of("FILE").unwrap();
    let mut opts = assembler::Options::new();
    if filename != "-" {
        if let Some(dir) = Path::new(filename).parent() {
            if !dir.as_os_str().is_empty() {
                opts.source_dir = dir.to_path_buf();
            }
        }
    }

    let mut input = open_input(filename)?;
    let object = Assembler::with_options(opts)
        .assemble(&mut input)
        .with_context(|_| format!("could not assemble file '{}'", filename))?;
    let exe = Executable::link(&object)?;

    let mut output = open_output(matches.value_of("output").unwrap())?;
    exe.write(&mut output)?;
    output.flush()?;
    Ok(())
}

fn disassemble(matches: &ArgMatches) -> Result<(), Error> {
    let filename = matches.value_of("FILE").unwrap();
    let exe = Executable::read(open_input(filename)?)
        .with_context(|_| format!("could not load executable from file '{}'", filename))?;

    let mut opts = disassembler::Options::new();
    opts.code_bytes = matches.is_present("bytes");
    opts.listing = !matches.is_present("source");
    let disasm = Disassembler::with_options(exe, opts);

    let mut output = open_output(matches.value_of("output").unwrap())?;
    disasm.dump(&mut output)?;
    output.flush()?;

    if matches.is_present("graphics") {
        let name = match Path::new(filename).file_name() {
            Some(name) if filename != "-" => name.to_string_lossy().into_owned(),
            _ => "stdin".to_owned(),
        };
        disasm.export_graphics(".", &name)?;
    }
    Ok(())
}

fn convert_image(matches: &ArgMatches) -> Result<(), Error> {
    let filename = matches.value_of("FILE").unwrap();
    let sprite = Sprite::decode_png(open_input(filename)?)
        .with_context(|_| format!("could not read image from file '{}'", filename))?;
    let mut output = open_output(matches.value_of("output").unwrap())?;
    sprite.encode_png(&mut output)?;
    output.flush()?;
    Ok(())
}

#[cfg(feature = "sdl")]
mod sdl {
    use std::collections::HashMap;
    use std::io::{self, BufReader, Stdin, Stdout};
    use std::thread;
    use std::time::Duration;

    use failure::{Error, ResultExt};
    use sdl2::{self, EventPump};
    use sdl2::event::{Event, WindowEvent};
    use sdl2::keyboard::Keycode;
    use sdl2::pixels::Color;
    use sdl2::rect::Rect;
    use sdl2::render::Canvas;
    use sdl2::video::Window;

    use mtmc16::{display, input, sprite, Console, Platform};
    use mtmc16::input::Button;

    /// An SDL error.
    #[derive(Debug, Fail)]
    #[fail(display = "SDL error: {}", _0)]
    pub struct SdlError(String);

    /// A platform with a window for the frame buffer and a keyboard joystick.
    ///
    /// Console I/O still goes to standard input and output.
    pub struct SdlPlatform {
        console: Console<BufReader<Stdin>, Stdout>,
        canvas: Canvas<Window>,
        event_pump: EventPump,
        /// The map from keys to joystick buttons.
        keymap: HashMap<Keycode, Button>,
        /// The joystick state, as of the last processed event.
        buttons: input::State,
        scale: u32,
        /// Whether the window needs to be redrawn in full.
        exposed: bool,
        closed: bool,
    }

    impl SdlPlatform {
        /// Opens a window with the given scale.
        pub fn new(scale: u32) -> Result<Self, Error> {
            let sdl_context = sdl2::init()
                .map_err(SdlError)
                .context("could not initialize SDL")?;
            let video_subsystem = sdl_context
                .video()
                .map_err(SdlError)
                .context("could not initialize SDL video subsystem")?;
            let event_pump = sdl_context
                .event_pump()
                .map_err(SdlError)
                .context("could not initialize SDL event loop")?;

            let window = video_subsystem
                .window(
                    "MTMC-16",
                    display::WIDTH as u32 * scale,
                    display::HEIGHT as u32 * scale,
                )
                .build()?;
            let canvas = window.into_canvas().build()?;

            let keymap = hashmap![
                Keycode::Up => Button::Up,
                Keycode::Down => Button::Down,
                Keycode::Left => Button::Left,
                Keycode::Right => Button::Right,
                Keycode::L => Button::L,
                Keycode::Space => Button::Space,
                Keycode::A => Button::A,
                Keycode::S => Button::S,
            ];

            Ok(SdlPlatform {
                console: Console::new(BufReader::new(io::stdin()), io::stdout()),
                canvas,
                event_pump,
                keymap,
                buttons: input::State::new(),
                scale,
                exposed: true,
                closed: false,
            })
        }

        /// Processes all pending window events.
        fn pump(&mut self) {
            for event in self.event_pump.poll_iter() {
                match event {
                    Event::Quit { .. }
                    | Event::KeyDown {
                        keycode: Some(Keycode::Escape),
                        ..
                    } => self.closed = true,
                    Event::Window {
                        win_event: WindowEvent::Exposed,
                        ..
                    } => self.exposed = true,
                    Event::KeyDown {
                        keycode: Some(key), ..
                    } => if let Some(&button) = self.keymap.get(&key) {
                        self.buttons.press(button);
                    },
                    Event::KeyUp {
                        keycode: Some(key), ..
                    } => if let Some(&button) = self.keymap.get(&key) {
                        self.buttons.release(button);
                    },
                    _ => {}
                }
            }
        }
    }

    /// Draws the frame buffer to the window, one palette colour at a time.
    fn draw(canvas: &mut Canvas<Window>, scale: u32, buffer: &display::Buffer) -> Result<(), SdlError> {
        let mut rects = vec![Vec::new(); sprite::PALETTE.len()];
        for (i, &color) in buffer.data().iter().enumerate() {
            let (x, y) = (i % display::WIDTH, i / display::WIDTH);
            rects[color as usize & 3].push(Rect::new(
                (x as u32 * scale) as i32,
                (y as u32 * scale) as i32,
                scale,
                scale,
            ));
        }

        for (rgb, rects) in sprite::PALETTE.iter().zip(rects.iter()) {
            canvas.set_draw_color(Color::RGB(rgb[0], rgb[1], rgb[2]));
            canvas.fill_rects(rects).map_err(SdlError)?;
        }
        canvas.present();
        Ok(())
    }

    impl Platform for SdlPlatform {
        fn read_line(&mut self) -> Result<Option<Vec<u8>>, Error> {
            self.console.read_line()
        }

        fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
            self.console.write(bytes)
        }

        fn present(&mut self, buffer: &mut display::Buffer) -> Result<(), Error> {
            self.pump();
            if self.exposed {
                buffer.force_refresh();
                self.exposed = false;
            }
            let (canvas, scale) = (&mut self.canvas, self.scale);
            buffer
                .refresh(|buffer| draw(canvas, scale, buffer))
                .context("could not refresh display window")?;
            Ok(())
        }

        fn poll(&mut self, input: &mut input::State) -> Result<(), Error> {
            self.pump();
            *input = self.buttons;
            Ok(())
        }

        fn closed(&self) -> bool {
            self.closed
        }

        fn sleep(&mut self, ms: u32) {
            self.pump();
            thread::sleep(Duration::from_millis(ms as u64));
        }
    }
}
