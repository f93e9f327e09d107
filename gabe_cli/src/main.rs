mod audio_driver;
mod debugger;
mod time_source;
mod video_sinks;

use gabe_core::{
    gb::*,
    sink::{AudioFrame, Sink},
};
use time_source::TimeSource;

use std::{collections::VecDeque, path::Path, time::Instant};

use clap::{App, Arg};

use debugger::{Debugger, DebuggerState};
use minifb::{Key, ScaleMode, Window, WindowOptions};
use video_sinks::MostRecentSink;

const CYCLE_TIME_NS: u64 = 238;
const SCREEN_WIDTH: usize = 160;
const SCREEN_HEIGHT: usize = 144;

/// DMG shade index (0 = lightest, 3 = darkest) to a grayscale RGB pixel.
const SHADE_PALETTE: [u32; 4] = [0xFFFFFF, 0xAAAAAA, 0x555555, 0x000000];

struct SystemTimeSource {
    start: Instant,
}

impl SystemTimeSource {
    fn new() -> Self {
        SystemTimeSource {
            start: Instant::now(),
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn time_ns(&self) -> u64 {
        let elapsed = self.start.elapsed();
        elapsed.as_secs() * 1_000_000_000 + (elapsed.subsec_nanos() as u64)
    }
}

struct SimpleAudioSink {
    inner: VecDeque<AudioFrame>,
}

impl Sink<AudioFrame> for SimpleAudioSink {
    fn append(&mut self, value: AudioFrame) {
        self.inner.push_back(value);
    }
}

struct Emulator {
    gb: Gameboy,
    debugger: Debugger,
}

impl Emulator {
    pub fn power_on(path: impl AsRef<Path>, debug: bool) -> Self {
        let debugger = Debugger::new(debug);
        let gb = Gameboy::power_on(path).expect("Path invalid");
        Emulator { gb, debugger }
    }
}

/// Unpacks the core's 2-bits-per-pixel background framebuffer into a
/// minifb-ready row of 0RGB u32 pixels.
fn unpack_framebuffer(packed: &[u8]) -> Vec<u32> {
    let stride = SCREEN_WIDTH / 4;
    let mut out = vec![0u32; SCREEN_WIDTH * SCREEN_HEIGHT];
    for y in 0..SCREEN_HEIGHT {
        for x in 0..SCREEN_WIDTH {
            let byte = packed[y * stride + x / 4];
            let shade = (byte >> ((x % 4) * 2)) & 0b11;
            out[y * SCREEN_WIDTH + x] = SHADE_PALETTE[shade as usize];
        }
    }
    out
}

fn main() {
    env_logger::init();
    let matches = App::new("GaBE")
        .version("0.1")
        .about("Gameboy Emulator in Rust")
        .arg(
            Arg::with_name("ROM")
                .value_name("FILE")
                .help("Game to run in standard GB file format")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name("debug")
                .help("Turns on the REPL debugger")
                .short("d")
                .long("debug"),
        )
        .arg(
            Arg::with_name("disassemble")
                .help("Creates a disassembly output file from the given ROM instead of running.")
                .long("disassemble"),
        )
        .get_matches();
    let rom_file = matches.value_of("ROM").unwrap();
    let debug_enabled = matches.is_present("debug");
    let do_disassemble = matches.is_present("disassemble");

    if do_disassemble {
        println!("Generating disassembled file from {}", rom_file);
        disassemble_to_file(rom_file).expect("Error with I/O, exiting...");
        println!(
            "Disassembly of {} completed successfully! Exiting.",
            rom_file
        );
        return;
    }

    let mut emu = Emulator::power_on(rom_file, debug_enabled);

    let mut window = Window::new(
        "Gabe Emulator",
        SCREEN_WIDTH * 4,
        SCREEN_HEIGHT * 4,
        WindowOptions {
            resize: false,
            scale_mode: ScaleMode::AspectRatioStretch,
            ..WindowOptions::default()
        },
    )
    .expect("Failed to open window.");

    window.limit_update_rate(None);

    let audio_driver = audio_driver::AudioDriver::new(gabe_core::SAMPLE_RATE, 100);
    let mut audio_buffer_sink = audio_driver.sink();

    let time_source: Box<dyn TimeSource> = if debug_enabled {
        Box::new(SystemTimeSource::new())
    } else {
        audio_driver.time_source()
    };

    let start_time_ns = time_source.time_ns();
    let mut emulated_ns: u64 = 0;

    while window.is_open() && !window.is_key_down(Key::Escape) {
        let mut video_sink = MostRecentSink::new();
        let mut audio_sink = SimpleAudioSink {
            inner: VecDeque::new(),
        };

        let target_emu_time_ns = time_source.time_ns() - start_time_ns;

        if emu.debugger.is_running() {
            let action = emu.debugger.update(&mut emu.gb);
            if let DebuggerState::Stopping = action {
                emu.debugger.quit();
            }
            get_key_states(&window, &mut emu.gb);
            window.update();
        } else {
            while emulated_ns < target_emu_time_ns {
                emu.gb.tick(&mut video_sink, &mut audio_sink);
                emulated_ns += CYCLE_TIME_NS;
            }

            if video_sink.has_frame() {
                if let Some(frame) = video_sink.into_inner() {
                    let image_buffer = unpack_framebuffer(&frame);
                    window
                        .update_with_buffer(&image_buffer, SCREEN_WIDTH, SCREEN_HEIGHT)
                        .unwrap();
                }

                let keys = window.get_keys();
                get_key_states(&window, &mut emu.gb);
                if keys.contains(&Key::LeftCtrl) && keys.contains(&Key::D) && debug_enabled {
                    println!("Received debug command, enabling debugger...");
                    emu.debugger.start();
                }
            }

            audio_buffer_sink.append(audio_sink.inner.as_slices().0);
        }
        spin_sleep::sleep(std::time::Duration::from_millis(1));
    }
}

fn disassemble_to_file(path: impl AsRef<Path>) -> Result<(), std::io::Error> {
    use std::fs::File;
    use std::io::{Read, Write};

    let mut in_file = File::open(path.as_ref())?;
    let mut out_file = File::create("output.asm")?;
    let mut rom_data = Vec::new();
    in_file.read_to_end(&mut rom_data)?;
    let disasm = gabe_core::disassemble::disassemble(&rom_data, 0);
    for instr in disasm {
        out_file.write_all(format!("0x{:04X}: {}\n", instr.address, instr.text).as_bytes())?;
    }
    Ok(())
}

fn get_key_states(window: &Window, gb: &mut Gameboy) {
    gb.set_button(GbKeys::A, window.is_key_down(Key::X));
    gb.set_button(GbKeys::B, window.is_key_down(Key::Z));
    gb.set_button(GbKeys::Start, window.is_key_down(Key::Enter));
    gb.set_button(GbKeys::Select, window.is_key_down(Key::Backspace));
    gb.set_button(GbKeys::Up, window.is_key_down(Key::Up));
    gb.set_button(GbKeys::Down, window.is_key_down(Key::Down));
    gb.set_button(GbKeys::Left, window.is_key_down(Key::Left));
    gb.set_button(GbKeys::Right, window.is_key_down(Key::Right));
}
