use std::io::{self, Write};

use gabe_core::gb::Gameboy;
use gabe_core::sink::{AudioFrame, Sink, VideoFrame};

pub enum DebuggerState {
    Running,
    Stopping,
}

struct NullSink;
impl Sink<VideoFrame> for NullSink {
    fn append(&mut self, _value: VideoFrame) {}
}
impl Sink<AudioFrame> for NullSink {
    fn append(&mut self, _value: AudioFrame) {}
}

/// A minimal line-oriented REPL for single-stepping the core and inspecting
/// its state. Entered by pressing Ctrl+D during emulation, or at startup
/// with `--debug`.
pub struct Debugger {
    enabled: bool,
    running: bool,
    breakpoints: Vec<u16>,
}

impl Debugger {
    pub fn new(enabled: bool) -> Self {
        Debugger {
            enabled,
            running: enabled,
            breakpoints: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn start(&mut self) {
        if self.enabled {
            self.running = true;
        }
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Runs one REPL iteration: prints the prompt, reads a command, and acts
    /// on it. Returns `Stopping` when the user asks to resume real-time
    /// emulation.
    pub fn update(&mut self, gb: &mut Gameboy) -> DebuggerState {
        print!("gabe> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        if io::stdin().read_line(&mut line).is_err() {
            return DebuggerState::Stopping;
        }
        let line = line.trim();
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("s") | Some("step") => {
                let mut video = NullSink;
                let mut audio = NullSink;
                loop {
                    gb.tick(&mut video, &mut audio);
                    if gb.at_instruction_boundary() {
                        break;
                    }
                }
                self.print_state(gb);
                DebuggerState::Running
            }
            Some("c") | Some("continue") => DebuggerState::Stopping,
            Some("b") | Some("break") => {
                if let Some(addr) = parts.next().and_then(|s| u16::from_str_radix(s.trim_start_matches("0x"), 16).ok()) {
                    self.breakpoints.push(addr);
                    println!("breakpoint set at 0x{:04X}", addr);
                }
                DebuggerState::Running
            }
            Some("p") | Some("print") => {
                self.print_state(gb);
                DebuggerState::Running
            }
            Some("q") | Some("quit") => {
                self.quit();
                DebuggerState::Stopping
            }
            _ => {
                println!("commands: step|s, continue|c, break|b <addr>, print|p, quit|q");
                DebuggerState::Running
            }
        }
    }

    fn print_state(&self, gb: &Gameboy) {
        let debug = gb.get_debug_state();
        let t = debug.cpu_trace;
        println!(
            "A:{:02X} F:{:02X} B:{:02X} C:{:02X} D:{:02X} E:{:02X} H:{:02X} L:{:02X} SP:{:04X} PC:{:04X}",
            t.a, t.f, t.b, t.c, t.d, t.e, t.h, t.l, t.sp, t.pc
        );
        println!(
            "IE:{:02X} IF:{:02X} LCDC:{:02X} STAT:{:02X} LY:{:02X}",
            debug.ie_data, debug.if_data, debug.vram_lcdc, debug.vram_stat, debug.vram_ly
        );
    }
}
