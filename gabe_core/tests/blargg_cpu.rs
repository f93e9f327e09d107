mod common;

use std::io::Write;

use gabe_core::*;

#[test]
fn blargg_cpu_instrs() {
    let mut video_sink = common::NullSink;
    let mut audio_sink = common::NullSink;
    let rom_data = common::get_rom_data("tests/roms/cpu_instrs/cpu_instrs.gb").unwrap();
    let mut gb = gb::Gameboy::power_on_from_bytes(rom_data).unwrap();
    let mut result = std::string::String::new();
    loop {
        gb.tick(&mut video_sink, &mut audio_sink);
        if let Some(v) = gb.pop_serial() {
            print!("{}", v as char);
            result += &(v as char).to_string();
            std::io::stdout().flush().unwrap();
            if result.contains("Passed all tests") {
                break;
            }
            assert!(!result.contains("Failed"));
        }
    }
}
