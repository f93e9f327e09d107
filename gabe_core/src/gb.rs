use std::cell::RefCell;
use std::path::Path;

use super::bus_hooks::BusHooks;
use super::cartridge::CartridgeError;
use super::cpu::{Cpu, CpuTrace};
use super::error::RomError;
use super::mmu::{Memory, Mmu};
use super::sink::*;

pub struct Gameboy {
    cpu: Cpu,
    mmu: Mmu,
    rom_data: Vec<u8>,
}

/// The supported input states for the Joypad.
/// User provides a combined mask of these values during each step call
pub enum GbKeys {
    Right = 0,
    Left = 1,
    Up = 2,
    Down = 3,
    A = 4,
    B = 5,
    Select = 6,
    Start = 7,
}

pub struct GbDebug {
    pub cpu_trace: CpuTrace,
    pub ie_data: u8,
    pub if_data: u8,
    pub vram_lcdc: u8,
    pub vram_stat: u8,
    pub vram_ly: u8,
}

impl Gameboy {
    /// Initializes Gameboy state to begin emulation on the cartridge at `path`.
    pub fn power_on(path: impl AsRef<Path>) -> Result<Self, RomError> {
        let rom_data = std::fs::read(path.as_ref())?;
        Self::power_on_from_bytes(rom_data)
    }

    pub fn power_on_from_bytes(rom_data: Vec<u8>) -> Result<Self, RomError> {
        let mmu = Mmu::power_on_from_bytes(rom_data.clone())?;
        Ok(Gameboy {
            cpu: Cpu::power_on(),
            mmu,
            rom_data,
        })
    }

    /// Replaces the currently loaded cartridge, resetting the CPU and every
    /// other subsystem in the process.
    pub fn set_rom(&mut self, rom_data: Vec<u8>) -> Result<(), RomError> {
        let mmu = Mmu::power_on_from_bytes(rom_data.clone())?;
        self.mmu = mmu;
        self.cpu = Cpu::power_on();
        self.rom_data = rom_data;
        Ok(())
    }

    /// Resets the CPU and every subsystem, reloading the currently set cartridge.
    pub fn reset(&mut self) -> Result<(), RomError> {
        let mmu = Mmu::power_on_from_bytes(self.rom_data.clone())?;
        self.mmu = mmu;
        self.cpu = Cpu::power_on();
        Ok(())
    }

    /// Advances every subsystem by exactly one machine cycle.
    pub fn tick(
        &mut self,
        video_sink: &mut dyn Sink<VideoFrame>,
        audio_sink: &mut dyn Sink<AudioFrame>,
    ) {
        self.cpu.tick(&mut self.mmu);
        self.mmu.tick(video_sink, audio_sink);
    }

    pub fn set_button(&mut self, key: GbKeys, pressed: bool) {
        self.mmu.joypad.set_key_pressed(key, pressed);
    }

    pub fn pop_serial(&mut self) -> Option<u8> {
        self.mmu.pop_serial()
    }

    pub fn peek_serial(&self) -> Option<u8> {
        self.mmu.peek_serial()
    }

    pub fn read_save_file(&mut self, file: &mut std::fs::File) -> Result<(), CartridgeError> {
        self.mmu.read_save_file(file)
    }

    pub fn write_save_file(&self, file: &mut std::fs::File) -> Result<(), CartridgeError> {
        self.mmu.write_save_file(file)
    }

    pub fn framebuffer(&self) -> &[u8] {
        self.mmu.framebuffer()
    }

    pub fn bus_hooks(&self) -> &RefCell<BusHooks> {
        self.mmu.bus_hooks()
    }

    pub fn get_debug_state(&self) -> GbDebug {
        GbDebug {
            cpu_trace: self.cpu.trace(),
            if_data: self.mmu.read_byte(0xFF0F),
            ie_data: self.mmu.read_byte(0xFFFF),
            vram_lcdc: self.mmu.read_byte(0xFF40),
            vram_stat: self.mmu.read_byte(0xFF41),
            vram_ly: self.mmu.read_byte(0xFF44),
        }
    }

    /// Returns the current program counter of the CPU.
    pub fn get_pc(&self) -> u16 {
        self.cpu.pc()
    }

    /// `true` at the boundary between instructions, i.e. when the next
    /// `tick` will begin a fresh fetch (or interrupt dispatch).
    pub fn at_instruction_boundary(&self) -> bool {
        self.cpu.at_boundary()
    }

    /// Returns a Vec of the bytes contained within the given range of addresses.
    /// Only returns values as read via the CPU, so forbidden or blocked reads
    /// (e.g. during DMA) will not be bypassed.
    pub fn get_memory_range(&self, range: std::ops::Range<usize>) -> Vec<u8> {
        self.mmu.get_memory_range(range)
    }
}
