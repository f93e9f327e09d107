use std::cell::RefCell;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::io;

use super::apu::Apu;
use super::bus_hooks::BusHooks;
use super::cartridge::{Cartridge, CartridgeError};
use super::error::RomError;
use super::interrupt::InterruptKind;
use super::joypad::Joypad;
use super::ppu::Ppu;
use super::serial::Serial;
use super::sink::*;
use super::timer::Timer;
use super::wram::Wram;

/// The possible states of an OAM DMA transfer running within the MMU. Until
/// a write is performed at 0xFF46, the state is always `Stopped`. A valid
/// write there arms `Starting` with the upper byte of the source address;
/// the next tick begins `Running`, which walks one byte per machine cycle
/// for the 160 cycles a real DMA transfer takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DmaState {
    Stopped,
    Starting(u8),
    Running(u16),
}

/// Trait representing a piece of memory in the system that can have bytes read and written to.
/// write/read words are just composed from write/read byte, so implementors only need to implement
/// `read_byte` and `write_byte`.
pub trait Memory {
    fn read_byte(&self, addr: u16) -> u8;
    fn read_word(&self, addr: u16) -> u16 {
        (u16::from(self.read_byte(addr))) | (u16::from(self.read_byte(addr.wrapping_add(1))) << 8)
    }
    fn write_byte(&mut self, addr: u16, val: u8);
    fn write_word(&mut self, addr: u16, val: u16) {
        self.write_byte(addr, (val & 0xFF) as u8);
        self.write_byte(addr.wrapping_add(1), (val >> 8) as u8);
    }
}

/// The state of all Gameboy memory, both internal memory and external cartridge memory.
///
/// Dispatches by inline `match` over address ranges against components it
/// owns directly, rather than through heap-allocated handler closures.
pub struct Mmu {
    cart: Box<dyn Cartridge>,
    apu: Apu,
    ppu: Ppu,
    wram: Wram,
    timer: Timer,
    pub joypad: Joypad,
    serial: Serial,
    intf: u8,
    ie: u8,
    dma_state: DmaState,
    previous_dma: u8,
    hooks: RefCell<BusHooks>,
}

impl Mmu {
    /// Initializes the MMU with the given ROM path. Opens the given file and
    /// reads cartridge header information to find the MBC type.
    pub fn power_on(path: impl AsRef<Path>) -> Result<Self, RomError> {
        let mut f = File::open(path.as_ref())?;
        let mut rom_data = Vec::new();
        f.read_to_end(&mut rom_data)?;
        Self::power_on_from_bytes(rom_data)
    }

    pub fn power_on_from_bytes(rom_data: Vec<u8>) -> Result<Self, RomError> {
        use super::cartridge::mbc0::Mbc0;
        use super::cartridge::mbc1::Mbc1;
        use super::cartridge::mbc2::Mbc2;
        use super::cartridge::mbc3::Mbc3;
        use super::cartridge::mbc5::Mbc5;

        if rom_data.len() < 0x8000 {
            return Err(RomError::TooShort { len: rom_data.len() });
        }
        let title =
            std::str::from_utf8(&rom_data[0x134..0x13F]).map_or_else(|_| "Invalid Title", |v| v);
        let rom_size = rom_data[0x148];
        let ram_size = rom_data[0x149];
        info!("Cartridge Info:");
        info!("\tTitle: {}", title);
        info!("\tROM Size: {} KiB", 32 * (1 << rom_size));
        match ram_size {
            0x0 | 0x1 => info!("\tRAM Size: None"),
            0x2 => info!("\tRAM Size: 8 KiB"),
            0x3 => info!("\tRAM Size: 32 KiB"),
            0x4 => info!("\tRAM Size: 128 KiB"),
            0x5 => info!("\tRAM Size: 64 KiB"),
            _ => info!("\tRAM Size: Unknown"),
        };
        let cart_type = rom_data[0x147];
        let cart: Box<dyn Cartridge> = match cart_type {
            0x00 => {
                info!("\tMBC Type: MBC0/No MBC.");
                Box::new(Mbc0::power_on(rom_data))
            }
            0x01 => {
                info!("\tMBC Type: MBC1 w/o RAM");
                Box::new(Mbc1::power_on(rom_data, rom_size, 0, false))
            }
            0x02 => {
                info!("\tMBC Type: MBC1 w/ RAM");
                Box::new(Mbc1::power_on(rom_data, rom_size, ram_size, false))
            }
            0x03 => {
                info!("\tMBC Type: MBC1 w/ RAM and Battery");
                Box::new(Mbc1::power_on(rom_data, rom_size, ram_size, true))
            }
            0x05 => {
                info!("\tMBC Type: MBC2");
                Box::new(Mbc2::power_on(rom_data, rom_size, false))
            }
            0x06 => {
                info!("\tMBC Type: MBC2 w/ Battery");
                Box::new(Mbc2::power_on(rom_data, rom_size, true))
            }
            0x0F | 0x10 => {
                info!("\tMBC Type: MBC3 w/ RAM, Battery and RTC");
                Box::new(Mbc3::power_on(
                    rom_data.into_boxed_slice(),
                    rom_size,
                    ram_size,
                    true,
                    true,
                ))
            }
            0x11 => {
                info!("\tMBC Type: MBC3");
                Box::new(Mbc3::power_on(
                    rom_data.into_boxed_slice(),
                    rom_size,
                    0,
                    false,
                    false,
                ))
            }
            0x12 => {
                info!("\tMBC Type: MBC3 w/ RAM");
                Box::new(Mbc3::power_on(
                    rom_data.into_boxed_slice(),
                    rom_size,
                    ram_size,
                    false,
                    false,
                ))
            }
            0x13 => {
                info!("\tMBC Type: MBC3 w/ RAM and Battery");
                Box::new(Mbc3::power_on(
                    rom_data.into_boxed_slice(),
                    rom_size,
                    ram_size,
                    true,
                    false,
                ))
            }
            0x19 => {
                info!("\tMBC Type: MBC5");
                Box::new(Mbc5::power_on(rom_data, rom_size, 0, false))
            }
            0x1A => {
                info!("\tMBC Type: MBC5 w/ RAM");
                Box::new(Mbc5::power_on(rom_data, rom_size, ram_size, false))
            }
            0x1B => {
                info!("\tMBC Type: MBC5 w/ RAM and Battery");
                Box::new(Mbc5::power_on(rom_data, rom_size, ram_size, true))
            }
            other => return Err(RomError::UnsupportedCartridgeType(other)),
        };
        Ok(Mmu {
            cart,
            apu: Apu::power_on(),
            ppu: Ppu::power_on(),
            wram: Wram::power_on(),
            timer: Timer::power_on(),
            joypad: Joypad::power_on(),
            serial: Serial::power_on(),
            intf: 0xE1,
            ie: 0x00,
            dma_state: DmaState::Stopped,
            previous_dma: 0xFF,
            hooks: RefCell::new(BusHooks::default()),
        })
    }

    pub fn bus_hooks(&self) -> &RefCell<BusHooks> {
        &self.hooks
    }

    pub fn framebuffer(&self) -> &[u8] {
        self.ppu.framebuffer()
    }

    pub fn pop_serial(&mut self) -> Option<u8> {
        self.serial.pop_serial()
    }

    pub fn peek_serial(&self) -> Option<u8> {
        self.serial.peek_serial()
    }

    pub fn read_save_file(&mut self, file: &mut std::fs::File) -> Result<(), CartridgeError> {
        self.cart.read_save_file(file)
    }

    pub fn write_save_file(&self, file: &mut std::fs::File) -> Result<(), CartridgeError> {
        self.cart.write_save_file(file)
    }

    /// Advances every subsystem by exactly one machine cycle. Called once
    /// per `Cpu::tick`.
    pub fn tick(&mut self, video_sink: &mut dyn Sink<VideoFrame>, audio_sink: &mut dyn Sink<AudioFrame>) {
        self.dma_state = self.step_dma();

        self.apu.tick(audio_sink);

        if let Some(i) = self.joypad.update() {
            self.request_interrupt(i);
        }
        if let Some(i) = self.timer.tick() {
            self.request_interrupt(i);
        }
        for i in self.ppu.tick(video_sink) {
            self.request_interrupt(i);
        }
        if let Some(i) = self.serial.tick() {
            self.request_interrupt(i);
        }
    }

    /// Sets the current interrupt request bit corresponding to `int`. The
    /// CPU services it on a future fetch boundary once `IME` and `IE` allow.
    pub fn request_interrupt(&mut self, int: InterruptKind) {
        self.intf |= int as u8;
    }

    /// Debug function. Returns a simple Vec of the requested range of data. Only returns
    /// data visible to MMU, so any non-selected banks or block-internal data not memory-mapped
    /// will not be returned.
    pub fn get_memory_range(&self, range: std::ops::Range<usize>) -> Vec<u8> {
        let mut vec: Vec<u8> = Vec::new();
        for addr in range {
            if addr <= u16::MAX as usize {
                vec.push(self.dispatch_read(addr as u16));
            }
        }
        vec
    }

    /// Advances OAM DMA by one machine cycle, copying a single byte.
    fn step_dma(&mut self) -> DmaState {
        match self.dma_state {
            DmaState::Stopped => DmaState::Stopped,
            DmaState::Starting(s) => {
                let base = (s as u16) << 8;
                self.copy_dma_byte(base);
                DmaState::Running(base.wrapping_add(1))
            }
            DmaState::Running(addr) => {
                if addr & 0xFF >= 0xA0 {
                    trace!("DMA transfer complete.");
                    DmaState::Stopped
                } else {
                    self.copy_dma_byte(addr);
                    DmaState::Running(addr.wrapping_add(1))
                }
            }
        }
    }

    fn copy_dma_byte(&mut self, src_addr: u16) {
        let val = match src_addr {
            0x0000..=0x7FFF => self.cart.read_byte(src_addr),
            0x8000..=0x9FFF => self.ppu.read_vram_raw(src_addr),
            0xA000..=0xBFFF => self.cart.read_byte(src_addr),
            0xC000..=0xFDFF => self.wram.read_byte(src_addr),
            _ => {
                error!("invalid DMA source address {:04X}", src_addr);
                0xFF
            }
        };
        self.ppu.write_oam_raw(src_addr & 0xFF, val);
    }

    pub fn dma_active(&self) -> bool {
        self.dma_state != DmaState::Stopped
    }

    fn dispatch_read(&self, addr: u16) -> u8 {
        if self.dma_active() && !(0xFF80..=0xFFFE).contains(&addr) {
            warn!("CPU read at {:04X} during DMA, returning 0xFF", addr);
            return 0xFF;
        }
        match addr {
            0x0000..=0x7FFF => self.cart.read_byte(addr),
            0x8000..=0x9FFF => self.ppu.read_byte(addr),
            0xA000..=0xBFFF => self.cart.read_byte(addr),
            0xC000..=0xFDFF => self.wram.read_byte(addr),
            0xFE00..=0xFE9F => self.ppu.read_byte(addr),
            0xFEA0..=0xFEFF => 0xFF,
            0xFF00 => self.joypad.read_byte(addr),
            0xFF01..=0xFF02 => self.serial.read_byte(addr),
            0xFF04..=0xFF07 => self.timer.read_byte(addr),
            0xFF0F => self.intf | 0xE0,
            0xFF10..=0xFF3F => self.apu.read_byte(addr),
            0xFF46 => self.previous_dma,
            0xFF40..=0xFF45 | 0xFF47..=0xFF4B | 0xFF68..=0xFF6B => self.ppu.read_byte(addr),
            0xFF70 => self.wram.read_byte(addr),
            0xFF80..=0xFFFE => self.wram.read_byte(addr),
            0xFFFF => self.ie,
            _ => {
                error!("memory read at unassigned location {:04X}", addr);
                0xFF
            }
        }
    }

    fn dispatch_write(&mut self, addr: u16, val: u8) {
        if self.dma_active() && !(0xFF80..=0xFFFE).contains(&addr) {
            warn!("CPU write at {:04X} during DMA, ignoring.", addr);
            return;
        }
        match addr {
            0x0000..=0x7FFF => self.cart.write_byte(addr, val),
            0x8000..=0x9FFF => self.ppu.write_byte(addr, val),
            0xA000..=0xBFFF => self.cart.write_byte(addr, val),
            0xC000..=0xFDFF => self.wram.write_byte(addr, val),
            0xFE00..=0xFE9F => self.ppu.write_byte(addr, val),
            0xFEA0..=0xFEFF => {}
            0xFF00 => self.joypad.write_byte(addr, val),
            0xFF01..=0xFF02 => self.serial.write_byte(addr, val),
            0xFF04..=0xFF07 => {
                self.timer.write_byte(addr, val);
                if let Some(i) = self.timer.take_pending() {
                    self.intf |= i as u8;
                }
            }
            0xFF0F => self.intf = val & 0x1F,
            0xFF10..=0xFF3F => self.apu.write_byte(addr, val),
            0xFF46 => {
                trace!("beginning DMA transfer at {:02X}00", val);
                self.dma_state = DmaState::Starting(val);
                self.previous_dma = val;
            }
            0xFF40..=0xFF45 | 0xFF47..=0xFF4B | 0xFF68..=0xFF6B => self.ppu.write_byte(addr, val),
            0xFF70 => self.wram.write_byte(addr, val),
            0xFF80..=0xFFFE => self.wram.write_byte(addr, val),
            0xFFFF => self.ie = val,
            _ => {
                error!("memory write at unassigned location {:04X} of value {:02X}", addr, val);
            }
        }
    }
}

impl Memory for Mmu {
    fn read_byte(&self, addr: u16) -> u8 {
        if let Some(substitute) = self.hooks.borrow_mut().intercept_read(addr) {
            return substitute;
        }
        self.dispatch_read(addr)
    }

    fn write_byte(&mut self, addr: u16, val: u8) {
        if self.hooks.borrow_mut().intercept_write(addr, val) {
            return;
        }
        self.dispatch_write(addr, val);
    }
}

#[cfg(test)]
mod mmu_tests {
    use super::*;

    struct NullSink;
    impl Sink<VideoFrame> for NullSink {
        fn append(&mut self, _value: VideoFrame) {}
    }
    impl Sink<AudioFrame> for NullSink {
        fn append(&mut self, _value: AudioFrame) {}
    }

    fn blank_rom() -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        rom[0x147] = 0x00;
        rom[0x148] = 0x00;
        rom[0x149] = 0x00;
        rom
    }

    #[test]
    fn dma_copies_bytes_into_oam_over_160_cycles() {
        let mut mmu = Mmu::power_on_from_bytes(blank_rom()).unwrap();
        for i in 0..160u16 {
            mmu.write_byte(0x8000 + i, i as u8);
        }
        mmu.write_byte(0xFF46, 0x80);
        let mut video = NullSink;
        let mut audio = NullSink;
        for _ in 0..160 {
            mmu.tick(&mut video, &mut audio);
        }
        for i in 0..160u16 {
            assert_eq!(mmu.read_byte(0xFE00 + i), i as u8);
        }
        assert!(!mmu.dma_active());
    }

    #[test]
    fn unassigned_read_returns_ff() {
        let mmu = Mmu::power_on_from_bytes(blank_rom()).unwrap();
        assert_eq!(mmu.read_byte(0xFEA0), 0xFF);
    }
}
