use super::mmu::Memory;

/// Work RAM plus High RAm. On DMG, WRAM is a flat 8 KiB mirrored at
/// 0xC000-0xDFFF (and echoed at 0xE000-0xFDFF). Under the `cgb` feature,
/// bank 0 stays fixed at 0xC000-0xCFFF while 0xD000-0xDFFF selects one of
/// banks 1-7 via the bank-index register at 0xFF70.
pub struct Wram {
    banks: Vec<u8>,
    hram: [u8; 0x7F],
    #[cfg(feature = "cgb")]
    bank_index: u8,
}

const BANK_SIZE: usize = 0x1000;

impl Wram {
    pub fn power_on() -> Self {
        let bank_count = if cfg!(feature = "cgb") { 8 } else { 2 };
        Wram {
            banks: vec![0; BANK_SIZE * bank_count],
            hram: [0; 0x7F],
            #[cfg(feature = "cgb")]
            bank_index: 1,
        }
    }

    #[cfg(feature = "cgb")]
    fn switchable_bank(&self) -> usize {
        let idx = self.bank_index & 0x7;
        if idx == 0 {
            1
        } else {
            idx as usize
        }
    }

    #[cfg(not(feature = "cgb"))]
    fn switchable_bank(&self) -> usize {
        1
    }

    fn resolve(&self, addr: u16) -> usize {
        let offset = (addr - 0xC000) as usize;
        if offset < BANK_SIZE {
            offset
        } else {
            self.switchable_bank() * BANK_SIZE + (offset - BANK_SIZE)
        }
    }
}

impl Memory for Wram {
    fn read_byte(&self, addr: u16) -> u8 {
        match addr {
            0xC000..=0xDFFF => self.banks[self.resolve(addr)],
            0xE000..=0xFDFF => {
                warn!("reading WRAM echo memory at 0x{:04X}", addr);
                self.banks[self.resolve(addr - 0x2000)]
            }
            0xFF70 => {
                #[cfg(feature = "cgb")]
                {
                    self.bank_index | 0xF8
                }
                #[cfg(not(feature = "cgb"))]
                {
                    0xFF
                }
            }
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],
            _ => {
                error!("WRAM read at unexpected address 0x{:04X}", addr);
                0xFF
            }
        }
    }

    fn write_byte(&mut self, addr: u16, val: u8) {
        match addr {
            0xC000..=0xDFFF => {
                let idx = self.resolve(addr);
                self.banks[idx] = val;
            }
            0xE000..=0xFDFF => {
                warn!("writing WRAM echo memory at 0x{:04X}", addr);
                let idx = self.resolve(addr - 0x2000);
                self.banks[idx] = val;
            }
            0xFF70 => {
                #[cfg(feature = "cgb")]
                {
                    self.bank_index = val & 0x7;
                }
            }
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = val,
            _ => error!(
                "WRAM write at unexpected address 0x{:04X} of value 0x{:02X}",
                addr, val
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_region_mirrors_wram() {
        let mut w = Wram::power_on();
        w.write_byte(0xC010, 0x42);
        assert_eq!(w.read_byte(0xE010), 0x42);
    }

    #[test]
    fn hram_is_independent_of_echo_region() {
        let mut w = Wram::power_on();
        w.write_byte(0xFF80, 0x7);
        assert_eq!(w.read_byte(0xFF80), 0x7);
        assert_eq!(w.read_byte(0xC000), 0x0);
    }
}
