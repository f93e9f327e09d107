//! The SM83 fetch/decode/execute engine.
//!
//! `Cpu::tick` performs exactly one machine cycle: at most one memory
//! transaction, selected by `mupc`. `mupc == 0` means the CPU is at an
//! instruction boundary and about to fetch a fresh opcode (or, if an
//! interrupt is pending and enabled, to begin servicing it instead). An
//! opcode's documented cycle count always includes that fetch as its first
//! cycle; single-cycle instructions (pure register effects with no memory
//! access beyond the fetch) execute their effect in the same tick as the
//! fetch, since no further bus transaction is needed to complete them.

mod alu;
pub mod decode;

use crate::mmu::Memory;
use crate::registers::{Reg16, Reg8, Registers, FLAG_C, FLAG_H, FLAG_N, FLAG_Z};
use decode::decode as decode_fields;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecState {
    /// About to fetch a fresh opcode (or dispatch a pending interrupt).
    Boundary,
    /// Mid-instruction; `ir`/`mupc` describe where we are.
    Running,
    /// Servicing the interrupt service routine for the given vector.
    Interrupt(u8),
}

#[derive(Debug, Clone, Copy)]
pub struct CpuTrace {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
}

pub struct Cpu {
    pub regs: Registers,
    /// 9-bit instruction register: bit 8 set means the low byte is a CB suffix.
    ir: u16,
    /// Micro-step counter within the current instruction; 0 == boundary.
    mupc: u8,
    pub ime: bool,
    /// Countdown used to implement EI's one-instruction delay: 2 when EI just
    /// executed, decremented at each boundary, IME is set when it hits 0.
    ei_delay: u8,
    pub halted: bool,
    state: ExecState,
}

impl Cpu {
    pub fn power_on() -> Self {
        Cpu {
            regs: Registers::power_on(),
            ir: 0,
            mupc: 0,
            ime: false,
            ei_delay: 0,
            halted: false,
            state: ExecState::Boundary,
        }
    }

    pub fn pc(&self) -> u16 {
        self.regs.pc
    }

    pub fn at_boundary(&self) -> bool {
        matches!(self.state, ExecState::Boundary)
    }

    pub fn trace(&self) -> CpuTrace {
        CpuTrace {
            a: self.regs.a,
            f: self.regs.f,
            b: self.regs.b,
            c: self.regs.c,
            d: self.regs.d,
            e: self.regs.e,
            h: self.regs.h,
            l: self.regs.l,
            sp: self.regs.sp,
            pc: self.regs.pc,
        }
    }

    /// Advances the CPU by exactly one machine cycle.
    pub fn tick<M: Memory>(&mut self, mmu: &mut M) {
        if self.halted {
            self.tick_halted(mmu);
            return;
        }
        match self.state {
            ExecState::Boundary => self.fetch_or_dispatch(mmu),
            ExecState::Running => self.step_opcode(mmu),
            ExecState::Interrupt(vector) => self.step_interrupt(mmu, vector),
        }
    }

    fn tick_halted<M: Memory>(&mut self, mmu: &mut M) {
        self.tick_ei_delay();
        let pending = mmu.read_byte(0xFFFF) & mmu.read_byte(0xFF0F) & 0x1F;
        if pending != 0 {
            self.halted = false;
            if self.ime {
                let bit = pending.trailing_zeros() as u8;
                self.state = ExecState::Interrupt(0x40 + bit * 8);
                self.mupc = 0;
            } else {
                // HALT never consumed the overlapped fetch, so PC is still
                // correct; the next tick performs a fresh fetch.
                self.state = ExecState::Boundary;
                self.mupc = 0;
            }
        }
    }

    fn tick_ei_delay(&mut self) {
        if self.ei_delay > 0 {
            self.ei_delay -= 1;
            if self.ei_delay == 0 {
                self.ime = true;
            }
        }
    }

    fn fetch_or_dispatch<M: Memory>(&mut self, mmu: &mut M) {
        self.tick_ei_delay();
        if self.ime {
            let pending = mmu.read_byte(0xFFFF) & mmu.read_byte(0xFF0F) & 0x1F;
            if pending != 0 {
                let bit = pending.trailing_zeros() as u8;
                self.state = ExecState::Interrupt(0x40 + bit * 8);
                self.mupc = 0;
                return;
            }
        }
        let opcode = mmu.read_byte(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.ir = opcode as u16;
        let total = primary_total_cycles(opcode, &self.regs);
        if total == 1 {
            self.exec_primary(mmu, opcode, 0);
            self.state = ExecState::Boundary;
            self.mupc = 0;
        } else {
            self.state = ExecState::Running;
            self.mupc = 1;
        }
    }

    fn step_opcode<M: Memory>(&mut self, mmu: &mut M) {
        if self.ir & 0x100 != 0 || self.ir as u8 == 0xCB {
            self.step_cb(mmu);
            return;
        }
        let opcode = self.ir as u8;
        let total = primary_total_cycles(opcode, &self.regs);
        let mupc = self.mupc;
        self.exec_primary(mmu, opcode, mupc);
        if mupc >= total - 1 {
            self.state = ExecState::Boundary;
            self.mupc = 0;
        } else {
            self.mupc += 1;
        }
    }

    fn step_cb<M: Memory>(&mut self, mmu: &mut M) {
        // mupc 1: fetch suffix byte. Register targets finish here; (HL)
        // targets need the extra read (and, for non-BIT ops, a write-back).
        if self.mupc == 1 {
            let suffix = mmu.read_byte(self.regs.pc);
            self.regs.pc = self.regs.pc.wrapping_add(1);
            self.ir = 0x100 | suffix as u16;
            let f = decode_fields(suffix);
            if f.z != 6 {
                self.exec_cb_register(f);
                self.state = ExecState::Boundary;
                self.mupc = 0;
            } else {
                self.mupc = 2;
            }
            return;
        }
        let f = decode_fields(self.ir as u8);
        if self.mupc == 2 {
            self.regs.z = mmu.read_byte(self.regs.hl());
            if f.x == 1 {
                // BIT b,(HL): no write-back, finishes here.
                alu::bit(&mut self.regs, self.regs.z, f.y);
                self.state = ExecState::Boundary;
                self.mupc = 0;
            } else {
                self.mupc = 3;
            }
            return;
        }
        // mupc 3: compute and write back.
        let val = self.regs.z;
        let result = match f.x {
            0 => self.rot_op(f.y, val, false),
            2 => alu::res(val, f.y),
            3 => alu::set(val, f.y),
            _ => unreachable!(),
        };
        mmu.write_byte(self.regs.hl(), result);
        self.state = ExecState::Boundary;
        self.mupc = 0;
    }

    fn exec_cb_register(&mut self, f: decode::Fields) {
        let reg = Reg8::from_bits(f.z);
        let val = self.regs.read8_direct(reg);
        let result = match f.x {
            0 => self.rot_op(f.y, val, false),
            1 => {
                alu::bit(&mut self.regs, val, f.y);
                return;
            }
            2 => alu::res(val, f.y),
            3 => alu::set(val, f.y),
            _ => unreachable!(),
        };
        self.regs.write8_direct(reg, result);
    }

    fn rot_op(&mut self, y: u8, val: u8, is_accumulator: bool) -> u8 {
        match y {
            0 => alu::rlc(&mut self.regs, val, is_accumulator),
            1 => alu::rrc(&mut self.regs, val, is_accumulator),
            2 => alu::rl(&mut self.regs, val, is_accumulator),
            3 => alu::rr(&mut self.regs, val, is_accumulator),
            4 => alu::sla(&mut self.regs, val),
            5 => alu::sra(&mut self.regs, val),
            6 => alu::swap(&mut self.regs, val),
            7 => alu::srl(&mut self.regs, val),
            _ => unreachable!(),
        }
    }

    fn step_interrupt<M: Memory>(&mut self, mmu: &mut M, vector: u8) {
        match self.mupc {
            0 => {
                let bit = ((vector - 0x40) / 8).min(4);
                let iff = mmu.read_byte(0xFF0F);
                mmu.write_byte(0xFF0F, iff & !(1 << bit));
                self.ime = false;
                self.mupc = 1;
            }
            1 => {
                self.regs.sp = self.regs.sp.wrapping_sub(1);
                self.mupc = 2;
            }
            2 => {
                mmu.write_byte(self.regs.sp, (self.regs.pc >> 8) as u8);
                self.regs.sp = self.regs.sp.wrapping_sub(1);
                self.mupc = 3;
            }
            3 => {
                mmu.write_byte(self.regs.sp, self.regs.pc as u8);
                self.mupc = 4;
            }
            4 => {
                self.regs.pc = vector as u16;
                let opcode = mmu.read_byte(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.ir = opcode as u16;
                let total = primary_total_cycles(opcode, &self.regs);
                if total == 1 {
                    self.exec_primary(mmu, opcode, 0);
                    self.state = ExecState::Boundary;
                    self.mupc = 0;
                } else {
                    self.state = ExecState::Running;
                    self.mupc = 1;
                }
            }
            _ => unreachable!(),
        }
    }

    fn cond(&self, cc: u8) -> bool {
        match cc {
            0 => !self.regs.flag(FLAG_Z),
            1 => self.regs.flag(FLAG_Z),
            2 => !self.regs.flag(FLAG_C),
            3 => self.regs.flag(FLAG_C),
            _ => unreachable!(),
        }
    }

    fn push_rp2(p: u8) -> Reg16 {
        [Reg16::Bc, Reg16::De, Reg16::Hl, Reg16::Af][p as usize]
    }

    fn rp(p: u8) -> Reg16 {
        [Reg16::Bc, Reg16::De, Reg16::Hl, Reg16::Sp][p as usize]
    }

    /// Executes the effect of `opcode` that belongs to micro-step `mupc`.
    /// `mupc == 0` is only reached here for single-cycle opcodes (called
    /// directly from the fetch path); everything else runs for `mupc >= 1`.
    fn exec_primary<M: Memory>(&mut self, mmu: &mut M, opcode: u8, mupc: u8) {
        let f = decode_fields(opcode);
        match (f.x, f.z) {
            (0, 0) => self.exec_misc_x0z0(mmu, f.y, mupc),
            (0, 1) if f.q == 0 => self.exec_ld_rp_nn(mmu, f.p, mupc),
            (0, 1) => {
                // ADD HL,rp -- single internal cycle.
                let rhs = self.regs.read16(Self::rp(f.p));
                alu::add_hl(&mut self.regs, rhs);
            }
            (0, 2) => self.exec_ld_rp_ind_a(mmu, f.p, f.q),
            (0, 3) => {
                let pair = Self::rp(f.p);
                let v = self.regs.read16(pair);
                self.regs
                    .write16(pair, if f.q == 0 { v.wrapping_add(1) } else { v.wrapping_sub(1) });
            }
            (0, 4) => self.exec_inc_dec_r(mmu, f.y, mupc, true),
            (0, 5) => self.exec_inc_dec_r(mmu, f.y, mupc, false),
            (0, 6) => self.exec_ld_r_n(mmu, f.y, mupc),
            (0, 7) => self.exec_rotate_a_or_flags(f.y),
            (1, _) if f.y == 6 && f.z == 6 => self.halted = true,
            (1, _) => self.exec_ld_r_r(mmu, f.y, f.z, mupc),
            (2, _) => self.exec_alu_r(mmu, f.y, f.z, mupc),
            (3, 0) => self.exec_misc_x3z0(mmu, f.y, mupc),
            (3, 1) if f.q == 0 => self.exec_pop(mmu, f.p, mupc),
            (3, 1) => self.exec_misc_x3z1(mmu, f.p, mupc),
            (3, 2) => self.exec_misc_x3z2(mmu, f.y, mupc),
            (3, 3) => self.exec_misc_x3z3(f.y),
            (3, 4) => self.exec_call(mmu, Some(f.y), mupc),
            (3, 5) if f.q == 0 => self.exec_push(mmu, f.p, mupc),
            (3, 5) => self.exec_call(mmu, None, mupc),
            (3, 6) => self.exec_alu_n(mmu, f.y, mupc),
            (3, 7) => self.exec_rst(mmu, f.y, mupc),
            _ => unreachable!(),
        }
    }

    fn exec_misc_x0z0<M: Memory>(&mut self, mmu: &mut M, y: u8, mupc: u8) {
        match y {
            0 => {} // NOP
            1 => {
                // LD (nn),SP
                match mupc {
                    1 => self.regs.z = mmu.read_byte(self.regs.pc),
                    2 => {
                        self.regs.w = mmu.read_byte(self.regs.pc.wrapping_add(1));
                        self.regs.pc = self.regs.pc.wrapping_add(2);
                    }
                    3 => mmu.write_byte(self.regs.wz(), self.regs.sp as u8),
                    4 => mmu.write_byte(self.regs.wz().wrapping_add(1), (self.regs.sp >> 8) as u8),
                    _ => {}
                }
            }
            2 => {
                // STOP: consume the padding byte on its one real cycle.
                if mupc == 1 {
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                }
            }
            3 => {
                // JR e
                if mupc == 1 {
                    self.regs.z = mmu.read_byte(self.regs.pc);
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                } else if mupc == 2 {
                    self.regs.pc = self.regs.pc.wrapping_add(self.regs.z as i8 as i16 as u16);
                }
            }
            4..=7 => {
                let cc = y - 4;
                if mupc == 1 {
                    self.regs.z = mmu.read_byte(self.regs.pc);
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                } else if mupc == 2 && self.cond(cc) {
                    self.regs.pc = self.regs.pc.wrapping_add(self.regs.z as i8 as i16 as u16);
                }
            }
            _ => unreachable!(),
        }
    }

    fn exec_ld_rp_nn<M: Memory>(&mut self, mmu: &mut M, p: u8, mupc: u8) {
        match mupc {
            1 => {
                self.regs.z = mmu.read_byte(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
            }
            2 => {
                self.regs.w = mmu.read_byte(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                let v = self.regs.wz();
                self.regs.write16(Self::rp(p), v);
            }
            _ => unreachable!(),
        }
    }

    fn exec_ld_rp_ind_a<M: Memory>(&mut self, mmu: &mut M, p: u8, q: u8) {
        let addr = match p {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 | 3 => self.regs.hl(),
            _ => unreachable!(),
        };
        if q == 0 {
            mmu.write_byte(addr, self.regs.a);
        } else {
            self.regs.a = mmu.read_byte(addr);
        }
        if p == 2 {
            self.regs.set_hl(addr.wrapping_add(1));
        } else if p == 3 {
            self.regs.set_hl(addr.wrapping_sub(1));
        }
    }

    fn exec_inc_dec_r<M: Memory>(&mut self, mmu: &mut M, y: u8, mupc: u8, is_inc: bool) {
        let reg = Reg8::from_bits(y);
        if reg != Reg8::HlInd {
            let v = self.regs.read8_direct(reg);
            let r = if is_inc {
                alu::inc8(&mut self.regs, v)
            } else {
                alu::dec8(&mut self.regs, v)
            };
            self.regs.write8_direct(reg, r);
            return;
        }
        match mupc {
            1 => self.regs.z = mmu.read_byte(self.regs.hl()),
            2 => {
                let r = if is_inc {
                    alu::inc8(&mut self.regs, self.regs.z)
                } else {
                    alu::dec8(&mut self.regs, self.regs.z)
                };
                mmu.write_byte(self.regs.hl(), r);
            }
            _ => unreachable!(),
        }
    }

    fn exec_ld_r_n<M: Memory>(&mut self, mmu: &mut M, y: u8, mupc: u8) {
        let reg = Reg8::from_bits(y);
        if reg != Reg8::HlInd {
            if mupc == 1 {
                let n = mmu.read_byte(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.regs.write8_direct(reg, n);
            }
            return;
        }
        match mupc {
            1 => {
                self.regs.z = mmu.read_byte(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
            }
            2 => mmu.write_byte(self.regs.hl(), self.regs.z),
            _ => unreachable!(),
        }
    }

    fn exec_rotate_a_or_flags(&mut self, y: u8) {
        match y {
            0 => {
                let v = self.regs.a;
                self.regs.a = alu::rlc(&mut self.regs, v, true);
            }
            1 => {
                let v = self.regs.a;
                self.regs.a = alu::rrc(&mut self.regs, v, true);
            }
            2 => {
                let v = self.regs.a;
                self.regs.a = alu::rl(&mut self.regs, v, true);
            }
            3 => {
                let v = self.regs.a;
                self.regs.a = alu::rr(&mut self.regs, v, true);
            }
            4 => alu::daa(&mut self.regs),
            5 => {
                self.regs.a = !self.regs.a;
                self.regs.set_flag(FLAG_N, true);
                self.regs.set_flag(FLAG_H, true);
            }
            6 => {
                self.regs.set_flag(FLAG_N, false);
                self.regs.set_flag(FLAG_H, false);
                self.regs.set_flag(FLAG_C, true);
            }
            7 => {
                self.regs.set_flag(FLAG_N, false);
                self.regs.set_flag(FLAG_H, false);
                let c = self.regs.flag(FLAG_C);
                self.regs.set_flag(FLAG_C, !c);
            }
            _ => unreachable!(),
        }
    }

    fn exec_ld_r_r<M: Memory>(&mut self, mmu: &mut M, y: u8, z: u8, mupc: u8) {
        let dst = Reg8::from_bits(y);
        let src = Reg8::from_bits(z);
        if dst != Reg8::HlInd && src != Reg8::HlInd {
            let v = self.regs.read8_direct(src);
            self.regs.write8_direct(dst, v);
            return;
        }
        if mupc != 1 {
            return;
        }
        if src == Reg8::HlInd {
            let v = mmu.read_byte(self.regs.hl());
            self.regs.write8_direct(dst, v);
        } else {
            let v = self.regs.read8_direct(src);
            mmu.write_byte(self.regs.hl(), v);
        }
    }

    fn alu_op(&mut self, y: u8, rhs: u8) {
        match y {
            0 => alu::add(&mut self.regs, rhs, false),
            1 => alu::add(&mut self.regs, rhs, true),
            2 => alu::sub(&mut self.regs, rhs, false, true),
            3 => alu::sub(&mut self.regs, rhs, true, true),
            4 => alu::and(&mut self.regs, rhs),
            5 => alu::xor(&mut self.regs, rhs),
            6 => alu::or(&mut self.regs, rhs),
            7 => alu::sub(&mut self.regs, rhs, false, false),
            _ => unreachable!(),
        }
    }

    fn exec_alu_r<M: Memory>(&mut self, mmu: &mut M, y: u8, z: u8, mupc: u8) {
        let reg = Reg8::from_bits(z);
        if reg != Reg8::HlInd {
            let rhs = self.regs.read8_direct(reg);
            self.alu_op(y, rhs);
            return;
        }
        if mupc == 1 {
            let rhs = mmu.read_byte(self.regs.hl());
            self.alu_op(y, rhs);
        }
    }

    fn exec_alu_n<M: Memory>(&mut self, mmu: &mut M, y: u8, mupc: u8) {
        if mupc == 1 {
            let n = mmu.read_byte(self.regs.pc);
            self.regs.pc = self.regs.pc.wrapping_add(1);
            self.alu_op(y, n);
        }
    }

    fn push_byte<M: Memory>(&mut self, mmu: &mut M, val: u8) {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        mmu.write_byte(self.regs.sp, val);
    }

    fn pop_byte<M: Memory>(&mut self, mmu: &mut M) -> u8 {
        let v = mmu.read_byte(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        v
    }

    fn exec_push<M: Memory>(&mut self, mmu: &mut M, p: u8, mupc: u8) {
        let pair = Self::push_rp2(p);
        let v = self.regs.read16(pair);
        match mupc {
            1 => {}
            2 => self.push_byte(mmu, (v >> 8) as u8),
            3 => self.push_byte(mmu, v as u8),
            _ => unreachable!(),
        }
    }

    fn exec_pop<M: Memory>(&mut self, mmu: &mut M, p: u8, mupc: u8) {
        match mupc {
            1 => self.regs.z = self.pop_byte(mmu),
            2 => {
                self.regs.w = self.pop_byte(mmu);
                let v = self.regs.wz();
                self.regs.write16(Self::push_rp2(p), v);
            }
            _ => unreachable!(),
        }
    }

    fn exec_misc_x3z0<M: Memory>(&mut self, mmu: &mut M, y: u8, mupc: u8) {
        match y {
            0..=3 => {
                let cc = y;
                match mupc {
                    1 => {
                        if !self.cond(cc) {
                            return;
                        }
                    }
                    2 => {
                        if self.cond(cc) {
                            self.regs.z = self.pop_byte(mmu);
                        }
                    }
                    3 => {
                        if self.cond(cc) {
                            self.regs.w = self.pop_byte(mmu);
                        }
                    }
                    4 => {
                        if self.cond(cc) {
                            self.regs.pc = self.regs.wz();
                        }
                    }
                    _ => unreachable!(),
                }
            }
            4 => {
                // LDH (n),A
                match mupc {
                    1 => {
                        self.regs.z = mmu.read_byte(self.regs.pc);
                        self.regs.pc = self.regs.pc.wrapping_add(1);
                    }
                    2 => mmu.write_byte(0xFF00 + self.regs.z as u16, self.regs.a),
                    _ => unreachable!(),
                }
            }
            5 => {
                // ADD SP,e
                match mupc {
                    1 => {
                        self.regs.z = mmu.read_byte(self.regs.pc);
                        self.regs.pc = self.regs.pc.wrapping_add(1);
                    }
                    2 => {}
                    3 => {
                        let (result, half, carry) = alu::add_sp_signed(self.regs.sp, self.regs.z);
                        self.regs.sp = result;
                        self.regs.set_flag(FLAG_Z, false);
                        self.regs.set_flag(FLAG_N, false);
                        self.regs.set_flag(FLAG_H, half);
                        self.regs.set_flag(FLAG_C, carry);
                    }
                    _ => unreachable!(),
                }
            }
            6 => {
                // LDH A,(n)
                match mupc {
                    1 => {
                        self.regs.z = mmu.read_byte(self.regs.pc);
                        self.regs.pc = self.regs.pc.wrapping_add(1);
                    }
                    2 => self.regs.a = mmu.read_byte(0xFF00 + self.regs.z as u16),
                    _ => unreachable!(),
                }
            }
            7 => {
                // LD HL,SP+e
                if mupc == 1 {
                    self.regs.z = mmu.read_byte(self.regs.pc);
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                } else if mupc == 2 {
                    let (result, half, carry) = alu::add_sp_signed(self.regs.sp, self.regs.z);
                    self.regs.set_hl(result);
                    self.regs.set_flag(FLAG_Z, false);
                    self.regs.set_flag(FLAG_N, false);
                    self.regs.set_flag(FLAG_H, half);
                    self.regs.set_flag(FLAG_C, carry);
                }
            }
            _ => unreachable!(),
        }
    }

    fn exec_misc_x3z1<M: Memory>(&mut self, mmu: &mut M, p: u8, mupc: u8) {
        match p {
            0 | 1 => {
                // RET / RETI
                match mupc {
                    1 => self.regs.z = self.pop_byte(mmu),
                    2 => self.regs.w = self.pop_byte(mmu),
                    3 => {
                        self.regs.pc = self.regs.wz();
                        if p == 1 {
                            self.ime = true;
                        }
                    }
                    _ => unreachable!(),
                }
            }
            2 => self.regs.pc = self.regs.hl(), // JP HL
            3 => self.regs.sp = self.regs.hl(), // LD SP,HL
            _ => unreachable!(),
        }
    }

    fn exec_misc_x3z2<M: Memory>(&mut self, mmu: &mut M, y: u8, mupc: u8) {
        match y {
            0..=3 => self.exec_jp_cc(mmu, y, mupc),
            4 => mmu.write_byte(0xFF00 + self.regs.c as u16, self.regs.a),
            5 => self.exec_ld_nn_a(mmu, mupc),
            6 => self.regs.a = mmu.read_byte(0xFF00 + self.regs.c as u16),
            7 => self.exec_ld_a_nn(mmu, mupc),
            _ => unreachable!(),
        }
    }

    fn exec_jp_cc<M: Memory>(&mut self, mmu: &mut M, cc: u8, mupc: u8) {
        match mupc {
            1 => {
                self.regs.z = mmu.read_byte(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
            }
            2 => {
                self.regs.w = mmu.read_byte(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
            }
            3 => {
                if self.cond(cc) {
                    self.regs.pc = self.regs.wz();
                }
            }
            _ => unreachable!(),
        }
    }

    fn exec_ld_nn_a<M: Memory>(&mut self, mmu: &mut M, mupc: u8) {
        match mupc {
            1 => {
                self.regs.z = mmu.read_byte(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
            }
            2 => {
                self.regs.w = mmu.read_byte(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
            }
            3 => mmu.write_byte(self.regs.wz(), self.regs.a),
            _ => unreachable!(),
        }
    }

    fn exec_ld_a_nn<M: Memory>(&mut self, mmu: &mut M, mupc: u8) {
        match mupc {
            1 => {
                self.regs.z = mmu.read_byte(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
            }
            2 => {
                self.regs.w = mmu.read_byte(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
            }
            3 => self.regs.a = mmu.read_byte(self.regs.wz()),
            _ => unreachable!(),
        }
    }

    fn exec_misc_x3z3(&mut self, y: u8) {
        match y {
            6 => self.ime = false,
            7 => self.ei_delay = 2,
            _ => {} // illegal opcode slots decay to NOP
        }
    }

    fn exec_call<M: Memory>(&mut self, mmu: &mut M, cc: Option<u8>, mupc: u8) {
        match mupc {
            1 => {
                self.regs.z = mmu.read_byte(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
            }
            2 => {
                self.regs.w = mmu.read_byte(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
            }
            3 => {
                if let Some(cc) = cc {
                    if !self.cond(cc) {
                        return;
                    }
                }
            }
            4 => {
                if let Some(cc) = cc {
                    if !self.cond(cc) {
                        return;
                    }
                }
                self.push_byte(mmu, (self.regs.pc >> 8) as u8);
            }
            5 => {
                if let Some(cc) = cc {
                    if !self.cond(cc) {
                        return;
                    }
                }
                self.push_byte(mmu, self.regs.pc as u8);
                self.regs.pc = self.regs.wz();
            }
            _ => unreachable!(),
        }
    }

    fn exec_rst<M: Memory>(&mut self, mmu: &mut M, y: u8, mupc: u8) {
        match mupc {
            1 => {}
            2 => self.push_byte(mmu, (self.regs.pc >> 8) as u8),
            3 => {
                self.push_byte(mmu, self.regs.pc as u8);
                self.regs.pc = (y as u16) * 8;
            }
            _ => unreachable!(),
        }
    }
}

/// Number of machine cycles `opcode` takes, including its own fetch.
/// Branch instructions vary with the condition, which is already resolved
/// (flags don't change mid-fetch), so this can be computed up front.
fn primary_total_cycles(opcode: u8, regs: &Registers) -> u8 {
    let f = decode_fields(opcode);
    let is_hl = |idx: u8| Reg8::from_bits(idx) == Reg8::HlInd;
    match (f.x, f.z) {
        (0, 0) => match f.y {
            0 => 1,
            1 => 5,
            2 => 1,
            3 => 3,
            4..=7 => {
                if cond_static(regs, f.y - 4) {
                    3
                } else {
                    2
                }
            }
            _ => unreachable!(),
        },
        (0, 1) => {
            if f.q == 0 {
                3
            } else {
                2
            }
        }
        (0, 2) => 2,
        (0, 3) => 2,
        (0, 4) | (0, 5) => {
            if is_hl(f.y) {
                3
            } else {
                1
            }
        }
        (0, 6) => {
            if is_hl(f.y) {
                3
            } else {
                2
            }
        }
        (0, 7) => 1,
        (1, _) => {
            if f.y == 6 && f.z == 6 {
                1
            } else if is_hl(f.y) || is_hl(f.z) {
                2
            } else {
                1
            }
        }
        (2, _) => {
            if is_hl(f.z) {
                2
            } else {
                1
            }
        }
        (3, 0) => match f.y {
            0..=3 => {
                if cond_static(regs, f.y) {
                    5
                } else {
                    2
                }
            }
            4 | 6 | 7 => 3,
            5 => 4,
            _ => unreachable!(),
        },
        (3, 1) => {
            if f.q == 0 {
                3
            } else {
                match f.p {
                    0 | 1 => 4,
                    2 => 1,
                    3 => 2,
                    _ => unreachable!(),
                }
            }
        }
        (3, 2) => match f.y {
            0..=3 => {
                if cond_static(regs, f.y) {
                    4
                } else {
                    3
                }
            }
            4 | 6 => 2,
            5 | 7 => 4,
            _ => unreachable!(),
        },
        (3, 3) => match f.y {
            0 => 4,
            1 => 2, // CB prefix's own total is irrelevant; step_cb drives it
            6 | 7 => 1,
            _ => 1,
        },
        (3, 4) => {
            if cond_static(regs, f.y) {
                6
            } else {
                3
            }
        }
        (3, 5) => {
            if f.q == 0 {
                4
            } else {
                6
            }
        }
        (3, 6) => 2,
        (3, 7) => 4,
        _ => 1,
    }
}

fn cond_static(regs: &Registers, cc: u8) -> bool {
    match cc {
        0 => !regs.flag(FLAG_Z),
        1 => regs.flag(FLAG_Z),
        2 => !regs.flag(FLAG_C),
        3 => regs.flag(FLAG_C),
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlatMem(Vec<u8>);
    impl Memory for FlatMem {
        fn read_byte(&self, addr: u16) -> u8 {
            self.0[addr as usize]
        }
        fn write_byte(&mut self, addr: u16, val: u8) {
            self.0[addr as usize] = val;
        }
    }

    fn blank_mem() -> FlatMem {
        FlatMem(vec![0u8; 0x1_0000])
    }

    #[test]
    fn nop_advances_pc_by_one_in_one_cycle() {
        let mut mem = blank_mem();
        mem.0[0x100] = 0x00; // NOP
        mem.0[0x101] = 0x00;
        let mut cpu = Cpu::power_on();
        cpu.tick(&mut mem);
        assert_eq!(cpu.pc(), 0x101);
        assert!(cpu.at_boundary());
    }

    #[test]
    fn ld_b_n8_takes_two_cycles_and_sets_register() {
        let mut mem = blank_mem();
        mem.0[0x100] = 0x06; // LD B,n8
        mem.0[0x101] = 0x42;
        let mut cpu = Cpu::power_on();
        cpu.tick(&mut mem);
        assert!(!cpu.at_boundary());
        cpu.tick(&mut mem);
        assert!(cpu.at_boundary());
        assert_eq!(cpu.regs.b, 0x42);
        assert_eq!(cpu.pc(), 0x102);
    }

    #[test]
    fn interrupt_dispatches_to_vblank_vector() {
        let mut mem = blank_mem();
        mem.0[0x100] = 0x00; // NOP, never reached
        mem.0[0xFFFF] = 0x1F; // IE: all enabled
        mem.0[0xFF0F] = 0x01; // IF: VBlank pending
        let mut cpu = Cpu::power_on();
        cpu.ime = true;
        for _ in 0..5 {
            cpu.tick(&mut mem);
        }
        assert_eq!(cpu.pc(), 0x41);
        assert_eq!(mem.read_byte(0xFF0F), 0x00);
        assert!(!cpu.ime);
    }

    #[test]
    fn ei_takes_effect_after_the_following_instruction() {
        let mut mem = blank_mem();
        mem.0[0x100] = 0xFB; // EI
        mem.0[0x101] = 0x00; // NOP
        mem.0[0x102] = 0x00; // NOP
        let mut cpu = Cpu::power_on();
        cpu.tick(&mut mem); // EI completes
        assert!(!cpu.ime);
        cpu.tick(&mut mem); // NOP completes; ime becomes true at this boundary
        assert!(cpu.ime);
    }
}
