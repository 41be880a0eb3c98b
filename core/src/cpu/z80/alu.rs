use crate::bus::AddressSpace;
use crate::device::ReadMode;
use crate::cpu::z80::{ExecState, Flag, IndexMode, Z80};

impl Z80 {
    // --- Flag Helpers ---

    pub(crate) fn get_parity(val: u8) -> bool {
        val.count_ones() % 2 == 0
    }

    fn update_flags_logic(&mut self, result: u8, is_and: bool) {
        let mut f = 0;
        if result == 0 { f |= Flag::Z as u8; }
        if (result & 0x80) != 0 { f |= Flag::S as u8; }
        if Self::get_parity(result) { f |= Flag::PV as u8; }
        if is_and { f |= Flag::H as u8; } // AND sets H, others clear it
        // N is 0, C is 0

        // Undocumented X/Y
        f |= result & (Flag::X as u8 | Flag::Y as u8);
        self.f = f;
    }

    fn do_add(&mut self, val: u8, carry_in: bool) {
        let a = self.a;
        let c_val = if carry_in && (self.f & Flag::C as u8) != 0 { 1 } else { 0 };
        let result_u16 = (a as u16) + (val as u16) + (c_val as u16);
        let result = result_u16 as u8;

        let mut f = 0;
        if result == 0 { f |= Flag::Z as u8; }
        if (result & 0x80) != 0 { f |= Flag::S as u8; }
        // H: ((A & 0xF) + (val & 0xF) + c) > 0xF
        if ((a & 0xF) + (val & 0xF) + (c_val as u8)) > 0xF { f |= Flag::H as u8; }
        // P/V: Overflow = (op1 ^ res) & (op2 ^ res) & 0x80
        if ((a ^ result) & (val ^ result) & 0x80) != 0 { f |= Flag::PV as u8; }
        // N: 0
        // C: result > 0xFF
        if result_u16 > 0xFF { f |= Flag::C as u8; }

        f |= result & (Flag::X as u8 | Flag::Y as u8);
        self.a = result;
        self.f = f;
    }

    fn do_sub(&mut self, val: u8, carry_in: bool) {
        let a = self.a;
        let c_val = if carry_in && (self.f & Flag::C as u8) != 0 { 1 } else { 0 };
        let result_u16 = (a as u16).wrapping_sub(val as u16).wrapping_sub(c_val as u16);
        let result = result_u16 as u8;

        let mut f = Flag::N as u8;
        if result == 0 { f |= Flag::Z as u8; }
        if (result & 0x80) != 0 { f |= Flag::S as u8; }
        // H: (A & 0xF) < ((val & 0xF) + c)
        if (a & 0xF) < ((val & 0xF) + (c_val as u8)) { f |= Flag::H as u8; }
        // P/V: Overflow = (op1 ^ op2) & (op1 ^ res) & 0x80
        if ((a ^ val) & (a ^ result) & 0x80) != 0 { f |= Flag::PV as u8; }
        // C: Borrow
        if result_u16 > 0xFF { f |= Flag::C as u8; }

        f |= result & (Flag::X as u8 | Flag::Y as u8);
        self.a = result;
        self.f = f;
    }

    fn do_cp(&mut self, val: u8) {
        let a = self.a;
        let result_u16 = (a as u16).wrapping_sub(val as u16);
        let result = result_u16 as u8;

        let mut f = Flag::N as u8;
        if result == 0 { f |= Flag::Z as u8; }
        if (result & 0x80) != 0 { f |= Flag::S as u8; }
        if (a & 0xF) < (val & 0xF) { f |= Flag::H as u8; }
        if ((a ^ val) & (a ^ result) & 0x80) != 0 { f |= Flag::PV as u8; }
        if result_u16 > 0xFF { f |= Flag::C as u8; }

        // X/Y come from the operand for CP, not result (usually)
        // But standard behavior often copies from operand.
        // For now, let's use operand bits 3 and 5.
        f |= val & (Flag::X as u8 | Flag::Y as u8);
        self.f = f;
    }

    fn perform_alu_op(&mut self, op: u8, val: u8) {
        match op {
            0 => self.do_add(val, false), // ADD
            1 => self.do_add(val, true),  // ADC
            2 => self.do_sub(val, false), // SUB
            3 => self.do_sub(val, true),  // SBC
            4 => { self.a &= val; self.update_flags_logic(self.a, true); }, // AND
            5 => { self.a ^= val; self.update_flags_logic(self.a, false); }, // XOR
            6 => { self.a |= val; self.update_flags_logic(self.a, false); }, // OR
            7 => self.do_cp(val),         // CP
            _ => unreachable!(),
        }
    }

    // --- Instructions ---

    /// ALU A, r
    /// ADD, ADC, SUB, SBC, AND, XOR, OR, CP
    /// Opcode mask: 10 xxx zzz
    pub fn op_alu_r(
        &mut self,
        opcode: u8,
        cycle: u8,
        bus: &AddressSpace,
    ) {
        let alu_op = (opcode >> 3) & 0x07;
        let r = opcode & 0x07;

        if r == 6 {
            if self.index_mode == IndexMode::HL {
                // ALU A, (HL) — 7 T: cycles 1-4
                match cycle {
                    1 | 3 => self.state = ExecState::Execute(opcode, cycle + 1),
                    2 => {
                        let addr = self.get_hl();
                        let val = bus.read(addr, ReadMode::Read);
                        self.perform_alu_op(alu_op, val);
                        self.state = ExecState::Execute(opcode, 3);
                    }
                    4 => self.state = ExecState::Fetch,
                    _ => unreachable!(),
                }
            } else {
                // ALU A, (IX+d) — 19 T: cycles 1-12
                // 1=pad, 2=read d, 3=pad, 4-8=internal, 9=pad, 10=read (IX/IY+d), 11=pad, 12=done
                match cycle {
                    1 | 3 | 4 | 5 | 6 | 7 | 8 | 9 | 11 => {
                        self.state = ExecState::Execute(opcode, cycle + 1);
                    }
                    2 => {
                        self.temp_data = bus.read(self.pc, ReadMode::Read);
                        self.pc = self.pc.wrapping_add(1);
                        self.state = ExecState::Execute(opcode, 3);
                    }
                    10 => {
                        let addr = self.get_index_addr();
                        let val = bus.read(addr, ReadMode::Read);
                        self.memptr = addr;
                        self.perform_alu_op(alu_op, val);
                        self.state = ExecState::Execute(opcode, 11);
                    }
                    12 => self.state = ExecState::Fetch,
                    _ => unreachable!(),
                }
            }
        } else {
            // ALU A, r
            let val = self.get_reg8(r);
            self.perform_alu_op(alu_op, val);
            self.state = ExecState::Fetch;
        }
    }

    /// ALU A, n
    /// Opcode mask: 11 xxx 110
    pub fn op_alu_n(
        &mut self,
        opcode: u8,
        cycle: u8,
        bus: &AddressSpace,
    ) {
        let alu_op = (opcode >> 3) & 0x07;

        // ALU A, n — 7 T: cycles 1-4
        match cycle {
            1 | 3 => self.state = ExecState::Execute(opcode, cycle + 1),
            2 => {
                let val = bus.read(self.pc, ReadMode::Read);
                self.pc = self.pc.wrapping_add(1);
                self.perform_alu_op(alu_op, val);
                self.state = ExecState::Execute(opcode, 3);
            }
            4 => self.state = ExecState::Fetch,
            _ => unreachable!(),
        }
    }

    /// INC/DEC r
    /// Opcode mask: 00 rrr 10x
    pub fn op_inc_dec_r(
        &mut self,
        opcode: u8,
        cycle: u8,
        bus: &AddressSpace,
    ) {
        let r = (opcode >> 3) & 0x07;
        let is_dec = (opcode & 0x01) != 0;

        if r == 6 {
            if self.index_mode == IndexMode::HL {
                // INC/DEC (HL) — 11 T: cycles 1-8
                // 1=pad, 2=read (HL), 3-4=pad, 5=internal (compute), 6=write, 7=pad, 8=done
                match cycle {
                    1 | 3 | 4 | 7 => self.state = ExecState::Execute(opcode, cycle + 1),
                    2 => {
                        let addr = self.get_hl();
                        self.temp_data = bus.read(addr, ReadMode::Read);
                        self.temp_addr = addr;
                        self.state = ExecState::Execute(opcode, 3);
                    }
                    5 => {
                        self.temp_data = if is_dec {
                            self.calc_dec_flags(self.temp_data)
                        } else {
                            self.calc_inc_flags(self.temp_data)
                        };
                        self.state = ExecState::Execute(opcode, 6);
                    }
                    6 => {
                        bus.write(self.temp_addr, self.temp_data);
                        self.state = ExecState::Execute(opcode, 7);
                    }
                    8 => self.state = ExecState::Fetch,
                    _ => unreachable!(),
                }
            } else {
                // INC/DEC (IX+d) — 23 T: cycles 1-16
                // 1=pad, 2=read d, 3-9=internal, 10=read old value, 11=pad,
                // 12=internal (compute), 13=pad, 14=write new value, 15=pad, 16=done
                match cycle {
                    1 | 3 | 4 | 5 | 6 | 7 | 8 | 9 | 11 | 13 | 15 => {
                        self.state = ExecState::Execute(opcode, cycle + 1);
                    }
                    2 => {
                        self.temp_addr = bus.read(self.pc, ReadMode::Read) as u16;
                        self.pc = self.pc.wrapping_add(1);
                        self.state = ExecState::Execute(opcode, 3);
                    }
                    10 => {
                        let base = match self.index_mode {
                            IndexMode::IX => self.ix,
                            IndexMode::IY => self.iy,
                            _ => unreachable!(),
                        };
                        let addr = base.wrapping_add(self.temp_addr as i8 as i16 as u16);
                        self.temp_addr = addr;
                        self.temp_data = bus.read(addr, ReadMode::Read);
                        self.memptr = addr;
                        self.state = ExecState::Execute(opcode, 11);
                    }
                    12 => {
                        self.temp_data = if is_dec {
                            self.calc_dec_flags(self.temp_data)
                        } else {
                            self.calc_inc_flags(self.temp_data)
                        };
                        self.state = ExecState::Execute(opcode, 13);
                    }
                    14 => {
                        bus.write(self.temp_addr, self.temp_data);
                        self.state = ExecState::Execute(opcode, 15);
                    }
                    16 => self.state = ExecState::Fetch,
                    _ => unreachable!(),
                }
            }
        } else {
            // INC/DEC r
            let val = self.get_reg8(r);
            let result = if is_dec {
                self.calc_dec_flags(val)
            } else {
                self.calc_inc_flags(val)
            };
            self.set_reg8(r, result);
            self.state = ExecState::Fetch;
        }
    }

    fn calc_inc_flags(&mut self, val: u8) -> u8 {
        let result = val.wrapping_add(1);
        let mut f = self.f & Flag::C as u8; // Preserve C
        if result == 0 { f |= Flag::Z as u8; }
        if (result & 0x80) != 0 { f |= Flag::S as u8; }
        if (val & 0xF) == 0xF { f |= Flag::H as u8; }
        if val == 0x7F { f |= Flag::PV as u8; } // Overflow 7F -> 80
        // N is 0
        f |= result & (Flag::X as u8 | Flag::Y as u8);
        self.f = f;
        result
    }

    fn calc_dec_flags(&mut self, val: u8) -> u8 {
        let result = val.wrapping_sub(1);
        let mut f = (self.f & Flag::C as u8) | Flag::N as u8; // Preserve C, Set N
        if result == 0 { f |= Flag::Z as u8; }
        if (result & 0x80) != 0 { f |= Flag::S as u8; }
        if (val & 0xF) == 0x0 { f |= Flag::H as u8; } // Borrow from bit 4
        if val == 0x80 { f |= Flag::PV as u8; } // Overflow 80 -> 7F
        f |= result & (Flag::X as u8 | Flag::Y as u8);
        self.f = f;
        result
    }

    /// S, Z, PV(parity), X/Y from the new A; H=0, N=0; C preserved. Shared by RRD/RLD.
    fn update_rotate_digit_flags(&mut self) {
        let a = self.a;
        let mut f = self.f & Flag::C as u8;
        if a == 0 { f |= Flag::Z as u8; }
        if (a & 0x80) != 0 { f |= Flag::S as u8; }
        if Self::get_parity(a) { f |= Flag::PV as u8; }
        f |= a & (Flag::X as u8 | Flag::Y as u8);
        self.f = f;
    }

    /// RRD — 18T: Main M1(4) + ED M1(4) + MR(3) + internal(4) + MW(3)
    /// (HL) high nibble ← A low nibble (old); (HL) low nibble ← (HL) high nibble (old);
    /// A low nibble ← (HL) low nibble (old). A high nibble untouched.
    /// 11 handler cycles: 0=pad, 1=read(HL), 2-5=internal, 6=compute, 7=write(HL), 8-9=pad, 10=done
    pub fn op_rrd(
        &mut self,
        opcode: u8,
        cycle: u8,
        bus: &AddressSpace,
    ) {
        match cycle {
            0 | 2 | 3 | 4 | 5 | 8 | 9 => self.state = ExecState::ExecuteED(opcode, cycle + 1),
            1 => {
                self.temp_addr = self.get_hl();
                self.temp_data = bus.read(self.temp_addr, ReadMode::Read);
                self.state = ExecState::ExecuteED(opcode, 2);
            }
            6 => {
                let mem = self.temp_data;
                let a = self.a;
                self.temp_data = ((a & 0x0F) << 4) | (mem >> 4);
                self.a = (a & 0xF0) | (mem & 0x0F);
                self.update_rotate_digit_flags();
                self.state = ExecState::ExecuteED(opcode, 7);
            }
            7 => {
                bus.write(self.temp_addr, self.temp_data);
                self.state = ExecState::ExecuteED(opcode, 8);
            }
            10 => self.state = ExecState::Fetch,
            _ => unreachable!(),
        }
    }

    /// RLD — 18T: Main M1(4) + ED M1(4) + MR(3) + internal(4) + MW(3)
    /// (HL) high nibble ← (HL) low nibble (old); (HL) low nibble ← A low nibble (old);
    /// A low nibble ← (HL) high nibble (old). A high nibble untouched.
    /// 11 handler cycles: 0=pad, 1=read(HL), 2-5=internal, 6=compute, 7=write(HL), 8-9=pad, 10=done
    pub fn op_rld(
        &mut self,
        opcode: u8,
        cycle: u8,
        bus: &AddressSpace,
    ) {
        match cycle {
            0 | 2 | 3 | 4 | 5 | 8 | 9 => self.state = ExecState::ExecuteED(opcode, cycle + 1),
            1 => {
                self.temp_addr = self.get_hl();
                self.temp_data = bus.read(self.temp_addr, ReadMode::Read);
                self.state = ExecState::ExecuteED(opcode, 2);
            }
            6 => {
                let mem = self.temp_data;
                let a = self.a;
                self.temp_data = ((mem & 0x0F) << 4) | (a & 0x0F);
                self.a = (a & 0xF0) | (mem >> 4);
                self.update_rotate_digit_flags();
                self.state = ExecState::ExecuteED(opcode, 7);
            }
            7 => {
                bus.write(self.temp_addr, self.temp_data);
                self.state = ExecState::ExecuteED(opcode, 8);
            }
            10 => self.state = ExecState::Fetch,
            _ => unreachable!(),
        }
    }
}