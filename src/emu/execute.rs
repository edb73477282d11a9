use super::cpu::{Cpu, STACK_DEPTH};
use super::font::{FONT_GLYPH_SIZE, FONT_START_ADDRESS};
use super::opcode::{AluOp, Opcode};
use super::types::{Fault, SCREEN_H, SCREEN_W, StepResult};
use crate::u4;

impl Cpu {
    /// Executes one decoded instruction. PC already points past it, so
    /// control-flow instructions simply overwrite PC and conditional skips
    /// add another 2.
    pub(crate) fn execute(&mut self, opcode: Opcode) -> Result<StepResult, Fault> {
        match opcode {
            Opcode::ClearScreen => {
                self.screen = [[false; SCREEN_W]; SCREEN_H];
            }
            Opcode::Return => {
                self.pc = self.stack.pop().ok_or(Fault::StackUnderflow)?;
            }
            Opcode::Jump { nnn } => {
                self.pc = nnn;
            }
            Opcode::Call { nnn } => {
                if self.stack.len() >= STACK_DEPTH {
                    return Err(Fault::StackOverflow { depth: STACK_DEPTH });
                }
                self.stack.push(self.pc);
                self.pc = nnn;
            }
            Opcode::SkipEqImm { x, nn } => {
                if self.v[x] == nn {
                    self.skip();
                }
            }
            Opcode::SkipNeImm { x, nn } => {
                if self.v[x] != nn {
                    self.skip();
                }
            }
            Opcode::SkipEqReg { x, y } => {
                if self.v[x] == self.v[y] {
                    self.skip();
                }
            }
            Opcode::SkipNeReg { x, y } => {
                if self.v[x] != self.v[y] {
                    self.skip();
                }
            }
            Opcode::LoadImm { x, nn } => {
                self.v[x] = nn;
            }
            Opcode::AddImm { x, nn } => {
                self.v[x] = self.v[x].wrapping_add(nn);
            }
            Opcode::Alu { x, y, op } => {
                self.execute_alu(x, y, op);
            }
            Opcode::LoadIndex { nnn } => {
                self.i = nnn;
            }
            Opcode::JumpOffset { nnn } => {
                self.pc = nnn.wrapping_add(self.v[0].into());
            }
            Opcode::Rand { x, nn } => {
                self.v[x] = rand::random::<u8>() & nn;
            }
            Opcode::Draw { x, y, n } => {
                return self.execute_draw(x, y, n);
            }
            Opcode::SkipKeyPressed { x } => {
                if self.keypad[usize::from(self.v[x]) & 0x0F] {
                    self.skip();
                }
            }
            Opcode::SkipKeyNotPressed { x } => {
                if !self.keypad[usize::from(self.v[x]) & 0x0F] {
                    self.skip();
                }
            }
            Opcode::GetDelay { x } => {
                self.v[x] = self.delay_timer;
            }
            Opcode::WaitKey { x } => {
                return Ok(self.execute_wait_key(x));
            }
            Opcode::SetDelay { x } => {
                self.delay_timer = self.v[x];
            }
            Opcode::SetSound { x } => {
                self.sound_timer = self.v[x];
            }
            Opcode::AddIndex { x } => {
                // Mandated policy: wrap mod 4096, no flag side effect.
                self.i = self.i.wrapping_add(self.v[x].into()) & 0x0FFF;
            }
            Opcode::FontAddr { x } => {
                let digit = self.v[x] & 0x0F;
                self.i = (FONT_START_ADDRESS + usize::from(digit) * FONT_GLYPH_SIZE) as u16;
            }
            Opcode::StoreBcd { x } => {
                let value = self.v[x];
                self.write_mem(self.i, value / 100)?;
                self.write_mem(self.i.wrapping_add(1), (value / 10) % 10)?;
                self.write_mem(self.i.wrapping_add(2), value % 10)?;
            }
            Opcode::RegDump { x } => {
                for reg in 0..=u16::from(x) {
                    self.write_mem(self.i.wrapping_add(reg), self.v[reg as usize])?;
                }
            }
            Opcode::RegLoad { x } => {
                for reg in 0..=u16::from(x) {
                    self.v[reg as usize] = self.read_mem(self.i.wrapping_add(reg))?;
                }
            }
        };

        Ok(StepResult::Continue)
    }

    /// Skips over the next instruction (conditional skip taken).
    fn skip(&mut self) {
        self.pc = self.pc.wrapping_add(2);
    }

    /// 8XYn operations. Operands are read first, VF is written next, and the
    /// result store comes last, so when X == 0xF the result overwrites the
    /// flag.
    fn execute_alu(&mut self, x: u4, y: u4, op: AluOp) {
        let vx = self.v[x];
        let vy = self.v[y];

        match op {
            AluOp::Copy => self.v[x] = vy,
            AluOp::Or => self.v[x] = vx | vy,
            AluOp::And => self.v[x] = vx & vy,
            AluOp::Xor => self.v[x] = vx ^ vy,
            AluOp::Add => {
                let sum = u16::from(vx) + u16::from(vy);
                // VF = 1 means the sum fit in a byte; 0 means it wrapped.
                self.v[0xF] = if sum <= 0xFF { 1 } else { 0 };
                self.v[x] = sum as u8;
            }
            AluOp::Sub => {
                // VF = 1 means no borrow.
                self.v[0xF] = if vx >= vy { 1 } else { 0 };
                self.v[x] = vx.wrapping_sub(vy);
            }
            AluOp::Subn => {
                self.v[0xF] = if vy >= vx { 1 } else { 0 };
                self.v[x] = vy.wrapping_sub(vx);
            }
            AluOp::Shr => {
                self.v[0xF] = vx & 1;
                self.v[x] = vx >> 1;
            }
            AluOp::Shl => {
                self.v[0xF] = vx >> 7;
                self.v[x] = vx << 1;
            }
        }
    }

    /// DXYN: XOR-composites an 8-wide, n-tall sprite from memory[I..] at
    /// (Vx, Vy). Coordinates wrap toroidally around the screen edges. VF is
    /// set to 1 iff any lit pixel was toggled off (collision).
    fn execute_draw(&mut self, x: u4, y: u4, n: u4) -> Result<StepResult, Fault> {
        let origin_x = usize::from(self.v[x]) % SCREEN_W;
        let origin_y = usize::from(self.v[y]) % SCREEN_H;

        self.v[0xF] = 0;
        for row in 0..usize::from(n) {
            let sprite = self.read_mem(self.i.wrapping_add(row as u16))?;

            for col in 0..8 {
                if sprite & (0x80 >> col) == 0 {
                    continue;
                }

                let px = (origin_x + col) % SCREEN_W;
                let py = (origin_y + row) % SCREEN_H;

                let pixel = &mut self.screen[py][px];
                if *pixel {
                    self.v[0xF] = 1;
                }
                *pixel ^= true;
            }
        }

        Ok(StepResult::FrameDrawn)
    }

    /// FX0A: parks the CPU on this instruction (PC rewound) until the keypad
    /// reports a key going from not-pressed to pressed since the previous
    /// poll. A key already held when the wait begins does not satisfy it.
    fn execute_wait_key(&mut self, x: u4) -> StepResult {
        if let Some(snapshot) = self.key_snapshot {
            for key in 0..16 {
                if self.keypad[key] && !snapshot[key] {
                    self.v[x] = key as u8;
                    self.key_snapshot = None;
                    return StepResult::Continue;
                }
            }
        }

        // Remember the current keypad so releases are observed next poll,
        // and re-execute this instruction on the next step.
        self.key_snapshot = Some(self.keypad);
        self.pc = self.pc.wrapping_sub(2);
        StepResult::AwaitingKey
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A core with the given ROM loaded, ready to step.
    fn cpu_with(rom: &[u8]) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.load(rom).unwrap();
        cpu
    }

    /// Runs a single 8XYn operation on a fresh core with Vx/Vy preloaded.
    fn run_alu(op_nibble: u8, vx: u8, vy: u8) -> Cpu {
        let mut cpu = cpu_with(&[0x80, 0x10 | op_nibble]);
        cpu.v[0] = vx;
        cpu.v[1] = vy;
        cpu.step().unwrap();
        cpu
    }

    #[test]
    fn load_then_add_imm() {
        // 6005: V0 = 5; 700A: V0 += 10
        let mut cpu = cpu_with(&[0x60, 0x05, 0x70, 0x0A]);
        cpu.step().unwrap();
        cpu.step().unwrap();

        assert_eq!(cpu.v[0], 15);
        assert_eq!(cpu.pc, 0x204);
    }

    #[test]
    fn add_imm_wraps_without_flag_change() {
        let mut cpu = cpu_with(&[0x70, 0xFF]);
        cpu.v[0] = 2;
        cpu.v[0xF] = 7;
        cpu.step().unwrap();

        assert_eq!(cpu.v[0], 1);
        assert_eq!(cpu.v[0xF], 7);
    }

    #[test]
    fn call_and_return_restore_pc() {
        // 0x200: 2210 call 0x210; 0x210: 00EE return
        let mut rom = vec![0; 0x12];
        rom[0] = 0x22;
        rom[1] = 0x10;
        rom[0x10] = 0x00;
        rom[0x11] = 0xEE;
        let mut cpu = cpu_with(&rom);

        cpu.step().unwrap();
        assert_eq!(cpu.pc, 0x210);
        assert_eq!(cpu.stack, vec![0x202]);

        cpu.step().unwrap();
        assert_eq!(cpu.pc, 0x202);
        assert!(cpu.stack.is_empty());
    }

    #[test]
    fn call_beyond_sixteen_frames_overflows() {
        // 2200: call 0x200, forever
        let mut cpu = cpu_with(&[0x22, 0x00]);

        for _ in 0..STACK_DEPTH {
            cpu.step().unwrap();
        }
        assert!(matches!(
            cpu.step(),
            Err(Fault::StackOverflow { depth: STACK_DEPTH })
        ));
    }

    #[test]
    fn return_on_empty_stack_underflows() {
        let mut cpu = cpu_with(&[0x00, 0xEE]);
        assert!(matches!(cpu.step(), Err(Fault::StackUnderflow)));
    }

    #[test]
    fn conditional_skips() {
        // 3007: skip if V0 == 7
        let mut cpu = cpu_with(&[0x30, 0x07]);
        cpu.v[0] = 7;
        cpu.step().unwrap();
        assert_eq!(cpu.pc, 0x204);

        let mut cpu = cpu_with(&[0x30, 0x07]);
        cpu.v[0] = 8;
        cpu.step().unwrap();
        assert_eq!(cpu.pc, 0x202);

        // 9120: skip if V1 != V2
        let mut cpu = cpu_with(&[0x91, 0x20]);
        cpu.v[1] = 1;
        cpu.step().unwrap();
        assert_eq!(cpu.pc, 0x204);
    }

    #[test]
    fn jump_with_offset_adds_v0() {
        let mut cpu = cpu_with(&[0xB3, 0x00]);
        cpu.v[0] = 0x21;
        cpu.step().unwrap();
        assert_eq!(cpu.pc, 0x321);
    }

    #[test]
    fn add_sets_inverted_carry() {
        // 250 + 10 wraps: V0 = 4, VF = 0
        let cpu = run_alu(0x4, 250, 10);
        assert_eq!(cpu.v[0], 4);
        assert_eq!(cpu.v[0xF], 0);

        // 250 + 5 fits: VF = 1
        let cpu = run_alu(0x4, 250, 5);
        assert_eq!(cpu.v[0], 255);
        assert_eq!(cpu.v[0xF], 1);
    }

    #[test]
    fn add_with_vf_as_destination_keeps_truncated_sum() {
        // 8F14: VF += V1. The flag write happens first, then the result
        // store wins the alias.
        let mut cpu = cpu_with(&[0x8F, 0x14]);
        cpu.v[0xF] = 200;
        cpu.v[1] = 100;
        cpu.step().unwrap();
        assert_eq!(cpu.v[0xF], 44);
    }

    #[test]
    fn add_register_to_itself() {
        // 8004: V0 += V0
        let mut cpu = cpu_with(&[0x80, 0x04]);
        cpu.v[0] = 0x90;
        cpu.step().unwrap();
        assert_eq!(cpu.v[0], 0x20);
        assert_eq!(cpu.v[0xF], 0);
    }

    #[test]
    fn sub_flag_means_no_borrow() {
        let cpu = run_alu(0x5, 10, 10);
        assert_eq!(cpu.v[0], 0);
        assert_eq!(cpu.v[0xF], 1);

        let cpu = run_alu(0x5, 9, 10);
        assert_eq!(cpu.v[0], 255);
        assert_eq!(cpu.v[0xF], 0);
    }

    #[test]
    fn subn_reverses_operands() {
        let cpu = run_alu(0x7, 10, 25);
        assert_eq!(cpu.v[0], 15);
        assert_eq!(cpu.v[0xF], 1);

        let cpu = run_alu(0x7, 25, 10);
        assert_eq!(cpu.v[0], 241);
        assert_eq!(cpu.v[0xF], 0);
    }

    #[test]
    fn shifts_use_vx_and_report_shifted_bit() {
        let cpu = run_alu(0x6, 0b0000_0101, 0xFF);
        assert_eq!(cpu.v[0], 0b0000_0010);
        assert_eq!(cpu.v[0xF], 1);

        let cpu = run_alu(0xE, 0b1100_0000, 0xFF);
        assert_eq!(cpu.v[0], 0b1000_0000);
        assert_eq!(cpu.v[0xF], 1);

        let cpu = run_alu(0xE, 0b0100_0000, 0xFF);
        assert_eq!(cpu.v[0], 0b1000_0000);
        assert_eq!(cpu.v[0xF], 0);
    }

    #[test]
    fn bitwise_ops_leave_flag_alone() {
        let mut cpu = cpu_with(&[0x80, 0x13]);
        cpu.v[0] = 0b1010;
        cpu.v[1] = 0b0110;
        cpu.v[0xF] = 9;
        cpu.step().unwrap();
        assert_eq!(cpu.v[0], 0b1100);
        assert_eq!(cpu.v[0xF], 9);
    }

    #[test]
    fn rand_is_masked_by_immediate() {
        // CX00 must always produce 0 regardless of the random byte.
        let mut cpu = cpu_with(&[0xC0, 0x00]);
        cpu.v[0] = 0xAA;
        cpu.step().unwrap();
        assert_eq!(cpu.v[0], 0);

        let mut cpu = cpu_with(&[0xC0, 0x0F]);
        cpu.step().unwrap();
        assert_eq!(cpu.v[0] & 0xF0, 0);
    }

    #[test]
    fn clear_screen_zeroes_every_pixel() {
        let mut cpu = cpu_with(&[0x00, 0xE0]);
        cpu.screen[5][12] = true;
        cpu.screen[31][63] = true;
        cpu.step().unwrap();
        assert!(cpu.screen.iter().flatten().all(|&p| !p));
    }

    #[test]
    fn draw_reports_collision_and_is_self_inverse() {
        // A204: I = 0x204 (sprite data); D001: draw 1 row at (V0, V0)
        let mut cpu = cpu_with(&[0xA2, 0x04, 0xD0, 0x01, 0b1010_0000, 0x00]);
        cpu.step().unwrap();

        assert!(matches!(cpu.step(), Ok(StepResult::FrameDrawn)));
        assert!(cpu.screen[0][0]);
        assert!(!cpu.screen[0][1]);
        assert!(cpu.screen[0][2]);
        assert_eq!(cpu.v[0xF], 0);

        // Drawing the same sprite again erases it and reports the collision.
        cpu.pc = 0x202;
        cpu.step().unwrap();
        assert!(cpu.screen[0].iter().all(|&p| !p));
        assert_eq!(cpu.v[0xF], 1);
    }

    #[test]
    fn draw_wraps_around_screen_edges() {
        // Sprite at x=62, y=31: spills 6 columns and wraps to row 0.
        let mut cpu = cpu_with(&[0xA2, 0x04, 0xD0, 0x12, 0xFF, 0xFF]);
        cpu.v[0] = 62;
        cpu.v[1] = 31;
        cpu.step().unwrap();
        cpu.step().unwrap();

        assert!(cpu.screen[31][62] && cpu.screen[31][63]);
        assert!(cpu.screen[31][0] && cpu.screen[31][3]);
        assert!(cpu.screen[0][62] && cpu.screen[0][5]);
        assert!(!cpu.screen[31][6]);
        assert_eq!(cpu.v[0xF], 0);
    }

    #[test]
    fn draw_origin_wraps_modulo_screen() {
        // V0 = 64 behaves exactly like x = 0.
        let mut cpu = cpu_with(&[0xA2, 0x04, 0xD0, 0x11, 0x80, 0x00]);
        cpu.v[0] = 64;
        cpu.v[1] = 32;
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert!(cpu.screen[0][0]);
    }

    #[test]
    fn draw_faults_when_sprite_read_leaves_memory() {
        let mut cpu = cpu_with(&[0xD0, 0x01]);
        cpu.i = 0x1000;
        assert!(matches!(cpu.step(), Err(Fault::Address { addr: 0x1000 })));
    }

    #[test]
    fn store_bcd_writes_decimal_digits() {
        let mut cpu = cpu_with(&[0xF0, 0x33]);
        cpu.v[0] = 157;
        cpu.i = 0x300;
        cpu.step().unwrap();

        assert_eq!(cpu.memory[0x300], 1);
        assert_eq!(cpu.memory[0x301], 5);
        assert_eq!(cpu.memory[0x302], 7);
    }

    #[test]
    fn store_bcd_faults_past_end_of_memory() {
        let mut cpu = cpu_with(&[0xF0, 0x33]);
        cpu.i = 0xFFE;
        assert!(matches!(cpu.step(), Err(Fault::Address { addr: 0x1000 })));
    }

    #[test]
    fn reg_dump_and_load_leave_index_unchanged() {
        let mut cpu = cpu_with(&[0xF2, 0x55, 0xF2, 0x65]);
        cpu.v[0] = 0xDE;
        cpu.v[1] = 0xAD;
        cpu.v[2] = 0x99;
        cpu.v[3] = 0x77;
        cpu.i = 0x400;

        cpu.step().unwrap();
        assert_eq!(cpu.memory[0x400..0x403], [0xDE, 0xAD, 0x99]);
        assert_eq!(cpu.memory[0x403], 0); // V3 excluded
        assert_eq!(cpu.i, 0x400);

        cpu.v = [0; 16];
        cpu.step().unwrap();
        assert_eq!(cpu.v[..3], [0xDE, 0xAD, 0x99]);
        assert_eq!(cpu.v[3], 0);
        assert_eq!(cpu.i, 0x400);
    }

    #[test]
    fn add_index_wraps_modulo_4096() {
        let mut cpu = cpu_with(&[0xF0, 0x1E]);
        cpu.v[0] = 5;
        cpu.v[0xF] = 3;
        cpu.i = 0xFFE;
        cpu.step().unwrap();

        assert_eq!(cpu.i, 0x003);
        // No flag side effect.
        assert_eq!(cpu.v[0xF], 3);
    }

    #[test]
    fn font_addr_points_at_glyph() {
        let mut cpu = cpu_with(&[0xF0, 0x29]);
        cpu.v[0] = 0x1A; // only the low nibble counts
        cpu.step().unwrap();
        assert_eq!(cpu.i, (FONT_START_ADDRESS + 0xA * FONT_GLYPH_SIZE) as u16);
    }

    #[test]
    fn timer_reads_and_writes() {
        let mut cpu = cpu_with(&[0xF0, 0x15, 0xF1, 0x07, 0xF2, 0x18]);
        cpu.v[0] = 42;
        cpu.v[2] = 9;

        cpu.step().unwrap();
        assert_eq!(cpu.delay_timer, 42);

        cpu.step().unwrap();
        assert_eq!(cpu.v[1], 42);

        cpu.step().unwrap();
        assert_eq!(cpu.sound_timer, 9);
        assert!(cpu.sound_active());
    }

    #[test]
    fn key_skips_consult_keypad() {
        let mut cpu = cpu_with(&[0xE0, 0x9E]);
        cpu.v[0] = 4;
        cpu.set_key(u4::new(4), true);
        cpu.step().unwrap();
        assert_eq!(cpu.pc, 0x204);

        let mut cpu = cpu_with(&[0xE0, 0xA1]);
        cpu.v[0] = 4;
        cpu.step().unwrap();
        assert_eq!(cpu.pc, 0x204);
    }

    #[test]
    fn wait_key_blocks_until_a_fresh_press() {
        let mut cpu = cpu_with(&[0xF5, 0x0A]);

        assert!(matches!(cpu.step(), Ok(StepResult::AwaitingKey)));
        assert_eq!(cpu.pc, 0x200);

        // Still nothing pressed.
        assert!(matches!(cpu.step(), Ok(StepResult::AwaitingKey)));

        cpu.set_key(u4::new(7), true);
        assert!(matches!(cpu.step(), Ok(StepResult::Continue)));
        assert_eq!(cpu.v[5], 7);
        assert_eq!(cpu.pc, 0x202);
    }

    #[test]
    fn wait_key_ignores_key_held_at_entry() {
        let mut cpu = cpu_with(&[0xF5, 0x0A]);
        cpu.set_key(u4::new(3), true);

        // The held key was captured in the first poll's snapshot.
        assert!(matches!(cpu.step(), Ok(StepResult::AwaitingKey)));
        assert!(matches!(cpu.step(), Ok(StepResult::AwaitingKey)));

        // Release and press again: now it counts as a fresh press.
        cpu.set_key(u4::new(3), false);
        assert!(matches!(cpu.step(), Ok(StepResult::AwaitingKey)));
        cpu.set_key(u4::new(3), true);
        assert!(matches!(cpu.step(), Ok(StepResult::Continue)));
        assert_eq!(cpu.v[5], 3);
    }

    #[test]
    fn timers_keep_ticking_while_waiting_for_key() {
        let mut cpu = cpu_with(&[0xF0, 0x0A]);
        cpu.delay_timer = 3;

        cpu.step().unwrap();
        cpu.tick_timers();
        cpu.step().unwrap();
        cpu.tick_timers();

        assert_eq!(cpu.delay_timer, 1);
        assert_eq!(cpu.pc, 0x200);
    }
}
