use crate::u4;

/// A decoded CHIP-8 instruction. Operand names follow the usual convention:
/// `x`/`y` are register indices, `n`/`nn`/`nnn` are 4/8/12-bit immediates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    /// 00E0 - Clear the screen.
    ClearScreen,
    /// 00EE - Return from a subroutine.
    Return,
    /// 1NNN - Jump to nnn.
    Jump { nnn: u16 },
    /// 2NNN - Call the subroutine at nnn.
    Call { nnn: u16 },
    /// 3XNN - Skip the next instruction if Vx == nn.
    SkipEqImm { x: u4, nn: u8 },
    /// 4XNN - Skip the next instruction if Vx != nn.
    SkipNeImm { x: u4, nn: u8 },
    /// 5XY0 - Skip the next instruction if Vx == Vy.
    SkipEqReg { x: u4, y: u4 },
    /// 6XNN - Vx = nn.
    LoadImm { x: u4, nn: u8 },
    /// 7XNN - Vx += nn, wrapping, no flag change.
    AddImm { x: u4, nn: u8 },
    /// 8XYn - Register-to-register ALU operation.
    Alu { x: u4, y: u4, op: AluOp },
    /// 9XY0 - Skip the next instruction if Vx != Vy.
    SkipNeReg { x: u4, y: u4 },
    /// ANNN - I = nnn.
    LoadIndex { nnn: u16 },
    /// BNNN - Jump to nnn + V0.
    JumpOffset { nnn: u16 },
    /// CXNN - Vx = random byte AND nn.
    Rand { x: u4, nn: u8 },
    /// DXYN - Draw the n-row sprite at memory[I..] to (Vx, Vy).
    Draw { x: u4, y: u4, n: u4 },
    /// EX9E - Skip the next instruction if key Vx is pressed.
    SkipKeyPressed { x: u4 },
    /// EXA1 - Skip the next instruction if key Vx is not pressed.
    SkipKeyNotPressed { x: u4 },
    /// FX07 - Vx = delay timer.
    GetDelay { x: u4 },
    /// FX0A - Wait for a key press, store the key in Vx.
    WaitKey { x: u4 },
    /// FX15 - Delay timer = Vx.
    SetDelay { x: u4 },
    /// FX18 - Sound timer = Vx.
    SetSound { x: u4 },
    /// FX1E - I += Vx, wrapping mod 4096, no flag change.
    AddIndex { x: u4 },
    /// FX29 - I = address of the built-in glyph for the low nibble of Vx.
    FontAddr { x: u4 },
    /// FX33 - Write the decimal digits of Vx to memory[I..I+3].
    StoreBcd { x: u4 },
    /// FX55 - Write V0..=Vx to memory[I..]; I is left unchanged.
    RegDump { x: u4 },
    /// FX65 - Read V0..=Vx from memory[I..]; I is left unchanged.
    RegLoad { x: u4 },
}

/// The nine 8XYn operations, selected by the low nibble.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AluOp {
    /// 8XY0 - Vx = Vy
    Copy,
    /// 8XY1 - Vx |= Vy
    Or,
    /// 8XY2 - Vx &= Vy
    And,
    /// 8XY3 - Vx ^= Vy
    Xor,
    /// 8XY4 - Vx += Vy; VF = 1 if no overflow, 0 otherwise
    Add,
    /// 8XY5 - Vx -= Vy; VF = 1 if no borrow, 0 otherwise
    Sub,
    /// 8XY6 - VF = Vx & 1; Vx >>= 1
    Shr,
    /// 8XY7 - Vx = Vy - Vx; VF = 1 if no borrow, 0 otherwise
    Subn,
    /// 8XYE - VF = high bit of Vx; Vx <<= 1
    Shl,
}

impl Opcode {
    /// Decodes a 16-bit instruction word.
    ///
    /// Dispatch is two-level: the primary nibble selects the instruction
    /// class, and classes 0x0/0x8/0xE select again on the low nibble while
    /// 0xF selects on the low byte. Words that match no instruction decode
    /// to `None`; the caller turns that into a fault rather than skipping.
    pub fn decode(word: u16) -> Option<Self> {
        let x = u4::from_low((word >> 8) as u8);
        let y = u4::from_low((word >> 4) as u8);
        let n = u4::from_low(word as u8);
        let nn = (word & 0x00FF) as u8;
        let nnn = word & 0x0FFF;

        let decoded = match word >> 12 {
            0x0 => match word {
                0x00E0 => Opcode::ClearScreen,
                0x00EE => Opcode::Return,
                _ => return None,
            },
            0x1 => Opcode::Jump { nnn },
            0x2 => Opcode::Call { nnn },
            0x3 => Opcode::SkipEqImm { x, nn },
            0x4 => Opcode::SkipNeImm { x, nn },
            0x5 if n.value() == 0 => Opcode::SkipEqReg { x, y },
            0x6 => Opcode::LoadImm { x, nn },
            0x7 => Opcode::AddImm { x, nn },
            0x8 => {
                let op = match n.value() {
                    0x0 => AluOp::Copy,
                    0x1 => AluOp::Or,
                    0x2 => AluOp::And,
                    0x3 => AluOp::Xor,
                    0x4 => AluOp::Add,
                    0x5 => AluOp::Sub,
                    0x6 => AluOp::Shr,
                    0x7 => AluOp::Subn,
                    0xE => AluOp::Shl,
                    _ => return None,
                };
                Opcode::Alu { x, y, op }
            }
            0x9 if n.value() == 0 => Opcode::SkipNeReg { x, y },
            0xA => Opcode::LoadIndex { nnn },
            0xB => Opcode::JumpOffset { nnn },
            0xC => Opcode::Rand { x, nn },
            0xD => Opcode::Draw { x, y, n },
            0xE => match nn {
                0x9E => Opcode::SkipKeyPressed { x },
                0xA1 => Opcode::SkipKeyNotPressed { x },
                _ => return None,
            },
            0xF => match nn {
                0x07 => Opcode::GetDelay { x },
                0x0A => Opcode::WaitKey { x },
                0x15 => Opcode::SetDelay { x },
                0x18 => Opcode::SetSound { x },
                0x1E => Opcode::AddIndex { x },
                0x29 => Opcode::FontAddr { x },
                0x33 => Opcode::StoreBcd { x },
                0x55 => Opcode::RegDump { x },
                0x65 => Opcode::RegLoad { x },
                _ => return None,
            },
            _ => return None,
        };

        Some(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::{AluOp, Opcode};
    use crate::u4;

    #[test]
    fn decodes_class_zero() {
        assert_eq!(Opcode::decode(0x00E0), Some(Opcode::ClearScreen));
        assert_eq!(Opcode::decode(0x00EE), Some(Opcode::Return));
        // 0NNN machine-code calls are not part of the supported set.
        assert_eq!(Opcode::decode(0x0123), None);
    }

    #[test]
    fn decodes_operands() {
        assert_eq!(Opcode::decode(0x1ABC), Some(Opcode::Jump { nnn: 0xABC }));
        assert_eq!(
            Opcode::decode(0x6A42),
            Some(Opcode::LoadImm {
                x: u4::new(0xA),
                nn: 0x42
            })
        );
        assert_eq!(
            Opcode::decode(0xD12F),
            Some(Opcode::Draw {
                x: u4::new(1),
                y: u4::new(2),
                n: u4::new(0xF)
            })
        );
    }

    #[test]
    fn decodes_alu_sub_selector() {
        assert_eq!(
            Opcode::decode(0x8344),
            Some(Opcode::Alu {
                x: u4::new(3),
                y: u4::new(4),
                op: AluOp::Add
            })
        );
        assert_eq!(
            Opcode::decode(0x801E),
            Some(Opcode::Alu {
                x: u4::new(0),
                y: u4::new(1),
                op: AluOp::Shl
            })
        );
        // 8XY8..8XYD are undefined.
        assert_eq!(Opcode::decode(0x8018), None);
    }

    #[test]
    fn rejects_nonzero_low_nibble_on_register_skips() {
        assert_eq!(Opcode::decode(0x5121), None);
        assert_eq!(Opcode::decode(0x9235), None);
    }

    #[test]
    fn rejects_unknown_key_and_misc_selectors() {
        assert_eq!(Opcode::decode(0xE19F), None);
        assert_eq!(Opcode::decode(0xF1FF), None);
    }
}
