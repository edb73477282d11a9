use super::Opcode;
use super::font::{FONT, FONT_START_ADDRESS};
use super::types::{Fault, SCREEN_H, SCREEN_W, Screen, StepResult};
use crate::u4;

pub(crate) const MEMORY_SIZE: usize = 4096;
pub(crate) const ROM_START_ADDRESS: usize = 0x200;
/// The canonical machine allows 16 nested calls.
pub(crate) const STACK_DEPTH: usize = 16;

/// The CHIP-8 CPU core: memory, register file, call stack, framebuffer and
/// timers, advanced one instruction at a time by [`Cpu::step`].
///
/// The core performs no I/O or timing of its own. A host loads a ROM, calls
/// `step` at CPU cadence and `tick_timers` at 60Hz, presents the framebuffer,
/// and feeds keypad state in through [`Cpu::set_key`].
pub struct Cpu {
    /// 4KB of addressable memory; 0x000-0x1FF is the interpreter area.
    pub(crate) memory: [u8; MEMORY_SIZE],
    /// 64x32 monochrome framebuffer, XOR-composited by the draw instruction.
    pub(crate) screen: Screen<bool>,

    /// Program counter, even-aligned, starts at 0x200.
    pub(crate) pc: u16,
    /// Index register, derived from 12-bit immediates.
    pub(crate) i: u16,
    /// General-purpose registers V0-VF. VF doubles as the carry/borrow/
    /// collision flag and is clobbered by several instructions.
    pub(crate) v: [u8; 16],
    /// Return addresses, bounded at `STACK_DEPTH` frames.
    pub(crate) stack: Vec<u16>,

    /// Decremented at 60Hz by `tick_timers`, floored at 0.
    pub(crate) delay_timer: u8,
    /// Decremented at 60Hz; nonzero means the host should emit a tone.
    pub(crate) sound_timer: u8,

    /// Keypad state supplied by the host; the core only reads it.
    pub(crate) keypad: [bool; 16],
    /// While a wait-key instruction is parked, holds the keypad state as of
    /// the previous poll so a fresh not-pressed -> pressed transition can be
    /// told apart from a key that was already held.
    pub(crate) key_snapshot: Option<[bool; 16]>,
}

impl Cpu {
    pub fn new() -> Self {
        Cpu {
            memory: [0; MEMORY_SIZE],
            screen: [[false; SCREEN_W]; SCREEN_H],
            pc: ROM_START_ADDRESS as u16,
            i: 0,
            v: [0; 16],
            stack: Vec::new(),
            delay_timer: 0,
            sound_timer: 0,
            keypad: [false; 16],
            key_snapshot: None,
        }
    }

    /// Copies a ROM image into memory at 0x200 and installs the built-in
    /// font. Fails before any instruction executes if the image does not fit.
    pub fn load(&mut self, rom: &[u8]) -> Result<(), Fault> {
        let font_end = FONT_START_ADDRESS + FONT.len();
        self.memory[FONT_START_ADDRESS..font_end].copy_from_slice(&FONT);

        let rom_end = ROM_START_ADDRESS + rom.len();
        self.memory
            .get_mut(ROM_START_ADDRESS..rom_end)
            .ok_or(Fault::Load {
                size: rom.len(),
                max: MEMORY_SIZE - ROM_START_ADDRESS,
            })?
            .copy_from_slice(rom);

        self.pc = ROM_START_ADDRESS as u16;
        Ok(())
    }

    /// Advances the machine by exactly one instruction: fetch the two-byte
    /// word at PC, decode it, and execute it. Any fault halts the step and is
    /// reported to the caller; the core never recovers on its own.
    pub fn step(&mut self) -> Result<StepResult, Fault> {
        let word = self.fetch()?;
        let opcode = Opcode::decode(word).ok_or(Fault::Decode { opcode: word })?;
        self.execute(opcode)
    }

    /// Decrements both timers by at most 1, floored at 0. Driven at 60Hz by
    /// the host, independently of the `step` rate.
    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    /// True while the sound timer is nonzero, i.e. the host should beep.
    pub fn sound_active(&self) -> bool {
        self.sound_timer > 0
    }

    /// Records a key press or release from the host's input source.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.keypad[key] = pressed;
    }

    /// Read-only view of the framebuffer for the display sink.
    pub fn screen(&self) -> &Screen<bool> {
        &self.screen
    }

    /// State of a single pixel (true = on).
    pub fn pixel(&self, y: usize, x: usize) -> bool {
        self.screen[y][x]
    }

    /// Reads the instruction word at PC big-endian and advances PC by 2.
    /// The advance happens before execution so control-flow instructions can
    /// overwrite PC without undoing it.
    fn fetch(&mut self) -> Result<u16, Fault> {
        let high = self.read_mem(self.pc)?;
        let low = self.read_mem(self.pc.wrapping_add(1))?;
        self.pc = self.pc.wrapping_add(2);

        Ok(u16::from_be_bytes([high, low]))
    }

    /// Bounds-checked memory read; anything outside [0, 4095] is a fault,
    /// never a silent wrap.
    pub(crate) fn read_mem(&self, addr: u16) -> Result<u8, Fault> {
        self.memory
            .get(addr as usize)
            .copied()
            .ok_or(Fault::Address { addr })
    }

    /// Bounds-checked memory write.
    pub(crate) fn write_mem(&mut self, addr: u16, value: u8) -> Result<(), Fault> {
        *self
            .memory
            .get_mut(addr as usize)
            .ok_or(Fault::Address { addr })? = value;
        Ok(())
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_core_is_zeroed_with_pc_at_rom_start() {
        let cpu = Cpu::new();
        assert_eq!(cpu.pc, 0x200);
        assert_eq!(cpu.i, 0);
        assert_eq!(cpu.v, [0; 16]);
        assert!(cpu.stack.is_empty());
        assert!(cpu.screen.iter().flatten().all(|&p| !p));
    }

    #[test]
    fn load_installs_font_and_rom() {
        let mut cpu = Cpu::new();
        cpu.load(&[0xAA, 0xBB]).unwrap();

        assert_eq!(cpu.memory[FONT_START_ADDRESS], 0xF0);
        assert_eq!(cpu.memory[0x200], 0xAA);
        assert_eq!(cpu.memory[0x201], 0xBB);
        assert_eq!(cpu.pc, 0x200);
    }

    #[test]
    fn load_rejects_oversized_rom() {
        let mut cpu = Cpu::new();
        let rom = vec![0; MEMORY_SIZE - ROM_START_ADDRESS + 1];

        assert!(matches!(
            cpu.load(&rom),
            Err(Fault::Load { size, max })
                if size == rom.len() && max == MEMORY_SIZE - ROM_START_ADDRESS
        ));
    }

    #[test]
    fn load_accepts_max_size_rom() {
        let mut cpu = Cpu::new();
        let rom = vec![0x12; MEMORY_SIZE - ROM_START_ADDRESS];

        cpu.load(&rom).unwrap();
        assert_eq!(cpu.memory[MEMORY_SIZE - 1], 0x12);
    }

    #[test]
    fn step_reports_decode_fault() {
        let mut cpu = Cpu::new();
        cpu.load(&[0xFF, 0xFF]).unwrap();

        assert!(matches!(
            cpu.step(),
            Err(Fault::Decode { opcode: 0xFFFF })
        ));
    }

    #[test]
    fn fetch_past_end_of_memory_is_a_fault() {
        let mut cpu = Cpu::new();
        cpu.pc = 0x1000;

        assert!(matches!(cpu.step(), Err(Fault::Address { addr: 0x1000 })));
    }

    #[test]
    fn timers_tick_down_and_floor_at_zero() {
        let mut cpu = Cpu::new();
        cpu.delay_timer = 2;
        cpu.sound_timer = 1;

        cpu.tick_timers();
        assert_eq!(cpu.delay_timer, 1);
        assert_eq!(cpu.sound_timer, 0);
        assert!(!cpu.sound_active());

        cpu.tick_timers();
        cpu.tick_timers();
        assert_eq!(cpu.delay_timer, 0);
        assert_eq!(cpu.sound_timer, 0);
    }
}
