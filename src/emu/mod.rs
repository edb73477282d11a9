mod cpu;
mod execute;
mod font;
mod opcode;
mod runner;
mod types;

pub use cpu::Cpu;
pub use font::{FONT, FONT_START_ADDRESS};
pub use opcode::{AluOp, Opcode};
pub use runner::{Runner, RunnerResult};
pub use types::{Fault, SCREEN_H, SCREEN_W, Screen, StepResult};
