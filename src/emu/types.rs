pub const SCREEN_W: usize = 64;
pub const SCREEN_H: usize = 32;

/// The 64x32 framebuffer, generic over the pixel type so frontends can reuse
/// the shape for things like per-pixel brightness.
pub type Screen<T> = [[T; SCREEN_W]; SCREEN_H];

/// Outcome of a single successful `Cpu::step`.
pub enum StepResult {
    /// The instruction completed; keep executing.
    Continue,
    /// A sprite was drawn; the frontend should present a frame before
    /// executing further instructions.
    FrameDrawn,
    /// The CPU is parked on a wait-key instruction and will re-execute it
    /// until a fresh key press arrives.
    AwaitingKey,
}

/// Fatal machine faults. None of these are recoverable: the CPU makes no
/// attempt to reset or skip past the offending instruction, the host decides
/// what to do next.
#[derive(Debug, thiserror::Error)]
pub enum Fault {
    #[error("ROM is too large ({size} bytes), max size is {max} bytes")]
    Load { size: usize, max: usize },

    #[error("memory access out of bounds at address {addr:#06X}")]
    Address { addr: u16 },

    #[error("call stack exceeded {depth} frames")]
    StackOverflow { depth: usize },

    #[error("return with an empty call stack")]
    StackUnderflow,

    #[error("opcode {opcode:#06X} does not decode to any instruction")]
    Decode { opcode: u16 },
}
