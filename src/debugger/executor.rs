use super::commands::{BreakpointAction, Command, CommandError, CommandResult, SetTarget};
use crate::emu::{Fault, Opcode, Runner, RunnerResult, Screen};
use std::collections::HashSet;

/// Executes debugger commands against a [`Runner`], tracking run/pause state
/// and the breakpoint set.
pub struct Executor {
    is_running: bool,
    runner: Runner,
    breakpoints: HashSet<u16>,
}

impl Executor {
    pub fn new(runner: Runner) -> Self {
        Self {
            is_running: false,
            runner,
            breakpoints: HashSet::new(),
        }
    }

    /// Advances the machine while in running mode; pauses on faults and
    /// breakpoint hits so the UI drops back to the command prompt.
    pub fn poll(&mut self, dt: f32) -> Result<RunnerResult, Fault> {
        if !self.is_running {
            return Ok(RunnerResult::Ok);
        }

        let result = self
            .runner
            .update_with_breakpoints(dt, Some(&self.breakpoints));

        if matches!(result, Err(_) | Ok(RunnerResult::HitBreakpoint)) {
            self.is_running = false;
        }

        result
    }

    pub fn execute(&mut self, command: Command) -> Result<CommandResult, CommandError> {
        match command {
            Command::Run => {
                self.is_running = true;
                Ok(CommandResult::Ok)
            }
            Command::Pause => {
                self.is_running = false;
                Ok(CommandResult::Ok)
            }
            Command::Step => {
                self.runner.cpu_mut().step()?;
                Ok(CommandResult::Ok)
            }
            Command::Breakpoint { action } => self.handle_breakpoint(action),
            Command::Set { target, value } => self.handle_set(target, value),
            Command::Mem { start, len } => Ok(self.handle_mem(start, len)),
            Command::Disasm { start, count } => Ok(self.handle_disasm(start, count)),
            Command::Quit => Ok(CommandResult::Quit),
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn runner_mut(&mut self) -> &mut Runner {
        &mut self.runner
    }

    pub fn screen(&self) -> &Screen<bool> {
        self.runner.cpu_ref().screen()
    }

    pub fn pc(&self) -> u16 {
        self.runner.cpu_ref().pc
    }

    pub fn i(&self) -> u16 {
        self.runner.cpu_ref().i
    }

    pub fn v(&self) -> &[u8; 16] {
        &self.runner.cpu_ref().v
    }

    pub fn stack(&self) -> &[u16] {
        &self.runner.cpu_ref().stack
    }

    pub fn delay_timer(&self) -> u8 {
        self.runner.cpu_ref().delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.runner.cpu_ref().sound_timer
    }

    pub fn keypad(&self) -> &[bool; 16] {
        &self.runner.cpu_ref().keypad
    }

    fn handle_breakpoint(
        &mut self,
        action: BreakpointAction,
    ) -> Result<CommandResult, CommandError> {
        match action {
            BreakpointAction::Set { addr } => {
                self.breakpoints.insert(addr);
            }
            BreakpointAction::Clear { addr } => {
                self.breakpoints.remove(&addr);
            }
            BreakpointAction::ClearAll => {
                self.breakpoints.clear();
            }
            BreakpointAction::List => {
                let mut breakpoints: Vec<u16> = self.breakpoints.iter().copied().collect();
                breakpoints.sort_unstable();
                return Ok(CommandResult::Breakpoints(breakpoints));
            }
        };

        Ok(CommandResult::Ok)
    }

    fn handle_set(&mut self, target: SetTarget, value: u16) -> Result<CommandResult, CommandError> {
        let cpu = self.runner.cpu_mut();

        match target {
            SetTarget::V(reg) => {
                if value > 0xFF {
                    return Err(CommandError::ValueOutOfRange);
                }
                cpu.v[reg] = value as u8;
            }
            SetTarget::I => {
                if value > 0xFFF {
                    return Err(CommandError::ValueOutOfRange);
                }
                cpu.i = value;
            }
            SetTarget::Pc => {
                if value > 0xFFF {
                    return Err(CommandError::ValueOutOfRange);
                }
                cpu.pc = value;
            }
        }

        Ok(CommandResult::Ok)
    }

    fn handle_mem(&self, start: u16, len: u16) -> CommandResult {
        let cpu = self.runner.cpu_ref();
        let data = (start..start.saturating_add(len))
            .map_while(|addr| cpu.read_mem(addr).ok())
            .collect();

        CommandResult::MemDump {
            offset: start,
            data,
        }
    }

    fn handle_disasm(&self, start: u16, count: u16) -> CommandResult {
        let cpu = self.runner.cpu_ref();
        let listing = (0..count)
            .map_while(|idx| {
                let addr = start.checked_add(idx * 2)?;
                let high = cpu.read_mem(addr).ok()?;
                let low = cpu.read_mem(addr.wrapping_add(1)).ok()?;
                let word = u16::from_be_bytes([high, low]);
                Some((word, Opcode::decode(word)))
            })
            .collect();

        CommandResult::Disasm {
            offset: start,
            listing,
        }
    }
}
