use super::cpu::Cpu;
use super::types::{Fault, StepResult};
use crate::u4;
use std::collections::HashSet;

const CPU_HZ: f32 = 700.0;
const TIMER_HZ: f32 = 60.0;

pub(crate) const CPU_TIME_STEP: f32 = 1.0 / CPU_HZ;
pub(crate) const TIMER_TIME_STEP: f32 = 1.0 / TIMER_HZ;

/// Drives a [`Cpu`] from wall-clock delta times: instruction steps at a
/// nominal 700Hz and timer ticks at 60Hz, both derived from the same
/// `update(dt)` calls so the host only needs one cadence.
pub struct Runner {
    cpu: Cpu,
    cpu_dt_accumulator: f32,
    timer_dt_accumulator: f32,
}

pub enum RunnerResult {
    Ok,
    HitBreakpoint,
}

impl Runner {
    pub fn new(cpu: Cpu) -> Self {
        Self {
            cpu,
            cpu_dt_accumulator: 0.0,
            timer_dt_accumulator: 0.0,
        }
    }

    /// Advances the machine by `dt` seconds of wall-clock time, running as
    /// many timer ticks and CPU steps as that much time covers.
    ///
    /// Stops stepping early when a frame is ready to present or the CPU is
    /// waiting on the keypad; in both cases the step accumulator is cleared
    /// so the next frame doesn't try to catch up.
    pub fn update(&mut self, dt: f32) -> Result<RunnerResult, Fault> {
        self.update_with_breakpoints(dt, None)
    }

    /// Like [`Runner::update`], but also stops when PC lands on one of the
    /// given addresses after a step.
    pub fn update_with_breakpoints(
        &mut self,
        dt: f32,
        breakpoints: Option<&HashSet<u16>>,
    ) -> Result<RunnerResult, Fault> {
        self.cpu_dt_accumulator += dt;
        self.timer_dt_accumulator += dt;

        while self.timer_dt_accumulator >= TIMER_TIME_STEP {
            self.timer_dt_accumulator -= TIMER_TIME_STEP;
            self.cpu.tick_timers();
        }

        while self.cpu_dt_accumulator >= CPU_TIME_STEP {
            self.cpu_dt_accumulator -= CPU_TIME_STEP;

            let step_result = self.cpu.step()?;

            if let Some(breakpoints) = breakpoints
                && breakpoints.contains(&self.cpu.pc)
            {
                self.cpu_dt_accumulator = 0.0;
                return Ok(RunnerResult::HitBreakpoint);
            }

            match step_result {
                StepResult::FrameDrawn | StepResult::AwaitingKey => {
                    self.cpu_dt_accumulator = 0.0;
                    break;
                }
                StepResult::Continue => {}
            }
        }

        Ok(RunnerResult::Ok)
    }

    /// True while the sound timer is active and the host should beep.
    pub fn sound_active(&self) -> bool {
        self.cpu.sound_active()
    }

    /// Forwards a key press or release to the CPU's keypad.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.cpu.set_key(key, pressed)
    }

    /// State of a single display pixel (true = on).
    pub fn pixel(&self, y: usize, x: usize) -> bool {
        self.cpu.pixel(y, x)
    }

    pub fn cpu_ref(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }
}
