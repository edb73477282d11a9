use clap::{Parser, Subcommand};
use clap_num::maybe_hex;

use crate::emu::Opcode;
use crate::u4;

/// The debugger's interactive command grammar, parsed with clap's multicall
/// mode so each input line is a free-standing command.
#[derive(Parser)]
#[command(multicall = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone)]
pub enum Command {
    /// Resume execution until a fault or breakpoint.
    #[command(visible_alias = "r")]
    Run,

    /// Pause execution.
    #[command(visible_alias = "p")]
    Pause,

    /// Execute a single instruction.
    #[command(visible_alias = "s")]
    Step,

    /// Manage breakpoints.
    #[command(visible_alias = "b")]
    Breakpoint {
        #[command(subcommand)]
        action: BreakpointAction,
    },

    /// Overwrite a register, I, or PC.
    Set {
        #[arg(value_parser = parse_set_target)]
        target: SetTarget,
        #[arg(value_parser = maybe_hex::<u16>)]
        value: u16,
    },

    /// Hex-dump a range of memory.
    #[command(visible_alias = "m")]
    Mem {
        #[arg(default_value = "0x200", value_parser = maybe_hex::<u16>)]
        start: u16,
        #[arg(default_value = "64", value_parser = maybe_hex::<u16>)]
        len: u16,
    },

    /// Disassemble instruction words from memory.
    #[command(visible_alias = "d")]
    Disasm {
        #[arg(default_value = "0x200", value_parser = maybe_hex::<u16>)]
        start: u16,
        #[arg(default_value = "16", value_parser = maybe_hex::<u16>)]
        count: u16,
    },

    /// Quit the debugger.
    #[command(visible_alias = "q")]
    Quit,
}

pub enum CommandResult {
    Ok,
    Quit,
    Breakpoints(Vec<u16>),
    MemDump {
        offset: u16,
        data: Vec<u8>,
    },
    Disasm {
        offset: u16,
        listing: Vec<(u16, Option<Opcode>)>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("execution fault: {0}")]
    Fault(#[from] crate::emu::Fault),
    #[error("value out of range")]
    ValueOutOfRange,
}

#[derive(Subcommand, Clone)]
pub enum BreakpointAction {
    /// Set a breakpoint at an address.
    #[command(visible_alias = "s")]
    Set {
        #[arg(value_parser = maybe_hex::<u16>)]
        addr: u16,
    },

    /// Clear the breakpoint at an address.
    #[command(visible_alias = "c")]
    Clear {
        #[arg(value_parser = maybe_hex::<u16>)]
        addr: u16,
    },

    /// List all breakpoints.
    #[command(visible_alias = "l")]
    List,

    /// Clear all breakpoints.
    #[command(visible_alias = "ca")]
    ClearAll,
}

#[derive(Clone, Copy)]
pub enum SetTarget {
    V(u4),
    I,
    Pc,
}

fn parse_set_target(s: &str) -> Result<SetTarget, String> {
    let lower = s.to_lowercase();

    match lower.as_str() {
        "index" | "i" => Ok(SetTarget::I),
        "pc" => Ok(SetTarget::Pc),

        _ if lower.starts_with('v') => {
            let hex_str = &lower[1..];
            match u8::from_str_radix(hex_str, 16) {
                Ok(val) if val < 16 => Ok(SetTarget::V(u4::new(val))),
                _ => Err(format!("Invalid register: '{}'", s)),
            }
        }

        _ => Err(format!("Unknown set target: '{}'", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_decimal_addresses() {
        let cli = Cli::try_parse_from(["b", "s", "0x200"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Breakpoint {
                action: BreakpointAction::Set { addr: 0x200 }
            }
        ));

        let cli = Cli::try_parse_from(["mem", "512", "16"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Mem {
                start: 512,
                len: 16
            }
        ));
    }

    #[test]
    fn parses_set_targets() {
        let cli = Cli::try_parse_from(["set", "va", "0xFF"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Set {
                target: SetTarget::V(reg),
                value: 0xFF
            } if reg == u4::new(0xA)
        ));

        assert!(Cli::try_parse_from(["set", "vg", "1"]).is_err());
        assert!(Cli::try_parse_from(["set", "foo", "1"]).is_err());
    }
}
