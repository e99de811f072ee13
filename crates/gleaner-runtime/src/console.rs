// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Parsing of the interactive console's command lines.

use thiserror::Error;

/// Text printed by `help`.
pub const HELP: &str = "\
Commands:
  join                          a participant arrives
  leave                         a participant leaves
  status                        sweeper and refresh status
  sweep now|start|stop|status   control the sweeper
  refresh now|status            control the public bin refresh
  reset                         restart the sweep countdown
  reload                        re-read the settings and bin files
  clear                         empty the public bin
  bin [page]                    list the public bin
  spawn <zone> <x> <z> <type> [qty]
                                drop an item into the world
  help                          this text
  quit                          stop everything and exit";

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join,
    Leave,
    Status,
    Sweep(SweepAction),
    Refresh(RefreshAction),
    Reset,
    Reload,
    Clear,
    /// One-based page of the public bin listing.
    Bin(usize),
    Spawn {
        zone: String,
        x: i32,
        z: i32,
        item_type: String,
        quantity: u32,
    },
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepAction {
    Now,
    Start,
    Stop,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshAction {
    Now,
    Status,
}

/// Why a command line was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}', type 'help' for a list")]
    Unknown(String),
    #[error("'{command}' expects {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },
    #[error("'{value}' is not a valid {what}")]
    InvalidNumber { what: &'static str, value: String },
    #[error("'{command}' does not take '{extra}'")]
    UnexpectedArgument { command: &'static str, extra: String },
}

impl Command {
    /// Parses one line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match head.to_ascii_lowercase().as_str() {
            "join" => no_args("join", &args, Command::Join)?,
            "leave" => no_args("leave", &args, Command::Leave)?,
            "status" => no_args("status", &args, Command::Status)?,
            "reset" => no_args("reset", &args, Command::Reset)?,
            "reload" => no_args("reload", &args, Command::Reload)?,
            "clear" => no_args("clear", &args, Command::Clear)?,
            "help" | "?" => Command::Help,
            "quit" | "exit" => no_args("quit", &args, Command::Quit)?,
            "sweep" => Command::Sweep(parse_sweep(&args)?),
            "refresh" => Command::Refresh(parse_refresh(&args)?),
            "bin" => match args.as_slice() {
                [] => Command::Bin(1),
                [page] => Command::Bin(number::<usize>("page", page)?.max(1)),
                [_, extra, ..] => return Err(unexpected("bin", extra)),
            },
            "spawn" => parse_spawn(&args)?,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn no_args(command: &'static str, args: &[&str], parsed: Command) -> Result<Command, CommandError> {
    match args.first() {
        Some(extra) => Err(unexpected(command, extra)),
        None => Ok(parsed),
    }
}

fn unexpected(command: &'static str, extra: &str) -> CommandError {
    CommandError::UnexpectedArgument {
        command,
        extra: extra.to_string(),
    }
}

fn number<T: std::str::FromStr>(what: &'static str, value: &str) -> Result<T, CommandError> {
    value.parse().map_err(|_| CommandError::InvalidNumber {
        what,
        value: value.to_string(),
    })
}

fn parse_sweep(args: &[&str]) -> Result<SweepAction, CommandError> {
    const EXPECTED: &str = "one of now, start, stop, status";
    let action = match args.first().map(|a| a.to_ascii_lowercase()).as_deref() {
        None => SweepAction::Status,
        Some("now") => SweepAction::Now,
        Some("start") => SweepAction::Start,
        Some("stop") => SweepAction::Stop,
        Some("status") => SweepAction::Status,
        Some(_) => {
            return Err(CommandError::MissingArgument {
                command: "sweep",
                expected: EXPECTED,
            })
        }
    };
    match args.get(1) {
        Some(extra) => Err(unexpected("sweep", extra)),
        None => Ok(action),
    }
}

fn parse_refresh(args: &[&str]) -> Result<RefreshAction, CommandError> {
    let action = match args.first().map(|a| a.to_ascii_lowercase()).as_deref() {
        None | Some("status") => RefreshAction::Status,
        Some("now") => RefreshAction::Now,
        Some(_) => {
            return Err(CommandError::MissingArgument {
                command: "refresh",
                expected: "now or status",
            })
        }
    };
    match args.get(1) {
        Some(extra) => Err(unexpected("refresh", extra)),
        None => Ok(action),
    }
}

fn parse_spawn(args: &[&str]) -> Result<Command, CommandError> {
    let [zone, x, z, item_type, rest @ ..] = args else {
        return Err(CommandError::MissingArgument {
            command: "spawn",
            expected: "<zone> <x> <z> <type> [qty]",
        });
    };
    let quantity = match rest {
        [] => 1,
        [qty] => number("quantity", qty)?,
        [_, extra, ..] => return Err(unexpected("spawn", extra)),
    };
    Ok(Command::Spawn {
        zone: zone.to_string(),
        x: number("coordinate", x)?,
        z: number("coordinate", z)?,
        item_type: item_type.to_string(),
        quantity,
    })
}
