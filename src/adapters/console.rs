//! Serial console front-end.
//!
//! Reads line commands from stdin (the UART console on ESP-IDF) on its own
//! thread and queues them for the control loop through a
//! [`ControlSender`].  Malformed lines are logged and dropped.
//!
//! | Line                                    | Command            |
//! |-----------------------------------------|--------------------|
//! | `task <valve> <on\|off> <secs> [label]` | `UpdateTask`       |
//! | `reset-cycle`                           | `ResetCycle`       |
//! | `schedule <secs>`                       | `Schedule`         |
//! | `interval <secs>`                       | `SetCycleInterval` |
//! | `reset-valves`                          | `ResetValves`      |
//!
//! Values are only parsed here; range checks happen in the service.

use core::fmt;
use core::str::FromStr;
use std::io::{BufRead, ErrorKind};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use heapless::String;
use log::{debug, warn};

use super::control::ControlSender;
use crate::app::commands::{ControlCommand, RAW_DESCRIPTION_LEN};

const STACK_SIZE: usize = 4 * 1024;

/// Sleep between reads when the console has nothing buffered.
const IDLE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    UnknownCommand,
    MissingArgument(&'static str),
    BadNumber(&'static str),
    BadSwitch,
    LabelTooLong,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand => write!(f, "unknown command"),
            Self::MissingArgument(name) => write!(f, "missing <{name}>"),
            Self::BadNumber(name) => write!(f, "<{name}> is not a number in range"),
            Self::BadSwitch => write!(f, "expected on or off"),
            Self::LabelTooLong => write!(f, "label longer than {RAW_DESCRIPTION_LEN} bytes"),
        }
    }
}

fn number<'a, T: FromStr>(
    words: &mut impl Iterator<Item = &'a str>,
    name: &'static str,
) -> Result<T, ParseError> {
    words
        .next()
        .ok_or(ParseError::MissingArgument(name))?
        .parse()
        .map_err(|_| ParseError::BadNumber(name))
}

/// Parse one console line.  Surrounding whitespace is ignored and the
/// label keeps single spaces between its words.
pub fn parse_line(line: &str) -> Result<ControlCommand, ParseError> {
    let mut words = line.split_whitespace();
    match words.next() {
        Some("task") => {
            let valve = number(&mut words, "valve")?;
            let enabled = match words.next() {
                Some("on") => true,
                Some("off") => false,
                Some(_) => return Err(ParseError::BadSwitch),
                None => return Err(ParseError::MissingArgument("on|off")),
            };
            let duration_secs = number(&mut words, "secs")?;

            let mut description = String::<RAW_DESCRIPTION_LEN>::new();
            for (i, word) in words.enumerate() {
                if i > 0 {
                    description.push(' ').map_err(|_| ParseError::LabelTooLong)?;
                }
                description.push_str(word).map_err(|_| ParseError::LabelTooLong)?;
            }
            Ok(ControlCommand::UpdateTask {
                valve,
                enabled,
                duration_secs,
                description,
            })
        }
        Some("reset-cycle") => Ok(ControlCommand::ResetCycle),
        Some("schedule") => Ok(ControlCommand::Schedule {
            delay_secs: number(&mut words, "secs")?,
        }),
        Some("interval") => Ok(ControlCommand::SetCycleInterval {
            secs: number(&mut words, "secs")?,
        }),
        Some("reset-valves") => Ok(ControlCommand::ResetValves),
        _ => Err(ParseError::UnknownCommand),
    }
}

/// Parse and queue one line.  Blank lines are ignored.
pub fn submit(line: &str, sender: &ControlSender) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return false;
    }
    match parse_line(line) {
        Ok(cmd) => {
            debug!("CMD   | console: {:?}", cmd);
            sender.send(cmd)
        }
        Err(e) => {
            warn!("CMD   | console {:?}: {}", line, e);
            false
        }
    }
}

/// Read lines from `input` until it fails hard, queueing each complete
/// line.  End of input and would-block reads are polled again after
/// [`IDLE`]; a partial line is kept until its newline arrives.
fn pump<R: BufRead>(mut input: R, sender: &ControlSender) {
    let mut line = std::string::String::new();
    loop {
        match input.read_line(&mut line) {
            Ok(_) if line.ends_with('\n') => {
                submit(&line, sender);
                line.clear();
            }
            Ok(_) => thread::sleep(IDLE),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                thread::sleep(IDLE);
            }
            Err(e) => {
                warn!("CMD   | console read failed: {}", e);
                return;
            }
        }
    }
}

/// Start the console reader thread.
pub fn spawn(sender: ControlSender) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("console".into())
        .stack_size(STACK_SIZE)
        .spawn(move || pump(std::io::stdin().lock(), &sender))
}
