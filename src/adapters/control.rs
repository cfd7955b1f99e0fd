//! Inbound control adapters.
//!
//! [`NullControl`] never yields a command (headless operation).
//! [`ChannelControl`] drains a bounded `embassy-sync` channel that another
//! thread fills through a [`ControlSender`], without heap allocation.
//!
//! ```text
//! ┌──────────────┐  ControlCommand  ┌──────────────┐
//! │ Console task │─────────────────▶│ Control loop │
//! │  (blocking)  │   CMD_CHANNEL    │  (polling)   │
//! └──────────────┘                  └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::app::commands::ControlCommand;
use crate::app::ports::ControlPort;

#[derive(Debug, Default, Clone, Copy)]
pub struct NullControl;

impl ControlPort for NullControl {
    fn poll_command(&mut self) -> Option<ControlCommand> {
        None
    }
}

/// Commands buffered between producer and control loop.  The loop takes
/// one per iteration, so a deeper queue only adds latency.
pub const CMD_DEPTH: usize = 8;

pub type CommandChannel = Channel<CriticalSectionRawMutex, ControlCommand, CMD_DEPTH>;

/// Firmware-wide inbound command channel: console → control loop.
pub static CMD_CHANNEL: CommandChannel = Channel::new();

/// Producer half of a [`ChannelControl`].
#[derive(Clone, Copy)]
pub struct ControlSender {
    channel: &'static CommandChannel,
}

impl ControlSender {
    /// Queue a command without blocking.  Returns `false` and drops the
    /// command when the queue is full.
    pub fn send(&self, cmd: ControlCommand) -> bool {
        if self.channel.try_send(cmd).is_err() {
            warn!("CMD   | command channel full, dropping");
            return false;
        }
        true
    }
}

/// Consumer half: the control loop's [`ControlPort`].
pub struct ChannelControl {
    channel: &'static CommandChannel,
}

impl ChannelControl {
    pub fn new(channel: &'static CommandChannel) -> (ControlSender, Self) {
        (ControlSender { channel }, Self { channel })
    }
}

impl ControlPort for ChannelControl {
    fn poll_command(&mut self) -> Option<ControlCommand> {
        self.channel.try_receive().ok()
    }
}
