//! Deferred commands.
//!
//! Input handling only records what has to happen; the next `periodic()`
//! tick executes it. At most one command of each kind can be pending and
//! the tick always takes the most important one first.

/// Work scheduled for the next tick, in priority order (highest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PendingCommand {
    /// Erase persisted data and start over.
    FactoryReset,
    /// Persist a freshly bound secret.
    Bind,
    /// Ask the radio for a scan and report it.
    WifiList,
    /// Persist new bootstrap data and switch networks.
    SetWifi,
}

impl PendingCommand {
    const ALL: [PendingCommand; 4] = [
        PendingCommand::FactoryReset,
        PendingCommand::Bind,
        PendingCommand::WifiList,
        PendingCommand::SetWifi,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

/// Bounded set of pending commands, one slot per kind.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommandQueue {
    pending: [bool; 4],
}

impl CommandQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `command`. Returns false if it is already pending.
    pub fn push(&mut self, command: PendingCommand) -> bool {
        let slot = &mut self.pending[command.slot()];
        if *slot {
            return false;
        }
        *slot = true;
        true
    }

    /// Take the highest priority command.
    pub fn pop(&mut self) -> Option<PendingCommand> {
        let command = PendingCommand::ALL
            .into_iter()
            .find(|c| self.pending[c.slot()])?;
        self.pending[command.slot()] = false;
        Some(command)
    }

    /// Whether `command` is pending.
    pub fn contains(&self, command: PendingCommand) -> bool {
        self.pending[command.slot()]
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        !self.pending.iter().any(|&p| p)
    }

    /// Drop all pending commands.
    pub fn clear(&mut self) {
        self.pending = [false; 4];
    }
}
