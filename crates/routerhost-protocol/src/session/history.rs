//! Sent-frame history
//!
//! A bounded, most-recent-first record of transmitted frames. It serves
//! two purposes: the device may ask for the last frame again, and a
//! response carries only a command id, so the opcode that provoked it is
//! looked up here. Evicted entries are simply dropped.

use crate::protocol::Command;
use std::collections::VecDeque;

/// How many recently sent frames are retained.
pub const SENT_HISTORY_CAPACITY: usize = 16;

/// Bounded ring of recently transmitted frames, most recent first.
#[derive(Debug, Default)]
pub struct SentHistory {
    entries: VecDeque<Command>,
}

impl SentHistory {
    /// New, empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transmitted frame, evicting the oldest entry once the
    /// capacity is exceeded.
    pub fn push(&mut self, command: Command) {
        self.entries.push_front(command);
        while self.entries.len() > SENT_HISTORY_CAPACITY {
            self.entries.pop_back();
        }
    }

    /// The most recently transmitted frame.
    pub fn latest(&self) -> Option<&Command> {
        self.entries.front()
    }

    /// The most recently transmitted frame whose id matches the byte the
    /// device echoed back. Ids wider than one byte match on their low
    /// byte, which is what the wire carries.
    pub fn find_by_id(&self, id: u8) -> Option<&Command> {
        self.entries.iter().find(|c| c.id_low() == id)
    }

    /// Number of retained frames.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been transmitted yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything, e.g. on disconnect.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Codec, Opcode};
    use routerhost_core::ProtocolVersion;

    fn frame(id: u16) -> Command {
        Codec::new(ProtocolVersion::Compact).empty(Opcode::GetPosition, id)
    }

    #[test]
    fn test_most_recent_first() {
        let mut history = SentHistory::new();
        history.push(frame(1));
        history.push(frame(2));
        assert_eq!(history.latest().unwrap().id(), 2);
        assert_eq!(history.find_by_id(1).unwrap().id(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = SentHistory::new();
        for id in 0..20u16 {
            history.push(frame(id));
        }
        assert_eq!(history.len(), SENT_HISTORY_CAPACITY);
        assert!(history.find_by_id(3).is_none());
        assert!(history.find_by_id(4).is_some());
        assert_eq!(history.latest().unwrap().id(), 19);
    }

    #[test]
    fn test_find_matches_low_byte_of_wide_ids() {
        let mut history = SentHistory::new();
        let cmd = Codec::new(ProtocolVersion::Extended).empty(Opcode::GetEndstops, 0x0205);
        history.push(cmd);
        assert_eq!(history.find_by_id(0x05).unwrap().id(), 0x0205);
    }
}
