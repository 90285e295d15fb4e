/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Outgoing application messages by sequence number.
//!
//! Kept as display text so a resend can be inspected after the fact. The
//! engine's own store remains the source of truth for retransmission.

use fixbridge_core::types::SeqNum;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Bounded map of MsgSeqNum to message text.
#[derive(Debug)]
pub struct OutboundStore {
    messages: RwLock<BTreeMap<u64, String>>,
    capacity: usize,
}

impl OutboundStore {
    /// Creates a store keeping at most `capacity` messages (minimum one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: RwLock::new(BTreeMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Stores `text` under `seq_num`, dropping the lowest numbers past capacity.
    pub fn insert(&self, seq_num: SeqNum, text: String) {
        let mut messages = self.messages.write();
        messages.insert(seq_num.value(), text);
        while messages.len() > self.capacity {
            messages.pop_first();
        }
    }

    /// Returns the text stored for `seq_num`.
    #[must_use]
    pub fn get(&self, seq_num: SeqNum) -> Option<String> {
        self.messages.read().get(&seq_num.value()).cloned()
    }

    /// Returns the stored messages with numbers in `begin..=end`.
    #[must_use]
    pub fn range(&self, begin: SeqNum, end: SeqNum) -> Vec<(SeqNum, String)> {
        self.messages
            .read()
            .range(begin.value()..=end.value())
            .map(|(seq, text)| (SeqNum::new(*seq), text.clone()))
            .collect()
    }

    /// Returns the number of stored messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_range() {
        let store = OutboundStore::new(10);
        for seq in 1..=4 {
            store.insert(SeqNum::new(seq), format!("35=D|34={seq}|"));
        }
        assert_eq!(store.get(SeqNum::new(2)).as_deref(), Some("35=D|34=2|"));

        let range = store.range(SeqNum::new(2), SeqNum::new(3));
        assert_eq!(range.len(), 2);
        assert_eq!(range[0].0, SeqNum::new(2));
    }

    #[test]
    fn test_lowest_numbers_evicted() {
        let store = OutboundStore::new(2);
        store.insert(SeqNum::new(5), "a".to_string());
        store.insert(SeqNum::new(6), "b".to_string());
        store.insert(SeqNum::new(7), "c".to_string());

        assert_eq!(store.len(), 2);
        assert!(store.get(SeqNum::new(5)).is_none());
        assert!(store.get(SeqNum::new(7)).is_some());
    }
}
