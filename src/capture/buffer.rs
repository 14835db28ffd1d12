use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::models::packet::PacketRecord;

/// Initial allocation cap so a large capacity does not reserve memory up front
const INITIAL_ALLOCATION: usize = 4096;

/// Bounded, insertion-ordered history of classified records, oldest first.
///
/// Written only by the aggregator; read by the refresh path through
/// [`SharedBuffer`].
#[derive(Debug)]
pub struct RetentionBuffer {
    records: VecDeque<PacketRecord>,
    capacity: usize,
}

pub type SharedBuffer = Arc<RwLock<RetentionBuffer>>;

impl RetentionBuffer {
    /// Create an empty buffer holding at most `capacity` records (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity.min(INITIAL_ALLOCATION)),
            capacity,
        }
    }

    pub fn shared(capacity: usize) -> SharedBuffer {
        Arc::new(RwLock::new(Self::new(capacity)))
    }

    /// Append a record, evicting the oldest entries past capacity. Returns the
    /// number of records evicted.
    pub fn push(&mut self, record: PacketRecord) -> usize {
        self.records.push_back(record);

        let excess = self.records.len().saturating_sub(self.capacity);
        if excess > 0 {
            self.records.drain(..excess);
        }
        excess
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Newest to oldest
    pub fn iter_newest_first(&self) -> impl DoubleEndedIterator<Item = &PacketRecord> {
        self.records.iter().rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::testing::record;
    use crate::models::packet::Protocol;

    fn seqs(buffer: &RetentionBuffer) -> Vec<String> {
        buffer.iter_newest_first().rev().map(|r| r.detail.clone()).collect()
    }

    #[test]
    fn test_keeps_most_recent_in_arrival_order() {
        for capacity in 1..=6 {
            for total in 0..=12 {
                let mut buffer = RetentionBuffer::new(capacity);
                for seq in 0..total {
                    buffer.push(record(Protocol::Tcp, "a", "b", seq as i64));
                    assert!(buffer.len() <= capacity);
                }

                let kept = capacity.min(total);
                let expected: Vec<String> = (total - kept..total).map(|s| format!("#{}", s)).collect();
                assert_eq!(seqs(&buffer), expected, "capacity {} total {}", capacity, total);
            }
        }
    }

    #[test]
    fn test_push_reports_evictions() {
        let mut buffer = RetentionBuffer::new(2);
        assert_eq!(buffer.push(record(Protocol::Udp, "a", "b", 0)), 0);
        assert_eq!(buffer.push(record(Protocol::Udp, "a", "b", 1)), 0);
        assert_eq!(buffer.push(record(Protocol::Udp, "a", "b", 2)), 1);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_newest_first_iteration() {
        let mut buffer = RetentionBuffer::new(10);
        for seq in 0..3 {
            buffer.push(record(Protocol::Dns, "a", "b", seq));
        }
        let order: Vec<&str> = buffer.iter_newest_first().map(|r| r.detail.as_str()).collect();
        assert_eq!(order, vec!["#2", "#1", "#0"]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut buffer = RetentionBuffer::new(0);
        buffer.push(record(Protocol::Dns, "a", "b", 0));
        buffer.push(record(Protocol::Dns, "a", "b", 1));
        assert_eq!(seqs(&buffer), vec!["#1"]);
    }
}
