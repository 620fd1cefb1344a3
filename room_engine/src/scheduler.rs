use std::collections::VecDeque;
use std::time::Duration;

use room_formats::Message;
use serde::Serialize;

use crate::proximity::Side;

/// A popup creation deferred until `due`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingPopup {
    #[serde(with = "millis")]
    pub due: Duration,
    pub side: Side,
    pub message: Message,
}

/// Time-ordered queue of staggered popup creations. Entries with equal due
/// times keep their insertion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreationQueue {
    pending: VecDeque<PendingPopup>,
}

impl CreationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: PendingPopup) {
        let at = self.pending.partition_point(|queued| queued.due <= entry.due);
        self.pending.insert(at, entry);
    }

    /// Removes and returns the earliest entry if it is due at `now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<PendingPopup> {
        if self.pending.front()?.due <= now {
            self.pending.pop_front()
        } else {
            None
        }
    }

    /// Drops every entry matching `predicate`, returning how many went.
    pub fn cancel_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&PendingPopup) -> bool,
    {
        let before = self.pending.len();
        self.pending.retain(|entry| !predicate(entry));
        before - self.pending.len()
    }

    pub fn contains(&self, side: Side, index: u32) -> bool {
        self.pending
            .iter()
            .any(|entry| entry.side == side && entry.message.index == index)
    }

    /// Due time of the last queued entry, used to keep new batches behind
    /// work that is still waiting.
    pub fn last_due(&self) -> Option<Duration> {
        self.pending.back().map(|entry| entry.due)
    }

    pub fn clear(&mut self) -> usize {
        self.cancel_where(|_| true)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

pub(crate) mod millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(due_ms: u64, side: Side, index: u32) -> PendingPopup {
        PendingPopup {
            due: Duration::from_millis(due_ms),
            side,
            message: Message::new(index, format!("message {index}")),
        }
    }

    #[test]
    fn entries_drain_in_due_order() {
        let mut queue = CreationQueue::new();
        queue.push(entry(1600, Side::Negative, 3));
        queue.push(entry(0, Side::Negative, 1));
        queue.push(entry(800, Side::Negative, 2));
        queue.push(entry(800, Side::Negative, 4));
        assert_eq!(queue.len(), 4);

        assert!(queue.pop_due(Duration::from_millis(0)).is_some());
        assert!(queue.pop_due(Duration::from_millis(799)).is_none());

        let drained: Vec<u32> = std::iter::from_fn(|| queue.pop_due(Duration::from_secs(5)))
            .map(|entry| entry.message.index)
            .collect();
        assert_eq!(drained, vec![2, 4, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn cancellation_filters_by_side() {
        let mut queue = CreationQueue::new();
        queue.push(entry(0, Side::Negative, 1));
        queue.push(entry(800, Side::Positive, 1));
        queue.push(entry(1600, Side::Negative, 2));

        assert!(queue.contains(Side::Positive, 1));
        assert_eq!(queue.cancel_where(|entry| entry.side == Side::Negative), 2);
        assert!(!queue.contains(Side::Negative, 1));
        assert_eq!(queue.last_due(), Some(Duration::from_millis(800)));
        assert_eq!(queue.clear(), 1);
        assert!(queue.is_empty());
    }
}
