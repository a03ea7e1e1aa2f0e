//! Per-channel message buffer.
//!
//! Uses index-based separation for better performance:
//! - HeapRb stores lightweight metadata (timestamp + slab key)
//! - Slab stores the actual ChannelMessage data
//!
//! This avoids moving large payloads (point clouds) during eviction.

use std::cmp::Ordering;
use std::fmt;

use contracts::ChannelMessage;
use ringbuf::{traits::*, HeapRb};
use slab::Slab;

/// Lightweight metadata stored in the ring buffer
#[derive(Debug, Clone, Copy)]
struct EntryMeta {
    /// Timestamp for alignment lookups
    timestamp: f64,
    /// Key into the slab storage
    slab_key: usize,
}

/// Bounded most-recent-N buffer for one channel
///
/// The oldest entry is silently evicted on overflow. Entries keep insertion
/// order; lookups scan by timestamp.
pub(crate) struct ChannelBuffer {
    /// Ring buffer of metadata (timestamp + slab key)
    index: HeapRb<EntryMeta>,
    /// Actual message storage
    storage: Slab<ChannelMessage>,
    /// Timestamp of the most recently pushed entry
    last_timestamp: Option<f64>,
    /// Entries evicted by overflow
    evicted_count: u64,
}

impl fmt::Debug for ChannelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelBuffer")
            .field("len", &self.index.occupied_len())
            .field("evicted", &self.evicted_count)
            .finish()
    }
}

impl ChannelBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            index: HeapRb::new(capacity),
            storage: Slab::with_capacity(capacity),
            last_timestamp: None,
            evicted_count: 0,
        }
    }

    /// Append a message; the oldest entry is evicted if the buffer is full.
    pub fn push(&mut self, timestamp: f64, message: ChannelMessage) {
        if self.index.is_full() {
            if let Some(old_meta) = self.index.try_pop() {
                self.storage.remove(old_meta.slab_key);
            }
            self.evicted_count += 1;
        }

        let slab_key = self.storage.insert(message);
        let _ = self.index.try_push(EntryMeta {
            timestamp,
            slab_key,
        });
        self.last_timestamp = Some(timestamp);
    }

    /// Timestamp of the newest (most recently pushed) entry.
    pub fn newest_timestamp(&self) -> Option<f64> {
        if self.index.is_empty() {
            None
        } else {
            self.last_timestamp
        }
    }

    /// Find the entry closest to `target` within `window_s` seconds.
    ///
    /// Returns the message together with its signed offset (entry - target)
    /// in seconds. Ties on absolute offset keep the first match in scan order
    /// (oldest first), which is deterministic for a fixed buffer snapshot.
    pub fn find_closest(&self, target: f64, window_s: f64) -> Option<(&ChannelMessage, f64)> {
        self.index
            .iter()
            .filter(|meta| (meta.timestamp - target).abs() <= window_s)
            .min_by(|a, b| {
                let da = (a.timestamp - target).abs();
                let db = (b.timestamp - target).abs();
                da.partial_cmp(&db).unwrap_or(Ordering::Equal)
            })
            .and_then(|meta| {
                self.storage
                    .get(meta.slab_key)
                    .map(|msg| (msg, meta.timestamp - target))
            })
    }

    pub fn len(&self) -> usize {
        self.index.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn clear(&mut self) {
        while let Some(meta) = self.index.try_pop() {
            self.storage.remove(meta.slab_key);
        }
        self.last_timestamp = None;
    }

    #[allow(dead_code)]
    pub fn evicted_count(&self) -> u64 {
        self.evicted_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ChannelPayload, ObbSet};

    fn message(timestamp: f64) -> ChannelMessage {
        ChannelMessage {
            timestamp: Some(timestamp),
            sequence_id: None,
            source: None,
            payload: ChannelPayload::ObbSet(ObbSet::default()),
        }
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut buffer = ChannelBuffer::new(3);
        for t in 1..=4 {
            buffer.push(t as f64, message(t as f64));
        }

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.evicted_count(), 1);
        // 1.0 was evicted; 2.0 is the oldest survivor.
        assert!(buffer.find_closest(1.0, 0.5).is_none());
        assert!(buffer.find_closest(2.0, 0.5).is_some());
    }

    #[test]
    fn test_find_closest_within_window() {
        let mut buffer = ChannelBuffer::new(10);
        buffer.push(1.0, message(1.0));
        buffer.push(1.05, message(1.05));
        buffer.push(1.1, message(1.1));

        let (_, offset) = buffer.find_closest(1.04, 0.1).unwrap();
        assert!((offset - 0.01).abs() < 1e-9);

        // Nothing within a 1ms window around 1.2.
        assert!(buffer.find_closest(1.2, 0.001).is_none());
    }

    #[test]
    fn test_tie_break_keeps_scan_order() {
        let mut buffer = ChannelBuffer::new(10);
        buffer.push(0.9, message(0.9));
        buffer.push(1.1, message(1.1));

        // Both are 0.1s away from 1.0; the first pushed wins.
        let (msg, offset) = buffer.find_closest(1.0, 0.5).unwrap();
        assert_eq!(msg.timestamp, Some(0.9));
        assert!((offset + 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_newest_timestamp_follows_push_order() {
        let mut buffer = ChannelBuffer::new(10);
        assert_eq!(buffer.newest_timestamp(), None);

        buffer.push(3.0, message(3.0));
        buffer.push(2.0, message(2.0)); // out-of-order arrival
        assert_eq!(buffer.newest_timestamp(), Some(2.0));

        buffer.clear();
        assert_eq!(buffer.newest_timestamp(), None);
    }
}
