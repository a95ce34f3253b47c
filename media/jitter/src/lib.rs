//! Jitter buffer (component C4): a bounded byte ring parameterised by (min, max) in
//! bytes. Per SPEC_FULL §4.5/§8:
//! - writer never blocks: append always succeeds, dropping the oldest bytes on
//!   overflow and incrementing the overflow counter;
//! - reader never blocks: a short buffer returns the available bytes plus
//!   zero-filled silence for the rest, incrementing the underflow counter;
//! - read and write are serialised by one internal mutex.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

struct TimestampedChunk {
    timestamp_us: u64,
    len: usize,
}

struct State {
    buf: VecDeque<u8>,
    chunks: VecDeque<TimestampedChunk>,
}

pub struct JitterBuffer {
    state: Mutex<State>,
    min: usize,
    max: usize,
    overflow_count: AtomicU64,
    underflow_count: AtomicU64,
}

/// Result of a timestamp-aware read: the bytes (possibly padded with silence) plus the
/// interpolated capture timestamp of the first real sample in the result, if known.
pub struct TimestampedRead {
    pub data: Vec<u8>,
    pub timestamp_us: Option<u64>,
}

impl JitterBuffer {
    pub fn new(min: usize, max: usize) -> Self {
        Self {
            state: Mutex::new(State {
                buf: VecDeque::with_capacity(max),
                chunks: VecDeque::new(),
            }),
            min,
            max,
            overflow_count: AtomicU64::new(0),
            underflow_count: AtomicU64::new(0),
        }
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn overflow_count(&self) -> u64 {
        self.overflow_count.load(Ordering::Relaxed)
    }

    pub fn underflow_count(&self) -> u64 {
        self.underflow_count.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends bytes with no timestamp tracking.
    pub fn append(&self, data: &[u8]) {
        self.append_timestamped(data, None);
    }

    /// Appends bytes, associating `timestamp_us` (the capture timestamp of the frame's
    /// first sample) with the first byte of `data`.
    pub fn append_timestamped(&self, data: &[u8], timestamp_us: Option<u64>) {
        if data.is_empty() {
            return;
        }

        let mut state = self.state.lock().unwrap();
        state.buf.extend(data.iter().copied());
        if let Some(ts) = timestamp_us {
            state.chunks.push_back(TimestampedChunk {
                timestamp_us: ts,
                len: data.len(),
            });
        }

        let mut dropped = 0usize;
        while state.buf.len() > self.max {
            state.buf.pop_front();
            dropped += 1;
        }
        if dropped > 0 {
            self.overflow_count.fetch_add(1, Ordering::Relaxed);
            let mut remaining = dropped;
            while remaining > 0 {
                match state.chunks.front_mut() {
                    Some(chunk) if chunk.len <= remaining => {
                        remaining -= chunk.len;
                        state.chunks.pop_front();
                    }
                    Some(chunk) => {
                        chunk.len -= remaining;
                        remaining = 0;
                    }
                    None => break,
                }
            }
        }
    }

    /// Reads exactly `n` bytes, padding with zero-valued silence and incrementing the
    /// underflow counter (by exactly one, regardless of the shortfall) if fewer than
    /// `n` bytes were available.
    pub fn read_exact(&self, n: usize) -> Vec<u8> {
        self.read_exact_timestamped(n, 0.0).data
    }

    /// Like [`read_exact`](Self::read_exact), additionally returning the interpolated
    /// timestamp of the first returned sample. `us_per_byte` converts a byte offset
    /// into elapsed microseconds for interpolation; pass 0.0 if timestamps are unused.
    pub fn read_exact_timestamped(&self, n: usize, us_per_byte: f64) -> TimestampedRead {
        let mut state = self.state.lock().unwrap();

        let available = state.buf.len().min(n);
        let first_timestamp = state
            .chunks
            .front()
            .map(|c| c.timestamp_us + ((c.len.saturating_sub(c.len)) as f64 * us_per_byte) as u64);

        let mut data: Vec<u8> = state.buf.drain(..available).collect();

        let mut remaining_to_trim = available;
        while remaining_to_trim > 0 {
            match state.chunks.front_mut() {
                Some(chunk) if chunk.len <= remaining_to_trim => {
                    remaining_to_trim -= chunk.len;
                    state.chunks.pop_front();
                }
                Some(chunk) => {
                    chunk.len -= remaining_to_trim;
                    remaining_to_trim = 0;
                }
                None => break,
            }
        }

        if available < n {
            self.underflow_count.fetch_add(1, Ordering::Relaxed);
            data.resize(n, 0);
        }

        TimestampedRead {
            data,
            timestamp_us: first_timestamp,
        }
    }

    /// Drops all buffered data (called on call teardown, SPEC_FULL §4.9).
    pub fn flush(&self) {
        let mut state = self.state.lock().unwrap();
        state.buf.clear();
        state.chunks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_returns_exact_bytes_within_capacity() {
        let jb = JitterBuffer::new(0, 1000);
        jb.append(&[1, 2, 3, 4]);
        let out = jb.read_exact(4);
        assert_eq!(out, vec![1, 2, 3, 4]);
        assert_eq!(jb.underflow_count(), 0);
        assert_eq!(jb.overflow_count(), 0);
    }

    #[test]
    fn read_on_empty_buffer_returns_silence_and_counts_one_underflow() {
        let jb = JitterBuffer::new(0, 1000);
        let out = jb.read_exact(160);
        assert_eq!(out, vec![0; 160]);
        assert_eq!(jb.underflow_count(), 1);
    }

    #[test]
    fn overflow_drops_oldest_and_caps_at_max() {
        let jb = JitterBuffer::new(0, 10);
        jb.append(&[0; 8]);
        jb.append(&[1; 8]); // 16 bytes total, only 10 fit -> drop 6 oldest
        assert_eq!(jb.len(), 10);
        assert_eq!(jb.overflow_count(), 1);
    }

    #[test]
    fn underflow_counts_exactly_once_per_short_read() {
        let jb = JitterBuffer::new(0, 1000);
        jb.append(&[1, 2]);
        let out = jb.read_exact(5);
        assert_eq!(out, vec![1, 2, 0, 0, 0]);
        assert_eq!(jb.underflow_count(), 1);
    }

    #[test]
    fn timestamped_append_reports_first_sample_timestamp() {
        let jb = JitterBuffer::new(0, 1000);
        jb.append_timestamped(&[1, 2, 3, 4], Some(1_000));
        let read = jb.read_exact_timestamped(4, 0.0);
        assert_eq!(read.timestamp_us, Some(1_000));
    }
}
