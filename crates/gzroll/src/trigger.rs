//! Rotation triggers.
//!
//! The rolling writer itself only consumes a boolean through
//! [`RollingWriter::check_rollover`](crate::RollingWriter::check_rollover);
//! deciding *when* to rotate is the caller's business. The [`TriggerPolicy`]
//! trait and the stock size/age triggers here cover the common cases so a
//! caller does not have to hand-roll the bookkeeping:
//!
//! ```ignore
//! let mut trigger = SizeTrigger::new(10 * 1024 * 1024);
//! writer.check_rollover(trigger.should_rotate(writer.current_size(), line.len()))?;
//! writer.append(line.as_bytes())?;
//! ```

use std::time::{Duration, Instant};

/// Decides, before each append, whether the writer should rotate.
pub trait TriggerPolicy: Send {
    /// `current_size` is the compressed size of the active file;
    /// `event_len` the length of the record about to be appended.
    fn should_rotate(&mut self, current_size: u64, event_len: usize) -> bool;
}

/// Rotates once the active file would exceed `max_bytes`.
#[derive(Debug, Clone)]
pub struct SizeTrigger {
    max_bytes: u64,
}

impl SizeTrigger {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

impl TriggerPolicy for SizeTrigger {
    fn should_rotate(&mut self, current_size: u64, event_len: usize) -> bool {
        current_size + event_len as u64 >= self.max_bytes
    }
}

/// Rotates once the active file has been open longer than `max_age`.
#[derive(Debug, Clone)]
pub struct AgeTrigger {
    max_age: Duration,
    opened_at: Instant,
}

impl AgeTrigger {
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            opened_at: Instant::now(),
        }
    }
}

impl TriggerPolicy for AgeTrigger {
    fn should_rotate(&mut self, _current_size: u64, _event_len: usize) -> bool {
        if self.opened_at.elapsed() >= self.max_age {
            self.opened_at = Instant::now();
            true
        } else {
            false
        }
    }
}
