//! Lock-free session state and counters
//!
//! Only the session task writes these; callers read snapshots.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
    /// Built but never started
    Idle = 0,
    /// An attempt is in progress (or failed and is waiting for the caller)
    Connecting = 1,
    /// Transport connected, subscribed, presence announced
    Connected = 2,
    /// Connection dropped; a reconnect is pending or the strategy gave up
    Lost = 3,
    /// Shut down, the session task has exited
    Stopped = 4,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Connecting,
            2 => SessionState::Connected,
            3 => SessionState::Lost,
            4 => SessionState::Stopped,
            _ => SessionState::Idle,
        }
    }
}

/// Atomic wrapper around [`SessionState`]
#[derive(Debug)]
pub struct AtomicSessionState {
    inner: AtomicU8,
}

impl AtomicSessionState {
    pub fn new(state: SessionState) -> Self {
        Self {
            inner: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: SessionState) {
        self.inner.store(state as u8, Ordering::Release);
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.get() == SessionState::Connected
    }
}

/// Session counters
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    messages_received: AtomicU64,
    messages_published: AtomicU64,
    commands_dispatched: AtomicU64,
    data_dispatched: AtomicU64,
    messages_discarded: AtomicU64,
    parse_errors: AtomicU64,
    connect_attempts: AtomicU64,
    reconnect_count: AtomicU64,
}

macro_rules! counter {
    ($field:ident, $incr:ident) => {
        #[inline]
        pub fn $incr(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }

        #[inline]
        pub fn $field(&self) -> u64 {
            self.$field.load(Ordering::Relaxed)
        }
    };
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    counter!(messages_received, increment_received);
    counter!(messages_published, increment_published);
    counter!(commands_dispatched, increment_commands);
    counter!(data_dispatched, increment_data);
    counter!(messages_discarded, increment_discarded);
    counter!(parse_errors, increment_parse_errors);
    counter!(connect_attempts, increment_connect_attempts);
    counter!(reconnect_count, increment_reconnects);
}
