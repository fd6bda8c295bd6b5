//! Keyed cooperative timers
//!
//! Timers count down against a caller-supplied clock and fire synchronously
//! inside [`Scheduler::update`]. Keys are unique: creating a timer under a key
//! that already has one replaces it. Actions are plain data; the owner of the
//! scheduler decides what an action means when it fires.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Milliseconds on the scheduler's clock
pub type Millis = f64;

/// Identifies one specific timer instance (not just its key)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// A scheduled timer
#[derive(Debug, Clone)]
pub struct Timer<K, A> {
    pub key: K,
    pub action: A,
    pub delay: Millis,
    pub remaining: Millis,
    pub repeat: bool,
    pub active: bool,
    last_update: Millis,
    serial: u64,
}

/// Persisted form of a timer. The action is not stored; it is re-bound from the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot<K> {
    pub key: K,
    pub delay: Millis,
    pub repeat: bool,
    pub time_remaining: Millis,
    pub is_active: bool,
}

/// Rejected timer snapshot
#[derive(Debug, Error, PartialEq)]
pub enum TimerError {
    #[error("duplicate timer key {0}")]
    DuplicateKey(String),
    #[error("timer {key} has invalid {field}")]
    InvalidValue { key: String, field: &'static str },
    #[error("no action bound for timer {0}")]
    Unbound(String),
}

/// Registry of keyed timers, kept in creation order
#[derive(Debug, Clone)]
pub struct Scheduler<K, A> {
    timers: Vec<Timer<K, A>>,
    paused: bool,
    now: Millis,
    next_serial: u64,
}

impl<K, A> Default for Scheduler<K, A> {
    fn default() -> Self {
        Self {
            timers: Vec::new(),
            paused: false,
            now: 0.0,
            next_serial: 1,
        }
    }
}

impl<K, A> Scheduler<K, A>
where
    K: Clone + PartialEq + Debug,
    A: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a timer, replacing any existing timer with the same key
    pub fn create(&mut self, key: K, action: A, delay: Millis, repeat: bool) -> TimerHandle {
        let delay = if delay.is_finite() && delay >= 0.0 {
            delay
        } else {
            log::warn!("Timer {key:?} created with invalid delay {delay}, using 0");
            0.0
        };

        self.clear_timer(&key);

        let serial = self.next_serial;
        self.next_serial += 1;
        self.timers.push(Timer {
            key,
            action,
            delay,
            remaining: delay,
            repeat,
            active: true,
            last_update: self.now,
            serial,
        });
        TimerHandle(serial)
    }

    /// True if an active timer exists for `key`
    pub fn exists(&self, key: &K) -> bool {
        self.timers.iter().any(|t| t.active && t.key == *key)
    }

    /// True if the timer behind `handle` has neither fired for good nor been replaced
    pub fn is_live(&self, handle: TimerHandle) -> bool {
        self.index_of(handle.0).is_some()
    }

    pub fn get(&self, key: &K) -> Option<&Timer<K, A>> {
        self.timers.iter().find(|t| t.key == *key)
    }

    /// Remove the timer for `key`. No-op if there is none.
    pub fn clear_timer(&mut self, key: &K) {
        self.timers.retain(|t| t.key != *key);
    }

    /// Remove every timer matching `pred`
    pub fn clear_where(&mut self, mut pred: impl FnMut(&K) -> bool) {
        self.timers.retain(|t| !pred(&t.key));
    }

    pub fn clear_all(&mut self) {
        self.timers.clear();
    }

    /// Time left before `key` fires, 0 if absent or inactive
    pub fn time_remaining(&self, key: &K) -> Millis {
        self.timers
            .iter()
            .find(|t| t.active && t.key == *key)
            .map(|t| t.remaining.max(0.0))
            .unwrap_or(0.0)
    }

    /// Freeze all countdowns
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Unfreeze countdowns. Time spent paused is not charged to any timer.
    pub fn resume(&mut self, now: Millis) {
        self.paused = false;
        self.now = now;
        for timer in &mut self.timers {
            timer.last_update = now;
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Keys of all active timers, in creation order
    pub fn active_keys(&self) -> impl Iterator<Item = &K> {
        self.timers.iter().filter(|t| t.active).map(|t| &t.key)
    }

    /// Advance every timer to `now`, firing those that are due.
    ///
    /// `dispatch` runs synchronously for each firing and may create or clear
    /// timers. Timers created during this call (including replacements of the
    /// firing key) are not considered until the next update. A repeating timer
    /// that fell several intervals behind fires once per interval.
    ///
    /// Returns the number of firings.
    pub fn update<F>(&mut self, now: Millis, mut dispatch: F) -> usize
    where
        F: FnMut(&mut Self, &K, &A),
    {
        if self.paused {
            return 0;
        }
        self.now = now;

        let due: Vec<u64> = self
            .timers
            .iter()
            .filter(|t| t.active)
            .map(|t| t.serial)
            .collect();

        let mut fired = 0;
        for serial in due {
            // Cleared by an earlier callback in this pass
            let Some(idx) = self.index_of(serial) else {
                continue;
            };
            let timer = &mut self.timers[idx];
            timer.remaining -= (now - timer.last_update).max(0.0);
            timer.last_update = now;

            loop {
                let Some(idx) = self.index_of(serial) else {
                    break;
                };
                let timer = &mut self.timers[idx];
                if !timer.active || timer.remaining > 0.0 {
                    break;
                }

                let key = timer.key.clone();
                let action = timer.action.clone();
                let repeat = timer.repeat;
                let delay = timer.delay;
                if repeat {
                    if delay > 0.0 {
                        timer.remaining += delay;
                    } else {
                        timer.remaining = 0.0;
                    }
                } else {
                    self.timers.remove(idx);
                }

                dispatch(self, &key, &action);
                fired += 1;

                // Zero-delay repeaters fire once per update
                if !repeat || delay <= 0.0 {
                    break;
                }
            }
        }
        fired
    }

    /// Snapshot every timer for persistence
    pub fn snapshot(&self) -> Vec<TimerSnapshot<K>> {
        self.timers
            .iter()
            .map(|t| TimerSnapshot {
                key: t.key.clone(),
                delay: t.delay,
                repeat: t.repeat,
                time_remaining: t.remaining,
                is_active: t.active,
            })
            .collect()
    }

    /// Replace all timers with `snapshots`, binding each action via `bind`.
    ///
    /// Either every snapshot is accepted or the scheduler is left untouched.
    pub fn restore<F>(
        &mut self,
        snapshots: &[TimerSnapshot<K>],
        now: Millis,
        mut bind: F,
    ) -> Result<(), TimerError>
    where
        F: FnMut(&K) -> Option<A>,
    {
        let mut restored: Vec<Timer<K, A>> = Vec::with_capacity(snapshots.len());
        let mut serial = self.next_serial;

        for snap in snapshots {
            let name = || format!("{:?}", snap.key);
            if restored.iter().any(|t| t.key == snap.key) {
                return Err(TimerError::DuplicateKey(name()));
            }
            if !snap.delay.is_finite() || snap.delay < 0.0 {
                return Err(TimerError::InvalidValue {
                    key: name(),
                    field: "delay",
                });
            }
            if !snap.time_remaining.is_finite() {
                return Err(TimerError::InvalidValue {
                    key: name(),
                    field: "time_remaining",
                });
            }
            let action = bind(&snap.key).ok_or_else(|| TimerError::Unbound(name()))?;

            restored.push(Timer {
                key: snap.key.clone(),
                action,
                delay: snap.delay,
                remaining: snap.time_remaining,
                repeat: snap.repeat,
                active: snap.is_active,
                last_update: now,
                serial,
            });
            serial += 1;
        }

        self.timers = restored;
        self.next_serial = serial;
        self.now = now;
        Ok(())
    }

    fn index_of(&self, serial: u64) -> Option<usize> {
        self.timers.iter().position(|t| t.serial == serial)
    }
}
