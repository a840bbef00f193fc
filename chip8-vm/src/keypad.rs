//! Shared keypad state.
use std::{
    sync::{Condvar, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use crate::{
    constants::*,
    devices::{InputPort, KeyCode, KeyWait},
};

/// Thread safe keypad that a host feeds with key events, and the
/// interpreter polls or waits on.
#[derive(Debug, Default)]
pub struct Keypad {
    state: Mutex<KeyState>,
    signal: Condvar,
}

#[derive(Debug, Default)]
struct KeyState {
    /// Keyboard input state. Pressed is a 1 bit, released is a 0 bit.
    keys: u16,
    /// Most recent key to go down, and when.
    last_press: Option<(KeyCode, Instant)>,
    /// Key that went down and is still held, not yet delivered to a waiter.
    pending: Option<KeyCode>,
    /// Cancellation that no waiter has observed yet.
    cancelled: bool,
}

impl Keypad {
    pub fn new() -> Self {
        Default::default()
    }

    fn lock(&self) -> MutexGuard<'_, KeyState> {
        // Key state is plain data, so it stays valid even if a holder panicked.
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    pub fn press(&self, key: KeyCode) {
        let mut state = self.lock();
        state.keys |= 1 << key.as_u8();
        state.last_press = Some((key, Instant::now()));
        state.pending = Some(key);
        drop(state);

        log::trace!("key down {key}");
        self.signal.notify_all();
    }

    pub fn release(&self, key: KeyCode) {
        let mut state = self.lock();
        state.keys &= !(1 << key.as_u8());
        if state.pending == Some(key) {
            state.pending = None;
        }
        drop(state);

        log::trace!("key up {key}");
    }

    /// Clear the keyboard input state, setting all keys to up.
    pub fn release_all(&self) {
        let mut state = self.lock();
        state.keys = 0;
        state.pending = None;
    }

    /// Retrieve the value of the first key that is pressed down.
    pub fn first_key(&self) -> Option<KeyCode> {
        let keys = self.lock().keys;
        (0..KEY_COUNT)
            .find(|k| keys & (1 << k) > 0)
            .and_then(|k| KeyCode::try_from(k).ok())
    }

    /// The most recent key press, and the moment it happened.
    pub fn last_press(&self) -> Option<(KeyCode, Instant)> {
        self.lock().last_press
    }

    /// Cancel the current key wait, or the next one if no thread is
    /// waiting yet. The wait returns [`KeyWait::Cancelled`].
    pub fn cancel(&self) {
        self.lock().cancelled = true;
        self.signal.notify_all();
    }

    /// Returns the pressed keys as a human readable string.
    pub fn dump_keys(&self) -> String {
        let keys = self.lock().keys;
        let pressed: Vec<String> = (0..KEY_COUNT)
            .filter(|k| keys & (1 << k) > 0)
            .map(|k| format!("k{k:x}"))
            .collect();

        if pressed.is_empty() {
            String::new()
        } else {
            format!("keys: {}", pressed.join(" "))
        }
    }
}

impl InputPort for Keypad {
    fn is_pressed(&self, key: KeyCode) -> bool {
        self.lock().keys & (1 << key.as_u8()) > 0
    }

    fn wait_for_key_press(&self, timeout: Option<Duration>) -> KeyWait {
        let state = self.lock();
        let waiting = |s: &mut KeyState| s.pending.is_none() && !s.cancelled;

        let mut state = match timeout {
            Some(timeout) => {
                self.signal
                    .wait_timeout_while(state, timeout, waiting)
                    .unwrap_or_else(|err| err.into_inner())
                    .0
            }
            None => self
                .signal
                .wait_while(state, waiting)
                .unwrap_or_else(|err| err.into_inner()),
        };

        // Cancellation wins over a press, the key stays pending for the next wait.
        if std::mem::take(&mut state.cancelled) {
            return KeyWait::Cancelled;
        }

        // A press that arrived between two waits is still delivered.
        match state.pending.take() {
            Some(key) => KeyWait::Pressed(key),
            None => KeyWait::TimedOut,
        }
    }

    fn cancel_wait(&self) {
        self.cancel();
    }
}
