//! Keyboard input from the terminal.
use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use chip8_vm::{constants::KEY_COUNT, prelude::*, KeyCode};
use crossterm::event::{self, Event, KeyCode as TermKey, KeyEvent, KeyEventKind, KeyModifiers};

use crate::keymap::KeyMap;

/// Longest time spent blocked on terminal events, so the reader
/// notices when the VM has stopped.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Terminals without release reporting only repeat the press while a key
/// is held. A key with no repeat in this window counts as released.
const REPEAT_WINDOW: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Press(KeyCode),
    Release(KeyCode),
    Exit,
    Ignore,
}

/// Map a terminal key event to a keypad action.
pub fn translate(keymap: &KeyMap, event: &KeyEvent) -> KeyAction {
    let is_exit = match event.code {
        TermKey::Esc => true,
        TermKey::Char('c') => event.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    };

    match event.kind {
        KeyEventKind::Press if is_exit => KeyAction::Exit,
        KeyEventKind::Press | KeyEventKind::Release => {
            let key = match event.code {
                TermKey::Char(c) => keymap.map_key(c),
                _ => None,
            };
            match (key, event.kind) {
                (Some(key), KeyEventKind::Press) => KeyAction::Press(key),
                (Some(key), _) => KeyAction::Release(key),
                (None, _) => KeyAction::Ignore,
            }
        }
        // Key is already down.
        KeyEventKind::Repeat => KeyAction::Ignore,
    }
}

/// Holds keys down between repeated presses, for terminals that never
/// report a release.
#[derive(Debug)]
pub struct KeyTracker {
    held: [Option<Instant>; KEY_COUNT as usize],
    window: Duration,
}

impl KeyTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            held: [None; KEY_COUNT as usize],
            window,
        }
    }

    /// Record a press. Returns `true` when the key was not already held.
    pub fn press(&mut self, key: KeyCode, now: Instant) -> bool {
        self.held[key.as_u8() as usize].replace(now).is_none()
    }

    /// Forget every key that went unrepeated for the whole window.
    pub fn expire(&mut self, now: Instant) -> Vec<KeyCode> {
        let mut released = Vec::new();

        for (index, held) in self.held.iter_mut().enumerate() {
            if let Some(last) = *held {
                if now.saturating_duration_since(last) >= self.window {
                    *held = None;
                    if let Ok(key) = KeyCode::try_from(index as u8) {
                        released.push(key);
                    }
                }
            }
        }

        released
    }
}

/// Feeds terminal key events to the keypad until `running` is cleared.
pub struct KeyboardInput {
    keymap: KeyMap,
    keypad: Arc<Keypad>,
    interrupt: Interrupt,
    /// `None` when the terminal reports key releases itself.
    tracker: Option<KeyTracker>,
}

impl KeyboardInput {
    pub fn new(
        keymap: KeyMap,
        keypad: Arc<Keypad>,
        interrupt: Interrupt,
        reports_release: bool,
    ) -> Self {
        Self {
            keymap,
            keypad,
            interrupt,
            tracker: (!reports_release).then(|| KeyTracker::new(REPEAT_WINDOW)),
        }
    }

    pub fn run(mut self, running: &AtomicBool) -> io::Result<()> {
        while running.load(Ordering::Acquire) {
            if event::poll(POLL_INTERVAL)? {
                if let Event::Key(key_event) = event::read()? {
                    self.handle(&key_event, Instant::now());
                }
            }

            if let Some(tracker) = self.tracker.as_mut() {
                for key in tracker.expire(Instant::now()) {
                    self.keypad.release(key);
                }
            }
        }

        self.keypad.release_all();
        Ok(())
    }

    fn handle(&mut self, event: &KeyEvent, now: Instant) {
        match translate(&self.keymap, event) {
            KeyAction::Press(key) => {
                let is_new = match self.tracker.as_mut() {
                    Some(tracker) => tracker.press(key, now),
                    None => true,
                };
                if is_new {
                    self.keypad.press(key);
                }
            }
            KeyAction::Release(key) => self.keypad.release(key),
            KeyAction::Exit => {
                log::info!("exit requested");
                self.interrupt.trigger();
            }
            KeyAction::Ignore => {}
        }
    }
}
