//! IO device interface
use std::time::Duration;

use crate::constants::*;

/// Source of keypad input.
///
/// Mapping physical keys onto the 16 keypad keys is the implementor's
/// concern, the VM only deals in [`KeyCode`]s.
pub trait InputPort: Send + Sync {
    /// Checks immediately whether the given key is currently pressed.
    fn is_pressed(&self, key: KeyCode) -> bool;

    /// Block until a key is pressed, the timeout elapses or the wait
    /// is cancelled.
    ///
    /// A `None` timeout waits until a key press or cancellation.
    fn wait_for_key_press(&self, timeout: Option<Duration>) -> KeyWait;

    /// Cancel the pending [`InputPort::wait_for_key_press`]. When no
    /// thread is waiting, the next wait is cancelled instead.
    fn cancel_wait(&self) {}
}

/// Outcome of a blocking keypad wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyWait {
    Pressed(KeyCode),
    TimedOut,
    Cancelled,
}

/// Sink for the display buffer.
pub trait Render: Send {
    /// Blit the display buffer to screen output.
    ///
    /// Called after every instruction that changed the buffer.
    fn draw(&mut self, display: &[bool; DISPLAY_BUFFER_SIZE]);
}

/// Renderer that discards every frame, for headless runs.
#[derive(Debug, Default)]
pub struct NullRender;

impl Render for NullRender {
    fn draw(&mut self, _display: &[bool; DISPLAY_BUFFER_SIZE]) {}
}

/// Layout of the hexadecimal keypad, top row first.
pub const KEYPAD_LAYOUT: [[KeyCode; 4]; 4] = {
    use KeyCode::*;
    [
        [Key1, Key2, Key3, KeyC],
        [Key4, Key5, Key6, KeyD],
        [Key7, Key8, Key9, KeyE],
        [KeyA, Key0, KeyB, KeyF],
    ]
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8"))]
#[repr(u8)]
pub enum KeyCode {
    Key0 = 0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF = 0xF,
}

impl KeyCode {
    #[inline]
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Iterate all keys in ascending order.
    pub fn all() -> impl Iterator<Item = KeyCode> {
        (0..KEY_COUNT).filter_map(|k| KeyCode::try_from(k).ok())
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let key_id = self.as_u8();
        write!(f, "k{key_id:x}")
    }
}

impl From<KeyCode> for u8 {
    fn from(keycode: KeyCode) -> Self {
        keycode.as_u8()
    }
}

impl TryFrom<u8> for KeyCode {
    type Error = InvalidKeyCode;

    fn try_from(key_id: u8) -> Result<Self, Self::Error> {
        match key_id {
            0 => Ok(Self::Key0),
            1 => Ok(Self::Key1),
            2 => Ok(Self::Key2),
            3 => Ok(Self::Key3),
            4 => Ok(Self::Key4),
            5 => Ok(Self::Key5),
            6 => Ok(Self::Key6),
            7 => Ok(Self::Key7),
            8 => Ok(Self::Key8),
            9 => Ok(Self::Key9),
            10 => Ok(Self::KeyA),
            11 => Ok(Self::KeyB),
            12 => Ok(Self::KeyC),
            13 => Ok(Self::KeyD),
            14 => Ok(Self::KeyE),
            15 => Ok(Self::KeyF),
            _ => Err(InvalidKeyCode),
        }
    }
}

#[derive(Debug)]
pub struct InvalidKeyCode;

impl std::error::Error for InvalidKeyCode {}

impl std::fmt::Display for InvalidKeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "keycode must be in range 0 <= keycode < 16")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_keycode_conversion() {
        for key_id in 0..KEY_COUNT {
            let key = KeyCode::try_from(key_id).unwrap();
            assert_eq!(u8::from(key), key_id);
        }
        assert!(KeyCode::try_from(16).is_err());
        assert_eq!(KeyCode::all().count(), KEY_COUNT as usize);
        assert_eq!(KeyCode::KeyA.to_string(), "ka");
    }

    #[test]
    fn test_layout_covers_every_key() {
        let mut seen = [false; KEY_COUNT as usize];
        for key in KEYPAD_LAYOUT.iter().flatten() {
            seen[key.as_u8() as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
        assert_eq!(KEYPAD_LAYOUT[3][1], KeyCode::Key0);
    }
}
