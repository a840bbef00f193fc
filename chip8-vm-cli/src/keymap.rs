use chip8_vm::{KeyCode, KEYPAD_LAYOUT};
use serde::Deserialize;

/// Left hand side of a QWERTY keyboard, laid over the keypad grid.
const DEFAULT_KEYS: [[char; 4]; 4] = [
    ['1', '2', '3', '4'],
    ['q', 'w', 'e', 'r'],
    ['a', 's', 'd', 'f'],
    ['z', 'x', 'c', 'v'],
];

/// Input mapper
///
/// Maps characters typed on the host keyboard to the 16 keys of the
/// old COSMAC VIP keypad.
#[derive(Debug)]
pub struct KeyMap {
    keys: Box<[(char, KeyCode)]>,
}

/// One entry of the `keymap` section in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyDef {
    pub key: char,
    pub chip8: KeyCode,
}

impl Default for KeyMap {
    fn default() -> Self {
        let keys = DEFAULT_KEYS
            .iter()
            .flatten()
            .zip(KEYPAD_LAYOUT.iter().flatten())
            .map(|(key, keycode)| (*key, *keycode))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self { keys }
    }
}

impl KeyMap {
    pub fn from_defs(defs: &[KeyDef]) -> Self {
        let keys = defs
            .iter()
            .map(|def| (def.key.to_ascii_lowercase(), def.chip8))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        log::debug!("loaded key definitions: {:?}", keys);

        Self { keys }
    }

    /// Given a typed character, map it to a Chip8 key.
    pub fn map_key(&self, key: char) -> Option<KeyCode> {
        let key = key.to_ascii_lowercase();
        self.keys
            .iter()
            .find(|(c, _)| *c == key)
            .map(|(_, keycode)| *keycode)
    }
}
