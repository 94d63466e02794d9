use std::collections::HashMap;

use egui::{Key, Modifiers};

use crate::graph_utils::graph::ColorTag;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    DeleteSelected,
    ClearSelection,
    ToggleView,
    LinkSelected,
    ColorSelected(Option<ColorTag>),
    ReleasePositions,
    AddSelectionToSession,
    FocusNewNode,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub key: Key,
    pub command: bool,
    pub shift: bool,
}

impl KeyChord {
    pub const fn plain(key: Key) -> Self {
        Self { key, command: false, shift: false }
    }

    pub const fn with_command(key: Key) -> Self {
        Self { key, command: true, shift: false }
    }

    fn from_input(key: Key, modifiers: &Modifiers) -> Self {
        Self { key, command: modifiers.command, shift: modifiers.shift }
    }
}

/// Keyboard shortcuts, registered once at startup.
#[derive(Debug, Clone)]
pub struct CommandTable {
    bindings: HashMap<KeyChord, Command>,
}

const NUMBER_KEYS: [Key; 9] = [
    Key::Num1, Key::Num2, Key::Num3, Key::Num4, Key::Num5,
    Key::Num6, Key::Num7, Key::Num8, Key::Num9,
];

impl Default for CommandTable {
    fn default() -> Self {
        let mut t = Self { bindings: HashMap::new() };
        t.bind(KeyChord::plain(Key::Delete), Command::DeleteSelected);
        t.bind(KeyChord::plain(Key::Backspace), Command::DeleteSelected);
        t.bind(KeyChord::plain(Key::Escape), Command::ClearSelection);
        t.bind(KeyChord::plain(Key::Tab), Command::ToggleView);
        t.bind(KeyChord::plain(Key::L), Command::LinkSelected);
        t.bind(KeyChord::plain(Key::R), Command::ReleasePositions);
        t.bind(KeyChord::plain(Key::A), Command::AddSelectionToSession);
        t.bind(KeyChord::with_command(Key::N), Command::FocusNewNode);
        t.bind(KeyChord::plain(Key::Num0), Command::ColorSelected(None));
        for (i, key) in NUMBER_KEYS.iter().enumerate() {
            t.bind(KeyChord::plain(*key), Command::ColorSelected(ColorTag::from_number(i as u8 + 1)));
        }
        t
    }
}

impl CommandTable {
    pub fn bind(&mut self, chord: KeyChord, command: Command) {
        self.bindings.insert(chord, command);
    }

    pub fn lookup(&self, chord: KeyChord) -> Option<Command> {
        self.bindings.get(&chord).copied()
    }

    /// Commands for keys pressed this frame, in press order.
    pub fn collect(&self, input: &egui::InputState) -> Vec<Command> {
        input
            .events
            .iter()
            .filter_map(|e| match e {
                egui::Event::Key { key, pressed: true, modifiers, .. } => {
                    self.lookup(KeyChord::from_input(*key, modifiers))
                }
                _ => None,
            })
            .collect()
    }
}
