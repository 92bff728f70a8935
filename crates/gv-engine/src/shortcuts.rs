//! Keyboard shortcut mapping.
//!
//! Maps key + modifier combos to semantic `ShortcutAction`s for the graph
//! view. On macOS `meta` is ⌘; on other platforms `ctrl` serves the same
//! role.

/// Graph-view intents reachable from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    // ── History ──
    Undo,
    Redo,

    // ── Selection ──
    /// Remove the selected entities from the view.
    Delete,
    SelectAll,
    Deselect,

    // ── Layout ──
    RerunLayout,
}

pub struct ShortcutMap;

impl ShortcutMap {
    /// Map a key event to an intent.
    ///
    /// `key` is the `KeyboardEvent.key` value (e.g. `"z"`, `"Backspace"`).
    /// Returns `None` if the key combo has no binding.
    pub fn resolve(key: &str, ctrl: bool, shift: bool, _alt: bool, meta: bool) -> Option<ShortcutAction> {
        let cmd = ctrl || meta;

        if cmd && shift {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Redo),
                _ => None,
            };
        }

        if cmd {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Undo),
                "y" | "Y" => Some(ShortcutAction::Redo),
                "a" | "A" => Some(ShortcutAction::SelectAll),
                _ => None,
            };
        }

        if shift {
            return None;
        }

        match key {
            "Delete" | "Backspace" => Some(ShortcutAction::Delete),
            "Escape" => Some(ShortcutAction::Deselect),
            "r" | "R" => Some(ShortcutAction::RerunLayout),
            _ => None,
        }
    }
}
