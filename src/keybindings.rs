//! Keybinding registry: maps keys to actions, with config overrides.
//!
//! Bindings are single keys. Keys pressed with Ctrl or Alt held never
//! resolve to an action so they stay free for the terminal.
use crossterm::event::{KeyCode, KeyModifiers};
use std::collections::HashMap;

// ============================================================================
// Action Enum
// ============================================================================

/// All user-facing actions that can be triggered by keybindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    OpenLink,
    ToggleRead,
    MarkAllRead,
    ToggleStarred,
    FocusSearch,
    NextItem,
    PreviousItem,
    NextFeed,
    PreviousFeed,
    ScrollForward,
    ScrollBackward,
    ShowUnread,
    ShowStarred,
    ShowAll,
    Quit,
}

impl Action {
    pub const ALL: [Action; 15] = [
        Self::OpenLink,
        Self::ToggleRead,
        Self::MarkAllRead,
        Self::ToggleStarred,
        Self::FocusSearch,
        Self::NextItem,
        Self::PreviousItem,
        Self::NextFeed,
        Self::PreviousFeed,
        Self::ScrollForward,
        Self::ScrollBackward,
        Self::ShowUnread,
        Self::ShowStarred,
        Self::ShowAll,
        Self::Quit,
    ];

    /// Human-readable description for the help listing.
    pub fn describe(self) -> &'static str {
        match self {
            Self::OpenLink => "Open item link",
            Self::ToggleRead => "Toggle item read",
            Self::MarkAllRead => "Mark all read (unread filter only)",
            Self::ToggleStarred => "Toggle item starred",
            Self::FocusSearch => "Focus search",
            Self::NextItem => "Next item",
            Self::PreviousItem => "Previous item",
            Self::NextFeed => "Next feed",
            Self::PreviousFeed => "Previous feed",
            Self::ScrollForward => "Scroll content forward",
            Self::ScrollBackward => "Scroll content backward",
            Self::ShowUnread => "Show unread",
            Self::ShowStarred => "Show starred",
            Self::ShowAll => "Show all",
            Self::Quit => "Quit",
        }
    }

    /// Parse an action name from the `[keybindings]` config table.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "open_link" | "openlink" | "open" => Some(Self::OpenLink),
            "toggle_read" | "toggleread" | "read" => Some(Self::ToggleRead),
            "mark_all_read" | "markallread" => Some(Self::MarkAllRead),
            "toggle_starred" | "togglestarred" | "star" => Some(Self::ToggleStarred),
            "focus_search" | "focussearch" | "search" => Some(Self::FocusSearch),
            "next_item" | "nextitem" => Some(Self::NextItem),
            "previous_item" | "previousitem" | "prev_item" => Some(Self::PreviousItem),
            "next_feed" | "nextfeed" => Some(Self::NextFeed),
            "previous_feed" | "previousfeed" | "prev_feed" => Some(Self::PreviousFeed),
            "scroll_forward" | "scrollforward" => Some(Self::ScrollForward),
            "scroll_backward" | "scrollbackward" => Some(Self::ScrollBackward),
            "show_unread" | "showunread" | "unread" => Some(Self::ShowUnread),
            "show_starred" | "showstarred" | "starred" => Some(Self::ShowStarred),
            "show_all" | "showall" | "all" => Some(Self::ShowAll),
            "quit" => Some(Self::Quit),
            _ => None,
        }
    }
}

// ============================================================================
// Key Parsing
// ============================================================================

/// Parse a key string from config.
///
/// Supported formats:
/// - Single char: "q", "j", "/", "R"
/// - Named keys: "Enter", "Esc", "Tab", "Up", "Down", "Left", "Right",
///   "PageUp", "PageDown", "Space"
/// - Function keys: "F1" through "F12"
fn parse_key_string(s: &str) -> Option<KeyCode> {
    let s = s.trim();

    match s.to_lowercase().as_str() {
        "enter" | "return" => return Some(KeyCode::Enter),
        "esc" | "escape" => return Some(KeyCode::Esc),
        "tab" => return Some(KeyCode::Tab),
        "up" => return Some(KeyCode::Up),
        "down" => return Some(KeyCode::Down),
        "left" => return Some(KeyCode::Left),
        "right" => return Some(KeyCode::Right),
        "pageup" => return Some(KeyCode::PageUp),
        "pagedown" => return Some(KeyCode::PageDown),
        "space" => return Some(KeyCode::Char(' ')),
        _ => {}
    }

    if let Some(n) = s.strip_prefix(['F', 'f']) {
        if let Ok(n) = n.parse::<u8>() {
            return (1..=12).contains(&n).then_some(KeyCode::F(n));
        }
    }

    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(KeyCode::Char(c)),
        _ => None,
    }
}

/// Format a key for the help listing.
fn format_key(code: KeyCode) -> String {
    match code {
        KeyCode::Char(' ') => "Space".to_string(),
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::Up => "Up".to_string(),
        KeyCode::Down => "Down".to_string(),
        KeyCode::Left => "Left".to_string(),
        KeyCode::Right => "Right".to_string(),
        KeyCode::PageUp => "PageUp".to_string(),
        KeyCode::PageDown => "PageDown".to_string(),
        KeyCode::F(n) => format!("F{}", n),
        _ => "?".to_string(),
    }
}

// ============================================================================
// Keybinding Registry
// ============================================================================

/// Registry of keybindings, supporting default bindings and config overrides.
pub struct KeybindingRegistry {
    lookup: HashMap<KeyCode, Action>,
    /// All bindings in registration order, for the help listing
    bindings: Vec<(KeyCode, Action)>,
}

impl KeybindingRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            lookup: HashMap::new(),
            bindings: Vec::new(),
        };
        registry.register_defaults();
        registry
    }

    fn bind(&mut self, key: KeyCode, action: Action) {
        if let Some(previous) = self.lookup.insert(key, action) {
            self.bindings.retain(|(k, a)| !(*k == key && *a == previous));
        }
        self.bindings.push((key, action));
    }

    fn register_defaults(&mut self) {
        let defaults = [
            ('o', Action::OpenLink),
            ('r', Action::ToggleRead),
            ('R', Action::MarkAllRead),
            ('s', Action::ToggleStarred),
            ('/', Action::FocusSearch),
            ('j', Action::NextItem),
            ('k', Action::PreviousItem),
            ('l', Action::NextFeed),
            ('h', Action::PreviousFeed),
            ('f', Action::ScrollForward),
            ('b', Action::ScrollBackward),
            ('1', Action::ShowUnread),
            ('2', Action::ShowStarred),
            ('3', Action::ShowAll),
            ('q', Action::Quit),
        ];
        for (c, action) in defaults {
            self.bind(KeyCode::Char(c), action);
        }
    }

    /// Apply user overrides from the config keybindings map.
    ///
    /// Keys are action names (e.g., "next_item"), values are key strings.
    /// An override replaces every existing key for that action. Returns
    /// warnings for entries that could not be applied.
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, String>) -> Vec<String> {
        let mut warnings = Vec::new();

        for (action_name, key_str) in overrides {
            let Some(action) = Action::from_name(action_name) else {
                warnings.push(format!("Unknown action '{}', ignoring", action_name));
                continue;
            };
            let Some(key) = parse_key_string(key_str) else {
                warnings.push(format!(
                    "Cannot parse key '{}' for action '{}', ignoring",
                    key_str, action_name
                ));
                continue;
            };

            self.lookup.retain(|_, a| *a != action);
            self.bindings.retain(|(_, a)| *a != action);
            self.bind(key, action);

            tracing::info!(action = %action_name, key = %key_str, "Applied keybinding override");
        }

        warnings
    }

    /// Resolve a key event to an action.
    ///
    /// Shift is folded into the character itself (`R` vs `r`), so it is
    /// ignored here. Ctrl and Alt combinations never match.
    pub fn action_for_key(&self, code: KeyCode, modifiers: KeyModifiers) -> Option<Action> {
        if modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
            return None;
        }
        self.lookup.get(&code).copied()
    }

    /// (key display string, action, description) for every binding.
    pub fn all_bindings(&self) -> Vec<(String, Action, &'static str)> {
        self.bindings
            .iter()
            .map(|(key, action)| (format_key(*key), *action, action.describe()))
            .collect()
    }
}

impl Default for KeybindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
