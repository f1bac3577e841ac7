//! Input surface consumed from the view layer.
//!
//! Actions, field changes and keys arrive as strings and are parsed here
//! into typed events. Unrecognised input parses to `None` and is ignored by
//! the trainer.

use serde::Serialize;

/// Top-level view tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Train,
    Stats,
    Guide,
}

/// Discrete user actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    TogglePlay,
    SkipWord,
    SubmitAnswer,
    LevelNext,
    LevelPrev,
    SelectTab(Tab),
    OpenSettings,
    CloseSettings,
    /// Remote-generated drill in the current content mode
    Broadcast,
    /// Drill biased toward weak characters
    Coach,
    ConfirmReset,
}

/// Editable fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    /// The transcribed answer
    User,
    Wpm,
    EffectiveWpm,
    Frequency,
    Volume,
    ApiKey,
    ContentMode,
    AutoPlay,
    AutoLevel,
    /// Manual unlock checkbox for one character
    CharToggle(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Escape,
    CtrlSpace,
}

pub fn parse_action(name: &str) -> Option<Action> {
    let action = match name {
        "togglePlay" => Action::TogglePlay,
        "skipWord" => Action::SkipWord,
        "submitAnswer" => Action::SubmitAnswer,
        "level:next" => Action::LevelNext,
        "level:prev" => Action::LevelPrev,
        "tab:train" => Action::SelectTab(Tab::Train),
        "tab:stats" => Action::SelectTab(Tab::Stats),
        "tab:guide" => Action::SelectTab(Tab::Guide),
        "modal:settings:open" => Action::OpenSettings,
        "modal:settings:close" => Action::CloseSettings,
        "ai:broadcast" => Action::Broadcast,
        "ai:coach" => Action::Coach,
        "reset:confirm" => Action::ConfirmReset,
        _ => return None,
    };
    Some(action)
}

pub fn parse_field(name: &str) -> Option<InputField> {
    let field = match name {
        "user" => InputField::User,
        "wpm" => InputField::Wpm,
        "effectiveWpm" => InputField::EffectiveWpm,
        "frequency" => InputField::Frequency,
        "volume" => InputField::Volume,
        "apiKey" => InputField::ApiKey,
        "contentMode" => InputField::ContentMode,
        "autoPlay" => InputField::AutoPlay,
        "autoLevel" => InputField::AutoLevel,
        other => {
            let rest = other.strip_prefix("char:")?;
            let mut chars = rest.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => InputField::CharToggle(c.to_ascii_uppercase()),
                _ => return None,
            }
        }
    };
    Some(field)
}

/// Checkbox values: `true`/`false`, `on`/`off`, `1`/`0`
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Some(true),
        "false" | "off" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Key names as reported by the view, e.g. `Enter` or `Ctrl+Space`
pub fn parse_key(name: &str) -> Option<Key> {
    match name {
        "Enter" => Some(Key::Enter),
        "Escape" | "Esc" => Some(Key::Escape),
        "Ctrl+Space" | "Control+Space" => Some(Key::CtrlSpace),
        _ => None,
    }
}
