//! Key label normalization.
//!
//! Event sources report keys in different vocabularies: web/HID style codes
//! (`KeyA`, `Digit7`), lowercase names (`backspace`, `return`), or the
//! printable character itself. Everything stored and displayed goes through
//! [`normalize_label`] so that the same physical key always lands under the
//! same label.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Label used for events that arrive without a key.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Canonical label of the backspace key.
pub const BACKSPACE_LABEL: &str = "Backspace";

/// Named keys: lowercase alias to canonical display name.
const NAMED_KEYS: &[(&str, &str)] = &[
    ("backspace", "Backspace"),
    ("bksp", "Backspace"),
    ("tab", "Tab"),
    ("enter", "Enter"),
    ("return", "Enter"),
    ("numpadenter", "Enter"),
    ("escape", "Escape"),
    ("esc", "Escape"),
    ("space", "Space"),
    ("spacebar", "Space"),
    ("delete", "Delete"),
    ("forwarddelete", "Delete"),
    ("del", "Delete"),
    ("insert", "Insert"),
    ("arrowup", "Up"),
    ("up", "Up"),
    ("arrowdown", "Down"),
    ("down", "Down"),
    ("arrowleft", "Left"),
    ("left", "Left"),
    ("arrowright", "Right"),
    ("right", "Right"),
    ("shift", "Shift"),
    ("shiftleft", "Shift"),
    ("shiftright", "Right Shift"),
    ("control", "Control"),
    ("ctrl", "Control"),
    ("controlleft", "Control"),
    ("controlright", "Right Control"),
    ("alt", "Option"),
    ("option", "Option"),
    ("altleft", "Option"),
    ("altright", "Right Option"),
    ("meta", "Command"),
    ("command", "Command"),
    ("cmd", "Command"),
    ("metaleft", "Command"),
    ("metaright", "Right Command"),
    ("capslock", "Caps Lock"),
    ("fn", "Fn"),
    ("function", "Fn"),
    ("home", "Home"),
    ("end", "End"),
    ("pageup", "Page Up"),
    ("pagedown", "Page Down"),
];

/// Display category of a key label, in ranking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCategory {
    /// A single uppercase ASCII letter.
    Letter,
    /// A single ASCII digit.
    Digit,
    /// A known named key such as `Space` or `F5`.
    Named,
    /// Anything else: punctuation, symbols, unrecognized codes.
    Other,
}

/// Maps a raw key identifier to its canonical display label.
///
/// Single ASCII letters are upper-cased, web-style codes are unwrapped,
/// named keys are canonicalized and anything unrecognized passes through.
pub fn normalize_label(raw: &str) -> String {
    let mut chars = raw.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        return normalize_char(ch);
    }

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return UNKNOWN_LABEL.to_string();
    }

    if let Some(ch) = trimmed.strip_prefix("Key").and_then(single_ascii_letter) {
        return ch.to_ascii_uppercase().to_string();
    }
    if let Some(digit) = trimmed.strip_prefix("Digit").filter(|rest| is_single_digit(rest)) {
        return digit.to_string();
    }
    if let Some(digit) = trimmed.strip_prefix("Numpad").filter(|rest| is_single_digit(rest)) {
        return format!("Num {digit}");
    }

    let lowered = trimmed.to_ascii_lowercase();
    if let Some(name) = function_key(&lowered) {
        return name;
    }
    if let Some((_, name)) = NAMED_KEYS.iter().find(|(alias, _)| *alias == lowered) {
        return (*name).to_string();
    }

    trimmed.to_string()
}

/// Returns true if the label denotes the backspace key.
pub fn is_backspace(label: &str) -> bool {
    label.eq_ignore_ascii_case(BACKSPACE_LABEL)
}

/// Classifies a label for display ordering.
pub fn category(label: &str) -> KeyCategory {
    let mut chars = label.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) if ch.is_ascii_uppercase() => KeyCategory::Letter,
        (Some(ch), None) if ch.is_ascii_digit() => KeyCategory::Digit,
        _ if is_named(label) => KeyCategory::Named,
        _ => KeyCategory::Other,
    }
}

/// Total display order for labels: category, then normalized label, then raw.
pub fn compare_labels(a: &str, b: &str) -> Ordering {
    let (norm_a, norm_b) = (normalize_label(a), normalize_label(b));
    category(&norm_a)
        .cmp(&category(&norm_b))
        .then_with(|| norm_a.cmp(&norm_b))
        .then_with(|| a.cmp(b))
}

fn normalize_char(ch: char) -> String {
    match ch {
        '\u{8}' | '\u{7f}' => BACKSPACE_LABEL.to_string(),
        '\t' => "Tab".to_string(),
        '\r' | '\n' => "Enter".to_string(),
        '\u{1b}' => "Escape".to_string(),
        ' ' => "Space".to_string(),
        c if c.is_ascii_alphabetic() => c.to_ascii_uppercase().to_string(),
        c => c.to_string(),
    }
}

fn single_ascii_letter(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) if ch.is_ascii_alphabetic() => Some(ch),
        _ => None,
    }
}

fn is_single_digit(s: &str) -> bool {
    s.len() == 1 && s.bytes().all(|b| b.is_ascii_digit())
}

fn function_key(lowered: &str) -> Option<String> {
    let number: u8 = lowered.strip_prefix('f')?.parse().ok()?;
    (1..=24).contains(&number).then(|| format!("F{number}"))
}

fn is_named(label: &str) -> bool {
    label == UNKNOWN_LABEL
        || label.starts_with("Num ")
        || function_key(&label.to_ascii_lowercase()).is_some()
        || NAMED_KEYS.iter().any(|(_, name)| *name == label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_label_becomes_unknown() {
        assert_eq!(normalize_label(""), "Unknown");
        assert_eq!(normalize_label("   "), "Unknown");
    }

    #[test]
    fn single_letters_are_uppercased() {
        assert_eq!(normalize_label("a"), "A");
        assert_eq!(normalize_label("Z"), "Z");
        assert_eq!(normalize_label("KeyQ"), "Q");
    }

    #[test]
    fn symbols_and_digits_pass_through() {
        assert_eq!(normalize_label(";"), ";");
        assert_eq!(normalize_label("7"), "7");
        assert_eq!(normalize_label("Digit7"), "7");
        assert_eq!(normalize_label("Numpad3"), "Num 3");
    }

    #[test]
    fn named_keys_are_canonicalized() {
        assert_eq!(normalize_label("backspace"), "Backspace");
        assert_eq!(normalize_label("RETURN"), "Enter");
        assert_eq!(normalize_label("ArrowLeft"), "Left");
        assert_eq!(normalize_label("f12"), "F12");
        assert_eq!(normalize_label(" "), "Space");
        assert_eq!(normalize_label("\t"), "Tab");
        assert_eq!(normalize_label("\u{7f}"), "Backspace");
    }

    #[test]
    fn unrecognized_codes_fall_back_to_raw() {
        assert_eq!(normalize_label("0x3F"), "0x3F");
        assert_eq!(normalize_label("F99"), "F99");
    }

    #[test]
    fn backspace_match_is_case_insensitive() {
        assert!(is_backspace("Backspace"));
        assert!(is_backspace("BACKSPACE"));
        assert!(!is_backspace("Delete"));
    }

    #[test]
    fn categories_order_letters_first() {
        assert_eq!(category("A"), KeyCategory::Letter);
        assert_eq!(category("4"), KeyCategory::Digit);
        assert_eq!(category("Space"), KeyCategory::Named);
        assert_eq!(category("F3"), KeyCategory::Named);
        assert_eq!(category(";"), KeyCategory::Other);
        assert!(KeyCategory::Letter < KeyCategory::Digit);
        assert!(KeyCategory::Named < KeyCategory::Other);
    }

    #[test]
    fn compare_labels_uses_raw_label_as_last_resort() {
        assert_eq!(compare_labels("A", "Space"), Ordering::Less);
        assert_eq!(compare_labels("a", "A"), Ordering::Greater);
        assert_eq!(compare_labels("1", "A"), Ordering::Greater);
    }
}
