//! Windows Virtual Key (VK) code ⇄ name table.
//!
//! Reference: Windows Virtual-Key Codes (winuser.h).
//!
//! # What is a Windows Virtual Key (VK) code?
//!
//! Windows assigns each keyboard key a number called a "Virtual Key code"
//! (`VK_RETURN = 0x0D`, `VK_SPACE = 0x20`, ...). They are "virtual" because
//! they identify the *logical* key rather than the physical scan code, so a
//! hotkey bound to `VK_K` fires for the key labelled K on any layout.
//!
//! Letters (`0x41..=0x5A`), digits (`0x30..=0x39`) and function keys
//! (`0x70..=0x87`) are computed; every other bindable key is listed in
//! [`NAMED_KEYS`].

/// VK codes with a fixed name. Lookups by name are case-insensitive.
const NAMED_KEYS: &[(u8, &str)] = &[
    (0x08, "Backspace"),
    (0x09, "Tab"),
    (0x0D, "Enter"),
    (0x13, "Pause"),
    (0x14, "CapsLock"),
    (0x1B, "Escape"),
    (0x20, "Space"),
    (0x21, "PageUp"),
    (0x22, "PageDown"),
    (0x23, "End"),
    (0x24, "Home"),
    (0x25, "Left"),
    (0x26, "Up"),
    (0x27, "Right"),
    (0x28, "Down"),
    (0x2C, "PrintScreen"),
    (0x2D, "Insert"),
    (0x2E, "Delete"),
    (0x5D, "Apps"),
    (0x60, "Numpad0"),
    (0x61, "Numpad1"),
    (0x62, "Numpad2"),
    (0x63, "Numpad3"),
    (0x64, "Numpad4"),
    (0x65, "Numpad5"),
    (0x66, "Numpad6"),
    (0x67, "Numpad7"),
    (0x68, "Numpad8"),
    (0x69, "Numpad9"),
    (0x6A, "Multiply"),
    (0x6B, "Add"),
    (0x6D, "Subtract"),
    (0x6E, "Decimal"),
    (0x6F, "Divide"),
    (0x90, "NumLock"),
    (0x91, "ScrollLock"),
    (0xA0, "LShift"),
    (0xA1, "RShift"),
    (0xA2, "LCtrl"),
    (0xA3, "RCtrl"),
    (0xA4, "LAlt"),
    (0xA5, "RAlt"),
    (0x5B, "LWin"),
    (0x5C, "RWin"),
    (0xBA, "Semicolon"),
    (0xBB, "Plus"),
    (0xBC, "Comma"),
    (0xBD, "Minus"),
    (0xBE, "Period"),
    (0xBF, "Slash"),
    (0xC0, "Backquote"),
    (0xDB, "LeftBracket"),
    (0xDC, "Backslash"),
    (0xDD, "RightBracket"),
    (0xDE, "Quote"),
];

/// Extra spellings accepted when parsing, mapped onto canonical names.
const ALIASES: &[(&str, u8)] = &[
    ("return", 0x0D),
    ("esc", 0x1B),
    ("del", 0x2E),
    ("ins", 0x2D),
    ("pgup", 0x21),
    ("pgdn", 0x22),
    ("menu", 0x5D),
    ("printscr", 0x2C),
];

/// Returns the canonical name of `vk`, or `None` if the code is not bindable.
pub fn vk_name(vk: u8) -> Option<String> {
    match vk {
        0x30..=0x39 | 0x41..=0x5A => Some((vk as char).to_string()),
        0x70..=0x87 => Some(format!("F{}", vk - 0x70 + 1)),
        _ => NAMED_KEYS
            .iter()
            .find(|(code, _)| *code == vk)
            .map(|(_, name)| (*name).to_string()),
    }
}

/// Resolves a key name (case-insensitive) to its VK code.
pub fn vk_from_name(name: &str) -> Option<u8> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    // Single letters and digits map to their ASCII upper-case value.
    if name.len() == 1 {
        let c = name.chars().next()?.to_ascii_uppercase();
        if c.is_ascii_uppercase() || c.is_ascii_digit() {
            return Some(c as u8);
        }
    }

    let lower = name.to_ascii_lowercase();

    if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
        if (1..=24).contains(&n) {
            return Some(0x70 + n - 1);
        }
    }

    NAMED_KEYS
        .iter()
        .find(|(_, key)| key.eq_ignore_ascii_case(&lower))
        .map(|(code, _)| *code)
        .or_else(|| {
            ALIASES
                .iter()
                .find(|(alias, _)| *alias == lower)
                .map(|(_, code)| *code)
        })
}
