use rhai::{Dynamic, Map};

// Browser key codes. Scripts written against the IDE's `vk` table rely on
// these exact integer values, so the mapping is fixed.
pub const NAMED_KEYS: &[(&str, i64)] = &[
    ("backspace", 8),
    ("tab", 9),
    ("enter", 13),
    ("shift", 16),
    ("ctrl", 17),
    ("alt", 18),
    ("pause", 19),
    ("capslock", 20),
    ("escape", 27),
    ("space", 32),
    ("pageup", 33),
    ("pagedown", 34),
    ("end", 35),
    ("home", 36),
    ("left", 37),
    ("up", 38),
    ("right", 39),
    ("down", 40),
    ("insert", 45),
    ("delete", 46),
];

pub const VK_LETTER_BASE: i64 = 65;
pub const VK_DIGIT_BASE: i64 = 48;
pub const VK_FUNCTION_BASE: i64 = 112;

/// Builds the `vk` constant table handed to scripts: named keys, `a`..`z`,
/// `num0`..`num9`, and `f1`..`f12`.
pub fn vk_map() -> Map {
    let mut map = Map::new();
    for (name, code) in NAMED_KEYS {
        map.insert((*name).into(), Dynamic::from(*code));
    }
    for (offset, letter) in ('a'..='z').enumerate() {
        map.insert(letter.to_string().into(), Dynamic::from(VK_LETTER_BASE + offset as i64));
    }
    for digit in 0..=9i64 {
        map.insert(format!("num{digit}").into(), Dynamic::from(VK_DIGIT_BASE + digit));
    }
    for function in 1..=12i64 {
        map.insert(format!("f{function}").into(), Dynamic::from(VK_FUNCTION_BASE + function - 1));
    }
    map
}
