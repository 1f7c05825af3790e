//! Target-language escaping and the human-readable spellings used in
//! generated failure messages.

use crate::ranges::{CharRange, CharRanges};

/// Escapes a codepoint for use inside a C++ character or string
/// literal.
pub fn escape_char(ch: u32) -> String {
    match ch {
        0 => "\\000".to_owned(),
        0x0A => "\\n".to_owned(),
        0x0D => "\\r".to_owned(),
        0x09 => "\\t".to_owned(),
        _ if ch == '\\' as u32 || ch == '\'' as u32 || ch == '"' as u32 || ch == '?' as u32 => {
            format!("\\{}", ch as u8 as char)
        }
        _ if ch < 0x20 || ch == 0x7F => format!("\\{:03o}", ch),
        _ if ch > 0xFFFF => format!("\\U{:08X}", ch),
        _ if ch >= 0x80 => format!("\\u{:04X}", ch),
        _ => (ch as u8 as char).to_string(),
    }
}

/// Escaping when echoing a character class back in `[...]` syntax; the
/// class metacharacters need a backslash there as well.
pub fn escape_char_for_class(ch: u32) -> String {
    if ch == '-' as u32 || ch == '^' as u32 || ch == ']' as u32 {
        return format!("\\{}", ch as u8 as char);
    }
    escape_char(ch)
}

pub fn escape_string(text: &str) -> String {
    text.chars().map(|ch| escape_char(ch as u32)).collect()
}

/// How a single expected character is described to the user.
pub fn char_name(ch: u32) -> String {
    match ch {
        0x0A => "end of line ('\\n')".to_owned(),
        0x0D => "end of line ('\\r')".to_owned(),
        0x09 => "tab (\\t)".to_owned(),
        0x20 => "space (' ')".to_owned(),
        _ if ch <= 0x20 || ch >= 0x7F => {
            format!("character with code {} (0x{:X})", ch, ch)
        }
        _ => (ch as u8 as char).to_string(),
    }
}

const fn single(ch: u8) -> CharRange {
    CharRange {
        min: ch as u32,
        max: ch as u32,
    }
}

const fn range(min: u8, max: u8) -> CharRange {
    CharRange {
        min: min as u32,
        max: max as u32,
    }
}

/// Character sets with conventional names, matched exactly. Keep each
/// table sorted by `min` with maximal runs; `CharRanges::matches_set`
/// merges adjacent written ranges before comparing.
const CLASSIFIERS: &[(&str, &[CharRange])] = &[
    ("decimal digit", &[range(b'0', b'9')]),
    ("octal digit", &[range(b'0', b'7')]),
    (
        "hexadecimal digit",
        &[range(b'0', b'9'), range(b'A', b'F'), range(b'a', b'f')],
    ),
    (
        "lowercase hexadecimal digit",
        &[range(b'0', b'9'), range(b'a', b'f')],
    ),
    (
        "uppercase hexadecimal digit",
        &[range(b'0', b'9'), range(b'A', b'F')],
    ),
    ("letter", &[range(b'A', b'Z'), range(b'a', b'z')]),
    ("lowercase letter", &[range(b'a', b'z')]),
    ("uppercase letter", &[range(b'A', b'Z')]),
    (
        "letter or digit",
        &[range(b'0', b'9'), range(b'A', b'Z'), range(b'a', b'z')],
    ),
    (
        "uppercase letter or _",
        &[range(b'A', b'Z'), single(b'_')],
    ),
    (
        "lowercase letter or _",
        &[single(b'_'), range(b'a', b'z')],
    ),
    (
        "letter or _",
        &[range(b'A', b'Z'), single(b'_'), range(b'a', b'z')],
    ),
    ("digit or _", &[range(b'0', b'9'), single(b'_')]),
    (
        "letter, digit, or _",
        &[
            range(b'0', b'9'),
            range(b'A', b'Z'),
            single(b'_'),
            range(b'a', b'z'),
        ],
    ),
    (
        "uppercase letter, $, or _",
        &[single(b'$'), range(b'A', b'Z'), single(b'_')],
    ),
    (
        "lowercase letter, $, or _",
        &[single(b'$'), single(b'_'), range(b'a', b'z')],
    ),
    (
        "letter, $, or _",
        &[
            single(b'$'),
            range(b'A', b'Z'),
            single(b'_'),
            range(b'a', b'z'),
        ],
    ),
    (
        "letter, digit, $, or _",
        &[
            single(b'$'),
            range(b'0', b'9'),
            range(b'A', b'Z'),
            single(b'_'),
            range(b'a', b'z'),
        ],
    ),
    (
        "digit, $, or _",
        &[single(b'$'), range(b'0', b'9'), single(b'_')],
    ),
    ("space or tab", &[single(b'\t'), single(b' ')]),
    (
        "space, tab, or line ending",
        &[range(b'\t', b'\n'), single(b'\r'), single(b' ')],
    ),
    ("line ending", &[single(b'\n'), single(b'\r')]),
];

/// Builds the failure message for a character class: a conventional
/// name when the set has one, a short enumeration when it is small, the
/// class echoed in `[...]` syntax otherwise.
pub fn class_fail_message(inverted: bool, ranges: &CharRanges) -> String {
    let mut message = String::new();
    if !inverted {
        message.push_str("missing ");
    }
    if let Some((name, _)) = CLASSIFIERS
        .iter()
        .find(|(_, set)| ranges.matches_set(set))
    {
        message.push_str(name);
    } else {
        let total = ranges.total_count();
        if total >= 1 && total <= 5 {
            let chars: Vec<u32> = ranges
                .iter()
                .flat_map(|r| r.min..=r.max)
                .collect();
            match chars.as_slice() {
                [only] => message.push_str(&char_name(*only)),
                [a, b] => {
                    message.push_str(&char_name(*a));
                    message.push_str(" or ");
                    message.push_str(&char_name(*b));
                }
                all => {
                    message.push_str(&char_name(all[0]));
                    for (index, ch) in all[1..].iter().enumerate() {
                        message.push_str(", ");
                        if index + 2 == all.len() {
                            message.push_str("or ");
                        }
                        message.push_str(&char_name(*ch));
                    }
                }
            }
        } else {
            message.push('[');
            for range in ranges.iter() {
                if range.is_single() {
                    message.push_str(&escape_char_for_class(range.min));
                } else {
                    message.push_str(&escape_char_for_class(range.min));
                    message.push('-');
                    message.push_str(&escape_char_for_class(range.max));
                }
            }
            message.push(']');
        }
    }
    if inverted {
        message.push_str(" not allowed here");
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(spec: &[(u8, u8)]) -> CharRanges {
        let mut ranges = CharRanges::new();
        for &(min, max) in spec {
            ranges
                .insert(CharRange::new(min as u32, max as u32))
                .unwrap();
        }
        ranges
    }

    #[test]
    fn escape_basics() {
        assert_eq!(escape_char('a' as u32), "a");
        assert_eq!(escape_char('\'' as u32), "\\'");
        assert_eq!(escape_char('\n' as u32), "\\n");
        assert_eq!(escape_char(0), "\\000");
        assert_eq!(escape_char(0x1B), "\\033");
        assert_eq!(escape_char(0xE9), "\\u00E9");
        assert_eq!(escape_char(0x1F600), "\\U0001F600");
    }

    #[test]
    fn char_names() {
        assert_eq!(char_name('x' as u32), "x");
        assert_eq!(char_name(' ' as u32), "space (' ')");
        assert_eq!(char_name('\n' as u32), "end of line ('\\n')");
        assert_eq!(char_name(1), "character with code 1 (0x1)");
        assert_eq!(char_name(0xE9), "character with code 233 (0xE9)");
    }

    #[test]
    fn classifier_names_win() {
        assert_eq!(
            class_fail_message(false, &class(&[(b'0', b'9')])),
            "missing decimal digit"
        );
        assert_eq!(
            class_fail_message(
                false,
                &class(&[(b'0', b'9'), (b'A', b'Z'), (b'a', b'z'), (b'_', b'_')])
            ),
            "missing letter, digit, or _"
        );
    }

    #[test]
    fn split_ranges_still_match_classifier() {
        assert_eq!(
            class_fail_message(false, &class(&[(b'0', b'4'), (b'5', b'9')])),
            "missing decimal digit"
        );
    }

    #[test]
    fn small_sets_enumerate() {
        assert_eq!(
            class_fail_message(false, &class(&[(b'a', b'a')])),
            "missing a"
        );
        assert_eq!(
            class_fail_message(false, &class(&[(b'a', b'b')])),
            "missing a or b"
        );
        assert_eq!(
            class_fail_message(false, &class(&[(b'a', b'c')])),
            "missing a, b, or c"
        );
    }

    #[test]
    fn large_sets_echo_class_syntax() {
        assert_eq!(
            class_fail_message(false, &class(&[(b'b', b'y')])),
            "missing [b-y]"
        );
    }

    #[test]
    fn inverted_classes_use_suffix() {
        assert_eq!(
            class_fail_message(true, &class(&[(b'0', b'9')])),
            "decimal digit not allowed here"
        );
    }
}
