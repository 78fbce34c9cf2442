//! Token lookup at a cursor position

/// Characters that end a token: whitespace, quotes and shell metacharacters
const INTERRUPTING: &[char] = &[
    '\n', '\t', '"', ' ', '|', ';', ',', '!', '@', '#', '$', '(', ')', '<', '>', '/', '\\', '\'',
    '`', '~', '{', '}', '[', ']', '=', '+', '&', '^',
];

/// Whether `c` separates tokens
pub fn is_interrupting(c: char) -> bool {
    INTERRUPTING.contains(&c)
}

/// Token that contains or immediately follows `cursor`
///
/// `cursor` counts characters, not bytes, and is valid in `0..=len`. The
/// characters before the cursor are scanned backwards to the last
/// interrupting character, then forward to the next one, so a position just
/// after an interrupting character starts a fresh token. Positions past the
/// end behave like the end.
pub fn locate(text: &str, cursor: usize) -> String {
    let mut word = String::new();
    let mut chars = text.chars();

    for c in chars.by_ref().take(cursor) {
        if is_interrupting(c) {
            word.clear();
        } else {
            word.push(c);
        }
    }

    for c in chars {
        if is_interrupting(c) {
            break;
        }
        word.push(c);
    }

    word
}
