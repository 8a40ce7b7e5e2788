use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref MARKUP: Regex = Regex::new(r"[#*`\[\]()]").expect("valid regex");
    static ref TERM: Regex = Regex::new(r"[a-zа-яё]{2,}").expect("valid regex");
}

/// Lower-case ASCII and Cyrillic capitals; every other char is returned as is.
fn fold(c: char) -> char {
    match c {
        'A'..='Z' => c.to_ascii_lowercase(),
        'А'..='Я' => char::from_u32(c as u32 + 0x20).unwrap_or(c),
        'Ё' => 'ё',
        _ => c,
    }
}

/// Tokenize text into terms: NFC composition, markdown punctuation stripped,
/// ASCII/Cyrillic lower-casing, then maximal letter runs of at least 2 chars.
pub fn tokenize(text: &str) -> Vec<String> {
    let composed = text.nfc().collect::<String>();
    let stripped = MARKUP.replace_all(&composed, " ");
    let folded: String = stripped.chars().map(fold).collect();
    TERM.find_iter(&folded).map(|m| m.as_str().to_string()).collect()
}
