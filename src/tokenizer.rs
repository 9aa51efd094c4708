//! Splits a line into normalized word tokens.
//!
//! A word byte is an ASCII letter or any byte with the high bit set, which lets
//! the extended-Latin letters of a single-byte or UTF-8 encoded text through.
//! Everything else (digits, `-`, whitespace, punctuation) ends the current word.
//! Only ASCII letters are lower-cased; high-bit bytes are passed through as is.

use bytes::Bytes;

#[inline]
pub fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphabetic() || b >= 0x80
}

/// Lazy token iterator over one line.
pub struct Tokens<'a> {
    line: &'a Bytes,
    pos: usize,
}

impl<'a> Tokens<'a> {
    pub fn new(line: &'a Bytes) -> Self {
        Tokens { line, pos: 0 }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        let text = &self.line[..];
        let mut i = self.pos;
        while i < text.len() && !is_word_byte(text[i]) {
            i += 1;
        }
        if i == text.len() {
            self.pos = i;
            return None;
        }

        let start = i;
        let mut has_upper = false;
        while i < text.len() && is_word_byte(text[i]) {
            has_upper |= text[i].is_ascii_uppercase();
            i += 1;
        }
        self.pos = i;

        let word = if has_upper {
            Bytes::from(text[start..i].to_ascii_lowercase())
        } else {
            self.line.slice(start..i)
        };
        Some(word)
    }
}

pub fn tokens(line: &Bytes) -> Tokens<'_> {
    Tokens::new(line)
}

pub fn tokenize(line: &Bytes) -> Vec<Bytes> {
    Tokens::new(line).collect()
}
