//! Output accumulator with tail-only prompt search.
//!
//! Prompts sit at the very end of the output, so only the last
//! `search_depth` bytes are scanned. That keeps prompt detection cheap
//! while a large show command streams in.

use memchr::memrchr;
use regex::bytes::Regex;

#[derive(Debug)]
pub struct PatternBuffer {
    data: Vec<u8>,
    search_depth: usize,
}

impl PatternBuffer {
    pub fn new(search_depth: usize) -> Self {
        Self {
            data: Vec::with_capacity(4096),
            search_depth,
        }
    }

    /// Append device output with ANSI escapes and carriage returns removed.
    pub fn push(&mut self, chunk: &[u8]) {
        let mut cleaned = strip_ansi_escapes::strip(chunk);
        cleaned.retain(|b| *b != b'\r');
        self.data.extend_from_slice(&cleaned);
    }

    /// Whether `pattern` matches within the searched tail.
    pub fn tail_matches(&self, pattern: &Regex) -> bool {
        let start = self.data.len().saturating_sub(self.search_depth);
        pattern.is_match(&self.data[start..])
    }

    /// Drain the buffer as (lossy) UTF-8.
    pub fn take_text(&mut self) -> String {
        let data = std::mem::take(&mut self.data);
        String::from_utf8_lossy(&data).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Split output into everything before its final line, and that line.
pub fn split_last_line(text: &str) -> (&str, &str) {
    match memrchr(b'\n', text.as_bytes()) {
        Some(pos) => (&text[..pos], &text[pos + 1..]),
        None => ("", text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_cleans_terminal_noise() {
        let mut buffer = PatternBuffer::new(100);
        buffer.push(b"\x1b[1mshow clock\x1b[0m\r\n12:00\r\n");
        assert_eq!(buffer.take_text(), "show clock\n12:00\n");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_tail_only_search() {
        let prompt = Regex::new(r"(?m)^n9k#\s?$").unwrap();

        let mut buffer = PatternBuffer::new(16);
        buffer.push(&[b'x'; 200]);
        buffer.push(b"\nn9k# ");
        assert!(buffer.tail_matches(&prompt));

        let mut buffer = PatternBuffer::new(16);
        buffer.push(b"n9k#\n");
        buffer.push(&[b'x'; 200]);
        assert!(!buffer.tail_matches(&prompt));
    }

    #[test]
    fn test_split_last_line() {
        assert_eq!(split_last_line("a\nb\nn9k#"), ("a\nb", "n9k#"));
        assert_eq!(split_last_line("n9k#"), ("", "n9k#"));
    }
}
