//! Sentence chunker for streamed LLM output
//!
//! Buffers tokens and hands out complete sentences. A terminator is only
//! confirmed once the next character is known, so "4.50" split across tokens
//! is not cut at the dot.

const TERMINATORS: [char; 3] = ['.', '!', '?'];
const CLOSERS: [char; 5] = ['"', '\'', ')', ']', '\u{201D}'];

/// Accumulates streamed text and splits it into sentences
#[derive(Debug, Default)]
pub struct SentenceChunker {
    buffer: String,
}

impl SentenceChunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add streamed text; returns every sentence completed by it
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);

        let chars: Vec<char> = self.buffer.chars().collect();
        let mut sentences = Vec::new();
        let mut start = 0;
        let mut i = 0;

        while i < chars.len() {
            if !TERMINATORS.contains(&chars[i]) {
                i += 1;
                continue;
            }

            // Swallow closing quotes and brackets after the terminator
            let mut end = i + 1;
            while end < chars.len() && CLOSERS.contains(&chars[end]) {
                end += 1;
            }

            let Some(&next) = chars.get(end) else {
                // Cannot tell yet whether this ends the sentence
                break;
            };
            if !next.is_whitespace() {
                i = end;
                continue;
            }

            let sentence: String = chars[start..end].iter().collect();
            let sentence = sentence.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = end;
            i = end;
        }

        self.buffer = chars[start..].iter().collect();
        sentences
    }

    /// Return whatever is left at the end of the stream
    pub fn flush(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim();
        (!rest.is_empty()).then(|| rest.to_string())
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}
