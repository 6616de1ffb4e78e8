//! Input preprocessor: chunked buffer, newline normalization, retreat support.
//!
//! The preprocessor owns the decoded input and hands the tokenizer one code
//! point at a time. It performs CR/LF normalization (CR LF yields a single LF,
//! a lone CR also yields LF) and keeps a gap stack so `retreat` never lands
//! inside a consumed CR LF pair.
//!
//! Invariants:
//! - Chunk-equivalence: feeding input in one chunk or many chunks yields the
//!   same code-point sequence for equivalent text input.
//! - `retreat` exactly undoes one `advance` that returned a character.
//! - When the buffer is exhausted and more chunks may follow, `advance`
//!   returns `None` and flags `end_of_chunk_hit` instead of reporting EOF.
//!
//! Input is `&str`, so every position is a Unicode scalar value already; the
//! UTF-16 surrogate-pair combination of other runtimes is a decode-layer
//! concern and does not reappear here.

use memchr::{memchr, memchr3};

/// Drop already-tokenized input once this many bytes have been consumed.
const BUFFER_WATERLINE: usize = 1 << 16;

#[derive(Debug, Default)]
pub struct Preprocessor {
    buffer: String,
    /// Byte offset of the next unread character.
    pos: usize,
    /// Byte positions of LF characters consumed as the tail of a CR LF pair.
    gap_stack: Vec<usize>,
    skip_next_newline: bool,
    last_chunk_written: bool,
    end_of_chunk_hit: bool,
    /// Bytes discarded by `drop_parsed_chunk`, kept so reported positions stay
    /// monotonic.
    dropped: usize,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of decoded text. `is_last` marks the final chunk; once
    /// seen, exhausting the buffer means EOF rather than hibernation.
    pub fn write(&mut self, chunk: &str, is_last: bool) {
        assert!(
            !self.last_chunk_written,
            "Preprocessor::write called after the last chunk; this violates the chunk contract"
        );
        self.buffer.push_str(chunk);
        self.last_chunk_written = is_last;
        self.end_of_chunk_hit = false;
    }

    pub fn last_chunk_written(&self) -> bool {
        self.last_chunk_written
    }

    pub fn end_of_chunk_hit(&self) -> bool {
        self.end_of_chunk_hit
    }

    /// Monotonic position of the next unread character, for error records.
    pub fn position(&self) -> usize {
        self.dropped + self.pos
    }

    /// Return the next code point, or `None` at the end of buffered input.
    /// `None` means EOF only when the last chunk has been written; otherwise
    /// `end_of_chunk_hit` is set and the caller should hibernate.
    pub fn advance(&mut self) -> Option<char> {
        if self.skip_next_newline && self.buffer[self.pos..].starts_with('\n') {
            self.skip_next_newline = false;
            self.gap_stack.push(self.pos);
            self.pos += 1;
        }
        let Some(ch) = self.buffer[self.pos..].chars().next() else {
            if !self.last_chunk_written {
                self.end_of_chunk_hit = true;
            }
            return None;
        };
        self.pos += ch.len_utf8();
        if ch == '\r' {
            self.skip_next_newline = true;
            return Some('\n');
        }
        self.skip_next_newline = false;
        Some(ch)
    }

    /// Undo the last `advance` that returned a character. Gap positions (the
    /// LF of a consumed CR LF pair) are skipped, never re-visited discretely.
    pub fn retreat(&mut self) {
        debug_assert!(self.pos > 0, "retreat before the start of the buffer");
        self.pos = self.prev_char_start(self.pos);
        while self.gap_stack.last().copied() == Some(self.pos) {
            self.gap_stack.pop();
            self.pos = self.prev_char_start(self.pos);
        }
        self.skip_next_newline = false;
        self.end_of_chunk_hit = false;
    }

    /// Look at the next code point without consuming it.
    pub fn peek(&mut self) -> Option<char> {
        debug_assert!(
            !self.skip_next_newline,
            "peek with a pending CR LF gap would lose the gap on retreat"
        );
        let ch = self.advance();
        if ch.is_some() {
            self.retreat();
        }
        ch
    }

    /// Consume a maximal run of plain text: characters that are none of `<`,
    /// NUL, CR, or (when `stop_amp`) `&`. Returns the run, which may be empty.
    ///
    /// The scan is byte-wise; the delimiters are ASCII and cannot occur inside
    /// UTF-8 continuation bytes, so run boundaries stay on character
    /// boundaries. The run never crosses a pending CR LF gap.
    pub fn consume_plain_run(&mut self, stop_amp: bool) -> &str {
        if self.skip_next_newline {
            // Let `advance` resolve the pending gap first.
            return "";
        }
        let hay = &self.buffer.as_bytes()[self.pos..];
        let structural = memchr3(b'<', b'\0', b'\r', hay);
        let amp = if stop_amp { memchr(b'&', hay) } else { None };
        let end = match (structural, amp) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => hay.len(),
        };
        let start = self.pos;
        self.pos += end;
        &self.buffer[start..start + end]
    }

    /// Free the already-consumed prefix once the waterline is exceeded. Only
    /// valid at points where no retreat will cross the current position.
    pub fn drop_parsed_chunk(&mut self) {
        if self.pos < BUFFER_WATERLINE {
            return;
        }
        self.buffer.drain(..self.pos);
        self.dropped += self.pos;
        self.pos = 0;
        self.gap_stack.clear();
    }

    fn prev_char_start(&self, from: usize) -> usize {
        let mut p = from - 1;
        while !self.buffer.is_char_boundary(p) {
            p -= 1;
        }
        p
    }
}

#[cfg(test)]
mod tests {
    use super::Preprocessor;

    fn drain(pre: &mut Preprocessor) -> String {
        let mut out = String::new();
        while let Some(ch) = pre.advance() {
            out.push(ch);
        }
        out
    }

    #[test]
    fn advance_normalizes_crlf_and_lone_cr() {
        let mut pre = Preprocessor::new();
        pre.write("a\r\nb\rc", true);
        assert_eq!(drain(&mut pre), "a\nb\nc");
        assert!(!pre.end_of_chunk_hit());
    }

    #[test]
    fn crlf_split_across_chunks_yields_single_newline() {
        let mut pre = Preprocessor::new();
        pre.write("a\r", false);
        assert_eq!(pre.advance(), Some('a'));
        assert_eq!(pre.advance(), Some('\n'));
        assert_eq!(pre.advance(), None);
        assert!(pre.end_of_chunk_hit());
        pre.write("\nb", true);
        assert_eq!(pre.advance(), Some('b'));
        assert_eq!(pre.advance(), None);
        assert!(!pre.end_of_chunk_hit());
    }

    #[test]
    fn retreat_undoes_advances_across_gaps() {
        let mut pre = Preprocessor::new();
        pre.write("a\r\nb", true);
        assert_eq!(pre.advance(), Some('a'));
        assert_eq!(pre.advance(), Some('\n'));
        assert_eq!(pre.advance(), Some('b'));
        pre.retreat();
        pre.retreat();
        // Back before the CR LF pair: re-advancing replays the normalized LF.
        assert_eq!(pre.advance(), Some('\n'));
        assert_eq!(pre.advance(), Some('b'));
        assert_eq!(pre.advance(), None);
    }

    #[test]
    fn retreat_handles_multibyte_characters() {
        let mut pre = Preprocessor::new();
        pre.write("é😀x", true);
        assert_eq!(pre.advance(), Some('é'));
        assert_eq!(pre.advance(), Some('😀'));
        pre.retreat();
        assert_eq!(pre.advance(), Some('😀'));
        assert_eq!(pre.advance(), Some('x'));
    }

    #[test]
    fn exhausted_buffer_without_last_chunk_hibernates_instead_of_eof() {
        let mut pre = Preprocessor::new();
        pre.write("ab", false);
        assert_eq!(pre.advance(), Some('a'));
        assert_eq!(pre.advance(), Some('b'));
        assert_eq!(pre.advance(), None);
        assert!(pre.end_of_chunk_hit());
        pre.write("", true);
        assert_eq!(pre.advance(), None);
        assert!(!pre.end_of_chunk_hit());
    }

    #[test]
    fn plain_run_stops_at_structural_bytes() {
        let mut pre = Preprocessor::new();
        pre.write("héllo<b>&amp;", true);
        assert_eq!(pre.consume_plain_run(true), "héllo");
        assert_eq!(pre.advance(), Some('<'));
        assert_eq!(pre.consume_plain_run(true), "b>");
        assert_eq!(pre.advance(), Some('&'));
        assert_eq!(pre.consume_plain_run(false), "amp;");
    }

    #[test]
    fn plain_run_does_not_cross_pending_crlf_gap() {
        let mut pre = Preprocessor::new();
        pre.write("\r\nrest", true);
        assert_eq!(pre.advance(), Some('\n'));
        // The LF belonging to the CR is still unconsumed in the buffer; the
        // run scanner must defer to `advance` so the gap is recorded.
        assert_eq!(pre.consume_plain_run(true), "");
        assert_eq!(pre.advance(), Some('r'));
        assert_eq!(pre.consume_plain_run(true), "est");
    }

    #[test]
    fn positions_stay_monotonic_across_drop_parsed_chunk() {
        let mut pre = Preprocessor::new();
        let chunk = "x".repeat(1 << 17);
        pre.write(&chunk, false);
        while pre.advance().is_some() {}
        let before = pre.position();
        pre.drop_parsed_chunk();
        assert_eq!(pre.position(), before);
        pre.write("y", true);
        assert_eq!(pre.advance(), Some('y'));
        assert_eq!(pre.position(), before + 1);
    }
}
