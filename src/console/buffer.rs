//! Console Text Buffer
//!
//! Accumulates bytes received from a console into plain text. Escape
//! sequences (colours, cursor movement, OSC titles) are dropped with a `vte`
//! parser so prompt patterns only ever see printable text. The buffer keeps a
//! bounded tail of the session and a consume cursor for expect-style waits.

use vte::{Parser, Perform};

/// Default number of bytes of console history retained
pub const DEFAULT_CAPACITY: usize = 64 * 1024;

/// Collects printable output from the vte state machine
struct TextSink<'a> {
    out: &'a mut String,
    consumed: &'a mut usize,
}

impl Perform for TextSink<'_> {
    fn print(&mut self, c: char) {
        self.out.push(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' => self.out.push('\n'),
            b'\t' => self.out.push('\t'),
            // Backspace erases the previous character (line editors echo it),
            // pulling the consume cursor back if that text was already consumed
            0x08 => {
                self.out.pop();
                *self.consumed = (*self.consumed).min(self.out.len());
            }
            // CR, BEL and other C0 controls carry no prompt text
            _ => {}
        }
    }
}

/// Rolling plain-text view of a console session
pub struct ConsoleBuffer {
    parser: Parser,
    text: String,
    /// Byte offset into `text` before which output has been consumed
    consumed: usize,
    capacity: usize,
}

impl std::fmt::Debug for ConsoleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleBuffer")
            .field("len", &self.text.len())
            .field("consumed", &self.consumed)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl ConsoleBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            parser: Parser::new(),
            text: String::new(),
            consumed: 0,
            capacity: capacity.max(1),
        }
    }

    /// Feed raw console bytes
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        let mut sink = TextSink {
            out: &mut self.text,
            consumed: &mut self.consumed,
        };
        self.parser.advance(&mut sink, bytes);
        self.enforce_capacity();
    }

    /// Feed already-decoded text
    pub fn push_str(&mut self, text: &str) {
        self.push_bytes(text.as_bytes());
    }

    /// Everything retained
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Output received since the last consumed match
    pub fn unconsumed(&self) -> &str {
        &self.text[self.consumed..]
    }

    /// Mark `len` bytes of the unconsumed text as consumed
    pub fn consume(&mut self, len: usize) {
        let target = (self.consumed + len).min(self.text.len());
        self.consumed = floor_char_boundary(&self.text, target);
    }

    /// Mark everything received so far as consumed
    pub fn consume_all(&mut self) {
        self.consumed = self.text.len();
    }

    /// The last `max_chars` characters of the retained text
    pub fn tail(&self, max_chars: usize) -> &str {
        tail_chars(&self.text, max_chars)
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.consumed = 0;
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn enforce_capacity(&mut self) {
        if self.text.len() <= self.capacity {
            return;
        }
        let cut = floor_char_boundary(&self.text, self.text.len() - self.capacity);
        self.text.drain(..cut);
        self.consumed = self.consumed.saturating_sub(cut);
    }
}

impl Default for ConsoleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip escape sequences from text that did not go through a buffer
pub fn strip_escapes(text: &str) -> String {
    let mut buffer = ConsoleBuffer::with_capacity(text.len().max(1));
    buffer.push_str(text);
    buffer.text
}

/// The last `max_chars` characters of `text`
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return "";
    }
    match text.char_indices().rev().nth(max_chars - 1) {
        Some((start, _)) => &text[start..],
        None => text,
    }
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
