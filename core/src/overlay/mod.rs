//! AI-mode line editor.
//!
//! While AI mode is active the proxy routes raw stdin bytes here instead of
//! the PTY. The editor is pure: it consumes byte chunks plus a monotonic
//! clock and returns the echo bytes to write, at most one event, and how many
//! bytes it consumed; the proxy re-feeds the tail after handling the event,
//! so nothing after an Enter or a mode change is lost. The terminal stays in
//! raw mode, so all echoing (including cursor movement) is done explicitly by
//! re-rendering the prompt line.
//!
//! An ESC that ends a chunk is held for a short window rather than treated as
//! a keypress: escape sequences can split across reads, and only silence
//! distinguishes a lone ESC from the start of one. The proxy arms a timer at
//! [`LineEditor::deadline`], same as it does for the double-ESC detector.

use std::time::{Duration, Instant};

pub const PROMPT: &str = "ai> ";

const ESC: u8 = 0x1b;
const SEQ_WINDOW: Duration = Duration::from_millis(50);
const MAX_SEQ: usize = 16;

/// What a chunk of input amounted to.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayEvent {
    /// Enter pressed with a non-empty line.
    Submit(String),
    /// Lone ESC or Ctrl+D on an empty line: back to shell mode.
    Exit,
}

#[derive(Default)]
pub struct LineEditor {
    buffer: Vec<u8>,
    cursor: usize,
    /// Partial escape sequence held across chunks, starting with ESC.
    seq: Vec<u8>,
    seq_deadline: Option<Instant>,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
        self.seq.clear();
        self.seq_deadline = None;
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The instant the proxy should next call [`on_timeout`], if any.
    ///
    /// [`on_timeout`]: LineEditor::on_timeout
    pub fn deadline(&self) -> Option<Instant> {
        self.seq_deadline
    }

    /// Process one chunk of raw input. Returns the bytes to echo, the event
    /// the chunk produced (if any), and how many bytes were consumed.
    /// Processing stops at the first event; the proxy re-feeds the
    /// unconsumed tail after the event is handled, under whatever mode is
    /// then active.
    pub fn handle_input(
        &mut self,
        data: &[u8],
        now: Instant,
    ) -> (Vec<u8>, Option<OverlayEvent>, usize) {
        let mut echo = Vec::new();
        let mut i = 0;
        while i < data.len() {
            let byte = data[i];

            if !self.seq.is_empty() {
                if self.seq == [ESC] && byte != b'[' {
                    // Held ESC was a keypress after all. The byte that
                    // resolved it stays unconsumed for the next mode.
                    self.seq.clear();
                    self.seq_deadline = None;
                    echo.extend_from_slice(b"\r\n");
                    return (echo, Some(OverlayEvent::Exit), i);
                }
                i += 1;
                if self.seq.len() > 1 && (0x40..=0x7e).contains(&byte) {
                    self.seq.clear();
                    self.seq_deadline = None;
                    self.apply_csi(byte);
                    echo.extend_from_slice(&self.render());
                } else {
                    self.seq.push(byte);
                    self.seq_deadline = Some(now + SEQ_WINDOW);
                    if self.seq.len() > MAX_SEQ {
                        // Runaway sequence, drop it.
                        self.seq.clear();
                        self.seq_deadline = None;
                    }
                }
                continue;
            }

            i += 1;
            match byte {
                ESC => {
                    self.seq.push(ESC);
                    self.seq_deadline = Some(now + SEQ_WINDOW);
                }
                b'\r' | b'\n' => {
                    let line = String::from_utf8_lossy(&self.buffer).trim().to_string();
                    self.clear();
                    echo.extend_from_slice(b"\r\n");
                    if !line.is_empty() {
                        return (echo, Some(OverlayEvent::Submit(line)), i);
                    }
                    echo.extend_from_slice(PROMPT.as_bytes());
                }
                0x03 => {
                    // Ctrl+C clears the line
                    self.clear();
                    echo.extend_from_slice(b"^C\r\n");
                    echo.extend_from_slice(PROMPT.as_bytes());
                }
                0x04 => {
                    if self.buffer.is_empty() {
                        echo.extend_from_slice(b"\r\n");
                        return (echo, Some(OverlayEvent::Exit), i);
                    }
                }
                0x7f | 0x08 => {
                    if self.cursor > 0 {
                        self.cursor -= 1;
                        self.buffer.remove(self.cursor);
                        echo.extend_from_slice(&self.render());
                    }
                }
                0x01 => {
                    self.cursor = 0;
                    echo.extend_from_slice(&self.render());
                }
                0x05 => {
                    self.cursor = self.buffer.len();
                    echo.extend_from_slice(&self.render());
                }
                0x15 => {
                    // Ctrl+U kills back to the start of the line
                    self.buffer.drain(..self.cursor);
                    self.cursor = 0;
                    echo.extend_from_slice(&self.render());
                }
                b if b >= 0x20 => {
                    self.buffer.insert(self.cursor, b);
                    self.cursor += 1;
                    echo.extend_from_slice(&self.render());
                }
                _ => {}
            }
        }
        (echo, None, data.len())
    }

    /// The armed deadline fired. A held lone ESC exits AI mode; an
    /// incomplete longer sequence is discarded.
    pub fn on_timeout(&mut self, _now: Instant) -> (Vec<u8>, Option<OverlayEvent>) {
        let was_lone_esc = self.seq == [ESC];
        self.seq.clear();
        self.seq_deadline = None;
        if was_lone_esc {
            (b"\r\n".to_vec(), Some(OverlayEvent::Exit))
        } else {
            (Vec::new(), None)
        }
    }

    fn apply_csi(&mut self, final_byte: u8) {
        match final_byte {
            b'D' => self.cursor = self.cursor.saturating_sub(1),
            b'C' => self.cursor = (self.cursor + 1).min(self.buffer.len()),
            b'H' => self.cursor = 0,
            b'F' => self.cursor = self.buffer.len(),
            _ => {}
        }
    }

    /// Redraw the whole prompt line and put the cursor back where it belongs.
    fn render(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PROMPT.len() + self.buffer.len() + 16);
        out.extend_from_slice(b"\r\x1b[K");
        out.extend_from_slice(PROMPT.as_bytes());
        out.extend_from_slice(&self.buffer);
        let col = PROMPT.len() + self.cursor + 1;
        out.extend_from_slice(format!("\r\x1b[{}G", col).as_bytes());
        out
    }
}
