//! Virtual terminal capture.
//!
//! Every byte the PTY produces, in either mode, is fed through a vt100
//! parser so cursor movement and line wrapping are interpreted the same way
//! the real terminal shows them. Rows that scroll off the top of the screen
//! are kept in a bounded FIFO ring; [`ScrollbackCapture::get_context`] turns
//! ring + live screen into a compressed, line-budgeted context string.

pub mod compress;

use std::collections::VecDeque;

pub struct ScrollbackCapture {
    parser: vt100::Parser,
    history: VecDeque<String>,
    capacity: usize,
}

impl ScrollbackCapture {
    pub fn new(rows: u16, cols: u16, capacity: usize) -> Self {
        ScrollbackCapture {
            parser: vt100::Parser::new(rows, cols, 0),
            history: VecDeque::new(),
            capacity,
        }
    }

    /// Feed raw output bytes. Rows pushed off the top of the screen by
    /// newlines are captured into the history ring before the screen state
    /// advances. Detecting scrolled-off rows from a raw byte stream is a
    /// heuristic: full-screen applications that repaint in place contribute
    /// only their final screen to the context, which is what a human reading
    /// the terminal would see too.
    pub fn feed(&mut self, data: &[u8]) {
        let (rows, _) = self.parser.screen().size();
        let (cursor_row, _) = self.parser.screen().cursor_position();
        let at_bottom = cursor_row >= rows.saturating_sub(1);
        let newlines = data.iter().filter(|&&b| b == b'\n').count();

        if at_bottom && newlines > 0 {
            let snapshot = self.screen_lines();
            for line in snapshot.iter().take(newlines.min(snapshot.len())) {
                self.push_history(line.clone());
            }
        }

        self.parser.process(data);
    }

    pub fn resize(&mut self, rows: u16, cols: u16) {
        self.parser.set_size(rows, cols);
    }

    /// Most recent `max_lines` of compressed context, or None if the
    /// terminal has produced nothing useful yet.
    pub fn get_context(&self, max_lines: usize) -> Option<String> {
        let mut lines: Vec<String> = self.history.iter().cloned().collect();
        lines.extend(self.screen_lines());

        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        if lines.is_empty() {
            return None;
        }

        let mut lines = compress::compress(lines);
        if lines.len() > max_lines {
            lines.drain(..lines.len() - max_lines);
        }

        let text = lines.join("\n").trim().to_string();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn push_history(&mut self, line: String) {
        if self.history.len() >= self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(line);
    }

    fn screen_lines(&self) -> Vec<String> {
        let screen = self.parser.screen();
        let (rows, cols) = screen.size();
        let mut lines = Vec::with_capacity(rows as usize);
        for row in 0..rows {
            let mut line = String::new();
            for col in 0..cols {
                if let Some(cell) = screen.cell(row, col) {
                    line.push_str(&cell.contents());
                }
            }
            lines.push(line.trim_end().to_string());
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_output_appears_in_context() {
        let mut cap = ScrollbackCapture::new(24, 80, 100);
        cap.feed(b"$ echo hello\r\nhello\r\n");
        let ctx = cap.get_context(50).unwrap();
        assert!(ctx.contains("$ echo hello"));
        assert!(ctx.contains("hello"));
    }

    #[test]
    fn test_empty_screen_yields_none() {
        let cap = ScrollbackCapture::new(24, 80, 100);
        assert!(cap.get_context(50).is_none());
    }

    #[test]
    fn test_history_never_exceeds_capacity() {
        let mut cap = ScrollbackCapture::new(4, 40, 10);
        for i in 0..200 {
            cap.feed(format!("line number {}\r\n", i).as_bytes());
        }
        assert!(cap.history_len() <= 10);
    }

    #[test]
    fn test_history_eviction_is_fifo() {
        let mut cap = ScrollbackCapture::new(4, 40, 8);
        for i in 0..50 {
            cap.feed(format!("row-{:03}\r\n", i).as_bytes());
        }
        let ctx = cap.get_context(100).unwrap();
        // Early rows must be gone, late rows present.
        assert!(!ctx.contains("row-000"));
        assert!(ctx.contains("row-049"));
    }

    #[test]
    fn test_context_respects_line_budget() {
        let mut cap = ScrollbackCapture::new(4, 40, 500);
        for i in 0..100 {
            cap.feed(format!("output {}\r\n", i).as_bytes());
        }
        let ctx = cap.get_context(5).unwrap();
        assert!(ctx.lines().count() <= 5);
        // Budget keeps the most recent lines.
        assert!(ctx.contains("output 99"));
    }

    #[test]
    fn test_ansi_color_codes_are_interpreted() {
        let mut cap = ScrollbackCapture::new(24, 80, 100);
        cap.feed(b"\x1b[31merror:\x1b[0m bad thing\r\n");
        let ctx = cap.get_context(50).unwrap();
        assert!(ctx.contains("error: bad thing"));
        assert!(!ctx.contains("\x1b"));
    }

    #[test]
    fn test_carriage_return_overwrite_keeps_final_line() {
        let mut cap = ScrollbackCapture::new(24, 80, 100);
        cap.feed(b"progress 10%\rprogress 99%");
        let ctx = cap.get_context(50).unwrap();
        assert!(ctx.contains("progress 99%"));
        assert!(!ctx.contains("10%"));
    }
}
