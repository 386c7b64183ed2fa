//! `OutputBuffer` — the per-session combined stdout/stderr tape: bounded,
//! normalised, and paged on read.

/// Strip the ASCII control bytes a terminal would otherwise interpret,
/// keeping `\n`, `\t` and ESC (`\x1b`, needed for ANSI colour codes some
/// tools still emit even when not attached to a tty).
fn normalize(raw: &str) -> String {
    let crlf_fixed = raw.replace("\r\n", "\n").replace('\r', "\n");
    crlf_fixed
        .chars()
        .filter(|&c| {
            let b = c as u32;
            b >= 0x20 || c == '\n' || c == '\t' || c == '\x1b'
        })
        .collect()
}

pub struct OutputBuffer {
    combined: String,
    max_chars: usize,
    dropped_chars: usize,
}

impl OutputBuffer {
    pub fn new(max_chars: usize) -> Self {
        Self {
            combined: String::new(),
            max_chars,
            dropped_chars: 0,
        }
    }

    /// Append raw (possibly CRLF, possibly control-byte-laden) text,
    /// normalising it first, then evicting from the head if the buffer
    /// exceeds `max_chars`.
    pub fn push(&mut self, raw: &str) {
        let text = normalize(raw);
        self.combined.push_str(&text);
        if self.combined.len() > self.max_chars {
            let excess = self.combined.len() - self.max_chars;
            let mut boundary = excess;
            while boundary < self.combined.len() && !self.combined.is_char_boundary(boundary) {
                boundary += 1;
            }
            self.combined.drain(..boundary);
            self.dropped_chars += boundary;
        }
    }

    pub fn len(&self) -> usize {
        self.combined.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combined.is_empty()
    }

    pub fn dropped_chars(&self) -> usize {
        self.dropped_chars
    }

    /// Page `self.combined[offset..]` down to `min(max_chars, max_lines)`,
    /// cutting on whichever boundary is hit first, per the
    /// `exec_command`/`write_stdin` paging rule.
    pub fn page_from(&self, offset: usize, max_chars: usize, max_lines: usize) -> PagedOutput {
        let start = offset.min(self.combined.len());
        let slice = &self.combined[start..];

        let mut char_cut = slice.len();
        if char_cut > max_chars {
            char_cut = max_chars;
            while char_cut < slice.len() && !slice.is_char_boundary(char_cut) {
                char_cut -= 1;
            }
        }
        let by_chars = &slice[..char_cut];

        let mut line_count = 0;
        let mut line_cut = by_chars.len();
        for (i, c) in by_chars.char_indices() {
            if c == '\n' {
                line_count += 1;
                if line_count == max_lines {
                    line_cut = i + 1;
                    break;
                }
            }
        }

        let text = &by_chars[..line_cut];
        PagedOutput {
            text: text.to_string(),
            next_offset: start + text.len(),
            truncated: text.len() < slice.len(),
        }
    }

    pub fn tail_lines(&self, n: usize) -> String {
        let lines: Vec<&str> = self.combined.lines().collect();
        if lines.len() <= n {
            self.combined.clone()
        } else {
            lines[lines.len() - n..].join("\n")
        }
    }
}

pub struct PagedOutput {
    pub text: String,
    pub next_offset: usize,
    pub truncated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_crlf_and_strips_control_bytes() {
        let mut buf = OutputBuffer::new(1000);
        buf.push("line1\r\nline2\x07\r\n\x1b[31mred\x1b[0m\n");
        assert_eq!(buf.combined, "line1\nline2\n\x1b[31mred\x1b[0m\n");
    }

    #[test]
    fn evicts_from_head_and_counts_dropped() {
        let mut buf = OutputBuffer::new(10);
        buf.push("0123456789");
        buf.push("abcde");
        assert_eq!(buf.len(), 10);
        assert_eq!(buf.dropped_chars(), 5);
        assert_eq!(buf.combined, "56789abcde");
    }

    #[test]
    fn pages_on_char_cap() {
        let mut buf = OutputBuffer::new(1000);
        buf.push("a".repeat(100).as_str());
        let page = buf.page_from(0, 30, 200);
        assert_eq!(page.text.len(), 30);
        assert!(page.truncated);
        assert_eq!(page.next_offset, 30);
    }

    #[test]
    fn pages_on_line_cap_when_earlier_than_char_cap() {
        let mut buf = OutputBuffer::new(1000);
        for i in 0..10 {
            buf.push(&format!("line{i}\n"));
        }
        let page = buf.page_from(0, 1000, 3);
        assert_eq!(page.text, "line0\nline1\nline2\n");
        assert!(page.truncated);
    }

    #[test]
    fn untruncated_page_covers_whole_tail() {
        let mut buf = OutputBuffer::new(1000);
        buf.push("short\n");
        let page = buf.page_from(0, 1000, 200);
        assert_eq!(page.text, "short\n");
        assert!(!page.truncated);
        assert_eq!(page.next_offset, buf.len());
    }
}
