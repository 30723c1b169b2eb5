//! Reassembly of newline-delimited lines across socket reads

/// Upper bound on a single unterminated line.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Accumulates raw bytes and yields complete lines.
///
/// A read may end mid-line or even mid-character, so bytes are buffered and
/// only decoded once their terminating `\n` arrives.
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    max_line: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line,
        }
    }

    /// Feed one read's worth of bytes; returns every line it completed,
    /// without terminators. Blank lines are skipped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let decoded = String::from_utf8_lossy(&raw[..pos]);
            let line = decoded.trim_end_matches('\r');
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }

        if self.pending.len() > self.max_line {
            tracing::warn!("Dropping {} bytes of unterminated input", self.pending.len());
            self.pending.clear();
        }
        lines
    }

    /// Bytes waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_partial_reads() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b":user!user@host PRIV").is_empty());
        assert_eq!(buffer.pending(), 20);

        let lines = buffer.push(b"MSG #chan :hi\r\n");
        assert_eq!(lines, vec![":user!user@host PRIVMSG #chan :hi"]);
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn splits_several_lines_in_one_read() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(b"PING :tmi.twitch.tv\r\n:a!a@a PRIVMSG #c :one\r\n:b!b@b PRIV");

        assert_eq!(lines, vec!["PING :tmi.twitch.tv", ":a!a@a PRIVMSG #c :one"]);
        assert_eq!(buffer.push(b"MSG #c :two\n"), vec![":b!b@b PRIVMSG #c :two"]);
    }

    #[test]
    fn keeps_multibyte_chars_split_across_reads() {
        let mut buffer = LineBuffer::new();
        let text = "привет\n".as_bytes();
        assert!(buffer.push(&text[..3]).is_empty());
        assert_eq!(buffer.push(&text[3..]), vec!["привет"]);
    }

    #[test]
    fn skips_blank_lines() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.push(b"\r\n\nPING\r\n"), vec!["PING"]);
    }

    #[test]
    fn drops_oversized_fragment() {
        let mut buffer = LineBuffer::with_max_line(8);
        assert!(buffer.push(b"0123456789").is_empty());
        assert_eq!(buffer.pending(), 0);
        assert_eq!(buffer.push(b"ok\n"), vec!["ok"]);
    }
}
