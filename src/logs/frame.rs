//! Docker stream framing and line splitting
//!
//! The Docker API multiplexes stdout and stderr over one connection. Each chunk
//! starts with an 8-byte header: one stream-type byte (0 stdin, 1 stdout,
//! 2 stderr), three zero bytes, and a big-endian u32 payload length.

/// Length of the stream multiplexing header
pub const STREAM_HEADER_LEN: usize = 8;

/// Which stream a chunk of container output came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
    /// Raw, unmultiplexed output (TTY containers, or a runtime that did not demux)
    Console,
}

impl StreamKind {
    /// Map a header's first byte to the stream it announces
    pub fn from_header_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Stdin),
            1 => Some(Self::Stdout),
            2 => Some(Self::Stderr),
            _ => None,
        }
    }
}

/// Strip a multiplexing header left at the front of a line.
///
/// This is a heuristic for output that was split on newlines before being
/// demultiplexed: any line longer than the header whose first byte is a stream
/// marker loses its first 8 bytes. A text line that genuinely starts with byte
/// 0, 1 or 2 is misread as framed.
pub fn strip_stream_header(line: &[u8]) -> &[u8] {
    match line.first() {
        Some(&first)
            if line.len() > STREAM_HEADER_LEN && StreamKind::from_header_byte(first).is_some() =>
        {
            &line[STREAM_HEADER_LEN..]
        }
        _ => line,
    }
}

/// Error for a line that grew past the splitter's limit
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("token too long: line exceeds {limit} bytes")]
pub struct LineTooLong {
    pub limit: usize,
}

/// Incremental newline splitter with a bounded line length.
///
/// Bytes may arrive in arbitrary chunks; complete lines come out without their
/// `\n` (and without a trailing `\r`).
#[derive(Debug)]
pub struct LineSplitter {
    pending: Vec<u8>,
    max_line_len: usize,
}

impl LineSplitter {
    pub fn new(max_line_len: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line_len: max_line_len.max(1),
        }
    }

    /// Feed a chunk and collect every line it completes
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Vec<u8>>, LineTooLong> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.pending.extend_from_slice(&rest[..pos]);
            self.check_len()?;
            let mut line = std::mem::take(&mut self.pending);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(line);
            rest = &rest[pos + 1..];
        }

        self.pending.extend_from_slice(rest);
        self.check_len()?;
        Ok(lines)
    }

    /// Take whatever is left once the input has ended
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            let mut line = std::mem::take(&mut self.pending);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            Some(line)
        }
    }

    fn check_len(&self) -> Result<(), LineTooLong> {
        if self.pending.len() > self.max_line_len {
            Err(LineTooLong {
                limit: self.max_line_len,
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_header_from_stdout_line() {
        let mut line = vec![1, 0, 0, 0, 0, 0, 0, 5];
        line.extend_from_slice(b"hello");
        assert_eq!(strip_stream_header(&line), b"hello");
    }

    #[test]
    fn test_plain_line_unmodified() {
        assert_eq!(strip_stream_header(b"hello"), b"hello");
        assert_eq!(strip_stream_header(b"hello world, long"), b"hello world, long");
    }

    #[test]
    fn test_header_only_line_is_kept() {
        let line = [2, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(strip_stream_header(&line), &line[..]);
    }

    #[test]
    fn test_marker_byte_three_is_not_a_header() {
        let mut line = vec![3, 0, 0, 0, 0, 0, 0, 1];
        line.extend_from_slice(b"x");
        assert_eq!(strip_stream_header(&line), &line[..]);
    }

    #[test]
    fn test_text_starting_with_marker_is_misread() {
        // Known limitation of the heuristic.
        let line = b"\x01abcdefgh-payload";
        assert_eq!(strip_stream_header(line), b"h-payload");
    }

    #[test]
    fn test_splitter_handles_chunk_boundaries() {
        let mut splitter = LineSplitter::new(64);
        assert!(splitter.push(b"par").unwrap().is_empty());
        let lines = splitter.push(b"tial\r\nnext\nta").unwrap();
        assert_eq!(lines, vec![b"partial".to_vec(), b"next".to_vec()]);
        assert_eq!(splitter.finish(), Some(b"ta".to_vec()));
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn test_splitter_keeps_empty_lines() {
        let mut splitter = LineSplitter::new(64);
        let lines = splitter.push(b"a\n\nb\n").unwrap();
        assert_eq!(lines, vec![b"a".to_vec(), Vec::new(), b"b".to_vec()]);
    }

    #[test]
    fn test_splitter_rejects_long_line() {
        let mut splitter = LineSplitter::new(4);
        assert_eq!(
            splitter.push(b"abcdefgh").unwrap_err(),
            LineTooLong { limit: 4 }
        );
    }
}
