use thiserror::Error;

/// Longest line kept while waiting for its newline
pub const MAX_LINE_BYTES: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line exceeds {limit} bytes without a newline")]
pub struct LineTooLong {
    pub limit: usize,
}

/// Reassembles newline-delimited JSON from arbitrarily split network chunks.
///
/// Bytes are buffered rather than text so a multi-byte character split across
/// two chunks is decoded intact.
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    limit: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_limit(MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            limit,
        }
    }

    /// Feed a chunk and take every line it completed.
    ///
    /// Only the new chunk is scanned; earlier bytes are known to hold no
    /// newline.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, LineTooLong> {
        let base = self.pending.len();
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        for (offset, byte) in chunk.iter().enumerate() {
            if *byte == b'\n' {
                let end = base + offset;
                if let Some(line) = decode_line(&self.pending[start..end]) {
                    lines.push(line);
                }
                start = end + 1;
            }
        }
        self.pending.drain(..start);

        if self.pending.len() > self.limit {
            self.pending.clear();
            return Err(LineTooLong { limit: self.limit });
        }
        Ok(lines)
    }

    /// Flush a final line that had no trailing newline
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        decode_line(&rest)
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
