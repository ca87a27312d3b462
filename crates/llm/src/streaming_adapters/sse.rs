//! SSE line splitting over a raw byte stream.
//!
//! Bytes are buffered until a full line is available so that multi-byte
//! UTF-8 characters split across network chunks decode correctly.

#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a network chunk and return every complete, non-blank line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if !line.trim().is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&raw).trim().to_string();
        if line.is_empty() {
            None
        } else {
            Some(line)
        }
    }
}
