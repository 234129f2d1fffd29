use crate::domain::Envelope;
use bytes::{BufMut, Bytes, BytesMut};

/// Accumulates envelope lines for the next flush.
///
/// Owned by the dispatcher alone. Every append either writes one complete
/// line (JSON + `\n`) or nothing at all, so the bytes handed out by
/// [`BatchBuffer::take`] always end on a line boundary.
#[derive(Debug, Default)]
pub struct BatchBuffer {
    data: BytesMut,
}

impl BatchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, envelope: &Envelope) -> Result<(), serde_json::Error> {
        let mark = self.data.len();
        if let Err(e) = serde_json::to_writer((&mut self.data).writer(), envelope) {
            self.data.truncate(mark);
            return Err(e);
        }
        self.data.put_u8(b'\n');
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Hands out everything buffered so far and leaves the buffer empty.
    pub fn take(&mut self) -> Bytes {
        self.data.split().freeze()
    }
}
