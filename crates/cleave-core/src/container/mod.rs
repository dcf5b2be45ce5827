mod reorder;

pub use reorder::{DEFAULT_PENDING_LIMIT, ReorderBuffer};

use std::io::{Read, Write};

use crate::error::CleaveError;
use crate::types::Result;

pub const FRAME_HEADER_SIZE: usize = 8;

/// Per-frame header: `[original_len u32 BE][compressed_len u32 BE]`.
/// The container is just these frames back to back, in ascending chunk id
/// order; there is no global header or trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub original_len: u32,
    pub compressed_len: u32,
}

impl FrameHeader {
    pub fn new(original_len: u32, compressed_len: u32) -> Self {
        Self {
            original_len,
            compressed_len,
        }
    }

    pub fn for_payload(original_len: usize, compressed_len: usize) -> Result<Self> {
        let original_len = u32::try_from(original_len)
            .map_err(|_| CleaveError::FrameFormat("original length exceeds u32 range"))?;
        let compressed_len = u32::try_from(compressed_len)
            .map_err(|_| CleaveError::FrameFormat("compressed length exceeds u32 range"))?;
        Ok(Self::new(original_len, compressed_len))
    }

    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut bytes = [0u8; FRAME_HEADER_SIZE];
        bytes[..4].copy_from_slice(&self.original_len.to_be_bytes());
        bytes[4..].copy_from_slice(&self.compressed_len.to_be_bytes());
        bytes
    }

    pub fn from_bytes(bytes: [u8; FRAME_HEADER_SIZE]) -> Result<Self> {
        let original_len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let compressed_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if original_len == 0 {
            return Err(CleaveError::FrameFormat("zero-length frame"));
        }
        Ok(Self::new(original_len, compressed_len))
    }

    /// Reads one header. `Ok(None)` on clean EOF at a frame boundary; a
    /// partial header is fatal.
    pub fn read_opt<R: Read>(reader: &mut R) -> Result<Option<Self>> {
        let mut bytes = [0u8; FRAME_HEADER_SIZE];
        let mut filled = 0;
        while filled < FRAME_HEADER_SIZE {
            match reader.read(&mut bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        match filled {
            0 => Ok(None),
            FRAME_HEADER_SIZE => Self::from_bytes(bytes).map(Some),
            _ => Err(CleaveError::FrameFormat("truncated frame header")),
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }
}

/// Reads one complete frame. `Ok(None)` on clean EOF; truncation inside a
/// header or payload is fatal.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<(FrameHeader, Vec<u8>)>> {
    let Some(header) = FrameHeader::read_opt(reader)? else {
        return Ok(None);
    };
    let mut payload = vec![0u8; header.compressed_len as usize];
    reader.read_exact(&mut payload).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            CleaveError::FrameFormat("truncated frame payload")
        } else {
            CleaveError::Io(e)
        }
    })?;
    Ok(Some((header, payload)))
}

/// Writes frames in ascending chunk id order.
///
/// `append` is the sequential path; `push` accepts out-of-order parallel
/// completions and holds them in a [`ReorderBuffer`] until contiguous.
/// The two must not be mixed on one writer.
pub struct ContainerWriter<W: Write> {
    writer: W,
    reorder: ReorderBuffer<(FrameHeader, Vec<u8>)>,
    frames_written: u64,
    bytes_written: u64,
}

impl<W: Write> ContainerWriter<W> {
    pub fn new(writer: W) -> Self {
        Self::with_pending_limit(writer, DEFAULT_PENDING_LIMIT)
    }

    pub fn with_pending_limit(writer: W, limit: usize) -> Self {
        Self {
            writer,
            reorder: ReorderBuffer::with_limit(limit),
            frames_written: 0,
            bytes_written: 0,
        }
    }

    pub fn append(&mut self, header: FrameHeader, payload: &[u8]) -> Result<()> {
        debug_assert_eq!(payload.len(), header.compressed_len as usize);
        header.write_to(&mut self.writer)?;
        self.writer.write_all(payload)?;
        self.frames_written += 1;
        self.bytes_written += (FRAME_HEADER_SIZE + payload.len()) as u64;
        tracing::trace!(
            frame = self.frames_written,
            original = header.original_len,
            compressed = header.compressed_len,
            "frame written"
        );
        Ok(())
    }

    /// Submits frame `id`; flushes every frame that became contiguous.
    /// Returns how many frames were written by this call.
    pub fn push(&mut self, id: u64, header: FrameHeader, payload: Vec<u8>) -> Result<usize> {
        let ready = self.reorder.push(id, (header, payload))?;
        let flushed = ready.len();
        for (header, payload) in ready {
            self.append(header, &payload)?;
        }
        Ok(flushed)
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn pending(&self) -> usize {
        self.reorder.pending_len()
    }

    pub fn finish(mut self) -> Result<W> {
        if !self.reorder.is_drained() {
            return Err(CleaveError::WorkerPool(format!(
                "container finished with {} frames still out of order",
                self.reorder.pending_len()
            )));
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Iterates frames of a container, stopping with an error on truncation.
pub struct ContainerReader<R: Read> {
    reader: R,
}

impl<R: Read> ContainerReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn next_frame(&mut self) -> Result<Option<(FrameHeader, Vec<u8>)>> {
        read_frame(&mut self.reader)
    }
}

impl<R: Read> Iterator for ContainerReader<R> {
    type Item = Result<(FrameHeader, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => None,
            Err(error) => Some(Err(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let header = FrameHeader::new(70_000, 123);
        let parsed = FrameHeader::from_bytes(header.to_bytes()).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn header_encoding_is_big_endian() {
        let header = FrameHeader::new(1, 0x0102_0304);
        assert_eq!(header.to_bytes(), [0, 0, 0, 1, 1, 2, 3, 4]);
    }

    #[test]
    fn zero_length_frame_rejected() {
        let err = FrameHeader::from_bytes([0; FRAME_HEADER_SIZE]).unwrap_err();
        assert!(matches!(err, CleaveError::FrameFormat(_)));
    }

    #[test]
    fn push_restores_id_order() {
        let mut writer = ContainerWriter::new(Vec::new());
        let frame = |byte: u8| (FrameHeader::new(1, 1), vec![byte]);

        let (h, p) = frame(b'b');
        assert_eq!(writer.push(1, h, p).unwrap(), 0);
        let (h, p) = frame(b'c');
        assert_eq!(writer.push(2, h, p).unwrap(), 0);
        let (h, p) = frame(b'a');
        assert_eq!(writer.push(0, h, p).unwrap(), 3);

        let out = writer.finish().unwrap();
        let payloads: Vec<u8> = ContainerReader::new(&out[..])
            .map(|frame| frame.unwrap().1[0])
            .collect();
        assert_eq!(payloads, b"abc");
    }

    #[test]
    fn finish_with_gap_is_an_error() {
        let mut writer = ContainerWriter::new(Vec::new());
        writer.push(1, FrameHeader::new(1, 1), vec![b'x']).unwrap();
        assert!(writer.finish().is_err());
    }

    #[test]
    fn truncated_payload_is_fatal() {
        let mut bytes = Vec::new();
        FrameHeader::new(10, 10).write_to(&mut bytes).unwrap();
        bytes.extend_from_slice(&[1, 2, 3]);
        let err = read_frame(&mut &bytes[..]).unwrap_err();
        assert!(matches!(
            err,
            CleaveError::FrameFormat("truncated frame payload")
        ));
    }

    #[test]
    fn truncated_header_is_fatal() {
        let bytes = [0u8, 0, 0];
        let err = FrameHeader::read_opt(&mut &bytes[..]).unwrap_err();
        assert!(matches!(
            err,
            CleaveError::FrameFormat("truncated frame header")
        ));
    }
}
