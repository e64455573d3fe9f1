use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use crate::serial::error::SerialPortError;

/// Splits incoming bytes on a delimiter.
///
/// A frame is also cut when `max_len` bytes arrive without a delimiter,
/// so a device that never sends newlines still produces chunks.
#[derive(Debug, Clone)]
pub struct LinesCodec {
    /// How far we have looked for a delimiter into the buffer
    cursor: usize,

    /// How to delimit incoming byte streams.
    /// This delimiter is not included in the yielded frames.
    read_delimiter: u8,

    /// The longest frame yielded.
    max_len: usize,
}

impl LinesCodec {
    /// Create a new codec.
    pub fn new(read_delimiter: u8, max_len: usize) -> Self {
        Self {
            cursor: 0,
            read_delimiter,
            max_len: max_len.max(1),
        }
    }
}

impl Default for LinesCodec {
    fn default() -> Self {
        Self::new(b'\n', 4096)
    }
}

fn without_carriage_return(mut line: BytesMut) -> Vec<u8> {
    if line.last() == Some(&b'\r') {
        line.truncate(line.len() - 1);
    }

    line.to_vec()
}

impl Decoder for LinesCodec {
    type Item = Vec<u8>;
    type Error = SerialPortError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let read_to = src.len().min(self.max_len);
        let start = self.cursor.min(read_to);

        let look_at = &src[start..read_to];

        if let Some(position) = look_at
            .iter()
            .position(|&byte| byte == self.read_delimiter)
        {
            // Since we might "start late" in the buffer (from the cursor),
            // the "global" position within the buffer has to be calculated.
            let actual_position = start + position;

            self.cursor = 0;

            let line = src.split_to(actual_position);

            // Discard the delimiter.
            src.advance(1);

            Ok(Some(without_carriage_return(line)))
        } else if read_to == self.max_len {
            self.cursor = 0;

            Ok(Some(src.split_to(self.max_len).to_vec()))
        } else {
            // No full frame yet.
            // The same buffer comes back with possibly more data,
            // so skip what was already searched.
            self.cursor = read_to;

            Ok(None)
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }

        if src.is_empty() {
            Ok(None)
        } else {
            self.cursor = 0;
            let rest = src.split_to(src.len());

            Ok(Some(without_carriage_return(rest)))
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn splits_lines_and_strips_carriage_returns() {
        let mut codec = LinesCodec::default();
        let mut buf = BytesMut::from(&b"temp=1\r\nhum=2\npartial"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(b"temp=1".to_vec()));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(b"hum=2".to_vec()));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(&buf[..], b"partial");
    }

    #[test]
    fn completes_a_line_across_reads() {
        let mut codec = LinesCodec::default();
        let mut buf = BytesMut::from(&b"{\"temp\":"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b" 20}\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(b"{\"temp\": 20}".to_vec())
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn cuts_frames_without_delimiter_at_max_len() {
        let mut codec = LinesCodec::new(b'\n', 4);
        let mut buf = BytesMut::from(&b"\x01\x02\x03\x04\x05\x06"[..]);

        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(vec![0x01, 0x02, 0x03, 0x04])
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some(vec![0x05, 0x06]));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }

    #[test]
    fn delimiter_after_max_len_is_not_seen_early() {
        let mut codec = LinesCodec::new(b'\n', 3);
        let mut buf = BytesMut::from(&b"abcd\n"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(b"abc".to_vec()));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(b"d".to_vec()));
    }
}
