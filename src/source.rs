use std::{
    collections::VecDeque,
    io::{self, ErrorKind, Read},
};

use crate::profile::InputEncoding;

/// Read until `buf` is full or the reader reports EOF, returning the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

/// Sequential reader of soft symbols.
///
/// With [InputEncoding::PackedBits] each input byte is expanded MSB first into eight
/// saturated soft symbols, `0x00` or `0xff`.
pub struct FrameSource<R> {
    reader: R,
    encoding: InputEncoding,
    bytes_read: u64,
    symbols_read: u64,
    pending: VecDeque<u8>,
    scratch: Vec<u8>,
}

impl<R: Read> FrameSource<R> {
    pub fn new(reader: R, encoding: InputEncoding) -> Self {
        Self {
            reader,
            encoding,
            bytes_read: 0,
            symbols_read: 0,
            pending: VecDeque::new(),
            scratch: Vec::new(),
        }
    }

    /// Fill `buf` with symbols, returning how many were read. A count short of
    /// `buf.len()` means the end of the stream was reached.
    ///
    /// # Errors
    /// Any read error other than [ErrorKind::Interrupted].
    pub fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = match self.encoding {
            InputEncoding::SoftSymbols => {
                let n = read_full(&mut self.reader, buf)?;
                self.bytes_read += n as u64;
                n
            }
            InputEncoding::PackedBits => self.fill_packed(buf)?,
        };
        self.symbols_read += n as u64;
        Ok(n)
    }

    fn fill_packed(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            if let Some(symbol) = self.pending.pop_front() {
                buf[filled] = symbol;
                filled += 1;
                continue;
            }
            self.scratch.resize((buf.len() - filled).div_ceil(8), 0);
            let n = read_full(&mut self.reader, &mut self.scratch)?;
            if n == 0 {
                break;
            }
            self.bytes_read += n as u64;
            for byte in &self.scratch[..n] {
                for k in (0..8).rev() {
                    self.pending
                        .push_back(if (byte >> k) & 1 == 1 { 0xff } else { 0x00 });
                }
            }
        }
        Ok(filled)
    }

    /// Total symbols handed out so far.
    pub fn symbols_read(&self) -> u64 {
        self.symbols_read
    }

    /// Total bytes consumed from the underlying reader.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// Reader returning at most 3 bytes per call.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(3).min(self.0.len());
            buf[..n].copy_from_slice(&self.0[..n]);
            self.0 = &self.0[n..];
            Ok(n)
        }
    }

    #[test]
    fn soft_symbols_fill_across_short_reads() {
        let dat: Vec<u8> = (0..10).collect();
        let mut source = FrameSource::new(Trickle(&dat), InputEncoding::SoftSymbols);

        let mut buf = [0u8; 8];
        assert_eq!(source.fill(&mut buf).unwrap(), 8);
        assert_eq!(buf, [0, 1, 2, 3, 4, 5, 6, 7]);

        assert_eq!(source.fill(&mut buf).unwrap(), 2, "short read at EOF");
        assert_eq!(buf[..2], [8, 9]);
        assert_eq!(source.fill(&mut buf).unwrap(), 0);
        assert_eq!(source.symbols_read(), 10);
    }

    #[test]
    fn packed_bits_expand_msb_first() {
        let mut source =
            FrameSource::new(Cursor::new(vec![0b1010_0001, 0xff]), InputEncoding::PackedBits);

        let mut buf = [0u8; 4];
        assert_eq!(source.fill(&mut buf).unwrap(), 4);
        assert_eq!(buf, [0xff, 0x00, 0xff, 0x00]);

        let mut buf = [0u8; 8];
        assert_eq!(source.fill(&mut buf).unwrap(), 8);
        assert_eq!(buf, [0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff]);

        let mut buf = [0u8; 8];
        assert_eq!(source.fill(&mut buf).unwrap(), 4);
        assert_eq!(source.symbols_read(), 16);
        assert_eq!(source.bytes_read(), 2);
    }

    #[test]
    fn read_error_is_returned() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(ErrorKind::Other, "device gone"))
            }
        }

        let mut source = FrameSource::new(Broken, InputEncoding::SoftSymbols);
        let err = source.fill(&mut [0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
    }
}
