use std::io::{self, Write};

/// Destination for accepted frame payloads.
pub trait Sink {
    /// Append a single payload record.
    ///
    /// # Errors
    /// If the record cannot be written.
    fn write_record(&mut self, record: &[u8]) -> io::Result<()>;

    /// Flush any buffered records.
    ///
    /// # Errors
    /// If buffered records cannot be written.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes records back-to-back to any [Write].
pub struct WriteSink<W: Write> {
    writer: W,
}

impl<W: Write> WriteSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Sink for WriteSink<W> {
    fn write_record(&mut self, record: &[u8]) -> io::Result<()> {
        self.writer.write_all(record)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Collects each record as its own buffer.
impl Sink for Vec<Vec<u8>> {
    fn write_record(&mut self, record: &[u8]) -> io::Result<()> {
        self.push(record.to_vec());
        Ok(())
    }
}
