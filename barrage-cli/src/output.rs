//! Result output as JSON lines

use attack_engine::HitResult;
use std::fs::File;
use std::io::{self, BufWriter, Write};

/// Writes one JSON object per result, newline separated.
#[derive(Debug)]
pub struct JsonLinesEncoder<W: Write> {
    writer: W,
    written: u64,
}

impl<W: Write> JsonLinesEncoder<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn encode(&mut self, result: &HitResult) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, result)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Buffered writer for `stdout` or a file path, truncating existing files.
pub fn open_output(output: &str) -> io::Result<Box<dyn Write + Send>> {
    if output == "stdout" {
        return Ok(Box::new(BufWriter::new(io::stdout())));
    }
    let file = File::create(output)?;
    Ok(Box::new(BufWriter::new(file)))
}
