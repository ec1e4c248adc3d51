use std::{io::Write, time::Duration};

use anyhow::{Context, Result};

pub const DEFAULT_BAUD_RATE: u32 = 9600;
const WRITE_TIMEOUT: Duration = Duration::from_millis(100);

/// Encodes finger states as `'0'`/`'1'` in thumb, index, middle, ring, pinky
/// order followed by a newline. `1` means bent.
pub fn encode_states(bent: &[bool; 5]) -> String {
    let mut line: String = bent.iter().map(|b| if *b { '1' } else { '0' }).collect();
    line.push('\n');
    line
}

/// Line-per-frame sink. Writes are fire-and-forget: there is no
/// acknowledgement or retry.
pub struct SerialSink<W: Write> {
    writer: W,
    lines_written: u64,
}

impl<W: Write> SerialSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            lines_written: 0,
        }
    }

    pub fn send(&mut self, bent: &[bool; 5]) -> std::io::Result<()> {
        let line = encode_states(bent);
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;
        self.lines_written += 1;
        Ok(())
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

pub fn open_serial_port(path: &str, baud_rate: u32) -> Result<Box<dyn serialport::SerialPort>> {
    let port = serialport::new(path, baud_rate)
        .timeout(WRITE_TIMEOUT)
        .open()
        .with_context(|| format!("failed to open serial port {path} at {baud_rate} baud"))?;
    log::info!("opened serial port {path} at {baud_rate} baud");
    Ok(port)
}
