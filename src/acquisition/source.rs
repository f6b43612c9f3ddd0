//! Byte sources that deliver terminated sensor frames to the acquisition worker.
//!
//! - [`LineReader`] wraps any `BufRead` (a serial port, a file, an in-memory cursor)
//!   and splits it on the `\r\n` terminator.
//! - [`SimulatedSensor`] synthesizes frames so the pipeline can run without hardware.
//! - [`open_serial`] / [`available_ports`] / [`select_port`] deal with the real device.

use super::frame::FRAME_TERMINATOR;
use crate::error::{AppResult, PullMachineError};
use std::io::{self, BufRead, Read};
use std::time::{Duration, Instant};

/// Frames longer than this are handed to the parser as-is (and rejected there)
/// so a device that never sends `\r\n` cannot grow the buffer without bound,
/// whether or not reads time out in between.
pub const MAX_FRAME_LEN: usize = 1024;

/// A blocking source of raw frames.
///
/// `read_frame` blocks until one terminated frame is available and returns it
/// including the terminator. `Ok(None)` means the source is idle (end of input
/// for now); the worker backs off and asks again. Errors are treated as
/// transient by the worker.
pub trait FrameSource: Send {
    /// Read the next complete frame.
    fn read_frame(&mut self) -> io::Result<Option<Vec<u8>>>;

    /// Human readable identifier for logs.
    fn describe(&self) -> String;
}

/// Splits a buffered byte stream on the frame terminator.
///
/// Bytes received before a timeout are kept and completed by later reads.
pub struct LineReader<R> {
    inner: R,
    pending: Vec<u8>,
    name: String,
}

impl<R: BufRead> LineReader<R> {
    /// Wrap a buffered reader.
    pub fn new(inner: R, name: impl Into<String>) -> Self {
        Self {
            inner,
            pending: Vec::with_capacity(64),
            name: name.into(),
        }
    }

    /// Bytes received so far that do not yet form a complete frame.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }
}

impl<R: BufRead + Send> FrameSource for LineReader<R> {
    fn read_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
        loop {
            // Never read past the cap, even across timeouts. On error the bytes
            // read so far stay in `pending`, which is below the cap by then.
            let room = MAX_FRAME_LEN.saturating_sub(self.pending.len()).max(1) as u64;
            let n = (&mut self.inner)
                .take(room)
                .read_until(b'\n', &mut self.pending)?;
            if n == 0 {
                return Ok(None);
            }
            if self.pending.ends_with(FRAME_TERMINATOR) || self.pending.len() >= MAX_FRAME_LEN {
                return Ok(Some(std::mem::take(&mut self.pending)));
            }
            // A bare '\n' is part of the frame; keep reading until "\r\n".
        }
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// Synthetic sensor producing a slow sinusoidal pull at a fixed frame rate.
pub struct SimulatedSensor {
    started: Instant,
    interval: Duration,
    stroke_period_s: f64,
    frames: u64,
}

impl SimulatedSensor {
    /// Raw angle around which the simulated arm swings, in degrees.
    pub const CENTER_ANGLE_DEG: f64 = 20.0;
    /// Swing amplitude, in degrees.
    pub const AMPLITUDE_DEG: f64 = 40.0;
    /// Mean pressure, in bar.
    pub const BASE_PRESSURE_BAR: f64 = 5.0;

    /// Emit one frame every `interval`, completing a full stroke every
    /// `stroke_period`.
    pub fn new(interval: Duration, stroke_period: Duration) -> Self {
        Self {
            started: Instant::now(),
            interval,
            stroke_period_s: stroke_period.as_secs_f64().max(f64::EPSILON),
            frames: 0,
        }
    }

    /// Frame text for time `t` seconds after start.
    pub fn frame_at(&self, t: f64) -> String {
        let phase = std::f64::consts::TAU * t / self.stroke_period_s;
        let angle = Self::CENTER_ANGLE_DEG + Self::AMPLITUDE_DEG * phase.sin();
        let pressure = Self::BASE_PRESSURE_BAR + 2.0 * phase.cos().abs();
        format!("{angle:.2};{pressure:.2}\r\n")
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new(Duration::from_millis(10), Duration::from_secs(4))
    }
}

impl FrameSource for SimulatedSensor {
    fn read_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
        // Pace like a real device: frame n is due at n * interval.
        let due = self.interval * u32::try_from(self.frames).unwrap_or(u32::MAX);
        let elapsed = self.started.elapsed();
        if due > elapsed {
            std::thread::sleep(due - elapsed);
        }
        self.frames += 1;
        let t = self.started.elapsed().as_secs_f64();
        Ok(Some(self.frame_at(t).into_bytes()))
    }

    fn describe(&self) -> String {
        "simulated sensor".to_string()
    }
}

/// A serial port found on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// OS device name, e.g. `COM6` or `/dev/ttyACM0`.
    pub name: String,
    /// Free-form description (USB product and manufacturer when known).
    pub description: String,
}

/// Pick the first port whose description or name contains `hint`
/// (case-insensitive).
pub fn select_port<'a>(ports: &'a [PortInfo], hint: &str) -> Option<&'a PortInfo> {
    let hint = hint.to_lowercase();
    ports.iter().find(|p| {
        p.description.to_lowercase().contains(&hint) || p.name.to_lowercase().contains(&hint)
    })
}

/// Enumerate serial ports.
#[cfg(feature = "instrument_serial")]
pub fn available_ports() -> AppResult<Vec<PortInfo>> {
    use serialport::SerialPortType;

    let ports = serialport::available_ports().map_err(|e| PullMachineError::Connection {
        port: "<enumeration>".to_string(),
        reason: e.to_string(),
    })?;

    Ok(ports
        .into_iter()
        .map(|p| {
            let description = match &p.port_type {
                SerialPortType::UsbPort(info) => {
                    let product = info.product.clone().unwrap_or_default();
                    let manufacturer = info.manufacturer.clone().unwrap_or_default();
                    format!(
                        "USB {:04x}:{:04x} {} {}",
                        info.vid, info.pid, product, manufacturer
                    )
                    .trim()
                    .to_string()
                }
                SerialPortType::BluetoothPort => "Bluetooth".to_string(),
                SerialPortType::PciPort => "PCI".to_string(),
                SerialPortType::Unknown => String::new(),
            };
            PortInfo {
                name: p.port_name,
                description,
            }
        })
        .collect())
}

/// Enumerate serial ports.
#[cfg(not(feature = "instrument_serial"))]
pub fn available_ports() -> AppResult<Vec<PortInfo>> {
    Err(PullMachineError::FeatureNotEnabled(
        "instrument_serial".to_string(),
    ))
}

/// Find a port matching `hint`, e.g. `"Arduino"`.
pub fn discover_port(hint: &str) -> AppResult<String> {
    let ports = available_ports()?;
    tracing::debug!(count = ports.len(), hint, "Searching serial ports");
    select_port(&ports, hint)
        .map(|p| {
            tracing::info!(port = %p.name, description = %p.description, "Selected serial port");
            p.name.clone()
        })
        .ok_or_else(|| PullMachineError::Connection {
            port: format!("<auto:{hint}>"),
            reason: "no matching serial port found".to_string(),
        })
}

/// Open the sensor's serial port (8N1, no flow control) as a frame source.
///
/// Failure here is a [`PullMachineError::Connection`], fatal to the worker.
#[cfg(feature = "instrument_serial")]
pub fn open_serial(
    port: &str,
    baud_rate: u32,
    read_timeout: Duration,
) -> AppResult<LineReader<io::BufReader<Box<dyn serialport::SerialPort>>>> {
    let serial = serialport::new(port, baud_rate)
        .timeout(read_timeout)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .open()
        .map_err(|e| PullMachineError::Connection {
            port: port.to_string(),
            reason: e.to_string(),
        })?;

    tracing::info!(port, baud_rate, "Opened serial port");
    Ok(LineReader::new(
        io::BufReader::new(serial),
        format!("{port}@{baud_rate}"),
    ))
}

/// Open the sensor's serial port.
#[cfg(not(feature = "instrument_serial"))]
pub fn open_serial(
    _port: &str,
    _baud_rate: u32,
    _read_timeout: Duration,
) -> AppResult<LineReader<io::Empty>> {
    Err(PullMachineError::FeatureNotEnabled(
        "instrument_serial".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::frame::parse_frame;
    use std::io::Cursor;

    #[test]
    fn splits_on_crlf() {
        let mut reader = LineReader::new(Cursor::new(b"1;2\r\n3;4\r\n".to_vec()), "cursor");
        assert_eq!(reader.read_frame().unwrap(), Some(b"1;2\r\n".to_vec()));
        assert_eq!(reader.read_frame().unwrap(), Some(b"3;4\r\n".to_vec()));
        assert_eq!(reader.read_frame().unwrap(), None);
    }

    #[test]
    fn bare_newline_does_not_end_a_frame() {
        let mut reader = LineReader::new(Cursor::new(b"1;2\n3\r\n".to_vec()), "cursor");
        assert_eq!(reader.read_frame().unwrap(), Some(b"1;2\n3\r\n".to_vec()));
    }

    #[test]
    fn incomplete_tail_stays_pending() {
        let mut reader = LineReader::new(Cursor::new(b"1;2\r\n5;".to_vec()), "cursor");
        assert!(reader.read_frame().unwrap().is_some());
        assert_eq!(reader.read_frame().unwrap(), None);
        assert_eq!(reader.pending(), b"5;");
    }

    #[test]
    fn overlong_frames_are_cut() {
        let data = vec![b'x'; MAX_FRAME_LEN + 10];
        let mut reader = LineReader::new(Cursor::new(data), "cursor");
        // No newline at all: the length cap hands the first MAX_FRAME_LEN bytes over.
        let frame = reader.read_frame().unwrap().unwrap();
        assert_eq!(frame.len(), MAX_FRAME_LEN);
    }

    /// Streams newline-free chunks with a read timeout after each one.
    struct ChattyLink {
        chunk: Vec<u8>,
        pos: usize,
        timed_out: bool,
    }

    impl Read for ChattyLink {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let available = self.fill_buf()?;
            let n = available.len().min(buf.len());
            buf[..n].copy_from_slice(&available[..n]);
            self.consume(n);
            Ok(n)
        }
    }

    impl BufRead for ChattyLink {
        fn fill_buf(&mut self) -> io::Result<&[u8]> {
            if self.pos == self.chunk.len() {
                if !self.timed_out {
                    self.timed_out = true;
                    return Err(io::Error::from(io::ErrorKind::TimedOut));
                }
                self.timed_out = false;
                self.pos = 0;
            }
            Ok(&self.chunk[self.pos..])
        }

        fn consume(&mut self, amt: usize) {
            self.pos += amt;
        }
    }

    #[test]
    fn pending_stays_capped_across_timeouts() {
        let link = ChattyLink {
            chunk: vec![b'7'; 512],
            pos: 0,
            timed_out: false,
        };
        let mut reader = LineReader::new(link, "chatty");
        let mut handed_over = 0;
        for _ in 0..100 {
            match reader.read_frame() {
                Ok(Some(frame)) => {
                    assert!(frame.len() <= MAX_FRAME_LEN);
                    handed_over += 1;
                }
                Ok(None) => panic!("link never reaches EOF"),
                Err(e) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            }
            assert!(reader.pending().len() <= MAX_FRAME_LEN);
        }
        assert!(handed_over > 0);
    }

    #[test]
    fn simulated_frames_parse() {
        let sensor = SimulatedSensor::default();
        for t in [0.0, 0.5, 1.0, 3.9] {
            let frame = sensor.frame_at(t);
            assert!(frame.ends_with("\r\n"));
            let reading = parse_frame(frame.as_bytes()).unwrap();
            let lowest = SimulatedSensor::CENTER_ANGLE_DEG - SimulatedSensor::AMPLITUDE_DEG;
            assert!(reading.angle_deg >= lowest - 0.01);
            assert!(reading.pressure_bar >= SimulatedSensor::BASE_PRESSURE_BAR);
        }
    }

    #[test]
    fn simulated_sensor_always_yields_frames() {
        let mut sensor = SimulatedSensor::new(Duration::from_millis(1), Duration::from_secs(1));
        for _ in 0..3 {
            assert!(sensor.read_frame().unwrap().is_some());
        }
    }

    #[test]
    fn port_selection_matches_hint_case_insensitively() {
        let ports = vec![
            PortInfo {
                name: "COM1".into(),
                description: "Communications Port".into(),
            },
            PortInfo {
                name: "COM6".into(),
                description: "USB 2341:0043 Arduino Uno".into(),
            },
            PortInfo {
                name: "COM7".into(),
                description: "USB 2341:0043 Arduino Uno".into(),
            },
        ];
        assert_eq!(select_port(&ports, "arduino").map(|p| p.name.as_str()), Some("COM6"));
        assert_eq!(select_port(&ports, "esp32"), None);
    }
}
