use std::io;
use std::io::prelude::*;
use std::time::{Duration, Instant};

use log::{debug, info};
use serial::prelude::*;

use crate::channel::Transport;
use crate::error::Error;
use crate::parser::StreamParser;

/// Time spent listening on each candidate rate
const SCAN_TIME: Duration = Duration::from_millis(3000);

/// Valid frames required to accept a bitrate
const SCAN_FRAMES: usize = 2;

/// Serial port delivering the receiver output.
pub struct SerialTransport {
    device_name: String,
    serial_port: serial::SystemPort,
    max_packet_size: usize,
    baud_rate: usize,
    timeout: Duration,
}

impl SerialTransport {
    pub fn open(device_name: &str, bitrate: usize) -> Result<Self, Error> {
        info!("opening {} with {} bps", device_name, bitrate);

        let serial_port = serial::open(device_name).map_err(|_| Error::SerialPortNotFound)?;
        let mut obj = Self {
            device_name: String::from(device_name),
            serial_port,
            max_packet_size: 64,
            baud_rate: 0,
            timeout: Duration::default(),
        };
        obj.configure(bitrate)?;
        Ok(obj)
    }

    /// Opens the port at the first rate in `bitrates` that delivers frames.
    pub fn open_detect(device_name: &str, bitrates: &[usize]) -> Result<Self, Error> {
        let first = bitrates.first().copied().ok_or(Error::BaudRateDetectionFailed)?;
        let mut obj = Self::open(device_name, first)?;
        obj.detect_baudrate(bitrates)?;
        Ok(obj)
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn baud_rate(&self) -> usize {
        self.baud_rate
    }

    pub fn set_max_packet_size(&mut self, size: usize) {
        self.max_packet_size = size.max(1);
    }

    /// Tries the given rates in order. The port stays configured for the
    /// detected rate.
    pub fn detect_baudrate(&mut self, bitrates: &[usize]) -> Result<usize, Error> {
        for baud in bitrates.iter() {
            info!("checking {} bps", baud);
            self.configure(*baud)?;

            if self.scan()? {
                info!("detected {} bps", baud);
                return Ok(*baud);
            }
            info!("bitrate {} not working", baud);
        }

        Err(Error::BaudRateDetectionFailed)
    }

    fn configure(&mut self, bitrate: usize) -> Result<(), Error> {
        let settings = serial::PortSettings {
            baud_rate: serial::BaudRate::from_speed(bitrate),
            char_size: serial::Bits8,
            parity: serial::ParityNone,
            stop_bits: serial::Stop1,
            flow_control: serial::FlowNone,
        };

        self.serial_port
            .configure(&settings)
            .map_err(|_| Error::SerialPortConfigFailed)?;
        self.set_timeout(Duration::from_millis(100))?;
        self.baud_rate = bitrate;
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), Error> {
        if timeout != self.timeout {
            self.serial_port
                .set_timeout(timeout)
                .map_err(|_| Error::SerialPortConfigFailed)?;
            self.timeout = timeout;
        }
        Ok(())
    }

    /// Listens for valid frames of any protocol.
    fn scan(&mut self) -> Result<bool, Error> {
        let mut parser = StreamParser::new();
        let mut frames = 0;

        let start = Instant::now();
        while start.elapsed() < SCAN_TIME {
            let res = self.serial_port.read(parser.spare_mut());
            match res {
                Ok(bytes_read) => {
                    parser.commit(bytes_read);
                    parser.process(|_, metadata| {
                        debug!("{} frame, {} bytes", metadata.protocol, metadata.size);
                        frames += 1;
                    });
                }
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => (), // no data, just continue
                Err(e) => return Err(Error::from(e)),
            }

            if frames >= SCAN_FRAMES {
                return Ok(true);
            }
        }

        Ok(false)
    }
}

impl Transport for SerialTransport {
    fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.set_timeout(timeout)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        self.serial_port.read(buf)
    }
}
