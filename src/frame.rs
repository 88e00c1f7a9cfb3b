use std::fmt;

use crate::checksum::{Checksum, NmeaChecksum, SirfChecksum};

// $PUBX,00 ~ 120 bytes
pub const NMEA_MAX: usize = 512;
pub const SIRF_MAX: usize = 1023;
pub const UBLOX_MAX: usize = 4096;

pub const SIRF_SYNC_1: u8 = 0xA0;
pub const SIRF_SYNC_2: u8 = 0xA2;
pub const SIRF_END_1: u8 = 0xB0;
pub const SIRF_END_2: u8 = 0xB3;

pub const UBX_SYNC_1: u8 = 0xB5;
pub const UBX_SYNC_2: u8 = 0x62;

/// Header and trailer bytes around the payload of SiRF and UBX frames.
pub const BINARY_OVERHEAD: usize = 8;

/// Largest frame of any protocol, the assembly buffer must hold it.
pub const MAX_FRAME_SIZE: usize = UBLOX_MAX + BINARY_OVERHEAD;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Nmea,
    Sirf,
    Ublox,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Protocol::Nmea => "NMEA",
            Protocol::Sirf => "SiRF",
            Protocol::Ublox => "UBX",
        };
        f.write_str(name)
    }
}

/// Verdict of a protocol detector on a byte window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameResult {
    NotThisProtocol,
    /// Not enough bytes for a verdict, wait for more data.
    Truncated,
    /// Structurally and checksum valid message of the given length.
    Valid(usize),
}

/// Location and shape of a frame found by the multiplexer.
///
/// `size` is the frame length for complete frames. For truncated frames it is
/// the number of buffered tail bytes that belong to the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageMetadata {
    pub protocol: Protocol,
    pub size: usize,
    pub is_truncated: bool,
}

#[derive(Default, Clone, PartialEq, Eq)]
pub struct UbxFrame {
    pub cls: u8,
    pub id: u8,
    pub data: Vec<u8>,
}

impl UbxFrame {
    pub fn construct(cls: u8, id: u8, data: Vec<u8>) -> Self {
        Self { cls, id, data }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut checksum = Checksum::new();
        let mut msg = Vec::<u8>::with_capacity(self.data.len() + BINARY_OVERHEAD);

        msg.push(UBX_SYNC_1);
        msg.push(UBX_SYNC_2);

        let length = self.data.len() as u16;
        let header = [self.cls, self.id, length as u8, (length >> 8) as u8];
        msg.extend_from_slice(&header);
        checksum.add_all(&header);

        msg.extend_from_slice(&self.data);
        checksum.add_all(&self.data);

        let (cka, ckb) = checksum.value();
        msg.push(cka);
        msg.push(ckb);

        msg
    }
}

impl fmt::Debug for UbxFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UbxFrame")
            .field("cls", &format_args!("0x{:02x}", self.cls))
            .field("id", &format_args!("0x{:02x}", self.id))
            .field("len", &self.data.len())
            .finish()
    }
}

/// SiRF binary frame, `data` is the payload starting with the message id.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SirfFrame {
    pub data: Vec<u8>,
}

impl SirfFrame {
    pub fn construct(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut checksum = SirfChecksum::new();
        let mut msg = Vec::<u8>::with_capacity(self.data.len() + BINARY_OVERHEAD);

        let length = self.data.len() as u16;
        msg.push(SIRF_SYNC_1);
        msg.push(SIRF_SYNC_2);
        msg.extend_from_slice(&length.to_be_bytes());

        msg.extend_from_slice(&self.data);
        checksum.add_all(&self.data);

        msg.extend_from_slice(&checksum.value().to_be_bytes());
        msg.push(SIRF_END_1);
        msg.push(SIRF_END_2);

        msg
    }
}

/// Wraps a sentence body (without '$') into "$<body>*XX\r\n".
pub fn nmea_sentence(body: &str) -> Vec<u8> {
    let mut checksum = NmeaChecksum::new();
    checksum.add_all(body.as_bytes());
    format!("${}*{:02X}\r\n", body, checksum.value()).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_frame() {
        let dut = UbxFrame::default();
        let msg = dut.to_bytes();
        assert_eq!(msg, [0xb5, 0x62, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn ack_frame() {
        let dut = UbxFrame::construct(0x05, 0x01, [1, 2].to_vec());
        let msg = dut.to_bytes();
        assert_eq!(msg, [0xb5, 0x62, 0x05, 0x01, 0x02, 0x00, 1, 2, 11, 47]);
        assert_eq!(format!("{:?}", dut), "UbxFrame { cls: 0x05, id: 0x01, len: 2 }");
    }

    #[test]
    fn poll_mon_ver() {
        // Poll UBX-MON-VER: B5 62 0A 04 00 00 0E 34
        let dut = UbxFrame::construct(0x0A, 0x04, [].to_vec());
        let msg = dut.to_bytes();
        assert_eq!(msg, [0xb5, 0x62, 0x0a, 0x04, 0x00, 0x00, 0x0e, 0x34]);
    }

    #[test]
    fn sirf_frame() {
        let dut = SirfFrame::construct([0x02, 0x00, 0x01].to_vec());
        let msg = dut.to_bytes();
        assert_eq!(msg, [0xa0, 0xa2, 0x00, 0x03, 0x02, 0x00, 0x01, 0x00, 0x03, 0xb0, 0xb3]);
    }

    #[test]
    fn nmea_builder() {
        let msg = nmea_sentence("GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W");
        assert_eq!(
            msg,
            b"$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n".to_vec()
        );
    }

    #[test]
    fn protocol_names() {
        assert_eq!(Protocol::Nmea.to_string(), "NMEA");
        assert_eq!(Protocol::Sirf.to_string(), "SiRF");
        assert_eq!(Protocol::Ublox.to_string(), "UBX");
    }
}
