/*
 * Detector for u-blox UBX frames in arbitrary byte streams
 *
 * B5 62 | cls | id | len (LE16) | payload | cka ckb
 *
 * Byte streams can also be NMEA or other frames. Unfortunately,
 * u-blox frame header also appears in NMEA frames (e.g. version
 * information). Such data will be detected by a checksum error.
 */

use log::{debug, trace};

use crate::checksum::Checksum;
use crate::frame::{FrameResult, BINARY_OVERHEAD, UBLOX_MAX, UBX_SYNC_1, UBX_SYNC_2};
use crate::location::GpsMessageStatus;
use crate::stats::Counters;

pub fn classify(msg: &[u8]) -> FrameResult {
    if msg.first() != Some(&UBX_SYNC_1) {
        return FrameResult::NotThisProtocol;
    }

    if msg.len() < BINARY_OVERHEAD {
        return FrameResult::Truncated;
    }

    if msg[1] != UBX_SYNC_2 {
        return FrameResult::NotThisProtocol;
    }

    let msg_len = u16::from_le_bytes([msg[4], msg[5]]) as usize;
    if msg_len > UBLOX_MAX {
        return FrameResult::NotThisProtocol;
    }

    if msg.len() < msg_len + BINARY_OVERHEAD {
        return FrameResult::Truncated;
    }

    let mut checksum = Checksum::new();
    checksum.add_all(&msg[2..6 + msg_len]);

    let (cka, ckb) = (msg[6 + msg_len], msg[7 + msg_len]);
    if !checksum.matches(cka, ckb) {
        debug!("checksum error in frame, computed {:?}, received ({}, {})", checksum.value(), cka, ckb);
        return FrameResult::NotThisProtocol;
    }

    FrameResult::Valid(msg_len + BINARY_OVERHEAD)
}

/// Class and id of a validated frame.
pub fn cid(msg: &[u8]) -> Option<(u8, u8)> {
    if msg.len() < BINARY_OVERHEAD {
        return None;
    }
    Some((msg[2], msg[3]))
}

/// Acknowledges validated frames. Payloads are not interpreted.
#[derive(Debug, Default)]
pub struct UbxParser {}

impl UbxParser {
    pub fn new() -> Self {
        Self {}
    }

    pub fn put_msg(&mut self, msg: &[u8], counters: &mut Counters) -> GpsMessageStatus {
        counters.ublox.total += 1;
        counters.ublox.last_msg_ts = counters.last_byte_ts;

        if let Some((cls, id)) = cid(msg) {
            trace!("UBX 0x{:02x}:0x{:02x}, {} bytes", cls, id, msg.len());
        }

        GpsMessageStatus::valid()
    }
}
