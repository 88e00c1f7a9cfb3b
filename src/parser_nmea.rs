/*
 * Detector for NMEA-0183 sentences in an arbitrary byte window
 *
 * $GNRMC,155215.00,A,4719.13883,N,00758.44996,E,0.259,,171020,2.47,E,A*3E\r\n
 *
 * The checksum section is optional, but when present it must be exactly
 * '*XX' right before the CR/LF terminator.
 */

use log::trace;

use crate::checksum::NmeaChecksum;
use crate::frame::{FrameResult, NMEA_MAX};

const SYNC: u8 = b'$';
const CHECKSUM_MARK: u8 = b'*';
const CR: u8 = 0x0D;
const LF: u8 = 0x0A;

pub fn classify(msg: &[u8]) -> FrameResult {
    if msg.first() != Some(&SYNC) {
        return FrameResult::NotThisProtocol;
    }

    let mut csum_pos = None;
    let mut crlf_pos = None;

    for (i, &byte) in msg.iter().enumerate().skip(1) {
        if i > NMEA_MAX {
            return FrameResult::NotThisProtocol;
        }

        match byte {
            CHECKSUM_MARK => csum_pos = Some(i),
            CR => match msg.get(i + 1) {
                None => return FrameResult::Truncated,
                Some(&LF) => {
                    crlf_pos = Some(i);
                    break;
                }
                Some(_) => return FrameResult::NotThisProtocol,
            },
            _ if !is_print(byte) => return FrameResult::NotThisProtocol,
            _ => (),
        }
    }

    let crlf_pos = match crlf_pos {
        Some(pos) => pos,
        None => return FrameResult::Truncated,
    };

    if let Some(csum_pos) = csum_pos {
        if csum_pos + 3 != crlf_pos {
            return FrameResult::NotThisProtocol;
        }

        let msg_csum = match (to_bin(msg[csum_pos + 1]), to_bin(msg[csum_pos + 2])) {
            (Some(hi), Some(lo)) => hi << 4 | lo,
            _ => return FrameResult::NotThisProtocol,
        };

        let mut checksum = NmeaChecksum::new();
        checksum.add_all(&msg[1..csum_pos]);
        if !checksum.matches(msg_csum) {
            trace!("NMEA checksum mismatch. 0x{:02x} != 0x{:02x}", msg_csum, checksum.value());
            return FrameResult::NotThisProtocol;
        }
    }

    FrameResult::Valid(crlf_pos + 2)
}

fn is_print(byte: u8) -> bool {
    (0x20..=0x7E).contains(&byte)
}

fn to_bin(data: u8) -> Option<u8> {
    match data {
        b'0'..=b'9' => Some(data - b'0'),
        b'a'..=b'f' => Some(data - b'a' + 10),
        b'A'..=b'F' => Some(data - b'A' + 10),
        _ => None,
    }
}
