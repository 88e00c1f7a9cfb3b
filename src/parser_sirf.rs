/*
 * SiRF binary protocol
 *
 * A0 A2 | len (BE16) | payload (mid, data ..) | csum (BE16) | B0 B3
 *
 * Only MID 41 (Geodetic Navigation Data) is decoded, all other message
 * ids are acknowledged without looking at the payload.
 */

use bincode::Options;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use log::{debug, trace};
use serde::Deserialize;

use crate::checksum::SirfChecksum;
use crate::frame::{FrameResult, BINARY_OVERHEAD, SIRF_END_1, SIRF_END_2, SIRF_MAX, SIRF_SYNC_1, SIRF_SYNC_2};
use crate::location::{GpsMessageStatus, Location};
use crate::stats::Counters;

const MID_GEODETIC_NAV_DATA: u8 = 41;
const MID41_PAYLOAD_SIZE: usize = 91;

pub fn classify(msg: &[u8]) -> FrameResult {
    if msg.first() != Some(&SIRF_SYNC_1) {
        return FrameResult::NotThisProtocol;
    }

    if msg.len() < BINARY_OVERHEAD {
        return FrameResult::Truncated;
    }

    if msg[1] != SIRF_SYNC_2 {
        return FrameResult::NotThisProtocol;
    }

    let payload_length = u16::from_be_bytes([msg[2], msg[3]]) as usize;
    if payload_length > SIRF_MAX {
        return FrameResult::NotThisProtocol;
    }

    if msg.len() < payload_length + BINARY_OVERHEAD {
        return FrameResult::Truncated;
    }

    let trailer = 4 + payload_length;
    if msg[trailer + 2] != SIRF_END_1 || msg[trailer + 3] != SIRF_END_2 {
        return FrameResult::NotThisProtocol;
    }

    let msg_csum = u16::from_be_bytes([msg[trailer], msg[trailer + 1]]);
    let mut checksum = SirfChecksum::new();
    checksum.add_all(&msg[4..trailer]);
    if !checksum.matches(msg_csum) {
        debug!("SiRF checksum mismatch. 0x{:04x} != 0x{:04x}", msg_csum, checksum.value());
        return FrameResult::NotThisProtocol;
    }

    FrameResult::Valid(payload_length + BINARY_OVERHEAD)
}

/// MID 41 payload layout, all fields big-endian.
#[allow(dead_code)]
#[derive(Default, Debug, Deserialize)]
struct GeodeticNavData {
    mid: u8,
    nav_valid: u16,
    nav_type: u16, // bits 0..2 nonzero: fix not valid
    extended_week: u16,
    tow: u32, // 1e-3 s
    utc_year: u16,
    utc_month: u8,
    utc_day: u8,
    utc_hour: u8,
    utc_minute: u8,
    utc_second: u16, // ms of minute
    sat_id_list: u32,
    latitude: i32,  // 1e-7 deg
    longitude: i32, // 1e-7 deg
    altitude_ellipsoid: i32,
    altitude_msl: i32, // 1e-2 m
    map_datum: i8,
    speed_over_ground: u16,  // 1e-2 m/s
    course_over_ground: u16, // 1e-2 deg
    magnetic_variation: i16,
    climb_rate: i16,
    heading_rate: i16,
    ehpe: u32, // 1e-2 m, estimated horizontal position error
    evpe: u32,
    ete: u32,
    ehve: u16,
    clock_bias: i32,
    clock_bias_error: u32,
    clock_drift: i32,
    clock_drift_error: u32,
    distance: u32,
    distance_error: u16,
    heading_error: u16,
    num_svs: u8,
    hdop: u8, // 0.2 units
    additional_mode: u8,
}

impl GeodeticNavData {
    fn load(payload: &[u8]) -> Result<Self, bincode::Error> {
        bincode::DefaultOptions::new()
            .with_big_endian()
            .with_fixint_encoding()
            .deserialize(payload)
    }

    fn utc_time(&self) -> Option<i64> {
        let date = NaiveDate::from_ymd_opt(self.utc_year as i32, self.utc_month as u32, self.utc_day as u32)?;
        let ts = date.and_hms_opt(0, 0, 0)?
            + Duration::hours(self.utc_hour as i64)
            + Duration::minutes(self.utc_minute as i64)
            + Duration::milliseconds(self.utc_second as i64);
        Some(Utc.from_utc_datetime(&ts).timestamp_millis())
    }

    fn to_location(&self, time: i64) -> Location {
        Location {
            time,
            latitude: 1.0e-7 * self.latitude as f64,
            longitude: 1.0e-7 * self.longitude as f64,
            altitude: Some(1.0e-2 * self.altitude_msl as f64),
            speed: Some(1.0e-2 * self.speed_over_ground as f32),
            bearing: Some(1.0e-2 * self.course_over_ground as f32),
            accuracy: Some(1.0e-2 * self.ehpe as f32),
            satellites: self.num_svs as i32,
            is_valid: self.nav_type & 0x07 == 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct SirfParser {}

impl SirfParser {
    pub fn new() -> Self {
        Self {}
    }

    pub fn reset(&mut self) {}

    /// Decodes a complete frame as returned by `classify()`.
    pub fn put_msg(&mut self, msg: &[u8], counters: &mut Counters) -> GpsMessageStatus {
        counters.sirf.total += 1;
        counters.sirf.last_msg_ts = counters.last_byte_ts;

        if msg.len() <= BINARY_OVERHEAD {
            return GpsMessageStatus::invalid(format!("Empty SiRF message, {} bytes", msg.len()));
        }

        let payload = &msg[4..msg.len() - 4];
        let mid = payload[0];
        trace!("SiRF MID{}, {} bytes", mid, payload.len());

        match mid {
            MID_GEODETIC_NAV_DATA => {
                counters.sirf.mid41 += 1;
                Self::parse_geodetic_nav_data(payload)
            }
            _ => GpsMessageStatus::valid(),
        }
    }

    fn parse_geodetic_nav_data(payload: &[u8]) -> GpsMessageStatus {
        if payload.len() != MID41_PAYLOAD_SIZE {
            return GpsMessageStatus::invalid(format!("Wrong SiRF MID41 payload size {}", payload.len()));
        }

        let data = match GeodeticNavData::load(payload) {
            Ok(data) => data,
            Err(e) => return GpsMessageStatus::invalid(format!("SiRF MID41 decode error: {}", e)),
        };

        let time = match data.utc_time() {
            Some(time) => time,
            None => {
                return GpsMessageStatus::invalid(format!(
                    "Invalid SiRF MID41 date {:04}-{:02}-{:02} {:02}:{:02}",
                    data.utc_year, data.utc_month, data.utc_day, data.utc_hour, data.utc_minute
                ))
            }
        };

        GpsMessageStatus {
            is_valid: true,
            location: Some(data.to_location(time)),
            err: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::SirfFrame;

    /* MID 41, 2020-10-17 15:52:15.500, 47.3189806 N 7.9741660 E */
    fn mid41_payload(nav_type: u16) -> Vec<u8> {
        let mut p = vec![0u8; MID41_PAYLOAD_SIZE];
        p[0] = 41;
        p[3..5].copy_from_slice(&nav_type.to_be_bytes());
        p[11..13].copy_from_slice(&2020u16.to_be_bytes());
        p[13] = 10;
        p[14] = 17;
        p[15] = 15;
        p[16] = 52;
        p[17..19].copy_from_slice(&15500u16.to_be_bytes());
        p[23..27].copy_from_slice(&473189806i32.to_be_bytes());
        p[27..31].copy_from_slice(&79741660i32.to_be_bytes());
        p[35..39].copy_from_slice(&(-1250i32).to_be_bytes());
        p[40..42].copy_from_slice(&1234u16.to_be_bytes());
        p[42..44].copy_from_slice(&27050u16.to_be_bytes());
        p[50..54].copy_from_slice(&350u32.to_be_bytes());
        p[88] = 9;
        p
    }

    #[test]
    fn ok() {
        let msg = SirfFrame::construct(mid41_payload(0)).to_bytes();
        assert_eq!(classify(&msg), FrameResult::Valid(MID41_PAYLOAD_SIZE + 8));
    }

    #[test]
    fn checksum_round_trip() {
        for len in [0usize, 1, 2, 91, 500, SIRF_MAX].iter() {
            let payload: Vec<u8> = (0..*len).map(|i| (i * 7 + 3) as u8).collect();
            let msg = SirfFrame::construct(payload).to_bytes();
            assert_eq!(classify(&msg), FrameResult::Valid(len + 8), "length {}", len);
        }
    }

    #[test]
    fn too_long() {
        let msg = [0xA0, 0xA2, 0x04, 0x00, 0, 0, 0, 0];
        assert_eq!(classify(&msg), FrameResult::NotThisProtocol);
    }

    #[test]
    fn truncated_prefixes() {
        let msg = SirfFrame::construct(mid41_payload(0)).to_bytes();
        for len in 1..msg.len() {
            assert_eq!(classify(&msg[..len]), FrameResult::Truncated, "prefix {}", len);
        }
    }

    #[test]
    fn wrong_sync() {
        assert_eq!(classify(&[0xA1]), FrameResult::NotThisProtocol);
        assert_eq!(classify(&[0xA0, 0xA3, 0, 0, 0, 0, 0xB0, 0xB3]), FrameResult::NotThisProtocol);
    }

    #[test]
    fn wrong_trailer() {
        let mut msg = SirfFrame::construct([0x02, 0x00, 0x01].to_vec()).to_bytes();
        let last = msg.len() - 1;
        msg[last] = 0xB4;
        assert_eq!(classify(&msg), FrameResult::NotThisProtocol);
    }

    #[test]
    fn single_byte_corruption() {
        let msg = SirfFrame::construct([0x02, 0x10, 0x01, 0x7F, 0x80].to_vec()).to_bytes();
        // payload and checksum bytes
        for i in 4..msg.len() - 2 {
            let mut corrupt = msg.clone();
            corrupt[i] ^= 0x01;
            assert_eq!(classify(&corrupt), FrameResult::NotThisProtocol, "byte {}", i);
        }
    }

    #[test]
    fn decode_mid41() {
        let mut counters = Counters::default();
        let mut uut = SirfParser::new();
        let msg = SirfFrame::construct(mid41_payload(0)).to_bytes();

        let res = uut.put_msg(&msg, &mut counters);
        assert!(res.is_valid);
        assert_eq!(res.err, None);
        let l = res.location.unwrap();
        assert!(l.is_valid);
        assert_eq!(l.time, 1602949935500);
        assert!((l.latitude - 47.3189806).abs() < 1e-9);
        assert!((l.longitude - 7.9741660).abs() < 1e-9);
        assert!((l.altitude.unwrap() + 12.5).abs() < 1e-9);
        assert!((l.speed.unwrap() - 12.34).abs() < 1e-4);
        assert!((l.bearing.unwrap() - 270.5).abs() < 1e-3);
        assert!((l.accuracy.unwrap() - 3.5).abs() < 1e-4);
        assert_eq!(l.satellites, 9);

        assert_eq!(counters.sirf.total, 1);
        assert_eq!(counters.sirf.mid41, 1);
    }

    #[test]
    fn decode_mid41_no_fix() {
        let mut counters = Counters::default();
        let mut uut = SirfParser::new();
        let msg = SirfFrame::construct(mid41_payload(0x0002)).to_bytes();

        let res = uut.put_msg(&msg, &mut counters);
        assert!(res.is_valid);
        assert!(res.location_changed());
        assert!(!res.location.unwrap().is_valid);
    }

    #[test]
    fn decode_mid41_wrong_size() {
        let mut counters = Counters::default();
        let mut uut = SirfParser::new();
        let mut payload = mid41_payload(0);
        payload.push(0);
        let msg = SirfFrame::construct(payload).to_bytes();

        let res = uut.put_msg(&msg, &mut counters);
        assert!(!res.is_valid);
        assert!(!res.location_changed());
        assert_eq!(res.err.as_deref(), Some("Wrong SiRF MID41 payload size 92"));
        assert_eq!(counters.sirf.mid41, 1);
    }

    #[test]
    fn decode_mid41_bad_date() {
        let mut counters = Counters::default();
        let mut uut = SirfParser::new();
        let mut payload = mid41_payload(0);
        payload[13] = 13;
        let msg = SirfFrame::construct(payload).to_bytes();

        let res = uut.put_msg(&msg, &mut counters);
        assert!(!res.is_valid);
        assert!(!res.location_changed());
    }

    #[test]
    fn other_mid_acknowledged() {
        let mut counters = Counters::default();
        let mut uut = SirfParser::new();
        let msg = SirfFrame::construct([0x02, 0x00, 0x01].to_vec()).to_bytes();

        let res = uut.put_msg(&msg, &mut counters);
        assert_eq!(res, GpsMessageStatus::valid());
        assert_eq!(counters.sirf.total, 1);
        assert_eq!(counters.sirf.mid41, 0);
    }
}
