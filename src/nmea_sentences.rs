/*
 * Typed NMEA-0183 sentences
 *
 * $GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47
 *   0      1       2     3     4     5 6  7  8    9  10  11 12 13 14
 *
 * Each parser takes the comma separated fields (field 0 is the address)
 * and either returns the complete record or the reason for rejecting the
 * whole sentence.
 */

use crate::nmea_fields::*;

pub const KNOTS_TO_MPS: f32 = 0.514444;
pub const KMPH_TO_MPS: f32 = 1000.0 / 3600.0;

pub type ParseResult<T> = Result<T, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentenceId {
    Gga,
    Rmc,
    Gll,
    Gst,
    Gsa,
    Vtg,
    Zda,
    Gsv,
    Pubx,
    Unknown,
}

impl SentenceId {
    /// Classifies the address field, e.g. "$GNRMC".
    pub fn from_address(address: &str) -> Self {
        match address {
            "$GPGGA" | "$GNGGA" | "$GLGGA" | "$GAGGA" => SentenceId::Gga,
            "$GPRMC" | "$GNRMC" | "$GLRMC" | "$GARMC" => SentenceId::Rmc,
            "$GPGLL" => SentenceId::Gll,
            "$GPGST" => SentenceId::Gst,
            "$GPGSA" => SentenceId::Gsa,
            "$GPVTG" => SentenceId::Vtg,
            "$GPZDA" => SentenceId::Zda,
            "$GPGSV" => SentenceId::Gsv,
            "$PUBX" => SentenceId::Pubx,
            _ => SentenceId::Unknown,
        }
    }
}

/// Splits a sentence into its fields, stopping at the checksum or line end.
pub fn split(sentence: &str) -> Vec<&str> {
    let end = sentence.find(|c: char| c == '*' || c == '\r' || c == '\n').unwrap_or(sentence.len());
    sentence[..end].split(',').collect()
}

fn check_field_count(fields: &[&str], required: usize) -> ParseResult<()> {
    if fields.len() < required {
        return Err(format!("Invalid field count {}", fields.len()));
    }
    Ok(())
}

/// Global Positioning System Fix Data
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Gga {
    pub fix_time: Option<FixTime>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub fix_quality: u32, // 0 - invalid, 1 - GPS, 2 - DGPS, 6 - estimated
    pub satellites: Option<u32>, // 0..=99
    pub hdop: Option<f32>,
    pub altitude: Option<f64>,
    pub geoid_height: Option<f64>,
}

pub fn parse_gga(fields: &[&str]) -> ParseResult<Gga> {
    check_field_count(fields, 15)?;

    Ok(Gga {
        fix_time: parse_fix_time(fields[1]).map_err(|_| "Invalid fix time")?,
        latitude: parse_latitude(fields[2], fields[3])
            .map_err(|_| format!("Invalid latitude '{}:{}'", fields[2], fields[3]))?,
        longitude: parse_longitude(fields[4], fields[5])
            .map_err(|_| format!("Invalid longitude '{}:{}'", fields[4], fields[5]))?,
        fix_quality: parse_uint(fields[6])
            .map_err(|_| "Invalid fix quality")?
            .ok_or("Undefined fix quality")?,
        satellites: parse_uint_range(fields[7], 0, 99).map_err(|_| "Invalid number of satellites")?,
        hdop: parse_float(fields[8]).map_err(|_| "Invalid HDOP")?,
        altitude: parse_double(fields[9]).map_err(|_| "Invalid altitude")?,
        geoid_height: parse_double(fields[11]).map_err(|_| "Invalid geoid height")?,
    })
}

/// Recommended Minimum Specific GNSS Data
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rmc {
    pub fix_time: Option<FixTime>,
    pub status_active: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed: Option<f32>, // m/s
    pub course: Option<f32>,
    pub ddmmyy: Option<u32>,
}

pub fn parse_rmc(fields: &[&str]) -> ParseResult<Rmc> {
    check_field_count(fields, 12)?;

    Ok(Rmc {
        fix_time: parse_fix_time(fields[1]).map_err(|_| "Invalid fix time")?,
        status_active: parse_char(fields[2]) == Some('A'),
        latitude: parse_latitude(fields[3], fields[4])
            .map_err(|_| format!("Invalid latitude '{}:{}'", fields[3], fields[4]))?,
        longitude: parse_longitude(fields[5], fields[6])
            .map_err(|_| format!("Invalid longitude '{}:{}'", fields[5], fields[6]))?,
        speed: parse_float(fields[7])
            .map_err(|_| "Invalid speed")?
            .map(|knots| knots * KNOTS_TO_MPS),
        course: parse_float(fields[8]).map_err(|_| "Invalid course")?,
        ddmmyy: parse_uint_range(fields[9], 0, 311299).map_err(|_| format!("Invalid date '{}'", fields[9]))?,
    })
}

/// Geographic Position, Latitude/Longitude
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Gll {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub fix_time: Option<FixTime>,
}

pub fn parse_gll(fields: &[&str]) -> ParseResult<Gll> {
    check_field_count(fields, 5)?;

    // Time is missing in old NMEA versions. The status field that follows it
    // is not evaluated, a GLL position counts whenever it is present.
    let fix_time = match fields.get(5) {
        Some(field) => parse_fix_time(field).map_err(|_| "Invalid fix time")?,
        None => None,
    };

    Ok(Gll {
        latitude: parse_latitude(fields[1], fields[2])
            .map_err(|_| format!("Invalid latitude '{}:{}'", fields[1], fields[2]))?,
        longitude: parse_longitude(fields[3], fields[4])
            .map_err(|_| format!("Invalid longitude '{}:{}'", fields[3], fields[4]))?,
        fix_time,
    })
}

/// GNSS Pseudo Range Error Statistics
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Gst {
    pub fix_time: Option<FixTime>,
    pub range_rms: Option<f32>,
    pub std_major: Option<f32>,
    pub std_minor: Option<f32>,
    pub orient: Option<f32>,
    pub std_lat: Option<f32>, // meters
    pub std_lon: Option<f32>, // meters
    pub std_alt: Option<f32>, // meters
}

pub fn parse_gst(fields: &[&str]) -> ParseResult<Gst> {
    check_field_count(fields, 9)?;

    Ok(Gst {
        fix_time: parse_fix_time(fields[1]).map_err(|_| "Invalid fix time")?,
        range_rms: parse_float(fields[2]).map_err(|_| "Invalid RMS deviation")?,
        std_major: parse_float(fields[3]).map_err(|_| "Invalid semi-major deviation")?,
        std_minor: parse_float(fields[4]).map_err(|_| "Invalid semi-minor deviation")?,
        orient: parse_float(fields[5]).map_err(|_| "Invalid semi-major orientation")?,
        std_lat: parse_float(fields[6]).map_err(|_| "Invalid latitude error")?,
        std_lon: parse_float(fields[7]).map_err(|_| "Invalid longitude error")?,
        std_alt: parse_float(fields[8]).map_err(|_| "Invalid altitude error")?,
    })
}

/// GNSS DOP and Active Satellites
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Gsa {
    pub fix_mode: Option<char>, // 'M' - manual, 'A' - automatic
    pub fix_type: Option<u32>,  // 1 - no fix, 2 - 2D, 3 - 3D
    pub prn: [u32; 12],         // 0 - unused slot
    pub pdop: Option<f32>,
    pub hdop: Option<f32>,
    pub vdop: Option<f32>,
}

impl Gsa {
    pub fn satellites_used(&self) -> i32 {
        self.prn.iter().filter(|prn| **prn > 0).count() as i32
    }
}

pub fn parse_gsa(fields: &[&str]) -> ParseResult<Gsa> {
    check_field_count(fields, 18)?;

    let mut prn = [0; 12];
    for (slot, field) in prn.iter_mut().zip(&fields[3..15]) {
        *slot = parse_uint(field).map_err(|_| format!("Invalid PRN '{}'", field))?.unwrap_or(0);
    }

    Ok(Gsa {
        fix_mode: parse_char(fields[1]),
        fix_type: parse_uint(fields[2]).map_err(|_| "Invalid fix type")?,
        prn,
        pdop: parse_float(fields[15]).map_err(|_| "Invalid PDOP")?,
        hdop: parse_float(fields[16]).map_err(|_| "Invalid HDOP")?,
        vdop: parse_float(fields[17]).map_err(|_| "Invalid VDOP")?,
    })
}

/// Course Over Ground and Ground Speed
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Vtg {
    pub course_true: Option<f32>,
    pub course_magn: Option<f32>,
    pub speed_knots: Option<f32>,
    pub speed_kmph: Option<f32>,
    pub fix_mode: Option<char>, // 'A' - autonomous, 'D' - differential, 'E' - estimated, 'N' - not valid
}

impl Vtg {
    pub fn is_valid(&self) -> bool {
        self.fix_mode != Some('N')
    }
}

pub fn parse_vtg(fields: &[&str]) -> ParseResult<Vtg> {
    check_field_count(fields, 9)?;

    Ok(Vtg {
        course_true: parse_float(fields[1]).map_err(|_| "Invalid true course")?,
        course_magn: parse_float(fields[3]).map_err(|_| "Invalid magnetic course")?,
        speed_knots: parse_float(fields[5]).map_err(|_| "Invalid ground speed (knots)")?,
        speed_kmph: parse_float(fields[7]).map_err(|_| "Invalid ground speed (kmph)")?,
        fix_mode: fields.get(9).and_then(|f| parse_char(f)),
    })
}

/// Time and Date
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Zda {
    pub fix_time: Option<FixTime>,
    pub day: Option<u32>,
    pub month: Option<u32>,
    pub year: Option<u32>,
    pub zone_hours: i32,
    pub zone_minutes: u32,
}

impl Zda {
    pub fn is_utc(&self) -> bool {
        self.zone_hours == 0 && self.zone_minutes == 0
    }
}

pub fn parse_zda(fields: &[&str]) -> ParseResult<Zda> {
    check_field_count(fields, 5)?;

    let zone_hours = match fields.get(5) {
        Some(field) => match parse_int(field) {
            Ok(Some(h)) if (-13..=13).contains(&h) => h,
            Ok(None) => 0,
            _ => return Err(String::from("Invalid local zone hours")),
        },
        None => 0,
    };

    let zone_minutes = match fields.get(6) {
        Some(field) => parse_uint_range(field, 0, 59)
            .map_err(|_| "Invalid local zone minutes")?
            .unwrap_or(0),
        None => 0,
    };

    Ok(Zda {
        fix_time: parse_fix_time(fields[1]).map_err(|_| "Invalid fix time")?,
        day: parse_uint_range(fields[2], 1, 31).map_err(|_| "Invalid day")?,
        month: parse_uint_range(fields[3], 1, 12).map_err(|_| "Invalid month")?,
        year: parse_uint_range(fields[4], 1990, 2089).map_err(|_| "Invalid year")?,
        zone_hours,
        zone_minutes,
    })
}
