/*
 * Decoders for single NMEA-0183 fields
 *
 * All decoders return Ok(None) for an empty field and Err(InvalidField)
 * for content that does not parse or is out of range.
 */

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidField;

pub type FieldResult<T> = Result<Option<T>, InvalidField>;

/// UTC time of a fix as transmitted, hhmmss plus milliseconds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FixTime {
    pub hhmmss: u32,
    pub ms: u16,
}

impl FixTime {
    pub fn new(hhmmss: u32, ms: u16) -> Self {
        Self { hhmmss, ms }
    }

    /// Receivers spread the sentences of one epoch over a few milliseconds.
    pub fn is_same_instant(&self, other: &FixTime) -> bool {
        self.hhmmss == other.hhmmss && (self.ms as i32 - other.ms as i32).abs() < 50
    }

    pub fn hours(&self) -> u32 {
        self.hhmmss / 10000
    }

    pub fn minutes(&self) -> u32 {
        self.hhmmss / 100 % 100
    }

    pub fn seconds(&self) -> u32 {
        self.hhmmss % 100
    }
}

impl fmt::Display for FixTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}.{:03}", self.hhmmss, self.ms)
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// hhmmss[.sss], fractional digits beyond milliseconds are ignored.
pub fn parse_fix_time(field: &str) -> FieldResult<FixTime> {
    if field.is_empty() {
        return Ok(None);
    }

    let (int, frac) = match field.find('.') {
        Some(pos) => (&field[..pos], &field[pos + 1..]),
        None => (field, ""),
    };

    if !is_digits(int) {
        return Err(InvalidField);
    }
    let hhmmss: u32 = int.parse().map_err(|_| InvalidField)?;

    if hhmmss > 240000 || hhmmss % 10000 > 6000 || hhmmss % 100 > 60 {
        return Err(InvalidField);
    }

    let mut ms = 0;
    let mut scale = 100;
    for c in frac.bytes().take(3) {
        if !c.is_ascii_digit() {
            return Err(InvalidField);
        }
        ms += (c - b'0') as u16 * scale;
        scale /= 10;
    }

    Ok(Some(FixTime { hhmmss, ms }))
}

/// ddmm.mmmm / dddmm.mmmm to signed degrees.
fn parse_degrees(field: &str, reverse: bool) -> FieldResult<f64> {
    let value = match parse_double(field)? {
        Some(v) => v,
        None => return Ok(None),
    };

    let degrees = (value / 100.0).trunc();
    let minutes = 100.0 * (value / 100.0).fract();
    let sign = if reverse { -1.0 } else { 1.0 };

    Ok(Some(sign * (degrees + minutes / 60.0)))
}

pub fn parse_latitude(field: &str, hemisphere: &str) -> FieldResult<f64> {
    match parse_degrees(field, hemisphere.starts_with('S'))? {
        Some(lat) if !(-90.0..=90.0).contains(&lat) => Err(InvalidField),
        lat => Ok(lat),
    }
}

pub fn parse_longitude(field: &str, hemisphere: &str) -> FieldResult<f64> {
    match parse_degrees(field, hemisphere.starts_with('W'))? {
        Some(lon) if !(-180.0..=180.0).contains(&lon) => Err(InvalidField),
        lon => Ok(lon),
    }
}

pub fn parse_float(field: &str) -> FieldResult<f32> {
    if field.is_empty() {
        return Ok(None);
    }
    match field.parse::<f32>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(InvalidField),
    }
}

pub fn parse_double(field: &str) -> FieldResult<f64> {
    if field.is_empty() {
        return Ok(None);
    }
    match field.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(InvalidField),
    }
}

pub fn parse_uint(field: &str) -> FieldResult<u32> {
    if field.is_empty() {
        return Ok(None);
    }
    if !is_digits(field) {
        return Err(InvalidField);
    }
    field.parse().map(Some).map_err(|_| InvalidField)
}

pub fn parse_int(field: &str) -> FieldResult<i32> {
    let digits = field.strip_prefix('-').or_else(|| field.strip_prefix('+')).unwrap_or(field);
    if field.is_empty() {
        return Ok(None);
    }
    if !is_digits(digits) {
        return Err(InvalidField);
    }
    field.parse().map(Some).map_err(|_| InvalidField)
}

/// Unsigned value limited to `min..=max`.
pub fn parse_uint_range(field: &str, min: u32, max: u32) -> FieldResult<u32> {
    match parse_uint(field)? {
        Some(v) if v < min || v > max => Err(InvalidField),
        v => Ok(v),
    }
}

/// First character of a single character field, e.g. status or mode.
pub fn parse_char(field: &str) -> Option<char> {
    field.chars().next()
}
