use std::fmt;

/// Position fix reported to the host.
///
/// Optional quantities are `None` when the receiver did not provide them,
/// which is different from a reported value of zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Location {
    /// Unix epoch, milliseconds (UTC)
    pub time: i64,
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above mean sea level
    pub altitude: Option<f64>,
    /// Meters per second
    pub speed: Option<f32>,
    /// Degrees true
    pub bearing: Option<f32>,
    /// 1-sigma horizontal error, meters
    pub accuracy: Option<f32>,
    /// Satellites used for the fix, -1 if unknown
    pub satellites: i32,
    pub is_valid: bool,
}

impl Location {
    pub fn invalid() -> Self {
        Self {
            satellites: -1,
            ..Default::default()
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid {
            return f.write_str("no fix");
        }

        write!(f, "{} {:.7} {:.7}", self.time, self.latitude, self.longitude)?;
        if let Some(altitude) = self.altitude {
            write!(f, " alt {:.1}m", altitude)?;
        }
        if let Some(speed) = self.speed {
            write!(f, " spd {:.2}m/s", speed)?;
        }
        if let Some(bearing) = self.bearing {
            write!(f, " brg {:.1}", bearing)?;
        }
        if let Some(accuracy) = self.accuracy {
            write!(f, " acc {:.1}m", accuracy)?;
        }
        write!(f, " sats {}", self.satellites)
    }
}

/// Outcome of feeding one message (or a timeout) into a decoder.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GpsMessageStatus {
    pub is_valid: bool,
    /// Set when a fix was closed or decoded. The location may still be
    /// invalid, e.g. when the receiver reports no fix.
    pub location: Option<Location>,
    /// Diagnostic, may be present on valid messages as well
    pub err: Option<String>,
}

impl GpsMessageStatus {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            ..Default::default()
        }
    }

    pub fn invalid(err: String) -> Self {
        Self {
            is_valid: false,
            location: None,
            err: Some(err),
        }
    }

    pub fn location_changed(&self) -> bool {
        self.location.is_some()
    }
}
