/*
 * NMEA fix assembler
 *
 * A receiver reports one navigation epoch as a burst of sentences
 * (GGA, RMC, GSA, GST, ..) that all carry the same time of fix. The
 * sentences are collected in an open fix window until a sentence with
 * a different time arrives or the stream goes idle. Closing the window
 * merges the collected records into one Location.
 *
 * GSA and VTG carry no time and are kept as latest values outside of
 * the window. They only serve as fallback during composition.
 */

use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use log::{debug, warn};

use crate::location::{GpsMessageStatus, Location};
use crate::nmea_sentences::*;
use crate::stats::Counters;

pub use crate::nmea_fields::FixTime;

/// Longest diagnostic text passed on to the host
const ERR_MAX: usize = 200;

/// Sentences collected for one time of fix.
#[derive(Debug, Default)]
struct NmeaFix {
    fix_time: FixTime,
    is_closed: bool,

    gga: Option<Gga>,
    rmc: Option<Rmc>,
    gll: Option<Gll>,
    gst: Option<Gst>,
    zda: Option<Zda>,
}

impl NmeaFix {
    fn closed() -> Self {
        Self {
            is_closed: true,
            ..Default::default()
        }
    }

    fn open(&mut self, fix_time: FixTime) {
        *self = Self {
            fix_time,
            is_closed: false,
            ..Default::default()
        };
    }

    fn has_position_sentence(&self) -> bool {
        self.gga.is_some() || self.rmc.is_some() || self.gll.is_some()
    }
}

fn nmea_error(reason: &str, sentence: &str) -> String {
    let text = format!("{} NMEA: {}", reason, sentence.trim_end_matches(|c: char| c == '\r' || c == '\n'));
    text.chars().take(ERR_MAX).collect()
}

fn has_position(latitude: Option<f64>, longitude: Option<f64>) -> bool {
    latitude.is_some() && longitude.is_some()
}

pub struct NmeaParser {
    fix: NmeaFix,
    gsa: Option<Gsa>,
    vtg: Option<Vtg>,
    untimed_data: bool,

    /// Current UTC date, advanced by ZDA and RMC
    date: NaiveDate,
}

impl NmeaParser {
    pub fn new() -> Self {
        Self::with_date(Utc::now().date_naive())
    }

    /// Parser assuming `date` until the receiver reports one.
    pub fn with_date(date: NaiveDate) -> Self {
        Self {
            fix: NmeaFix::closed(),
            gsa: None,
            vtg: None,
            untimed_data: false,
            date,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Feeds one complete sentence, as framed by `parser_nmea::classify()`.
    pub fn put_msg(&mut self, msg: &[u8], counters: &mut Counters) -> GpsMessageStatus {
        counters.nmea.total += 1;
        counters.nmea.last_msg_ts = counters.last_byte_ts;

        let sentence = match std::str::from_utf8(msg) {
            Ok(s) => s,
            Err(_) => {
                let text = String::from_utf8_lossy(msg);
                return GpsMessageStatus::invalid(nmea_error("Invalid characters", &text));
            }
        };

        let fields = split(sentence);
        let id = SentenceId::from_address(fields[0]);

        let status = match id {
            SentenceId::Gga => match parse_gga(&fields) {
                Ok(gga) => self.put_fix_sentence(gga.fix_time, sentence, |fix| fix.gga = Some(gga)),
                Err(reason) => GpsMessageStatus::invalid(nmea_error(&reason, sentence)),
            },
            SentenceId::Rmc => match parse_rmc(&fields) {
                Ok(rmc) => self.put_fix_sentence(rmc.fix_time, sentence, |fix| fix.rmc = Some(rmc)),
                Err(reason) => GpsMessageStatus::invalid(nmea_error(&reason, sentence)),
            },
            SentenceId::Gll => match parse_gll(&fields) {
                Ok(gll) => self.put_fix_sentence(gll.fix_time, sentence, |fix| fix.gll = Some(gll)),
                Err(reason) => GpsMessageStatus::invalid(nmea_error(&reason, sentence)),
            },
            SentenceId::Gst => match parse_gst(&fields) {
                Ok(gst) => self.put_fix_sentence(gst.fix_time, sentence, |fix| fix.gst = Some(gst)),
                Err(reason) => GpsMessageStatus::invalid(nmea_error(&reason, sentence)),
            },
            SentenceId::Zda => match parse_zda(&fields) {
                Ok(zda) => self.put_fix_sentence(zda.fix_time, sentence, |fix| fix.zda = Some(zda)),
                Err(reason) => GpsMessageStatus::invalid(nmea_error(&reason, sentence)),
            },
            SentenceId::Gsa => match parse_gsa(&fields) {
                Ok(gsa) => {
                    self.gsa = Some(gsa);
                    self.untimed_data = true;
                    GpsMessageStatus::valid()
                }
                Err(reason) => GpsMessageStatus::invalid(nmea_error(&reason, sentence)),
            },
            SentenceId::Vtg => match parse_vtg(&fields) {
                Ok(vtg) => {
                    self.vtg = Some(vtg);
                    self.untimed_data = true;
                    GpsMessageStatus::valid()
                }
                Err(reason) => GpsMessageStatus::invalid(nmea_error(&reason, sentence)),
            },
            SentenceId::Gsv | SentenceId::Pubx => GpsMessageStatus::valid(),
            SentenceId::Unknown => GpsMessageStatus {
                is_valid: true,
                location: None,
                err: Some(nmea_error("unk msg", sentence)),
            },
        };

        if status.is_valid {
            let nmea = &mut counters.nmea;
            match id {
                SentenceId::Gga => nmea.gga += 1,
                SentenceId::Rmc => nmea.rmc += 1,
                SentenceId::Gll => nmea.gll += 1,
                SentenceId::Gst => nmea.gst += 1,
                SentenceId::Zda => nmea.zda += 1,
                SentenceId::Gsa => nmea.gsa += 1,
                SentenceId::Vtg => nmea.vtg += 1,
                SentenceId::Gsv => nmea.gsv += 1,
                SentenceId::Pubx => nmea.pubx += 1,
                SentenceId::Unknown => nmea.other += 1,
            }
        }

        status
    }

    /// Closes the open fix window, the receiver went quiet.
    pub fn put_timeout(&mut self) -> GpsMessageStatus {
        let mut status = GpsMessageStatus::default();

        if self.fix.is_closed {
            if self.untimed_data {
                self.untimed_data = false;
                status.location = Some(Location::invalid());
                status.err = Some(String::from("No GGA/GLL/RMC sentences received"));
            }
            return status;
        }

        let (location, err) = self.close_fix();
        status.location = location;
        status.err = err;
        status
    }

    fn put_fix_sentence<F>(&mut self, fix_time: Option<FixTime>, sentence: &str, store: F) -> GpsMessageStatus
    where
        F: FnOnce(&mut NmeaFix),
    {
        let mut status = GpsMessageStatus::valid();

        match fix_time {
            Some(t) => {
                if self.fix.is_closed || !self.fix.fix_time.is_same_instant(&t) {
                    let (location, err) = self.close_fix();
                    status.location = location;
                    status.err = err;
                    self.fix.open(t);
                }
            }
            None => {
                if self.fix.is_closed {
                    return GpsMessageStatus::invalid(nmea_error("Undefined fix time", sentence));
                }
            }
        }

        store(&mut self.fix);
        status
    }

    fn close_fix(&mut self) -> (Option<Location>, Option<String>) {
        if self.fix.is_closed {
            return (None, None);
        }
        self.fix.is_closed = true;
        self.untimed_data = false;

        if !self.fix.has_position_sentence() {
            let err = format!("No GGA/GLL/RMC sentences received on fix time {}", self.fix.fix_time);
            return (Some(Location::invalid()), Some(err));
        }

        self.merge_date();
        let location = self.compose_location();
        debug!("fix {}: {}", self.fix.fix_time, location);
        (Some(location), None)
    }

    fn merge_date(&mut self) {
        let fix = &self.fix;

        if let Some(zda) = fix.zda.as_ref().filter(|zda| zda.is_utc()) {
            if let (Some(year), Some(month), Some(day)) = (zda.year, zda.month, zda.day) {
                match NaiveDate::from_ymd_opt(year as i32, month, day) {
                    Some(date) => self.date = date,
                    None => warn!("ignoring invalid ZDA date {:04}-{:02}-{:02}", year, month, day),
                }
                return;
            }
        }

        if let Some(ddmmyy) = fix.rmc.as_ref().and_then(|rmc| rmc.ddmmyy).filter(|d| *d != 0) {
            let century = self.date.year() - self.date.year() % 100;
            let year = century + (ddmmyy % 100) as i32;
            let month = ddmmyy / 100 % 100;
            let day = ddmmyy / 10000;
            match NaiveDate::from_ymd_opt(year, month, day) {
                Some(date) => self.date = date,
                None => warn!("ignoring invalid RMC date {:06}", ddmmyy),
            }
        }
    }

    fn timestamp(&self) -> Option<i64> {
        let t = self.fix.fix_time;
        let midnight = Utc.from_utc_datetime(&self.date.and_hms_opt(0, 0, 0)?);
        let seconds = t.hours() * 3600 + t.minutes() * 60 + t.seconds();
        Some(midnight.timestamp_millis() + 1000 * seconds as i64 + t.ms as i64)
    }

    fn compose_location(&self) -> Location {
        let fix = &self.fix;

        let gga = fix
            .gga
            .as_ref()
            .filter(|gga| gga.fix_quality != 0 && has_position(gga.latitude, gga.longitude));
        let rmc = fix
            .rmc
            .as_ref()
            .filter(|rmc| rmc.status_active && has_position(rmc.latitude, rmc.longitude));
        let gll = fix.gll.as_ref().filter(|gll| has_position(gll.latitude, gll.longitude));

        let position = gga
            .map(|gga| (gga.latitude, gga.longitude))
            .or_else(|| rmc.map(|rmc| (rmc.latitude, rmc.longitude)))
            .or_else(|| gll.map(|gll| (gll.latitude, gll.longitude)));

        let (latitude, longitude) = match position {
            Some((Some(latitude), Some(longitude))) => (latitude, longitude),
            _ => return Location::invalid(),
        };

        let time = match self.timestamp() {
            Some(time) => time,
            None => return Location::invalid(),
        };

        let vtg = self.vtg.as_ref().filter(|vtg| vtg.is_valid());

        Location {
            time,
            latitude,
            longitude,
            altitude: gga.and_then(|gga| gga.altitude),
            speed: fix
                .rmc
                .as_ref()
                .and_then(|rmc| rmc.speed)
                .or_else(|| vtg.and_then(|vtg| vtg.speed_kmph).map(|kmph| kmph * KMPH_TO_MPS)),
            bearing: fix
                .rmc
                .as_ref()
                .and_then(|rmc| rmc.course)
                .or_else(|| vtg.and_then(|vtg| vtg.course_true)),
            accuracy: fix.gst.as_ref().and_then(|gst| match (gst.std_lat, gst.std_lon) {
                (Some(std_lat), Some(std_lon)) => Some(std_lat.hypot(std_lon)),
                _ => gst.range_rms,
            }),
            satellites: gga
                .and_then(|gga| gga.satellites)
                .map(|n| n as i32)
                .or_else(|| self.gsa.as_ref().map(|gsa| gsa.satellites_used()))
                .unwrap_or(-1),
            is_valid: true,
        }
    }
}

impl Default for NmeaParser {
    fn default() -> Self {
        Self::new()
    }
}
