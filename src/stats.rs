/*
 * Receive statistics
 *
 * Written by the consumer thread while frames are decoded, read by any
 * reporting thread through snapshot(). All counters live behind a single
 * mutex so a snapshot never mixes values of two different updates.
 */

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NmeaCounters {
    pub last_msg_ts: Option<DateTime<Utc>>,
    pub total: u64,
    pub gga: u64,
    pub rmc: u64,
    pub gll: u64,
    pub gst: u64,
    pub gsa: u64,
    pub vtg: u64,
    pub zda: u64,
    pub gsv: u64,
    pub pubx: u64,
    pub other: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SirfCounters {
    pub last_msg_ts: Option<DateTime<Utc>>,
    pub total: u64,
    pub mid41: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UbxCounters {
    pub last_msg_ts: Option<DateTime<Utc>>,
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Counters {
    pub start_ts: Option<DateTime<Utc>>,
    pub last_byte_ts: Option<DateTime<Utc>>,
    pub bytes: u64,
    pub junk: u64,
    pub nmea: NmeaCounters,
    pub sirf: SirfCounters,
    pub ublox: UbxCounters,
}

impl Counters {
    /// Accounts for a chunk of bytes fresh from the channel.
    pub fn received(&mut self, count: usize, ts: DateTime<Utc>) {
        self.bytes += count as u64;
        self.last_byte_ts = Some(ts);
    }
}

#[derive(Debug, Default)]
pub struct Stats {
    counters: Mutex<Counters>,
}

impl Stats {
    pub fn new() -> Self {
        Default::default()
    }

    /// Resets all counters and stamps the session start.
    pub fn start(&self) {
        let mut counters = self.lock();
        *counters = Counters {
            start_ts: Some(Utc::now()),
            ..Default::default()
        };
    }

    pub fn reset(&self) {
        *self.lock() = Counters::default();
    }

    pub fn snapshot(&self) -> Counters {
        self.lock().clone()
    }

    pub fn lock(&self) -> MutexGuard<'_, Counters> {
        // plain counters, a poisoned lock still holds usable values
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
