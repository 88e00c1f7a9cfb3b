/*
 * Consumer side of the byte channel
 *
 * Reads received bytes into the assembly buffer, splits them into frames
 * and feeds each frame to the decoder of its protocol. Locations are
 * reported to the sink. When the receiver stays quiet for the idle
 * timeout the open NMEA fix is closed.
 */

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use log::{debug, info, trace, warn};

use crate::channel::ByteChannel;
use crate::error::Error;
use crate::frame::{MessageMetadata, Protocol, MAX_FRAME_SIZE};
use crate::location::{GpsMessageStatus, Location};
use crate::nmea_fix::NmeaParser;
use crate::parser::StreamParser;
use crate::parser_sirf::SirfParser;
use crate::parser_ubx::UbxParser;
use crate::stats::Stats;

/// Receives the results of the converter, called on the consumer thread.
pub trait GpsSink {
    fn on_location(&mut self, location: Location);

    /// Raw copy of every frame, before it is decoded
    fn on_message(&mut self, _msg: &[u8], _metadata: &MessageMetadata) {}
}

/// Protocol decoders sharing one set of statistics.
pub struct Decoder {
    nmea: NmeaParser,
    sirf: SirfParser,
    ubx: UbxParser,
    stats: Arc<Stats>,
}

impl Decoder {
    pub fn new(stats: Arc<Stats>) -> Self {
        Self::with_nmea(NmeaParser::new(), stats)
    }

    /// Decoder assuming `date` until the receiver reports the date.
    pub fn with_date(date: NaiveDate, stats: Arc<Stats>) -> Self {
        Self::with_nmea(NmeaParser::with_date(date), stats)
    }

    fn with_nmea(nmea: NmeaParser, stats: Arc<Stats>) -> Self {
        Self {
            nmea,
            sirf: SirfParser::new(),
            ubx: UbxParser::new(),
            stats,
        }
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    pub fn reset(&mut self) {
        self.nmea.reset();
        self.sirf.reset();
        self.ubx = UbxParser::new();
    }

    /// Decodes one frame as found by the multiplexer.
    pub fn decode(&mut self, protocol: Protocol, msg: &[u8]) -> GpsMessageStatus {
        let mut counters = self.stats.lock();
        match protocol {
            Protocol::Nmea => self.nmea.put_msg(msg, &mut counters),
            Protocol::Sirf => self.sirf.put_msg(msg, &mut counters),
            Protocol::Ublox => self.ubx.put_msg(msg, &mut counters),
        }
    }

    /// Closes the open fix, the receiver went quiet.
    pub fn on_timeout(&mut self) -> GpsMessageStatus {
        self.nmea.put_timeout()
    }
}

fn report<S: GpsSink>(status: GpsMessageStatus, sink: &mut S) {
    if let Some(err) = &status.err {
        if status.is_valid {
            debug!("{}", err);
        } else {
            warn!("{}", err);
        }
    }
    if let Some(location) = status.location {
        trace!("location {}", location);
        sink.on_location(location);
    }
}

pub struct Converter {
    decoder: Decoder,
    parser: StreamParser,
    idle_timeout: Duration,
    message_reports: bool,
}

impl Converter {
    /// `buffer_size` is raised to `MAX_FRAME_SIZE` when smaller.
    pub fn new(decoder: Decoder, buffer_size: usize, idle_timeout: Duration) -> Self {
        Self {
            decoder,
            parser: StreamParser::with_capacity(buffer_size.max(MAX_FRAME_SIZE)),
            idle_timeout,
            message_reports: false,
        }
    }

    /// Enables `GpsSink::on_message()` calls.
    pub fn set_message_reports(&mut self, enable: bool) {
        self.message_reports = enable;
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Read loop. Returns when the channel reports an error other than a
    /// read timeout, typically because the reader thread stopped.
    pub fn run<S: GpsSink>(&mut self, channel: &ByteChannel, sink: &mut S) -> Error {
        info!("converter started");
        self.decoder.stats().start();

        loop {
            match channel.read(self.parser.spare_mut(), self.idle_timeout) {
                Ok(count) => {
                    self.parser.commit(count);
                    self.decoder.stats().lock().received(count, Utc::now());
                    self.process(sink);
                }
                Err(Error::ReadTimeout) => {
                    trace!("idle timeout");
                    let status = self.decoder.on_timeout();
                    report(status, sink);
                }
                Err(e) => {
                    info!("converter stopped: {}", e);
                    return e;
                }
            }
        }
    }

    fn process<S: GpsSink>(&mut self, sink: &mut S) {
        let Self {
            decoder,
            parser,
            message_reports,
            ..
        } = self;
        let message_reports = *message_reports;

        let junk = parser.process(|msg, metadata| {
            if message_reports {
                sink.on_message(msg, metadata);
            }
            let status = decoder.decode(metadata.protocol, msg);
            report(status, &mut *sink);
        });

        if junk > 0 {
            trace!("{} junk bytes", junk);
            self.decoder.stats().lock().junk += junk as u64;
        }
    }
}
