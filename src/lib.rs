pub mod channel;
pub mod checksum;
pub mod config_file;
pub mod converter;
pub mod error;
pub mod frame;
pub mod location;
pub mod nmea_fields;
pub mod nmea_fix;
pub mod nmea_sentences;
pub mod parser;
pub mod parser_nmea;
pub mod parser_sirf;
pub mod parser_ubx;
pub mod server_tty;
pub mod stats;

pub use crate::channel::{ByteChannel, ProducerConfig, Transport};
pub use crate::converter::{Converter, Decoder, GpsSink};
pub use crate::error::Error;
pub use crate::frame::{FrameResult, MessageMetadata, Protocol};
pub use crate::location::{GpsMessageStatus, Location};
pub use crate::stats::Stats;
