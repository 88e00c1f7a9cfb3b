use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{App, Arg};
use log::{error, info, warn};

use gnss_stream::channel::{join_producer, poll_interval, ByteChannel, ProducerConfig};
use gnss_stream::config_file::{Baudrate, StreamConfig};
use gnss_stream::converter::{Converter, Decoder, GpsSink};
use gnss_stream::error::Error;
use gnss_stream::location::Location;
use gnss_stream::server_tty::SerialTransport;
use gnss_stream::stats::Stats;

const DEFAULT_DEVICE: &str = "/dev/ttyACM0";
const DEFAULT_PROBE: [usize; 5] = [38400, 9600, 115200, 4800, 57600];

/// Prints every closed fix on stdout.
struct PrintSink {}

impl GpsSink for PrintSink {
    fn on_location(&mut self, location: Location) {
        println!("{}", location);
    }
}

fn run(config: &StreamConfig) -> Result<(), Error> {
    let device = config.device.as_deref().unwrap_or(DEFAULT_DEVICE);
    let baudrate = config.baudrate.unwrap_or(Baudrate::Auto);

    let mut transport = match baudrate {
        Baudrate::Fixed(rate) => SerialTransport::open(device, rate)?,
        Baudrate::Auto => {
            let probe = config.autobaud_probe.clone().unwrap_or_else(|| DEFAULT_PROBE.to_vec());
            SerialTransport::open_detect(device, &probe)?
        }
    };
    if let Some(size) = config.max_packet_size {
        transport.set_max_packet_size(size);
    }

    let buffer_size = config.buffer_size.unwrap_or(8192);
    let producer_config = ProducerConfig {
        buffer_size,
        read_timeout: config.read_timeout.unwrap_or(Duration::from_millis(1100)),
        poll_interval: poll_interval(transport.baud_rate()),
    };

    let channel = ByteChannel::new(buffer_size);
    let producer = channel.spawn_producer(transport, producer_config)?;

    let stats = Arc::new(Stats::new());
    let idle_timeout = config.idle_timeout.unwrap_or(Duration::from_millis(1500));
    let mut converter = Converter::new(Decoder::new(stats.clone()), buffer_size, idle_timeout);

    let reason = converter.run(&channel, &mut PrintSink {});
    channel.shutdown();
    match join_producer(producer) {
        Error::ProducerStopped => (),
        e => warn!("reader stopped: {}", e),
    }

    let counters = stats.snapshot();
    info!(
        "{} bytes, {} junk, {} NMEA ({} GGA, {} RMC), {} SiRF, {} UBX",
        counters.bytes,
        counters.junk,
        counters.nmea.total,
        counters.nmea.gga,
        counters.nmea.rmc,
        counters.sirf.total,
        counters.ublox.total
    );

    Err(reason)
}

fn main() {
    let matches = App::new("gnss-stream")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Converts NMEA, SiRF and UBX receiver output into position fixes")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Configuration file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("device")
                .short("d")
                .long("device")
                .value_name("PATH")
                .help("Serial device of the receiver")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("baudrate")
                .short("b")
                .long("baudrate")
                .value_name("BPS")
                .help("Bitrate of the serial link or 'auto'")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Increases log level"),
        )
        .get_matches();

    let level = match matches.occurrences_of("verbose") {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = StreamConfig::default();
    if let Some(path) = matches.value_of("config") {
        if let Err(e) = config.parse_config(path) {
            error!("{}", e);
            process::exit(1);
        }
    }
    if let Some(device) = matches.value_of("device") {
        config.device = Some(String::from(device));
    }
    if let Some(rate) = matches.value_of("baudrate") {
        match rate.parse::<Baudrate>() {
            Ok(rate) => config.baudrate = Some(rate),
            Err(e) => {
                error!("{}", e);
                process::exit(1);
            }
        }
    }

    match run(&config) {
        Err(Error::ProducerStopped) | Ok(()) => (),
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}
