use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use ini::ini::Properties;
use ini::Ini;
use log::{info, warn};

use crate::error::Error;
use crate::frame::MAX_FRAME_SIZE;

/// Standard rates accepted for the serial link
const BAUDRATES: [usize; 8] = [4800, 9600, 19200, 38400, 57600, 115200, 230400, 460800];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Baudrate {
    Fixed(usize),
    Auto,
}

impl FromStr for Baudrate {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if text == "auto" {
            return Ok(Baudrate::Auto);
        }
        match text.parse::<usize>() {
            Ok(rate) if BAUDRATES.contains(&rate) => Ok(Baudrate::Fixed(rate)),
            _ => Err(format!("invalid baudrate {}", text)),
        }
    }
}

/// Settings of the `gnss-stream` binary. Keys missing in the file stay `None`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StreamConfig {
    pub device: Option<String>,
    pub baudrate: Option<Baudrate>,
    pub autobaud_probe: Option<Vec<usize>>,

    pub buffer_size: Option<usize>,
    pub max_packet_size: Option<usize>,
    pub read_timeout: Option<Duration>,
    pub idle_timeout: Option<Duration>,
}

/// Value of `key`, limited to `min..=max`. Invalid values are reported and ignored.
fn get_number<T>(section: &Properties, key: &str, min: T, max: T) -> Option<T>
where
    T: FromStr + PartialOrd + Copy,
{
    match section.get(key) {
        Some("") => {
            warn!("no value for {} specified, ignoring", key);
            None
        }
        Some(x) => match x.parse::<T>() {
            Ok(y) if y >= min && y <= max => {
                info!("using {} for {}", x, key);
                Some(y)
            }
            Ok(_) | Err(_) => {
                warn!("invalid value {} for key {}", x, key);
                None
            }
        },
        None => None,
    }
}

fn get_millis(section: &Properties, key: &str, min: u64, max: u64) -> Option<Duration> {
    get_number(section, key, min, max).map(Duration::from_millis)
}

fn get_baudrate(section: &Properties, key: &str) -> Option<Baudrate> {
    let x = section.get(key)?;
    match x.parse::<Baudrate>() {
        Ok(rate) => {
            info!("using {} for {}", x, key);
            Some(rate)
        }
        Err(e) => {
            warn!("{} for key {}", e, key);
            None
        }
    }
}

fn get_rate_list(section: &Properties, key: &str) -> Option<Vec<usize>> {
    let x = section.get(key)?;
    let rates: Result<Vec<usize>, String> = x
        .split(',')
        .map(|token| match token.trim().parse::<Baudrate>() {
            Ok(Baudrate::Fixed(rate)) => Ok(rate),
            _ => Err(String::from(token.trim())),
        })
        .collect();

    match rates {
        Ok(rates) if !rates.is_empty() => {
            info!("using {} for {}", x, key);
            Some(rates)
        }
        Ok(_) => None,
        Err(token) => {
            warn!("invalid baudrate {} in key {}", token, key);
            None
        }
    }
}

impl StreamConfig {
    pub fn parse_config(&mut self, path: &str) -> Result<(), Error> {
        if !Path::new(&path).exists() {
            return Err(Error::Config(format!("configuration file {} not found", path)));
        }

        let conf = Ini::load_from_file(path).map_err(|e| Error::Config(format!("{}: {}", path, e)))?;
        self.apply(&conf)
    }

    pub fn parse_str(&mut self, text: &str) -> Result<(), Error> {
        let conf = Ini::load_from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        self.apply(&conf)
    }

    fn apply(&mut self, conf: &Ini) -> Result<(), Error> {
        let sec_general = conf
            .section(Some("default"))
            .ok_or_else(|| Error::Config(String::from("invalid configuration file format/version")))?;

        match sec_general.get("version") {
            Some("1") => (),
            _ => return Err(Error::Config(String::from("invalid configuration file format/version"))),
        }

        if let Some(sec_serial) = conf.section(Some("serial")) {
            match sec_serial.get("device") {
                Some("") | None => (),
                Some(device) => self.device = Some(String::from(device)),
            }
            self.baudrate = get_baudrate(sec_serial, "baudrate");
            self.autobaud_probe = get_rate_list(sec_serial, "autobaud-probe");
        }

        if let Some(sec_reader) = conf.section(Some("reader")) {
            self.buffer_size = get_number(sec_reader, "buffer-size", MAX_FRAME_SIZE, 65536);
            self.max_packet_size = get_number(sec_reader, "max-packet-size", 1, 4096);
            self.read_timeout = get_millis(sec_reader, "read-timeout-ms", 10, 10000);
            self.idle_timeout = get_millis(sec_reader, "idle-timeout-ms", 10, 60000);
        }

        Ok(())
    }
}

#[cfg(test)]
mod file_and_format {
    use super::*;

    #[test]
    fn file_not_found() {
        let mut config: StreamConfig = Default::default();
        let res = config.parse_config("test_files/does_not_exists.conf");
        assert!(matches!(res, Err(Error::Config(_))));
    }

    #[test]
    fn no_default_section() {
        let mut config: StreamConfig = Default::default();
        let res = config.parse_str("[serial]\ndevice = /dev/ttyS1\n");
        assert!(res.is_err());
        assert_eq!(config.device, None);
    }

    #[test]
    fn no_version_info() {
        let mut config: StreamConfig = Default::default();
        let res = config.parse_str("[default]\n[serial]\ndevice = /dev/ttyS1\n");
        assert!(res.is_err());
    }

    #[test]
    fn wrong_version_info() {
        let mut config: StreamConfig = Default::default();
        let res = config.parse_str("[default]\nversion = 2\n");
        assert!(res.is_err());
    }

    #[test]
    fn version_only() {
        let mut config: StreamConfig = Default::default();
        let res = config.parse_str("[default]\nversion = 1\n");
        assert!(res.is_ok());
        assert_eq!(config, StreamConfig::default());
    }
}

#[cfg(test)]
mod serial {
    use super::*;

    #[test]
    fn all_keys() {
        let mut config: StreamConfig = Default::default();
        let res = config.parse_str(
            "[default]\nversion = 1\n\
             [serial]\ndevice = /dev/ttyACM0\nbaudrate = 38400\nautobaud-probe = 115200, 9600\n",
        );
        assert!(res.is_ok());
        assert_eq!(config.device.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.baudrate, Some(Baudrate::Fixed(38400)));
        assert_eq!(config.autobaud_probe, Some(vec![115200, 9600]));
    }

    #[test]
    fn auto_baudrate() {
        let mut config: StreamConfig = Default::default();
        config.parse_str("[default]\nversion = 1\n[serial]\nbaudrate = auto\n").unwrap();
        assert_eq!(config.baudrate, Some(Baudrate::Auto));
    }

    #[test]
    fn invalid_values() {
        let mut config: StreamConfig = Default::default();
        let res = config.parse_str(
            "[default]\nversion = 1\n\
             [serial]\ndevice =\nbaudrate = 12345\nautobaud-probe = 9600,fast\n",
        );
        assert!(res.is_ok());
        assert_eq!(config.device, None);
        assert_eq!(config.baudrate, None);
        assert_eq!(config.autobaud_probe, None);
    }

    #[test]
    fn baudrate_from_str() {
        assert_eq!("115200".parse::<Baudrate>(), Ok(Baudrate::Fixed(115200)));
        assert_eq!("auto".parse::<Baudrate>(), Ok(Baudrate::Auto));
        assert!("1200".parse::<Baudrate>().is_err());
        assert!("".parse::<Baudrate>().is_err());
    }
}

#[cfg(test)]
mod reader {
    use super::*;

    #[test]
    fn all_keys() {
        let mut config: StreamConfig = Default::default();
        let res = config.parse_str(
            "[default]\nversion = 1\n\
             [reader]\nbuffer-size = 8192\nmax-packet-size = 64\nread-timeout-ms = 1100\nidle-timeout-ms = 1500\n",
        );
        assert!(res.is_ok());
        assert_eq!(config.buffer_size, Some(8192));
        assert_eq!(config.max_packet_size, Some(64));
        assert_eq!(config.read_timeout, Some(Duration::from_millis(1100)));
        assert_eq!(config.idle_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn out_of_range() {
        let mut config: StreamConfig = Default::default();
        let res = config.parse_str(
            "[default]\nversion = 1\n\
             [reader]\nbuffer-size = 100\nmax-packet-size = 0\nread-timeout-ms = -5\nidle-timeout-ms =\n",
        );
        assert!(res.is_ok());
        assert_eq!(config.buffer_size, None);
        assert_eq!(config.max_packet_size, None);
        assert_eq!(config.read_timeout, None);
        assert_eq!(config.idle_timeout, None);
    }

    #[test]
    fn buffer_holds_largest_frame() {
        let mut config: StreamConfig = Default::default();
        config.parse_str("[default]\nversion = 1\n[reader]\nbuffer-size = 1024\n").unwrap();
        assert_eq!(config.buffer_size, None);

        config.parse_str("[default]\nversion = 1\n[reader]\nbuffer-size = 4104\n").unwrap();
        assert_eq!(config.buffer_size, Some(MAX_FRAME_SIZE));
    }
}
