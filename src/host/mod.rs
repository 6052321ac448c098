/*!
    host side of the protocol, in `std` environment with tokio

    - [Client] sends requests and decodes answers over any async byte stream, typically a serial port
    - [emulate] serves a simulated [crate::sim::Design] over an async byte stream, so the client can be used without hardware
    - [find] resolves probes by group and name the way the command line tool does
*/

/// request/answer exchanges with an engine
mod client;
/// simulated device behind an async stream
mod emulate;

pub use client::*;
pub use emulate::emulate;

use std::{
    format,
    string::String,
    vec::Vec,
    };
use thiserror::Error;

use crate::config::{Config, ConfigError};


/// error regarding communication with an engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("problem with serial link")]
    Bus(std::io::Error),
    #[error("invalid configuration received")]
    Config(ConfigError),
    #[error("no data arrived in expected time")]
    Timeout,
    #[error("probe index {0} cannot be selected")]
    Selection(usize),
    #[error("group not found")]
    GroupNotFound,
    #[error("insert not found")]
    InsertNotFound,
    #[error("more than one insert matches")]
    Ambiguous,
}
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Bus(error)
    }
}
impl From<ConfigError> for Error {
    fn from(error: ConfigError) -> Self {
        Self::Config(error)
    }
}


/**
    index of the probe named `name` in group `group`

    `occurrence` picks among several probes with the same name, in catalog order. Without it, the name must be unique. With `singles` only probes holding a single value are considered.
*/
pub fn find(config: &Config, group: &str, name: &str, occurrence: Option<usize>, singles: bool) -> Result<usize, Error> {
    let group = config.groups.iter()
        .position(|known| known == group)
        .ok_or(Error::GroupNotFound)?;
    let mut matches = config.inserts.iter()
        .enumerate()
        .filter(|(_, entry)| entry.group == group && entry.name == name && !(singles && entry.is_buffer()))
        .map(|(index, _)| index);
    match occurrence {
        Some(n) => matches.nth(n).ok_or(Error::InsertNotFound),
        None => {
            let found = matches.next().ok_or(Error::InsertNotFound)?;
            if matches.next().is_some()
                {return Err(Error::Ambiguous)}
            Ok(found)
        },
    }
}

/// split little endian data received for a probe into words
pub fn words(data: &[u8], word_bytes: usize) -> Vec<u64> {
    data.chunks(word_bytes.max(1))
        .map(|word| word.iter().rev().fold(0, |value, &byte| value << 8 | u64::from(byte)))
        .collect()
}

/// zero padded hexadecimal representation of a word of `width` bits
pub fn format_value(value: u64, width: u32) -> String {
    let digits = (width as usize + 3) / 4;
    format!("{:0digits$x}", value)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::InsertInfo;

    fn config() -> Config {
        Config::from_infos(&[
            InsertInfo::new("demo", "toggle", 1, 1),
            InsertInfo::new("demo", "counter", 32, 1),
            InsertInfo::new("trace", "counter", 16, 64),
            InsertInfo::new("demo", "counter", 32, 1),
        ])
    }

    #[test]
    fn lookup() {
        let config = config();
        assert_eq!(find(&config, "demo", "toggle", None, true).unwrap(), 0);
        assert_eq!(find(&config, "trace", "counter", None, false).unwrap(), 2);
        assert_eq!(find(&config, "demo", "counter", Some(1), true).unwrap(), 3);
        assert!(matches!(find(&config, "demo", "counter", None, true), Err(Error::Ambiguous)));
        assert!(matches!(find(&config, "trace", "counter", None, true), Err(Error::InsertNotFound)));
        assert!(matches!(find(&config, "demo", "counter", Some(2), true), Err(Error::InsertNotFound)));
        assert!(matches!(find(&config, "dsp", "gain", None, false), Err(Error::GroupNotFound)));
    }

    #[test]
    fn little_endian_words() {
        assert_eq!(words(&[0x34, 0x12, 0x78, 0x56], 2), [0x1234, 0x5678]);
        assert_eq!(words(&[0xef, 0xbe, 0xad, 0xde], 4), [0xdead_beef]);
        assert_eq!(words(&[1, 0, 1], 1), [1, 0, 1]);
    }

    #[test]
    fn hex_formatting() {
        assert_eq!(format_value(0x1, 1), "1");
        assert_eq!(format_value(0xbeef, 32), "0000beef");
        assert_eq!(format_value(0x3, 9), "003");
    }
}
