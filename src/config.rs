/*!
    self describing configuration blob

    the blob is a messagepack map with two keys, in this order:

    - `"grp"`: list of group names, in order of first appearance in the catalog
    - `"ins"`: one `[group_index, name, width, depth]` row per probe, in catalog order

    integers and strings always use their most compact messagepack representation, so the blob is byte-identical to what any standard packer produces for the same map.
*/

use alloc::{vec::Vec, string::String};
use rmp::encode::{self, ByteBuf, RmpWrite, ValueWriteError};
use thiserror::Error;

use crate::{
    probe::InsertInfo,
    command::word_bytes,
    };


/// error with a configuration blob
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("configuration could not be serialized")]
    Encode,
    #[error("configuration blob ended early")]
    Truncated,
    #[error("malformed configuration: {0}")]
    Malformed(&'static str),
}

/// catalog as advertised to the host
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    /// group table
    pub groups: Vec<String>,
    /// one entry per probe, the position is the probe selector
    pub inserts: Vec<Entry>,
}
/// one row of the configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// position of the group name in [Config::groups]
    pub group: usize,
    pub name: String,
    pub width: u32,
    pub depth: u32,
}
impl Entry {
    /// bytes per word on the wire
    pub fn word_bytes(&self) -> usize {word_bytes(self.width)}
    /// total bytes answered to a data request for this probe
    pub fn data_bytes(&self) -> usize {self.word_bytes() * self.depth as usize}
    /// true for probes recording more than one word
    pub fn is_buffer(&self) -> bool {self.depth > 1}
}

impl Config {
    /// build the group table and rows for probes in catalog order
    pub fn from_infos<'a>(infos: impl IntoIterator<Item=&'a InsertInfo>) -> Self {
        let mut config = Self::default();
        for info in infos {
            let group = match config.groups.iter().position(|group| *group == info.group) {
                Some(index) => index,
                None => {
                    config.groups.push(info.group.clone());
                    config.groups.len() - 1
                },
            };
            config.inserts.push(Entry {
                group,
                name: info.name.clone(),
                width: info.width,
                depth: info.depth,
            });
        }
        config
    }
    /// group name of an entry
    pub fn group_name(&self, entry: &Entry) -> Option<&str> {
        self.groups.get(entry.group).map(String::as_str)
    }
    /// resolve group indices back into probe descriptions
    pub fn infos(&self) -> Result<Vec<InsertInfo>, ConfigError> {
        self.inserts.iter()
            .map(|entry| Ok(InsertInfo {
                group: self.group_name(entry)
                    .ok_or(ConfigError::Malformed("group index out of range"))?
                    .into(),
                name: entry.name.clone(),
                width: entry.width,
                depth: entry.depth,
            }))
            .collect()
    }

    /// serialize to the blob sent on the wire
    pub fn encode(&self) -> Result<Vec<u8>, ConfigError> {
        let mut buffer = ByteBuf::new();
        self.write(&mut buffer).map_err(|_| ConfigError::Encode)?;
        Ok(buffer.into_vec())
    }
    fn write<W: RmpWrite>(&self, wr: &mut W) -> Result<(), ValueWriteError<W::Error>> {
        encode::write_map_len(wr, 2)?;

        encode::write_str(wr, "grp")?;
        encode::write_array_len(wr, wire_len(self.groups.len()))?;
        for group in &self.groups {
            encode::write_str(wr, group)?;
        }

        encode::write_str(wr, "ins")?;
        encode::write_array_len(wr, wire_len(self.inserts.len()))?;
        for entry in &self.inserts {
            encode::write_array_len(wr, 4)?;
            encode::write_uint(wr, entry.group as u64)?;
            encode::write_str(wr, &entry.name)?;
            encode::write_uint(wr, u64::from(entry.width))?;
            encode::write_uint(wr, u64::from(entry.depth))?;
        }
        Ok(())
    }

    /**
        parse a blob received from the engine

        returns [ConfigError::Truncated] if the blob is a valid prefix of a configuration, so a reader can keep receiving bytes until it parses
    */
    #[cfg(feature = "std")]
    pub fn decode(blob: &[u8]) -> Result<Self, ConfigError> {
        reading::decode(blob)
    }
}

fn wire_len(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}


#[cfg(feature = "std")]
mod reading {
    use std::io;
    use alloc::{vec::Vec, string::String};
    use rmp::decode::{self, ValueReadError, NumValueReadError};
    use super::{Config, Entry, ConfigError};

    pub fn decode(blob: &[u8]) -> Result<Config, ConfigError> {
        let mut rd = blob;
        let mut groups = None;
        let mut inserts = None;
        let keys = decode::read_map_len(&mut rd).map_err(value_error)?;
        for _ in 0 .. keys {
            match read_str(&mut rd)?.as_str() {
                "grp" => {
                    let len = decode::read_array_len(&mut rd).map_err(value_error)?;
                    let mut names = Vec::new();
                    for _ in 0 .. len {
                        names.push(read_str(&mut rd)?);
                    }
                    groups = Some(names);
                },
                "ins" => {
                    let len = decode::read_array_len(&mut rd).map_err(value_error)?;
                    let mut rows = Vec::new();
                    for _ in 0 .. len {
                        rows.push(read_entry(&mut rd)?);
                    }
                    inserts = Some(rows);
                },
                _ => return Err(ConfigError::Malformed("unexpected key")),
            }
        }
        let config = Config {
            groups: groups.ok_or(ConfigError::Malformed("missing group table"))?,
            inserts: inserts.ok_or(ConfigError::Malformed("missing insert table"))?,
        };
        if config.inserts.iter().any(|entry| entry.group >= config.groups.len()) {
            return Err(ConfigError::Malformed("group index out of range"));
        }
        Ok(config)
    }

    fn read_entry(rd: &mut &[u8]) -> Result<Entry, ConfigError> {
        if decode::read_array_len(rd).map_err(value_error)? != 4 {
            return Err(ConfigError::Malformed("insert row must have 4 elements"));
        }
        let group = read_uint(rd)?;
        let name = read_str(rd)?;
        let width = read_uint(rd)?;
        let depth = read_uint(rd)?;
        if !(1 ..= 64).contains(&width)
            {return Err(ConfigError::Malformed("width must be between 1 and 64 bits"))}
        if depth == 0
            {return Err(ConfigError::Malformed("depth must be at least one word"))}
        Ok(Entry {
            group: usize::try_from(group).map_err(|_| ConfigError::Malformed("group index too big"))?,
            name,
            width: u32::try_from(width).map_err(|_| ConfigError::Malformed("width too big"))?,
            depth: u32::try_from(depth).map_err(|_| ConfigError::Malformed("depth too big"))?,
        })
    }

    fn read_str(rd: &mut &[u8]) -> Result<String, ConfigError> {
        let len = decode::read_str_len(rd).map_err(value_error)? as usize;
        if rd.len() < len
            {return Err(ConfigError::Truncated)}
        let (text, rest) = rd.split_at(len);
        *rd = rest;
        core::str::from_utf8(text)
            .map(String::from)
            .map_err(|_| ConfigError::Malformed("string is not utf-8"))
    }

    fn read_uint(rd: &mut &[u8]) -> Result<u64, ConfigError> {
        decode::read_int(rd).map_err(|error| match error {
            NumValueReadError::InvalidMarkerRead(error)
            | NumValueReadError::InvalidDataRead(error) => io_error(error),
            NumValueReadError::TypeMismatch(_) => ConfigError::Malformed("expected an integer"),
            NumValueReadError::OutOfRange => ConfigError::Malformed("integer out of range"),
        })
    }

    fn value_error(error: ValueReadError<io::Error>) -> ConfigError {
        match error {
            ValueReadError::InvalidMarkerRead(error)
            | ValueReadError::InvalidDataRead(error) => io_error(error),
            ValueReadError::TypeMismatch(_) => ConfigError::Malformed("unexpected type"),
        }
    }

    fn io_error(error: io::Error) -> ConfigError {
        if error.kind() == io::ErrorKind::UnexpectedEof  {ConfigError::Truncated}
        else  {ConfigError::Malformed("unreadable blob")}
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn demo() -> Vec<InsertInfo> {
        vec![
            InsertInfo::new("demo", "toggle", 1, 1),
            InsertInfo::new("demo", "counter", 32, 1),
        ]
    }

    #[test]
    fn demo_blob_bytes() {
        let blob = Config::from_infos(&demo()).encode().unwrap();
        let mut expected = vec![0x82];
        expected.extend(b"\xa3grp\x91\xa4demo");
        expected.extend(b"\xa3ins\x92");
        expected.extend(b"\x94\x00\xa6toggle\x01\x01");
        expected.extend(b"\x94\x00\xa7counter\x20\x01");
        assert_eq!(blob, expected);
    }

    #[test]
    fn group_table_first_occurrence() {
        let infos = vec![
            InsertInfo::new("b", "x", 8, 1),
            InsertInfo::new("a", "y", 8, 1),
            InsertInfo::new("b", "z", 8, 300),
        ];
        let config = Config::from_infos(&infos);
        assert_eq!(config.groups, ["b", "a"]);
        let groups: Vec<usize> = config.inserts.iter().map(|entry| entry.group).collect();
        assert_eq!(groups, [0, 1, 0]);
        assert!(config.inserts[2].is_buffer());
        assert_eq!(config.inserts[2].data_bytes(), 300);
    }

    #[test]
    fn compact_integers() {
        let infos = vec![InsertInfo::new("g", "deep", 64, 70_000)];
        let blob = Config::from_infos(&infos).encode().unwrap();
        // width fits a positive fixint, depth needs a uint32
        assert!(blob.ends_with(&[0x40, 0xce, 0x00, 0x01, 0x11, 0x70]));
    }

    #[cfg(feature = "std")]
    #[test]
    fn round_trip() {
        let mut infos = demo();
        infos.push(InsertInfo::new("trace", "history", 12, 256));
        infos.push(InsertInfo::new("demo", "a rather long probe name exceeding thirty one bytes", 64, 1));
        let config = Config::from_infos(&infos);
        let decoded = Config::decode(&config.encode().unwrap()).unwrap();
        assert_eq!(decoded, config);
        assert_eq!(decoded.infos().unwrap(), infos);
    }

    #[cfg(feature = "std")]
    #[test]
    fn truncated_prefixes() {
        let blob = Config::from_infos(&demo()).encode().unwrap();
        for end in 0 .. blob.len() {
            assert_eq!(Config::decode(&blob[.. end]), Err(ConfigError::Truncated), "prefix of {} bytes", end);
        }
    }

    #[cfg(feature = "std")]
    #[test]
    fn malformed_blobs() {
        // a map with an unknown key
        assert!(matches!(Config::decode(b"\x81\xa3foo\x90"), Err(ConfigError::Malformed(_))));
        // not a map
        assert!(matches!(Config::decode(b"\x90"), Err(ConfigError::Malformed(_))));
        // group index pointing past the group table
        assert!(matches!(
            Config::decode(b"\x82\xa3grp\x90\xa3ins\x91\x94\x00\xa1x\x01\x01"),
            Err(ConfigError::Malformed(_)),
            ));
        // words of no bit, or probes of no word
        assert!(matches!(
            Config::decode(b"\x82\xa3grp\x91\xa1g\xa3ins\x91\x94\x00\xa1x\x00\x01"),
            Err(ConfigError::Malformed(_)),
            ));
        assert!(matches!(
            Config::decode(b"\x82\xa3grp\x91\xa1g\xa3ins\x91\x94\x00\xa1x\x41\x01"),
            Err(ConfigError::Malformed(_)),
            ));
        assert!(matches!(
            Config::decode(b"\x82\xa3grp\x91\xa1g\xa3ins\x91\x94\x00\xa1x\x08\x00"),
            Err(ConfigError::Malformed(_)),
            ));
        assert!(Config::decode(b"\x82\xa3grp\x91\xa1g\xa3ins\x91\x94\x00\xa1x\x40\x01").is_ok());
    }
}
