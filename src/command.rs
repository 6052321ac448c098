use bilge::prelude::*;


/// byte sequence prefixing every command, matched one byte at a time by the engine
pub const MAGIC: [u8; 4] = [0x1a, 0xe5, 0x52, 0x9c];

/// command byte following the magic sequence
#[bitsize(8)]
#[derive(Copy, Clone, FromBits, Debug, PartialEq)]
pub enum Command {
    /// stream the configuration blob describing all probes
    GetConfig = 0x00,
    /// next byte is the index of the probe to select
    Select = 0x01,
    /// arm the selected probe, no answer
    Arm = 0x02,
    /// answer one byte, 1 if the selected probe capture is still in flight
    GetPending = 0x03,
    /// stream all words of the selected probe, little endian, in address order
    GetData = 0x04,
    /// any other byte is silently ignored
    #[fallback]
    Unknown = 0xff,
}

impl Command {
    /// full request frame for this command
    pub fn frame(self) -> [u8; 5] {
        let [a, b, c, d] = MAGIC;
        [a, b, c, d, u8::from(self)]
    }
}

/// number of bytes used on the wire for one word of `width` bits
pub const fn word_bytes(width: u32) -> usize {
    (width as usize + 7) / 8
}

/// mask keeping the `width` low bits of a word
pub const fn word_mask(width: u32) -> u64 {
    if width >= 64  {u64::MAX}
    else  {(1 << width) - 1}
}
