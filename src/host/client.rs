use packbytes::{FromBytes, ByteArray};
use serial2_tokio::{SerialPort, CharSize, StopBits, Parity};
use tokio::io::{AsyncRead, AsyncWrite, AsyncReadExt, AsyncWriteExt};
use std::{
    path::Path,
    time::Duration,
    vec::Vec,
    };
use log::*;

use crate::{
    command::Command,
    config::{Config, ConfigError, Entry},
    };
use super::{Error, words};


/// baud rate of the reference uart
pub const DEFAULT_RATE: u32 = 115_200;
/// default time to wait for each answer
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/**
    protocol client

    each method sends one framed request and waits for its answer, if any. The client is generic over the byte stream so it can talk to a serial port as well as to an emulated device.
*/
pub struct Client<P> {
    port: P,
    timeout: Duration,
}

impl Client<SerialPort> {
    /// open the given serial port file with the given baud rate, 8 bits, no parity, one stop bit
    pub fn open(path: impl AsRef<Path>, rate: u32) -> Result<Self, Error> {
        let port = SerialPort::open(path, |mut settings: serial2_tokio::Settings| {
                settings.set_raw();
                settings.set_baud_rate(rate)?;
                settings.set_char_size(CharSize::Bits8);
                settings.set_stop_bits(StopBits::One);
                settings.set_parity(Parity::None);
                Ok(settings)
                })?;
        Ok(Self::new(port))
    }
}

impl<P: AsyncRead + AsyncWrite + Unpin> Client<P> {
    pub fn new(port: P) -> Self {
        Self {port, timeout: DEFAULT_TIMEOUT}
    }
    /// change the time waited for each answer
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
    pub fn into_inner(self) -> P {self.port}

    async fn request(&mut self, command: Command, argument: Option<u8>) -> Result<(), Error> {
        trace!("request {:?} {:?}", command, argument);
        let mut frame = command.frame().to_vec();
        frame.extend(argument);
        self.port.write_all(&frame).await?;
        self.port.flush().await?;
        Ok(())
    }
    async fn receive(&mut self, buffer: &mut [u8]) -> Result<(), Error> {
        tokio::time::timeout(self.timeout, self.port.read_exact(buffer)).await
            .map_err(|_| Error::Timeout)??;
        Ok(())
    }

    /// read the description of all probes
    pub async fn get_config(&mut self) -> Result<Config, Error> {
        self.request(Command::GetConfig, None).await?;
        // the blob length is only known once it is parsed
        let mut blob = Vec::new();
        loop {
            let mut byte = [0];
            self.receive(&mut byte).await?;
            blob.push(byte[0]);
            match Config::decode(&blob) {
                Err(ConfigError::Truncated) => continue,
                result => {
                    debug!("received configuration of {} bytes", blob.len());
                    return Ok(result?);
                },
            }
        }
    }
    /// select the probe at the given index in the configuration
    pub async fn select(&mut self, index: usize) -> Result<(), Error> {
        let index = u8::try_from(index).map_err(|_| Error::Selection(index))?;
        self.request(Command::Select, Some(index)).await
    }
    /// start a capture on the selected probe
    pub async fn arm(&mut self) -> Result<(), Error> {
        self.request(Command::Arm, None).await
    }
    /// whether the capture of the selected probe is in flight
    pub async fn pending(&mut self) -> Result<bool, Error> {
        self.request(Command::GetPending, None).await?;
        let mut answer = [0];
        self.receive(&mut answer).await?;
        Ok(answer[0] != 0)
    }
    /// read data of the selected probe, `length` must be the exact size the engine answers
    pub async fn data(&mut self, length: usize) -> Result<Vec<u8>, Error> {
        self.request(Command::GetData, None).await?;
        let mut data = std::vec![0; length];
        self.receive(&mut data).await?;
        Ok(data)
    }
    /// read data of the selected probe as a packed value, its size must match the probe data
    pub async fn read<T: FromBytes>(&mut self) -> Result<T, Error> {
        let mut buffer = T::Bytes::zeroed();
        self.request(Command::GetData, None).await?;
        self.receive(buffer.as_mut()).await?;
        Ok(T::from_le_bytes(buffer))
    }
    /// poll until the capture of the selected probe completes
    pub async fn wait(&mut self) -> Result<(), Error> {
        while self.pending().await? {}
        Ok(())
    }

    /// select, arm, wait and read all words of a probe
    pub async fn capture(&mut self, index: usize, entry: &Entry) -> Result<Vec<u64>, Error> {
        self.select(index).await?;
        self.arm().await?;
        self.wait().await?;
        let data = self.data(entry.data_bytes()).await?;
        Ok(words(&data, entry.word_bytes()))
    }
}
