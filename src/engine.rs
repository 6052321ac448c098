/*!
    serial protocol engine

    the engine consumes at most one received byte and offers at most one byte for transmission per engine clock edge. It is written as a state machine whose every transition happens in [ProtocolEngine::tick], so it can be clocked by a simulation or by a software loop alike.
*/

use alloc::vec::Vec;
use core::time::Duration;
use log::*;

use crate::{
    command::{Command, MAGIC},
    config::ConfigError,
    mux::InsertMux,
    registry::Catalog,
    };


/**
    byte level duplex link between the engine and the host

    both methods are called at most once per engine clock edge
*/
pub trait ByteLink {
    /// byte received on this cycle, if any
    fn recv(&mut self) -> Option<u8>;
    /// offer a byte for transmission, return true if it was accepted on this cycle
    fn send(&mut self, byte: u8) -> bool;
}
impl<L: ByteLink + ?Sized> ByteLink for &mut L {
    fn recv(&mut self) -> Option<u8> {(**self).recv()}
    fn send(&mut self, byte: u8) -> bool {(**self).send(byte)}
}


/// engine settings
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// frequency of the engine clock
    pub clock_hz: u32,
    /// silence on the link after which the engine goes back hunting for the magic sequence
    pub idle_timeout: Duration,
}
impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            clock_hz: 1_000_000,
            idle_timeout: Duration::from_millis(50),
        }
    }
}
impl EngineConfig {
    /// idle timeout in engine cycles
    pub fn timeout_cycles(&self) -> u32 {
        let cycles = (f64::from(self.clock_hz) * self.idle_timeout.as_secs_f64() + 0.5) as u64;
        u32::try_from(cycles).unwrap_or(u32::MAX)
    }
}


/// state of the protocol engine
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// waiting for the first magic byte
    Sync1,
    Sync2,
    Sync3,
    Sync4,
    /// waiting for a command byte
    Command,
    SendConfig,
    /// waiting for the index of the probe to select
    SetSelect,
    SendPending,
    SendData,
    /// one cycle for the next word to be presented by the selected probe
    AdvanceWord,
}
impl State {
    /// state after receiving `byte` while hunting for the magic sequence
    fn hunt(self, byte: u8) -> Self {
        let (expected, next) = match self {
            Self::Sync1 => (MAGIC[0], Self::Sync2),
            Self::Sync2 => (MAGIC[1], Self::Sync3),
            Self::Sync3 => (MAGIC[2], Self::Sync4),
            Self::Sync4 => (MAGIC[3], Self::Command),
            other => return other,
        };
        if byte == expected  {next}
        else {
            debug!("magic mismatch in {:?}: {:#04x}", self, byte);
            Self::Sync1
        }
    }
}


/// counts down idle cycles, reloaded on any link activity
#[derive(Clone, Debug)]
struct Watchdog {
    budget: u32,
    counter: u32,
    expired: bool,
}
impl Watchdog {
    fn new(budget: u32) -> Self {
        Self {budget, counter: budget, expired: false}
    }
    fn tick(&mut self, active: bool) {
        self.expired = false;
        if active {
            self.counter = self.budget;
        }
        else if self.counter == 0 {
            self.expired = true;
            self.counter = self.budget;
        }
        else {
            self.counter -= 1;
        }
    }
}


/// configuration blob with a read cursor
#[derive(Clone, Debug)]
pub struct ConfigRom {
    blob: Vec<u8>,
    address: usize,
}
impl ConfigRom {
    pub fn new(blob: Vec<u8>) -> Self {
        Self {blob, address: 0}
    }
    /// byte at the cursor
    pub fn data(&self) -> u8 {
        self.blob.get(self.address).copied().unwrap_or(0)
    }
    pub fn next(&mut self) {self.address += 1}
    pub fn reset(&mut self) {self.address = 0}
    /// true if the cursor is on the last byte
    pub fn last(&self) -> bool {self.address + 1 >= self.blob.len()}
    pub fn len(&self) -> usize {self.blob.len()}
}


/// command parser and response generator
#[derive(Clone, Debug)]
pub struct ProtocolEngine {
    state: State,
    watchdog: Watchdog,
    /// address of the word being sent
    address: usize,
    /// index of the byte being sent in the current word
    byte: usize,
    /// current word, shifted right as bytes are sent
    word: u64,
}
impl ProtocolEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            state: State::Sync1,
            watchdog: Watchdog::new(config.timeout_cycles()),
            address: 0,
            byte: 0,
            word: 0,
        }
    }
    pub fn state(&self) -> State {self.state}

    fn reset(&mut self) {
        self.state = State::Sync1;
        self.address = 0;
        self.byte = 0;
        self.word = 0;
    }

    /// one engine clock edge, return the arm pulse for the selected probe
    pub fn tick<L: ByteLink + ?Sized>(&mut self, rom: &mut ConfigRom, mux: &mut InsertMux, link: &mut L) -> bool {
        if self.watchdog.expired {
            if self.state != State::Sync1 {
                debug!("idle timeout in {:?}, resynchronizing", self.state);
            }
            self.reset();
        }
        let received = link.recv();
        if let Some(byte) = received {
            trace!("received {:#04x} in {:?}", byte, self.state);
        }
        let mut offering = false;
        let mut arm = false;

        self.state = match self.state {
            State::Sync1 | State::Sync2 | State::Sync3 | State::Sync4 => match received {
                Some(byte) => self.state.hunt(byte),
                None => self.state,
            },
            State::Command => {
                rom.reset();
                self.address = 0;
                self.byte = 0;
                mux.set_address(0);
                self.word = mux.data();
                match received.map(Command::from) {
                    None => State::Command,
                    Some(command) => {
                        debug!("command {:?}", command);
                        match command {
                            Command::GetConfig => State::SendConfig,
                            Command::Select => State::SetSelect,
                            Command::Arm => {arm = true; State::Command},
                            Command::GetPending => State::SendPending,
                            Command::GetData => State::SendData,
                            Command::Unknown => State::Command,
                        }
                    },
                }
            },
            State::SendConfig => {
                offering = true;
                if !link.send(rom.data())  {State::SendConfig}
                else if rom.last()  {State::Sync1}
                else {
                    rom.next();
                    State::SendConfig
                }
            },
            State::SetSelect => match received {
                Some(index) => {
                    debug!("select probe {}", index);
                    mux.set_select(usize::from(index));
                    State::Sync1
                },
                None => State::SetSelect,
            },
            State::SendPending => {
                offering = true;
                if link.send(u8::from(mux.pending()))  {State::Sync1}
                else  {State::SendPending}
            },
            State::SendData => {
                offering = true;
                if !link.send((self.word & 0xff) as u8)  {State::SendData}
                else if self.byte < mux.last_byte() {
                    self.word >>= 8;
                    self.byte += 1;
                    State::SendData
                }
                else if self.address < mux.last_address() {
                    self.address += 1;
                    mux.set_address(self.address);
                    State::AdvanceWord
                }
                else  {State::Sync1}
            },
            State::AdvanceWord => {
                self.byte = 0;
                self.word = mux.data();
                State::SendData
            },
        };

        self.watchdog.tick(received.is_some() || offering);
        arm
    }
}


/**
    a finalized set of probes with the engine serving them

    this is the top level to clock from the engine domain: each call to [Scope::tick] is one engine clock edge for the engine, the multiplexer and the engine halves of all probes
*/
#[derive(Debug)]
pub struct Scope {
    rom: ConfigRom,
    mux: InsertMux,
    engine: ProtocolEngine,
}
impl Scope {
    pub(crate) fn new(catalog: Catalog, config: EngineConfig) -> Result<Self, ConfigError> {
        let blob = catalog.config().encode()?;
        debug!("configuration blob of {} bytes", blob.len());
        Ok(Self {
            rom: ConfigRom::new(blob),
            mux: InsertMux::new(catalog),
            engine: ProtocolEngine::new(config),
        })
    }
    /// one engine clock edge
    pub fn tick<L: ByteLink + ?Sized>(&mut self, link: &mut L) {
        let arm = self.engine.tick(&mut self.rom, &mut self.mux, link);
        self.mux.tick(arm);
    }
    pub fn state(&self) -> State {self.engine.state()}
    pub fn catalog(&self) -> &Catalog {self.mux.catalog()}
    /// index of the currently selected probe
    pub fn selected(&self) -> usize {self.mux.select()}
    /// serialized configuration served to the host
    pub fn config_blob(&self) -> &[u8] {&self.rom.blob}

    #[cfg(test)]
    pub(crate) fn into_mux(self) -> InsertMux {self.mux}
}


#[cfg(test)]
mod tests {
    use super::*;
    use alloc::{vec, vec::Vec, collections::VecDeque};
    use crate::{registry::Registry, probe::SingleTap};

    /// link accepting every byte offered, with a queue of bytes to receive
    #[derive(Default)]
    struct Wire {
        rx: VecDeque<u8>,
        tx: Vec<u8>,
        /// refuse that many transmissions before accepting one
        stall: usize,
    }
    impl ByteLink for Wire {
        fn recv(&mut self) -> Option<u8> {self.rx.pop_front()}
        fn send(&mut self, byte: u8) -> bool {
            if self.stall > 0 {
                self.stall -= 1;
                return false;
            }
            self.tx.push(byte);
            true
        }
    }

    fn demo(config: EngineConfig) -> (Scope, SingleTap, SingleTap) {
        let mut registry = Registry::new();
        let toggle = registry.single("demo", "toggle", 1);
        let counter = registry.single("demo", "counter", 32);
        let scope = registry.finalize(config).unwrap().unwrap();
        (scope, toggle, counter)
    }

    fn run(scope: &mut Scope, wire: &mut Wire, cycles: usize) {
        for _ in 0 .. cycles {
            scope.tick(wire);
        }
    }

    #[test]
    fn config_request() {
        let (mut scope, _, _) = demo(EngineConfig::default());
        let mut wire = Wire::default();
        wire.rx.extend(Command::GetConfig.frame());
        run(&mut scope, &mut wire, 100);
        assert_eq!(wire.tx, scope.config_blob());
        assert_eq!(scope.state(), State::Sync1);
    }

    #[test]
    fn config_with_stalled_link() {
        let (mut scope, _, _) = demo(EngineConfig::default());
        let mut wire = Wire {stall: 7, .. Wire::default()};
        wire.rx.extend(Command::GetConfig.frame());
        run(&mut scope, &mut wire, 200);
        assert_eq!(wire.tx, scope.config_blob());
    }

    #[test]
    fn select_arm_read() {
        let (mut scope, mut toggle, mut counter) = demo(EngineConfig::default());
        let mut wire = Wire::default();
        wire.rx.extend(Command::Select.frame());
        wire.rx.push_back(1);
        wire.rx.extend(Command::Arm.frame());
        let mut value: u64 = 0xdead_beef;
        for _ in 0 .. 30 {
            scope.tick(&mut wire);
            toggle.tick(value & 1);
            counter.tick(value);
            value += 1;
        }
        assert_eq!(scope.selected(), 1);
        wire.rx.extend(Command::GetPending.frame());
        run(&mut scope, &mut wire, 10);
        assert_eq!(wire.tx, [0]);

        wire.tx.clear();
        wire.rx.extend(Command::GetData.frame());
        run(&mut scope, &mut wire, 20);
        assert_eq!(wire.tx.len(), 4);
        let held = u32::from_le_bytes(wire.tx[..].try_into().unwrap());
        assert!(held >= 0xdead_beef && u64::from(held) < value);
    }

    #[test]
    fn pending_without_arm() {
        let (mut scope, _, _) = demo(EngineConfig::default());
        let mut wire = Wire::default();
        wire.rx.extend(Command::GetPending.frame());
        run(&mut scope, &mut wire, 10);
        assert_eq!(wire.tx, [0]);
    }

    #[test]
    fn buffer_words_in_address_order() {
        let mut registry = Registry::new();
        let mut trace = registry.buffer("trace", "counter", 12, 5);
        let mut scope = registry.finalize(EngineConfig::default()).unwrap().unwrap();
        let mut wire = Wire::default();
        wire.rx.extend(Command::Arm.frame());
        let mut value = 0x100;
        for _ in 0 .. 40 {
            scope.tick(&mut wire);
            trace.tick(value, value >= 0x110);
            value += 1;
        }
        wire.rx.extend(Command::GetData.frame());
        run(&mut scope, &mut wire, 40);
        assert_eq!(wire.tx, [0x10, 0x01, 0x11, 0x01, 0x12, 0x01, 0x13, 0x01, 0x14, 0x01]);
    }

    #[test]
    fn bad_magic_executes_nothing() {
        for position in 0 .. MAGIC.len() {
            let (mut scope, _, _) = demo(EngineConfig::default());
            let mut wire = Wire::default();
            let mut frame = Command::GetConfig.frame();
            frame[position] = 0x55;
            wire.rx.extend(frame);
            run(&mut scope, &mut wire, 20);
            assert!(wire.tx.is_empty());
            assert_eq!(scope.state(), State::Sync1);

            // a well formed frame right after is served from scratch
            wire.rx.extend(Command::GetPending.frame());
            run(&mut scope, &mut wire, 10);
            assert_eq!(wire.tx, [0]);
        }
    }

    #[test]
    fn commands_after_arm_need_no_magic() {
        let (mut scope, _, _) = demo(EngineConfig::default());
        let mut wire = Wire::default();
        wire.rx.extend(Command::Arm.frame());
        // the engine is still waiting for a command, the corrupted magic is read as unknown commands
        wire.rx.extend([0x1a, 0xe5, 0x55, 0x9c, 0x00]);
        run(&mut scope, &mut wire, 100);
        assert_eq!(wire.tx, scope.config_blob());
        assert_eq!(scope.state(), State::Sync1);
    }

    #[test]
    fn unknown_command_is_ignored() {
        let (mut scope, _, _) = demo(EngineConfig::default());
        let mut wire = Wire::default();
        wire.rx.extend(MAGIC);
        wire.rx.extend([0x42, 0x07, 0x03]);
        run(&mut scope, &mut wire, 10);
        assert_eq!(wire.tx, [0]);
    }

    #[test]
    fn idle_timeout_resynchronizes() {
        let config = EngineConfig {clock_hz: 1_000, idle_timeout: Duration::from_millis(50)};
        assert_eq!(config.timeout_cycles(), 50);
        let (mut scope, _, _) = demo(config);
        let mut wire = Wire::default();
        // half a frame, then silence
        wire.rx.extend(&MAGIC[.. 3]);
        run(&mut scope, &mut wire, 10);
        assert_eq!(scope.state(), State::Sync4);
        run(&mut scope, &mut wire, 60);
        assert_eq!(scope.state(), State::Sync1);

        // a command stuck waiting for its argument is abandoned too
        wire.rx.extend(Command::Select.frame());
        run(&mut scope, &mut wire, 10);
        assert_eq!(scope.state(), State::SetSelect);
        run(&mut scope, &mut wire, 60);
        assert_eq!(scope.state(), State::Sync1);
        assert_eq!(scope.selected(), 0);

        wire.rx.extend(vec![0x02]);
        wire.rx.extend(Command::GetPending.frame());
        run(&mut scope, &mut wire, 20);
        assert_eq!(wire.tx, [0]);
    }

    #[test]
    fn transmission_keeps_watchdog_alive() {
        let config = EngineConfig {clock_hz: 1_000, idle_timeout: Duration::from_millis(10)};
        let (mut scope, _, _) = demo(config);
        let mut wire = Wire {stall: 100, .. Wire::default()};
        wire.rx.extend(Command::GetPending.frame());
        run(&mut scope, &mut wire, 50);
        assert_eq!(scope.state(), State::SendPending);
        run(&mut scope, &mut wire, 60);
        assert_eq!(wire.tx, [0]);
        assert_eq!(scope.state(), State::Sync1);
    }
}
