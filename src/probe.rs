/*!
    probe variants

    every probe is split in two halves:

    - the engine half, an [Insert], lives in the engine domain and is owned by the multiplexer once the registry is finalized
    - the source half, a tap, is handed to the instrumented design and ticked in the domain the probed value lives in

    the two halves only share atomics, see [crate::cdc]
*/

use alloc::{sync::Arc, vec::Vec, string::String};
use core::sync::atomic::{AtomicU64, Ordering::*};

use crate::{
    cdc::{self, PulseSender, PulseReceiver, Synchronizer, SyncSource},
    command::{word_bytes, word_mask},
    };


/// identity and payload shape of a probe, as advertised to the host
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InsertInfo {
    pub group: String,
    pub name: String,
    /// bits per word
    pub width: u32,
    /// number of words, 1 for probes holding a single value
    pub depth: u32,
}
impl InsertInfo {
    pub fn new(group: impl Into<String>, name: impl Into<String>, width: u32, depth: u32) -> Self {
        assert!(width >= 1 && width <= 64, "probe width must be between 1 and 64 bits");
        assert!(depth >= 1, "probe depth must be at least one word");
        Self {group: group.into(), name: name.into(), width, depth}
    }
    /// bytes per word on the wire
    pub fn word_bytes(&self) -> usize {word_bytes(self.width)}
}


/**
    engine half of a probe

    dispatching on the variant gives the capability set: every variant has data, capturing variants have arm and pending, buffering variants have an address
*/
#[derive(Debug)]
pub enum Insert {
    Instant(InstantProbe),
    Single(SingleProbe),
    Buffer(BufferProbe),
}
impl Insert {
    /// one engine clock edge, `arm` is the arm input sampled on this edge
    pub fn tick(&mut self, arm: bool) {
        match self {
            Self::Instant(probe) => probe.data.tick(),
            Self::Single(probe) => probe.tick(arm),
            Self::Buffer(probe) => probe.handshake.tick(arm),
        }
    }
    /// true while a capture is in flight
    pub fn pending(&self) -> bool {
        match self {
            Self::Instant(_) => false,
            Self::Single(probe) => probe.handshake.pending,
            Self::Buffer(probe) => probe.handshake.pending,
        }
    }
    /// word at `address`, the address is ignored by non buffering probes
    pub fn data(&self, address: usize) -> u64 {
        match self {
            Self::Instant(probe) => probe.data.value(),
            Self::Single(probe) => probe.data.value(),
            Self::Buffer(probe) => probe.memory
                .get(address)
                .map_or(0, |word| word.load(Relaxed)),
        }
    }
    pub fn width(&self) -> u32 {
        match self {
            Self::Instant(probe) => probe.width,
            Self::Single(probe) => probe.width,
            Self::Buffer(probe) => probe.width,
        }
    }
    pub fn depth(&self) -> usize {
        match self {
            Self::Buffer(probe) => probe.memory.len(),
            _ => 1,
        }
    }
}


/// arm/done handshake state kept in the engine domain by capturing probes
#[derive(Debug)]
struct Handshake {
    arm: PulseSender,
    done: PulseReceiver,
    pending: bool,
}
/// arm/done handshake seen from the probed domain
#[derive(Debug)]
struct RemoteHandshake {
    arm: PulseReceiver,
    done: PulseSender,
}
fn handshake() -> (Handshake, RemoteHandshake) {
    let (arm_tx, arm_rx) = cdc::pulse_synchronizer();
    let (done_tx, done_rx) = cdc::pulse_synchronizer();
    (
        Handshake {arm: arm_tx, done: done_rx, pending: false},
        RemoteHandshake {arm: arm_rx, done: done_tx},
    )
}
impl Handshake {
    fn tick(&mut self, arm: bool) {
        let done = self.done.tick();
        // arming again before the capture finished is ignored
        let fire = arm && !self.pending;
        self.arm.tick(fire);
        if done  {self.pending = false}
        if fire  {self.pending = true}
    }
}


/// engine half of a probe continuously following its source
#[derive(Debug)]
pub struct InstantProbe {
    width: u32,
    data: Synchronizer,
}
/// source half of an [InstantProbe], can be updated from any domain
#[derive(Clone, Debug)]
pub struct InstantTap {
    mask: u64,
    line: SyncSource,
}
pub(crate) fn instant(width: u32) -> (InstantProbe, InstantTap) {
    let (line, data) = cdc::synchronizer(0);
    (
        InstantProbe {width, data},
        InstantTap {mask: word_mask(width), line},
    )
}
impl InstantTap {
    /// publish the current value of the probed signal
    pub fn update(&self, value: u64) {
        self.line.set(value & self.mask);
    }
}


/// engine half of a probe capturing one value on demand
#[derive(Debug)]
pub struct SingleProbe {
    width: u32,
    handshake: Handshake,
    data: Synchronizer,
}
impl SingleProbe {
    fn tick(&mut self, arm: bool) {
        // sample the done line before the held value, so the value is never older than the done pulse
        self.handshake.tick(arm);
        self.data.tick();
    }
}
/// source half of a [SingleProbe], ticked in the probed domain
#[derive(Debug)]
pub struct SingleTap {
    mask: u64,
    handshake: RemoteHandshake,
    held: SyncSource,
}
pub(crate) fn single(width: u32) -> (SingleProbe, SingleTap) {
    let (local, remote) = handshake();
    let (held, data) = cdc::synchronizer(0);
    (
        SingleProbe {width, handshake: local, data},
        SingleTap {mask: word_mask(width), handshake: remote, held},
    )
}
impl SingleTap {
    /// one clock edge of the probed domain, `value` is the probed signal on this edge
    pub fn tick(&mut self, value: u64) {
        let armed = self.handshake.arm.tick();
        if armed {
            self.held.set(value & self.mask);
        }
        self.handshake.done.tick(armed);
    }
}


/// engine half of a probe recording a history of its source
#[derive(Debug)]
pub struct BufferProbe {
    width: u32,
    handshake: Handshake,
    memory: Arc<[AtomicU64]>,
}
/// source half of a [BufferProbe], ticked in the probed domain
#[derive(Debug)]
pub struct BufferTap {
    mask: u64,
    handshake: RemoteHandshake,
    memory: Arc<[AtomicU64]>,
    state: Recording,
}
/// progress of a buffer capture in the probed domain
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Recording {
    Idle,
    WaitTrigger,
    Running(usize),
}
pub(crate) fn buffer(width: u32, depth: usize) -> (BufferProbe, BufferTap) {
    let (local, remote) = handshake();
    let memory: Arc<[AtomicU64]> = (0 .. depth).map(|_| AtomicU64::new(0)).collect::<Vec<_>>().into();
    (
        BufferProbe {width, handshake: local, memory: memory.clone()},
        BufferTap {mask: word_mask(width), handshake: remote, memory, state: Recording::Idle},
    )
}
impl BufferTap {
    /**
        one clock edge of the probed domain

        `value` is the probed signal and `trigger` the trigger condition on this edge. Once armed the tap waits for the trigger, then records one word per edge until the memory is full.
    */
    pub fn tick(&mut self, value: u64, trigger: bool) {
        let armed = self.handshake.arm.tick();
        let mut done = false;
        self.state = match self.state {
            Recording::Idle => Recording::Idle,
            Recording::WaitTrigger if trigger => self.record(0, value, &mut done),
            Recording::WaitTrigger => Recording::WaitTrigger,
            Recording::Running(address) => self.record(address, value, &mut done),
        };
        if armed && self.state == Recording::Idle {
            self.state = Recording::WaitTrigger;
        }
        self.handshake.done.tick(done);
    }
    fn record(&self, address: usize, value: u64, done: &mut bool) -> Recording {
        self.memory[address].store(value & self.mask, Relaxed);
        if address + 1 == self.memory.len() {
            *done = true;
            Recording::Idle
        }
        else {
            Recording::Running(address + 1)
        }
    }
    pub fn state(&self) -> Recording {self.state}
}
