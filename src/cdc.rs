/*!
    clock domain crossing primitives

    every value crossing between two timing domains goes through a line: an atomic written by the source domain and sampled by the destination domain. The source and destination halves can be ticked from unrelated clocks, threads or tasks.

    - [pulse_synchronizer] carries single cycle events
    - [Synchronizer] carries a slowly changing word through two registers
*/

use alloc::sync::Arc;
use core::sync::atomic::{
    AtomicBool, AtomicU64,
    Ordering::*,
    };


/// create both halves of a pulse synchronizer
pub fn pulse_synchronizer() -> (PulseSender, PulseReceiver) {
    let line = Arc::new(AtomicBool::new(false));
    (
        PulseSender {toggle: false, line: line.clone()},
        PulseReceiver {line, stages: [false; 2], last: false},
    )
}

/**
    source half of a pulse synchronizer, ticked in the source domain

    each input pulse flips a toggle register. The toggle is published with release ordering, so everything the source domain wrote before the pulse is visible to the destination domain once it sees the pulse.
*/
#[derive(Debug)]
pub struct PulseSender {
    toggle: bool,
    line: Arc<AtomicBool>,
}
impl PulseSender {
    /// one source clock edge, `pulse` is the input sampled on this edge
    pub fn tick(&mut self, pulse: bool) {
        if pulse {
            self.toggle = !self.toggle;
            self.line.store(self.toggle, Release);
        }
    }
}

/**
    destination half of a pulse synchronizer, ticked in the destination domain

    the toggle line is resynchronized through two registers, then an edge detector rebuilds a one cycle pulse. A source pulse shows up on the second destination edge following it.
*/
#[derive(Debug)]
pub struct PulseReceiver {
    line: Arc<AtomicBool>,
    stages: [bool; 2],
    last: bool,
}
impl PulseReceiver {
    /// one destination clock edge, return the output pulse for the cycle starting on this edge
    pub fn tick(&mut self) -> bool {
        self.last = self.stages[1];
        self.stages[1] = self.stages[0];
        self.stages[0] = self.line.load(Acquire);
        self.stages[1] != self.last
    }
}


/// create both halves of a word synchronizer
pub fn synchronizer(initial: u64) -> (SyncSource, Synchronizer) {
    let line = Arc::new(AtomicU64::new(initial));
    (
        SyncSource {line: line.clone()},
        Synchronizer {line, stages: [initial; 2]},
    )
}

/// source half of a word synchronizer, set from any domain
#[derive(Clone, Debug)]
pub struct SyncSource {
    line: Arc<AtomicU64>,
}
impl SyncSource {
    pub fn set(&self, value: u64) {
        self.line.store(value, Relaxed);
    }
}

/// destination half of a word synchronizer: two registers clocked in the destination domain
#[derive(Debug)]
pub struct Synchronizer {
    line: Arc<AtomicU64>,
    stages: [u64; 2],
}
impl Synchronizer {
    /// one destination clock edge
    pub fn tick(&mut self) {
        self.stages[1] = self.stages[0];
        self.stages[0] = self.line.load(Relaxed);
    }
    /// synchronized value
    pub fn value(&self) -> u64 {
        self.stages[1]
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_latency() {
        let (mut tx, mut rx) = pulse_synchronizer();
        assert!(!rx.tick());
        tx.tick(true);
        let seen: alloc::vec::Vec<bool> = (0 .. 5).map(|_| rx.tick()).collect();
        assert_eq!(seen, [false, true, false, false, false]);
    }

    #[test]
    fn back_to_back_pulses() {
        let (mut tx, mut rx) = pulse_synchronizer();
        let mut count = 0;
        for _ in 0 .. 10 {
            tx.tick(true);
            count += usize::from(rx.tick());
        }
        for _ in 0 .. 4 {
            tx.tick(false);
            count += usize::from(rx.tick());
        }
        assert_eq!(count, 10);
    }

    #[test]
    fn idle_source_never_pulses() {
        let (mut tx, mut rx) = pulse_synchronizer();
        for _ in 0 .. 100 {
            tx.tick(false);
            assert!(!rx.tick());
        }
    }

    #[test]
    fn word_two_stages() {
        let (source, mut sync) = synchronizer(0);
        source.set(42);
        sync.tick();
        assert_eq!(sync.value(), 0);
        sync.tick();
        assert_eq!(sync.value(), 42);
    }
}
