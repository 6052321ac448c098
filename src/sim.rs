/*!
    helpers to clock designs made of several timing domains

    a [Scheduler] orders the clock edges of domains with unrelated periods and phases. A [Design] is anything that advances one edge at a time while serving a scope over a [ByteLink], like the bundled [Demo].
*/

use alloc::vec::Vec;
use log::*;

use crate::{
    engine::{ByteLink, Scope, EngineConfig},
    registry::Registry,
    probe::{SingleTap, BufferTap, InstantTap},
    config::ConfigError,
    };


/// handle on a clock domain of a [Scheduler]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DomainId(usize);

#[derive(Clone, Debug)]
struct ClockDomain {
    period: u64,
    next: u64,
}

/**
    deterministic ordering of clock edges

    iterating yields the domain of each successive edge. Simultaneous edges are yielded in the order domains were added.
*/
#[derive(Clone, Debug, Default)]
pub struct Scheduler {
    domains: Vec<ClockDomain>,
    now: u64,
}
impl Scheduler {
    pub fn new() -> Self {Self::default()}
    /// add a domain whose first edge happens at `phase`, then every `period` time units
    pub fn add(&mut self, period: u64, phase: u64) -> DomainId {
        assert!(period > 0, "clock period must be positive");
        self.domains.push(ClockDomain {period, next: phase});
        DomainId(self.domains.len() - 1)
    }
    /// time of the last edge yielded
    pub fn now(&self) -> u64 {self.now}
    pub fn period(&self, domain: DomainId) -> u64 {self.domains[domain.0].period}
}
impl Iterator for Scheduler {
    type Item = DomainId;
    fn next(&mut self) -> Option<DomainId> {
        let (index, domain) = self.domains.iter_mut()
            .enumerate()
            .min_by_key(|(index, domain)| (domain.next, *index))?;
        self.now = domain.next;
        domain.next += domain.period;
        Some(DomainId(index))
    }
}


/// a clocked design serving its probes over a byte link
pub trait Design {
    /// advance to the next clock edge of any domain of the design
    fn step(&mut self, link: &mut dyn ByteLink);
}


/**
    small design exercising every kind of probe

    - group `demo`: a toggling bit and a 32 bit counter, both single captures in the main domain
    - group `trace`: a 16 bit history of the counter, triggered each time its low byte wraps
    - group `cdc`: an 8 bit counter of a foreign domain running at a different rate, probed continuously

    the engine is clocked with the main domain
*/
#[derive(Debug)]
pub struct Demo {
    clocks: Scheduler,
    main: DomainId,
    foreign: DomainId,
    scope: Option<Scope>,
    counter: u32,
    foreign_counter: u8,
    toggle: SingleTap,
    count: SingleTap,
    history: BufferTap,
    fast: InstantTap,
}
impl Demo {
    /// build the demo, optionally keeping only probes of some groups
    pub fn new(config: EngineConfig, groups: Option<&[&str]>) -> Result<Self, ConfigError> {
        let mut registry = Registry::new();
        if let Some(groups) = groups {
            registry.set_filter(groups.iter().copied());
        }
        let toggle = registry.single("demo", "toggle", 1);
        let count = registry.single("demo", "counter", 32);
        let history = registry.buffer("trace", "counter", 16, 64);
        let fast = registry.instant("cdc", "foreign", 8);
        let scope = registry.finalize(config)?;

        let mut clocks = Scheduler::new();
        let main = clocks.add(10, 0);
        let foreign = clocks.add(7, 3);
        info!("demo design with {} probes", scope.as_ref().map_or(0, |scope| scope.catalog().len()));
        Ok(Self {
            clocks, main, foreign, scope,
            counter: 0,
            foreign_counter: 0,
            toggle, count, history, fast,
        })
    }
    pub fn scope(&self) -> Option<&Scope> {self.scope.as_ref()}
    /// current value of the main counter
    pub fn counter(&self) -> u32 {self.counter}
}
impl Design for Demo {
    fn step(&mut self, link: &mut dyn ByteLink) {
        let Some(domain) = self.clocks.next()
            else {return};
        if domain == self.main {
            if let Some(scope) = &mut self.scope {
                scope.tick(link);
            }
            let counter = u64::from(self.counter);
            self.toggle.tick((counter >> 4) & 1);
            self.count.tick(counter);
            self.history.tick(counter, counter & 0xff == 0);
            self.counter = self.counter.wrapping_add(1);
        }
        else if domain == self.foreign {
            self.foreign_counter = self.foreign_counter.wrapping_add(1);
            self.fast.update(u64::from(self.foreign_counter));
        }
    }
}
