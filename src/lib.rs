/*!
    on-chip probes for clocked designs, read back over a framed uart protocol

    a design registers probes on a [Registry] while it is built, then finalizes it into a [Scope]: a protocol engine serving the probes over a byte link. A host discovers the probes from a self describing configuration blob, selects one, arms it and reads its data back.

    every component is modeled at the clock edge level: engine halves of the probes are ticked with the scope, source halves (taps) are ticked in the timing domain of the probed values. Both halves only communicate through clock domain crossing primitives, see [cdc].

    features:

    - `std`: configuration decoding
    - `host` (default): async client over a serial port and an emulator for simulated designs
    - `device`: serve a scope over an `embedded-io-async` uart
*/
#![no_std]
#[cfg(feature = "std")]
extern crate std;
extern crate alloc;

mod command;

pub mod cdc;
pub mod probe;
pub mod registry;
pub mod config;
pub mod mux;
pub mod engine;
pub mod link;
pub mod sim;
#[cfg(feature = "device")]
pub mod device;
#[cfg(feature = "host")]
pub mod host;

pub use command::{Command, MAGIC, word_bytes, word_mask};
pub use registry::{Registry, Catalog};
pub use engine::{Scope, EngineConfig, ByteLink, State};
pub use config::{Config, Entry, ConfigError};
