/*!
    serve a scope from software over an async uart

    the engine is clocked once per loop iteration, so [crate::EngineConfig::clock_hz] should be set to the expected iteration rate for the idle timeout to last as intended. Probe taps are meant to be ticked by other tasks or interrupts, they only share atomics with the scope.
*/

use core::{
    future::poll_fn,
    task::Poll,
    };
use embedded_io_async::{Read, Write, ReadReady};
use log::*;

use crate::engine::{ByteLink, Scope};


/// holds at most one byte in each direction between two loop iterations
#[derive(Debug, Default)]
struct BusLink {
    received: Option<u8>,
    sent: Option<u8>,
}
impl ByteLink for BusLink {
    fn recv(&mut self) -> Option<u8> {
        self.received.take()
    }
    fn send(&mut self, byte: u8) -> bool {
        if self.sent.is_some()
            {return false}
        self.sent = Some(byte);
        true
    }
}

/// run the scope on the given bus, only returns on bus failure
pub async fn serve<B: Read + Write + ReadReady>(scope: &mut Scope, bus: &mut B) -> Result<(), B::Error> {
    info!("serving {} probes", scope.catalog().len());
    let mut link = BusLink::default();
    loop {
        if link.received.is_none() && bus.read_ready()? {
            let mut byte = [0];
            if bus.read(&mut byte).await? == 1 {
                link.received = Some(byte[0]);
            }
        }
        scope.tick(&mut link);
        if let Some(byte) = link.sent.take() {
            bus.write_all(&[byte]).await?;
        }
        // leave the executor to the tasks ticking the probes
        yield_now().await;
    }
}

async fn yield_now() {
    let mut yielded = false;
    poll_fn(|context| {
        if yielded
            {return Poll::Ready(())}
        yielded = true;
        context.waker().wake_by_ref();
        Poll::Pending
    }).await
}
