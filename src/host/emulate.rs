use tokio::io::{AsyncRead, AsyncWrite, AsyncReadExt, AsyncWriteExt};
use std::{io, vec::Vec};
use log::*;

use crate::{
    link::{FifoLink, FIFO_DEPTH},
    sim::Design,
    };


/// design clock edges simulated between two polls of the stream
const STEPS: usize = 256;

/**
    serve a simulated design over an async byte stream

    requests read from the stream are fed to the design's link and answers are written back as they come. Returns when the other end closes the stream.
*/
pub async fn emulate<D: Design, S: AsyncRead + AsyncWrite + Unpin>(mut design: D, mut stream: S) -> io::Result<()> {
    let mut link = FifoLink::<FIFO_DEPTH>::new();
    let mut buffer = [0u8; FIFO_DEPTH];
    let mut answers = Vec::with_capacity(FIFO_DEPTH);
    loop {
        let space = link.space();
        tokio::select! {
            biased;
            received = stream.read(&mut buffer[.. space]), if space > 0 => {
                let size = received?;
                if size == 0 {
                    debug!("host closed the stream");
                    return Ok(());
                }
                link.push_slice(&buffer[.. size]);
            },
            // keep the design running while the host is silent
            _ = tokio::task::yield_now() => {},
        }
        for _ in 0 .. STEPS {
            design.step(&mut link);
        }
        answers.extend(core::iter::from_fn(|| link.pop()));
        if !answers.is_empty() {
            stream.write_all(&answers).await?;
            stream.flush().await?;
            answers.clear();
        }
    }
}
