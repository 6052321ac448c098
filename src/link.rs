use heapless::Deque;

use crate::engine::ByteLink;


/// default depth of each direction of a [FifoLink], like a small uart fifo
pub const FIFO_DEPTH: usize = 64;

/**
    in-memory link with a bounded fifo in each direction

    the host side pushes requests and pops answers, the engine side sees it as a [ByteLink]. A full answer fifo stalls the engine until the host pops.
*/
#[derive(Debug, Default)]
pub struct FifoLink<const N: usize = FIFO_DEPTH> {
    request: Deque<u8, N>,
    answer: Deque<u8, N>,
}
impl<const N: usize> FifoLink<N> {
    pub fn new() -> Self {
        Self {request: Deque::new(), answer: Deque::new()}
    }
    /// queue a byte for the engine, return false if the fifo is full
    pub fn push(&mut self, byte: u8) -> bool {
        self.request.push_back(byte).is_ok()
    }
    /// queue as many bytes as possible, return how many were queued
    pub fn push_slice(&mut self, bytes: &[u8]) -> usize {
        bytes.iter().take_while(|&&byte| self.push(byte)).count()
    }
    /// next byte answered by the engine
    pub fn pop(&mut self) -> Option<u8> {
        self.answer.pop_front()
    }
    /// room left for requests
    pub fn space(&self) -> usize {
        N - self.request.len()
    }
    /// true if nothing is queued in either direction
    pub fn is_idle(&self) -> bool {
        self.request.is_empty() && self.answer.is_empty()
    }
}
impl<const N: usize> ByteLink for FifoLink<N> {
    fn recv(&mut self) -> Option<u8> {
        self.request.pop_front()
    }
    fn send(&mut self, byte: u8) -> bool {
        self.answer.push_back(byte).is_ok()
    }
}
