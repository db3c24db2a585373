//! Pooled, zero-on-drop byte buffers for inbound datagrams and record
//! assembly.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, OnceLock};

use zeroize::Zeroize;

/// Size of the inbound datagram buffers. A DTLS record cannot exceed the
/// datagram size; 8 KiB leaves headroom over any sane MTU.
pub const INBOUND_BUFFER_SIZE: usize = 8192;

static POOL: OnceLock<Mutex<VecDeque<Buf>>> = OnceLock::new();

fn pool() -> &'static Mutex<VecDeque<Buf>> {
    POOL.get_or_init(|| Mutex::new(VecDeque::new()))
}

/// Take a buffer from the process-wide pool, allocating if none is free.
pub fn pop() -> Buf {
    let mut free = pool().lock().expect("buffer pool poisoned");
    free.pop_front().unwrap_or_else(|| {
        let mut b = Buf::new();
        b.0.reserve(INBOUND_BUFFER_SIZE);
        b
    })
}

/// Return a buffer to the pool. Contents are wiped before reuse.
pub fn push(mut buffer: Buf) {
    buffer.0.zeroize();
    buffer.0.clear();
    let mut free = pool().lock().expect("buffer pool poisoned");
    // Keep the pool bounded; a connection teardown can return many buffers.
    if free.len() < 64 {
        free.push_back(buffer);
    }
}

/// Growable byte buffer that wipes its contents on drop.
#[derive(Default)]
pub struct Buf(Vec<u8>);

impl Buf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn extend_from_slice(&mut self, other: &[u8]) {
        self.0.extend_from_slice(other);
    }

    pub fn resize(&mut self, len: usize, value: u8) {
        self.0.resize(len, value);
    }
}

impl Drop for Buf {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl Deref for Buf {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Buf {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl AsRef<[u8]> for Buf {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsMut<[u8]> for Buf {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl fmt::Debug for Buf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buf").field("len", &self.0.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_recycles() {
        let mut a = pop();
        a.extend_from_slice(b"secret");
        push(a);

        let b = pop();
        // Returned buffers are wiped and empty.
        assert!(b.is_empty());
    }
}
