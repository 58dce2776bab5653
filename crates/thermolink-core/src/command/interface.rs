use heapless::Vec;

use crate::config::OBJECT_SIZE;

/// Byte transport behind a command interface.
///
/// Both operations must be non-blocking: `read` returns whatever is
/// immediately available and 0 when nothing is pending.
pub trait Transport {
    /// Pulls up to `buffer.len()` bytes, returning how many were read.
    fn read(&mut self, buffer: &mut [u8]) -> usize;

    fn write(&mut self, data: &[u8]);
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn read(&mut self, buffer: &mut [u8]) -> usize {
        (**self).read(buffer)
    }

    fn write(&mut self, data: &[u8]) {
        (**self).write(data)
    }
}

/// A named transport plus its receive accumulation buffer.
///
/// The buffer holds the bytes of the frame currently being received and is
/// emptied after every complete frame or overrun.
pub struct Interface<T> {
    name: &'static str,
    transport: T,
    pub(super) buffer: Vec<u8, OBJECT_SIZE>,
}

impl<T: Transport> Interface<T> {
    pub fn new(name: &'static str, transport: T) -> Self {
        Self {
            name,
            transport,
            buffer: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Writes `data` straight to the transport, e.g. a telemetry message.
    pub fn write(&mut self, data: &[u8]) {
        self.transport.write(data);
    }

    /// Bytes of the partially received frame.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    pub(super) fn parts(&mut self) -> (&'static str, &mut T, &mut Vec<u8, OBJECT_SIZE>) {
        (self.name, &mut self.transport, &mut self.buffer)
    }
}
