//! Standard I/O transport.
//!
//! Reading stdin blocks, so a helper thread forwards each chunk through a
//! channel and [`StdioTransport::read`] only drains what has already arrived.

use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use log::{debug, error};
use thermolink_core::command::Transport;

const READ_CHUNK: usize = 256;

pub struct StdioTransport {
    receiver: Receiver<Vec<u8>>,
    /// Bytes received but not yet handed to the bridge
    pending: Vec<u8>,
    closed: bool,
}

impl StdioTransport {
    /// Spawns the stdin reader thread.
    pub fn spawn() -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        thread::Builder::new()
            .name("stdin".into())
            .spawn(move || {
                let mut stdin = io::stdin().lock();
                let mut chunk = [0u8; READ_CHUNK];
                loop {
                    match stdin.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(count) => {
                            if sender.send(chunk[..count].to_vec()).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                        Err(e) => {
                            error!("stdin read failed: {}", e);
                            break;
                        }
                    }
                }
                debug!("stdin closed");
            })?;
        Ok(Self::from_receiver(receiver))
    }

    fn from_receiver(receiver: Receiver<Vec<u8>>) -> Self {
        Self {
            receiver,
            pending: Vec::new(),
            closed: false,
        }
    }

    /// True once stdin reached EOF and every received byte was consumed.
    pub fn is_closed(&self) -> bool {
        self.closed && self.pending.is_empty()
    }
}

impl Transport for StdioTransport {
    fn read(&mut self, buffer: &mut [u8]) -> usize {
        while self.pending.len() < buffer.len() {
            match self.receiver.try_recv() {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }

        let count = self.pending.len().min(buffer.len());
        buffer[..count].copy_from_slice(&self.pending[..count]);
        self.pending.drain(..count);
        count
    }

    fn write(&mut self, data: &[u8]) {
        let mut stdout = io::stdout().lock();
        if let Err(e) = stdout.write_all(data).and_then(|()| stdout.flush()) {
            error!("stdout write failed: {}", e);
        }
    }
}
