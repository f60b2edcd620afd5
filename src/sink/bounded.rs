use super::{ByteStream, Packet, SinkError};
use crossbeam::channel::{self, SendTimeoutError, Sender, TrySendError};
use log::{debug, info, warn};
use std::io;
use std::thread;
use std::time::Duration;

/// Puts a bounded queue and a writer thread in front of a stream whose
/// writes may block, so callers never wait longer than `timeout`.
///
/// A zero timeout means the caller never waits at all: a full queue drops the
/// packet immediately.
pub struct BoundedWriter {
    name: String,
    tx: Sender<Packet>,
    timeout: Duration,
}

impl BoundedWriter {
    pub fn spawn<S>(name: &str, mut stream: S, depth: usize, timeout: Duration) -> io::Result<Self>
    where
        S: ByteStream + 'static,
    {
        let (tx, rx) = channel::bounded::<Packet>(depth.max(1));
        let thread_name = format!("{}-writer", name);
        let log_name = name.to_string();

        thread::Builder::new().name(thread_name).spawn(move || {
            info!("{} writer thread started", log_name);
            for packet in rx {
                if let Err(e) = stream.write_all(packet.as_slice()) {
                    warn!("{} write failed: {}", log_name, e);
                }
            }
            debug!("{} writer thread stopping", log_name);
        })?;

        Ok(Self {
            name: name.to_string(),
            tx,
            timeout,
        })
    }

    /// Packets waiting for the writer thread.
    pub fn queued(&self) -> usize {
        self.tx.len()
    }
}

impl ByteStream for BoundedWriter {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        let packet = Packet::from_slice(bytes);
        if self.timeout.is_zero() {
            return self.tx.try_send(packet).map_err(|e| match e {
                TrySendError::Full(_) => SinkError::WriteFailed("buffer full".into()),
                TrySendError::Disconnected(_) => SinkError::NotConnected,
            });
        }

        self.tx
            .send_timeout(packet, self.timeout)
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => {
                    debug!("{} write timed out after {:?}", self.name, self.timeout);
                    SinkError::WriteFailed("write timed out".into())
                }
                SendTimeoutError::Disconnected(_) => SinkError::NotConnected,
            })
    }
}
