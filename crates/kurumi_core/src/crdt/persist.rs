//! Ordered background persistence.
//!
//! [`Persister`] owns a writer thread that saves document states to a
//! [`DocumentStorage`] in submission order. Consecutive queued states are
//! coalesced so only the newest one is written. Failures are logged and never
//! reach the caller.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use super::storage::DocumentStorage;

enum Command {
    Write(Vec<u8>),
    Flush(Sender<()>),
}

/// Fire-and-forget writer for whole-document saves.
pub struct Persister {
    tx: Option<Sender<Command>>,
    handle: Option<JoinHandle<()>>,
}

impl Persister {
    /// Spawn the writer thread for the document stored under `key`.
    pub fn spawn(storage: Arc<dyn DocumentStorage>, key: String) -> Self {
        let (tx, rx) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("kurumi-persist".to_string())
            .spawn(move || run(storage, key, rx));

        match handle {
            Ok(handle) => Self {
                tx: Some(tx),
                handle: Some(handle),
            },
            Err(e) => {
                log::error!("Failed to start persistence thread: {}", e);
                Self {
                    tx: None,
                    handle: None,
                }
            }
        }
    }

    /// Queue a state for writing and return immediately.
    pub fn submit(&self, state: Vec<u8>) {
        let Some(tx) = &self.tx else {
            log::error!("Persistence thread unavailable, dropping save");
            return;
        };
        if tx.send(Command::Write(state)).is_err() {
            log::error!("Persistence thread stopped, dropping save");
        }
    }

    /// Block until every previously submitted state has been written.
    pub fn flush(&self) {
        let Some(tx) = &self.tx else {
            return;
        };
        let (ack_tx, ack_rx) = mpsc::channel();
        if tx.send(Command::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }
}

impl Drop for Persister {
    fn drop(&mut self) {
        // Closing the channel lets the thread drain the queue and exit.
        self.tx.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::error!("Persistence thread panicked");
        }
    }
}

fn run(storage: Arc<dyn DocumentStorage>, key: String, rx: Receiver<Command>) {
    let write = |state: &[u8]| {
        if let Err(e) = storage.save_doc(&key, state) {
            log::error!("Failed to persist document '{}': {}", key, e);
        } else {
            log::debug!("Persisted document '{}' ({} bytes)", key, state.len());
        }
    };

    while let Ok(command) = rx.recv() {
        match command {
            Command::Write(mut latest) => {
                let mut pending_ack = None;
                // Coalesce queued writes, stopping at the first flush request.
                while let Ok(next) = rx.try_recv() {
                    match next {
                        Command::Write(state) => latest = state,
                        Command::Flush(ack) => {
                            pending_ack = Some(ack);
                            break;
                        }
                    }
                }
                write(&latest);
                if let Some(ack) = pending_ack {
                    let _ = ack.send(());
                }
            }
            Command::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}
