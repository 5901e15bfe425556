//! Ordered background writer.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::StorageError;
use crate::store::KeyValueStore;

enum Command {
    Put {
        namespace: String,
        key: String,
        value: String,
    },
    Flush(oneshot::Sender<()>),
}

/// Fire-and-forget persistence.
///
/// `write` never blocks and never fails the caller; writes are applied by a
/// single task in submission order, and failures are logged. `flush` waits
/// until everything submitted before it has been attempted.
#[derive(Debug, Clone)]
pub struct PersistWriter {
    tx: mpsc::UnboundedSender<Command>,
}

impl PersistWriter {
    /// Spawn the writer task on the current tokio runtime.
    pub fn spawn(store: Arc<dyn KeyValueStore>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();

        let handle = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Put {
                        namespace,
                        key,
                        value,
                    } => {
                        if let Err(err) = store.put(&namespace, &key, &value).await {
                            tracing::error!(
                                namespace = %namespace,
                                key = %key,
                                error = %err,
                                "persist write failed; in-memory state kept"
                            );
                        }
                    }
                    Command::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
            tracing::debug!("persistence writer stopped");
        });

        (Self { tx }, handle)
    }

    /// Queue a write of `value` under `namespace/key`.
    pub fn write(&self, namespace: &str, key: &str, value: String) {
        let command = Command::Put {
            namespace: namespace.to_string(),
            key: key.to_string(),
            value,
        };
        if self.tx.send(command).is_err() {
            tracing::warn!(namespace, key, "persistence writer closed; write dropped");
        }
    }

    /// Wait for every write submitted so far.
    pub async fn flush(&self) -> Result<(), StorageError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Command::Flush(ack))
            .map_err(|_| StorageError::Closed)?;
        done.await.map_err(|_| StorageError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryKeyValueStore;

    #[tokio::test]
    async fn writes_apply_in_order() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let (writer, _handle) = PersistWriter::spawn(store.clone());

        for i in 0..20 {
            writer.write("cart", "state", i.to_string());
        }
        writer.flush().await.unwrap();

        assert_eq!(store.get("cart", "state").await.unwrap().as_deref(), Some("19"));
    }

    #[tokio::test]
    async fn failed_writes_do_not_stop_the_writer() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let (writer, _handle) = PersistWriter::spawn(store.clone());

        store.set_fail_writes(true);
        writer.write("cache", "state", "lost".to_string());
        writer.flush().await.unwrap();
        store.set_fail_writes(false);
        writer.write("cache", "state", "kept".to_string());
        writer.flush().await.unwrap();

        assert_eq!(store.get("cache", "state").await.unwrap().as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn dropped_writer_task_reports_closed() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let (writer, handle) = PersistWriter::spawn(store);
        handle.abort();
        let _ = handle.await;
        assert!(matches!(writer.flush().await, Err(StorageError::Closed)));
    }
}
