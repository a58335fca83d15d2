//! State shared by the request handlers and the watcher loop.

use jsenv_bundler::dev::DevKitchen;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

use crate::dev::DevEvent;

/// Event stream senders by client id.
pub type ClientRegistry = RwLock<HashMap<usize, mpsc::Sender<String>>>;

pub struct DevServerState {
    kitchen: DevKitchen,
    clients: ClientRegistry,
    next_client_id: AtomicUsize,
}

impl DevServerState {
    pub fn new(kitchen: DevKitchen) -> Self {
        Self {
            kitchen,
            clients: RwLock::new(HashMap::new()),
            next_client_id: AtomicUsize::new(0),
        }
    }

    pub fn kitchen(&self) -> &DevKitchen {
        &self.kitchen
    }

    /// Register an event stream. Messages are JSON encoded [`DevEvent`]s.
    pub fn register_client(&self) -> (usize, mpsc::Receiver<String>) {
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(100);
        self.clients.write().insert(id, tx);
        (id, rx)
    }

    pub fn unregister_client(&self, id: usize) {
        self.clients.write().remove(&id);
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Send `event` to every client, dropping those that went away.
    pub async fn broadcast(&self, event: &DevEvent) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!(error = %err, "cannot encode dev event");
                return;
            }
        };
        // Senders are cloned so that no lock is held across an await.
        let clients: Vec<(usize, mpsc::Sender<String>)> = self
            .clients
            .read()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut gone = Vec::new();
        for (id, tx) in clients {
            if tx.send(json.clone()).await.is_err() {
                gone.push(id);
            }
        }
        for id in gone {
            self.unregister_client(id);
        }
    }

    /// Invalidate what depends on `path` and build the reload event for it.
    /// `None` when the file is not part of the served graph.
    pub fn file_changed(&self, path: &Path) -> Option<DevEvent> {
        let affected = self.kitchen.file_changed(path);
        if affected.is_empty() {
            return None;
        }
        let urls = self.kitchen.request_paths(&affected);
        tracing::debug!(path = %path.display(), urls = ?urls, "reload");
        Some(DevEvent::Reload { urls })
    }
}

pub type SharedState = Arc<DevServerState>;

#[cfg(test)]
mod tests {
    use super::*;
    use jsenv_bundler::dev::DevOptions;
    use tempfile::TempDir;

    fn state(dir: &TempDir) -> DevServerState {
        let kitchen = DevKitchen::new(DevOptions::new(dir.path()).node_esm_resolution(false)).unwrap();
        DevServerState::new(kitchen)
    }

    #[tokio::test]
    async fn test_client_registration() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let (id1, _rx1) = state.register_client();
        let (id2, _rx2) = state.register_client();
        assert_ne!(id1, id2);
        assert_eq!(state.client_count(), 2);

        state.unregister_client(id1);
        assert_eq!(state.client_count(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_drops_closed_clients() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let (_id, mut rx) = state.register_client();
        let (_gone, gone_rx) = state.register_client();
        drop(gone_rx);

        state
            .broadcast(&DevEvent::Reload {
                urls: vec!["/main.js".into()],
            })
            .await;

        assert_eq!(rx.recv().await.unwrap(), r#"{"type":"reload","urls":["/main.js"]}"#);
        assert_eq!(state.client_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_file_produces_no_event() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        assert_eq!(state.file_changed(&dir.path().join("unrelated.js")), None);
    }
}
