//! Development server.
//!
//! - files are cooked on request by a [`DevKitchen`](jsenv_bundler::dev::DevKitchen)
//! - conditional GET with `ETag` and `Last-Modified`
//! - reload events pushed over Server-Sent Events
//! - an HTML error page for failed navigations

pub mod error_overlay;
pub mod server;
pub mod state;
pub mod watcher;

pub use server::{DevServer, EVENTS_PATH, router};
pub use state::{DevServerState, SharedState};
pub use watcher::{FileChange, FileWatcher};

use serde::{Deserialize, Serialize};

/// Messages sent to autoreload clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DevEvent {
    /// First message of every event stream.
    Connected,

    /// Request paths whose content changed. A page reloads when it
    /// loaded one of them.
    Reload { urls: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json() {
        let reload = DevEvent::Reload {
            urls: vec!["/main.js".into()],
        };
        assert_eq!(
            serde_json::to_string(&reload).unwrap(),
            r#"{"type":"reload","urls":["/main.js"]}"#
        );
        assert_eq!(
            serde_json::to_string(&DevEvent::Connected).unwrap(),
            r#"{"type":"connected"}"#
        );
    }
}
