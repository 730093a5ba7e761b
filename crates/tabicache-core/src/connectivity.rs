//! Network connectivity signal.
//!
//! Core code never subscribes to connectivity events. Each decision point
//! polls [`Connectivity::is_online`] once at entry; the embedding app keeps
//! the [`NetworkMonitor`] current from whatever events its platform offers.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkStatus {
    Online,
    Offline,
}

/// Settable online/offline flag.
#[derive(Debug)]
pub struct NetworkMonitor {
    online: AtomicBool,
}

impl NetworkMonitor {
    pub fn new(status: NetworkStatus) -> Self {
        Self {
            online: AtomicBool::new(status == NetworkStatus::Online),
        }
    }

    pub fn set_status(&self, status: NetworkStatus) {
        let online = status == NetworkStatus::Online;
        if self.online.swap(online, Ordering::SeqCst) != online {
            info!(status = ?status, "Network status changed");
        }
    }

    pub fn status(&self) -> NetworkStatus {
        if self.is_online() {
            NetworkStatus::Online
        } else {
            NetworkStatus::Offline
        }
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(NetworkStatus::Online)
    }
}

impl Connectivity for NetworkMonitor {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_tracks_status() {
        let monitor = NetworkMonitor::default();
        assert!(monitor.is_online());
        monitor.set_status(NetworkStatus::Offline);
        assert!(!monitor.is_online());
        assert_eq!(monitor.status(), NetworkStatus::Offline);
        monitor.set_status(NetworkStatus::Online);
        assert_eq!(monitor.status(), NetworkStatus::Online);
    }
}
