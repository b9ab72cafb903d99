//! Whether outbound network access is currently available.

use std::sync::atomic::{AtomicBool, Ordering};

pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Connectivity flag set by whoever observes the network (or by tests).
#[derive(Debug)]
pub struct StaticConnectivity(AtomicBool);

impl StaticConnectivity {
    pub fn new(online: bool) -> Self {
        StaticConnectivity(AtomicBool::new(online))
    }

    pub fn set_online(&self, online: bool) {
        self.0.store(online, Ordering::SeqCst);
    }
}

impl Default for StaticConnectivity {
    fn default() -> Self {
        StaticConnectivity::new(true)
    }
}

impl Connectivity for StaticConnectivity {
    fn is_online(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
