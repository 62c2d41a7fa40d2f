use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::link::{Link, LinkProvider};

/// Links keyed by device id.
///
/// Acts as the [`LinkProvider`] of the links it holds: a link that
/// disconnects removes itself, unless a newer link for the same device has
/// already replaced it.
#[derive(Default)]
pub struct LinkRegistry {
    links: Mutex<HashMap<String, Link>>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `link` under its device id, returning the link it replaces.
    ///
    /// The replaced link is not disconnected here.
    pub fn register(&self, link: Link) -> Option<Link> {
        let device_id = link.peer().device_id.clone();
        let replaced = self.lock().insert(device_id.clone(), link);
        if replaced.is_some() {
            info!(%device_id, "replacing existing link");
        } else {
            debug!(%device_id, "link registered");
        }
        replaced
    }

    pub fn get(&self, device_id: &str) -> Option<Link> {
        self.lock().get(device_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Device ids of all tracked links, sorted.
    pub fn device_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Disconnect every tracked link and forget them.
    pub fn disconnect_all(&self) {
        let links: Vec<Link> = self.lock().drain().map(|(_, link)| link).collect();
        for link in links {
            link.disconnect();
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Link>> {
        self.links.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LinkProvider for LinkRegistry {
    fn on_link_disconnected(&self, link: &Link, device_id: &str, address: &str) {
        let mut links = self.lock();
        match links.get(device_id) {
            Some(current) if current.same_link(link) => {
                links.remove(device_id);
                info!(%device_id, %address, "link removed");
            }
            Some(_) => debug!(%device_id, "stale link disconnected, keeping replacement"),
            None => debug!(%device_id, "disconnected link was not registered"),
        }
    }
}
