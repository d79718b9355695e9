//! The live fleet: one entry per instance key, holding only the current
//! incarnation's handle.
//!
//! Respawns replace the entry for their key, and exits only remove the entry
//! they own, so broadcasts never reach a superseded process.

use std::collections::BTreeMap;
use std::io;

use crate::process::{InstanceKey, LiveHandle};
use crate::signal::{Signal, SignalSink};

#[derive(Debug, Default)]
pub struct Registry {
    live: BTreeMap<InstanceKey, LiveHandle>,
}

/// Result of delivering a broadcast to one instance.
#[derive(Debug)]
pub struct Delivery {
    pub key: InstanceKey,
    pub handle: LiveHandle,
    pub result: io::Result<()>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handle` as the live process for `key`, returning the entry it replaced.
    pub fn register(&mut self, key: InstanceKey, handle: LiveHandle) -> Option<LiveHandle> {
        self.live.insert(key, handle)
    }

    /// Removes `key` if its current entry belongs to `incarnation`.
    pub fn unregister(&mut self, key: &InstanceKey, incarnation: u64) -> Option<LiveHandle> {
        match self.live.get(key) {
            Some(handle) if handle.incarnation == incarnation => self.live.remove(key),
            _ => None,
        }
    }

    pub fn get(&self, key: &InstanceKey) -> Option<&LiveHandle> {
        self.live.get(key)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Sends `signal` to every instance live right now, once each.
    pub fn broadcast(&self, signal: Signal, sink: &dyn SignalSink) -> Vec<Delivery> {
        self.live
            .iter()
            .map(|(key, handle)| Delivery {
                key: key.clone(),
                handle: *handle,
                result: sink.deliver(handle.pid, signal),
            })
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;

    fn handle(pid: u32, incarnation: u64) -> LiveHandle {
        LiveHandle { pid, incarnation }
    }

    #[test]
    fn broadcast_reaches_each_live_instance_once() {
        let mut registry = Registry::new();
        registry.register(InstanceKey::new("web", 1), handle(101, 1));
        registry.register(InstanceKey::new("web", 2), handle(102, 1));
        registry.register(InstanceKey::new("api", 1), handle(201, 1));

        let sink = RecordingSink::default();
        let delivered = registry.broadcast(Signal::Term, &sink);
        assert_eq!(delivered.len(), 3);
        assert!(delivered.iter().all(|d| d.result.is_ok()));

        registry.register(InstanceKey::new("worker", 1), handle(301, 1));
        let mut sent = sink.sent.borrow().clone();
        sent.sort();
        assert_eq!(
            sent,
            vec![(101, Signal::Term), (102, Signal::Term), (201, Signal::Term)]
        );
    }

    #[test]
    fn respawn_replaces_previous_incarnation() {
        let mut registry = Registry::new();
        let key = InstanceKey::new("web", 1);
        registry.register(key.clone(), handle(10, 1));
        let replaced = registry.register(key.clone(), handle(11, 2));
        assert_eq!(replaced, Some(handle(10, 1)));
        assert_eq!(registry.len(), 1);

        let sink = RecordingSink::default();
        registry.broadcast(Signal::Int, &sink);
        assert_eq!(*sink.sent.borrow(), vec![(11, Signal::Int)]);
    }

    #[test]
    fn stale_exit_does_not_evict_newer_incarnation() {
        let mut registry = Registry::new();
        let key = InstanceKey::new("web", 1);
        registry.register(key.clone(), handle(11, 2));
        assert_eq!(registry.unregister(&key, 1), None);
        assert_eq!(registry.get(&key), Some(&handle(11, 2)));
        assert_eq!(registry.unregister(&key, 2), Some(handle(11, 2)));
        assert!(registry.is_empty());
    }
}
