//! Service observer
//!
//! The observer keeps one record per service name. A record remembers the
//! latest publisher together with the policy and match id it was published
//! with, and the ordered list of subscribers interested in the name.
//!
//! Publication and subscription may happen in either order. Subscribing to a
//! name that already has a visible publisher fires the callback right away;
//! otherwise the subscriber stays pending until a publish lets it through the
//! visibility gate:
//!
//! ```text
//! READY  <=>  policy != Private || subscriber.match_id == publisher.match_id
//! ```
//!
//! The gate is evaluated and the subscriber list is updated under the record
//! lock, while callbacks always run after the lock is released. A callback
//! may therefore subscribe, publish or remove records itself.

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::Mutex;

use hdf_api::core::types::{MatchId, ServicePolicy};
use hdf_api::error::{check_name, not_found, Result};
use hdf_api::{string_hash_key, LockedList};

use crate::device_object::DeviceObject;

/// Callback fired with the publisher once a subscriber becomes ready
pub type SubscriberCallback = Arc<dyn Fn(&Arc<DeviceObject>) + Send + Sync>;

/// Identifier of a subscription, unique inside one observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

/// Whether a subscriber has been handed a publisher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Pending,
    Ready,
}

struct Subscriber {
    id: SubscriberId,
    match_id: MatchId,
    state: SubscriberState,
    callback: SubscriberCallback,
}

struct RecordState {
    publisher: Option<Arc<DeviceObject>>,
    match_id: MatchId,
    policy: ServicePolicy,
    subscribers: Vec<Subscriber>,
    /// Set once the record is unlinked from the observer
    removed: bool,
}

impl RecordState {
    /// Publisher `match_id` may see, if any
    fn visible_publisher(&self, match_id: MatchId) -> Option<Arc<DeviceObject>> {
        self.publisher
            .as_ref()
            .filter(|_| self.policy.is_visible_to(self.match_id, match_id))
            .cloned()
    }
}

struct ObserverRecord {
    key: u32,
    name: String,
    state: Mutex<RecordState>,
}

impl ObserverRecord {
    fn new(key: u32, name: &str) -> Self {
        Self {
            key,
            name: name.to_string(),
            state: Mutex::new(RecordState {
                publisher: None,
                match_id: 0,
                policy: ServicePolicy::Public,
                subscribers: Vec::new(),
                removed: false,
            }),
        }
    }

    fn is(&self, key: u32, name: &str) -> bool {
        self.key == key && self.name == name
    }
}

/// Publish/subscribe rendezvous for named services
pub struct ServiceObserver {
    records: LockedList<Arc<ObserverRecord>>,
    next_id: AtomicU64,
}

impl ServiceObserver {
    pub fn new() -> Self {
        Self {
            records: LockedList::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn find(&self, name: &str) -> Option<Arc<ObserverRecord>> {
        let key = string_hash_key(name);
        self.records.find_map(|record| record.is(key, name).then(|| record.clone()))
    }

    fn find_or_create(&self, name: &str) -> Arc<ObserverRecord> {
        let key = string_hash_key(name);
        self.records.with(|records| {
            if let Some(record) = records.iter().find(|record| record.is(key, name)) {
                return record.clone();
            }
            let record = Arc::new(ObserverRecord::new(key, name));
            records.push(record.clone());
            record
        })
    }

    /// Run `update` on the live record of `name`, creating it if needed.
    ///
    /// A record found here may be unlinked before its lock is taken; such a
    /// record is skipped and the lookup repeated.
    fn with_record<R>(&self, name: &str, mut update: impl FnMut(&mut RecordState) -> R) -> R {
        loop {
            let record = self.find_or_create(name);
            if let Some(result) = Self::update_live(&record, &mut update) {
                return result;
            }
            log::debug!("observer: record {} removed concurrently, retrying", name);
        }
    }

    fn update_live<R>(record: &ObserverRecord, update: &mut impl FnMut(&mut RecordState) -> R) -> Option<R> {
        let mut state = record.state.lock();
        if state.removed {
            return None;
        }
        Some(update(&mut state))
    }

    /// Subscribe to `name` on behalf of a node identified by `match_id`.
    ///
    /// The subscriber is appended in every case. When a visible publisher is
    /// already present, `callback` runs before this function returns.
    pub fn subscribe(&self, name: &str, match_id: MatchId, callback: SubscriberCallback) -> Result<SubscriberId> {
        check_name("service", name)?;
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let ready = self.with_record(name, |state| {
            let publisher = state.visible_publisher(match_id);
            state.subscribers.push(Subscriber {
                id,
                match_id,
                state: if publisher.is_some() {
                    SubscriberState::Ready
                } else {
                    SubscriberState::Pending
                },
                callback: callback.clone(),
            });
            publisher
        });

        match ready {
            Some(publisher) => {
                log::debug!("observer: {} ready on subscribe", name);
                callback(&publisher);
            }
            None => log::debug!("observer: {} pending", name),
        }
        Ok(id)
    }

    /// Record `object` as the publisher of `name` and notify the subscribers
    /// it is visible to, in subscription order.
    ///
    /// Subscribers that were already ready are notified again with the new
    /// publisher. Those the new publication hides from fall back to pending.
    pub fn publish(&self, name: &str, match_id: MatchId, policy: ServicePolicy, object: Arc<DeviceObject>) -> Result<()> {
        check_name("service", name)?;

        let callbacks: Vec<SubscriberCallback> = self.with_record(name, |state| {
            state.publisher = Some(object.clone());
            state.match_id = match_id;
            state.policy = policy;
            let mut callbacks = Vec::new();
            for subscriber in state.subscribers.iter_mut() {
                if policy.is_visible_to(match_id, subscriber.match_id) {
                    subscriber.state = SubscriberState::Ready;
                    callbacks.push(subscriber.callback.clone());
                } else {
                    subscriber.state = SubscriberState::Pending;
                }
            }
            callbacks
        });

        log::debug!("observer: {} published ({}), {} to notify", name, policy, callbacks.len());
        for callback in callbacks {
            callback(&object);
        }
        Ok(())
    }

    /// Drop a subscription
    pub fn unsubscribe(&self, name: &str, id: SubscriberId) -> Result<()> {
        let record = self.find(name).ok_or_else(|| not_found(name))?;
        let mut state = record.state.lock();
        let index = state
            .subscribers
            .iter()
            .position(|subscriber| subscriber.id == id)
            .ok_or_else(|| not_found(name))?;
        state.subscribers.remove(index);
        Ok(())
    }

    /// Forget `name` together with its publisher and every subscriber
    pub fn remove_record(&self, name: &str) {
        let key = string_hash_key(name);
        if let Some(record) = self.records.remove_first(|record| record.is(key, name)) {
            let mut state = record.state.lock();
            state.removed = true;
            state.publisher = None;
            state.subscribers.clear();
            log::debug!("observer: record {} removed", name);
        }
    }

    /// Forget `name` only while `object` is its publisher
    pub fn remove_publisher(&self, name: &str, object: &Arc<DeviceObject>) -> bool {
        let key = string_hash_key(name);
        // Record locks nest inside the record list lock, never the reverse
        let removed = self.records.remove_first(|record| {
            record.is(key, name)
                && record
                    .state
                    .lock()
                    .publisher
                    .as_ref()
                    .is_some_and(|publisher| Arc::ptr_eq(publisher, object))
        });
        let Some(record) = removed else {
            return false;
        };
        let mut state = record.state.lock();
        state.removed = true;
        state.publisher = None;
        state.subscribers.clear();
        true
    }

    /// Current publisher of `name`, regardless of visibility
    pub fn publisher(&self, name: &str) -> Option<Arc<DeviceObject>> {
        self.find(name)?.state.lock().publisher.clone()
    }

    /// State of one subscription
    pub fn subscriber_state(&self, name: &str, id: SubscriberId) -> Option<SubscriberState> {
        let record = self.find(name)?;
        let state = record.state.lock();
        state
            .subscribers
            .iter()
            .find(|subscriber| subscriber.id == id)
            .map(|subscriber| subscriber.state)
    }

    /// Number of subscribers of `name`
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.find(name).map_or(0, |record| record.state.lock().subscribers.len())
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for ServiceObserver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicUsize;
    use hdf_api::core::types::make_hardware_id;

    fn counter() -> (Arc<AtomicUsize>, SubscriberCallback) {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();
        let callback: SubscriberCallback = Arc::new(move |_: &Arc<DeviceObject>| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (hits, callback)
    }

    #[test]
    fn test_subscribe_then_publish() {
        let observer = ServiceObserver::new();
        let (hits, callback) = counter();
        let id = observer.subscribe("i2c_service", 0, callback).unwrap();
        assert_eq!(observer.subscriber_state("i2c_service", id), Some(SubscriberState::Pending));

        let object = Arc::new(DeviceObject::new("i2c_service", 5));
        observer.publish("i2c_service", 5, ServicePolicy::Public, object).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(observer.subscriber_state("i2c_service", id), Some(SubscriberState::Ready));
    }

    #[test]
    fn test_publish_then_subscribe() {
        let observer = ServiceObserver::new();
        let object = Arc::new(DeviceObject::new("i2c_service", 5));
        observer.publish("i2c_service", 5, ServicePolicy::Capacity, object).unwrap();

        let (hits, callback) = counter();
        observer.subscribe("i2c_service", 9, callback).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_private_gate() {
        let observer = ServiceObserver::new();
        let owner = make_hardware_id(1, 3);
        let (stranger_hits, stranger) = counter();
        let (owner_hits, own) = counter();
        observer.subscribe("pin_service", make_hardware_id(1, 4), stranger).unwrap();
        observer.subscribe("pin_service", owner, own).unwrap();

        let object = Arc::new(DeviceObject::new("pin_service", owner).with_policy(ServicePolicy::Private));
        observer.publish("pin_service", owner, ServicePolicy::Private, object).unwrap();
        assert_eq!(stranger_hits.load(Ordering::SeqCst), 0);
        assert_eq!(owner_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_republish_notifies_again() {
        let observer = ServiceObserver::new();
        let (hits, callback) = counter();
        observer.subscribe("rtc_service", 0, callback).unwrap();
        for _ in 0..2 {
            let object = Arc::new(DeviceObject::new("rtc_service", 1));
            observer.publish("rtc_service", 1, ServicePolicy::Public, object).unwrap();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_and_remove() {
        let observer = ServiceObserver::new();
        let (hits, callback) = counter();
        let id = observer.subscribe("spi_service", 0, callback).unwrap();
        observer.unsubscribe("spi_service", id).unwrap();
        assert!(observer.unsubscribe("spi_service", id).is_err());

        let object = Arc::new(DeviceObject::new("spi_service", 1));
        observer.publish("spi_service", 1, ServicePolicy::Public, object).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(observer.publisher("spi_service").is_some());

        observer.remove_record("spi_service");
        observer.remove_record("spi_service");
        assert!(observer.publisher("spi_service").is_none());
        assert!(observer.is_empty());
    }

    #[test]
    fn test_remove_publisher_checks_owner() {
        let observer = ServiceObserver::new();
        let first = Arc::new(DeviceObject::new("led_service", 1));
        let second = Arc::new(DeviceObject::new("led_service", 1));
        observer.publish("led_service", 1, ServicePolicy::Public, second.clone()).unwrap();
        assert!(!observer.remove_publisher("led_service", &first));
        assert!(observer.remove_publisher("led_service", &second));
        assert!(observer.is_empty());
    }

    #[test]
    fn test_callback_may_reenter() {
        let observer = Arc::new(ServiceObserver::new());
        let inner = observer.clone();
        let callback: SubscriberCallback = Arc::new(move |object: &Arc<DeviceObject>| {
            inner.remove_record(object.service_name());
        });
        observer.subscribe("uart_service", 0, callback).unwrap();
        let object = Arc::new(DeviceObject::new("uart_service", 2));
        observer.publish("uart_service", 2, ServicePolicy::Public, object).unwrap();
        assert!(observer.is_empty());
    }

    #[test]
    fn test_private_republish_resets_hidden_subscribers() {
        let observer = ServiceObserver::new();
        let owner = make_hardware_id(2, 1);
        let (hits, callback) = counter();
        let id = observer.subscribe("gpio_service", make_hardware_id(2, 7), callback).unwrap();

        let object = Arc::new(DeviceObject::new("gpio_service", owner));
        observer.publish("gpio_service", owner, ServicePolicy::Public, object.clone()).unwrap();
        assert_eq!(observer.subscriber_state("gpio_service", id), Some(SubscriberState::Ready));

        observer.publish("gpio_service", owner, ServicePolicy::Private, object).unwrap();
        assert_eq!(observer.subscriber_state("gpio_service", id), Some(SubscriberState::Pending));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unlinked_record_is_skipped() {
        let observer = ServiceObserver::new();
        let stale = observer.find_or_create("dma_service");
        observer.remove_record("dma_service");
        assert!(ServiceObserver::update_live(&stale, &mut |_: &mut RecordState| ()).is_none());

        // Later calls land on a fresh record instead of the unlinked one
        let (hits, callback) = counter();
        let id = observer.subscribe("dma_service", 0, callback).unwrap();
        let object = Arc::new(DeviceObject::new("dma_service", 3));
        observer.publish("dma_service", 3, ServicePolicy::Public, object).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(observer.subscriber_state("dma_service", id), Some(SubscriberState::Ready));
        assert_eq!(observer.len(), 1);
        assert!(stale.state.lock().subscribers.is_empty());
    }

    #[test]
    fn test_empty_name_rejected() {
        let observer = ServiceObserver::new();
        let (_, callback) = counter();
        assert!(observer.subscribe("", 0, callback).is_err());
    }
}
