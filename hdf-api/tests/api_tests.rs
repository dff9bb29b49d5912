//! API tests

use std::sync::Arc;
use std::thread;

use hdf_api::{make_hardware_id, string_hash_key, LockedList, ServicePolicy, ANONYMOUS_MATCH_ID};
use proptest::prelude::*;

#[test]
fn test_locked_list_concurrent_push() {
    let list = Arc::new(LockedList::new());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let list = list.clone();
            thread::spawn(move || {
                for i in 0..100 {
                    list.push(t * 100 + i);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(list.len(), 400);
}

#[test]
fn test_locked_list_push_unless_race() {
    let list = Arc::new(LockedList::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let list = list.clone();
            thread::spawn(move || list.push_unless("gpio_service", |v| *v == "gpio_service").is_ok())
        })
        .collect();
    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(list.len(), 1);
}

#[test]
fn test_visibility_matrix() {
    let host_a_dev_1 = make_hardware_id(1, 1);
    let host_a_dev_2 = make_hardware_id(1, 2);
    for policy in [ServicePolicy::Public, ServicePolicy::Capacity] {
        assert!(policy.is_visible_to(host_a_dev_1, host_a_dev_2));
        assert!(policy.is_visible_to(host_a_dev_1, ANONYMOUS_MATCH_ID));
    }
    assert!(ServicePolicy::Private.is_visible_to(host_a_dev_1, host_a_dev_1));
    assert!(!ServicePolicy::Private.is_visible_to(host_a_dev_1, host_a_dev_2));
    assert!(!ServicePolicy::Private.is_visible_to(host_a_dev_1, ANONYMOUS_MATCH_ID));
}

proptest! {
    #[test]
    fn prop_hash_key_is_31_bit(name in ".{0,64}") {
        prop_assert_eq!(string_hash_key(&name) >> 31, 0);
        prop_assert_eq!(string_hash_key(&name), string_hash_key(&name.clone()));
    }

    #[test]
    fn prop_hardware_id_is_injective(a in any::<(u16, u16)>(), b in any::<(u16, u16)>()) {
        prop_assume!(a != b);
        prop_assert_ne!(make_hardware_id(a.0, a.1), make_hardware_id(b.0, b.1));
    }
}
