//! Property Tests
//!
//! Randomized write sequences and list transitions checked against simple
//! models.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use proptest::prelude::*;

use reflex_core::flow::For;
use reflex_core::reactive::{create_root, on_cleanup, Effect, Memo, Signal};

proptest! {
    /// An observer always ends up seeing the last value written, and re-runs
    /// once per write that actually changed the value.
    #[test]
    fn no_write_is_lost(writes in prop::collection::vec(0u8..4, 0..40)) {
        let signal = Signal::new(0u8);
        let last_seen = Arc::new(AtomicI32::new(-1));
        let runs = Arc::new(AtomicI32::new(0));

        let _effect = {
            let (signal, last_seen, runs) = (signal.clone(), last_seen.clone(), runs.clone());
            Effect::new(move || {
                last_seen.store(i32::from(signal.get()), Ordering::SeqCst);
                runs.fetch_add(1, Ordering::SeqCst);
            })
        };

        let mut current = 0u8;
        let mut changes = 0;
        for value in writes {
            if value != current {
                changes += 1;
                current = value;
            }
            signal.set(value);
            prop_assert_eq!(last_seen.load(Ordering::SeqCst), i32::from(value));
        }
        prop_assert_eq!(runs.load(Ordering::SeqCst), 1 + changes);
    }

    /// A memo always agrees with recomputing from scratch.
    #[test]
    fn memo_matches_direct_computation(writes in prop::collection::vec(-50i32..50, 1..30)) {
        let input = Signal::new(0);
        let squared = create_root(|_| {
            let input = input.clone();
            Memo::new(move |_| input.get() * input.get())
        });

        for value in writes {
            input.set(value);
            prop_assert_eq!(squared.get(), value * value);
        }
    }

    /// `For` output always mirrors the list, every built scope is either live
    /// or cleaned up exactly once, and disposal cleans up the rest.
    #[test]
    fn for_scopes_balance(lists in prop::collection::vec(prop::collection::vec(0u8..6, 0..8), 1..12)) {
        let list = Signal::new(Vec::<u8>::new());
        let built = Arc::new(AtomicI32::new(0));
        let cleaned = Arc::new(AtomicI32::new(0));

        let rows = create_root(|_| {
            let list = list.clone();
            let (built, cleaned) = (built.clone(), cleaned.clone());
            For::new(move || list.get(), move |item: &u8, _| {
                built.fetch_add(1, Ordering::SeqCst);
                let cleaned = cleaned.clone();
                on_cleanup(move || {
                    cleaned.fetch_add(1, Ordering::SeqCst);
                });
                u32::from(*item) * 10
            })
        });

        for next in lists {
            list.set(next.clone());
            let expected: Vec<u32> = next.iter().map(|item| u32::from(*item) * 10).collect();
            prop_assert_eq!(rows.values(), expected);
            prop_assert_eq!(
                built.load(Ordering::SeqCst) - cleaned.load(Ordering::SeqCst),
                next.len() as i32
            );
        }

        rows.dispose();
        prop_assert_eq!(built.load(Ordering::SeqCst), cleaned.load(Ordering::SeqCst));
    }
}
