//! Property-based tests for channel reference counting.

mod helpers;

use std::collections::HashMap;
use std::sync::Arc;

use helpers::client;
use opensea_stream::config::LogLevel;
use opensea_stream::{EventType, MemoryTransport, Subscription, Topic, TopicRegistry, Transport};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Subscribe { slug: usize, kind: usize },
    Unsubscribe { pick: usize },
}

const SLUGS: [&str; 3] = ["azuki", "doodles", "bored-ape"];

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..SLUGS.len(), 0..EventType::ALL.len())
            .prop_map(|(slug, kind)| Op::Subscribe { slug, kind }),
        any::<usize>().prop_map(|pick| Op::Unsubscribe { pick }),
    ]
}

proptest! {
    /// A collection has a registered channel exactly while it has subscriptions.
    #[test]
    fn prop_channel_registered_while_subscribed(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let (client, transport) = client();
        let mut live: Vec<(usize, Subscription)> = Vec::new();

        for op in ops {
            match op {
                Op::Subscribe { slug, kind } => {
                    let subscription = client.on_events(SLUGS[slug], &[EventType::ALL[kind]], |_| {});
                    live.push((slug, subscription));
                }
                Op::Unsubscribe { pick } if !live.is_empty() => {
                    let (_, subscription) = live.remove(pick % live.len());
                    prop_assert!(subscription.unsubscribe().is_ok());
                }
                Op::Unsubscribe { .. } => {}
            }

            let mut expected: HashMap<usize, usize> = HashMap::new();
            for (slug, _) in &live {
                *expected.entry(*slug).or_default() += 1;
            }
            for (index, slug) in SLUGS.iter().enumerate() {
                let count = expected.get(&index).copied().unwrap_or(0);
                prop_assert_eq!(client.subscription_count(slug), count);
                prop_assert_eq!(
                    client.channels().contains_key(&Topic::collection(slug)),
                    count > 0
                );
                // One live channel per subscribed collection, never more.
                let open = transport
                    .channels_for(&Topic::collection(slug))
                    .iter()
                    .filter(|channel| channel.listener_count() > 0)
                    .count();
                prop_assert_eq!(open, usize::from(count > 0));
            }
        }
    }

    /// Repeated lookups return the same handle and create a single channel.
    #[test]
    fn prop_get_or_create_is_idempotent(slug in "[a-z0-9-]{1,24}", lookups in 1usize..8) {
        let transport = MemoryTransport::new();
        transport.connect();
        let registry = TopicRegistry::new(Arc::new(transport.clone()), LogLevel::Error);
        let topic = Topic::collection(&slug);

        let first = registry.get_or_create(&topic);
        for _ in 1..lookups {
            prop_assert_eq!(&registry.get_or_create(&topic), &first);
        }
        prop_assert_eq!(transport.channels_for(&topic).len(), 1);
        prop_assert_eq!(registry.len(), 1);
    }
}
