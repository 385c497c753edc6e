//! Loopback feed example
//!
//! Drives a `StreamClient` over the in-memory transport: subscribes to a few
//! event kinds of one collection, replays recorded frames into it and reads
//! them back through the typed callbacks and an event iterator.
//!
//! Channel lifecycle logs are shown at debug level unless `RUST_LOG` says otherwise.

use std::time::Duration;

use opensea_stream::prelude::*;
use opensea_stream::LogLevel;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const FRAMES: &[&str] = &[
    r#"[null,null,"collection:boredapeyachtclub","item_listed",{"event_type":"item_listed","sent_at":"2022-08-03T20:16:06.212451+00:00","payload":{"base_price":"78000000000000000000","item":{"nft_id":"ethereum/0xbc4ca0eda7647a8ab7c2061c2e118a18a936f13d/4471","chain":{"name":"ethereum"}}}}]"#,
    r#"[null,null,"collection:boredapeyachtclub","item_sold",{"event_type":"item_sold","sent_at":"2022-08-03T20:17:41.005112+00:00","payload":{"sale_price":"77500000000000000000","item":{"nft_id":"ethereum/0xbc4ca0eda7647a8ab7c2061c2e118a18a936f13d/4471","chain":{"name":"ethereum"}}}}]"#,
    r#"[null,null,"collection:boredapeyachtclub","item_listed",{"event_type":"item_listed","sent_at":"2022-08-03T20:18:02.771034+00:00","payload":{"base_price":"120000000000000000000","item":{"nft_id":"matic/0x2953399124f0cbb46d2cbacd8a89cf0599974963/17","chain":{"name":"matic"}}}}]"#,
];

fn main() -> Result<(), StreamError> {
    let log_level = LogLevel::Debug;

    // RUST_LOG still wins; otherwise show what the client is allowed to emit.
    let default_level = LevelFilter::from_level(log_level.into());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .init();

    println!("OpenSea Stream loopback feed");

    let transport = MemoryTransport::new();
    let config = ClientConfig::builder("demo-key")
        .with_api_url("ws://localhost:4000/socket")
        .with_log_level(log_level)
        .with_on_event(|_topic, _kind, event| {
            event.payload["item"]["chain"]["name"] == "ethereum"
        })
        .build()?;
    let client = StreamClient::new(config, &transport)?;
    println!("Endpoint: {}", client.endpoint());

    let listings = client.on_item_listed("boredapeyachtclub", |event| {
        println!(
            "Listed {} for {} wei",
            event.payload.item.nft_id, event.payload.base_price
        );
    });
    let feed = client.event_stream(
        "boredapeyachtclub",
        &[EventType::ItemListed, EventType::ItemSold],
    );

    for frame in FRAMES {
        match transport.push_frame(frame) {
            Ok(delivered) => println!("Frame reached {} listeners", delivered),
            Err(e) => println!("Malformed frame: {}", e),
        }
    }

    while let Some(event) = feed.next_event_timeout(Duration::from_millis(100)) {
        println!("{} at {}", event.event_type, event.sent_at);
    }

    println!("Channels before unsubscribe: {:?}", client.channels());
    listings.unsubscribe()?;
    let unread = feed.close()?;
    println!("Closed feed with {} unread events", unread.len());
    println!("Channels after unsubscribe: {:?}", client.channels());

    client.disconnect();
    Ok(())
}
