use shelfdb::logging::LogConfig;
use shelfdb::{Condition, Database, LfuConfig, Operator, StorageConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Debug level shows evictions, compactions and rebalances.
    // Override with SHELFDB_LOG=shelfdb_storage=trace to see cache hits too.
    let _guard = LogConfig::debug().init();

    println!("=== ShelfDB Logging Demo ===\n");

    // A tiny cache so evictions happen quickly
    let config = StorageConfig::default().with_lfu(LfuConfig { capacity: 4 });
    let mut db = Database::with_config(config);

    db.create_table("lfu_sessions", &["id", "user"])?;
    db.create_table("chunk_events", &["id", "kind"])?;

    println!("\n1. Filling the LFU cache past capacity...");
    for i in 0..8 {
        let id = i.to_string();
        let user = format!("user{}", i);
        db.insert("lfu_sessions", &[id.as_str(), user.as_str()])?;
    }

    println!("\n2. Looking up an evicted key...");
    db.select("lfu_sessions", &[Condition::new("id", Operator::Eq, "0")])?;

    println!("\n3. Deleting enough rows to compact a chunk...");
    for i in 0..200 {
        let id = i.to_string();
        db.insert("chunk_events", &[id.as_str(), "click"])?;
    }
    db.delete("chunk_events", &[Condition::new("id", Operator::Lt, "60")])?;

    println!("\n4. A failing operation...");
    let _ = db.update("chunk_events", "missing", "x", &[]);

    db.drop_table("chunk_events")?;

    println!("\n=== Demo Complete ===");
    println!("Check the logs above to see tracing output!");

    Ok(())
}
