#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use shelfdb_core::{Condition, Connector, Error, Operator, Result, Schema, Table, TableKind};
use shelfdb_storage::{
    open_table, ChunkConfig, LeakyBucketConfig, LfuConfig, PingPongConfig, RandomQueueConfig,
    StorageConfig,
};

#[derive(Arbitrary, Debug)]
enum Column {
    Id,
    Name,
    Score,
}

#[derive(Arbitrary, Debug)]
struct Pred {
    or: bool,
    foreign: bool,
    column: Column,
    op: u8,
    literal: u8,
}

#[derive(Arbitrary, Debug)]
enum TableOp {
    Insert { name: u8, score: Option<u8>, text_score: bool },
    Select(Vec<Pred>),
    Update {
        column: Column,
        value: u8,
        foreign: bool,
        preds: Vec<Pred>,
    },
    Delete(Vec<Pred>),
}

const OPS: [Operator; 5] = [
    Operator::Eq,
    Operator::Gt,
    Operator::Lt,
    Operator::Ge,
    Operator::Le,
];

// A foreign literal carries another tag than the column normally holds
fn literal(column: &Column, n: u8, foreign: bool) -> (&'static str, String) {
    match (column, foreign) {
        (Column::Id, false) => ("id", (n % 64).to_string()),
        (Column::Id, true) => ("id", format!("k{}", n % 4)),
        (Column::Name, false) => ("name", format!("n{}", n % 16)),
        (Column::Name, true) => ("name", (n % 4).to_string()),
        (Column::Score, false) => ("score", (n % 32).to_string()),
        (Column::Score, true) => ("score", format!("{}.5", n % 32)),
    }
}

// Type errors name the first mismatching cell met, which depends on layout
fn outcome<T>(result: Result<T>, ok: impl FnOnce(T) -> String) -> String {
    match result {
        Ok(value) => ok(value),
        Err(Error::TypeMismatch { .. }) => "type mismatch".to_string(),
        Err(err) => err.to_string(),
    }
}

fn conditions(preds: &[Pred]) -> Vec<Condition> {
    preds
        .iter()
        .take(6)
        .map(|p| {
            let (column, text) = literal(&p.column, p.literal, p.foreign);
            let mut condition = Condition::new(column, OPS[p.op as usize % OPS.len()], &text);
            condition.connector = Some(if p.or { Connector::Or } else { Connector::And });
            condition
        })
        .collect()
}

fn config() -> StorageConfig {
    StorageConfig::default()
        .with_leaky_bucket(LeakyBucketConfig {
            main_capacity: 8,
            leak_threshold: 6,
            leak_batch: 2,
            promote_after: 2,
            tombstone_limit: 2,
        })
        .with_ping_pong(PingPongConfig {
            hot_threshold: 2,
            rebalance_interval: 5,
        })
        .with_random_queue(RandomQueueConfig {
            queue_count: 3,
            rebalance_interval: 7,
            imbalance_factor: 1.5,
            heavy_delete_ratio: 0.2,
        })
        .with_chunk(ChunkConfig { chunk_size: 4 })
        .with_lfu(LfuConfig { capacity: 3 })
}

fn sorted(rows: Vec<shelfdb_core::Record>) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = rows
        .iter()
        .map(|r| r.values().map(str::to_string).collect())
        .collect();
    rows.sort();
    rows
}

fuzz_target!(|ops: Vec<TableOp>| {
    let config = config();
    let mut tables: Vec<Box<dyn Table>> = TableKind::ALL
        .iter()
        .map(|kind| {
            let schema = Schema::new(["id", "name", "score"]).expect("schema");
            open_table(*kind, schema, &config)
        })
        .collect();

    // Inserted keys are unique; updates may still collide them. Key updates
    // with a foreign literal give the key column text cells too.
    let mut next_id = 100u32;
    for op in ops.iter().take(200) {
        let outcomes: Vec<String> = tables
            .iter_mut()
            .map(|table| match op {
                TableOp::Insert {
                    name,
                    score,
                    text_score,
                } => {
                    let id = next_id.to_string();
                    let name = format!("n{}", name % 16);
                    let score = match score {
                        Some(_) if *text_score => "n/a".to_string(),
                        Some(s) => (s % 32).to_string(),
                        None => "null".to_string(),
                    };
                    table
                        .insert(&[id.as_str(), name.as_str(), score.as_str()])
                        .expect("insert");
                    String::new()
                }
                TableOp::Select(preds) => outcome(table.select(&conditions(preds)), |rows| {
                    format!("{:?}", sorted(rows))
                }),
                TableOp::Update {
                    column,
                    value,
                    foreign,
                    preds,
                } => {
                    let (column, text) = literal(column, *value, *foreign);
                    outcome(table.update(column, &text, &conditions(preds)), |n| {
                        n.to_string()
                    })
                }
                TableOp::Delete(preds) => {
                    outcome(table.delete(&conditions(preds)), |n| n.to_string())
                }
            })
            .collect();
        if matches!(op, TableOp::Insert { .. }) {
            next_id += 1;
        }

        for (kind, seen) in TableKind::ALL.iter().zip(&outcomes) {
            assert_eq!(seen, &outcomes[0], "{} disagrees on {:?}", kind, op);
        }
        let len = tables[0].len();
        assert!(tables.iter().all(|t| t.len() == len));
    }

    let full: Vec<_> = tables
        .iter_mut()
        .map(|t| sorted(t.select(&[]).expect("select all")))
        .collect();
    assert!(full.iter().all(|rows| rows == &full[0]));
});
