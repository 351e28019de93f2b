// Common fixtures for storage strategy integration tests

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use shelfdb_core::{
    parse_cell, Condition, Connector, Error, Operator, Record, Result, Row, Schema, Table,
    TableKind,
};
use shelfdb_storage::{
    open_table, ChunkConfig, LeakyBucketConfig, LfuConfig, PingPongConfig, RandomQueueConfig,
    StorageConfig,
};

/// The student roster used by the concrete scenarios
pub const STUDENTS: [[&str; 3]; 6] = [
    ["1", "Alice", "3.5"],
    ["2", "Bob", "3.8"],
    ["3", "Charlie", "3.2"],
    ["4", "David", "3.9"],
    ["5", "Eve", "3.5"],
    ["7", "Grace", "4.0"],
];

pub fn students_schema() -> Schema {
    Schema::new(["id", "name", "gpa"]).expect("valid schema")
}

/// Thresholds small enough that a few hundred operations exercise every
/// leak, promotion, rebalance, compaction and eviction path
pub fn stress_config() -> StorageConfig {
    StorageConfig::default()
        .with_leaky_bucket(LeakyBucketConfig {
            main_capacity: 24,
            leak_threshold: 20,
            leak_batch: 4,
            promote_after: 2,
            tombstone_limit: 3,
        })
        .with_ping_pong(PingPongConfig {
            hot_threshold: 2,
            rebalance_interval: 7,
        })
        .with_random_queue(RandomQueueConfig {
            queue_count: 3,
            rebalance_interval: 11,
            imbalance_factor: 1.5,
            heavy_delete_ratio: 0.2,
        })
        .with_chunk(ChunkConfig { chunk_size: 8 })
        .with_lfu(LfuConfig { capacity: 5 })
}

pub fn open_students(kind: TableKind, config: &StorageConfig) -> Box<dyn Table> {
    let mut table = open_table(kind, students_schema(), config);
    for row in STUDENTS {
        table.insert(&row).expect("insert student");
    }
    table
}

/// Records in a canonical order, for comparing strategies that return rows
/// in different orders
pub fn sorted(mut records: Vec<Record>) -> Vec<Record> {
    records.sort();
    records
}

pub fn names(records: &[Record]) -> Vec<String> {
    let mut names: Vec<String> = records
        .iter()
        .map(|r| r.get("name").unwrap_or_default().to_string())
        .collect();
    names.sort();
    names
}

/// Naive reference store: one vector, one linear scan per operation, and
/// its own reading of the AND/OR grouping rules
pub struct Oracle {
    schema: Schema,
    rows: Vec<Row>,
}

impl Oracle {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn insert(&mut self, values: &[&str]) -> Result<()> {
        let row = self.schema.parse_row(values)?;
        self.rows.push(row);
        Ok(())
    }

    fn eval(&self, row: &Row, conditions: &[Condition]) -> Result<bool> {
        if conditions.is_empty() {
            return Ok(true);
        }
        let mut any = false;
        let mut group = true;
        for (i, condition) in conditions.iter().enumerate() {
            if i > 0 && condition.connector == Some(Connector::Or) {
                any |= group;
                group = true;
            }
            let column = self.schema.require(&condition.column)?;
            group &= condition.operator.evaluate(row.cell(column), &condition.literal)?;
        }
        Ok(any | group)
    }

    fn matching(&self, conditions: &[Condition]) -> Result<Vec<usize>> {
        for condition in conditions {
            self.schema.require(&condition.column)?;
        }
        let mut hits = Vec::new();
        for (pos, row) in self.rows.iter().enumerate() {
            if self.eval(row, conditions)? {
                hits.push(pos);
            }
        }
        Ok(hits)
    }

    pub fn select(&self, conditions: &[Condition]) -> Result<Vec<Record>> {
        Ok(self
            .matching(conditions)?
            .into_iter()
            .map(|pos| self.schema.record(&self.rows[pos]))
            .collect())
    }

    pub fn update(&mut self, column: &str, value: &str, conditions: &[Condition]) -> Result<usize> {
        let column = self.schema.require(column)?;
        let hits = self.matching(conditions)?;
        for &pos in &hits {
            self.rows[pos].set(column, parse_cell(value));
        }
        Ok(hits.len())
    }

    pub fn delete(&mut self, conditions: &[Condition]) -> Result<usize> {
        let hits = self.matching(conditions)?;
        let mut pos = 0;
        self.rows.retain(|_| {
            let keep = !hits.contains(&pos);
            pos += 1;
            keep
        });
        Ok(hits.len())
    }
}

/// One randomly generated table operation
#[derive(Debug, Clone)]
pub enum Op {
    Insert(Vec<String>),
    Select(Vec<Condition>),
    Update(String, String, Vec<Condition>),
    Delete(Vec<Condition>),
}

const NAMES: [&str; 6] = ["Alice", "Bob", "Charlie", "David", "Eve", "Grace"];
const GPAS: [&str; 7] = ["2.5", "3.0", "3.2", "3.5", "3.8", "4.0", "null"];

/// Generates operations over `id,name,gpa`.
///
/// Most literals share the column's tag, but `gpa` occasionally receives a
/// text or integer cell and conditions occasionally carry a foreign literal,
/// so ordering predicates (including those riding along a key lookup) fail
/// with a type error often enough that strategies must agree on errors too.
///
/// Inserted ids are unique and start at 1000; key updates draw from 0..40.
pub struct OpGenerator {
    next_id: u32,
}

impl Default for OpGenerator {
    fn default() -> Self {
        Self { next_id: 1000 }
    }
}

impl OpGenerator {
    fn known_id(&self, rng: &mut StdRng) -> String {
        if rng.gen_bool(0.3) {
            rng.gen_range(0..40).to_string()
        } else {
            rng.gen_range(1000..self.next_id.max(1001)).to_string()
        }
    }

    /// A gpa cell: mostly reals, sometimes text or an integer
    fn gpa(rng: &mut StdRng) -> String {
        match rng.gen_range(0..20) {
            0 | 1 => "unknown".to_string(),
            2 => "4".to_string(),
            _ => GPAS.choose(rng).unwrap_or(&"3.5").to_string(),
        }
    }

    fn literal(&self, rng: &mut StdRng, column: &str) -> String {
        if rng.gen_bool(0.05) {
            // Foreign tag for the column
            return match column {
                "id" => "x".to_string(),
                "name" => "3".to_string(),
                _ => "unknown".to_string(),
            };
        }
        match column {
            "id" => self.known_id(rng),
            "name" => NAMES.choose(rng).unwrap_or(&"Eve").to_string(),
            _ => GPAS[..6].choose(rng).unwrap_or(&"3.5").to_string(),
        }
    }

    fn condition(&self, rng: &mut StdRng, first: bool) -> Condition {
        let operators = [
            Operator::Eq,
            Operator::Gt,
            Operator::Lt,
            Operator::Ge,
            Operator::Le,
        ];
        let operator = *operators.choose(rng).unwrap_or(&Operator::Eq);
        let column = ["id", "name", "gpa"][rng.gen_range(0..3)];
        let literal = self.literal(rng, column);
        let mut condition = Condition::new(column, operator, &literal);
        if !first {
            condition.connector = Some(if rng.gen_bool(0.6) {
                Connector::And
            } else {
                Connector::Or
            });
        }
        condition
    }

    pub fn conditions(&self, rng: &mut StdRng) -> Vec<Condition> {
        // Bias toward single key lookups so cache and index paths get traffic
        if rng.gen_bool(0.3) {
            let mut list = vec![Condition::new("id", Operator::Eq, &self.known_id(rng))];
            if rng.gen_bool(0.5) {
                list.push(self.condition(rng, false));
                list[1].connector = Some(Connector::And);
            }
            return list;
        }
        let len = rng.gen_range(0..4);
        (0..len).map(|i| self.condition(rng, i == 0)).collect()
    }

    pub fn next(&mut self, rng: &mut StdRng) -> Op {
        match rng.gen_range(0..10) {
            0..=3 => {
                let id = self.next_id.to_string();
                self.next_id += 1;
                let name = NAMES.choose(rng).unwrap_or(&"Eve").to_string();
                Op::Insert(vec![id, name, Self::gpa(rng)])
            }
            4..=6 => Op::Select(self.conditions(rng)),
            7 | 8 => {
                let (column, value) = match rng.gen_range(0..4) {
                    0 => ("id", rng.gen_range(0..40).to_string()),
                    1 => ("name", NAMES.choose(rng).unwrap_or(&"Eve").to_string()),
                    _ => ("gpa", Self::gpa(rng)),
                };
                Op::Update(column.to_string(), value, self.conditions(rng))
            }
            _ => Op::Delete(self.conditions(rng)),
        }
    }
}

/// Outcome of one operation in a form both sides can be compared on.
///
/// A type error names the first mismatching cell it met, which depends on
/// storage order, so only the fact of the mismatch is compared.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    Rows(Vec<Record>),
    Count(usize),
    Done,
    Mismatch,
    Failed(Error),
}

fn outcome<T>(result: Result<T>, ok: impl FnOnce(T) -> Outcome) -> Outcome {
    match result {
        Ok(value) => ok(value),
        Err(Error::TypeMismatch { .. }) => Outcome::Mismatch,
        Err(err) => Outcome::Failed(err),
    }
}

pub fn apply_table(table: &mut dyn Table, op: &Op) -> Outcome {
    match op {
        Op::Insert(values) => {
            let values: Vec<&str> = values.iter().map(String::as_str).collect();
            outcome(table.insert(&values), |_| Outcome::Done)
        }
        Op::Select(conditions) => outcome(table.select(conditions), |rows| {
            Outcome::Rows(sorted(rows))
        }),
        Op::Update(column, value, conditions) => {
            outcome(table.update(column, value, conditions), Outcome::Count)
        }
        Op::Delete(conditions) => outcome(table.delete(conditions), Outcome::Count),
    }
}

pub fn apply_oracle(oracle: &mut Oracle, op: &Op) -> Outcome {
    match op {
        Op::Insert(values) => {
            let values: Vec<&str> = values.iter().map(String::as_str).collect();
            outcome(oracle.insert(&values), |_| Outcome::Done)
        }
        Op::Select(conditions) => outcome(oracle.select(conditions), |rows| {
            Outcome::Rows(sorted(rows))
        }),
        Op::Update(column, value, conditions) => {
            outcome(oracle.update(column, value, conditions), Outcome::Count)
        }
        Op::Delete(conditions) => outcome(oracle.delete(conditions), Outcome::Count),
    }
}
