use shelfdb::{Condition, Database, Error, Operator, Record, StorageConfig, TableKind, ValueKind};

const ROSTER: [[&str; 3]; 6] = [
    ["1", "Alice", "3.5"],
    ["2", "Bob", "3.8"],
    ["3", "Charlie", "3.2"],
    ["4", "David", "3.9"],
    ["5", "Eve", "3.5"],
    ["7", "Grace", "4.0"],
];

const TABLE_NAMES: [&str; 7] = [
    "backwards_students",
    "leaky_students",
    "ping_students",
    "random_students",
    "forest_students",
    "chunk_students",
    "lfu_students",
];

fn roster_db() -> Database {
    let mut db = Database::in_memory();
    for name in TABLE_NAMES {
        db.create_table(name, &["id", "name", "gpa"]).unwrap();
        for row in ROSTER {
            db.insert(name, &row).unwrap();
        }
    }
    db
}

fn names(rows: &[Record]) -> Vec<String> {
    let mut names: Vec<String> = rows
        .iter()
        .filter_map(|r| r.get("name"))
        .map(str::to_string)
        .collect();
    names.sort();
    names
}

#[test]
fn test_prefixes_select_strategies() {
    let db = roster_db();
    let kinds: Vec<TableKind> = TABLE_NAMES.iter().map(|n| db.kind(n).unwrap()).collect();
    assert_eq!(
        kinds,
        vec![
            TableKind::BackwardsStack,
            TableKind::LeakyBucket,
            TableKind::PingPong,
            TableKind::RandomQueue,
            TableKind::ForestMap,
            TableKind::Chunk,
            TableKind::Lfu,
        ]
    );
}

#[test]
fn test_every_strategy_answers_alike() {
    let mut db = roster_db();
    let conditions = [
        Condition::new("gpa", Operator::Gt, "3.6"),
        Condition::and("name", Operator::Eq, "Bob"),
        Condition::or("id", Operator::Eq, "7"),
    ];
    for name in TABLE_NAMES {
        let rows = db.select(name, &conditions).unwrap();
        assert_eq!(names(&rows), vec!["Bob", "Grace"], "{}", name);
    }
}

#[test]
fn test_update_then_delete() {
    let mut db = roster_db();
    for name in TABLE_NAMES {
        let changed = db
            .update(name, "gpa", "3.0", &[Condition::new("gpa", Operator::Lt, "3.6")])
            .unwrap();
        assert_eq!(changed, 3, "{}", name);

        let rows = db
            .select(name, &[Condition::new("gpa", Operator::Eq, "3.0")])
            .unwrap();
        assert_eq!(names(&rows), vec!["Alice", "Charlie", "Eve"], "{}", name);

        let removed = db
            .delete(name, &[Condition::new("gpa", Operator::Eq, "3.0")])
            .unwrap();
        assert_eq!(removed, 3);
        assert_eq!(db.row_count(name).unwrap(), 3);
    }
}

#[test]
fn test_errors_do_not_mutate() {
    let mut db = roster_db();
    for name in TABLE_NAMES {
        assert_eq!(
            db.insert(name, &["8", "Heidi"]),
            Err(Error::ColumnCountMismatch {
                expected: 3,
                actual: 2
            })
        );
        assert_eq!(
            db.delete(name, &[Condition::new("age", Operator::Gt, "1")]),
            Err(Error::UnknownColumn("age".to_string()))
        );
        assert_eq!(
            db.update(name, "gpa", "9", &[Condition::new("name", Operator::Gt, "3")]),
            Err(Error::TypeMismatch {
                left: ValueKind::Text,
                right: ValueKind::Integer
            })
        );
        assert_eq!(db.row_count(name).unwrap(), 6, "{}", name);
        let untouched = db
            .select(name, &[Condition::new("gpa", Operator::Eq, "9")])
            .unwrap();
        assert!(untouched.is_empty());
    }
}

#[test]
fn test_stats_and_report() {
    let mut db = roster_db();
    db.select("lfu_students", &[Condition::new("id", Operator::Eq, "2")])
        .unwrap();
    db.select("lfu_students", &[Condition::new("id", Operator::Eq, "99")])
        .unwrap();
    let _ = db.delete("lfu_students", &[Condition::new("x", Operator::Eq, "1")]);

    let stats = db.stats("lfu_students").unwrap();
    assert_eq!(stats.insert.calls, 6);
    assert_eq!(stats.select.calls, 2);
    assert_eq!(stats.empty_selects, 1);
    assert_eq!(stats.delete.failures, 1);

    let report = db.report("lfu_students").unwrap();
    assert!(report.starts_with("=== Performance Report for lfu_students (LFU) ==="));
    assert!(report.contains("Select Hit Ratio: 50.00%"));
}

#[test]
fn test_tables_are_independent() {
    let mut db = roster_db();
    db.delete("chunk_students", &[]).unwrap();
    assert_eq!(db.row_count("chunk_students").unwrap(), 0);
    assert_eq!(db.row_count("forest_students").unwrap(), 6);

    db.drop_table("forest_students").unwrap();
    assert_eq!(
        db.select("forest_students", &[]),
        Err(Error::TableNotFound("forest_students".to_string()))
    );

    // The name is free again, with a fresh schema
    db.create_table("forest_students", &["id", "course"]).unwrap();
    assert_eq!(db.columns("forest_students").unwrap(), vec!["id", "course"]);
    assert_eq!(db.row_count("forest_students").unwrap(), 0);
}

#[test]
fn test_explicit_kind_and_config() {
    let mut db = Database::with_config(StorageConfig::default());
    db.create_table_with_kind("events", TableKind::RandomQueue, &["id", "kind"])
        .unwrap();
    assert_eq!(db.kind("events").unwrap(), TableKind::RandomQueue);
    assert_eq!(
        db.create_table_with_kind("events", TableKind::Lfu, &["id"]),
        Err(Error::TableExists("events".to_string()))
    );
    assert_eq!(db.kind("events").unwrap(), TableKind::RandomQueue);
}

#[test]
fn test_null_cells_and_parsed_conditions() {
    let mut db = Database::in_memory();
    db.create_table("ping_people", &["id", "email"]).unwrap();
    db.insert("ping_people", &["1", "NULL"]).unwrap();
    db.insert("ping_people", &["2", "b@x.io"]).unwrap();

    let condition = Condition::parse(None, "email", "=", "b@x.io").unwrap();
    let rows = db.select("ping_people", &[condition]).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some("2"));

    let null_match = db
        .select("ping_people", &[Condition::new("email", Operator::Eq, "null")])
        .unwrap();
    assert!(null_match.is_empty());

    assert!(matches!(
        Condition::parse(Some("XOR"), "id", "=", "1"),
        Err(Error::MalformedCondition(_))
    ));
    assert!(matches!(
        Condition::parse(None, "id", "!=", "1"),
        Err(Error::UnsupportedOperator(_))
    ));
}
