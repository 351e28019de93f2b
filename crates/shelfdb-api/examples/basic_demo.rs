use shelfdb::{Condition, Database, Operator, Record};

fn print_rows(label: &str, rows: &[Record]) {
    println!("{} ({} rows)", label, rows.len());
    for row in rows {
        let fields: Vec<String> = row.iter().map(|(c, v)| format!("{}={}", c, v)).collect();
        println!("  {}", fields.join(", "));
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== ShelfDB Basic Demo ===\n");

    let mut db = Database::in_memory();

    // One table per strategy, same data in each
    let tables = ["forest_students", "lfu_students", "students"];
    for name in tables {
        let kind = db.create_table(name, &["id", "name", "gpa"])?;
        println!("Created {} as {}", name, kind);
        for row in [
            ["1", "Alice", "3.5"],
            ["2", "Bob", "3.8"],
            ["3", "Charlie", "3.2"],
            ["4", "David", "3.9"],
            ["5", "Eve", "null"],
        ] {
            db.insert(name, &row)?;
        }
    }

    // gpa > 3.6 AND name = Bob OR id = 4
    let conditions = [
        Condition::new("gpa", Operator::Gt, "3.6"),
        Condition::and("name", Operator::Eq, "Bob"),
        Condition::or("id", Operator::Eq, "4"),
    ];
    println!();
    for name in tables {
        let rows = db.select(name, &conditions)?;
        print_rows(name, &rows);
    }

    println!("\nRaising Charlie's gpa...");
    let changed = db.update(
        "lfu_students",
        "gpa",
        "3.4",
        &[Condition::new("name", Operator::Eq, "Charlie")],
    )?;
    println!("Updated {} row(s)", changed);

    // Ordering a text column against a number is an error, not a silent miss
    match db.select("students", &[Condition::new("name", Operator::Gt, "3")]) {
        Ok(rows) => println!("Unexpected: {} rows", rows.len()),
        Err(err) => println!("Rejected: {}", err),
    }

    let removed = db.delete("forest_students", &[Condition::new("gpa", Operator::Lt, "3.6")])?;
    println!("Deleted {} row(s) from forest_students\n", removed);

    println!("{}", db.report("lfu_students")?);
    Ok(())
}
