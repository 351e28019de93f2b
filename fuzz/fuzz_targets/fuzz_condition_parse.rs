#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use shelfdb_core::{parse_cell, Condition, Filter, Row, Schema};

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    cells: [&'a str; 3],
    units: Vec<(Option<&'a str>, &'a str, &'a str, &'a str)>,
}

fuzz_target!(|input: Input| {
    let schema = Schema::new(["id", "name", "gpa"]).expect("schema");
    let row = Row::from_cells(input.cells.iter().map(|c| parse_cell(c)).collect());

    let mut conditions = Vec::new();
    for (connector, column, operator, literal) in input.units.iter().take(16) {
        // Malformed units are errors, never panics
        if let Ok(condition) = Condition::parse(*connector, column, operator, literal) {
            let _ = condition.to_string();
            conditions.push(condition);
        }
    }

    if let Ok(filter) = Filter::compile(&schema, &conditions) {
        let _ = filter.matches(&row);
        let _ = filter.key_lookup();
        if conditions.is_empty() {
            assert_eq!(filter.matches(&row), Ok(true));
        }
    }
});
