//! Condition lists and their canonical evaluation.
//!
//! A condition list is a flat sequence of predicates joined by AND/OR
//! connectors. Evaluation is sum-of-products: a new group starts at every OR,
//! predicates inside a group are ANDed, and the group results are ORed.
//!
//! ```text
//! a AND b OR c AND d   =>   (a AND b) OR (c AND d)
//! ```
//!
//! Every table strategy compiles its conditions into a [`Filter`] and uses
//! the same [`Filter::matches`], so all of them agree on which rows match.

use crate::error::{Error, Result};
use crate::row::{Row, Schema};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical connector in front of a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Connector {
    /// Continue the current group
    And,
    /// Start a new group
    Or,
}

impl FromStr for Connector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("AND") {
            Ok(Connector::And)
        } else if s.eq_ignore_ascii_case("OR") {
            Ok(Connector::Or)
        } else {
            Err(Error::MalformedCondition(format!("unknown connector '{}'", s)))
        }
    }
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connector::And => write!(f, "AND"),
            Connector::Or => write!(f, "OR"),
        }
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `=`
    Eq,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `<=`
    Le,
}

impl Operator {
    /// Applies the operator to a cell and a literal.
    ///
    /// The null marker satisfies nothing. `=` across tags is false; the
    /// ordering operators across tags fail with [`Error::TypeMismatch`].
    pub fn evaluate(self, cell: Option<&Value>, literal: &Value) -> Result<bool> {
        let Some(value) = cell else {
            return Ok(false);
        };
        if self == Operator::Eq {
            return Ok(value.kind() == literal.kind() && value == literal);
        }

        let ordering = value.try_cmp(literal)?;
        Ok(match self {
            Operator::Eq => ordering.is_eq(),
            Operator::Gt => ordering.is_gt(),
            Operator::Lt => ordering.is_lt(),
            Operator::Ge => ordering.is_ge(),
            Operator::Le => ordering.is_le(),
        })
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "=" => Ok(Operator::Eq),
            ">" => Ok(Operator::Gt),
            "<" => Ok(Operator::Lt),
            ">=" => Ok(Operator::Ge),
            "<=" => Ok(Operator::Le),
            other => Err(Error::UnsupportedOperator(other.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Eq => "=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
        };
        write!(f, "{}", symbol)
    }
}

/// One unit of a condition list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Connector to the previous unit; ignored on the first unit
    pub connector: Option<Connector>,
    /// Column the predicate reads
    pub column: String,
    /// Comparison operator
    pub operator: Operator,
    /// Literal, typed once when the condition is built
    pub literal: Value,
}

impl Condition {
    /// Creates a unit without a connector (the head of a list)
    pub fn new(column: impl Into<String>, operator: Operator, literal: &str) -> Self {
        Self {
            connector: None,
            column: column.into(),
            operator,
            literal: Value::parse(literal),
        }
    }

    /// Creates a unit joined to the previous one with AND
    pub fn and(column: impl Into<String>, operator: Operator, literal: &str) -> Self {
        Self {
            connector: Some(Connector::And),
            ..Self::new(column, operator, literal)
        }
    }

    /// Creates a unit that starts a new OR group
    pub fn or(column: impl Into<String>, operator: Operator, literal: &str) -> Self {
        Self {
            connector: Some(Connector::Or),
            ..Self::new(column, operator, literal)
        }
    }

    /// Builds a unit from the textual fields a command layer produces.
    ///
    /// An absent or blank connector means "no connector".
    pub fn parse(
        connector: Option<&str>,
        column: &str,
        operator: &str,
        literal: &str,
    ) -> Result<Self> {
        let connector = match connector.map(str::trim) {
            None | Some("") => None,
            Some(text) => Some(text.parse::<Connector>()?),
        };
        if column.trim().is_empty() {
            return Err(Error::MalformedCondition("missing column".to_string()));
        }
        if operator.is_empty() {
            return Err(Error::MalformedCondition("missing operator".to_string()));
        }

        Ok(Self {
            connector,
            column: column.to_string(),
            operator: operator.parse()?,
            literal: Value::parse(literal),
        })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(connector) = self.connector {
            write!(f, "{} ", connector)?;
        }
        write!(f, "{} {} {}", self.column, self.operator, self.literal)
    }
}

/// A predicate bound to a column position
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Column position in the schema
    pub column: usize,
    /// Comparison operator
    pub operator: Operator,
    /// Typed literal
    pub literal: Value,
}

impl Predicate {
    /// Evaluates this predicate against one row
    pub fn evaluate(&self, row: &Row) -> Result<bool> {
        self.operator.evaluate(row.cell(self.column), &self.literal)
    }
}

/// A condition list compiled against a schema.
///
/// Compilation resolves every column up front, so an unknown column fails
/// the operation before any row is examined or mutated.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    groups: Vec<Vec<Predicate>>,
}

impl Filter {
    /// Compiles a condition list, grouping at each OR connector
    pub fn compile(schema: &Schema, conditions: &[Condition]) -> Result<Self> {
        let mut groups: Vec<Vec<Predicate>> = Vec::new();
        for (i, condition) in conditions.iter().enumerate() {
            let predicate = Predicate {
                column: schema.require(&condition.column)?,
                operator: condition.operator,
                literal: condition.literal.clone(),
            };
            let starts_group = i == 0 || condition.connector == Some(Connector::Or);
            if starts_group {
                groups.push(vec![predicate]);
            } else if let Some(group) = groups.last_mut() {
                group.push(predicate);
            }
        }
        Ok(Self { groups })
    }

    /// True when the list was empty and every row matches
    pub fn is_unconditional(&self) -> bool {
        self.groups.is_empty()
    }

    /// AND groups, ORed together
    pub fn groups(&self) -> &[Vec<Predicate>] {
        &self.groups
    }

    /// Canonical evaluation of the whole list against one row.
    ///
    /// Every predicate is evaluated, so a type error surfaces regardless of
    /// where it sits in the list.
    pub fn matches(&self, row: &Row) -> Result<bool> {
        if self.groups.is_empty() {
            return Ok(true);
        }
        let mut any = false;
        for group in &self.groups {
            let mut all = true;
            for predicate in group {
                all &= predicate.evaluate(row)?;
            }
            any |= all;
        }
        Ok(any)
    }

    /// Primary key literal when the list is a single AND group containing
    /// `pk = literal`. Only such lists can be answered from a key index.
    pub fn key_lookup(&self) -> Option<&Value> {
        match self.groups.as_slice() {
            [group] => group
                .iter()
                .find(|p| p.column == 0 && p.operator == Operator::Eq)
                .map(|p| &p.literal),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(["id", "name", "gpa"]).unwrap()
    }

    fn row(values: &[&str]) -> Row {
        schema().parse_row(values).unwrap()
    }

    #[test]
    fn test_operator_parse() {
        assert_eq!(">=".parse::<Operator>().unwrap(), Operator::Ge);
        assert_eq!(
            "!=".parse::<Operator>(),
            Err(Error::UnsupportedOperator("!=".to_string()))
        );
    }

    #[test]
    fn test_condition_parse() {
        let c = Condition::parse(Some("or"), "gpa", ">", "3.5").unwrap();
        assert_eq!(c.connector, Some(Connector::Or));
        assert_eq!(c.literal, Value::Real(3.5));

        let c = Condition::parse(None, "id", "=", "3").unwrap();
        assert_eq!(c.connector, None);

        assert!(matches!(
            Condition::parse(Some("XOR"), "id", "=", "3"),
            Err(Error::MalformedCondition(_))
        ));
        assert!(matches!(
            Condition::parse(None, "", "=", "3"),
            Err(Error::MalformedCondition(_))
        ));
        assert!(matches!(
            Condition::parse(None, "id", "<>", "3"),
            Err(Error::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn test_empty_list_matches_everything() {
        let filter = Filter::compile(&schema(), &[]).unwrap();
        assert!(filter.is_unconditional());
        assert!(filter.matches(&row(&["1", "Alice", "3.5"])).unwrap());
    }

    #[test]
    fn test_unknown_column_fails_compile() {
        let err = Filter::compile(&schema(), &[Condition::new("age", Operator::Eq, "3")])
            .unwrap_err();
        assert_eq!(err, Error::UnknownColumn("age".to_string()));
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        // id = 1 AND gpa > 3.9 OR name = Bob  =>  (id = 1 AND gpa > 3.9) OR name = Bob
        let filter = Filter::compile(
            &schema(),
            &[
                Condition::new("id", Operator::Eq, "1"),
                Condition::and("gpa", Operator::Gt, "3.9"),
                Condition::or("name", Operator::Eq, "Bob"),
            ],
        )
        .unwrap();
        assert_eq!(filter.groups().len(), 2);

        assert!(!filter.matches(&row(&["1", "Alice", "3.5"])).unwrap());
        assert!(filter.matches(&row(&["2", "Bob", "3.8"])).unwrap());
        assert!(filter.matches(&row(&["1", "Zed", "4.0"])).unwrap());
    }

    #[test]
    fn test_all_or_list() {
        let filter = Filter::compile(
            &schema(),
            &[
                Condition::new("name", Operator::Eq, "Alice"),
                Condition::or("name", Operator::Eq, "Bob"),
                Condition::or("name", Operator::Eq, "Eve"),
            ],
        )
        .unwrap();
        assert!(filter.matches(&row(&["5", "Eve", "3.5"])).unwrap());
        assert!(!filter.matches(&row(&["3", "Charlie", "3.2"])).unwrap());
    }

    #[test]
    fn test_leading_connector_is_ignored() {
        let filter = Filter::compile(
            &schema(),
            &[
                Condition::or("id", Operator::Gt, "1"),
                Condition::and("id", Operator::Lt, "3"),
            ],
        )
        .unwrap();
        assert_eq!(filter.groups().len(), 1);
        assert!(filter.matches(&row(&["2", "Bob", "3.8"])).unwrap());
        assert!(!filter.matches(&row(&["3", "Charlie", "3.2"])).unwrap());
    }

    #[test]
    fn test_cross_tag_semantics() {
        let r = row(&["4", "David", "3.9"]);

        let eq = Filter::compile(&schema(), &[Condition::new("id", Operator::Eq, "4.0")]).unwrap();
        assert!(!eq.matches(&r).unwrap());

        let gt = Filter::compile(&schema(), &[Condition::new("id", Operator::Gt, "abc")]).unwrap();
        assert!(matches!(gt.matches(&r), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_type_error_is_not_short_circuited() {
        // The failing predicate sits behind one that is already false
        let filter = Filter::compile(
            &schema(),
            &[
                Condition::new("id", Operator::Eq, "99"),
                Condition::and("gpa", Operator::Gt, "high"),
            ],
        )
        .unwrap();
        assert!(filter.matches(&row(&["1", "Alice", "3.5"])).is_err());
    }

    #[test]
    fn test_null_cell_never_matches() {
        let filter =
            Filter::compile(&schema(), &[Condition::new("gpa", Operator::Le, "5.0")]).unwrap();
        assert!(!filter.matches(&row(&["1", "Alice", "null"])).unwrap());
    }

    #[test]
    fn test_key_lookup() {
        let single = Filter::compile(
            &schema(),
            &[
                Condition::new("gpa", Operator::Gt, "3.0"),
                Condition::and("id", Operator::Eq, "7"),
            ],
        )
        .unwrap();
        assert_eq!(single.key_lookup(), Some(&Value::Integer(7)));

        let disjunction = Filter::compile(
            &schema(),
            &[
                Condition::new("id", Operator::Eq, "7"),
                Condition::or("name", Operator::Eq, "Bob"),
            ],
        )
        .unwrap();
        assert_eq!(disjunction.key_lookup(), None);

        let range =
            Filter::compile(&schema(), &[Condition::new("id", Operator::Ge, "7")]).unwrap();
        assert_eq!(range.key_lookup(), None);
    }
}
