//! Clause types: WHERE predicates and ORDER BY terms.
//!
//! Both are written as `alias.column<suffix>` strings. The alias and column
//! are split off and re-quoted; the suffix is kept as written, except that
//! a trailing `IN ?` expands to one placeholder per bound value.

use regex::Regex;
use rowmodel_core::error::{Error, UsageErrorKind};
use rowmodel_core::{Result, Value, quote_qualified};
use std::sync::OnceLock;

const CLAUSE_PATTERN: &str = r"^([\w`-]+)\.([\w`-]+)(.*)$";

fn clause_regex() -> Result<&'static Regex> {
    static RE: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CLAUSE_PATTERN))
        .as_ref()
        .map_err(|e| Error::Custom(format!("clause pattern failed to compile: {e}")))
}

/// Split `alias.column<suffix>` into its parts, stripping backticks.
fn split(text: &str) -> Result<(String, String, String)> {
    let caps = clause_regex()?.captures(text.trim()).ok_or_else(|| {
        Error::usage(
            UsageErrorKind::MalformedClause,
            format!("Failed to parse clause: {text}"),
        )
    })?;
    let alias = caps[1].replace('`', "");
    let column = caps[2].replace('`', "");
    if alias.is_empty() || column.is_empty() {
        return Err(Error::usage(
            UsageErrorKind::MalformedClause,
            format!("Failed to parse clause: {text}"),
        ));
    }
    Ok((alias, column, caps[3].to_string()))
}

/// Whether the suffix ends in `IN ?` (covers `NOT IN ?`).
fn is_list_suffix(suffix: &str) -> bool {
    let upper = suffix.trim_end().to_ascii_uppercase();
    let Some(head) = upper.strip_suffix('?') else {
        return false;
    };
    let head = head.trim_end();
    head.strip_suffix("IN").is_some_and(|before| {
        before.is_empty() || before.ends_with(|c: char| c.is_whitespace())
    })
}

/// A parsed WHERE predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    alias: String,
    column: String,
    suffix: String,
    values: Vec<Value>,
}

impl Clause {
    /// Parse `text` and bind `values` to it.
    ///
    /// NULL values are dropped. The remaining count must match the `?`
    /// placeholders in the suffix, except for `IN ?`, which takes one or
    /// more values.
    ///
    /// ```
    /// use rowmodel_query::Clause;
    /// use rowmodel_core::Value;
    ///
    /// let c = Clause::parse("p.id IN ?", vec![Value::Int(3), Value::Int(2), Value::Int(1)]).unwrap();
    /// assert_eq!(c.alias(), "p");
    /// assert_eq!(c.to_sql(), "`p`.`id` IN (?, ?, ?)");
    /// ```
    pub fn parse(text: &str, values: Vec<Value>) -> Result<Self> {
        let (alias, column, suffix) = split(text)?;
        let values: Vec<Value> = values.into_iter().filter(|v| !v.is_null()).collect();

        if is_list_suffix(&suffix) {
            if values.is_empty() {
                return Err(Error::usage(
                    UsageErrorKind::ArityMismatch,
                    format!("{text} needs at least one value"),
                ));
            }
        } else {
            let placeholders = suffix.matches('?').count();
            if placeholders != values.len() {
                return Err(Error::usage(
                    UsageErrorKind::ArityMismatch,
                    format!(
                        "{text} has {placeholders} placeholder(s) but {} value(s) were bound",
                        values.len()
                    ),
                ));
            }
        }

        Ok(Self {
            alias,
            column,
            suffix,
            values,
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Operator tail as written, e.g. `" = ?"`.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Bound non-null values, in placeholder order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// `` `alias`.`column` <suffix> `` with list placeholders expanded.
    pub fn to_sql(&self) -> String {
        let target = quote_qualified(&self.alias, &self.column);
        if is_list_suffix(&self.suffix) {
            let trimmed = self.suffix.trim_end();
            let head = &trimmed[..trimmed.len() - 1];
            let list = vec!["?"; self.values.len()].join(", ");
            format!("{target}{head}({list})")
        } else {
            format!("{target}{}", self.suffix)
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    /// `DESC` in any case is descending; anything else is ascending.
    pub fn parse(direction: &str) -> Self {
        if direction.trim().eq_ignore_ascii_case("DESC") {
            OrderDirection::Desc
        } else {
            OrderDirection::Asc
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    alias: String,
    column: String,
    direction: OrderDirection,
}

impl OrderBy {
    /// Parse `alias.column`. A trailing operator is a malformed clause.
    pub fn parse(text: &str, direction: &str) -> Result<Self> {
        let (alias, column, suffix) = split(text)?;
        if !suffix.trim().is_empty() {
            return Err(Error::usage(
                UsageErrorKind::MalformedClause,
                format!("Failed to parse order clause: {text}"),
            ));
        }
        Ok(Self {
            alias,
            column,
            direction: OrderDirection::parse(direction),
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn direction(&self) -> OrderDirection {
        self.direction
    }

    pub fn to_sql(&self) -> String {
        format!(
            "{} {}",
            quote_qualified(&self.alias, &self.column),
            self.direction.as_str()
        )
    }
}
