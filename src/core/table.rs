use std::fmt;

use indexmap::{IndexMap, IndexSet};

pub const TYPE_FIELD: &str = "Type";
pub const RESULT_FIELD: &str = "Result";

/// A spreadsheet value, kept typed so it is written back as it was read.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Excel serial date-time (days since 1899-12-30).
    DateTime(f64),
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Text content; non-text cells read as blank.
    pub fn as_text(&self) -> &str {
        match self {
            Cell::Text(s) => s,
            _ => "",
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) | Cell::DateTime(n) => write!(f, "{n}"),
            Cell::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Bool(b)
    }
}

static EMPTY: Cell = Cell::Empty;

/// One spreadsheet row, keyed by header name in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: IndexMap<String, Cell>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Cell>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Missing fields read as `Cell::Empty`.
    pub fn get(&self, field: &str) -> &Cell {
        self.fields.get(field).unwrap_or(&EMPTY)
    }

    pub fn text(&self, field: &str) -> &str {
        self.get(field).as_text()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.values().all(Cell::is_blank)
    }

    /// True when `Type` equals `category` and `Result` is Warning or Error.
    pub fn is_flagged(&self, category: &str) -> bool {
        self.text(TYPE_FIELD).trim() == category
            && matches!(self.text(RESULT_FIELD).trim(), "Warning" | "Error")
    }
}

impl<K: Into<String>, V: Into<Cell>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub rows: Vec<Record>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, record: Record) {
        self.rows.push(record);
    }

    /// Union of every row's fields, in first-seen order.
    pub fn columns(&self) -> Vec<String> {
        let mut seen: IndexSet<&str> = IndexSet::new();
        for row in &self.rows {
            for field in row.fields() {
                seen.insert(field);
            }
        }
        seen.into_iter().map(str::to_string).collect()
    }

    pub fn filtered(&self, category: &str) -> Table {
        Table {
            rows: self
                .rows
                .iter()
                .filter(|r| r.is_flagged(category))
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn columns_are_union_in_first_seen_order() {
        let mut t = Table::new();
        t.push(row(&[("Type", "User"), ("Result", "Warning")]));
        t.push(row(&[("Type", "Group"), ("Message", "m"), ("Result", "Error")]));
        assert_eq!(t.columns(), vec!["Type", "Result", "Message"]);
        assert_eq!(t.rows[0].get("Message"), &Cell::Empty);
    }

    #[test]
    fn flagged_requires_category_and_warning_or_error() {
        assert!(row(&[("Type", "User"), ("Result", "Warning")]).is_flagged("User"));
        assert!(row(&[("Type", "User"), ("Result", "Error")]).is_flagged("User"));
        assert!(!row(&[("Type", "User"), ("Result", "Success")]).is_flagged("User"));
        assert!(!row(&[("Type", "Group"), ("Result", "Error")]).is_flagged("User"));
        assert!(!row(&[("Result", "Error")]).is_flagged("User"));
    }

    #[test]
    fn non_text_cells_never_match_type_or_result() {
        let mut r = row(&[("Type", "User")]);
        r.insert("Result", 1.0);
        assert!(!r.is_flagged("User"));
        r.insert("Modified", Cell::DateTime(45413.5));
        assert!(!r.is_empty());
        assert_eq!(r.get("Modified").to_string(), "45413.5");
    }

    #[test]
    fn filtered_rows_are_a_subset_in_order() {
        let mut t = Table::new();
        t.push(row(&[("Type", "User"), ("Result", "Warning"), ("Id", "1")]));
        t.push(row(&[("Type", "Group"), ("Result", "Error"), ("Id", "2")]));
        t.push(row(&[("Type", "User"), ("Result", "Error"), ("Id", "3")]));
        let users = t.filtered("User");
        let ids: Vec<&str> = users.rows.iter().map(|r| r.text("Id")).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert!(users.rows.iter().all(|r| t.rows.contains(r)));
    }
}
