use std::path::Path;

use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, open_workbook_auto};
use rust_xlsxwriter::{Format, Workbook};

use crate::core::{Cell, Record, Table};

/// Loads the first worksheet. Row 1 is the header; blank header cells become
/// `ColumnN` and repeated names get a ` (2)`, ` (3)`… suffix. Rows with no
/// value in any cell are dropped. Cell types are preserved.
pub fn read_table(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook: {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("workbook has no worksheets: {}", path.display()))?
        .with_context(|| format!("failed to read worksheet: {}", path.display()))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Table::new());
    };
    let columns = header_names(header);

    let mut table = Table::new();
    for row in rows {
        let record: Record = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), row.get(i).map(to_cell).unwrap_or_default()))
            .collect();
        if !record.is_empty() {
            table.push(record);
        }
    }
    Ok(table)
}

fn to_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) if dt.is_duration() => Cell::Number(dt.as_f64()),
        Data::DateTime(dt) => Cell::DateTime(dt.as_f64()),
        // ISO date strings and cell errors are kept as their text.
        other => Cell::Text(other.to_string()),
    }
}

fn header_names(header: &[Data]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(header.len());
    for (i, cell) in header.iter().enumerate() {
        let base = match cell {
            Data::Empty => String::new(),
            other => other.to_string().trim().to_string(),
        };
        let base = if base.is_empty() {
            format!("Column{}", i + 1)
        } else {
            base
        };
        let mut name = base.clone();
        let mut n = 2;
        while names.contains(&name) {
            name = format!("{base} ({n})");
            n += 1;
        }
        names.push(name);
    }
    names
}

/// Writes one worksheet per `(name, table)` in the given order, replacing
/// any existing file. Headers are the table's column union; cells a row does
/// not carry stay blank.
pub fn write_workbook(path: &Path, sheets: &[(&str, &Table)]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory: {}", parent.display()))?;
    }

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let date = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    for (name, table) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(*name)
            .with_context(|| format!("invalid sheet name: {name}"))?;

        let columns = table.columns();
        for (c, column) in columns.iter().enumerate() {
            let col = u16::try_from(c).context("too many columns for one sheet")?;
            worksheet.write_string_with_format(0, col, column.as_str(), &bold)?;
        }

        for (r, record) in table.rows.iter().enumerate() {
            let row = u32::try_from(r + 1).context("too many rows for one sheet")?;
            for (c, column) in columns.iter().enumerate() {
                let col = u16::try_from(c).context("too many columns for one sheet")?;
                match record.get(column) {
                    Cell::Empty => {}
                    Cell::Text(s) => {
                        if !s.is_empty() {
                            worksheet.write_string(row, col, s.as_str())?;
                        }
                    }
                    Cell::Number(n) => {
                        worksheet.write_number(row, col, *n)?;
                    }
                    Cell::Bool(b) => {
                        worksheet.write_boolean(row, col, *b)?;
                    }
                    Cell::DateTime(serial) => {
                        worksheet.write_number_with_format(row, col, *serial, &date)?;
                    }
                }
            }
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("failed to write workbook: {}", path.display()))?;
    Ok(())
}
