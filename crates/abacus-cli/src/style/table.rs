//! Table formatting using comfy-table.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use super::colors::SemanticStyle;

fn base_table() -> Table {
    let mut table = Table::new();

    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table
}

/// Creates a styled table with a header row.
///
/// Columns whose header is listed in `numeric` are right-aligned.
pub fn data_table(columns: &[&str], numeric: &[&str], rows: &[Vec<String>]) -> Table {
    let mut table = base_table();

    // Add header row with bold styling
    let header_cells: Vec<Cell> = columns
        .iter()
        .map(|col| {
            if super::no_color() {
                Cell::new(col)
            } else {
                Cell::new(col)
                    .add_attribute(Attribute::Bold)
                    .fg(Color::Cyan)
            }
        })
        .collect();
    table.set_header(header_cells);

    for (index, col) in columns.iter().enumerate() {
        if numeric.contains(col) {
            if let Some(column) = table.column_mut(index) {
                column.set_cell_alignment(CellAlignment::Right);
            }
        }
    }

    // Add data rows
    for row in rows {
        table.add_row(row);
    }

    table
}

/// Prints a data table followed by a row count footer.
pub fn print_data_table(columns: &[&str], numeric: &[&str], rows: &[Vec<String>], noun: &str) {
    if rows.is_empty() {
        println!("{}", format!("(no {noun}s)").muted());
        return;
    }

    let table = data_table(columns, numeric, rows);
    println!("{table}");

    let count = rows.len();
    let word = if count == 1 {
        noun.to_string()
    } else {
        format!("{noun}s")
    };
    println!("{}", format!("({count} {word})").muted());
}

/// Creates a key-value info table (two columns: key and value).
pub fn info_table(entries: &[(&str, String)]) -> Table {
    let mut table = base_table();

    for (key, value) in entries {
        let key_cell = if super::no_color() {
            Cell::new(key)
        } else {
            Cell::new(key).fg(Color::DarkGrey)
        };
        table.add_row(vec![key_cell, Cell::new(value)]);
    }

    table
}

/// Prints a key-value info table.
pub fn print_info_table(entries: &[(&str, String)]) {
    let table = info_table(entries);
    println!("{table}");
}
