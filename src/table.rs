//! Elastic plain-text tables for query results and schema previews.

use std::fmt::Write as _;

use itertools::Itertools;

const COLUMN_GAP: &str = "  ";
const MIN_RULE_WIDTH: usize = 3;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let headers = headers.iter().map(|h| flatten_cell(h)).collect::<Vec<_>>();
    let rows = rows
        .iter()
        .map(|row| {
            row.iter()
                .take(headers.len())
                .map(|cell| flatten_cell(cell))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let mut widths = headers.iter().map(|h| h.chars().count().max(1)).collect::<Vec<_>>();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let rule = widths
        .iter()
        .map(|w| "-".repeat((*w).max(MIN_RULE_WIDTH)))
        .collect::<Vec<_>>();

    let mut output = String::new();
    let _ = writeln!(output, "{}", render_line(&headers, &widths));
    let _ = writeln!(output, "{}", rule.join(COLUMN_GAP));
    for row in &rows {
        let _ = writeln!(output, "{}", render_line(row, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn render_line(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .join(COLUMN_GAP)
        .trim_end()
        .to_string()
}

fn flatten_cell(value: &str) -> String {
    value
        .chars()
        .map(|c| if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn aligns_columns_and_trims_trailing_space() {
        let rendered = render_table(
            &strings(&["id", "name"]),
            &[strings(&["1", "Alice"]), strings(&["2", "Bo"])],
        );
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines, vec!["id  name", "---  -----", "1   Alice", "2   Bo"]);
    }

    #[test]
    fn control_characters_become_spaces() {
        let rendered = render_table(&strings(&["note"]), &[strings(&["a\nb\tc"])]);
        assert_eq!(rendered.lines().nth(2), Some("a b c"));
    }
}
