use std::fmt::Write as _;

/// Horizontal placement of a column's cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Right,
}

/// Renders an aligned plain-text table. Counts read better right-aligned, so
/// callers pass one [`Align`] per column; missing entries default to left.
pub fn render_table(headers: &[String], rows: &[Vec<String>], aligns: &[Align]) -> String {
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths, aligns));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &widths, &[]));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, aligns));
    }
    output
}

fn format_row(values: &[String], widths: &[usize], aligns: &[Align]) -> String {
    let cells = widths
        .iter()
        .enumerate()
        .map(|(idx, width)| {
            let value = values
                .get(idx)
                .map(|v| v.replace(['\n', '\r', '\t'], " "))
                .unwrap_or_default();
            let padding = " ".repeat(width.saturating_sub(display_width(&value)));
            match aligns.get(idx).copied().unwrap_or_default() {
                Align::Left => format!("{value}{padding}"),
                Align::Right => format!("{padding}{value}"),
            }
        })
        .collect::<Vec<_>>();
    cells.join("  ").trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}
