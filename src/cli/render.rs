use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Row as ComfyRow, Table};
use rust_decimal::Decimal;
use serde::Serialize;
use terminal_size::{Width as TermWidth, terminal_size};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::client::Transaction;

use super::{Cli, OutputFormat};

#[derive(Debug, Clone, Serialize)]
pub(super) struct KeyValueRow {
    pub key: String,
    pub value: String,
}

impl KeyValueRow {
    pub fn new(key: &str, value: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            value: value.into(),
        }
    }
}

pub(super) trait TableRow {
    const HEADERS: &'static [&'static str];
    fn cells(&self) -> Vec<Cell>;
}

pub(super) fn terminal_width() -> Option<u16> {
    if let Ok(cols) = std::env::var("COLUMNS")
        && let Ok(v) = cols.parse::<u16>()
    {
        return Some(v);
    }
    terminal_size().map(|(TermWidth(w), _)| w)
}

/// Cuts `s` to at most `max` display columns, marking the cut with `…`.
pub(super) fn truncate_for_table(s: &str, max: usize) -> String {
    let s = s.trim();
    if s.width() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in s.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

pub(super) fn format_money(amount: Decimal) -> String {
    let abs = amount.abs().round_dp(2);
    if amount.is_sign_negative() && !abs.is_zero() {
        format!("-${abs:.2}")
    } else {
        format!("${abs:.2}")
    }
}

/// Right-aligned; negative amounts in red when `color` is on.
pub(super) fn money_cell(color: bool, amount: Decimal) -> Cell {
    let cell = Cell::new(format_money(amount)).set_alignment(CellAlignment::Right);
    if color && amount.is_sign_negative() {
        cell.fg(Color::Red)
    } else {
        cell
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth);

    if let Some(w) = terminal_width() {
        table.set_width(w);
    }
    table
}

pub(super) fn render_output<T: Serialize + TableRow>(
    cli: &Cli,
    rows: Vec<T>,
) -> anyhow::Result<()> {
    match cli.output {
        OutputFormat::Json => {
            let s = serde_json::to_string_pretty(&rows)?;
            println!("{s}");
            Ok(())
        }
        OutputFormat::Table => {
            let mut table = new_table();
            table.set_header(ComfyRow::from(
                T::HEADERS
                    .iter()
                    .map(|h| header_cell(cli, h))
                    .collect::<Vec<_>>(),
            ));
            for row in rows {
                table.add_row(ComfyRow::from(row.cells()));
            }
            println!("{table}");
            Ok(())
        }
    }
}

pub(super) fn header_cell(cli: &Cli, text: &str) -> Cell {
    if super::should_color(cli) {
        Cell::new(text)
            .add_attribute(Attribute::Bold)
            .fg(Color::Cyan)
    } else {
        Cell::new(text)
    }
}

pub(super) fn render_transactions_table(cli: &Cli, items: &[Transaction]) {
    let mut table = new_table();
    table.set_header(ComfyRow::from(
        ["date", "name", "amount", "category", "id"]
            .iter()
            .map(|h| header_cell(cli, h))
            .collect::<Vec<_>>(),
    ));

    let color = super::should_color(cli);
    for t in items {
        table.add_row(ComfyRow::from(vec![
            Cell::new(t.date.map(|d| d.to_string()).unwrap_or_default()),
            Cell::new(truncate_for_table(t.name.as_deref().unwrap_or(""), 40)),
            money_cell(color, t.amount()),
            Cell::new(t.category_label()),
            Cell::new(t.id.as_str()),
        ]));
    }

    println!("{table}");
}
