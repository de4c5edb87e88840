use std::collections::HashMap;

use comfy_table::Cell;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::client::{BudgetStatus, ExpenseClient};
use crate::types::{BudgetId, CategoryId, Period};

use super::render::{KeyValueRow, TableRow, format_money, money_cell, render_output};
use super::{BudgetCmd, Cli, OutputFormat, require_user};

/// Shown for budgets whose category no longer exists.
const UNKNOWN_CATEGORY: &str = "Unknown";

pub(super) fn run_budget(cli: &Cli, client: &ExpenseClient, cmd: BudgetCmd) -> anyhow::Result<()> {
    let user = require_user(cli)?;
    match cmd {
        BudgetCmd::Status(args) => {
            let period = args.resolve_if_given()?;
            let status = client.budget_status(&user, period)?;
            if status.near_limit {
                eprintln!("warning: {}", limit_message(&status));
            }
            render_status(cli, period, &status)
        }
        BudgetCmd::Categories => {
            let names: HashMap<CategoryId, String> = client
                .list_categories()?
                .into_iter()
                .map(|c| (c.id, c.name))
                .collect();
            let rows = client
                .category_budgets(&user)?
                .into_iter()
                .map(|b| CategoryBudgetRow {
                    category: names
                        .get(&b.category_id)
                        .cloned()
                        .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
                    id: b.id,
                    category_id: b.category_id,
                    amount: b.amount,
                    color: super::should_color(cli),
                })
                .collect::<Vec<_>>();
            render_output(cli, rows)
        }
    }
}

fn limit_message(status: &BudgetStatus) -> String {
    if status.remaining_budget.is_sign_negative() && !status.remaining_budget.is_zero() {
        format!(
            "over budget by {}",
            format_money(status.remaining_budget.abs())
        )
    } else {
        format!(
            "nearing the budget limit: {} left",
            format_money(status.remaining_budget)
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusJson<'a> {
    period: Option<Period>,
    #[serde(flatten)]
    status: &'a BudgetStatus,
}

fn render_status(cli: &Cli, period: Option<Period>, status: &BudgetStatus) -> anyhow::Result<()> {
    match cli.output {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&StatusJson { period, status })?
            );
            Ok(())
        }
        OutputFormat::Table => render_output(
            cli,
            vec![
                KeyValueRow::new(
                    "period",
                    period.map(|p| p.to_string()).unwrap_or_else(|| "current".to_string()),
                ),
                KeyValueRow::new("total_budget", format_money(status.total_budget)),
                KeyValueRow::new("total_expenses", format_money(status.total_expenses)),
                KeyValueRow::new("remaining", format_money(status.remaining_budget)),
                KeyValueRow::new(
                    "alert_threshold",
                    status
                        .alert_threshold
                        .map(format_money)
                        .unwrap_or_default(),
                ),
                KeyValueRow::new("near_limit", if status.near_limit { "yes" } else { "no" }),
            ],
        ),
    }
}

#[derive(Debug, Clone, Serialize)]
struct CategoryBudgetRow {
    id: BudgetId,
    category_id: CategoryId,
    category: String,
    amount: Decimal,
    #[serde(skip)]
    color: bool,
}

impl TableRow for CategoryBudgetRow {
    const HEADERS: &'static [&'static str] = &["category", "amount", "category_id", "id"];

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::new(&self.category),
            money_cell(self.color, self.amount),
            Cell::new(self.category_id.as_str()),
            Cell::new(self.id.as_str()),
        ]
    }
}
