use comfy_table::Cell;
use futures::StreamExt;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::client::{ExpenseClient, Report};
use crate::drilldown::{self, DetailRequest, Drilldown, DrilldownCommand, DrilldownCoordinator};
use crate::outcome::{IntegrityWarning, Outcome};
use crate::types::{Period, UserId};

use super::render::{
    KeyValueRow, TableRow, format_money, money_cell, render_output, render_transactions_table,
};
use super::{Cli, OutputFormat, ReportCmd, interactive, require_user};

pub(super) fn run_report(cli: &Cli, client: &ExpenseClient, cmd: ReportCmd) -> anyhow::Result<()> {
    let user = require_user(cli)?;
    match cmd {
        ReportCmd::Show(args) => {
            let period = args.resolve()?;
            let report = client.monthly_report(&user, period)?;
            render_report(cli, period, &report)
        }
        ReportCmd::Drill { label, period } => {
            let period = period.resolve()?;
            let report = client.monthly_report(&user, period)?;
            let mut coordinator = DrilldownCoordinator::new(period, report);
            let request = coordinator.select_bucket(&label, period)?;
            let result = client.transactions_for_month(&user, request.period);
            match coordinator.complete(request.seq, result) {
                Some(outcome) => render_drilldown(cli, &outcome),
                None => anyhow::bail!("drill-down result was superseded"),
            }
        }
        ReportCmd::Explore(args) => explore(cli, client, &user, args.resolve()?),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct BucketRow {
    category_label: String,
    total: Decimal,
    /// Percent of the month's total, one decimal place.
    share: Option<Decimal>,
    #[serde(skip)]
    color: bool,
}

impl TableRow for BucketRow {
    const HEADERS: &'static [&'static str] = &["category", "total", "share"];

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::new(&self.category_label),
            money_cell(self.color, self.total),
            Cell::new(
                self.share
                    .map(|s| format!("{s:.1}%"))
                    .unwrap_or_default(),
            )
            .set_alignment(comfy_table::CellAlignment::Right),
        ]
    }
}

fn share_of(total: Decimal, of: Decimal) -> Option<Decimal> {
    if of.is_zero() {
        return None;
    }
    Some((total / of * Decimal::ONE_HUNDRED).round_dp(1))
}

fn bucket_rows(cli: &Cli, report: &Report) -> Vec<BucketRow> {
    let color = super::should_color(cli);
    report
        .buckets()
        .into_iter()
        .map(|b| BucketRow {
            share: share_of(b.total, report.total_expenses),
            category_label: b.category_label,
            total: b.total,
            color,
        })
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportJson<'a> {
    period: Period,
    total_expenses: Decimal,
    top_category: Option<&'a str>,
    remaining_budget: Option<Decimal>,
    buckets: Vec<BucketRow>,
}

fn render_report(cli: &Cli, period: Period, report: &Report) -> anyhow::Result<()> {
    match cli.output {
        OutputFormat::Json => {
            let out = ReportJson {
                period,
                total_expenses: report.total_expenses,
                top_category: report.top_category.as_deref(),
                remaining_budget: report.remaining_budget,
                buckets: bucket_rows(cli, report),
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
        OutputFormat::Table => {
            render_output(cli, bucket_rows(cli, report))?;
            render_output(
                cli,
                vec![
                    KeyValueRow::new("period", period.to_string()),
                    KeyValueRow::new("total", format_money(report.total_expenses)),
                    KeyValueRow::new(
                        "top_category",
                        report.top_category.clone().unwrap_or_default(),
                    ),
                    KeyValueRow::new(
                        "remaining_budget",
                        report
                            .remaining_budget
                            .map(format_money)
                            .unwrap_or_default(),
                    ),
                ],
            )
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DrilldownJson<'a> {
    #[serde(flatten)]
    drilldown: &'a Drilldown,
    warning: Option<&'a IntegrityWarning>,
}

fn render_drilldown(cli: &Cli, outcome: &Outcome<Drilldown>) -> anyhow::Result<()> {
    let drilldown = match outcome {
        Outcome::Ready(d) | Outcome::Flagged { data: d, .. } => d,
        Outcome::Failed(failure) => anyhow::bail!("{failure}"),
    };
    if let Some(warning) = outcome.warning() {
        eprintln!("warning: {warning}");
    }

    match cli.output {
        OutputFormat::Json => {
            let out = DrilldownJson {
                drilldown,
                warning: outcome.warning(),
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Table => {
            render_transactions_table(cli, &drilldown.records);
            println!(
                "{} {}: {} across {} transaction(s)",
                drilldown.label,
                drilldown.period,
                format_money(drilldown.actual),
                drilldown.records.len()
            );
        }
    }
    Ok(())
}

fn explore(
    cli: &Cli,
    client: &ExpenseClient,
    user: &UserId,
    period: Period,
) -> anyhow::Result<()> {
    let report = client.monthly_report(user, period)?;
    render_report(cli, period, &report)?;
    let mut coordinator = DrilldownCoordinator::new(period, report);
    let mut render_error = None;

    interactive::runtime()?.block_on(async {
        let commands = interactive::stdin_lines().filter_map(move |line| {
            let client = client.clone();
            let user = user.clone();
            async move {
                let args = match ExploreLine::from(line) {
                    ExploreLine::Select(label) => return Some(DrilldownCommand::Select(label)),
                    ExploreLine::Month(args) => args,
                };
                match switch_month(client, user, &args).await {
                    Ok((period, report)) => {
                        if let Err(err) = render_report(cli, period, &report) {
                            eprintln!("error: {err:#}");
                        }
                        Some(DrilldownCommand::Replace { period, report })
                    }
                    Err(err) => {
                        eprintln!("error: {err:#}");
                        None
                    }
                }
            }
        });

        let fetch = |request: DetailRequest| {
            let client = client.clone();
            let user = user.clone();
            async move {
                tokio::task::spawn_blocking(move || {
                    client.transactions_for_month(&user, request.period)
                })
                .await?
            }
        };

        drilldown::drive(&mut coordinator, commands, fetch, |outcome| {
            if let Outcome::Failed(failure) = outcome {
                eprintln!("error: {failure}");
                return;
            }
            if let Err(err) = render_drilldown(cli, outcome) {
                render_error.get_or_insert(err);
            }
        })
        .await;
    });

    match render_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// A line typed into `report explore`: `month ...` switches period, anything else names a
/// bucket.
#[derive(Debug, PartialEq, Eq)]
enum ExploreLine {
    Select(String),
    Month(String),
}

impl From<String> for ExploreLine {
    fn from(line: String) -> Self {
        match line.split_once(char::is_whitespace) {
            Some(("month", args)) => ExploreLine::Month(args.trim().to_string()),
            None if line == "month" => ExploreLine::Month(String::new()),
            _ => ExploreLine::Select(line),
        }
    }
}

async fn switch_month(
    client: ExpenseClient,
    user: UserId,
    args: &str,
) -> anyhow::Result<(Period, Report)> {
    let mut parts = args.split_whitespace();
    let (Some(month), Some(year), None) = (parts.next(), parts.next(), parts.next()) else {
        anyhow::bail!("usage: month <1-12> <yyyy>");
    };
    let period = Period::new(month.parse()?, year.parse()?)?;
    let report =
        tokio::task::spawn_blocking(move || client.monthly_report(&user, period)).await??;
    Ok((period, report))
}
