use std::io::IsTerminal;
use std::path::PathBuf;

use chrono::{Datelike, Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::Cell;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::client::{ClientMode, ExpenseClient};
use crate::config::{load_optional_token, token_path};
use crate::filter::{FilterCriteria, parse_date};
use crate::tree::SiblingOrder;
use crate::types::{CategoryId, Period, UserId};

mod budgets;
mod categories;
mod interactive;
mod render;
mod report;
mod transactions;
use render::{KeyValueRow, TableRow};

#[derive(Debug, Clone, Copy, ValueEnum, Serialize, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "expenses")]
#[command(about = "CLI for the expense tracker backend", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub output: OutputFormat,

    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    pub color: ColorMode,

    #[arg(
        long,
        global = true,
        env = "EXPENSES_BASE_URL",
        default_value = "http://localhost:8081"
    )]
    pub base_url: String,

    /// Whose expenses and reports to load.
    #[arg(long, global = true, env = "EXPENSES_USER_ID")]
    pub user_id: Option<UserId>,

    #[arg(long, global = true, env = "EXPENSES_TOKEN")]
    pub token: Option<String>,

    #[arg(long, global = true, env = "EXPENSES_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    #[arg(long, global = true, env = "EXPENSES_FIXTURES_DIR", hide = true)]
    pub fixtures_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    Categories {
        #[command(subcommand)]
        cmd: CategoriesCmd,
    },
    Transactions {
        #[command(subcommand)]
        cmd: TransactionsCmd,
    },
    Report {
        #[command(subcommand)]
        cmd: ReportCmd,
    },
    Budget {
        #[command(subcommand)]
        cmd: BudgetCmd,
    },
    Version,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum CategorySort {
    /// Keep the order the server returned.
    #[default]
    Input,
    /// Alphabetical (case-insensitive) among siblings.
    Name,
}

impl From<CategorySort> for SiblingOrder {
    fn from(sort: CategorySort) -> Self {
        match sort {
            CategorySort::Input => SiblingOrder::Input,
            CategorySort::Name => SiblingOrder::Name,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum CategoriesCmd {
    List(CategoriesListArgs),
    Tree {
        #[arg(long, value_enum, default_value_t = CategorySort::Input)]
        sort: CategorySort,
    },
    Show {
        id: CategoryId,
    },
    /// Categories that may become the new parent of `id`.
    Parents {
        id: CategoryId,
    },
}

#[derive(Debug, Clone, Args)]
pub struct CategoriesListArgs {
    #[arg(long, value_enum, default_value_t = CategorySort::Input)]
    pub sort: CategorySort,

    /// Filter by name substring (case-insensitive).
    #[arg(long)]
    pub name_contains: Option<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum TransactionsCmd {
    List(TransactionFilterArgs),
    /// Re-query as filter edits arrive on stdin, one per line (`name coffee`, `min 10`,
    /// `clear max`, `clear`).
    Watch(TransactionsWatchArgs),
}

#[derive(Debug, Clone, Args)]
pub struct TransactionFilterArgs {
    /// Name substring (case-insensitive).
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub category_id: Option<CategoryId>,

    /// Earliest date (supports YYYY-MM-DD and MM-DD-YYYY).
    #[arg(long, value_parser = parse_date_arg)]
    pub from: Option<NaiveDate>,

    /// Latest date (supports YYYY-MM-DD and MM-DD-YYYY).
    #[arg(long, value_parser = parse_date_arg)]
    pub to: Option<NaiveDate>,

    #[arg(long)]
    pub min: Option<Decimal>,

    #[arg(long)]
    pub max: Option<Decimal>,
}

impl TransactionFilterArgs {
    pub fn to_criteria(&self) -> FilterCriteria {
        FilterCriteria {
            name: self.name.clone().unwrap_or_default(),
            category_id: self.category_id.clone(),
            start_date: self.from,
            end_date: self.to,
            min_amount: self.min,
            max_amount: self.max,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct TransactionsWatchArgs {
    /// Quiet period after the last edit before querying.
    #[arg(long, default_value_t = 500)]
    pub debounce_ms: u64,

    #[command(flatten)]
    pub filters: TransactionFilterArgs,
}

#[derive(Debug, Clone, Args)]
pub struct PeriodArgs {
    /// 1-12; defaults to the current month.
    #[arg(long)]
    pub month: Option<u32>,

    /// Defaults to the current year.
    #[arg(long)]
    pub year: Option<i32>,
}

impl PeriodArgs {
    pub fn resolve(&self) -> anyhow::Result<Period> {
        resolve_period(self.month, self.year, Local::now().date_naive())
    }

    /// `None` when neither flag was passed, leaving the month to the server.
    pub fn resolve_if_given(&self) -> anyhow::Result<Option<Period>> {
        if self.month.is_none() && self.year.is_none() {
            return Ok(None);
        }
        self.resolve().map(Some)
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum ReportCmd {
    Show(PeriodArgs),
    /// Transactions behind one category total of the monthly report.
    Drill {
        label: String,
        #[command(flatten)]
        period: PeriodArgs,
    },
    /// Pick report categories from stdin, one per line; `month <m> <yyyy>` switches month.
    Explore(PeriodArgs),
}

#[derive(Debug, Clone, Subcommand)]
pub enum BudgetCmd {
    /// Overall budget, spending and remainder for a month.
    Status(PeriodArgs),
    /// Per-category budget amounts.
    Categories,
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    if let Command::Version = &cli.command {
        println!("expense-tracker-cli {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mode = match &cli.fixtures_dir {
        Some(dir) => ClientMode::Fixtures(dir.clone()),
        None => {
            let token = match cli.token.clone() {
                Some(t) => Some(t),
                None => load_optional_token(&cli.token_file.clone().unwrap_or_else(token_path))?,
            };
            ClientMode::Http {
                base_url: cli.base_url.clone(),
                token,
            }
        }
    };
    let client = ExpenseClient::new(mode);

    match &cli.command {
        Command::Categories { cmd } => categories::run_categories(&cli, &client, cmd.clone()),
        Command::Transactions { cmd } => {
            transactions::run_transactions(&cli, &client, cmd.clone())
        }
        Command::Report { cmd } => report::run_report(&cli, &client, cmd.clone()),
        Command::Budget { cmd } => budgets::run_budget(&cli, &client, cmd.clone()),
        Command::Version => Ok(()),
    }
}

impl TableRow for KeyValueRow {
    const HEADERS: &'static [&'static str] = &["key", "value"];

    fn cells(&self) -> Vec<Cell> {
        vec![Cell::new(&self.key), Cell::new(&self.value)]
    }
}

fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).ok_or_else(|| format!("invalid date {s:?} (use YYYY-MM-DD or MM-DD-YYYY)"))
}

fn resolve_period(month: Option<u32>, year: Option<i32>, today: NaiveDate) -> anyhow::Result<Period> {
    Period::new(
        month.unwrap_or_else(|| today.month()),
        year.unwrap_or_else(|| today.year()),
    )
}

fn require_user(cli: &Cli) -> anyhow::Result<UserId> {
    match cli.user_id.as_ref() {
        Some(id) if !id.as_str().is_empty() => Ok(id.clone()),
        _ => anyhow::bail!("missing user id. Pass `--user-id` or set EXPENSES_USER_ID."),
    }
}

fn should_color(cli: &Cli) -> bool {
    match cli.color {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => std::io::stdout().is_terminal(),
    }
}
