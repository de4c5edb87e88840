use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::filter::FilterCriteria;
use crate::types::{BudgetId, CategoryId, Period, TransactionId, UserId};

/// Label both the report endpoint and the detail records use for transactions without a
/// category. Report buckets and drill-down filtering must agree on it, so it lives here and
/// nowhere else.
pub const UNCATEGORIZED_LABEL: &str = "Uncategorized";

#[derive(Debug, Clone)]
pub enum ClientMode {
    Http {
        base_url: String,
        token: Option<String>,
    },
    Fixtures(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ExpenseClient {
    mode: ClientMode,
}

impl ExpenseClient {
    pub fn new(mode: ClientMode) -> Self {
        Self { mode }
    }

    pub fn list_categories(&self) -> anyhow::Result<Vec<Category>> {
        self.get_json("categories", "/categories", &[])
    }

    /// Server-filtered transaction list; only constrained filter dimensions are sent.
    pub fn list_transactions(
        &self,
        user_id: &UserId,
        criteria: &FilterCriteria,
    ) -> anyhow::Result<Vec<Transaction>> {
        let path = format!("/expenses/by-user/{user_id}");
        let items: Vec<Transaction> =
            self.get_json("transactions", &path, &criteria.to_query())?;
        Ok(match &self.mode {
            ClientMode::Fixtures(_) => items.into_iter().filter(|t| criteria.matches(t)).collect(),
            ClientMode::Http { .. } => items,
        })
    }

    pub fn monthly_report(&self, user_id: &UserId, period: Period) -> anyhow::Result<Report> {
        let path = format!("/reports/{user_id}");
        self.get_json("report", &path, &period_query(period))
    }

    /// Every transaction in `period`, regardless of category. Drill-down narrows this down by
    /// category label on the client.
    pub fn transactions_for_month(
        &self,
        user_id: &UserId,
        period: Period,
    ) -> anyhow::Result<Vec<Transaction>> {
        let path = format!("/expenses/by-user/{user_id}/by-category");
        let items: Vec<Transaction> =
            self.get_json("transactions", &path, &period_query(period))?;
        Ok(match &self.mode {
            ClientMode::Fixtures(_) => items
                .into_iter()
                .filter(|t| t.date.is_some_and(|d| period.contains(d)))
                .collect(),
            ClientMode::Http { .. } => items,
        })
    }

    /// The user's overall budget against the month's spending. The server picks the current
    /// month when `period` is `None`.
    pub fn budget_status(
        &self,
        user_id: &UserId,
        period: Option<Period>,
    ) -> anyhow::Result<BudgetStatus> {
        let path = format!("/budget/status/{user_id}");
        let query = period.map(period_query).unwrap_or_default();
        self.get_json("budget_status", &path, &query)
    }

    pub fn category_budgets(&self, user_id: &UserId) -> anyhow::Result<Vec<CategoryBudget>> {
        let path = format!("/category-budgets/by-user/{user_id}");
        let items: Vec<CategoryBudget> = self.get_json("category_budgets", &path, &[])?;
        Ok(match &self.mode {
            ClientMode::Fixtures(_) => items
                .into_iter()
                .filter(|b| b.user_id.as_ref().is_none_or(|u| u == user_id))
                .collect(),
            ClientMode::Http { .. } => items,
        })
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        fixture: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> anyhow::Result<T> {
        match &self.mode {
            ClientMode::Fixtures(dir) => {
                let p = dir.join(format!("{fixture}.json"));
                let s = fs::read_to_string(&p)
                    .with_context(|| format!("reading fixture {}", p.display()))?;
                serde_json::from_str(&s)
                    .with_context(|| format!("unexpected {fixture} fixture shape"))
            }
            ClientMode::Http { base_url, token } => {
                let url = format!("{}/api{path}", base_url.trim_end_matches('/'));
                debug!(%url, ?query, "GET");

                let http = reqwest::blocking::Client::new();
                let mut req = http.get(&url).query(query);
                if let Some(t) = token.as_ref() {
                    req = req.bearer_auth(t);
                }

                let resp = req.send().with_context(|| format!("GET {url}"))?;
                let status = resp.status();
                if status == StatusCode::UNAUTHORIZED {
                    anyhow::bail!(
                        "unauthenticated (token missing/expired). Pass `--token` or set EXPENSES_TOKEN."
                    );
                }
                let body = resp.text()?;
                if !status.is_success() {
                    anyhow::bail!("{}", format_api_error(status, &body));
                }
                serde_json::from_str(&body)
                    .with_context(|| format!("unexpected {fixture} response shape"))
            }
        }
    }
}

fn period_query(period: Period) -> Vec<(&'static str, String)> {
    vec![
        ("month", period.month().to_string()),
        ("year", period.year().to_string()),
    ]
}

fn format_api_error(status: StatusCode, body: &str) -> String {
    let message = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map
            .get("message")
            .or_else(|| map.get("error"))
            .and_then(|m| m.as_str())
            .map(str::to_string),
        Ok(Value::String(s)) => Some(s),
        Ok(_) => None,
        Err(_) => Some(body.trim().to_string()).filter(|s| !s.is_empty()),
    };

    match message {
        Some(m) => format!("api error {}: {m}", status.as_u16()),
        None => format!("api error {}", status.as_u16()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "WireCategory")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<CategoryId>,
}

#[derive(Deserialize)]
struct ParentRef {
    id: CategoryId,
}

// The categories endpoint nests the parent entity; older payloads carry a bare `parentId`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCategory {
    id: CategoryId,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parent_id: Option<CategoryId>,
    #[serde(default)]
    parent: Option<ParentRef>,
}

impl From<WireCategory> for Category {
    fn from(w: WireCategory) -> Self {
        Self {
            id: w.id,
            name: w.name.unwrap_or_default(),
            description: w.description.filter(|d| !d.trim().is_empty()),
            parent_id: w.parent.map(|p| p.id).or(w.parent_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub date: Option<NaiveDate>,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub recurring: Option<bool>,
    pub recurrence: Option<String>,
}

impl Transaction {
    pub fn amount(&self) -> Decimal {
        self.amount.unwrap_or(Decimal::ZERO)
    }

    /// The report bucket this transaction is counted under.
    pub fn category_label(&self) -> &str {
        match self.category_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => UNCATEGORIZED_LABEL,
        }
    }
}

/// Server-computed monthly aggregate. Nothing in the client recomputes these figures.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(default)]
    pub total_expenses: Decimal,
    #[serde(default, deserialize_with = "deserialize_bucket_totals")]
    pub category_totals: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub top_category: Option<String>,
    #[serde(default)]
    pub remaining_budget: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateBucket {
    pub category_label: String,
    pub total: Decimal,
}

impl Report {
    pub fn buckets(&self) -> Vec<AggregateBucket> {
        self.category_totals
            .iter()
            .map(|(label, total)| AggregateBucket {
                category_label: label.clone(),
                total: *total,
            })
            .collect()
    }

    pub fn bucket(&self, label: &str) -> Option<AggregateBucket> {
        let label = normalize_label(label);
        self.category_totals
            .get(label)
            .map(|total| AggregateBucket {
                category_label: label.to_string(),
                total: *total,
            })
    }
}

/// Budget figures exactly as the server computed them; nothing here is recalculated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetStatus {
    #[serde(default)]
    pub id: Option<BudgetId>,
    pub total_budget: Decimal,
    pub total_expenses: Decimal,
    pub remaining_budget: Decimal,
    /// Set by the server once the remainder drops to the alert threshold.
    #[serde(default)]
    pub near_limit: bool,
    #[serde(default)]
    pub alert_threshold: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBudget {
    pub id: BudgetId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub category_id: CategoryId,
    pub amount: Decimal,
}

fn normalize_label(label: &str) -> &str {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        UNCATEGORIZED_LABEL
    } else {
        trimmed
    }
}

// Blank labels are folded into the sentinel bucket so they line up with
// `Transaction::category_label`.
fn deserialize_bucket_totals<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, Decimal>, D::Error> {
    let raw: Option<BTreeMap<String, Option<Decimal>>> = Option::deserialize(deserializer)?;
    let mut out = BTreeMap::new();
    for (label, total) in raw.unwrap_or_default() {
        *out.entry(normalize_label(&label).to_string())
            .or_insert(Decimal::ZERO) += total.unwrap_or(Decimal::ZERO);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn category_parent_accepts_nested_object_or_id() {
        let nested: Category = serde_json::from_value(json!({
            "id": 2, "name": "Groceries", "parent": { "id": 1, "name": "Food" }
        }))
        .unwrap();
        let flat: Category =
            serde_json::from_value(json!({ "id": 2, "name": "Groceries", "parentId": "1" }))
                .unwrap();
        let root: Category =
            serde_json::from_value(json!({ "id": 1, "name": "Food", "parent": null })).unwrap();

        assert_eq!(nested.parent_id, Some(CategoryId::from("1")));
        assert_eq!(nested, flat);
        assert_eq!(root.parent_id, None);
    }

    #[test]
    fn transaction_label_falls_back_to_sentinel() {
        let t: Transaction =
            serde_json::from_value(json!({ "id": 1, "amount": 3.5, "categoryName": "  " }))
                .unwrap();
        assert_eq!(t.category_label(), UNCATEGORIZED_LABEL);
        assert_eq!(t.amount(), Decimal::new(35, 1));
    }

    #[test]
    fn report_folds_blank_labels_into_sentinel() {
        let r: Report = serde_json::from_value(json!({
            "totalExpenses": 30.0,
            "categoryTotals": { "": 10.0, "Uncategorized": 5.0, "Food": 15.0 }
        }))
        .unwrap();
        assert_eq!(
            r.bucket("").map(|b| b.total),
            Some(Decimal::new(15, 0))
        );
        assert_eq!(r.buckets().len(), 2);
        assert_eq!(r.top_category, None);
    }

    #[test]
    fn budget_status_keeps_server_figures() {
        let b: BudgetStatus = serde_json::from_value(json!({
            "id": 3, "userId": 1, "totalBudget": 500.0, "totalExpenses": 460.25,
            "remainingBudget": 39.75, "nearLimit": true, "alertThreshold": 50.0
        }))
        .unwrap();
        assert_eq!(b.remaining_budget, Decimal::new(3975, 2));
        assert!(b.near_limit);
        assert_eq!(b.alert_threshold, Some(Decimal::new(50, 0)));
        assert_eq!(b.id, Some(BudgetId::from("3")));
    }

    #[test]
    fn api_error_message_is_extracted() {
        assert_eq!(
            format_api_error(StatusCode::BAD_REQUEST, r#"{"message":"User not found"}"#),
            "api error 400: User not found"
        );
        assert_eq!(
            format_api_error(StatusCode::BAD_GATEWAY, ""),
            "api error 502"
        );
        assert_eq!(
            format_api_error(StatusCode::BAD_REQUEST, "Budget exceeded."),
            "api error 400: Budget exceeded."
        );
    }
}
