//! Transaction filter state and its encodings.
//!
//! `FilterCriteria` is owned by whichever view edits it; everything downstream
//! (query coalescing, HTTP query strings, fixture filtering) only reads it.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::client::Transaction;
use crate::types::CategoryId;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    pub name: String,
    pub category_id: Option<CategoryId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.name.trim().is_empty()
            && self.category_id.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.min_amount.is_none()
            && self.max_amount.is_none()
    }

    /// Query parameters for the transactions endpoint. Unconstrained dimensions are left out.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        let name = self.name.trim();
        if !name.is_empty() {
            out.push(("name", name.to_string()));
        }
        if let Some(id) = self.category_id.as_ref().filter(|id| !id.as_str().is_empty()) {
            out.push(("categoryId", id.to_string()));
        }
        if let Some(d) = self.start_date {
            out.push(("startDate", d.format("%Y-%m-%d").to_string()));
        }
        if let Some(d) = self.end_date {
            out.push(("endDate", d.format("%Y-%m-%d").to_string()));
        }
        if let Some(a) = self.min_amount {
            out.push(("minAmount", a.normalize().to_string()));
        }
        if let Some(a) = self.max_amount {
            out.push(("maxAmount", a.normalize().to_string()));
        }
        out
    }

    /// The same predicate the server applies to `GET /expenses/by-user/{id}`.
    pub fn matches(&self, t: &Transaction) -> bool {
        if let Some(id) = self.category_id.as_ref()
            && t.category_id.as_ref() != Some(id)
        {
            return false;
        }
        if let Some(start) = self.start_date
            && t.date.is_none_or(|d| d < start)
        {
            return false;
        }
        if let Some(end) = self.end_date
            && t.date.is_none_or(|d| d > end)
        {
            return false;
        }
        if let Some(min) = self.min_amount
            && t.amount.is_none_or(|a| a < min)
        {
            return false;
        }
        if let Some(max) = self.max_amount
            && t.amount.is_none_or(|a| a > max)
        {
            return false;
        }
        let needle = self.name.trim().to_lowercase();
        if !needle.is_empty() {
            let hay = t.name.as_deref().unwrap_or("").to_lowercase();
            if !hay.contains(&needle) {
                return false;
            }
        }
        true
    }

    pub fn apply(&mut self, edit: FilterEdit) {
        match edit {
            FilterEdit::Name(v) => self.name = v,
            FilterEdit::Category(v) => self.category_id = Some(v),
            FilterEdit::StartDate(v) => self.start_date = Some(v),
            FilterEdit::EndDate(v) => self.end_date = Some(v),
            FilterEdit::MinAmount(v) => self.min_amount = Some(v),
            FilterEdit::MaxAmount(v) => self.max_amount = Some(v),
            FilterEdit::Clear(None) => *self = FilterCriteria::default(),
            FilterEdit::Clear(Some(field)) => match field {
                FilterField::Name => self.name.clear(),
                FilterField::Category => self.category_id = None,
                FilterField::StartDate => self.start_date = None,
                FilterField::EndDate => self.end_date = None,
                FilterField::MinAmount => self.min_amount = None,
                FilterField::MaxAmount => self.max_amount = None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Name,
    Category,
    StartDate,
    EndDate,
    MinAmount,
    MaxAmount,
}

impl FromStr for FilterField {
    type Err = FilterEditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "name" => Ok(FilterField::Name),
            "category" => Ok(FilterField::Category),
            "from" | "start" => Ok(FilterField::StartDate),
            "to" | "end" => Ok(FilterField::EndDate),
            "min" => Ok(FilterField::MinAmount),
            "max" => Ok(FilterField::MaxAmount),
            other => Err(FilterEditError::UnknownField(other.to_string())),
        }
    }
}

/// One line typed into an interactive filter view, e.g. `name coffee` or `clear min`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterEdit {
    Name(String),
    Category(CategoryId),
    StartDate(NaiveDate),
    EndDate(NaiveDate),
    MinAmount(Decimal),
    MaxAmount(Decimal),
    Clear(Option<FilterField>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterEditError {
    #[error("empty filter edit")]
    Empty,
    #[error("unknown filter field `{0}` (expected name, category, from, to, min or max)")]
    UnknownField(String),
    #[error("`{0}` needs a value")]
    MissingValue(&'static str),
    #[error("invalid date `{0}` (use YYYY-MM-DD or MM-DD-YYYY)")]
    InvalidDate(String),
    #[error("invalid amount `{0}`")]
    InvalidAmount(String),
}

impl FromStr for FilterEdit {
    type Err = FilterEditError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Err(FilterEditError::Empty);
        }
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((h, r)) => (h, r.trim()),
            None => (line, ""),
        };

        let require = |field: &'static str| {
            if rest.is_empty() {
                Err(FilterEditError::MissingValue(field))
            } else {
                Ok(rest)
            }
        };

        match head.to_lowercase().as_str() {
            // `name` with no value is a legitimate "match everything".
            "name" => Ok(FilterEdit::Name(rest.to_string())),
            "category" => Ok(FilterEdit::Category(CategoryId::from(require("category")?))),
            "from" | "start" => {
                let v = require("from")?;
                parse_date(v)
                    .map(FilterEdit::StartDate)
                    .ok_or_else(|| FilterEditError::InvalidDate(v.to_string()))
            }
            "to" | "end" => {
                let v = require("to")?;
                parse_date(v)
                    .map(FilterEdit::EndDate)
                    .ok_or_else(|| FilterEditError::InvalidDate(v.to_string()))
            }
            "min" => parse_amount(require("min")?).map(FilterEdit::MinAmount),
            "max" => parse_amount(require("max")?).map(FilterEdit::MaxAmount),
            "clear" => {
                if rest.is_empty() {
                    Ok(FilterEdit::Clear(None))
                } else {
                    Ok(FilterEdit::Clear(Some(rest.parse()?)))
                }
            }
            other => Err(FilterEditError::UnknownField(other.to_string())),
        }
    }
}

fn parse_amount(s: &str) -> Result<Decimal, FilterEditError> {
    Decimal::from_str(s.trim()).map_err(|_| FilterEditError::InvalidAmount(s.to_string()))
}

/// Accepts `YYYY-MM-DD` and `MM-DD-YYYY`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%m-%d-%Y"))
        .ok()
}
