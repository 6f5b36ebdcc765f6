// ============================================================================
// Reporting Aggregator
// ============================================================================
//
// Per-day series over an inclusive date range. Each day covers
// 00:00:00 through 23:59:59.999999 local time; empty days report zero.
// A range spans at most MAX_REPORT_DAYS days, since every day costs
// store queries.
//
// ============================================================================

use std::sync::Arc;

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::order::OrderStatus;
use crate::domain::ErrorKind;
use crate::store::{ReportSource, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Invalid date range: {begin} is after {end}")]
    InvalidDateRange { begin: NaiveDate, end: NaiveDate },

    #[error("Date range {begin}..={end} exceeds {max_days} days")]
    RangeTooLong { begin: NaiveDate, end: NaiveDate, max_days: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Longest range a single report may cover (a leap year, inclusive)
pub const MAX_REPORT_DAYS: u64 = 366;

impl ReportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReportError::InvalidDateRange { .. } | ReportError::RangeTooLong { .. } => {
                ErrorKind::BusinessRuleViolation
            }
            ReportError::Store(e) => e.kind(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnoverReport {
    pub date_list: Vec<NaiveDate>,
    pub turnover_list: Vec<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReport {
    pub date_list: Vec<NaiveDate>,
    pub new_user_list: Vec<u64>,
    pub total_user_list: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReport {
    pub date_list: Vec<NaiveDate>,
    pub order_count_list: Vec<u64>,
    pub valid_order_count_list: Vec<u64>,
    pub total_order_count: u64,
    pub valid_order_count: u64,
    /// valid / total; 0.0 for an empty range
    pub order_completion_rate: f64,
}

/// Every date from `begin` to `end`, both included. At most
/// `MAX_REPORT_DAYS` dates.
pub fn day_sequence(begin: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, ReportError> {
    if begin > end {
        return Err(ReportError::InvalidDateRange { begin, end });
    }
    let days = (end - begin).num_days() as u64 + 1;
    if days > MAX_REPORT_DAYS {
        return Err(ReportError::RangeTooLong { begin, end, max_days: MAX_REPORT_DAYS });
    }
    Ok(begin.iter_days().take_while(|day| *day <= end).collect())
}

/// First and last instant of `day`
pub fn day_bounds(day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = day.and_time(NaiveTime::MIN);
    let end = day
        .checked_add_days(Days::new(1))
        .map(|next| next.and_time(NaiveTime::MIN) - TimeDelta::microseconds(1))
        .unwrap_or(NaiveDateTime::MAX);
    (start, end)
}

pub struct ReportService {
    source: Arc<dyn ReportSource>,
}

impl ReportService {
    pub fn new(source: Arc<dyn ReportSource>) -> Self {
        Self { source }
    }

    /// Completed-order revenue per day
    pub async fn turnover(&self, begin: NaiveDate, end: NaiveDate) -> Result<TurnoverReport, ReportError> {
        let date_list = day_sequence(begin, end)?;

        let mut turnover_list = Vec::with_capacity(date_list.len());
        for day in &date_list {
            let (from, to) = day_bounds(*day);
            let sum = self
                .source
                .sum_amount(from, to, OrderStatus::Completed)
                .await?
                .unwrap_or(Decimal::ZERO);
            turnover_list.push(sum);
        }

        tracing::debug!(%begin, %end, days = date_list.len(), "Turnover report computed");
        Ok(TurnoverReport { date_list, turnover_list })
    }

    /// New users per day and the running total at each day's end
    pub async fn users(&self, begin: NaiveDate, end: NaiveDate) -> Result<UserReport, ReportError> {
        let date_list = day_sequence(begin, end)?;

        let mut new_user_list = Vec::with_capacity(date_list.len());
        let mut total_user_list = Vec::with_capacity(date_list.len());
        for day in &date_list {
            let (from, to) = day_bounds(*day);
            new_user_list.push(self.source.count_users(Some(from), to).await?);
            total_user_list.push(self.source.count_users(None, to).await?);
        }

        Ok(UserReport { date_list, new_user_list, total_user_list })
    }

    /// Orders per day, completed orders per day, and the completion rate
    pub async fn orders(&self, begin: NaiveDate, end: NaiveDate) -> Result<OrderReport, ReportError> {
        let date_list = day_sequence(begin, end)?;

        let mut order_count_list = Vec::with_capacity(date_list.len());
        let mut valid_order_count_list = Vec::with_capacity(date_list.len());
        for day in &date_list {
            let (from, to) = day_bounds(*day);
            order_count_list.push(self.source.count_orders(from, to, None).await?);
            valid_order_count_list.push(
                self.source
                    .count_orders(from, to, Some(OrderStatus::Completed))
                    .await?,
            );
        }

        let total_order_count: u64 = order_count_list.iter().sum();
        let valid_order_count: u64 = valid_order_count_list.iter().sum();
        let order_completion_rate = if total_order_count == 0 {
            0.0
        } else {
            valid_order_count as f64 / total_order_count as f64
        };

        Ok(OrderReport {
            date_list,
            order_count_list,
            valid_order_count_list,
            total_order_count,
            valid_order_count,
            order_completion_rate,
        })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
