//! Parameterized WHERE clause builder shared by the query repositories

use chrono::{DateTime, Utc};

/// Query parameter that can be bound to ClickHouse queries.
/// All user-controllable values MUST go through this enum for SQL injection safety.
#[derive(Clone, Debug, PartialEq)]
pub(super) enum QueryParam {
    String(String),
    /// Timestamps as microseconds
    Int64(i64),
}

/// Collects conditions and their parameter values, then binds all
/// parameters to a ClickHouse query in placeholder order.
///
/// Column names are never parameterized; callers only pass literals.
#[derive(Default, Debug)]
pub(super) struct ConditionBuilder {
    conditions: Vec<String>,
    params: Vec<QueryParam>,
}

impl ConditionBuilder {
    /// Start with the mandatory tenant scope
    pub(super) fn for_tenant(tenant_id: &str) -> Self {
        let mut cb = Self::default();
        cb.add_eq("tenant_id", tenant_id);
        cb
    }

    /// `column = ?`
    pub(super) fn add_eq(&mut self, column: &str, value: &str) {
        self.conditions.push(format!("{} = ?", column));
        self.params.push(QueryParam::String(value.to_string()));
    }

    /// `column >= fromUnixTimestamp64Micro(?)`
    pub(super) fn add_timestamp_gte(&mut self, column: &str, ts: &DateTime<Utc>) {
        self.conditions
            .push(format!("{} >= fromUnixTimestamp64Micro(?)", column));
        self.params.push(QueryParam::Int64(ts.timestamp_micros()));
    }

    /// `column <= fromUnixTimestamp64Micro(?)`
    pub(super) fn add_timestamp_lte(&mut self, column: &str, ts: &DateTime<Utc>) {
        self.conditions
            .push(format!("{} <= fromUnixTimestamp64Micro(?)", column));
        self.params.push(QueryParam::Int64(ts.timestamp_micros()));
    }

    /// Inclusive time window on `column`
    pub(super) fn add_time_range(&mut self, column: &str, start: &DateTime<Utc>, end: &DateTime<Utc>) {
        self.add_timestamp_gte(column, start);
        self.add_timestamp_lte(column, end);
    }

    /// WHERE clause body (without the keyword)
    pub(super) fn build(&self) -> String {
        self.conditions.join(" AND ")
    }

    pub(super) fn bind_to(&self, mut query: clickhouse::query::Query) -> clickhouse::query::Query {
        for param in &self.params {
            query = match param {
                QueryParam::String(s) => query.bind(s),
                QueryParam::Int64(i) => query.bind(i),
            };
        }
        query
    }

    #[cfg(test)]
    pub(super) fn params(&self) -> &[QueryParam] {
        &self.params
    }
}
