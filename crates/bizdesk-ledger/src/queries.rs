//! SQL for each ledger verb over a Tally export
//!
//! Every function takes a borrowed connection and returns the JSON record the
//! ledger adapter hands back: `status` is `success` when rows were found and
//! `no_data` otherwise. Amounts follow Tally's sign convention: negative
//! accounting amounts are debits, positive ones are credits.

use bizdesk_core::{CustomerMetric, LedgerQuery, SupplierMetric, TransactionType};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::debug;

use crate::analytics;

pub const CURRENCY: &str = "INR";

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const RECENT_TRANSACTIONS_PER_ITEM: i64 = 10;
/// Window used by payment_receipts when a bound is missing
const DEFAULT_RECEIPT_DAYS: i64 = 180;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("start date {start} is after end date {end}")]
    InvertedRange { start: String, end: String },

    #[error("limit must be positive, got {0}")]
    InvalidLimit(i64),

    #[error("forecast_periods must be positive, got {0}")]
    InvalidForecast(i64),

    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("spawn_blocking task panicked: {0}")]
    Task(String),
}

impl QueryError {
    /// Error code reported through the adapter
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sql(_) | Self::Task(_) => "query_failed",
            _ => "bad_query",
        }
    }
}

pub(crate) type QueryResult<T> = Result<T, QueryError>;

/// Run one ledger query. `now` stamps the record and is the default
/// as-of date for balances.
pub fn execute(conn: &Connection, query: &LedgerQuery, now: NaiveDateTime) -> QueryResult<Value> {
    debug!("Ledger query: {}", query.verb());
    let mut record = match query {
        LedgerQuery::AccountBalance {
            account_name,
            as_of,
        } => account_balance(conn, account_name, as_of.as_deref(), now.date())?,
        LedgerQuery::CashFlow {
            start_date,
            end_date,
        } => cash_flow(conn, start_date, end_date)?,
        LedgerQuery::ProfitLoss {
            start_date,
            end_date,
        } => profit_loss(conn, start_date, end_date)?,
        LedgerQuery::PaymentReceipts {
            transaction_type,
            start_date,
            end_date,
            party_name,
            limit,
        } => payment_receipts(
            conn,
            *transaction_type,
            start_date.as_deref(),
            end_date.as_deref(),
            party_name.as_deref(),
            *limit,
            now.date(),
        )?,
        LedgerQuery::LatestTransactions {
            transaction_type,
            limit,
            party_name,
        } => latest_transactions(conn, *transaction_type, *limit, party_name.as_deref())?,
        LedgerQuery::LedgerSummary {
            account_group,
            include_zero_balance,
        } => ledger_summary(conn, account_group.as_deref(), *include_zero_balance)?,
        LedgerQuery::VoucherDetails {
            voucher_number,
            voucher_type,
            start_date,
            end_date,
        } => voucher_details(
            conn,
            voucher_number.as_deref(),
            voucher_type.as_deref(),
            start_date.as_deref(),
            end_date.as_deref(),
        )?,
        LedgerQuery::FinancialAnalytics {
            analytics_type,
            query_focus,
            start_date,
            end_date,
            forecast_periods,
        } => analytics::financial_analytics(
            conn,
            *analytics_type,
            *query_focus,
            start_date.as_deref(),
            end_date.as_deref(),
            *forecast_periods,
            now.date(),
        )?,
        LedgerQuery::BusinessOverview { date_from, date_to } => {
            analytics::business_overview(conn, date_from.as_deref(), date_to.as_deref())?
        }
        LedgerQuery::KpiDashboard { date_from, date_to } => {
            analytics::kpi_dashboard(conn, date_from.as_deref(), date_to.as_deref())?
        }
        LedgerQuery::CrossFunctional {
            analysis_type,
            date_from,
            date_to,
        } => analytics::cross_functional(conn, *analysis_type, date_from.as_deref(), date_to.as_deref())?,
        LedgerQuery::StrategicInsights { focus_area } => {
            analytics::strategic_insights(conn, focus_area, now.date())?
        }
        LedgerQuery::SalesSummary {
            date_from,
            date_to,
            customer,
            voucher_type,
        } => sales_summary(
            conn,
            date_from.as_deref(),
            date_to.as_deref(),
            customer.as_deref(),
            voucher_type.as_deref(),
        )?,
        LedgerQuery::TopCustomers {
            metric,
            limit,
            date_from,
            date_to,
        } => top_customers(conn, *metric, *limit, date_from.as_deref(), date_to.as_deref())?,
        LedgerQuery::CustomerAnalysis {
            customer,
            date_from,
            date_to,
        } => analytics::customer_analysis(conn, customer.as_deref(), date_from.as_deref(), date_to.as_deref())?,
        LedgerQuery::RevenueAnalysis {
            period,
            date_from,
            date_to,
        } => analytics::revenue_analysis(conn, *period, date_from.as_deref(), date_to.as_deref())?,
        LedgerQuery::SalesPerformance { date_from, date_to } => {
            analytics::sales_performance(conn, date_from.as_deref(), date_to.as_deref())?
        }
        LedgerQuery::SalesAnalytics {
            analytics_type,
            query,
            date_from,
            date_to,
        } => analytics::sales_analytics(
            conn,
            *analytics_type,
            query.as_deref(),
            date_from.as_deref(),
            date_to.as_deref(),
        )?,
        LedgerQuery::StockSummary { godown, item } => {
            stock_summary(conn, godown.as_deref(), item.as_deref())?
        }
        LedgerQuery::ItemDetails { item_name } => item_details(conn, item_name)?,
        LedgerQuery::GodownSummary { godown } => godown_summary(conn, godown.as_deref())?,
        LedgerQuery::StockMovements {
            start_date,
            end_date,
            item_name,
        } => stock_movements(conn, start_date, end_date, item_name.as_deref())?,
        LedgerQuery::TopItems { limit, by_value } => top_items(conn, *limit, *by_value)?,
        LedgerQuery::InventoryAnalytics {
            analytics_type,
            query_focus,
            start_date,
            end_date,
            forecast_periods,
        } => analytics::inventory_analytics(
            conn,
            *analytics_type,
            *query_focus,
            start_date.as_deref(),
            end_date.as_deref(),
            *forecast_periods,
            now.date(),
        )?,
        LedgerQuery::PurchaseSummary {
            date_from,
            date_to,
            supplier,
        } => purchase_summary(conn, date_from.as_deref(), date_to.as_deref(), supplier.as_deref())?,
        LedgerQuery::TopSuppliers {
            metric,
            limit,
            date_from,
            date_to,
        } => top_suppliers(conn, *metric, *limit, date_from.as_deref(), date_to.as_deref())?,
        LedgerQuery::SupplierAnalysis {
            supplier,
            date_from,
            date_to,
        } => analytics::supplier_analysis(conn, supplier.as_deref(), date_from.as_deref(), date_to.as_deref())?,
        LedgerQuery::ProcurementAnalysis {
            period,
            date_from,
            date_to,
            category,
        } => analytics::procurement_analysis(
            conn,
            *period,
            date_from.as_deref(),
            date_to.as_deref(),
            category.as_deref(),
        )?,
        LedgerQuery::PurchasePerformance { date_from, date_to } => {
            analytics::purchase_performance(conn, date_from.as_deref(), date_to.as_deref())?
        }
        LedgerQuery::PurchaseAnalytics {
            analytics_type,
            query,
            date_from,
            date_to,
        } => analytics::purchase_analytics(
            conn,
            *analytics_type,
            query.as_deref(),
            date_from.as_deref(),
            date_to.as_deref(),
        )?,
    };

    if let Value::Object(map) = &mut record {
        map.insert(
            "timestamp".into(),
            Value::String(now.format(TIMESTAMP_FORMAT).to_string()),
        );
    }
    Ok(record)
}

pub(crate) fn no_data(message: impl Into<String>) -> Value {
    json!({ "status": "no_data", "message": message.into() })
}

pub(crate) fn parse_date(value: &str) -> QueryResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| QueryError::InvalidDate(value.to_string()))
}

pub(crate) fn check_optional_date(value: Option<&str>) -> QueryResult<()> {
    if let Some(v) = value {
        parse_date(v)?;
    }
    Ok(())
}

pub(crate) fn check_range(start: &str, end: &str) -> QueryResult<()> {
    if parse_date(start)? > parse_date(end)? {
        return Err(QueryError::InvertedRange {
            start: start.to_string(),
            end: end.to_string(),
        });
    }
    Ok(())
}

/// Optional bounds: each must parse, and from may not follow to
pub(crate) fn check_optional_range(from: Option<&str>, to: Option<&str>) -> QueryResult<()> {
    check_optional_date(from)?;
    check_optional_date(to)?;
    match (from, to) {
        (Some(from), Some(to)) => check_range(from, to),
        _ => Ok(()),
    }
}

pub(crate) fn check_limit(limit: i64) -> QueryResult<i64> {
    if limit <= 0 {
        return Err(QueryError::InvalidLimit(limit));
    }
    Ok(limit)
}

pub(crate) fn like(value: &str) -> SqlValue {
    SqlValue::Text(format!("%{}%", value.trim()))
}

/// Closing balance by account nature: debit-natured ledgers grow with
/// debits, credit-natured ones with credits
pub fn closing_balance(opening: f64, debits: f64, credits: f64, deemed_positive: bool) -> f64 {
    if deemed_positive {
        opening + debits - credits
    } else {
        opening + credits - debits
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// AND-joined WHERE conditions with their positional parameters
#[derive(Debug, Default)]
pub(crate) struct Filter {
    conditions: Vec<String>,
    pub(crate) params: Vec<SqlValue>,
}

impl Filter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn condition(&mut self, sql: &str) -> &mut Self {
        self.conditions.push(sql.to_string());
        self
    }

    pub(crate) fn bind(&mut self, sql: &str, value: SqlValue) -> &mut Self {
        self.conditions.push(sql.to_string());
        self.params.push(value);
        self
    }

    pub(crate) fn bind_opt(&mut self, sql: &str, value: Option<SqlValue>) -> &mut Self {
        if let Some(value) = value {
            self.bind(sql, value);
        }
        self
    }

    pub(crate) fn date_range(&mut self, column: &str, from: Option<&str>, to: Option<&str>) -> &mut Self {
        self.bind_opt(
            &format!("{column} >= ?"),
            from.map(|d| SqlValue::Text(d.trim().to_string())),
        );
        self.bind_opt(
            &format!("{column} <= ?"),
            to.map(|d| SqlValue::Text(d.trim().to_string())),
        )
    }

    pub(crate) fn sql(&self) -> String {
        if self.conditions.is_empty() {
            "1=1".to_string()
        } else {
            self.conditions.join(" AND ")
        }
    }
}

fn cell(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<{} bytes>", b.len())),
    }
}

/// Run a statement and return each row as a JSON object keyed by column name
pub(crate) fn records(conn: &Connection, sql: &str, params: &[SqlValue]) -> rusqlite::Result<Vec<Map<String, Value>>> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
        let mut record = Map::new();
        for (i, name) in names.iter().enumerate() {
            record.insert(name.clone(), cell(row.get_ref(i)?));
        }
        Ok(record)
    })?;
    let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

pub(crate) fn number(record: &Map<String, Value>, key: &str) -> f64 {
    record.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

pub(crate) fn field(record: &Map<String, Value>, key: &str) -> Value {
    record.get(key).cloned().unwrap_or(Value::Null)
}

pub(crate) fn text(record: &Map<String, Value>, key: &str) -> String {
    record
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn account_balance(
    conn: &Connection,
    account_name: &str,
    as_of: Option<&str>,
    today: NaiveDate,
) -> QueryResult<Value> {
    check_optional_date(as_of)?;

    let ledger = conn
        .query_row(
            "SELECT name, COALESCE(opening_balance, 0), COALESCE(is_deemedpositive, 0),
                    parent, description
             FROM mst_ledger
             WHERE name LIKE ?1 OR alias LIKE ?1
             ORDER BY (LOWER(name) = LOWER(?2)) DESC, name
             LIMIT 1",
            params![format!("%{}%", account_name.trim()), account_name.trim()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, i64>(2)? == 1,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            },
        )
        .optional()?;

    let Some((name, opening, deemed_positive, parent, description)) = ledger else {
        return Ok(no_data(format!("Account '{}' not found", account_name)));
    };

    let (credits, debits): (f64, f64) = match as_of {
        Some(date) => conn.query_row(
            "SELECT COALESCE(SUM(CASE WHEN a.amount > 0 THEN a.amount ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN a.amount < 0 THEN ABS(a.amount) ELSE 0 END), 0)
             FROM trn_accounting a
             JOIN trn_voucher v ON a.guid = v.guid
             WHERE a.ledger = ?1 AND v.date <= ?2",
            params![name, date.trim()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?,
        None => conn.query_row(
            "SELECT COALESCE(SUM(CASE WHEN amount > 0 THEN amount ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN amount < 0 THEN ABS(amount) ELSE 0 END), 0)
             FROM trn_accounting
             WHERE ledger = ?1",
            params![name],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?,
    };

    Ok(json!({
        "status": "success",
        "account_name": name,
        "balance": closing_balance(opening, debits, credits, deemed_positive),
        "opening_balance": opening,
        "total_credits": credits,
        "total_debits": debits,
        "currency": CURRENCY,
        "as_of_date": as_of.map(|d| d.trim().to_string()).unwrap_or_else(|| today.format(DATE_FORMAT).to_string()),
        "account_type": parent.unwrap_or_else(|| "Unknown".to_string()),
        "description": description.unwrap_or_default(),
    }))
}

fn cash_flow(conn: &Connection, start: &str, end: &str) -> QueryResult<Value> {
    check_range(start, end)?;

    let mut stmt = conn.prepare(
        "SELECT v.voucher_type, a.amount
         FROM trn_voucher v
         JOIN trn_accounting a ON v.guid = a.guid
         WHERE v.date BETWEEN ?1 AND ?2
           AND (a.ledger LIKE '%Cash%' OR a.ledger LIKE '%Bank%')
         ORDER BY v.date",
    )?;
    let rows = stmt
        .query_map(params![start.trim(), end.trim()], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                row.get::<_, f64>(1)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    if rows.is_empty() {
        let mut record = no_data(format!(
            "No cash transactions found for period {} to {}",
            start, end
        ));
        record["start_date"] = json!(start);
        record["end_date"] = json!(end);
        return Ok(record);
    }

    let mut inflow = 0.0;
    let mut outflow = 0.0;
    // (voucher type, inflow, outflow, count) in first-seen order
    let mut by_type: Vec<(String, f64, f64, u64)> = Vec::new();
    for (voucher_type, amount) in &rows {
        let index = match by_type.iter().position(|(t, ..)| t == voucher_type) {
            Some(i) => i,
            None => {
                by_type.push((voucher_type.clone(), 0.0, 0.0, 0));
                by_type.len() - 1
            }
        };
        let entry = &mut by_type[index];
        if *amount > 0.0 {
            inflow += amount;
            entry.1 += amount;
        } else {
            outflow += amount.abs();
            entry.2 += amount.abs();
        }
        entry.3 += 1;
    }

    let by_type: Map<String, Value> = by_type
        .into_iter()
        .map(|(t, i, o, c)| (t, json!({ "inflow": i, "outflow": o, "count": c })))
        .collect();

    Ok(json!({
        "status": "success",
        "start_date": start,
        "end_date": end,
        "total_inflow": inflow,
        "total_outflow": outflow,
        "net_cash_flow": inflow - outflow,
        "transaction_count": rows.len(),
        "cash_flow_by_type": by_type,
        "currency": CURRENCY,
    }))
}

fn profit_loss(conn: &Connection, start: &str, end: &str) -> QueryResult<Value> {
    check_range(start, end)?;

    let mut stmt = conn.prepare(
        "SELECT a.ledger, l.is_revenue, l.parent, SUM(a.amount)
         FROM trn_accounting a
         JOIN mst_ledger l ON a.ledger = l.name
         JOIN trn_voucher v ON a.guid = v.guid
         WHERE v.date BETWEEN ?1 AND ?2
           AND l.is_revenue IS NOT NULL
         GROUP BY a.ledger, l.is_revenue, l.parent
         ORDER BY l.is_revenue DESC, a.ledger",
    )?;
    let rows = stmt
        .query_map(params![start.trim(), end.trim()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)? == 1,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    if rows.is_empty() {
        return Ok(no_data(format!(
            "No P&L data found for period {} to {}",
            start, end
        )));
    }

    let mut income = Vec::new();
    let mut expenses = Vec::new();
    let mut total_income = 0.0;
    let mut total_expenses = 0.0;
    for (account, is_revenue, parent, net) in rows {
        let entry = json!({ "account_name": account, "parent": parent, "amount": net.abs() });
        if is_revenue {
            total_income += net.abs();
            income.push(entry);
        } else {
            total_expenses += net.abs();
            expenses.push(entry);
        }
    }

    Ok(json!({
        "status": "success",
        "start_date": start,
        "end_date": end,
        "total_income": total_income,
        "total_expenses": total_expenses,
        "net_profit": total_income - total_expenses,
        "income_accounts": income,
        "expense_accounts": expenses,
        "currency": CURRENCY,
    }))
}

fn voucher_type_filter(kind: TransactionType) -> &'static str {
    match kind {
        TransactionType::Payment => "v.voucher_type LIKE '%Payment%'",
        TransactionType::Receipt => "v.voucher_type LIKE '%Receipt%'",
        TransactionType::Both => {
            "(v.voucher_type LIKE '%Payment%' OR v.voucher_type LIKE '%Receipt%')"
        }
    }
}

fn latest_transactions(
    conn: &Connection,
    kind: TransactionType,
    limit: i64,
    party: Option<&str>,
) -> QueryResult<Value> {
    let limit = check_limit(limit)?;
    let mut filter = Filter::new();
    filter
        .condition(voucher_type_filter(kind))
        .bind_opt("v.party_name LIKE ?", party.map(like));
    let mut params = filter.params.clone();
    params.push(SqlValue::Integer(limit));

    let sql = format!(
        "SELECT v.voucher_number, v.voucher_type, v.date, v.party_name, v.narration,
                v.reference_number, SUM(ABS(a.amount)) AS total_amount
         FROM trn_voucher v
         JOIN trn_accounting a ON v.guid = a.guid
         WHERE {}
         GROUP BY v.voucher_number, v.voucher_type, v.date, v.party_name, v.narration,
                  v.reference_number
         ORDER BY v.date DESC, v.voucher_number DESC
         LIMIT ?",
        filter.sql()
    );
    let transactions = records(conn, &sql, &params)?;

    if transactions.is_empty() {
        return Ok(no_data("No payment or receipt transactions found"));
    }

    let total: f64 = transactions.iter().map(|t| number(t, "total_amount")).sum();
    Ok(json!({
        "status": "success",
        "transaction_type": kind,
        "transactions": transactions,
        "transaction_count": transactions.len(),
        "total_amount": total,
        "currency": CURRENCY,
    }))
}

/// Payments and receipts within a window. A missing bound replaces the
/// whole window with the last 180 days ending `today`.
fn payment_receipts(
    conn: &Connection,
    kind: TransactionType,
    start: Option<&str>,
    end: Option<&str>,
    party: Option<&str>,
    limit: Option<i64>,
    today: NaiveDate,
) -> QueryResult<Value> {
    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => {
            check_range(start, end)?;
            (start.trim().to_string(), end.trim().to_string())
        }
        _ => (
            (today - Duration::days(DEFAULT_RECEIPT_DAYS)).format(DATE_FORMAT).to_string(),
            today.format(DATE_FORMAT).to_string(),
        ),
    };
    let limit = limit.map(check_limit).transpose()?;

    let mut filter = Filter::new();
    filter
        .condition(voucher_type_filter(kind))
        .date_range("v.date", Some(start.as_str()), Some(end.as_str()))
        .bind_opt("v.party_name LIKE ?", party.map(like));
    let mut params = filter.params.clone();
    let limit_clause = match limit {
        Some(limit) => {
            params.push(SqlValue::Integer(limit));
            "LIMIT ?"
        }
        None => "",
    };

    let sql = format!(
        "SELECT v.voucher_number, v.voucher_type, v.date, v.party_name, v.narration,
                v.reference_number, SUM(ABS(a.amount)) AS amount
         FROM trn_voucher v
         JOIN trn_accounting a ON v.guid = a.guid
         WHERE {}
         GROUP BY v.voucher_number, v.voucher_type, v.date, v.party_name, v.narration,
                  v.reference_number
         ORDER BY v.date DESC, v.voucher_number DESC
         {}",
        filter.sql(),
        limit_clause
    );
    let transactions = records(conn, &sql, &params)?;

    if transactions.is_empty() {
        let mut record = no_data(format!(
            "No {} transactions found for period {} to {}",
            kind.as_str(),
            start,
            end
        ));
        record["transaction_type"] = json!(kind);
        record["start_date"] = json!(start);
        record["end_date"] = json!(end);
        return Ok(record);
    }

    let total: f64 = transactions.iter().map(|t| number(t, "amount")).sum();
    let note = match limit {
        Some(limit) => format!("Latest {} transactions from {} to {}", limit, start, end),
        None => format!("All transactions from {} to {}", start, end),
    };
    Ok(json!({
        "status": "success",
        "transaction_type": kind,
        "start_date": start,
        "end_date": end,
        "transactions": transactions,
        "total_amount": total,
        "transaction_count": transactions.len(),
        "currency": CURRENCY,
        "note": note,
    }))
}

fn ledger_summary(
    conn: &Connection,
    group: Option<&str>,
    include_zero_balance: bool,
) -> QueryResult<Value> {
    let mut filter = Filter::new();
    filter.bind_opt("l.parent LIKE ?", group.map(like));

    let sql = format!(
        "SELECT l.name, COALESCE(l.opening_balance, 0), l.parent, COALESCE(l.is_revenue, 0),
                COALESCE(l.is_deemedpositive, 0), l.description,
                COALESCE(SUM(CASE WHEN a.amount > 0 THEN a.amount ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN a.amount < 0 THEN ABS(a.amount) ELSE 0 END), 0)
         FROM mst_ledger l
         LEFT JOIN trn_accounting a ON l.name = a.ledger
         WHERE {}
         GROUP BY l.name, l.opening_balance, l.parent, l.is_revenue, l.is_deemedpositive,
                  l.description
         ORDER BY l.name",
        filter.sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(filter.params.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, i64>(3)? == 1,
                row.get::<_, i64>(4)? == 1,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, f64>(6)?,
                row.get::<_, f64>(7)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut accounts = Vec::new();
    let mut total_balance = 0.0;
    for (name, opening, parent, is_revenue, deemed_positive, description, credits, debits) in rows
    {
        let balance = closing_balance(opening, debits, credits, deemed_positive);
        if !include_zero_balance && balance == 0.0 && opening == 0.0 {
            continue;
        }
        total_balance += balance;
        accounts.push(json!({
            "account_name": name,
            "balance": balance,
            "opening_balance": opening,
            "parent": parent,
            "description": description,
            "account_nature": if deemed_positive { "Debit" } else { "Credit" },
            "is_revenue": is_revenue,
        }));
    }

    if accounts.is_empty() {
        return Ok(no_data("No ledger accounts found"));
    }

    Ok(json!({
        "status": "success",
        "total_accounts": accounts.len(),
        "accounts": accounts,
        "total_balance": total_balance,
        "currency": CURRENCY,
    }))
}

/// Vouchers matching every given criterion; the number matches exactly,
/// the type as a fragment
fn voucher_details(
    conn: &Connection,
    voucher_number: Option<&str>,
    voucher_type: Option<&str>,
    start: Option<&str>,
    end: Option<&str>,
) -> QueryResult<Value> {
    check_optional_range(start, end)?;
    let mut filter = Filter::new();
    filter
        .bind_opt(
            "v.voucher_number = ?",
            voucher_number.map(|n| SqlValue::Text(n.trim().to_string())),
        )
        .bind_opt("v.voucher_type LIKE ?", voucher_type.map(like))
        .date_range("v.date", start, end);

    let sql = format!(
        "SELECT v.voucher_number, v.voucher_type, v.date, v.party_name, v.narration,
                v.reference_number, v.reference_date,
                COUNT(a.guid) AS accounting_entries,
                COALESCE(SUM(ABS(a.amount)), 0) AS total_amount
         FROM trn_voucher v
         LEFT JOIN trn_accounting a ON v.guid = a.guid
         WHERE {}
         GROUP BY v.voucher_number, v.voucher_type, v.date, v.party_name, v.narration,
                  v.reference_number, v.reference_date
         ORDER BY v.date DESC, v.voucher_number",
        filter.sql()
    );
    let vouchers = records(conn, &sql, &filter.params)?;

    if vouchers.is_empty() {
        return Ok(match voucher_number {
            Some(number) => no_data(format!("No voucher numbered '{}'", number)),
            None => no_data("No vouchers found matching the criteria"),
        });
    }

    Ok(json!({
        "status": "success",
        "voucher_count": vouchers.len(),
        "vouchers": vouchers,
        "currency": CURRENCY,
    }))
}

fn sales_summary(
    conn: &Connection,
    from: Option<&str>,
    to: Option<&str>,
    customer: Option<&str>,
    voucher_type: Option<&str>,
) -> QueryResult<Value> {
    check_optional_range(from, to)?;
    let mut filter = Filter::new();
    filter
        .date_range("v.date", from, to)
        .bind_opt("v.party_name LIKE ?", customer.map(like))
        .bind_opt("v.voucher_type LIKE ?", voucher_type.map(like));

    let sql = format!(
        "SELECT COUNT(DISTINCT v.voucher_number) AS total_transactions,
                COUNT(DISTINCT v.party_name) AS unique_customers,
                COALESCE(SUM(CASE WHEN a.amount > 0 THEN a.amount ELSE 0 END), 0) AS total_revenue,
                COALESCE(AVG(CASE WHEN a.amount > 0 THEN a.amount ELSE 0 END), 0) AS avg_transaction_value,
                MIN(v.date) AS earliest_date,
                MAX(v.date) AS latest_date,
                COUNT(DISTINCT v.voucher_type) AS voucher_types
         FROM trn_voucher v
         LEFT JOIN trn_accounting a ON v.guid = a.guid
         WHERE {}",
        filter.sql()
    );
    let summary = records(conn, &sql, &filter.params)?.into_iter().next();
    let Some(summary) = summary.filter(|s| number(s, "total_transactions") > 0.0) else {
        return Ok(no_data("No sales data found"));
    };

    Ok(json!({
        "status": "success",
        "summary": {
            "total_transactions": field(&summary, "total_transactions"),
            "unique_customers": field(&summary, "unique_customers"),
            "total_revenue": round2(number(&summary, "total_revenue")),
            "avg_transaction_value": round2(number(&summary, "avg_transaction_value")),
            "period": format!(
                "{} to {}",
                text(&summary, "earliest_date"),
                text(&summary, "latest_date")
            ),
            "voucher_types": field(&summary, "voucher_types"),
        },
        "filters_applied": {
            "date_from": from,
            "date_to": to,
            "customer": customer,
            "voucher_type": voucher_type,
        },
        "currency": CURRENCY,
    }))
}

fn top_customers(
    conn: &Connection,
    metric: CustomerMetric,
    limit: i64,
    from: Option<&str>,
    to: Option<&str>,
) -> QueryResult<Value> {
    let limit = check_limit(limit)?;
    check_optional_range(from, to)?;
    let mut filter = Filter::new();
    filter
        .condition("v.party_name IS NOT NULL AND v.party_name != ''")
        .date_range("v.date", from, to);
    let mut params = filter.params.clone();
    params.push(SqlValue::Integer(limit));

    // Per-voucher subqueries keep inventory lines from multiplying the
    // accounting sums
    let sql = format!(
        "SELECT v.party_name AS customer_name,
                COUNT(DISTINCT v.voucher_number) AS transaction_count,
                ROUND(SUM(COALESCE((SELECT SUM(a.amount) FROM trn_accounting a
                                    WHERE a.guid = v.guid AND a.amount > 0), 0)), 2) AS total_revenue,
                ROUND(SUM(COALESCE((SELECT SUM(i.quantity) FROM trn_inventory i
                                    WHERE i.guid = v.guid AND i.quantity > 0), 0)), 2) AS total_quantity
         FROM trn_voucher v
         WHERE {}
         GROUP BY v.party_name
         ORDER BY {} DESC, v.party_name
         LIMIT ?",
        filter.sql(),
        match metric {
            CustomerMetric::Revenue => "total_revenue",
            CustomerMetric::Transactions => "transaction_count",
            CustomerMetric::Quantity => "total_quantity",
        }
    );
    let customers = records(conn, &sql, &params)?;

    if customers.is_empty() {
        return Ok(no_data("No customer data found"));
    }

    Ok(json!({
        "status": "success",
        "count": customers.len(),
        "top_customers": customers,
        "metric": metric,
        "limit": limit,
        "currency": CURRENCY,
    }))
}

fn stock_summary(conn: &Connection, godown: Option<&str>, item: Option<&str>) -> QueryResult<Value> {
    let mut filter = Filter::new();
    filter
        .bind_opt("i.godown LIKE ?", godown.map(like))
        .bind_opt("i.item LIKE ?", item.map(like));

    let sql = format!(
        "SELECT i.item AS item_name, i.godown,
                SUM(ABS(i.quantity)) AS quantity,
                COALESCE(AVG(i.rate), 0) AS avg_rate,
                SUM(ABS(i.amount)) AS total_value,
                COUNT(*) AS transaction_count
         FROM trn_inventory i
         JOIN trn_voucher v ON i.guid = v.guid
         WHERE {}
         GROUP BY i.item, i.godown
         ORDER BY SUM(ABS(i.amount)) DESC, i.item",
        filter.sql()
    );
    let items = records(conn, &sql, &filter.params)?;

    if items.is_empty() {
        return Ok(no_data("No stock data found for the specified criteria"));
    }

    let total_value: f64 = items.iter().map(|i| number(i, "total_value")).sum();
    let total_quantity: f64 = items.iter().map(|i| number(i, "quantity")).sum();
    Ok(json!({
        "status": "success",
        "summary": {
            "total_items": items.len(),
            "total_quantity": total_quantity,
            "total_value": total_value,
        },
        "stock_items": items,
        "filters_applied": { "godown": godown, "item": item },
        "currency": CURRENCY,
    }))
}

fn item_details(conn: &Connection, item_name: &str) -> QueryResult<Value> {
    let pattern = like(item_name);
    let master = records(
        conn,
        "SELECT name, parent AS parent_group, alias, part_number, uom AS unit_of_measure,
                COALESCE(opening_balance, 0) AS opening_balance,
                COALESCE(opening_rate, 0) AS opening_rate,
                COALESCE(opening_value, 0) AS opening_value,
                gst_hsn_code AS hsn_code, gst_rate, gst_taxability AS taxability
         FROM mst_stock_item
         WHERE name LIKE ?
         ORDER BY name
         LIMIT 1",
        std::slice::from_ref(&pattern),
    )?
    .into_iter()
    .next();

    let Some(master) = master else {
        return Ok(no_data(format!("Item '{}' not found", item_name)));
    };
    let exact = SqlValue::Text(text(&master, "name"));

    let transactions = records(
        conn,
        "SELECT i.quantity, i.rate, i.amount, i.godown, v.date, v.voucher_type,
                v.voucher_number, v.party_name
         FROM trn_inventory i
         JOIN trn_voucher v ON i.guid = v.guid
         WHERE i.item = ?
         ORDER BY v.date DESC
         LIMIT ?",
        &[exact.clone(), SqlValue::Integer(RECENT_TRANSACTIONS_PER_ITEM)],
    )?;
    let stock = records(
        conn,
        "SELECT godown, SUM(quantity) AS current_stock, COALESCE(AVG(rate), 0) AS avg_rate
         FROM trn_inventory
         WHERE item = ?
         GROUP BY godown
         ORDER BY godown",
        &[exact],
    )?;

    Ok(json!({
        "status": "success",
        "item_master": master,
        "current_stock": stock,
        "recent_transactions": transactions,
        "currency": CURRENCY,
    }))
}

fn godown_summary(conn: &Connection, godown: Option<&str>) -> QueryResult<Value> {
    let mut filter = Filter::new();
    filter
        .condition("i.godown IS NOT NULL AND i.godown != ''")
        .bind_opt("i.godown LIKE ?", godown.map(like));

    let sql = format!(
        "SELECT i.godown AS godown_name,
                COALESCE(g.parent, '') AS parent,
                COALESCE(g.address, '') AS address,
                COUNT(DISTINCT i.item) AS unique_items,
                SUM(ABS(i.quantity)) AS total_quantity,
                SUM(ABS(i.amount)) AS total_value,
                COALESCE(AVG(i.rate), 0) AS avg_rate
         FROM trn_inventory i
         LEFT JOIN mst_godown g ON g.name = i.godown
         WHERE {}
         GROUP BY i.godown, g.parent, g.address
         ORDER BY SUM(ABS(i.amount)) DESC, i.godown",
        filter.sql()
    );
    let godowns = records(conn, &sql, &filter.params)?;

    if godowns.is_empty() {
        return Ok(no_data("No godown data found"));
    }

    let total_value: f64 = godowns.iter().map(|g| number(g, "total_value")).sum();
    let total_quantity: f64 = godowns.iter().map(|g| number(g, "total_quantity")).sum();
    Ok(json!({
        "status": "success",
        "summary": {
            "total_godowns": godowns.len(),
            "total_value": total_value,
            "total_quantity": total_quantity,
        },
        "godowns": godowns,
        "currency": CURRENCY,
    }))
}

/// Inventory lines in a window, newest first, each tagged IN or OUT by the
/// sign of its quantity
fn stock_movements(conn: &Connection, start: &str, end: &str, item: Option<&str>) -> QueryResult<Value> {
    check_range(start, end)?;
    let mut filter = Filter::new();
    filter
        .date_range("v.date", Some(start), Some(end))
        .bind_opt("i.item LIKE ?", item.map(like));

    let sql = format!(
        "SELECT v.date, i.item, i.godown, i.quantity,
                COALESCE(i.rate, 0) AS rate, COALESCE(i.amount, 0) AS amount,
                v.voucher_type, v.voucher_number, v.party_name,
                CASE WHEN i.quantity > 0 THEN 'IN'
                     WHEN i.quantity < 0 THEN 'OUT'
                     ELSE 'NEUTRAL' END AS movement_type
         FROM trn_inventory i
         JOIN trn_voucher v ON i.guid = v.guid
         WHERE {}
         ORDER BY v.date DESC, i.item",
        filter.sql()
    );
    let movements = records(conn, &sql, &filter.params)?;

    if movements.is_empty() {
        let mut record = no_data(format!(
            "No stock movements found for period {} to {}",
            start, end
        ));
        record["start_date"] = json!(start);
        record["end_date"] = json!(end);
        return Ok(record);
    }

    let mut total_in = 0.0;
    let mut total_out = 0.0;
    for movement in &movements {
        let quantity = number(movement, "quantity");
        if quantity > 0.0 {
            total_in += quantity;
        } else {
            total_out += quantity.abs();
        }
    }

    Ok(json!({
        "status": "success",
        "start_date": start,
        "end_date": end,
        "movements": movements,
        "summary": {
            "total_movements": movements.len(),
            "total_in": total_in,
            "total_out": total_out,
            "net_movement": total_in - total_out,
        },
    }))
}

fn top_items(conn: &Connection, limit: i64, by_value: bool) -> QueryResult<Value> {
    let limit = check_limit(limit)?;
    let sorted_by = if by_value { "value" } else { "quantity" };
    let sql = format!(
        "SELECT item AS item_name,
                SUM(ABS(quantity)) AS total_quantity,
                COALESCE(AVG(rate), 0) AS avg_rate,
                SUM(ABS(amount)) AS total_value,
                COUNT(*) AS transaction_count,
                COUNT(DISTINCT godown) AS godown_count
         FROM trn_inventory
         GROUP BY item
         ORDER BY total_{} DESC, item
         LIMIT ?",
        sorted_by
    );
    let items = records(conn, &sql, &[SqlValue::Integer(limit)])?;

    if items.is_empty() {
        return Ok(no_data("No item data found"));
    }

    let total_value: f64 = items.iter().map(|i| number(i, "total_value")).sum();
    Ok(json!({
        "status": "success",
        "top_items": items,
        "criteria": { "limit": limit, "sorted_by": sorted_by, "total_value": total_value },
        "currency": CURRENCY,
    }))
}

pub(crate) const PURCHASE_VOUCHERS: &str = "(v.voucher_type LIKE '%Purchase%' OR v.voucher_type LIKE '%Bill%' \
     OR v.voucher_type LIKE '%Procurement%')";

fn purchase_summary(
    conn: &Connection,
    from: Option<&str>,
    to: Option<&str>,
    supplier: Option<&str>,
) -> QueryResult<Value> {
    check_optional_range(from, to)?;
    let mut filter = Filter::new();
    filter
        .condition(PURCHASE_VOUCHERS)
        .date_range("v.date", from, to)
        .bind_opt("v.party_name LIKE ?", supplier.map(like));

    let sql = format!(
        "SELECT COUNT(DISTINCT v.voucher_number) AS total_transactions,
                COUNT(DISTINCT v.party_name) AS unique_suppliers,
                COALESCE(SUM(CASE WHEN a.amount > 0 THEN a.amount ELSE 0 END), 0) AS total_purchase_cost,
                COALESCE(AVG(CASE WHEN a.amount > 0 THEN a.amount ELSE 0 END), 0) AS avg_transaction_value,
                MIN(v.date) AS earliest_date,
                MAX(v.date) AS latest_date,
                COUNT(DISTINCT v.voucher_type) AS voucher_types
         FROM trn_voucher v
         LEFT JOIN trn_accounting a ON v.guid = a.guid
         WHERE {}",
        filter.sql()
    );
    let summary = records(conn, &sql, &filter.params)?.into_iter().next();
    let Some(summary) = summary.filter(|s| number(s, "total_transactions") > 0.0) else {
        return Ok(no_data("No purchase data found"));
    };

    Ok(json!({
        "status": "success",
        "summary": {
            "total_transactions": field(&summary, "total_transactions"),
            "unique_suppliers": field(&summary, "unique_suppliers"),
            "total_purchase_cost": round2(number(&summary, "total_purchase_cost")),
            "avg_transaction_value": round2(number(&summary, "avg_transaction_value")),
            "period": format!(
                "{} to {}",
                text(&summary, "earliest_date"),
                text(&summary, "latest_date")
            ),
            "voucher_types": field(&summary, "voucher_types"),
        },
        "filters_applied": { "date_from": from, "date_to": to, "supplier": supplier },
        "currency": CURRENCY,
    }))
}

fn top_suppliers(
    conn: &Connection,
    metric: SupplierMetric,
    limit: i64,
    from: Option<&str>,
    to: Option<&str>,
) -> QueryResult<Value> {
    let limit = check_limit(limit)?;
    check_optional_range(from, to)?;
    let mut filter = Filter::new();
    filter
        .condition("v.party_name IS NOT NULL AND v.party_name != ''")
        .condition("a.amount > 0")
        .date_range("v.date", from, to);
    let mut params = filter.params.clone();
    params.push(SqlValue::Integer(limit));

    let sql = format!(
        "SELECT v.party_name AS supplier_name,
                COUNT(DISTINCT v.voucher_number) AS transaction_count,
                ROUND(SUM(a.amount), 2) AS total_spending,
                ROUND(AVG(a.amount), 2) AS avg_transaction_value,
                (SELECT COUNT(DISTINCT i.item) FROM trn_inventory i
                 JOIN trn_voucher pv ON i.guid = pv.guid
                 WHERE pv.party_name = v.party_name) AS unique_items
         FROM trn_voucher v
         JOIN trn_accounting a ON v.guid = a.guid
         WHERE {} AND {}
         GROUP BY v.party_name
         ORDER BY {} DESC, v.party_name
         LIMIT ?",
        PURCHASE_VOUCHERS,
        filter.sql(),
        match metric {
            SupplierMetric::Spending => "total_spending",
            SupplierMetric::Transactions => "transaction_count",
            SupplierMetric::Items => "unique_items",
        }
    );
    let suppliers = records(conn, &sql, &params)?;

    if suppliers.is_empty() {
        return Ok(no_data("No supplier data found"));
    }

    Ok(json!({
        "status": "success",
        "count": suppliers.len(),
        "top_suppliers": suppliers,
        "metric": metric,
        "limit": limit,
        "currency": CURRENCY,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closing_balance_by_nature() {
        // Debit-natured (asset): 1000 opening, 500 debits, 200 credits
        assert_eq!(closing_balance(1000.0, 500.0, 200.0, true), 1300.0);
        // Credit-natured (liability)
        assert_eq!(closing_balance(1000.0, 500.0, 200.0, false), 700.0);
    }

    #[test]
    fn test_filter_sql() {
        let mut filter = Filter::new();
        assert_eq!(filter.sql(), "1=1");
        filter
            .condition("x IS NOT NULL")
            .bind_opt("a = ?", None)
            .bind("b LIKE ?", like("acme"))
            .date_range("v.date", Some("2025-01-01"), None);
        assert_eq!(filter.sql(), "x IS NOT NULL AND b LIKE ? AND v.date >= ?");
        assert_eq!(
            filter.params,
            vec![
                SqlValue::Text("%acme%".into()),
                SqlValue::Text("2025-01-01".into())
            ]
        );
    }

    #[test]
    fn test_date_checks() {
        assert!(parse_date("2025-08-05").is_ok());
        assert!(matches!(parse_date("05/08/2025"), Err(QueryError::InvalidDate(_))));
        assert!(matches!(
            check_range("2025-09-01", "2025-08-01"),
            Err(QueryError::InvertedRange { .. })
        ));
        assert!(check_range("2025-08-01", "2025-08-01").is_ok());

        assert!(check_optional_range(Some("2025-08-01"), None).is_ok());
        assert!(check_optional_range(None, Some("2025-08-01")).is_ok());
        assert!(matches!(
            check_optional_range(Some("2025-08-02"), Some("2025-08-01")),
            Err(QueryError::InvertedRange { .. })
        ));
        assert!(matches!(
            check_optional_range(None, Some("Aug 1")),
            Err(QueryError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(QueryError::InvalidLimit(0).code(), "bad_query");
        assert_eq!(
            QueryError::Sql(rusqlite::Error::QueryReturnedNoRows).code(),
            "query_failed"
        );
    }
}
