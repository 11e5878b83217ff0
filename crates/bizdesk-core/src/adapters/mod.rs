//! External service adapters
//!
//! Canonical request/response shapes for mail, calendar and ledger
//! back ends, the traits each back end implements, and [`AdapterSet`],
//! which maps a capability's `(adapter, verb)` binding onto them.

pub mod google;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::capability::{AdapterKind, Binding, Capability};
use crate::error::AdapterError;
use crate::extract::DATETIME_FORMAT;
use crate::orchestrator::StepInvoker;
use crate::types::Arguments;

/// Message to send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentMail {
    pub message_id: String,
    pub thread_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    pub from: String,
    pub date: String,
    pub snippet: String,
}

/// Event to create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub summary: String,
    /// ISO-8601, with or without offset
    pub start_time: String,
    #[serde(default = "default_duration")]
    pub duration_minutes: i64,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

fn default_duration() -> i64 {
    60
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedEvent {
    pub event_id: String,
    pub event_link: String,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Payment,
    Receipt,
    #[default]
    Both,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Receipt => "receipt",
            Self::Both => "payment and receipt",
        }
    }
}

/// Analytics depth: what happened, why, what next, what to do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsTier {
    Descriptive,
    Diagnostic,
    Predictive,
    Prescriptive,
    #[default]
    All,
}

impl AnalyticsTier {
    pub const TIERS: [AnalyticsTier; 4] = [
        AnalyticsTier::Descriptive,
        AnalyticsTier::Diagnostic,
        AnalyticsTier::Predictive,
        AnalyticsTier::Prescriptive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Descriptive => "descriptive",
            Self::Diagnostic => "diagnostic",
            Self::Predictive => "predictive",
            Self::Prescriptive => "prescriptive",
            Self::All => "all",
        }
    }

    /// Whether a request for `self` covers `tier`
    pub fn includes(&self, tier: AnalyticsTier) -> bool {
        *self == Self::All || *self == tier
    }
}

/// Bucket size for trend queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    Weekly,
    #[default]
    Monthly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerMetric {
    #[default]
    Revenue,
    Transactions,
    Quantity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplierMetric {
    #[default]
    Spending,
    Transactions,
    Items,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinancialFocus {
    #[default]
    CashFlow,
    Profitability,
    Liquidity,
    Performance,
    Risk,
    Optimization,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryFocus {
    #[default]
    StockLevels,
    MovementPatterns,
    Turnover,
    Valuation,
    Optimization,
    Trends,
}

/// Which two business areas a cross-functional query relates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossFunctionalKind {
    #[default]
    SalesInventory,
    SupplierCustomer,
    FinancialOperational,
}

fn default_limit() -> i64 {
    10
}

fn default_recent() -> i64 {
    5
}

fn default_forecast() -> i64 {
    12
}

fn default_true() -> bool {
    true
}

fn default_focus_area() -> String {
    "overall".to_string()
}

/// Read-only ledger query, one variant per verb.
///
/// Field names match the parameter names of the ledger capabilities, so a
/// validated argument map deserializes straight into a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verb", rename_all = "snake_case")]
pub enum LedgerQuery {
    AccountBalance {
        account_name: String,
        #[serde(default)]
        as_of: Option<String>,
    },
    CashFlow {
        start_date: String,
        end_date: String,
    },
    ProfitLoss {
        start_date: String,
        end_date: String,
    },
    /// Payments and receipts over a window; the last 180 days when either
    /// bound is missing
    PaymentReceipts {
        #[serde(default)]
        transaction_type: TransactionType,
        #[serde(default)]
        start_date: Option<String>,
        #[serde(default)]
        end_date: Option<String>,
        #[serde(default)]
        party_name: Option<String>,
        #[serde(default)]
        limit: Option<i64>,
    },
    LatestTransactions {
        #[serde(default)]
        transaction_type: TransactionType,
        #[serde(default = "default_recent")]
        limit: i64,
        #[serde(default)]
        party_name: Option<String>,
    },
    LedgerSummary {
        #[serde(default)]
        account_group: Option<String>,
        #[serde(default)]
        include_zero_balance: bool,
    },
    VoucherDetails {
        #[serde(default)]
        voucher_number: Option<String>,
        #[serde(default)]
        voucher_type: Option<String>,
        #[serde(default)]
        start_date: Option<String>,
        #[serde(default)]
        end_date: Option<String>,
    },
    FinancialAnalytics {
        #[serde(default)]
        analytics_type: AnalyticsTier,
        #[serde(default)]
        query_focus: FinancialFocus,
        #[serde(default)]
        start_date: Option<String>,
        #[serde(default)]
        end_date: Option<String>,
        #[serde(default = "default_forecast")]
        forecast_periods: i64,
    },
    BusinessOverview {
        #[serde(default)]
        date_from: Option<String>,
        #[serde(default)]
        date_to: Option<String>,
    },
    KpiDashboard {
        #[serde(default)]
        date_from: Option<String>,
        #[serde(default)]
        date_to: Option<String>,
    },
    CrossFunctional {
        #[serde(default)]
        analysis_type: CrossFunctionalKind,
        #[serde(default)]
        date_from: Option<String>,
        #[serde(default)]
        date_to: Option<String>,
    },
    /// Threshold insights over the last 90 days
    StrategicInsights {
        #[serde(default = "default_focus_area")]
        focus_area: String,
    },
    SalesSummary {
        #[serde(default)]
        date_from: Option<String>,
        #[serde(default)]
        date_to: Option<String>,
        #[serde(default)]
        customer: Option<String>,
        #[serde(default)]
        voucher_type: Option<String>,
    },
    TopCustomers {
        #[serde(default)]
        metric: CustomerMetric,
        #[serde(default = "default_limit")]
        limit: i64,
        #[serde(default)]
        date_from: Option<String>,
        #[serde(default)]
        date_to: Option<String>,
    },
    CustomerAnalysis {
        #[serde(default)]
        customer: Option<String>,
        #[serde(default)]
        date_from: Option<String>,
        #[serde(default)]
        date_to: Option<String>,
    },
    RevenueAnalysis {
        #[serde(default)]
        period: Period,
        #[serde(default)]
        date_from: Option<String>,
        #[serde(default)]
        date_to: Option<String>,
    },
    SalesPerformance {
        #[serde(default)]
        date_from: Option<String>,
        #[serde(default)]
        date_to: Option<String>,
    },
    SalesAnalytics {
        #[serde(default)]
        analytics_type: AnalyticsTier,
        #[serde(default)]
        query: Option<String>,
        #[serde(default)]
        date_from: Option<String>,
        #[serde(default)]
        date_to: Option<String>,
    },
    StockSummary {
        #[serde(default)]
        godown: Option<String>,
        #[serde(default)]
        item: Option<String>,
    },
    ItemDetails {
        item_name: String,
    },
    GodownSummary {
        #[serde(default)]
        godown: Option<String>,
    },
    StockMovements {
        start_date: String,
        end_date: String,
        #[serde(default)]
        item_name: Option<String>,
    },
    TopItems {
        #[serde(default = "default_limit")]
        limit: i64,
        #[serde(default = "default_true")]
        by_value: bool,
    },
    InventoryAnalytics {
        #[serde(default)]
        analytics_type: AnalyticsTier,
        #[serde(default)]
        query_focus: InventoryFocus,
        #[serde(default)]
        start_date: Option<String>,
        #[serde(default)]
        end_date: Option<String>,
        #[serde(default = "default_forecast")]
        forecast_periods: i64,
    },
    PurchaseSummary {
        #[serde(default)]
        date_from: Option<String>,
        #[serde(default)]
        date_to: Option<String>,
        #[serde(default)]
        supplier: Option<String>,
    },
    TopSuppliers {
        #[serde(default)]
        metric: SupplierMetric,
        #[serde(default = "default_limit")]
        limit: i64,
        #[serde(default)]
        date_from: Option<String>,
        #[serde(default)]
        date_to: Option<String>,
    },
    SupplierAnalysis {
        #[serde(default)]
        supplier: Option<String>,
        #[serde(default)]
        date_from: Option<String>,
        #[serde(default)]
        date_to: Option<String>,
    },
    ProcurementAnalysis {
        #[serde(default)]
        period: Period,
        #[serde(default)]
        date_from: Option<String>,
        #[serde(default)]
        date_to: Option<String>,
        /// Item name fragment
        #[serde(default)]
        category: Option<String>,
    },
    PurchasePerformance {
        #[serde(default)]
        date_from: Option<String>,
        #[serde(default)]
        date_to: Option<String>,
    },
    PurchaseAnalytics {
        #[serde(default)]
        analytics_type: AnalyticsTier,
        #[serde(default)]
        query: Option<String>,
        #[serde(default)]
        date_from: Option<String>,
        #[serde(default)]
        date_to: Option<String>,
    },
}

impl LedgerQuery {
    /// Build a query from a verb name and its arguments
    pub fn from_verb(verb: &str, arguments: &Arguments) -> Result<Self, AdapterError> {
        let mut tagged = arguments.clone();
        tagged.insert("verb".into(), Value::String(verb.to_string()));
        serde_json::from_value(Value::Object(tagged)).map_err(|e| {
            AdapterError::new("ledger", "bad_query", format!("{}: {}", verb, e))
        })
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Self::AccountBalance { .. } => "account_balance",
            Self::CashFlow { .. } => "cash_flow",
            Self::ProfitLoss { .. } => "profit_loss",
            Self::PaymentReceipts { .. } => "payment_receipts",
            Self::LatestTransactions { .. } => "latest_transactions",
            Self::LedgerSummary { .. } => "ledger_summary",
            Self::VoucherDetails { .. } => "voucher_details",
            Self::FinancialAnalytics { .. } => "financial_analytics",
            Self::BusinessOverview { .. } => "business_overview",
            Self::KpiDashboard { .. } => "kpi_dashboard",
            Self::CrossFunctional { .. } => "cross_functional",
            Self::StrategicInsights { .. } => "strategic_insights",
            Self::SalesSummary { .. } => "sales_summary",
            Self::TopCustomers { .. } => "top_customers",
            Self::CustomerAnalysis { .. } => "customer_analysis",
            Self::RevenueAnalysis { .. } => "revenue_analysis",
            Self::SalesPerformance { .. } => "sales_performance",
            Self::SalesAnalytics { .. } => "sales_analytics",
            Self::StockSummary { .. } => "stock_summary",
            Self::ItemDetails { .. } => "item_details",
            Self::GodownSummary { .. } => "godown_summary",
            Self::StockMovements { .. } => "stock_movements",
            Self::TopItems { .. } => "top_items",
            Self::InventoryAnalytics { .. } => "inventory_analytics",
            Self::PurchaseSummary { .. } => "purchase_summary",
            Self::TopSuppliers { .. } => "top_suppliers",
            Self::SupplierAnalysis { .. } => "supplier_analysis",
            Self::ProcurementAnalysis { .. } => "procurement_analysis",
            Self::PurchasePerformance { .. } => "purchase_performance",
            Self::PurchaseAnalytics { .. } => "purchase_analytics",
        }
    }
}

/// Mail back end for sending and listing messages
#[async_trait]
pub trait MailAdapter: Send + Sync {
    fn provider(&self) -> &str;
    async fn send(&self, mail: &OutgoingMail) -> Result<SentMail, AdapterError>;
    async fn list(
        &self,
        query: Option<&str>,
        max_results: u32,
    ) -> Result<Vec<MessageSummary>, AdapterError>;
}

/// Calendar back end for creating events
#[async_trait]
pub trait CalendarAdapter: Send + Sync {
    fn provider(&self) -> &str;
    async fn create_event(&self, event: &NewEvent) -> Result<CreatedEvent, AdapterError>;
}

/// Read-only business ledger
#[async_trait]
pub trait LedgerAdapter: Send + Sync {
    fn provider(&self) -> &str;
    /// Returns a JSON record whose `status` is `success` or `no_data`
    async fn query(&self, query: &LedgerQuery) -> Result<Value, AdapterError>;
}

/// The adapters available to one process; absent ones fail their calls
#[derive(Clone, Default)]
pub struct AdapterSet {
    pub mail: Option<Arc<dyn MailAdapter>>,
    pub calendar: Option<Arc<dyn CalendarAdapter>>,
    pub ledger: Option<Arc<dyn LedgerAdapter>>,
}

impl std::fmt::Debug for AdapterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterSet")
            .field("mail", &self.mail.as_ref().map(|a| a.provider().to_string()))
            .field("calendar", &self.calendar.as_ref().map(|a| a.provider().to_string()))
            .field("ledger", &self.ledger.as_ref().map(|a| a.provider().to_string()))
            .finish()
    }
}

impl AdapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mail(mut self, mail: Arc<dyn MailAdapter>) -> Self {
        self.mail = Some(mail);
        self
    }

    pub fn with_calendar(mut self, calendar: Arc<dyn CalendarAdapter>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn LedgerAdapter>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Call `verb` on the adapter of the given kind
    pub async fn call(
        &self,
        adapter: AdapterKind,
        verb: &str,
        arguments: Arguments,
    ) -> Result<Arguments, AdapterError> {
        debug!("Adapter call: {}.{}", adapter, verb);
        let unconfigured = || {
            AdapterError::new(
                adapter.to_string(),
                "unconfigured",
                format!("no {} adapter is configured", adapter),
            )
        };
        let unknown = || {
            AdapterError::new(
                adapter.to_string(),
                "unknown_verb",
                format!("{} adapter has no verb `{}`", adapter, verb),
            )
        };

        match adapter {
            AdapterKind::Mail => {
                let mail = self.mail.as_ref().ok_or_else(unconfigured)?;
                match verb {
                    "send" => {
                        let request: OutgoingMail = decode(mail.provider(), arguments)?;
                        to_output(mail.provider(), &mail.send(&request).await?)
                    }
                    "list" => {
                        let query = arguments.get("query").and_then(Value::as_str);
                        let max_results = arguments
                            .get("max_results")
                            .and_then(Value::as_u64)
                            .unwrap_or(10)
                            .min(500) as u32;
                        let messages = mail.list(query, max_results).await?;
                        let mut output = Arguments::new();
                        output.insert("count".into(), Value::from(messages.len()));
                        output.insert(
                            "messages".into(),
                            serde_json::to_value(&messages).map_err(|e| encode_error(mail.provider(), e))?,
                        );
                        Ok(output)
                    }
                    _ => Err(unknown()),
                }
            }
            AdapterKind::Calendar => {
                let calendar = self.calendar.as_ref().ok_or_else(unconfigured)?;
                match verb {
                    "create_event" => {
                        let event: NewEvent = decode(calendar.provider(), arguments)?;
                        to_output(calendar.provider(), &calendar.create_event(&event).await?)
                    }
                    _ => Err(unknown()),
                }
            }
            AdapterKind::Ledger => {
                let ledger = self.ledger.as_ref().ok_or_else(unconfigured)?;
                let query = LedgerQuery::from_verb(verb, &arguments)?;
                match ledger.query(&query).await? {
                    Value::Object(map) => Ok(map),
                    other => {
                        let mut output = Arguments::new();
                        output.insert("result".into(), other);
                        Ok(output)
                    }
                }
            }
        }
    }
}

#[async_trait]
impl StepInvoker for AdapterSet {
    async fn invoke(
        &self,
        capability: &Capability,
        arguments: Arguments,
    ) -> Result<Arguments, AdapterError> {
        match &capability.binding {
            Binding::Adapter { adapter, verb } => self.call(*adapter, verb, arguments).await,
            Binding::Composite(_) => Err(AdapterError::new(
                "orchestrator",
                "not_invocable",
                format!("`{}` is a composite action", capability.name),
            )),
        }
    }
}

/// Start and end of an event. The end keeps the start's offset, if any.
pub(crate) fn event_window(provider: &str, event: &NewEvent) -> Result<(String, String), AdapterError> {
    let length = chrono::Duration::minutes(event.duration_minutes.max(0));
    if let Ok(start) = chrono::DateTime::parse_from_rfc3339(&event.start_time) {
        return Ok((start.to_rfc3339(), (start + length).to_rfc3339()));
    }
    let start = chrono::NaiveDateTime::parse_from_str(&event.start_time, DATETIME_FORMAT)
        .map_err(|e| {
            AdapterError::new(
                provider,
                "bad_request",
                format!("invalid start_time '{}': {}", event.start_time, e),
            )
        })?;
    Ok((
        start.format(DATETIME_FORMAT).to_string(),
        (start + length).format(DATETIME_FORMAT).to_string(),
    ))
}

fn decode<T: DeserializeOwned>(provider: &str, arguments: Arguments) -> Result<T, AdapterError> {
    serde_json::from_value(Value::Object(arguments))
        .map_err(|e| AdapterError::new(provider, "bad_request", e.to_string()))
}

fn to_output<T: Serialize>(provider: &str, value: &T) -> Result<Arguments, AdapterError> {
    match serde_json::to_value(value).map_err(|e| encode_error(provider, e))? {
        Value::Object(map) => Ok(map),
        _ => Err(AdapterError::new(provider, "bad_response", "expected an object")),
    }
}

fn encode_error(provider: &str, e: serde_json::Error) -> AdapterError {
    AdapterError::new(provider, "bad_response", e.to_string())
}

#[cfg(test)]
mod tests {
    use super::memory::{RecordingCalendar, RecordingMail, StaticLedger};
    use super::*;
    use crate::types::Domain;

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_ledger_query_from_verb_defaults() {
        let q = LedgerQuery::from_verb("latest_transactions", &Arguments::new()).unwrap();
        assert_eq!(
            q,
            LedgerQuery::LatestTransactions {
                transaction_type: TransactionType::Both,
                limit: 5,
                party_name: None
            }
        );
        assert_eq!(q.verb(), "latest_transactions");

        let q = LedgerQuery::from_verb("top_items", &Arguments::new()).unwrap();
        assert_eq!(q, LedgerQuery::TopItems { limit: 10, by_value: true });
    }

    #[test]
    fn test_ledger_query_rejects_unknown_verb_and_missing_field() {
        let err = LedgerQuery::from_verb("drop_tables", &Arguments::new()).unwrap_err();
        assert_eq!(err.code, "bad_query");
        let err = LedgerQuery::from_verb("item_details", &Arguments::new()).unwrap_err();
        assert!(err.message.contains("item_name"));
    }

    #[test]
    fn test_ledger_query_ranking_options() {
        let q = LedgerQuery::from_verb("top_customers", &args(serde_json::json!({"metric": "quantity", "limit": 3})))
            .unwrap();
        assert_eq!(
            q,
            LedgerQuery::TopCustomers {
                metric: CustomerMetric::Quantity,
                limit: 3,
                date_from: None,
                date_to: None
            }
        );

        let err = LedgerQuery::from_verb("top_suppliers", &args(serde_json::json!({"metric": "profit"})))
            .unwrap_err();
        assert_eq!(err.code, "bad_query");

        let q = LedgerQuery::from_verb("financial_analytics", &args(serde_json::json!({"query_focus": "liquidity"})))
            .unwrap();
        assert_eq!(
            q,
            LedgerQuery::FinancialAnalytics {
                analytics_type: AnalyticsTier::All,
                query_focus: FinancialFocus::Liquidity,
                start_date: None,
                end_date: None,
                forecast_periods: 12
            }
        );
        assert!(AnalyticsTier::All.includes(AnalyticsTier::Predictive));
        assert!(!AnalyticsTier::Diagnostic.includes(AnalyticsTier::Predictive));

        let q = LedgerQuery::from_verb("voucher_details", &Arguments::new()).unwrap();
        assert_eq!(q.verb(), "voucher_details");
    }

    #[tokio::test]
    async fn test_call_routes_to_mail() {
        let mail = Arc::new(RecordingMail::new());
        let set = AdapterSet::new().with_mail(mail.clone());
        let out = set
            .call(
                AdapterKind::Mail,
                "send",
                args(serde_json::json!({"to": "jane@x.com", "subject": "Hi", "body": "Hello"})),
            )
            .await
            .unwrap();
        assert_eq!(out["message_id"], "msg-1");
        assert_eq!(mail.sent()[0].to, "jane@x.com");
    }

    #[tokio::test]
    async fn test_call_routes_to_calendar_and_ledger() {
        let calendar = Arc::new(RecordingCalendar::new());
        let ledger = Arc::new(
            StaticLedger::new().respond("top_items", serde_json::json!({"status": "success", "items": []})),
        );
        let set = AdapterSet::new()
            .with_calendar(calendar.clone())
            .with_ledger(ledger.clone());

        let out = set
            .call(
                AdapterKind::Calendar,
                "create_event",
                args(serde_json::json!({"summary": "Sync", "start_time": "2025-08-06T14:00:00"})),
            )
            .await
            .unwrap();
        assert_eq!(out["event_id"], "evt-1");
        assert_eq!(out["end"], "2025-08-06T15:00:00");
        assert_eq!(calendar.created()[0].duration_minutes, 60);

        let out = set
            .call(AdapterKind::Ledger, "top_items", Arguments::new())
            .await
            .unwrap();
        assert_eq!(out["status"], "success");
        assert_eq!(ledger.queries(), vec![LedgerQuery::TopItems { limit: 10, by_value: true }]);
    }

    #[tokio::test]
    async fn test_unconfigured_and_unknown_verb() {
        let set = AdapterSet::new();
        let err = set
            .call(AdapterKind::Calendar, "create_event", Arguments::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, "unconfigured");

        let set = AdapterSet::new().with_mail(Arc::new(RecordingMail::new()));
        let err = set
            .call(AdapterKind::Mail, "delete", Arguments::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, "unknown_verb");
    }

    #[tokio::test]
    async fn test_composite_not_invocable() {
        let cap = Capability::composite(
            "create_meeting_invitation",
            Domain::Communication,
            crate::capability::CompositeKind::MeetingInvitation,
        );
        let err = AdapterSet::new()
            .invoke(&cap, Arguments::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, "not_invocable");
    }
}
