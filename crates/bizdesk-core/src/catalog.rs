//! Built-in capabilities and delegation keywords of the five business domains

use serde_json::Value;

use crate::capability::{
    AdapterKind, Capability, CapabilityRegistry, CompositeKind, Extractor, ParamKind, ParamSpec,
};
use crate::dispatcher::{Dispatcher, DomainProfile};
use crate::error::CoreResult;
use crate::types::Domain;

pub const CREATE_EVENT: &str = "schedule_calendar_event";
pub const SEND_MAIL: &str = "send_gmail_message";
pub const LIST_MAIL: &str = "get_gmail_messages";
pub const MEETING_INVITATION: &str = "create_meeting_invitation";

/// Registry holding every built-in capability
pub fn default_registry() -> CoreResult<CapabilityRegistry> {
    let mut registry = CapabilityRegistry::new();
    for capability in communication()
        .into_iter()
        .chain(financial())
        .chain(sales())
        .chain(inventory())
        .chain(purchase())
    {
        registry.register(capability)?;
    }
    Ok(registry)
}

/// Dispatcher with the delegation keywords of every domain, in declared order
pub fn default_dispatcher() -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    dispatcher.add_profile(DomainProfile::new(
        Domain::Financial,
        &[
            "balance", "cash", "profit", "loss", "financial", "accounting", "ledger", "payment",
            "payments", "receipt", "receipts", "invoice", "invoices", "voucher", "vouchers",
            "transactions", "overview", "kpi", "kpis", "dashboard", "strategic", "insights",
            "liquidity", "profitability",
        ],
    ));
    dispatcher.add_profile(DomainProfile::new(
        Domain::Inventory,
        &[
            "stock", "inventory", "item", "items", "warehouse", "godown", "godowns", "storage",
            "supply", "movements", "movement", "turnover",
        ],
    ));
    dispatcher.add_profile(DomainProfile::new(
        Domain::Purchase,
        &[
            "purchase", "purchases", "procurement", "supplier", "suppliers", "vendor", "vendors",
            "buying", "costs",
        ],
    ));
    dispatcher.add_profile(DomainProfile::new(
        Domain::Sales,
        &[
            "sales", "revenue", "customer", "customers", "selling", "market", "growth",
        ],
    ));
    dispatcher.add_profile(DomainProfile::new(
        Domain::Communication,
        &[
            "email", "emails", "mail", "gmail", "inbox", "calendar", "meeting", "schedule",
            "invitation", "invite", "communication", "event",
        ],
    ));
    dispatcher
}

fn date_from() -> ParamSpec {
    ParamSpec::optional("date_from", ParamKind::Date)
        .extract(Extractor::NthDate(0))
        .describe("Start date (YYYY-MM-DD)")
}

fn date_to() -> ParamSpec {
    ParamSpec::optional("date_to", ParamKind::Date)
        .extract(Extractor::NthDate(1))
        .describe("End date (YYYY-MM-DD)")
}

fn limit(default: i64) -> ParamSpec {
    ParamSpec::optional("limit", ParamKind::Integer)
        .default_value(default)
        .extract(Extractor::integer_after(&["top", "last", "latest", "best", "recent"]))
        .describe("Maximum number of rows")
}

fn start_date(required: bool) -> ParamSpec {
    let spec = if required {
        ParamSpec::required("start_date", ParamKind::Date)
    } else {
        ParamSpec::optional("start_date", ParamKind::Date)
    };
    spec.extract(Extractor::NthDate(0)).describe("Start date (YYYY-MM-DD)")
}

fn end_date(required: bool) -> ParamSpec {
    let spec = if required {
        ParamSpec::required("end_date", ParamKind::Date)
    } else {
        ParamSpec::optional("end_date", ParamKind::Date)
    };
    spec.extract(Extractor::NthDate(1)).describe("End date (YYYY-MM-DD)")
}

fn analytics_type() -> ParamSpec {
    ParamSpec::optional("analytics_type", ParamKind::Text)
        .default_value("all")
        .extract(Extractor::keyword(&[
            ("descriptive", Value::from("descriptive")),
            ("diagnostic", Value::from("diagnostic")),
            ("predictive", Value::from("predictive")),
            ("forecast", Value::from("predictive")),
            ("prescriptive", Value::from("prescriptive")),
        ]))
        .describe("descriptive, diagnostic, predictive, prescriptive or all")
}

fn forecast_periods() -> ParamSpec {
    ParamSpec::optional("forecast_periods", ParamKind::Integer)
        .default_value(12)
        .extract(Extractor::integer_after(&["next"]))
}

fn period() -> ParamSpec {
    ParamSpec::optional("period", ParamKind::Text)
        .default_value("monthly")
        .extract(Extractor::keyword(&[
            ("daily", Value::from("daily")),
            ("weekly", Value::from("weekly")),
            ("monthly", Value::from("monthly")),
        ]))
}

fn free_query() -> ParamSpec {
    ParamSpec::optional("query", ParamKind::Text)
        .extract(Extractor::Quoted)
        .describe("Question the analytics should address")
}

fn communication() -> Vec<Capability> {
    let title_like = |markers: &[&str]| Extractor::Any(vec![Extractor::Quoted, Extractor::after(markers)]);

    vec![
        Capability::adapter(CREATE_EVENT, Domain::Communication, AdapterKind::Calendar, "create_event")
            .describe("Schedule a calendar event")
            .param(
                ParamSpec::required("summary", ParamKind::Text)
                    .extract(title_like(&["titled", "called", "about", "regarding"]))
                    .describe("Event title"),
            )
            .param(
                ParamSpec::required("start_time", ParamKind::DateTime)
                    .extract(Extractor::DateTime)
                    .describe("Start time, ISO-8601"),
            )
            .param(
                ParamSpec::optional("duration_minutes", ParamKind::Integer)
                    .default_value(60)
                    .extract(Extractor::DurationMinutes),
            )
            .param(ParamSpec::optional("attendees", ParamKind::EmailList).extract(Extractor::Emails))
            .param(ParamSpec::optional("description", ParamKind::Text))
            .param(ParamSpec::optional("location", ParamKind::Text).extract(Extractor::after(&["location", "venue"])))
            .triggers(&[
                "schedule",
                "calendar",
                "event",
                "calendar event",
                "add to calendar",
                "appointment",
                "book",
            ]),
        Capability::adapter(SEND_MAIL, Domain::Communication, AdapterKind::Mail, "send")
            .describe("Send an email through Gmail")
            .param(ParamSpec::required("to", ParamKind::Email).extract(Extractor::NthEmail(0)))
            .param(
                ParamSpec::required("subject", ParamKind::Text)
                    .extract(title_like(&["subject", "about", "regarding"])),
            )
            .param(
                ParamSpec::required("body", ParamKind::Text)
                    .extract(Extractor::rest(&["saying", "body", "message"])),
            )
            .param(ParamSpec::optional("cc", ParamKind::EmailList))
            .param(ParamSpec::optional("bcc", ParamKind::EmailList))
            .param(ParamSpec::optional("html_body", ParamKind::Text))
            .param(ParamSpec::optional("from_name", ParamKind::Text))
            .triggers(&[
                "send email",
                "send an email",
                "send a mail",
                "send message",
                "email",
                "mail",
                "write to",
            ]),
        Capability::adapter(LIST_MAIL, Domain::Communication, AdapterKind::Mail, "list")
            .describe("List recent Gmail messages")
            .param(
                ParamSpec::optional("query", ParamKind::Text)
                    .extract(Extractor::Quoted)
                    .describe("Gmail search query"),
            )
            .param(
                ParamSpec::optional("max_results", ParamKind::Integer)
                    .default_value(10)
                    .extract(Extractor::integer_after(&["last", "latest", "recent", "top"])),
            )
            .triggers(&[
                "inbox",
                "emails",
                "messages",
                "unread",
                "check email",
                "read email",
                "recent emails",
                "latest emails",
            ]),
        Capability::composite(MEETING_INVITATION, Domain::Communication, CompositeKind::MeetingInvitation)
            .describe("Create a calendar event and email an invitation to every attendee")
            .param(
                ParamSpec::optional("title", ParamKind::Text)
                    .default_value("Meeting")
                    .extract(title_like(&["titled", "called", "about", "regarding"])),
            )
            .param(ParamSpec::required("start_time", ParamKind::DateTime).extract(Extractor::DateTime))
            .param(
                ParamSpec::optional("duration_minutes", ParamKind::Integer)
                    .default_value(60)
                    .extract(Extractor::DurationMinutes),
            )
            .param(ParamSpec::optional("attendees", ParamKind::EmailList).extract(Extractor::Emails))
            .param(ParamSpec::optional("agenda", ParamKind::Text).extract(Extractor::rest(&["agenda"])))
            .param(ParamSpec::optional("location", ParamKind::Text).extract(Extractor::after(&["location", "venue"])))
            .param(
                ParamSpec::optional("send_invitation", ParamKind::Boolean)
                    .default_value(true)
                    .extract(Extractor::keyword(&[
                        ("without invitation", Value::Bool(false)),
                        ("without sending", Value::Bool(false)),
                        ("no invitation", Value::Bool(false)),
                        ("don't send", Value::Bool(false)),
                    ])),
            )
            .triggers(&[
                "meeting invitation",
                "send invitation",
                "send invite",
                "invitation",
                "invite",
                "meeting",
            ]),
    ]
}

fn financial() -> Vec<Capability> {
    let ledger = |name: &str, verb: &str| Capability::adapter(name, Domain::Financial, AdapterKind::Ledger, verb);

    vec![
        ledger("get_account_balance", "account_balance")
            .describe("Balance of a ledger account")
            .param(
                ParamSpec::required("account_name", ParamKind::Text).extract(Extractor::Any(vec![
                    Extractor::Quoted,
                    Extractor::after(&["balance of", "balance for", "balance in", "account"]),
                ])),
            )
            .param(ParamSpec::optional("as_of", ParamKind::Date).extract(Extractor::NthDate(0)))
            .triggers(&["account balance", "balance", "balance of", "balance for"]),
        ledger("get_cash_flow", "cash_flow")
            .describe("Cash and bank inflow/outflow by voucher type")
            .param(start_date(true))
            .param(end_date(true))
            .triggers(&["cash flow", "cash", "inflow", "outflow"]),
        ledger("get_profit_loss", "profit_loss")
            .describe("Income and expense statement for a period")
            .param(start_date(true))
            .param(end_date(true))
            .triggers(&["profit and loss", "profit", "loss", "pnl", "income statement"]),
        ledger("get_payment_receipts", "payment_receipts")
            .describe("Payment and receipt vouchers in a date range, last 180 days by default")
            .param(
                ParamSpec::optional("transaction_type", ParamKind::Text)
                    .default_value("both")
                    .extract(Extractor::keyword(&[
                        ("payments and receipts", Value::from("both")),
                        ("payment receipts", Value::from("both")),
                        ("payment history", Value::from("payment")),
                        ("receipt history", Value::from("receipt")),
                    ])),
            )
            .param(start_date(false))
            .param(end_date(false))
            .param(
                ParamSpec::optional("party_name", ParamKind::Text)
                    .extract(Extractor::Any(vec![Extractor::Quoted, Extractor::after(&["party"])])),
            )
            .param(
                ParamSpec::optional("limit", ParamKind::Integer)
                    .extract(Extractor::integer_after(&["last", "latest", "recent"])),
            )
            .triggers(&["payment receipts", "payments and receipts", "payment history", "receipt history"]),
        ledger("get_latest_transactions", "latest_transactions")
            .describe("Most recent payment and receipt vouchers")
            .param(
                ParamSpec::optional("transaction_type", ParamKind::Text)
                    .default_value("both")
                    .extract(Extractor::keyword(&[
                        ("payments", Value::from("payment")),
                        ("payment", Value::from("payment")),
                        ("receipts", Value::from("receipt")),
                        ("receipt", Value::from("receipt")),
                    ])),
            )
            .param(
                ParamSpec::optional("limit", ParamKind::Integer)
                    .default_value(5)
                    .extract(Extractor::integer_after(&["last", "latest", "recent", "top"])),
            )
            .param(
                ParamSpec::optional("party_name", ParamKind::Text)
                    .extract(Extractor::Any(vec![Extractor::Quoted, Extractor::after(&["party"])])),
            )
            .triggers(&[
                "latest transactions",
                "recent transactions",
                "transactions",
                "payments",
                "receipts",
                "last payment",
                "latest payment",
                "receipt",
            ]),
        ledger("get_ledger_summary", "ledger_summary")
            .describe("Closing balances of ledgers, optionally under one group")
            .param(
                ParamSpec::optional("account_group", ParamKind::Text)
                    .extract(Extractor::Any(vec![Extractor::Quoted, Extractor::after(&["group", "under"])])),
            )
            .param(
                ParamSpec::optional("include_zero_balance", ParamKind::Boolean)
                    .default_value(false)
                    .extract(Extractor::keyword(&[
                        ("including zero", Value::Bool(true)),
                        ("include zero", Value::Bool(true)),
                        ("zero balances", Value::Bool(true)),
                    ])),
            )
            .triggers(&["ledger summary", "ledgers", "ledger", "trial balance", "chart of accounts"]),
        ledger("get_voucher_details", "voucher_details")
            .describe("Vouchers by number, or by type and date range")
            .param(
                ParamSpec::optional("voucher_number", ParamKind::Text).extract(Extractor::Any(vec![
                    Extractor::Quoted,
                    Extractor::after(&["voucher number", "voucher no"]),
                ])),
            )
            .param(
                ParamSpec::optional("voucher_type", ParamKind::Text)
                    .extract(Extractor::after(&["of type", "voucher type"])),
            )
            .param(start_date(false))
            .param(end_date(false))
            .triggers(&["voucher details", "voucher", "vouchers"]),
        ledger("get_financial_analytics", "financial_analytics")
            .describe("Tiered analytics over cash flow, profitability or other financial focus")
            .param(analytics_type())
            .param(
                ParamSpec::optional("query_focus", ParamKind::Text)
                    .default_value("cash_flow")
                    .extract(Extractor::keyword(&[
                        ("cash flow", Value::from("cash_flow")),
                        ("profitability", Value::from("profitability")),
                        ("liquidity", Value::from("liquidity")),
                        ("performance", Value::from("performance")),
                        ("risk", Value::from("risk")),
                        ("optimization", Value::from("optimization")),
                    ])),
            )
            .param(start_date(false))
            .param(end_date(false))
            .param(forecast_periods())
            .triggers(&[
                "financial analytics",
                "financial analysis",
                "analytics",
                "forecast",
                "liquidity",
                "profitability",
            ]),
        ledger("get_business_overview", "business_overview")
            .describe("Transaction, financial and operational rollup of the business")
            .param(date_from())
            .param(date_to())
            .triggers(&["business overview", "overview", "business summary"]),
        ledger("get_kpi_dashboard", "kpi_dashboard")
            .describe("Revenue, cost, margin, operational and cash KPIs")
            .param(date_from())
            .param(date_to())
            .triggers(&[
                "kpi dashboard",
                "kpi",
                "kpis",
                "dashboard",
                "key performance indicators",
                "gross margin",
            ]),
        ledger("get_cross_functional_analysis", "cross_functional")
            .describe("Tables relating sales to inventory, suppliers to customers, or cash to operations")
            .param(
                ParamSpec::optional("analysis_type", ParamKind::Text)
                    .default_value("sales_inventory")
                    .extract(Extractor::keyword(&[
                        ("sales and inventory", Value::from("sales_inventory")),
                        ("supplier and customer", Value::from("supplier_customer")),
                        ("suppliers and customers", Value::from("supplier_customer")),
                        ("financial and operational", Value::from("financial_operational")),
                    ])),
            )
            .param(date_from())
            .param(date_to())
            .triggers(&[
                "cross-functional",
                "cross functional",
                "sales and inventory",
                "supplier and customer",
                "financial and operational",
            ]),
        ledger("get_strategic_insights", "strategic_insights")
            .describe("Insights and recommendations from the last 90 days")
            .param(
                ParamSpec::optional("focus_area", ParamKind::Text)
                    .default_value("overall")
                    .extract(Extractor::after(&["focus on", "focused on"])),
            )
            .triggers(&["strategic insights", "strategic", "strategy", "insights", "recommendations"]),
    ]
}

fn sales() -> Vec<Capability> {
    let sales_ledger = |name: &str, verb: &str| Capability::adapter(name, Domain::Sales, AdapterKind::Ledger, verb);

    vec![
        Capability::adapter("get_sales_summary", Domain::Sales, AdapterKind::Ledger, "sales_summary")
            .describe("Sales totals for a period, optionally for one customer")
            .param(date_from())
            .param(date_to())
            .param(
                ParamSpec::optional("customer", ParamKind::Text)
                    .extract(Extractor::Any(vec![Extractor::Quoted, Extractor::after(&["customer"])])),
            )
            .param(ParamSpec::optional("voucher_type", ParamKind::Text).extract(Extractor::after(&["voucher type"])))
            .triggers(&["sales summary", "sales report", "sales", "revenue", "selling"]),
        Capability::adapter("get_top_customers", Domain::Sales, AdapterKind::Ledger, "top_customers")
            .describe("Customers ranked by revenue, transaction count or quantity")
            .param(
                ParamSpec::optional("metric", ParamKind::Text)
                    .default_value("revenue")
                    .extract(Extractor::keyword(&[
                        ("by transactions", Value::from("transactions")),
                        ("by quantity", Value::from("quantity")),
                        ("by revenue", Value::from("revenue")),
                    ])),
            )
            .param(limit(10))
            .param(date_from())
            .param(date_to())
            .triggers(&["top customers", "best customers", "customers", "top"]),
        sales_ledger("get_customer_analysis", "customer_analysis")
            .describe("Per-customer totals, averages and activity dates")
            .param(
                ParamSpec::optional("customer", ParamKind::Text)
                    .extract(Extractor::Any(vec![
                        Extractor::Quoted,
                        Extractor::after(&["analysis for", "analysis of", "insights for"]),
                    ])),
            )
            .param(date_from())
            .param(date_to())
            .triggers(&["customer analysis", "customer insights", "customer behavior", "customer behaviour"]),
        sales_ledger("get_revenue_analysis", "revenue_analysis")
            .describe("Sales revenue bucketed by day, week or month")
            .param(period())
            .param(date_from())
            .param(date_to())
            .triggers(&[
                "revenue analysis",
                "revenue trend",
                "revenue trends",
                "daily revenue",
                "weekly revenue",
                "monthly revenue",
            ]),
        sales_ledger("get_sales_performance", "sales_performance")
            .describe("Sales volume, value and daily averages")
            .param(date_from())
            .param(date_to())
            .triggers(&["sales performance", "performance"]),
        sales_ledger("get_sales_analytics", "sales_analytics")
            .describe("Descriptive, diagnostic, predictive and prescriptive sales analytics")
            .param(analytics_type())
            .param(free_query())
            .param(date_from())
            .param(date_to())
            .triggers(&["sales analytics", "analytics", "sales forecast", "forecast"]),
    ]
}

fn inventory() -> Vec<Capability> {
    let ledger = |name: &str, verb: &str| Capability::adapter(name, Domain::Inventory, AdapterKind::Ledger, verb);

    vec![
        ledger("get_stock_summary", "stock_summary")
            .describe("Stock on hand per item and godown")
            .param(
                ParamSpec::optional("godown", ParamKind::Text)
                    .extract(Extractor::Any(vec![Extractor::Quoted, Extractor::after(&["in godown", "godown"])])),
            )
            .param(ParamSpec::optional("item", ParamKind::Text).extract(Extractor::after(&["of item", "for item"])))
            .triggers(&["stock summary", "stock levels", "stock", "inventory", "in stock"]),
        ledger("get_item_details", "item_details")
            .describe("Master data and movement of one stock item")
            .param(
                ParamSpec::required("item_name", ParamKind::Text).extract(Extractor::Any(vec![
                    Extractor::Quoted,
                    Extractor::after(&["details of", "details for", "item"]),
                ])),
            )
            .triggers(&["item details", "details of", "item", "product details"]),
        ledger("get_godown_summary", "godown_summary")
            .describe("Stock value held in each godown")
            .param(
                ParamSpec::optional("godown", ParamKind::Text)
                    .extract(Extractor::Any(vec![Extractor::Quoted, Extractor::after(&["godown"])])),
            )
            .triggers(&["godown summary", "godowns", "warehouses", "warehouse", "storage"]),
        ledger("get_top_items", "top_items")
            .describe("Stock items ranked by traded value or quantity")
            .param(limit(10))
            .param(
                ParamSpec::optional("by_value", ParamKind::Boolean)
                    .default_value(true)
                    .extract(Extractor::keyword(&[
                        ("by quantity", Value::Bool(false)),
                        ("by volume", Value::Bool(false)),
                        ("by value", Value::Bool(true)),
                    ])),
            )
            .triggers(&["top items", "top products", "most valuable", "items", "top"]),
        ledger("get_stock_movements", "stock_movements")
            .describe("Inward and outward stock lines in a date range")
            .param(start_date(true))
            .param(end_date(true))
            .param(
                ParamSpec::optional("item_name", ParamKind::Text)
                    .extract(Extractor::Any(vec![Extractor::Quoted, Extractor::after(&["of item", "for item"])])),
            )
            .triggers(&["stock movements", "stock movement", "movements", "movement"]),
        ledger("get_inventory_analytics", "inventory_analytics")
            .describe("Tiered analytics over stock levels, movement, turnover or valuation")
            .param(analytics_type())
            .param(
                ParamSpec::optional("query_focus", ParamKind::Text)
                    .default_value("stock_levels")
                    .extract(Extractor::keyword(&[
                        ("stock levels", Value::from("stock_levels")),
                        ("movement patterns", Value::from("movement_patterns")),
                        ("turnover", Value::from("turnover")),
                        ("valuation", Value::from("valuation")),
                        ("optimization", Value::from("optimization")),
                        ("trends", Value::from("trends")),
                    ])),
            )
            .param(start_date(false))
            .param(end_date(false))
            .param(forecast_periods())
            .triggers(&[
                "inventory analytics",
                "inventory turnover",
                "analytics",
                "turnover",
                "valuation",
                "reorder",
            ]),
    ]
}

fn purchase() -> Vec<Capability> {
    let purchase_ledger =
        |name: &str, verb: &str| Capability::adapter(name, Domain::Purchase, AdapterKind::Ledger, verb);

    vec![
        Capability::adapter("get_purchase_summary", Domain::Purchase, AdapterKind::Ledger, "purchase_summary")
            .describe("Purchase totals for a period, optionally for one supplier")
            .param(date_from())
            .param(date_to())
            .param(
                ParamSpec::optional("supplier", ParamKind::Text).extract(Extractor::Any(vec![
                    Extractor::Quoted,
                    Extractor::after(&["supplier", "vendor"]),
                ])),
            )
            .triggers(&["purchase summary", "purchases", "purchase", "procurement", "buying", "costs"]),
        Capability::adapter("get_top_suppliers", Domain::Purchase, AdapterKind::Ledger, "top_suppliers")
            .describe("Suppliers ranked by purchase value, transaction count or item range")
            .param(
                ParamSpec::optional("metric", ParamKind::Text)
                    .default_value("spending")
                    .extract(Extractor::keyword(&[
                        ("by transactions", Value::from("transactions")),
                        ("by items", Value::from("items")),
                        ("by spending", Value::from("spending")),
                    ])),
            )
            .param(limit(10))
            .param(date_from())
            .param(date_to())
            .triggers(&["top suppliers", "top vendors", "suppliers", "vendors", "top"]),
        purchase_ledger("get_supplier_analysis", "supplier_analysis")
            .describe("Per-supplier spending, averages and activity dates")
            .param(
                ParamSpec::optional("supplier", ParamKind::Text).extract(Extractor::Any(vec![
                    Extractor::Quoted,
                    Extractor::after(&["analysis for", "analysis of", "performance of"]),
                ])),
            )
            .param(date_from())
            .param(date_to())
            .triggers(&["supplier analysis", "supplier performance", "vendor analysis"]),
        purchase_ledger("get_procurement_analysis", "procurement_analysis")
            .describe("Purchase spending bucketed by day, week or month")
            .param(period())
            .param(date_from())
            .param(date_to())
            .param(ParamSpec::optional("category", ParamKind::Text).extract(Extractor::after(&["category"])))
            .triggers(&["procurement analysis", "procurement trend", "procurement trends", "spending trend"]),
        purchase_ledger("get_purchase_performance", "purchase_performance")
            .describe("Purchase volume, value and daily averages")
            .param(date_from())
            .param(date_to())
            .triggers(&["purchase performance", "performance"]),
        purchase_ledger("get_purchase_analytics", "purchase_analytics")
            .describe("Descriptive, diagnostic, predictive and prescriptive purchase analytics")
            .param(analytics_type())
            .param(free_query())
            .param(date_from())
            .param(date_to())
            .triggers(&["purchase analytics", "analytics", "procurement forecast"]),
    ]
}
