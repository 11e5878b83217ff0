//! Read-only ledger adapter over a Tally export stored in SQLite

use anyhow::{Context, Result};
use async_trait::async_trait;
use bizdesk_core::{AdapterError, LedgerAdapter, LedgerQuery};
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::queries::{self, QueryError};

const PROVIDER: &str = "tally";

/// Tables the query verbs read from
pub const REQUIRED_TABLES: &[&str] = &[
    "mst_ledger",
    "mst_stock_item",
    "mst_godown",
    "trn_voucher",
    "trn_accounting",
    "trn_inventory",
];

/// Ledger backed by a Tally-export database, opened read-only
pub struct TallyLedger {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl std::fmt::Debug for TallyLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TallyLedger")
            .field("path", &self.path)
            .finish()
    }
}

impl TallyLedger {
    /// Open an existing export. Fails when the file is missing or lacks one
    /// of the tables the verbs read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open ledger database at {}", path.display()))?;

        let missing = missing_tables(&conn).context("Failed to inspect ledger schema")?;
        if !missing.is_empty() {
            anyhow::bail!(
                "Ledger database at {} is missing tables: {}",
                path.display(),
                missing.join(", ")
            );
        }

        info!("Opened ledger database at {:?} (read-only)", path);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a query on the blocking pool
    pub async fn run(&self, query: LedgerQuery) -> Result<Value, QueryError> {
        let conn = Arc::clone(&self.conn);
        let now = chrono::Local::now().naive_local();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(|poisoned| {
                warn!("Database mutex was poisoned, recovering");
                poisoned.into_inner()
            });
            queries::execute(&conn, &query, now)
        })
        .await
        .map_err(|e| QueryError::Task(e.to_string()))?
    }
}

fn missing_tables(conn: &Connection) -> rusqlite::Result<Vec<&'static str>> {
    let mut stmt = conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
    let mut missing = Vec::new();
    for table in REQUIRED_TABLES {
        if !stmt.exists([table])? {
            missing.push(*table);
        }
    }
    Ok(missing)
}

#[async_trait]
impl LedgerAdapter for TallyLedger {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn query(&self, query: &LedgerQuery) -> Result<Value, AdapterError> {
        debug!("Tally query: {}", query.verb());
        self.run(query.clone()).await.map_err(|e| {
            warn!("Tally query {} failed: {}", query.verb(), e);
            AdapterError::new(PROVIDER, e.code(), e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizdesk_core::{
        AnalyticsTier, CrossFunctionalKind, CustomerMetric, FinancialFocus, InventoryFocus, Period,
        SupplierMetric, TransactionType,
    };
    use chrono::{NaiveDate, NaiveDateTime};
    use serde_json::json;
    use tempfile::TempDir;

    const SCHEMA: &str = "
        CREATE TABLE mst_ledger (
            name TEXT PRIMARY KEY, alias TEXT, parent TEXT, description TEXT,
            opening_balance REAL, is_revenue INTEGER, is_deemedpositive INTEGER
        );
        CREATE TABLE mst_stock_item (
            name TEXT PRIMARY KEY, parent TEXT, alias TEXT, part_number TEXT, uom TEXT,
            opening_balance REAL, opening_rate REAL, opening_value REAL,
            gst_hsn_code TEXT, gst_rate REAL, gst_taxability TEXT
        );
        CREATE TABLE mst_godown (name TEXT PRIMARY KEY, parent TEXT, address TEXT);
        CREATE TABLE trn_voucher (
            guid TEXT PRIMARY KEY, date TEXT, voucher_type TEXT, voucher_number TEXT,
            reference_number TEXT, reference_date TEXT, narration TEXT, party_name TEXT
        );
        CREATE TABLE trn_accounting (guid TEXT, ledger TEXT, amount REAL);
        CREATE TABLE trn_inventory (
            guid TEXT, item TEXT, quantity REAL, rate REAL, amount REAL, godown TEXT
        );
    ";

    const DATA: &str = "
        INSERT INTO mst_ledger VALUES
            ('Cash Account', 'Cash', 'Cash-in-Hand', 'Petty cash', 1000, NULL, 1),
            ('HDFC Bank', NULL, 'Bank Accounts', '', 5000, NULL, 1),
            ('Sales Account', NULL, 'Sales Accounts', '', 0, 1, 0),
            ('Rent', NULL, 'Indirect Expenses', '', 0, 0, 1),
            ('Purchase Account', NULL, 'Purchase Accounts', '', 0, 0, 1),
            ('Dormant', NULL, 'Sundry Debtors', '', 0, NULL, 1);

        INSERT INTO mst_stock_item VALUES
            ('Steel Rod', 'Raw Material', 'SR', 'P-1', 'kg', 10, 50, 500, '7214', 18, 'Taxable'),
            ('Copper Wire', 'Raw Material', NULL, 'P-2', 'm', 0, 0, 0, '7408', 18, 'Taxable');
        INSERT INTO mst_godown VALUES ('Main Location', 'Primary', 'Pune'), ('Annex', 'Primary', 'Mumbai');

        INSERT INTO trn_voucher VALUES
            ('v1', '2025-07-01', 'Sales', 'S-1', NULL, NULL, 'Rod sale', 'Acme Corp'),
            ('v2', '2025-07-03', 'Receipt', 'R-1', 'REF-9', '2025-07-03', 'Acme pays', 'Acme Corp'),
            ('v3', '2025-07-05', 'Payment', 'P-1', NULL, NULL, 'July rent', 'Landlord'),
            ('v4', '2025-07-10', 'Purchase', 'PU-1', NULL, NULL, 'Copper', 'Wire Mills'),
            ('v5', '2025-07-12', 'Sales', 'S-2', NULL, NULL, 'Wire sale', 'Beta Ltd');

        INSERT INTO trn_accounting VALUES
            ('v1', 'Acme Corp', -1200), ('v1', 'Sales Account', 1200),
            ('v2', 'Cash Account', -1200), ('v2', 'Acme Corp', 1200),
            ('v3', 'Rent', -300), ('v3', 'Cash Account', 300),
            ('v4', 'Purchase Account', -800), ('v4', 'Wire Mills', 800),
            ('v5', 'Beta Ltd', -400), ('v5', 'Sales Account', 400);

        INSERT INTO trn_inventory VALUES
            ('v1', 'Steel Rod', -20, 65, -1300, 'Main Location'),
            ('v4', 'Copper Wire', 100, 8, 800, 'Annex'),
            ('v5', 'Copper Wire', -40, 10, -400, 'Annex');
    ";

    fn seeded() -> (TempDir, TallyLedger) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tally.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute_batch(DATA).unwrap();
        drop(conn);
        let ledger = TallyLedger::open(&path).unwrap();
        (dir, ledger)
    }

    #[test]
    fn test_open_rejects_missing_tables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE mst_ledger (name TEXT);").unwrap();
        drop(conn);

        let err = TallyLedger::open(&path).unwrap_err().to_string();
        assert!(err.contains("trn_voucher"));
        assert!(!err.contains("mst_ledger,"));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(TallyLedger::open(dir.path().join("absent.db")).is_err());
    }

    #[tokio::test]
    async fn test_account_balance_debit_nature() {
        let (_dir, ledger) = seeded();
        let result = ledger
            .query(&LedgerQuery::AccountBalance {
                account_name: "cash".into(),
                as_of: None,
            })
            .await
            .unwrap();

        assert_eq!(result["status"], "success");
        assert_eq!(result["account_name"], "Cash Account");
        // 1000 opening + 1200 debit - 300 credit
        assert_eq!(result["balance"], json!(1900.0));
        assert_eq!(result["currency"], "INR");
        assert_eq!(result["account_type"], "Cash-in-Hand");
    }

    #[tokio::test]
    async fn test_account_balance_as_of_date() {
        let (_dir, ledger) = seeded();
        let result = ledger
            .query(&LedgerQuery::AccountBalance {
                account_name: "Cash Account".into(),
                as_of: Some("2025-07-04".into()),
            })
            .await
            .unwrap();
        assert_eq!(result["balance"], json!(2200.0));
        assert_eq!(result["as_of_date"], "2025-07-04");
    }

    #[tokio::test]
    async fn test_account_balance_unknown_and_bad_date() {
        let (_dir, ledger) = seeded();
        let result = ledger
            .query(&LedgerQuery::AccountBalance {
                account_name: "Nonexistent".into(),
                as_of: None,
            })
            .await
            .unwrap();
        assert_eq!(result["status"], "no_data");

        let err = ledger
            .query(&LedgerQuery::AccountBalance {
                account_name: "Cash".into(),
                as_of: Some("July 4".into()),
            })
            .await
            .unwrap_err();
        assert_eq!(err.provider, "tally");
        assert_eq!(err.code, "bad_query");
    }

    #[tokio::test]
    async fn test_cash_flow_groups_by_voucher_type() {
        let (_dir, ledger) = seeded();
        let result = ledger
            .query(&LedgerQuery::CashFlow {
                start_date: "2025-07-01".into(),
                end_date: "2025-07-31".into(),
            })
            .await
            .unwrap();

        assert_eq!(result["status"], "success");
        assert_eq!(result["total_inflow"], json!(300.0));
        assert_eq!(result["total_outflow"], json!(1200.0));
        assert_eq!(result["net_cash_flow"], json!(-900.0));
        assert_eq!(result["transaction_count"], 2);
        assert_eq!(result["cash_flow_by_type"]["Receipt"]["outflow"], json!(1200.0));
        assert_eq!(result["cash_flow_by_type"]["Payment"]["count"], 1);
    }

    #[tokio::test]
    async fn test_cash_flow_empty_and_inverted() {
        let (_dir, ledger) = seeded();
        let result = ledger
            .query(&LedgerQuery::CashFlow {
                start_date: "2024-01-01".into(),
                end_date: "2024-01-31".into(),
            })
            .await
            .unwrap();
        assert_eq!(result["status"], "no_data");

        let err = ledger
            .query(&LedgerQuery::CashFlow {
                start_date: "2025-08-01".into(),
                end_date: "2025-07-01".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, "bad_query");
    }

    #[tokio::test]
    async fn test_profit_loss() {
        let (_dir, ledger) = seeded();
        let result = ledger
            .query(&LedgerQuery::ProfitLoss {
                start_date: "2025-07-01".into(),
                end_date: "2025-07-31".into(),
            })
            .await
            .unwrap();

        assert_eq!(result["total_income"], json!(1600.0));
        // Rent 300 + purchases 800
        assert_eq!(result["total_expenses"], json!(1100.0));
        assert_eq!(result["net_profit"], json!(500.0));
        assert_eq!(result["income_accounts"][0]["account_name"], "Sales Account");
    }

    #[tokio::test]
    async fn test_latest_transactions_filters_and_orders() {
        let (_dir, ledger) = seeded();
        let result = ledger
            .query(&LedgerQuery::LatestTransactions {
                transaction_type: TransactionType::Both,
                limit: 5,
                party_name: None,
            })
            .await
            .unwrap();
        let transactions = result["transactions"].as_array().unwrap();
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0]["voucher_number"], "P-1");
        assert_eq!(transactions[1]["voucher_number"], "R-1");

        let receipts = ledger
            .query(&LedgerQuery::LatestTransactions {
                transaction_type: TransactionType::Receipt,
                limit: 5,
                party_name: Some("acme".into()),
            })
            .await
            .unwrap();
        assert_eq!(receipts["transaction_count"], 1);
        assert_eq!(receipts["transactions"][0]["total_amount"], json!(2400.0));
    }

    #[tokio::test]
    async fn test_ledger_summary_skips_zero_balances() {
        let (_dir, ledger) = seeded();
        let summary = ledger
            .query(&LedgerQuery::LedgerSummary {
                account_group: None,
                include_zero_balance: false,
            })
            .await
            .unwrap();
        let names: Vec<&str> = summary["accounts"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|a| a["account_name"].as_str())
            .collect();
        assert!(!names.contains(&"Dormant"));
        assert!(names.contains(&"HDFC Bank"));

        let all = ledger
            .query(&LedgerQuery::LedgerSummary {
                account_group: None,
                include_zero_balance: true,
            })
            .await
            .unwrap();
        assert_eq!(all["total_accounts"], 6);

        let banks = ledger
            .query(&LedgerQuery::LedgerSummary {
                account_group: Some("bank".into()),
                include_zero_balance: false,
            })
            .await
            .unwrap();
        assert_eq!(banks["total_accounts"], 1);
        assert_eq!(banks["accounts"][0]["account_nature"], "Debit");
    }

    #[tokio::test]
    async fn test_voucher_details() {
        let (_dir, ledger) = seeded();
        let result = ledger
            .query(&LedgerQuery::VoucherDetails {
                voucher_number: Some("R-1".into()),
                voucher_type: None,
                start_date: None,
                end_date: None,
            })
            .await
            .unwrap();
        assert_eq!(result["voucher_count"], 1);
        assert_eq!(result["vouchers"][0]["reference_number"], "REF-9");
        assert_eq!(result["vouchers"][0]["accounting_entries"], 2);

        let missing = ledger
            .query(&LedgerQuery::VoucherDetails {
                voucher_number: Some("X-404".into()),
                voucher_type: None,
                start_date: None,
                end_date: None,
            })
            .await
            .unwrap();
        assert_eq!(missing["status"], "no_data");
    }

    #[tokio::test]
    async fn test_sales_summary_and_top_customers() {
        let (_dir, ledger) = seeded();
        let summary = ledger
            .query(&LedgerQuery::SalesSummary {
                date_from: Some("2025-07-01".into()),
                date_to: Some("2025-07-31".into()),
                customer: Some("beta".into()),
                voucher_type: None,
            })
            .await
            .unwrap();
        assert_eq!(summary["summary"]["total_transactions"], 1);
        assert_eq!(summary["summary"]["total_revenue"], json!(400.0));

        let top = ledger
            .query(&LedgerQuery::TopCustomers {
                metric: CustomerMetric::Revenue,
                limit: 2,
                date_from: None,
                date_to: None,
            })
            .await
            .unwrap();
        assert_eq!(top["count"], 2);
        assert_eq!(top["top_customers"][0]["customer_name"], "Acme Corp");
        assert_eq!(top["top_customers"][0]["total_revenue"], json!(2400.0));
    }

    #[tokio::test]
    async fn test_top_customers_rejects_zero_limit() {
        let (_dir, ledger) = seeded();
        let err = ledger
            .query(&LedgerQuery::TopCustomers {
                metric: CustomerMetric::Revenue,
                limit: 0,
                date_from: None,
                date_to: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, "bad_query");
    }

    #[tokio::test]
    async fn test_stock_and_item_details() {
        let (_dir, ledger) = seeded();
        let stock = ledger
            .query(&LedgerQuery::StockSummary {
                godown: Some("annex".into()),
                item: None,
            })
            .await
            .unwrap();
        assert_eq!(stock["summary"]["total_items"], 1);
        assert_eq!(stock["stock_items"][0]["item_name"], "Copper Wire");
        assert_eq!(stock["stock_items"][0]["quantity"], json!(140.0));

        let item = ledger
            .query(&LedgerQuery::ItemDetails {
                item_name: "copper".into(),
            })
            .await
            .unwrap();
        assert_eq!(item["item_master"]["name"], "Copper Wire");
        assert_eq!(item["current_stock"][0]["current_stock"], json!(60.0));
        assert_eq!(item["recent_transactions"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_godown_summary_and_top_items() {
        let (_dir, ledger) = seeded();
        let godowns = ledger
            .query(&LedgerQuery::GodownSummary { godown: None })
            .await
            .unwrap();
        assert_eq!(godowns["summary"]["total_godowns"], 2);
        assert_eq!(godowns["godowns"][0]["godown_name"], "Main Location");
        assert_eq!(godowns["godowns"][0]["address"], "Pune");

        let top = ledger
            .query(&LedgerQuery::TopItems {
                limit: 1,
                by_value: true,
            })
            .await
            .unwrap();
        let items = top["top_items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["item_name"], "Steel Rod");
    }

    #[tokio::test]
    async fn test_purchase_queries() {
        let (_dir, ledger) = seeded();
        let summary = ledger
            .query(&LedgerQuery::PurchaseSummary {
                date_from: None,
                date_to: None,
                supplier: None,
            })
            .await
            .unwrap();
        assert_eq!(summary["summary"]["total_transactions"], 1);
        assert_eq!(summary["summary"]["total_purchase_cost"], json!(800.0));

        let top = ledger
            .query(&LedgerQuery::TopSuppliers {
                metric: SupplierMetric::Spending,
                limit: 10,
                date_from: None,
                date_to: None,
            })
            .await
            .unwrap();
        assert_eq!(top["top_suppliers"][0]["supplier_name"], "Wire Mills");
        assert_eq!(top["top_suppliers"][0]["unique_items"], 1);

        let none = ledger
            .query(&LedgerQuery::PurchaseSummary {
                date_from: Some("2026-01-01".into()),
                date_to: None,
                supplier: None,
            })
            .await
            .unwrap();
        assert_eq!(none["status"], "no_data");
    }

    /// Runs a query with a fixed clock for verbs whose default window
    /// depends on today's date
    fn query_at(ledger: &TallyLedger, query: &LedgerQuery, day: &str) -> Value {
        let now: NaiveDateTime = NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let conn = ledger.conn.lock().unwrap();
        queries::execute(&conn, query, now).unwrap()
    }

    #[tokio::test]
    async fn test_inverted_ranges_are_rejected() {
        let (_dir, ledger) = seeded();
        let from = Some("2025-08-01".to_string());
        let to = Some("2025-07-01".to_string());
        let queries = [
            LedgerQuery::SalesSummary {
                date_from: from.clone(),
                date_to: to.clone(),
                customer: None,
                voucher_type: None,
            },
            LedgerQuery::TopCustomers {
                metric: CustomerMetric::Revenue,
                limit: 10,
                date_from: from.clone(),
                date_to: to.clone(),
            },
            LedgerQuery::PurchaseSummary {
                date_from: from.clone(),
                date_to: to.clone(),
                supplier: None,
            },
            LedgerQuery::TopSuppliers {
                metric: SupplierMetric::Spending,
                limit: 10,
                date_from: from.clone(),
                date_to: to.clone(),
            },
            LedgerQuery::KpiDashboard {
                date_from: from.clone(),
                date_to: to.clone(),
            },
        ];
        for query in queries {
            let err = ledger.query(&query).await.unwrap_err();
            assert_eq!(err.code, "bad_query", "{} accepted an inverted range", query.verb());
        }
    }

    #[tokio::test]
    async fn test_payment_receipts_in_range() {
        let (_dir, ledger) = seeded();
        let result = ledger
            .query(&LedgerQuery::PaymentReceipts {
                transaction_type: TransactionType::Both,
                start_date: Some("2025-07-01".into()),
                end_date: Some("2025-07-31".into()),
                party_name: None,
                limit: None,
            })
            .await
            .unwrap();
        assert_eq!(result["status"], "success");
        assert_eq!(result["transaction_count"], 2);
        assert_eq!(result["transactions"][0]["voucher_number"], "P-1");
        assert_eq!(result["transactions"][0]["amount"], json!(600.0));
        assert_eq!(result["transactions"][1]["voucher_number"], "R-1");
        assert_eq!(result["total_amount"], json!(3000.0));
        assert_eq!(result["note"], "All transactions from 2025-07-01 to 2025-07-31");

        let receipts = ledger
            .query(&LedgerQuery::PaymentReceipts {
                transaction_type: TransactionType::Receipt,
                start_date: Some("2025-07-01".into()),
                end_date: Some("2025-07-31".into()),
                party_name: Some("acme".into()),
                limit: None,
            })
            .await
            .unwrap();
        assert_eq!(receipts["transaction_count"], 1);
        assert_eq!(receipts["transaction_type"], "receipt");

        let err = ledger
            .query(&LedgerQuery::PaymentReceipts {
                transaction_type: TransactionType::Both,
                start_date: Some("2025-07-31".into()),
                end_date: Some("2025-07-01".into()),
                party_name: None,
                limit: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, "bad_query");
    }

    #[test]
    fn test_payment_receipts_default_window_and_limit() {
        let (_dir, ledger) = seeded();
        let query = LedgerQuery::PaymentReceipts {
            transaction_type: TransactionType::Both,
            start_date: None,
            end_date: None,
            party_name: None,
            limit: Some(1),
        };
        let result = query_at(&ledger, &query, "2025-08-01");
        assert_eq!(result["start_date"], "2025-02-02");
        assert_eq!(result["end_date"], "2025-08-01");
        assert_eq!(result["transaction_count"], 1);
        assert_eq!(result["transactions"][0]["voucher_number"], "P-1");
        assert_eq!(result["note"], "Latest 1 transactions from 2025-02-02 to 2025-08-01");

        // seed vouchers are older than the 180-day window
        let stale = query_at(&ledger, &query, "2026-06-01");
        assert_eq!(stale["status"], "no_data");
        assert_eq!(stale["start_date"], "2025-12-03");
    }

    #[tokio::test]
    async fn test_voucher_details_by_type_and_range() {
        let (_dir, ledger) = seeded();
        let sales = ledger
            .query(&LedgerQuery::VoucherDetails {
                voucher_number: None,
                voucher_type: Some("sales".into()),
                start_date: Some("2025-07-01".into()),
                end_date: Some("2025-07-10".into()),
            })
            .await
            .unwrap();
        assert_eq!(sales["voucher_count"], 1);
        assert_eq!(sales["vouchers"][0]["voucher_number"], "S-1");

        let all = ledger
            .query(&LedgerQuery::VoucherDetails {
                voucher_number: None,
                voucher_type: None,
                start_date: None,
                end_date: None,
            })
            .await
            .unwrap();
        assert_eq!(all["voucher_count"], 5);
        assert_eq!(all["vouchers"][0]["voucher_number"], "S-2");

        let none = ledger
            .query(&LedgerQuery::VoucherDetails {
                voucher_number: None,
                voucher_type: Some("journal".into()),
                start_date: None,
                end_date: None,
            })
            .await
            .unwrap();
        assert_eq!(none["status"], "no_data");
        assert_eq!(none["message"], "No vouchers found matching the criteria");
    }

    #[tokio::test]
    async fn test_sales_summary_by_voucher_type() {
        let (_dir, ledger) = seeded();
        let summary = ledger
            .query(&LedgerQuery::SalesSummary {
                date_from: None,
                date_to: None,
                customer: Some("acme".into()),
                voucher_type: Some("receipt".into()),
            })
            .await
            .unwrap();
        assert_eq!(summary["summary"]["total_transactions"], 1);
        assert_eq!(summary["summary"]["total_revenue"], json!(1200.0));
        assert_eq!(summary["filters_applied"]["voucher_type"], "receipt");
    }

    #[tokio::test]
    async fn test_ranking_metrics() {
        let (_dir, ledger) = seeded();
        let by_count = ledger
            .query(&LedgerQuery::TopCustomers {
                metric: CustomerMetric::Transactions,
                limit: 1,
                date_from: None,
                date_to: None,
            })
            .await
            .unwrap();
        assert_eq!(by_count["metric"], "transactions");
        assert_eq!(by_count["top_customers"][0]["customer_name"], "Acme Corp");
        assert_eq!(by_count["top_customers"][0]["transaction_count"], 2);

        let by_quantity = ledger
            .query(&LedgerQuery::TopItems {
                limit: 2,
                by_value: false,
            })
            .await
            .unwrap();
        assert_eq!(by_quantity["criteria"]["sorted_by"], "quantity");
        assert_eq!(by_quantity["top_items"][0]["item_name"], "Copper Wire");
        assert_eq!(by_quantity["top_items"][0]["total_quantity"], json!(140.0));

        let by_items = ledger
            .query(&LedgerQuery::TopSuppliers {
                metric: SupplierMetric::Items,
                limit: 5,
                date_from: Some("2025-07-01".into()),
                date_to: Some("2025-07-31".into()),
            })
            .await
            .unwrap();
        assert_eq!(by_items["metric"], "items");
        assert_eq!(by_items["count"], 1);
    }

    #[tokio::test]
    async fn test_stock_movements() {
        let (_dir, ledger) = seeded();
        let result = ledger
            .query(&LedgerQuery::StockMovements {
                start_date: "2025-07-01".into(),
                end_date: "2025-07-31".into(),
                item_name: None,
            })
            .await
            .unwrap();
        let movements = result["movements"].as_array().unwrap();
        assert_eq!(movements.len(), 3);
        assert_eq!(movements[0]["voucher_number"], "S-2");
        assert_eq!(movements[0]["movement_type"], "OUT");
        assert_eq!(movements[1]["movement_type"], "IN");
        assert_eq!(movements[2]["item"], "Steel Rod");
        assert_eq!(result["summary"]["total_in"], json!(100.0));
        assert_eq!(result["summary"]["total_out"], json!(60.0));
        assert_eq!(result["summary"]["net_movement"], json!(40.0));

        let steel = ledger
            .query(&LedgerQuery::StockMovements {
                start_date: "2025-07-01".into(),
                end_date: "2025-07-31".into(),
                item_name: Some("steel".into()),
            })
            .await
            .unwrap();
        assert_eq!(steel["summary"]["total_movements"], 1);
        assert_eq!(steel["movements"][0]["party_name"], "Acme Corp");

        let err = ledger
            .query(&LedgerQuery::StockMovements {
                start_date: "2025-07-31".into(),
                end_date: "2025-07-01".into(),
                item_name: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, "bad_query");
    }

    #[tokio::test]
    async fn test_business_overview() {
        let (_dir, ledger) = seeded();
        let result = ledger
            .query(&LedgerQuery::BusinessOverview {
                date_from: None,
                date_to: None,
            })
            .await
            .unwrap();
        let overview = &result["business_overview"];
        assert_eq!(overview["transaction_metrics"]["total_transactions"], 5);
        assert_eq!(overview["transaction_metrics"]["unique_parties"], 4);
        assert_eq!(overview["financial_metrics"]["total_inflows"], json!(3900.0));
        assert_eq!(overview["financial_metrics"]["net_position"], json!(0.0));
        // inventory lines must not multiply the accounting sums
        assert_eq!(overview["financial_metrics"]["total_outflows"], json!(3900.0));
        assert_eq!(overview["operational_metrics"]["unique_items"], 2);
        assert_eq!(overview["operational_metrics"]["total_inward_qty"], json!(100.0));
        assert_eq!(overview["operational_metrics"]["total_outward_qty"], json!(60.0));
        assert_eq!(overview["operational_metrics"]["inventory_turnover"], "High");
        assert_eq!(overview["period_info"]["start_date"], "2025-07-01");

        let empty = ledger
            .query(&LedgerQuery::BusinessOverview {
                date_from: Some("2026-01-01".into()),
                date_to: None,
            })
            .await
            .unwrap();
        assert_eq!(empty["status"], "no_data");
    }

    #[tokio::test]
    async fn test_kpi_dashboard() {
        let (_dir, ledger) = seeded();
        let result = ledger
            .query(&LedgerQuery::KpiDashboard {
                date_from: Some("2025-07-01".into()),
                date_to: Some("2025-07-31".into()),
            })
            .await
            .unwrap();
        let kpis = &result["kpi_dashboard"];
        assert_eq!(kpis["revenue_kpis"]["total_sales_revenue"], json!(1600.0));
        assert_eq!(kpis["revenue_kpis"]["active_customers"], 2);
        assert_eq!(kpis["cost_kpis"]["total_purchase_costs"], json!(800.0));
        assert_eq!(kpis["profitability_kpis"]["gross_margin"], json!(800.0));
        assert_eq!(kpis["profitability_kpis"]["margin_percentage"], json!(50.0));
        assert_eq!(kpis["profitability_kpis"]["revenue_cost_ratio"], json!(2.0));
        assert_eq!(kpis["operational_kpis"]["total_transactions"], 5);
        assert_eq!(kpis["cash_flow_kpis"]["net_cash_flow"], json!(-900.0));
    }

    #[tokio::test]
    async fn test_cross_functional_views() {
        let (_dir, ledger) = seeded();
        let items = ledger
            .query(&LedgerQuery::CrossFunctional {
                analysis_type: CrossFunctionalKind::SalesInventory,
                date_from: None,
                date_to: None,
            })
            .await
            .unwrap();
        let rows = items["cross_functional_insights"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["item"], "Steel Rod");
        assert_eq!(rows[0]["revenue_generated"], json!(1300.0));
        assert_eq!(rows[1]["items_purchased"], json!(100.0));

        let parties = ledger
            .query(&LedgerQuery::CrossFunctional {
                analysis_type: CrossFunctionalKind::SupplierCustomer,
                date_from: None,
                date_to: None,
            })
            .await
            .unwrap();
        assert_eq!(parties["data_points"], 1);
        assert_eq!(parties["cross_functional_insights"][0]["party_name"], "Acme Corp");

        let months = ledger
            .query(&LedgerQuery::CrossFunctional {
                analysis_type: CrossFunctionalKind::FinancialOperational,
                date_from: None,
                date_to: None,
            })
            .await
            .unwrap();
        let month = &months["cross_functional_insights"][0];
        assert_eq!(month["month"], "2025-07");
        assert_eq!(month["transactions"], 5);
        assert_eq!(month["inflows"], json!(3900.0));
        assert_eq!(month["unique_items"], 2);
    }

    #[test]
    fn test_strategic_insights_uses_recent_window() {
        let (_dir, ledger) = seeded();
        let query = LedgerQuery::StrategicInsights {
            focus_area: "growth".into(),
        };
        let result = query_at(&ledger, &query, "2025-08-01");
        let analysis = &result["strategic_analysis"];
        assert_eq!(analysis["focus_area"], "growth");
        assert_eq!(analysis["key_metrics"]["transaction_volume"], 5);
        assert_eq!(analysis["key_metrics"]["financial_position"], json!(-900.0));
        assert_eq!(analysis["key_metrics"]["operational_diversity"], 2);
        assert_eq!(
            analysis["strategic_insights"][1],
            "Negative cash flow needs attention to liquidity"
        );

        let later = query_at(&ledger, &query, "2026-03-01");
        assert_eq!(later["status"], "no_data");
    }

    #[tokio::test]
    async fn test_sales_analyses() {
        let (_dir, ledger) = seeded();
        let customers = ledger
            .query(&LedgerQuery::CustomerAnalysis {
                customer: Some("acme".into()),
                date_from: None,
                date_to: None,
            })
            .await
            .unwrap();
        assert_eq!(customers["total_customers"], 1);
        let acme = &customers["customers"][0];
        assert_eq!(acme["total_revenue"], json!(2400.0));
        assert_eq!(acme["avg_transaction_value"], json!(1200.0));
        assert_eq!(acme["last_transaction"], "2025-07-03");

        let revenue = ledger
            .query(&LedgerQuery::RevenueAnalysis {
                period: Period::Daily,
                date_from: None,
                date_to: None,
            })
            .await
            .unwrap();
        assert_eq!(revenue["total_periods"], 2);
        assert_eq!(revenue["revenue_analysis"][0]["period"], "2025-07-01");
        assert_eq!(revenue["revenue_analysis"][1]["revenue"], json!(400.0));

        let performance = ledger
            .query(&LedgerQuery::SalesPerformance {
                date_from: Some("2025-07-01".into()),
                date_to: Some("2025-07-31".into()),
            })
            .await
            .unwrap();
        let metrics = &performance["performance_metrics"];
        assert_eq!(metrics["total_revenue"], json!(1600.0));
        assert_eq!(metrics["avg_transaction_value"], json!(800.0));
        assert_eq!(metrics["total_quantity"], json!(60.0));
        assert_eq!(performance["period"], "2025-07-01 to 2025-07-31");
    }

    #[tokio::test]
    async fn test_sales_analytics_tiers() {
        let (_dir, ledger) = seeded();
        let all = ledger
            .query(&LedgerQuery::SalesAnalytics {
                analytics_type: AnalyticsTier::All,
                query: None,
                date_from: None,
                date_to: None,
            })
            .await
            .unwrap();
        let insights = &all["insights"];
        assert_eq!(insights["descriptive"]["total_revenue"], json!(1600.0));
        assert_eq!(insights["diagnostic"]["top_customer"]["name"], "Acme Corp");
        assert_eq!(insights["diagnostic"]["top_share_percentage"], json!(75.0));
        assert_eq!(insights["predictive"]["trend"], "flat");
        let advice = insights["prescriptive"]["recommendations"][0].as_str().unwrap();
        assert!(advice.starts_with("Acme Corp accounts for 75%"));

        let purchases = ledger
            .query(&LedgerQuery::PurchaseAnalytics {
                analytics_type: AnalyticsTier::Descriptive,
                query: Some("spend".into()),
                date_from: None,
                date_to: None,
            })
            .await
            .unwrap();
        let sections = purchases["insights"].as_object().unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections["descriptive"]["total_spending"], json!(800.0));
        assert_eq!(sections["descriptive"]["total_suppliers"], 1);
    }

    #[tokio::test]
    async fn test_purchase_analyses() {
        let (_dir, ledger) = seeded();
        let suppliers = ledger
            .query(&LedgerQuery::SupplierAnalysis {
                supplier: None,
                date_from: None,
                date_to: None,
            })
            .await
            .unwrap();
        assert_eq!(suppliers["total_suppliers"], 1);
        assert_eq!(suppliers["suppliers"][0]["supplier_name"], "Wire Mills");
        assert_eq!(suppliers["suppliers"][0]["total_spending"], json!(800.0));
        assert_eq!(suppliers["suppliers"][0]["unique_items"], 1);

        let monthly = ledger
            .query(&LedgerQuery::ProcurementAnalysis {
                period: Period::Monthly,
                date_from: None,
                date_to: None,
                category: Some("copper".into()),
            })
            .await
            .unwrap();
        assert_eq!(monthly["procurement_analysis"][0]["period"], "2025-07");
        assert_eq!(monthly["procurement_analysis"][0]["total_spending"], json!(800.0));

        let steel = ledger
            .query(&LedgerQuery::ProcurementAnalysis {
                period: Period::Monthly,
                date_from: None,
                date_to: None,
                category: Some("steel".into()),
            })
            .await
            .unwrap();
        assert_eq!(steel["status"], "no_data");

        let performance = ledger
            .query(&LedgerQuery::PurchasePerformance {
                date_from: None,
                date_to: None,
            })
            .await
            .unwrap();
        assert_eq!(performance["performance_metrics"]["total_spending"], json!(800.0));
        assert_eq!(performance["performance_metrics"]["warehouses_used"], 1);
        assert_eq!(performance["period"], "All time");
    }

    #[tokio::test]
    async fn test_focus_analytics() {
        let (_dir, ledger) = seeded();
        let cash = ledger
            .query(&LedgerQuery::FinancialAnalytics {
                analytics_type: AnalyticsTier::Descriptive,
                query_focus: FinancialFocus::CashFlow,
                start_date: Some("2025-07-01".into()),
                end_date: Some("2025-07-31".into()),
                forecast_periods: 12,
            })
            .await
            .unwrap();
        let results = &cash["analytics_results"];
        assert_eq!(results["data_points"], 2);
        assert_eq!(results["key_insights"][1], "Total cash inflow: INR 300.00");
        assert_eq!(results["forecast_periods"], Value::Null);
        assert_eq!(results["confidence_level"], json!(0.85));

        let turnover = ledger
            .query(&LedgerQuery::InventoryAnalytics {
                analytics_type: AnalyticsTier::All,
                query_focus: InventoryFocus::Turnover,
                start_date: Some("2025-07-01".into()),
                end_date: Some("2025-07-31".into()),
                forecast_periods: 6,
            })
            .await
            .unwrap();
        let results = &turnover["analytics_results"];
        assert_eq!(results["data_points"], 2);
        assert_eq!(results["summary_stats"]["total_value"], json!(2500.0));
        assert_eq!(results["summary_stats"]["total_quantity"], json!(160.0));
        assert_eq!(results["key_insights"][1], "Average transaction frequency: 1.50");
        assert_eq!(results["forecast_periods"], 6);

        let err = ledger
            .query(&LedgerQuery::InventoryAnalytics {
                analytics_type: AnalyticsTier::All,
                query_focus: InventoryFocus::StockLevels,
                start_date: None,
                end_date: None,
                forecast_periods: 0,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, "bad_query");
    }

    #[tokio::test]
    async fn test_ledger_is_read_only() {
        let (_dir, ledger) = seeded();
        let conn = Arc::clone(&ledger.conn);
        let result = tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute("DELETE FROM trn_voucher", [])
        })
        .await
        .unwrap();
        assert!(result.is_err());
    }
}
