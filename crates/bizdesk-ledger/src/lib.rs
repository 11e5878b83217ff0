//! bizdesk-ledger - Tally ledger access for bizdesk
//!
//! Opens a SQLite export of a Tally company read-only and answers the
//! financial, sales, inventory and purchase query verbs.

mod analytics;
pub mod queries;
pub mod tally;

pub use queries::{CURRENCY, QueryError};
pub use tally::{REQUIRED_TABLES, TallyLedger};
