//! bizdesk-core - routing and orchestration for the business assistant
//!
//! This crate provides:
//! - Capability registry with typed parameter schemas
//! - Keyword dispatcher that picks the owning business domain
//! - Per-domain intent router with argument extraction and validation
//! - Composite action orchestrator with partial-failure reporting
//! - Mail, calendar and ledger adapter traits, Google and in-memory adapters
//! - The built-in capability catalog and the top-level manager

pub mod adapters;
pub mod capability;
pub mod catalog;
pub mod composite;
pub mod dispatcher;
pub mod error;
pub mod extract;
pub mod manager;
pub mod orchestrator;
pub mod router;
pub mod types;

// Re-export main types for convenience
pub use adapters::{
    AdapterSet, AnalyticsTier, CalendarAdapter, CreatedEvent, CrossFunctionalKind,
    CustomerMetric, FinancialFocus, InventoryFocus, LedgerAdapter, LedgerQuery, MailAdapter,
    MessageSummary, NewEvent, OutgoingMail, Period, SentMail, SupplierMetric, TransactionType,
};
pub use capability::{
    AdapterKind, Binding, Capability, CapabilityDefinition, CapabilityRegistry, CompositeKind,
    Extractor, ParamKind, ParamSpec,
};
pub use dispatcher::{Dispatcher, DomainProfile, DomainScore};
pub use error::{AdapterError, CoreError, CoreResult};
pub use manager::{Manager, ManagerConfig, Outcome, Preview, Response, TieBreak};
pub use orchestrator::{
    CompositeAction, CompositeReport, CompositeStep, ExecutionMode, InvocationResult,
    Orchestrator, OrchestratorConfig, ReportStatus, StepInput, StepInvoker, StepReport,
    StepStatus, escape_template, format_report,
};
pub use router::{Candidate, IntentRouter, RouteOutcome, RouterConfig};
pub use types::{Arguments, DelegationRequest, Domain, Instruction};
