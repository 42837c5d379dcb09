//! # AI Bookkeeper
//!
//! An AI-assisted double-entry bookkeeping engine exposed as MCP tool
//! servers. An LLM agent drives the bookkeeping primitives — supplier CRUD,
//! transaction search and GST-aware recategorization, accounting-rule
//! governance, audit reports — over a JSON-RPC request/response transport,
//! while the engine enforces the accounting invariants that make that safe:
//! balanced entries, immutable bank legs, and idempotent statement imports.
//!
//! ## Core Concepts
//!
//! - **Bank accounts** live at codes `001`-`099`, appear in exactly one leg
//!   of every journal entry, and are never mutated by the tool surface.
//! - **Uncategorized (999)**: every imported statement row lands here; the
//!   categorization loop moves it to a real account later.
//! - **Bank-transaction identity**: `(day, description, amount, bankCode)`.
//!   The journal holds at most one entry per identity, so re-importing a
//!   statement is a no-op and recategorization never breaks deduplication.
//! - **GST splitting**: a gross amount against a GST-applicable account
//!   splits into `net` and `gst = gross * 0.1 / 1.1` on the clearing
//!   account, with the rounding residual absorbed into `net`.
//!
//! ## Example
//!
//! ```rust
//! use ai_bookkeeper::gst::split_gross;
//! use ai_bookkeeper::schema::{Account, AccountType, GstTreatment};
//! use rust_decimal_macros::dec;
//!
//! let account = Account {
//!     code: "200".to_string(),
//!     name: "Office Supplies".to_string(),
//!     account_type: AccountType::Expense,
//!     gst_applicable: true,
//!     gst_treatment: GstTreatment::GstOnExpenses,
//! };
//! let lines = split_gross(&account, dec!(11.00), "506").unwrap();
//! assert_eq!(lines[0].amount, dec!(10.00));
//! assert_eq!(lines[1].amount, dec!(1.00));
//! ```

pub mod backup;
pub mod chart_of_accounts;
pub mod company_file;
pub mod config;
pub mod error;
pub mod gst;
pub mod import;
pub mod journal;
pub mod llm;
pub mod mcp;
pub mod persist;
pub mod reports;
pub mod rules;
pub mod schema;
pub mod servers;
pub mod suppliers;

pub use chart_of_accounts::ChartOfAccounts;
pub use company_file::{CompanyFile, LedgerStores};
pub use config::Settings;
pub use error::{LedgerError, Result};
pub use gst::split_gross;
pub use import::{import_csv, ImportSummary};
pub use journal::GeneralJournal;
pub use rules::AccountingRulesStore;
pub use schema::*;
pub use suppliers::SupplierRegistry;
