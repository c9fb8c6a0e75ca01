//! # Reconciliation Core
//!
//! A bank reconciliation engine for fund-accounting back offices: statement
//! import, transaction matching, balancing adjustments, and period
//! certification.
//!
//! ## Features
//!
//! - **Statement store**: uploaded statements with declared balances and a
//!   gated Uploaded -> Processed -> Reconciled lifecycle
//! - **Transaction importer**: row-level validation of raw tabular feeds with
//!   partial success and a persisted import job record
//! - **Matching**: heuristic auto-match (exactly-one-candidate rule) and
//!   operator-directed match/unmatch, atomic under concurrency
//! - **Adjustments**: operator-entered balancing entries with independent
//!   approval
//! - **Reconciliation lifecycle**: difference tracking, tolerance-gated
//!   completion, and approval with audit stamping
//! - **Reporting**: full read-side audit view of matches, adjustments, and
//!   summary statistics
//! - **Storage abstraction**: database-agnostic design with trait-based
//!   storage and atomic write batches
//!
//! ## Quick Start
//!
//! ```rust
//! use reconciliation_core::{BankAccount, MemoryLedgerReader, MemoryStorage, ReconciliationEngine};
//!
//! // The in-memory backends stand in for a real database and ledger.
//! let storage = MemoryStorage::new();
//! let ledger = MemoryLedgerReader::new();
//! let engine = ReconciliationEngine::new(storage, ledger);
//! # let _ = engine;
//! ```

pub mod matching;
pub mod reconciliation;
pub mod statement;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use matching::*;
pub use reconciliation::*;
pub use statement::*;
pub use traits::*;
pub use types::*;
pub use utils::{MemoryLedgerReader, MemoryStorage};
