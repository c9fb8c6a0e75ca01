//! Traits for storage abstraction and external collaborators

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::types::*;

/// Typed filter for statement listings.
///
/// Every field is optional; unset fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementFilter {
    /// Restrict to one bank account
    pub account_id: Option<String>,
    /// Restrict to one lifecycle status
    pub status: Option<StatementStatus>,
    /// Earliest statement date, inclusive
    pub date_from: Option<NaiveDate>,
    /// Latest statement date, inclusive
    pub date_to: Option<NaiveDate>,
    /// Rows to skip before returning results
    pub offset: Option<usize>,
    /// Maximum rows to return
    pub limit: Option<usize>,
}

/// Typed filter for transaction listings within a statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionFilter {
    /// Restrict to one matching status
    pub status: Option<TransactionStatus>,
    /// Restrict to one direction classification
    pub transaction_type: Option<TransactionType>,
    /// Rows to skip before returning results
    pub offset: Option<usize>,
    /// Maximum rows to return
    pub limit: Option<usize>,
}

/// Typed filter for reconciliation listings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationFilter {
    /// Restrict to one bank account
    pub account_id: Option<String>,
    /// Restrict to one lifecycle status
    pub status: Option<ReconciliationStatus>,
    /// Earliest reconciliation date, inclusive
    pub date_from: Option<NaiveDate>,
    /// Latest reconciliation date, inclusive
    pub date_to: Option<NaiveDate>,
    /// Rows to skip before returning results
    pub offset: Option<usize>,
    /// Maximum rows to return
    pub limit: Option<usize>,
}

/// One write inside an atomic unit.
///
/// Ops that carry an `expected` status are compare-and-swap guards: the
/// storage must reject the whole batch with `Conflict` when the row's current
/// status differs, so a concurrent claim of the same row cannot be overwritten.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Insert a freshly imported bank transaction
    InsertTransaction(BankTransaction),
    /// Transition a bank transaction's matching status, guarded by `expected`
    SetTransactionStatus {
        transaction_id: String,
        expected: TransactionStatus,
        status: TransactionStatus,
    },
    /// Advance a statement's lifecycle status; Reconciled statements are terminal
    SetStatementStatus {
        statement_id: String,
        status: StatementStatus,
    },
    /// Remove a statement and cascade its transactions, re-validating that it
    /// is neither Reconciled nor referenced by any reconciliation
    DeleteStatement { statement_id: String },
    /// Insert a reconciliation item; both referenced sides must still be free
    InsertItem(ReconciliationItem),
    /// Delete a reconciliation item outright
    DeleteItem { item_id: String },
    /// Replace a reconciliation row, guarded by its expected current status
    UpdateReconciliation {
        reconciliation: Reconciliation,
        expected: ReconciliationStatus,
    },
    /// Record the last-reconciliation snapshot on a bank account
    RecordAccountSnapshot {
        account_id: String,
        date: NaiveDate,
        balance: bigdecimal::BigDecimal,
        reconciliation_id: String,
    },
    /// Persist the record of one import invocation
    PutImportJob(ImportJob),
}

/// An ordered set of writes applied all-or-nothing
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a write to the batch
    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    /// Whether the batch contains no writes
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of writes in the batch
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Consume the batch, yielding its ops in insertion order
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Storage abstraction for the reconciliation engine.
///
/// This trait allows the engine to work with any storage backend
/// (PostgreSQL, MySQL, SQLite, in-memory, etc.) by implementing these
/// methods. Multi-row mutations go through [`ReconciliationStorage::apply`],
/// which must be atomic: a failed batch leaves no observable change.
#[async_trait]
pub trait ReconciliationStorage: Send + Sync {
    /// Register or replace a bank account
    async fn save_account(&mut self, account: &BankAccount) -> ReconResult<()>;

    /// Get a bank account by ID
    async fn get_account(&self, account_id: &str) -> ReconResult<Option<BankAccount>>;

    /// Save a new statement
    async fn save_statement(&mut self, statement: &BankStatement) -> ReconResult<()>;

    /// Get a statement by ID
    async fn get_statement(&self, statement_id: &str) -> ReconResult<Option<BankStatement>>;

    /// List statements matching a filter, ordered by statement date
    async fn list_statements(&self, filter: &StatementFilter) -> ReconResult<Vec<BankStatement>>;

    /// Update an existing statement
    async fn update_statement(&mut self, statement: &BankStatement) -> ReconResult<()>;

    /// Get a bank transaction by ID
    async fn get_transaction(&self, transaction_id: &str) -> ReconResult<Option<BankTransaction>>;

    /// List a statement's transactions matching a filter, ordered by date
    async fn list_transactions(
        &self,
        statement_id: &str,
        filter: &TransactionFilter,
    ) -> ReconResult<Vec<BankTransaction>>;

    /// Update an existing bank transaction
    async fn update_transaction(&mut self, transaction: &BankTransaction) -> ReconResult<()>;

    /// Save a new reconciliation
    async fn save_reconciliation(&mut self, reconciliation: &Reconciliation) -> ReconResult<()>;

    /// Get a reconciliation by ID
    async fn get_reconciliation(
        &self,
        reconciliation_id: &str,
    ) -> ReconResult<Option<Reconciliation>>;

    /// List reconciliations matching a filter, ordered by reconciliation date
    async fn list_reconciliations(
        &self,
        filter: &ReconciliationFilter,
    ) -> ReconResult<Vec<Reconciliation>>;

    /// Update an existing reconciliation outside an atomic unit
    async fn update_reconciliation(&mut self, reconciliation: &Reconciliation) -> ReconResult<()>;

    /// Get a reconciliation item by ID
    async fn get_item(&self, item_id: &str) -> ReconResult<Option<ReconciliationItem>>;

    /// List a reconciliation's items in creation order
    async fn list_items(&self, reconciliation_id: &str) -> ReconResult<Vec<ReconciliationItem>>;

    /// Ledger line ids consumed by any reconciliation item
    async fn matched_ledger_line_ids(&self) -> ReconResult<HashSet<String>>;

    /// Whether any reconciliation references the statement
    async fn statement_referenced(&self, statement_id: &str) -> ReconResult<bool>;

    /// Save a new adjustment
    async fn save_adjustment(&mut self, adjustment: &Adjustment) -> ReconResult<()>;

    /// Get an adjustment by ID
    async fn get_adjustment(&self, adjustment_id: &str) -> ReconResult<Option<Adjustment>>;

    /// List a reconciliation's adjustments in creation order
    async fn list_adjustments(&self, reconciliation_id: &str) -> ReconResult<Vec<Adjustment>>;

    /// Update an existing adjustment
    async fn update_adjustment(&mut self, adjustment: &Adjustment) -> ReconResult<()>;

    /// Delete an adjustment
    async fn delete_adjustment(&mut self, adjustment_id: &str) -> ReconResult<()>;

    /// Get a persisted import job by ID
    async fn get_import_job(&self, job_id: &str) -> ReconResult<Option<ImportJob>>;

    /// Apply a batch of writes as one atomic unit.
    ///
    /// Either every op takes effect or none does. Guarded ops failing their
    /// `expected` check abort the batch with `Conflict`.
    async fn apply(&mut self, batch: WriteBatch) -> ReconResult<()>;
}

/// Read-only query interface into the external ledger.
///
/// The engine never writes through this trait and never locks the ledger.
#[async_trait]
pub trait LedgerLineReader: Send + Sync {
    /// Unmatched candidate lines for a ledger account within a date window,
    /// inclusive on both ends. Lines already consumed by a reconciliation
    /// item are filtered out by the caller.
    async fn find_candidate_lines(
        &self,
        ledger_account_id: &str,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> ReconResult<Vec<LedgerLine>>;

    /// Look up a single ledger line by ID
    async fn get_line(&self, line_id: &str) -> ReconResult<Option<LedgerLine>>;
}

/// Trait for implementing custom statement validation rules
pub trait StatementValidator: Send + Sync {
    /// Validate a statement before saving
    fn validate_statement(&self, statement: &BankStatement) -> ReconResult<()>;
}

/// Default statement validator with basic rules
pub struct DefaultStatementValidator;

impl StatementValidator for DefaultStatementValidator {
    fn validate_statement(&self, statement: &BankStatement) -> ReconResult<()> {
        if statement.id.trim().is_empty() {
            return Err(ReconError::Validation(
                "Statement ID cannot be empty".to_string(),
            ));
        }

        if statement.account_id.trim().is_empty() {
            return Err(ReconError::Validation(
                "Statement account ID cannot be empty".to_string(),
            ));
        }

        if statement.period_start > statement.period_end {
            return Err(ReconError::Validation(format!(
                "Statement period start {} is after period end {}",
                statement.period_start, statement.period_end
            )));
        }

        Ok(())
    }
}
