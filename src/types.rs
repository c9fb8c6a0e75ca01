//! Core types and data structures for the reconciliation engine

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Lifecycle of an uploaded bank statement
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementStatus {
    /// Statement record created, transactions not yet imported
    Uploaded,
    /// Transaction rows imported
    Processed,
    /// Certified by a completed reconciliation; terminal
    Reconciled,
}

/// A bank-issued record of an account's activity and balances for a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankStatement {
    /// Unique identifier for the statement
    pub id: String,
    /// Owning bank account
    pub account_id: String,
    /// Date printed on the statement
    pub statement_date: NaiveDate,
    /// First day of the statement period
    pub period_start: NaiveDate,
    /// Last day of the statement period
    pub period_end: NaiveDate,
    /// Declared balance at the start of the period
    pub opening_balance: BigDecimal,
    /// Declared balance at the end of the period
    pub closing_balance: BigDecimal,
    /// Current lifecycle status
    pub status: StatementStatus,
    /// Optional reference to the uploaded source file
    pub source_file: Option<String>,
    /// Free-form notes
    pub notes: Option<String>,
    /// When the statement was created
    pub created_at: NaiveDateTime,
    /// When the statement was last updated
    pub updated_at: NaiveDateTime,
}

impl BankStatement {
    /// Create a new statement in the Uploaded state
    pub fn new(
        id: String,
        account_id: String,
        statement_date: NaiveDate,
        period_start: NaiveDate,
        period_end: NaiveDate,
        opening_balance: BigDecimal,
        closing_balance: BigDecimal,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id,
            account_id,
            statement_date,
            period_start,
            period_end,
            opening_balance,
            closing_balance,
            status: StatementStatus::Uploaded,
            source_file: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Classification of a bank transaction by direction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// Money flowing into the account
    Deposit,
    /// Money flowing out of the account
    Withdrawal,
    /// Zero-amount or unclassifiable line
    Other,
}

/// Matching state of a bank transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Not yet paired with a ledger line
    Unmatched,
    /// Referenced by exactly one reconciliation item
    Matched,
    /// Deliberately excluded from matching
    Ignored,
}

/// One line item within a bank statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    /// Unique identifier for the transaction
    pub id: String,
    /// Owning statement
    pub statement_id: String,
    /// Date the bank recorded the transaction
    pub transaction_date: NaiveDate,
    /// Description as printed by the bank
    pub description: String,
    /// Optional bank reference
    pub reference: Option<String>,
    /// Signed amount; positive is an inflow
    pub amount: BigDecimal,
    /// Running balance as declared by the bank, if provided
    pub running_balance: Option<BigDecimal>,
    /// Direction classification
    pub transaction_type: TransactionType,
    /// Check number, if the feed carried one
    pub check_number: Option<String>,
    /// Matching state
    pub status: TransactionStatus,
    /// When the transaction was imported
    pub created_at: NaiveDateTime,
    /// When the transaction was last updated
    pub updated_at: NaiveDateTime,
}

impl BankTransaction {
    /// Create a new unmatched transaction
    pub fn new(
        id: String,
        statement_id: String,
        transaction_date: NaiveDate,
        description: String,
        amount: BigDecimal,
        transaction_type: TransactionType,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id,
            statement_id,
            transaction_date,
            description,
            reference: None,
            amount,
            running_balance: None,
            transaction_type,
            check_number: None,
            status: TransactionStatus::Unmatched,
            created_at: now,
            updated_at: now,
        }
    }

    /// Absolute amount used for reconciliation math
    pub fn absolute_amount(&self) -> BigDecimal {
        self.amount.abs()
    }
}

/// One debit/credit entry from the organization's own books.
///
/// Read-only view of an external entity; the engine never writes it.
/// At most one of `debit`/`credit` is nonzero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerLine {
    /// Unique identifier of the ledger line
    pub id: String,
    /// Posting date
    pub date: NaiveDate,
    /// Line description
    pub description: String,
    /// Optional journal reference
    pub reference: Option<String>,
    /// Debit amount (non-negative)
    pub debit: BigDecimal,
    /// Credit amount (non-negative)
    pub credit: BigDecimal,
    /// Ledger account the line posts to
    pub account_id: String,
}

impl LedgerLine {
    /// The nonzero side of the line, used as the matched amount
    pub fn posted_amount(&self) -> BigDecimal {
        if self.debit > BigDecimal::from(0) {
            self.debit.clone()
        } else {
            self.credit.clone()
        }
    }
}

/// Bank account registered with the engine, carrying the last-reconciliation
/// snapshot updated on completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccount {
    /// Unique identifier for the bank account
    pub id: String,
    /// Human-readable account name
    pub name: String,
    /// Linked account in the external ledger, used to query candidate lines
    pub ledger_account_id: String,
    /// Date of the most recent completed reconciliation
    pub last_reconciliation_date: Option<NaiveDate>,
    /// Reconciled balance recorded at that completion
    pub last_reconciled_balance: Option<BigDecimal>,
    /// Reconciliation that produced the snapshot
    pub last_reconciliation_id: Option<String>,
}

impl BankAccount {
    /// Register a bank account with no reconciliation history
    pub fn new(id: String, name: String, ledger_account_id: String) -> Self {
        Self {
            id,
            name,
            ledger_account_id,
            last_reconciliation_date: None,
            last_reconciled_balance: None,
            last_reconciliation_id: None,
        }
    }
}

/// Lifecycle of a reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReconciliationStatus {
    /// Open for matching, adjustments, and balance updates
    InProgress,
    /// Difference certified within tolerance
    Completed,
    /// Signed off; terminal
    Approved,
}

/// The artifact certifying that statement and book balances agree for a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Unique identifier for the reconciliation
    pub id: String,
    /// Bank account being reconciled
    pub account_id: String,
    /// Statement being certified, if one is linked
    pub statement_id: Option<String>,
    /// Date the reconciliation is performed for
    pub reconciliation_date: NaiveDate,
    /// Prior reconciled bank balance
    pub start_balance: BigDecimal,
    /// Target bank balance
    pub end_balance: BigDecimal,
    /// Balance per the organization's books
    pub book_balance: BigDecimal,
    /// Balance per the bank statement
    pub statement_balance: BigDecimal,
    /// statement_balance - book_balance, stored at creation and recomputed
    /// only when both balances are updated together
    pub difference: BigDecimal,
    /// Current lifecycle status
    pub status: ReconciliationStatus,
    /// Free-form notes
    pub notes: Option<String>,
    /// Identity of the approver; set only on approval
    pub approved_by: Option<String>,
    /// When the reconciliation was approved
    pub approved_at: Option<NaiveDateTime>,
    /// When the reconciliation was created
    pub created_at: NaiveDateTime,
    /// When the reconciliation was last updated
    pub updated_at: NaiveDateTime,
}

impl Reconciliation {
    /// Whether the stored difference is within completion tolerance
    pub fn is_balanced(&self) -> bool {
        self.difference.abs() <= balance_tolerance()
    }
}

/// How a reconciliation item came to exist
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchType {
    /// Created by the auto-match pass
    Auto,
    /// Created by an operator
    Manual,
}

/// An asserted correspondence between a bank transaction and a ledger line.
///
/// At least one of `bank_transaction_id`/`ledger_line_id` is set. Deleted
/// outright by unmatch; never soft-deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationItem {
    /// Unique identifier for the item
    pub id: String,
    /// Owning reconciliation
    pub reconciliation_id: String,
    /// Bank-side reference, if present
    pub bank_transaction_id: Option<String>,
    /// Ledger-side reference, if present
    pub ledger_line_id: Option<String>,
    /// Auto or manual origin
    pub match_type: MatchType,
    /// Absolute amount used for reconciliation math
    pub amount: BigDecimal,
    /// Free-form notes
    pub notes: Option<String>,
    /// Identity of the operator or process that created the item
    pub created_by: Option<String>,
    /// When the item was created
    pub created_at: NaiveDateTime,
}

impl ReconciliationItem {
    /// Create an item produced by the auto-match pass
    pub fn auto(
        reconciliation_id: String,
        bank_transaction_id: String,
        ledger_line_id: String,
        amount: BigDecimal,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            reconciliation_id,
            bank_transaction_id: Some(bank_transaction_id),
            ledger_line_id: Some(ledger_line_id),
            match_type: MatchType::Auto,
            amount,
            notes: None,
            created_by: None,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

/// Approval state of an adjustment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdjustmentStatus {
    /// Entered, awaiting approval
    Pending,
    /// Approved; terminal
    Approved,
}

/// A manual balancing entry explaining a residual difference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    /// Unique identifier for the adjustment
    pub id: String,
    /// Owning reconciliation
    pub reconciliation_id: String,
    /// Date the adjustment applies to
    pub adjustment_date: NaiveDate,
    /// What the adjustment explains
    pub description: String,
    /// Free-form classification, e.g. "Bank Fee" or "Interest"
    pub adjustment_type: String,
    /// Signed amount
    pub amount: BigDecimal,
    /// Approval state
    pub status: AdjustmentStatus,
    /// When the adjustment was created
    pub created_at: NaiveDateTime,
    /// When the adjustment was last updated
    pub updated_at: NaiveDateTime,
}

/// Outcome status of a persisted import job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportJobStatus {
    /// At least one row inserted, or nothing to import
    Completed,
    /// Every submitted row was rejected
    Failed,
}

/// One rejected row from an import, with enough detail to correct the input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// Zero-based index of the row in the submitted feed
    pub row: usize,
    /// Field that failed validation or parsing
    pub field: String,
    /// Why the row was rejected
    pub reason: String,
}

/// Persisted record of one import invocation, queryable by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportJob {
    /// Unique identifier for the import
    pub id: String,
    /// Statement the rows were imported into
    pub statement_id: String,
    /// Outcome of the import
    pub status: ImportJobStatus,
    /// Number of rows inserted
    pub inserted: usize,
    /// Row-level rejections
    pub errors: Vec<RowError>,
    /// When the import ran
    pub created_at: NaiveDateTime,
}

/// Tolerance within which a difference counts as zero (0.01 currency units)
pub fn balance_tolerance() -> BigDecimal {
    BigDecimal::new(1.into(), 2)
}

/// Errors that can occur in the reconciliation engine
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Bank account not found: {0}")]
    AccountNotFound(String),
    #[error("Statement not found: {0}")]
    StatementNotFound(String),
    #[error("Bank transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Ledger line not found: {0}")]
    LedgerLineNotFound(String),
    #[error("Reconciliation not found: {0}")]
    ReconciliationNotFound(String),
    #[error("Reconciliation item not found: {0}")]
    ItemNotFound(String),
    #[error("Adjustment not found: {0}")]
    AdjustmentNotFound(String),
    #[error("Import job not found: {0}")]
    ImportJobNotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Result type for reconciliation operations
pub type ReconResult<T> = Result<T, ReconError>;
