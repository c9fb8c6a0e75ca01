//! Engine facade that coordinates statements, matching, and reconciliation

use chrono::NaiveDate;

use crate::matching::{
    AutoMatchOptions, AutoMatchOutcome, ManualMatchRequest, Matcher, UnmatchedActivity,
};
use crate::reconciliation::adjustment::{AdjustmentManager, AdjustmentUpdate, NewAdjustment};
use crate::reconciliation::controller::{
    NewReconciliation, ReconciliationController, ReconciliationDetail, ReconciliationUpdate,
};
use crate::reconciliation::report::{ReconciliationReport, ReportAssembler};
use crate::statement::importer::{ImportOutcome, RawTransactionRow, TransactionImporter};
use crate::statement::store::{NewStatement, StatementManager, StatementUpdate, TransactionUpdate};
use crate::traits::*;
use crate::types::*;

/// Main reconciliation engine that orchestrates all back-office operations
pub struct ReconciliationEngine<S, L>
where
    S: ReconciliationStorage + Clone,
    L: LedgerLineReader + Clone,
{
    storage: S,
    statements: StatementManager<S>,
    importer: TransactionImporter<S>,
    matcher: Matcher<S, L>,
    controller: ReconciliationController<S>,
    adjustments: AdjustmentManager<S>,
    reports: ReportAssembler<S, L>,
}

impl<S, L> ReconciliationEngine<S, L>
where
    S: ReconciliationStorage + Clone,
    L: LedgerLineReader + Clone,
{
    /// Create a new engine over a storage backend and a ledger reader
    pub fn new(storage: S, ledger: L) -> Self {
        Self {
            storage: storage.clone(),
            statements: StatementManager::new(storage.clone()),
            importer: TransactionImporter::new(storage.clone()),
            matcher: Matcher::new(storage.clone(), ledger.clone()),
            controller: ReconciliationController::new(storage.clone()),
            adjustments: AdjustmentManager::new(storage.clone()),
            reports: ReportAssembler::new(storage, ledger),
        }
    }

    /// Create a new engine with a custom statement validator
    pub fn with_statement_validator(
        storage: S,
        ledger: L,
        validator: Box<dyn StatementValidator>,
    ) -> Self {
        let mut engine = Self::new(storage.clone(), ledger);
        engine.statements = StatementManager::with_validator(storage, validator);
        engine
    }

    // Account operations
    /// Register a bank account with the engine
    pub async fn register_account(&mut self, account: BankAccount) -> ReconResult<()> {
        self.storage.save_account(&account).await
    }

    /// Get a registered bank account
    pub async fn get_account(&self, account_id: &str) -> ReconResult<Option<BankAccount>> {
        self.storage.get_account(account_id).await
    }

    // Statement operations
    /// Create a statement in the Uploaded state
    pub async fn create_statement(&mut self, new: NewStatement) -> ReconResult<BankStatement> {
        self.statements.create(new).await
    }

    /// Get a statement by ID
    pub async fn get_statement(&self, statement_id: &str) -> ReconResult<Option<BankStatement>> {
        self.statements.get(statement_id).await
    }

    /// List statements matching a filter
    pub async fn list_statements(
        &self,
        filter: &StatementFilter,
    ) -> ReconResult<Vec<BankStatement>> {
        self.statements.list(filter).await
    }

    /// Apply a partial update to a statement
    pub async fn update_statement(
        &mut self,
        statement_id: &str,
        update: StatementUpdate,
    ) -> ReconResult<BankStatement> {
        self.statements.update(statement_id, update).await
    }

    /// Delete a statement and its transactions
    pub async fn delete_statement(&mut self, statement_id: &str) -> ReconResult<()> {
        self.statements.delete(statement_id).await
    }

    // Transaction operations
    /// Bulk-import a raw transaction feed into a statement
    pub async fn import_transactions(
        &mut self,
        statement_id: &str,
        rows: Vec<RawTransactionRow>,
    ) -> ReconResult<ImportOutcome> {
        self.importer.import(statement_id, rows).await
    }

    /// Look up a persisted import job
    pub async fn get_import_job(&self, job_id: &str) -> ReconResult<ImportJob> {
        self.importer.get_job(job_id).await
    }

    /// List a statement's transactions matching a filter
    pub async fn list_transactions(
        &self,
        statement_id: &str,
        filter: &TransactionFilter,
    ) -> ReconResult<Vec<BankTransaction>> {
        self.statements.list_transactions(statement_id, filter).await
    }

    /// Update a single transaction's editable fields
    pub async fn update_transaction(
        &mut self,
        transaction_id: &str,
        update: TransactionUpdate,
    ) -> ReconResult<BankTransaction> {
        self.statements.update_transaction(transaction_id, update).await
    }

    // Matching operations
    /// Run one auto-match pass over a reconciliation
    pub async fn auto_match(
        &mut self,
        reconciliation_id: &str,
        options: &AutoMatchOptions,
    ) -> ReconResult<AutoMatchOutcome> {
        self.matcher.auto_match(reconciliation_id, options).await
    }

    /// Create a manual match
    pub async fn manual_match(
        &mut self,
        reconciliation_id: &str,
        request: ManualMatchRequest,
    ) -> ReconResult<ReconciliationItem> {
        self.matcher.manual_match(reconciliation_id, request).await
    }

    /// Remove a match and revert its bank transaction
    pub async fn unmatch(&mut self, item_id: &str) -> ReconResult<()> {
        self.matcher.unmatch(item_id).await
    }

    /// Unmatched activity on both sides for manual triage
    pub async fn unmatched_activity(
        &self,
        account_id: &str,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> ReconResult<UnmatchedActivity> {
        self.matcher
            .unmatched_activity(account_id, date_from, date_to)
            .await
    }

    // Reconciliation operations
    /// Open a reconciliation
    pub async fn create_reconciliation(
        &mut self,
        new: NewReconciliation,
    ) -> ReconResult<Reconciliation> {
        self.controller.create(new).await
    }

    /// Get a reconciliation by ID
    pub async fn get_reconciliation(
        &self,
        reconciliation_id: &str,
    ) -> ReconResult<Option<Reconciliation>> {
        self.controller.get(reconciliation_id).await
    }

    /// Get a reconciliation with nested items and adjustments
    pub async fn get_reconciliation_detail(
        &self,
        reconciliation_id: &str,
    ) -> ReconResult<ReconciliationDetail> {
        self.controller.get_detail(reconciliation_id).await
    }

    /// List reconciliations matching a filter
    pub async fn list_reconciliations(
        &self,
        filter: &ReconciliationFilter,
    ) -> ReconResult<Vec<Reconciliation>> {
        self.controller.list(filter).await
    }

    /// Apply a partial update to a reconciliation
    pub async fn update_reconciliation(
        &mut self,
        reconciliation_id: &str,
        update: ReconciliationUpdate,
        actor: Option<&str>,
    ) -> ReconResult<Reconciliation> {
        self.controller.update(reconciliation_id, update, actor).await
    }

    /// Complete a reconciliation within tolerance
    pub async fn complete_reconciliation(
        &mut self,
        reconciliation_id: &str,
    ) -> ReconResult<Reconciliation> {
        self.controller.complete(reconciliation_id).await
    }

    /// Approve a completed reconciliation
    pub async fn approve_reconciliation(
        &mut self,
        reconciliation_id: &str,
        approver: &str,
    ) -> ReconResult<Reconciliation> {
        self.controller.approve(reconciliation_id, approver).await
    }

    // Adjustment operations
    /// Create a pending adjustment
    pub async fn create_adjustment(&mut self, new: NewAdjustment) -> ReconResult<Adjustment> {
        self.adjustments.create(new).await
    }

    /// List a reconciliation's adjustments
    pub async fn list_adjustments(&self, reconciliation_id: &str) -> ReconResult<Vec<Adjustment>> {
        self.adjustments.list(reconciliation_id).await
    }

    /// Apply a partial update to an adjustment
    pub async fn update_adjustment(
        &mut self,
        adjustment_id: &str,
        update: AdjustmentUpdate,
    ) -> ReconResult<Adjustment> {
        self.adjustments.update(adjustment_id, update).await
    }

    /// Approve a pending adjustment
    pub async fn approve_adjustment(&mut self, adjustment_id: &str) -> ReconResult<Adjustment> {
        self.adjustments.approve(adjustment_id).await
    }

    /// Delete an adjustment
    pub async fn delete_adjustment(&mut self, adjustment_id: &str) -> ReconResult<()> {
        self.adjustments.delete(adjustment_id).await
    }

    // Reporting
    /// Build the full audit report for a reconciliation
    pub async fn reconciliation_report(
        &self,
        reconciliation_id: &str,
    ) -> ReconResult<ReconciliationReport> {
        self.reports.build_report(reconciliation_id).await
    }
}
