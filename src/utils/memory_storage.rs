//! In-memory storage implementation for testing and development

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::traits::*;
use crate::types::*;

#[derive(Debug, Clone, Default)]
struct Inner {
    accounts: HashMap<String, BankAccount>,
    statements: HashMap<String, BankStatement>,
    transactions: HashMap<String, BankTransaction>,
    reconciliations: HashMap<String, Reconciliation>,
    items: HashMap<String, ReconciliationItem>,
    adjustments: HashMap<String, Adjustment>,
    import_jobs: HashMap<String, ImportJob>,
}

/// In-memory storage implementation for testing and development.
///
/// All tables live behind a single lock so [`ReconciliationStorage::apply`]
/// can validate and commit a batch without another writer interleaving. The
/// batch is applied to a working copy and swapped in on success; a failed
/// unit is never observable.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        *self.inner.write().unwrap() = Inner::default();
    }
}

fn paginate<T>(mut rows: Vec<T>, offset: Option<usize>, limit: Option<usize>) -> Vec<T> {
    if let Some(offset) = offset {
        rows = rows.split_off(offset.min(rows.len()));
    }
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    rows
}

fn apply_op(inner: &mut Inner, op: WriteOp) -> ReconResult<()> {
    match op {
        WriteOp::InsertTransaction(txn) => {
            if !inner.statements.contains_key(&txn.statement_id) {
                return Err(ReconError::StatementNotFound(txn.statement_id));
            }
            inner.transactions.insert(txn.id.clone(), txn);
            Ok(())
        }
        WriteOp::SetTransactionStatus {
            transaction_id,
            expected,
            status,
        } => {
            let txn = inner
                .transactions
                .get_mut(&transaction_id)
                .ok_or(ReconError::TransactionNotFound(transaction_id))?;
            if txn.status != expected {
                return Err(ReconError::Conflict(format!(
                    "Bank transaction '{}' is {:?}, expected {:?}",
                    txn.id, txn.status, expected
                )));
            }
            txn.status = status;
            txn.updated_at = chrono::Utc::now().naive_utc();
            Ok(())
        }
        WriteOp::SetStatementStatus {
            statement_id,
            status,
        } => {
            let statement = inner
                .statements
                .get_mut(&statement_id)
                .ok_or(ReconError::StatementNotFound(statement_id))?;
            if statement.status == StatementStatus::Reconciled {
                return Err(ReconError::Conflict(format!(
                    "Statement '{}' is already reconciled",
                    statement.id
                )));
            }
            statement.status = status;
            statement.updated_at = chrono::Utc::now().naive_utc();
            Ok(())
        }
        WriteOp::DeleteStatement { statement_id } => {
            let statement = inner
                .statements
                .get(&statement_id)
                .ok_or_else(|| ReconError::StatementNotFound(statement_id.clone()))?;
            if statement.status == StatementStatus::Reconciled {
                return Err(ReconError::Conflict(format!(
                    "Statement '{}' is reconciled and cannot be deleted",
                    statement_id
                )));
            }
            let referenced = inner
                .reconciliations
                .values()
                .any(|r| r.statement_id.as_deref() == Some(statement_id.as_str()));
            if referenced {
                return Err(ReconError::Conflict(format!(
                    "Statement '{}' is referenced by a reconciliation",
                    statement_id
                )));
            }
            inner.statements.remove(&statement_id);
            inner
                .transactions
                .retain(|_, txn| txn.statement_id != statement_id);
            Ok(())
        }
        WriteOp::InsertItem(item) => {
            if !inner.reconciliations.contains_key(&item.reconciliation_id) {
                return Err(ReconError::ReconciliationNotFound(item.reconciliation_id));
            }
            if let Some(ref line_id) = item.ledger_line_id {
                let consumed = inner
                    .items
                    .values()
                    .any(|existing| existing.ledger_line_id.as_deref() == Some(line_id.as_str()));
                if consumed {
                    return Err(ReconError::Conflict(format!(
                        "Ledger line '{}' is already matched",
                        line_id
                    )));
                }
            }
            if let Some(ref txn_id) = item.bank_transaction_id {
                if !inner.transactions.contains_key(txn_id) {
                    return Err(ReconError::TransactionNotFound(txn_id.clone()));
                }
                let claimed = inner
                    .items
                    .values()
                    .any(|existing| existing.bank_transaction_id.as_deref() == Some(txn_id.as_str()));
                if claimed {
                    return Err(ReconError::Conflict(format!(
                        "Bank transaction '{}' is already matched",
                        txn_id
                    )));
                }
            }
            inner.items.insert(item.id.clone(), item);
            Ok(())
        }
        WriteOp::DeleteItem { item_id } => {
            inner
                .items
                .remove(&item_id)
                .map(|_| ())
                .ok_or(ReconError::ItemNotFound(item_id))
        }
        WriteOp::UpdateReconciliation {
            reconciliation,
            expected,
        } => {
            let current = inner
                .reconciliations
                .get(&reconciliation.id)
                .ok_or_else(|| ReconError::ReconciliationNotFound(reconciliation.id.clone()))?;
            if current.status != expected {
                return Err(ReconError::Conflict(format!(
                    "Reconciliation '{}' is {:?}, expected {:?}",
                    reconciliation.id, current.status, expected
                )));
            }
            inner
                .reconciliations
                .insert(reconciliation.id.clone(), reconciliation);
            Ok(())
        }
        WriteOp::RecordAccountSnapshot {
            account_id,
            date,
            balance,
            reconciliation_id,
        } => {
            let account = inner
                .accounts
                .get_mut(&account_id)
                .ok_or(ReconError::AccountNotFound(account_id))?;
            account.last_reconciliation_date = Some(date);
            account.last_reconciled_balance = Some(balance);
            account.last_reconciliation_id = Some(reconciliation_id);
            Ok(())
        }
        WriteOp::PutImportJob(job) => {
            inner.import_jobs.insert(job.id.clone(), job);
            Ok(())
        }
    }
}

#[async_trait]
impl ReconciliationStorage for MemoryStorage {
    async fn save_account(&mut self, account: &BankAccount) -> ReconResult<()> {
        self.inner
            .write()
            .unwrap()
            .accounts
            .insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn get_account(&self, account_id: &str) -> ReconResult<Option<BankAccount>> {
        Ok(self.inner.read().unwrap().accounts.get(account_id).cloned())
    }

    async fn save_statement(&mut self, statement: &BankStatement) -> ReconResult<()> {
        self.inner
            .write()
            .unwrap()
            .statements
            .insert(statement.id.clone(), statement.clone());
        Ok(())
    }

    async fn get_statement(&self, statement_id: &str) -> ReconResult<Option<BankStatement>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .statements
            .get(statement_id)
            .cloned())
    }

    async fn list_statements(&self, filter: &StatementFilter) -> ReconResult<Vec<BankStatement>> {
        let inner = self.inner.read().unwrap();
        let mut rows: Vec<BankStatement> = inner
            .statements
            .values()
            .filter(|s| {
                filter
                    .account_id
                    .as_ref()
                    .is_none_or(|id| &s.account_id == id)
                    && filter.status.as_ref().is_none_or(|st| &s.status == st)
                    && filter.date_from.is_none_or(|d| s.statement_date >= d)
                    && filter.date_to.is_none_or(|d| s.statement_date <= d)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.statement_date
                .cmp(&b.statement_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(paginate(rows, filter.offset, filter.limit))
    }

    async fn update_statement(&mut self, statement: &BankStatement) -> ReconResult<()> {
        let mut inner = self.inner.write().unwrap();
        if inner.statements.contains_key(&statement.id) {
            inner
                .statements
                .insert(statement.id.clone(), statement.clone());
            Ok(())
        } else {
            Err(ReconError::StatementNotFound(statement.id.clone()))
        }
    }

    async fn get_transaction(&self, transaction_id: &str) -> ReconResult<Option<BankTransaction>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .transactions
            .get(transaction_id)
            .cloned())
    }

    async fn list_transactions(
        &self,
        statement_id: &str,
        filter: &TransactionFilter,
    ) -> ReconResult<Vec<BankTransaction>> {
        let inner = self.inner.read().unwrap();
        let mut rows: Vec<BankTransaction> = inner
            .transactions
            .values()
            .filter(|t| {
                t.statement_id == statement_id
                    && filter.status.as_ref().is_none_or(|st| &t.status == st)
                    && filter
                        .transaction_type
                        .as_ref()
                        .is_none_or(|tt| &t.transaction_type == tt)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.transaction_date
                .cmp(&b.transaction_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(paginate(rows, filter.offset, filter.limit))
    }

    async fn update_transaction(&mut self, transaction: &BankTransaction) -> ReconResult<()> {
        let mut inner = self.inner.write().unwrap();
        if inner.transactions.contains_key(&transaction.id) {
            inner
                .transactions
                .insert(transaction.id.clone(), transaction.clone());
            Ok(())
        } else {
            Err(ReconError::TransactionNotFound(transaction.id.clone()))
        }
    }

    async fn save_reconciliation(&mut self, reconciliation: &Reconciliation) -> ReconResult<()> {
        self.inner
            .write()
            .unwrap()
            .reconciliations
            .insert(reconciliation.id.clone(), reconciliation.clone());
        Ok(())
    }

    async fn get_reconciliation(
        &self,
        reconciliation_id: &str,
    ) -> ReconResult<Option<Reconciliation>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .reconciliations
            .get(reconciliation_id)
            .cloned())
    }

    async fn list_reconciliations(
        &self,
        filter: &ReconciliationFilter,
    ) -> ReconResult<Vec<Reconciliation>> {
        let inner = self.inner.read().unwrap();
        let mut rows: Vec<Reconciliation> = inner
            .reconciliations
            .values()
            .filter(|r| {
                filter
                    .account_id
                    .as_ref()
                    .is_none_or(|id| &r.account_id == id)
                    && filter.status.as_ref().is_none_or(|st| &r.status == st)
                    && filter.date_from.is_none_or(|d| r.reconciliation_date >= d)
                    && filter.date_to.is_none_or(|d| r.reconciliation_date <= d)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.reconciliation_date
                .cmp(&b.reconciliation_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(paginate(rows, filter.offset, filter.limit))
    }

    async fn update_reconciliation(&mut self, reconciliation: &Reconciliation) -> ReconResult<()> {
        let mut inner = self.inner.write().unwrap();
        if inner.reconciliations.contains_key(&reconciliation.id) {
            inner
                .reconciliations
                .insert(reconciliation.id.clone(), reconciliation.clone());
            Ok(())
        } else {
            Err(ReconError::ReconciliationNotFound(reconciliation.id.clone()))
        }
    }

    async fn get_item(&self, item_id: &str) -> ReconResult<Option<ReconciliationItem>> {
        Ok(self.inner.read().unwrap().items.get(item_id).cloned())
    }

    async fn list_items(&self, reconciliation_id: &str) -> ReconResult<Vec<ReconciliationItem>> {
        let inner = self.inner.read().unwrap();
        let mut rows: Vec<ReconciliationItem> = inner
            .items
            .values()
            .filter(|i| i.reconciliation_id == reconciliation_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn matched_ledger_line_ids(&self) -> ReconResult<HashSet<String>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .items
            .values()
            .filter_map(|i| i.ledger_line_id.clone())
            .collect())
    }

    async fn statement_referenced(&self, statement_id: &str) -> ReconResult<bool> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .reconciliations
            .values()
            .any(|r| r.statement_id.as_deref() == Some(statement_id)))
    }

    async fn save_adjustment(&mut self, adjustment: &Adjustment) -> ReconResult<()> {
        self.inner
            .write()
            .unwrap()
            .adjustments
            .insert(adjustment.id.clone(), adjustment.clone());
        Ok(())
    }

    async fn get_adjustment(&self, adjustment_id: &str) -> ReconResult<Option<Adjustment>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .adjustments
            .get(adjustment_id)
            .cloned())
    }

    async fn list_adjustments(&self, reconciliation_id: &str) -> ReconResult<Vec<Adjustment>> {
        let inner = self.inner.read().unwrap();
        let mut rows: Vec<Adjustment> = inner
            .adjustments
            .values()
            .filter(|a| a.reconciliation_id == reconciliation_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn update_adjustment(&mut self, adjustment: &Adjustment) -> ReconResult<()> {
        let mut inner = self.inner.write().unwrap();
        if inner.adjustments.contains_key(&adjustment.id) {
            inner
                .adjustments
                .insert(adjustment.id.clone(), adjustment.clone());
            Ok(())
        } else {
            Err(ReconError::AdjustmentNotFound(adjustment.id.clone()))
        }
    }

    async fn delete_adjustment(&mut self, adjustment_id: &str) -> ReconResult<()> {
        let mut inner = self.inner.write().unwrap();
        if inner.adjustments.remove(adjustment_id).is_some() {
            Ok(())
        } else {
            Err(ReconError::AdjustmentNotFound(adjustment_id.to_string()))
        }
    }

    async fn get_import_job(&self, job_id: &str) -> ReconResult<Option<ImportJob>> {
        Ok(self.inner.read().unwrap().import_jobs.get(job_id).cloned())
    }

    async fn apply(&mut self, batch: WriteBatch) -> ReconResult<()> {
        let mut inner = self.inner.write().unwrap();
        let mut next = inner.clone();
        for op in batch.into_ops() {
            apply_op(&mut next, op)?;
        }
        *inner = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    fn seeded() -> MemoryStorage {
        let storage = MemoryStorage::new();
        {
            let mut inner = storage.inner.write().unwrap();
            let statement = BankStatement::new(
                "stmt-1".to_string(),
                "acct-1".to_string(),
                NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
                BigDecimal::from(0),
                BigDecimal::from(100),
            );
            inner.statements.insert(statement.id.clone(), statement);
            let txn = BankTransaction::new(
                "txn-1".to_string(),
                "stmt-1".to_string(),
                NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
                "Deposit".to_string(),
                BigDecimal::from(100),
                TransactionType::Deposit,
            );
            inner.transactions.insert(txn.id.clone(), txn);
        }
        storage
    }

    #[tokio::test]
    async fn test_apply_rolls_back_on_guard_failure() {
        let mut storage = seeded();

        // Second op fails its expected-status guard; the first must not stick.
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::SetStatementStatus {
            statement_id: "stmt-1".to_string(),
            status: StatementStatus::Processed,
        });
        batch.push(WriteOp::SetTransactionStatus {
            transaction_id: "txn-1".to_string(),
            expected: TransactionStatus::Matched,
            status: TransactionStatus::Unmatched,
        });

        let err = storage.apply(batch).await.unwrap_err();
        assert!(matches!(err, ReconError::Conflict(_)));

        let statement = storage.get_statement("stmt-1").await.unwrap().unwrap();
        assert_eq!(statement.status, StatementStatus::Uploaded);
    }

    #[tokio::test]
    async fn test_insert_item_rejects_consumed_ledger_line() {
        let mut storage = seeded();
        let recon = Reconciliation {
            id: "rec-1".to_string(),
            account_id: "acct-1".to_string(),
            statement_id: Some("stmt-1".to_string()),
            reconciliation_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            start_balance: BigDecimal::from(0),
            end_balance: BigDecimal::from(100),
            book_balance: BigDecimal::from(100),
            statement_balance: BigDecimal::from(100),
            difference: BigDecimal::from(0),
            status: ReconciliationStatus::InProgress,
            notes: None,
            approved_by: None,
            approved_at: None,
            created_at: chrono::Utc::now().naive_utc(),
            updated_at: chrono::Utc::now().naive_utc(),
        };
        storage.save_reconciliation(&recon).await.unwrap();

        let first = ReconciliationItem::auto(
            "rec-1".to_string(),
            "txn-1".to_string(),
            "line-1".to_string(),
            BigDecimal::from(100),
        );
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::InsertItem(first));
        storage.apply(batch).await.unwrap();

        let mut second = ReconciliationItem::auto(
            "rec-1".to_string(),
            "txn-1".to_string(),
            "line-1".to_string(),
            BigDecimal::from(100),
        );
        second.bank_transaction_id = None;
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::InsertItem(second));
        let err = storage.apply(batch).await.unwrap_err();
        assert!(matches!(err, ReconError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete_statement_cascades_transactions() {
        let mut storage = seeded();
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::DeleteStatement {
            statement_id: "stmt-1".to_string(),
        });
        storage.apply(batch).await.unwrap();

        assert!(storage.get_statement("stmt-1").await.unwrap().is_none());
        assert!(storage.get_transaction("txn-1").await.unwrap().is_none());
    }
}
