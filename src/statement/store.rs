//! Statement store: durable records of uploaded bank statements

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::traits::*;
use crate::types::*;

/// Fields required to create a statement
#[derive(Debug, Clone)]
pub struct NewStatement {
    pub account_id: String,
    pub statement_date: NaiveDate,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub opening_balance: BigDecimal,
    pub closing_balance: BigDecimal,
    pub source_file: Option<String>,
    pub notes: Option<String>,
}

/// Partial update of a statement; unset fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct StatementUpdate {
    pub statement_date: Option<NaiveDate>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub opening_balance: Option<BigDecimal>,
    pub closing_balance: Option<BigDecimal>,
    pub source_file: Option<String>,
    pub notes: Option<String>,
}

/// Manager for statement records and their single-row transaction edits
pub struct StatementManager<S: ReconciliationStorage> {
    pub(crate) storage: S,
    validator: Box<dyn StatementValidator>,
}

impl<S: ReconciliationStorage> StatementManager<S> {
    /// Create a new statement manager
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultStatementValidator),
        }
    }

    /// Create a new statement manager with a custom validator
    pub fn with_validator(storage: S, validator: Box<dyn StatementValidator>) -> Self {
        Self { storage, validator }
    }

    /// Create a statement in the Uploaded state
    pub async fn create(&mut self, new: NewStatement) -> ReconResult<BankStatement> {
        if self.storage.get_account(&new.account_id).await?.is_none() {
            return Err(ReconError::AccountNotFound(new.account_id));
        }

        let mut statement = BankStatement::new(
            uuid::Uuid::new_v4().to_string(),
            new.account_id,
            new.statement_date,
            new.period_start,
            new.period_end,
            new.opening_balance,
            new.closing_balance,
        );
        statement.source_file = new.source_file;
        statement.notes = new.notes;

        self.validator.validate_statement(&statement)?;
        self.storage.save_statement(&statement).await?;

        Ok(statement)
    }

    /// Get a statement by ID
    pub async fn get(&self, statement_id: &str) -> ReconResult<Option<BankStatement>> {
        self.storage.get_statement(statement_id).await
    }

    /// Get a statement by ID, returning an error if not found
    pub async fn get_required(&self, statement_id: &str) -> ReconResult<BankStatement> {
        self.storage
            .get_statement(statement_id)
            .await?
            .ok_or_else(|| ReconError::StatementNotFound(statement_id.to_string()))
    }

    /// List statements matching a filter
    pub async fn list(&self, filter: &StatementFilter) -> ReconResult<Vec<BankStatement>> {
        self.storage.list_statements(filter).await
    }

    /// Apply a partial update to a statement.
    ///
    /// Reconciled statements are terminal and cannot be edited.
    pub async fn update(
        &mut self,
        statement_id: &str,
        update: StatementUpdate,
    ) -> ReconResult<BankStatement> {
        let mut statement = self.get_required(statement_id).await?;

        if statement.status == StatementStatus::Reconciled {
            return Err(ReconError::Conflict(format!(
                "Statement '{}' is reconciled and cannot be edited",
                statement_id
            )));
        }

        if let Some(statement_date) = update.statement_date {
            statement.statement_date = statement_date;
        }
        if let Some(period_start) = update.period_start {
            statement.period_start = period_start;
        }
        if let Some(period_end) = update.period_end {
            statement.period_end = period_end;
        }
        if let Some(opening_balance) = update.opening_balance {
            statement.opening_balance = opening_balance;
        }
        if let Some(closing_balance) = update.closing_balance {
            statement.closing_balance = closing_balance;
        }
        if let Some(source_file) = update.source_file {
            statement.source_file = Some(source_file);
        }
        if let Some(notes) = update.notes {
            statement.notes = Some(notes);
        }

        self.validator.validate_statement(&statement)?;
        statement.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_statement(&statement).await?;

        Ok(statement)
    }

    /// Delete a statement and cascade its transactions.
    ///
    /// Blocked with `Conflict` when the statement is reconciled or referenced
    /// by any reconciliation; the check is re-run inside the atomic unit so
    /// the guard holds under concurrent reconciliation creation.
    pub async fn delete(&mut self, statement_id: &str) -> ReconResult<()> {
        let statement = self.get_required(statement_id).await?;

        if statement.status == StatementStatus::Reconciled {
            return Err(ReconError::Conflict(format!(
                "Statement '{}' is reconciled and cannot be deleted",
                statement_id
            )));
        }
        if self.storage.statement_referenced(statement_id).await? {
            return Err(ReconError::Conflict(format!(
                "Statement '{}' is referenced by a reconciliation",
                statement_id
            )));
        }

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::DeleteStatement {
            statement_id: statement_id.to_string(),
        });
        self.storage.apply(batch).await?;

        tracing::debug!(statement_id, "statement deleted");
        Ok(())
    }

    /// List a statement's transactions matching a filter
    pub async fn list_transactions(
        &self,
        statement_id: &str,
        filter: &TransactionFilter,
    ) -> ReconResult<Vec<BankTransaction>> {
        self.get_required(statement_id).await?;
        self.storage.list_transactions(statement_id, filter).await
    }

    /// Get a bank transaction by ID, returning an error if not found
    pub async fn get_transaction_required(
        &self,
        transaction_id: &str,
    ) -> ReconResult<BankTransaction> {
        self.storage
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| ReconError::TransactionNotFound(transaction_id.to_string()))
    }

    /// Update a single transaction's editable fields.
    ///
    /// The Matched status is owned by the matcher: it can be neither set nor
    /// cleared here, only toggled between Unmatched and Ignored.
    pub async fn update_transaction(
        &mut self,
        transaction_id: &str,
        update: TransactionUpdate,
    ) -> ReconResult<BankTransaction> {
        let mut transaction = self.get_transaction_required(transaction_id).await?;

        if let Some(ref status) = update.status {
            if *status == TransactionStatus::Matched {
                return Err(ReconError::Validation(
                    "Matched status can only be set by matching".to_string(),
                ));
            }
            if transaction.status == TransactionStatus::Matched {
                return Err(ReconError::Conflict(format!(
                    "Bank transaction '{}' is matched; unmatch it first",
                    transaction_id
                )));
            }
        }

        if let Some(description) = update.description {
            transaction.description = description;
        }
        if let Some(reference) = update.reference {
            transaction.reference = Some(reference);
        }
        if let Some(check_number) = update.check_number {
            transaction.check_number = Some(check_number);
        }
        if let Some(transaction_type) = update.transaction_type {
            transaction.transaction_type = transaction_type;
        }
        if let Some(status) = update.status {
            transaction.status = status;
        }

        transaction.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_transaction(&transaction).await?;

        Ok(transaction)
    }
}

/// Partial update of a bank transaction; unset fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct TransactionUpdate {
    pub description: Option<String>,
    pub reference: Option<String>,
    pub check_number: Option<String>,
    pub transaction_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;

    async fn manager_with_account() -> StatementManager<MemoryStorage> {
        let mut storage = MemoryStorage::new();
        storage
            .save_account(&BankAccount::new(
                "acct-1".to_string(),
                "Operating".to_string(),
                "1000".to_string(),
            ))
            .await
            .unwrap();
        StatementManager::new(storage)
    }

    fn march_statement() -> NewStatement {
        NewStatement {
            account_id: "acct-1".to_string(),
            statement_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            period_start: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            opening_balance: BigDecimal::from(500),
            closing_balance: BigDecimal::from(650),
            source_file: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_create_requires_known_account() {
        let mut manager = manager_with_account().await;
        let mut new = march_statement();
        new.account_id = "missing".to_string();
        let err = manager.create(new).await.unwrap_err();
        assert!(matches!(err, ReconError::AccountNotFound(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_inverted_period() {
        let mut manager = manager_with_account().await;
        let mut new = march_statement();
        new.period_start = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let err = manager.create(new).await.unwrap_err();
        assert!(matches!(err, ReconError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_blocked_when_referenced() {
        let mut manager = manager_with_account().await;
        let statement = manager.create(march_statement()).await.unwrap();

        let recon = Reconciliation {
            id: "rec-1".to_string(),
            account_id: "acct-1".to_string(),
            statement_id: Some(statement.id.clone()),
            reconciliation_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            start_balance: BigDecimal::from(500),
            end_balance: BigDecimal::from(650),
            book_balance: BigDecimal::from(650),
            statement_balance: BigDecimal::from(650),
            difference: BigDecimal::from(0),
            status: ReconciliationStatus::InProgress,
            notes: None,
            approved_by: None,
            approved_at: None,
            created_at: chrono::Utc::now().naive_utc(),
            updated_at: chrono::Utc::now().naive_utc(),
        };
        manager.storage.save_reconciliation(&recon).await.unwrap();

        let err = manager.delete(&statement.id).await.unwrap_err();
        assert!(matches!(err, ReconError::Conflict(_)));

        // Statement survives the refused delete.
        assert!(manager.get(&statement.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_blocked_once_reconciled() {
        let mut manager = manager_with_account().await;
        let mut statement = manager.create(march_statement()).await.unwrap();
        statement.status = StatementStatus::Reconciled;
        manager.storage.update_statement(&statement).await.unwrap();

        let err = manager
            .update(
                &statement.id,
                StatementUpdate {
                    notes: Some("late edit".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReconError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_transaction_status_matched_is_reserved() {
        let mut manager = manager_with_account().await;
        let statement = manager.create(march_statement()).await.unwrap();

        let txn = BankTransaction::new(
            "txn-1".to_string(),
            statement.id.clone(),
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            "Deposit".to_string(),
            BigDecimal::from(100),
            TransactionType::Deposit,
        );
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::InsertTransaction(txn));
        manager.storage.apply(batch).await.unwrap();

        let err = manager
            .update_transaction(
                "txn-1",
                TransactionUpdate {
                    status: Some(TransactionStatus::Matched),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReconError::Validation(_)));

        let updated = manager
            .update_transaction(
                "txn-1",
                TransactionUpdate {
                    status: Some(TransactionStatus::Ignored),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, TransactionStatus::Ignored);
    }
}
