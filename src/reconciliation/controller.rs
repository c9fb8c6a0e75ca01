//! Reconciliation lifecycle: creation, balance tracking, completion, approval

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::traits::*;
use crate::types::*;

/// Fields required to open a reconciliation
#[derive(Debug, Clone)]
pub struct NewReconciliation {
    pub account_id: String,
    pub statement_id: Option<String>,
    pub reconciliation_date: NaiveDate,
    pub start_balance: BigDecimal,
    pub end_balance: BigDecimal,
    pub book_balance: BigDecimal,
    pub statement_balance: BigDecimal,
    pub notes: Option<String>,
}

/// Partial update of a reconciliation; unset fields are left unchanged.
///
/// `difference` is recomputed only when `book_balance` and
/// `statement_balance` are both present in the same update.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationUpdate {
    pub reconciliation_date: Option<NaiveDate>,
    pub start_balance: Option<BigDecimal>,
    pub end_balance: Option<BigDecimal>,
    pub book_balance: Option<BigDecimal>,
    pub statement_balance: Option<BigDecimal>,
    pub notes: Option<String>,
    pub status: Option<ReconciliationStatus>,
}

/// A reconciliation with its nested matches and adjustments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationDetail {
    pub reconciliation: Reconciliation,
    pub items: Vec<ReconciliationItem>,
    pub adjustments: Vec<Adjustment>,
}

/// Controller owning the InProgress -> Completed -> Approved state machine.
///
/// The only component authorized to mark a statement Reconciled.
pub struct ReconciliationController<S: ReconciliationStorage> {
    storage: S,
}

impl<S: ReconciliationStorage> ReconciliationController<S> {
    /// Create a new controller
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Open a reconciliation with operator-supplied balances.
    ///
    /// `difference` is computed once here as statement_balance - book_balance.
    /// At most one InProgress reconciliation may exist per bank account.
    pub async fn create(&mut self, new: NewReconciliation) -> ReconResult<Reconciliation> {
        if self.storage.get_account(&new.account_id).await?.is_none() {
            return Err(ReconError::AccountNotFound(new.account_id));
        }

        if let Some(ref statement_id) = new.statement_id {
            let statement = self
                .storage
                .get_statement(statement_id)
                .await?
                .ok_or_else(|| ReconError::StatementNotFound(statement_id.clone()))?;
            if statement.account_id != new.account_id {
                return Err(ReconError::Validation(format!(
                    "Statement '{}' belongs to account '{}', not '{}'",
                    statement_id, statement.account_id, new.account_id
                )));
            }
        }

        let open = self
            .storage
            .list_reconciliations(&ReconciliationFilter {
                account_id: Some(new.account_id.clone()),
                status: Some(ReconciliationStatus::InProgress),
                ..Default::default()
            })
            .await?;
        if let Some(existing) = open.first() {
            return Err(ReconError::Conflict(format!(
                "Account '{}' already has reconciliation '{}' in progress",
                new.account_id, existing.id
            )));
        }

        let now = chrono::Utc::now().naive_utc();
        let difference = &new.statement_balance - &new.book_balance;
        let reconciliation = Reconciliation {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: new.account_id,
            statement_id: new.statement_id,
            reconciliation_date: new.reconciliation_date,
            start_balance: new.start_balance,
            end_balance: new.end_balance,
            book_balance: new.book_balance,
            statement_balance: new.statement_balance,
            difference,
            status: ReconciliationStatus::InProgress,
            notes: new.notes,
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        };
        self.storage.save_reconciliation(&reconciliation).await?;

        tracing::debug!(reconciliation_id = %reconciliation.id, "reconciliation opened");
        Ok(reconciliation)
    }

    /// Get a reconciliation by ID
    pub async fn get(&self, reconciliation_id: &str) -> ReconResult<Option<Reconciliation>> {
        self.storage.get_reconciliation(reconciliation_id).await
    }

    /// Get a reconciliation by ID, returning an error if not found
    pub async fn get_required(&self, reconciliation_id: &str) -> ReconResult<Reconciliation> {
        self.storage
            .get_reconciliation(reconciliation_id)
            .await?
            .ok_or_else(|| ReconError::ReconciliationNotFound(reconciliation_id.to_string()))
    }

    /// Get a reconciliation with its nested items and adjustments
    pub async fn get_detail(&self, reconciliation_id: &str) -> ReconResult<ReconciliationDetail> {
        let reconciliation = self.get_required(reconciliation_id).await?;
        let items = self.storage.list_items(reconciliation_id).await?;
        let adjustments = self.storage.list_adjustments(reconciliation_id).await?;
        Ok(ReconciliationDetail {
            reconciliation,
            items,
            adjustments,
        })
    }

    /// List reconciliations matching a filter
    pub async fn list(&self, filter: &ReconciliationFilter) -> ReconResult<Vec<Reconciliation>> {
        self.storage.list_reconciliations(filter).await
    }

    /// Apply a partial update.
    ///
    /// Date and balance edits require InProgress. The only status reachable
    /// here is Approved (from Completed), which stamps the approver identity
    /// and timestamp; completion goes through [`Self::complete`] so its
    /// difference precondition cannot be bypassed.
    pub async fn update(
        &mut self,
        reconciliation_id: &str,
        update: ReconciliationUpdate,
        actor: Option<&str>,
    ) -> ReconResult<Reconciliation> {
        let mut reconciliation = self.get_required(reconciliation_id).await?;

        if reconciliation.status == ReconciliationStatus::Approved {
            return Err(ReconError::Conflict(format!(
                "Reconciliation '{}' is approved and cannot be changed",
                reconciliation_id
            )));
        }

        let edits_fields = update.reconciliation_date.is_some()
            || update.start_balance.is_some()
            || update.end_balance.is_some()
            || update.book_balance.is_some()
            || update.statement_balance.is_some();
        if edits_fields && reconciliation.status != ReconciliationStatus::InProgress {
            return Err(ReconError::Conflict(format!(
                "Reconciliation '{}' is {:?}; balances can only change while InProgress",
                reconciliation_id, reconciliation.status
            )));
        }

        if let Some(reconciliation_date) = update.reconciliation_date {
            reconciliation.reconciliation_date = reconciliation_date;
        }
        if let Some(start_balance) = update.start_balance {
            reconciliation.start_balance = start_balance;
        }
        if let Some(end_balance) = update.end_balance {
            reconciliation.end_balance = end_balance;
        }

        // Difference is re-derived only when both balances arrive together.
        match (update.book_balance, update.statement_balance) {
            (Some(book_balance), Some(statement_balance)) => {
                reconciliation.difference = &statement_balance - &book_balance;
                reconciliation.book_balance = book_balance;
                reconciliation.statement_balance = statement_balance;
            }
            (Some(book_balance), None) => reconciliation.book_balance = book_balance,
            (None, Some(statement_balance)) => {
                reconciliation.statement_balance = statement_balance
            }
            (None, None) => {}
        }

        if let Some(notes) = update.notes {
            reconciliation.notes = Some(notes);
        }

        if let Some(status) = update.status {
            match status {
                ReconciliationStatus::Approved => {
                    if reconciliation.status != ReconciliationStatus::Completed {
                        return Err(ReconError::Conflict(format!(
                            "Reconciliation '{}' is {:?}; only a completed reconciliation can be approved",
                            reconciliation_id, reconciliation.status
                        )));
                    }
                    let approver = actor.ok_or_else(|| {
                        ReconError::Validation("Approver identity is required".to_string())
                    })?;
                    reconciliation.status = ReconciliationStatus::Approved;
                    reconciliation.approved_by = Some(approver.to_string());
                    reconciliation.approved_at = Some(chrono::Utc::now().naive_utc());
                    tracing::info!(reconciliation_id, approver, "reconciliation approved");
                }
                ReconciliationStatus::Completed => {
                    return Err(ReconError::Conflict(
                        "Completed status is set by completing the reconciliation".to_string(),
                    ));
                }
                ReconciliationStatus::InProgress => {
                    if reconciliation.status != ReconciliationStatus::InProgress {
                        return Err(ReconError::Conflict(format!(
                            "Reconciliation '{}' cannot be reopened",
                            reconciliation_id
                        )));
                    }
                }
            }
        }

        reconciliation.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_reconciliation(&reconciliation).await?;

        Ok(reconciliation)
    }

    /// Complete a reconciliation whose stored difference is within tolerance.
    ///
    /// On success the reconciliation, the linked statement's Reconciled
    /// status, and the bank account's last-reconciliation snapshot commit as
    /// one atomic unit.
    pub async fn complete(&mut self, reconciliation_id: &str) -> ReconResult<Reconciliation> {
        let mut reconciliation = self.get_required(reconciliation_id).await?;

        if reconciliation.status != ReconciliationStatus::InProgress {
            return Err(ReconError::Conflict(format!(
                "Reconciliation '{}' is {:?} and cannot be completed",
                reconciliation_id, reconciliation.status
            )));
        }
        if !reconciliation.is_balanced() {
            return Err(ReconError::Conflict(format!(
                "Cannot complete reconciliation '{}': difference is {}",
                reconciliation_id, reconciliation.difference
            )));
        }

        reconciliation.status = ReconciliationStatus::Completed;
        reconciliation.updated_at = chrono::Utc::now().naive_utc();

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::UpdateReconciliation {
            reconciliation: reconciliation.clone(),
            expected: ReconciliationStatus::InProgress,
        });
        if let Some(ref statement_id) = reconciliation.statement_id {
            batch.push(WriteOp::SetStatementStatus {
                statement_id: statement_id.clone(),
                status: StatementStatus::Reconciled,
            });
        }
        batch.push(WriteOp::RecordAccountSnapshot {
            account_id: reconciliation.account_id.clone(),
            date: reconciliation.reconciliation_date,
            balance: reconciliation.end_balance.clone(),
            reconciliation_id: reconciliation.id.clone(),
        });
        self.storage.apply(batch).await?;

        tracing::info!(reconciliation_id, "reconciliation completed");
        Ok(reconciliation)
    }

    /// Approve a completed reconciliation, stamping the approver
    pub async fn approve(
        &mut self,
        reconciliation_id: &str,
        approver: &str,
    ) -> ReconResult<Reconciliation> {
        self.update(
            reconciliation_id,
            ReconciliationUpdate {
                status: Some(ReconciliationStatus::Approved),
                ..Default::default()
            },
            Some(approver),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;

    async fn controller_with_statement() -> (ReconciliationController<MemoryStorage>, MemoryStorage)
    {
        let mut storage = MemoryStorage::new();
        storage
            .save_account(&BankAccount::new(
                "acct-1".to_string(),
                "Operating".to_string(),
                "1000".to_string(),
            ))
            .await
            .unwrap();
        let statement = BankStatement::new(
            "stmt-1".to_string(),
            "acct-1".to_string(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            BigDecimal::from(950),
            BigDecimal::from(1000),
        );
        storage.save_statement(&statement).await.unwrap();
        (ReconciliationController::new(storage.clone()), storage)
    }

    fn march_reconciliation() -> NewReconciliation {
        NewReconciliation {
            account_id: "acct-1".to_string(),
            statement_id: Some("stmt-1".to_string()),
            reconciliation_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            start_balance: BigDecimal::from(950),
            end_balance: BigDecimal::from(1000),
            book_balance: BigDecimal::from(950),
            statement_balance: BigDecimal::from(1000),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_create_stores_difference_once() {
        let (mut controller, _storage) = controller_with_statement().await;
        let reconciliation = controller.create(march_reconciliation()).await.unwrap();
        assert_eq!(reconciliation.difference, BigDecimal::from(50));
        assert_eq!(reconciliation.status, ReconciliationStatus::InProgress);
    }

    #[tokio::test]
    async fn test_second_open_reconciliation_conflicts() {
        let (mut controller, _storage) = controller_with_statement().await;
        controller.create(march_reconciliation()).await.unwrap();

        let mut second = march_reconciliation();
        second.statement_id = None;
        let err = controller.create(second).await.unwrap_err();
        assert!(matches!(err, ReconError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_complete_out_of_tolerance_names_difference() {
        let (mut controller, _storage) = controller_with_statement().await;
        let reconciliation = controller.create(march_reconciliation()).await.unwrap();

        let err = controller.complete(&reconciliation.id).await.unwrap_err();
        match err {
            ReconError::Conflict(message) => assert!(message.contains("50")),
            other => panic!("expected Conflict, got {:?}", other),
        }

        let stored = controller.get_required(&reconciliation.id).await.unwrap();
        assert_eq!(stored.status, ReconciliationStatus::InProgress);
    }

    #[tokio::test]
    async fn test_difference_recomputed_only_with_both_balances() {
        let (mut controller, _storage) = controller_with_statement().await;
        let reconciliation = controller.create(march_reconciliation()).await.unwrap();

        // One-sided balance update leaves the stored difference alone.
        let updated = controller
            .update(
                &reconciliation.id,
                ReconciliationUpdate {
                    book_balance: Some(BigDecimal::from(1000)),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(updated.difference, BigDecimal::from(50));

        let updated = controller
            .update(
                &reconciliation.id,
                ReconciliationUpdate {
                    book_balance: Some(BigDecimal::from(1000)),
                    statement_balance: Some(BigDecimal::from(1000)),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(updated.difference, BigDecimal::from(0));
    }

    #[tokio::test]
    async fn test_complete_updates_statement_and_snapshot() {
        let (mut controller, storage) = controller_with_statement().await;
        let reconciliation = controller.create(march_reconciliation()).await.unwrap();
        controller
            .update(
                &reconciliation.id,
                ReconciliationUpdate {
                    book_balance: Some(BigDecimal::from(1000)),
                    statement_balance: Some(BigDecimal::from(1000)),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();

        let completed = controller.complete(&reconciliation.id).await.unwrap();
        assert_eq!(completed.status, ReconciliationStatus::Completed);

        let statement = storage.get_statement("stmt-1").await.unwrap().unwrap();
        assert_eq!(statement.status, StatementStatus::Reconciled);

        let account = storage.get_account("acct-1").await.unwrap().unwrap();
        assert_eq!(
            account.last_reconciliation_date,
            Some(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap())
        );
        assert_eq!(account.last_reconciled_balance, Some(BigDecimal::from(1000)));
        assert_eq!(account.last_reconciliation_id, Some(reconciliation.id));
    }

    #[tokio::test]
    async fn test_approve_requires_completed_and_stamps_approver() {
        let (mut controller, _storage) = controller_with_statement().await;
        let reconciliation = controller.create(march_reconciliation()).await.unwrap();

        let err = controller
            .approve(&reconciliation.id, "auditor")
            .await
            .unwrap_err();
        assert!(matches!(err, ReconError::Conflict(_)));

        controller
            .update(
                &reconciliation.id,
                ReconciliationUpdate {
                    book_balance: Some(BigDecimal::from(1000)),
                    statement_balance: Some(BigDecimal::from(1000)),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        controller.complete(&reconciliation.id).await.unwrap();

        let approved = controller
            .approve(&reconciliation.id, "auditor")
            .await
            .unwrap();
        assert_eq!(approved.status, ReconciliationStatus::Approved);
        assert_eq!(approved.approved_by.as_deref(), Some("auditor"));
        assert!(approved.approved_at.is_some());

        // Approved is terminal.
        let err = controller
            .update(
                &reconciliation.id,
                ReconciliationUpdate {
                    notes: Some("late note".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReconError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_cannot_set_completed_directly() {
        let (mut controller, _storage) = controller_with_statement().await;
        let reconciliation = controller.create(march_reconciliation()).await.unwrap();

        let err = controller
            .update(
                &reconciliation.id,
                ReconciliationUpdate {
                    status: Some(ReconciliationStatus::Completed),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReconError::Conflict(_)));
    }
}
