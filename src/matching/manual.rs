//! Operator-directed match, unmatch, and triage queries

use chrono::NaiveDate;

use super::Matcher;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::validate_date_range;

/// Operator input for a manual match; at least one side is required
#[derive(Debug, Clone, Default)]
pub struct ManualMatchRequest {
    pub bank_transaction_id: Option<String>,
    pub ledger_line_id: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

/// Both sides of the manual triage view for an account and date range
#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchedActivity {
    pub bank_transactions: Vec<BankTransaction>,
    pub ledger_lines: Vec<LedgerLine>,
}

impl<S: ReconciliationStorage, L: LedgerLineReader> Matcher<S, L> {
    /// Create a manual match from a bank transaction and/or a ledger line.
    ///
    /// The amount is derived from whichever side is present, bank side first.
    /// Referenced rows must exist; a transaction already claimed elsewhere
    /// fails with `Conflict`.
    pub async fn manual_match(
        &mut self,
        reconciliation_id: &str,
        request: ManualMatchRequest,
    ) -> ReconResult<ReconciliationItem> {
        if request.bank_transaction_id.is_none() && request.ledger_line_id.is_none() {
            return Err(ReconError::Validation(
                "A bank transaction or ledger line reference is required".to_string(),
            ));
        }

        self.reconciliation_in_progress(reconciliation_id).await?;

        let mut amount = None;
        if let Some(ref transaction_id) = request.bank_transaction_id {
            let transaction = self
                .storage
                .get_transaction(transaction_id)
                .await?
                .ok_or_else(|| ReconError::TransactionNotFound(transaction_id.clone()))?;
            if transaction.status == TransactionStatus::Matched {
                return Err(ReconError::Conflict(format!(
                    "Bank transaction '{}' is already matched",
                    transaction_id
                )));
            }
            amount = Some(transaction.absolute_amount());
        }
        if let Some(ref line_id) = request.ledger_line_id {
            let line = self
                .ledger
                .get_line(line_id)
                .await?
                .ok_or_else(|| ReconError::LedgerLineNotFound(line_id.clone()))?;
            if amount.is_none() {
                amount = Some(line.posted_amount());
            }
        }
        let amount = amount.ok_or_else(|| {
            ReconError::Validation("Match amount could not be derived".to_string())
        })?;

        let item = ReconciliationItem {
            id: uuid::Uuid::new_v4().to_string(),
            reconciliation_id: reconciliation_id.to_string(),
            bank_transaction_id: request.bank_transaction_id.clone(),
            ledger_line_id: request.ledger_line_id,
            match_type: MatchType::Manual,
            amount,
            notes: request.notes,
            created_by: request.created_by,
            created_at: chrono::Utc::now().naive_utc(),
        };

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::InsertItem(item.clone()));
        if let Some(transaction_id) = request.bank_transaction_id {
            batch.push(WriteOp::SetTransactionStatus {
                transaction_id,
                expected: TransactionStatus::Unmatched,
                status: TransactionStatus::Matched,
            });
        }
        self.storage.apply(batch).await?;

        tracing::debug!(reconciliation_id, item_id = %item.id, "manual match created");
        Ok(item)
    }

    /// Delete a match and revert its bank transaction to Unmatched.
    ///
    /// Item deletion and the status reversal commit as one atomic unit.
    pub async fn unmatch(&mut self, item_id: &str) -> ReconResult<()> {
        let item = self
            .storage
            .get_item(item_id)
            .await?
            .ok_or_else(|| ReconError::ItemNotFound(item_id.to_string()))?;

        self.reconciliation_in_progress(&item.reconciliation_id)
            .await?;

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::DeleteItem {
            item_id: item_id.to_string(),
        });
        if let Some(transaction_id) = item.bank_transaction_id {
            batch.push(WriteOp::SetTransactionStatus {
                transaction_id,
                expected: TransactionStatus::Matched,
                status: TransactionStatus::Unmatched,
            });
        }
        self.storage.apply(batch).await?;

        tracing::debug!(item_id, "match removed");
        Ok(())
    }

    /// Unmatched bank transactions and unconsumed ledger lines for an account
    /// within a date range, for manual triage
    pub async fn unmatched_activity(
        &self,
        account_id: &str,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> ReconResult<UnmatchedActivity> {
        validate_date_range(date_from, date_to)?;
        let account = self
            .storage
            .get_account(account_id)
            .await?
            .ok_or_else(|| ReconError::AccountNotFound(account_id.to_string()))?;

        let statements = self
            .storage
            .list_statements(&StatementFilter {
                account_id: Some(account_id.to_string()),
                ..Default::default()
            })
            .await?;

        let mut bank_transactions = Vec::new();
        for statement in &statements {
            let transactions = self
                .storage
                .list_transactions(
                    &statement.id,
                    &TransactionFilter {
                        status: Some(TransactionStatus::Unmatched),
                        ..Default::default()
                    },
                )
                .await?;
            bank_transactions.extend(
                transactions
                    .into_iter()
                    .filter(|t| t.transaction_date >= date_from && t.transaction_date <= date_to),
            );
        }
        bank_transactions.sort_by(|a, b| {
            a.transaction_date
                .cmp(&b.transaction_date)
                .then_with(|| a.id.cmp(&b.id))
        });

        let consumed = self.storage.matched_ledger_line_ids().await?;
        let ledger_lines = self
            .ledger
            .find_candidate_lines(&account.ledger_account_id, date_from, date_to)
            .await?
            .into_iter()
            .filter(|line| !consumed.contains(&line.id))
            .collect();

        Ok(UnmatchedActivity {
            bank_transactions,
            ledger_lines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use crate::utils::memory_ledger::MemoryLedgerReader;
    use crate::utils::memory_storage::MemoryStorage;

    struct Fixture {
        matcher: Matcher<MemoryStorage, MemoryLedgerReader>,
        storage: MemoryStorage,
        ledger: MemoryLedgerReader,
    }

    async fn fixture() -> Fixture {
        let mut storage = MemoryStorage::new();
        let ledger = MemoryLedgerReader::new();
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
            BigDecimal::from(0),
            BigDecimal::from(150),
        );
        storage.save_statement(&statement).await.unwrap();
        let reconciliation = Reconciliation {
            id: "rec-1".to_string(),
            account_id: "acct-1".to_string(),
            statement_id: Some("stmt-1".to_string()),
            reconciliation_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            start_balance: BigDecimal::from(0),
            end_balance: BigDecimal::from(150),
            book_balance: BigDecimal::from(150),
            statement_balance: BigDecimal::from(150),
            difference: BigDecimal::from(0),
            status: ReconciliationStatus::InProgress,
            notes: None,
            approved_by: None,
            approved_at: None,
            created_at: chrono::Utc::now().naive_utc(),
            updated_at: chrono::Utc::now().naive_utc(),
        };
        storage.save_reconciliation(&reconciliation).await.unwrap();

        let transaction = BankTransaction::new(
            "txn-1".to_string(),
            "stmt-1".to_string(),
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            "Deposit".to_string(),
            BigDecimal::from(-120),
            TransactionType::Withdrawal,
        );
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::InsertTransaction(transaction));
        storage.apply(batch).await.unwrap();

        ledger.add_line(LedgerLine {
            id: "line-1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 6).unwrap(),
            description: "Vendor payment".to_string(),
            reference: None,
            debit: BigDecimal::from(0),
            credit: BigDecimal::from(120),
            account_id: "1000".to_string(),
        });

        Fixture {
            matcher: Matcher::new(storage.clone(), ledger.clone()),
            storage,
            ledger,
        }
    }

    #[tokio::test]
    async fn test_both_references_missing_is_rejected() {
        let mut fx = fixture().await;
        let err = fx
            .matcher
            .manual_match("rec-1", ManualMatchRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReconError::Validation(_)));
    }

    #[tokio::test]
    async fn test_match_by_transaction_only_uses_absolute_amount() {
        let mut fx = fixture().await;
        let item = fx
            .matcher
            .manual_match(
                "rec-1",
                ManualMatchRequest {
                    bank_transaction_id: Some("txn-1".to_string()),
                    created_by: Some("ops".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(item.match_type, MatchType::Manual);
        assert_eq!(item.amount, BigDecimal::from(120));
        assert_eq!(item.created_by.as_deref(), Some("ops"));

        let transaction = fx.storage.get_transaction("txn-1").await.unwrap().unwrap();
        assert_eq!(transaction.status, TransactionStatus::Matched);
    }

    #[tokio::test]
    async fn test_match_by_ledger_line_only_uses_posted_amount() {
        let mut fx = fixture().await;
        let item = fx
            .matcher
            .manual_match(
                "rec-1",
                ManualMatchRequest {
                    ledger_line_id: Some("line-1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(item.amount, BigDecimal::from(120));
        assert!(item.bank_transaction_id.is_none());
    }

    #[tokio::test]
    async fn test_unknown_ledger_line_fails_not_found() {
        let mut fx = fixture().await;
        let err = fx
            .matcher
            .manual_match(
                "rec-1",
                ManualMatchRequest {
                    ledger_line_id: Some("line-404".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReconError::LedgerLineNotFound(_)));
    }

    #[tokio::test]
    async fn test_double_match_conflicts() {
        let mut fx = fixture().await;
        fx.matcher
            .manual_match(
                "rec-1",
                ManualMatchRequest {
                    bank_transaction_id: Some("txn-1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = fx
            .matcher
            .manual_match(
                "rec-1",
                ManualMatchRequest {
                    bank_transaction_id: Some("txn-1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReconError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_match_then_unmatch_round_trips() {
        let mut fx = fixture().await;
        let item = fx
            .matcher
            .manual_match(
                "rec-1",
                ManualMatchRequest {
                    bank_transaction_id: Some("txn-1".to_string()),
                    ledger_line_id: Some("line-1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        fx.matcher.unmatch(&item.id).await.unwrap();

        let transaction = fx.storage.get_transaction("txn-1").await.unwrap().unwrap();
        assert_eq!(transaction.status, TransactionStatus::Unmatched);
        assert!(fx.storage.get_item(&item.id).await.unwrap().is_none());
        assert!(fx
            .storage
            .matched_ledger_line_ids()
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_unmatch_unknown_item_fails_not_found() {
        let mut fx = fixture().await;
        let err = fx.matcher.unmatch("item-404").await.unwrap_err();
        assert!(matches!(err, ReconError::ItemNotFound(_)));
    }

    #[tokio::test]
    async fn test_unmatched_activity_lists_both_sides() {
        let mut fx = fixture().await;
        fx.ledger.add_line(LedgerLine {
            id: "line-2".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            description: "Interest".to_string(),
            reference: None,
            debit: BigDecimal::from(5),
            credit: BigDecimal::from(0),
            account_id: "1000".to_string(),
        });

        let from = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();

        let before = fx.matcher.unmatched_activity("acct-1", from, to).await.unwrap();
        assert_eq!(before.bank_transactions.len(), 1);
        assert_eq!(before.ledger_lines.len(), 2);

        // Matching consumes one transaction and one line from the view.
        fx.matcher
            .manual_match(
                "rec-1",
                ManualMatchRequest {
                    bank_transaction_id: Some("txn-1".to_string()),
                    ledger_line_id: Some("line-1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let after = fx.matcher.unmatched_activity("acct-1", from, to).await.unwrap();
        assert!(after.bank_transactions.is_empty());
        assert_eq!(after.ledger_lines.len(), 1);
        assert_eq!(after.ledger_lines[0].id, "line-2");
    }
}
