//! Read-side assembly of a reconciliation's full audit view

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::traits::*;
use crate::types::*;

/// One match with both referenced sides resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedItemDetail {
    pub item: ReconciliationItem,
    pub bank_transaction: Option<BankTransaction>,
    pub ledger_line: Option<LedgerLine>,
}

/// Adjustment counts and net amount for a reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentSummary {
    pub total: usize,
    pub approved: usize,
    pub pending: usize,
    pub net_amount: BigDecimal,
}

/// Full audit/export view of a reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub reconciliation: Reconciliation,
    pub matches: Vec<MatchedItemDetail>,
    pub adjustments: Vec<Adjustment>,
    pub adjustment_summary: AdjustmentSummary,
    /// Matched transactions on the linked statement
    pub matched_transactions: usize,
    /// Unmatched transactions on the linked statement
    pub unmatched_transactions: usize,
    /// Items carrying a ledger-side reference
    pub matched_lines: usize,
    /// Candidate lines in the statement period not yet consumed by any item
    pub unmatched_lines: usize,
    /// Whether |difference| is within tolerance
    pub is_balanced: bool,
    pub generated_at: NaiveDateTime,
}

/// Read-only aggregation over matches, adjustments, and summary statistics
pub struct ReportAssembler<S: ReconciliationStorage, L: LedgerLineReader> {
    storage: S,
    ledger: L,
}

impl<S: ReconciliationStorage, L: LedgerLineReader> ReportAssembler<S, L> {
    /// Create a new report assembler
    pub fn new(storage: S, ledger: L) -> Self {
        Self { storage, ledger }
    }

    /// Build the full report for a reconciliation. No mutation.
    pub async fn build_report(&self, reconciliation_id: &str) -> ReconResult<ReconciliationReport> {
        let reconciliation = self
            .storage
            .get_reconciliation(reconciliation_id)
            .await?
            .ok_or_else(|| ReconError::ReconciliationNotFound(reconciliation_id.to_string()))?;

        let items = self.storage.list_items(reconciliation_id).await?;
        let mut matches = Vec::with_capacity(items.len());
        for item in items {
            let bank_transaction = match item.bank_transaction_id {
                Some(ref transaction_id) => self.storage.get_transaction(transaction_id).await?,
                None => None,
            };
            let ledger_line = match item.ledger_line_id {
                Some(ref line_id) => self.ledger.get_line(line_id).await?,
                None => None,
            };
            matches.push(MatchedItemDetail {
                item,
                bank_transaction,
                ledger_line,
            });
        }

        let adjustments = self.storage.list_adjustments(reconciliation_id).await?;
        let approved = adjustments
            .iter()
            .filter(|a| a.status == AdjustmentStatus::Approved)
            .count();
        let net_amount: BigDecimal = adjustments.iter().map(|a| &a.amount).sum();
        let adjustment_summary = AdjustmentSummary {
            total: adjustments.len(),
            approved,
            pending: adjustments.len() - approved,
            net_amount,
        };

        let (matched_transactions, unmatched_transactions) = match reconciliation.statement_id {
            Some(ref statement_id) => {
                let transactions = self
                    .storage
                    .list_transactions(statement_id, &TransactionFilter::default())
                    .await?;
                let matched = transactions
                    .iter()
                    .filter(|t| t.status == TransactionStatus::Matched)
                    .count();
                let unmatched = transactions
                    .iter()
                    .filter(|t| t.status == TransactionStatus::Unmatched)
                    .count();
                (matched, unmatched)
            }
            None => (0, 0),
        };

        let matched_lines = matches
            .iter()
            .filter(|m| m.item.ledger_line_id.is_some())
            .count();
        let unmatched_lines = match reconciliation.statement_id {
            Some(ref statement_id) => {
                let statement = self
                    .storage
                    .get_statement(statement_id)
                    .await?
                    .ok_or_else(|| ReconError::StatementNotFound(statement_id.clone()))?;
                let account = self
                    .storage
                    .get_account(&reconciliation.account_id)
                    .await?
                    .ok_or_else(|| {
                        ReconError::AccountNotFound(reconciliation.account_id.clone())
                    })?;
                let consumed = self.storage.matched_ledger_line_ids().await?;
                self.ledger
                    .find_candidate_lines(
                        &account.ledger_account_id,
                        statement.period_start,
                        statement.period_end,
                    )
                    .await?
                    .into_iter()
                    .filter(|line| !consumed.contains(&line.id))
                    .count()
            }
            None => 0,
        };

        let is_balanced = reconciliation.is_balanced();
        Ok(ReconciliationReport {
            reconciliation,
            matches,
            adjustments,
            adjustment_summary,
            matched_transactions,
            unmatched_transactions,
            matched_lines,
            unmatched_lines,
            is_balanced,
            generated_at: chrono::Utc::now().naive_utc(),
        })
    }
}
