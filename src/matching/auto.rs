//! Heuristic auto-match pass

use bigdecimal::BigDecimal;
use chrono::Duration;
use std::collections::HashSet;

use super::{amounts_match, dates_within, descriptions_overlap, Matcher};
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::validate_tolerance_days;

/// Tuning for one auto-match pass
#[derive(Debug, Clone, PartialEq)]
pub struct AutoMatchOptions {
    /// Maximum days between bank transaction and ledger line dates
    pub tolerance_days: i64,
    /// Require descriptions to contain one another (case-insensitive)
    pub match_descriptions: bool,
}

impl Default for AutoMatchOptions {
    fn default() -> Self {
        Self {
            tolerance_days: 3,
            match_descriptions: false,
        }
    }
}

/// One accepted pairing from an auto-match pass
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedPair {
    pub bank_transaction_id: String,
    pub ledger_line_id: String,
    pub amount: BigDecimal,
}

/// Result of one auto-match pass
#[derive(Debug, Clone, PartialEq)]
pub struct AutoMatchOutcome {
    pub matches_created: usize,
    pub pairs: Vec<MatchedPair>,
}

impl<S: ReconciliationStorage, L: LedgerLineReader> Matcher<S, L> {
    /// Run one auto-match pass over a reconciliation's unmatched transactions.
    ///
    /// A transaction is matched only when exactly one candidate ledger line
    /// satisfies every active criterion; zero or multiple candidates leave it
    /// untouched. All accepted matches commit as one atomic unit, so a
    /// concurrent claim of any involved transaction rolls back the entire
    /// pass.
    pub async fn auto_match(
        &mut self,
        reconciliation_id: &str,
        options: &AutoMatchOptions,
    ) -> ReconResult<AutoMatchOutcome> {
        validate_tolerance_days(options.tolerance_days)?;

        let reconciliation = self.reconciliation_in_progress(reconciliation_id).await?;
        let statement_id = reconciliation.statement_id.clone().ok_or_else(|| {
            ReconError::Validation(format!(
                "Reconciliation '{}' has no linked statement to match against",
                reconciliation_id
            ))
        })?;
        let statement = self
            .storage
            .get_statement(&statement_id)
            .await?
            .ok_or_else(|| ReconError::StatementNotFound(statement_id.clone()))?;
        let account = self
            .storage
            .get_account(&reconciliation.account_id)
            .await?
            .ok_or_else(|| ReconError::AccountNotFound(reconciliation.account_id.clone()))?;

        let unmatched = self
            .storage
            .list_transactions(
                &statement_id,
                &TransactionFilter {
                    status: Some(TransactionStatus::Unmatched),
                    ..Default::default()
                },
            )
            .await?;

        let window_from = statement.period_start - Duration::days(options.tolerance_days);
        let window_to = statement.period_end + Duration::days(options.tolerance_days);
        let consumed = self.storage.matched_ledger_line_ids().await?;
        let candidates: Vec<LedgerLine> = self
            .ledger
            .find_candidate_lines(&account.ledger_account_id, window_from, window_to)
            .await?
            .into_iter()
            .filter(|line| !consumed.contains(&line.id))
            .collect();

        let mut claimed: HashSet<String> = HashSet::new();
        let mut batch = WriteBatch::new();
        let mut pairs = Vec::new();

        for transaction in &unmatched {
            let hits: Vec<&LedgerLine> = candidates
                .iter()
                .filter(|line| !claimed.contains(&line.id))
                .filter(|line| amounts_match(transaction, line))
                .filter(|line| dates_within(transaction, line, options.tolerance_days))
                .filter(|line| {
                    !options.match_descriptions
                        || descriptions_overlap(&transaction.description, &line.description)
                })
                .collect();

            // Ambiguity is never auto-resolved.
            if hits.len() != 1 {
                continue;
            }
            let line = hits[0];

            claimed.insert(line.id.clone());
            let amount = transaction.absolute_amount();
            batch.push(WriteOp::InsertItem(ReconciliationItem::auto(
                reconciliation_id.to_string(),
                transaction.id.clone(),
                line.id.clone(),
                amount.clone(),
            )));
            batch.push(WriteOp::SetTransactionStatus {
                transaction_id: transaction.id.clone(),
                expected: TransactionStatus::Unmatched,
                status: TransactionStatus::Matched,
            });
            tracing::debug!(
                transaction_id = %transaction.id,
                ledger_line_id = %line.id,
                "auto-match pair accepted"
            );
            pairs.push(MatchedPair {
                bank_transaction_id: transaction.id.clone(),
                ledger_line_id: line.id.clone(),
                amount,
            });
        }

        if !batch.is_empty() {
            self.storage.apply(batch).await?;
        }

        tracing::info!(
            reconciliation_id,
            matches_created = pairs.len(),
            scanned = unmatched.len(),
            "auto-match pass finished"
        );

        Ok(AutoMatchOutcome {
            matches_created: pairs.len(),
            pairs,
        })
    }
}
