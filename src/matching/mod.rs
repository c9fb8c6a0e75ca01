//! Matcher: pairs bank transactions with ledger lines

pub mod auto;
pub mod manual;

pub use auto::*;
pub use manual::*;

use bigdecimal::BigDecimal;

use crate::traits::{LedgerLineReader, ReconciliationStorage};
use crate::types::*;

/// Owns match and unmatch transitions, automatic and operator-directed.
///
/// Reads the external ledger through [`LedgerLineReader`] and never writes it.
pub struct Matcher<S: ReconciliationStorage, L: LedgerLineReader> {
    pub(crate) storage: S,
    pub(crate) ledger: L,
}

impl<S: ReconciliationStorage, L: LedgerLineReader> Matcher<S, L> {
    /// Create a new matcher
    pub fn new(storage: S, ledger: L) -> Self {
        Self { storage, ledger }
    }

    pub(crate) async fn reconciliation_in_progress(
        &self,
        reconciliation_id: &str,
    ) -> ReconResult<Reconciliation> {
        let reconciliation = self
            .storage
            .get_reconciliation(reconciliation_id)
            .await?
            .ok_or_else(|| ReconError::ReconciliationNotFound(reconciliation_id.to_string()))?;
        if reconciliation.status != ReconciliationStatus::InProgress {
            return Err(ReconError::Conflict(format!(
                "Reconciliation '{}' is {:?}; matching requires InProgress",
                reconciliation_id, reconciliation.status
            )));
        }
        Ok(reconciliation)
    }
}

/// Amount equality on the side implied by the transaction's sign: debit for
/// inflows, credit for outflows, within 0.01. Zero-amount transactions never
/// match.
pub(crate) fn amounts_match(transaction: &BankTransaction, line: &LedgerLine) -> bool {
    let zero = BigDecimal::from(0);
    let side = if transaction.amount > zero {
        &line.debit
    } else if transaction.amount < zero {
        &line.credit
    } else {
        return false;
    };
    let amount = transaction.absolute_amount();
    (side - &amount).abs() <= balance_tolerance()
}

/// Date proximity within the tolerance window, inclusive
pub(crate) fn dates_within(
    transaction: &BankTransaction,
    line: &LedgerLine,
    tolerance_days: i64,
) -> bool {
    (transaction.transaction_date - line.date).num_days().abs() <= tolerance_days
}

/// Case-insensitive substring test in either direction; blank descriptions
/// never overlap
pub(crate) fn descriptions_overlap(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn transaction(amount: i64) -> BankTransaction {
        BankTransaction::new(
            "t1".to_string(),
            "s1".to_string(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            "Wire transfer".to_string(),
            BigDecimal::from(amount),
            TransactionType::Other,
        )
    }

    fn line(debit: i64, credit: i64) -> LedgerLine {
        LedgerLine {
            id: "l1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            description: "Incoming wire transfer March".to_string(),
            reference: None,
            debit: BigDecimal::from(debit),
            credit: BigDecimal::from(credit),
            account_id: "1000".to_string(),
        }
    }

    #[test]
    fn test_inflow_matches_debit_side_only() {
        assert!(amounts_match(&transaction(150), &line(150, 0)));
        assert!(!amounts_match(&transaction(150), &line(0, 150)));
        assert!(!amounts_match(&transaction(-150), &line(150, 0)));
        assert!(amounts_match(&transaction(-150), &line(0, 150)));
    }

    #[test]
    fn test_zero_amount_never_matches() {
        assert!(!amounts_match(&transaction(0), &line(0, 0)));
    }

    #[test]
    fn test_descriptions_overlap_is_case_insensitive() {
        assert!(descriptions_overlap("WIRE transfer", "Incoming wire transfer March"));
        assert!(!descriptions_overlap("", "anything"));
        assert!(!descriptions_overlap("check 1041", "interest"));
    }
}
