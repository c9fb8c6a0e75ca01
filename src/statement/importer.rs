//! Transaction importer: normalizes a raw tabular feed into bank transactions

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::str::FromStr;

use crate::traits::*;
use crate::types::*;

/// One raw row from a tabular transaction feed.
///
/// Fields are untyped strings as handed over by the upload layer; parsing
/// and classification happen here, per row.
#[derive(Debug, Clone, Default)]
pub struct RawTransactionRow {
    pub date: Option<String>,
    pub description: Option<String>,
    pub amount: Option<String>,
    pub reference: Option<String>,
    pub running_balance: Option<String>,
    pub type_hint: Option<String>,
    pub check_number: Option<String>,
}

/// Result of one import invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    /// Persisted job record id
    pub job_id: String,
    /// Number of rows inserted
    pub inserted: usize,
    /// Row-level rejections; never a hard failure of the whole import
    pub errors: Vec<RowError>,
}

/// Importer for bulk statement feeds
pub struct TransactionImporter<S: ReconciliationStorage> {
    storage: S,
}

impl<S: ReconciliationStorage> TransactionImporter<S> {
    /// Create a new importer
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Import a feed of raw rows into a statement.
    ///
    /// Rows missing date, description, or amount are rejected individually;
    /// valid rows are inserted as one atomic unit together with the
    /// Uploaded -> Processed status change (taken only when at least one row
    /// inserted) and the persisted import job record.
    pub async fn import(
        &mut self,
        statement_id: &str,
        rows: Vec<RawTransactionRow>,
    ) -> ReconResult<ImportOutcome> {
        let statement = self
            .storage
            .get_statement(statement_id)
            .await?
            .ok_or_else(|| ReconError::StatementNotFound(statement_id.to_string()))?;

        if statement.status == StatementStatus::Reconciled {
            return Err(ReconError::Conflict(format!(
                "Statement '{}' is reconciled and cannot receive imports",
                statement_id
            )));
        }

        let mut transactions = Vec::new();
        let mut errors = Vec::new();
        for (index, row) in rows.into_iter().enumerate() {
            match parse_row(statement_id, index, row) {
                Ok(transaction) => transactions.push(transaction),
                Err(error) => errors.push(error),
            }
        }

        let inserted = transactions.len();
        let status = if inserted == 0 && !errors.is_empty() {
            ImportJobStatus::Failed
        } else {
            ImportJobStatus::Completed
        };
        let job = ImportJob {
            id: uuid::Uuid::new_v4().to_string(),
            statement_id: statement_id.to_string(),
            status,
            inserted,
            errors: errors.clone(),
            created_at: chrono::Utc::now().naive_utc(),
        };
        let job_id = job.id.clone();

        let mut batch = WriteBatch::new();
        for transaction in transactions {
            batch.push(WriteOp::InsertTransaction(transaction));
        }
        if inserted > 0 {
            batch.push(WriteOp::SetStatementStatus {
                statement_id: statement_id.to_string(),
                status: StatementStatus::Processed,
            });
        }
        batch.push(WriteOp::PutImportJob(job));
        self.storage.apply(batch).await?;

        tracing::info!(
            statement_id,
            inserted,
            rejected = errors.len(),
            "statement feed imported"
        );

        Ok(ImportOutcome {
            job_id,
            inserted,
            errors,
        })
    }

    /// Look up a persisted import job
    pub async fn get_job(&self, job_id: &str) -> ReconResult<ImportJob> {
        self.storage
            .get_import_job(job_id)
            .await?
            .ok_or_else(|| ReconError::ImportJobNotFound(job_id.to_string()))
    }
}

fn parse_row(
    statement_id: &str,
    index: usize,
    row: RawTransactionRow,
) -> Result<BankTransaction, RowError> {
    let date_text = required_field(index, "date", row.date)?;
    let date = NaiveDate::parse_from_str(date_text.trim(), "%Y-%m-%d").map_err(|_| RowError {
        row: index,
        field: "date".to_string(),
        reason: format!("'{}' is not a valid date (expected YYYY-MM-DD)", date_text),
    })?;

    let description = required_field(index, "description", row.description)?;
    if description.trim().is_empty() {
        return Err(RowError {
            row: index,
            field: "description".to_string(),
            reason: "description is empty".to_string(),
        });
    }

    let amount_text = required_field(index, "amount", row.amount)?;
    let amount = parse_amount(&amount_text).ok_or_else(|| RowError {
        row: index,
        field: "amount".to_string(),
        reason: format!("'{}' is not a valid amount", amount_text),
    })?;

    let transaction_type = classify(row.type_hint.as_deref(), &amount);

    let mut transaction = BankTransaction::new(
        uuid::Uuid::new_v4().to_string(),
        statement_id.to_string(),
        date,
        description.trim().to_string(),
        amount,
        transaction_type,
    );
    transaction.reference = row.reference.filter(|r| !r.trim().is_empty());
    transaction.check_number = row.check_number.filter(|c| !c.trim().is_empty());
    // An unparseable declared balance is dropped rather than failing the row;
    // only date, description, and amount are load-bearing.
    transaction.running_balance = row.running_balance.as_deref().and_then(parse_amount);

    Ok(transaction)
}

fn required_field(index: usize, field: &str, value: Option<String>) -> Result<String, RowError> {
    value.ok_or_else(|| RowError {
        row: index,
        field: field.to_string(),
        reason: format!("{} is missing", field),
    })
}

fn parse_amount(text: &str) -> Option<BigDecimal> {
    BigDecimal::from_str(&text.trim().replace(',', "")).ok()
}

/// Explicit type hint wins; otherwise the sign decides
fn classify(type_hint: Option<&str>, amount: &BigDecimal) -> TransactionType {
    if let Some(hint) = type_hint {
        match hint.trim().to_lowercase().as_str() {
            "deposit" | "credit" => return TransactionType::Deposit,
            "withdrawal" | "debit" => return TransactionType::Withdrawal,
            "other" => return TransactionType::Other,
            _ => {}
        }
    }

    let zero = BigDecimal::from(0);
    if *amount > zero {
        TransactionType::Deposit
    } else if *amount < zero {
        TransactionType::Withdrawal
    } else {
        TransactionType::Other
    }
}
