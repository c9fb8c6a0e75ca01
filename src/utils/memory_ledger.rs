//! In-memory ledger reader for testing and development

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::traits::LedgerLineReader;
use crate::types::*;

/// Seedable read-only ledger backend.
///
/// Stands in for the external ledger in tests; the engine only ever reads it.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerReader {
    lines: Arc<RwLock<HashMap<String, LedgerLine>>>,
}

impl MemoryLedgerReader {
    /// Create an empty ledger reader
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a ledger line
    pub fn add_line(&self, line: LedgerLine) {
        self.lines.write().unwrap().insert(line.id.clone(), line);
    }
}

#[async_trait]
impl LedgerLineReader for MemoryLedgerReader {
    async fn find_candidate_lines(
        &self,
        ledger_account_id: &str,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> ReconResult<Vec<LedgerLine>> {
        let lines = self.lines.read().unwrap();
        let mut rows: Vec<LedgerLine> = lines
            .values()
            .filter(|line| {
                line.account_id == ledger_account_id
                    && line.date >= date_from
                    && line.date <= date_to
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn get_line(&self, line_id: &str) -> ReconResult<Option<LedgerLine>> {
        Ok(self.lines.read().unwrap().get(line_id).cloned())
    }
}
