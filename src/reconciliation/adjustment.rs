//! Adjustment ledger: operator-entered balancing entries

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{validate_adjustment_type, validate_description};

/// Fields required to create an adjustment
#[derive(Debug, Clone)]
pub struct NewAdjustment {
    pub reconciliation_id: String,
    pub adjustment_date: NaiveDate,
    pub description: String,
    pub adjustment_type: String,
    pub amount: BigDecimal,
}

/// Partial update of an adjustment; unset fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct AdjustmentUpdate {
    pub adjustment_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub adjustment_type: Option<String>,
    pub amount: Option<BigDecimal>,
}

/// Manager for adjustments scoped to a reconciliation.
///
/// Create, edit, and delete are allowed only while the owning reconciliation
/// is InProgress. Approval is an independent action with no tie to
/// reconciliation completion.
pub struct AdjustmentManager<S: ReconciliationStorage> {
    storage: S,
}

impl<S: ReconciliationStorage> AdjustmentManager<S> {
    /// Create a new adjustment manager
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    async fn owning_reconciliation_in_progress(
        &self,
        reconciliation_id: &str,
    ) -> ReconResult<()> {
        let reconciliation = self
            .storage
            .get_reconciliation(reconciliation_id)
            .await?
            .ok_or_else(|| ReconError::ReconciliationNotFound(reconciliation_id.to_string()))?;
        if reconciliation.status != ReconciliationStatus::InProgress {
            return Err(ReconError::Conflict(format!(
                "Reconciliation '{}' is {:?}; adjustments can only change while InProgress",
                reconciliation_id, reconciliation.status
            )));
        }
        Ok(())
    }

    /// Create a pending adjustment
    pub async fn create(&mut self, new: NewAdjustment) -> ReconResult<Adjustment> {
        self.owning_reconciliation_in_progress(&new.reconciliation_id)
            .await?;
        validate_description(&new.description)?;
        validate_adjustment_type(&new.adjustment_type)?;

        let now = chrono::Utc::now().naive_utc();
        let adjustment = Adjustment {
            id: uuid::Uuid::new_v4().to_string(),
            reconciliation_id: new.reconciliation_id,
            adjustment_date: new.adjustment_date,
            description: new.description,
            adjustment_type: new.adjustment_type,
            amount: new.amount,
            status: AdjustmentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.storage.save_adjustment(&adjustment).await?;

        Ok(adjustment)
    }

    /// Get an adjustment by ID, returning an error if not found
    pub async fn get_required(&self, adjustment_id: &str) -> ReconResult<Adjustment> {
        self.storage
            .get_adjustment(adjustment_id)
            .await?
            .ok_or_else(|| ReconError::AdjustmentNotFound(adjustment_id.to_string()))
    }

    /// List a reconciliation's adjustments
    pub async fn list(&self, reconciliation_id: &str) -> ReconResult<Vec<Adjustment>> {
        if self
            .storage
            .get_reconciliation(reconciliation_id)
            .await?
            .is_none()
        {
            return Err(ReconError::ReconciliationNotFound(
                reconciliation_id.to_string(),
            ));
        }
        self.storage.list_adjustments(reconciliation_id).await
    }

    /// Apply a partial update to an adjustment
    pub async fn update(
        &mut self,
        adjustment_id: &str,
        update: AdjustmentUpdate,
    ) -> ReconResult<Adjustment> {
        let mut adjustment = self.get_required(adjustment_id).await?;
        self.owning_reconciliation_in_progress(&adjustment.reconciliation_id)
            .await?;

        if let Some(adjustment_date) = update.adjustment_date {
            adjustment.adjustment_date = adjustment_date;
        }
        if let Some(description) = update.description {
            adjustment.description = description;
        }
        if let Some(adjustment_type) = update.adjustment_type {
            adjustment.adjustment_type = adjustment_type;
        }
        if let Some(amount) = update.amount {
            adjustment.amount = amount;
        }

        validate_description(&adjustment.description)?;
        validate_adjustment_type(&adjustment.adjustment_type)?;
        adjustment.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_adjustment(&adjustment).await?;

        Ok(adjustment)
    }

    /// Advance a pending adjustment to Approved; re-approval is a conflict
    pub async fn approve(&mut self, adjustment_id: &str) -> ReconResult<Adjustment> {
        let mut adjustment = self.get_required(adjustment_id).await?;

        if adjustment.status == AdjustmentStatus::Approved {
            return Err(ReconError::Conflict(format!(
                "Adjustment '{}' is already approved",
                adjustment_id
            )));
        }

        adjustment.status = AdjustmentStatus::Approved;
        adjustment.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_adjustment(&adjustment).await?;

        Ok(adjustment)
    }

    /// Delete an adjustment
    pub async fn delete(&mut self, adjustment_id: &str) -> ReconResult<()> {
        let adjustment = self.get_required(adjustment_id).await?;
        self.owning_reconciliation_in_progress(&adjustment.reconciliation_id)
            .await?;
        self.storage.delete_adjustment(adjustment_id).await
    }
}
