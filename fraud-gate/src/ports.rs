//! Collaborator trait for persisting the outcome of an evaluation (spec
//! §4.4 step 6). Storage technology is out of scope; the gate only needs
//! somewhere to put the assessment once it has one.

use async_trait::async_trait;
use payment_core_types::FraudAssessment;

use crate::error::Result;

#[async_trait]
pub trait FraudAssessmentStore: Send + Sync {
    async fn save(&self, assessment: &FraudAssessment) -> Result<()>;
}
