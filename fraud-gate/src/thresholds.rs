use payment_core_types::FraudDecision;

/// Decision boundaries applied to a resolved risk score (spec §4.4 step 5).
/// `escalate` and `hold` are checked before the approve/reject boundary, so
/// a score that would otherwise clear `approve_at_or_below` can still be
/// pulled into a stricter bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FraudThresholds {
    pub approve_at_or_below: f64,
    pub reject_at_or_above: f64,
    pub hold_at_or_above: Option<f64>,
    pub escalate_at_or_above: Option<f64>,
}

impl Default for FraudThresholds {
    fn default() -> Self {
        FraudThresholds {
            approve_at_or_below: 0.30,
            reject_at_or_above: 0.80,
            hold_at_or_above: Some(0.95),
            escalate_at_or_above: Some(0.99),
        }
    }
}

impl FraudThresholds {
    /// Apply the bucket precedence: escalate, then hold, then the
    /// approve/reject boundary, defaulting to manual review in between.
    pub fn decide(&self, risk_score: f64) -> FraudDecision {
        if let Some(t) = self.escalate_at_or_above {
            if risk_score >= t {
                return FraudDecision::Escalate;
            }
        }
        if let Some(t) = self.hold_at_or_above {
            if risk_score >= t {
                return FraudDecision::Hold;
            }
        }
        if risk_score <= self.approve_at_or_below {
            FraudDecision::Approve
        } else if risk_score >= self.reject_at_or_above {
            FraudDecision::Reject
        } else {
            FraudDecision::ManualReview
        }
    }
}
