use std::time::Duration;

/// Tunables for the orchestrator, following `settlement::config::WindowConfig`'s
/// shape: one struct, `Default` carries the spec's numeric defaults.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// How long an other-bank dispatch waits for a clearing ack before a
    /// `CREDIT_TIMEOUT` repair is filed (spec §4.6, §8 scenario 4).
    pub ack_window: Duration,
    /// The ISO 20022 message type C5 is asked to route for an other-bank
    /// outbound credit transfer.
    pub outbound_message_type: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            ack_window: Duration::from_secs(60),
            outbound_message_type: "pacs.008".to_string(),
        }
    }
}
