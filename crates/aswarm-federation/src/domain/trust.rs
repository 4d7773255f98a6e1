//! # Peer Trust Registry
//!
//! Reliability/response/consensus scores per peer cluster, consulted before
//! accepting state-changing requests.
//!
//! SECURITY-CRITICAL: updates are asymmetric, so trust is slow to build and
//! fast to erode.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::errors::TrustError;

/// Which security rejections feed a negative trust update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RejectionPenalty {
    /// Only successful shares touch trust.
    None,
    /// Replay and invalid-sketch rejections of requests that passed
    /// signature verification.
    #[default]
    Authenticated,
    /// Also invalid signatures. The claimed cluster id is unauthenticated in
    /// that case, so a third party can lower a victim's score.
    All,
}

impl RejectionPenalty {
    /// Whether a rejection should lower the peer's score. `authenticated`
    /// is true once the request's signature has verified.
    pub fn applies(self, authenticated: bool) -> bool {
        match self {
            Self::None => false,
            Self::Authenticated => authenticated,
            Self::All => true,
        }
    }
}

/// Trust scoring configuration.
#[derive(Debug, Clone)]
pub struct TrustConfig {
    pub initial_reliability: f64,
    pub initial_response: f64,
    pub initial_consensus: f64,
    /// Added to reliability and response on success.
    pub success_step: f64,
    /// Subtracted from reliability on failure.
    pub reliability_penalty: f64,
    /// Subtracted from response on failure.
    pub response_penalty: f64,
    /// Minimum reliability for state-changing requests.
    pub min_reliability: f64,
    pub rejection_penalty: RejectionPenalty,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            initial_reliability: 0.5,
            initial_response: 1.0,
            initial_consensus: 1.0,
            success_step: 0.01,
            reliability_penalty: 0.05,
            response_penalty: 0.02,
            min_reliability: 0.3,
            rejection_penalty: RejectionPenalty::Authenticated,
        }
    }
}

impl TrustConfig {
    pub fn validate(&self) -> Result<(), String> {
        let unit = [
            ("initial_reliability", self.initial_reliability),
            ("initial_response", self.initial_response),
            ("initial_consensus", self.initial_consensus),
            ("min_reliability", self.min_reliability),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be within [0, 1], got {}", name, value));
            }
        }
        let steps = [
            ("success_step", self.success_step),
            ("reliability_penalty", self.reliability_penalty),
            ("response_penalty", self.response_penalty),
        ];
        for (name, value) in steps {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be within [0, 1], got {}", name, value));
            }
        }
        Ok(())
    }
}

/// Score state for a single peer. All values in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrustScore {
    pub reliability: f64,
    pub response: f64,
    pub consensus: f64,
}

impl TrustScore {
    pub fn initial(config: &TrustConfig) -> Self {
        Self {
            reliability: config.initial_reliability,
            response: config.initial_response,
            consensus: config.initial_consensus,
        }
    }

    fn on_success(&mut self, config: &TrustConfig) {
        self.reliability = (self.reliability + config.success_step).min(1.0);
        self.response = (self.response + config.success_step).min(1.0);
    }

    fn on_failure(&mut self, config: &TrustConfig) {
        self.reliability = (self.reliability - config.reliability_penalty).max(0.0);
        self.response = (self.response - config.response_penalty).max(0.0);
    }
}

/// Scores for all peers seen by this service instance.
#[derive(Debug)]
pub struct TrustRegistry {
    config: TrustConfig,
    scores: RwLock<HashMap<String, TrustScore>>,
}

impl TrustRegistry {
    pub fn new(config: TrustConfig) -> Self {
        Self {
            config,
            scores: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &TrustConfig {
        &self.config
    }

    /// Current score, creating the default on first contact.
    pub fn get_or_create(&self, cluster_id: &str) -> TrustScore {
        if let Some(score) = self.scores.read().get(cluster_id) {
            return *score;
        }
        *self
            .scores
            .write()
            .entry(cluster_id.to_string())
            .or_insert_with(|| TrustScore::initial(&self.config))
    }

    /// Score without creating an entry.
    pub fn get(&self, cluster_id: &str) -> Option<TrustScore> {
        self.scores.read().get(cluster_id).copied()
    }

    /// Override a peer's score (operator action, seeding).
    pub fn set(&self, cluster_id: &str, score: TrustScore) {
        let clamped = TrustScore {
            reliability: score.reliability.clamp(0.0, 1.0),
            response: score.response.clamp(0.0, 1.0),
            consensus: score.consensus.clamp(0.0, 1.0),
        };
        self.scores.write().insert(cluster_id.to_string(), clamped);
    }

    /// Apply the outcome of one interaction and return the new score.
    pub fn update_on_outcome(&self, cluster_id: &str, success: bool) -> TrustScore {
        let mut scores = self.scores.write();
        let score = scores
            .entry(cluster_id.to_string())
            .or_insert_with(|| TrustScore::initial(&self.config));
        if success {
            score.on_success(&self.config);
        } else {
            score.on_failure(&self.config);
        }
        *score
    }

    /// Minimum-trust gate for state-changing requests.
    pub fn check_gate(&self, cluster_id: &str) -> Result<TrustScore, TrustError> {
        let score = self.get_or_create(cluster_id);
        if score.reliability < self.config.min_reliability {
            return Err(TrustError {
                cluster_id: cluster_id.to_string(),
                reliability: score.reliability,
                threshold: self.config.min_reliability,
            });
        }
        Ok(score)
    }

    pub fn len(&self) -> usize {
        self.scores.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.read().is_empty()
    }
}

impl Default for TrustRegistry {
    fn default() -> Self {
        Self::new(TrustConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_first_contact_uses_defaults() {
        let registry = TrustRegistry::default();
        let score = registry.get_or_create("alpha");
        assert_eq!(score.reliability, 0.5);
        assert_eq!(score.response, 1.0);
        assert_eq!(score.consensus, 1.0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_success_increments_and_caps() {
        let registry = TrustRegistry::default();
        let score = registry.update_on_outcome("alpha", true);
        assert!(approx(score.reliability, 0.51));
        assert_eq!(score.response, 1.0);

        registry.set(
            "beta",
            TrustScore {
                reliability: 0.995,
                response: 0.5,
                consensus: 1.0,
            },
        );
        let capped = registry.update_on_outcome("beta", true);
        assert_eq!(capped.reliability, 1.0);
        assert!(approx(capped.response, 0.51));
    }

    #[test]
    fn test_failure_is_asymmetric_and_floored() {
        let registry = TrustRegistry::default();
        let score = registry.update_on_outcome("alpha", false);
        assert!(approx(score.reliability, 0.45));
        assert!(approx(score.response, 0.98));
        assert_eq!(score.consensus, 1.0);

        for _ in 0..20 {
            registry.update_on_outcome("alpha", false);
        }
        assert_eq!(registry.get("alpha").unwrap().reliability, 0.0);
    }

    #[test]
    fn test_gate_rejects_below_threshold() {
        let registry = TrustRegistry::default();
        assert!(registry.check_gate("alpha").is_ok());

        registry.set(
            "mallory",
            TrustScore {
                reliability: 0.2,
                response: 1.0,
                consensus: 1.0,
            },
        );
        let err = registry.check_gate("mallory").unwrap_err();
        assert_eq!(err.cluster_id, "mallory");
        assert!(approx(err.threshold, 0.3));
    }

    #[test]
    fn test_repeated_failures_cross_gate() {
        let registry = TrustRegistry::default();
        for _ in 0..3 {
            registry.update_on_outcome("alpha", false);
        }
        assert!(registry.check_gate("alpha").is_ok());

        // 0.35 -> ~0.30 -> ~0.25
        registry.update_on_outcome("alpha", false);
        registry.update_on_outcome("alpha", false);
        assert!(registry.check_gate("alpha").is_err());
    }

    #[test]
    fn test_rejection_penalty_policy() {
        assert!(!RejectionPenalty::None.applies(true));
        assert!(RejectionPenalty::Authenticated.applies(true));
        assert!(!RejectionPenalty::Authenticated.applies(false));
        assert!(RejectionPenalty::All.applies(false));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TrustConfig {
            min_reliability: 1.5,
            ..TrustConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(TrustConfig::default().validate().is_ok());
    }
}
