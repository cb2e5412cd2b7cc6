//! Update policy presets
//!
//! Every service must name one of these explicitly. A wrong rollout order is
//! dangerous for stateful services, so there is no fallback.

use serde::{Deserialize, Serialize};

/// Rollout ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateOrder {
    /// Start the new task before stopping the old one
    StartFirst,
    /// Stop the old task before starting the new one
    StopFirst,
}

/// Named rollout strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    ParallelOneAtATime,
    StopOldFirst,
}

impl UpdatePolicy {
    /// All presets, in documentation order
    pub const ALL: [UpdatePolicy; 2] = [
        UpdatePolicy::ParallelOneAtATime,
        UpdatePolicy::StopOldFirst,
    ];

    /// Resolve a preset token. Unknown tokens yield `None`.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|policy| policy.token() == token)
    }

    /// Token used in spec files
    pub fn token(&self) -> &'static str {
        match self {
            UpdatePolicy::ParallelOneAtATime => "parallel-one-at-a-time",
            UpdatePolicy::StopOldFirst => "stop-old-first",
        }
    }

    /// Max tasks updated at once (`None` leaves it to the orchestrator)
    pub fn parallelism(&self) -> Option<u64> {
        match self {
            UpdatePolicy::ParallelOneAtATime => Some(1),
            UpdatePolicy::StopOldFirst => None,
        }
    }

    pub fn order(&self) -> UpdateOrder {
        match self {
            UpdatePolicy::ParallelOneAtATime => UpdateOrder::StartFirst,
            UpdatePolicy::StopOldFirst => UpdateOrder::StopFirst,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_one_at_a_time() {
        let policy = UpdatePolicy::from_token("parallel-one-at-a-time").unwrap();
        assert_eq!(policy.parallelism(), Some(1));
        assert_eq!(policy.order(), UpdateOrder::StartFirst);
    }

    #[test]
    fn test_stop_old_first() {
        let policy = UpdatePolicy::from_token("stop-old-first").unwrap();
        assert_eq!(policy.parallelism(), None);
        assert_eq!(policy.order(), UpdateOrder::StopFirst);
    }

    #[test]
    fn test_tokens_resolve_to_themselves() {
        for policy in UpdatePolicy::ALL {
            assert_eq!(UpdatePolicy::from_token(policy.token()), Some(policy));
        }
    }

    #[test]
    fn test_unknown_token() {
        assert!(UpdatePolicy::from_token("yolo").is_none());
        assert!(UpdatePolicy::from_token("").is_none());
        assert!(UpdatePolicy::from_token("Stop-Old-First").is_none());
    }

    #[test]
    fn test_order_serializes_like_compose() {
        assert_eq!(
            serde_json::to_string(&UpdateOrder::StartFirst).unwrap(),
            "\"start-first\""
        );
        assert_eq!(
            serde_json::to_string(&UpdateOrder::StopFirst).unwrap(),
            "\"stop-first\""
        );
    }
}
