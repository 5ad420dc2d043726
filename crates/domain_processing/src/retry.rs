//! Retry decisions for failed processing attempts

use serde::{Deserialize, Serialize};

use crate::request::{JobPriority, ProcessingRequest};

/// What to do with a request whose attempt just failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryDecision {
    /// Re-enqueue at the given (demoted) priority
    Retry { priority: JobPriority },
    /// Ceiling exceeded, record a terminal failure
    Fail,
}

/// Retry policy applied by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    demote_to: JobPriority,
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self {
            demote_to: JobPriority::Low,
        }
    }

    /// Pure decision for a request that has failed `attempts` times
    pub fn decide(&self, attempts: u32, max_retries: u32) -> RetryDecision {
        if attempts <= max_retries {
            RetryDecision::Retry {
                priority: self.demote_to,
            }
        } else {
            RetryDecision::Fail
        }
    }

    /// Records a failed attempt on the request and applies the decision to it
    pub fn on_failure(&self, request: &mut ProcessingRequest) -> RetryDecision {
        request.attempts += 1;
        let decision = self.decide(request.attempts, request.max_retries);
        if let RetryDecision::Retry { priority } = decision {
            request.priority = priority;
        }
        decision
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}
