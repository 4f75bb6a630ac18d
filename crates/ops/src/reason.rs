//! Reason entry for actions that carry a shared justification (e.g. rejections).

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReasonPolicy {
    /// The action takes no reason; the resolver is never asked.
    None,
    Optional,
    /// A blank answer counts as cancelling the batch.
    Required,
}

/// What the resolver is asked for: one reason for the whole batch.
#[derive(Debug, Clone, Serialize)]
pub struct ReasonRequest {
    pub action: String,
    pub count: usize,
    pub policy: ReasonPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReasonChoice {
    Provided(Option<String>),
    Cancelled,
}

impl ReasonChoice {
    /// Apply the policy: trim, treat blank as absent, and turn a missing
    /// required reason into `None` (cancel). `Some(reason)` means dispatch.
    pub fn resolve_for(self, policy: ReasonPolicy) -> Option<Option<String>> {
        let given = match self {
            ReasonChoice::Cancelled => return None,
            ReasonChoice::Provided(r) => r.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        };
        match (policy, given) {
            (ReasonPolicy::None, _) => Some(None),
            (ReasonPolicy::Required, None) => None,
            (_, given) => Some(given),
        }
    }
}

/// Injected capability that asks for a reason (a prompt, a CLI flag, a test fixture).
#[async_trait::async_trait]
pub trait ReasonResolver: Send + Sync {
    async fn resolve(&self, request: &ReasonRequest) -> ReasonChoice;
}

/// Resolver that always answers the same way.
#[derive(Debug, Clone)]
pub struct FixedReason(pub ReasonChoice);

impl FixedReason {
    pub fn given(reason: impl Into<String>) -> Self { Self(ReasonChoice::Provided(Some(reason.into()))) }
    pub fn none() -> Self { Self(ReasonChoice::Provided(None)) }
    pub fn cancelled() -> Self { Self(ReasonChoice::Cancelled) }
}

#[async_trait::async_trait]
impl ReasonResolver for FixedReason {
    async fn resolve(&self, _request: &ReasonRequest) -> ReasonChoice { self.0.clone() }
}
