//! Command policy
//!
//! Normalizes kubectl commands produced by the model and runs them through a
//! chain of guardrails before anything is executed. A rejection is a hard
//! stop: the refusal text goes back to the model and nothing is run.

/// The invocation every command is run through
pub const KUBECTL_PREFIX: &str = "kubectl";

/// Refusal returned for any deletion request
pub const DELETE_REFUSAL: &str = "Deleting resources is disabled for safety reasons.";

/// Prepend `kubectl` unless the command already starts with it
///
/// Lets the model send either `get pods` or `kubectl get pods`.
pub fn normalize_command(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with(KUBECTL_PREFIX) {
        trimmed.to_string()
    } else {
        format!("{} {}", KUBECTL_PREFIX, trimmed)
    }
}

/// Result of a guardrail check
#[derive(Debug, Clone, PartialEq)]
pub enum GuardrailResult {
    /// Command may run
    Accept,
    /// Command must not run; `reason` is returned in place of its output
    Reject { reason: String },
}

impl GuardrailResult {
    pub fn reject(reason: impl Into<String>) -> Self {
        Self::Reject {
            reason: reason.into(),
        }
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }

    pub fn is_reject(&self) -> bool {
        matches!(self, Self::Reject { .. })
    }
}

/// A policy check applied to a normalized command before execution
pub trait CommandGuardrail {
    fn check(&self, command: &str) -> GuardrailResult;
}

/// Composable chain of guardrails
///
/// Executes guards in order. First rejection stops evaluation.
pub struct GuardrailChain {
    guards: Vec<Box<dyn CommandGuardrail>>,
}

impl GuardrailChain {
    /// Create an empty guardrail chain
    pub fn new() -> Self {
        Self { guards: Vec::new() }
    }

    /// The policy applied to every kubectl command: no deletions
    pub fn kubectl_default() -> Self {
        Self::new().add(Box::new(DenyVerbGuard::new("delete", DELETE_REFUSAL)))
    }

    /// Add a guardrail to the chain
    pub fn add(mut self, guard: Box<dyn CommandGuardrail>) -> Self {
        self.guards.push(guard);
        self
    }

    /// Run all guardrails in order
    ///
    /// Returns the first rejection, or Accept if all pass.
    pub fn check(&self, command: &str) -> GuardrailResult {
        for guard in &self.guards {
            let result = guard.check(command);
            if result.is_reject() {
                return result;
            }
        }
        GuardrailResult::Accept
    }

    /// Check if chain is empty
    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

impl Default for GuardrailChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Rejects `kubectl <verb> ...`
///
/// Matches the exact `kubectl <verb>` prefix of the normalized command, and
/// also the second whitespace-separated token so `kubectl   delete` is caught.
pub struct DenyVerbGuard {
    verb: String,
    prefix: String,
    refusal: String,
}

impl DenyVerbGuard {
    pub fn new(verb: impl Into<String>, refusal: impl Into<String>) -> Self {
        let verb = verb.into();
        Self {
            prefix: format!("{} {}", KUBECTL_PREFIX, verb),
            verb,
            refusal: refusal.into(),
        }
    }
}

impl CommandGuardrail for DenyVerbGuard {
    fn check(&self, command: &str) -> GuardrailResult {
        if command.starts_with(&self.prefix) {
            return GuardrailResult::reject(&self.refusal);
        }

        let mut tokens = command.split_whitespace();
        if tokens.next() == Some(KUBECTL_PREFIX) && tokens.next() == Some(self.verb.as_str()) {
            return GuardrailResult::reject(&self.refusal);
        }

        GuardrailResult::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_adds_prefix() {
        assert_eq!(normalize_command("get pods"), "kubectl get pods");
    }

    #[test]
    fn test_normalize_keeps_prefixed_command() {
        assert_eq!(normalize_command("kubectl get pods"), "kubectl get pods");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in ["get pods", "kubectl get pods -A", "  describe node worker-1 "] {
            let once = normalize_command(raw);
            assert_eq!(normalize_command(&once), once);
            assert_eq!(once.matches(KUBECTL_PREFIX).count(), 1);
        }
    }

    #[test]
    fn test_default_chain_rejects_delete() {
        let chain = GuardrailChain::kubectl_default();
        let result = chain.check(&normalize_command("delete pod foo"));
        assert_eq!(result, GuardrailResult::reject(DELETE_REFUSAL));
    }

    #[test]
    fn test_default_chain_rejects_spaced_delete() {
        let chain = GuardrailChain::kubectl_default();
        assert!(chain.check("kubectl   delete ns prod").is_reject());
    }

    #[test]
    fn test_default_chain_accepts_reads() {
        let chain = GuardrailChain::kubectl_default();
        assert!(chain.check("kubectl get pods").is_accept());
        // "delete" as an argument is not the sub-verb
        assert!(chain.check("kubectl get pod delete-me").is_accept());
    }

    #[test]
    fn test_guardrail_chain_stops_on_first_reject() {
        struct AlwaysReject;
        impl CommandGuardrail for AlwaysReject {
            fn check(&self, _: &str) -> GuardrailResult {
                GuardrailResult::reject("first reject")
            }
        }

        struct NeverCalled;
        impl CommandGuardrail for NeverCalled {
            fn check(&self, _: &str) -> GuardrailResult {
                panic!("Should not be called");
            }
        }

        let chain = GuardrailChain::new()
            .add(Box::new(AlwaysReject))
            .add(Box::new(NeverCalled));

        assert_eq!(chain.check("kubectl get pods"), GuardrailResult::reject("first reject"));
    }

    #[test]
    fn test_empty_chain_accepts() {
        let chain = GuardrailChain::new();
        assert!(chain.is_empty());
        assert!(chain.check("kubectl delete pod foo").is_accept());
    }
}
