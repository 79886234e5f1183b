//! Search-tool capability negotiation.
//!
//! Tries an ordered list of tool variants against the backend until one is
//! accepted. Rejection is structural: only `GenerationOutcome::ToolUnsupported`
//! moves on to the next variant. Everything else is handed back untouched.

use crate::generator::TextGenerator;
use crate::types::{GenerationOutcome, GenerationRequest, ModelProfile, ToolVariant};
use tracing::debug;

/// Advisory memory of the last tool variant the backend accepted.
///
/// Callers own it and decide whether to share it; a stale value only costs
/// one extra probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolHint {
    last_good: Option<ToolVariant>,
}

impl ToolHint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_variant(variant: Option<ToolVariant>) -> Self {
        Self { last_good: variant }
    }

    pub fn last_good(&self) -> Option<&ToolVariant> {
        self.last_good.as_ref()
    }

    pub fn remember(&mut self, variant: ToolVariant) {
        self.last_good = Some(variant);
    }

    pub fn forget(&mut self) {
        self.last_good = None;
    }
}

/// Result of a negotiation round.
#[derive(Debug, Clone, PartialEq)]
pub enum Negotiation {
    /// A variant was not rejected; `outcome` is what the backend answered with it.
    Probed {
        variant: ToolVariant,
        outcome: GenerationOutcome,
    },
    /// Every variant was rejected. Not an error: continue without grounding.
    NoTool { rejected: Vec<ToolVariant> },
}

/// Probes tool variants in order.
#[derive(Debug, Clone)]
pub struct CapabilityNegotiator {
    variants: Vec<ToolVariant>,
}

impl CapabilityNegotiator {
    pub fn new(variants: Vec<ToolVariant>) -> Self {
        Self { variants }
    }

    pub fn variants(&self) -> &[ToolVariant] {
        &self.variants
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Configured variants with the hinted one moved to the front.
    pub fn probe_order(&self, hint: &ToolHint) -> Vec<ToolVariant> {
        let mut order = Vec::with_capacity(self.variants.len() + 1);
        if let Some(good) = hint.last_good() {
            order.push(good.clone());
        }
        for variant in &self.variants {
            if !order.contains(variant) {
                order.push(variant.clone());
            }
        }
        order
    }

    /// Issue `prompt` with each variant until one is not rejected.
    pub async fn negotiate(
        &self,
        generator: &dyn TextGenerator,
        prompt: &str,
        profile: ModelProfile,
        hint: &ToolHint,
    ) -> Negotiation {
        let mut rejected = Vec::new();
        for variant in self.probe_order(hint) {
            let request = GenerationRequest::new(prompt, profile).with_tool(variant.clone());
            match generator.generate(&request).await {
                GenerationOutcome::ToolUnsupported => {
                    debug!(tool = %variant, "Tool variant not supported, trying next");
                    rejected.push(variant);
                }
                outcome => return Negotiation::Probed { variant, outcome },
            }
        }
        Negotiation::NoTool { rejected }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::MockGenerator;

    fn variants(names: &[&str]) -> Vec<ToolVariant> {
        names.iter().map(|n| ToolVariant::new(*n)).collect()
    }

    #[test]
    fn test_probe_order_puts_hint_first() {
        let negotiator = CapabilityNegotiator::new(variants(&["a", "b", "c"]));
        let hint = ToolHint::from_variant(Some(ToolVariant::new("b")));
        assert_eq!(negotiator.probe_order(&hint), variants(&["b", "a", "c"]));
        assert_eq!(
            negotiator.probe_order(&ToolHint::new()),
            variants(&["a", "b", "c"])
        );
    }

    #[test]
    fn test_probe_order_keeps_unlisted_hint() {
        let negotiator = CapabilityNegotiator::new(variants(&["a"]));
        let hint = ToolHint::from_variant(Some(ToolVariant::new("z")));
        assert_eq!(negotiator.probe_order(&hint), variants(&["z", "a"]));
    }

    #[tokio::test]
    async fn test_skips_unsupported_variants() {
        let generator = MockGenerator::from_fn(|req| match req.tool.as_ref().map(|t| t.as_str()) {
            Some("b") => GenerationOutcome::Success("grounded".into()),
            _ => GenerationOutcome::ToolUnsupported,
        });
        let negotiator = CapabilityNegotiator::new(variants(&["a", "b", "c"]));

        let result = negotiator
            .negotiate(&generator, "prompt", ModelProfile::Fast, &ToolHint::new())
            .await;
        assert_eq!(
            result,
            Negotiation::Probed {
                variant: ToolVariant::new("b"),
                outcome: GenerationOutcome::Success("grounded".into()),
            }
        );
        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test]
    async fn test_forwards_other_failures_unclassified() {
        let generator = MockGenerator::new().with_queue([GenerationOutcome::RateLimited(None)]);
        let negotiator = CapabilityNegotiator::new(variants(&["a", "b"]));

        let result = negotiator
            .negotiate(&generator, "prompt", ModelProfile::Fast, &ToolHint::new())
            .await;
        assert_eq!(
            result,
            Negotiation::Probed {
                variant: ToolVariant::new("a"),
                outcome: GenerationOutcome::RateLimited(None),
            }
        );
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_all_rejected_means_no_tool() {
        let generator = MockGenerator::from_fn(|_| GenerationOutcome::ToolUnsupported);
        let negotiator = CapabilityNegotiator::new(variants(&["a", "b"]));

        let result = negotiator
            .negotiate(&generator, "prompt", ModelProfile::Fast, &ToolHint::new())
            .await;
        assert_eq!(
            result,
            Negotiation::NoTool {
                rejected: variants(&["a", "b"])
            }
        );
    }

    #[tokio::test]
    async fn test_hinted_variant_avoids_reprobing() {
        let generator = MockGenerator::with_response("ok");
        let negotiator = CapabilityNegotiator::new(variants(&["a", "b"]));
        let hint = ToolHint::from_variant(Some(ToolVariant::new("b")));

        negotiator
            .negotiate(&generator, "prompt", ModelProfile::Fast, &hint)
            .await;
        let requests = generator.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].tool, Some(ToolVariant::new("b")));
    }

    #[tokio::test]
    async fn test_no_variants_configured() {
        let generator = MockGenerator::with_response("unused");
        let negotiator = CapabilityNegotiator::new(Vec::new());
        assert!(negotiator.is_empty());

        let result = negotiator
            .negotiate(&generator, "prompt", ModelProfile::Fast, &ToolHint::new())
            .await;
        assert_eq!(result, Negotiation::NoTool { rejected: vec![] });
        assert_eq!(generator.call_count(), 0);
    }
}
