use crate::protocol::agent::ResultUsage;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::info;

/// Token counts after reconciling top-level usage with the per-model breakdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub cache_read_input_tokens: Option<u64>,
    pub cache_creation_input_tokens: Option<u64>,
}

impl ResolvedUsage {
    /// `input + output`, only when both counts are known.
    #[must_use]
    pub fn total_tokens(&self) -> Option<u64> {
        match (self.input_tokens, self.output_tokens) {
            (Some(input), Some(output)) => Some(input.saturating_add(output)),
            _ => None,
        }
    }
}

/// Per-model usage summed across every entry of a `modelUsage` map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelUsageTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub cache_creation_input_tokens: u64,
}

fn field_u64(entry: &Map<String, Value>, key: &str) -> u64 {
    entry.get(key).and_then(Value::as_u64).unwrap_or(0)
}

/// Sum the camelCase counters of every model entry, saturating at `u64::MAX`.
///
/// Non-object entries are skipped.
#[must_use]
pub fn sum_model_usage(model_usage: &Map<String, Value>) -> ModelUsageTotals {
    let mut totals = ModelUsageTotals::default();
    for entry in model_usage.values().filter_map(Value::as_object) {
        totals.input_tokens = totals
            .input_tokens
            .saturating_add(field_u64(entry, "inputTokens"));
        totals.output_tokens = totals
            .output_tokens
            .saturating_add(field_u64(entry, "outputTokens"));
        totals.cache_read_input_tokens = totals
            .cache_read_input_tokens
            .saturating_add(field_u64(entry, "cacheReadInputTokens"));
        totals.cache_creation_input_tokens = totals
            .cache_creation_input_tokens
            .saturating_add(field_u64(entry, "cacheCreationInputTokens"));
    }
    totals
}

/// Pick between a top-level count and its per-model sum.
///
/// - A positive top-level count always wins.
/// - Zero is treated as unpopulated when the per-model sum is positive.
/// - An absent count takes the per-model sum when a breakdown exists.
fn pick(primary: Option<u64>, fallback: Option<u64>) -> Option<u64> {
    match (primary, fallback) {
        (Some(v), _) if v > 0 => Some(v),
        (Some(0), Some(sum)) if sum > 0 => Some(sum),
        (Some(v), _) => Some(v),
        (None, fallback) => fallback,
    }
}

/// Resolve the usage reported by a terminal result event.
#[must_use]
pub fn resolve_usage(
    usage: Option<&ResultUsage>,
    model_usage: Option<&Map<String, Value>>,
) -> ResolvedUsage {
    let totals = model_usage.map(sum_model_usage);
    let usage = usage.cloned().unwrap_or_default();

    ResolvedUsage {
        input_tokens: pick(usage.input_tokens, totals.map(|t| t.input_tokens)),
        output_tokens: pick(usage.output_tokens, totals.map(|t| t.output_tokens)),
        cache_read_input_tokens: pick(
            usage.cache_read_input_tokens,
            totals.map(|t| t.cache_read_input_tokens),
        ),
        cache_creation_input_tokens: pick(
            usage.cache_creation_input_tokens,
            totals.map(|t| t.cache_creation_input_tokens),
        ),
    }
}

/// Log resolved usage for a completed agent stream at INFO level.
pub fn log_stream_usage(
    provider: &str,
    session_id: Option<&str>,
    usage: &ResolvedUsage,
    duration: Duration,
) {
    info!(
        provider = provider,
        session_id = session_id.unwrap_or("-"),
        input_tokens = usage.input_tokens.unwrap_or(0),
        output_tokens = usage.output_tokens.unwrap_or(0),
        total_tokens = usage.total_tokens().unwrap_or(0),
        duration_seconds = duration.as_secs_f64(),
        "agent stream completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model_usage(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn test_resolve_prefers_top_level() {
        let usage = ResultUsage {
            input_tokens: Some(100),
            output_tokens: Some(50),
            ..ResultUsage::default()
        };
        let breakdown = model_usage(json!({"m": {"inputTokens": 999, "outputTokens": 999}}));
        let resolved = resolve_usage(Some(&usage), Some(&breakdown));
        assert_eq!(resolved.input_tokens, Some(100));
        assert_eq!(resolved.output_tokens, Some(50));
        assert_eq!(resolved.total_tokens(), Some(150));
    }

    #[test]
    fn test_zero_input_replaced_by_model_sum() {
        let usage = ResultUsage {
            input_tokens: Some(0),
            output_tokens: Some(40),
            ..ResultUsage::default()
        };
        let breakdown = model_usage(json!({
            "claude-a": {"inputTokens": 70, "outputTokens": 30},
            "claude-b": {"inputTokens": 50, "outputTokens": 10}
        }));
        let resolved = resolve_usage(Some(&usage), Some(&breakdown));
        assert_eq!(resolved.input_tokens, Some(120));
        assert_eq!(resolved.output_tokens, Some(40));
        assert_eq!(resolved.total_tokens(), Some(160));
    }

    #[test]
    fn test_zero_kept_when_breakdown_agrees() {
        let usage = ResultUsage {
            input_tokens: Some(0),
            output_tokens: Some(0),
            ..ResultUsage::default()
        };
        let breakdown = model_usage(json!({"m": {"inputTokens": 0}}));
        let resolved = resolve_usage(Some(&usage), Some(&breakdown));
        assert_eq!(resolved.input_tokens, Some(0));
        assert_eq!(resolved.total_tokens(), Some(0));
    }

    #[test]
    fn test_absent_counts_take_model_sum() {
        let breakdown = model_usage(json!({
            "m": {"inputTokens": 12, "outputTokens": 3, "cacheReadInputTokens": 400}
        }));
        let resolved = resolve_usage(None, Some(&breakdown));
        assert_eq!(resolved.input_tokens, Some(12));
        assert_eq!(resolved.output_tokens, Some(3));
        assert_eq!(resolved.cache_read_input_tokens, Some(400));
        assert_eq!(resolved.cache_creation_input_tokens, Some(0));
    }

    #[test]
    fn test_no_usage_at_all_leaves_total_absent() {
        let usage = ResultUsage {
            input_tokens: Some(10),
            ..ResultUsage::default()
        };
        let resolved = resolve_usage(Some(&usage), None);
        assert_eq!(resolved.input_tokens, Some(10));
        assert_eq!(resolved.output_tokens, None);
        assert_eq!(resolved.total_tokens(), None);
    }

    #[test]
    fn test_sum_skips_malformed_entries() {
        let breakdown = model_usage(json!({
            "ok": {"inputTokens": 5, "outputTokens": "many"},
            "bad": 17
        }));
        let totals = sum_model_usage(&breakdown);
        assert_eq!(totals.input_tokens, 5);
        assert_eq!(totals.output_tokens, 0);
    }
    #[test]
    fn test_sum_saturates_instead_of_overflowing() {
        let breakdown = model_usage(json!({
            "a": {"inputTokens": u64::MAX, "cacheReadInputTokens": u64::MAX},
            "b": {"inputTokens": 2, "cacheReadInputTokens": 1}
        }));
        let totals = sum_model_usage(&breakdown);
        assert_eq!(totals.input_tokens, u64::MAX);
        assert_eq!(totals.cache_read_input_tokens, u64::MAX);

        let resolved = resolve_usage(None, Some(&breakdown));
        assert_eq!(resolved.input_tokens, Some(u64::MAX));
        assert_eq!(resolved.total_tokens(), Some(u64::MAX));
    }
}
