//! AI normalization of cleaned page text.
//!
//! The model's reply is untrusted input. It is parsed strictly into the five
//! fields the normalizer owns, and anything that does not match the schema is
//! rejected as a whole rather than partially accepted.

use failsafe::futures::CircuitBreaker;
use serde::Deserialize;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use crate::circuit_breaker::{create_ai_circuit_breaker, AiCircuitBreaker};
use crate::errors::StageFailure;
use crate::miner::is_plausible_price;
use crate::models::{AiFacts, AiFields, CleanedText, Currency, Mined, MinedFacts};
use crate::openai_client::{CompletionClient, CompletionRequest};

pub const MAX_FEATURES: usize = 10;

pub const SYSTEM_PROMPT: &str = "You are a market analyst extracting facts about CRM products \
from their public web pages. Answer with a single JSON object and nothing else. Only use \
information present in the supplied text; use null or an empty list when a fact is not stated.";

/// The only keys a reply may contain.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AiPayload {
    #[serde(default)]
    entry_price: Option<f64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    notable_features: Option<Vec<String>>,
    #[serde(default)]
    ai_automation_summary: Option<String>,
    #[serde(default)]
    target_market: Option<String>,
}

pub struct AiNormalizer {
    client: Option<Arc<dyn CompletionClient>>,
    breaker: AiCircuitBreaker,
    max_prompt_chars: usize,
    timeout: Duration,
}

impl AiNormalizer {
    /// A `None` client means no API key is configured; every vendor is then
    /// reported as AI-unavailable without a network call.
    pub fn new(
        client: Option<Arc<dyn CompletionClient>>,
        max_prompt_chars: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            breaker: create_ai_circuit_breaker(),
            max_prompt_chars,
            timeout,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Asks the model for the normalized fields of one vendor.
    ///
    /// Never fails: every error becomes `AiFacts::Unavailable` and the
    /// record falls back to mined facts.
    pub async fn normalize(&self, vendor: &str, text: &CleanedText, mined: &MinedFacts) -> AiFacts {
        if text.usable_text().is_none() {
            tracing::debug!("Skipping AI normalization for {}: no usable text", vendor);
            return AiFacts::Skipped;
        }

        let Some(client) = self.client.as_ref() else {
            tracing::warn!("AI normalization unavailable for {}: no API key", vendor);
            return AiFacts::Unavailable(StageFailure::AiUnavailable(
                "OpenAI API key not configured".to_string(),
            ));
        };

        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: build_prompt(vendor, text, mined, self.max_prompt_chars),
        };

        let timeout = self.timeout;
        let client = Arc::clone(client);
        let call = async move {
            match tokio::time::timeout(timeout, client.complete(request)).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err(format!("request timed out after {}s", timeout.as_secs())),
            }
        };

        let raw = match self.breaker.call(call).await {
            Ok(raw) => raw,
            Err(failsafe::Error::Inner(message)) => {
                tracing::warn!("AI call for {} failed: {}", vendor, message);
                return AiFacts::Unavailable(StageFailure::AiUnavailable(message));
            }
            Err(failsafe::Error::Rejected) => {
                tracing::warn!("AI call for {} rejected: circuit open", vendor);
                return AiFacts::Unavailable(StageFailure::AiUnavailable(
                    "circuit open after repeated failures".to_string(),
                ));
            }
        };

        match parse_response(&raw) {
            Ok(fields) => {
                tracing::info!(
                    "✓ AI normalized {} ({} features)",
                    vendor,
                    fields.notable_features.len()
                );
                AiFacts::Parsed(fields)
            }
            Err(failure) => {
                tracing::warn!("Rejected AI reply for {}: {}", vendor, failure);
                AiFacts::Unavailable(failure)
            }
        }
    }
}

/// Builds the user message: page metadata, requested fields, parser hints,
/// then page text truncated to `max_chars`.
pub fn build_prompt(vendor: &str, page: &CleanedText, mined: &MinedFacts, max_chars: usize) -> String {
    let mut prompt = format!("Vendor: {vendor}\n");
    if let Some(title) = page.title.as_deref() {
        let _ = writeln!(prompt, "Page title: {title}");
    }
    if let Some(description) = page.description.as_deref() {
        let _ = writeln!(prompt, "Page description: {description}");
    }

    let _ = write!(
        prompt,
        "\nReturn a JSON object with exactly these optional keys:\n\
         - entry_price: lowest advertised paid price as a number, or null\n\
         - currency: ISO 4217 code of that price, or null\n\
         - notable_features: list of short feature names (at most {MAX_FEATURES})\n\
         - ai_automation_summary: one or two sentences on AI and automation capabilities, or null\n\
         - target_market: primary customer segment (e.g. SMB, mid-market, enterprise), or null\n"
    );

    let hints = mined_hints(mined);
    if !hints.is_empty() {
        prompt.push_str("\nA deterministic parser already found (may be incomplete):\n");
        prompt.push_str(&hints);
    }

    prompt.push_str("\nPage text:\n");
    prompt.push_str(truncate_chars(
        page.usable_text().unwrap_or_default(),
        max_chars,
    ));
    prompt
}

fn mined_hints(mined: &MinedFacts) -> String {
    let mut hints = String::new();
    if let Some((price, confidence)) = hint(&mined.entry_price) {
        let _ = writeln!(hints, "- entry_price: {} ({})", price, confidence);
    }
    if let Some((currency, confidence)) = hint(&mined.currency) {
        let _ = writeln!(hints, "- currency: {} ({})", currency, confidence);
    }
    if let Some((period, confidence)) = hint(&mined.billing_period) {
        let _ = writeln!(hints, "- billing_period: {} ({})", period, confidence);
    }
    if let Some((plans, confidence)) = hint(&mined.plan_names) {
        let _ = writeln!(hints, "- plans: {} ({})", plans.join(", "), confidence);
    }
    hints
}

fn hint<T>(mined: &Mined<T>) -> Option<(&T, &'static str)> {
    match mined {
        Mined::High(v) => Some((v, "high confidence")),
        Mined::Low(v) => Some((v, "low confidence")),
        Mined::Absent => None,
    }
}

/// Truncates to at most `max_chars` characters, never splitting one.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Parses a raw model reply into validated fields.
pub fn parse_response(raw: &str) -> Result<AiFields, StageFailure> {
    let value: serde_json::Value = serde_json::from_str(raw.trim())
        .map_err(|e| StageFailure::AiUnavailable(format!("reply is not valid JSON: {}", e)))?;

    if !value.is_object() {
        return Err(StageFailure::AiUnavailable(
            "reply is not a JSON object".to_string(),
        ));
    }

    let payload: AiPayload = serde_json::from_value(value)
        .map_err(|e| StageFailure::AiUnavailable(format!("reply failed schema check: {}", e)))?;

    if let Some(price) = payload.entry_price {
        if !is_plausible_price(price) {
            return Err(StageFailure::AiUnavailable(format!(
                "entry_price out of range: {}",
                price
            )));
        }
    }

    let currency = payload
        .currency
        .as_deref()
        .and_then(non_empty)
        .and_then(|label| Currency::from_label(&label));

    let mut features: Vec<String> = Vec::new();
    for feature in payload.notable_features.unwrap_or_default() {
        let Some(feature) = non_empty(&feature) else {
            continue;
        };
        if features.iter().any(|f| f.eq_ignore_ascii_case(&feature)) {
            continue;
        }
        features.push(feature);
        if features.len() == MAX_FEATURES {
            break;
        }
    }

    Ok(AiFields {
        entry_price: payload.entry_price,
        currency,
        notable_features: features,
        ai_automation_summary: payload.ai_automation_summary.as_deref().and_then(non_empty),
        target_market: payload.target_market.as_deref().and_then(non_empty),
    })
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
