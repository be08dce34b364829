use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

use crate::errors::{AppError, StageFailure};

pub const NOT_DISCLOSED: &str = "Not disclosed";
pub const UNKNOWN: &str = "Unknown";
pub const NOT_AVAILABLE: &str = "Not available";

// ============ Pipeline Input ============

/// A vendor name as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorQuery {
    name: String,
}

impl VendorQuery {
    /// Builds a query from free text. Blank input is rejected.
    pub fn new(raw: &str) -> Result<Self, AppError> {
        let name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if name.is_empty() {
            return Err(AppError::BadRequest(
                "Vendor name cannot be empty".to_string(),
            ));
        }
        Ok(Self { name })
    }

    /// Trimmed name with internal whitespace collapsed.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercased name used for case-insensitive lookups.
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }
}

// ============ Fetcher Output ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Success,
    NotFound,
    Failed,
}

/// Raw page as retrieved by the fetcher. Lives only for one pipeline run.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Canonical vendor name when resolved, otherwise the query text.
    pub vendor: String,
    pub source_url: Option<String>,
    pub status: FetchStatus,
    pub http_status: Option<u16>,
    pub content_type: Option<String>,
    pub body: String,
    pub retrieved_at: DateTime<Utc>,
    pub attempts: u8,
    pub failure: Option<StageFailure>,
}

impl RawDocument {
    pub fn success(
        vendor: impl Into<String>,
        source_url: impl Into<String>,
        http_status: u16,
        content_type: Option<String>,
        body: String,
        attempts: u8,
    ) -> Self {
        Self {
            vendor: vendor.into(),
            source_url: Some(source_url.into()),
            status: FetchStatus::Success,
            http_status: Some(http_status),
            content_type,
            body,
            retrieved_at: Utc::now(),
            attempts,
            failure: None,
        }
    }

    pub fn not_found(query: &VendorQuery) -> Self {
        Self {
            vendor: query.name().to_string(),
            source_url: None,
            status: FetchStatus::NotFound,
            http_status: None,
            content_type: None,
            body: String::new(),
            retrieved_at: Utc::now(),
            attempts: 0,
            failure: Some(StageFailure::VendorUnresolved(query.name().to_string())),
        }
    }

    pub fn failed(
        vendor: impl Into<String>,
        source_url: impl Into<String>,
        http_status: Option<u16>,
        reason: String,
        attempts: u8,
    ) -> Self {
        Self {
            vendor: vendor.into(),
            source_url: Some(source_url.into()),
            status: FetchStatus::Failed,
            http_status,
            content_type: None,
            body: String::new(),
            retrieved_at: Utc::now(),
            attempts,
            failure: Some(StageFailure::FetchFailed(reason)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }
}

// ============ Extractor Output ============

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CleanedText {
    /// Main content, one block per line.
    pub text: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub extraction_succeeded: bool,
}

impl CleanedText {
    pub fn failed() -> Self {
        Self::default()
    }

    /// Text that downstream stages may consume.
    pub fn usable_text(&self) -> Option<&str> {
        if self.extraction_succeeded && !self.text.is_empty() {
            Some(&self.text)
        } else {
            None
        }
    }
}

// ============ Fact Miner Output ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Low,
    Absent,
}

/// A mined field: the confidence tag and the value travel together, so an
/// absent field can never carry a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "confidence", content = "value", rename_all = "snake_case")]
pub enum Mined<T> {
    High(T),
    Low(T),
    Absent,
}

impl<T> Default for Mined<T> {
    fn default() -> Self {
        Mined::Absent
    }
}

impl<T> Mined<T> {
    pub fn with_confidence(value: T, confidence: Confidence) -> Self {
        match confidence {
            Confidence::High => Mined::High(value),
            Confidence::Low => Mined::Low(value),
            Confidence::Absent => Mined::Absent,
        }
    }

    pub fn confidence(&self) -> Confidence {
        match self {
            Mined::High(_) => Confidence::High,
            Mined::Low(_) => Confidence::Low,
            Mined::Absent => Confidence::Absent,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Mined::High(v) | Mined::Low(v) => Some(v),
            Mined::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Mined::Absent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "EUR")]
    Eur,
    #[serde(rename = "GBP")]
    Gbp,
    #[serde(rename = "INR")]
    Inr,
    #[serde(rename = "CAD")]
    Cad,
    #[serde(rename = "AUD")]
    Aud,
    #[serde(rename = "JPY")]
    Jpy,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Inr => "INR",
            Currency::Cad => "CAD",
            Currency::Aud => "AUD",
            Currency::Jpy => "JPY",
        }
    }

    /// Maps a symbol, ISO code or currency word to a currency.
    ///
    /// A bare `$` is read as US dollars.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        let currency = match label {
            "$" | "US$" => Currency::Usd,
            "€" => Currency::Eur,
            "£" => Currency::Gbp,
            "₹" => Currency::Inr,
            "¥" => Currency::Jpy,
            "A$" | "AU$" => Currency::Aud,
            "C$" | "CA$" => Currency::Cad,
            _ => match label.to_lowercase().as_str() {
                "usd" | "dollar" | "dollars" | "us dollars" => Currency::Usd,
                "eur" | "euro" | "euros" => Currency::Eur,
                "gbp" | "pound" | "pounds" => Currency::Gbp,
                "inr" | "rupee" | "rupees" => Currency::Inr,
                "cad" => Currency::Cad,
                "aud" => Currency::Aud,
                "jpy" | "yen" => Currency::Jpy,
                _ => return None,
            },
        };
        Some(currency)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    PerUserPerMonth,
    PerUserPerYear,
    PerMonth,
    PerYear,
    PerUser,
}

impl BillingPeriod {
    pub fn from_units(per_user: bool, monthly: bool, yearly: bool) -> Option<Self> {
        match (per_user, monthly, yearly) {
            (true, true, _) => Some(BillingPeriod::PerUserPerMonth),
            (true, false, true) => Some(BillingPeriod::PerUserPerYear),
            (true, false, false) => Some(BillingPeriod::PerUser),
            (false, true, _) => Some(BillingPeriod::PerMonth),
            (false, false, true) => Some(BillingPeriod::PerYear),
            (false, false, false) => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BillingPeriod::PerUserPerMonth => "per user / month",
            BillingPeriod::PerUserPerYear => "per user / year",
            BillingPeriod::PerMonth => "per month",
            BillingPeriod::PerYear => "per year",
            BillingPeriod::PerUser => "per user",
        }
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// First-pass structured facts from deterministic pattern rules.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MinedFacts {
    pub entry_price: Mined<f64>,
    pub currency: Mined<Currency>,
    pub billing_period: Mined<BillingPeriod>,
    pub plan_names: Mined<Vec<String>>,
}

// ============ AI Normalizer Output ============

/// Fields accepted from a schema-valid model reply.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AiFields {
    pub entry_price: Option<f64>,
    pub currency: Option<Currency>,
    pub notable_features: Vec<String>,
    pub ai_automation_summary: Option<String>,
    pub target_market: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AiFacts {
    /// The model replied and the reply matched the schema.
    Parsed(AiFields),
    /// The call failed or the reply was rejected. No field values survive.
    Unavailable(StageFailure),
    /// No usable text, so the model was never called.
    Skipped,
}

impl AiFacts {
    pub fn parse_succeeded(&self) -> bool {
        matches!(self, AiFacts::Parsed(_))
    }

    pub fn fields(&self) -> Option<&AiFields> {
        match self {
            AiFacts::Parsed(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        match self {
            AiFacts::Unavailable(failure) => Some(failure),
            _ => None,
        }
    }
}

// ============ Assembler Output ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Mined,
    Ai,
    Default,
}

/// Entry price as shown to users: a number, or the "Not disclosed" sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntryPrice {
    Amount(f64),
    NotDisclosed,
}

impl EntryPrice {
    pub fn amount(&self) -> Option<f64> {
        match self {
            EntryPrice::Amount(v) => Some(*v),
            EntryPrice::NotDisclosed => None,
        }
    }
}

impl fmt::Display for EntryPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryPrice::Amount(v) => write!(f, "{:.2}", v),
            EntryPrice::NotDisclosed => f.write_str(NOT_DISCLOSED),
        }
    }
}

impl Serialize for EntryPrice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EntryPrice::Amount(v) => serializer.serialize_f64(*v),
            EntryPrice::NotDisclosed => serializer.serialize_str(NOT_DISCLOSED),
        }
    }
}

impl<'de> Deserialize<'de> for EntryPrice {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(v) => Ok(EntryPrice::Amount(v)),
            Raw::Text(s) if s == NOT_DISCLOSED => Ok(EntryPrice::NotDisclosed),
            Raw::Text(s) => Err(serde::de::Error::custom(format!(
                "invalid entry price: {}",
                s
            ))),
        }
    }
}

/// Which stage supplied each record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldProvenance {
    pub entry_price: Provenance,
    pub currency: Provenance,
    pub billing_period: Provenance,
    pub plan_names: Provenance,
    pub notable_features: Provenance,
    pub ai_automation_summary: Provenance,
    pub target_market: Provenance,
}

impl FieldProvenance {
    pub fn all(provenance: Provenance) -> Self {
        Self {
            entry_price: provenance,
            currency: provenance,
            billing_period: provenance,
            plan_names: provenance,
            notable_features: provenance,
            ai_automation_summary: provenance,
            target_market: provenance,
        }
    }
}

/// Canonical comparison record for one vendor.
///
/// Every field is populated; unresolved fields hold sentinels. Records are
/// built by `assembler::assemble` and are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    vendor: String,
    entry_price: EntryPrice,
    currency: String,
    billing_period: String,
    plan_names: Vec<String>,
    notable_features: Vec<String>,
    ai_automation_summary: String,
    target_market: String,
    source_url: String,
    last_updated: DateTime<Utc>,
    provenance: FieldProvenance,
    degradation: Vec<StageFailure>,
}

impl ComparisonRecord {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        vendor: String,
        entry_price: EntryPrice,
        currency: String,
        billing_period: String,
        plan_names: Vec<String>,
        notable_features: Vec<String>,
        ai_automation_summary: String,
        target_market: String,
        source_url: String,
        last_updated: DateTime<Utc>,
        provenance: FieldProvenance,
        degradation: Vec<StageFailure>,
    ) -> Self {
        Self {
            vendor,
            entry_price,
            currency,
            billing_period,
            plan_names,
            notable_features,
            ai_automation_summary,
            target_market,
            source_url,
            last_updated,
            provenance,
            degradation,
        }
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn entry_price(&self) -> EntryPrice {
        self.entry_price
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn billing_period(&self) -> &str {
        &self.billing_period
    }

    pub fn plan_names(&self) -> &[String] {
        &self.plan_names
    }

    pub fn notable_features(&self) -> &[String] {
        &self.notable_features
    }

    pub fn ai_automation_summary(&self) -> &str {
        &self.ai_automation_summary
    }

    pub fn target_market(&self) -> &str {
        &self.target_market
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    pub fn provenance(&self) -> &FieldProvenance {
        &self.provenance
    }

    /// Stage failures behind any sentinel values, in pipeline order.
    pub fn degradation(&self) -> &[StageFailure] {
        &self.degradation
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradation.is_empty()
    }
}

// ============ Batch Types ============

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Names submitted, including skipped ones.
    pub total: usize,
    pub complete: usize,
    pub degraded: usize,
    /// Blank or duplicate names.
    pub skipped: usize,
    /// Vendors never started because the batch was cancelled.
    pub cancelled: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub records: Vec<ComparisonRecord>,
    pub summary: BatchSummary,
}

/// Body of `POST /api/v1/analyze`.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    pub vendors: Vec<String>,
    #[serde(default)]
    pub refresh: bool,
}
