//! Deterministic fact mining over cleaned page text.
//!
//! Each field has an ordered list of rules. The first rule that produces a
//! value wins, and later rules never override it. A price is only ever read
//! from a number anchored by both a currency marker and a billing-period
//! indicator, so "10 million users" or "$10 million raised" never become an
//! entry price.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::models::{BillingPeriod, CleanedText, Confidence, Currency, Mined, MinedFacts};

/// Tokens after an amount searched for a loose billing-period indicator.
const PERIOD_WINDOW_TOKENS: usize = 6;
pub const MIN_PRICE: f64 = 0.01;
pub const MAX_PRICE: f64 = 1_000_000.0;
const MAX_PLAN_NAMES: usize = 5;

/// Canonical spelling of tier words recognised as plan names.
const PLAN_TIERS: &[&str] = &[
    "Free",
    "Starter",
    "Basic",
    "Essentials",
    "Standard",
    "Professional",
    "Pro",
    "Business",
    "Enterprise",
    "Premium",
    "Growth",
    "Advanced",
    "Ultimate",
    "Unlimited",
    "Team",
    "Plus",
    "Lite",
    "Elite",
];

const NUMBER: &str =
    r"\d{1,3}(?:,\d{3})+(?:\.\d{1,2})?|\d{1,3}(?:\.\d{3})+(?:,\d{1,2})?|\d+(?:\.\d{1,2})?";
const UNIT_USER: &str = r"users?|seats?|agents?|reps?|licen[cs]es?|members?";
const UNIT_MONTH: &str = r"months?|mo|mth";
const UNIT_YEAR: &str = r"years?|yr|annum";
const CONNECTOR: &str = r"(?:/|\bper\b|\ban?\b|\beach\b)";

lazy_static! {
    // $25, US$ 25, €1,200.50, USD 25
    static ref PREFIX_PRICE: Regex = Regex::new(&format!(
        r"(?P<cur>\b(?:US|AU|CA|A|C)\$|\$|€|£|₹|¥|\b(?:USD|EUR|GBP|INR|CAD|AUD|JPY)\b)\s?(?P<amount>{NUMBER})"
    ))
    .unwrap();

    // 25 USD, 25€, 25 euros
    static ref SUFFIX_PRICE: Regex = Regex::new(&format!(
        r"(?i)\b(?P<amount>{NUMBER})\s?(?P<cur>(?:USD|EUR|GBP|INR|CAD|AUD|JPY|dollars?|euros?|pounds?)\b|€|£)"
    ))
    .unwrap();

    // Period indicator directly after the amount: "/user/month", " per month", " monthly".
    static ref ADJACENT_PERIOD: Regex = Regex::new(&format!(
        r"(?i)^\s*(?:(?P<adverb>monthly|annually|yearly)\b|{CONNECTOR}\s*(?P<first>{UNIT_USER}|{UNIT_MONTH}|{UNIT_YEAR})\b(?:\s*,?\s*{CONNECTOR}\s*(?P<second>{UNIT_USER}|{UNIT_MONTH}|{UNIT_YEAR})\b|\s+(?P<trailing>monthly|annually|yearly)\b)?)"
    ))
    .unwrap();

    // Any period indicator, used inside the loose window.
    static ref LOOSE_PERIOD: Regex = Regex::new(&format!(
        r"(?i)(?:{CONNECTOR}\s*(?P<unit>{UNIT_USER}|{UNIT_MONTH}|{UNIT_YEAR})\b|\b(?P<adverb>monthly|annually|yearly)\b)"
    ))
    .unwrap();

    // ISO code restating a prefix currency: "$25 USD/month".
    static ref RESTATED_CODE: Regex =
        Regex::new(r"^\s?(?P<cur>USD|EUR|GBP|INR|CAD|AUD|JPY)\b").unwrap();

    // 1.200 or 1.200,50
    static ref DOTTED_GROUPS: Regex = Regex::new(r"^\d{1,3}(?:\.\d{3})+(?:,\d{1,2})?$").unwrap();

    static ref MAGNITUDE: Regex =
        Regex::new(r"(?i)^\s*(?:million|billion|thousand|mn|bn|[mbk])\b").unwrap();

    static ref STATED_CURRENCY: Regex = Regex::new(
        r"(?i)\b(?:all\s+)?prices?\s+(?:are\s+)?(?:shown\s+|listed\s+|quoted\s+|displayed\s+)?in\s+(?P<cur>USD|EUR|GBP|INR|CAD|AUD|JPY|US\s+dollars|dollars|euros|pounds)\b"
    )
    .unwrap();

    static ref BILLED_PHRASE: Regex =
        Regex::new(r"(?i)\bbilled\s+(?P<adverb>monthly|annually|yearly)\b").unwrap();

    static ref PLAN_WITH_SUFFIX: Regex = Regex::new(&format!(
        r"(?i)\b(?P<tier>{})\s+(?:plan|edition|tier|package)s?\b",
        PLAN_TIERS.join("|")
    ))
    .unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    /// Period indicator immediately follows the amount.
    Adjacent,
    /// Period indicator within the next few tokens.
    Windowed,
}

#[derive(Debug, Clone, Copy)]
struct PriceCandidate {
    offset: usize,
    amount: f64,
    currency: Currency,
    period: BillingPeriod,
    anchor: Anchor,
}

/// Chosen price for one anchor class.
#[derive(Debug, Clone, Copy)]
struct PriceSelection {
    amount: f64,
    currency: Currency,
    period: BillingPeriod,
    confidence: Confidence,
}

/// Pre-computed view of the text shared by all rules.
struct Scan<'a> {
    text: &'a str,
    adjacent: Option<PriceSelection>,
    windowed: Option<PriceSelection>,
}

impl<'a> Scan<'a> {
    fn new(text: &'a str) -> Self {
        let candidates = price_candidates(text);
        Self {
            text,
            adjacent: select(&candidates, Anchor::Adjacent, Confidence::High),
            windowed: select(&candidates, Anchor::Windowed, Confidence::Low),
        }
    }
}

type Rule<T> = fn(&Scan<'_>) -> Mined<T>;

const ENTRY_PRICE_RULES: &[Rule<f64>] = &[adjacent_price, windowed_price];
const CURRENCY_RULES: &[Rule<Currency>] =
    &[adjacent_currency, stated_currency, windowed_currency];
const BILLING_PERIOD_RULES: &[Rule<BillingPeriod>] =
    &[adjacent_period, billed_phrase_period, windowed_period];
const PLAN_NAME_RULES: &[Rule<Vec<String>>] = &[plans_with_suffix, plan_headings];

/// Mines structured facts from cleaned text.
///
/// Pure and deterministic. Failed or empty text yields all fields absent.
pub fn mine(cleaned: &CleanedText) -> MinedFacts {
    let Some(text) = cleaned.usable_text() else {
        return MinedFacts::default();
    };

    let scan = Scan::new(text);
    let facts = MinedFacts {
        entry_price: first_match(ENTRY_PRICE_RULES, &scan),
        currency: first_match(CURRENCY_RULES, &scan),
        billing_period: first_match(BILLING_PERIOD_RULES, &scan),
        plan_names: first_match(PLAN_NAME_RULES, &scan),
    };

    tracing::debug!(
        "Mined facts: price={:?} currency={:?} period={:?} plans={:?}",
        facts.entry_price.confidence(),
        facts.currency.confidence(),
        facts.billing_period.confidence(),
        facts.plan_names.confidence()
    );

    facts
}

fn first_match<T>(rules: &[Rule<T>], scan: &Scan<'_>) -> Mined<T> {
    rules
        .iter()
        .map(|rule| rule(scan))
        .find(|mined| !mined.is_absent())
        .unwrap_or(Mined::Absent)
}

// ============ Rules ============

fn adjacent_price(scan: &Scan<'_>) -> Mined<f64> {
    scan.adjacent
        .map(|s| Mined::with_confidence(s.amount, s.confidence))
        .unwrap_or(Mined::Absent)
}

fn windowed_price(scan: &Scan<'_>) -> Mined<f64> {
    scan.windowed
        .map(|s| Mined::Low(s.amount))
        .unwrap_or(Mined::Absent)
}

fn adjacent_currency(scan: &Scan<'_>) -> Mined<Currency> {
    scan.adjacent
        .map(|s| Mined::with_confidence(s.currency, s.confidence))
        .unwrap_or(Mined::Absent)
}

fn stated_currency(scan: &Scan<'_>) -> Mined<Currency> {
    STATED_CURRENCY
        .captures(scan.text)
        .and_then(|caps| currency_from_caps(&caps))
        .map(Mined::High)
        .unwrap_or(Mined::Absent)
}

fn windowed_currency(scan: &Scan<'_>) -> Mined<Currency> {
    scan.windowed
        .map(|s| Mined::Low(s.currency))
        .unwrap_or(Mined::Absent)
}

fn adjacent_period(scan: &Scan<'_>) -> Mined<BillingPeriod> {
    scan.adjacent
        .map(|s| Mined::with_confidence(s.period, s.confidence))
        .unwrap_or(Mined::Absent)
}

fn billed_phrase_period(scan: &Scan<'_>) -> Mined<BillingPeriod> {
    BILLED_PHRASE
        .captures(scan.text)
        .and_then(|caps| {
            let adverb = caps.name("adverb")?.as_str().to_lowercase();
            let monthly = adverb == "monthly";
            BillingPeriod::from_units(false, monthly, !monthly)
        })
        .map(Mined::Low)
        .unwrap_or(Mined::Absent)
}

fn windowed_period(scan: &Scan<'_>) -> Mined<BillingPeriod> {
    scan.windowed
        .map(|s| Mined::Low(s.period))
        .unwrap_or(Mined::Absent)
}

fn plans_with_suffix(scan: &Scan<'_>) -> Mined<Vec<String>> {
    let names = PLAN_WITH_SUFFIX
        .captures_iter(scan.text)
        .filter_map(|caps| caps.name("tier").and_then(|m| canonical_tier(m.as_str())));
    collect_plan_names(names)
        .map(Mined::High)
        .unwrap_or(Mined::Absent)
}

fn plan_headings(scan: &Scan<'_>) -> Mined<Vec<String>> {
    let names = scan.text.lines().filter_map(|line| canonical_tier(line.trim()));
    collect_plan_names(names)
        .map(Mined::Low)
        .unwrap_or(Mined::Absent)
}

// ============ Helpers ============

fn canonical_tier(word: &str) -> Option<String> {
    PLAN_TIERS
        .iter()
        .find(|tier| tier.eq_ignore_ascii_case(word))
        .map(|tier| tier.to_string())
}

fn collect_plan_names(names: impl Iterator<Item = String>) -> Option<Vec<String>> {
    let mut unique: Vec<String> = Vec::new();
    for name in names {
        if !unique.contains(&name) {
            unique.push(name);
        }
        if unique.len() == MAX_PLAN_NAMES {
            break;
        }
    }
    if unique.is_empty() {
        None
    } else {
        Some(unique)
    }
}

fn currency_from_caps(caps: &Captures<'_>) -> Option<Currency> {
    let label = caps.name("cur")?.as_str();
    let label = label.split_whitespace().collect::<Vec<_>>().join(" ");
    Currency::from_label(&label)
}

/// Dot-grouped thousands are only read on euro prices; elsewhere they are
/// ambiguous and rejected.
fn parse_amount(raw: &str, currency: Currency) -> Option<f64> {
    let normalized = if DOTTED_GROUPS.is_match(raw) {
        if currency != Currency::Eur {
            return None;
        }
        raw.replace('.', "").replace(',', ".")
    } else {
        raw.replace(',', "")
    };
    let amount: f64 = normalized.parse().ok()?;
    is_plausible_price(amount).then_some(amount)
}

/// Entry prices outside this range are free tiers or misreads.
pub fn is_plausible_price(amount: f64) -> bool {
    (MIN_PRICE..=MAX_PRICE).contains(&amount)
}

/// All currency-anchored amounts that also carry a period indicator.
fn price_candidates(text: &str) -> Vec<PriceCandidate> {
    let mut candidates: Vec<PriceCandidate> = Vec::new();

    for regex in [&*PREFIX_PRICE, &*SUFFIX_PRICE] {
        for caps in regex.captures_iter(text) {
            let (Some(whole), Some(amount_match)) = (caps.get(0), caps.name("amount")) else {
                continue;
            };
            if candidates.iter().any(|c| c.offset == amount_match.start()) {
                continue;
            }
            let Some(currency) = currency_from_caps(&caps) else {
                continue;
            };
            if text[amount_match.end()..].starts_with(|c: char| c.is_ascii_digit()) {
                continue;
            }
            let Some(amount) = parse_amount(amount_match.as_str(), currency) else {
                continue;
            };

            // Period lookups start after the whole match so a suffix currency
            // ("25 USD per month") is skipped over.
            let mut rest = &text[whole.end()..];
            if MAGNITUDE.is_match(rest) {
                continue;
            }
            if let Some(code) = RESTATED_CODE.captures(rest) {
                let restated = code.name("cur").and_then(|m| Currency::from_label(m.as_str()));
                if let (Some(code_match), Some(restated)) = (code.get(0), restated) {
                    if restated == currency {
                        rest = &rest[code_match.end()..];
                    }
                }
            }
            let Some((period, anchor)) = period_after(rest) else {
                continue;
            };

            candidates.push(PriceCandidate {
                offset: amount_match.start(),
                amount,
                currency,
                period,
                anchor,
            });
        }
    }

    candidates.sort_by_key(|c| c.offset);
    candidates
}

fn period_after(rest: &str) -> Option<(BillingPeriod, Anchor)> {
    if let Some(caps) = ADJACENT_PERIOD.captures(rest) {
        let units = ["adverb", "first", "second", "trailing"]
            .iter()
            .filter_map(|name| caps.name(name).map(|m| m.as_str()));
        if let Some(period) = period_from_units(units) {
            return Some((period, Anchor::Adjacent));
        }
    }

    // Loose window, stopping at the end of the current block.
    let line = rest.lines().next().unwrap_or("");
    let window = line
        .split_whitespace()
        .take(PERIOD_WINDOW_TOKENS)
        .collect::<Vec<_>>()
        .join(" ");
    let units: Vec<&str> = LOOSE_PERIOD
        .captures_iter(&window)
        .filter_map(|caps| {
            caps.name("unit")
                .or_else(|| caps.name("adverb"))
                .map(|m| m.as_str())
        })
        .collect();
    period_from_units(units.into_iter()).map(|p| (p, Anchor::Windowed))
}

fn period_from_units<'a>(units: impl Iterator<Item = &'a str>) -> Option<BillingPeriod> {
    let mut per_user = false;
    let mut monthly = false;
    let mut yearly = false;

    for unit in units {
        let unit = unit.to_lowercase();
        match unit.as_str() {
            "monthly" | "month" | "months" | "mo" | "mth" => monthly = true,
            "annually" | "yearly" | "year" | "years" | "yr" | "annum" => yearly = true,
            _ => per_user = true,
        }
    }

    BillingPeriod::from_units(per_user, monthly, yearly)
}

/// Picks the entry price among candidates of one anchor class.
///
/// The lowest amount in the first-seen currency wins. Mixed currencies make
/// the selection ambiguous, so it is downgraded to `Low`.
fn select(
    candidates: &[PriceCandidate],
    anchor: Anchor,
    confidence: Confidence,
) -> Option<PriceSelection> {
    let mut matching = candidates.iter().filter(|c| c.anchor == anchor);
    let first = *matching.next()?;

    let mut best = first;
    let mut mixed = false;
    for candidate in matching {
        if candidate.currency != first.currency {
            mixed = true;
            continue;
        }
        if candidate.amount < best.amount {
            best = *candidate;
        }
    }

    Some(PriceSelection {
        amount: best.amount,
        currency: best.currency,
        period: best.period,
        confidence: if mixed { Confidence::Low } else { confidence },
    })
}
