use crate::errors::StageFailure;
use crate::models::{
    AiFacts, ComparisonRecord, EntryPrice, FieldProvenance, Mined, MinedFacts, Provenance,
    RawDocument, NOT_AVAILABLE, UNKNOWN,
};

/// Merges stage outputs into the final record.
///
/// Per field: a high-confidence mined value wins, then a parsed AI value,
/// then a low-confidence mined value, then the sentinel.
pub fn assemble(
    doc: &RawDocument,
    mined: &MinedFacts,
    ai: &AiFacts,
    degradation: Vec<StageFailure>,
) -> ComparisonRecord {
    let fields = ai.fields();

    let (entry_price, entry_price_src) = resolve(
        &mined.entry_price,
        fields.and_then(|f| f.entry_price).map(EntryPrice::Amount),
        EntryPrice::NotDisclosed,
        |v| EntryPrice::Amount(*v),
    );

    let (currency, currency_src) = resolve(
        &mined.currency,
        fields.and_then(|f| f.currency).map(|c| c.code().to_string()),
        UNKNOWN.to_string(),
        |c| c.code().to_string(),
    );

    let (billing_period, billing_period_src) = resolve(
        &mined.billing_period,
        None,
        UNKNOWN.to_string(),
        |p| p.label().to_string(),
    );

    let (plan_names, plan_names_src) =
        resolve(&mined.plan_names, None, Vec::new(), |plans| plans.clone());

    let (notable_features, notable_features_src) = resolve(
        &Mined::<Vec<String>>::Absent,
        fields
            .map(|f| f.notable_features.clone())
            .filter(|features| !features.is_empty()),
        Vec::new(),
        |features| features.clone(),
    );

    let (ai_automation_summary, ai_automation_summary_src) = resolve(
        &Mined::<String>::Absent,
        fields.and_then(|f| f.ai_automation_summary.clone()),
        NOT_AVAILABLE.to_string(),
        |s| s.clone(),
    );

    let (target_market, target_market_src) = resolve(
        &Mined::<String>::Absent,
        fields.and_then(|f| f.target_market.clone()),
        UNKNOWN.to_string(),
        |s| s.clone(),
    );

    let provenance = FieldProvenance {
        entry_price: entry_price_src,
        currency: currency_src,
        billing_period: billing_period_src,
        plan_names: plan_names_src,
        notable_features: notable_features_src,
        ai_automation_summary: ai_automation_summary_src,
        target_market: target_market_src,
    };

    ComparisonRecord::new(
        doc.vendor.clone(),
        entry_price,
        currency,
        billing_period,
        plan_names,
        notable_features,
        ai_automation_summary,
        target_market,
        doc.source_url.clone().unwrap_or_else(|| UNKNOWN.to_string()),
        doc.retrieved_at,
        provenance,
        degradation,
    )
}

fn resolve<M, T>(
    mined: &Mined<M>,
    ai: Option<T>,
    default: T,
    from_mined: impl Fn(&M) -> T,
) -> (T, Provenance) {
    match (mined, ai) {
        (Mined::High(v), _) => (from_mined(v), Provenance::Mined),
        (_, Some(v)) => (v, Provenance::Ai),
        (Mined::Low(v), None) => (from_mined(v), Provenance::Mined),
        (Mined::Absent, None) => (default, Provenance::Default),
    }
}
