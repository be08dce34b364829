/// Fact mining over extracted vendor pages
use crm_intel::extractor::extract;
use crm_intel::miner::mine;
use crm_intel::models::{BillingPeriod, CleanedText, Currency, Mined, MinedFacts, RawDocument};

fn mine_html(html: &str) -> MinedFacts {
    let doc = RawDocument::success(
        "Acme",
        "https://acme.test/pricing",
        200,
        Some("text/html".to_string()),
        html.to_string(),
        1,
    );
    mine(&extract(&doc))
}

fn mine_text(text: &str) -> MinedFacts {
    mine(&CleanedText {
        text: text.to_string(),
        title: None,
        description: None,
        extraction_succeeded: true,
    })
}

#[test]
fn test_tiered_pricing_page() {
    let facts = mine_html(
        r#"<html><body>
        <nav>Pricing Login Sign up for free today</nav>
        <main>
          <h2>Free</h2><p>Free tools for everyone</p>
          <h2>Starter</h2><p>Starts at €15/mo per seat</p>
          <h2>Professional</h2><p>Starts at €800/mo, billed annually</p>
        </main>
        </body></html>"#,
    );

    assert_eq!(facts.entry_price, Mined::High(15.0));
    assert_eq!(facts.currency, Mined::High(Currency::Eur));
    assert_eq!(
        facts.billing_period,
        Mined::High(BillingPeriod::PerUserPerMonth)
    );
    assert_eq!(
        facts.plan_names,
        Mined::Low(vec![
            "Free".to_string(),
            "Starter".to_string(),
            "Professional".to_string()
        ])
    );
}

#[test]
fn test_contact_sales_page_has_no_price() {
    let facts = mine_text("Contact sales for pricing. The Enterprise plan is available on request.");

    assert_eq!(facts.entry_price, Mined::Absent);
    assert_eq!(facts.currency, Mined::Absent);
    assert_eq!(facts.billing_period, Mined::Absent);
    assert_eq!(facts.plan_names, Mined::High(vec!["Enterprise".to_string()]));
}

#[test]
fn test_grouped_thousands_and_rupees() {
    let facts = mine_text("Growth edition: ₹1,200 per user per month");

    assert_eq!(facts.entry_price, Mined::High(1200.0));
    assert_eq!(facts.currency, Mined::High(Currency::Inr));
    assert_eq!(
        facts.billing_period,
        Mined::High(BillingPeriod::PerUserPerMonth)
    );
    assert_eq!(facts.plan_names, Mined::High(vec!["Growth".to_string()]));
}

#[test]
fn test_lowest_of_mixed_periods() {
    let facts = mine_text("Team $99 a month\nEnterprise $1,500 per year");

    assert_eq!(facts.entry_price, Mined::High(99.0));
    assert_eq!(facts.billing_period, Mined::High(BillingPeriod::PerMonth));
}

#[test]
fn test_prefixed_dollar_variants() {
    let facts = mine_text("Save 20% when paying yearly. Basic: US$ 12 per seat");
    assert_eq!(facts.entry_price, Mined::High(12.0));
    assert_eq!(facts.currency, Mined::High(Currency::Usd));
    assert_eq!(facts.billing_period, Mined::High(BillingPeriod::PerUser));

    let facts = mine_text("Standard CA$45/user/mo");
    assert_eq!(facts.currency, Mined::High(Currency::Cad));
}

#[test]
fn test_funding_and_revenue_figures_are_ignored() {
    let facts = mine_text("We closed $2.5B in pipeline last year and serve 150,000 customers a month");
    assert_eq!(facts.entry_price, Mined::Absent);
    assert_eq!(facts.currency, Mined::Absent);
}

#[test]
fn test_zero_price_is_not_an_entry_price() {
    let facts = mine_text("Free forever: $0/user/month\nStarter: $9/user/month");
    assert_eq!(facts.entry_price, Mined::High(9.0));
}

#[test]
fn test_plan_names_are_capped_at_five() {
    let facts = mine_text(
        "Free plan, Starter plan, Basic plan, Pro plan, Business plan and Enterprise plan",
    );
    assert_eq!(
        facts.plan_names,
        Mined::High(vec![
            "Free".to_string(),
            "Starter".to_string(),
            "Basic".to_string(),
            "Pro".to_string(),
            "Business".to_string()
        ])
    );
}

#[test]
fn test_suffix_currency_words() {
    let facts = mine_text("Only 29 euros per month for the Essentials package");

    assert_eq!(facts.entry_price, Mined::High(29.0));
    assert_eq!(facts.currency, Mined::High(Currency::Eur));
    assert_eq!(facts.billing_period, Mined::High(BillingPeriod::PerMonth));
    assert_eq!(facts.plan_names, Mined::High(vec!["Essentials".to_string()]));
}
