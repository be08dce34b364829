//! Known CRM vendors and the public pages the fetcher reads for them.

use serde::Serialize;

use crate::models::VendorQuery;

#[derive(Debug, Clone, Serialize)]
pub struct VendorEntry {
    /// Display name used on records.
    pub name: String,
    /// Pricing or marketing page to fetch.
    pub url: String,
    pub aliases: Vec<String>,
}

impl VendorEntry {
    pub fn new(name: impl Into<String>, url: impl Into<String>, aliases: &[&str]) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn matches(&self, key: &str) -> bool {
        normalize(&self.name) == key || self.aliases.iter().any(|a| normalize(a) == key)
    }
}

fn normalize(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Alias table resolving free-text vendor names to canonical sites.
#[derive(Debug, Clone)]
pub struct VendorDirectory {
    entries: Vec<VendorEntry>,
}

impl VendorDirectory {
    pub fn new(entries: Vec<VendorEntry>) -> Self {
        Self { entries }
    }

    pub fn builtin() -> Self {
        Self::new(vec![
            VendorEntry::new(
                "Salesforce",
                "https://www.salesforce.com/sales/pricing/",
                &["sfdc", "salesforce sales cloud", "sales cloud", "salesforce crm"],
            ),
            VendorEntry::new(
                "HubSpot",
                "https://www.hubspot.com/pricing/crm",
                &["hubspot crm", "hubspot sales hub", "hub spot"],
            ),
            VendorEntry::new(
                "Pipedrive",
                "https://www.pipedrive.com/en/pricing",
                &["pipedrive crm"],
            ),
            VendorEntry::new(
                "Zoho CRM",
                "https://www.zoho.com/crm/zohocrm-pricing.html",
                &["zoho", "zohocrm"],
            ),
            VendorEntry::new(
                "Microsoft Dynamics 365",
                "https://www.microsoft.com/en-us/dynamics-365/products/sales/pricing",
                &[
                    "dynamics",
                    "dynamics 365",
                    "microsoft dynamics",
                    "ms dynamics",
                    "dynamics 365 sales",
                ],
            ),
            VendorEntry::new(
                "Freshsales",
                "https://www.freshworks.com/crm/pricing/",
                &["freshworks", "freshworks crm", "freshsales crm"],
            ),
            VendorEntry::new(
                "monday CRM",
                "https://monday.com/crm/pricing",
                &["monday", "monday.com", "monday sales crm"],
            ),
            VendorEntry::new(
                "Insightly",
                "https://www.insightly.com/pricing/",
                &["insightly crm"],
            ),
            VendorEntry::new(
                "Copper",
                "https://www.copper.com/pricing",
                &["copper crm", "prosperworks"],
            ),
            VendorEntry::new(
                "Zendesk Sell",
                "https://www.zendesk.com/sell/pricing/",
                &["zendesk", "zendesk crm", "base crm"],
            ),
            VendorEntry::new(
                "SugarCRM",
                "https://www.sugarcrm.com/pricing/",
                &["sugar", "sugar crm"],
            ),
            VendorEntry::new(
                "Keap",
                "https://keap.com/pricing",
                &["infusionsoft", "keap crm"],
            ),
            VendorEntry::new(
                "Close",
                "https://www.close.com/pricing",
                &["close crm", "close.io", "close.com"],
            ),
            VendorEntry::new(
                "Nimble",
                "https://www.nimble.com/pricing/",
                &["nimble crm"],
            ),
        ])
    }

    /// Case-insensitive exact match on the vendor name or one of its aliases.
    pub fn resolve(&self, query: &VendorQuery) -> Option<&VendorEntry> {
        let key = normalize(query.name());
        self.entries.iter().find(|entry| entry.matches(&key))
    }

    pub fn entries(&self) -> &[VendorEntry] {
        &self.entries
    }
}
