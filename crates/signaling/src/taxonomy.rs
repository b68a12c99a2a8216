//! Lifecycle stage → platform conversion action, and per-platform
//! eligibility rules.

use attribution_core::signals::AdPlatform;
use attribution_core::types::{ContactIdentity, LifecycleStage};

/// Conversion action the platform knows `stage` by, if it tracks it.
pub fn conversion_action(platform: AdPlatform, stage: LifecycleStage) -> Option<&'static str> {
    use LifecycleStage::*;

    let action = match (platform, stage) {
        (AdPlatform::GoogleAds, Lead) => "lead_generation",
        (AdPlatform::GoogleAds, MarketingQualifiedLead) => "mql_conversion",
        (AdPlatform::GoogleAds, SalesQualifiedLead) => "sql_conversion",
        (AdPlatform::GoogleAds, Opportunity) => "opportunity_created",
        (AdPlatform::GoogleAds, Customer) => "purchase",

        (AdPlatform::FacebookAds, Lead) => "Lead",
        (AdPlatform::FacebookAds, MarketingQualifiedLead) => "MQL",
        (AdPlatform::FacebookAds, SalesQualifiedLead) => "SQL",
        (AdPlatform::FacebookAds, Opportunity) => "Opportunity",
        (AdPlatform::FacebookAds, Customer) => "Purchase",

        (AdPlatform::LinkedinAds, Lead) => "lead_gen_conversion",
        (AdPlatform::LinkedinAds, MarketingQualifiedLead) => "mql_conversion",
        (AdPlatform::LinkedinAds, SalesQualifiedLead) => "sql_conversion",
        (AdPlatform::LinkedinAds, Opportunity) => "opportunity_conversion",
        (AdPlatform::LinkedinAds, Customer) => "purchase_conversion",

        (_, Subscriber | Evangelist | Other) => return None,
    };
    Some(action)
}

/// Click id the platform matches conversions on. `None` for platforms that
/// match on hashed person data instead.
pub fn click_id<'a>(platform: AdPlatform, identity: &'a ContactIdentity) -> Option<&'a str> {
    match platform {
        AdPlatform::GoogleAds => identity.click_ids.gclid.as_deref(),
        AdPlatform::FacebookAds => identity.click_ids.fbclid.as_deref(),
        AdPlatform::LinkedinAds => None,
    }
}

pub fn requires_click_id(platform: AdPlatform) -> bool {
    !matches!(platform, AdPlatform::LinkedinAds)
}

/// LinkedIn is always attempted; the others only with their click id.
pub fn is_eligible(platform: AdPlatform, identity: &ContactIdentity) -> bool {
    !requires_click_id(platform) || click_id(platform, identity).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use attribution_core::types::ClickIds;

    #[test]
    fn test_mapped_stages() {
        assert_eq!(conversion_action(AdPlatform::GoogleAds, LifecycleStage::Customer), Some("purchase"));
        assert_eq!(conversion_action(AdPlatform::FacebookAds, LifecycleStage::MarketingQualifiedLead), Some("MQL"));
        assert_eq!(
            conversion_action(AdPlatform::LinkedinAds, LifecycleStage::Opportunity),
            Some("opportunity_conversion")
        );
    }

    #[test]
    fn test_unmapped_stages() {
        for platform in AdPlatform::ALL {
            for stage in [LifecycleStage::Subscriber, LifecycleStage::Evangelist, LifecycleStage::Other] {
                assert_eq!(conversion_action(platform, stage), None);
            }
        }
    }

    #[test]
    fn test_eligibility_by_click_id() {
        let mut identity = ContactIdentity::new("c-1");
        identity.click_ids = ClickIds {
            fbclid: Some("fb-1".to_string()),
            ..Default::default()
        };
        assert!(!is_eligible(AdPlatform::GoogleAds, &identity));
        assert!(is_eligible(AdPlatform::FacebookAds, &identity));
        assert!(is_eligible(AdPlatform::LinkedinAds, &identity));
        assert_eq!(click_id(AdPlatform::FacebookAds, &identity), Some("fb-1"));
    }
}
