use crate::models::{AdminSettings, ApprovalStatus, WallSettings};

/// Effective moderation knobs for one wall, extracted from either the
/// per-wall settings or the legacy global settings.
#[derive(Clone, Debug)]
pub struct ModerationRules {
    auto_approve: bool,
    approve_keywords: Vec<String>,
    reject_keywords: Vec<String>,
}

impl ModerationRules {
    pub fn new(auto_approve: bool, approve_keywords: &str, reject_keywords: &str) -> Self {
        Self {
            auto_approve,
            approve_keywords: parse_keywords(approve_keywords),
            reject_keywords: parse_keywords(reject_keywords),
        }
    }

    pub fn from_wall(settings: &WallSettings) -> Self {
        Self::new(
            settings.auto_approve,
            &settings.auto_approve_keywords,
            &settings.auto_reject_keywords,
        )
    }

    pub fn from_admin(settings: &AdminSettings) -> Self {
        Self::new(
            settings.auto_approve,
            &settings.auto_approve_keywords,
            &settings.auto_reject_keywords,
        )
    }
}

/// Decides the approval status of a new submission.
///
/// Rule order is the contract: reject keywords are checked first and win
/// over approve keywords, which win over the auto-approve flag. A text
/// matching neither with auto-approve off stays pending for manual
/// review.
pub fn decide(text: &str, rules: &ModerationRules) -> ApprovalStatus {
    let haystack = text.to_lowercase();

    if matches_any(&haystack, &rules.reject_keywords) {
        return ApprovalStatus::Rejected;
    }
    if matches_any(&haystack, &rules.approve_keywords) {
        return ApprovalStatus::Approved;
    }
    if rules.auto_approve {
        return ApprovalStatus::Approved;
    }
    ApprovalStatus::Pending
}

fn matches_any(haystack: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|keyword| haystack.contains(keyword))
}

/// Splits a stored keyword string on commas and whitespace, trimming and
/// lowercasing each entry. Empty entries are dropped so a blank setting
/// never matches anything.
fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(|ch: char| ch == ',' || ch.is_whitespace())
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(auto_approve: bool, approve: &str, reject: &str) -> ModerationRules {
        ModerationRules::new(auto_approve, approve, reject)
    }

    #[test]
    fn reject_keyword_wins_over_approve_keyword() {
        let rules = rules(true, "love", "spam");
        assert_eq!(
            decide("spam but also love", &rules),
            ApprovalStatus::Rejected
        );
    }

    #[test]
    fn approve_keyword_wins_over_pending() {
        let rules = rules(false, "congrats", "");
        assert_eq!(decide("Congrats you two!", &rules), ApprovalStatus::Approved);
    }

    #[test]
    fn auto_approve_flag_is_the_fallback() {
        assert_eq!(decide("anything", &rules(true, "", "")), ApprovalStatus::Approved);
        assert_eq!(decide("anything", &rules(false, "", "")), ApprovalStatus::Pending);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let rules = rules(false, "", "BadWord");
        assert_eq!(decide("this contains badword here", &rules), ApprovalStatus::Rejected);
    }

    #[test]
    fn keywords_split_on_commas_and_whitespace() {
        let rules = rules(false, "best wishes,cheers", "");
        // "wishes" alone matches because entries are individual tokens.
        assert_eq!(decide("many wishes", &rules), ApprovalStatus::Approved);
        assert_eq!(decide("cheers!", &rules), ApprovalStatus::Approved);
    }

    #[test]
    fn empty_keyword_strings_never_match() {
        let rules = rules(false, " , ,  ", ", ,");
        assert_eq!(decide("", &rules), ApprovalStatus::Pending);
        assert_eq!(decide("hello", &rules), ApprovalStatus::Pending);
    }

    #[test]
    fn wall_and_admin_settings_produce_same_rules() {
        let mut wall = crate::models::WallSettings::default();
        wall.auto_approve = false;
        wall.auto_reject_keywords = "ads".to_string();

        let mut admin = crate::models::AdminSettings::default();
        admin.auto_reject_keywords = "ads".to_string();

        let from_wall = ModerationRules::from_wall(&wall);
        let from_admin = ModerationRules::from_admin(&admin);

        assert_eq!(decide("buy ads now", &from_wall), ApprovalStatus::Rejected);
        assert_eq!(decide("buy ads now", &from_admin), ApprovalStatus::Rejected);
    }
}
