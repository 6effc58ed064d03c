//! Branding profiles used when composing social posts

use serde::{Deserialize, Serialize};

/// A keyword and the hashtag it triggers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeywordHashtag {
    pub keyword: String,
    pub hashtag: String,
}

impl KeywordHashtag {
    pub fn new(keyword: &str, hashtag: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            hashtag: hashtag.to_string(),
        }
    }
}

/// Per-brand text and hashtag settings
///
/// `keyword_hashtags` is checked before the generic table and in the
/// order given here, so put the most specific keywords first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrandingProfile {
    pub name: String,
    pub site_url: String,
    pub call_to_action: String,
    pub default_hashtags: Vec<String>,
    #[serde(default)]
    pub keyword_hashtags: Vec<KeywordHashtag>,
}

impl BrandingProfile {
    /// Built-in profile for Haidrun executive search
    pub fn haidrun() -> Self {
        Self {
            name: "Haidrun".to_string(),
            site_url: "https://haidrun.com".to_string(),
            call_to_action: "Read more on haidrun.com".to_string(),
            default_hashtags: vec!["#Haidrun".to_string(), "#ExecutiveSearch".to_string()],
            keyword_hashtags: vec![
                KeywordHashtag::new("leadership", "#HaidrunLeadership"),
                KeywordHashtag::new("appointment", "#HaidrunAppointments"),
                KeywordHashtag::new("executive", "#HaidrunExecutives"),
                KeywordHashtag::new("board", "#HaidrunBoard"),
                KeywordHashtag::new("insight", "#HaidrunInsights"),
                KeywordHashtag::new("talent", "#HaidrunTalent"),
            ],
        }
    }

    /// `site_url` without a trailing slash
    pub fn base_url(&self) -> &str {
        self.site_url.trim_end_matches('/')
    }
}

impl Default for BrandingProfile {
    fn default() -> Self {
        Self::haidrun()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haidrun_profile_has_default_pair() {
        let profile = BrandingProfile::haidrun();
        assert_eq!(profile.default_hashtags, vec!["#Haidrun", "#ExecutiveSearch"]);
        assert_eq!(profile.keyword_hashtags[0].hashtag, "#HaidrunLeadership");
    }

    #[test]
    fn test_profile_from_toml_without_keywords() {
        let profile: BrandingProfile = toml::from_str(
            r##"
            name = "Acme"
            site_url = "https://acme.test/"
            call_to_action = "Visit acme.test"
            default_hashtags = ["#Acme", "#News"]
            "##,
        )
        .unwrap();

        assert!(profile.keyword_hashtags.is_empty());
        assert_eq!(profile.base_url(), "https://acme.test");
    }
}
