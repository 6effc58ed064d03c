//! Keyword-driven hashtag selection

use crate::branding::BrandingProfile;

/// At most this many tags come from the brand table
pub const MAX_BRAND_HASHTAGS: usize = 3;
/// Overall cap across both tables
pub const MAX_HASHTAGS: usize = 5;

/// Brand-neutral keyword table, matched as lower-case substrings
const GENERIC_HASHTAGS: &[(&str, &str)] = &[
    ("cfo", "#CFO"),
    ("ceo", "#CEO"),
    ("cto", "#CTO"),
    ("financ", "#Finance"),
    ("leadership", "#Leadership"),
    ("recruit", "#Recruitment"),
    ("hiring", "#Hiring"),
    ("career", "#Careers"),
    ("strategy", "#Strategy"),
    ("technology", "#Technology"),
    ("innovation", "#Innovation"),
    ("sustainab", "#Sustainability"),
];

/// Pick hashtags for a post from its title and body.
///
/// Falls back to the profile's default pair when nothing matches.
pub fn generate_hashtags(title: &str, body: &str, profile: &BrandingProfile) -> Vec<String> {
    let haystack = format!("{} {}", title, body).to_lowercase();
    let mut tags: Vec<String> = Vec::new();

    let brand = profile
        .keyword_hashtags
        .iter()
        .map(|entry| (entry.keyword.as_str(), entry.hashtag.as_str()));
    push_matches(&mut tags, &haystack, brand, MAX_BRAND_HASHTAGS);

    push_matches(
        &mut tags,
        &haystack,
        GENERIC_HASHTAGS.iter().copied(),
        MAX_HASHTAGS,
    );

    if tags.is_empty() {
        return profile.default_hashtags.clone();
    }
    tags
}

fn push_matches<'a>(
    tags: &mut Vec<String>,
    haystack: &str,
    table: impl Iterator<Item = (&'a str, &'a str)>,
    cap: usize,
) {
    for (keyword, hashtag) in table {
        if tags.len() >= cap {
            break;
        }
        if !haystack.contains(&keyword.to_lowercase()) {
            continue;
        }
        if tags.iter().any(|t| t.eq_ignore_ascii_case(hashtag)) {
            continue;
        }
        tags.push(hashtag.to_string());
    }
}
