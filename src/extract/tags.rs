use crate::models::Location;

pub const MAX_TAGS: usize = 5;

// Domain terms matched case-insensitively against title + description.
const PRIMARY_KEYWORDS: [&str; 20] = [
    "NFT",
    "Crypto",
    "Web3",
    "Conference",
    "Blockchain",
    "DeFi",
    "Hackathon",
    "Meetup",
    "Workshop",
    "Summit",
    "DAO",
    "Metaverse",
    "Gaming",
    "Startup",
    "Networking",
    "Developer",
    "Fintech",
    "Music",
    "Design",
    "Community",
];

// Terms whose exact casing matters (tickers and CamelCase coinages); matched
// case-sensitively against the raw text. Overlaps with the list above so the
// canonical form wins when both would hit.
const EXACT_KEYWORDS: [&str; 12] = [
    "GameFi", "SocialFi", "DePIN", "RWA", "ETH", "BTC", "Solana", "Ethereum", "Bitcoin", "DeFi",
    "DAO", "NFT",
];

/// Builds the tag list from the already-extracted fields. Steps append in
/// order, duplicates are rejected on insertion (case-sensitive), and the
/// 5-tag cap is applied once at the very end.
pub fn synthesize_tags(
    title: &str,
    description: &str,
    category: &str,
    location: &Location,
) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();

    if !category.is_empty() {
        push_unique(&mut tags, category);
    }

    let haystack = format!("{title} {description}").to_lowercase();
    for keyword in PRIMARY_KEYWORDS {
        if haystack.contains(&keyword.to_lowercase()) {
            push_unique(&mut tags, keyword);
        }
    }

    let city = location.city();
    if !city.is_empty() {
        push_unique(&mut tags, city);
    }

    let raw = format!("{title} {description}");
    for keyword in EXACT_KEYWORDS {
        if raw.contains(keyword) {
            push_unique(&mut tags, keyword);
        }
    }

    if location.name().contains("Taipei") {
        push_unique(&mut tags, "Taipei");
    }

    // Unreachable when category is non-empty (the first step already added
    // it); kept so the step sequence reads the same as it runs.
    if tags.is_empty() && !category.is_empty() {
        push_unique(&mut tags, category);
    }

    if tags.is_empty() {
        for word in title.split_whitespace() {
            if word.chars().count() > 3 {
                push_unique(&mut tags, word);
            }
        }
    }

    tags.truncate(MAX_TAGS);
    tags
}

fn push_unique(tags: &mut Vec<String>, tag: impl Into<String>) {
    let tag = tag.into();
    if !tags.iter().any(|existing| existing == &tag) {
        tags.push(tag);
    }
}
