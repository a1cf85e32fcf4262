//! Coarse genre categories and the raw tags each one covers.
//!
//! The catalog stores whatever genre strings uploaders typed, so browsing by
//! category is a client-side match against a small alias table.

use crate::model::Track;

/// Category id → raw tag aliases.
const GENRE_ALIASES: &[(&str, &[&str])] = &[
    ("pop", &["Pop", "K-Pop", "J-Pop", "Pop Rock"]),
    (
        "rock",
        &["Rock", "Hard Rock", "Soft Rock", "Alternative Rock", "Indie Rock"],
    ),
    ("hiphop", &["Hip-Hop", "Hip Hop", "Rap", "Trap"]),
    (
        "edm",
        &["EDM", "Electronic", "Dance", "House", "Techno", "Dubstep"],
    ),
    ("jazz", &["Jazz", "Smooth Jazz", "Jazz Fusion"]),
    ("classical", &["Classical", "Orchestra", "Symphony"]),
    ("indie", &["Indie", "Indie Rock", "Indie Pop", "Alternative"]),
    ("rnb", &["R&B", "RnB", "Soul", "Neo-Soul"]),
];

/// Known category ids, in display order.
pub fn categories() -> impl Iterator<Item = &'static str> {
    GENRE_ALIASES.iter().map(|(id, _)| *id)
}

/// Normalized aliases for `category`.  Unknown categories alias to themselves.
pub fn aliases_for(category: &str) -> Vec<String> {
    let key = normalize(category);
    match GENRE_ALIASES.iter().find(|(id, _)| *id == key) {
        Some((_, aliases)) => aliases.iter().map(|a| normalize(a)).collect(),
        None if key.is_empty() => Vec::new(),
        None => vec![key],
    }
}

fn normalize(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// A raw tag matches an alias when either one contains the other
/// ("deep house" matches "house", "indie" matches "indie rock").
pub fn tag_matches(tag: &str, aliases: &[String]) -> bool {
    let tag = normalize(tag);
    if tag.is_empty() {
        return false;
    }
    aliases
        .iter()
        .any(|alias| tag.contains(alias.as_str()) || alias.contains(tag.as_str()))
}

/// Keep the tracks with at least one tag in `category`.  No matches means an
/// empty result, never the unfiltered list.
pub fn filter_by_category(tracks: Vec<Track>, category: &str) -> Vec<Track> {
    let aliases = aliases_for(category);
    if aliases.is_empty() {
        return Vec::new();
    }
    tracks
        .into_iter()
        .filter(|t| t.genres.iter().any(|g| tag_matches(g, &aliases)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DEFAULT_ALBUM, PLACEHOLDER_COVER};

    fn song(id: &str, genres: &[&str]) -> Track {
        Track {
            id: id.into(),
            title: id.into(),
            artist: "x".into(),
            album: DEFAULT_ALBUM.into(),
            cover_url: PLACEHOLDER_COVER.into(),
            stream_url: None,
            duration_secs: None,
            genres: genres.iter().map(|g| g.to_string()).collect(),
        }
    }

    #[test]
    fn test_edm_selects_edm_and_house_only() {
        let tracks = vec![song("s1", &["EDM"]), song("s2", &["House"]), song("s3", &["Pop"])];
        let ids: Vec<_> = filter_by_category(tracks, "edm")
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[test]
    fn test_matching_is_case_and_space_insensitive() {
        let aliases = aliases_for("  EDM ");
        assert!(tag_matches("  techno", &aliases));
        assert!(tag_matches("Deep House", &aliases));
        assert!(!tag_matches("", &aliases));
        assert!(!tag_matches("Folk", &aliases));
    }

    #[test]
    fn test_broad_tag_matches_narrower_alias() {
        let tracks = vec![song("s1", &["Indie"]), song("s2", &["Metal"])];
        let ids: Vec<_> = filter_by_category(tracks, "rock")
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["s1"]);
        assert!(tag_matches("Jazz", &aliases_for("jazz")));
        assert!(!tag_matches("Rap", &aliases_for("rock")));
    }

    #[test]
    fn test_no_match_is_empty_not_fallback() {
        let tracks = vec![song("s1", &["Pop"]), song("s2", &[])];
        assert!(filter_by_category(tracks, "jazz").is_empty());
    }

    #[test]
    fn test_unknown_category_aliases_itself() {
        assert_eq!(aliases_for("Lo-Fi"), vec!["lo-fi"]);
        let tracks = vec![song("s1", &["lo-fi beats"]), song("s2", &["Rock"])];
        assert_eq!(filter_by_category(tracks, "lo-fi").len(), 1);
    }

    #[test]
    fn test_categories_listed() {
        assert_eq!(categories().count(), 8);
        assert!(categories().any(|c| c == "rnb"));
    }
}
