//! Region catalog
//!
//! Static mapping from feature-id to the structural queries that locate its
//! regions on the host page, plus the page categories each feature applies
//! to. Selectors are the only coupling to the host markup and need manual
//! updates when the host page is redesigned.

use crate::types::{CategoryMask, FeatureId, PageCategory};

// =============================================================================
// Catalog Types
// =============================================================================

/// Role of a selector group within a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionRole {
    /// Outer wrapper of the region
    Container,
    /// Related sub-regions hidden together with the container
    Part,
    /// Individual entries scattered through listings
    Item,
}

/// A group of selectors sharing a role.
#[derive(Debug, Clone, Copy)]
pub struct RegionGroup {
    pub role: RegionRole,
    pub selectors: &'static [&'static str],
}

/// Catalog entry for one feature.
#[derive(Debug, Clone, Copy)]
pub struct RegionSpec {
    pub feature: FeatureId,
    pub groups: &'static [RegionGroup],
    /// Page categories on which the feature is applicable
    pub available_on: CategoryMask,
}

impl RegionSpec {
    /// Flattened selectors, in group order.
    pub fn selectors(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.groups.iter().flat_map(|group| group.selectors.iter().copied())
    }

    /// Features without selectors only record state (the overlay feature).
    pub fn is_degenerate(&self) -> bool {
        self.groups.iter().all(|group| group.selectors.is_empty())
    }
}

// =============================================================================
// Catalog Table
// =============================================================================

const SHORTS: RegionSpec = RegionSpec {
    feature: FeatureId::HideShorts,
    groups: &[
        RegionGroup {
            role: RegionRole::Container,
            selectors: &[
                "ytd-reel-shelf-renderer",
                "ytd-rich-shelf-renderer[is-shorts]",
                "ytd-rich-section-renderer:has(ytd-rich-shelf-renderer[is-shorts])",
            ],
        },
        RegionGroup {
            role: RegionRole::Part,
            selectors: &[
                "ytd-guide-entry-renderer:has(a[title=\"Shorts\"])",
                "ytd-mini-guide-entry-renderer[aria-label=\"Shorts\"]",
                "yt-chip-cloud-chip-renderer:has(a[href^=\"/shorts\"])",
            ],
        },
        RegionGroup {
            role: RegionRole::Item,
            selectors: &[
                "ytd-video-renderer:has(a[href^=\"/shorts/\"])",
                "ytd-grid-video-renderer:has(a[href^=\"/shorts/\"])",
                "ytd-rich-item-renderer:has(a[href^=\"/shorts/\"])",
            ],
        },
    ],
    available_on: CategoryMask::LISTINGS.union(CategoryMask::WATCH),
};

// Replaced by the overlay; no regions of its own.
const HOME_FEED: RegionSpec = RegionSpec {
    feature: FeatureId::HideHomeFeed,
    groups: &[],
    available_on: CategoryMask::HOME,
};

const END_CARDS: RegionSpec = RegionSpec {
    feature: FeatureId::HideEndCards,
    groups: &[
        RegionGroup {
            role: RegionRole::Container,
            selectors: &[".ytp-endscreen-content", ".videowall-endscreen"],
        },
        RegionGroup {
            role: RegionRole::Item,
            selectors: &[".ytp-ce-element", ".ytp-ce-video", ".ytp-ce-channel"],
        },
    ],
    available_on: CategoryMask::WATCH,
};

const COMMENTS: RegionSpec = RegionSpec {
    feature: FeatureId::HideComments,
    groups: &[RegionGroup {
        role: RegionRole::Container,
        selectors: &["ytd-comments#comments", "#comments"],
    }],
    available_on: CategoryMask::WATCH,
};

const SIDEBAR: RegionSpec = RegionSpec {
    feature: FeatureId::HideSidebar,
    groups: &[
        RegionGroup {
            role: RegionRole::Container,
            selectors: &["#secondary", "#related"],
        },
        RegionGroup {
            role: RegionRole::Part,
            selectors: &["ytd-watch-next-secondary-results-renderer"],
        },
    ],
    available_on: CategoryMask::WATCH,
};

const SEARCH_ONLY: RegionSpec = RegionSpec {
    feature: FeatureId::SearchOnly,
    groups: &[
        RegionGroup {
            role: RegionRole::Container,
            selectors: &[
                "ytd-search ytd-shelf-renderer",
                "ytd-search ytd-horizontal-card-list-renderer",
            ],
        },
        RegionGroup {
            role: RegionRole::Item,
            selectors: &[
                "ytd-search ytd-search-pyv-renderer",
                "ytd-search ytd-ad-slot-renderer",
            ],
        },
    ],
    available_on: CategoryMask::SEARCH,
};

/// Catalog indexed by `FeatureId::index()`.
static CATALOG: [RegionSpec; FeatureId::COUNT] =
    [SHORTS, HOME_FEED, END_CARDS, COMMENTS, SIDEBAR, SEARCH_ONLY];

/// Host top-level containers hidden while the overlay is mounted.
pub const OVERLAY_HIDE_SELECTORS: &[&str] = &[
    "ytd-page-manager",
    "tp-yt-app-drawer#guide",
    "ytd-mini-guide-renderer",
];

/// Id of the stylesheet element carrying the overlay hide rules.
pub const OVERLAY_STYLE_ID: &str = "calmtube-overlay-hide";

// =============================================================================
// Lookups
// =============================================================================

/// Catalog entry for a feature.
#[inline]
pub fn spec_for(feature: FeatureId) -> &'static RegionSpec {
    &CATALOG[feature.index()]
}

/// All selectors for a feature, flattened in group order.
pub fn selectors_for(feature: FeatureId) -> Vec<&'static str> {
    spec_for(feature).selectors().collect()
}

/// Whether a feature applies to a page category.
#[inline]
pub fn is_available(feature: FeatureId, category: PageCategory) -> bool {
    spec_for(feature).available_on.includes(category)
}

/// The feature rendered as an overlay rather than hidden regions.
pub const OVERLAY_FEATURE: FeatureId = FeatureId::HideHomeFeed;

/// Render the overlay page-level hide rules as a stylesheet.
pub fn overlay_hide_css() -> String {
    let mut css = OVERLAY_HIDE_SELECTORS.join(",\n");
    css.push_str(" {\n  display: none !important;\n}\n");
    css
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_indexed_by_feature() {
        for feature in FeatureId::ALL {
            assert_eq!(spec_for(feature).feature, feature);
        }
    }

    #[test]
    fn test_availability_table() {
        assert!(is_available(FeatureId::HideSidebar, PageCategory::Watch));
        assert!(!is_available(FeatureId::HideSidebar, PageCategory::Home));
        assert!(is_available(FeatureId::HideShorts, PageCategory::Feed));
        assert!(is_available(FeatureId::HideShorts, PageCategory::Watch));
        assert!(is_available(FeatureId::HideHomeFeed, PageCategory::Home));
        assert!(is_available(FeatureId::SearchOnly, PageCategory::Search));
        assert!(!is_available(FeatureId::SearchOnly, PageCategory::Feed));
    }

    #[test]
    fn test_nothing_available_on_other() {
        for feature in FeatureId::ALL {
            assert!(!is_available(feature, PageCategory::Other), "{feature} on other");
        }
    }

    #[test]
    fn test_only_overlay_feature_is_degenerate() {
        for feature in FeatureId::ALL {
            assert_eq!(spec_for(feature).is_degenerate(), feature == OVERLAY_FEATURE);
        }
        assert!(selectors_for(OVERLAY_FEATURE).is_empty());
    }

    #[test]
    fn test_selectors_keep_group_order() {
        let selectors = selectors_for(FeatureId::HideSidebar);
        assert_eq!(
            selectors,
            vec!["#secondary", "#related", "ytd-watch-next-secondary-results-renderer"]
        );
    }

    #[test]
    fn test_overlay_css() {
        let css = overlay_hide_css();
        for selector in OVERLAY_HIDE_SELECTORS {
            assert!(css.contains(selector));
        }
        assert!(css.contains("display: none !important"));
    }
}
