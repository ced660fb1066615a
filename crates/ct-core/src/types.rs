//! Core type definitions for CalmTube
//!
//! These types are shared by the settings record, the region catalog and
//! the runtime controllers. Their serialized names are part of the
//! persisted settings format.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// Feature Ids
// =============================================================================

/// A distraction type that can be blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum FeatureId {
    /// Short-form video shelves, items and navigation entries
    HideShorts = 0,
    /// Home feed, replaced by the custom overlay
    HideHomeFeed = 1,
    /// End-of-video suggestion wall and end cards
    HideEndCards = 2,
    /// Comment section
    HideComments = 3,
    /// Related-video sidebar
    HideSidebar = 4,
    /// Injected shelves in search results
    SearchOnly = 5,
}

impl FeatureId {
    pub const COUNT: usize = 6;

    /// Every feature-id, in enumeration order.
    pub const ALL: [FeatureId; Self::COUNT] = [
        Self::HideShorts,
        Self::HideHomeFeed,
        Self::HideEndCards,
        Self::HideComments,
        Self::HideSidebar,
        Self::SearchOnly,
    ];

    /// Wire name used in settings and in hidden-node markers.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HideShorts => "hideShorts",
            Self::HideHomeFeed => "hideHomeFeed",
            Self::HideEndCards => "hideEndCards",
            Self::HideComments => "hideComments",
            Self::HideSidebar => "hideSidebar",
            Self::SearchOnly => "searchOnly",
        }
    }

    /// Parse a wire name. Returns None for anything outside the closed set.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == name)
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureId {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownName(s.to_string()))
    }
}

// =============================================================================
// Page Categories
// =============================================================================

/// Logical page type of the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum PageCategory {
    Home = 0,
    Watch = 1,
    Search = 2,
    Feed = 3,
    /// Catch-all; no feature is available here
    Other = 4,
}

impl PageCategory {
    pub const ALL: [PageCategory; 5] = [
        Self::Home,
        Self::Watch,
        Self::Search,
        Self::Feed,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Watch => "watch",
            Self::Search => "search",
            Self::Feed => "feed",
            Self::Other => "other",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// Single-bit mask for this category.
    #[inline]
    pub fn mask(self) -> CategoryMask {
        CategoryMask::from_bits_truncate(1 << self as u8)
    }
}

impl fmt::Display for PageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageCategory {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownName(s.to_string()))
    }
}

/// Name outside a closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown name: {0}")]
pub struct UnknownName(pub String);

// =============================================================================
// Category Masks
// =============================================================================

bitflags::bitflags! {
    /// Set of page categories a feature applies to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CategoryMask: u8 {
        const HOME = 1 << 0;
        const WATCH = 1 << 1;
        const SEARCH = 1 << 2;
        const FEED = 1 << 3;
        const OTHER = 1 << 4;

        /// Pages that list videos
        const LISTINGS = Self::HOME.bits() | Self::SEARCH.bits() | Self::FEED.bits();
    }
}

impl CategoryMask {
    #[inline]
    pub fn includes(self, category: PageCategory) -> bool {
        self.contains(category.mask())
    }
}
