use serde::Serialize;

use super::category::Category;
use crate::config::DiscoveryConfig;

/// A discovery filter the user can pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "category", rename_all = "snake_case")]
pub enum DiscoveryFilter {
    AllProjects,
    StaffPicks,
    Starred,
    Recommended,
    Social,
    Category(Category),
}

impl DiscoveryFilter {
    /// Same filter. Categories compare by id only, so an embedded copy without
    /// counts still matches its catalog record.
    pub fn matches(&self, other: &DiscoveryFilter) -> bool {
        match (self, other) {
            (DiscoveryFilter::Category(a), DiscoveryFilter::Category(b)) => a.id == b.id,
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }

    pub fn category(&self) -> Option<&Category> {
        match self {
            DiscoveryFilter::Category(c) => Some(c),
            _ => None,
        }
    }

    pub fn category_id(&self) -> Option<u64> {
        self.category().map(|c| c.id)
    }

    /// Root category owning this filter, if it is a category filter.
    pub fn root_id(&self) -> Option<u64> {
        self.category().map(Category::root_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectableRow {
    pub filter: DiscoveryFilter,
    pub is_selected: bool,
}

impl SelectableRow {
    pub fn new(filter: DiscoveryFilter, selected: &DiscoveryFilter) -> Self {
        let is_selected = filter.matches(selected);
        Self {
            filter,
            is_selected,
        }
    }
}

/// A root category with its selectable rows: the root itself, then its
/// subcategories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpandableRow {
    pub category: Category,
    pub is_expanded: bool,
    pub rows: Vec<SelectableRow>,
}

/// Which optional shortcut rows to show above the categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopRowFlags {
    pub starred: bool,
    pub recommended: bool,
    pub social: bool,
}

impl TopRowFlags {
    /// Everything a signed-in user with social connections sees.
    pub fn all() -> Self {
        Self {
            starred: true,
            recommended: true,
            social: true,
        }
    }

    /// Filters shown, in display order.
    pub fn filters(self) -> Vec<DiscoveryFilter> {
        let mut filters = vec![DiscoveryFilter::AllProjects, DiscoveryFilter::StaffPicks];
        if self.starred {
            filters.push(DiscoveryFilter::Starred);
        }
        if self.recommended {
            filters.push(DiscoveryFilter::Recommended);
        }
        if self.social {
            filters.push(DiscoveryFilter::Social);
        }
        filters
    }
}

impl From<&DiscoveryConfig> for TopRowFlags {
    fn from(config: &DiscoveryConfig) -> Self {
        Self {
            starred: config.show_starred,
            recommended: config.show_recommended,
            social: config.show_social,
        }
    }
}

// ============================================================================
// Load Payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRowsLoad {
    pub rows: Vec<ExpandableRow>,
    /// Root to scroll to on first display.
    pub initial_root_id: Option<u64>,
    /// Root the view keeps in place while rows expand or collapse.
    pub anchor_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopRowsLoad {
    pub rows: Vec<SelectableRow>,
    pub initial_root_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FavoriteRowsLoad {
    pub rows: Vec<SelectableRow>,
    pub initial_root_id: Option<u64>,
}

/// Everything the filter screen draws after activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FiltersSnapshot {
    /// Root to animate the screen in at.
    pub animate_in: Option<u64>,
    pub top: TopRowsLoad,
    pub categories: CategoryRowsLoad,
    /// Absent when the user has no favorites.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorites: Option<FavoriteRowsLoad>,
}
