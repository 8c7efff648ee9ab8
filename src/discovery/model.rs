use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

use super::category::{flatten_groups, group_categories, Category, CategoryGroup};
use super::rows::{
    CategoryRowsLoad, DiscoveryFilter, ExpandableRow, FavoriteRowsLoad, FiltersSnapshot,
    SelectableRow, TopRowFlags, TopRowsLoad,
};
use crate::analytics::{properties, EventTracker, Properties};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FiltersError {
    #[error("Filters have not been configured")]
    NotConfigured,
    #[error("Filters have not been activated")]
    NotActivated,
    #[error("Unknown root category: {0}")]
    UnknownCategory(u64),
}

/// The filter picker: a two-level category tree with one expanded root at a
/// time, plus shortcut and favorite rows.
///
/// Selection is fixed at [`configure`](Self::configure) time. Tapping a row
/// only reports it; the host reconfigures with the new selection.
pub struct CategoryTreeModel {
    flags: TopRowFlags,
    favorite_ids: BTreeSet<u64>,
    tracker: Arc<dyn EventTracker>,
    selected: DiscoveryFilter,
    configured: bool,
    groups: Vec<CategoryGroup>,
    /// Root id of the one expanded row.
    expanded: Option<u64>,
    active: bool,
}

impl CategoryTreeModel {
    pub fn new(
        flags: TopRowFlags,
        favorite_ids: impl IntoIterator<Item = u64>,
        tracker: Arc<dyn EventTracker>,
    ) -> Self {
        Self {
            flags,
            favorite_ids: favorite_ids.into_iter().collect(),
            tracker,
            selected: DiscoveryFilter::AllProjects,
            configured: false,
            groups: Vec::new(),
            expanded: None,
            active: false,
        }
    }

    /// Stores the selection and catalog. Nothing is emitted until
    /// [`activate`](Self::activate).
    pub fn configure(&mut self, selected: DiscoveryFilter, categories: &[Category]) {
        self.groups = group_categories(categories);
        tracing::debug!(
            categories = categories.len(),
            roots = self.groups.len(),
            selected = ?selected.category_id(),
            "Filters configured"
        );
        self.selected = selected;
        self.configured = true;
        self.expanded = None;
        self.active = false;
    }

    /// Derives every row set. The root owning the selection starts expanded.
    pub fn activate(&mut self) -> Result<FiltersSnapshot, FiltersError> {
        if !self.configured {
            return Err(FiltersError::NotConfigured);
        }
        let initial_root_id = self
            .selected
            .root_id()
            .filter(|id| self.groups.iter().any(|g| g.root.id == *id));

        let props = filter_properties(&self.selected);
        self.tracker.track("Viewed Discovery Filters", props.clone());
        self.tracker.track("Discover Switch Modal", props);

        self.expanded = initial_root_id;
        self.active = true;

        Ok(FiltersSnapshot {
            animate_in: self.animate_in(),
            top: self.top_rows(initial_root_id),
            categories: self.category_rows(initial_root_id, initial_root_id),
            favorites: self.favorite_rows(initial_root_id),
        })
    }

    /// Root the screen animates in at: the selection's root, if any.
    pub fn animate_in(&self) -> Option<u64> {
        self.selected.root_id()
    }

    /// Toggles a root row. Any other expanded row collapses.
    pub fn tap_expandable(&mut self, root_id: u64) -> Result<CategoryRowsLoad, FiltersError> {
        if !self.active {
            return Err(FiltersError::NotActivated);
        }
        if !self.groups.iter().any(|g| g.root.id == root_id) {
            return Err(FiltersError::UnknownCategory(root_id));
        }

        self.expanded = if self.expanded == Some(root_id) {
            None
        } else {
            Some(root_id)
        };
        tracing::debug!(root_id, expanded = ?self.expanded, "Category row toggled");

        self.tracker.track(
            "Expanded Discovery Filter",
            properties([("discover_category_id", Value::from(root_id))]),
        );

        Ok(self.category_rows(None, Some(root_id)))
    }

    /// Reports the tapped row for the host to act on. Selection is unchanged.
    pub fn tap_selectable(&self, row: &SelectableRow) -> SelectableRow {
        let props = filter_properties(&row.filter);
        self.tracker.track("Selected Discovery Filter", props.clone());
        self.tracker.track("Discover Modal Selected Filter", props);
        row.clone()
    }

    pub fn expanded_root(&self) -> Option<u64> {
        self.expanded
    }

    /// Visual index of a root's row in the category list, where each group
    /// is preceded by one header row and an expanded root shows its rows.
    pub fn flattened_index(&self, root_id: u64) -> Option<usize> {
        let mut index = 0;
        for group in &self.groups {
            index += 1;
            if group.root.id == root_id {
                return Some(index);
            }
            index += 1;
            if self.expanded == Some(group.root.id) {
                index += 1 + group.children.len();
            }
        }
        None
    }

    // ========================================================================
    // Projections
    // ========================================================================

    fn top_rows(&self, initial_root_id: Option<u64>) -> TopRowsLoad {
        let selected = &self.selected;
        TopRowsLoad {
            rows: self
                .flags
                .filters()
                .into_iter()
                .map(|f| SelectableRow::new(f, selected))
                .collect(),
            initial_root_id,
        }
    }

    fn category_rows(&self, initial_root_id: Option<u64>, anchor_id: Option<u64>) -> CategoryRowsLoad {
        let selected = &self.selected;
        let rows = self
            .groups
            .iter()
            .map(|group| ExpandableRow {
                category: group.root.clone(),
                is_expanded: self.expanded == Some(group.root.id),
                rows: std::iter::once(&group.root)
                    .chain(group.children.iter())
                    .map(|c| SelectableRow::new(DiscoveryFilter::Category(c.clone()), selected))
                    .collect(),
            })
            .collect();

        CategoryRowsLoad {
            rows,
            initial_root_id,
            anchor_id,
        }
    }

    fn favorite_rows(&self, initial_root_id: Option<u64>) -> Option<FavoriteRowsLoad> {
        if self.favorite_ids.is_empty() {
            return None;
        }
        let selected = &self.selected;
        let rows = flatten_groups(&self.groups)
            .filter(|c| self.favorite_ids.contains(&c.id))
            .map(|c| SelectableRow::new(DiscoveryFilter::Category(c.clone()), selected))
            .collect();

        Some(FavoriteRowsLoad {
            rows,
            initial_root_id,
        })
    }
}

fn filter_properties(filter: &DiscoveryFilter) -> Properties {
    match filter.category_id() {
        Some(id) => properties([("discover_category_id", Value::from(id))]),
        None => Properties::new(),
    }
}
