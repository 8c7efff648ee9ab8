//! Category filter picker for project discovery.
//!
//! - [`category`] - Catalog records and canonical root grouping
//! - [`rows`] - Filters, row types and the payloads handed to the view
//! - [`model`] - [`CategoryTreeModel`], the expansion and selection state

pub mod category;
pub mod model;
pub mod rows;

pub use category::{flatten_groups, group_categories, Category, CategoryGroup};
pub use model::{CategoryTreeModel, FiltersError};
pub use rows::{
    CategoryRowsLoad, DiscoveryFilter, ExpandableRow, FavoriteRowsLoad, FiltersSnapshot,
    SelectableRow, TopRowFlags, TopRowsLoad,
};
