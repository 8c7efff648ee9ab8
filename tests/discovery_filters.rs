//! Integration tests for the discovery filter picker: row projections,
//! expansion toggling, favorites and analytics.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

use crowdflow::analytics::RecordingTracker;
use crowdflow::discovery::{
    Category, CategoryTreeModel, DiscoveryFilter, ExpandableRow, SelectableRow, TopRowFlags,
};

fn art() -> Category {
    Category::root(1, "Art").with_count(1200)
}

fn illustration() -> Category {
    Category::child_of(&art(), 22, "Illustration")
}

fn film() -> Category {
    Category::root(11, "Film & Video").with_count(800)
}

fn documentary() -> Category {
    Category::child_of(&film(), 30, "Documentary")
}

fn catalog() -> Vec<Category> {
    vec![art(), illustration(), film(), documentary()]
}

fn row(category: Category, is_selected: bool) -> SelectableRow {
    SelectableRow {
        filter: DiscoveryFilter::Category(category),
        is_selected,
    }
}

fn shortcut(filter: DiscoveryFilter, is_selected: bool) -> SelectableRow {
    SelectableRow { filter, is_selected }
}

fn art_row(is_expanded: bool, art_selected: bool) -> ExpandableRow {
    ExpandableRow {
        category: art(),
        is_expanded,
        rows: vec![row(art(), art_selected), row(illustration(), false)],
    }
}

fn film_row(is_expanded: bool) -> ExpandableRow {
    ExpandableRow {
        category: film(),
        is_expanded,
        rows: vec![row(film(), false), row(documentary(), false)],
    }
}

fn model_with(
    flags: TopRowFlags,
    favorites: Vec<u64>,
) -> (CategoryTreeModel, Arc<RecordingTracker>) {
    let tracker = Arc::new(RecordingTracker::new());
    let model = CategoryTreeModel::new(flags, favorites, tracker.clone());
    (model, tracker)
}

fn model() -> (CategoryTreeModel, Arc<RecordingTracker>) {
    model_with(TopRowFlags::default(), Vec::new())
}

// ============================================================================
// Activation
// ============================================================================

#[test]
fn test_all_projects_loads_collapsed_tree() {
    let (mut model, _) = model();
    model.configure(DiscoveryFilter::AllProjects, &catalog());

    let snapshot = model.activate().unwrap();
    assert_eq!(snapshot.categories.rows, vec![art_row(false, false), film_row(false)]);
    assert_eq!(snapshot.categories.initial_root_id, None);
    assert_eq!(snapshot.categories.anchor_id, None);
    assert_eq!(snapshot.animate_in, None);
    assert_eq!(snapshot.favorites, None);
}

#[test]
fn test_configure_with_selected_category_expands_it() {
    let (mut model, _) = model();
    model.configure(DiscoveryFilter::Category(art()), &catalog());

    let snapshot = model.activate().unwrap();
    assert_eq!(snapshot.categories.rows, vec![art_row(true, true), film_row(false)]);
    assert_eq!(snapshot.categories.initial_root_id, Some(1));
    assert_eq!(snapshot.categories.anchor_id, Some(1));
    assert_eq!(model.expanded_root(), Some(1));
}

#[test]
fn test_selected_subcategory_expands_its_root() {
    let (mut model, _) = model();
    model.configure(DiscoveryFilter::Category(documentary()), &catalog());

    let snapshot = model.activate().unwrap();
    let film = &snapshot.categories.rows[1];
    assert!(film.is_expanded);
    assert_eq!(
        film.rows.iter().map(|r| r.is_selected).collect::<Vec<_>>(),
        vec![false, true]
    );
    assert_eq!(snapshot.animate_in, Some(11));
}

#[test]
fn test_animate_in_follows_selection_root() {
    let (mut model, _) = model();
    for (selected, expected) in [
        (DiscoveryFilter::AllProjects, None),
        (DiscoveryFilter::Category(art()), Some(1)),
        (DiscoveryFilter::Category(documentary()), Some(11)),
    ] {
        model.configure(selected, &catalog());
        assert_eq!(model.animate_in(), expected);
    }
}

// ============================================================================
// Top Rows
// ============================================================================

#[test]
fn test_top_rows_signed_out() {
    let (mut model, _) = model();
    model.configure(DiscoveryFilter::AllProjects, &catalog());

    let top = model.activate().unwrap().top;
    assert_eq!(
        top.rows,
        vec![
            shortcut(DiscoveryFilter::AllProjects, true),
            shortcut(DiscoveryFilter::StaffPicks, false),
        ]
    );
    assert_eq!(top.initial_root_id, None);
}

#[test]
fn test_top_rows_signed_in_with_social() {
    let (mut model, _) = model_with(TopRowFlags::all(), Vec::new());
    model.configure(DiscoveryFilter::AllProjects, &catalog());

    let top = model.activate().unwrap().top;
    assert_eq!(
        top.rows,
        vec![
            shortcut(DiscoveryFilter::AllProjects, true),
            shortcut(DiscoveryFilter::StaffPicks, false),
            shortcut(DiscoveryFilter::Starred, false),
            shortcut(DiscoveryFilter::Recommended, false),
            shortcut(DiscoveryFilter::Social, false),
        ]
    );
}

#[test]
fn test_top_rows_with_category_selected() {
    let (mut model, _) = model();
    model.configure(DiscoveryFilter::Category(art()), &catalog());

    let top = model.activate().unwrap().top;
    assert!(top.rows.iter().all(|r| !r.is_selected));
    assert_eq!(top.initial_root_id, Some(1));
}

// ============================================================================
// Expansion
// ============================================================================

#[test]
fn test_expanding_category_filters() {
    let (mut model, _) = model();
    model.configure(DiscoveryFilter::AllProjects, &catalog());
    model.activate().unwrap();

    let art_open = model.tap_expandable(1).unwrap();
    assert_eq!(art_open.rows, vec![art_row(true, false), film_row(false)]);

    let film_open = model.tap_expandable(11).unwrap();
    assert_eq!(film_open.rows, vec![art_row(false, false), film_row(true)]);

    let collapsed = model.tap_expandable(11).unwrap();
    assert_eq!(collapsed.rows, vec![art_row(false, false), film_row(false)]);

    assert_eq!(
        [&art_open, &film_open, &collapsed].map(|load| (load.initial_root_id, load.anchor_id)),
        [(None, Some(1)), (None, Some(11)), (None, Some(11))]
    );
}

#[test]
fn test_tapping_selectable_row_reports_it() {
    let (mut model, _) = model();
    model.configure(DiscoveryFilter::AllProjects, &catalog());
    model.activate().unwrap();

    let tapped = shortcut(DiscoveryFilter::AllProjects, true);
    assert_eq!(model.tap_selectable(&tapped), tapped);
    // Selection only changes on reconfigure
    assert_eq!(model.expanded_root(), None);
}

#[test]
fn test_analytics_events() {
    let (mut model, tracker) = model();
    model.configure(DiscoveryFilter::AllProjects, &catalog());
    model.activate().unwrap();
    assert_eq!(tracker.names(), vec!["Viewed Discovery Filters", "Discover Switch Modal"]);

    model.tap_expandable(11).unwrap();
    model.tap_selectable(&row(documentary(), false));

    assert_eq!(
        tracker.names(),
        vec![
            "Viewed Discovery Filters",
            "Discover Switch Modal",
            "Expanded Discovery Filter",
            "Selected Discovery Filter",
            "Discover Modal Selected Filter",
        ]
    );
    assert_eq!(
        tracker.property("discover_category_id"),
        vec![Value::Null, Value::Null, json!(11), json!(30), json!(30)]
    );
}

// ============================================================================
// Grouping and Favorites
// ============================================================================

#[test]
fn test_grouping_preserves_root_counts() {
    let uncounted_art = Category::root(1, "Art");
    let illustration_with_bare_parent = Category::child_of(&uncounted_art, 22, "Illustration");
    let catalog = vec![documentary(), film(), art(), illustration_with_bare_parent];

    let (mut model, _) = model();
    model.configure(DiscoveryFilter::AllProjects, &catalog);

    let counts: Vec<Option<u32>> = model
        .activate()
        .unwrap()
        .categories
        .rows
        .iter()
        .map(|r| r.category.projects_count)
        .collect();
    assert_eq!(counts, vec![Some(1200), Some(800)]);
}

#[test]
fn test_favorite_rows_without_favorites() {
    let (mut model, _) = model();
    model.configure(DiscoveryFilter::AllProjects, &catalog());
    assert_eq!(model.activate().unwrap().favorites, None);
}

#[test]
fn test_favorite_rows_with_favorites() {
    let (mut model, _) = model_with(TopRowFlags::default(), vec![30, 1]);
    model.configure(DiscoveryFilter::AllProjects, &catalog());

    let favorites = model.activate().unwrap().favorites.unwrap();
    assert_eq!(favorites.rows, vec![row(art(), false), row(documentary(), false)]);
    assert_eq!(favorites.initial_root_id, None);
}

#[test]
fn test_favorite_rows_with_favorite_selected() {
    let (mut model, _) = model_with(TopRowFlags::default(), vec![1, 30]);
    model.configure(DiscoveryFilter::Category(art()), &catalog());

    let favorites = model.activate().unwrap().favorites.unwrap();
    assert_eq!(favorites.rows, vec![row(art(), true), row(documentary(), false)]);
    assert_eq!(favorites.initial_root_id, Some(1));
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Row projections do not depend on catalog order.
    #[test]
    fn rows_are_permutation_invariant(shuffled in Just(catalog()).prop_shuffle()) {
        let (mut expected_model, _) = model();
        expected_model.configure(DiscoveryFilter::Category(illustration()), &catalog());
        let expected = expected_model.activate().unwrap();

        let (mut model, _) = model();
        model.configure(DiscoveryFilter::Category(illustration()), &shuffled);
        let snapshot = model.activate().unwrap();

        prop_assert_eq!(snapshot.categories.rows.len(), 2);
        prop_assert_eq!(snapshot, expected);
    }

    /// At most one row is expanded after any sequence of taps, and it is the
    /// one the model reports.
    #[test]
    fn single_row_expanded(taps in proptest::collection::vec(prop_oneof![Just(1u64), Just(11u64)], 0..12)) {
        let (mut model, _) = model();
        model.configure(DiscoveryFilter::AllProjects, &catalog());
        model.activate().unwrap();

        for root_id in taps {
            let load = model.tap_expandable(root_id).unwrap();
            let expanded: Vec<u64> = load
                .rows
                .iter()
                .filter(|r| r.is_expanded)
                .map(|r| r.category.id)
                .collect();
            prop_assert!(expanded.len() <= 1);
            prop_assert_eq!(expanded.first().copied(), model.expanded_root());
        }
    }
}
