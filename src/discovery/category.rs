use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A project category as delivered by the catalog API.
///
/// Subcategories embed their parent. Embedded parents may lack
/// `projects_count`; only the standalone record of a root carries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<Category>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects_count: Option<u32>,
}

impl Category {
    pub fn root(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent: None,
            projects_count: None,
        }
    }

    pub fn child_of(parent: &Category, id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent: Some(Box::new(parent.clone())),
            projects_count: None,
        }
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.projects_count = Some(count);
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// The top-level ancestor.
    pub fn root_category(&self) -> &Category {
        let mut current = self;
        while let Some(parent) = &current.parent {
            current = parent;
        }
        current
    }

    pub fn root_id(&self) -> u64 {
        self.root_category().id
    }

    /// Key that puts every root before its own subcategories and orders
    /// groups by root id.
    fn sort_key(&self) -> (u64, bool, u64) {
        (self.root_id(), !self.is_root(), self.id)
    }
}

// ============================================================================
// Grouping
// ============================================================================

/// A root category and its subcategories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryGroup {
    pub root: Category,
    pub children: Vec<Category>,
}

/// Groups a flat catalog into roots and subcategories.
///
/// Groups come out in ascending root id regardless of input order, and each
/// root is the standalone record when the catalog has one. A root known only
/// as an embedded parent still gets a group.
pub fn group_categories(categories: &[Category]) -> Vec<CategoryGroup> {
    let mut sorted: Vec<&Category> = categories.iter().collect();
    sorted.sort_by_key(|c| c.sort_key());

    let mut groups: BTreeMap<u64, CategoryGroup> = BTreeMap::new();
    for category in sorted {
        let root_id = category.root_id();

        if category.is_root() {
            match groups.get_mut(&root_id) {
                // Larger count wins, then the greater name
                Some(group)
                    if (category.projects_count, &category.name)
                        > (group.root.projects_count, &group.root.name) =>
                {
                    group.root = category.clone();
                }
                Some(_) => {
                    tracing::debug!(category_id = category.id, "Duplicate root category skipped");
                }
                None => {
                    groups.insert(
                        root_id,
                        CategoryGroup {
                            root: category.clone(),
                            children: Vec::new(),
                        },
                    );
                }
            }
            continue;
        }

        let group = groups.entry(root_id).or_insert_with(|| CategoryGroup {
            root: category.root_category().clone(),
            children: Vec::new(),
        });
        if group.children.iter().all(|c| c.id != category.id) {
            group.children.push(category.clone());
        }
    }

    groups.into_values().collect()
}

/// Every distinct category of the grouped catalog in display order.
pub fn flatten_groups(groups: &[CategoryGroup]) -> impl Iterator<Item = &Category> {
    groups
        .iter()
        .flat_map(|g| std::iter::once(&g.root).chain(g.children.iter()))
}
