//! Navigation item model

use serde::{Deserialize, Serialize};

use super::deserialize_some;

/// Navigation item model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavItem {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub label: String,
    /// Relative path (`/blog`) or absolute URL
    pub url: String,
    pub sort_order: i32,
    pub open_new_tab: bool,
    pub visible: bool,
}

impl NavItem {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: 0,
            parent_id: None,
            label: label.into(),
            url: url.into(),
            sort_order: 0,
            open_new_tab: false,
            visible: true,
        }
    }
}

/// Navigation item with children (tree structure)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavItemTree {
    #[serde(flatten)]
    pub item: NavItem,
    pub children: Vec<NavItemTree>,
}

impl NavItemTree {
    pub fn new(item: NavItem) -> Self {
        Self {
            item,
            children: Vec::new(),
        }
    }
}

/// Input for creating a nav item
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNavItemInput {
    #[serde(default)]
    pub parent_id: Option<i64>,
    pub label: String,
    pub url: String,
    #[serde(default)]
    pub open_new_tab: bool,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

/// Input for updating a nav item
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNavItemInput {
    /// `null` moves the item to the top level
    #[serde(default, deserialize_with = "deserialize_some")]
    pub parent_id: Option<Option<i64>>,
    pub label: Option<String>,
    pub url: Option<String>,
    pub open_new_tab: Option<bool>,
    pub sort_order: Option<i32>,
    pub visible: Option<bool>,
}

/// Input for batch updating nav items order
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateNavOrderInput {
    pub items: Vec<NavOrderItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NavOrderItem {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub sort_order: i32,
}
