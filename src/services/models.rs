use std::collections::HashSet;

use super::authz::can_view_service;
use serde::{Deserialize, Serialize};

/// A titled group of service links, as configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    /// Display name
    pub name: String,
    /// Icon class rendered next to the section header
    #[serde(default)]
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Services in display order
    #[serde(default)]
    pub services: Vec<ServiceEntry>,
}

/// A single service link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEntry {
    pub title: String,
    /// Browser-visible URL
    pub url: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Groups allowed to see this service. Empty means every authenticated user.
    #[serde(default, rename = "groups", alias = "requiredGroups")]
    pub required_groups: Vec<String>,
}

impl ServiceEntry {
    /// Check if a viewer with the given (precomputed) groups can see this service
    pub fn is_visible_to_group_set(&self, groups: &HashSet<&str>) -> bool {
        can_view_service(groups, &self.required_groups)
    }
}
