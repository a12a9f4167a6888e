//! Group-based visibility for the service catalog
//!
//! This module is the single place that decides which configured services a
//! viewer may see. It is pure: no I/O, no caching. Group membership can
//! change between requests, so callers recompute per request.

use std::collections::HashSet;

use super::models::Section;

/// Check if a viewer can see a service
///
/// - empty `required_groups`: visible to every authenticated viewer
/// - otherwise: visible iff the viewer holds at least one of them
pub fn can_view_service(user_groups: &HashSet<&str>, required_groups: &[String]) -> bool {
    required_groups.is_empty() || required_groups.iter().any(|g| user_groups.contains(g.as_str()))
}

/// Build a HashSet of groups for efficient lookups
///
/// Precompute once per request, then pass to `can_view_service` for each service.
pub fn build_group_set<'a, I, S>(groups: I) -> HashSet<&'a str>
where
    I: IntoIterator<Item = &'a S>,
    S: AsRef<str> + ?Sized + 'a,
{
    groups.into_iter().map(|g| g.as_ref()).collect()
}

/// Compute the visible catalog for a viewer.
///
/// Services keep their configured order, sections with nothing visible are
/// dropped.
pub fn filter_catalog(catalog: &[Section], user_groups: &HashSet<&str>) -> Vec<Section> {
    catalog
        .iter()
        .filter_map(|section| {
            let services: Vec<_> = section
                .services
                .iter()
                .filter(|service| service.is_visible_to_group_set(user_groups))
                .cloned()
                .collect();

            if services.is_empty() {
                None
            } else {
                Some(Section {
                    name: section.name.clone(),
                    icon: section.icon.clone(),
                    description: section.description.clone(),
                    services,
                })
            }
        })
        .collect()
}
