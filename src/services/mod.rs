pub mod authz;
pub mod models;

pub use authz::{build_group_set, can_view_service, filter_catalog};
pub use models::{Section, ServiceEntry};

use crate::config::{CatalogConfig, CatalogSource};

/// Reasons a configured catalog is refused at startup
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("section #{index} has an empty name")]
    EmptySectionName { index: usize },
    #[error("service #{index} in section '{section}' has an empty title")]
    EmptyServiceTitle { section: String, index: usize },
    #[error("service '{title}' in section '{section}' has an invalid url '{url}'")]
    InvalidServiceUrl { section: String, title: String, url: String },
}

/// Check names, titles and absolute http(s) URLs.
pub fn validate_catalog(catalog: &[Section]) -> Result<(), CatalogError> {
    for (index, section) in catalog.iter().enumerate() {
        if section.name.trim().is_empty() {
            return Err(CatalogError::EmptySectionName { index });
        }

        for (index, service) in section.services.iter().enumerate() {
            if service.title.trim().is_empty() {
                return Err(CatalogError::EmptyServiceTitle {
                    section: section.name.clone(),
                    index,
                });
            }

            let valid_url = url::Url::parse(&service.url)
                .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
                .unwrap_or(false);
            if !valid_url {
                return Err(CatalogError::InvalidServiceUrl {
                    section: section.name.clone(),
                    title: service.title.clone(),
                    url: service.url.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Load and validate the service catalog from the configured source
///
/// Never logs the raw catalog JSON, only a summary.
pub fn load_catalog(config: &CatalogConfig) -> anyhow::Result<Vec<Section>> {
    let (catalog, source): (Vec<Section>, &str) = match &config.source {
        Some(CatalogSource::Json(json)) => (
            serde_json::from_str(json)
                .map_err(|e| anyhow::anyhow!("Invalid SERVICES_CONFIG JSON: {}", e))?,
            "env-json",
        ),
        Some(CatalogSource::File(path)) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Failed to read catalog file {}: {}", path, e))?;
            (
                serde_json::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("Invalid catalog file {}: {}", path, e))?,
                "file-path",
            )
        }
        None => {
            tracing::warn!("No service catalog configured; users will see no services");
            (Vec::new(), "none")
        }
    };

    if let Err(error) = validate_catalog(&catalog) {
        tracing::error!(
            source = %source,
            error = %error,
            "Catalog validation failed"
        );
        return Err(anyhow::anyhow!(
            "Catalog validation failed ({}): {}",
            source,
            error
        ));
    }

    let total_services: usize = catalog.iter().map(|s| s.services.len()).sum();
    let restricted_services = catalog
        .iter()
        .flat_map(|s| s.services.iter())
        .filter(|svc| !svc.required_groups.is_empty())
        .count();
    tracing::info!(
        source = %source,
        sections = catalog.len(),
        total_services = total_services,
        restricted_services = restricted_services,
        "Service catalog loaded"
    );

    Ok(catalog)
}
