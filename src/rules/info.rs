use crate::configurator::Configurator;
use crate::error::{AdxError, Result};
use crate::rules::Findings;
use crate::schema::{DEFAULT_VERSION, version_at_least};

/// Version from which `info/style` and `info/categories` are deprecated
pub const DEPRECATION_VERSION: &str = "2.1.0";

pub fn validate(config: &Configurator, findings: &mut Findings) -> Result<()> {
    let info = config.info();
    let has_name = info
        .name
        .as_deref()
        .is_some_and(|name| !name.trim().is_empty());
    if !has_name {
        return Err(AdxError::Rule(
            "Missing or empty `info/name` node".to_string(),
        ));
    }

    let version = config.project_version().unwrap_or(DEFAULT_VERSION);
    if version_at_least(version, DEPRECATION_VERSION) {
        if info.style.is_some() {
            findings.warning(format!(
                "`info/style` is deprecated since ADX {}",
                DEPRECATION_VERSION
            ));
        }
        if info.categories.is_some() {
            findings.warning(format!(
                "`info/categories` is deprecated since ADX {}",
                DEPRECATION_VERSION
            ));
        }
    }

    findings.success("Info validated");
    Ok(())
}
