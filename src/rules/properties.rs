use std::collections::HashSet;

use crate::error::{AdxError, Result};
use crate::model::Properties;
use crate::rules::Findings;

pub fn validate(properties: Option<&Properties>, findings: &mut Findings) -> Result<()> {
    let Some(properties) = properties.filter(|p| !p.is_empty()) else {
        findings.warning("No properties defined");
        return Ok(());
    };

    let mut ids = HashSet::new();
    for property in properties.iter() {
        if !ids.insert(property.id.as_str()) {
            return Err(AdxError::Rule(format!(
                "Duplicate property id `{}`",
                property.id
            )));
        }
    }

    findings.success("Properties validated");
    Ok(())
}
