use std::collections::HashSet;

use crate::error::{AdxError, Result};
use crate::model::{Info, is_truthy};
use crate::rules::Findings;

/// Attributes each `constraint[@on]` category accepts
pub fn allowed_attributes(on: &str) -> Option<&'static [&'static str]> {
    match on {
        "questions" => Some(&[
            "chapter",
            "single",
            "multiple",
            "numeric",
            "open",
            "date",
            "requireParentLoop",
            "requireLoopDepth",
        ]),
        "controls" => Some(&[
            "label",
            "textbox",
            "listbox",
            "checkbox",
            "radiobutton",
            "responseblock",
        ]),
        "responses" => Some(&["min", "max"]),
        _ => None,
    }
}

/// Categories that must appear exactly once
pub const REQUIRED_CATEGORIES: [&str; 2] = ["questions", "controls"];

pub fn validate(info: &Info, findings: &mut Findings) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::new();

    for constraint in &info.constraints {
        let on = constraint.on.as_str();
        let allowed = allowed_attributes(on).ok_or_else(|| {
            AdxError::Rule(format!("Invalid constraint `on` value `{}`", on))
        })?;

        if !seen.insert(on) {
            return Err(AdxError::Rule(format!(
                "Duplicate constraint on `{}`",
                on
            )));
        }

        if let Some(unknown) = constraint
            .attributes
            .keys()
            .find(|name| !allowed.contains(&name.as_str()))
        {
            return Err(AdxError::Rule(format!(
                "Constraint on `{}` has an unexpected attribute `{}`",
                on, unknown
            )));
        }

        if !constraint.attributes.values().any(|value| is_truthy(value)) {
            return Err(AdxError::Rule(format!(
                "Constraint on `{}` must enable at least one attribute",
                on
            )));
        }
    }

    for required in REQUIRED_CATEGORIES {
        if !seen.contains(required) {
            return Err(AdxError::Rule(format!(
                "Missing constraint on `{}`",
                required
            )));
        }
    }

    findings.success("Info constraints validated");
    Ok(())
}
