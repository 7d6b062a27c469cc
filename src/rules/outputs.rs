use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::configurator::Configurator;
use crate::error::{AdxError, Result};
use crate::model::{Content, Output, ProjectType};
use crate::resources::{DirResources, RESOURCES_DIR, ResourceMode};
use crate::rules::Findings;

pub const CONTENT_TYPES: [&str; 9] = [
    "text",
    "html",
    "javascript",
    "css",
    "binary",
    "image",
    "audio",
    "video",
    "flash",
];

pub const CONTENT_POSITIONS: [&str; 4] = ["head", "placeholder", "foot", "none"];

/// Types a `dynamic` content may have
pub const DYNAMIC_TYPES: [&str; 4] = ["text", "html", "javascript", "css"];

static JAVASCRIPT_GUARD_REGEX: OnceLock<Regex> = OnceLock::new();
static FLASH_GUARD_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_javascript_guard_regex() -> &'static Regex {
    JAVASCRIPT_GUARD_REGEX.get_or_init(|| {
        Regex::new(r#"(?i)Browser\.Support\(\s*["']javascript["']\s*\)"#)
            .expect("Failed to compile javascript guard regex")
    })
}

fn get_flash_guard_regex() -> &'static Regex {
    FLASH_GUARD_REGEX.get_or_init(|| {
        Regex::new(r#"(?i)Browser\.Support\(\s*["']flash["']\s*\)"#)
            .expect("Failed to compile flash guard regex")
    })
}

/// Attribute a content type generates itself and which cannot be overridden
fn intrinsic_attribute(content_type: &str) -> Option<&'static str> {
    match content_type {
        "javascript" | "image" | "audio" | "video" | "flash" => Some("src"),
        "css" => Some("href"),
        _ => None,
    }
}

pub fn validate(
    config: &Configurator,
    resources: &DirResources,
    findings: &mut Findings,
) -> Result<()> {
    let Some(outputs) = config.outputs().filter(|o| !o.outputs.is_empty()) else {
        findings.warning("No outputs defined");
        return Ok(());
    };

    let mut ids = HashSet::new();
    for output in &outputs.outputs {
        if !ids.insert(output.id.as_str()) {
            return Err(AdxError::Rule(format!(
                "Duplicate output id `{}`",
                output.id
            )));
        }
    }

    match outputs.default_output.as_deref() {
        None => {
            return Err(AdxError::Rule(
                "Missing `outputs/@defaultOutput` attribute".to_string(),
            ));
        }
        Some(default) if outputs.find(default).is_none() => {
            return Err(AdxError::Rule(format!(
                "`defaultOutput` references an unknown output `{}`",
                default
            )));
        }
        Some(_) => {}
    }

    let project_type = config.project_type();
    if project_type == ProjectType::Adc {
        check_conditions(&outputs.outputs, findings);
    }

    for output in &outputs.outputs {
        if project_type == ProjectType::Adp {
            check_master_page(output, resources)?;
        }
        for content in &output.contents {
            check_content(project_type, output, content, resources, findings)?;
        }
    }

    findings.success("Outputs validated");
    Ok(())
}

fn check_conditions(outputs: &[Output], findings: &mut Findings) {
    let mut empty = 0;
    let mut by_condition: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for output in outputs {
        match output.condition.as_deref().map(str::trim) {
            None | Some("") => empty += 1,
            Some(condition) => by_condition
                .entry(condition)
                .or_default()
                .push(output.id.as_str()),
        }
    }

    if empty > 1 {
        findings.warning(format!(
            "{} outputs have no condition; only the first one can ever be selected",
            empty
        ));
    }
    for (condition, ids) in by_condition {
        if ids.len() > 1 {
            findings.warning(format!(
                "Outputs `{}` share the same condition `{}`",
                ids.join("`, `"),
                condition
            ));
        }
    }
}

fn check_master_page(output: &Output, resources: &DirResources) -> Result<()> {
    let master_page = output
        .master_page
        .as_deref()
        .filter(|page| !page.trim().is_empty())
        .ok_or_else(|| {
            AdxError::Rule(format!(
                "Missing `masterPage` attribute on output `{}`",
                output.id
            ))
        })?;

    if !resources.contains(ResourceMode::Dynamic, master_page) {
        return Err(AdxError::Rule(format!(
            "Cannot find master page `{}` in `{}/{}` (output `{}`)",
            master_page,
            RESOURCES_DIR,
            ResourceMode::Dynamic.dir_name(),
            output.id
        )));
    }
    Ok(())
}

fn check_content(
    project_type: ProjectType,
    output: &Output,
    content: &Content,
    resources: &DirResources,
    findings: &mut Findings,
) -> Result<()> {
    let file = content.file_name.as_str();
    let content_type = content.content_type.as_str();

    let mode: ResourceMode = content.mode.parse().map_err(|_| {
        AdxError::Rule(format!(
            "Invalid content mode `{}` for `{}` in output `{}`",
            content.mode, file, output.id
        ))
    })?;

    if !CONTENT_POSITIONS.contains(&content.position.as_str()) {
        return Err(AdxError::Rule(format!(
            "Invalid content position `{}` for `{}` in output `{}`",
            content.position, file, output.id
        )));
    }

    if !CONTENT_TYPES.contains(&content_type) {
        return Err(AdxError::Rule(format!(
            "Invalid content type `{}` for `{}` in output `{}`",
            content_type, file, output.id
        )));
    }

    if !resources.contains(mode, file) {
        return Err(AdxError::Rule(format!(
            "Cannot find `{}` in `{}/{}` (output `{}`)",
            file,
            RESOURCES_DIR,
            mode.dir_name(),
            output.id
        )));
    }

    if mode == ResourceMode::Dynamic && !DYNAMIC_TYPES.contains(&content_type) {
        return Err(AdxError::Rule(format!(
            "Content `{}` of type `{}` cannot use the `dynamic` mode (output `{}`)",
            file, content_type, output.id
        )));
    }

    if content_type == "binary" && content.yield_content.is_none() && content.position != "none" {
        return Err(AdxError::Rule(format!(
            "Binary content `{}` requires a `yield` or `position=\"none\"` (output `{}`)",
            file, output.id
        )));
    }

    if project_type == ProjectType::Adc {
        let guard = match content_type {
            "javascript" => Some(("javascript", get_javascript_guard_regex())),
            "flash" => Some(("flash", get_flash_guard_regex())),
            _ => None,
        };
        if let Some((feature, regex)) = guard {
            let guarded = output
                .condition
                .as_deref()
                .is_some_and(|condition| regex.is_match(condition));
            if !guarded {
                findings.warning(format!(
                    "Output `{}` uses {} content `{}` without `Browser.Support(\"{}\")` in its condition",
                    output.id, feature, file, feature
                ));
            }
        }
    }

    if content.attributes.is_empty() {
        return Ok(());
    }

    if let Some(intrinsic) = intrinsic_attribute(content_type)
        && content.attributes.iter().any(|a| a.name == intrinsic)
    {
        return Err(AdxError::Rule(format!(
            "Attribute `{}` of `{}` cannot be overridden (output `{}`)",
            intrinsic, file, output.id
        )));
    }

    if matches!(content_type, "text" | "html" | "binary") {
        findings.warning(format!(
            "Attributes of `{}` are ignored for `{}` contents (output `{}`)",
            file, content_type, output.id
        ));
    }
    Ok(())
}
