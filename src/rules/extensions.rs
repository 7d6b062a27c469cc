use crate::error::{AdxError, Result};
use crate::resources::{DirResources, ExtensionClass, RESOURCES_DIR, classify_extension};
use crate::rules::Findings;
use crate::validator::{StepId, ValidationContext};

pub(super) fn run(ctx: &mut ValidationContext) -> Result<()> {
    let resources = ctx
        .dir_resources()
        .ok_or(AdxError::MissingPrerequisite {
            step: StepId::ValidateFileExtensions.name(),
            requires: StepId::ValidateFileStructure.name(),
        })?;

    let mut findings = Findings::new();
    validate(resources, &mut findings);
    ctx.record(findings);
    Ok(())
}

/// One event per forbidden or unknown file; safe files are silent
pub fn validate(resources: &DirResources, findings: &mut Findings) {
    let mut forbidden = 0;
    for (mode, name) in resources.unreadable() {
        findings.warning(format!(
            "Untrusted file name, not valid UTF-8: `{}/{}/{}`",
            RESOURCES_DIR,
            mode.dir_name(),
            name
        ));
    }
    for (mode, file) in resources.files() {
        let location = format!("{}/{}/{}", RESOURCES_DIR, mode.dir_name(), file);
        match classify_extension(file) {
            ExtensionClass::Forbidden => {
                forbidden += 1;
                findings.error(format!("Forbidden file extension: `{}`", location));
            }
            ExtensionClass::Unknown => {
                findings.warning(format!("Untrusted file extension: `{}`", location));
            }
            ExtensionClass::Safe => {}
        }
    }

    if forbidden == 0 {
        findings.success("File extensions validated");
    }
}
