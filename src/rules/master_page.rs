use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{AdxError, Result};
use crate::resources::{RESOURCES_DIR, ResourceMode};
use crate::rules::Findings;
use crate::validator::{StepId, ValidationContext};

static MARKER_REGEXES: OnceLock<[Regex; 5]> = OnceLock::new();

/// Structural markers of an ADP master page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Head,
    FormOpen,
    FormClose,
    Questions,
    Foot,
}

impl Marker {
    pub const ALL: [Marker; 5] = [
        Marker::Head,
        Marker::FormOpen,
        Marker::FormClose,
        Marker::Questions,
        Marker::Foot,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Marker::Head => "<askia-head/>",
            Marker::FormOpen => "<askia-form>",
            Marker::FormClose => "</askia-form>",
            Marker::Questions => "<askia-questions/>",
            Marker::Foot => "<askia-foot/>",
        }
    }

    fn regex(&self) -> &'static Regex {
        let regexes = MARKER_REGEXES.get_or_init(|| {
            [
                r"(?i)<askia-head\s*/>",
                r"(?i)<askia-form(\s[^>]*)?>",
                r"(?i)</askia-form\s*>",
                r"(?i)<askia-questions\s*/>",
                r"(?i)<askia-foot\s*/>",
            ]
            .map(|pattern| Regex::new(pattern).expect("Failed to compile master page marker regex"))
        });
        &regexes[*self as usize]
    }

    fn positions(&self, html: &str) -> Vec<usize> {
        self.regex().find_iter(html).map(|m| m.start()).collect()
    }
}

/// One error per missing or duplicated marker, plus one when the questions
/// marker sits outside the form
pub fn check(page: &str, html: &str, findings: &mut Findings) {
    let mut errors = 0;
    let mut single = [None; 5];

    for marker in Marker::ALL {
        let positions = marker.positions(html);
        match positions.len() {
            0 => {
                errors += 1;
                findings.error(format!("Missing `{}` in master page `{}`", marker.tag(), page));
            }
            1 => single[marker as usize] = Some(positions[0]),
            count => {
                errors += 1;
                findings.error(format!(
                    "Found {} `{}` in master page `{}`, expected exactly one",
                    count,
                    marker.tag(),
                    page
                ));
            }
        }
    }

    if let (Some(open), Some(close), Some(questions)) = (
        single[Marker::FormOpen as usize],
        single[Marker::FormClose as usize],
        single[Marker::Questions as usize],
    ) && !(open < questions && questions < close)
    {
        errors += 1;
        findings.error(format!(
            "`{}` must be placed between `{}` and `{}` in master page `{}`",
            Marker::Questions.tag(),
            Marker::FormOpen.tag(),
            Marker::FormClose.tag(),
            page
        ));
    }

    if errors == 0 {
        findings.success(format!("Master page tags validated: `{}`", page));
    }
}

/// Check every distinct master page referenced by the outputs
pub(super) async fn run(ctx: &mut ValidationContext) -> Result<()> {
    let configurator = ctx.configurator().ok_or(AdxError::MissingPrerequisite {
        step: StepId::ValidateMasterPage.name(),
        requires: StepId::InitConfigXmlDoc.name(),
    })?;

    let pages: BTreeSet<String> = configurator
        .outputs()
        .map(|outputs| {
            outputs
                .outputs
                .iter()
                .filter_map(|output| output.master_page.clone())
                .filter(|page| !page.trim().is_empty())
                .collect()
        })
        .unwrap_or_default();

    let dynamic_dir = ctx
        .project_dir()
        .join(RESOURCES_DIR)
        .join(ResourceMode::Dynamic.dir_name());

    let mut findings = Findings::new();
    for page in &pages {
        let path = dynamic_dir.join(page);
        let html = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| AdxError::from_io(e, &path))?;
        check(page, &html, &mut findings);
    }
    ctx.record(findings);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::Severity;

    const VALID: &str = r#"<html><head><askia-head/></head>
<body><askia-form><askia-questions/></askia-form><askia-foot/></body></html>"#;

    fn errors(html: &str) -> Vec<String> {
        let mut findings = Findings::new();
        check("master.html", html, &mut findings);
        findings
            .lines(Severity::Error)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_valid_page_has_no_errors() {
        let mut findings = Findings::new();
        check("master.html", VALID, &mut findings);
        assert_eq!(findings.count(Severity::Error), 0);
        assert_eq!(findings.count(Severity::Success), 1);
    }

    #[test]
    fn test_marker_variants_are_recognised() {
        let html = r#"<ASKIA-HEAD /><askia-form class="x"><askia-questions /></askia-form ><askia-foot/>"#;
        assert!(errors(html).is_empty());
    }

    #[test]
    fn test_each_missing_marker_yields_one_error() {
        for marker in Marker::ALL {
            let html = VALID.replacen(marker.tag(), "", 1);
            let errors = errors(&html);
            assert_eq!(errors.len(), 1, "{:?}: {:?}", marker, errors);
            assert!(errors[0].starts_with("Missing"));
            assert!(errors[0].contains(marker.tag()));
        }
    }

    #[test]
    fn test_each_duplicated_marker_yields_one_error() {
        for marker in Marker::ALL {
            let html = match marker {
                // Keep the duplicate inside the form so only the count is wrong
                Marker::FormOpen | Marker::Questions => VALID.replacen(
                    marker.tag(),
                    &format!("{}{}", marker.tag(), marker.tag()),
                    1,
                ),
                _ => format!("{}{}", VALID, marker.tag()),
            };
            let errors = errors(&html);
            assert_eq!(errors.len(), 1, "{:?}: {:?}", marker, errors);
            assert!(errors[0].starts_with("Found 2"));
        }
    }

    #[test]
    fn test_questions_outside_form() {
        let html = VALID
            .replacen("<askia-questions/>", "", 1)
            .replacen("<askia-foot/>", "<askia-questions/><askia-foot/>", 1);
        let errors = errors(&html);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("must be placed between"));
    }
}
