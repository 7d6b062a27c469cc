//! Article body templates for the help center
//!
//! A template is plain HTML with `{{ADX...}}` placeholders. Values come from
//! the project's `config.xml` and from the URLs of the uploaded attachments.
//! Placeholders without a value are left in the text.

use std::sync::OnceLock;

use quick_xml::escape::escape;
use regex::{Captures, Regex};

use crate::model::{Info, Properties};

static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_placeholder_regex() -> &'static Regex {
    PLACEHOLDER_REGEX.get_or_init(|| {
        Regex::new(r"\{\{(ADX[A-Za-z]+(?::HTML)?)\}\}").expect("Failed to compile placeholder regex")
    })
}

pub const DEFAULT_TEMPLATE: &str = r#"<p>{{ADXPreview}}</p>
<h2>Properties</h2>
{{ADXProperties:HTML}}
<h2>Constraints</h2>
{{ADXConstraints}}
<p><strong>Keywords:</strong> {{ADXListKeyWords}}</p>
<h2>Download</h2>
<ul>
<li><a href="{{ADXFileURL}}">Package</a></li>
<li><a href="{{ADXQexFileURL}}">Example survey (qex)</a></li>
</ul>
<p>{{ADXLiveDemo}}</p>
"#;

/// Resolved placeholder values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateValues {
    pub title: String,
    pub properties_html: String,
    pub keywords: String,
    pub constraints_html: String,
    pub file_url: Option<String>,
    pub qex_file_url: Option<String>,
    pub preview_url: Option<String>,
    pub demo_url: Option<String>,
}

impl TemplateValues {
    pub fn new(info: &Info, properties: Option<&Properties>) -> Self {
        Self {
            title: info.name.clone().unwrap_or_default(),
            properties_html: properties_html(properties),
            keywords: keywords(info),
            constraints_html: constraints_html(info),
            ..Default::default()
        }
    }

    fn value(&self, placeholder: &str) -> Option<String> {
        match placeholder {
            "ADXProperties:HTML" => Some(self.properties_html.clone()),
            "ADXListKeyWords" => Some(self.keywords.clone()),
            "ADXConstraints" => Some(self.constraints_html.clone()),
            "ADXFileURL" => Some(self.file_url.clone().unwrap_or_default()),
            "ADXQexFileURL" => Some(self.qex_file_url.clone().unwrap_or_default()),
            "ADXPreview" => Some(
                self.preview_url
                    .as_deref()
                    .map(|url| format!(r#"<img src="{}" alt="{}" />"#, escape(url), escape(&self.title)))
                    .unwrap_or_default(),
            ),
            "ADXLiveDemo" => Some(
                self.demo_url
                    .as_deref()
                    .map(|url| format!(r#"<a href="{}" target="_blank">Live demo</a>"#, escape(url)))
                    .unwrap_or_default(),
            ),
            _ => None,
        }
    }
}

/// Substitute every known placeholder
pub fn render(template: &str, values: &TemplateValues) -> String {
    get_placeholder_regex()
        .replace_all(template, |caps: &Captures| {
            values
                .value(&caps[1])
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn properties_html(properties: Option<&Properties>) -> String {
    let Some(properties) = properties.filter(|p| !p.is_empty()) else {
        return String::new();
    };

    let mut html = String::from("<ul>\n");
    for property in properties.iter() {
        let label = property.name.as_deref().unwrap_or(&property.id);
        html.push_str(&format!("<li><strong>{}</strong>", escape(label)));
        if let Some(type_) = &property.type_ {
            html.push_str(&format!(" <em>({})</em>", escape(type_)));
        }
        if let Some(description) = property.description.as_deref().filter(|d| !d.is_empty()) {
            html.push_str(&format!(": {}", escape(description)));
        }
        html.push_str("</li>\n");
    }
    html.push_str("</ul>");
    html
}

/// Constraint targets and their enabled attributes, first occurrence wins
fn keywords(info: &Info) -> String {
    let mut words: Vec<&str> = Vec::new();
    for constraint in &info.constraints {
        for word in std::iter::once(constraint.on.as_str()).chain(constraint.enabled_attributes()) {
            if !words.contains(&word) {
                words.push(word);
            }
        }
    }
    words.join(", ")
}

fn constraints_html(info: &Info) -> String {
    if info.constraints.is_empty() {
        return String::new();
    }

    let mut html = String::from("<table>\n<tr><th>Constraint</th><th>Allowed</th></tr>\n");
    for constraint in &info.constraints {
        let allowed: Vec<&str> = constraint.enabled_attributes().collect();
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>\n",
            escape(&constraint.on),
            escape(&allowed.join(", "))
        ));
    }
    html.push_str("</table>");
    html
}
