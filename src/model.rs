//! Typed view of an ADX `config.xml` document.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// ADC (`<control>`) or ADP (`<page>`) project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Adc,
    Adp,
}

impl ProjectType {
    /// Map the root element name of `config.xml`
    pub fn from_root(name: &str) -> Option<Self> {
        match name {
            "control" => Some(ProjectType::Adc),
            "page" => Some(ProjectType::Adp),
            _ => None,
        }
    }

    pub fn root_name(&self) -> &'static str {
        match self {
            ProjectType::Adc => "control",
            ProjectType::Adp => "page",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::Adc => "adc",
            ProjectType::Adp => "adp",
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "adc" | "control" => Ok(ProjectType::Adc),
            "adp" | "page" => Ok(ProjectType::Adp),
            other => Err(format!("Unknown project type: {}", other)),
        }
    }
}

/// Deprecated `<style width height/>` tag
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Style {
    pub width: Option<String>,
    pub height: Option<String>,
}

/// One `<constraint on="...">` element. `attributes` excludes `on`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Constraint {
    pub on: String,
    pub attributes: BTreeMap<String, String>,
}

impl Constraint {
    pub fn new(on: impl Into<String>) -> Self {
        Self {
            on: on.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    /// Attribute names whose value enables them
    pub fn enabled_attributes(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .filter(|(_, value)| is_truthy(value))
            .map(|(name, _)| name.as_str())
    }
}

/// `false`, `0` and empty strings are the only falsy attribute values
pub fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !(value.is_empty() || value.eq_ignore_ascii_case("false") || value == "0")
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Info {
    pub name: Option<String>,
    pub guid: Option<String>,
    pub version: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
    pub company: Option<String>,
    pub author: Option<String>,
    pub site: Option<String>,
    #[serde(rename = "helpURL")]
    pub help_url: Option<String>,
    pub style: Option<Style>,
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentAttribute {
    pub name: String,
    pub value: Option<String>,
}

/// A `<content>` entry of an output
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub file_name: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub mode: String,
    pub position: String,
    #[serde(default)]
    pub attributes: Vec<ContentAttribute>,
    #[serde(rename = "yield")]
    pub yield_content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub id: String,
    pub description: Option<String>,
    pub condition: Option<String>,
    pub default_generation: Option<String>,
    pub max_iterations: Option<String>,
    pub manage_loop_depth: Option<String>,
    pub master_page: Option<String>,
    #[serde(default)]
    pub contents: Vec<Content>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outputs {
    pub default_output: Option<String>,
    #[serde(default)]
    pub outputs: Vec<Output>,
}

impl Outputs {
    pub fn find(&self, id: &str) -> Option<&Output> {
        self.outputs.iter().find(|output| output.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PropertyOption {
    pub value: String,
    pub text: Option<String>,
}

/// A `<property>` entry. Attributes other than `xsi:type`, `id`, `name`
/// and `type` are kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub xsi_type: Option<String>,
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
    pub description: Option<String>,
    pub value: Option<String>,
    #[serde(default)]
    pub options: Vec<PropertyOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Category {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Properties {
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl Properties {
    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.categories
            .iter()
            .flat_map(|category| category.properties.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}
