//! Read and write an ADX project's `config.xml`.
//!
//! The document is mapped onto the typed sections of [`crate::model`] and can
//! be serialized back; loading the serialized form yields the same sections.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{AdxError, ConfiguratorError, Result};
use crate::model::{
    Category, Constraint, Content, ContentAttribute, Info, Output, Outputs, ProjectType,
    Properties, Property, PropertyOption, Style,
};
use crate::xml::{self, XmlElement};

pub const CONFIG_FILE_NAME: &str = "config.xml";

const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

#[derive(Debug, Clone, PartialEq)]
pub struct Configurator {
    dir: PathBuf,
    project_type: ProjectType,
    root_attributes: Vec<(String, String)>,
    info: Info,
    outputs: Option<Outputs>,
    properties: Option<Properties>,
}

impl Configurator {
    /// Empty configuration of the given type
    pub fn new(project_type: ProjectType, version: &str) -> Self {
        Self {
            dir: PathBuf::new(),
            project_type,
            root_attributes: vec![
                ("xmlns:xsi".to_string(), XSI_NAMESPACE.to_string()),
                ("version".to_string(), version.to_string()),
            ],
            info: Info::default(),
            outputs: None,
            properties: None,
        }
    }

    /// Load `<dir>/config.xml`
    pub async fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| AdxError::from_io(e, &path))?;
        let mut configurator = Self::from_xml(&text)?;
        configurator.dir = dir.to_path_buf();
        debug!(
            "Loaded {} ({} v{})",
            path.display(),
            configurator.project_type,
            configurator.project_version().unwrap_or("?")
        );
        Ok(configurator)
    }

    pub fn from_xml(text: &str) -> Result<Self> {
        let root = xml::parse(text)?;
        let project_type = ProjectType::from_root(&root.name)
            .ok_or_else(|| ConfiguratorError::UnknownRoot(root.name.clone()))?;

        Ok(Self {
            dir: PathBuf::new(),
            project_type,
            root_attributes: root.attributes.clone(),
            info: root.child("info").map(read_info).unwrap_or_default(),
            outputs: root.child("outputs").map(read_outputs),
            properties: root.child("properties").map(read_properties),
        })
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut root = XmlElement::new(self.project_type.root_name());
        root.attributes = self.root_attributes.clone();
        root.push(write_info(&self.info));
        if let Some(outputs) = &self.outputs {
            root.push(write_outputs(outputs));
        }
        if let Some(properties) = &self.properties {
            root.push(write_properties(properties));
        }
        Ok(xml::to_string(&root)?)
    }

    /// Write the document back to `<dir>/config.xml`
    pub async fn save(&self) -> Result<()> {
        let path = self.path();
        let text = self.to_xml()?;
        tokio::fs::write(&path, text)
            .await
            .map_err(|e| AdxError::from_io(e, &path))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn set_dir(&mut self, dir: impl Into<PathBuf>) {
        self.dir = dir.into();
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }

    pub fn project_type(&self) -> ProjectType {
        self.project_type
    }

    /// `version` attribute of the root element
    pub fn project_version(&self) -> Option<&str> {
        self.root_attributes
            .iter()
            .find(|(key, _)| key == "version")
            .map(|(_, value)| value.as_str())
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    pub fn set_info(&mut self, info: Info) {
        self.info = info;
    }

    pub fn outputs(&self) -> Option<&Outputs> {
        self.outputs.as_ref()
    }

    pub fn set_outputs(&mut self, outputs: Option<Outputs>) {
        self.outputs = outputs;
    }

    pub fn properties(&self) -> Option<&Properties> {
        self.properties.as_ref()
    }

    pub fn set_properties(&mut self, properties: Option<Properties>) {
        self.properties = properties;
    }
}

fn read_info(el: &XmlElement) -> Info {
    Info {
        name: el.child_text("name"),
        guid: el.child_text("guid"),
        version: el.child_text("version"),
        date: el.child_text("date"),
        description: el.child_text("description"),
        company: el.child_text("company"),
        author: el.child_text("author"),
        site: el.child_text("site"),
        help_url: el.child_text("helpURL"),
        style: el.child("style").map(|style| Style {
            width: style.attr("width").map(str::to_string),
            height: style.attr("height").map(str::to_string),
        }),
        categories: el.child("categories").map(|categories| {
            categories
                .children_named("category")
                .map(XmlElement::text)
                .collect()
        }),
        constraints: el
            .child("constraints")
            .map(|constraints| {
                constraints
                    .children_named("constraint")
                    .map(read_constraint)
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn read_constraint(el: &XmlElement) -> Constraint {
    Constraint {
        on: el.attr("on").unwrap_or_default().to_string(),
        attributes: el
            .attributes
            .iter()
            .filter(|(key, _)| key != "on")
            .cloned()
            .collect(),
    }
}

fn write_info(info: &Info) -> XmlElement {
    let mut el = XmlElement::new("info");
    el.push_text_child("name", info.name.as_deref());
    el.push_text_child("guid", info.guid.as_deref());
    el.push_text_child("version", info.version.as_deref());
    el.push_text_child("date", info.date.as_deref());
    el.push_text_child("description", info.description.as_deref());
    el.push_text_child("company", info.company.as_deref());
    el.push_text_child("author", info.author.as_deref());
    el.push_text_child("site", info.site.as_deref());
    el.push_text_child("helpURL", info.help_url.as_deref());

    if let Some(style) = &info.style {
        el.push(
            XmlElement::new("style")
                .with_opt_attr("width", style.width.as_deref())
                .with_opt_attr("height", style.height.as_deref()),
        );
    }

    if let Some(categories) = &info.categories {
        let mut list = XmlElement::new("categories");
        for category in categories {
            list.push_text_child("category", Some(category));
        }
        el.push(list);
    }

    if !info.constraints.is_empty() {
        let mut list = XmlElement::new("constraints");
        for constraint in &info.constraints {
            let mut item = XmlElement::new("constraint");
            item.set_attr("on", constraint.on.as_str());
            for (key, value) in &constraint.attributes {
                item.set_attr(key.as_str(), value.as_str());
            }
            list.push(item);
        }
        el.push(list);
    }
    el
}

fn read_outputs(el: &XmlElement) -> Outputs {
    Outputs {
        default_output: el.attr("defaultOutput").map(str::to_string),
        outputs: el.children_named("output").map(read_output).collect(),
    }
}

fn read_output(el: &XmlElement) -> Output {
    let attr = |name: &str| el.attr(name).map(str::to_string);
    Output {
        id: el.attr("id").unwrap_or_default().to_string(),
        description: el.child_text("description"),
        // Older documents carry the condition as an attribute
        condition: el.child_text("condition").or_else(|| attr("condition")),
        default_generation: attr("defaultGeneration"),
        max_iterations: attr("maxIterations"),
        manage_loop_depth: attr("manageLoopDepth"),
        master_page: attr("masterPage"),
        contents: el.children_named("content").map(read_content).collect(),
    }
}

fn read_content(el: &XmlElement) -> Content {
    let attr = |name: &str| el.attr(name).unwrap_or_default().to_string();
    Content {
        file_name: attr("fileName"),
        content_type: attr("type"),
        mode: attr("mode"),
        position: attr("position"),
        attributes: el
            .children_named("attribute")
            .map(|attribute| ContentAttribute {
                name: attribute.attr("name").unwrap_or_default().to_string(),
                value: attribute.child_text("value"),
            })
            .collect(),
        yield_content: el.child_text("yield"),
    }
}

fn write_outputs(outputs: &Outputs) -> XmlElement {
    let mut el =
        XmlElement::new("outputs").with_opt_attr("defaultOutput", outputs.default_output.as_deref());

    for output in &outputs.outputs {
        let mut item = XmlElement::new("output");
        item.set_attr("id", output.id.as_str());
        let mut item = item
            .with_opt_attr("defaultGeneration", output.default_generation.as_deref())
            .with_opt_attr("maxIterations", output.max_iterations.as_deref())
            .with_opt_attr("manageLoopDepth", output.manage_loop_depth.as_deref())
            .with_opt_attr("masterPage", output.master_page.as_deref());
        item.push_text_child("description", output.description.as_deref());
        item.push_text_child("condition", output.condition.as_deref());

        for content in &output.contents {
            let mut node = XmlElement::new("content");
            node.set_attr("fileName", content.file_name.as_str());
            node.set_attr("type", content.content_type.as_str());
            node.set_attr("mode", content.mode.as_str());
            node.set_attr("position", content.position.as_str());
            for attribute in &content.attributes {
                let mut attr_node = XmlElement::new("attribute");
                attr_node.set_attr("name", attribute.name.as_str());
                attr_node.push_text_child("value", attribute.value.as_deref());
                node.push(attr_node);
            }
            node.push_text_child("yield", content.yield_content.as_deref());
            item.push(node);
        }
        el.push(item);
    }
    el
}

fn read_properties(el: &XmlElement) -> Properties {
    Properties {
        categories: el
            .children_named("category")
            .map(|category| Category {
                id: category.attr("id").map(str::to_string),
                name: category.attr("name").map(str::to_string),
                properties: category.children_named("property").map(read_property).collect(),
            })
            .collect(),
    }
}

fn read_property(el: &XmlElement) -> Property {
    let extra: BTreeMap<String, String> = el
        .attributes
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "xsi:type" | "id" | "name" | "type"))
        .cloned()
        .collect();

    Property {
        xsi_type: el.attr("xsi:type").map(str::to_string),
        id: el.attr("id").unwrap_or_default().to_string(),
        name: el.attr("name").map(str::to_string),
        type_: el.attr("type").map(str::to_string),
        extra,
        description: el.child_text("description"),
        value: el.child_text("value"),
        options: el
            .child("options")
            .map(|options| {
                options
                    .children_named("option")
                    .map(|option| PropertyOption {
                        value: option.attr("value").unwrap_or_default().to_string(),
                        text: option.attr("text").map(str::to_string),
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn write_properties(properties: &Properties) -> XmlElement {
    let mut el = XmlElement::new("properties");
    for category in &properties.categories {
        let mut node = XmlElement::new("category")
            .with_opt_attr("id", category.id.as_deref())
            .with_opt_attr("name", category.name.as_deref());

        for property in &category.properties {
            let mut item = XmlElement::new("property").with_opt_attr("xsi:type", property.xsi_type.as_deref());
            item.set_attr("id", property.id.as_str());
            let mut item = item
                .with_opt_attr("name", property.name.as_deref())
                .with_opt_attr("type", property.type_.as_deref());
            for (key, value) in &property.extra {
                item.set_attr(key.as_str(), value.as_str());
            }
            item.push_text_child("description", property.description.as_deref());
            item.push_text_child("value", property.value.as_deref());
            if !property.options.is_empty() {
                let mut options = XmlElement::new("options");
                for option in &property.options {
                    let mut node = XmlElement::new("option");
                    node.set_attr("value", option.value.as_str());
                    options.push(node.with_opt_attr("text", option.text.as_deref()));
                }
                item.push(options);
            }
            node.push(item);
        }
        el.push(node);
    }
    el
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ADC_CONFIG: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<control xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" version="2.1.0" askiaCompat="5.4.2">
  <info>
    <name>Slider</name>
    <guid>7f3a2f76-6a1c-4f0d-9ad4-1b1f3c0e7c11</guid>
    <version>1.0.3</version>
    <date>2024-03-01</date>
    <description><![CDATA[Horizontal slider for numeric questions]]></description>
    <company>Askia</company>
    <author><![CDATA[Jane Roe <jane@example.com>]]></author>
    <site>https://www.askia.com</site>
    <helpURL>https://dev.askia.com/slider</helpURL>
    <style width="400" height="120"/>
    <categories><category>General</category><category>Slider</category></categories>
    <constraints>
      <constraint on="questions" numeric="true" single="false"/>
      <constraint on="controls" responseblock="true"/>
      <constraint on="responses" min="1" max="*"/>
    </constraints>
  </info>
  <outputs defaultOutput="main">
    <output id="main" manageLoopDepth="0">
      <description><![CDATA[Main output]]></description>
      <condition><![CDATA[Browser.Support("javascript")]]></condition>
      <content fileName="slider.css" type="css" mode="static" position="head"/>
      <content fileName="slider.js" type="javascript" mode="static" position="foot">
        <attribute name="defer"><value>defer</value></attribute>
      </content>
      <content fileName="default.html" type="html" mode="dynamic" position="placeholder"/>
    </output>
    <output id="fallback" defaultGeneration="true" maxIterations="3">
      <description>Fallback</description>
      <content fileName="flash.swf" type="binary" mode="static" position="none"/>
      <content fileName="img.png" type="image" mode="share" position="placeholder">
        <yield><![CDATA[<img src="{%= CurrentADC.URLTo("share/img.png") %}"/>]]></yield>
      </content>
    </output>
  </outputs>
  <properties>
    <category id="general" name="General">
      <property xsi:type="standardProperty" id="minValue" name="Minimum" type="number" mode="static" require="false">
        <description>Lower bound</description>
        <value>0</value>
      </property>
      <property xsi:type="standardProperty" id="orientation" name="Orientation" type="string">
        <value>horizontal</value>
        <options>
          <option value="horizontal" text="Horizontal"/>
          <option value="vertical" text="Vertical"/>
        </options>
      </property>
    </category>
  </properties>
</control>"#;

    #[test]
    fn test_from_xml_reads_info() {
        let config = Configurator::from_xml(ADC_CONFIG).unwrap();
        assert_eq!(config.project_type(), ProjectType::Adc);
        assert_eq!(config.project_version(), Some("2.1.0"));

        let info = config.info();
        assert_eq!(info.name.as_deref(), Some("Slider"));
        assert_eq!(info.author.as_deref(), Some("Jane Roe <jane@example.com>"));
        assert_eq!(info.help_url.as_deref(), Some("https://dev.askia.com/slider"));
        assert_eq!(
            info.style,
            Some(Style {
                width: Some("400".to_string()),
                height: Some("120".to_string())
            })
        );
        assert_eq!(
            info.categories,
            Some(vec!["General".to_string(), "Slider".to_string()])
        );
        assert_eq!(info.constraints.len(), 3);
        assert_eq!(info.constraints[0].on, "questions");
        assert_eq!(
            info.constraints[0].attributes.get("numeric").map(String::as_str),
            Some("true")
        );
        assert!(!info.constraints[0].attributes.contains_key("on"));
    }

    #[test]
    fn test_from_xml_reads_outputs_and_properties() {
        let config = Configurator::from_xml(ADC_CONFIG).unwrap();

        let outputs = config.outputs().unwrap();
        assert_eq!(outputs.default_output.as_deref(), Some("main"));
        assert_eq!(outputs.outputs.len(), 2);
        let main = outputs.find("main").unwrap();
        assert_eq!(
            main.condition.as_deref(),
            Some(r#"Browser.Support("javascript")"#)
        );
        assert_eq!(main.contents.len(), 3);
        assert_eq!(main.contents[1].attributes[0].name, "defer");
        assert_eq!(main.contents[1].attributes[0].value.as_deref(), Some("defer"));
        let fallback = outputs.find("fallback").unwrap();
        assert_eq!(fallback.max_iterations.as_deref(), Some("3"));
        assert!(fallback.contents[1].yield_content.is_some());

        let properties = config.properties().unwrap();
        let ids: Vec<_> = properties.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["minValue", "orientation"]);
        let min = properties.iter().next().unwrap();
        assert_eq!(min.xsi_type.as_deref(), Some("standardProperty"));
        assert_eq!(min.extra.get("mode").map(String::as_str), Some("static"));
        let orientation = properties.iter().nth(1).unwrap();
        assert_eq!(orientation.options.len(), 2);
    }

    #[test]
    fn test_round_trip_preserves_sections() {
        let config = Configurator::from_xml(ADC_CONFIG).unwrap();
        let reloaded = Configurator::from_xml(&config.to_xml().unwrap()).unwrap();

        assert_eq!(reloaded.info(), config.info());
        assert_eq!(reloaded.outputs(), config.outputs());
        assert_eq!(reloaded.properties(), config.properties());
        assert_eq!(reloaded.project_version(), Some("2.1.0"));
    }

    #[test]
    fn test_round_trip_keeps_cdata_whitespace() {
        let xml = "<control version=\"2.0.0\"><info><name>X</name></info>\n<outputs defaultOutput=\"main\">\n  <output id=\"main\">\n    <condition><![CDATA[\n  Browser.Support(\"javascript\")\n]]></condition>\n    <content fileName=\"img.png\" type=\"image\" mode=\"share\" position=\"placeholder\">\n      <yield><![CDATA[\n  <img src=\"{%= CurrentADC.URLTo(\"share/img.png\") %}\"/>\n]]></yield>\n    </content>\n  </output>\n</outputs></control>";
        let config = Configurator::from_xml(xml).unwrap();
        let output = config.outputs().unwrap().find("main").unwrap();
        assert_eq!(
            output.contents[0].yield_content.as_deref(),
            Some("\n  <img src=\"{%= CurrentADC.URLTo(\"share/img.png\") %}\"/>\n")
        );
        assert!(output.condition.as_deref().unwrap().starts_with('\n'));

        let reloaded = Configurator::from_xml(&config.to_xml().unwrap()).unwrap();
        assert_eq!(reloaded.outputs(), config.outputs());
    }

    #[test]
    fn test_condition_attribute_fallback() {
        let config = Configurator::from_xml(
            r#"<page version="2.0.0"><info><name>P</name></info>
            <outputs defaultOutput="o"><output id="o" condition="true" masterPage="master.html"/></outputs></page>"#,
        )
        .unwrap();
        let output = config.outputs().unwrap().find("o").unwrap();
        assert_eq!(output.condition.as_deref(), Some("true"));
        assert_eq!(output.master_page.as_deref(), Some("master.html"));
        assert_eq!(config.project_type(), ProjectType::Adp);
    }

    #[test]
    fn test_unknown_root_is_rejected() {
        let err = Configurator::from_xml("<survey/>").unwrap_err();
        assert!(matches!(
            err,
            AdxError::Configurator(ConfiguratorError::UnknownRoot(ref name)) if name == "survey"
        ));
    }

    #[test]
    fn test_malformed_xml_is_rejected() {
        let err = Configurator::from_xml("<control><info></control>").unwrap_err();
        assert!(matches!(
            err,
            AdxError::Configurator(ConfiguratorError::Xml { .. })
        ));
    }

    #[test]
    fn test_setters_replace_sections() {
        let mut config = Configurator::new(ProjectType::Adp, "2.2.0");
        assert!(config.outputs().is_none());

        config.set_info(Info {
            name: Some("Page".to_string()),
            ..Default::default()
        });
        config.set_outputs(Some(Outputs {
            default_output: Some("main".to_string()),
            outputs: vec![Output {
                id: "main".to_string(),
                master_page: Some("master.html".to_string()),
                ..Default::default()
            }],
        }));

        let reloaded = Configurator::from_xml(&config.to_xml().unwrap()).unwrap();
        assert_eq!(reloaded.info().name.as_deref(), Some("Page"));
        assert_eq!(reloaded.outputs(), config.outputs());
        assert_eq!(reloaded.project_version(), Some("2.2.0"));

        config.set_outputs(None);
        assert!(config.outputs().is_none());
    }

    #[tokio::test]
    async fn test_load_and_save() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(temp_dir.path().join(CONFIG_FILE_NAME), ADC_CONFIG)
            .await
            .unwrap();

        let mut config = Configurator::load(temp_dir.path()).await.unwrap();
        assert_eq!(config.dir(), temp_dir.path());

        let mut info = config.info().clone();
        info.name = Some("Renamed".to_string());
        config.set_info(info);
        config.save().await.unwrap();

        let reloaded = Configurator::load(temp_dir.path()).await.unwrap();
        assert_eq!(reloaded.info().name.as_deref(), Some("Renamed"));
        assert_eq!(reloaded.outputs(), config.outputs());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = Configurator::load(temp_dir.path()).await.unwrap_err();
        match err {
            AdxError::NotFound { path } => assert!(path.ends_with(CONFIG_FILE_NAME)),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }
}
