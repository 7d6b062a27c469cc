//! Minimal element tree over `quick-xml`, used by the configurator.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::ConfiguratorError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Builder-style attribute setter that skips `None`
    pub fn with_opt_attr(mut self, name: &str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.set_attr(name, value);
        }
        self
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    pub fn push_text_child(&mut self, name: &str, text: Option<&str>) {
        if let Some(text) = text {
            let mut child = XmlElement::new(name);
            if !text.is_empty() {
                child.children.push(XmlNode::Text(text.to_string()));
            }
            self.push(child);
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|el| el.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |el| el.name == name)
    }

    /// Concatenated text content of this element (direct text children only)
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(text) => Some(text.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).map(|el| el.text())
    }
}

fn xml_error(position: u64, err: impl std::fmt::Display) -> ConfiguratorError {
    ConfiguratorError::Xml {
        position,
        details: err.to_string(),
    }
}

fn element_from(start: &BytesStart<'_>, position: u64) -> Result<XmlElement, ConfiguratorError> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()));
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| xml_error(position, e))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| xml_error(position, e))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
    position: u64,
) -> Result<(), ConfiguratorError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(xml_error(position, "multiple root elements")),
    }
}

/// Whitespace-only text next to child elements is formatting, not content
fn drop_layout_whitespace(element: &mut XmlElement) {
    if element.elements().next().is_some() {
        element.children.retain(|node| match node {
            XmlNode::Text(text) => !text.trim().is_empty(),
            XmlNode::Element(_) => true,
        });
    }
}

/// Parse a whole document into its root element
pub fn parse(xml: &str) -> Result<XmlElement, ConfiguratorError> {
    // Text is kept verbatim; indentation between elements is dropped on close
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let position = reader.buffer_position() as u64;
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(element_from(&start, position)?),
            Ok(Event::Empty(start)) => {
                let element = element_from(&start, position)?;
                attach(&mut stack, &mut root, element, position)?;
            }
            Ok(Event::End(_)) => {
                let mut element = stack
                    .pop()
                    .ok_or_else(|| xml_error(position, "unexpected closing tag"))?;
                drop_layout_whitespace(&mut element);
                attach(&mut stack, &mut root, element, position)?;
            }
            Ok(Event::Text(text)) => {
                let text = text.unescape().map_err(|e| xml_error(position, e))?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::Text(text.into_owned()));
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(parent) = stack.last_mut() {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    parent.children.push(XmlNode::Text(text));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(xml_error(reader.buffer_position() as u64, e)),
        }
    }

    if let Some(open) = stack.last() {
        return Err(xml_error(
            reader.buffer_position() as u64,
            format!("unclosed element `{}`", open.name),
        ));
    }

    root.ok_or(ConfiguratorError::EmptyDocument)
}

/// Read only the root element (name and attributes) of a document
pub fn read_root(xml: &str) -> Result<XmlElement, ConfiguratorError> {
    let mut reader = Reader::from_str(xml);
    loop {
        let position = reader.buffer_position() as u64;
        match reader.read_event() {
            Ok(Event::Start(start)) | Ok(Event::Empty(start)) => {
                return element_from(&start, position);
            }
            Ok(Event::Eof) => return Err(ConfiguratorError::EmptyDocument),
            Ok(_) => {}
            Err(e) => return Err(xml_error(position, e)),
        }
    }
}

fn write_error(err: impl std::fmt::Display) -> ConfiguratorError {
    ConfiguratorError::Write(err.to_string())
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    element: &XmlElement,
) -> Result<(), ConfiguratorError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(write_error);
    }

    writer.write_event(Event::Start(start)).map_err(write_error)?;
    for child in &element.children {
        match child {
            XmlNode::Element(el) => write_element(writer, el)?,
            XmlNode::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(write_error)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(Cow::Borrowed(element.name.as_str()))))
        .map_err(write_error)
}

/// Serialize a root element as an indented UTF-8 document
pub fn to_string(root: &XmlElement) -> Result<String, ConfiguratorError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(write_error)?;
    write_element(&mut writer, root)?;
    String::from_utf8(writer.into_inner()).map_err(write_error)
}
