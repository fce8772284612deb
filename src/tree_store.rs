use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, Event};

use crate::node::Element;

/// Read/write access to the file-per-node course representation.
///
/// Each node type lives in a folder named after it; a node named `n` of type
/// `t` is stored as `t/n.xml`. The course root file sits at the tree root
/// (empty node type).
#[derive(Debug, Clone)]
pub struct TreeStore {
    root: PathBuf,
}

impl TreeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn node_path(&self, node_type: &str, name: &str) -> PathBuf {
        let file = format!("{name}.xml");
        if node_type.is_empty() {
            self.root.join(file)
        } else {
            self.root.join(node_type).join(file)
        }
    }

    pub fn read(&self, node_type: &str, name: &str) -> anyhow::Result<Element> {
        let path = self.node_path(node_type, name);
        let xml = std::fs::read_to_string(&path)
            .with_context(|| format!("read node file: {}", path.display()))?;
        parse_document(&xml).with_context(|| format!("parse node file: {}", path.display()))
    }

    /// Writes a node atomically: the serialized bytes land in a temp file in
    /// the destination folder which is then persisted over the target, so a
    /// failed write never leaves a half-written node.
    pub fn write(&self, element: &Element, node_type: &str, name: &str) -> anyhow::Result<()> {
        let path = self.node_path(node_type, name);
        let dir = path
            .parent()
            .with_context(|| format!("node path has no parent: {}", path.display()))?;

        let xml = serialize_document(element)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("create temp node file in: {}", dir.display()))?;
        tmp.write_all(xml.as_bytes())
            .with_context(|| format!("write node file: {}", path.display()))?;
        tmp.flush()
            .with_context(|| format!("flush node file: {}", path.display()))?;
        tmp.persist(&path)
            .map_err(std::io::Error::from)
            .with_context(|| format!("persist node file: {}", path.display()))?;

        Ok(())
    }

    pub fn ensure_folder(&self, node_type: &str) -> anyhow::Result<()> {
        let dir = self.root.join(node_type);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create node folder: {}", dir.display()))?;
        Ok(())
    }
}

fn parse_document(xml: &str) -> anyhow::Result<Element> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event().context("read xml event")? {
            Event::Start(start) => {
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack.pop().context("unbalanced closing tag")?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let text = text.unescape().context("unescape text content")?;
                anyhow::bail!("unexpected text content in attribute-only node: {text:?}");
            }
            Event::Eof => break,
            // Declarations, comments and processing instructions carry no
            // node content.
            _ => {}
        }
    }

    anyhow::ensure!(stack.is_empty(), "unclosed element in node file");
    root.context("node file contains no element")
}

fn element_from_start(start: &BytesStart<'_>) -> anyhow::Result<Element> {
    let tag = std::str::from_utf8(start.name().as_ref())
        .context("decode tag name")?
        .to_owned();

    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.context("parse attribute")?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .context("decode attribute name")?
            .to_owned();
        let value = attr
            .unescape_value()
            .context("unescape attribute value")?
            .into_owned();
        attrs.push((key, value));
    }

    Ok(Element {
        tag,
        attrs,
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut Vec<Element>,
    root: &mut Option<Element>,
    element: Element,
) -> anyhow::Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    anyhow::ensure!(
        root.is_none(),
        "node file contains more than one root element"
    );
    *root = Some(element);
    Ok(())
}

fn serialize_document(element: &Element) -> anyhow::Result<String> {
    let mut writer = Writer::new(Vec::new());
    write_element(&mut writer, element)?;
    String::from_utf8(writer.into_inner()).context("serialized node is not utf-8")
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> anyhow::Result<()> {
    let mut start = BytesStart::new(element.tag.as_str());
    for (key, value) in &element.attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer
            .write_event(Event::Empty(start))
            .with_context(|| format!("write element: {}", element.tag))?;
        return Ok(());
    }

    writer
        .write_event(Event::Start(start))
        .with_context(|| format!("write element: {}", element.tag))?;
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.tag.as_str())))
        .with_context(|| format!("close element: {}", element.tag))?;

    Ok(())
}
