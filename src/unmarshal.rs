//! XML to tag trees and converted values.
//!
//! The [`Unmarshaller`] reads a document as a stream of tokens and only
//! builds the parts of the tree it needs. In tree-model mode every element is
//! materialized and the whole document comes back as a [`Document`]. In
//! conversion mode elements outside any subtree rooted at an element with a
//! registered converter are skipped (their descendants are still examined),
//! subtrees rooted at such an element are materialized, and when a subtree's
//! end tag arrives its converter turns it into a value.
//!
//! A value produced for a topmost converted element is returned to the
//! caller. A value produced deeper is handed to the converter of its direct
//! parent element, if that element has one.
//!
//! ```
//! use adaptive_xml::{fn_converter, CompositeTag, ConvertedObjects, QName, Unmarshaller};
//!
//! let mut unmarshaller = Unmarshaller::new();
//! unmarshaller.register_converter(
//!     "point",
//!     fn_converter(|tag: &CompositeTag, _: &ConvertedObjects| {
//!         let x = tag.simple_tag_by_name(&"x".into())?.map(|t| t.value()).unwrap_or_default();
//!         Ok(x)
//!     }),
//! );
//!
//! let mut objects = unmarshaller
//!     .unmarshal_str("<shapes><point><x>3</x></point><line/><point><x>5</x></point></shapes>")
//!     .unwrap();
//! let xs: Vec<String> = objects.take(&QName::local("point")).unwrap();
//! assert_eq!(xs, ["3", "5"]);
//! ```

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::config::UnmarshalConfig;
use crate::convert::{ConvertedObjects, UnmarshalConverter};
use crate::document::Document;
use crate::error::{Error, ErrorCategory, Result};
use crate::pool::TagPool;
use crate::qname::QName;
use crate::tag::{CompositeTag, SimpleTag, Tag};
use crate::tokens::{Token, TokenStream};

/// Name of the virtual composite anchoring the tree while parsing.
const ANCHOR_NAME: &str = "root";

/// Converts XML into tag trees or converted values.
///
/// Tags handed to converters may come from the unmarshaller's [`TagPool`]
/// and are reused by later subtrees, so converters must copy out what they
/// need instead of keeping the tags.
#[derive(Default)]
pub struct Unmarshaller {
    converters: IndexMap<QName, Rc<dyn UnmarshalConverter>>,
    config: UnmarshalConfig,
    pool: TagPool,
}

impl fmt::Debug for Unmarshaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unmarshaller")
            .field("converters", &self.converters.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .field("pool", &self.pool)
            .finish()
    }
}

impl Unmarshaller {
    /// Creates an unmarshaller with no converters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: UnmarshalConfig) -> Self {
        self.config = config;
        self
    }

    /// The configuration.
    pub fn config(&self) -> &UnmarshalConfig {
        &self.config
    }

    /// The tag pool used in conversion mode.
    pub fn pool(&self) -> &TagPool {
        &self.pool
    }

    /// Replaces the whole converter registry.
    pub fn register_converters<I>(&mut self, converters: I)
    where
        I: IntoIterator<Item = (QName, Rc<dyn UnmarshalConverter>)>,
    {
        self.converters = converters.into_iter().collect();
        debug!(count = self.converters.len(), "replaced converter registry");
    }

    /// Registers one converter, returning the one it replaces.
    pub fn register_converter<N: Into<QName>>(
        &mut self,
        name: N,
        converter: Rc<dyn UnmarshalConverter>,
    ) -> Option<Rc<dyn UnmarshalConverter>> {
        self.converters.insert(name.into(), converter)
    }

    /// A copy of the converter registry.
    pub fn registered_mapping(&self) -> IndexMap<QName, Rc<dyn UnmarshalConverter>> {
        self.converters.clone()
    }

    /// Reads the whole document into a tree model.
    pub fn tree_model<R: Read>(&self, input: R) -> Result<Document> {
        self.tree_model_from_bytes(&read_all(input)?)
    }

    /// Reads a document from a string into a tree model.
    pub fn tree_model_from_str(&self, input: &str) -> Result<Document> {
        self.tree_model_from_bytes(input.as_bytes())
    }

    /// Reads a document from a file into a tree model.
    pub fn tree_model_from_path<P: AsRef<Path>>(&self, path: P) -> Result<Document> {
        self.tree_model(open(path.as_ref())?)
    }

    /// Reads a document and returns the values produced by converters of the
    /// topmost converted elements, grouped by element name.
    pub fn unmarshal<R: Read>(&mut self, input: R) -> Result<ConvertedObjects> {
        let bytes = read_all(input)?;
        self.unmarshal_bytes(&bytes)
    }

    /// [`Unmarshaller::unmarshal`] over a string.
    pub fn unmarshal_str(&mut self, input: &str) -> Result<ConvertedObjects> {
        self.unmarshal_bytes(input.as_bytes())
    }

    /// [`Unmarshaller::unmarshal`] over a file.
    pub fn unmarshal_path<P: AsRef<Path>>(&mut self, path: P) -> Result<ConvertedObjects> {
        let file = open(path.as_ref())?;
        self.unmarshal(file)
    }

    fn tree_model_from_bytes(&self, input: &[u8]) -> Result<Document> {
        debug!(bytes = input.len(), "building tree model");
        let mut tokens = TokenStream::new(input);
        let mut pass = Pass::new(&self.converters, None, false);
        pass.run(&mut tokens)?;

        let anchor = pass.anchor;
        let root = match anchor.all_composite_tags().into_iter().next() {
            Some(root) => {
                anchor.remove_tag(&Tag::Composite(root.clone()));
                root
            }
            None => anchor,
        };

        let mut document = Document::new(root);
        document.set_encoding(tokens.encoding().unwrap_or_default());
        document.set_version(tokens.version().unwrap_or_default());
        Ok(document)
    }

    fn unmarshal_bytes(&mut self, input: &[u8]) -> Result<ConvertedObjects> {
        debug!(bytes = input.len(), converters = self.converters.len(), "unmarshalling");
        let pool = if self.config.use_tag_pool {
            Some(&mut self.pool)
        } else {
            None
        };
        let mut tokens = TokenStream::new(input);
        let mut pass = Pass::new(&self.converters, pool, true);
        pass.run(&mut tokens)?;
        debug!(names = pass.result.len(), "unmarshalling finished");
        Ok(pass.result)
    }
}

fn read_all<R: Read>(mut input: R) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|err| {
        Error::validation(format!("cannot open {}: {}", path.display(), err))
    })
}

struct Frame {
    tag: CompositeTag,
    converter: Option<Rc<dyn UnmarshalConverter>>,
    children: ConvertedObjects,
}

enum Open {
    Skipped,
    Element(Frame),
}

/// State of one parse.
struct Pass<'u> {
    converters: &'u IndexMap<QName, Rc<dyn UnmarshalConverter>>,
    pool: Option<&'u mut TagPool>,
    convert: bool,
    anchor: CompositeTag,
    open: Vec<Open>,
    depth: usize,
    result: ConvertedObjects,
}

impl<'u> Pass<'u> {
    fn new(
        converters: &'u IndexMap<QName, Rc<dyn UnmarshalConverter>>,
        pool: Option<&'u mut TagPool>,
        convert: bool,
    ) -> Self {
        Self {
            converters,
            pool,
            convert,
            anchor: CompositeTag::new(ANCHOR_NAME),
            open: Vec::new(),
            depth: 0,
            result: ConvertedObjects::new(),
        }
    }

    fn run(&mut self, tokens: &mut TokenStream<'_>) -> Result<()> {
        loop {
            match tokens.next_token()? {
                Token::StartElement {
                    name,
                    attributes,
                    namespaces,
                } => self.start(tokens, name, attributes, namespaces)?,
                Token::EndElement { .. } => self.end()?,
                // Mixed content and text outside materialized subtrees.
                Token::Characters(_) => {}
                Token::EndDocument => return Ok(()),
            }
        }
    }

    fn start(
        &mut self,
        tokens: &mut TokenStream<'_>,
        name: QName,
        attributes: IndexMap<QName, String>,
        namespaces: IndexMap<String, String>,
    ) -> Result<()> {
        if self.convert && self.depth == 0 && !self.converters.contains_key(&name) {
            trace!(name = %name, "skipping element");
            self.open.push(Open::Skipped);
            return Ok(());
        }

        let mut text = String::new();
        loop {
            match tokens.peek()? {
                Token::Characters(chunk) => text.push_str(chunk),
                _ => break,
            }
            tokens.next_token()?;
        }

        if matches!(tokens.peek()?, Token::EndElement { .. }) {
            tokens.next_token()?;
            if self.convert && self.depth == 0 {
                trace!(name = %name, "converters only apply to composite elements");
                return Ok(());
            }
            let tag = self.simple_tag(&name);
            tag.set_attributes(attributes);
            tag.set_namespaces(namespaces);
            tag.set_value(text);
            self.parent().add_tag(tag.into())?;
            return Ok(());
        }

        let tag = self.composite_tag(&name);
        tag.set_attributes(attributes);
        tag.set_namespaces(namespaces);
        self.parent().add_tag(tag.clone().into())?;
        let converter = if self.convert {
            self.converters.get(&name).cloned()
        } else {
            None
        };
        trace!(name = %name, depth = self.depth, converting = converter.is_some(), "materialized element");
        self.open.push(Open::Element(Frame {
            tag,
            converter,
            children: ConvertedObjects::new(),
        }));
        self.depth += 1;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        match self.open.pop() {
            None => Err(Error::structural("end tag without a matching open element")),
            Some(Open::Skipped) => Ok(()),
            Some(Open::Element(frame)) => {
                self.depth -= 1;
                if self.convert {
                    self.complete(frame)?;
                }
                Ok(())
            }
        }
    }

    fn complete(&mut self, frame: Frame) -> Result<()> {
        let Frame {
            tag,
            converter,
            children,
        } = frame;
        let name = tag.name();
        let value = match &converter {
            Some(converter) => converter.convert(&tag, &children).map_err(|err| {
                if err.category() == ErrorCategory::Conversion {
                    err
                } else {
                    Error::conversion(format!("converter for {} failed: {}", name, err))
                }
            })?,
            None => None,
        };

        if self.depth > 0 {
            if let (Some(value), Some(Open::Element(parent))) = (value, self.open.last_mut()) {
                if parent.converter.is_some() {
                    parent.children.push(name, value);
                }
            }
            return Ok(());
        }

        if let Some(value) = value {
            self.result.push(name, value);
        }
        self.anchor.remove_tag(&Tag::Composite(tag));
        if let Some(pool) = self.pool.as_deref_mut() {
            pool.update_composite_tags_free_slots();
            pool.update_simple_tags_free_slots();
        }
        Ok(())
    }

    fn parent(&self) -> CompositeTag {
        match self.open.last() {
            Some(Open::Element(frame)) => frame.tag.clone(),
            _ => self.anchor.clone(),
        }
    }

    fn simple_tag(&mut self, name: &QName) -> SimpleTag {
        match self.pool.as_deref_mut() {
            Some(pool) => pool.acquire_simple(name),
            None => SimpleTag::new(name.clone()),
        }
    }

    fn composite_tag(&mut self, name: &QName) -> CompositeTag {
        match self.pool.as_deref_mut() {
            Some(pool) => pool.acquire_composite(name),
            None => CompositeTag::new(name.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::fn_converter;

    fn values_of(tag: &CompositeTag, name: &str) -> Result<Vec<String>> {
        Ok(tag
            .all_simple_tags_by_name(&QName::local(name))?
            .iter()
            .map(SimpleTag::value)
            .collect())
    }

    fn local_names(tag: &CompositeTag) -> Vec<String> {
        tag.children()
            .iter()
            .map(|t| t.name().local_part().to_string())
            .collect()
    }

    #[test]
    fn test_tree_model_keeps_order_attributes_and_namespaces() {
        let xml = r#"<?xml version="1.1" encoding="ISO-8859-1"?>
            <sample xmlns:insane="http://evil.org" sample-attr="evil">
                <s1>one</s1>
                <c1><x>1</x></c1>
                <s2/>
                <insane:c2><y>2</y></insane:c2>
            </sample>"#;
        let document = Unmarshaller::new().tree_model_from_str(xml).unwrap();
        assert_eq!(document.version(), "1.1");
        assert_eq!(document.encoding(), "ISO-8859-1");

        let root = document.root().unwrap();
        assert!(root.parent().is_none());
        assert_eq!(root.name(), QName::local("sample"));
        assert_eq!(root.attribute(&QName::local("sample-attr")).as_deref(), Some("evil"));
        assert_eq!(root.namespace("insane").as_deref(), Some("http://evil.org"));
        assert_eq!(local_names(root), ["s1", "c1", "s2", "c2"]);

        let c2 = root
            .composite_tag_by_name(&QName::new("http://evil.org", "c2"))
            .unwrap()
            .unwrap();
        assert_eq!(c2.name().prefix(), "insane");
        assert_eq!(values_of(&c2, "y").unwrap(), ["2"]);
        assert_eq!(root.simple_tag_by_name(&"s2".into()).unwrap().unwrap().value(), "");
    }

    #[test]
    fn test_defaults_without_declaration() {
        let document = Unmarshaller::new().tree_model_from_str("<a><b>x</b></a>").unwrap();
        assert_eq!(document.version(), "1.0");
        assert_eq!(document.encoding(), "UTF-8");
    }

    #[test]
    fn test_lone_simple_root_is_kept_under_anchor() {
        let document = Unmarshaller::new().tree_model_from_str("<only>text</only>").unwrap();
        let root = document.root().unwrap();
        assert_eq!(root.name().local_part(), ANCHOR_NAME);
        assert_eq!(root.simple_tag_by_name(&"only".into()).unwrap().unwrap().value(), "text");
    }

    #[test]
    fn test_mixed_content_text_dropped() {
        let document = Unmarshaller::new()
            .tree_model_from_str("<a>lead<b>x</b>tail</a>")
            .unwrap();
        let root = document.root().unwrap();
        assert_eq!(local_names(root), ["b"]);
    }

    #[test]
    fn test_converts_registered_subtrees_only() {
        let mut unmarshaller = Unmarshaller::new();
        unmarshaller.register_converter(
            "item",
            fn_converter(|tag: &CompositeTag, _: &ConvertedObjects| values_of(tag, "v")),
        );
        let xml = "<doc><skip><item><v>1</v></item></skip><item><v>2</v><v>3</v></item><item/></doc>";
        let mut objects = unmarshaller.unmarshal_str(xml).unwrap();
        let items: Vec<Vec<String>> = objects.take(&QName::local("item")).unwrap();
        assert_eq!(items, vec![vec!["1".to_string()], vec!["2".to_string(), "3".to_string()]]);
        assert!(objects.is_empty());
        assert_eq!(unmarshaller.pool().pooled_composite(&"skip".into()), 0);
        assert_eq!(unmarshaller.pool().pooled_composite(&"doc".into()), 0);
        assert_eq!(unmarshaller.pool().pooled_composite(&"item".into()), 1);
    }

    fn deep_document(depth: usize) -> String {
        format!("{}<v>x</v>{}", "<n>".repeat(depth), "</n>".repeat(depth))
    }

    #[test]
    fn test_deep_tree_model() {
        let depth = 50_000;
        let document = Unmarshaller::new()
            .tree_model_from_str(&deep_document(depth))
            .unwrap();
        let mut cursor = document.root().unwrap().clone();
        assert_eq!(cursor.name(), QName::local("n"));
        for _ in 1..depth {
            cursor = cursor.composite_tag_by_name(&"n".into()).unwrap().unwrap();
        }
        let leaf = cursor.simple_tag_by_name(&"v".into()).unwrap().unwrap();
        assert_eq!(leaf.value(), "x");
        drop(cursor);
        drop(document);
    }

    #[test]
    fn test_deep_unmarshal() {
        let mut unmarshaller = Unmarshaller::new();
        unmarshaller.register_converter(
            "n",
            fn_converter(|tag: &CompositeTag, _: &ConvertedObjects| Ok(tag.child_count())),
        );
        let mut objects = unmarshaller.unmarshal_str(&deep_document(50_000)).unwrap();
        let counts: Vec<usize> = objects.take(&QName::local("n")).unwrap();
        assert_eq!(counts, [1]);
        assert_eq!(unmarshaller.pool().pooled_composite(&"n".into()), 50_000);
    }

    #[test]
    fn test_nested_values_reach_converting_parent() {
        let mut unmarshaller = Unmarshaller::new();
        unmarshaller.register_converter(
            "group",
            fn_converter(|_: &CompositeTag, children: &ConvertedObjects| {
                Ok(children.all::<String>(&QName::local("member")).len())
            }),
        );
        unmarshaller.register_converter(
            "member",
            fn_converter(|tag: &CompositeTag, _: &ConvertedObjects| Ok(values_of(tag, "name")?.join(","))),
        );
        let xml = "<groups>\
            <group><member><name>a</name></member><member><name>b</name></member></group>\
            <group><wrapper><member><name>c</name></member></wrapper></group>\
            </groups>";
        let objects = unmarshaller.unmarshal_str(xml).unwrap();
        let counts: Vec<&usize> = objects.all(&QName::local("group"));
        assert_eq!(counts, vec![&2, &0]);
        assert_eq!(objects.count(&QName::local("member")), 0);
    }

    #[test]
    fn test_converter_failure_is_conversion_error() {
        let mut unmarshaller = Unmarshaller::new();
        unmarshaller.register_converter(
            "item",
            fn_converter(|tag: &CompositeTag, _: &ConvertedObjects| {
                tag.simple_tag_by_name(&QName::local(""))
            }),
        );
        let err = unmarshaller.unmarshal_str("<item><v/></item>").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Conversion);
    }

    #[test]
    fn test_pool_settles_at_peak_usage() {
        let mut unmarshaller = Unmarshaller::new();
        unmarshaller.register_converter(
            "item",
            fn_converter(|tag: &CompositeTag, _: &ConvertedObjects| values_of(tag, "v")),
        );
        let xml = "<items>\
            <item><v>1</v><v>2</v></item>\
            <item><v>3</v><v>4</v></item>\
            <item><v>5</v></item>\
            </items>";
        for _ in 0..2 {
            let mut objects = unmarshaller.unmarshal_str(xml).unwrap();
            let items: Vec<Vec<String>> = objects.take(&QName::local("item")).unwrap();
            assert_eq!(items, [vec!["1", "2"], vec!["3", "4"], vec!["5"]]);
        }
        assert_eq!(unmarshaller.pool().pooled_simple(&QName::local("v")), 2);
        assert_eq!(unmarshaller.pool().pooled_composite(&QName::local("item")), 1);
        assert_eq!(unmarshaller.pool().free_simple_slots(&QName::local("v")), 2);
    }

    #[test]
    fn test_pool_can_be_disabled() {
        let mut unmarshaller =
            Unmarshaller::new().with_config(UnmarshalConfig::new().with_tag_pool(false));
        unmarshaller.register_converter(
            "item",
            fn_converter(|tag: &CompositeTag, _: &ConvertedObjects| values_of(tag, "v")),
        );
        unmarshaller.unmarshal_str("<item><v>1</v></item>").unwrap();
        assert_eq!(unmarshaller.pool().pooled_simple(&QName::local("v")), 0);
    }

    #[test]
    fn test_registry_replaced_wholesale() {
        let mut unmarshaller = Unmarshaller::new();
        unmarshaller.register_converter(
            "a",
            fn_converter(|_: &CompositeTag, _: &ConvertedObjects| Ok(1u8)),
        );
        let b: Rc<dyn UnmarshalConverter> =
            fn_converter(|_: &CompositeTag, _: &ConvertedObjects| Ok(2u8));
        unmarshaller.register_converters(vec![(QName::local("b"), b)]);
        let registry = unmarshaller.registered_mapping();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains_key(&QName::local("b")));
    }

    #[test]
    fn test_input_failures() {
        let mut unmarshaller = Unmarshaller::new();
        let err = unmarshaller
            .unmarshal_path("/definitely/not/here.xml")
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);

        let err = unmarshaller.tree_model_from_str("<a><b></a>").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Stream);

        let err = unmarshaller.unmarshal_str("<a/><b/>").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Structural);
    }
}
