//! Lossless tree for the `document.xml` part of a Word document.
//!
//! The parser preserves every byte of the input: markup the engine has no
//! dedicated node kind for is kept as opaque `ELEMENT` nodes, and the XML
//! declaration, comments and inter-element whitespace survive as tokens.
//! Once parsed, the tree can be traversed or modified, and then written
//! back out with `to_string()`.
//!
//! # Example
//!
//! ```rust
//! use docx_template::Document;
//! use std::str::FromStr;
//!
//! let input = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Hello!</w:t></w:r></w:p></w:body></w:document>"#;
//! let doc = Document::from_str(input).unwrap();
//! let body = doc.body().unwrap();
//! assert_eq!(body.paragraphs().count(), 1);
//! assert_eq!(body.paragraphs().next().unwrap().inner_text(), "Hello!");
//! assert_eq!(doc.to_string(), input);
//! ```

use crate::lex::{
    lex,
    SyntaxKind::{self, *},
};
use rowan::ast::AstNode;
use std::path::Path;
use std::str::FromStr;

/// List of encountered syntax errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParseError(pub(crate) Vec<String>);

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for err in &self.0 {
            writeln!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Error reading a document part.
#[derive(Debug)]
pub enum Error {
    /// A syntax error was encountered while parsing the part.
    ParseError(ParseError),

    /// An I/O error was encountered while reading the part.
    IoError(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self {
            Error::ParseError(err) => write!(f, "{}", err),
            Error::IoError(err) => write!(f, "{}", err),
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Self::ParseError(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err)
    }
}

impl std::error::Error for Error {}

/// Implementing the `Language` trait teaches rowan to convert between the
/// raw u16 kinds and our `enum SyntaxKind`, allowing for a nicer
/// SyntaxNode API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lang {}
impl rowan::Language for Lang {
    type Kind = SyntaxKind;
    fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
        unsafe { std::mem::transmute::<u16, SyntaxKind>(raw.0) }
    }
    fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
        kind.into()
    }
}

use rowan::{GreenNode, GreenNodeBuilder};

pub(crate) type SyntaxNode = rowan::SyntaxNode<Lang>;
#[allow(unused)]
pub(crate) type SyntaxToken = rowan::SyntaxToken<Lang>;
pub(crate) type SyntaxElement = rowan::NodeOrToken<SyntaxNode, SyntaxToken>;

/// The element kinds the engine reasons about; everything else stays an
/// opaque `ELEMENT`.
fn element_kind(name: &str) -> SyntaxKind {
    match name {
        "w:document" => DOCUMENT_ELT,
        "w:body" => BODY,
        "w:p" => PARAGRAPH,
        "w:r" => RUN,
        "w:rPr" => RUN_PROPS,
        "w:t" => TEXT,
        "w:br" | "w:cr" => BREAK,
        "w:tab" => TAB,
        "w:tbl" => TABLE,
        "w:tr" => TABLE_ROW,
        "w:tc" => TABLE_CELL,
        _ => ELEMENT,
    }
}

/// The parse results are stored as a "green tree".
pub(crate) struct Parse {
    green_node: GreenNode,
    pub(crate) errors: Vec<String>,
}

pub(crate) fn parse(text: &str) -> Parse {
    struct Parser {
        /// input tokens, including whitespace, in *reverse* order.
        tokens: Vec<(SyntaxKind, String)>,
        /// the in-progress tree.
        builder: GreenNodeBuilder<'static>,
        /// the list of syntax errors we've accumulated so far.
        errors: Vec<String>,
    }

    impl Parser {
        fn parse(mut self) -> Parse {
            self.builder.start_node(ROOT.into());
            while let Some(kind) = self.current() {
                match kind {
                    XML_DECL | COMMENT | DOCTYPE | TEXT_CONTENT => self.bump(),
                    L_ANGLE => self.parse_element(),
                    _ => {
                        self.builder.start_node(ERROR.into());
                        self.errors
                            .push(format!("unexpected {:?} at document level", kind));
                        self.bump();
                        self.builder.finish_node();
                    }
                }
            }
            self.builder.finish_node();

            Parse {
                green_node: self.builder.finish(),
                errors: self.errors,
            }
        }

        fn parse_element(&mut self) {
            // current is L_ANGLE; the element kind depends on the name
            // that follows it.
            let name = match self.peek_nth(1) {
                Some((TAG_NAME, name)) => name,
                _ => {
                    self.builder.start_node(ERROR.into());
                    self.errors.push("expected tag name after '<'".to_owned());
                    self.bump();
                    self.builder.finish_node();
                    return;
                }
            };
            self.builder.start_node(element_kind(&name).into());

            let self_closing = self.parse_open_tag();
            if self_closing {
                self.builder.finish_node();
                return;
            }

            loop {
                match self.current() {
                    None => {
                        self.errors
                            .push(format!("unexpected end of input inside <{}>", name));
                        break;
                    }
                    Some(TEXT_CONTENT) | Some(COMMENT) | Some(XML_DECL) | Some(DOCTYPE) => {
                        self.bump()
                    }
                    Some(L_ANGLE) => self.parse_element(),
                    Some(L_ANGLE_SLASH) => break,
                    Some(kind) => {
                        self.builder.start_node(ERROR.into());
                        self.errors
                            .push(format!("unexpected {:?} inside <{}>", kind, name));
                        self.bump();
                        self.builder.finish_node();
                    }
                }
            }

            if self.current() == Some(L_ANGLE_SLASH) {
                self.builder.start_node(CLOSE_TAG.into());
                self.bump();
                if let Some((TAG_NAME, close_name)) = self.peek_nth(0) {
                    if close_name != name {
                        self.errors
                            .push(format!("expected </{}>, got </{}>", name, close_name));
                    }
                    self.bump();
                }
                while self.current() == Some(TAG_WS) {
                    self.bump();
                }
                if self.current() == Some(R_ANGLE) {
                    self.bump();
                } else {
                    self.errors.push(format!("unterminated </{}>", name));
                }
                self.builder.finish_node();
            }
            self.builder.finish_node();
        }

        /// Parse `<name attr="…" …>` into an OPEN_TAG node; returns true
        /// when the tag was self-closing.
        fn parse_open_tag(&mut self) -> bool {
            self.builder.start_node(OPEN_TAG.into());
            self.bump(); // L_ANGLE
            self.bump(); // TAG_NAME
            let mut self_closing = false;
            loop {
                match self.current() {
                    Some(TAG_WS) | Some(ATTR_NAME) | Some(EQ) | Some(ATTR_VALUE)
                    | Some(ERROR_TOKEN) => self.bump(),
                    Some(R_ANGLE) => {
                        self.bump();
                        break;
                    }
                    Some(SLASH_R_ANGLE) => {
                        self.bump();
                        self_closing = true;
                        break;
                    }
                    _ => {
                        self.errors.push("unterminated tag".to_owned());
                        break;
                    }
                }
            }
            self.builder.finish_node();
            self_closing
        }

        /// Advance one token, adding it to the current branch of the tree builder.
        fn bump(&mut self) {
            let (kind, text) = self.tokens.pop().unwrap();
            self.builder.token(kind.into(), text.as_str());
        }

        /// Peek at the first unprocessed token
        fn current(&self) -> Option<SyntaxKind> {
            self.tokens.last().map(|(kind, _)| *kind)
        }

        fn peek_nth(&self, n: usize) -> Option<(SyntaxKind, String)> {
            self.tokens
                .get(self.tokens.len().checked_sub(n + 1)?)
                .cloned()
        }
    }

    let mut tokens = lex(text);
    tokens.reverse();
    Parser {
        tokens,
        builder: GreenNodeBuilder::new(),
        errors: Vec::new(),
    }
    .parse()
}

impl Parse {
    pub(crate) fn root_mut(&self) -> Document {
        Document::cast(SyntaxNode::new_root_mut(self.green_node.clone())).unwrap()
    }
}

macro_rules! ast_node {
    ($ast:ident, $kind:ident) => {
        #[derive(Clone, PartialEq, Eq, Hash)]
        #[repr(transparent)]
        pub struct $ast(pub(crate) SyntaxNode);
        impl $ast {
            #[allow(unused)]
            pub(crate) fn cast(node: SyntaxNode) -> Option<Self> {
                if node.kind() == $kind {
                    Some(Self(node))
                } else {
                    None
                }
            }
        }

        impl AstNode for $ast {
            type Language = Lang;

            fn can_cast(kind: SyntaxKind) -> bool {
                kind == $kind
            }

            fn cast(syntax: SyntaxNode) -> Option<Self> {
                Self::cast(syntax)
            }

            fn syntax(&self) -> &SyntaxNode {
                &self.0
            }
        }

        impl std::fmt::Display for $ast {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}", self.0.text())
            }
        }
    };
}

ast_node!(Document, ROOT);
ast_node!(Body, BODY);
ast_node!(Paragraph, PARAGRAPH);
ast_node!(Run, RUN);
ast_node!(Text, TEXT);
ast_node!(Break, BREAK);
ast_node!(Tab, TAB);
ast_node!(RunProperties, RUN_PROPS);
ast_node!(Table, TABLE);
ast_node!(TableRow, TABLE_ROW);
ast_node!(TableCell, TABLE_CELL);

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document").finish()
    }
}

const EMPTY_DOCUMENT: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    "<w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">",
    "<w:body/></w:document>"
);

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a new empty document part.
    pub fn new() -> Document {
        parse(EMPTY_DOCUMENT).root_mut()
    }

    /// The `<w:body>` element, if the part has one.
    pub fn body(&self) -> Option<Body> {
        self.0.descendants().find_map(Body::cast)
    }

    /// Read a document part from the given path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_str(&text)?)
    }

    /// Read a document part from the given path, ignoring any syntax errors.
    pub fn from_file_relaxed(
        path: impl AsRef<Path>,
    ) -> Result<(Self, Vec<String>), std::io::Error> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_str_relaxed(&text))
    }

    /// Parse a document part from a string, allowing syntax errors.
    pub fn from_str_relaxed(s: &str) -> (Self, Vec<String>) {
        let parsed = parse(s);
        (parsed.root_mut(), parsed.errors)
    }

    /// Read a document part from a Read object.
    pub fn read<R: std::io::Read>(mut r: R) -> Result<Self, Error> {
        let mut buf = String::new();
        r.read_to_string(&mut buf)?;
        Ok(Self::from_str(&buf)?)
    }

    /// Read a document part from a Read object, allowing syntax errors.
    pub fn read_relaxed<R: std::io::Read>(mut r: R) -> Result<(Self, Vec<String>), std::io::Error> {
        let mut buf = String::new();
        r.read_to_string(&mut buf)?;
        Ok(Self::from_str_relaxed(&buf))
    }

    /// Write the part back out, byte-faithful for everything the engine
    /// did not touch.
    pub fn write_to<W: std::io::Write>(&self, mut w: W) -> std::io::Result<()> {
        w.write_all(self.to_string().as_bytes())
    }
}

impl FromStr for Document {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = parse(s);
        if parsed.errors.is_empty() {
            Ok(parsed.root_mut())
        } else {
            Err(ParseError(parsed.errors))
        }
    }
}

impl Body {
    /// All element children of the body, in document order.
    pub fn block_elements(&self) -> Vec<SyntaxNode> {
        child_elements(&self.0).collect()
    }

    /// Returns an iterator over all paragraphs directly in the body.
    pub fn paragraphs(&self) -> impl Iterator<Item = Paragraph> {
        self.0.children().filter_map(Paragraph::cast)
    }

    /// Returns an iterator over all tables directly in the body.
    pub fn tables(&self) -> impl Iterator<Item = Table> {
        self.0.children().filter_map(Table::cast)
    }
}

impl Paragraph {
    /// Returns an iterator over the runs of the paragraph.
    pub fn runs(&self) -> impl Iterator<Item = Run> {
        self.0.children().filter_map(Run::cast)
    }

    /// The concatenated text of the paragraph's runs, in document order.
    pub fn inner_text(&self) -> String {
        self.runs().map(|r| r.inner_text()).collect()
    }

    /// The `(start, end, run)` character ranges of each run over the
    /// concatenated paragraph text.
    pub fn run_boundaries(&self) -> Vec<(usize, usize, Run)> {
        let mut boundaries = Vec::new();
        let mut offset = 0;
        for run in self.runs() {
            let len = run.inner_text().chars().count();
            boundaries.push((offset, offset + len, run));
            offset += len;
        }
        boundaries
    }

    /// The `<w:pPr>` child, if present.
    pub fn properties_element(&self) -> Option<SyntaxNode> {
        find_child_named(&self.0, "w:pPr")
    }
}

/// The pieces a run's content is assembled from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RunContent {
    Text(String),
    Tab,
    Break,
}

/// Split replacement text into run content, turning tab characters into
/// `<w:tab/>` elements.
pub(crate) fn run_parts(text: &str) -> Vec<RunContent> {
    let mut parts = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c == '\t' {
            if !current.is_empty() {
                parts.push(RunContent::Text(std::mem::take(&mut current)));
            }
            parts.push(RunContent::Tab);
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        parts.push(RunContent::Text(current));
    }
    parts
}

impl Run {
    /// The text of the run: `<w:t>` contents with `\t` for `<w:tab/>`.
    pub fn inner_text(&self) -> String {
        let mut out = String::new();
        for child in self.0.children() {
            match child.kind() {
                TEXT => out.push_str(&Text(child).value()),
                TAB => out.push('\t'),
                _ => {}
            }
        }
        out
    }

    /// The run's `<w:rPr>`, if present.
    pub fn properties(&self) -> Option<RunProperties> {
        self.0.children().find_map(RunProperties::cast)
    }

    /// Build a new run with the given (already detached) properties clone
    /// and content.
    pub(crate) fn build(props: Option<&SyntaxNode>, parts: &[RunContent]) -> SyntaxNode {
        let mut builder = GreenNodeBuilder::new();
        builder.start_node(RUN.into());
        push_open_tag(&mut builder, "w:r", &[]);
        if let Some(props) = props {
            inject(&mut builder, props.clone());
        }
        push_parts(&mut builder, parts);
        push_close_tag(&mut builder, "w:r");
        builder.finish_node();
        SyntaxNode::new_root_mut(builder.finish())
    }

    /// Build a run that carries the same open tag and properties as this
    /// one but the given text.
    pub(crate) fn build_like(&self, text: &str) -> SyntaxNode {
        let mut builder = GreenNodeBuilder::new();
        builder.start_node(RUN.into());
        match open_tag(&self.0) {
            Some(tag) => inject_open_tag(&mut builder, &tag),
            None => push_open_tag(&mut builder, "w:r", &[]),
        }
        if let Some(props) = self.properties() {
            inject(&mut builder, props.0.clone());
        }
        push_parts(&mut builder, &run_parts(text));
        push_close_tag(&mut builder, "w:r");
        builder.finish_node();
        SyntaxNode::new_root_mut(builder.finish())
    }

    /// Replace the run's content in place, keeping its open tag and
    /// properties untouched.
    pub(crate) fn set_inner_text(&self, text: &str) {
        replace_node(&self.0, self.build_like(text));
    }
}

/// Build a run containing a single `<w:br/>`.
pub(crate) fn break_run(props: Option<&SyntaxNode>) -> SyntaxNode {
    Run::build(props, &[RunContent::Break])
}

impl Text {
    /// The entity-unescaped contents of the `<w:t>`.
    pub fn value(&self) -> String {
        let mut out = String::new();
        for child in self.0.children_with_tokens() {
            if let Some(token) = child.as_token() {
                if token.kind() == TEXT_CONTENT {
                    out.push_str(&unescape(token.text()));
                }
            }
        }
        out
    }
}

impl RunProperties {
    /// Whether the record carries no formatting at all.
    pub fn is_empty(&self) -> bool {
        child_elements(&self.0).next().is_none()
    }

    /// A detached deep clone, suitable for attaching to a new run.
    pub fn detached_clone(&self) -> SyntaxNode {
        clone_node(&self.0)
    }

    fn toggle(&self, name: &str) -> bool {
        match find_child_named(&self.0, name) {
            Some(el) => match attribute(&el, "w:val") {
                Some(val) => !matches!(val.as_str(), "false" | "0" | "off" | "none"),
                None => true,
            },
            None => false,
        }
    }

    fn val_of(&self, name: &str) -> Option<String> {
        attribute(&find_child_named(&self.0, name)?, "w:val")
    }

    pub fn bold(&self) -> bool {
        self.toggle("w:b")
    }

    pub fn italic(&self) -> bool {
        self.toggle("w:i")
    }

    pub fn strike(&self) -> bool {
        self.toggle("w:strike")
    }

    pub fn underline(&self) -> Option<String> {
        self.val_of("w:u")
    }

    pub fn font_ascii(&self) -> Option<String> {
        attribute(&find_child_named(&self.0, "w:rFonts")?, "w:ascii")
    }

    pub fn font_hansi(&self) -> Option<String> {
        attribute(&find_child_named(&self.0, "w:rFonts")?, "w:hAnsi")
    }

    pub fn font_east_asia(&self) -> Option<String> {
        attribute(&find_child_named(&self.0, "w:rFonts")?, "w:eastAsia")
    }

    pub fn font_cs(&self) -> Option<String> {
        attribute(&find_child_named(&self.0, "w:rFonts")?, "w:cs")
    }

    pub fn size(&self) -> Option<String> {
        self.val_of("w:sz")
    }

    pub fn size_cs(&self) -> Option<String> {
        self.val_of("w:szCs")
    }

    pub fn color(&self) -> Option<String> {
        self.val_of("w:color")
    }

    pub fn highlight(&self) -> Option<String> {
        self.val_of("w:highlight")
    }

    pub fn shading_fill(&self) -> Option<String> {
        attribute(&find_child_named(&self.0, "w:shd")?, "w:fill")
    }

    /// Field-tuple equality over the character formatting the engine
    /// preserves; missing toggles count as false.
    pub fn equivalent(&self, other: &RunProperties) -> bool {
        self.bold() == other.bold()
            && self.italic() == other.italic()
            && self.strike() == other.strike()
            && self.underline() == other.underline()
            && self.font_ascii() == other.font_ascii()
            && self.font_hansi() == other.font_hansi()
            && self.font_east_asia() == other.font_east_asia()
            && self.font_cs() == other.font_cs()
            && self.size() == other.size()
            && self.size_cs() == other.size_cs()
            && self.color() == other.color()
            && self.highlight() == other.highlight()
            && self.shading_fill() == other.shading_fill()
    }
}

impl Table {
    /// Returns an iterator over the rows of the table.
    pub fn rows(&self) -> impl Iterator<Item = TableRow> {
        self.0.children().filter_map(TableRow::cast)
    }
}

impl TableRow {
    /// Returns an iterator over the cells of the row.
    pub fn cells(&self) -> impl Iterator<Item = TableCell> {
        self.0.children().filter_map(TableCell::cast)
    }

    /// The concatenated text of every cell in the row.
    pub fn inner_text(&self) -> String {
        self.cells().map(|c| c.inner_text()).collect()
    }
}

impl TableCell {
    /// All element children of the cell, in document order.
    pub fn block_elements(&self) -> Vec<SyntaxNode> {
        child_elements(&self.0).collect()
    }

    /// The concatenated text of the cell's paragraphs and nested tables.
    pub fn inner_text(&self) -> String {
        let mut out = String::new();
        for child in child_elements(&self.0) {
            match child.kind() {
                PARAGRAPH => out.push_str(&Paragraph(child).inner_text()),
                TABLE => {
                    for row in Table(child).rows() {
                        out.push_str(&row.inner_text());
                    }
                }
                _ => {}
            }
        }
        out
    }
}

// -- Generic element helpers ------------------------------------------------

/// The OPEN_TAG child of an element node.
pub(crate) fn open_tag(node: &SyntaxNode) -> Option<SyntaxNode> {
    node.children().find(|c| c.kind() == OPEN_TAG)
}

/// The tag name of an element node.
pub(crate) fn tag_name(node: &SyntaxNode) -> Option<String> {
    open_tag(node)?
        .children_with_tokens()
        .filter_map(|it| it.into_token())
        .find(|it| it.kind() == TAG_NAME)
        .map(|it| it.text().to_string())
}

/// Look up an attribute value on an element node, unescaped and without
/// the surrounding quotes.
pub(crate) fn attribute(node: &SyntaxNode, name: &str) -> Option<String> {
    let tag = open_tag(node)?;
    let mut matched = false;
    for child in tag.children_with_tokens() {
        let Some(token) = child.as_token() else {
            continue;
        };
        match token.kind() {
            ATTR_NAME => matched = token.text() == name,
            ATTR_VALUE if matched => {
                let raw = token.text();
                return Some(unescape(&raw[1..raw.len() - 1]));
            }
            EQ | TAG_WS => {}
            _ => matched = false,
        }
    }
    None
}

/// Element children of a node, skipping its own tag nodes.
pub(crate) fn child_elements(node: &SyntaxNode) -> impl Iterator<Item = SyntaxNode> {
    node.children()
        .filter(|c| !matches!(c.kind(), OPEN_TAG | CLOSE_TAG | ERROR))
}

/// The first child element with the given tag name.
pub(crate) fn find_child_named(node: &SyntaxNode, name: &str) -> Option<SyntaxNode> {
    child_elements(node).find(|c| tag_name(c).as_deref() == Some(name))
}

/// Copy a node and everything below it into the builder.
pub(crate) fn inject(builder: &mut GreenNodeBuilder, node: SyntaxNode) {
    builder.start_node(node.kind().into());
    for child in node.children_with_tokens() {
        match child {
            rowan::NodeOrToken::Node(child) => {
                inject(builder, child);
            }
            rowan::NodeOrToken::Token(token) => {
                builder.token(token.kind().into(), token.text());
            }
        }
    }
    builder.finish_node();
}

/// Copy an OPEN_TAG, rewriting a self-closing `/>` into `>` so content
/// can follow.
fn inject_open_tag(builder: &mut GreenNodeBuilder, tag: &SyntaxNode) {
    builder.start_node(OPEN_TAG.into());
    for child in tag.children_with_tokens() {
        if let Some(token) = child.as_token() {
            if token.kind() == SLASH_R_ANGLE {
                builder.token(R_ANGLE.into(), ">");
            } else {
                builder.token(token.kind().into(), token.text());
            }
        }
    }
    builder.finish_node();
}

/// A detached, mutable deep clone of a node.
pub(crate) fn clone_node(node: &SyntaxNode) -> SyntaxNode {
    let mut builder = GreenNodeBuilder::new();
    inject(&mut builder, node.clone());
    SyntaxNode::new_root_mut(builder.finish())
}

/// Insert detached nodes into the anchor's parent, directly after it.
pub(crate) fn insert_after(anchor: &SyntaxNode, nodes: Vec<SyntaxNode>) {
    let Some(parent) = anchor.parent() else {
        return;
    };
    let index = anchor.index() + 1;
    parent.splice_children(
        index..index,
        nodes.into_iter().map(SyntaxElement::from).collect::<Vec<_>>(),
    );
}

/// Insert detached nodes into the anchor's parent, directly before it.
pub(crate) fn insert_before(anchor: &SyntaxNode, nodes: Vec<SyntaxNode>) {
    let Some(parent) = anchor.parent() else {
        return;
    };
    let index = anchor.index();
    parent.splice_children(
        index..index,
        nodes.into_iter().map(SyntaxElement::from).collect::<Vec<_>>(),
    );
}

/// Swap a node for a detached replacement.
pub(crate) fn replace_node(old: &SyntaxNode, new: SyntaxNode) {
    let Some(parent) = old.parent() else {
        return;
    };
    parent.splice_children(old.index()..old.index() + 1, vec![new.into()]);
}

/// Detach a node unless it has already been removed.
pub(crate) fn detach(node: &SyntaxNode) {
    if node.parent().is_some() {
        node.detach();
    }
}

/// Whether the node is still part of a tree.
pub(crate) fn is_attached(node: &SyntaxNode) -> bool {
    node.parent().is_some()
}

// -- Green construction helpers ---------------------------------------------

fn push_open_tag(builder: &mut GreenNodeBuilder, name: &str, attrs: &[(&str, &str)]) {
    builder.start_node(OPEN_TAG.into());
    builder.token(L_ANGLE.into(), "<");
    builder.token(TAG_NAME.into(), name);
    for (attr, value) in attrs {
        builder.token(TAG_WS.into(), " ");
        builder.token(ATTR_NAME.into(), attr);
        builder.token(EQ.into(), "=");
        builder.token(ATTR_VALUE.into(), &format!("\"{}\"", escape_attr(value)));
    }
    builder.token(R_ANGLE.into(), ">");
    builder.finish_node();
}

fn push_self_closing_tag(
    builder: &mut GreenNodeBuilder,
    kind: SyntaxKind,
    name: &str,
    attrs: &[(&str, &str)],
) {
    builder.start_node(kind.into());
    builder.start_node(OPEN_TAG.into());
    builder.token(L_ANGLE.into(), "<");
    builder.token(TAG_NAME.into(), name);
    for (attr, value) in attrs {
        builder.token(TAG_WS.into(), " ");
        builder.token(ATTR_NAME.into(), attr);
        builder.token(EQ.into(), "=");
        builder.token(ATTR_VALUE.into(), &format!("\"{}\"", escape_attr(value)));
    }
    builder.token(SLASH_R_ANGLE.into(), "/>");
    builder.finish_node();
    builder.finish_node();
}

fn push_close_tag(builder: &mut GreenNodeBuilder, name: &str) {
    builder.start_node(CLOSE_TAG.into());
    builder.token(L_ANGLE_SLASH.into(), "</");
    builder.token(TAG_NAME.into(), name);
    builder.token(R_ANGLE.into(), ">");
    builder.finish_node();
}

/// Write a `<w:t>` element; the `xml:space` attribute is added when the
/// text has significant leading or trailing whitespace.
fn push_text_element(builder: &mut GreenNodeBuilder, text: &str) {
    let needs_space = text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace);
    builder.start_node(TEXT.into());
    if needs_space {
        push_open_tag(builder, "w:t", &[("xml:space", "preserve")]);
    } else {
        push_open_tag(builder, "w:t", &[]);
    }
    builder.token(TEXT_CONTENT.into(), &escape_text(text));
    push_close_tag(builder, "w:t");
    builder.finish_node();
}

fn push_parts(builder: &mut GreenNodeBuilder, parts: &[RunContent]) {
    for part in parts {
        match part {
            RunContent::Text(text) => push_text_element(builder, text),
            RunContent::Tab => push_self_closing_tag(builder, TAB, "w:tab", &[]),
            RunContent::Break => push_self_closing_tag(builder, BREAK, "w:br", &[]),
        }
    }
}

// -- Entity escaping --------------------------------------------------------

pub(crate) fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn escape_attr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices();
    while let Some((i, c)) = chars.next() {
        if c != '&' {
            out.push(c);
            continue;
        }
        let rest = &text[i..];
        let Some(end) = rest.find(';') else {
            out.push(c);
            continue;
        };
        let entity = &rest[1..end];
        let replacement = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity.strip_prefix('#').and_then(|num| {
                let code = if let Some(hex) = num.strip_prefix('x').or(num.strip_prefix('X')) {
                    u32::from_str_radix(hex, 16).ok()?
                } else {
                    num.parse().ok()?
                };
                char::from_u32(code)
            }),
        };
        match replacement {
            Some(r) => {
                out.push(r);
                // the '&' is already consumed; skip the entity body and ';'
                for _ in 0..end {
                    chars.next();
                }
            }
            None => out.push(c),
        }
    }
    out
}
