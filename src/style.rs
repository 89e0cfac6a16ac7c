//! Preserving run formatting through edits.
//!
//! Replacement text inherits formatting two ways: node-level edits clone
//! the `<w:rPr>` of the run they replace, and in-paragraph text surgery
//! tracks, per character, which original run it came from so the
//! paragraph can be rebuilt with each surviving character's formatting.

use crate::document::{child_elements, clone_node, inject, tag_name, Paragraph, Run, SyntaxNode};
use crate::lex::SyntaxKind::{CLOSE_TAG, RUN, RUN_PROPS};
use regex::Regex;
use rowan::ast::AstNode;
use rowan::GreenNodeBuilder;
use std::ops::Range;
use std::sync::OnceLock;

/// Paragraph text with, per character, the index of the run it
/// originated from. Inserted characters take over the origin of the text
/// they replace, so rebuilt runs keep the surrounding formatting.
#[derive(Debug, Clone)]
pub(crate) struct TextBuf {
    pub chars: Vec<char>,
    pub origins: Vec<usize>,
}

impl TextBuf {
    pub fn new() -> TextBuf {
        TextBuf {
            chars: Vec::new(),
            origins: Vec::new(),
        }
    }

    /// Extract a paragraph's text buffer together with the runs the
    /// origins index into.
    pub fn from_paragraph(paragraph: &Paragraph) -> (TextBuf, Vec<Run>) {
        let runs: Vec<Run> = paragraph.runs().collect();
        let mut buf = TextBuf::new();
        for (index, run) in runs.iter().enumerate() {
            for c in run.inner_text().chars() {
                buf.chars.push(c);
                buf.origins.push(index);
            }
        }
        (buf, runs)
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn slice(&self, range: Range<usize>) -> TextBuf {
        TextBuf {
            chars: self.chars[range.clone()].to_vec(),
            origins: self.origins[range].to_vec(),
        }
    }

    fn origin_for(&self, range: &Range<usize>) -> usize {
        self.origins
            .get(range.start)
            .or_else(|| range.start.checked_sub(1).and_then(|i| self.origins.get(i)))
            .copied()
            .unwrap_or(0)
    }

    /// Replace a character range with plain text; the new characters
    /// take the formatting origin of the range start.
    pub fn splice_str(&mut self, range: Range<usize>, replacement: &str) {
        let origin = self.origin_for(&range);
        let chars: Vec<char> = replacement.chars().collect();
        let origins = vec![origin; chars.len()];
        self.chars.splice(range.clone(), chars);
        self.origins.splice(range, origins);
    }

    /// Replace a character range with another buffer, keeping its
    /// per-character origins.
    pub fn splice_buf(&mut self, range: Range<usize>, replacement: &TextBuf) {
        self.chars.splice(range.clone(), replacement.chars.iter().copied());
        self.origins
            .splice(range, replacement.origins.iter().copied());
    }

    pub fn extend(&mut self, other: &TextBuf) {
        self.chars.extend_from_slice(&other.chars);
        self.origins.extend_from_slice(&other.origins);
    }
}

/// Rebuild a paragraph's runs from a text buffer: consecutive characters
/// with the same origin become one run carrying that origin run's
/// properties. Children before the first run (`w:pPr` and friends) stay
/// in place.
pub(crate) fn rebuild_paragraph(paragraph: &Paragraph, buf: &TextBuf, runs: &[Run]) {
    let node = paragraph.syntax();
    let Some(first_run) = node.children().find(|c| c.kind() == RUN) else {
        return;
    };
    let end_index = node
        .children()
        .find(|c| c.kind() == CLOSE_TAG)
        .map(|c| c.index())
        .unwrap_or_else(|| node.children_with_tokens().count());

    let mut new_runs: Vec<SyntaxNode> = Vec::new();
    let mut i = 0;
    while i < buf.chars.len() {
        let origin = buf.origins[i];
        let mut text = String::new();
        while i < buf.chars.len() && buf.origins[i] == origin {
            text.push(buf.chars[i]);
            i += 1;
        }
        let props = runs
            .get(origin)
            .and_then(|r| r.properties())
            .map(|p| p.detached_clone());
        new_runs.push(Run::build(props.as_ref(), &crate::document::run_parts(&text)));
    }

    node.splice_children(
        first_run.index()..end_index,
        new_runs.into_iter().map(Into::into).collect::<Vec<_>>(),
    );
}

/// Walk the runs in document order and deep-clone the first non-empty
/// properties record, for attaching to a merged replacement run.
pub(crate) fn first_properties_clone<'a>(
    runs: impl IntoIterator<Item = &'a Run>,
) -> Option<SyntaxNode> {
    for run in runs {
        if let Some(props) = run.properties() {
            if !props.is_empty() {
                return Some(props.detached_clone());
            }
        }
    }
    None
}

/// A fragment of replacement text with markdown-derived styling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MdSegment {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub strike: bool,
}

impl MdSegment {
    fn plain(text: &str) -> MdSegment {
        MdSegment {
            text: text.to_owned(),
            bold: false,
            italic: false,
            strike: false,
        }
    }
}

fn markdown_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*|\*(.+?)\*|~~(.+?)~~").unwrap())
}

/// Whether a replacement value contains any markdown emphasis spans.
pub(crate) fn contains_markdown(text: &str) -> bool {
    markdown_regex().is_match(text)
}

/// Split a replacement value into styled segments.
pub(crate) fn parse_markdown(text: &str) -> Vec<MdSegment> {
    let mut segments = Vec::new();
    let mut last = 0;
    for captures in markdown_regex().captures_iter(text) {
        let whole = captures.get(0).unwrap();
        if whole.start() > last {
            segments.push(MdSegment::plain(&text[last..whole.start()]));
        }
        if let Some(bold) = captures.get(1) {
            segments.push(MdSegment {
                text: bold.as_str().to_owned(),
                bold: true,
                italic: false,
                strike: false,
            });
        } else if let Some(italic) = captures.get(2) {
            segments.push(MdSegment {
                text: italic.as_str().to_owned(),
                bold: false,
                italic: true,
                strike: false,
            });
        } else if let Some(strike) = captures.get(3) {
            segments.push(MdSegment {
                text: strike.as_str().to_owned(),
                bold: false,
                italic: false,
                strike: true,
            });
        }
        last = whole.end();
    }
    if last < text.len() {
        segments.push(MdSegment::plain(&text[last..]));
    }
    segments
}

/// Produce a properties record with markdown flags merged on top of an
/// optional base clone.
pub(crate) fn merge_markdown(
    base: Option<&SyntaxNode>,
    bold: bool,
    italic: bool,
    strike: bool,
) -> Option<SyntaxNode> {
    if !bold && !italic && !strike {
        return base.map(clone_node);
    }

    let mut builder = GreenNodeBuilder::new();
    builder.start_node(RUN_PROPS.into());
    push_tag_tokens(&mut builder, "<", "w:rPr", ">");

    let mut has_bold = false;
    let mut has_italic = false;
    let mut has_strike = false;
    if let Some(base) = base {
        for child in child_elements(base) {
            match tag_name(&child).as_deref() {
                Some("w:b") => has_bold = true,
                Some("w:i") => has_italic = true,
                Some("w:strike") => has_strike = true,
                _ => {}
            }
        }
    }
    if bold && !has_bold {
        push_flag_element(&mut builder, "w:b");
    }
    if italic && !has_italic {
        push_flag_element(&mut builder, "w:i");
    }
    if strike && !has_strike {
        push_flag_element(&mut builder, "w:strike");
    }
    if let Some(base) = base {
        for child in child_elements(base) {
            inject(&mut builder, child);
        }
    }

    push_tag_tokens(&mut builder, "</", "w:rPr", ">");
    builder.finish_node();
    Some(crate::document::SyntaxNode::new_root_mut(builder.finish()))
}

fn push_tag_tokens(builder: &mut GreenNodeBuilder, open: &str, name: &str, close: &str) {
    use crate::lex::SyntaxKind::{L_ANGLE, L_ANGLE_SLASH, OPEN_TAG, R_ANGLE, TAG_NAME};
    let tag_kind = if open == "<" { OPEN_TAG } else { CLOSE_TAG };
    builder.start_node(tag_kind.into());
    builder.token(
        if open == "<" { L_ANGLE } else { L_ANGLE_SLASH }.into(),
        open,
    );
    builder.token(TAG_NAME.into(), name);
    builder.token(R_ANGLE.into(), close);
    builder.finish_node();
}

fn push_flag_element(builder: &mut GreenNodeBuilder, name: &str) {
    use crate::lex::SyntaxKind::{ELEMENT, L_ANGLE, OPEN_TAG, SLASH_R_ANGLE, TAG_NAME};
    builder.start_node(ELEMENT.into());
    builder.start_node(OPEN_TAG.into());
    builder.token(L_ANGLE.into(), "<");
    builder.token(TAG_NAME.into(), name);
    builder.token(SLASH_R_ANGLE.into(), "/>");
    builder.finish_node();
    builder.finish_node();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, RunProperties};

    fn paragraph(doc: &Document) -> Paragraph {
        doc.body().unwrap().paragraphs().next().unwrap()
    }

    #[test]
    fn test_textbuf_from_paragraph() {
        let doc: Document = concat!(
            "<w:document><w:body><w:p>",
            "<w:r><w:rPr><w:b/></w:rPr><w:t>ab</w:t></w:r>",
            "<w:r><w:t>cd</w:t></w:r>",
            "</w:p></w:body></w:document>"
        )
        .parse()
        .unwrap();
        let (buf, runs) = TextBuf::from_paragraph(&paragraph(&doc));
        assert_eq!(buf.text(), "abcd");
        assert_eq!(buf.origins, vec![0, 0, 1, 1]);
        assert_eq!(runs.len(), 2);
    }

    #[test]
    fn test_splice_str_inherits_origin() {
        let doc: Document = concat!(
            "<w:document><w:body><w:p>",
            "<w:r><w:t>xx</w:t></w:r><w:r><w:t>yy</w:t></w:r>",
            "</w:p></w:body></w:document>"
        )
        .parse()
        .unwrap();
        let (mut buf, _) = TextBuf::from_paragraph(&paragraph(&doc));
        buf.splice_str(2..4, "ZZZ");
        assert_eq!(buf.text(), "xxZZZ");
        assert_eq!(buf.origins, vec![0, 0, 1, 1, 1]);
        buf.splice_str(0..1, "");
        assert_eq!(buf.text(), "xZZZ");
    }

    #[test]
    fn test_rebuild_groups_by_origin() {
        let doc: Document = concat!(
            "<w:document><w:body><w:p><w:pPr><w:jc w:val=\"both\"/></w:pPr>",
            "<w:r><w:rPr><w:b/></w:rPr><w:t>bold</w:t></w:r>",
            "<w:r><w:t>plain</w:t></w:r>",
            "</w:p></w:body></w:document>"
        )
        .parse()
        .unwrap();
        let p = paragraph(&doc);
        let (mut buf, runs) = TextBuf::from_paragraph(&p);
        buf.splice_str(0..4, "BOLD");
        rebuild_paragraph(&p, &buf, &runs);
        let p = paragraph(&doc);
        assert_eq!(p.inner_text(), "BOLDplain");
        let rebuilt: Vec<Run> = p.runs().collect();
        assert_eq!(rebuilt.len(), 2);
        assert!(rebuilt[0].properties().unwrap().bold());
        assert!(rebuilt[1].properties().is_none());
        // the paragraph properties survive the rebuild
        assert!(p.properties_element().is_some());
    }

    #[test]
    fn test_markdown_detection_and_segments() {
        assert!(contains_markdown("a **b** c"));
        assert!(contains_markdown("a *b* c"));
        assert!(contains_markdown("a ~~b~~ c"));
        assert!(!contains_markdown("plain"));
        assert!(!contains_markdown("2 * 3 = 6"));

        let segments = parse_markdown("a **b** *c* ~~d~~");
        assert_eq!(segments.len(), 6);
        assert_eq!(segments[0], MdSegment::plain("a "));
        assert!(segments[1].bold);
        assert_eq!(segments[1].text, "b");
        assert!(segments[3].italic);
        assert!(segments[5].strike);
    }

    #[test]
    fn test_merge_markdown_flags() {
        let doc: Document = concat!(
            "<w:document><w:body><w:p>",
            "<w:r><w:rPr><w:i/><w:sz w:val=\"28\"/></w:rPr><w:t>x</w:t></w:r>",
            "</w:p></w:body></w:document>"
        )
        .parse()
        .unwrap();
        let p = paragraph(&doc);
        let base = first_properties_clone(p.runs().collect::<Vec<_>>().iter()).unwrap();
        let merged = merge_markdown(Some(&base), true, false, false).unwrap();
        let props = RunProperties::cast(merged).unwrap();
        assert!(props.bold());
        assert!(props.italic());
        assert_eq!(props.size().as_deref(), Some("28"));
    }

    #[test]
    fn test_merge_markdown_without_base() {
        let merged = merge_markdown(None, false, true, true).unwrap();
        let props = RunProperties::cast(merged).unwrap();
        assert!(!props.bold());
        assert!(props.italic());
        assert!(props.strike());
        assert!(merge_markdown(None, false, false, false).is_none());
    }
}
