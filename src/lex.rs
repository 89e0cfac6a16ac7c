use std::iter::Peekable;
use std::str::Chars;

/// Let's start with defining all kinds of tokens and
/// composite nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(non_camel_case_types)]
#[repr(u16)]
pub enum SyntaxKind {
    L_ANGLE = 0,   // "<"
    L_ANGLE_SLASH, // "</"
    R_ANGLE,       // ">"
    SLASH_R_ANGLE, // "/>"
    TAG_NAME,      // element name directly after "<" or "</"
    ATTR_NAME,
    EQ,
    ATTR_VALUE,   // quoted attribute value, quotes included
    TAG_WS,       // whitespace inside a tag
    TEXT_CONTENT, // character data between tags, entities as written
    XML_DECL,     // "<?...?>" kept whole
    COMMENT,      // "<!--...-->" kept whole
    DOCTYPE,      // "<!...>" kept whole
    ERROR_TOKEN,

    // composite nodes
    OPEN_TAG,  // "<" name attributes ">" or "/>"
    CLOSE_TAG, // "</" name ">"
    ELEMENT,   // any element the engine has no dedicated kind for
    DOCUMENT_ELT,
    BODY,
    PARAGRAPH,
    RUN,
    RUN_PROPS,
    TEXT,
    BREAK,
    TAB,
    TABLE,
    TABLE_ROW,
    TABLE_CELL,
    ROOT,  // the entire document.xml part
    ERROR, // error node
}

/// Convert our `SyntaxKind` into the rowan `SyntaxKind`.
impl From<SyntaxKind> for rowan::SyntaxKind {
    fn from(kind: SyntaxKind) -> Self {
        Self(kind as u16)
    }
}

pub(crate) struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
    in_tag: bool,
    expect_name: bool,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Lexer {
            input: input.chars().peekable(),
            in_tag: false,
            expect_name: false,
        }
    }

    fn is_whitespace(c: char) -> bool {
        c == ' ' || c == '\t' || c == '\n' || c == '\r'
    }

    fn is_name_char(c: char) -> bool {
        c.is_alphanumeric() || c == ':' || c == '-' || c == '_' || c == '.'
    }

    fn read_while<F>(&mut self, predicate: F) -> String
    where
        F: Fn(char) -> bool,
    {
        let mut result = String::new();
        while let Some(&c) = self.input.peek() {
            if predicate(c) {
                result.push(c);
                self.input.next();
            } else {
                break;
            }
        }
        result
    }

    /// Read up to and including `terminator`, e.g. the "-->" of a comment.
    fn read_through(&mut self, prefix: String, terminator: &str) -> String {
        let mut result = prefix;
        while let Some(c) = self.input.next() {
            result.push(c);
            if result.ends_with(terminator) {
                break;
            }
        }
        result
    }

    fn next_token(&mut self) -> Option<(SyntaxKind, String)> {
        let &c = self.input.peek()?;
        if self.in_tag {
            match c {
                '>' => {
                    self.input.next();
                    self.in_tag = false;
                    Some((SyntaxKind::R_ANGLE, ">".to_owned()))
                }
                '/' => {
                    self.input.next();
                    if self.input.peek() == Some(&'>') {
                        self.input.next();
                        self.in_tag = false;
                        Some((SyntaxKind::SLASH_R_ANGLE, "/>".to_owned()))
                    } else {
                        Some((SyntaxKind::ERROR_TOKEN, "/".to_owned()))
                    }
                }
                '=' => {
                    self.input.next();
                    Some((SyntaxKind::EQ, "=".to_owned()))
                }
                '"' | '\'' => {
                    let quote = c;
                    self.input.next();
                    let value = self.read_while(|c| c != quote && c != '>');
                    if self.input.peek() == Some(&quote) {
                        self.input.next();
                        Some((SyntaxKind::ATTR_VALUE, format!("{}{}{}", quote, value, quote)))
                    } else {
                        Some((SyntaxKind::ERROR_TOKEN, format!("{}{}", quote, value)))
                    }
                }
                _ if Self::is_whitespace(c) => {
                    let ws = self.read_while(Self::is_whitespace);
                    Some((SyntaxKind::TAG_WS, ws))
                }
                _ if Self::is_name_char(c) => {
                    let name = self.read_while(Self::is_name_char);
                    if self.expect_name {
                        self.expect_name = false;
                        Some((SyntaxKind::TAG_NAME, name))
                    } else {
                        Some((SyntaxKind::ATTR_NAME, name))
                    }
                }
                _ => {
                    self.input.next();
                    Some((SyntaxKind::ERROR_TOKEN, c.to_string()))
                }
            }
        } else {
            match c {
                '<' => {
                    self.input.next();
                    match self.input.peek() {
                        Some('?') => {
                            let decl = self.read_through("<".to_owned(), "?>");
                            Some((SyntaxKind::XML_DECL, decl))
                        }
                        Some('!') => {
                            self.input.next();
                            if self.input.peek() == Some(&'-') {
                                let comment = self.read_through("<!".to_owned(), "-->");
                                Some((SyntaxKind::COMMENT, comment))
                            } else {
                                let doctype = self.read_through("<!".to_owned(), ">");
                                Some((SyntaxKind::DOCTYPE, doctype))
                            }
                        }
                        Some('/') => {
                            self.input.next();
                            self.in_tag = true;
                            self.expect_name = true;
                            Some((SyntaxKind::L_ANGLE_SLASH, "</".to_owned()))
                        }
                        _ => {
                            self.in_tag = true;
                            self.expect_name = true;
                            Some((SyntaxKind::L_ANGLE, "<".to_owned()))
                        }
                    }
                }
                _ => {
                    let text = self.read_while(|c| c != '<');
                    Some((SyntaxKind::TEXT_CONTENT, text))
                }
            }
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = (SyntaxKind, String);

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

pub(crate) fn lex(text: &str) -> Vec<(SyntaxKind, String)> {
    Lexer::new(text).collect()
}

#[cfg(test)]
mod tests {
    use super::SyntaxKind::*;
    use super::*;

    #[test]
    fn test_lex_simple_element() {
        let tokens = lex("<w:t>Hello</w:t>");
        assert_eq!(
            tokens,
            vec![
                (L_ANGLE, "<".to_owned()),
                (TAG_NAME, "w:t".to_owned()),
                (R_ANGLE, ">".to_owned()),
                (TEXT_CONTENT, "Hello".to_owned()),
                (L_ANGLE_SLASH, "</".to_owned()),
                (TAG_NAME, "w:t".to_owned()),
                (R_ANGLE, ">".to_owned()),
            ]
        );
    }

    #[test]
    fn test_lex_attributes() {
        let tokens = lex(r#"<w:t xml:space="preserve"/>"#);
        assert_eq!(
            tokens,
            vec![
                (L_ANGLE, "<".to_owned()),
                (TAG_NAME, "w:t".to_owned()),
                (TAG_WS, " ".to_owned()),
                (ATTR_NAME, "xml:space".to_owned()),
                (EQ, "=".to_owned()),
                (ATTR_VALUE, "\"preserve\"".to_owned()),
                (SLASH_R_ANGLE, "/>".to_owned()),
            ]
        );
    }

    #[test]
    fn test_lex_declaration_and_comment() {
        let tokens = lex("<?xml version=\"1.0\"?><!-- note --><w:p/>");
        assert_eq!(tokens[0], (XML_DECL, "<?xml version=\"1.0\"?>".to_owned()));
        assert_eq!(tokens[1], (COMMENT, "<!-- note -->".to_owned()));
        assert_eq!(tokens[2], (L_ANGLE, "<".to_owned()));
    }

    #[test]
    fn test_lex_entities_kept_as_written() {
        let tokens = lex("<w:t>a &amp; b</w:t>");
        assert_eq!(tokens[3], (TEXT_CONTENT, "a &amp; b".to_owned()));
    }

    #[test]
    fn test_lex_single_quoted_attribute() {
        let tokens = lex("<w:color w:val='FF0000'/>");
        assert!(tokens.contains(&(ATTR_VALUE, "'FF0000'".to_owned())));
    }
}
