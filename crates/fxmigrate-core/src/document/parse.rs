//! Lossless parser for JSON-with-comments text.
//!
//! Every byte of the input ends up either in a node (keys, scalars) or in the
//! trivia strings attached to container entries, so writing the tree back
//! reproduces the source exactly.

use super::{Container, Document, DocumentError, Entry, Key, Node, NodeId, NodeKind, Style};

pub(super) fn parse_document(src: &str) -> Result<Document, DocumentError> {
    let mut parser = Parser {
        src,
        pos: 0,
        nodes: Vec::new(),
    };

    let leading = parser.trivia()?;
    if parser.at_end() {
        return Err(parser.error("expected a value, found end of input"));
    }
    let root = parser.value(None)?;
    let trailing = parser.trivia()?;
    if !parser.at_end() {
        return Err(parser.error("unexpected content after the top-level value"));
    }

    let mut doc = Document {
        nodes: parser.nodes,
        root,
        leading,
        trailing,
        style: Style::default(),
    };
    doc.style = Style::detect(&doc, src);
    Ok(doc)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    nodes: Vec<Node>,
}

impl<'a> Parser<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), DocumentError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected)))
        }
    }

    fn error(&self, message: &str) -> DocumentError {
        let consumed = &self.src[..self.pos.min(self.src.len())];
        let line = consumed.matches('\n').count() + 1;
        let column = consumed
            .rsplit('\n')
            .next()
            .map(|l| l.chars().count() + 1)
            .unwrap_or(1);
        DocumentError::Syntax {
            message: message.to_string(),
            line,
            column,
        }
    }

    fn alloc(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node { kind, parent });
        id
    }

    /// Consume whitespace and comments, returning the exact consumed text.
    fn trivia(&mut self) -> Result<String, DocumentError> {
        let start = self.pos;
        loop {
            let rest = &self.src[self.pos..];
            if rest.starts_with("//") {
                let end = rest.find('\n').unwrap_or(rest.len());
                self.pos += end;
            } else if rest.starts_with("/*") {
                match rest[2..].find("*/") {
                    Some(end) => self.pos += end + 4,
                    None => return Err(self.error("unterminated block comment")),
                }
            } else {
                match self.peek() {
                    Some(c) if c.is_whitespace() || c == '\u{feff}' => self.pos += c.len_utf8(),
                    _ => break,
                }
            }
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn value(&mut self, parent: Option<NodeId>) -> Result<NodeId, DocumentError> {
        match self.peek() {
            Some('{') => self.object(parent),
            Some('[') => self.array(parent),
            Some('"') => {
                let (value, raw) = self.string()?;
                Ok(self.alloc(NodeKind::String { value, raw }, parent))
            }
            Some(c) if c == '-' || c.is_ascii_digit() => {
                let raw = self.number()?;
                Ok(self.alloc(NodeKind::Number(raw), parent))
            }
            Some(_) => {
                let kind = self.literal()?;
                Ok(self.alloc(kind, parent))
            }
            None => Err(self.error("expected a value, found end of input")),
        }
    }

    fn literal(&mut self) -> Result<NodeKind, DocumentError> {
        let rest = &self.src[self.pos..];
        for (word, kind) in [
            ("true", NodeKind::Bool(true)),
            ("false", NodeKind::Bool(false)),
            ("null", NodeKind::Null),
        ] {
            if rest.starts_with(word) {
                self.pos += word.len();
                return Ok(kind);
            }
        }
        Err(self.error("unexpected character"))
    }

    fn number(&mut self) -> Result<String, DocumentError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E') {
                self.pos += 1;
            } else {
                break;
            }
        }
        let raw = &self.src[start..self.pos];
        if raw.parse::<f64>().is_err() {
            return Err(self.error(&format!("invalid number '{}'", raw)));
        }
        Ok(raw.to_string())
    }

    /// Returns the decoded value and the raw source text including quotes.
    fn string(&mut self) -> Result<(String, String), DocumentError> {
        let start = self.pos;
        self.expect('"')?;
        let mut escaped = false;
        loop {
            let c = match self.peek() {
                Some(c) => c,
                None => return Err(self.error("unterminated string")),
            };
            self.pos += c.len_utf8();
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                break;
            } else if c == '\n' {
                return Err(self.error("newline inside string"));
            }
        }
        let src = self.src;
        let raw = &src[start..self.pos];
        let value: String = serde_json::from_str(raw)
            .map_err(|e| self.error(&format!("invalid string literal: {}", e)))?;
        Ok((value, raw.to_string()))
    }

    fn array(&mut self, parent: Option<NodeId>) -> Result<NodeId, DocumentError> {
        self.expect('[')?;
        let id = self.alloc(NodeKind::Array(Container::default()), parent);
        let container = self.entries(id, ']', false)?;
        self.nodes[id.0].kind = NodeKind::Array(container);
        Ok(id)
    }

    fn object(&mut self, parent: Option<NodeId>) -> Result<NodeId, DocumentError> {
        self.expect('{')?;
        let id = self.alloc(NodeKind::Object(Container::default()), parent);
        let container = self.entries(id, '}', true)?;
        self.nodes[id.0].kind = NodeKind::Object(container);
        Ok(id)
    }

    /// Parse the entries of a container whose opening bracket was consumed.
    fn entries(
        &mut self,
        id: NodeId,
        close: char,
        keyed: bool,
    ) -> Result<Container, DocumentError> {
        let mut container = Container::default();
        let mut leading = self.trivia()?;

        if self.eat(close) {
            container.close = leading;
            return Ok(container);
        }

        loop {
            let key = if keyed { Some(self.key()?) } else { None };
            let value = self.value(Some(id))?;
            let trailing = self.trivia()?;

            if self.eat(',') {
                let after = self.trivia()?;
                let split = same_line_comment_end(&after);
                container.entries.push(Entry {
                    key,
                    value,
                    leading,
                    trailing,
                    suffix: after[..split].to_string(),
                });
                let rest = after[split..].to_string();
                if self.eat(close) {
                    container.close = rest;
                    container.trailing_comma = true;
                    return Ok(container);
                }
                leading = rest;
            } else if self.eat(close) {
                container.entries.push(Entry {
                    key,
                    value,
                    leading,
                    trailing,
                    suffix: String::new(),
                });
                return Ok(container);
            } else {
                return Err(self.error(&format!("expected ',' or '{}'", close)));
            }
        }
    }

    fn key(&mut self) -> Result<Key, DocumentError> {
        if self.peek() != Some('"') {
            return Err(self.error("expected a quoted property name"));
        }
        let (name, raw) = self.string()?;
        let before_colon = self.trivia()?;
        self.expect(':')?;
        let after_colon = self.trivia()?;
        Ok(Key {
            name,
            raw,
            before_colon,
            after_colon,
        })
    }
}

/// Length of the prefix of `trivia` holding comments that sit on the same
/// line as the preceding separator. Zero when there are none.
pub(super) fn same_line_comment_end(trivia: &str) -> usize {
    let mut pos = 0;
    let mut end = 0;
    loop {
        let rest = &trivia[pos..];
        if rest.starts_with("//") {
            return pos + rest.find('\n').unwrap_or(rest.len());
        }
        if rest.starts_with("/*") {
            match rest[2..].find("*/") {
                Some(close) if !rest[..close + 4].contains('\n') => {
                    pos += close + 4;
                    end = pos;
                    continue;
                }
                _ => return end,
            }
        }
        match rest.chars().next() {
            Some(c) if c == ' ' || c == '\t' => pos += 1,
            _ => return end,
        }
    }
}
