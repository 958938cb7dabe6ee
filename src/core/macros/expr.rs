//! Parsed macro string and string-list expressions.
//!
//! A macro string is literal text with `$(NAME)` or `${NAME}` references;
//! `$$` stands for a literal `$`. A string list is a sequence of macro
//! strings, written either as an array or as one shell-quoted string.

use std::fmt;

use thiserror::Error;

/// Errors from parsing macro expressions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MacroParseError {
    #[error("unterminated macro reference in '{0}'")]
    Unterminated(String),

    #[error("empty macro reference in '{0}'")]
    EmptyReference(String),

    #[error("nested macro references are not supported in '{0}'")]
    Nested(String),

    #[error("unbalanced quoting in '{0}'")]
    Quoting(String),

    #[error("{0}")]
    Condition(String),
}

/// One piece of a macro string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Reference(String),
}

/// A string expression that may reference other macros.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroString {
    source: String,
    segments: Vec<Segment>,
}

impl MacroString {
    /// Parse `text`, recognizing `$(NAME)`, `${NAME}` and `$$`.
    pub fn parse(text: &str) -> Result<Self, MacroParseError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = text.char_indices().peekable();

        while let Some((_, c)) = chars.next() {
            if c != '$' {
                literal.push(c);
                continue;
            }
            let close = match chars.peek().map(|(_, c)| *c) {
                Some('$') => {
                    chars.next();
                    literal.push('$');
                    continue;
                }
                Some('(') => ')',
                Some('{') => '}',
                _ => {
                    literal.push('$');
                    continue;
                }
            };
            chars.next();

            let mut name = String::new();
            let mut terminated = false;
            for (_, c) in chars.by_ref() {
                if c == close {
                    terminated = true;
                    break;
                }
                if c == '$' {
                    return Err(MacroParseError::Nested(text.to_string()));
                }
                name.push(c);
            }
            if !terminated {
                return Err(MacroParseError::Unterminated(text.to_string()));
            }
            let name = name.trim();
            if name.is_empty() {
                return Err(MacroParseError::EmptyReference(text.to_string()));
            }
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Reference(name.to_string()));
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(MacroString {
            source: text.to_string(),
            segments,
        })
    }

    /// A string that is taken verbatim, with no reference expansion.
    pub fn literal(text: impl Into<String>) -> Self {
        let source = text.into();
        let segments = if source.is_empty() {
            Vec::new()
        } else {
            vec![Segment::Literal(source.clone())]
        };
        MacroString { source, segments }
    }

    /// `$(name)`.
    pub fn reference(name: impl Into<String>) -> Self {
        let name = name.into();
        MacroString {
            source: format!("$({})", name),
            segments: vec![Segment::Reference(name)],
        }
    }

    /// The text the expression was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// The referenced name when the whole expression is exactly one reference.
    pub fn single_reference(&self) -> Option<&str> {
        match self.segments.as_slice() {
            [Segment::Reference(name)] => Some(name),
            _ => None,
        }
    }

    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Reference(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }
}

impl fmt::Display for MacroString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// A list of macro strings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MacroStringList {
    items: Vec<MacroString>,
}

impl MacroStringList {
    /// Parse a shell-quoted string into list items.
    pub fn parse(text: &str) -> Result<Self, MacroParseError> {
        let words = shlex::split(text).ok_or_else(|| MacroParseError::Quoting(text.to_string()))?;
        Self::from_items(&words)
    }

    /// Parse each element as a macro string.
    pub fn from_items<S: AsRef<str>>(items: &[S]) -> Result<Self, MacroParseError> {
        let items = items
            .iter()
            .map(|s| MacroString::parse(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MacroStringList { items })
    }

    /// Literal items, never expanded.
    pub fn literal<S: AsRef<str>>(items: &[S]) -> Self {
        MacroStringList {
            items: items.iter().map(|s| MacroString::literal(s.as_ref())).collect(),
        }
    }

    pub fn items(&self) -> &[MacroString] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl fmt::Display for MacroStringList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self.items.iter().map(MacroString::as_str).collect();
        f.write_str(&parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_references() {
        let expr = MacroString::parse("-I$(SRCROOT)/include${SUFFIX}").unwrap();
        assert_eq!(
            expr.segments(),
            &[
                Segment::Literal("-I".into()),
                Segment::Reference("SRCROOT".into()),
                Segment::Literal("/include".into()),
                Segment::Reference("SUFFIX".into()),
            ]
        );
        assert!(!expr.is_literal());
        assert_eq!(expr.references().collect::<Vec<_>>(), ["SRCROOT", "SUFFIX"]);
    }

    #[test]
    fn test_dollar_escapes() {
        let expr = MacroString::parse("a$$b$c").unwrap();
        assert_eq!(expr.segments(), &[Segment::Literal("a$b$c".into())]);
        assert!(expr.is_literal());
    }

    #[test]
    fn test_single_reference() {
        assert_eq!(
            MacroString::parse("$(OutputPath)").unwrap().single_reference(),
            Some("OutputPath")
        );
        assert_eq!(MacroString::parse("x$(A)").unwrap().single_reference(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            MacroString::parse("$(A"),
            Err(MacroParseError::Unterminated(_))
        ));
        assert!(matches!(
            MacroString::parse("$()"),
            Err(MacroParseError::EmptyReference(_))
        ));
        assert!(matches!(
            MacroString::parse("$(A_$(B))"),
            Err(MacroParseError::Nested(_))
        ));
    }

    #[test]
    fn test_string_list_uses_shell_quoting() {
        let list = MacroStringList::parse(r#"-D "NAME=a b" $(OTHER)"#).unwrap();
        let items: Vec<&str> = list.items().iter().map(MacroString::as_str).collect();
        assert_eq!(items, ["-D", "NAME=a b", "$(OTHER)"]);
        assert!(MacroStringList::parse("\"open").is_err());
    }

    #[test]
    fn test_literal_list_is_not_expanded() {
        let list = MacroStringList::literal(&["[bogus]", "$(X)"]);
        assert!(list.items().iter().all(MacroString::is_literal));
    }
}
