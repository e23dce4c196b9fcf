//! RFC-6570-flavored URI template matching for parameterized resources:
//! `{name}` single-segment variables, `{path*}` greedy tail variables.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
    /// `{name*}`: consumes every remaining path segment, joined by `/`.
    Tail(String),
}

/// A compiled URI template.
#[derive(Debug, Clone)]
pub struct UriTemplate {
    source: String,
    segments: Vec<Segment>,
}

/// An error parsing a malformed template string.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UriTemplateError {
    #[error("template is empty")]
    Empty,
    #[error("unclosed variable in template")]
    Unclosed,
    #[error("empty variable name in template")]
    EmptyVariable,
    #[error("a tail variable ({{name*}}) must be the template's final segment")]
    TailNotFinal,
}

impl UriTemplate {
    /// Parse a template, e.g. `file:///{path*}` or `users://{id}/profile`.
    pub fn parse(template: &str) -> Result<Self, UriTemplateError> {
        if template.is_empty() {
            return Err(UriTemplateError::Empty);
        }
        let mut segments = Vec::new();
        let mut chars = template.char_indices().peekable();
        let mut literal = String::new();

        while let Some((_, ch)) = chars.next() {
            if ch == '{' {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                let mut name = String::new();
                let mut closed = false;
                for (_, var_ch) in chars.by_ref() {
                    if var_ch == '}' {
                        closed = true;
                        break;
                    }
                    name.push(var_ch);
                }
                if !closed {
                    return Err(UriTemplateError::Unclosed);
                }
                if let Some(stripped) = name.strip_suffix('*') {
                    if stripped.is_empty() {
                        return Err(UriTemplateError::EmptyVariable);
                    }
                    segments.push(Segment::Tail(stripped.to_string()));
                } else {
                    if name.is_empty() {
                        return Err(UriTemplateError::EmptyVariable);
                    }
                    segments.push(Segment::Variable(name));
                }
            } else {
                literal.push(ch);
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        if segments
            .iter()
            .enumerate()
            .any(|(i, s)| matches!(s, Segment::Tail(_)) && i != segments.len() - 1)
        {
            return Err(UriTemplateError::TailNotFinal);
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// The original template string.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// How many literal characters this template pins down, used to break
    /// ties between overlapping templates in favor of the more specific
    /// one: the most specific matching template wins.
    pub fn specificity(&self) -> usize {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(l) => l.len(),
                _ => 0,
            })
            .sum()
    }

    /// Attempt to match `uri` against this template, extracting variable
    /// values on success.
    pub fn matches(&self, uri: &str) -> Option<HashMap<String, String>> {
        let mut remaining = uri;
        let mut params = HashMap::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    remaining = remaining.strip_prefix(lit.as_str())?;
                }
                Segment::Variable(name) => {
                    let next_literal_start = self.segments.get(i + 1).and_then(|s| match s {
                        Segment::Literal(l) => l.chars().next(),
                        _ => None,
                    });
                    let end = match next_literal_start {
                        Some(stop_char) => remaining.find(stop_char)?,
                        None => remaining.find('/').unwrap_or(remaining.len()),
                    };
                    if end == 0 {
                        return None;
                    }
                    params.insert(name.clone(), remaining[..end].to_string());
                    remaining = &remaining[end..];
                }
                Segment::Tail(name) => {
                    params.insert(name.clone(), remaining.to_string());
                    remaining = "";
                }
            }
        }

        if remaining.is_empty() {
            Some(params)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_single_variable() {
        let tmpl = UriTemplate::parse("users://{id}/profile").unwrap();
        let params = tmpl.matches("users://42/profile").unwrap();
        assert_eq!(params.get("id"), Some(&"42".to_string()));
        assert!(tmpl.matches("users://42/other").is_none());
    }

    #[test]
    fn matches_tail_variable_greedily() {
        let tmpl = UriTemplate::parse("file:///{path*}").unwrap();
        let params = tmpl.matches("file:///a/b/c.txt").unwrap();
        assert_eq!(params.get("path"), Some(&"a/b/c.txt".to_string()));
    }

    #[test]
    fn rejects_tail_variable_not_final() {
        assert!(UriTemplate::parse("{a*}/fixed").is_err());
    }

    #[test]
    fn more_specific_template_has_higher_specificity() {
        let generic = UriTemplate::parse("file:///{path*}").unwrap();
        let specific = UriTemplate::parse("file:///docs/{path*}").unwrap();
        assert!(specific.specificity() > generic.specificity());
    }

    #[test]
    fn non_matching_literal_prefix_fails() {
        let tmpl = UriTemplate::parse("db://{table}/rows").unwrap();
        assert!(tmpl.matches("other://x/rows").is_none());
    }
}
