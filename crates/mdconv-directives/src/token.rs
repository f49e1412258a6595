//! Grammar of the small expressions used inside directives.
//!
//! - field tokens: `"literal"`, `^.attr`, `name()`, `table.name()` or a plain field
//! - header pairs: `<token>=<token>`
//! - test filters: `field=value` or `field=^.attr`
//! - execute calls: `function(arg, arg, ...)`
//!
//! Each side of a header and each call argument is exactly one token; text
//! such as `"#sample/"id` that mixes a literal with a field is rejected.

use std::fmt;

use mdconv_validate::NESTED_MARKER;

const CALLING_PREFIX: &str = "^.";

/// Why a token or expression failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenError {
    pub text: String,
    pub reason: String,
}

impl TokenError {
    fn new(text: &str, reason: impl Into<String>) -> Self {
        Self {
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid expression `{}`: {}", self.text, self.reason)
    }
}

/// Reference to a nested directive, optionally qualified by its table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NestedRef {
    pub table: Option<String>,
    /// Directive name including the nesting marker.
    pub name: String,
}

impl fmt::Display for NestedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{table}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// One value reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    CallingAttribute(String),
    Nested(NestedRef),
    Field(String),
}

impl Token {
    pub fn parse(text: &str) -> Result<Self, TokenError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(TokenError::new(text, "empty reference"));
        }
        if let Some(rest) = trimmed.strip_prefix('"') {
            let Some(inner) = rest.strip_suffix('"') else {
                return Err(TokenError::new(
                    text,
                    "mixes a quoted literal with other text; concatenate with a nested str directive",
                ));
            };
            if inner.contains('"') {
                return Err(TokenError::new(
                    text,
                    "mixes a quoted literal with other text; concatenate with a nested str directive",
                ));
            }
            return Ok(Self::Literal(inner.to_string()));
        }
        if trimmed.contains('"') {
            return Err(TokenError::new(
                text,
                "mixes a field with a quoted literal; concatenate with a nested str directive",
            ));
        }
        if let Some(attribute) = trimmed.strip_prefix(CALLING_PREFIX) {
            if attribute.is_empty() {
                return Err(TokenError::new(text, "missing attribute after `^.`"));
            }
            return Ok(Self::CallingAttribute(attribute.to_string()));
        }
        if trimmed.ends_with(NESTED_MARKER) {
            let stem = &trimmed[..trimmed.len() - NESTED_MARKER.len()];
            if stem.is_empty() || stem.contains('(') || stem.contains(')') {
                return Err(TokenError::new(
                    text,
                    "nested directive calls take no arguments",
                ));
            }
            let nested = match stem.split_once('.') {
                Some((table, name)) if !table.is_empty() && !name.is_empty() => NestedRef {
                    table: Some(table.to_string()),
                    name: format!("{name}{NESTED_MARKER}"),
                },
                _ => NestedRef {
                    table: None,
                    name: trimmed.to_string(),
                },
            };
            return Ok(Self::Nested(nested));
        }
        if trimmed.contains('(') || trimmed.contains(')') {
            return Err(TokenError::new(
                text,
                "nested directive calls take no arguments",
            ));
        }
        Ok(Self::Field(trimmed.to_string()))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => write!(f, "\"{text}\""),
            Self::CallingAttribute(attribute) => write!(f, "{CALLING_PREFIX}{attribute}"),
            Self::Nested(nested) => write!(f, "{nested}"),
            Self::Field(field) => f.write_str(field),
        }
    }
}

/// `"output_key"=input_key` pair of a matrix directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderPair {
    pub key: Token,
    pub value: Token,
}

impl HeaderPair {
    pub fn parse(text: &str) -> Result<Self, TokenError> {
        let trimmed = text.trim();
        let (key, value) = if let Some(rest) = trimmed.strip_prefix('"') {
            let close = rest
                .find('"')
                .ok_or_else(|| TokenError::new(text, "unterminated quoted literal"))?;
            let key = &trimmed[..close + 2];
            let remainder = trimmed[close + 2..].trim_start();
            let Some(value) = remainder.strip_prefix('=') else {
                return Err(TokenError::new(
                    text,
                    "mixes a quoted literal with other text; concatenate with a nested str directive",
                ));
            };
            (key, value)
        } else {
            trimmed
                .split_once('=')
                .ok_or_else(|| TokenError::new(text, "expected `output_key=input_key`"))?
        };
        Ok(Self {
            key: Token::parse(key).map_err(|error| TokenError::new(text, error.reason))?,
            value: Token::parse(value).map_err(|error| TokenError::new(text, error.reason))?,
        })
    }
}

/// Right-hand side of a test filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestValue {
    Literal(String),
    CallingAttribute(String),
}

/// `field=value` equality filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestExpr {
    pub field: String,
    pub value: TestValue,
}

impl TestExpr {
    pub fn parse(text: &str) -> Result<Self, TokenError> {
        let (field, value) = text
            .split_once('=')
            .ok_or_else(|| TokenError::new(text, "expected `field=value`"))?;
        let field = field.trim();
        if field.is_empty() {
            return Err(TokenError::new(text, "missing field before `=`"));
        }
        let value = value.trim();
        let value = if let Some(attribute) = value.strip_prefix(CALLING_PREFIX) {
            TestValue::CallingAttribute(attribute.to_string())
        } else if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
            TestValue::Literal(value[1..value.len() - 1].to_string())
        } else {
            TestValue::Literal(value.to_string())
        };
        Ok(Self {
            field: field.to_string(),
            value,
        })
    }
}

impl fmt::Display for TestExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            TestValue::Literal(text) => write!(f, "{}={text}", self.field),
            TestValue::CallingAttribute(attribute) => {
                write!(f, "{}={CALLING_PREFIX}{attribute}", self.field)
            }
        }
    }
}

/// `function(arg, ...)` call of an execute attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallExpr {
    pub function: String,
    pub args: Vec<Token>,
}

impl CallExpr {
    pub fn parse(text: &str) -> Result<Self, TokenError> {
        let trimmed = text.trim();
        let open = trimmed
            .find('(')
            .ok_or_else(|| TokenError::new(text, "missing `(`"))?;
        let function = trimmed[..open].trim();
        if function.is_empty()
            || !function
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(TokenError::new(text, "invalid function name"));
        }
        let Some(body) = trimmed[open + 1..].strip_suffix(')') else {
            return Err(TokenError::new(text, "missing closing `)`"));
        };
        let args = split_arguments(body)
            .map_err(|reason| TokenError::new(text, reason))?
            .into_iter()
            .map(|arg| Token::parse(arg).map_err(|error| TokenError::new(text, error.reason)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            function: function.to_string(),
            args,
        })
    }
}

/// Split call arguments on top-level commas, honouring quotes and parentheses.
fn split_arguments(body: &str) -> Result<Vec<&str>, &'static str> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut start = 0usize;
    for (index, c) in body.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => {
                depth = depth
                    .checked_sub(1)
                    .ok_or("unbalanced parentheses")?;
            }
            ',' if !in_quotes && depth == 0 => {
                args.push(&body[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    if in_quotes {
        return Err("unterminated quoted literal");
    }
    if depth != 0 {
        return Err("unbalanced parentheses");
    }
    args.push(&body[start..]);
    Ok(args)
}
