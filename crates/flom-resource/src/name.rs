//! Resource name grammar and hierarchical path splitting.
//!
//! # Grammar
//!
//! | name                      | kind                               |
//! |---------------------------|------------------------------------|
//! | `/a/b/c`                  | hierarchical (separator prefix)    |
//! | `_s_name[N]`              | sequence                           |
//! | `_S_name[N]`              | transactional sequence             |
//! | `_t_format[N]`            | timestamp, `format` is the infix   |
//! | `name[N]`                 | numeric with N units               |
//! | `red.green.blue`          | set of the dot-separated elements  |
//! | `name`                    | simple                             |
//!
//! `[N]` is optional for sequences and timestamps and defaults to 1.

use std::fmt;

use flom_core::error::{FlomError, FlomResult};

const SEQUENCE_PREFIX: &str = "_s_";
const TRANSACTIONAL_SEQUENCE_PREFIX: &str = "_S_";
const TIMESTAMP_PREFIX: &str = "_t_";
const SET_SEPARATOR: char = '.';

/// Kind of a lockable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Simple,
    Numeric,
    Hierarchical,
    Sequence,
    Timestamp,
    Set,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Simple => "simple",
            ResourceKind::Numeric => "numeric",
            ResourceKind::Hierarchical => "hierarchical",
            ResourceKind::Sequence => "sequence",
            ResourceKind::Timestamp => "timestamp",
            ResourceKind::Set => "set",
        };
        f.write_str(s)
    }
}

/// Parsed resource name: everything needed to construct a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSpec {
    /// Full name as sent by the client.
    pub name: String,
    pub kind: ResourceKind,
    /// Capacity for numeric, sequence and timestamp resources.
    pub total_quantity: Option<u32>,
    /// Timestamp format or sequence base name.
    pub infix: Option<String>,
    /// Sequence values are recycled on rollback.
    pub transactional: bool,
}

impl ResourceSpec {
    /// Builds a spec by hand, bypassing the name grammar.
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            total_quantity: None,
            infix: None,
            transactional: false,
        }
    }

    /// Parses `name` according to the resource grammar.
    ///
    /// # Errors
    ///
    /// Returns [`FlomError::InvalidResourceName`] if the name fits no kind.
    pub fn parse(name: &str, separator: &str) -> FlomResult<Self> {
        if name.is_empty() {
            return Err(FlomError::InvalidResourceName(
                "resource name cannot be empty".to_string(),
            ));
        }

        if !separator.is_empty() && name.starts_with(separator) {
            split_path(name, separator)?;
            return Ok(Self::new(name, ResourceKind::Hierarchical));
        }

        if let Some(rest) = name.strip_prefix(SEQUENCE_PREFIX) {
            return Self::parse_sequence(name, rest, false);
        }
        if let Some(rest) = name.strip_prefix(TRANSACTIONAL_SEQUENCE_PREFIX) {
            return Self::parse_sequence(name, rest, true);
        }
        if let Some(rest) = name.strip_prefix(TIMESTAMP_PREFIX) {
            let (format, quantity) = split_quantity(name, rest)?;
            if format.is_empty() {
                return Err(FlomError::InvalidResourceName(format!(
                    "'{name}': timestamp format cannot be empty"
                )));
            }
            return Ok(Self {
                total_quantity: Some(quantity.unwrap_or(1)),
                infix: Some(format.to_string()),
                ..Self::new(name, ResourceKind::Timestamp)
            });
        }

        if name.contains(SET_SEPARATOR) {
            if name.split(SET_SEPARATOR).all(is_word) {
                return Ok(Self::new(name, ResourceKind::Set));
            }
            return Err(FlomError::InvalidResourceName(format!(
                "'{name}': set elements must be non-empty alphanumeric words"
            )));
        }

        let (base, quantity) = split_quantity(name, name)?;
        if !is_word(base) {
            return Err(FlomError::InvalidResourceName(format!(
                "'{name}' contains characters not allowed in a resource name"
            )));
        }
        match quantity {
            Some(quantity) => Ok(Self {
                total_quantity: Some(quantity),
                ..Self::new(name, ResourceKind::Numeric)
            }),
            None => Ok(Self::new(name, ResourceKind::Simple)),
        }
    }

    fn parse_sequence(name: &str, rest: &str, transactional: bool) -> FlomResult<Self> {
        let (base, quantity) = split_quantity(name, rest)?;
        if !is_word(base) {
            return Err(FlomError::InvalidResourceName(format!(
                "'{name}': sequence name must be a non-empty alphanumeric word"
            )));
        }
        Ok(Self {
            total_quantity: Some(quantity.unwrap_or(1)),
            infix: Some(base.to_string()),
            transactional,
            ..Self::new(name, ResourceKind::Sequence)
        })
    }

    /// Elements of a set resource, in declaration order.
    pub fn set_elements(&self) -> Vec<String> {
        self.name.split(SET_SEPARATOR).map(str::to_string).collect()
    }

    /// Key under which a registry stores the resource.
    ///
    /// Hierarchical names share one resource per root segment, so `/a/b` and
    /// `/a/c` map to `/a`.
    pub fn registry_key(&self, separator: &str) -> String {
        match self.kind {
            ResourceKind::Hierarchical => match split_path(&self.name, separator) {
                Ok(segments) => format!("{separator}{}", segments[0]),
                Err(_) => self.name.clone(),
            },
            _ => self.name.clone(),
        }
    }
}

/// Splits a hierarchical name into its path segments.
///
/// `"/a/b/c"` becomes `["a", "b", "c"]`.
///
/// # Errors
///
/// Returns [`FlomError::InvalidResourceName`] if the name does not start with
/// `separator`, has no segment, or has an empty segment.
pub fn split_path<'a>(name: &'a str, separator: &str) -> FlomResult<Vec<&'a str>> {
    let rest = name.strip_prefix(separator).ok_or_else(|| {
        FlomError::InvalidResourceName(format!("'{name}' does not start with '{separator}'"))
    })?;
    if rest.is_empty() {
        return Err(FlomError::InvalidResourceName(format!(
            "'{name}' has no root segment"
        )));
    }
    let segments: Vec<&str> = rest.split(separator).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(FlomError::InvalidResourceName(format!(
            "'{name}' contains an empty path segment"
        )));
    }
    Ok(segments)
}

/// Splits a trailing `[N]` off `body`.
fn split_quantity<'a>(name: &str, body: &'a str) -> FlomResult<(&'a str, Option<u32>)> {
    let Some(open) = body.rfind('[') else {
        return Ok((body, None));
    };
    let digits = body[open + 1..].strip_suffix(']').ok_or_else(|| {
        FlomError::InvalidResourceName(format!("'{name}': unterminated quantity"))
    })?;
    let quantity: u32 = digits.parse().map_err(|_| {
        FlomError::InvalidResourceName(format!("'{name}': '{digits}' is not a quantity"))
    })?;
    if quantity == 0 {
        return Err(FlomError::InvalidResourceName(format!(
            "'{name}': quantity must be at least 1"
        )));
    }
    Ok((&body[..open], Some(quantity)))
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}
