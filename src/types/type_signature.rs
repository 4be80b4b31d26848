use std::fmt::{self, Display};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::aggregation::AggregationError;

static BASE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z_][a-z0-9_]*$").expect("type name pattern must compile")
});

/// Deepest parameter nesting accepted by `TypeSignature::parse`.
pub const MAX_TYPE_DEPTH: usize = 32;

/// Parsed form of a declared type name, e.g. `bigint` or `map(varchar,array(double))`.
///
/// Names are case-insensitive; the base and every parameter are stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeSignature {
    pub base: String,
    pub parameters: Vec<TypeSignature>,
}

impl TypeSignature {
    pub fn simple(base: &str) -> Self {
        Self { base: base.to_ascii_lowercase(), parameters: vec![] }
    }

    pub fn parse(name: &str) -> Result<TypeSignature, AggregationError> {
        let depth = name.chars().scan(0usize, |open, c| {
            match c {
                '(' => *open += 1,
                ')' => *open = open.saturating_sub(1),
                _ => {}
            }
            Some(*open)
        }).max().unwrap_or(0);
        if depth > MAX_TYPE_DEPTH {
            return Err(AggregationError::UnknownType(name.to_string()));
        }
        Self::parse_bounded(name)
    }

    fn parse_bounded(name: &str) -> Result<TypeSignature, AggregationError> {
        let unknown = || AggregationError::UnknownType(name.to_string());
        let text = name.trim().to_ascii_lowercase();

        let (base, inner) = match text.find('(') {
            Some(open) => {
                if !text.ends_with(')') {
                    return Err(unknown());
                }
                (&text[..open], Some(&text[open + 1..text.len() - 1]))
            }
            None => (text.as_str(), None),
        };

        let base = base.trim();
        if !BASE_NAME.is_match(base) {
            return Err(unknown());
        }

        let mut parameters = Vec::new();
        if let Some(inner) = inner {
            for part in Self::split_top_level(inner).ok_or_else(unknown)? {
                parameters.push(Self::parse_bounded(part).map_err(|_| unknown())?);
            }
        }

        Ok(TypeSignature { base: base.to_string(), parameters })
    }

    // Splits on commas that are not nested inside parentheses.
    fn split_top_level(text: &str) -> Option<Vec<&str>> {
        let mut parts = Vec::new();
        let mut depth = 0usize;
        let mut start = 0;
        for (i, c) in text.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => depth = depth.checked_sub(1)?,
                ',' if depth == 0 => {
                    parts.push(&text[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        if depth != 0 {
            return None;
        }
        parts.push(&text[start..]);
        Some(parts)
    }
}

impl Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        if !self.parameters.is_empty() {
            let params: Vec<String> = self.parameters.iter().map(|p| p.to_string()).collect();
            write!(f, "({})", params.join(","))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_and_case_insensitive() {
        let sig = TypeSignature::parse("  BigInt ").unwrap();
        assert_eq!(sig, TypeSignature::simple("bigint"));
        assert_eq!(sig.to_string(), "bigint");
    }

    #[test]
    fn parses_nested_parameters() {
        let sig = TypeSignature::parse("map(varchar, array(double))").unwrap();
        assert_eq!(sig.base, "map");
        assert_eq!(sig.parameters.len(), 2);
        assert_eq!(sig.parameters[1].base, "array");
        assert_eq!(sig.to_string(), "map(varchar,array(double))");
    }

    #[test]
    fn rejects_malformed_names() {
        for bad in ["", "1abc", "array(", "array()", "map(a,b))", "array(bigint", "a-b"] {
            assert!(
                matches!(TypeSignature::parse(bad), Err(AggregationError::UnknownType(ref n)) if n == bad),
                "expected UnknownType for {bad:?}"
            );
        }
    }

    #[test]
    fn rejects_nesting_past_the_limit() {
        let nested = |depth: usize| format!("{}bigint{}", "array(".repeat(depth), ")".repeat(depth));

        let deepest = TypeSignature::parse(&nested(MAX_TYPE_DEPTH)).unwrap();
        assert_eq!(deepest.base, "array");

        let too_deep = nested(MAX_TYPE_DEPTH + 1);
        assert_eq!(TypeSignature::parse(&too_deep), Err(AggregationError::UnknownType(too_deep.clone())));

        let huge = nested(100_000);
        assert!(matches!(TypeSignature::parse(&huge), Err(AggregationError::UnknownType(_))));
    }
}
