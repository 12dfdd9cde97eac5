//! Dependency reference strings (`$<stepId>.<path>`)

use regex::Regex;
use std::sync::LazyLock;

static REFERENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$([^.\s$]+)\.(\S*)").expect("valid reference regex"));

/// A parsed reference to another step's output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReference<'a> {
    /// Referenced step identifier
    pub step_id: &'a str,

    /// Path into that step's output (may be empty)
    pub path: &'a str,
}

/// Parse a reference string, returning `None` when it doesn't match
pub fn parse_reference(value: &str) -> Option<StepReference<'_>> {
    let caps = REFERENCE_RE.captures(value)?;
    let step_id = caps.get(1)?.as_str();
    let path = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    Some(StepReference { step_id, path })
}

/// Referenced step identifier, if any
pub fn referenced_step(value: &str) -> Option<&str> {
    parse_reference(value).map(|r| r.step_id)
}

/// Build a reference string for `step_id` and `path`
pub fn format_reference(step_id: &str, path: &str) -> String {
    format!("${}.{}", step_id, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference() {
        let r = parse_reference("$step1.output").unwrap();
        assert_eq!(r.step_id, "step1");
        assert_eq!(r.path, "output");

        let r = parse_reference("$gen_image.output.images.0.url").unwrap();
        assert_eq!(r.step_id, "gen_image");
        assert_eq!(r.path, "output.images.0.url");
    }

    #[test]
    fn test_malformed_references() {
        assert!(parse_reference("step1.output").is_none());
        assert!(parse_reference("$step1").is_none());
        assert!(parse_reference("$.output").is_none());
        assert!(parse_reference("").is_none());
    }

    #[test]
    fn test_reference_must_lead() {
        assert!(parse_reference("price is $5.00").is_none());
        assert!(parse_reference(" $step1.output").is_none());
        assert_eq!(referenced_step("use $step1.output here"), None);
    }

    #[test]
    fn test_trailing_dot_has_empty_path() {
        let r = parse_reference("$step1.").unwrap();
        assert_eq!(r.step_id, "step1");
        assert_eq!(r.path, "");
    }

    #[test]
    fn test_format_reference() {
        let s = format_reference("step2", "output");
        assert_eq!(s, "$step2.output");
        assert_eq!(referenced_step(&s), Some("step2"));
    }
}
