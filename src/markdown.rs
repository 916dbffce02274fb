//! Markdown parsing for the index: YAML frontmatter, title and tags.

use serde_json::Value;

/// Parsed view of a markdown file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMarkdown {
    /// Frontmatter as JSON. Always an object; `title` is filled from the
    /// first level-one heading when the frontmatter has none.
    pub metadata: Value,
    pub title: Option<String>,
    pub tags: Vec<String>,
    /// Content with the frontmatter block removed.
    pub body: String,
}

pub fn parse_markdown(source: &str) -> ParsedMarkdown {
    let (frontmatter, body) = split_frontmatter(source);

    let mut metadata = frontmatter
        .and_then(|fm| serde_yaml::from_str::<serde_yaml::Value>(fm).ok())
        .and_then(|yaml| serde_json::to_value(yaml).ok())
        .filter(|v| v.is_object())
        .unwrap_or_else(|| Value::Object(Default::default()));

    let tags = extract_tags(metadata.get("tags"));

    let title = metadata
        .get("title")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| first_heading(body));

    if let (Some(t), Some(obj)) = (&title, metadata.as_object_mut()) {
        obj.entry("title").or_insert_with(|| Value::String(t.clone()));
    }

    ParsedMarkdown {
        metadata,
        title,
        tags,
        body: body.to_string(),
    }
}

/// Splits a leading `---` delimited block from the rest of the document.
fn split_frontmatter(source: &str) -> (Option<&str>, &str) {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let Some(rest) = source
        .strip_prefix("---\n")
        .or_else(|| source.strip_prefix("---\r\n"))
    else {
        return (None, source);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let fm = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(fm), body);
        }
        offset += line.len();
    }
    (None, source)
}

fn first_heading(body: &str) -> Option<String> {
    body.lines()
        .map(str::trim_start)
        .find_map(|l| l.strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn extract_tags(value: Option<&Value>) -> Vec<String> {
    let mut tags: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => s.split(',').map(|t| t.trim().to_string()).collect(),
        _ => Vec::new(),
    };
    tags.retain(|t| !t.is_empty());
    tags.sort();
    tags.dedup();
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_frontmatter_uses_heading() {
        let parsed = parse_markdown("# Workspace for User alice\n\nWelcome.");
        assert_eq!(parsed.title.as_deref(), Some("Workspace for User alice"));
        assert!(parsed.tags.is_empty());
        assert_eq!(parsed.metadata["title"], "Workspace for User alice");
    }

    #[test]
    fn test_frontmatter_title_and_list_tags() {
        let src = "---\ntitle: Plan\ntags: [rust, api]\n---\n# Heading\nbody\n";
        let parsed = parse_markdown(src);
        assert_eq!(parsed.title.as_deref(), Some("Plan"));
        assert_eq!(parsed.tags, vec!["api", "rust"]);
        assert_eq!(parsed.body, "# Heading\nbody\n");
    }

    #[test]
    fn test_comma_separated_tags() {
        let parsed = parse_markdown("---\ntags: notes, todo ,notes\n---\ntext");
        assert_eq!(parsed.tags, vec!["notes", "todo"]);
        assert!(parsed.title.is_none());
    }

    #[test]
    fn test_unterminated_frontmatter_is_body() {
        let src = "---\ntitle: x\nno end";
        let parsed = parse_markdown(src);
        assert_eq!(parsed.body, src);
        assert!(parsed.title.is_none());
    }

    #[test]
    fn test_invalid_yaml_yields_empty_metadata() {
        let parsed = parse_markdown("---\n: : :\n  - [\n---\n# T\n");
        assert!(parsed.metadata.is_object());
        assert_eq!(parsed.title.as_deref(), Some("T"));
    }
}
