// widgetdesk-core/src/deps.rs
//! Dependency declarations in the header comment of a widget manifest.
//!
//! ```toml
//! # Clock widget
//! #
//! # Dependencies:
//! #   tzdata==2024.1
//! #   colorama>=0.4
//! #
//! entry = "clock"
//! ```

const SECTION: &str = "Dependencies:";

/// Extract the dependency specifiers declared in the manifest header.
///
/// Never fails: a missing or malformed block yields an empty list.
pub fn parse_dependencies(source: &str) -> Vec<String> {
    let mut deps = Vec::new();
    let mut in_section = false;
    let mut seen_section = false;

    for line in header_lines(source) {
        if line == SECTION {
            if seen_section {
                // Two dependency sections: ambiguous, declare nothing
                return Vec::new();
            }
            seen_section = true;
            in_section = true;
            continue;
        }

        if !in_section || line.is_empty() {
            continue;
        }

        if is_section_header(line) {
            in_section = false;
            continue;
        }

        deps.push(line.to_string());
    }

    deps
}

/// Comment text of the leading `#` block, markers and outer whitespace removed
fn header_lines(source: &str) -> impl Iterator<Item = &str> {
    source
        .lines()
        .map(str::trim)
        .skip_while(|line| line.is_empty())
        .take_while(|line| line.is_empty() || line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim())
}

/// `Author:`, `Notes:` and similar labels end the dependency section
fn is_section_header(line: &str) -> bool {
    match line.strip_suffix(':') {
        Some(label) => {
            !label.is_empty()
                && label
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == ' ' || c == '-' || c == '_')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listed_specifiers_in_order() {
        let source = "# Clock widget\n#\n# Dependencies:\n#   tzdata==2024.1\n#colorama>=0.4  \n#\nentry = \"clock\"\n";
        assert_eq!(
            parse_dependencies(source),
            vec!["tzdata==2024.1".to_string(), "colorama>=0.4".to_string()]
        );
    }

    #[test]
    fn test_blank_lines_are_dropped() {
        let source = "# Dependencies:\n#\n#   requests==2.28.1\n#      \n\n# psutil\n";
        assert_eq!(parse_dependencies(source), vec!["requests==2.28.1", "psutil"]);
    }

    #[test]
    fn test_leading_blank_lines_before_header() {
        let source = "\n\n# Dependencies:\n# requests==2.28.1\nentry = \"x\"\n";
        assert_eq!(parse_dependencies(source), vec!["requests==2.28.1"]);
    }

    #[test]
    fn test_no_block_returns_empty() {
        assert!(parse_dependencies("").is_empty());
        assert!(parse_dependencies("entry = \"clock\"\n").is_empty());
        assert!(parse_dependencies("# Just a title\n# nothing else\n").is_empty());
    }

    #[test]
    fn test_section_outside_header_is_ignored() {
        let source = "entry = \"clock\"\n# Dependencies:\n# requests\n";
        assert!(parse_dependencies(source).is_empty());
    }

    #[test]
    fn test_next_section_ends_dependencies() {
        let source = "# Dependencies:\n# requests\n# Author:\n# someone\n";
        assert_eq!(parse_dependencies(source), vec!["requests"]);
    }

    #[test]
    fn test_duplicate_section_is_malformed() {
        let source = "# Dependencies:\n# requests\n# Dependencies:\n# psutil\n";
        assert!(parse_dependencies(source).is_empty());
    }

    #[test]
    fn test_specifier_with_markers_is_not_a_header() {
        assert!(!is_section_header("requests==2.28.1"));
        assert!(!is_section_header("pkg @ https://example.org/pkg.whl:"));
        assert!(is_section_header("Release notes:"));
    }
}
