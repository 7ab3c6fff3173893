use std::ffi::OsStr;
use std::path::Path;

/// Prefix of the annotation line written as the first line of every fenced
/// block in a combined document.
pub const FILEPATH_ANNOTATION: &str = "// filepath: ";

pub fn get_language_tag(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(OsStr::to_str)
        .unwrap_or("")
        .to_lowercase()
        .as_str()
    {
        "rs" => "rust",
        "js" => "javascript",
        "jsx" => "jsx",
        "ts" => "typescript",
        "tsx" => "tsx",
        "py" => "python",
        "java" => "java",
        "c" => "c",
        "cpp" => "cpp",
        "h" => "c",
        "html" => "html",
        "css" => "css",
        "scss" => "scss",
        "md" => "markdown",
        "json" => "json",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "xml" => "xml",
        _ => "text",
    }
}

/// Returns a backtick fence long enough to wrap `content` safely.
///
/// At least three backticks, and always one longer than the longest run of
/// backticks inside the content.
pub fn fence_for(content: &str) -> String {
    let mut longest = 0;
    let mut current = 0;
    for c in content.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}

/// Normalizes an extension filter value: lowercase, no leading dot.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Checks whether `path` has one of the given extensions (case-insensitive).
/// An empty set matches everything.
pub fn has_allowed_extension(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| {
            let ext = ext.to_lowercase();
            extensions.iter().any(|allowed| *allowed == ext)
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_language_tags() {
        assert_eq!(get_language_tag(Path::new("src/app.TS")), "typescript");
        assert_eq!(get_language_tag(Path::new("styles/site.scss")), "scss");
        assert_eq!(get_language_tag(Path::new("config.yml")), "yaml");
        assert_eq!(get_language_tag(Path::new("Makefile")), "text");
    }

    #[test]
    fn test_fence_grows_past_embedded_backticks() {
        assert_eq!(fence_for("plain text"), "```");
        assert_eq!(fence_for("```rust\nfn main() {}\n```"), "````");
        assert_eq!(fence_for("a ````` b"), "``````");
    }

    #[test]
    fn test_extension_filter() {
        let exts = vec![normalize_extension(".TS"), normalize_extension("md")];
        assert_eq!(exts, vec!["ts".to_string(), "md".to_string()]);
        assert!(has_allowed_extension(&PathBuf::from("a/b.ts"), &exts));
        assert!(has_allowed_extension(&PathBuf::from("README.MD"), &exts));
        assert!(!has_allowed_extension(&PathBuf::from("a/b.rs"), &exts));
        assert!(!has_allowed_extension(&PathBuf::from("LICENSE"), &exts));
        assert!(has_allowed_extension(&PathBuf::from("LICENSE"), &[]));
    }
}
