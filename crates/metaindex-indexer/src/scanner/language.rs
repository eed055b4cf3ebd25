//! Language detection from file extensions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Languages recognised by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    Cpp,
    CSharp,
    Css,
    Go,
    Html,
    Java,
    JavaScript,
    Json,
    Kotlin,
    Markdown,
    Php,
    Python,
    Ruby,
    Rust,
    Shell,
    Sql,
    Swift,
    Toml,
    TypeScript,
    Text,
    Xml,
    Yaml,
    Unknown,
}

impl Language {
    /// Lower-case identifier stored in records and matched by queries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Css => "css",
            Language::Go => "go",
            Language::Html => "html",
            Language::Java => "java",
            Language::JavaScript => "javascript",
            Language::Json => "json",
            Language::Kotlin => "kotlin",
            Language::Markdown => "markdown",
            Language::Php => "php",
            Language::Python => "python",
            Language::Ruby => "ruby",
            Language::Rust => "rust",
            Language::Shell => "shell",
            Language::Sql => "sql",
            Language::Swift => "swift",
            Language::Toml => "toml",
            Language::TypeScript => "typescript",
            Language::Text => "text",
            Language::Xml => "xml",
            Language::Yaml => "yaml",
            Language::Unknown => "unknown",
        }
    }

    /// Map a normalized extension (lower-case, leading dot) to a language.
    pub fn from_extension(ext: &str) -> Language {
        match ext {
            ".c" | ".h" => Language::C,
            ".cc" | ".cpp" | ".hpp" => Language::Cpp,
            ".cs" => Language::CSharp,
            ".css" => Language::Css,
            ".go" => Language::Go,
            ".html" => Language::Html,
            ".java" => Language::Java,
            ".js" => Language::JavaScript,
            ".json" => Language::Json,
            ".kt" => Language::Kotlin,
            ".md" => Language::Markdown,
            ".php" => Language::Php,
            ".py" => Language::Python,
            ".rb" => Language::Ruby,
            ".rs" => Language::Rust,
            ".sh" => Language::Shell,
            ".sql" => Language::Sql,
            ".swift" => Language::Swift,
            ".toml" => Language::Toml,
            ".ts" | ".tsx" => Language::TypeScript,
            ".txt" => Language::Text,
            ".xml" => Language::Xml,
            ".yaml" | ".yml" => Language::Yaml,
            _ => Language::Unknown,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower-cased extension of `path` including the leading dot, or an empty
/// string. Dotfiles such as `.gitignore` have no extension.
pub fn normalized_extension(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!(".{}", ext.to_lowercase()),
        _ => String::new(),
    }
}

/// Detect the language of a file based on its extension.
pub fn detect_language(path: &Path) -> Language {
    Language::from_extension(&normalized_extension(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_detect_rust() {
        assert_eq!(detect_language(&PathBuf::from("main.rs")), Language::Rust);
        assert_eq!(detect_language(&PathBuf::from("src/lib.rs")), Language::Rust);
    }

    #[test]
    fn test_detect_c_family() {
        assert_eq!(detect_language(&PathBuf::from("x.h")), Language::C);
        assert_eq!(detect_language(&PathBuf::from("x.hpp")), Language::Cpp);
        assert_eq!(detect_language(&PathBuf::from("x.cc")), Language::Cpp);
        assert_eq!(detect_language(&PathBuf::from("x.cs")), Language::CSharp);
    }

    #[test]
    fn test_detect_typescript() {
        assert_eq!(detect_language(&PathBuf::from("index.ts")), Language::TypeScript);
        assert_eq!(detect_language(&PathBuf::from("App.tsx")), Language::TypeScript);
    }

    #[test]
    fn test_detect_config_files() {
        assert_eq!(detect_language(&PathBuf::from("package.json")), Language::Json);
        assert_eq!(detect_language(&PathBuf::from("config.yml")), Language::Yaml);
        assert_eq!(detect_language(&PathBuf::from("Cargo.toml")), Language::Toml);
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(detect_language(&PathBuf::from("file.xyz")), Language::Unknown);
        assert_eq!(detect_language(&PathBuf::from("noextension")), Language::Unknown);
        // No JSX entry in the table.
        assert_eq!(detect_language(&PathBuf::from("App.jsx")), Language::Unknown);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(detect_language(&PathBuf::from("main.RS")), Language::Rust);
        assert_eq!(detect_language(&PathBuf::from("README.MD")), Language::Markdown);
    }

    #[test]
    fn test_normalized_extension() {
        assert_eq!(normalized_extension(Path::new("a/b/Main.PY")), ".py");
        assert_eq!(normalized_extension(Path::new("archive.tar.gz")), ".gz");
        assert_eq!(normalized_extension(Path::new(".gitignore")), "");
        assert_eq!(normalized_extension(Path::new("Makefile")), "");
        assert_eq!(normalized_extension(Path::new("trailing.")), "");
    }

    #[test]
    fn test_language_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Language::CSharp).unwrap(), "\"csharp\"");
        assert_eq!(Language::JavaScript.to_string(), "javascript");
    }
}
