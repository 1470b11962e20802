use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::path::Path;

/// Supported programming languages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    Kotlin,
    C,
    Cpp,
    CSharp,
    Ruby,
    Php,
    Swift,
    Bash,
    Unknown,
}

/// How a language delimits blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scoping {
    /// `{ ... }` delimited
    Brace,
    /// Indentation delimited
    Indent,
    /// No usable heuristic; fixed windows only
    Plain,
}

/// The leading import/using statements of a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportBlock {
    /// Import lines exactly as written
    pub lines: Vec<String>,
    /// 0-based index of the last line belonging to the preamble
    pub last_line: Option<usize>,
}

impl ImportBlock {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Preamble text prepended to chunk content
    pub fn header(&self) -> String {
        self.lines.join("\n")
    }
}

static RUST_IMPORT: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^(pub(\([^)]*\))?\s+)?(use\s|extern\s+crate\s|mod\s+\w+\s*;)").ok()
});
static PYTHON_IMPORT: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(import\s|from\s+\S+\s+import\b)").ok());
static JS_IMPORT: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r#"^(import[\s{*'"]|export\s+(\*|\{[^}]*\})\s*from\s|(const|let|var)\s+.+=\s*require\()"#,
    )
    .ok()
});
static GO_IMPORT: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(package\s|import\s|import\()").ok());
static JVM_IMPORT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^(package|import)\s").ok());
static C_IMPORT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^#\s*include\b").ok());
static CPP_IMPORT: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(#\s*include\b|using\s+namespace\s|import\s)").ok());
static CSHARP_IMPORT: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(global\s+)?using\s+[\w.=\s]+;").ok());
static RUBY_IMPORT: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(require|require_relative|load)\b").ok());
static PHP_IMPORT: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^(<\?php|namespace\s|use\s|require(_once)?\b|include(_once)?\b)").ok()
});
static SWIFT_IMPORT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^import\s").ok());
static BASH_IMPORT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^(source|\.)\s").ok());

impl Language {
    /// Detect language from file extension
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    /// Detect language from file extension string
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Language::Rust,
            "py" | "pyw" | "pyi" => Language::Python,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "tsx" | "mts" | "cts" => Language::TypeScript,
            "go" => Language::Go,
            "java" => Language::Java,
            "kt" | "kts" | "scala" => Language::Kotlin,
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hxx" => Language::Cpp,
            "cs" => Language::CSharp,
            "rb" => Language::Ruby,
            "php" => Language::Php,
            "swift" => Language::Swift,
            "sh" | "bash" | "zsh" => Language::Bash,
            _ => Language::Unknown,
        }
    }

    /// Get the language name as string
    pub fn name(self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Swift => "swift",
            Language::Bash => "bash",
            Language::Unknown => "unknown",
        }
    }

    pub fn scoping(self) -> Scoping {
        match self {
            Language::Python => Scoping::Indent,
            Language::Ruby | Language::Unknown => Scoping::Plain,
            _ => Scoping::Brace,
        }
    }

    /// Whether `#` starts a line comment (as opposed to a preprocessor line)
    fn hash_comments(self) -> bool {
        matches!(
            self,
            Language::Python | Language::Ruby | Language::Bash | Language::Php
        )
    }

    fn slash_comments(self) -> bool {
        !matches!(
            self,
            Language::Python | Language::Ruby | Language::Bash | Language::Unknown
        )
    }

    fn import_pattern(self) -> Option<&'static Regex> {
        let pattern = match self {
            Language::Rust => &RUST_IMPORT,
            Language::Python => &PYTHON_IMPORT,
            Language::JavaScript | Language::TypeScript => &JS_IMPORT,
            Language::Go => &GO_IMPORT,
            Language::Java | Language::Kotlin => &JVM_IMPORT,
            Language::C => &C_IMPORT,
            Language::Cpp => &CPP_IMPORT,
            Language::CSharp => &CSHARP_IMPORT,
            Language::Ruby => &RUBY_IMPORT,
            Language::Php => &PHP_IMPORT,
            Language::Swift => &SWIFT_IMPORT,
            Language::Bash => &BASH_IMPORT,
            Language::Unknown => return None,
        };
        pattern.as_ref()
    }

    /// Check if a trimmed line is an import/using statement
    pub fn is_import_line(self, line: &str) -> bool {
        self.import_pattern()
            .is_some_and(|pattern| pattern.is_match(line))
    }

    /// Check if a trimmed line is (the start of) a comment
    pub fn is_comment_line(self, line: &str) -> bool {
        if self.slash_comments()
            && (line.starts_with("//") || line.starts_with("/*") || line.starts_with('*'))
        {
            return true;
        }
        self.hash_comments() && line.starts_with('#')
    }

    /// Capture the file's leading import statements, skipping blank and
    /// comment lines. Stops at the first line of real code.
    pub fn extract_imports(self, lines: &[&str], max_lines: usize) -> ImportBlock {
        let mut block = ImportBlock::default();
        if self.import_pattern().is_none() {
            return block;
        }

        let mut open_delims: i32 = 0;
        let mut in_block_comment = false;
        let mut in_docstring: Option<&'static str> = None;

        for (idx, raw) in lines.iter().enumerate() {
            if block.lines.len() >= max_lines {
                break;
            }
            let line = raw.trim();

            // continuation of a multi-line import
            if open_delims > 0 {
                block.lines.push((*raw).to_string());
                block.last_line = Some(idx);
                open_delims += delimiter_balance(line);
                continue;
            }

            if in_block_comment {
                if line.contains("*/") {
                    in_block_comment = false;
                }
                continue;
            }

            if let Some(quote) = in_docstring {
                if line.contains(quote) {
                    in_docstring = None;
                }
                continue;
            }

            if line.is_empty() {
                continue;
            }

            if self.is_comment_line(line) {
                if line.starts_with("/*") && !line.contains("*/") {
                    in_block_comment = true;
                }
                continue;
            }

            if self == Language::Python {
                if let Some(quote) = ["\"\"\"", "'''"]
                    .into_iter()
                    .find(|quote| line.starts_with(*quote))
                {
                    if line.matches(quote).count() == 1 {
                        in_docstring = Some(quote);
                    }
                    continue;
                }
            }

            if self.is_import_line(line) {
                block.lines.push((*raw).to_string());
                block.last_line = Some(idx);
                open_delims = delimiter_balance(line).max(0);
                continue;
            }

            break;
        }

        block
    }
}

/// Net count of opening `(`/`{` over closing `)`/`}` on a line
fn delimiter_balance(line: &str) -> i32 {
    line.chars().fold(0, |acc, ch| match ch {
        '(' | '{' => acc + 1,
        ')' | '}' => acc - 1,
        _ => acc,
    })
}
