use serde::{Deserialize, Serialize};

/// Normalization steps applied by [`tokenize`]; each can be switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerOptions {
    #[serde(default = "default_true")]
    pub lowercase: bool,

    /// Treat brackets, punctuation and operators as whitespace
    #[serde(default = "default_true")]
    pub split_code: bool,

    #[serde(default = "default_true")]
    pub remove_stopwords: bool,

    /// Light suffix stripping
    #[serde(default = "default_true")]
    pub stem: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TokenizerOptions {
    fn default() -> Self {
        Self {
            lowercase: true,
            split_code: true,
            remove_stopwords: true,
            stem: true,
        }
    }
}

impl TokenizerOptions {
    /// Whitespace splitting only
    pub fn raw() -> Self {
        Self {
            lowercase: false,
            split_code: false,
            remove_stopwords: false,
            stem: false,
        }
    }
}

pub const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

fn is_code_delimiter(ch: char) -> bool {
    matches!(
        ch,
        '{' | '}'
            | '('
            | ')'
            | '['
            | ']'
            | '<'
            | '>'
            | ';'
            | ':'
            | ','
            | '.'
            | '='
            | '+'
            | '-'
            | '*'
            | '/'
            | '%'
            | '!'
            | '&'
            | '|'
            | '^'
            | '~'
            | '?'
            | '@'
            | '#'
            | '$'
            | '"'
            | '\''
            | '`'
            | '\\'
    )
}

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token) || STOPWORDS.contains(&token.to_lowercase().as_str())
}

/// Strip one common English suffix. Tokens of three characters or fewer are
/// left alone.
pub fn stem(token: &str) -> String {
    if token.chars().count() <= 3 {
        return token.to_string();
    }

    for suffix in ["ing", "ed", "ly", "ment"] {
        if let Some(stripped) = token.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }

    if !token.ends_with("ss")
        && let Some(stripped) = token.strip_suffix('s')
    {
        return stripped.to_string();
    }

    token.to_string()
}

/// Turn text into index terms. Pure and deterministic; never fails.
pub fn tokenize(text: &str, options: &TokenizerOptions) -> Vec<String> {
    let text = if options.lowercase {
        text.to_lowercase()
    } else {
        text.to_string()
    };

    let text: String = if options.split_code {
        text.chars()
            .map(|ch| if is_code_delimiter(ch) { ' ' } else { ch })
            .collect()
    } else {
        text
    };

    text.split_whitespace()
        .filter(|token| !(options.remove_stopwords && is_stopword(token)))
        .map(|token| {
            if options.stem {
                stem(token)
            } else {
                token.to_string()
            }
        })
        .collect()
}
