/// Normalize code text before it is sent for embedding: unify line endings,
/// expand tabs, collapse runs of blank lines, trim, then cut to `max_chars`
/// characters.
pub fn preprocess(text: &str, max_chars: usize) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n").replace('\t', "    ");

    let mut out = String::with_capacity(normalized.len());
    let mut blank_run = 0usize;
    for line in normalized.split('\n') {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    truncate_chars(out.trim(), max_chars).to_string()
}

/// Longest prefix of `text` holding at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalizes_whitespace() {
        let text = "\r\n\r\nfn main() {\r\n\tlet x = 1;   \r\n\r\n\r\n\r\n\tx\r}\n\n";
        assert_eq!(
            preprocess(text, 2000),
            "fn main() {\n    let x = 1;\n\n    x\n}"
        );
    }

    #[test]
    fn test_truncates_to_character_budget() {
        assert_eq!(preprocess("abcdef", 3), "abc");
        // multi-byte characters are never split
        assert_eq!(preprocess("ééééé", 2), "éé");
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn test_blank_input() {
        assert_eq!(preprocess(" \n\t\r\n ", 10), "");
    }
}
