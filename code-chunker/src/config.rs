use serde::{Deserialize, Serialize};

/// Configuration for code chunking. All sizes are in lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Soft upper bound on chunk length. A single span longer than this
    /// becomes its own oversized chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Lines carried forward from the previous chunk
    #[serde(default = "default_overlap")]
    pub overlap: usize,

    /// Pack along detected function/class boundaries
    #[serde(default = "default_true")]
    pub preserve_semantics: bool,

    /// Fixed windows with fewer fresh lines than this are folded into the
    /// previous window
    #[serde(default = "default_min_chunk_lines")]
    pub min_chunk_lines: usize,

    /// Prepend the import preamble to every chunk's content
    #[serde(default = "default_true")]
    pub include_imports: bool,

    /// Maximum number of import lines captured
    #[serde(default = "default_max_import_lines")]
    pub max_import_lines: usize,
}

fn default_chunk_size() -> usize {
    200
}

fn default_overlap() -> usize {
    50
}

fn default_min_chunk_lines() -> usize {
    10
}

fn default_max_import_lines() -> usize {
    50
}

fn default_true() -> bool {
    true
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            preserve_semantics: true,
            min_chunk_lines: default_min_chunk_lines(),
            include_imports: true,
            max_import_lines: default_max_import_lines(),
        }
    }
}

impl ChunkerConfig {
    /// Smaller chunks for dense, short files
    pub fn small() -> Self {
        Self {
            chunk_size: 80,
            overlap: 20,
            min_chunk_lines: 5,
            ..Default::default()
        }
    }

    /// Larger chunks for more context per hit
    pub fn large() -> Self {
        Self {
            chunk_size: 400,
            overlap: 80,
            ..Default::default()
        }
    }

    /// Plain fixed-size windowing, no boundary detection
    pub fn fixed_only() -> Self {
        Self {
            preserve_semantics: false,
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than 0".into());
        }

        if self.overlap >= self.chunk_size {
            return Err(format!(
                "overlap ({}) must be less than chunk_size ({})",
                self.overlap, self.chunk_size
            ));
        }

        if self.min_chunk_lines > self.chunk_size {
            return Err(format!(
                "min_chunk_lines ({}) cannot exceed chunk_size ({})",
                self.min_chunk_lines, self.chunk_size
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_is_valid() {
        let config = ChunkerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunk_size, 200);
        assert_eq!(config.overlap, 50);
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(ChunkerConfig::small().validate().is_ok());
        assert!(ChunkerConfig::large().validate().is_ok());
        assert!(!ChunkerConfig::fixed_only().preserve_semantics);
    }

    #[test]
    fn test_invalid_config() {
        let mut config = ChunkerConfig::default();
        config.overlap = 200;
        assert!(config.validate().is_err());

        config = ChunkerConfig::default();
        config.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ChunkerConfig =
            serde_json::from_str(r#"{"chunk_size": 120}"#).expect("parse partial config");
        assert_eq!(config.chunk_size, 120);
        assert_eq!(config.overlap, 50);
        assert!(config.preserve_semantics);
    }
}
