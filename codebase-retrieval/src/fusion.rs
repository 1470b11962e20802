use crate::config::RetrievalConfig;
use crate::result::{FileSpan, SearchSource};
use cloi_code_chunker::ChunkLocation;
use cloi_lexical_index::SearchHit;
use cloi_vector_store::VectorHit;
use log::debug;
use std::collections::HashMap;
use std::path::{Component, Path};

/// One fused candidate file
#[derive(Debug, Clone, PartialEq)]
pub struct RankedFile {
    pub file_path: String,
    pub span: FileSpan,
}

#[derive(Default)]
struct FileAccumulator {
    /// Best vector similarity of any span in the file
    semantic: f32,
    /// Best normalized BM25 score of any span in the file
    lexical: f32,
    /// (span score, start, end, source) of the best span so far
    best_span: Option<(f32, usize, usize, SearchSource)>,
}

impl FileAccumulator {
    fn offer_span(&mut self, score: f32, start_line: usize, end_line: usize, source: SearchSource) {
        let better = match self.best_span {
            Some((best, ..)) => score > best,
            None => true,
        };
        if better {
            self.best_span = Some((score, start_line, end_line, source));
        }
    }
}

/// Merges lexical and vector hits into a ranking of files.
///
/// A file scores `best similarity + lexical_weight * best normalized BM25`,
/// plus `best_guess_boost` when it is the upstream best guess. Only the
/// candidates sharing the most trailing path components with the guess are
/// boosted.
pub struct FusionEngine {
    config: RetrievalConfig,
}

impl FusionEngine {
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    /// Files ranked best first. With no hits at all the best guess, if any,
    /// is the only file.
    pub fn fuse(
        &self,
        lexical_hits: &[SearchHit],
        semantic_hits: &[VectorHit],
        best_guess: Option<&str>,
    ) -> Vec<RankedFile> {
        debug!(
            "Fusing {} lexical + {} semantic hits",
            lexical_hits.len(),
            semantic_hits.len()
        );

        let mut files: HashMap<String, FileAccumulator> = HashMap::new();

        for hit in semantic_hits {
            let entry = files.entry(hit.chunk.file_path.clone()).or_default();
            entry.semantic = entry.semantic.max(hit.score);
            entry.offer_span(
                hit.score,
                hit.chunk.start_line,
                hit.chunk.end_line,
                SearchSource::Semantic,
            );
        }

        let max_lexical = lexical_hits
            .iter()
            .map(|hit| hit.score)
            .fold(0.0f64, f64::max);
        for hit in lexical_hits {
            let location: ChunkLocation = match serde_json::from_value(hit.metadata.clone()) {
                Ok(location) => location,
                Err(err) => {
                    debug!("Skipping lexical hit {} without a location: {err}", hit.id);
                    continue;
                }
            };
            let normalized = if max_lexical > 0.0 {
                (hit.score / max_lexical) as f32
            } else {
                0.0
            };

            let entry = files.entry(location.file_path).or_default();
            entry.lexical = entry.lexical.max(normalized);
            entry.offer_span(
                self.config.lexical_weight * normalized,
                location.start_line,
                location.end_line,
                SearchSource::Lexical,
            );
        }

        if files.is_empty() {
            return best_guess
                .map(|guess| RankedFile {
                    file_path: guess.to_string(),
                    span: FileSpan {
                        start_line: 0,
                        end_line: 0,
                        score: 0.0,
                        source: SearchSource::BestGuess,
                    },
                })
                .into_iter()
                .collect();
        }

        let guess_match = best_guess.map_or(0, |guess| {
            files
                .keys()
                .map(|file_path| shared_components(file_path, guess))
                .max()
                .unwrap_or(0)
        });

        let mut ranked: Vec<(RankedFile, f32)> = files
            .into_iter()
            .filter_map(|(file_path, acc)| {
                let (_, start_line, end_line, source) = acc.best_span?;
                let mut score = acc.semantic + self.config.lexical_weight * acc.lexical;
                let is_guess = best_guess
                    .is_some_and(|guess| shared_components(&file_path, guess) == guess_match);
                if guess_match > 0 && is_guess {
                    score += self.config.best_guess_boost;
                }
                Some((
                    RankedFile {
                        file_path,
                        span: FileSpan {
                            start_line,
                            end_line,
                            score,
                            source,
                        },
                    },
                    acc.lexical,
                ))
            })
            .collect();

        ranked.sort_by(|(a, a_lexical), (b, b_lexical)| {
            b.span
                .score
                .total_cmp(&a.span.score)
                .then(b_lexical.total_cmp(a_lexical))
                .then_with(|| a.file_path.cmp(&b.file_path))
        });

        ranked.into_iter().map(|(file, _)| file).collect()
    }
}

/// Number of trailing path components two paths have in common, so
/// `src/api/users.js` and `/repo/api/users.js` share 2. Root and `.`
/// components are ignored.
pub fn shared_components(candidate: &str, guess: &str) -> usize {
    let names = |path: &str| {
        Path::new(path)
            .components()
            .filter_map(|component| match component {
                Component::Normal(name) => Some(name.to_os_string()),
                _ => None,
            })
            .collect::<Vec<_>>()
    };
    let candidate = names(candidate);
    let guess = names(guess);
    candidate
        .iter()
        .rev()
        .zip(guess.iter().rev())
        .take_while(|(a, b)| a == b)
        .count()
}
