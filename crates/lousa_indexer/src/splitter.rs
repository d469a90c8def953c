use std::collections::VecDeque;

use lousa_domain::ChunkingConfig;

use crate::Chunker;

/// Separator ladder tried in order; the empty separator is the hard-cut base
/// case.
pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Recursive character splitter.
///
/// For each separator in order the text is split into segments; segments
/// still larger than `chunk_size` recurse with the next separator. Small
/// adjacent segments merge greedily up to `chunk_size`, carrying an `overlap`
/// suffix into the next chunk. All sizes are measured in characters, so
/// multi-byte text never splits inside a code point.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: ChunkingConfig,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(config: ChunkingConfig) -> Self {
        Self {
            config,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Splits `text` into ordered, non-empty chunks. Deterministic for a
    /// given text and config.
    pub fn split(&self, text: &str) -> Vec<String> {
        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        self.split_with(text, &separators)
            .into_iter()
            .filter(|chunk| !chunk.trim().is_empty())
            .collect()
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let chunk_size = self.config.chunk_size;

        let (index, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, s)| s.is_empty() || text.contains(*s))
            .map(|(i, s)| (i, *s))
            .unwrap_or((separators.len().saturating_sub(1), ""));
        let remaining = &separators[(index + 1).min(separators.len())..];

        let splits: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator).map(str::to_string).collect()
        };

        let mut finals = Vec::new();
        let mut mergeable: Vec<String> = Vec::new();
        for piece in splits {
            if piece.chars().count() < chunk_size {
                mergeable.push(piece);
            } else {
                if !mergeable.is_empty() {
                    finals.extend(self.merge(&mergeable, separator));
                    mergeable.clear();
                }
                if remaining.is_empty() {
                    finals.push(piece);
                } else {
                    finals.extend(self.split_with(&piece, remaining));
                }
            }
        }
        if !mergeable.is_empty() {
            finals.extend(self.merge(&mergeable, separator));
        }
        finals
    }

    /// Greedy merge of small segments with overlap carry-over.
    fn merge(&self, splits: &[String], separator: &str) -> Vec<String> {
        let chunk_size = self.config.chunk_size;
        let overlap = self.config.overlap;
        let separator_len = separator.chars().count();

        let mut docs: Vec<String> = Vec::new();
        let mut current: VecDeque<String> = VecDeque::new();
        let mut total = 0usize;

        for piece in splits {
            let len = piece.chars().count();
            let joiner = if current.is_empty() { 0 } else { separator_len };
            if total + len + joiner > chunk_size && !current.is_empty() {
                if let Some(doc) = join_splits(&current, separator) {
                    docs.push(doc);
                }
                // shrink the window to the overlap budget before continuing
                while total > overlap
                    || (total + len + if current.is_empty() { 0 } else { separator_len }
                        > chunk_size
                        && total > 0)
                {
                    let head = match current.pop_front() {
                        Some(head) => head,
                        None => break,
                    };
                    total -= head.chars().count()
                        + if current.is_empty() { 0 } else { separator_len };
                }
            }
            current.push_back(piece.clone());
            total += len + if current.len() > 1 { separator_len } else { 0 };
        }
        if let Some(doc) = join_splits(&current, separator) {
            docs.push(doc);
        }
        docs
    }
}

fn join_splits(parts: &VecDeque<String>, separator: &str) -> Option<String> {
    let joined = parts
        .iter()
        .cloned()
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl Chunker for TextSplitter {
    type Input = String;
    type Output = String;

    fn chunk(&self, input: String) -> Vec<String> {
        self.split(&input)
    }
}
