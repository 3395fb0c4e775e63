use serde::{Deserialize, Serialize};

pub const MIN_PACK_WORDS: usize = 3;
pub const MAX_PACK_WORDS: usize = 4;

/// A handful of neighbouring words. One goes to the outsider, the others to
/// the teams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordPack {
    pub words: Vec<String>,
}

impl WordPack {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        WordPack {
            words: words.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_valid(&self) -> bool {
        (MIN_PACK_WORDS..=MAX_PACK_WORDS).contains(&self.words.len())
            && self.words.iter().all(|w| !w.trim().is_empty())
    }

    /// Number of regular teams this pack can serve.
    pub fn team_capacity(&self) -> usize {
        self.words.len().saturating_sub(1)
    }
}
