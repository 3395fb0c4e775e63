use rand::{seq::SliceRandom, Rng};
use std::{fs, path::Path};

use crate::models::word_pack::WordPack;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read word pack file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse word pack file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("word pack {index} must hold 3 or 4 non-empty words")]
    InvalidPack { index: usize },
    #[error("word pack catalog is empty")]
    Empty,
}

const BUILTIN_PACKS: &[&[&str]] = &[
    &["Coffee", "Tea", "Hot Chocolate", "Juice"],
    &["Cat", "Lion", "Tiger", "Leopard"],
    &["Beach", "Desert", "Island"],
    &["Football", "Basketball", "Handball", "Volleyball"],
    &["Pyramid", "Castle", "Tower"],
    &["Piano", "Guitar", "Violin", "Oud"],
    &["Doctor", "Nurse", "Pharmacist", "Dentist"],
    &["Train", "Tram", "Metro"],
    &["Pizza", "Burger", "Shawarma", "Falafel"],
    &["Cinema", "Theatre", "Circus"],
    &["Rain", "Snow", "Hail", "Fog"],
    &["Moon", "Sun", "Mars", "Star"],
];

/// Catalog of word packs plus the no-repeat selection rule.
#[derive(Debug, Clone)]
pub struct WordPackRegistry {
    packs: Vec<WordPack>,
}

impl Default for WordPackRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl WordPackRegistry {
    pub fn builtin() -> Self {
        WordPackRegistry {
            packs: BUILTIN_PACKS
                .iter()
                .map(|words| WordPack::new(words.iter().copied()))
                .collect(),
        }
    }

    pub fn new(packs: Vec<WordPack>) -> Result<Self, RegistryError> {
        if packs.is_empty() {
            return Err(RegistryError::Empty);
        }
        if let Some(index) = packs.iter().position(|p| !p.is_valid()) {
            return Err(RegistryError::InvalidPack { index });
        }
        Ok(WordPackRegistry { packs })
    }

    /// Loads a JSON array of word arrays, e.g. `[["Sea", "Lake", "River"]]`.
    pub fn from_file(path: &Path) -> Result<Self, RegistryError> {
        let text = fs::read_to_string(path)?;
        let words: Vec<Vec<String>> = serde_json::from_str(&text)?;
        Self::new(words.into_iter().map(WordPack::new).collect())
    }

    pub fn len(&self) -> usize {
        self.packs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&WordPack> {
        self.packs.get(index)
    }

    /// Picks a pack nobody has seen in the current history cycle and returns
    /// its index together with the updated history. Once every pack has been
    /// used the history starts over.
    pub fn select<R: Rng + ?Sized>(&self, history: &[usize], rng: &mut R) -> (usize, Vec<usize>) {
        let unused: Vec<usize> = (0..self.packs.len())
            .filter(|i| !history.contains(i))
            .collect();

        match unused.choose(rng) {
            Some(&index) => {
                let mut next = history.to_vec();
                next.push(index);
                (index, next)
            }
            None => {
                let index = rng.gen_range(0..self.packs.len());
                (index, vec![index])
            }
        }
    }
}
