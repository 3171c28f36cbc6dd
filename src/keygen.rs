//! Document key generation
//!
//! Keys are short random strings. Uniqueness is not structural: the document
//! service checks every candidate against the store before using it.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;

const VOWELS: &[u8] = b"aeiou";
const CONSONANTS: &[u8] = b"bcdfghjklmnpqrstvwxyz";
const DEFAULT_KEY_SPACE: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Produces candidate document keys
pub trait KeyGenerator: Send + Sync {
    /// Create a key of exactly `length` characters
    fn create_key(&self, length: usize) -> String;
}

/// Key generation strategy selected by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyGeneratorKind {
    Phonetic,
    Random,
}

impl KeyGeneratorKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "phonetic" => Some(KeyGeneratorKind::Phonetic),
            "random" => Some(KeyGeneratorKind::Random),
            _ => None,
        }
    }

    /// Build the generator for this strategy
    pub fn build(self, key_space: Option<&str>) -> Box<dyn KeyGenerator> {
        match self {
            KeyGeneratorKind::Phonetic => Box::new(PhoneticKeyGenerator),
            KeyGeneratorKind::Random => Box::new(match key_space {
                Some(space) => RandomKeyGenerator::with_key_space(space),
                None => RandomKeyGenerator::default(),
            }),
        }
    }
}

/// Pronounceable keys alternating consonants and vowels
#[derive(Debug, Clone, Copy, Default)]
pub struct PhoneticKeyGenerator;

impl KeyGenerator for PhoneticKeyGenerator {
    fn create_key(&self, length: usize) -> String {
        let mut rng = rand::thread_rng();
        // Which parity gets the consonants
        let start = rng.gen_range(0..2);

        (0..length)
            .map(|i| {
                let class = if i % 2 == start { CONSONANTS } else { VOWELS };
                class[rng.gen_range(0..class.len())] as char
            })
            .collect()
    }
}

/// Uniform draw from a fixed alphabet
#[derive(Debug, Clone)]
pub struct RandomKeyGenerator {
    key_space: Vec<char>,
}

impl Default for RandomKeyGenerator {
    fn default() -> Self {
        Self::with_key_space(DEFAULT_KEY_SPACE)
    }
}

impl RandomKeyGenerator {
    /// Use a custom alphabet; an empty one falls back to alphanumerics
    pub fn with_key_space(key_space: &str) -> Self {
        let mut chars: Vec<char> = key_space.chars().collect();
        if chars.is_empty() {
            chars = DEFAULT_KEY_SPACE.chars().collect();
        }
        Self { key_space: chars }
    }
}

impl KeyGenerator for RandomKeyGenerator {
    fn create_key(&self, length: usize) -> String {
        let mut rng = rand::thread_rng();
        (0..length)
            .filter_map(|_| self.key_space.choose(&mut rng))
            .collect()
    }
}
