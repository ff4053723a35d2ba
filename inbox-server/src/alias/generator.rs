//! Random, email-safe alias local parts in `word-suffix` form.

use std::collections::HashSet;

use rand::prelude::*;
use tracing::{debug, warn};

use crate::error::{ConfigError, ExhaustedError};
use crate::Config;

/// Words used when no list is configured.
pub const DEFAULT_WORDS: &[&str] = &[
    "river", "cloud", "stream", "meadow", "forest", "summit", "haven", "spark",
];

pub const DEFAULT_SUFFIX_LENGTH: usize = 4;

pub const DEFAULT_MAX_ATTEMPTS: usize = 10;

const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generates candidate local parts and retries on observed collisions.
///
/// The uniqueness check is advisory: two generators can race to the same
/// candidate, so the store that accepts the alias must enforce uniqueness.
#[derive(Debug, Clone)]
pub struct AliasGenerator {
    words: Vec<String>,
    suffix_length: usize,
    max_attempts: usize,
}

impl AliasGenerator {
    /// Build a generator from an arbitrary word list.
    ///
    /// Words are lowercased, stripped to `[a-z0-9-]` and deduplicated.
    pub fn new<I, S>(words: I, suffix_length: usize, max_attempts: usize) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ALIAS_MAX_ATTEMPTS",
                message: "must be at least 1".to_string(),
            });
        }

        let words = normalize_words(words);
        if words.is_empty() {
            return Err(ConfigError::EmptyWordList);
        }

        Ok(Self {
            words,
            suffix_length,
            max_attempts,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        match &config.alias_words {
            Some(words) => Self::new(words, config.alias_suffix_length, config.alias_max_attempts),
            None => Self::new(DEFAULT_WORDS, config.alias_suffix_length, config.alias_max_attempts),
        }
    }

    /// The normalized word list.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Produce a local part for which `exists` returns false.
    ///
    /// `exists` is called exactly once per attempt.
    pub fn generate<F>(&self, mut exists: F) -> Result<String, ExhaustedError>
    where
        F: FnMut(&str) -> bool,
    {
        let mut rng = thread_rng();

        for attempt in 1..=self.max_attempts {
            let candidate = self.candidate(&mut rng);
            if !exists(&candidate) {
                debug!(attempt = attempt, local_part = %candidate, "alias_generated");
                return Ok(candidate);
            }
            debug!(attempt = attempt, local_part = %candidate, "alias_candidate_collision");
        }

        warn!(attempts = self.max_attempts, "alias_generation_exhausted");
        Err(ExhaustedError {
            attempts: self.max_attempts,
        })
    }

    fn candidate<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let word = self
            .words
            .choose(rng)
            .map(String::as_str)
            .unwrap_or(DEFAULT_WORDS[0]);

        let suffix: String = (0..self.suffix_length)
            .map(|_| SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())] as char)
            .collect();

        sanitize_local_part(&format!("{}-{}", word, suffix))
    }
}

impl Default for AliasGenerator {
    fn default() -> Self {
        Self {
            words: DEFAULT_WORDS.iter().map(|w| w.to_string()).collect(),
            suffix_length: DEFAULT_SUFFIX_LENGTH,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Lowercase and restrict to `[a-z0-9-]`.
pub fn sanitize_local_part(value: &str) -> String {
    value
        .to_ascii_lowercase()
        .chars()
        .filter(|c| matches!(c, 'a'..='z' | '0'..='9' | '-'))
        .collect()
}

fn normalize_words<I, S>(words: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    words
        .into_iter()
        .map(|w| sanitize_local_part(w.as_ref()))
        .filter(|w| !w.is_empty())
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_river_alias(value: &str) -> bool {
        let Some(suffix) = value.strip_prefix("river-") else {
            return false;
        };
        suffix.len() == 4
            && suffix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    }

    #[test]
    fn test_generated_local_part_is_lowercase_and_email_safe() {
        let generator = AliasGenerator::new(["river"], 4, 10).unwrap();

        let local_part = generator.generate(|_| false).unwrap();

        assert_eq!(local_part, local_part.to_lowercase());
        assert!(is_river_alias(&local_part), "unexpected format: {}", local_part);
    }

    #[test]
    fn test_retries_on_collision_until_success() {
        let generator = AliasGenerator::new(["river"], 4, 10).unwrap();
        let mut calls = 0;

        let local_part = generator
            .generate(|_| {
                calls += 1;
                calls < 3
            })
            .unwrap();

        assert!(is_river_alias(&local_part));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_exhausted_after_max_attempts() {
        let generator = AliasGenerator::new(["river"], 4, 3).unwrap();
        let mut calls = 0;

        let result = generator.generate(|_| {
            calls += 1;
            true
        });

        assert_eq!(result, Err(ExhaustedError { attempts: 3 }));
        assert_eq!(calls, 3);
        assert_eq!(
            result.unwrap_err().to_string(),
            "could not generate unique local part after 3 attempt(s)"
        );
    }

    #[test]
    fn test_words_are_normalized() {
        let generator =
            AliasGenerator::new(["RIVER", " Cloud!", "river", "", "sum_mit"], 4, 10).unwrap();
        assert_eq!(generator.words(), &["river", "cloud", "summit"]);

        let generator = AliasGenerator::new(["RIVER"], 4, 10).unwrap();
        assert!(generator.generate(|_| false).unwrap().starts_with("river-"));
    }

    #[test]
    fn test_empty_word_list_is_config_error() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            AliasGenerator::new(empty, 4, 10),
            Err(ConfigError::EmptyWordList)
        ));
        assert!(matches!(
            AliasGenerator::new(["!!!", "  "], 4, 10),
            Err(ConfigError::EmptyWordList)
        ));
    }

    #[test]
    fn test_zero_attempts_is_config_error() {
        assert!(AliasGenerator::new(["river"], 4, 0).is_err());
    }

    #[test]
    fn test_suffix_length_is_respected() {
        let generator = AliasGenerator::new(["spark"], 8, 10).unwrap();
        let local_part = generator.generate(|_| false).unwrap();
        assert_eq!(local_part.len(), "spark-".len() + 8);
    }

    #[test]
    fn test_default_generator_uses_builtin_words() {
        let generator = AliasGenerator::default();
        let local_part = generator.generate(|_| false).unwrap();
        let word = local_part.split('-').next().unwrap();
        assert!(DEFAULT_WORDS.contains(&word));
    }

    #[test]
    fn test_sanitize_local_part() {
        assert_eq!(sanitize_local_part("River-AB12"), "river-ab12");
        assert_eq!(sanitize_local_part("a.b+c@d"), "abcd");
    }
}
