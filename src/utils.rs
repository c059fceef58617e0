use std::error::Error;

/// Boxed static error type
pub type Err = Box<dyn Error + 'static>;

/// Start symbol used when the caller doesn't name one
pub const DEFAULT_START: &str = "S";

/// Tolerance used when checking that a nonterminal's weights sum to one
pub const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// Natural log of a probability, with zero (and anything below it) mapped to -inf
/// so that forbidden rules stay forbidden when log-probabilities are added.
///
/// ```
/// use chartparse::utils::log_prob;
///
/// assert_eq!(log_prob(1.0), 0.0);
/// assert_eq!(log_prob(0.0), f64::NEG_INFINITY);
/// ```
pub fn log_prob(p: f64) -> f64 {
  if p > 0.0 { p.ln() } else { f64::NEG_INFINITY }
}

/// Splits a sentence into tokens on runs of whitespace.
pub fn tokenize(sentence: &str) -> Vec<&str> {
  sentence.split_whitespace().collect()
}

/// Symbols starting with an uppercase letter are nonterminals, everything else is
/// a terminal or a lexicon category.
pub fn is_nonterminal_name(symbol: &str) -> bool {
  symbol.chars().next().is_some_and(char::is_uppercase)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_log_prob() {
    assert_eq!(log_prob(0.0), f64::NEG_INFINITY);
    assert_eq!(log_prob(-0.5), f64::NEG_INFINITY);
    assert!((log_prob(0.5) - 0.5f64.ln()).abs() < 1e-12);
  }

  #[test]
  fn test_tokenize() {
    assert_eq!(tokenize("  the dog\tbarks \n"), vec!["the", "dog", "barks"]);
    assert!(tokenize("   ").is_empty());
  }

  #[test]
  fn test_symbol_case() {
    assert!(is_nonterminal_name("NP"));
    assert!(!is_nonterminal_name("dog"));
    assert!(!is_nonterminal_name(""));
  }
}
