use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use rand::Rng;
use tracing::{debug, warn};

use crate::Err;
use crate::error::FormatError;
use crate::grammar::Grammar;
use crate::parse_grammar::parse_weights;
use crate::rules::Rule;

/// Probabilities of CNF rules. A rule missing from the table has probability 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightTable {
  weights: HashMap<Rule, f64>,
}

impl WeightTable {
  pub fn new() -> Self {
    Default::default()
  }

  /// Random weights for every rule of `grammar`, normalized per nonterminal.
  ///
  /// Stick-breaking: each alternative of a nonterminal but the last takes a uniform
  /// share of what's left, and the last takes exactly the remainder, so every
  /// nonterminal's weights sum to one.
  pub fn randomized<R: Rng + ?Sized>(grammar: &Grammar, rng: &mut R) -> Self {
    let mut table = Self::new();

    for nt in grammar.nonterminals() {
      let alternatives = grammar.alternatives(nt);
      let mut sum = 0.0;
      for (idx, rule) in alternatives.iter().enumerate() {
        let remaining = 1.0 - sum;
        let weight = if idx + 1 == alternatives.len() {
          remaining
        } else if remaining > 0.0 {
          rng.gen_range(0.0..remaining)
        } else {
          0.0
        };
        sum += weight;
        table.insert(rule.clone(), weight);
      }
    }

    debug!(rules = table.len(), "initialized random weights");
    table
  }

  /// `randomized` with the thread-local rng
  pub fn random(grammar: &Grammar) -> Self {
    Self::randomized(grammar, &mut rand::thread_rng())
  }

  /// Every rule of `grammar` gets weight 1. Only a proper distribution for grammars
  /// where each nonterminal has a single alternative.
  pub fn uniform_ones(grammar: &Grammar) -> Self {
    grammar.rules().map(|rule| (rule.clone(), 1.0)).collect()
  }

  pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, Err> {
    let text = fs::read_to_string(path)?;
    Ok(text.parse()?)
  }

  pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), Err> {
    fs::write(path, self.to_string())?;
    Ok(())
  }

  /// Probability of `rule`, 0 when the table doesn't know it
  pub fn get(&self, rule: &Rule) -> f64 {
    self.weights.get(rule).copied().unwrap_or(0.0)
  }

  pub fn insert(&mut self, rule: Rule, weight: f64) -> Option<f64> {
    self.weights.insert(rule, weight)
  }

  pub fn len(&self) -> usize {
    self.weights.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn iter(&self) -> impl Iterator<Item = (&Rule, f64)> {
    self.weights.iter().map(|(rule, w)| (rule, *w))
  }

  /// Entries whose rule isn't part of `grammar`. Parsers never look these up, so
  /// loading ignores them; this is the explicit check for callers who care.
  pub fn unknown_rules(&self, grammar: &Grammar) -> Vec<&Rule> {
    let mut unknown = self
      .weights
      .keys()
      .filter(|rule| !grammar.contains(rule))
      .collect::<Vec<_>>();
    unknown.sort();
    for rule in unknown.iter() {
      warn!(%rule, "weight for a rule the grammar doesn't have");
    }
    unknown
  }

  /// Nonterminals whose alternatives' weights don't sum to one within `tolerance`,
  /// with the sum they do have
  pub fn normalization_errors(&self, grammar: &Grammar, tolerance: f64) -> Vec<(String, f64)> {
    grammar
      .nonterminals()
      .iter()
      .filter_map(|nt| {
        let sum = grammar.alternatives(nt).iter().map(|r| self.get(r)).sum::<f64>();
        if (sum - 1.0).abs() > tolerance {
          Some((nt.clone(), sum))
        } else {
          None
        }
      })
      .collect()
  }
}

impl FromIterator<(Rule, f64)> for WeightTable {
  fn from_iter<I: IntoIterator<Item = (Rule, f64)>>(iter: I) -> Self {
    Self {
      weights: iter.into_iter().collect(),
    }
  }
}

impl FromStr for WeightTable {
  type Err = FormatError;

  /// Parses `LHS -> RHS prob` lines. Weights are trusted as given, nothing is renormalized.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(parse_weights(s)?.into_iter().collect())
  }
}

impl fmt::Display for WeightTable {
  /// Writes the table back in the format `from_str` reads, sorted by rule
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut entries = self.iter().collect::<Vec<_>>();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    for (rule, weight) in entries {
      writeln!(f, "{} {}", rule, weight)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::utils::PROBABILITY_TOLERANCE;
  use rand::SeedableRng;
  use rand::rngs::StdRng;

  const GRAMMAR: &str = r#"
    S -> NP VP
    S -> stop
    NP -> Det N
    NP -> she
    NP -> he
    VP -> V NP
    VP -> runs
    VP -> sleeps
    Det -> the
    N -> dog
    N -> cat
    V -> sees
  "#;

  #[test]
  fn test_randomized_is_normalized() {
    let g: Grammar = GRAMMAR.parse().unwrap();
    for seed in 0..50 {
      let mut rng = StdRng::seed_from_u64(seed);
      let w = WeightTable::randomized(&g, &mut rng);

      assert_eq!(w.len(), g.rules().count());
      assert!(w.normalization_errors(&g, PROBABILITY_TOLERANCE).is_empty());
      for (_, weight) in w.iter() {
        assert!((0.0..=1.0).contains(&weight));
      }
    }
  }

  #[test]
  fn test_single_alternative_gets_one() {
    let g: Grammar = GRAMMAR.parse().unwrap();
    let w = WeightTable::random(&g);
    assert_eq!(w.get(&Rule::unary("Det", "the")), 1.0);
    assert_eq!(w.get(&Rule::unary("V", "sees")), 1.0);
  }

  #[test]
  fn test_missing_is_zero() {
    let w = WeightTable::new();
    assert_eq!(w.get(&Rule::unary("N", "dog")), 0.0);
  }

  #[test]
  fn test_parse_and_write() {
    let w: WeightTable = "S -> NP VP 1.0\nNP -> dog 0.25\nNP -> cat 0.75\n".parse().unwrap();
    assert_eq!(w.get(&Rule::unary("NP", "cat")), 0.75);
    assert_eq!(
      w.to_string(),
      "NP -> cat 0.75\nNP -> dog 0.25\nS -> NP VP 1\n"
    );
    let again: WeightTable = w.to_string().parse().unwrap();
    assert_eq!(w, again);
  }

  #[test]
  fn test_file_roundtrip() {
    let g: Grammar = GRAMMAR.parse().unwrap();
    let w = WeightTable::randomized(&g, &mut StdRng::seed_from_u64(7));
    let path = std::env::temp_dir().join(format!("chartparse-weights-{}.txt", std::process::id()));
    w.write_to_file(&path).unwrap();
    let again = WeightTable::read_from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(w, again);
  }

  #[test]
  fn test_unknown_rules() {
    let g: Grammar = GRAMMAR.parse().unwrap();
    let w: WeightTable = "S -> stop 1.0\nS -> X Y 0.5".parse().unwrap();
    assert_eq!(w.unknown_rules(&g), vec![&Rule::binary("S", "X", "Y")]);
    assert_eq!(
      w.normalization_errors(&g, PROBABILITY_TOLERANCE)
        .into_iter()
        .map(|(nt, _)| nt)
        .collect::<Vec<_>>(),
      vec!["NP", "VP", "Det", "N", "V"]
    );
  }
}
