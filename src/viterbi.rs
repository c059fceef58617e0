use std::collections::HashMap;

use rand::Rng;
use tracing::{debug, trace};

use crate::chart::{Backpointer, CellKey, SpanTable};
use crate::error::GenerateError;
use crate::forest::span_tree;
use crate::grammar::Grammar;
use crate::rules::{Rhs, Rule};
use crate::syntree::ParseTree;
use crate::utils::{log_prob, tokenize};
use crate::weights::WeightTable;

/// How deep `generate` may recurse before giving up on a (probably cyclic) grammar
pub const MAX_GENERATION_DEPTH: usize = 256;

/// Chart of best log-probabilities with the backpointers that achieve them
#[derive(Debug, Clone, PartialEq)]
pub struct BackpointerTable {
  tokens: Vec<String>,
  cells: SpanTable<(f64, Backpointer)>,
}

impl BackpointerTable {
  pub fn tokens(&self) -> &[String] {
    &self.tokens
  }

  pub fn get(&self, key: CellKey) -> Option<&(f64, Backpointer)> {
    self.cells.get(key)
  }

  pub fn backpointer(&self, key: CellKey) -> Option<Backpointer> {
    self.cells.get(key).map(|(_, bp)| *bp)
  }

  /// Best log-probability of a cell, -inf when it's unreachable
  pub fn log_probability(&self, key: CellKey) -> f64 {
    self.cells.get(key).map_or(f64::NEG_INFINITY, |(lp, _)| *lp)
  }

  pub fn cells(&self) -> &SpanTable<(f64, Backpointer)> {
    &self.cells
  }

  /// Rebuilds the best derivation of the whole sentence from `start`
  pub fn tree(&self, grammar: &Grammar, start: &str) -> Option<ParseTree> {
    let symbol = grammar.nonterminal_index(start)?;
    span_tree(grammar, &self.cells, &self.tokens, CellKey::new(1, self.tokens.len(), symbol))
  }
}

/// Result of scoring a sentence: the best derivation's log-probability (-inf when
/// there is none) and the table to rebuild it from
#[derive(Debug, Clone, PartialEq)]
pub struct ViterbiParse {
  pub log_probability: f64,
  pub backpointers: BackpointerTable,
}

impl ViterbiParse {
  pub fn is_derivable(&self) -> bool {
    self.log_probability != f64::NEG_INFINITY
  }

  pub fn probability(&self) -> f64 {
    self.log_probability.exp()
  }
}

/// A nonterminal's alternatives with the running sum of their weights
#[derive(Debug, Clone)]
struct Alternatives {
  rules: Vec<Rule>,
  cumulative: Vec<f64>,
}

impl Alternatives {
  fn new(rules: &[Rule], weights: &WeightTable) -> Self {
    let cumulative = rules
      .iter()
      .scan(0.0, |sum, rule| {
        *sum += weights.get(rule);
        Some(*sum)
      })
      .collect();
    Self {
      rules: rules.to_vec(),
      cumulative,
    }
  }

  fn total(&self) -> f64 {
    self.cumulative.last().copied().unwrap_or(0.0)
  }

  /// Inverse-CDF pick: the first alternative whose cumulative weight exceeds a draw
  /// from [0, total). Zero-weight alternatives are never picked.
  fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Rule> {
    let total = self.total();
    if total <= 0.0 {
      return None;
    }
    let u = rng.gen_range(0.0..total);
    let idx = self.cumulative.partition_point(|&c| c <= u);
    self.rules.get(idx)
  }
}

/// Probabilistic CYK over a CNF grammar and its weights
#[derive(Debug, Clone)]
pub struct ViterbiParser<'g> {
  grammar: &'g Grammar,
  /// log weights, parallel to the grammar's unary and binary rule lists
  unary_log: Vec<f64>,
  binary_log: Vec<f64>,
  alternatives: HashMap<String, Alternatives>,
}

impl<'g> ViterbiParser<'g> {
  pub fn new(grammar: &'g Grammar, weights: &WeightTable) -> Self {
    let unary_log = grammar
      .unary_rules()
      .iter()
      .map(|r| log_prob(weights.get(r)))
      .collect();
    let binary_log = grammar
      .binary_rules()
      .iter()
      .map(|r| log_prob(weights.get(r)))
      .collect();
    let alternatives = grammar
      .nonterminals()
      .iter()
      .map(|nt| (nt.clone(), Alternatives::new(grammar.alternatives(nt), weights)))
      .collect();

    Self {
      grammar,
      unary_log,
      binary_log,
      alternatives,
    }
  }

  pub fn grammar(&self) -> &Grammar {
    self.grammar
  }

  /// Scores the best derivation of `sentence` from `start` in log space.
  pub fn sentence_probability(&self, sentence: &str, start: &str) -> ViterbiParse {
    let tokens = tokenize(sentence);
    let backpointers = self.fill(&tokens);
    let log_probability = self
      .grammar
      .nonterminal_index(start)
      .map_or(f64::NEG_INFINITY, |s| {
        backpointers.log_probability(CellKey::new(1, tokens.len(), s))
      });

    debug!(words = tokens.len(), log_probability, "viterbi parse");
    ViterbiParse {
      log_probability,
      backpointers,
    }
  }

  /// The most probable derivation of `sentence`, if it has one
  pub fn best_tree(&self, sentence: &str, start: &str) -> Option<ParseTree> {
    let parse = self.sentence_probability(sentence, start);
    if parse.is_derivable() {
      parse.backpointers.tree(self.grammar, start)
    } else {
      None
    }
  }

  fn fill(&self, tokens: &[&str]) -> BackpointerTable {
    let n = tokens.len();
    let mut cells: SpanTable<(f64, Backpointer)> =
      SpanTable::new(n, self.grammar.nonterminals().len());
    let best = |cells: &SpanTable<(f64, Backpointer)>, key| {
      cells.get(key).map_or(f64::NEG_INFINITY, |(lp, _)| *lp)
    };

    for (i, token) in tokens.iter().enumerate() {
      for (rule, &lp) in self.grammar.unary_rules().iter().zip(self.unary_log.iter()) {
        if rule.terminal() != Some(*token) || lp == f64::NEG_INFINITY {
          continue;
        }
        if let Some(a) = self.grammar.nonterminal_index(&rule.lhs) {
          let key = CellKey::new(i + 1, i + 1, a);
          if lp > best(&cells, key) {
            cells.set(key, (lp, Backpointer::Leaf(i + 1)));
          }
        }
      }
    }

    for l in 2..=n {
      for i in 1..=(n + 1 - l) {
        let j = i + l - 1;
        for k in i..j {
          let rules = self.grammar.binary_indices().iter().zip(self.binary_log.iter());
          for (idx, &rule_lp) in rules {
            let Some(idx) = idx else { continue };
            if rule_lp == f64::NEG_INFINITY {
              continue;
            }
            let left = CellKey::new(i, k, idx.left);
            let right = CellKey::new(k + 1, j, idx.right);
            let (left_lp, right_lp) = (best(&cells, left), best(&cells, right));
            if left_lp == f64::NEG_INFINITY || right_lp == f64::NEG_INFINITY {
              continue;
            }

            let candidate = left_lp + rule_lp + right_lp;
            let target = CellKey::new(i, j, idx.lhs);
            if candidate > best(&cells, target) {
              trace!(i, j, k, candidate, "better split");
              cells.set(target, (candidate, Backpointer::Split(left, right)));
            }
          }
        }
      }
    }

    BackpointerTable {
      tokens: tokens.iter().map(|t| t.to_string()).collect(),
      cells,
    }
  }

  /// Expands `symbol` top-down, picking each alternative with probability equal to
  /// its weight, and returns the words produced joined by single spaces.
  pub fn generate<R: Rng + ?Sized>(&self, symbol: &str, rng: &mut R) -> Result<String, GenerateError> {
    self.generate_at(symbol, 0, rng)
  }

  fn generate_at<R: Rng + ?Sized>(
    &self,
    symbol: &str,
    depth: usize,
    rng: &mut R,
  ) -> Result<String, GenerateError> {
    if depth > MAX_GENERATION_DEPTH {
      return Err(GenerateError::DepthExceeded(MAX_GENERATION_DEPTH));
    }

    let rule = self
      .alternatives
      .get(symbol)
      .and_then(|alts| alts.sample(rng))
      .ok_or_else(|| GenerateError::NoAlternatives(symbol.to_string()))?;

    match &rule.rhs {
      Rhs::Terminal(w) => Ok(w.clone()),
      Rhs::Pair(b, c) => {
        let left = self.generate_at(b, depth + 1, rng)?;
        let right = self.generate_at(c, depth + 1, rng)?;
        Ok(format!("{} {}", left, right))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cyk::CykRecognizer;
  use crate::utils::DEFAULT_START;
  use rand::SeedableRng;
  use rand::rngs::StdRng;
  use std::collections::HashSet;

  fn dog_barks() -> (Grammar, WeightTable) {
    let g: Grammar = "S -> NP VP\nNP -> dog\nVP -> barks".parse().unwrap();
    let w = WeightTable::uniform_ones(&g);
    (g, w)
  }

  const AMBIGUOUS: &str = r#"
    S -> NP VP
    VP -> V NP
    VP -> VP PP
    NP -> NP PP
    NP -> Det N
    PP -> P NP
    NP -> she
    V -> saw
    Det -> the
    N -> man
    N -> telescope
    P -> with
  "#;

  const AMBIGUOUS_WEIGHTS: &str = r#"
    S -> NP VP 1.0
    VP -> V NP 0.7
    VP -> VP PP 0.3
    NP -> NP PP 0.2
    NP -> Det N 0.5
    NP -> she 0.3
    PP -> P NP 1.0
    V -> saw 1.0
    Det -> the 1.0
    N -> man 0.5
    N -> telescope 0.5
    P -> with 1.0
  "#;

  #[test]
  fn test_dog_barks() {
    let (g, w) = dog_barks();
    let parser = ViterbiParser::new(&g, &w);

    let parse = parser.sentence_probability("dog barks", DEFAULT_START);
    assert_eq!(parse.log_probability, 0.0);
    assert_eq!(
      parse.backpointers.backpointer(CellKey::new(1, 2, 0)),
      Some(Backpointer::Split(CellKey::new(1, 1, 1), CellKey::new(2, 2, 2)))
    );
    assert_eq!(
      parse.backpointers.backpointer(CellKey::new(1, 1, 1)),
      Some(Backpointer::Leaf(1))
    );

    let parse = parser.sentence_probability("barks dog", DEFAULT_START);
    assert_eq!(parse.log_probability, f64::NEG_INFINITY);
    assert!(!parse.is_derivable());
  }

  #[test]
  fn test_prefers_likelier_attachment() {
    let g: Grammar = AMBIGUOUS.parse().unwrap();
    let w: WeightTable = AMBIGUOUS_WEIGHTS.parse().unwrap();
    let parser = ViterbiParser::new(&g, &w);

    let parse = parser.sentence_probability("she saw the man with the telescope", DEFAULT_START);
    // VP attachment: 1.0 * .3 * [.7 * .3 * (.5*.5)] * [1.0 * (.5*.5)] = .0039375
    // NP attachment: 1.0 * .3 * .7 * [.2 * (.5*.5) * (.5*.5)]       = .002625
    assert!((parse.probability() - 0.0039375).abs() < 1e-12);

    let tree = parser
      .best_tree("she saw the man with the telescope", DEFAULT_START)
      .unwrap();
    let (_, children) = tree.get_branch().unwrap();
    let (vp, vp_children) = children[1].get_branch().unwrap();
    assert_eq!(vp.value.symbol, "VP");
    assert_eq!(vp.span, (1, 7));
    assert_eq!(vp_children[1].get_branch().unwrap().0.value.symbol, "PP");
    assert_eq!(
      tree.leaves(),
      vec!["she", "saw", "the", "man", "with", "the", "telescope"]
    );
  }

  #[test]
  fn test_missing_weight_is_forbidden() {
    let g: Grammar = AMBIGUOUS.parse().unwrap();
    let mut w: WeightTable = AMBIGUOUS_WEIGHTS.parse().unwrap();
    w.insert(Rule::binary("VP", "VP", "PP"), 0.0);
    let parser = ViterbiParser::new(&g, &w);

    let parse = parser.sentence_probability("she saw the man with the telescope", DEFAULT_START);
    assert!((parse.probability() - 0.002625).abs() < 1e-12);
  }

  #[test]
  fn test_agrees_with_recognizer() {
    let g: Grammar = AMBIGUOUS.parse().unwrap();
    let w = WeightTable::randomized(&g, &mut StdRng::seed_from_u64(3));
    let parser = ViterbiParser::new(&g, &w);
    let cyk = CykRecognizer::new(&g);

    for sentence in [
      "she saw the man",
      "she saw the man with the telescope",
      "the man saw she with the telescope",
      "saw the man",
      "she with the telescope saw the man",
      "she saw the the man",
      "she saw a man",
    ] {
      let parse = parser.sentence_probability(sentence, DEFAULT_START);
      assert_eq!(
        parse.log_probability == f64::NEG_INFINITY,
        !cyk.parsable(sentence, DEFAULT_START),
        "{}",
        sentence
      );
    }
  }

  #[test]
  fn test_repeatable() {
    let g: Grammar = AMBIGUOUS.parse().unwrap();
    let w = WeightTable::randomized(&g, &mut StdRng::seed_from_u64(11));
    let parser = ViterbiParser::new(&g, &w);

    let a = parser.sentence_probability("she saw the man with the telescope", DEFAULT_START);
    let b = parser.sentence_probability("she saw the man with the telescope", DEFAULT_START);
    assert_eq!(a.log_probability.to_bits(), b.log_probability.to_bits());
    assert_eq!(a, b);
  }

  #[test]
  fn test_generate_single_alternative() {
    let (g, w) = dog_barks();
    let parser = ViterbiParser::new(&g, &w);
    let mut rng = StdRng::seed_from_u64(0);

    for _ in 0..10 {
      assert_eq!(parser.generate(DEFAULT_START, &mut rng).unwrap(), "dog barks");
    }
  }

  #[test]
  fn test_generate_uses_grammar_words() {
    let g: Grammar = r#"
      S -> NP VP
      NP -> Det N
      NP -> she
      VP -> runs
      VP -> V NP
      Det -> the
      N -> dog
      N -> cat
      V -> sees
    "#
    .parse()
    .unwrap();
    let w = WeightTable::randomized(&g, &mut StdRng::seed_from_u64(5));
    let parser = ViterbiParser::new(&g, &w);
    let cyk = CykRecognizer::new(&g);
    let words = g
      .unary_rules()
      .iter()
      .filter_map(|r| r.terminal())
      .collect::<HashSet<_>>();

    let mut rng = StdRng::seed_from_u64(9);
    for _ in 0..50 {
      let sentence = parser.generate(DEFAULT_START, &mut rng).unwrap();
      assert!(sentence.split(' ').all(|t| words.contains(t)), "{}", sentence);
      assert!(cyk.parsable(&sentence, DEFAULT_START), "{}", sentence);
    }
  }

  #[test]
  fn test_generate_follows_weights() {
    // approximate: checks the sampled frequency is near the weight
    let g: Grammar = "S -> a\nS -> b".parse().unwrap();
    let w: WeightTable = "S -> a 0.8\nS -> b 0.2".parse().unwrap();
    let parser = ViterbiParser::new(&g, &w);
    let mut rng = StdRng::seed_from_u64(42);

    let draws = 10_000;
    let a_count = (0..draws)
      .filter(|_| parser.generate("S", &mut rng).unwrap() == "a")
      .count();
    let freq = a_count as f64 / draws as f64;
    assert!((freq - 0.8).abs() < 0.03, "{}", freq);
  }

  #[test]
  fn test_generate_errors() {
    let g: Grammar = "S -> S S\nT -> t".parse().unwrap();
    let w = WeightTable::uniform_ones(&g);
    let parser = ViterbiParser::new(&g, &w);
    let mut rng = StdRng::seed_from_u64(1);

    assert_eq!(
      parser.generate("S", &mut rng),
      Err(GenerateError::DepthExceeded(MAX_GENERATION_DEPTH))
    );
    assert_eq!(
      parser.generate("X", &mut rng),
      Err(GenerateError::NoAlternatives("X".to_string()))
    );

    let empty = WeightTable::new();
    let parser = ViterbiParser::new(&g, &empty);
    assert_eq!(
      parser.generate("T", &mut rng),
      Err(GenerateError::NoAlternatives("T".to_string()))
    );
  }
}
