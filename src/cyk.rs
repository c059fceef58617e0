use tracing::debug;

use crate::chart::{Backpointer, CellKey, SpanTable};
use crate::forest::span_tree;
use crate::grammar::Grammar;
use crate::syntree::ParseTree;
use crate::utils::tokenize;

/// Boolean CYK recognizer over a CNF grammar
#[derive(Debug, Clone, Copy)]
pub struct CykRecognizer<'g> {
  grammar: &'g Grammar,
}

impl<'g> CykRecognizer<'g> {
  pub fn new(grammar: &'g Grammar) -> Self {
    Self { grammar }
  }

  /// Is `sentence` derivable from `start`? Words without a matching terminal rule
  /// just make the answer false.
  pub fn parsable(&self, sentence: &str, start: &str) -> bool {
    let tokens = tokenize(sentence);
    let Some(start) = self.grammar.nonterminal_index(start) else {
      return false;
    };

    let chart = self.chart(&tokens);
    chart.contains(CellKey::new(1, tokens.len(), start))
  }

  /// The first derivation found for `sentence`, with every node scored 1
  pub fn tree(&self, sentence: &str, start: &str) -> Option<ParseTree> {
    let tokens = tokenize(sentence);
    let start = self.grammar.nonterminal_index(start)?;
    let chart = self.chart(&tokens);
    let words = tokens.iter().map(|t| t.to_string()).collect::<Vec<_>>();
    span_tree(self.grammar, &chart, &words, CellKey::new(1, tokens.len(), start))
  }

  /// Fills the recognition chart. A set cell means its nonterminal derives its span;
  /// the stored backpointer is the first split and rule found to prove it.
  pub fn chart(&self, tokens: &[&str]) -> SpanTable<Backpointer> {
    let n = tokens.len();
    let mut chart = SpanTable::new(n, self.grammar.nonterminals().len());

    for (i, token) in tokens.iter().enumerate() {
      for rule in self.grammar.unary_rules() {
        if rule.terminal() == Some(*token) {
          if let Some(a) = self.grammar.nonterminal_index(&rule.lhs) {
            let key = CellKey::new(i + 1, i + 1, a);
            if !chart.contains(key) {
              chart.set(key, Backpointer::Leaf(i + 1));
            }
          }
        }
      }
    }

    for l in 2..=n {
      for i in 1..=(n + 1 - l) {
        let j = i + l - 1;
        for k in i..j {
          for idx in self.grammar.binary_indices().iter().flatten() {
            let target = CellKey::new(i, j, idx.lhs);
            if chart.contains(target) {
              continue;
            }
            let left = CellKey::new(i, k, idx.left);
            let right = CellKey::new(k + 1, j, idx.right);
            if chart.contains(left) && chart.contains(right) {
              chart.set(target, Backpointer::Split(left, right));
            }
          }
        }
      }
    }

    debug!(words = n, cells = chart.filled(), "cyk chart filled");
    chart
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::utils::DEFAULT_START;

  fn dog_barks() -> Grammar {
    "S -> NP VP\nNP -> dog\nVP -> barks".parse().unwrap()
  }

  #[test]
  fn test_dog_barks() {
    let g = dog_barks();
    let cyk = CykRecognizer::new(&g);

    assert!(cyk.parsable("dog barks", DEFAULT_START));
    assert!(!cyk.parsable("barks dog", DEFAULT_START));
    assert!(!cyk.parsable("dog", DEFAULT_START));
    assert!(cyk.parsable("dog", "NP"));
  }

  #[test]
  fn test_backpointers() {
    let g = dog_barks();
    let chart = CykRecognizer::new(&g).chart(&["dog", "barks"]);
    let (s, np, vp) = (0, 1, 2);

    assert_eq!(
      chart.get(CellKey::new(1, 2, s)),
      Some(&Backpointer::Split(CellKey::new(1, 1, np), CellKey::new(2, 2, vp)))
    );
    assert_eq!(chart.get(CellKey::new(1, 1, np)), Some(&Backpointer::Leaf(1)));
    assert_eq!(chart.filled(), 3);
  }

  #[test]
  fn test_unknown_word_and_symbol() {
    let g = dog_barks();
    let cyk = CykRecognizer::new(&g);

    assert!(!cyk.parsable("dog meows", DEFAULT_START));
    assert!(!cyk.parsable("dog barks", "X"));
    assert!(!cyk.parsable("", DEFAULT_START));
  }

  #[test]
  fn test_ambiguous_first_split_wins() {
    // S -> S S over "x x x" can split after the first or second word
    let g: Grammar = "S -> S S\nS -> x".parse().unwrap();
    let chart = CykRecognizer::new(&g).chart(&["x", "x", "x"]);

    assert_eq!(
      chart.get(CellKey::new(1, 3, 0)),
      Some(&Backpointer::Split(CellKey::new(1, 1, 0), CellKey::new(2, 3, 0)))
    );
  }

  #[test]
  fn test_longer_sentence() {
    let g: Grammar = r#"
      S -> NP VP
      NP -> Det N
      VP -> V NP
      Det -> the
      N -> dog
      N -> cat
      V -> chased
    "#
    .parse()
    .unwrap();
    let cyk = CykRecognizer::new(&g);

    assert!(cyk.parsable("the dog chased the cat", DEFAULT_START));
    assert!(!cyk.parsable("the dog chased cat", DEFAULT_START));
    assert!(cyk.parsable("chased the cat", "VP"));

    let tree = cyk.tree("the dog chased the cat", DEFAULT_START).unwrap();
    assert_eq!(tree.leaves(), vec!["the", "dog", "chased", "the", "cat"]);
    assert_eq!(tree.depth(), 4);
    assert!(cyk.tree("the dog chased cat", DEFAULT_START).is_none());
  }
}
