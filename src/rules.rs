use std::fmt;

use crate::utils::is_nonterminal_name;

/// Right-hand side of a CNF rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rhs {
  /// A -> w
  Terminal(String),
  /// A -> B C
  Pair(String, String),
}

/// A rule in Chomsky Normal Form. The whole value is the rule's identity, so it
/// doubles as the key of a weight table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rule {
  pub lhs: String,
  pub rhs: Rhs,
}

impl Rule {
  pub fn unary(lhs: impl Into<String>, word: impl Into<String>) -> Self {
    Self {
      lhs: lhs.into(),
      rhs: Rhs::Terminal(word.into()),
    }
  }

  pub fn binary(lhs: impl Into<String>, left: impl Into<String>, right: impl Into<String>) -> Self {
    Self {
      lhs: lhs.into(),
      rhs: Rhs::Pair(left.into(), right.into()),
    }
  }

  pub fn is_unary(&self) -> bool {
    matches!(self.rhs, Rhs::Terminal(_))
  }

  pub fn is_binary(&self) -> bool {
    matches!(self.rhs, Rhs::Pair(_, _))
  }

  pub fn terminal(&self) -> Option<&str> {
    match &self.rhs {
      Rhs::Terminal(w) => Some(w),
      Rhs::Pair(_, _) => None,
    }
  }

  pub fn children(&self) -> Option<(&str, &str)> {
    match &self.rhs {
      Rhs::Pair(b, c) => Some((b, c)),
      Rhs::Terminal(_) => None,
    }
  }
}

impl fmt::Display for Rhs {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Terminal(w) => write!(f, "{}", w),
      Self::Pair(b, c) => write!(f, "{} {}", b, c),
    }
  }
}

impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} -> {}", self.lhs, self.rhs)
  }
}

/// One symbol on the right-hand side of a general (non-CNF) rule
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Production {
  /// Word or lexicon category, consumed by the scanner
  Terminal(String),
  /// Symbol expanded by the predictor
  Nonterminal(String),
}

impl Production {
  /// Uppercase-initial symbols are nonterminals, anything else is a terminal
  pub fn from_symbol(symbol: &str) -> Self {
    if is_nonterminal_name(symbol) {
      Self::Nonterminal(symbol.to_string())
    } else {
      Self::Terminal(symbol.to_string())
    }
  }

  pub fn symbol_str(&self) -> &str {
    match self {
      Self::Terminal(s) | Self::Nonterminal(s) => s,
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Terminal(_))
  }

  pub fn is_nonterminal(&self) -> bool {
    matches!(self, Self::Nonterminal(_))
  }
}

impl fmt::Display for Production {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.symbol_str())
  }
}

/// A general context-free rule with its weight, as used by the Earley parser
#[derive(Debug, Clone)]
pub struct WeightedRule {
  pub symbol: String,
  pub productions: Vec<Production>,
  pub probability: f64,
}

impl WeightedRule {
  pub fn new(symbol: impl Into<String>, productions: Vec<Production>, probability: f64) -> Self {
    Self {
      symbol: symbol.into(),
      productions,
      probability,
    }
  }

  pub fn len(&self) -> usize {
    self.productions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn symbol_str(&self) -> &str {
    &self.symbol
  }
}

/// Weight is not part of a rule's identity
impl PartialEq for WeightedRule {
  fn eq(&self, other: &Self) -> bool {
    self.symbol == other.symbol && self.productions == other.productions
  }
}

impl fmt::Display for WeightedRule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ->", self.symbol)?;
    for p in self.productions.iter() {
      write!(f, " {}", p)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_rule_identity() {
    assert_eq!(Rule::binary("S", "NP", "VP"), Rule::binary("S", "NP", "VP"));
    assert_ne!(Rule::binary("S", "NP", "VP"), Rule::binary("S", "VP", "NP"));
    assert_eq!(Rule::unary("NP", "dog").to_string(), "NP -> dog");
    assert_eq!(Rule::binary("S", "NP", "VP").children(), Some(("NP", "VP")));
  }

  #[test]
  fn test_weighted_rule_ignores_weight() {
    let a = WeightedRule::new("S", vec![Production::Terminal("a".to_string())], 0.3);
    let b = WeightedRule::new("S", vec![Production::Terminal("a".to_string())], 0.7);
    assert_eq!(a, b);
    assert_eq!(a.to_string(), "S -> a");
  }
}
