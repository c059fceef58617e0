use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use tracing::warn;

use crate::Err;
use crate::error::{FormatError, FormatErrorKind};
use crate::parse_grammar::parse_rules;
use crate::rules::Rule;

/// A binary rule with its symbols interned as nonterminal indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BinaryIdx {
  pub lhs: usize,
  pub left: usize,
  pub right: usize,
}

/// An immutable grammar in Chomsky Normal Form
#[derive(Debug, Clone)]
pub struct Grammar {
  unary: Vec<Rule>,
  binary: Vec<Rule>,
  nonterminals: Vec<String>,
  index: HashMap<String, usize>,
  alternatives: HashMap<String, Vec<Rule>>,
  /// parallel to `binary`, None when a child symbol never appears as a lhs
  /// (such a rule can never fire)
  binary_idx: Vec<Option<BinaryIdx>>,
}

impl Grammar {
  /// Builds the rule tables. Duplicate rules are dropped, keeping the first.
  pub fn new(rules: Vec<Rule>) -> Result<Self, FormatError> {
    if rules.is_empty() {
      return Err(FormatError::whole(FormatErrorKind::EmptyGrammar));
    }

    let mut seen = HashSet::new();
    let mut unary = Vec::new();
    let mut binary = Vec::new();
    let mut nonterminals = Vec::new();
    let mut index = HashMap::new();

    for rule in rules {
      if !seen.insert(rule.clone()) {
        warn!(%rule, "dropping duplicate rule");
        continue;
      }
      if !index.contains_key(&rule.lhs) {
        index.insert(rule.lhs.clone(), nonterminals.len());
        nonterminals.push(rule.lhs.clone());
      }
      if rule.is_unary() {
        unary.push(rule);
      } else {
        binary.push(rule);
      }
    }

    let alternatives = unary
      .iter()
      .chain(binary.iter())
      .fold(HashMap::new(), |mut map: HashMap<String, Vec<Rule>>, rule| {
        map.entry(rule.lhs.clone()).or_default().push(rule.clone());
        map
      });

    let binary_idx = binary
      .iter()
      .map(|rule| {
        let (left, right) = rule.children()?;
        Some(BinaryIdx {
          lhs: *index.get(&rule.lhs)?,
          left: *index.get(left)?,
          right: *index.get(right)?,
        })
      })
      .collect();

    Ok(Self {
      unary,
      binary,
      nonterminals,
      index,
      alternatives,
      binary_idx,
    })
  }

  pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, Err> {
    let text = fs::read_to_string(path)?;
    Ok(text.parse()?)
  }

  /// Rules of the form A -> w, in load order
  pub fn unary_rules(&self) -> &[Rule] {
    &self.unary
  }

  /// Rules of the form A -> B C, in load order
  pub fn binary_rules(&self) -> &[Rule] {
    &self.binary
  }

  /// Every rule: unary ones first, then binary ones
  pub fn rules(&self) -> impl Iterator<Item = &Rule> {
    self.unary.iter().chain(self.binary.iter())
  }

  /// Distinct lhs symbols, in order of first appearance
  pub fn nonterminals(&self) -> &[String] {
    &self.nonterminals
  }

  /// All rules for `lhs`: its unary rules in load order followed by its binary rules
  pub fn alternatives(&self, lhs: &str) -> &[Rule] {
    self.alternatives.get(lhs).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn nonterminal_index(&self, symbol: &str) -> Option<usize> {
    self.index.get(symbol).copied()
  }

  pub fn is_nonterminal(&self, symbol: &str) -> bool {
    self.index.contains_key(symbol)
  }

  pub fn contains(&self, rule: &Rule) -> bool {
    self.alternatives(&rule.lhs).contains(rule)
  }

  pub(crate) fn binary_indices(&self) -> &[Option<BinaryIdx>] {
    &self.binary_idx
  }
}

impl FromStr for Grammar {
  type Err = FormatError;

  /// Parses a grammar with one `LHS -> RHS` rule per line
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::new(parse_rules(s)?)
  }
}

impl fmt::Display for Grammar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for nt in self.nonterminals.iter() {
      for rule in self.alternatives(nt) {
        writeln!(f, "{}", rule)?;
      }
    }
    Ok(())
  }
}
