use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Err;
use crate::error::{FormatError, FormatErrorKind};
use crate::grammar::Grammar;
use crate::parse_grammar::parse_weighted_rules;
use crate::rules::{Production, Rhs, WeightedRule};
use crate::utils::{DEFAULT_START, is_nonterminal_name};
use crate::weights::WeightTable;

/// A weighted context-free grammar for the Earley parser.
///
/// Nonterminals map to ordered alternatives, each with a weight. Lexicon categories
/// (conventionally lowercase) map words to probabilities and are matched directly
/// against the input by the scanner.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedGrammar {
  start: String,
  rules: BTreeMap<String, Vec<Rc<WeightedRule>>>,
  lexicon: BTreeMap<String, BTreeMap<String, f64>>,
}

impl Default for WeightedGrammar {
  fn default() -> Self {
    Self::new(DEFAULT_START)
  }
}

impl WeightedGrammar {
  pub fn new(start: impl Into<String>) -> Self {
    Self {
      start: start.into(),
      rules: BTreeMap::new(),
      lexicon: BTreeMap::new(),
    }
  }

  pub fn with_start(mut self, start: impl Into<String>) -> Self {
    self.start = start.into();
    self
  }

  pub fn start(&self) -> &str {
    &self.start
  }

  /// Adds `lhs -> rhs` with `probability`, classifying rhs symbols by case
  pub fn add_rule(&mut self, lhs: &str, rhs: &[&str], probability: f64) -> Result<(), FormatError> {
    let productions = rhs.iter().map(|s| Production::from_symbol(s)).collect();
    self.push_rule(WeightedRule::new(lhs, productions, probability))
  }

  /// Adds an already-classified rule. Empty right-hand sides are rejected.
  pub fn push_rule(&mut self, rule: WeightedRule) -> Result<(), FormatError> {
    if rule.is_empty() {
      return Err(FormatError::whole(FormatErrorKind::EmptyRhs));
    }
    self
      .rules
      .entry(rule.symbol.clone())
      .or_default()
      .push(Rc::new(rule));
    Ok(())
  }

  /// Adds `word` to the lexicon `category` with `probability`
  pub fn add_word(&mut self, category: &str, word: &str, probability: f64) {
    self
      .lexicon
      .entry(category.to_string())
      .or_default()
      .insert(word.to_string(), probability);
  }

  /// Converts a CNF grammar and its weights. Unary rules become literal terminals.
  pub fn from_cnf(grammar: &Grammar, weights: &WeightTable, start: &str) -> Self {
    let mut wg = Self::new(start);
    for rule in grammar.rules() {
      let productions = match &rule.rhs {
        Rhs::Terminal(w) => vec![Production::Terminal(w.clone())],
        Rhs::Pair(b, c) => vec![
          Production::Nonterminal(b.clone()),
          Production::Nonterminal(c.clone()),
        ],
      };
      wg.rules
        .entry(rule.lhs.clone())
        .or_default()
        .push(Rc::new(WeightedRule::new(
          rule.lhs.clone(),
          productions,
          weights.get(rule),
        )));
    }
    wg
  }

  /// Alternatives for `symbol`, in the order they were defined
  pub fn alternatives(&self, symbol: &str) -> &[Rc<WeightedRule>] {
    self.rules.get(symbol).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn nonterminals(&self) -> impl Iterator<Item = &str> {
    self.rules.keys().map(String::as_str)
  }

  pub fn categories(&self) -> impl Iterator<Item = &str> {
    self.lexicon.keys().map(String::as_str)
  }

  pub fn is_category(&self, symbol: &str) -> bool {
    self.lexicon.contains_key(symbol)
  }

  /// Probability of `word` under `category`, None if the category doesn't list it
  pub fn lexical_probability(&self, category: &str, word: &str) -> Option<f64> {
    self.lexicon.get(category)?.get(word).copied()
  }

  /// Nonterminals and categories whose weights don't sum to one within `tolerance`
  pub fn normalization_errors(&self, tolerance: f64) -> Vec<(String, f64)> {
    let rule_sums = self
      .rules
      .iter()
      .map(|(nt, alts)| (nt, alts.iter().map(|r| r.probability).sum::<f64>()));
    let word_sums = self
      .lexicon
      .iter()
      .map(|(cat, words)| (cat, words.values().sum::<f64>()));

    rule_sums
      .chain(word_sums)
      .filter(|(_, sum)| (sum - 1.0).abs() > tolerance)
      .map(|(symbol, sum)| (symbol.clone(), sum))
      .collect()
  }

  /// Reads the `define_rules` / `probabilities` JSON document
  pub fn from_json(s: &str) -> Result<Self, FormatError> {
    let doc: Document = serde_json::from_str(s)?;
    doc.into_grammar(DEFAULT_START)
  }

  pub fn to_json(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&Document::from(self))
  }

  /// Loads a grammar file, as JSON when the path ends in `.json` and as weighted
  /// rule text otherwise
  pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, Err> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    if path.extension().is_some_and(|ext| ext == "json") {
      Ok(Self::from_json(&text)?)
    } else {
      Ok(text.parse()?)
    }
  }

  pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), Err> {
    fs::write(path, self.to_json()?)?;
    Ok(())
  }
}

impl FromStr for WeightedGrammar {
  type Err = FormatError;

  /// Parses `LHS -> sym+ [prob]` lines. A lowercase lhs with a single rhs word is
  /// a lexicon entry. The start symbol is `S`.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut wg = Self::default();
    for line in parse_weighted_rules(s)? {
      let at = |kind| FormatError::new(line.line, kind);
      if is_nonterminal_name(&line.lhs) {
        let rhs = line.rhs.iter().map(String::as_str).collect::<Vec<_>>();
        wg.add_rule(&line.lhs, &rhs, line.probability)
          .map_err(|e| at(e.kind))?;
      } else if let [word] = line.rhs.as_slice() {
        wg.add_word(&line.lhs, word, line.probability);
      } else {
        return Err(at(FormatErrorKind::BadArity(line.rhs.len())));
      }
    }

    if wg.rules.is_empty() {
      Err(FormatError::whole(FormatErrorKind::EmptyGrammar))
    } else {
      Ok(wg)
    }
  }
}

impl fmt::Display for WeightedGrammar {
  /// Writes the grammar in the text format `from_str` reads
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for rule in self.rules.values().flatten() {
      writeln!(f, "{} {}", rule, rule.probability)?;
    }
    for (category, words) in self.lexicon.iter() {
      for (word, prob) in words.iter() {
        writeln!(f, "{} -> {} {}", category, word, prob)?;
      }
    }
    Ok(())
  }
}

/// On-disk shape of a weighted grammar
#[derive(Debug, Serialize, Deserialize)]
struct Document {
  define_rules: BTreeMap<String, Definition>,
  probabilities: BTreeMap<String, Probabilities>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Definition {
  Alternatives(Vec<Vec<String>>),
  Words(Vec<String>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Probabilities {
  PerAlternative(Vec<AlternativeProbability>),
  PerWord(BTreeMap<String, f64>),
}

/// Older files wrap each alternative's probability in a one-element list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum AlternativeProbability {
  Bare(f64),
  Wrapped(Vec<f64>),
}

impl AlternativeProbability {
  fn value(&self) -> f64 {
    match self {
      Self::Bare(p) => *p,
      Self::Wrapped(ps) => ps.first().copied().unwrap_or(0.0),
    }
  }
}

impl Document {
  fn into_grammar(self, start: &str) -> Result<WeightedGrammar, FormatError> {
    let mismatch = |symbol: &str| {
      FormatError::whole(FormatErrorKind::Json(format!(
        "probabilities for `{}` don't match its definition",
        symbol
      )))
    };

    let mut wg = WeightedGrammar::new(start);
    for (symbol, definition) in self.define_rules {
      let probs = self.probabilities.get(&symbol);
      match definition {
        Definition::Alternatives(alternatives) => {
          let probs: &[AlternativeProbability] = match probs {
            Some(Probabilities::PerAlternative(ps)) => ps.as_slice(),
            Some(Probabilities::PerWord(_)) => return Err(mismatch(&symbol)),
            None => &[],
          };
          for (idx, rhs) in alternatives.iter().enumerate() {
            let rhs = rhs.iter().map(String::as_str).collect::<Vec<_>>();
            let prob = probs.get(idx).map_or(0.0, AlternativeProbability::value);
            wg.add_rule(&symbol, &rhs, prob)?;
          }
        }
        Definition::Words(words) => {
          let probs = match probs {
            Some(Probabilities::PerWord(ps)) => Some(ps),
            Some(Probabilities::PerAlternative(ps)) if ps.is_empty() => None,
            Some(Probabilities::PerAlternative(_)) => return Err(mismatch(&symbol)),
            None => None,
          };
          for word in words.iter() {
            let prob = probs.and_then(|ps| ps.get(word)).copied().unwrap_or(0.0);
            wg.add_word(&symbol, word, prob);
          }
        }
      }
    }
    Ok(wg)
  }
}

impl From<&WeightedGrammar> for Document {
  fn from(wg: &WeightedGrammar) -> Self {
    let mut define_rules = BTreeMap::new();
    let mut probabilities = BTreeMap::new();

    for (symbol, alternatives) in wg.rules.iter() {
      define_rules.insert(
        symbol.clone(),
        Definition::Alternatives(
          alternatives
            .iter()
            .map(|r| r.productions.iter().map(|p| p.symbol_str().to_string()).collect())
            .collect(),
        ),
      );
      probabilities.insert(
        symbol.clone(),
        Probabilities::PerAlternative(
          alternatives
            .iter()
            .map(|r| AlternativeProbability::Bare(r.probability))
            .collect(),
        ),
      );
    }

    for (category, words) in wg.lexicon.iter() {
      define_rules.insert(
        category.clone(),
        Definition::Words(words.keys().cloned().collect()),
      );
      probabilities.insert(category.clone(), Probabilities::PerWord(words.clone()));
    }

    Self {
      define_rules,
      probabilities,
    }
  }
}
