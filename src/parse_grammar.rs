//! Line-oriented parsing of grammar and weight files
use regex::Regex;

use crate::error::{FormatError, FormatErrorKind};
use crate::rules::Rule;

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: Regex = Regex::new($pattern).unwrap();
    }
  };
}

/// Strips a trailing `// comment` and surrounding whitespace
fn strip_comment(line: &str) -> &str {
  regex_static!(COMMENT, r"//.*$");
  match COMMENT.find(line) {
    Some(m) => line[..m.start()].trim(),
    None => line.trim(),
  }
}

/// Yields (1-indexed line number, content) for every line that isn't blank or a comment
fn content_lines(s: &str) -> impl Iterator<Item = (usize, &str)> {
  s.lines()
    .enumerate()
    .map(|(idx, line)| (idx + 1, strip_comment(line)))
    .filter(|(_, line)| !line.is_empty())
}

/// Splits `LHS -> a b c` into the lhs and its whitespace-separated rhs tokens
fn split_rule(line: &str) -> Result<(&str, Vec<&str>), FormatErrorKind> {
  regex_static!(ARROW, r"^(?P<lhs>.*?)\s*->\s*(?P<rhs>.*)$");

  let caps = ARROW.captures(line).ok_or(FormatErrorKind::MissingArrow)?;
  let lhs = caps.name("lhs").map_or("", |m| m.as_str()).trim();
  let rhs = caps.name("rhs").map_or("", |m| m.as_str());

  if lhs.is_empty() || lhs.split_whitespace().count() != 1 {
    return Err(FormatErrorKind::BadLhs(lhs.to_string()));
  }

  Ok((lhs, rhs.split_whitespace().collect()))
}

/// A probability must lie in [0, 1]
fn parse_probability(token: &str) -> Result<f64, FormatErrorKind> {
  match token.parse::<f64>() {
    Ok(p) if (0.0..=1.0).contains(&p) => Ok(p),
    _ => Err(FormatErrorKind::BadProbability(token.to_string())),
  }
}

fn cnf_rule(lhs: &str, rhs: &[&str]) -> Result<Rule, FormatErrorKind> {
  match rhs {
    [w] => Ok(Rule::unary(lhs, *w)),
    [b, c] => Ok(Rule::binary(lhs, *b, *c)),
    _ => Err(FormatErrorKind::BadArity(rhs.len())),
  }
}

/// Parses CNF rules, one `LHS -> RHS` per line
pub fn parse_rules(s: &str) -> Result<Vec<Rule>, FormatError> {
  content_lines(s)
    .map(|(line_no, line)| {
      let (lhs, rhs) = split_rule(line).map_err(|kind| FormatError::new(line_no, kind))?;
      cnf_rule(lhs, &rhs).map_err(|kind| FormatError::new(line_no, kind))
    })
    .collect()
}

/// Parses CNF weights, one `LHS -> RHS prob` per line
pub fn parse_weights(s: &str) -> Result<Vec<(Rule, f64)>, FormatError> {
  content_lines(s)
    .map(|(line_no, line)| {
      let at = |kind| FormatError::new(line_no, kind);
      let (lhs, mut rhs) = split_rule(line).map_err(at)?;
      let prob = rhs.pop().ok_or_else(|| at(FormatErrorKind::EmptyRhs))?;
      let prob = parse_probability(prob).map_err(at)?;
      Ok((cnf_rule(lhs, &rhs).map_err(at)?, prob))
    })
    .collect()
}

/// A general rule as read from one line of text
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedLine {
  pub line: usize,
  pub lhs: String,
  pub rhs: Vec<String>,
  pub probability: f64,
}

/// Parses general weighted rules, one `LHS -> sym+ [prob]` per line.
/// A trailing token that reads as a number is the weight, otherwise the weight is 1.
pub fn parse_weighted_rules(s: &str) -> Result<Vec<WeightedLine>, FormatError> {
  content_lines(s)
    .map(|(line_no, line)| {
      let at = |kind| FormatError::new(line_no, kind);
      let (lhs, mut rhs) = split_rule(line).map_err(at)?;
      let prob = match rhs.last() {
        Some(token) if token.parse::<f64>().is_ok() => {
          let prob = parse_probability(token).map_err(at)?;
          rhs.pop();
          prob
        }
        _ => 1.0,
      };
      if rhs.is_empty() {
        return Err(at(FormatErrorKind::EmptyRhs));
      }
      Ok(WeightedLine {
        line: line_no,
        lhs: lhs.to_string(),
        rhs: rhs.into_iter().map(str::to_string).collect(),
        probability: prob,
      })
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_rules() {
    let rules = parse_rules(
      r#"
      // sentence
      S -> NP VP
      NP -> dog   // noun phrase
      VP->barks
    "#,
    )
    .unwrap();

    assert_eq!(
      rules,
      vec![
        Rule::binary("S", "NP", "VP"),
        Rule::unary("NP", "dog"),
        Rule::unary("VP", "barks"),
      ]
    );
  }

  #[test]
  fn test_missing_arrow() {
    let err = parse_rules("S -> NP VP\nNP dog").unwrap_err();
    assert_eq!(err, FormatError::new(2, FormatErrorKind::MissingArrow));
  }

  #[test]
  fn test_bad_arity() {
    let err = parse_rules("S -> A B C").unwrap_err();
    assert_eq!(err.kind, FormatErrorKind::BadArity(3));
    let err = parse_rules("S -> ").unwrap_err();
    assert_eq!(err.kind, FormatErrorKind::BadArity(0));
  }

  #[test]
  fn test_bad_lhs() {
    let err = parse_rules("S T -> a").unwrap_err();
    assert_eq!(err.kind, FormatErrorKind::BadLhs("S T".to_string()));
  }

  #[test]
  fn test_parse_weights() {
    let weights = parse_weights("S -> NP VP 1.0\nNP -> dog 0.25").unwrap();
    assert_eq!(
      weights,
      vec![
        (Rule::binary("S", "NP", "VP"), 1.0),
        (Rule::unary("NP", "dog"), 0.25),
      ]
    );

    let err = parse_weights("NP -> dog lots").unwrap_err();
    assert_eq!(err.kind, FormatErrorKind::BadProbability("lots".to_string()));
    let err = parse_weights("NP -> dog 7.5").unwrap_err();
    assert_eq!(err.kind, FormatErrorKind::BadProbability("7.5".to_string()));
    let err = parse_weights("S -> NP VP 1.0\nNP -> dog inf").unwrap_err();
    assert_eq!(err, FormatError::new(2, FormatErrorKind::BadProbability("inf".to_string())));
    assert_eq!(parse_weights("NP -> dog 0\nNP -> cat 1").unwrap()[1].1, 1.0);
    let err = parse_weights("NP -> 0.5").unwrap_err();
    assert_eq!(err.kind, FormatErrorKind::BadArity(0));
  }

  #[test]
  fn test_parse_weighted_rules() {
    let rules = parse_weighted_rules("S -> S a 0.4\nS -> a\nNP -> det N 0.5").unwrap();
    assert_eq!(
      rules[0],
      WeightedLine {
        line: 1,
        lhs: "S".to_string(),
        rhs: vec!["S".to_string(), "a".to_string()],
        probability: 0.4,
      }
    );
    assert_eq!((rules[1].line, rules[1].probability), (2, 1.0));
    assert_eq!(rules[2].rhs.len(), 2);

    let err = parse_weighted_rules("S -> 0.5").unwrap_err();
    assert_eq!(err.kind, FormatErrorKind::EmptyRhs);
    let err = parse_weighted_rules("S -> a 0.5\nS -> b 1.5").unwrap_err();
    assert_eq!(err, FormatError::new(2, FormatErrorKind::BadProbability("1.5".to_string())));
  }
}
