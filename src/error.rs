use thiserror::Error;

/// What was wrong with a malformed grammar or weight line
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatErrorKind {
  #[error("missing `->` separator")]
  MissingArrow,
  #[error("left-hand side must be a single symbol, got `{0}`")]
  BadLhs(String),
  #[error("right-hand side must have 1 or 2 symbols, got {0}")]
  BadArity(usize),
  #[error("empty right-hand side")]
  EmptyRhs,
  #[error("couldn't parse probability `{0}`")]
  BadProbability(String),
  #[error("empty ruleset")]
  EmptyGrammar,
  #[error("bad grammar document: {0}")]
  Json(String),
}

/// Structural error in grammar or weight text. Lines are 1-indexed; 0 means the
/// error isn't tied to a line.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: {kind}")]
pub struct FormatError {
  pub line: usize,
  pub kind: FormatErrorKind,
}

impl FormatError {
  pub fn new(line: usize, kind: FormatErrorKind) -> Self {
    Self { line, kind }
  }

  pub fn whole(kind: FormatErrorKind) -> Self {
    Self::new(0, kind)
  }
}

impl From<serde_json::Error> for FormatError {
  fn from(err: serde_json::Error) -> Self {
    Self::new(err.line(), FormatErrorKind::Json(err.to_string()))
  }
}

/// Errors from stochastic sentence generation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerateError {
  #[error("no alternatives with nonzero weight for `{0}`")]
  NoAlternatives(String),
  #[error("expansion deeper than {0} levels, grammar is probably cyclic")]
  DepthExceeded(usize),
}
