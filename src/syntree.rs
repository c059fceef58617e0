use std::fmt;

/// A labeled node of a derivation, covering the input between `span.0` and `span.1`
/// (0-indexed, end exclusive)
#[derive(Debug, PartialEq, Clone)]
pub struct Constituent<T> {
  pub value: T,
  pub span: (usize, usize),
}

impl<T> fmt::Display for Constituent<T>
where
  T: fmt::Display,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}..{}: {}", self.span.0, self.span.1, self.value)
  }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Word<U> {
  pub value: U,
  pub span: (usize, usize),
}

impl<U> fmt::Display for Word<U>
where
  U: fmt::Display,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}..{}: {}", self.span.0, self.span.1, self.value)
  }
}

/// A nonterminal together with the probability of the sub-derivation it heads
#[derive(Debug, PartialEq, Clone)]
pub struct Scored {
  pub symbol: String,
  pub probability: f64,
}

impl Scored {
  pub fn new(symbol: impl Into<String>, probability: f64) -> Self {
    Self {
      symbol: symbol.into(),
      probability,
    }
  }
}

impl fmt::Display for Scored {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({:.6})", self.symbol, self.probability)
  }
}

/// The tree a renderer gets: branches are scored nonterminals, leaves are words
pub type ParseTree = SynTree<Scored, String>;

#[derive(Debug, PartialEq, Clone)]
pub enum SynTree<T, U> {
  Branch(Constituent<T>, Vec<SynTree<T, U>>),
  Leaf(Word<U>),
}

impl<T, U> SynTree<T, U> {
  pub fn is_leaf(&self) -> bool {
    matches!(self, Self::Leaf(_))
  }

  pub fn is_branch(&self) -> bool {
    matches!(self, Self::Branch(_, _))
  }

  pub fn get_leaf(&self) -> Option<&Word<U>> {
    match self {
      Self::Leaf(w) => Some(w),
      _ => None,
    }
  }

  pub fn get_branch(&self) -> Option<(&Constituent<T>, &Vec<SynTree<T, U>>)> {
    match self {
      Self::Branch(c, cs) => Some((c, cs)),
      _ => None,
    }
  }

  pub fn span(&self) -> (usize, usize) {
    match self {
      Self::Branch(c, _) => c.span,
      Self::Leaf(w) => w.span,
    }
  }

  pub fn children(&self) -> &[SynTree<T, U>] {
    match self {
      Self::Branch(_, cs) => cs,
      Self::Leaf(_) => &[],
    }
  }

  /// Visits every node depth-first, parents before children, with its depth (root is 0)
  pub fn walk<'a, F>(&'a self, visit: &mut F)
  where
    F: FnMut(usize, &'a SynTree<T, U>),
  {
    self.walk_at(0, visit)
  }

  fn walk_at<'a, F>(&'a self, depth: usize, visit: &mut F)
  where
    F: FnMut(usize, &'a SynTree<T, U>),
  {
    visit(depth, self);
    for child in self.children() {
      child.walk_at(depth + 1, visit);
    }
  }

  /// Depth of the deepest node, a lone leaf being 0
  pub fn depth(&self) -> usize {
    let mut max = 0;
    self.walk(&mut |depth, _| max = max.max(depth));
    max
  }

  /// The words at the leaves, left to right
  pub fn leaves(&self) -> Vec<&U> {
    let mut leaves = Vec::new();
    self.walk(&mut |_, node| {
      if let Some(w) = node.get_leaf() {
        leaves.push(&w.value);
      }
    });
    leaves
  }
}

impl<T, U> fmt::Display for SynTree<T, U>
where
  T: fmt::Display,
  U: fmt::Display,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Leaf(t) => write!(f, "{}", t),
      Self::Branch(t, ts) => {
        write!(f, "({}", t)?;
        if ts.len() == 1 {
          write!(f, " ({}))", ts[0])
        } else {
          for t in ts.iter() {
            let fmt = format!("{}", t);
            for line in fmt.lines() {
              write!(f, "\n  {}", line)?;
            }
          }
          write!(f, ")")
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn leaf(w: &str, at: usize) -> ParseTree {
    SynTree::Leaf(Word {
      value: w.to_string(),
      span: (at, at + 1),
    })
  }

  fn branch(symbol: &str, span: (usize, usize), children: Vec<ParseTree>) -> ParseTree {
    SynTree::Branch(
      Constituent {
        value: Scored::new(symbol, 1.0),
        span,
      },
      children,
    )
  }

  #[test]
  fn test_walk() {
    let tree = branch(
      "S",
      (0, 2),
      vec![
        branch("NP", (0, 1), vec![leaf("dog", 0)]),
        branch("VP", (1, 2), vec![leaf("barks", 1)]),
      ],
    );

    let mut seen = Vec::new();
    tree.walk(&mut |depth, node| seen.push((depth, node.span())));
    assert_eq!(seen, vec![(0, (0, 2)), (1, (0, 1)), (2, (0, 1)), (1, (1, 2)), (2, (1, 2))]);
    assert_eq!(tree.depth(), 2);
    assert_eq!(tree.leaves(), vec!["dog", "barks"]);
    assert!(tree.is_branch());
    assert_eq!(tree.children().len(), 2);
  }

  #[test]
  fn test_display() {
    let tree = branch("NP", (0, 1), vec![leaf("dog", 0)]);
    assert_eq!(tree.to_string(), "(0..1: NP (1.000000) (0..1: dog))");
  }
}
