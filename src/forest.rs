//! Derivation trees from finished charts: CYK tables via their backpointers, and
//! Earley charts via the children recorded on each item.

use crate::chart::{Backpointer, CellKey, SpanTable};
use crate::earley::{Chart, ItemIdx};
use crate::grammar::Grammar;
use crate::rules::Production;
use crate::syntree::{Constituent, ParseTree, Scored, SynTree, Word};
use crate::weighted_grammar::WeightedGrammar;

/// A CYK chart cell that knows how it was built
pub trait ChartCell {
  fn backpointer(&self) -> Backpointer;

  /// Probability of the sub-derivation rooted at this cell
  fn probability(&self) -> f64;
}

/// Boolean recognizer cells: everything reachable is certain
impl ChartCell for Backpointer {
  fn backpointer(&self) -> Backpointer {
    *self
  }

  fn probability(&self) -> f64 {
    1.0
  }
}

/// Viterbi cells carry their best log-probability
impl ChartCell for (f64, Backpointer) {
  fn backpointer(&self) -> Backpointer {
    self.1
  }

  fn probability(&self) -> f64 {
    self.0.exp()
  }
}

/// Rebuilds the derivation rooted at `key` by following backpointers. Spans in the
/// tree are 0-indexed and end-exclusive. None if `key` is unreachable.
pub fn span_tree<T: ChartCell>(
  grammar: &Grammar,
  table: &SpanTable<T>,
  tokens: &[String],
  key: CellKey,
) -> Option<ParseTree> {
  let cell = table.get(key)?;
  let symbol = grammar.nonterminals().get(key.symbol)?;

  let children = match cell.backpointer() {
    Backpointer::Leaf(pos) => vec![SynTree::Leaf(Word {
      value: tokens.get(pos - 1)?.clone(),
      span: (pos - 1, pos),
    })],
    Backpointer::Split(left, right) => vec![
      span_tree(grammar, table, tokens, left)?,
      span_tree(grammar, table, tokens, right)?,
    ],
  };

  Some(SynTree::Branch(
    Constituent {
      value: Scored::new(symbol.as_str(), cell.probability()),
      span: (key.start - 1, key.end),
    },
    children,
  ))
}

/// Rebuilds the derivation of a completed Earley item. Literal terminals become
/// leaves; every other rhs symbol is filled by the next recorded child item.
pub fn item_tree(chart: &Chart, grammar: &WeightedGrammar, idx: ItemIdx) -> ParseTree {
  let mut path = Vec::new();
  build_item_tree(chart, grammar, idx, &mut path)
}

fn build_item_tree(
  chart: &Chart,
  grammar: &WeightedGrammar,
  idx: ItemIdx,
  path: &mut Vec<ItemIdx>,
) -> ParseTree {
  let item = chart.item(idx);
  path.push(idx);

  let mut children = Vec::with_capacity(item.lr0.pos);
  let mut child_items = item.children.iter();
  let mut pos = item.origin;

  for production in item.lr0.rule.productions[..item.lr0.pos].iter() {
    match production {
      Production::Terminal(word) if !grammar.is_category(word) => {
        children.push(SynTree::Leaf(Word {
          value: word.clone(),
          span: (pos, pos + 1),
        }));
        pos += 1;
      }
      _ => {
        let Some(&child) = child_items.next() else {
          break;
        };
        pos = chart.item(child).current;
        // a cyclic derivation would recurse forever
        if !path.contains(&child) {
          children.push(build_item_tree(chart, grammar, child, path));
        }
      }
    }
  }

  path.pop();
  SynTree::Branch(
    Constituent {
      value: Scored::new(item.symbol_str(), item.probability),
      span: (item.origin, item.current),
    },
    children,
  )
}
