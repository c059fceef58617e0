use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::forest::item_tree;
use crate::rules::{Production, WeightedRule};
use crate::syntree::ParseTree;
use crate::utils::tokenize;
use crate::weighted_grammar::WeightedGrammar;

/// Symbol of the synthetic rule `ROOT -> start` every parse begins from
pub const ROOT_SYMBOL: &str = "ROOT";

#[derive(Debug, Clone, PartialEq)]
pub struct LR0 {
  pub rule: Rc<WeightedRule>,
  pub pos: usize,
}

impl LR0 {
  pub fn new(rule: &Rc<WeightedRule>) -> Self {
    Self {
      rule: rule.clone(),
      pos: 0,
    }
  }

  pub fn is_active(&self) -> bool {
    self.pos < self.rule.len()
  }

  pub fn advance(&self) -> Self {
    assert!(self.is_active());
    Self {
      rule: self.rule.clone(),
      pos: self.pos + 1,
    }
  }

  pub fn next_production(&self) -> Option<&Production> {
    self.rule.productions.get(self.pos)
  }
}

impl fmt::Display for LR0 {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} →", self.rule.symbol)?;
    for idx in 0..self.rule.len() {
      if idx == self.pos {
        write!(f, " ・")?;
      }
      write!(f, " {}", self.rule.productions[idx])?;
    }
    if !self.is_active() {
      write!(f, " ・")?;
    }
    Ok(())
  }
}

/// Which operation put an item in the chart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
  Predictor,
  Scanner,
  Completor,
  /// the initial ROOT item
  Dummy,
}

impl fmt::Display for Op {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Predictor => "PREDICTOR",
      Self::Scanner => "SCANNER",
      Self::Completor => "COMPLETOR",
      Self::Dummy => "DUMMY",
    };
    write!(f, "{}", name)
  }
}

/// Index of an item in the chart's arena
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ItemIdx(pub usize);

/// An Earley item. Identity is the dotted rule plus origin and current position;
/// `op`, `children` and `probability` describe the best derivation found so far.
#[derive(Debug, Clone)]
pub struct Item {
  pub lr0: LR0,
  pub origin: usize,
  pub current: usize,
  pub op: Op,
  /// completed items for the non-literal symbols left of the dot, in rhs order
  pub children: Vec<ItemIdx>,
  pub probability: f64,
}

impl Item {
  pub fn new(
    lr0: LR0,
    origin: usize,
    current: usize,
    op: Op,
    children: Vec<ItemIdx>,
    probability: f64,
  ) -> Self {
    Self {
      lr0,
      origin,
      current,
      op,
      children,
      probability,
    }
  }

  pub fn symbol_str(&self) -> &str {
    self.lr0.rule.symbol_str()
  }

  pub fn is_complete(&self) -> bool {
    !self.lr0.is_active()
  }

  pub fn same_state(&self, other: &Item) -> bool {
    self.lr0 == other.lr0 && self.origin == other.origin && self.current == other.current
  }
}

/// What `Chart::add` did with an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
  New,
  /// An equal item was already at this position of the state; its derivation was
  /// replaced by the more probable one
  Improved(usize),
  Kept,
}

/// Item arena plus one insertion-ordered state set per input position
#[derive(Debug, Clone, Default)]
pub struct Chart {
  items: Vec<Item>,
  states: Vec<Vec<ItemIdx>>,
  /// the synthetic `ROOT -> start` rule, told apart from user rules by identity
  root: Option<Rc<WeightedRule>>,
}

impl Chart {
  pub fn new(length: usize) -> Self {
    Self {
      items: Vec::new(),
      states: vec![Vec::new(); length],
      root: None,
    }
  }

  /// Whether `item` is built on the synthetic root rule rather than a grammar rule
  /// that happens to share its name
  pub fn is_root(&self, item: &Item) -> bool {
    self
      .root
      .as_ref()
      .is_some_and(|root| Rc::ptr_eq(root, &item.lr0.rule))
  }

  /// Number of state sets
  pub fn len(&self) -> usize {
    self.states.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn len_at(&self, k: usize) -> usize {
    self.states[k].len()
  }

  /// Items of state `k`, in insertion order
  pub fn state(&self, k: usize) -> &[ItemIdx] {
    &self.states[k]
  }

  pub fn item(&self, idx: ItemIdx) -> &Item {
    &self.items[idx.0]
  }

  /// Total number of distinct items over all states
  pub fn item_count(&self) -> usize {
    self.items.len()
  }

  fn at(&self, k: usize, position: usize) -> ItemIdx {
    self.states[k][position]
  }

  /// Adds `item` to state `k` unless an equal item is there already. A duplicate
  /// with a strictly higher probability takes over the existing item's slot.
  /// Root items never merge with grammar items.
  pub fn add(&mut self, k: usize, item: Item) -> Insert {
    let is_root = self.is_root(&item);
    let existing = self.states[k]
      .iter()
      .enumerate()
      .find(|(_, idx)| {
        let other = &self.items[idx.0];
        other.same_state(&item) && self.is_root(other) == is_root
      })
      .map(|(position, idx)| (position, *idx));

    match existing {
      Some((position, idx)) => {
        if item.probability > self.items[idx.0].probability {
          self.items[idx.0] = item;
          Insert::Improved(position)
        } else {
          Insert::Kept
        }
      }
      None => {
        self.states[k].push(ItemIdx(self.items.len()));
        self.items.push(item);
        Insert::New
      }
    }
  }
}

impl fmt::Display for Chart {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for k in 0..self.len() {
      writeln!(f, "State {}:", k)?;
      for idx in self.states[k].iter() {
        let item = self.item(*idx);
        writeln!(
          f,
          "  {}..{}: {}  [{} {:.6}]",
          item.origin, item.current, item.lr0, item.op, item.probability
        )?;
      }
    }
    Ok(())
  }
}

/// Builds the Earley chart of `input` under `g`. State k holds the items whose dot
/// sits after the k-th word.
pub fn parse_chart(g: &WeightedGrammar, input: &[&str]) -> Chart {
  let mut chart = Chart::new(input.len() + 1);

  let root = Rc::new(WeightedRule::new(
    ROOT_SYMBOL,
    vec![Production::from_symbol(g.start())],
    1.0,
  ));
  chart.root = Some(root.clone());
  chart.add(0, Item::new(LR0::new(&root), 0, 0, Op::Dummy, Vec::new(), 1.0));

  for k in 0..chart.len() {
    // states grow while being processed, and items improved after their turn are
    // processed again so the better probability reaches their parents
    let mut cursor = 0;
    let mut requeued = Vec::new();
    loop {
      let idx = if cursor < chart.len_at(k) {
        cursor += 1;
        chart.at(k, cursor - 1)
      } else if let Some(idx) = requeued.pop() {
        idx
      } else {
        break;
      };
      let item = chart.item(idx).clone();

      match item.lr0.next_production() {
        None => {
          for position in completer(&mut chart, k, idx, &item) {
            if position < cursor {
              requeued.push(chart.at(k, position));
            }
          }
        }
        Some(p) if p.is_terminal() || g.is_category(p.symbol_str()) => {
          scanner(g, &mut chart, k, &item, input)
        }
        Some(_) => predictor(g, &mut chart, k, &item),
      }
    }
  }

  debug!(
    words = input.len(),
    items = chart.item_count(),
    "earley chart filled"
  );
  chart
}

/// Advances every item in the completed item's origin state that waits on its
/// symbol. Returns positions in state `k` whose derivation improved.
fn completer(chart: &mut Chart, k: usize, idx: ItemIdx, item: &Item) -> Vec<usize> {
  assert!(item.is_complete(), "tried to complete active item");

  let mut improved = Vec::new();
  // nothing in the grammar waits on the synthetic root
  if chart.is_root(item) {
    return improved;
  }
  for position in 0..chart.len_at(item.origin) {
    let waiting = chart.item(chart.at(item.origin, position)).clone();

    if let Some(np) = waiting.lr0.next_production() {
      if np.symbol_str() == item.symbol_str() {
        let mut children = waiting.children.clone();
        children.push(idx);
        let advanced = Item::new(
          waiting.lr0.advance(),
          waiting.origin,
          k,
          Op::Completor,
          children,
          item.probability * waiting.probability,
        );
        trace!(k, item = %advanced.lr0, p = advanced.probability, "complete");
        if let Insert::Improved(position) = chart.add(k, advanced) {
          improved.push(position);
        }
      }
    }
  }
  improved
}

/// Hypothesizes every alternative of the awaited nonterminal starting at `k`
fn predictor(g: &WeightedGrammar, chart: &mut Chart, k: usize, item: &Item) {
  let Some(needed) = item.lr0.next_production() else {
    return;
  };

  for rule in g.alternatives(needed.symbol_str()) {
    trace!(k, rule = %rule, "predict");
    chart.add(
      k,
      Item::new(LR0::new(rule), k, k, Op::Predictor, Vec::new(), rule.probability),
    );
  }
}

/// Consumes word `k` if it matches the awaited terminal. A lexicon category
/// produces a completed `category -> word` item; a literal word advances the dot.
fn scanner(g: &WeightedGrammar, chart: &mut Chart, k: usize, item: &Item, input: &[&str]) {
  let (Some(needed), Some(&word)) = (item.lr0.next_production(), input.get(k)) else {
    return;
  };
  let needed = needed.symbol_str();

  if g.is_category(needed) {
    if let Some(p) = g.lexical_probability(needed, word) {
      let rule = Rc::new(WeightedRule::new(
        needed,
        vec![Production::Terminal(word.to_string())],
        p,
      ));
      let lr0 = LR0::new(&rule).advance();
      trace!(k, item = %lr0, "scan");
      chart.add(k + 1, Item::new(lr0, k, k + 1, Op::Scanner, Vec::new(), p));
    }
  } else if needed == word {
    trace!(k, item = %item.lr0, "scan");
    chart.add(
      k + 1,
      Item::new(
        item.lr0.advance(),
        item.origin,
        k + 1,
        Op::Scanner,
        item.children.clone(),
        item.probability,
      ),
    );
  }
}

/// Weighted Earley parser. The chart of the last parse stays on the parser, so one
/// instance serves one caller at a time.
#[derive(Debug, Clone)]
pub struct EarleyParser {
  grammar: WeightedGrammar,
  chart: Chart,
  words: usize,
}

impl EarleyParser {
  pub fn new(grammar: WeightedGrammar) -> Self {
    Self {
      grammar,
      chart: Chart::default(),
      words: 0,
    }
  }

  pub fn grammar(&self) -> &WeightedGrammar {
    &self.grammar
  }

  /// Chart of the last parse
  pub fn chart(&self) -> &Chart {
    &self.chart
  }

  /// Parses a whitespace-separated sentence, returning whether it was accepted
  pub fn parse(&mut self, sentence: &str) -> bool {
    self.parse_tokens(&tokenize(sentence))
  }

  pub fn parse_tokens(&mut self, input: &[&str]) -> bool {
    self.chart = parse_chart(&self.grammar, input);
    self.words = input.len();
    let accepted = self.accepts();
    debug!(words = self.words, accepted, "earley parse");
    accepted
  }

  /// Whether the last parse derived the whole input from the start symbol
  pub fn accepts(&self) -> bool {
    !self.completed_roots().is_empty()
  }

  /// Completed ROOT items spanning the whole input, most probable first; equally
  /// probable ones keep the order they were found in
  pub fn completed_roots(&self) -> Vec<ItemIdx> {
    if self.chart.is_empty() {
      return Vec::new();
    }

    let mut roots = self
      .chart
      .state(self.words)
      .iter()
      .copied()
      .filter(|idx| {
        let item = self.chart.item(*idx);
        self.chart.is_root(item) && item.is_complete() && item.origin == 0
      })
      .collect::<Vec<_>>();
    roots.sort_by(|a, b| {
      self
        .chart
        .item(*b)
        .probability
        .total_cmp(&self.chart.item(*a).probability)
    });
    roots
  }

  pub fn best_root(&self) -> Option<&Item> {
    self
      .completed_roots()
      .first()
      .map(|idx| self.chart.item(*idx))
  }

  /// Probability of the best derivation, 0 if the input wasn't accepted
  pub fn probability(&self) -> f64 {
    self.best_root().map_or(0.0, |root| root.probability)
  }

  /// The best derivation, headed by the start symbol
  pub fn tree(&self) -> Option<ParseTree> {
    let root = self.best_root()?;
    let top = *root.children.first()?;
    Some(item_tree(&self.chart, &self.grammar, top))
  }
}
