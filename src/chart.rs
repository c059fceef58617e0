use std::fmt;

/// Address of a CYK chart cell: a 1-indexed, inclusive span of the input and an
/// interned nonterminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellKey {
  pub start: usize,
  pub end: usize,
  pub symbol: usize,
}

impl CellKey {
  pub fn new(start: usize, end: usize, symbol: usize) -> Self {
    Self { start, end, symbol }
  }
}

/// How a chart cell was built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backpointer {
  /// A unary rule matched the word at this (1-indexed) position
  Leaf(usize),
  /// A binary rule combined these two cells
  Split(CellKey, CellKey),
}

/// Dense arena of chart cells for a sentence of `len` words over `symbols`
/// nonterminals. A cell that was never set is unreachable.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanTable<T> {
  len: usize,
  symbols: usize,
  cells: Vec<Option<T>>,
}

impl<T> SpanTable<T> {
  pub fn new(len: usize, symbols: usize) -> Self {
    Self {
      len,
      symbols,
      cells: std::iter::repeat_with(|| None).take(len * len * symbols).collect(),
    }
  }

  /// Number of words the table spans
  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  fn offset(&self, key: CellKey) -> Option<usize> {
    if key.start == 0 || key.start > key.end || key.end > self.len || key.symbol >= self.symbols {
      None
    } else {
      Some(((key.start - 1) * self.len + (key.end - 1)) * self.symbols + key.symbol)
    }
  }

  pub fn get(&self, key: CellKey) -> Option<&T> {
    self.offset(key).and_then(|idx| self.cells[idx].as_ref())
  }

  pub fn contains(&self, key: CellKey) -> bool {
    self.get(key).is_some()
  }

  /// Stores a cell value. Keys outside the table are ignored.
  pub fn set(&mut self, key: CellKey, value: T) {
    if let Some(idx) = self.offset(key) {
      self.cells[idx] = Some(value);
    }
  }

  /// Number of reachable cells
  pub fn filled(&self) -> usize {
    self.cells.iter().filter(|c| c.is_some()).count()
  }

  /// Reachable cells, ordered by start, then end, then symbol
  pub fn iter(&self) -> impl Iterator<Item = (CellKey, &T)> {
    let (len, symbols) = (self.len, self.symbols);
    self.cells.iter().enumerate().filter_map(move |(idx, cell)| {
      let value = cell.as_ref()?;
      let symbol = idx % symbols;
      let span = idx / symbols;
      Some((CellKey::new(span / len + 1, span % len + 1, symbol), value))
    })
  }
}

impl<T: fmt::Debug> fmt::Display for SpanTable<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (key, value) in self.iter() {
      writeln!(f, "  ({}, {}, #{}): {:?}", key.start, key.end, key.symbol, value)?;
    }
    Ok(())
  }
}
