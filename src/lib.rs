#[macro_use]
extern crate lazy_static;

pub mod chart;
pub mod cyk;
pub mod earley;
pub mod error;
pub mod forest;
pub mod grammar;
pub mod parse_grammar;
pub mod rules;
pub mod syntree;
pub mod utils;
pub mod viterbi;
pub mod weighted_grammar;
pub mod weights;

pub use crate::cyk::CykRecognizer;
pub use crate::earley::EarleyParser;
pub use crate::error::{FormatError, GenerateError};
pub use crate::grammar::Grammar;
pub use crate::utils::{DEFAULT_START, Err};
pub use crate::viterbi::ViterbiParser;
pub use crate::weighted_grammar::WeightedGrammar;
pub use crate::weights::WeightTable;
