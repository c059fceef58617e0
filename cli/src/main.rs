use std::env;
use std::io;
use std::io::Write;
use std::process;

use chartparse::{
  CykRecognizer, EarleyParser, Err, Grammar, ViterbiParser, WeightTable, WeightedGrammar,
  DEFAULT_START,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn usage(prog_name: &str) -> String {
  format!(
    r"Usage: {} GRAMMAR [options]

GRAMMAR is a CNF rule file, or with --earley a weighted grammar (.json or text).

Options:
  -h, --help              Print this message
  -w, --weights FILE      Rule weights for the CNF grammar (defaults to random weights)
  -e, --earley            Parse with the Earley parser instead of CYK
  -c, --chart             Print the parse chart (defaults to not printing)
  -g, --generate N        Print N generated sentences and exit
  -s, --start SYMBOL      Start symbol (defaults to {})

Log output is controlled by RUST_LOG, e.g. RUST_LOG=chartparse=debug",
    prog_name, DEFAULT_START
  )
}

struct Args {
  filename: String,
  weights: Option<String>,
  earley: bool,
  print_chart: bool,
  generate: Option<usize>,
  start: String,
}

impl Args {
  fn make_error_message(msg: &str, prog_name: impl AsRef<str>) -> String {
    format!("argument error: {}.\n\n{}", msg, usage(prog_name.as_ref()))
  }

  fn parse(v: Vec<String>) -> Result<Self, String> {
    let mut iter = v.into_iter();
    let Some(prog_name) = iter.next() else {
      return Err(Self::make_error_message("bad argument vector", "chartparse"));
    };

    let mut filename: Option<String> = None;
    let mut weights: Option<String> = None;
    let mut earley = false;
    let mut print_chart = false;
    let mut generate: Option<usize> = None;
    let mut start = DEFAULT_START.to_string();

    while let Some(o) = iter.next() {
      if o == "-h" || o == "--help" {
        println!("{}", usage(&prog_name));
        process::exit(0);
      } else if o == "-e" || o == "--earley" {
        earley = true;
      } else if o == "-c" || o == "--chart" {
        print_chart = true;
      } else if o == "-w" || o == "--weights" {
        match iter.next() {
          Some(w) => weights = Some(w),
          None => return Err(Self::make_error_message("missing weights file", prog_name)),
        }
      } else if o == "-s" || o == "--start" {
        match iter.next() {
          Some(s) => start = s,
          None => return Err(Self::make_error_message("missing start symbol", prog_name)),
        }
      } else if o == "-g" || o == "--generate" {
        match iter.next().and_then(|n| n.parse().ok()) {
          Some(n) => generate = Some(n),
          None => return Err(Self::make_error_message("expected a sentence count", prog_name)),
        }
      } else if filename.is_none() {
        filename = Some(o);
      } else {
        return Err(Self::make_error_message("invalid arguments", prog_name));
      }
    }

    if earley && (weights.is_some() || generate.is_some()) {
      return Err(Self::make_error_message(
        "--weights and --generate only apply to CNF grammars",
        prog_name,
      ));
    }

    if let Some(filename) = filename {
      Ok(Self {
        filename,
        weights,
        earley,
        print_chart,
        generate,
        start,
      })
    } else {
      Err(Self::make_error_message("missing filename", prog_name))
    }
  }
}

fn parse_cnf(
  g: &Grammar,
  viterbi: &ViterbiParser,
  sentence: &str,
  start: &str,
  print_chart: bool,
) {
  let parsable = CykRecognizer::new(g).parsable(sentence, start);
  let parse = viterbi.sentence_probability(sentence, start);

  if print_chart {
    println!("chart:\n{}\n", parse.backpointers.cells());
  }

  println!("parsable: {}", parsable);
  println!("log probability: {}", parse.log_probability);
  if let Some(tree) = parse.backpointers.tree(g, start).filter(|_| parse.is_derivable()) {
    println!("{}", tree);
  }
  println!();
}

fn parse_earley(parser: &mut EarleyParser, sentence: &str, print_chart: bool) {
  let accepted = parser.parse(sentence);

  if print_chart {
    println!("chart:\n{}\n", parser.chart());
  }

  println!("accepted: {}", accepted);
  println!("probability: {}", parser.probability());
  if let Some(tree) = parser.tree() {
    println!("{}", tree);
  }
  println!();
}

fn repl(mut handle: impl FnMut(&str)) -> Result<(), Err> {
  let mut input = String::new();
  loop {
    print!("> ");
    io::stdout().flush()?;

    match io::stdin().read_line(&mut input) {
      Ok(_) => {
        if input.is_empty() {
          // ctrl+d
          return Ok(());
        }
        handle(input.trim());
        input.clear();
      }
      Err(error) => return Err(error.into()),
    }
  }
}

fn main() -> Result<(), Err> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let opts = match Args::parse(env::args().collect()) {
    Ok(opts) => opts,
    Err(msg) => {
      eprintln!("{}", msg);
      process::exit(255);
    }
  };

  if opts.earley {
    let g = WeightedGrammar::read_from_file(&opts.filename)?.with_start(opts.start.as_str());
    info!(file = %opts.filename, nonterminals = g.nonterminals().count(), "loaded weighted grammar");
    let mut parser = EarleyParser::new(g);
    return repl(|sentence| parse_earley(&mut parser, sentence, opts.print_chart));
  }

  let g = Grammar::read_from_file(&opts.filename)?;
  let weights = match &opts.weights {
    Some(path) => WeightTable::read_from_file(path)?,
    None => WeightTable::random(&g),
  };
  info!(file = %opts.filename, rules = weights.len(), "loaded grammar");
  let viterbi = ViterbiParser::new(&g, &weights);

  if let Some(n) = opts.generate {
    let mut rng = rand::thread_rng();
    for _ in 0..n {
      println!("{}", viterbi.generate(&opts.start, &mut rng)?);
    }
    return Ok(());
  }

  repl(|sentence| parse_cnf(&g, &viterbi, sentence, &opts.start, opts.print_chart))
}
