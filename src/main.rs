use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};

use syngram::{Options, extract_with};

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    if let Err(err) = run(&config) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

struct CliConfig {
    src_file: String,
    tgt_file: String,
    align_file: String,
    aligns_out: Option<String>,
    start_sent: usize,
    end_sent: usize,
    options: Options,
}

fn run(config: &CliConfig) -> Result<(), String> {
    let src_lines = open_lines(&config.src_file)?;
    let tgt_lines = open_lines(&config.tgt_file)?;
    let align_lines = open_lines(&config.align_file)?;

    let mut aligns_out = match &config.aligns_out {
        Some(path) => {
            let file = File::create(path)
                .map_err(|err| format!("can't write to file {path}: {err}"))?;
            Some(BufWriter::new(file))
        }
        None => None,
    };

    let stdout = std::io::stdout();
    let mut rules_out = BufWriter::new(stdout.lock());
    let mut errors_out = std::io::stderr();
    process(
        config,
        src_lines,
        tgt_lines,
        align_lines,
        &mut rules_out,
        aligns_out.as_mut().map(|w| w as &mut dyn Write),
        &mut errors_out,
    )?;

    rules_out.flush().map_err(|err| format!("can't write rules: {err}"))?;
    if let Some(mut out) = aligns_out {
        out.flush().map_err(|err| format!("can't write node alignments: {err}"))?;
    }
    Ok(())
}

fn process(
    config: &CliConfig,
    src_lines: impl Iterator<Item = std::io::Result<String>>,
    tgt_lines: impl Iterator<Item = std::io::Result<String>>,
    align_lines: impl Iterator<Item = std::io::Result<String>>,
    rules_out: &mut dyn Write,
    mut aligns_out: Option<&mut dyn Write>,
    errors_out: &mut dyn Write,
) -> Result<(), String> {
    let mut sent_num = 0usize;
    for ((src, tgt), align) in src_lines.zip(tgt_lines).zip(align_lines) {
        sent_num += 1;
        if sent_num < config.start_sent || sent_num > config.end_sent {
            continue;
        }
        let (src, tgt, align) = match (src, tgt, align) {
            (Ok(s), Ok(t), Ok(a)) => (s, t, a),
            _ => return Err(format!("read failed at sentence {sent_num}")),
        };

        writeln!(rules_out, "Sentence {sent_num}")
            .map_err(|err| format!("can't write rules: {err}"))?;
        let extraction = match extract_with(&src, &tgt, &align, &config.options) {
            Ok(extraction) => extraction,
            Err(err) => {
                // A bad sentence should never sink the whole batch.
                let _ = writeln!(errors_out, "error in sentence {sent_num}: {err}");
                continue;
            }
        };

        for rule in &extraction.rules {
            writeln!(rules_out, "{rule}").map_err(|err| format!("can't write rules: {err}"))?;
        }
        if let Some(out) = aligns_out.as_mut() {
            writeln!(out, "Sentence {sent_num}")
                .and_then(|_| {
                    extraction.alignments.iter().try_for_each(|line| writeln!(out, "{line}"))
                })
                .map_err(|err| format!("can't write node alignments: {err}"))?;
        }
    }
    Ok(())
}

fn open_lines(path: &str) -> Result<impl Iterator<Item = std::io::Result<String>>, String> {
    let file = File::open(path).map_err(|err| format!("error: can't open {path}: {err}"))?;
    Ok(BufReader::new(file).lines())
}

fn parse_args() -> Result<CliConfig, String> {
    let mut positional: Vec<String> = Vec::new();
    let mut aligns_out = None;
    let mut start_sent = 1usize;
    let mut end_sent = usize::MAX;
    let mut options = Options::default();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print!("{}", help_text());
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("syngram {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--max-grammar-size" => {
                options.max_grammar_rule_size = numeric_value(&arg, args.next())?;
            }
            "--max-phrase-size" => {
                options.max_phrase_rule_size = numeric_value(&arg, args.next())?;
            }
            "--max-virtual-components" => {
                options.max_virtual_node_components = numeric_value(&arg, args.next())?;
            }
            "--no-unary" => options.allow_unary = false,
            "--triangular" => options.allow_triangular = true,
            "--minimal" => options.minimal_rules_only = true,
            "--aligns-out" => {
                let value =
                    args.next().ok_or_else(|| "error: --aligns-out expects a file".to_string())?;
                aligns_out = Some(value);
            }
            "--start" => start_sent = numeric_value(&arg, args.next())?,
            "--end" => end_sent = numeric_value(&arg, args.next())?,
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => positional.push(arg),
        }
    }

    if positional.len() != 3 {
        return Err(format!(
            "error: expected <src-trees> <tgt-trees> <alignments>\n\n{}",
            help_text()
        ));
    }
    let mut positional = positional.into_iter();
    Ok(CliConfig {
        src_file: positional.next().unwrap_or_default(),
        tgt_file: positional.next().unwrap_or_default(),
        align_file: positional.next().unwrap_or_default(),
        aligns_out,
        start_sent,
        end_sent,
        options,
    })
}

fn numeric_value(flag: &str, value: Option<String>) -> Result<usize, String> {
    let value = value.ok_or_else(|| format!("error: {flag} expects a number"))?;
    value.parse().map_err(|_| format!("error: invalid {flag} '{value}'"))
}

fn help_text() -> String {
    format!(
        "syngram {version}

Synchronous grammar rule learner. Reads one parse tree per line from the
source and target files plus a Moses-format word alignment per line, and
prints the extracted rules for each sentence pair.

Usage:
  syngram [OPTIONS] <src-trees> <tgt-trees> <alignments>

Options:
  --max-grammar-size <n>        Max components per grammar rule side (default 4).
  --max-phrase-size <n>         Max words per phrase rule side (default 4).
  --max-virtual-components <n>  Max siblings grouped by a virtual node (default 4).
  --no-unary                    Drop rules that only pair two nonterminals.
  --triangular                  Allow right-hand sides mentioning the opposite LHS.
  --minimal                     Compose from direct node alignments only.
  --aligns-out <file>           Also write node alignment records to <file>.
  --start <n>                   First sentence to process, 1-based (default 1).
  --end <n>                     Last sentence to process (default: all).
  -h, --help                    Show this help message.
  -V, --version                 Print version information.

Exit codes:
  0  Success.
  1  Input files could not be read or written.
  2  Invalid arguments.
",
        version = env!("CARGO_PKG_VERSION"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> std::vec::IntoIter<std::io::Result<String>> {
        items.iter().map(|s| Ok(s.to_string())).collect::<Vec<_>>().into_iter()
    }

    fn config() -> CliConfig {
        CliConfig {
            src_file: String::new(),
            tgt_file: String::new(),
            align_file: String::new(),
            aligns_out: None,
            start_sent: 1,
            end_sent: usize::MAX,
            options: Options::default(),
        }
    }

    #[test]
    fn a_bad_sentence_is_reported_and_the_batch_continues() {
        let mut rules = Vec::new();
        let mut aligns = Vec::new();
        let mut errors = Vec::new();
        process(
            &config(),
            lines(&["(B (C c) (D d))", "(B", "(B (C c) (D d))"]),
            lines(&["(R (Q q) (P p))", "(R (Q q) (P p))", "(R (Q q) (P p))"]),
            lines(&["1-0", "1-0", "1-0"]),
            &mut rules,
            Some(&mut aligns as &mut dyn Write),
            &mut errors,
        )
        .unwrap();

        let rules = String::from_utf8(rules).unwrap();
        let errors = String::from_utf8(errors).unwrap();
        let aligns = String::from_utf8(aligns).unwrap();
        assert_eq!(rules.matches("P ||| [D::Q] ||| d ||| q ||| OO ||| 0-0").count(), 2);
        assert!(rules.contains("Sentence 3\n"));
        assert!(errors.contains("sentence 2"));
        // The alignment sink only records the sentences that parsed.
        assert_eq!(aligns.matches("Sentence").count(), 2);
        assert!(!aligns.contains("Sentence 2\n"));
    }

    #[test]
    fn sentence_range_limits_the_batch() {
        let mut cfg = config();
        cfg.start_sent = 2;
        cfg.end_sent = 2;
        let mut rules = Vec::new();
        let mut errors = Vec::new();
        process(
            &cfg,
            lines(&["(B (C c) (D d))", "(B (C c) (D d))", "(B (C c) (D d))"]),
            lines(&["(R (Q q) (P p))", "(R (Q q) (P p))", "(R (Q q) (P p))"]),
            lines(&["1-0", "1-0", "1-0"]),
            &mut rules,
            None,
            &mut errors,
        )
        .unwrap();

        let rules = String::from_utf8(rules).unwrap();
        assert!(!rules.contains("Sentence 1\n"));
        assert!(rules.contains("Sentence 2\n"));
        assert!(!rules.contains("Sentence 3\n"));
    }
}
