use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use log::debug;

use lib_hit_filter::{SeqFilter, Thresholds};

/// Transitive-closure clustering over a stream of pairwise sequence hits
///
/// With no filters and no -t, lines are plain `name name` pairs; any numeric
/// setting (or -t) switches to the tabulated hit format
/// `q_name q_len q_n5 q_n3 hit_name hit_len hit_n5 hit_n3 pid score p-value strand`.
#[derive(Debug, Parser)]
#[command(name = "tclust", version)]
pub struct Cli {
  /// suppress the >CL<n> header line above each cluster
  #[arg(short = 'H')]
  pub no_headers: bool,

  /// write clusters here instead of stdout
  #[arg(short = 'o', value_name = "out_file")]
  pub output: Option<PathBuf>,

  /// copy every hit line that passed the filters here ("-" for stdout)
  #[arg(short = 'f', value_name = "flthits_file")]
  pub filtered: Option<PathBuf>,

  /// expect tabulated hit lines even when no numeric filter is set
  #[arg(short = 't')]
  pub tabulated: bool,

  /// discard any pair touching a name from this list
  #[arg(short = 'x', value_name = "excludelist")]
  pub exclude: Option<PathBuf>,

  /// keep only pairs with at least one name from this list
  #[arg(short = 's', value_name = "seqlist")]
  pub seq_only: Option<PathBuf>,

  /// keep only pairs with both names in this list (overrides -s)
  #[arg(short = 'r', value_name = "restrictlist")]
  pub restrict: Option<PathBuf>,

  /// pre-seed clusters from clone lines in this file
  #[arg(short = 'c', value_name = "clone_lines")]
  pub clones: Option<PathBuf>,

  /// hits file (stdin if absent) plus KEY=value settings: SEQFLT=ET|EST|EST2ET
  /// and integer PID= SCOV= LCOV= OVL= OVHANG= SCORE=
  #[arg(value_name = "arg")]
  pub rest: Vec<String>,
}

/// Everything the driver needs once the command line has been digested
#[derive(Debug)]
pub struct Settings {
  pub input: Option<PathBuf>,
  pub output: Option<PathBuf>,
  pub filtered: Option<PathBuf>,
  pub headers: bool,
  pub tabulated: bool,
  pub seq_filter: Option<SeqFilter>,
  pub thresholds: Thresholds,
  pub exclude: Option<PathBuf>,
  pub seq_only: Option<PathBuf>,
  pub restrict: Option<PathBuf>,
  pub clones: Option<PathBuf>,
}

impl Settings {
  /// Folds the flags and the historical KEY=value trailing settings
  /// together; any numeric setting forces the tabulated input regime
  pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
    let mut input = None;
    let mut seq_filter = None;
    let mut thresholds = Thresholds::default();
    let mut tabulated = cli.tabulated;
    for token in &cli.rest {
      match token.split_once('=') {
        None => {
          if input.replace(PathBuf::from(token)).is_some() {
            bail!("more than one hits file given: {token}");
          }
        }
        Some((key, value)) => {
          match key {
            "SEQFLT" => seq_filter = Some(value.parse::<SeqFilter>()?),
            "PID" => thresholds.min_pid = int_setting(key, value)?,
            "SCOV" => thresholds.min_scov = int_setting(key, value)?,
            "LCOV" => thresholds.min_lcov = int_setting(key, value)?,
            "OVL" => thresholds.min_ovl = int_setting(key, value)?,
            "OVHANG" => thresholds.max_ovhang = int_setting(key, value)?,
            "SCORE" => thresholds.min_score = int_setting(key, value)?,
            _ => bail!("unknown setting {key}= (want SEQFLT, PID, SCOV, LCOV, OVL, OVHANG or SCORE)"),
          }
          if key != "SEQFLT" {
            tabulated = true;
          }
        }
      }
    }
    let seq_only = if cli.restrict.is_some() {
      if cli.seq_only.is_some() {
        debug!("restrict list given, seq-only list ignored");
      }
      None
    } else {
      cli.seq_only
    };
    Ok(Self {
      input,
      output: cli.output,
      filtered: cli.filtered,
      headers: !cli.no_headers,
      tabulated,
      seq_filter,
      thresholds,
      exclude: cli.exclude,
      seq_only,
      restrict: cli.restrict,
      clones: cli.clones,
    })
  }
}

fn int_setting(key: &str, value: &str) -> anyhow::Result<i64> {
  value
    .parse()
    .with_context(|| format!("bad numeric value for {key}=: {value}"))
}
