use std::collections::HashSet;
use std::str::FromStr;

use log::warn;
use thiserror::Error;

/// Identifier prefixes marking a sequence as ET-like
const ET_PREFIXES: [&str; 4] = ["np|", "et|", "egad|", "preegad|"];

// tabulated hit fields, in order; p_value and strand trail these but feed
// no filter, so they are never demanded
const Q_NAME: usize = 0;
const Q_LEN: usize = 1;
const Q_5: usize = 2;
const Q_3: usize = 3;
const H_NAME: usize = 4;
const H_LEN: usize = 5;
const H_5: usize = 6;
const H_3: usize = 7;
const PID: usize = 8;
const SCORE: usize = 9;

const FIELD_NAMES: [&str; 10] = [
  "q_name", "q_len", "q_n5", "q_n3", "hit_name", "hit_len", "hit_n5", "hit_n3", "pid", "score",
];

#[inline]
fn is_et_like(name: &str) -> bool {
  ET_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// Which sequence-type combinations survive the SEQFLT filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqFilter {
  /// both endpoints must be ET-like
  EtOnly,
  /// neither endpoint may be ET-like
  EstOnly,
  /// at least one endpoint must be ET-like, so EST-EST pairs drop
  EstToEt,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognised SEQFLT value: {0}")]
pub struct ParseSeqFilterError(String);

impl FromStr for SeqFilter {
  type Err = ParseSeqFilterError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "ET" => Ok(SeqFilter::EtOnly),
      "EST" => Ok(SeqFilter::EstOnly),
      // the two spellings are historical synonyms
      "EST2ET" | "ET2EST" => Ok(SeqFilter::EstToEt),
      other => Err(ParseSeqFilterError(other.to_string())),
    }
  }
}

/// Numeric admission thresholds for tabulated hits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
  pub min_scov: i64,
  pub min_lcov: i64,
  pub min_pid: i64,
  pub min_ovl: i64,
  pub min_score: i64,
  pub max_ovhang: i64,
}

impl Default for Thresholds {
  fn default() -> Self {
    Self {
      min_scov: 0,
      min_lcov: 0,
      min_pid: 0,
      min_ovl: 20,
      min_score: 0,
      max_ovhang: 1000,
    }
  }
}

/// Immutable filter state consulted for every input line
///
/// At most one of `seq_only` and `restrict` is populated; loading a restrict
/// list clears any seq-only list.
#[derive(Debug, Default)]
pub struct FilterConfig {
  pub tabulated: bool,
  pub exclude: HashSet<String>,
  pub seq_only: HashSet<String>,
  pub restrict: HashSet<String>,
  pub seq_filter: Option<SeqFilter>,
  pub thresholds: Thresholds,
}

/// Fatal per-line input-format failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanError {
  #[error("invalid pair line (want exactly two names): {0}")]
  PairFraming(String),
  #[error("truncated hit line (no {field} field): {line}")]
  MissingField { field: &'static str, line: String },
  #[error("bad {field} value {value:?} in hit line: {line}")]
  BadNumber {
    field: &'static str,
    value: String,
    line: String,
  },
  #[error("empty alignment range on the {side} side of hit line: {line}")]
  EmptyRange { side: &'static str, line: String },
}

/// What the filter pipeline decided about one line
#[derive(Debug, PartialEq, Eq)]
pub enum Verdict<'a> {
  /// the pair survived every enabled filter
  Pass { a: &'a str, b: &'a str },
  /// filtered out or skippable, no state change wanted
  Drop,
}

/// One decoded tabulated hit with its derived alignment metrics
#[derive(Debug, PartialEq, Eq)]
pub struct Hit<'a> {
  pub q_name: &'a str,
  pub h_name: &'a str,
  pub overlap: i64,
  pub scov: i64,
  pub lcov: i64,
  pub pid: i64,
  pub score: i64,
  pub ovh_r: i64,
  pub ovh_l: i64,
}

impl Hit<'_> {
  /// All numeric thresholds must hold at once
  pub fn admitted_by(&self, t: &Thresholds) -> bool {
    self.scov >= t.min_scov
      && self.lcov >= t.min_lcov
      && self.pid >= t.min_pid
      && self.overlap >= t.min_ovl
      && self.score >= t.min_score
      && self.ovh_r <= t.max_ovhang
      && self.ovh_l <= t.max_ovhang
  }
}

/// Pushes one newline-stripped line through parsing and the filter pipeline
///
/// The exclusion test on the first name runs before the rest of the line is
/// even looked at: a hit on an excluded query never pays for full parsing.
pub fn scan_line<'a>(line: &'a str, cfg: &FilterConfig) -> Result<Verdict<'a>, ScanError> {
  if cfg.tabulated {
    scan_tabulated(line, cfg)
  } else {
    scan_pair(line, cfg)
  }
}

fn scan_pair<'a>(line: &'a str, cfg: &FilterConfig) -> Result<Verdict<'a>, ScanError> {
  let mut fields = line.split_whitespace();
  let Some(a) = fields.next() else {
    // blank line
    return Ok(Verdict::Drop);
  };
  if cfg.exclude.contains(a) {
    return Ok(Verdict::Drop);
  }
  let Some(b) = fields.next() else {
    return Err(ScanError::PairFraming(line.to_string()));
  };
  if fields.next().is_some() {
    return Err(ScanError::PairFraming(line.to_string()));
  }
  if pass_name_filters(a, b, cfg) {
    Ok(Verdict::Pass { a, b })
  } else {
    Ok(Verdict::Drop)
  }
}

fn scan_tabulated<'a>(line: &'a str, cfg: &FilterConfig) -> Result<Verdict<'a>, ScanError> {
  // historical skip of stub lines
  if line.len() <= 1 {
    return Ok(Verdict::Drop);
  }
  let first = line.split('\t').next().unwrap_or_default();
  if cfg.exclude.contains(first) {
    return Ok(Verdict::Drop);
  }
  let hit = parse_hit(line)?;
  if !pass_name_filters(hit.q_name, hit.h_name, cfg) {
    return Ok(Verdict::Drop);
  }
  if !hit.admitted_by(&cfg.thresholds) {
    return Ok(Verdict::Drop);
  }
  Ok(Verdict::Pass {
    a: hit.q_name,
    b: hit.h_name,
  })
}

// filter steps after the first-name exclusion: seq-only/restrict, self pair,
// second-name exclusion, sequence-type combination
fn pass_name_filters(a: &str, b: &str, cfg: &FilterConfig) -> bool {
  if !cfg.seq_only.is_empty() && !cfg.seq_only.contains(a) && !cfg.seq_only.contains(b) {
    return false;
  }
  if !cfg.restrict.is_empty() && !(cfg.restrict.contains(a) && cfg.restrict.contains(b)) {
    return false;
  }
  if a == b {
    warn!("self hit on {a} dropped");
    return false;
  }
  if cfg.exclude.contains(b) {
    return false;
  }
  match cfg.seq_filter {
    None => true,
    Some(SeqFilter::EtOnly) => is_et_like(a) && is_et_like(b),
    Some(SeqFilter::EstOnly) => !is_et_like(a) && !is_et_like(b),
    Some(SeqFilter::EstToEt) => is_et_like(a) || is_et_like(b),
  }
}

/// Decodes the tabulated format, normalising coordinates so `n5 < n3` on
/// both sequences and folding the two possible swaps into one strand bit
pub fn parse_hit(line: &str) -> Result<Hit<'_>, ScanError> {
  let fields: Vec<&str> = line.split('\t').collect();
  let q_name = text_field(&fields, Q_NAME, line)?;
  let q_len = int_field(&fields, Q_LEN, line)?;
  let mut q_5 = int_field(&fields, Q_5, line)?;
  let mut q_3 = int_field(&fields, Q_3, line)?;
  let h_name = text_field(&fields, H_NAME, line)?;
  let h_len = int_field(&fields, H_LEN, line)?;
  let mut h_5 = int_field(&fields, H_5, line)?;
  let mut h_3 = int_field(&fields, H_3, line)?;
  let pid = int_field(&fields, PID, line)?;
  let score = int_field(&fields, SCORE, line)?;

  // lengths divide the coverage percentages below
  for (len, idx) in [(q_len, Q_LEN), (h_len, H_LEN)] {
    if len <= 0 {
      return Err(ScanError::BadNumber {
        field: FIELD_NAMES[idx],
        value: len.to_string(),
        line: line.to_string(),
      });
    }
  }
  if q_5 == q_3 {
    return Err(ScanError::EmptyRange {
      side: "query",
      line: line.to_string(),
    });
  }
  if h_5 == h_3 {
    return Err(ScanError::EmptyRange {
      side: "hit",
      line: line.to_string(),
    });
  }

  let mut flipped = false;
  if q_5 > q_3 {
    std::mem::swap(&mut q_5, &mut q_3);
    flipped = true;
  }
  if h_5 > h_3 {
    std::mem::swap(&mut h_5, &mut h_3);
    flipped = !flipped;
  }

  let overlap = (q_3 - q_5 + 1).max(h_3 - h_5 + 1);
  // coverage keeps the original integer-percentage convention: bare n3-n5
  // spans, without the +1 that overlap carries; the wider span rates the
  // shorter sequence, the narrower span the longer one
  let (span_q, span_h) = (q_3 - q_5, h_3 - h_5);
  let short_len = q_len.min(h_len);
  let long_len = q_len.max(h_len);
  let scov = percent(span_q.max(span_h), short_len);
  let lcov = percent(span_q.min(span_h), long_len);

  let (ovh_r, ovh_l) = if flipped {
    ((q_5 - 1).min(h_len - h_3), (h_5 - 1).min(q_len - q_3))
  } else {
    ((h_len - h_3).min(q_len - q_3), (h_5 - 1).min(q_5 - 1))
  };

  Ok(Hit {
    q_name,
    h_name,
    overlap,
    scov,
    lcov,
    pid,
    score,
    ovh_r,
    ovh_l,
  })
}

fn text_field<'a>(fields: &[&'a str], idx: usize, line: &str) -> Result<&'a str, ScanError> {
  match fields.get(idx) {
    Some(&text) if !text.is_empty() => Ok(text),
    _ => Err(ScanError::MissingField {
      field: FIELD_NAMES[idx],
      line: line.to_string(),
    }),
  }
}

// numeric fields hold decimals, rounded to the nearest integer
fn int_field(fields: &[&str], idx: usize, line: &str) -> Result<i64, ScanError> {
  let text = text_field(fields, idx, line)?;
  match text.parse::<f64>() {
    Ok(value) if value.is_finite() => Ok(value.round() as i64),
    _ => Err(ScanError::BadNumber {
      field: FIELD_NAMES[idx],
      value: text.to_string(),
      line: line.to_string(),
    }),
  }
}

#[inline]
fn percent(span: i64, len: i64) -> i64 {
  ((100 * span) as f64 / len as f64).round() as i64
}
