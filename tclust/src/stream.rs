use std::io::{BufRead, Write};

use anyhow::Context;

use lib_cluster_kit::Registry;
use lib_hit_filter::{FilterConfig, Verdict, scan_line};

/// Runs the hit stream to EOF, feeding survivors to the registry and, when
/// configured, echoing the surviving lines to the filtered-hits sink
pub fn cluster_stream(
  input: impl BufRead,
  cfg: &FilterConfig,
  registry: &mut Registry,
  mut filtered: Option<&mut dyn Write>,
) -> anyhow::Result<()> {
  for line in input.lines() {
    let line = line.context("read error on hit stream")?;
    match scan_line(&line, cfg)? {
      Verdict::Pass { a, b } => {
        if let Some(sink) = filtered.as_mut() {
          writeln!(sink, "{line}").context("write error on filtered-hits sink")?;
        }
        registry.add_pair(a, b);
      }
      Verdict::Drop => {}
    }
  }
  Ok(())
}

/// Writes every cluster in emit order, returning the cluster count and the
/// size of the largest one
pub fn write_clusters(
  registry: &Registry,
  out: &mut dyn Write,
  headers: bool,
) -> anyhow::Result<(usize, usize)> {
  let clusters = registry.enumerate();
  for (rank, members) in clusters.iter().enumerate() {
    if headers {
      writeln!(out, ">CL{}\t{}", rank + 1, members.len())?;
    }
    writeln!(out, "{}", members.join("\t"))?;
  }
  out.flush()?;
  let largest = clusters.first().map_or(0, Vec::len);
  Ok((clusters.len(), largest))
}

#[cfg(test)]
mod tests {
  use super::*;

  use std::collections::HashSet;
  use std::io::Cursor;

  use lib_hit_filter::SeqFilter;

  fn names(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  // drives the whole pipeline over in-memory buffers and returns the emitted
  // cluster output
  fn run(input: &str, cfg: &FilterConfig, registry: &mut Registry, headers: bool) -> String {
    cluster_stream(Cursor::new(input), cfg, registry, None).unwrap();
    let mut out = Vec::new();
    write_clusters(registry, &mut out, headers).unwrap();
    String::from_utf8(out).unwrap()
  }

  mod scenarios {
    use super::*;

    #[test]
    fn bare_pairs_cluster_transitively() {
      let mut registry = Registry::new();
      let out = run("A B\nB C\nD E\n", &FilterConfig::default(), &mut registry, true);
      assert_eq!(out, ">CL1\t3\nA\tB\tC\n>CL2\t2\nD\tE\n");
    }

    #[test]
    fn headers_can_be_suppressed() {
      let mut registry = Registry::new();
      let out = run("A B\nB C\nD E\n", &FilterConfig::default(), &mut registry, false);
      assert_eq!(out, "A\tB\tC\nD\tE\n");
    }

    #[test]
    fn exclusion_splits_the_chain() {
      let cfg = FilterConfig {
        exclude: names(&["C"]),
        ..FilterConfig::default()
      };
      let mut registry = Registry::new();
      let out = run("A B\nB C\nD E\n", &cfg, &mut registry, true);
      assert_eq!(out, ">CL1\t2\nA\tB\n>CL2\t2\nD\tE\n");
    }

    #[test]
    fn restrict_keeps_only_inside_pairs() {
      let cfg = FilterConfig {
        restrict: names(&["A", "B", "D"]),
        ..FilterConfig::default()
      };
      let mut registry = Registry::new();
      let out = run("A B\nB C\nD E\n", &cfg, &mut registry, true);
      assert_eq!(out, ">CL1\t2\nA\tB\n");
    }

    #[test]
    fn type_filter_drops_est_est_pairs() {
      let cfg = FilterConfig {
        seq_filter: Some(SeqFilter::EstToEt),
        ..FilterConfig::default()
      };
      let mut registry = Registry::new();
      let out = run("et|1 est|2\nest|2 est|3\net|1 et|4\n", &cfg, &mut registry, false);
      assert_eq!(out, "est|2\tet|1\tet|4\n");
    }

    #[test]
    fn numeric_thresholds_gate_tabulated_hits() {
      let line = "Q\t100\t10\t90\tH\t200\t10\t95\t95\t200\t1e-50\t+\n";
      let passing = FilterConfig {
        tabulated: true,
        thresholds: lib_hit_filter::Thresholds {
          min_scov: 80,
          min_ovl: 50,
          ..Default::default()
        },
        ..FilterConfig::default()
      };
      let mut registry = Registry::new();
      assert_eq!(run(line, &passing, &mut registry, true), ">CL1\t2\nH\tQ\n");

      let rejecting = FilterConfig {
        tabulated: true,
        thresholds: lib_hit_filter::Thresholds {
          min_scov: 80,
          min_ovl: 50,
          min_lcov: 50,
          ..Default::default()
        },
        ..FilterConfig::default()
      };
      let mut registry = Registry::new();
      assert_eq!(run(line, &rejecting, &mut registry, true), "");
    }

    #[test]
    fn clone_seed_extends_through_pairs() {
      let mut registry = Registry::new();
      registry.seed_clone(["X", "Y", "Z"]);
      let out = run("Z W\n", &FilterConfig::default(), &mut registry, true);
      assert_eq!(out, ">CL1\t4\nW\tX\tY\tZ\n");
    }

    #[test]
    fn empty_stream_emits_nothing() {
      let mut registry = Registry::new();
      let out = run("", &FilterConfig::default(), &mut registry, true);
      assert_eq!(out, "");
    }
  }

  mod behavior {
    use super::*;

    #[test]
    fn surviving_lines_echo_verbatim() {
      let cfg = FilterConfig {
        exclude: names(&["C"]),
        ..FilterConfig::default()
      };
      let mut registry = Registry::new();
      let mut echoed = Vec::new();
      cluster_stream(
        Cursor::new("A B\nB C\nD  E\n"),
        &cfg,
        &mut registry,
        Some(&mut echoed),
      )
      .unwrap();
      // dropped lines vanish, kept lines keep their exact spacing
      assert_eq!(String::from_utf8(echoed).unwrap(), "A B\nD  E\n");
    }

    #[test]
    fn framing_error_aborts_the_stream() {
      let mut registry = Registry::new();
      let result = cluster_stream(
        Cursor::new("A B\nA B C\n"),
        &FilterConfig::default(),
        &mut registry,
        None,
      );
      assert!(result.is_err());
    }

    #[test]
    fn malformed_tab_line_aborts_the_stream() {
      let cfg = FilterConfig {
        tabulated: true,
        ..FilterConfig::default()
      };
      let mut registry = Registry::new();
      let result = cluster_stream(
        Cursor::new("Q\t100\t50\t50\tH\t200\t10\t95\t95\t200\t0\t+\n"),
        &cfg,
        &mut registry,
        None,
      );
      assert!(result.is_err());
    }

    #[test]
    fn shuffled_input_emits_identical_output() {
      let forward = "A B\nB C\nD E\nC D\nF G\n";
      let shuffled = "F G\nC D\nB C\nD E\nA B\n";
      let mut left = Registry::new();
      let mut right = Registry::new();
      let out_left = run(forward, &FilterConfig::default(), &mut left, true);
      let out_right = run(shuffled, &FilterConfig::default(), &mut right, true);
      assert_eq!(out_left, out_right);
    }
  }
}
