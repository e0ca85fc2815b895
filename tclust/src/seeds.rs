use std::collections::HashSet;
use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, ensure};

use lib_cluster_kit::Registry;

// list identifiers longer than this are junk input, not sequence names
const MAX_NAME_LEN: usize = 255;

/// Loads a whitespace-separated identifier list into a set
pub fn read_names(path: &Path) -> anyhow::Result<HashSet<String>> {
  let text = fs::read_to_string(path)
    .with_context(|| format!("cannot read list file {}", path.display()))?;
  let mut names = HashSet::new();
  for token in text.split_whitespace() {
    check_name(token, path)?;
    names.insert(token.to_string());
  }
  Ok(names)
}

/// Seeds the registry from clone lines: every token on a line lands in one
/// cluster; with a restrict list active, outside tokens are skipped
pub fn read_clones(
  path: &Path,
  registry: &mut Registry,
  restrict: &HashSet<String>,
) -> anyhow::Result<()> {
  let file =
    File::open(path).with_context(|| format!("cannot open clone file {}", path.display()))?;
  for line in BufReader::new(file).lines() {
    let line = line.with_context(|| format!("read error in clone file {}", path.display()))?;
    let mut tokens = Vec::new();
    for token in line.split_whitespace() {
      check_name(token, path)?;
      if restrict.is_empty() || restrict.contains(token) {
        tokens.push(token);
      }
    }
    registry.seed_clone(tokens);
  }
  Ok(())
}

fn check_name(token: &str, path: &Path) -> anyhow::Result<()> {
  ensure!(
    token.len() <= MAX_NAME_LEN,
    "identifier longer than {MAX_NAME_LEN} bytes in {}: {}...",
    path.display(),
    token.chars().take(32).collect::<String>()
  );
  Ok(())
}
