use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use clap::Parser;
use log::{debug, info};

use lib_cluster_kit::Registry;
use lib_hit_filter::FilterConfig;

mod args;
mod seeds;
mod stream;

use args::{Cli, Settings};

// hit streams commonly intern hundreds of thousands of names; reserving up
// front avoids rehashing storms mid-stream
const RESERVE_NAMES: usize = 1 << 19;

fn open_input(path: Option<&Path>) -> anyhow::Result<Box<dyn BufRead>> {
  match path {
    Some(path) => {
      let file =
        File::open(path).with_context(|| format!("cannot open hits file {}", path.display()))?;
      Ok(Box::new(BufReader::new(file)))
    }
    None => Ok(Box::new(BufReader::new(io::stdin()))),
  }
}

fn open_output(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
  match path {
    Some(path) => {
      let file = File::create(path)
        .with_context(|| format!("cannot create output file {}", path.display()))?;
      Ok(Box::new(BufWriter::new(file)))
    }
    None => Ok(Box::new(BufWriter::new(io::stdout()))),
  }
}

fn open_filtered(path: Option<&Path>) -> anyhow::Result<Option<Box<dyn Write>>> {
  match path {
    None => Ok(None),
    Some(path) if path.as_os_str() == "-" => Ok(Some(Box::new(io::stdout()))),
    Some(path) => {
      let file = File::create(path)
        .with_context(|| format!("cannot create filtered-hits file {}", path.display()))?;
      Ok(Some(Box::new(BufWriter::new(file))))
    }
  }
}

fn load_names(path: Option<&Path>) -> anyhow::Result<std::collections::HashSet<String>> {
  match path {
    Some(path) => seeds::read_names(path),
    None => Ok(Default::default()),
  }
}

fn main() -> Result<(), anyhow::Error> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
  let settings = Settings::from_cli(Cli::parse())?;

  let cfg = FilterConfig {
    tabulated: settings.tabulated,
    exclude: load_names(settings.exclude.as_deref())?,
    seq_only: load_names(settings.seq_only.as_deref())?,
    restrict: load_names(settings.restrict.as_deref())?,
    seq_filter: settings.seq_filter,
    thresholds: settings.thresholds,
  };

  let mut registry = Registry::with_capacity(RESERVE_NAMES);
  if let Some(path) = settings.clones.as_deref() {
    seeds::read_clones(path, &mut registry, &cfg.restrict)?;
    debug!(
      "{} clusters pre-seeded from {}",
      registry.cluster_count(),
      path.display()
    );
  }

  let input = open_input(settings.input.as_deref())?;
  let mut filtered = open_filtered(settings.filtered.as_deref())?;
  let filtered_ref: Option<&mut dyn Write> = match filtered {
    Some(ref mut sink) => Some(sink.as_mut()),
    None => None,
  };
  stream::cluster_stream(input, &cfg, &mut registry, filtered_ref)?;
  if let Some(sink) = filtered.as_mut() {
    sink.flush().context("write error on filtered-hits sink")?;
  }

  // clusters are only written once the whole stream went through, so a fatal
  // mid-stream error leaves no partial cluster output behind
  let mut out = open_output(settings.output.as_deref())?;
  let (count, largest) = stream::write_clusters(&registry, &mut out, settings.headers)?;
  info!("{count} clusters, largest holds {largest} sequences");
  Ok(())
}
