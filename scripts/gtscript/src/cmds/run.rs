use std::path::PathBuf;

use anyhow::Context;
use gtgraph::{Format, RankDir};
use gtsuite::{Registry, RunConfig};

use super::Cmd;

// -----------------------------------------------------------------------------
// Args
// -----------------------------------------------------------------------------
#[derive(Debug, clap::Args)]
pub struct Args {
    /// Output directory. One sub-directory is created per test suite
    #[clap(short, long)]
    pub outdir: Option<PathBuf>,

    /// Render the traced graph of every successful experiment
    #[clap(long)]
    pub dot: bool,

    /// Layout direction of renderings: TB or LR
    #[clap(long, value_parser = RankDir::parse)]
    pub rankdir: Option<RankDir>,

    /// Format of renderings: dot, svg, png or pdf
    #[clap(short, long, value_parser = Format::parse)]
    pub format: Option<Format>,

    /// Decimals of values and gradients in renderings
    #[clap(short, long)]
    pub precision: Option<usize>,

    /// JSON or YAML file with default settings. Command-line options override it
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Run only the experiment with this name
    #[clap(short, long)]
    pub name: Option<String>,
}

impl Args {
    /// Settings from the config file with command-line overrides applied.
    pub fn config(&self) -> anyhow::Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };
        if let Some(outdir) = &self.outdir {
            config.outdir = outdir.clone();
        }
        if self.dot {
            config.generate_dot = true;
        }
        if let Some(rankdir) = self.rankdir {
            config.rankdir = rankdir;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(precision) = self.precision {
            config.precision = precision;
        }
        Ok(config)
    }
}

impl Cmd for Args {
    fn run(&self) -> anyhow::Result<()> {
        let config = self.config()?;
        log::info!("{:?}", config);
        let registry = Registry::builtin()?;

        let results = match &self.name {
            Some(name) => {
                let exec = registry
                    .find(name)
                    .with_context(|| format!("Unknown experiment '{name}'"))?;
                vec![gtsuite::execute_one(exec)]
            }
            None => gtsuite::execute(&registry),
        };

        let mut failures = 0;
        for result in &results {
            let stored = match gtsuite::store(result, &config) {
                Ok(stored) => stored,
                Err(e) => {
                    println!("{:>6} {} not stored: {e:#}", "ERROR", result.name);
                    failures += 1;
                    continue;
                }
            };
            let status = if result.success { "ok" } else { "FAILED" };
            println!(
                "{status:>6} {} ({:.3} ms) -> {}",
                result.name,
                result.execution_time_ms,
                stored.gguf.display()
            );
            if let Some(rendering) = &stored.rendering {
                println!("{:>6} {}", "", rendering.display());
            }
            if let Some(error) = &result.error {
                println!("{:>6} {error}", "");
                failures += 1;
            }
        }
        anyhow::ensure!(
            failures == 0,
            "{failures} of {} experiments failed or were not stored",
            results.len()
        );
        Ok(())
    }
}
