use anyhow::{ensure, Context};
use clap::ValueEnum;
use gtautodiff::Handle;
use gtgraph::{DotBuilder, RankDir};
use gtsuite::Registry;

use super::Cmd;

// -----------------------------------------------------------------------------
// Output
// -----------------------------------------------------------------------------
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[clap(rename_all = "snake_case")]
pub enum Output {
    #[default]
    Text,
    Json,
    Dot,
}

// -----------------------------------------------------------------------------
// Args
// -----------------------------------------------------------------------------
#[derive(Debug, clap::Args)]
pub struct Args {
    /// Experiment name, qualified or bare
    pub name: String,

    /// Shorthand for `--output json`
    #[clap(long, conflicts_with = "output")]
    pub json: bool,

    #[clap(short, long, value_enum, default_value_t)]
    pub output: Output,

    /// Layout direction of dot output
    #[clap(long, value_parser = RankDir::parse, default_value = "LR")]
    pub rankdir: RankDir,
}

impl Cmd for Args {
    fn run(&self) -> anyhow::Result<()> {
        let registry = Registry::builtin()?;
        let exec = registry
            .find(&self.name)
            .with_context(|| format!("Unknown experiment '{}'", self.name))?;
        let result = gtsuite::execute_one(exec);
        ensure!(
            result.success,
            "Experiment {} failed: {}",
            result.name,
            result.error.as_deref().unwrap_or_default()
        );
        let tensor = result
            .result
            .as_ref()
            .with_context(|| format!("Experiment {} has no result", result.name))?;
        let graph = gtgraph::trace(&Handle::from(tensor));

        let output = if self.json { Output::Json } else { self.output };
        match output {
            Output::Text => print!("{graph}"),
            Output::Json => println!("{}", serde_json::to_string_pretty(&graph)?),
            Output::Dot => print!(
                "{}",
                DotBuilder::new(&graph).with_rankdir(self.rankdir).gen_dot()
            ),
        }
        Ok(())
    }
}
