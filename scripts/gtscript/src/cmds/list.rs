use gtsuite::Registry;

use super::Cmd;

#[derive(Debug, clap::Args)]
pub struct Args {}

impl Cmd for Args {
    fn run(&self) -> anyhow::Result<()> {
        let registry = Registry::builtin()?;
        for exec in registry.iter() {
            println!("{}\t{}", exec.qualified_name(), exec.description);
        }
        Ok(())
    }
}
