use std::path::PathBuf;

use super::Cmd;

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Directory searched recursively for .gguf files
    #[clap(default_value = "out")]
    pub dir: PathBuf,
}

impl Cmd for Args {
    fn run(&self) -> anyhow::Result<()> {
        let references = gtsuite::references::iterate_gguf_files(&self.dir)?;
        if references.is_empty() {
            log::warn!("No gguf file found under {:?}", self.dir);
        }
        for reference in references {
            print!("{reference}");
        }
        Ok(())
    }
}
