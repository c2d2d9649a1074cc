pub mod inspect;
pub mod list;
pub mod run;
pub mod trace;

// -----------------------------------------------------------------------------
// Cmd
// -----------------------------------------------------------------------------
pub trait Cmd {
    fn run(&self) -> anyhow::Result<()>;
}

// -----------------------------------------------------------------------------
// Commands
// -----------------------------------------------------------------------------
#[derive(Debug, clap::Subcommand)]
pub enum Commands {
    /// Execute every experiment and store its tensors
    Run(run::Args),
    /// List registered experiments
    List(list::Args),
    /// Print the graph traced from an experiment's result
    Trace(trace::Args),
    /// Print the content of stored experiments
    Inspect(inspect::Args),
}

impl Cmd for Commands {
    fn run(&self) -> anyhow::Result<()> {
        match self {
            Commands::Run(args) => args.run(),
            Commands::List(args) => args.run(),
            Commands::Trace(args) => args.run(),
            Commands::Inspect(args) => args.run(),
        }
    }
}
