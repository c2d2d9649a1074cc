use anyhow::ensure;
use gtautodiff::Tensor;

use crate::cases;

// -----------------------------------------------------------------------------
// Outcome
// Executable
// -----------------------------------------------------------------------------
/// Tensors produced by an experiment.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub inputs: Vec<Tensor>,
    pub result: Tensor,
}

pub type ExecFn = fn() -> anyhow::Result<Outcome>;

#[derive(Debug, Clone)]
pub struct Executable {
    /// Test suite, e.g. `TS-0001`
    pub test_suite: String,
    /// Use case, e.g. `UC-0001`
    pub use_case: String,
    /// Function name, e.g. `simple_multiplication`
    pub name: String,
    pub description: String,
    pub func: ExecFn,
}

impl Executable {
    /// Name qualified by suite and use case, e.g.
    /// `TS_0001_UC_0001.simple_multiplication`.
    #[inline]
    pub fn qualified_name(&self) -> String {
        format!(
            "{}_{}.{}",
            self.test_suite.replace('-', "_"),
            self.use_case.replace('-', "_"),
            self.name
        )
    }
}

// -----------------------------------------------------------------------------
// Registry
// -----------------------------------------------------------------------------
/// Executables in registration order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    executables: Vec<Executable>,
}

impl Registry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every experiment shipped with this crate.
    pub fn builtin() -> anyhow::Result<Self> {
        let mut registry = Self::new();
        cases::register(&mut registry)?;
        Ok(registry)
    }
}

//
// methods
//
impl Registry {
    pub fn register(
        &mut self,
        test_suite: &str,
        use_case: &str,
        name: &str,
        description: &str,
        func: ExecFn,
    ) -> anyhow::Result<&mut Self> {
        ensure!(
            _is_id(test_suite, "TS-"),
            "Test suite '{test_suite}' must look like 'TS-0001'"
        );
        ensure!(
            _is_id(use_case, "UC-"),
            "Use case '{use_case}' must look like 'UC-0001'"
        );
        ensure!(
            !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
            "Experiment name '{name}' must be a non-empty identifier"
        );
        let exec = Executable {
            test_suite: test_suite.to_string(),
            use_case: use_case.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            func,
        };
        ensure!(
            self.find(&exec.qualified_name()).is_none(),
            "Experiment '{}' is already registered",
            exec.qualified_name()
        );
        log::debug!("Registered {}", exec.qualified_name());
        self.executables.push(exec);
        Ok(self)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Executable> {
        self.executables.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.executables.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.executables.is_empty()
    }

    /// Find an executable by its qualified name or by its bare name.
    pub fn find(&self, name: &str) -> Option<&Executable> {
        self.executables
            .iter()
            .find(|e| e.qualified_name() == name)
            .or_else(|| {
                let mut found = self.executables.iter().filter(|e| e.name == name);
                // bare names are accepted only when unambiguous
                match (found.next(), found.next()) {
                    (Some(e), None) => Some(e),
                    _ => None,
                }
            })
    }
}

#[inline]
fn _is_id(s: &str, prefix: &str) -> bool {
    s.strip_prefix(prefix)
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}
