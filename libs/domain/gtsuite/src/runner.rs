use std::{path::PathBuf, time::Instant};

use anyhow::{ensure, Context};
use gtautodiff::{Handle, Tensor};
use gtgguf::GgufWriter;
use gtgraph::DotBuilder;

use crate::{Executable, Registry, RunConfig};

const ARCHITECTURE: &str = "gradient-tracer";

// -----------------------------------------------------------------------------
// ExperimentResult
// StoredExperiment
// -----------------------------------------------------------------------------
#[derive(Debug, Clone)]
pub struct ExperimentResult {
    /// Qualified name, e.g. `TS_0001_UC_0001.simple_multiplication`
    pub name: String,
    pub description: String,
    pub test_suite: String,
    pub use_case: String,
    pub inputs: Vec<Tensor>,
    /// `None` if the experiment failed
    pub result: Option<Tensor>,
    pub execution_time_ms: f64,
    pub success: bool,
    pub error: Option<String>,
}

impl ExperimentResult {
    /// Name of the operation which produced the result, e.g. `Mul`.
    pub fn operation(&self) -> Option<String> {
        let func = self.result.as_ref()?.grad_fn()?;
        Some(gtgraph::op_label(&func.kind()).to_string())
    }
}

/// Files written for an experiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredExperiment {
    pub name: String,
    pub gguf: PathBuf,
    pub rendering: Option<PathBuf>,
}

// -----------------------------------------------------------------------------
// functions
// -----------------------------------------------------------------------------
/// Run a single experiment. Failures are captured in the result.
pub fn execute_one(exec: &Executable) -> ExperimentResult {
    let name = exec.qualified_name();
    log::info!("Executing {name}");
    let start = Instant::now();
    let outcome = (exec.func)();
    let execution_time_ms = start.elapsed().as_secs_f64() * 1e3;

    let (inputs, result, error) = match outcome {
        Ok(outcome) => (outcome.inputs, Some(outcome.result), None),
        Err(e) => {
            log::warn!("Experiment {name} failed: {e:#}");
            (Vec::new(), None, Some(format!("{e:#}")))
        }
    };
    ExperimentResult {
        name,
        description: exec.description.clone(),
        test_suite: exec.test_suite.clone(),
        use_case: exec.use_case.clone(),
        inputs,
        success: result.is_some(),
        result,
        execution_time_ms,
        error,
    }
}

/// Run every experiment of `registry` in registration order.
pub fn execute(registry: &Registry) -> Vec<ExperimentResult> {
    registry.iter().map(execute_one).collect()
}

/// Write `<outdir>/<test suite>/<name>.gguf` and, if configured, the rendering
/// `<outdir>/<test suite>/<use case>_<name>.<format>`.
///
/// A rendering is produced only for successful experiments.
pub fn store(result: &ExperimentResult, config: &RunConfig) -> anyhow::Result<StoredExperiment> {
    let ts_dir = config.outdir.join(&result.test_suite);
    std::fs::create_dir_all(&ts_dir)
        .with_context(|| format!("Failed to create directory {:?}", ts_dir))?;

    let mut writer = GgufWriter::new(ARCHITECTURE);
    writer
        .add_description(&result.description)
        .add_name(&result.operation().unwrap_or_else(|| result.name.clone()))
        .add_string("experiment.test_suite", &result.test_suite)
        .add_string("experiment.use_case", &result.use_case)
        .add_value("execution.time_ms", result.execution_time_ms)
        .add_bool("execution.success", result.success);
    if let Some(error) = &result.error {
        writer.add_string("execution.error", error);
    }
    for (i, input) in result.inputs.iter().enumerate() {
        writer.add_tensor(&format!("input_{i}"), &input.shape(), &input.data())?;
    }
    if let Some(tensor) = &result.result {
        writer.add_tensor("result", &tensor.shape(), &tensor.data())?;
    }
    let gguf = ts_dir.join(format!("{}.gguf", result.name));
    writer
        .write(&gguf)
        .with_context(|| format!("Failed to write {:?}", gguf))?;
    log::info!("Experiment {} stored in {:?}", result.name, gguf);

    let rendering = match (&result.result, config.generate_dot) {
        (Some(tensor), true) => {
            let graph = gtgraph::trace(&Handle::from(tensor));
            let base = ts_dir.join(format!("{}_{}", result.use_case, result.name));
            let path = DotBuilder::new(&graph)
                .with_rankdir(config.rankdir)
                .with_precision(config.precision)
                .render(&base, config.format)
                .with_context(|| format!("Failed to render the graph of {}", result.name))?;
            log::info!("Graph of {} rendered to {:?}", result.name, path);
            Some(path)
        }
        _ => None,
    };

    Ok(StoredExperiment {
        name: result.name.clone(),
        gguf,
        rendering,
    })
}

/// Run every experiment of `registry` and store the results.
///
/// A failure to store one experiment does not prevent storing the others.
/// Failures are reported together once every experiment has been handled.
pub fn exec_and_store(
    registry: &Registry,
    config: &RunConfig,
) -> anyhow::Result<Vec<StoredExperiment>> {
    let mut stored = Vec::new();
    let mut errors = Vec::new();
    for result in execute(registry) {
        match store(&result, config) {
            Ok(s) => stored.push(s),
            Err(e) => {
                log::error!("Failed to store {}: {e:#}", result.name);
                errors.push(format!("{}: {e:#}", result.name));
            }
        }
    }
    ensure!(
        errors.is_empty(),
        "Failed to store {} of {} experiments\n{}",
        errors.len(),
        errors.len() + stored.len(),
        errors.join("\n")
    );
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use gtgguf::GgufReader;
    use gtgraph::Format;

    use crate::Outcome;

    use super::*;

    fn temp_outdir(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("gtsuite_{name}_{}_{nanos}", std::process::id()))
    }

    fn failing() -> anyhow::Result<Outcome> {
        anyhow::bail!("shape check failed")
    }

    #[test]
    fn test_execute() {
        let registry = Registry::builtin().unwrap();

        let results = execute(&registry);

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.success && r.error.is_none()));
        let mul = &results[1];
        assert_eq!(mul.name, "TS_0001_UC_0001.simple_multiplication");
        assert_eq!(mul.test_suite, "TS-0001");
        assert_eq!(mul.use_case, "UC-0001");
        assert_eq!(mul.inputs.len(), 2);
        assert_eq!(mul.operation(), Some("Mul".to_string()));
    }

    #[test]
    fn test_execute_failure() {
        let mut registry = Registry::new();
        registry
            .register("TS-0002", "UC-0001", "failing", "always fails", failing)
            .unwrap();

        let results = execute(&registry);

        assert!(!results[0].success);
        assert!(results[0].result.is_none());
        assert_eq!(results[0].error.as_deref(), Some("shape check failed"));
    }

    #[test]
    fn test_exec_and_store() {
        let outdir = temp_outdir("exec_and_store");
        let config = RunConfig {
            outdir: outdir.clone(),
            generate_dot: true,
            format: Format::Dot,
            ..Default::default()
        };
        let registry = Registry::builtin().unwrap();

        let stored = exec_and_store(&registry, &config).unwrap();

        assert_eq!(stored.len(), 3);
        let mul = &stored[1];
        assert_eq!(
            mul.gguf,
            outdir.join("TS-0001/TS_0001_UC_0001.simple_multiplication.gguf")
        );
        assert_eq!(
            mul.rendering,
            Some(outdir.join("TS-0001/UC-0001_TS_0001_UC_0001.simple_multiplication.dot"))
        );

        let reader = GgufReader::open(&mul.gguf).unwrap();
        assert_eq!(reader.description(), Some("simple multiplication"));
        assert_eq!(reader.name(), Some("Mul"));
        assert_eq!(reader.get_string("experiment.test_suite"), Some("TS-0001"));
        assert_eq!(reader.tensor("input_0").unwrap().data, vec![3.0]);
        assert_eq!(reader.tensor("input_1").unwrap().data, vec![2.0]);
        assert_eq!(reader.tensor("result").unwrap().data, vec![6.0]);

        let dot = std::fs::read_to_string(mul.rendering.as_ref().unwrap()).unwrap();
        assert!(dot.contains("\"v0/Mul\" -> \"v0\";"));
        assert!(dot.contains("{ data 3.0000 | grad 2.0000 }"));

        let relu = GgufReader::open(&stored[0].gguf).unwrap();
        let result = relu.tensor("result").unwrap();
        assert_eq!(result.shape, vec![1]);
        assert_abs_diff_eq!(result.data[0] as f64, -20.0, epsilon = 1e-6);

        std::fs::remove_dir_all(&outdir).unwrap();
    }

    fn constant() -> anyhow::Result<Outcome> {
        let x = Tensor::scalar(1.5);
        Ok(Outcome {
            inputs: vec![x.clone()],
            result: x,
        })
    }

    #[test]
    fn test_exec_and_store_continues_after_error() {
        let outdir = temp_outdir("store_continues");
        std::fs::create_dir_all(&outdir).unwrap();
        // a file in place of the suite directory
        std::fs::write(outdir.join("TS-0002"), "").unwrap();
        let config = RunConfig {
            outdir: outdir.clone(),
            ..Default::default()
        };
        let mut registry = Registry::new();
        registry
            .register("TS-0002", "UC-0001", "blocked", "cannot be stored", constant)
            .unwrap()
            .register("TS-0003", "UC-0001", "stored", "stored anyway", constant)
            .unwrap();

        let err = exec_and_store(&registry, &config).unwrap_err();

        let message = format!("{err:#}");
        assert!(message.contains("Failed to store 1 of 2 experiments"));
        assert!(message.contains("TS_0002_UC_0001.blocked"));
        let reader =
            GgufReader::open(outdir.join("TS-0003/TS_0003_UC_0001.stored.gguf")).unwrap();
        assert_eq!(reader.description(), Some("stored anyway"));
        assert_eq!(reader.tensor("result").unwrap().data, vec![1.5]);
        std::fs::remove_dir_all(&outdir).unwrap();
    }

    #[test]
    fn test_store_failure_without_rendering() {
        let outdir = temp_outdir("store_failure");
        let config = RunConfig {
            outdir: outdir.clone(),
            generate_dot: true,
            format: Format::Dot,
            ..Default::default()
        };
        let mut registry = Registry::new();
        registry
            .register("TS-0002", "UC-0001", "failing", "always fails", failing)
            .unwrap();
        let result = execute_one(registry.iter().next().unwrap());

        let stored = store(&result, &config).unwrap();

        assert_eq!(stored.rendering, None);
        let reader = GgufReader::open(&stored.gguf).unwrap();
        assert_eq!(reader.get("execution.success"), Some(&gtgguf::Value::Bool(false)));
        assert_eq!(reader.get_string("execution.error"), Some("shape check failed"));
        assert!(reader.tensor_infos().is_empty());
        std::fs::remove_dir_all(&outdir).unwrap();
    }
}
