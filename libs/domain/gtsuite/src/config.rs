use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use gtgraph::{Format, RankDir};

// -----------------------------------------------------------------------------
// RunConfig
// -----------------------------------------------------------------------------
/// Settings of an experiment run.
///
/// Every field is optional in a configuration file.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Directory receiving one sub-directory per test suite
    pub outdir: PathBuf,
    /// Render the traced computation of every experiment
    pub generate_dot: bool,
    pub rankdir: RankDir,
    pub format: Format,
    /// Decimals of values and gradients in renderings
    pub precision: usize,
}

impl Default for RunConfig {
    #[inline]
    fn default() -> Self {
        Self {
            outdir: PathBuf::from("out"),
            generate_dot: false,
            rankdir: RankDir::default(),
            format: Format::default(),
            precision: 4,
        }
    }
}

impl RunConfig {
    /// Load a configuration file. The format is chosen by the extension:
    /// `.json`, `.yaml` or `.yml`.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let config = match ext {
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON config {:?}", path))?,
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML config {:?}", path))?,
            _ => bail!("Unsupported config file {:?}. Expected .json, .yaml or .yml", path),
        };
        log::info!("Config loaded from {:?}", path);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gtsuite_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[rstest]
    #[case("partial.json", r#"{"generate_dot": true, "rankdir": "TB"}"#)]
    #[case("partial.yaml", "generate_dot: true\nrankdir: TB\n")]
    fn test_load_partial(#[case] name: &str, #[case] content: &str) {
        let path = write_temp(name, content);

        let config = RunConfig::load(&path).unwrap();

        assert_eq!(
            config,
            RunConfig {
                generate_dot: true,
                rankdir: RankDir::TopBottom,
                ..Default::default()
            }
        );
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_load_full_yaml() {
        let content = "outdir: results\ngenerate_dot: true\nrankdir: LR\nformat: dot\nprecision: 2\n";
        let path = write_temp("full.yml", content);

        let config = RunConfig::load(&path).unwrap();

        assert_eq!(config.outdir, PathBuf::from("results"));
        assert_eq!(config.format, Format::Dot);
        assert_eq!(config.precision, 2);
        std::fs::remove_file(path).unwrap();
    }

    #[rstest]
    #[case("bad_rankdir.json", r#"{"rankdir": "DIAGONAL"}"#)]
    #[case("bad_format.json", r#"{"format": "bmp"}"#)]
    #[case("unknown.json", r#"{"verbose": true}"#)]
    #[case("config.toml", "generate_dot = true")]
    fn test_load_rejected(#[case] name: &str, #[case] content: &str) {
        let path = write_temp(name, content);

        let res = RunConfig::load(&path);

        assert!(res.is_err());
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join("gtsuite_config_missing.json");

        assert!(RunConfig::load(path).is_err());
    }
}
