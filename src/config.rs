//! Compiler configuration.
//!
//! [`CompileOptions`] is what the driver consumes. [`ConfigLoader`] resolves
//! options from a YAML file so callers (CLI wrappers, build scripts) do not have
//! to construct them by hand.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Environment variable naming an options file
pub const CONFIG_ENV_VAR: &str = "EDL_COMPILER_CONFIG";

/// How lint findings affect `CompileResult::success`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LintPolicy {
    /// Every lint finding is reported as a warning.
    #[default]
    Advisory,
    /// Error-severity findings of critical rules become errors.
    CriticalFatal,
    /// Every error-severity finding becomes an error.
    AllFatal,
}

/// Options for one compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompileOptions {
    /// Directory receiving `<exchange-id>.ts`; `None` returns code only.
    pub output_dir: Option<PathBuf>,
    /// Stop after analysis.
    pub validate_only: bool,
    /// Emit JSDoc and source comments as annotations.
    pub include_comments: bool,
    /// Promote per-stage summaries from `debug` to `info`.
    pub verbose: bool,
    /// Run the linter.
    pub lint: bool,
    pub lint_policy: LintPolicy,
    /// Class the generated exchange extends.
    pub base_class: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            output_dir: None,
            validate_only: false,
            include_comments: true,
            verbose: false,
            lint: true,
            lint_policy: LintPolicy::Advisory,
            base_class: "Exchange".to_string(),
        }
    }
}

impl CompileOptions {
    /// Validation-only options (no generation, no lint).
    pub fn validate_only() -> Self {
        Self {
            validate_only: true,
            lint: false,
            ..Default::default()
        }
    }

    /// Lint findings of critical rules fail the compilation.
    pub fn strict() -> Self {
        Self {
            lint: true,
            lint_policy: LintPolicy::CriticalFatal,
            ..Default::default()
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }
}

/// Loads [`CompileOptions`] from YAML.
pub struct ConfigLoader {
    path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Create loader from the EDL_COMPILER_CONFIG env var; unset means defaults
    pub fn from_env() -> Self {
        Self {
            path: std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load options; a missing file yields defaults, a malformed one is an error
    pub fn load(&self) -> Result<CompileOptions> {
        let Some(path) = &self.path else {
            return Ok(CompileOptions::default());
        };
        if !path.exists() {
            info!("No compiler config at {}, using defaults", path.display());
            return Ok(CompileOptions::default());
        }

        info!("Loading compiler configuration from {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let options: CompileOptions = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let options = CompileOptions::default();
        assert!(!options.validate_only);
        assert!(options.lint);
        assert_eq!(options.lint_policy, LintPolicy::Advisory);
        assert_eq!(options.base_class, "Exchange");
    }

    #[test]
    fn strict_config() {
        assert_eq!(CompileOptions::strict().lint_policy, LintPolicy::CriticalFatal);
        assert!(CompileOptions::validate_only().validate_only);
    }

    #[test]
    fn loader_reads_partial_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "validateOnly: true\nlintPolicy: all_fatal\nbaseClass: BaseExchange").unwrap();

        let options = ConfigLoader::new(file.path()).load().unwrap();
        assert!(options.validate_only);
        assert_eq!(options.lint_policy, LintPolicy::AllFatal);
        assert_eq!(options.base_class, "BaseExchange");
        assert!(options.include_comments);
    }

    #[test]
    fn loader_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let options = ConfigLoader::new(dir.path().join("absent.yaml"))
            .load()
            .unwrap();
        assert_eq!(options, CompileOptions::default());
    }

    #[test]
    fn loader_rejects_malformed_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "validateOnly: [not, a, bool]").unwrap();
        let err = ConfigLoader::new(file.path()).load().unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
