use crate::synth::SENTINEL_INPUTS;
use serde::Deserialize;
use std::path::PathBuf;

/// Upper bound for `harness.timeout-ms` (one hour).
const MAX_TIMEOUT_MS: u64 = 60 * 60 * 1000;
/// Upper bound for `evaluation.deadline-ms` (one day).
const MAX_DEADLINE_MS: u64 = 24 * 60 * 60 * 1000;

/// How a coverage sample is turned into a scalar fitness.
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ScoringMode {
    /// Diminishing-returns sum over edge hit counts.
    #[default]
    EdgeHarmonic,
    /// Longest leading match against a fixed byte signature. Coverage is
    /// still collected but ignored by the score.
    MagicPrefix { signature: String },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct EvaluationSettings {
    #[serde(default = "default_num_trials")]
    pub num_trials: u32,
    /// Worker thread count; 0 means one per available CPU.
    #[serde(default)]
    pub workers: usize,
    #[serde(default)]
    pub scoring: ScoringMode,
    /// Wall-clock budget for a whole generation in milliseconds; 0 disables it.
    #[serde(default)]
    pub deadline_ms: u64,
    #[serde(default = "default_network_inputs")]
    pub network_inputs: usize,
}

pub fn default_num_trials() -> u32 {
    16
}
pub fn default_network_inputs() -> usize {
    200
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            num_trials: default_num_trials(),
            workers: 0,
            scoring: ScoringMode::default(),
            deadline_ms: 0,
            network_inputs: default_network_inputs(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct HarnessSettings {
    #[serde(default = "default_tracer")]
    pub tracer: PathBuf,
    /// Target command template. An argument containing `@@` receives the
    /// input file path; without `@@` the input arrives on stdin.
    pub target: Vec<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,
    #[serde(default = "default_qemu_mode")]
    pub qemu_mode: bool,
    /// Directory for scratch input and report files; system default when unset.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

fn default_tracer() -> PathBuf {
    PathBuf::from("afl-showmap")
}
pub fn default_timeout_ms() -> u64 {
    10_000
}
fn default_memory_limit_mb() -> u64 {
    2000
}
fn default_qemu_mode() -> bool {
    true
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            tracer: default_tracer(),
            target: vec!["/usr/bin/identify".to_string(), "@@".to_string()],
            timeout_ms: default_timeout_ms(),
            memory_limit_mb: default_memory_limit_mb(),
            qemu_mode: default_qemu_mode(),
            temp_dir: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct DowserConfig {
    #[serde(default)]
    pub evaluation: EvaluationSettings,
    pub harness: HarnessSettings,
}

impl DowserConfig {
    pub fn load_from_file(path: &PathBuf) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;

        let config: DowserConfig = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that cannot produce a meaningful evaluation.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.harness.target.is_empty() || self.harness.target[0].is_empty() {
            return Err(anyhow::anyhow!(
                "harness.target must name the program to trace"
            ));
        }
        if self.harness.timeout_ms == 0 {
            return Err(anyhow::anyhow!("harness.timeout-ms must be at least 1"));
        }
        if self.harness.timeout_ms > MAX_TIMEOUT_MS {
            return Err(anyhow::anyhow!(
                "harness.timeout-ms must be at most {MAX_TIMEOUT_MS}"
            ));
        }
        if self.evaluation.num_trials == 0 {
            return Err(anyhow::anyhow!("evaluation.num-trials must be at least 1"));
        }
        if self.evaluation.deadline_ms > MAX_DEADLINE_MS {
            return Err(anyhow::anyhow!(
                "evaluation.deadline-ms must be at most {MAX_DEADLINE_MS}"
            ));
        }
        if self.evaluation.network_inputs <= SENTINEL_INPUTS.len() {
            return Err(anyhow::anyhow!(
                "evaluation.network-inputs must exceed the {}-value sentinel prefix",
                SENTINEL_INPUTS.len()
            ));
        }
        if let ScoringMode::MagicPrefix { signature } = &self.evaluation.scoring {
            if signature.is_empty() {
                return Err(anyhow::anyhow!(
                    "magic-prefix scoring requires a non-empty signature"
                ));
            }
        }
        Ok(())
    }
}

impl Default for DowserConfig {
    fn default() -> Self {
        Self {
            evaluation: EvaluationSettings::default(),
            harness: HarnessSettings::default(),
        }
    }
}
