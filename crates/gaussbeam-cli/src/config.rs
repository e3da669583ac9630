//! TOML configuration deserialisation for bench jobs.

use anyhow::Context;
use serde::Deserialize;

use gaussbeam_core::persist::{BenchSettings, BenchSnapshot, FitSnapshot, OpticsSnapshot};

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub bench: BenchSettings,
    pub optics: Vec<OpticsSnapshot>,
    #[serde(default)]
    pub fit: Vec<FitSnapshot>,
    #[serde(default)]
    pub tasks: TasksConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl JobConfig {
    /// Bench description held by the job.
    pub fn snapshot(&self) -> BenchSnapshot {
        BenchSnapshot {
            bench: self.bench.clone(),
            optics: self.optics.clone(),
            fits: self.fit.clone(),
        }
    }
}

/// Operations applied to the bench, in the order: fit, magic waist, local
/// optimum, cavity analysis.
#[derive(Debug, Default, Deserialize)]
pub struct TasksConfig {
    /// Index of the fit whose result replaces the input beam.
    #[serde(default)]
    pub apply_fit: Option<usize>,
    #[serde(default)]
    pub magic_waist: bool,
    #[serde(default)]
    pub local_optimum: bool,
    /// Random placements tried by the magic waist search.
    #[serde(default)]
    pub trials: Option<usize>,
    /// Seed of the magic waist search. Unseeded runs use the thread RNG.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub cavity: Option<CavityConfig>,
}

/// Cavity made of bench elements.
#[derive(Debug, Deserialize)]
pub struct CavityConfig {
    /// Element indices, in round-trip order.
    pub members: Vec<usize>,
    /// Free space closing the loop from the last member back to the first (m).
    #[serde(default)]
    pub closing_free_space: f64,
    /// Member after which the eigenmode is reported.
    #[serde(default)]
    pub eigen_index: usize,
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to save the beam table as CSV (default: true).
    #[serde(default = "default_true")]
    pub beams_csv: bool,
    /// Whether to save the final bench as JSON (default: false).
    #[serde(default)]
    pub snapshot_json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            beams_csv: true,
            snapshot_json: false,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}
fn default_true() -> bool {
    true
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read job file '{}'", path.display()))?;
    parse_config(&content).with_context(|| format!("invalid job file '{}'", path.display()))
}

/// Parse a TOML job description.
pub fn parse_config(content: &str) -> anyhow::Result<JobConfig> {
    let config: JobConfig = toml::from_str(content)?;
    if config.optics.is_empty() {
        anyhow::bail!("a job needs at least one [[optics]] entry, starting with the beam source");
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaussbeam_core::persist::OpticsParams;
    use gaussbeam_core::{FitDataType, Orientation};

    const JOB: &str = r#"
        [bench]
        wavelength = 780e-9

        [bench.target]
        waist = 100e-6
        waist_position = 0.5
        overlap = 0.9

        [[optics]]
        type = "create_beam"
        name = "w0"
        waist = 180e-6
        waist_position = 0.01
        absolute_lock = true

        [[optics]]
        type = "lens"
        name = "L1"
        position = 0.2
        focal = 0.1

        [[optics]]
        type = "curved_mirror"
        name = "R1"
        position = 0.4
        angle = 3.141592653589793
        curvature_radius = 0.25
        parent = 1

        [[fit]]
        name = "Fit1"
        data_type = "fwhm"
        data = [{ position = 0.0, value = 2.1e-4 }, { position = 0.1, value = 2.3e-4 }]

        [tasks]
        magic_waist = true
        seed = 7
        cavity = { members = [1, 2], closing_free_space = 0.2 }
    "#;

    #[test]
    fn test_parse_full_job() {
        let job = parse_config(JOB).unwrap();
        assert_eq!(job.bench.wavelength, 780e-9);
        assert_eq!(job.bench.left_boundary, -0.1);
        assert_eq!(job.bench.target.overlap, 0.9);
        assert_eq!(job.bench.target.orientation, Orientation::Spherical);

        assert_eq!(job.optics.len(), 3);
        assert!(job.optics[0].absolute_lock);
        assert!(matches!(job.optics[1].params, OpticsParams::Lens { focal } if focal == 0.1));
        assert_eq!(job.optics[2].parent, Some(1));

        assert_eq!(job.fit[0].data_type, FitDataType::Fwhm);
        assert_eq!(job.fit[0].data.len(), 2);

        assert!(job.tasks.magic_waist);
        assert!(!job.tasks.local_optimum);
        assert_eq!(job.tasks.seed, Some(7));
        let cavity = job.tasks.cavity.as_ref().unwrap();
        assert_eq!(cavity.members, vec![1, 2]);
        assert_eq!(cavity.eigen_index, 0);

        assert_eq!(job.output.directory, "./output");
        assert!(job.output.beams_csv);
        assert!(!job.output.snapshot_json);
    }

    #[test]
    fn test_minimal_job_uses_defaults() {
        let job = parse_config(
            r#"
            [[optics]]
            type = "create_beam"
            waist = 1e-4
            waist_position = 0.0
            "#,
        )
        .unwrap();
        assert_eq!(job.bench, BenchSettings::default());
        assert!(job.fit.is_empty());
        assert!(job.tasks.cavity.is_none());
        assert_eq!(job.snapshot().optics.len(), 1);
    }

    #[test]
    fn test_demo_job_parses() {
        let job = parse_config(include_str!("../../../demos/lens_pair.toml")).unwrap();
        assert_eq!(job.optics.len(), 3);
        assert_eq!(job.fit[0].data_type, FitDataType::Diameter);
        assert_eq!(job.tasks.apply_fit, Some(0));
        assert_eq!(job.tasks.trials, Some(100_000));
        assert!(job.output.snapshot_json);
    }

    #[test]
    fn test_job_without_optics_rejected() {
        assert!(parse_config("[bench]\nwavelength = 1e-6\n").is_err());
        assert!(parse_config("[[optics]]\ntype = \"prism\"\n").is_err());
    }
}
