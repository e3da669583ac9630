//! Job runner: builds the bench and applies the configured tasks.

use std::path::Path;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

use gaussbeam_core::{Beam, OpticsBench, OpticsType, Orientation};

use crate::config::{CavityConfig, JobConfig};

/// Results from a job run.
pub struct JobOutput {
    pub bench: OpticsBench,
    pub fit_residue: Option<f64>,
    pub magic_waist: Option<bool>,
    pub local_optimum: Option<bool>,
    pub cavity: Option<CavityReport>,
}

/// Stability and eigenmode of a cavity task.
#[derive(Debug)]
pub struct CavityReport {
    pub delta_horizontal: f64,
    pub delta_vertical: f64,
    pub stable: bool,
    pub eigen_beam: Option<Beam>,
}

/// Rebuild the bench described by a job.
pub fn build_bench(job: &JobConfig) -> Result<OpticsBench> {
    OpticsBench::from_snapshot(&job.snapshot()).context("invalid bench description")
}

/// Run every task of a parsed job configuration.
pub fn run_job(job: &JobConfig) -> Result<JobOutput> {
    let mut bench = build_bench(job)?;
    println!(
        "Bench: {} elements, {} fits, λ = {:.1} nm",
        bench.n_optics(),
        bench.n_fits(),
        bench.wavelength() * 1e9
    );

    let fit_residue = match job.tasks.apply_fit {
        Some(index) => Some(apply_fit(&mut bench, index)?),
        None => None,
    };

    if let Some(trials) = job.tasks.trials {
        bench.set_magic_waist_trials(trials);
    }

    let magic_waist = job.tasks.magic_waist.then(|| {
        let found = match job.tasks.seed {
            Some(seed) => bench.magic_waist_with_rng(&mut StdRng::seed_from_u64(seed)),
            None => bench.magic_waist(),
        };
        println!(
            "Magic waist: {} (overlap {:.5})",
            if found { "found" } else { "no solution" },
            output_overlap(&bench)
        );
        found
    });

    let local_optimum = job.tasks.local_optimum.then(|| {
        let improved = bench.local_optimum();
        println!(
            "Local optimum: {} (overlap {:.5})",
            if improved { "converged" } else { "not reached" },
            output_overlap(&bench)
        );
        improved
    });

    let cavity = match &job.tasks.cavity {
        Some(config) => Some(analyse_cavity(&bench, config)?),
        None => None,
    };

    Ok(JobOutput {
        bench,
        fit_residue,
        magic_waist,
        local_optimum,
        cavity,
    })
}

/// Replace the input beam waist by the result of fit `index`.
fn apply_fit(bench: &mut OpticsBench, index: usize) -> Result<f64> {
    let fit = bench
        .fit(index)
        .with_context(|| format!("fit {} does not exist ({} fits)", index, bench.n_fits()))?;
    let mut beam = bench.beam(0).context("bench has no beam source")?.clone();
    let residue = fit.apply_fit(&mut beam);
    println!(
        "Fit '{}': waist {:.3e} m at {:.4} m, residue {:.3e}",
        fit.name(),
        beam.waist(Orientation::Horizontal),
        beam.waist_position(Orientation::Horizontal),
        residue
    );
    bench.set_input_beam(beam);
    Ok(residue)
}

fn analyse_cavity(bench: &OpticsBench, config: &CavityConfig) -> Result<CavityReport> {
    if let Some(&bad) = config.members.iter().find(|&&i| i >= bench.n_optics()) {
        anyhow::bail!("cavity member {} does not exist ({} elements)", bad, bench.n_optics());
    }
    let cavity = bench.cavity(&config.members, config.closing_free_space);
    if cavity.len() != config.members.len() {
        anyhow::bail!("cavity members must be distinct ABCD elements");
    }

    let report = CavityReport {
        delta_horizontal: cavity.delta(Orientation::Horizontal),
        delta_vertical: cavity.delta(Orientation::Vertical),
        stable: cavity.is_stable(),
        eigen_beam: cavity.eigen_beam(bench.wavelength(), config.eigen_index),
    };
    println!(
        "Cavity: {} (δ_h = {:.4e}, δ_v = {:.4e})",
        if report.stable { "stable" } else { "unstable" },
        report.delta_horizontal,
        report.delta_vertical
    );
    if let Some(beam) = &report.eigen_beam {
        println!("  eigenmode: {}", beam);
    }
    Ok(report)
}

fn output_overlap(bench: &OpticsBench) -> f64 {
    bench
        .beams()
        .last()
        .map_or(0.0, |beam| Beam::mode_overlap(bench.target_beam(), beam))
}

/// Tag used for an element type in job files.
pub fn type_tag(optics_type: OpticsType) -> &'static str {
    match optics_type {
        OpticsType::CreateBeam => "create_beam",
        OpticsType::FreeSpace => "free_space",
        OpticsType::Lens => "lens",
        OpticsType::FlatMirror => "flat_mirror",
        OpticsType::CurvedMirror => "curved_mirror",
        OpticsType::FlatInterface => "flat_interface",
        OpticsType::CurvedInterface => "curved_interface",
        OpticsType::DielectricSlab => "dielectric_slab",
        OpticsType::GenericAbcd => "generic_abcd",
    }
}

/// Type-specific fields of an element type in job files.
pub fn type_fields(optics_type: OpticsType) -> &'static str {
    match optics_type {
        OpticsType::CreateBeam => "waist, waist_position, [waist_vertical, waist_position_vertical, index, m2]",
        OpticsType::FreeSpace => "width",
        OpticsType::Lens => "focal",
        OpticsType::FlatMirror => "-",
        OpticsType::CurvedMirror => "curvature_radius",
        OpticsType::FlatInterface => "index_ratio",
        OpticsType::CurvedInterface => "index_ratio, surface_radius",
        OpticsType::DielectricSlab => "index_ratio, width",
        OpticsType::GenericAbcd => "horizontal = [A, B, C, D], [vertical, width]",
    }
}

/// Write the beam leaving every element to a CSV file with a metadata header.
pub fn write_beams_csv(bench: &OpticsBench, path: &Path, job: &JobConfig) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("cannot create '{}'", path.display()))?;

    writeln!(file, "# gaussbeam beam table")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(file, "# wavelength_m: {:e}", bench.wavelength())?;
    writeln!(
        file,
        "# boundaries_m: [{}, {}]",
        bench.left_boundary(),
        bench.right_boundary()
    )?;
    let target = &job.bench.target;
    writeln!(
        file,
        "# target: waist={:e} m at {} m, overlap={}",
        target.waist, target.waist_position, target.overlap
    )?;
    writeln!(file, "#")?;
    writeln!(
        file,
        "index,name,type,position_m,waist_h_m,waist_v_m,waist_position_h_m,waist_position_v_m,rayleigh_m,divergence_rad,sensitivity"
    )?;

    for (index, (optics, beam)) in bench.optics_list().iter().zip(bench.beams()).enumerate() {
        writeln!(
            file,
            "{},{},{},{:.6},{:.6e},{:.6e},{:.6},{:.6},{:.6e},{:.6e},{:.6e}",
            index,
            optics.name(),
            type_tag(optics.optics_type()),
            optics.position(),
            beam.waist(Orientation::Horizontal),
            beam.waist(Orientation::Vertical),
            beam.waist_position(Orientation::Horizontal),
            beam.waist_position(Orientation::Vertical),
            beam.rayleigh(Orientation::Horizontal),
            beam.divergence(Orientation::Horizontal),
            bench.sensitivity(index).unwrap_or(0.0),
        )?;
    }

    println!("Beam table written to: {}", path.display());
    Ok(())
}

/// Write the final bench description to a JSON file.
pub fn write_snapshot_json(bench: &OpticsBench, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(&bench.snapshot())
        .map_err(|e| anyhow::anyhow!("JSON serialisation error: {}", e))?;
    std::fs::write(path, json)?;

    println!("Bench (JSON) written to: {}", path.display());
    Ok(())
}
