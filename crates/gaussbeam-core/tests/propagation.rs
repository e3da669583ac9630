//! Integration tests for beam propagation through element chains and
//! cavities.

use std::f64::consts::PI;

use approx::{assert_abs_diff_eq, assert_relative_eq};

use gaussbeam_core::{Beam, Optics, OpticsBench, Orientation};

const S: Orientation = Orientation::Spherical;
const WAVELENGTH: f64 = 461e-9;

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn bench_with(elements: Vec<Optics>) -> OpticsBench {
    let mut bench = OpticsBench::new();
    bench.populate_default();
    for (i, optics) in elements.into_iter().enumerate() {
        bench.add_optics(optics, i + 1);
    }
    bench
}

/// Thin-lens Gaussian imaging: waist distance and size after a lens placed
/// `s` downstream of a waist `w0` with Rayleigh range `z0`.
fn thin_lens_image(w0: f64, z0: f64, s: f64, f: f64) -> (f64, f64) {
    let denom = (s - f).powi(2) + z0 * z0;
    let s_image = f + (s - f) * f * f / denom;
    let w_image = w0 * f / denom.sqrt();
    (s_image, w_image)
}

// ─────────────────────────────────────────────────────────────────────────────
// Single elements
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_lens_imaging_matches_closed_form() {
    let bench = bench_with(vec![Optics::lens(0.1, 0.2, "L1")]);
    let w0 = 180e-6;
    let z0 = PI * w0 * w0 / WAVELENGTH;
    let (s_image, w_image) = thin_lens_image(w0, z0, 0.19, 0.1);

    let beam = bench.beam(1).unwrap();
    assert_relative_eq!(beam.waist(S), w_image, max_relative = 1e-9);
    assert_abs_diff_eq!(beam.waist_position(S), 0.2 + s_image, epsilon = 1e-9);
}

#[test]
fn test_chain_antecedent_recovers_source() {
    let elements = vec![
        Optics::lens(0.08, 0.1, "L1"),
        Optics::dielectric_slab(1.5, 0.02, 0.15, "D1"),
        Optics::flat_interface(1.33, 0.2, "I1"),
        Optics::curved_interface(-0.05, 1.0 / 1.33, 0.25, "C1"),
        Optics::lens(-0.05, 0.3, "L2"),
    ];
    let bench = bench_with(elements);
    let n = bench.n_optics();

    let mut beam = bench.beam(n - 1).unwrap().clone();
    for i in (1..n).rev() {
        beam = bench.optics(i).unwrap().antecedent_of(&beam);
    }
    let source = bench.beam(0).unwrap();
    assert_relative_eq!(beam.waist(S), source.waist(S), max_relative = 1e-8);
    assert_abs_diff_eq!(beam.waist_position(S), source.waist_position(S), epsilon = 1e-9);
    assert_relative_eq!(beam.index(), 1.0, max_relative = 1e-12);
    assert_relative_eq!(bench.beam(3).unwrap().index(), 1.33, max_relative = 1e-12);
}

#[test]
fn test_cylindrical_lens_splits_axes() {
    let mut lens = Optics::lens(0.1, 0.2, "L1");
    lens.set_orientation(Orientation::Horizontal);
    let bench = bench_with(vec![lens]);
    let beam = bench.beam(1).unwrap();
    assert!(!beam.is_spherical());
    assert!(!bench.is_spherical());
    assert_relative_eq!(beam.waist(Orientation::Vertical), 180e-6, max_relative = 1e-10);
    assert!(beam.waist(Orientation::Horizontal) < 180e-6);
}

#[test]
fn test_overlap_invariant_along_chain() {
    // Two beams sent through the same optics keep their mode overlap
    let a = Beam::new(180e-6, 0.01, WAVELENGTH, 1.0, 1.0);
    let b = Beam::new(150e-6, 0.05, WAVELENGTH, 1.0, 1.0);
    let lens = Optics::lens(0.1, 0.2, "L1");
    let before = Beam::overlap(&a, &b, 0.0, S);
    let after = Beam::overlap(&lens.image_of(&a), &lens.image_of(&b), 0.4, S);
    assert_relative_eq!(before, after, max_relative = 1e-9);
}

// ─────────────────────────────────────────────────────────────────────────────
// Cavities
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_two_mirror_stability_range() {
    let radius = 0.1;
    for (length, stable) in [(0.02, true), (0.05, true), (0.15, true), (0.19, true), (0.21, false), (0.35, false)] {
        let bench = bench_with(vec![
            Optics::curved_mirror(radius, 0.1, "R1"),
            Optics::curved_mirror(radius, 0.1 + length, "R2"),
        ]);
        let cavity = bench.cavity(&[1, 2], length);
        assert_eq!(cavity.is_stable(), stable, "length {length}");
        assert_eq!(cavity.eigen_beam(WAVELENGTH, 0).is_some(), stable);
    }
}

#[test]
fn test_cavity_eigenmode_is_self_consistent() {
    let bench = bench_with(vec![
        Optics::curved_mirror(0.5, 0.1, "R1"),
        Optics::lens(0.3, 0.2, "L1"),
        Optics::curved_mirror(0.5, 0.35, "R2"),
    ]);
    let cavity = bench.cavity(&[1, 2, 3], 0.25);
    let beam = cavity.eigen_beam(WAVELENGTH, 0).unwrap();

    // One round trip through the matrix reproduces q
    let m = cavity.matrix();
    let q = beam.q(0.1, S);
    let q_round = (m.a(S) * q + m.b(S)) / (m.c(S) * q + m.d(S));
    assert_relative_eq!(q_round.re, q.re, epsilon = 1e-9);
    assert_relative_eq!(q_round.im, q.im, epsilon = 1e-9);
    assert!(q.im > 0.0);
}

#[test]
fn test_flat_flat_cavity_unstable() {
    let bench = bench_with(vec![
        Optics::flat_mirror(0.1, "M1"),
        Optics::flat_mirror(0.2, "M2"),
    ]);
    let cavity = bench.cavity(&[1, 2], 0.1);
    assert!(!cavity.is_stable());
    assert!(cavity.eigen_beam(WAVELENGTH, 0).is_none());
}
