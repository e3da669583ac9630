//! The optics bench: an ordered chain of elements and the beams between them.
//!
//! Element 0 is the beam source; the remaining elements are kept sorted by
//! position. Beam `i` is the beam leaving element `i`, valid from the end of
//! element `i` to the start of element `i + 1`. Every mutating operation
//! re-propagates the affected beams before returning and then delivers its
//! [`BenchEvent`]s to the registered listeners.

mod events;
mod objective;
mod snapshot;

pub use events::{BenchEvent, BenchListener};
pub use objective::OpticsObjective;

use gaussbeam_geometry::{distance, sign, Interval, Point, Rect, EPSILON};
use gaussbeam_optim::{local_maximum, ConjugateGradientConfig, Objective};
use ndarray::Array1;
use rand::Rng;
use thiserror::Error;

use crate::beam::{Beam, DEFAULT_WAVELENGTH};
use crate::cavity::Cavity;
use crate::fit::Fit;
use crate::optics::{lock, LockError, Optics, OpticsId, OpticsType};
use crate::types::Orientation;

/// Random placements tried by [`OpticsBench::magic_waist`] by default.
pub const DEFAULT_MAGIC_WAIST_TRIALS: usize = 500_000;

/// Gap between a newly created element and the one before it (m).
const NEW_OPTICS_SPACING: f64 = 0.05;

#[derive(Debug, Error, PartialEq)]
pub enum BenchError {
    #[error("position {position} is outside the bench [{min}, {max}]")]
    OutOfBoundary { position: f64, min: f64, max: f64 },
    #[error("element {index} would overlap element {other}")]
    Overlap { index: usize, other: usize },
    #[error("element {index} belongs to an absolutely locked tree")]
    AbsoluteLock { index: usize },
    #[error("element {index} does not exist ({len} elements)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Ordered optical elements with their propagated beams, a target beam and
/// measurement fits.
pub struct OpticsBench {
    wavelength: f64,
    optics: Vec<Optics>,
    beams: Vec<Beam>,
    sensitivity: Vec<f64>,
    boundary: Rect,
    fits: Vec<Fit>,
    target_beam: Beam,
    target_overlap: f64,
    target_orientation: Orientation,
    optics_spherical: bool,
    fit_spherical: bool,
    one_dimensional: bool,
    modified: bool,
    next_id: OpticsId,
    magic_waist_trials: usize,
    listeners: Vec<Box<dyn BenchListener>>,
    pending: Vec<BenchEvent>,
}

impl Default for OpticsBench {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OpticsBench {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpticsBench")
            .field("wavelength", &self.wavelength)
            .field("optics", &self.optics)
            .field("boundary", &self.boundary)
            .field("target_beam", &self.target_beam)
            .field("fits", &self.fits.len())
            .field("modified", &self.modified)
            .finish()
    }
}

impl OpticsBench {
    /// Empty bench with default wavelength, boundaries and target.
    pub fn new() -> Self {
        Self {
            wavelength: DEFAULT_WAVELENGTH,
            optics: Vec::new(),
            beams: Vec::new(),
            sensitivity: Vec::new(),
            boundary: Rect::new(-0.1, -0.2, 0.7, 0.2),
            fits: Vec::new(),
            target_beam: Beam::new(150e-6, 0.6, DEFAULT_WAVELENGTH, 1.0, 1.0),
            target_overlap: 0.95,
            target_orientation: Orientation::Spherical,
            optics_spherical: true,
            fit_spherical: true,
            one_dimensional: true,
            modified: false,
            next_id: 1,
            magic_waist_trials: DEFAULT_MAGIC_WAIST_TRIALS,
            listeners: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Absolutely locked source `w0` (180 µm waist at 10 mm) and one empty
    /// three-sample fit.
    pub fn populate_default(&mut self) {
        let mut source = Optics::create_beam(180e-6, 10e-3, 1.0, "w0");
        source.absolute_lock = true;
        self.insert_optics(source, 0);
        self.insert_fit(0, 3);
        self.flush();
    }

    /// Remove every element and fit, and restore the default settings.
    pub fn clear(&mut self) {
        let n = self.optics.len();
        self.delete_optics(0, n);
        let n = self.fits.len();
        self.delete_fits(0, n);

        let fresh = Self::new();
        self.wavelength = fresh.wavelength;
        self.boundary = fresh.boundary;
        self.target_beam = fresh.target_beam;
        self.target_overlap = fresh.target_overlap;
        self.set_target_orientation_inner(fresh.target_orientation);
        self.emit(BenchEvent::WavelengthChanged);
        self.emit(BenchEvent::BoundariesChanged);
        self.emit(BenchEvent::TargetBeamChanged);
        self.mark_modified(false);
        self.flush();
    }

    // ── Notifications ──────────────────────────────────────────────────────

    pub fn register_listener(&mut self, listener: Box<dyn BenchListener>) {
        self.listeners.push(listener);
    }

    fn emit(&mut self, event: BenchEvent) {
        self.pending.push(event);
    }

    fn flush(&mut self) {
        let events = std::mem::take(&mut self.pending);
        for event in &events {
            for listener in &mut self.listeners {
                listener.on_bench_event(event);
            }
        }
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn set_modified(&mut self, modified: bool) {
        self.mark_modified(modified);
        self.flush();
    }

    fn mark_modified(&mut self, modified: bool) {
        if self.modified != modified {
            self.modified = modified;
            self.emit(BenchEvent::ModifiedChanged { modified });
        }
    }

    // ── Global state ───────────────────────────────────────────────────────

    pub fn wavelength(&self) -> f64 {
        self.wavelength
    }

    /// Change the wavelength of every beam on the bench.
    pub fn set_wavelength(&mut self, wavelength: f64) {
        if wavelength <= 0.0 {
            log::warn!("Ignoring wavelength {}", wavelength);
            return;
        }
        self.wavelength = wavelength;
        self.target_beam.set_wavelength(wavelength);
        self.compute_beams(0, false);
        self.emit(BenchEvent::WavelengthChanged);
        self.emit(BenchEvent::TargetBeamChanged);
        self.flush();
    }

    pub fn boundary(&self) -> Rect {
        self.boundary
    }

    pub fn left_boundary(&self) -> f64 {
        self.boundary.x1
    }

    /// Move the left edge of the bench. Must stay left of the right edge.
    pub fn set_left_boundary(&mut self, position: f64) {
        if position >= self.boundary.x2 {
            log::warn!("Ignoring left boundary {} right of {}", position, self.boundary.x2);
            return;
        }
        self.boundary.x1 = position;
        self.boundaries_changed();
    }

    pub fn right_boundary(&self) -> f64 {
        self.boundary.x2
    }

    /// Move the right edge of the bench. Must stay right of the left edge.
    pub fn set_right_boundary(&mut self, position: f64) {
        if position <= self.boundary.x1 {
            log::warn!("Ignoring right boundary {} left of {}", position, self.boundary.x1);
            return;
        }
        self.boundary.x2 = position;
        self.boundaries_changed();
    }

    fn boundaries_changed(&mut self) {
        self.update_extreme_beams();
        self.emit(BenchEvent::BoundariesChanged);
        self.mark_modified(true);
        self.flush();
    }

    /// All elements spherical, all fits spherical and a spherical target.
    pub fn is_spherical(&self) -> bool {
        self.optics_spherical && self.fit_spherical && self.target_orientation == Orientation::Spherical
    }

    /// Every beam runs along the horizontal line of the bench.
    pub fn is_one_dimensional(&self) -> bool {
        self.one_dimensional
    }

    // ── Elements and beams ─────────────────────────────────────────────────

    pub fn n_optics(&self) -> usize {
        self.optics.len()
    }

    pub fn optics(&self, index: usize) -> Option<&Optics> {
        self.optics.get(index)
    }

    pub fn optics_list(&self) -> &[Optics] {
        &self.optics
    }

    /// Current index of the element with `id`.
    pub fn optics_index(&self, id: OpticsId) -> Option<usize> {
        lock::index_of(&self.optics, id)
    }

    pub fn beams(&self) -> &[Beam] {
        &self.beams
    }

    /// Beam leaving element `index`.
    pub fn beam(&self, index: usize) -> Option<&Beam> {
        self.beams.get(index)
    }

    /// Beam defining the optical axis entering element `index`.
    pub fn axis(&self, index: usize) -> Option<&Beam> {
        self.beams.get(index.saturating_sub(1))
    }

    /// Half the curvature of the output overlap with respect to the position
    /// of element `index` (m⁻²). Large values mark critical elements.
    pub fn sensitivity(&self, index: usize) -> Option<f64> {
        self.sensitivity.get(index).copied()
    }

    fn check_index(&self, index: usize) -> Result<(), BenchError> {
        if index < self.optics.len() {
            Ok(())
        } else {
            Err(BenchError::IndexOutOfRange {
                index,
                len: self.optics.len(),
            })
        }
    }

    /// Insert `optics` at `index` (clamped to the end) and return its id.
    ///
    /// The element joins the bench without lock relations.
    pub fn add_optics(&mut self, optics: Optics, index: usize) -> OpticsId {
        let id = self.insert_optics(optics, index);
        self.flush();
        id
    }

    fn insert_optics(&mut self, mut optics: Optics, index: usize) -> OpticsId {
        let index = index.min(self.optics.len());
        optics.id = self.next_id;
        self.next_id += 1;
        optics.detach_relations();

        self.optics.insert(index, optics);
        self.beams.insert(index, Beam::with_wavelength(self.wavelength));
        self.sensitivity.insert(index, 0.0);
        self.emit(BenchEvent::OpticsAdded { index });
        self.compute_beams(index, false);
        self.optics[index].id
    }

    /// Insert a default element of type `optics_type` named after its
    /// prefix, placed just after the previous element.
    pub fn add_optics_type(&mut self, optics_type: OpticsType, index: usize) -> Option<OpticsId> {
        let prefix = optics_type.prefix()?;
        let number = self
            .optics
            .iter()
            .filter_map(|o| o.name().strip_prefix(prefix)?.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let mut optics = optics_type.default_optics(&format!("{prefix}{number}"))?;
        let index = index.min(self.optics.len());
        if index > 0 {
            optics.set_position(self.optics[index - 1].position() + NEW_OPTICS_SPACING);
        }
        Some(self.add_optics(optics, index))
    }

    /// Remove `count` elements starting at `index`, detaching them from the
    /// lock forest first.
    pub fn remove_optics(&mut self, index: usize, count: usize) {
        self.delete_optics(index, count);
        self.flush();
    }

    fn delete_optics(&mut self, index: usize, count: usize) {
        let end = index.saturating_add(count).min(self.optics.len());
        if index >= end {
            return;
        }
        for i in index..end {
            lock::detach(&mut self.optics, i);
        }
        self.optics.drain(index..end);
        self.beams.drain(index..end);
        self.sensitivity.drain(index..end);
        self.emit(BenchEvent::OpticsRemoved {
            index,
            count: end - index,
        });
        self.compute_beams(index, false);
    }

    /// Edit element `index` in place, then re-sort and re-propagate.
    ///
    /// Positions changed here bypass boundary, overlap and lock checks.
    pub fn update_optics<F>(&mut self, index: usize, f: F) -> bool
    where
        F: FnOnce(&mut Optics),
    {
        let Some(optics) = self.optics.get_mut(index) else {
            return false;
        };
        f(optics);
        self.sort_optics();
        self.compute_beams(0, false);
        self.flush();
        true
    }

    fn sort_optics(&mut self) {
        if self.optics.len() > 1 {
            self.optics[1..].sort_by(|a, b| a.position().total_cmp(&b.position()));
        }
    }

    /// Move element `index` to `position` and return its new index.
    ///
    /// Rejected moves leave the bench untouched and return `index`.
    pub fn set_optics_position(&mut self, index: usize, position: f64) -> usize {
        match self.try_set_optics_position(index, position) {
            Ok(new_index) => new_index,
            Err(err) => {
                log::debug!("rejected move of element {index}: {err}");
                index
            }
        }
    }

    /// Move element `index`, and the lock tree it belongs to, so that it sits
    /// at `position`.
    ///
    /// Every moving element must stay within the bench boundaries and clear
    /// every element that does not move.
    pub fn try_set_optics_position(&mut self, index: usize, position: f64) -> Result<usize, BenchError> {
        self.check_index(index)?;
        if lock::is_tree_locked(&self.optics, index) {
            return Err(BenchError::AbsoluteLock { index });
        }

        let delta = position - self.optics[index].position();
        let moving = lock::subtree(&self.optics, lock::root(&self.optics, index));
        let (min, max) = (self.boundary.x1, self.boundary.x2);

        for &m in &moving {
            let moved = &self.optics[m];
            let start = moved.position() + delta;
            if start < min || start > max {
                return Err(BenchError::OutOfBoundary {
                    position: start,
                    min,
                    max,
                });
            }
            let span = Interval::new(start, moved.width());
            for (other, fixed) in self.optics.iter().enumerate() {
                if moving.contains(&other) {
                    continue;
                }
                if span.overlaps(&Interval::new(fixed.position(), fixed.width())) {
                    return Err(BenchError::Overlap { index: m, other });
                }
            }
        }

        let id = self.optics[index].id;
        lock::set_position(&mut self.optics, index, position, true);
        self.sort_optics();
        self.compute_beams(0, false);
        self.flush();
        Ok(self.optics_index(id).unwrap_or(index))
    }

    // ── Locks ──────────────────────────────────────────────────────────────

    /// Lock element `index` to `target`. Returns `false` if that would
    /// create a cycle.
    pub fn relative_lock_to(&mut self, index: usize, target: usize) -> bool {
        self.try_relative_lock_to(index, target).is_ok()
    }

    pub fn try_relative_lock_to(&mut self, index: usize, target: usize) -> Result<(), BenchError> {
        lock::relative_lock_to(&mut self.optics, index, target)?;
        self.mark_modified(true);
        self.flush();
        Ok(())
    }

    pub fn relative_unlock(&mut self, index: usize) -> bool {
        if self.check_index(index).is_err() {
            return false;
        }
        let unlocked = lock::relative_unlock(&mut self.optics, index);
        if unlocked {
            self.mark_modified(true);
            self.flush();
        }
        unlocked
    }

    /// Whether elements `index` and `other` move together.
    pub fn relative_locked_to(&self, index: usize, other: usize) -> bool {
        index < self.optics.len() && other < self.optics.len() && lock::same_tree(&self.optics, index, other)
    }

    pub fn set_absolute_lock(&mut self, index: usize, locked: bool) {
        if self.check_index(index).is_err() {
            return;
        }
        lock::set_absolute_lock(&mut self.optics, index, locked);
        self.mark_modified(true);
        self.flush();
    }

    /// Indented dump of the lock forest.
    pub fn lock_tree_report(&self) -> String {
        let report = lock::tree_report(&self.optics);
        log::debug!("lock forest:\n{report}");
        report
    }

    // ── Beam editing ───────────────────────────────────────────────────────

    /// Replace the beam emitted by the source, creating a default source if
    /// the bench is empty.
    pub fn set_input_beam(&mut self, beam: Beam) {
        if self.optics.is_empty() {
            self.insert_optics(Optics::create_beam(180e-6, 10e-3, 1.0, "w0"), 0);
        }
        self.optics[0].set_source_beam(beam);
        self.compute_beams(0, false);
        self.flush();
    }

    /// Force beam `index` and propagate backwards to the source and forward
    /// to the end.
    pub fn set_beam(&mut self, beam: Beam, index: usize) {
        if index >= self.beams.len() {
            return;
        }
        self.beams[index] = beam;
        self.compute_beams(index, true);
        self.flush();
    }

    /// Closest beam axis to a bench point.
    ///
    /// Returns the beam index and the axial position of the projection.
    /// Outside a beam's validity range the distance to its nearest end is
    /// used. Ties go to the beam for which the point lies on `preferred_side`
    /// (+1 or −1).
    pub fn closest_position(&self, point: &Point, preferred_side: i32) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        let mut best_distance = 1e300;

        for (index, beam) in self.beams.iter().enumerate() {
            let coord = beam.beam_coordinates(point);
            let new_distance = if coord.x < beam.start() {
                distance(point, &beam.absolute_coordinates(beam.start(), 0.0))
            } else if coord.x > beam.stop() {
                distance(point, &beam.absolute_coordinates(beam.stop(), 0.0))
            } else {
                coord.y.abs()
            };

            let rho = new_distance / best_distance - 1.0;
            if rho < -EPSILON || (rho.abs() < EPSILON && sign(coord.y) * f64::from(preferred_side) > 0.0) {
                best = Some((index, coord.x));
                best_distance = new_distance;
            }
        }
        best
    }

    // ── Propagation ────────────────────────────────────────────────────────

    fn compute_beams(&mut self, changed: usize, backwards: bool) {
        let n = self.optics.len();
        if n == 0 {
            self.update_flags();
            return;
        }
        let changed = changed.min(n - 1);

        if backwards {
            for i in changed + 1..n {
                self.beams[i] = self.optics[i].image_of(&self.beams[i - 1]);
            }
            for i in (0..changed).rev() {
                self.beams[i] = self.optics[i + 1].antecedent_of(&self.beams[i + 1]);
            }
            if self.optics[0].source_beam().is_some() {
                let mut source = self.beams[0].clone();
                source.rotate(0.0, -self.optics[0].angle());
                self.optics[0].set_source_beam(source);
            }
        } else {
            if changed == 0 {
                self.beams[0] = self.optics[0].image_of(&Beam::with_wavelength(self.wavelength));
            }
            for i in changed.max(1)..n {
                self.beams[i] = self.optics[i].image_of(&self.beams[i - 1]);
            }
        }

        for i in 0..n {
            if i > 0 {
                let start = self.optics[i].end_position();
                self.beams[i].set_start(start);
            }
            if i + 1 < n {
                let stop = self.optics[i + 1].position();
                self.beams[i].set_stop(stop);
            }
        }
        self.update_extreme_beams();

        let objective = OpticsObjective::new(&self.optics, self.wavelength, self.beams[n - 1].clone(), false);
        let curvature = objective.curvature(&objective.current_position());
        self.sensitivity = curvature.iter().map(|c| c / 2.0).collect();

        self.update_flags();
        self.emit(BenchEvent::DataChanged {
            start: if backwards { 0 } else { changed },
            end: n - 1,
        });
        self.mark_modified(true);
    }

    fn update_extreme_beams(&mut self) {
        if let Some(first) = self.beams.first_mut() {
            let (start, _) = first.rectangle_intersection(&self.boundary);
            first.set_start(start);
        }
        if let Some(last) = self.beams.last_mut() {
            let (_, stop) = last.rectangle_intersection(&self.boundary);
            last.set_stop(stop);
        }
        let (start, stop) = self.target_beam.rectangle_intersection(&self.boundary);
        self.target_beam.set_start(start);
        self.target_beam.set_stop(stop);
    }

    fn update_flags(&mut self) {
        let was_spherical = self.is_spherical();
        self.optics_spherical = self
            .optics
            .iter()
            .all(|o| o.orientation() == Orientation::Spherical);
        if was_spherical != self.is_spherical() {
            self.emit(BenchEvent::SphericityChanged);
        }

        let one_dimensional = self.beams.iter().all(|b| {
            let folded = b.angle().abs() % std::f64::consts::PI;
            folded < EPSILON || folded > std::f64::consts::PI - EPSILON
        });
        if one_dimensional != self.one_dimensional {
            self.one_dimensional = one_dimensional;
            self.emit(BenchEvent::DimensionalityChanged);
        }
    }

    // ── Target ─────────────────────────────────────────────────────────────

    pub fn target_beam(&self) -> &Beam {
        &self.target_beam
    }

    /// Replace the target beam. A non-spherical target switches the target
    /// orientation to ellipsoidal.
    pub fn set_target_beam(&mut self, beam: Beam) {
        let was_spherical = self.is_spherical();
        self.target_beam = beam;
        self.target_beam.set_wavelength(self.wavelength);
        if self.target_beam.orientation() == Orientation::Ellipsoidal
            && self.target_orientation == Orientation::Spherical
        {
            self.target_orientation = Orientation::Ellipsoidal;
        }
        if was_spherical != self.is_spherical() {
            self.emit(BenchEvent::SphericityChanged);
        }
        self.update_extreme_beams();
        self.emit(BenchEvent::TargetBeamChanged);
        self.mark_modified(true);
        self.flush();
    }

    pub fn target_overlap(&self) -> f64 {
        self.target_overlap
    }

    /// Overlap fraction the optimisers aim for, within `[0, 1]`.
    pub fn set_target_overlap(&mut self, overlap: f64) {
        if !(0.0..=1.0).contains(&overlap) {
            log::warn!("Ignoring target overlap {}", overlap);
            return;
        }
        self.target_overlap = overlap;
        self.emit(BenchEvent::TargetBeamChanged);
        self.mark_modified(true);
        self.flush();
    }

    pub fn target_orientation(&self) -> Orientation {
        self.target_orientation
    }

    /// Spherical or ellipsoidal target matching. Other orientations fall
    /// back to spherical, which makes the target beam spherical.
    pub fn set_target_orientation(&mut self, orientation: Orientation) {
        self.set_target_orientation_inner(orientation);
        self.emit(BenchEvent::TargetBeamChanged);
        self.mark_modified(true);
        self.flush();
    }

    fn set_target_orientation_inner(&mut self, orientation: Orientation) {
        let orientation = match orientation {
            Orientation::Ellipsoidal => Orientation::Ellipsoidal,
            _ => Orientation::Spherical,
        };
        if orientation == Orientation::Spherical {
            self.target_beam.make_spherical(Orientation::Horizontal);
        }
        let was_spherical = self.is_spherical();
        self.target_orientation = orientation;
        if was_spherical != self.is_spherical() {
            self.emit(BenchEvent::SphericityChanged);
        }
    }

    // ── Cavity ─────────────────────────────────────────────────────────────

    /// Cavity made of the elements at `indices`, in that order, closed by
    /// `closing` metres of free space. Invalid indices are skipped.
    pub fn cavity(&self, indices: &[usize], closing: f64) -> Cavity<'_> {
        let mut cavity = Cavity::new(closing);
        for &index in indices {
            if let Some(optics) = self.optics.get(index) {
                cavity.add_optics(optics);
            }
        }
        cavity
    }

    // ── Fits ───────────────────────────────────────────────────────────────

    pub fn n_fits(&self) -> usize {
        self.fits.len()
    }

    pub fn fits(&self) -> &[Fit] {
        &self.fits
    }

    pub fn fit(&self, index: usize) -> Option<&Fit> {
        self.fits.get(index)
    }

    /// Insert a fit with `n_data` empty samples, named `FitN`. Returns its
    /// index.
    pub fn add_fit(&mut self, index: usize, n_data: usize) -> usize {
        let index = self.insert_fit(index, n_data);
        self.flush();
        index
    }

    fn insert_fit(&mut self, index: usize, n_data: usize) -> usize {
        let index = index.min(self.fits.len());
        let number = self
            .fits
            .iter()
            .filter_map(|f| f.name().strip_prefix("Fit")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let mut fit = Fit::new(n_data);
        fit.set_name(&format!("Fit{number}"));
        self.fits.insert(index, fit);
        self.emit(BenchEvent::FitAdded { index });
        self.update_fit_flags();
        self.mark_modified(true);
        index
    }

    /// Edit fit `index` in place.
    pub fn update_fit<F>(&mut self, index: usize, f: F) -> bool
    where
        F: FnOnce(&mut Fit),
    {
        let Some(fit) = self.fits.get_mut(index) else {
            return false;
        };
        f(fit);
        self.emit(BenchEvent::FitDataChanged { index });
        self.update_fit_flags();
        self.mark_modified(true);
        self.flush();
        true
    }

    pub fn remove_fit(&mut self, index: usize) {
        self.remove_fits(index, 1);
    }

    pub fn remove_fits(&mut self, index: usize, count: usize) {
        self.delete_fits(index, count);
        self.flush();
    }

    fn delete_fits(&mut self, index: usize, count: usize) {
        let end = index.saturating_add(count).min(self.fits.len());
        if index >= end {
            return;
        }
        self.fits.drain(index..end);
        self.emit(BenchEvent::FitsRemoved {
            index,
            count: end - index,
        });
        self.update_fit_flags();
        self.mark_modified(true);
    }

    fn update_fit_flags(&mut self) {
        let was_spherical = self.is_spherical();
        self.fit_spherical = self
            .fits
            .iter()
            .all(|f| f.orientation() == Orientation::Spherical);
        if was_spherical != self.is_spherical() {
            self.emit(BenchEvent::SphericityChanged);
        }
    }

    // ── Optimisation ───────────────────────────────────────────────────────

    /// Overlap of the output beam with the target as a function of element
    /// positions.
    pub fn objective(&self, check_lock: bool) -> OpticsObjective {
        OpticsObjective::new(&self.optics, self.wavelength, self.target_beam.clone(), check_lock)
    }

    pub fn magic_waist_trials(&self) -> usize {
        self.magic_waist_trials
    }

    pub fn set_magic_waist_trials(&mut self, trials: usize) {
        self.magic_waist_trials = trials;
    }

    /// Random search for element positions matching the target beam.
    pub fn magic_waist(&mut self) -> bool {
        self.magic_waist_with_rng(&mut rand::thread_rng())
    }

    /// Random search for element positions matching the target beam, using
    /// `rng` for the placements.
    ///
    /// Movable elements (not the source, not absolutely locked and not
    /// relatively locked to a parent) are placed one at a time at uniform
    /// random positions within the boundaries until the overlap reaches the
    /// target overlap. The positions are then polished by a local
    /// maximisation and committed. Returns `false`, leaving the bench
    /// untouched, when no placement reached the target.
    pub fn magic_waist_with_rng<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        let objective = self.objective(true);
        let movable: Vec<usize> = (1..self.optics.len())
            .filter(|&i| !self.optics[i].absolute_lock() && self.optics[i].parent().is_none())
            .collect();
        if movable.is_empty() {
            log::info!("magic waist: no movable element");
            return false;
        }

        let (min, max) = (self.boundary.x1, self.boundary.x2);
        let mut positions = objective.current_position();
        let mut found = false;
        for trial in 0..self.magic_waist_trials {
            let index = movable[rng.gen_range(0..movable.len())];
            positions[index] = rng.gen_range(min..max);
            let overlap = objective.value(&positions);
            if overlap >= self.target_overlap {
                log::info!("magic waist: overlap {overlap:.5} after {} trials", trial + 1);
                found = true;
                break;
            }
        }

        if !found {
            log::info!("magic waist: no solution in {} trials", self.magic_waist_trials);
            return false;
        }

        let polished = local_maximum(&objective, &positions, &ConjugateGradientConfig::default());
        if polished.value >= self.target_overlap {
            positions = polished.position;
        }
        self.commit_positions(&positions);
        true
    }

    /// Local maximisation of the target overlap from the current positions.
    /// Commits and returns `true` only if the search succeeded.
    pub fn local_optimum(&mut self) -> bool {
        let objective = self.objective(true);
        let outcome = local_maximum(&objective, &objective.current_position(), &ConjugateGradientConfig::default());
        log::debug!(
            "local optimum: overlap {:.6} after {} iterations, success = {}",
            outcome.value,
            outcome.iterations,
            outcome.success
        );
        if !outcome.success {
            return false;
        }
        self.commit_positions(&outcome.position);
        true
    }

    fn commit_positions(&mut self, positions: &Array1<f64>) {
        objective::apply_positions(&mut self.optics, positions, true);
        self.compute_beams(0, false);
        self.flush();
    }
}
