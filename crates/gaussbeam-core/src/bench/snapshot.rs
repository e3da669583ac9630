//! Conversion between a live bench and its serializable description.

use gaussbeam_geometry::Rect;

use super::OpticsBench;
use crate::beam::Beam;
use crate::optics::{lock, OpticsKind};
use crate::types::Orientation;
use crate::persist::{BenchSettings, BenchSnapshot, BeamSnapshot, FitSnapshot, OpticsSnapshot, SnapshotError, TargetSnapshot};

impl OpticsBench {
    /// Serializable description of the bench.
    pub fn snapshot(&self) -> BenchSnapshot {
        let optics = self
            .optics
            .iter()
            .map(|o| {
                let mut snapshot = OpticsSnapshot::from_optics(o);
                snapshot.parent = o.parent().and_then(|id| lock::index_of(&self.optics, id));
                snapshot
            })
            .collect();

        let target = BeamSnapshot::from_beam(&self.target_beam);
        BenchSnapshot {
            bench: BenchSettings {
                wavelength: self.wavelength,
                left_boundary: self.boundary.x1,
                right_boundary: self.boundary.x2,
                target: TargetSnapshot {
                    waist: target.waist,
                    waist_position: target.waist_position,
                    waist_vertical: target.waist_vertical,
                    waist_position_vertical: target.waist_position_vertical,
                    index: target.index,
                    m2: target.m2,
                    overlap: self.target_overlap,
                    orientation: self.target_orientation,
                },
            },
            optics,
            fits: self.fits.iter().map(FitSnapshot::from_fit).collect(),
        }
    }

    /// Rebuild a bench, re-establishing relative locks by element index.
    ///
    /// The first element, if any, must be a beam source. The rebuilt bench
    /// is unmodified.
    pub fn from_snapshot(snapshot: &BenchSnapshot) -> Result<Self, SnapshotError> {
        let settings = &snapshot.bench;
        if settings.left_boundary >= settings.right_boundary {
            return Err(SnapshotError::InvalidBoundary {
                left: settings.left_boundary,
                right: settings.right_boundary,
            });
        }

        let mut bench = OpticsBench::new();
        if settings.wavelength > 0.0 {
            bench.wavelength = settings.wavelength;
        }
        let defaults = bench.boundary;
        bench.boundary = Rect::new(settings.left_boundary, defaults.y1, settings.right_boundary, defaults.y2);

        for (index, optics) in snapshot.optics.iter().enumerate() {
            let mut element = optics.to_optics(bench.wavelength, index)?;
            if index == 0 && !matches!(element.kind(), OpticsKind::CreateBeam { .. }) {
                return Err(SnapshotError::MissingSource);
            }
            element.id = bench.next_id;
            element.absolute_lock = optics.absolute_lock;
            bench.next_id += 1;
            bench.optics.push(element);
            bench.beams.push(Beam::with_wavelength(bench.wavelength));
            bench.sensitivity.push(0.0);
        }
        for (index, optics) in snapshot.optics.iter().enumerate() {
            if let Some(parent) = optics.parent {
                lock::relative_lock_to(&mut bench.optics, index, parent)
                    .map_err(|_| SnapshotError::InvalidParent { index, parent })?;
            }
        }

        let target = &settings.target;
        bench.target_beam = target.beam_snapshot().to_beam(bench.wavelength);
        bench.target_overlap = target.overlap.clamp(0.0, 1.0);
        let orientation = if bench.target_beam.is_spherical() {
            target.orientation
        } else {
            Orientation::Ellipsoidal
        };
        bench.set_target_orientation_inner(orientation);

        bench.fits = snapshot.fits.iter().map(FitSnapshot::to_fit).collect();
        bench.update_fit_flags();

        bench.sort_optics();
        bench.compute_beams(0, false);
        bench.pending.clear();
        bench.modified = false;
        Ok(bench)
    }
}
