//! # Gaussbeam Core
//!
//! Gaussian beam propagation through chains of optical elements. Beams are
//! described by their waist on two transverse axes and transformed by the
//! ray-transfer (ABCD) matrices of lenses, mirrors, interfaces and generic
//! elements.
//!
//! ## Architecture
//!
//! [`OpticsBench`] owns an ordered list of [`Optics`] and the [`Beam`]
//! leaving each of them. Elements can be locked in place or to each other;
//! every edit goes through the bench, which checks boundaries, overlaps and
//! locks before re-propagating. Optimisers from `gaussbeam-optim` search
//! element positions matching a target beam.
//!
//! ## Modules
//!
//! - [`types`]: axis selectors and per-axis values.
//! - [`beam`]: the Gaussian beam and its derived quantities.
//! - [`optics`]: element kinds, ABCD composition and the lock forest.
//! - [`cavity`]: round-trip stability and eigenmodes.
//! - [`fit`]: beam recovery from measured radii.
//! - [`bench`]: the optics bench, its notifications and its objective.
//! - [`persist`]: serializable bench description.

pub mod beam;
pub mod bench;
pub mod cavity;
pub mod fit;
pub mod optics;
pub mod persist;
pub mod types;

pub use beam::{Beam, DEFAULT_WAVELENGTH};
pub use bench::{BenchError, BenchEvent, BenchListener, OpticsBench, OpticsObjective};
pub use cavity::Cavity;
pub use fit::{Fit, FitDataType, FitResult, FitSample};
pub use optics::{AbcdMatrix, LockError, Optics, OpticsId, OpticsKind, OpticsType};
pub use persist::{BenchSnapshot, SnapshotError};
pub use types::{Axes, Orientation};
