//! Optical elements acting on Gaussian beams.
//!
//! Every element is an [`Optics`]: common placement data (position of the
//! left edge, width, orientation, tilt angle, name, locks) plus an
//! [`OpticsKind`] carrying the element-specific parameters. All kinds except
//! the beam source are ABCD transforms of the complex beam parameter
//!
//! $q' = \frac{Aq + B}{Cq + D}$
//!
//! applied independently on each transverse axis.

pub mod abcd;
pub mod lock;

use std::f64::consts::PI;

use gaussbeam_geometry::fmod_pos;
use nalgebra::Matrix2;
use serde::{Deserialize, Serialize};

use crate::beam::Beam;
use crate::types::{Axes, Orientation};

pub use abcd::AbcdMatrix;
pub use lock::LockError;

/// Stable identity of an element within a bench, preserved by clones.
pub type OpticsId = u64;

/// Element type tag, used for naming and persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpticsType {
    CreateBeam,
    FreeSpace,
    Lens,
    FlatMirror,
    CurvedMirror,
    FlatInterface,
    CurvedInterface,
    DielectricSlab,
    GenericAbcd,
}

impl OpticsType {
    /// Prefix of automatically generated names, if the type has one.
    pub fn prefix(self) -> Option<&'static str> {
        match self {
            OpticsType::Lens => Some("L"),
            OpticsType::FlatMirror => Some("M"),
            OpticsType::CurvedMirror => Some("R"),
            OpticsType::FlatInterface => Some("I"),
            OpticsType::CurvedInterface => Some("C"),
            OpticsType::GenericAbcd => Some("G"),
            OpticsType::DielectricSlab => Some("D"),
            OpticsType::CreateBeam | OpticsType::FreeSpace => None,
        }
    }

    /// An element of this type with default parameters at position 0.
    ///
    /// Returns `None` for types that are not created interactively.
    pub fn default_optics(self, name: &str) -> Option<Optics> {
        let optics = match self {
            OpticsType::Lens => Optics::lens(0.1, 0.0, name),
            OpticsType::FlatMirror => {
                let mut m = Optics::flat_mirror(0.0, name);
                m.set_angle(PI);
                m
            }
            OpticsType::CurvedMirror => {
                let mut m = Optics::curved_mirror(0.05, 0.0, name);
                m.set_angle(PI);
                m
            }
            OpticsType::FlatInterface => Optics::flat_interface(1.5, 0.0, name),
            OpticsType::CurvedInterface => Optics::curved_interface(0.1, 1.5, 0.0, name),
            OpticsType::DielectricSlab => Optics::dielectric_slab(1.5, 0.1, 0.0, name),
            OpticsType::GenericAbcd => Optics::generic_abcd(1.0, 0.2, 0.0, 1.0, 0.1, 0.0, name),
            OpticsType::CreateBeam | OpticsType::FreeSpace => return None,
        };
        Some(optics)
    }
}

/// Element-specific parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum OpticsKind {
    /// Beam source: emits its own beam whatever the input.
    CreateBeam { beam: Beam },
    /// Propagation over the element width.
    FreeSpace,
    /// Thin lens.
    Lens { focal: f64 },
    /// Plane mirror.
    FlatMirror,
    /// Spherical mirror.
    CurvedMirror { curvature_radius: f64 },
    /// Plane dielectric interface.
    FlatInterface { index_ratio: f64 },
    /// Spherical dielectric interface.
    CurvedInterface {
        index_ratio: f64,
        surface_radius: f64,
    },
    /// Slab of dielectric of the element width.
    DielectricSlab { index_ratio: f64 },
    /// Arbitrary per-axis ray-transfer matrix.
    GenericAbcd { matrices: Axes<Matrix2<f64>> },
}

/// An optical element placed on the bench axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Optics {
    pub(crate) id: OpticsId,
    kind: OpticsKind,
    position: f64,
    width: f64,
    orientation: Orientation,
    angle: f64,
    name: String,
    pub(crate) absolute_lock: bool,
    pub(crate) parent: Option<OpticsId>,
    pub(crate) children: Vec<OpticsId>,
}

impl Optics {
    fn with_kind(kind: OpticsKind, position: f64, name: &str) -> Self {
        Self {
            id: 0,
            kind,
            position,
            width: 0.0,
            orientation: Orientation::Spherical,
            angle: 0.0,
            name: name.to_string(),
            absolute_lock: false,
            parent: None,
            children: Vec::new(),
        }
    }

    // ── Constructors ───────────────────────────────────────────────────────

    /// Beam source emitting a spherical beam.
    ///
    /// # Arguments
    /// * `waist` - Waist radius (m).
    /// * `waist_position` - Waist position along the axis (m).
    /// * `index` - Refractive index of the medium the beam starts in.
    /// * `name` - Display name.
    pub fn create_beam(waist: f64, waist_position: f64, index: f64, name: &str) -> Self {
        let mut beam = Beam::default();
        beam.set_waist(waist, Orientation::Spherical);
        beam.set_waist_position(waist_position, Orientation::Spherical);
        beam.set_index(index);
        Self::with_kind(OpticsKind::CreateBeam { beam }, 0.0, name)
    }

    pub fn free_space(width: f64, position: f64, name: &str) -> Self {
        let mut optics = Self::with_kind(OpticsKind::FreeSpace, position, name);
        optics.width = width;
        optics
    }

    pub fn lens(focal: f64, position: f64, name: &str) -> Self {
        Self::with_kind(OpticsKind::Lens { focal }, position, name)
    }

    pub fn flat_mirror(position: f64, name: &str) -> Self {
        Self::with_kind(OpticsKind::FlatMirror, position, name)
    }

    pub fn curved_mirror(curvature_radius: f64, position: f64, name: &str) -> Self {
        Self::with_kind(OpticsKind::CurvedMirror { curvature_radius }, position, name)
    }

    /// Plane interface from the current medium into one `index_ratio` times
    /// denser.
    pub fn flat_interface(index_ratio: f64, position: f64, name: &str) -> Self {
        Self::with_kind(OpticsKind::FlatInterface { index_ratio }, position, name)
    }

    pub fn curved_interface(surface_radius: f64, index_ratio: f64, position: f64, name: &str) -> Self {
        Self::with_kind(
            OpticsKind::CurvedInterface {
                index_ratio,
                surface_radius,
            },
            position,
            name,
        )
    }

    pub fn dielectric_slab(index_ratio: f64, width: f64, position: f64, name: &str) -> Self {
        let mut optics = Self::with_kind(OpticsKind::DielectricSlab { index_ratio }, position, name);
        optics.width = width;
        optics
    }

    /// Spherical generic element with matrix `[[a, b], [c, d]]`.
    pub fn generic_abcd(a: f64, b: f64, c: f64, d: f64, width: f64, position: f64, name: &str) -> Self {
        let matrices = Axes::splat(Matrix2::new(a, b, c, d));
        let mut optics = Self::with_kind(OpticsKind::GenericAbcd { matrices }, position, name);
        optics.width = width;
        optics
    }

    /// Generic element reproducing a composed matrix.
    pub fn from_matrix(matrix: &AbcdMatrix, position: f64, name: &str) -> Self {
        let mut optics = Self::with_kind(
            OpticsKind::GenericAbcd {
                matrices: matrix.matrices,
            },
            position,
            name,
        );
        optics.width = matrix.width;
        optics.orientation = matrix.orientation;
        optics
    }

    /// Generic copy of any ABCD element: same coefficients, placement and name.
    pub fn to_generic(&self) -> Option<Optics> {
        let matrix = AbcdMatrix::from_optics(self)?;
        let mut generic = Self::from_matrix(&matrix, self.position, &self.name);
        generic.angle = self.angle;
        Some(generic)
    }

    // ── Identity and type ──────────────────────────────────────────────────

    pub fn id(&self) -> OpticsId {
        self.id
    }

    pub fn kind(&self) -> &OpticsKind {
        &self.kind
    }

    pub fn optics_type(&self) -> OpticsType {
        match self.kind {
            OpticsKind::CreateBeam { .. } => OpticsType::CreateBeam,
            OpticsKind::FreeSpace => OpticsType::FreeSpace,
            OpticsKind::Lens { .. } => OpticsType::Lens,
            OpticsKind::FlatMirror => OpticsType::FlatMirror,
            OpticsKind::CurvedMirror { .. } => OpticsType::CurvedMirror,
            OpticsKind::FlatInterface { .. } => OpticsType::FlatInterface,
            OpticsKind::CurvedInterface { .. } => OpticsType::CurvedInterface,
            OpticsKind::DielectricSlab { .. } => OpticsType::DielectricSlab,
            OpticsKind::GenericAbcd { .. } => OpticsType::GenericAbcd,
        }
    }

    /// Every kind but the beam source is a ray-transfer matrix.
    pub fn is_abcd(&self) -> bool {
        !matches!(self.kind, OpticsKind::CreateBeam { .. })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    // ── Placement ──────────────────────────────────────────────────────────

    /// Position of the left edge (m).
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Move this element alone, ignoring locks. Lock-aware moves go through
    /// [`lock::set_position`] or the bench.
    pub fn set_position(&mut self, position: f64) {
        self.position = position;
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    /// Change the width of elements that have one (free space, slab,
    /// generic). Negative widths are discarded.
    pub fn set_width(&mut self, width: f64) {
        let has_width = matches!(
            self.kind,
            OpticsKind::FreeSpace | OpticsKind::DielectricSlab { .. } | OpticsKind::GenericAbcd { .. }
        );
        if has_width && width >= 0.0 {
            self.width = width;
        } else {
            log::warn!("Ignoring width {} for {}", width, self.name);
        }
    }

    /// Position of the right edge (m).
    pub fn end_position(&self) -> f64 {
        self.position + self.width
    }

    /// Tilt with respect to the incoming optical axis.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Whether the element may be tilted.
    pub fn is_rotable(&self) -> bool {
        matches!(
            self.kind,
            OpticsKind::CreateBeam { .. }
                | OpticsKind::FlatMirror
                | OpticsKind::CurvedMirror { .. }
                | OpticsKind::FlatInterface { .. }
                | OpticsKind::CurvedInterface { .. }
        )
    }

    pub fn set_angle(&mut self, angle: f64) {
        if self.is_rotable() {
            self.angle = angle;
        } else {
            log::warn!("{} cannot be rotated", self.name);
        }
    }

    // ── Orientation ────────────────────────────────────────────────────────

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Whether the element may take `orientation`.
    pub fn is_orientable(&self, orientation: Orientation) -> bool {
        match self.kind {
            OpticsKind::CreateBeam { .. } | OpticsKind::GenericAbcd { .. } => {
                matches!(orientation, Orientation::Spherical | Orientation::Ellipsoidal)
            }
            OpticsKind::Lens { .. }
            | OpticsKind::CurvedMirror { .. }
            | OpticsKind::CurvedInterface { .. } => orientation != Orientation::Ellipsoidal,
            _ => orientation == Orientation::Spherical,
        }
    }

    /// Whether the element can be anisotropic at all.
    pub fn is_anisotropic(&self) -> bool {
        self.is_orientable(Orientation::Horizontal)
            || self.is_orientable(Orientation::Vertical)
            || self.is_orientable(Orientation::Ellipsoidal)
    }

    /// Set the orientation, discarding orientations the element cannot take.
    pub fn set_orientation(&mut self, orientation: Orientation) {
        if self.is_orientable(orientation) {
            self.orientation = orientation;
        } else {
            log::warn!("{} cannot be oriented {:?}", self.name, orientation);
        }
    }

    /// The element acts on the `orientation` axis.
    pub fn is_aligned(&self, orientation: Orientation) -> bool {
        self.orientation == Orientation::Spherical || self.orientation == orientation
    }

    // ── Locks (read side) ──────────────────────────────────────────────────

    pub fn absolute_lock(&self) -> bool {
        self.absolute_lock
    }

    /// Element this one is relatively locked to.
    pub fn parent(&self) -> Option<OpticsId> {
        self.parent
    }

    /// Elements relatively locked to this one.
    pub fn children(&self) -> &[OpticsId] {
        &self.children
    }

    /// Forget every lock relation, keeping the absolute lock flag.
    pub(crate) fn detach_relations(&mut self) {
        self.parent = None;
        self.children.clear();
    }

    // ── Element-specific parameters ────────────────────────────────────────

    /// Beam emitted by a source.
    pub fn source_beam(&self) -> Option<&Beam> {
        match &self.kind {
            OpticsKind::CreateBeam { beam } => Some(beam),
            _ => None,
        }
    }

    /// Replace the beam emitted by a source. A non-spherical beam makes the
    /// source ellipsoidal.
    pub fn set_source_beam(&mut self, new_beam: Beam) {
        match &mut self.kind {
            OpticsKind::CreateBeam { beam } => {
                let spherical = new_beam.is_spherical();
                *beam = new_beam;
                if !spherical {
                    self.orientation = Orientation::Ellipsoidal;
                }
            }
            _ => log::warn!("{} is not a beam source", self.name),
        }
    }

    pub fn focal(&self) -> Option<f64> {
        match self.kind {
            OpticsKind::Lens { focal } => Some(focal),
            _ => None,
        }
    }

    /// Set a lens focal length. Zero is discarded.
    pub fn set_focal(&mut self, value: f64) {
        match &mut self.kind {
            OpticsKind::Lens { focal } if value != 0.0 => *focal = value,
            _ => log::warn!("Ignoring focal length {} for {}", value, self.name),
        }
    }

    pub fn curvature_radius(&self) -> Option<f64> {
        match self.kind {
            OpticsKind::CurvedMirror { curvature_radius } => Some(curvature_radius),
            _ => None,
        }
    }

    /// Set a mirror curvature radius. Zero is discarded.
    pub fn set_curvature_radius(&mut self, value: f64) {
        match &mut self.kind {
            OpticsKind::CurvedMirror { curvature_radius } if value != 0.0 => *curvature_radius = value,
            _ => log::warn!("Ignoring curvature radius {} for {}", value, self.name),
        }
    }

    /// Ratio of the refractive index after the element to the one before.
    pub fn index_ratio(&self) -> Option<f64> {
        match self.kind {
            OpticsKind::FlatInterface { index_ratio }
            | OpticsKind::CurvedInterface { index_ratio, .. }
            | OpticsKind::DielectricSlab { index_ratio } => Some(index_ratio),
            _ => None,
        }
    }

    /// Set a dielectric index ratio. Non-positive values are discarded.
    pub fn set_index_ratio(&mut self, value: f64) {
        match &mut self.kind {
            OpticsKind::FlatInterface { index_ratio }
            | OpticsKind::CurvedInterface { index_ratio, .. }
            | OpticsKind::DielectricSlab { index_ratio }
                if value > 0.0 =>
            {
                *index_ratio = value
            }
            _ => log::warn!("Ignoring index ratio {} for {}", value, self.name),
        }
    }

    pub fn surface_radius(&self) -> Option<f64> {
        match self.kind {
            OpticsKind::CurvedInterface { surface_radius, .. } => Some(surface_radius),
            _ => None,
        }
    }

    /// Set an interface surface radius. Zero is discarded.
    pub fn set_surface_radius(&mut self, value: f64) {
        match &mut self.kind {
            OpticsKind::CurvedInterface { surface_radius, .. } if value != 0.0 => *surface_radius = value,
            _ => log::warn!("Ignoring surface radius {} for {}", value, self.name),
        }
    }

    /// Set the coefficients of a generic element on one or both axes.
    ///
    /// Setting a single axis makes the element ellipsoidal.
    pub fn set_abcd(&mut self, a: f64, b: f64, c: f64, d: f64, orientation: Orientation) {
        match &mut self.kind {
            OpticsKind::GenericAbcd { matrices } if orientation != Orientation::Ellipsoidal => {
                matrices.set(Matrix2::new(a, b, c, d), orientation);
                if orientation != Orientation::Spherical {
                    self.orientation = Orientation::Ellipsoidal;
                }
            }
            _ => log::warn!("Cannot set ABCD coefficients of {} along {:?}", self.name, orientation),
        }
    }

    // ── Ray-transfer matrix ────────────────────────────────────────────────

    /// Ray-transfer matrix seen by the `orientation` axis, or `None` for a
    /// beam source.
    pub fn matrix(&self, orientation: Orientation) -> Option<Matrix2<f64>> {
        let aligned = self.is_aligned(orientation);
        let m = match &self.kind {
            OpticsKind::CreateBeam { .. } => return None,
            OpticsKind::FreeSpace => Matrix2::new(1.0, self.width, 0.0, 1.0),
            OpticsKind::Lens { focal } => {
                let c = if aligned { -1.0 / focal } else { 0.0 };
                Matrix2::new(1.0, 0.0, c, 1.0)
            }
            OpticsKind::FlatMirror => Matrix2::identity(),
            OpticsKind::CurvedMirror { curvature_radius } => {
                let c = if aligned { -2.0 / curvature_radius } else { 0.0 };
                Matrix2::new(1.0, 0.0, c, 1.0)
            }
            OpticsKind::FlatInterface { index_ratio } => Matrix2::new(1.0, 0.0, 0.0, 1.0 / index_ratio),
            OpticsKind::CurvedInterface {
                index_ratio,
                surface_radius,
            } => {
                let c = if aligned {
                    (1.0 / index_ratio - 1.0) / surface_radius
                } else {
                    0.0
                };
                Matrix2::new(1.0, 0.0, c, 1.0 / index_ratio)
            }
            OpticsKind::DielectricSlab { index_ratio } => {
                Matrix2::new(1.0, self.width / index_ratio, 0.0, 1.0)
            }
            OpticsKind::GenericAbcd { matrices } => {
                if orientation == Orientation::Spherical
                    && self.orientation == Orientation::Ellipsoidal
                {
                    log::warn!("Spherical coefficients requested from ellipsoidal {}", self.name);
                }
                if self.orientation == Orientation::Spherical {
                    matrices.horizontal
                } else {
                    matrices.get(orientation)
                }
            }
        };
        Some(m)
    }

    /// Refractive index after the element divided by the index before it.
    pub fn index_jump(&self) -> f64 {
        match self.kind {
            OpticsKind::FlatInterface { index_ratio }
            | OpticsKind::CurvedInterface { index_ratio, .. } => index_ratio,
            _ => 1.0,
        }
    }

    // ── Beam transformation ────────────────────────────────────────────────

    /// Beam leaving the element for `input`, with `axis` the beam defining
    /// the incoming optical axis (usually `input` itself).
    pub fn image(&self, input: &Beam, axis: &Beam) -> Beam {
        match &self.kind {
            OpticsKind::CreateBeam { beam } => {
                let mut output = beam.clone();
                output.set_wavelength(input.wavelength());
                output.rotate(0.0, self.angle);
                if self.orientation == Orientation::Spherical {
                    output.make_spherical(Orientation::Horizontal);
                }
                output
            }
            OpticsKind::FlatMirror | OpticsKind::CurvedMirror { .. } => {
                let relative_angle = self.angle + axis.angle() - input.angle();
                // Near-grazing incidence: the mirror is ignored
                if relative_angle > PI / 2.0 && relative_angle < 3.0 * PI / 2.0 {
                    return input.clone();
                }
                let mut output = self.abcd_image(input);
                output.rotate(self.position, fmod_pos(2.0 * relative_angle + PI, 2.0 * PI));
                output
            }
            _ => self.abcd_image(input),
        }
    }

    /// Beam entering the element that produces `output`.
    ///
    /// A beam source has no input, so its antecedent is its own beam.
    pub fn antecedent(&self, output: &Beam, axis: &Beam) -> Beam {
        match self.kind {
            OpticsKind::CreateBeam { .. } => self.image(output, axis),
            _ => self.abcd_antecedent(output),
        }
    }

    /// [`image`](Self::image) along the input beam's own axis.
    pub fn image_of(&self, input: &Beam) -> Beam {
        self.image(input, input)
    }

    /// [`antecedent`](Self::antecedent) along the output beam's own axis.
    pub fn antecedent_of(&self, output: &Beam) -> Beam {
        self.antecedent(output, output)
    }

    fn per_axis(&self, beam: &Beam) -> &'static [Orientation] {
        if self.orientation == Orientation::Spherical && beam.is_spherical() {
            &[Orientation::Spherical]
        } else {
            &[Orientation::Horizontal, Orientation::Vertical]
        }
    }

    fn abcd_image(&self, input: &Beam) -> Beam {
        let mut output = input.clone();
        output.set_index(input.index() * self.index_jump());
        for &orientation in self.per_axis(input) {
            if let Some(m) = self.matrix(orientation) {
                let q = input.q(self.position, orientation);
                let q_out = (m[(0, 0)] * q + m[(0, 1)]) / (m[(1, 0)] * q + m[(1, 1)]);
                output.set_q(q_out, self.end_position(), orientation);
            }
        }
        output
    }

    fn abcd_antecedent(&self, output: &Beam) -> Beam {
        let mut input = output.clone();
        input.set_index(output.index() / self.index_jump());
        for &orientation in self.per_axis(output) {
            if let Some(m) = self.matrix(orientation) {
                let q = output.q(self.end_position(), orientation);
                let q_in = (m[(0, 1)] - m[(1, 1)] * q) / (m[(1, 0)] * q - m[(0, 0)]);
                input.set_q(q_in, self.position, orientation);
            }
        }
        input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    const S: Orientation = Orientation::Spherical;
    const H: Orientation = Orientation::Horizontal;
    const V: Orientation = Orientation::Vertical;

    fn input() -> Beam {
        Beam::new(180e-6, 0.01, 461e-9, 1.0, 1.0)
    }

    #[test]
    fn test_free_space_keeps_beam() {
        let fs = Optics::free_space(0.3, 0.1, "FS");
        let out = fs.image_of(&input());
        assert_relative_eq!(out.waist(S), 180e-6, max_relative = 1e-12);
        assert_abs_diff_eq!(out.waist_position(S), 0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_lens_focuses_collimated_beam_near_focus() {
        // A 2 mm waist is nearly collimated over 10 cm
        let beam = Beam::new(2e-3, 0.0, 1064e-9, 1.0, 1.0);
        let lens = Optics::lens(0.1, 0.0, "L1");
        let out = lens.image_of(&beam);
        assert_abs_diff_eq!(out.waist_position(S), 0.1, epsilon = 1e-4);
        assert!(out.waist(S) < 2e-5);
    }

    #[test]
    fn test_cylindrical_lens_acts_on_one_axis() {
        let mut lens = Optics::lens(0.1, 0.2, "L1");
        lens.set_orientation(H);
        let out = lens.image_of(&input());
        assert!(!out.is_spherical());
        assert_relative_eq!(out.waist(V), 180e-6, max_relative = 1e-10);
        assert_abs_diff_eq!(out.waist_position(V), 0.01, epsilon = 1e-10);
    }

    #[test]
    fn test_orientation_capabilities() {
        let mut lens = Optics::lens(0.1, 0.0, "L1");
        lens.set_orientation(Orientation::Ellipsoidal);
        assert_eq!(lens.orientation(), S);

        let mut generic = Optics::generic_abcd(1.0, 0.0, 0.0, 1.0, 0.0, 0.0, "G1");
        generic.set_orientation(H);
        assert_eq!(generic.orientation(), S);
        generic.set_orientation(Orientation::Ellipsoidal);
        assert_eq!(generic.orientation(), Orientation::Ellipsoidal);

        let mut slab = Optics::dielectric_slab(1.5, 0.1, 0.0, "D1");
        slab.set_orientation(V);
        assert_eq!(slab.orientation(), S);
        assert!(!slab.is_anisotropic());
    }

    #[test]
    fn test_invalid_parameters_are_discarded() {
        let mut lens = Optics::lens(0.1, 0.0, "L1");
        lens.set_focal(0.0);
        assert_eq!(lens.focal(), Some(0.1));

        let mut mirror = Optics::curved_mirror(0.05, 0.0, "R1");
        mirror.set_curvature_radius(0.0);
        assert_eq!(mirror.curvature_radius(), Some(0.05));

        let mut interface = Optics::curved_interface(0.1, 1.5, 0.0, "C1");
        interface.set_index_ratio(-1.0);
        interface.set_surface_radius(0.0);
        assert_eq!(interface.index_ratio(), Some(1.5));
        assert_eq!(interface.surface_radius(), Some(0.1));

        let mut slab = Optics::dielectric_slab(1.5, 0.1, 0.0, "D1");
        slab.set_index_ratio(0.0);
        assert_eq!(slab.index_ratio(), Some(1.5));
    }

    #[test]
    fn test_flat_interface_scales_rayleigh_range() {
        let interface = Optics::flat_interface(1.5, 0.1, "I1");
        let beam = input();
        let out = interface.image_of(&beam);
        assert_relative_eq!(out.index(), 1.5, max_relative = 1e-12);
        assert_relative_eq!(out.waist(S), beam.waist(S), max_relative = 1e-10);
        // Apparent distance to the waist grows with the index
        assert_abs_diff_eq!(0.1 - out.waist_position(S), 1.5 * (0.1 - 0.01), epsilon = 1e-10);
    }

    #[test]
    fn test_slab_shifts_waist() {
        let slab = Optics::dielectric_slab(1.5, 0.03, 0.1, "D1");
        let out = slab.image_of(&input());
        assert_relative_eq!(out.index(), 1.0, max_relative = 1e-12);
        // The slab shortens the optical path by width*(1 - 1/n)
        assert_abs_diff_eq!(out.waist_position(S), 0.01 + 0.03 * (1.0 - 1.0 / 1.5), epsilon = 1e-10);
    }

    #[test]
    fn test_antecedent_inverts_image() {
        let beam = input();
        let mut elements = vec![
            Optics::lens(0.08, 0.2, "L1"),
            Optics::curved_mirror(0.25, 0.15, "R1"),
            Optics::flat_interface(1.45, 0.12, "I1"),
            Optics::curved_interface(-0.07, 1.6, 0.3, "C1"),
            Optics::dielectric_slab(1.5, 0.04, 0.1, "D1"),
            Optics::generic_abcd(1.2, 0.05, -3.0, 0.7083333333333334, 0.02, 0.05, "G1"),
            Optics::free_space(0.2, 0.0, "FS"),
        ];
        let mut cylindrical = Optics::lens(0.2, 0.2, "L2");
        cylindrical.set_orientation(V);
        elements.push(cylindrical);

        for e in &elements {
            let back = e.antecedent_of(&e.image_of(&beam));
            for o in [H, V] {
                assert_relative_eq!(back.waist(o), beam.waist(o), max_relative = 1e-8);
                assert_abs_diff_eq!(back.waist_position(o), beam.waist_position(o), epsilon = 1e-9);
            }
            assert_relative_eq!(back.index(), beam.index(), max_relative = 1e-12);
            assert_eq!(back.wavelength(), beam.wavelength());
        }
    }

    #[test]
    fn test_create_beam_ignores_input() {
        let source = Optics::create_beam(180e-6, 10e-3, 1.0, "w0");
        let other = Beam::new(1e-3, 2.0, 780e-9, 1.0, 1.0);
        let out = source.image_of(&other);
        assert_eq!(out.waist(S), 180e-6);
        assert_eq!(out.waist_position(S), 10e-3);
        assert_eq!(out.wavelength(), 780e-9);
        assert_eq!(source.antecedent_of(&other), out);
        assert!(!source.is_abcd());
        assert!(source.matrix(S).is_none());
    }

    #[test]
    fn test_flat_mirror_reflects_at_normal_incidence() {
        let mirror = Optics::flat_mirror(0.3, "M1");
        let out = mirror.image_of(&input());
        assert_abs_diff_eq!(out.angle(), PI, epsilon = 1e-12);
        assert_abs_diff_eq!(out.waist_position(S), 0.01, epsilon = 1e-12);
        // The reflection point is unchanged
        let p = out.absolute_coordinates(0.3, 0.0);
        assert_abs_diff_eq!(p.x, 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(p.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_flat_mirror_grazing_passes_through() {
        let mut mirror = Optics::flat_mirror(0.3, "M1");
        mirror.set_angle(PI);
        let beam = input();
        assert_eq!(mirror.image_of(&beam), beam);
        mirror.set_angle(0.2);
        assert_abs_diff_eq!(mirror.image_of(&beam).angle(), PI + 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_restricted_to_rotable() {
        let mut lens = Optics::lens(0.1, 0.0, "L1");
        lens.set_angle(0.3);
        assert_eq!(lens.angle(), 0.0);
        let mut mirror = Optics::flat_mirror(0.0, "M1");
        mirror.set_angle(0.3);
        assert_eq!(mirror.angle(), 0.3);
    }

    #[test]
    fn test_generic_copy_matches_original() {
        let lens = Optics::lens(0.1, 0.2, "L1");
        let generic = lens.to_generic().unwrap();
        assert_eq!(generic.optics_type(), OpticsType::GenericAbcd);
        let a = lens.image_of(&input());
        let b = generic.image_of(&input());
        assert_relative_eq!(a.waist(S), b.waist(S), max_relative = 1e-12);
        assert_abs_diff_eq!(a.waist_position(S), b.waist_position(S), epsilon = 1e-12);
        assert!(Optics::create_beam(1e-4, 0.0, 1.0, "w0").to_generic().is_none());
    }

    #[test]
    fn test_default_optics_and_prefixes() {
        let mirror = OpticsType::CurvedMirror.default_optics("R1").unwrap();
        assert_eq!(mirror.curvature_radius(), Some(0.05));
        assert_eq!(mirror.angle(), PI);
        let generic = OpticsType::GenericAbcd.default_optics("G1").unwrap();
        assert_eq!(generic.width(), 0.1);
        assert_eq!(OpticsType::DielectricSlab.prefix(), Some("D"));
        assert!(OpticsType::CreateBeam.default_optics("w0").is_none());
    }
}
