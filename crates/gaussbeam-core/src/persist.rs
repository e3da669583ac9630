//! Serializable shape of a bench.
//!
//! These types only describe the data; the file format is chosen by the
//! caller through serde. Elements refer to their lock parent by index in the
//! element list.

use nalgebra::Matrix2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::beam::{Beam, DEFAULT_WAVELENGTH};
use crate::fit::{Fit, FitDataType};
use crate::optics::{Optics, OpticsKind};
use crate::types::Orientation;

#[derive(Debug, Error, PartialEq)]
pub enum SnapshotError {
    #[error("element {index} refers to invalid lock parent {parent}")]
    InvalidParent { index: usize, parent: usize },
    #[error("the first element must be a beam source")]
    MissingSource,
    #[error("element {index} cannot take orientation {orientation:?}")]
    InvalidOrientation { index: usize, orientation: Orientation },
    #[error("left boundary {left} must be below right boundary {right}")]
    InvalidBoundary { left: f64, right: f64 },
}

fn default_one() -> f64 {
    1.0
}

fn default_wavelength() -> f64 {
    DEFAULT_WAVELENGTH
}

fn default_left_boundary() -> f64 {
    -0.1
}

fn default_right_boundary() -> f64 {
    0.7
}

fn default_target_waist() -> f64 {
    150e-6
}

fn default_target_waist_position() -> f64 {
    0.6
}

fn default_target_overlap() -> f64 {
    0.95
}

/// Per-axis waist description shared by sources and targets. Vertical values
/// default to the horizontal ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamSnapshot {
    pub waist: f64,
    pub waist_position: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waist_vertical: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waist_position_vertical: Option<f64>,
    #[serde(default = "default_one")]
    pub index: f64,
    #[serde(default = "default_one")]
    pub m2: f64,
}

impl BeamSnapshot {
    pub fn from_beam(beam: &Beam) -> Self {
        let spherical = beam.is_spherical();
        let vertical = |value: f64| (!spherical).then_some(value);
        Self {
            waist: beam.waist(Orientation::Horizontal),
            waist_position: beam.waist_position(Orientation::Horizontal),
            waist_vertical: vertical(beam.waist(Orientation::Vertical)),
            waist_position_vertical: vertical(beam.waist_position(Orientation::Vertical)),
            index: beam.index(),
            m2: beam.m2(),
        }
    }

    pub fn to_beam(&self, wavelength: f64) -> Beam {
        let mut beam = Beam::new(self.waist, self.waist_position, wavelength, self.index, self.m2);
        if let Some(waist) = self.waist_vertical {
            beam.set_waist(waist, Orientation::Vertical);
        }
        if let Some(position) = self.waist_position_vertical {
            beam.set_waist_position(position, Orientation::Vertical);
        }
        beam
    }
}

/// Element-specific fields, tagged by element type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpticsParams {
    CreateBeam {
        waist: f64,
        waist_position: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        waist_vertical: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        waist_position_vertical: Option<f64>,
        #[serde(default = "default_one")]
        index: f64,
        #[serde(default = "default_one")]
        m2: f64,
    },
    FreeSpace {
        width: f64,
    },
    Lens {
        focal: f64,
    },
    FlatMirror,
    CurvedMirror {
        curvature_radius: f64,
    },
    FlatInterface {
        index_ratio: f64,
    },
    CurvedInterface {
        index_ratio: f64,
        surface_radius: f64,
    },
    DielectricSlab {
        index_ratio: f64,
        width: f64,
    },
    GenericAbcd {
        /// `[A, B, C, D]` on the horizontal (or both) axes.
        horizontal: [f64; 4],
        #[serde(default, skip_serializing_if = "Option::is_none")]
        vertical: Option<[f64; 4]>,
        #[serde(default)]
        width: f64,
    },
}

fn coefficients(m: &Matrix2<f64>) -> [f64; 4] {
    [m[(0, 0)], m[(0, 1)], m[(1, 0)], m[(1, 1)]]
}

/// One element with its placement and lock state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpticsSnapshot {
    #[serde(flatten)]
    pub params: OpticsParams,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub position: f64,
    #[serde(default)]
    pub angle: f64,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub absolute_lock: bool,
    /// Index of the element this one is relatively locked to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
}

impl OpticsSnapshot {
    /// Snapshot of `optics`; the lock parent is resolved by the caller.
    pub fn from_optics(optics: &Optics) -> Self {
        let params = match optics.kind() {
            OpticsKind::CreateBeam { beam } => {
                let b = BeamSnapshot::from_beam(beam);
                OpticsParams::CreateBeam {
                    waist: b.waist,
                    waist_position: b.waist_position,
                    waist_vertical: b.waist_vertical,
                    waist_position_vertical: b.waist_position_vertical,
                    index: b.index,
                    m2: b.m2,
                }
            }
            OpticsKind::FreeSpace => OpticsParams::FreeSpace {
                width: optics.width(),
            },
            OpticsKind::Lens { focal } => OpticsParams::Lens { focal: *focal },
            OpticsKind::FlatMirror => OpticsParams::FlatMirror,
            OpticsKind::CurvedMirror { curvature_radius } => OpticsParams::CurvedMirror {
                curvature_radius: *curvature_radius,
            },
            OpticsKind::FlatInterface { index_ratio } => OpticsParams::FlatInterface {
                index_ratio: *index_ratio,
            },
            OpticsKind::CurvedInterface {
                index_ratio,
                surface_radius,
            } => OpticsParams::CurvedInterface {
                index_ratio: *index_ratio,
                surface_radius: *surface_radius,
            },
            OpticsKind::DielectricSlab { index_ratio } => OpticsParams::DielectricSlab {
                index_ratio: *index_ratio,
                width: optics.width(),
            },
            OpticsKind::GenericAbcd { matrices } => OpticsParams::GenericAbcd {
                horizontal: coefficients(&matrices.horizontal),
                vertical: (!matrices.is_symmetric()).then(|| coefficients(&matrices.vertical)),
                width: optics.width(),
            },
        };
        Self {
            params,
            name: optics.name().to_string(),
            position: optics.position(),
            angle: optics.angle(),
            orientation: optics.orientation(),
            absolute_lock: optics.absolute_lock(),
            parent: None,
        }
    }

    /// Element described by this snapshot, without lock relations.
    ///
    /// `index` only serves error reporting.
    pub fn to_optics(&self, wavelength: f64, index: usize) -> Result<Optics, SnapshotError> {
        let name = self.name.as_str();
        let mut optics = match self.params {
            OpticsParams::CreateBeam {
                waist,
                waist_position,
                waist_vertical,
                waist_position_vertical,
                index: beam_index,
                m2,
            } => {
                let snapshot = BeamSnapshot {
                    waist,
                    waist_position,
                    waist_vertical,
                    waist_position_vertical,
                    index: beam_index,
                    m2,
                };
                let mut source = Optics::create_beam(waist, waist_position, beam_index, name);
                source.set_source_beam(snapshot.to_beam(wavelength));
                source
            }
            OpticsParams::FreeSpace { width } => Optics::free_space(width, self.position, name),
            OpticsParams::Lens { focal } => Optics::lens(focal, self.position, name),
            OpticsParams::FlatMirror => Optics::flat_mirror(self.position, name),
            OpticsParams::CurvedMirror { curvature_radius } => {
                Optics::curved_mirror(curvature_radius, self.position, name)
            }
            OpticsParams::FlatInterface { index_ratio } => Optics::flat_interface(index_ratio, self.position, name),
            OpticsParams::CurvedInterface {
                index_ratio,
                surface_radius,
            } => Optics::curved_interface(surface_radius, index_ratio, self.position, name),
            OpticsParams::DielectricSlab { index_ratio, width } => {
                Optics::dielectric_slab(index_ratio, width, self.position, name)
            }
            OpticsParams::GenericAbcd {
                horizontal,
                vertical,
                width,
            } => {
                let [a, b, c, d] = horizontal;
                let mut generic = Optics::generic_abcd(a, b, c, d, width, self.position, name);
                if let Some([a, b, c, d]) = vertical {
                    generic.set_abcd(a, b, c, d, Orientation::Vertical);
                }
                generic
            }
        };

        optics.set_position(self.position);
        if self.angle != 0.0 {
            optics.set_angle(self.angle);
        }
        let explicit_axes = matches!(
            self.params,
            OpticsParams::GenericAbcd { vertical: Some(_), .. }
        ) || matches!(
            self.params,
            OpticsParams::CreateBeam { waist_vertical: Some(_), .. }
                | OpticsParams::CreateBeam { waist_position_vertical: Some(_), .. }
        );
        if !explicit_axes {
            if !optics.is_orientable(self.orientation) {
                return Err(SnapshotError::InvalidOrientation {
                    index,
                    orientation: self.orientation,
                });
            }
            optics.set_orientation(self.orientation);
        }
        Ok(optics)
    }
}

/// Target beam and matching criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSnapshot {
    #[serde(default = "default_target_waist")]
    pub waist: f64,
    #[serde(default = "default_target_waist_position")]
    pub waist_position: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waist_vertical: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waist_position_vertical: Option<f64>,
    #[serde(default = "default_one")]
    pub index: f64,
    #[serde(default = "default_one")]
    pub m2: f64,
    #[serde(default = "default_target_overlap")]
    pub overlap: f64,
    #[serde(default)]
    pub orientation: Orientation,
}

impl Default for TargetSnapshot {
    fn default() -> Self {
        Self {
            waist: default_target_waist(),
            waist_position: default_target_waist_position(),
            waist_vertical: None,
            waist_position_vertical: None,
            index: 1.0,
            m2: 1.0,
            overlap: default_target_overlap(),
            orientation: Orientation::Spherical,
        }
    }
}

impl TargetSnapshot {
    pub fn beam_snapshot(&self) -> BeamSnapshot {
        BeamSnapshot {
            waist: self.waist,
            waist_position: self.waist_position,
            waist_vertical: self.waist_vertical,
            waist_position_vertical: self.waist_position_vertical,
            index: self.index,
            m2: self.m2,
        }
    }
}

/// Bench-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchSettings {
    #[serde(default = "default_wavelength")]
    pub wavelength: f64,
    #[serde(default = "default_left_boundary")]
    pub left_boundary: f64,
    #[serde(default = "default_right_boundary")]
    pub right_boundary: f64,
    #[serde(default)]
    pub target: TargetSnapshot,
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self {
            wavelength: default_wavelength(),
            left_boundary: default_left_boundary(),
            right_boundary: default_right_boundary(),
            target: TargetSnapshot::default(),
        }
    }
}

/// One measurement. `vertical` is only used by ellipsoidal fits, where
/// `value` holds the horizontal measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitPoint {
    pub position: f64,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSnapshot {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub data_type: FitDataType,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub data: Vec<FitPoint>,
}

impl FitSnapshot {
    pub fn from_fit(fit: &Fit) -> Self {
        let orientation = fit.orientation();
        let data = fit
            .samples()
            .iter()
            .map(|s| match orientation {
                Orientation::Vertical => FitPoint {
                    position: s.position,
                    value: s.vertical,
                    vertical: None,
                },
                Orientation::Ellipsoidal => FitPoint {
                    position: s.position,
                    value: s.horizontal,
                    vertical: Some(s.vertical),
                },
                _ => FitPoint {
                    position: s.position,
                    value: s.horizontal,
                    vertical: None,
                },
            })
            .collect();
        Self {
            name: fit.name().to_string(),
            data_type: fit.data_type(),
            color: fit.color(),
            orientation,
            data,
        }
    }

    pub fn to_fit(&self) -> Fit {
        let mut fit = Fit::new(0);
        fit.set_name(&self.name);
        fit.set_data_type(self.data_type);
        fit.set_color(self.color);
        fit.set_orientation(self.orientation);
        for (i, point) in self.data.iter().enumerate() {
            match self.orientation {
                Orientation::Ellipsoidal => {
                    fit.set_data(i, point.position, point.value, Orientation::Horizontal);
                    fit.set_data(i, point.position, point.vertical.unwrap_or(0.0), Orientation::Vertical);
                }
                orientation => {
                    fit.set_data(i, point.position, point.value, orientation);
                }
            }
        }
        fit
    }
}

/// Complete bench description.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BenchSnapshot {
    #[serde(default)]
    pub bench: BenchSettings,
    #[serde(default)]
    pub optics: Vec<OpticsSnapshot>,
    #[serde(default)]
    pub fits: Vec<FitSnapshot>,
}
