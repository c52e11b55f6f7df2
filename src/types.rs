#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identity strings reported by `DeviceIdent`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceIdentity {
    pub part_number: String,
    pub name: String,
    pub version: String,
}

/// Operating modes of the NAV350 (`mNEVAChangeState` argument).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OperatingMode {
    PowerDown,
    Standby,
    Mapping,
    LandmarkDetection,
    Navigation,
}

impl OperatingMode {
    /// Numeric state sent to the device.
    pub fn code(self) -> u8 {
        match self {
            OperatingMode::PowerDown => 0,
            OperatingMode::Standby => 1,
            OperatingMode::Mapping => 2,
            OperatingMode::LandmarkDetection => 3,
            OperatingMode::Navigation => 4,
        }
    }
}

/// Vehicle pose computed by the device, in millimeters and millidegrees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoseRecord {
    pub x: i32,
    pub y: i32,
    pub phi: i32,
    /// Present when the device sent the optional pose block.
    pub extras: Option<PoseExtras>,
}

/// Optional part of the pose block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoseExtras {
    pub output_mode: u32,
    pub timestamp: u32,
    pub mean_deviation: u32,
    pub position_mode: u32,
    pub info_state: u32,
    pub used_reflectors: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CartesianPoint {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PolarPoint {
    pub distance: u32,
    pub angle: u32,
}

/// Optional per-reflector details.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReflectorDetails {
    pub local_id: u32,
    pub global_id: u32,
    pub reflector_type: u32,
    pub subtype: u32,
    pub quality: u32,
    pub timestamp: u32,
    pub size: u32,
    pub hit_count: u32,
    pub mean_echo_amplitude: u32,
    pub start_index: u32,
    pub end_index: u32,
}

/// One detected reflector. Each part is present only if the device sent it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reflector {
    pub cartesian: Option<CartesianPoint>,
    pub polar: Option<PolarPoint>,
    pub details: Option<ReflectorDetails>,
}

/// Reflectors reported by one data request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReflectorSet {
    pub filter: u32,
    pub reflectors: Vec<Reflector>,
}

impl ReflectorSet {
    pub fn len(&self) -> usize {
        self.reflectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reflectors.is_empty()
    }
}

/// One sweep of range measurements (`DIST1` channel).
///
/// Angles are in degrees, timestamps in device milliseconds, ranges in millimeters.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScanSector {
    pub angle_start: f64,
    pub angle_step: f64,
    /// `angle_start + (num_data_points - 1) * angle_step`, or `angle_start` for an empty sweep.
    pub angle_stop: f64,
    pub timestamp_start: u32,
    /// The device reports one timestamp per sweep, so this equals `timestamp_start`.
    pub timestamp_stop: u32,
    pub num_data_points: usize,
    pub range_values: Vec<u32>,
}

/// Decoded answer of `mNPOSGetData`.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NavigationData {
    /// Data selection mask echoed by the device.
    pub mask: u32,
    pub pose: Option<PoseRecord>,
    pub reflectors: Option<ReflectorSet>,
    pub scan: Option<ScanSector>,
}

/// Decoded answer of `mNLMDGetData`.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LandmarkData {
    pub mask: u32,
    pub reflectors: Option<ReflectorSet>,
    pub scan: Option<ScanSector>,
}

/// Arguments of `mNLAYAddLandmark` for a single landmark.
///
/// Coordinates are in meters and converted to millimeters when sent.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub landmark_type: u8,
    pub subtype: u8,
    pub size: u16,
    pub layer_id: u16,
    pub id: u16,
}
