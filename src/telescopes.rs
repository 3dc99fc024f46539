// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Metadata on telescopes that calibration solutions commonly come from.

use lazy_static::lazy_static;
use marlu::LatLngHeight;
use thiserror::Error;

/// A telescope whose location (and possibly antenna diameter) is known.
#[derive(Debug, Clone)]
pub struct KnownTelescope {
    pub name: &'static str,

    /// The geodetic position of the array centre.
    pub position: LatLngHeight,

    /// Antenna diameter \[metres\], if all antennas share one.
    pub antenna_diameter: Option<f64>,

    pub citation: &'static str,
}

impl KnownTelescope {
    /// The array centre in Earth-centred, Earth-fixed coordinates \[metres\].
    pub fn location_ecef(&self) -> [f64; 3] {
        let xyz = self.position.to_geocentric_wgs84();
        [xyz.x, xyz.y, xyz.z]
    }
}

lazy_static! {
    static ref KNOWN_TELESCOPES: Vec<KnownTelescope> = vec![
        KnownTelescope {
            name: "MWA",
            position: LatLngHeight::mwa(),
            antenna_diameter: None,
            citation: "Tingay et al. (2013)",
        },
        KnownTelescope {
            name: "HERA",
            position: LatLngHeight {
                longitude_rad: 21.428_303_826_863_015_f64.to_radians(),
                latitude_rad: (-30.721_526_120_689_57_f64).to_radians(),
                height_metres: 1051.690,
            },
            antenna_diameter: Some(14.0),
            citation: "value taken from hera_mc geo.py script (using hera_cm_db_updates under the hood.)",
        },
        KnownTelescope {
            name: "PAPER",
            position: LatLngHeight {
                longitude_rad: 21.428_305_555_555_557_f64.to_radians(),
                latitude_rad: (-30.721_527_777_777_78_f64).to_radians(),
                height_metres: 1073.0,
            },
            antenna_diameter: None,
            citation: "value taken from capo/cals/hsa7458_v000.py",
        },
        KnownTelescope {
            name: "OVRO-LWA",
            position: LatLngHeight {
                longitude_rad: (-118.281_666_666_666_67_f64).to_radians(),
                latitude_rad: 37.239_777_777_777_78_f64.to_radians(),
                height_metres: 1183.48,
            },
            antenna_diameter: None,
            citation: "OVRO Sharepoint Documentation",
        },
    ];
}

/// Look up a telescope by name (case insensitive).
pub fn known_telescope(name: &str) -> Option<&'static KnownTelescope> {
    KNOWN_TELESCOPES
        .iter()
        .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
}

/// The names of all known telescopes.
pub fn known_telescope_names() -> Vec<&'static str> {
    KNOWN_TELESCOPES.iter().map(|t| t.name).collect()
}

#[derive(Error, Debug)]
pub enum TelescopeError {
    #[error("Telescope '{0}' is not a known telescope; known telescopes are {names:?}", names = known_telescope_names())]
    Unknown(String),

    #[error("telescope_name is not set")]
    NoName,
}
