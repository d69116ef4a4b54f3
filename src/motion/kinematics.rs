// src/motion/kinematics.rs
//
// Coordinate map for rail-based delta machines (Kossel style).
//
// Three rails stand 120 degrees apart on a circle of radius r around the
// machine axis: A at (0, +r), B at (x>0, y<0), C at (x<0, y<0). Each rail
// carries a carriage joined to the effector by a rod of length L.

use krusty_shared::AxisId;
use krusty_shared::config::DeltaConfig;

use super::bed_level::{BedLevelTransform, Matrix3x3};

/// Step counts for rails A, B, C and the extruder, indexed by `AxisId`.
pub type MechanicalPosition = [i32; 4];

/// Tool-space position in millimeters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CartesianPose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub e: f64,
}

impl CartesianPose {
    pub fn new(x: f64, y: f64, z: f64, e: f64) -> Self {
        Self { x, y, z, e }
    }

    pub fn xyz(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Translates between mechanical step counts and Cartesian coordinates.
pub trait CoordMap {
    fn num_axis(&self) -> usize;

    fn steps_per_mm(&self, axis: AxisId) -> f64;

    fn mm_per_step(&self, axis: AxisId) -> f64 {
        1.0 / self.steps_per_mm(axis)
    }

    fn axis_position(&self, mech: &MechanicalPosition, axis: AxisId) -> i32 {
        mech[axis.index()]
    }

    /// Mechanical position after homing, given the position before it.
    fn home_position(&self, current: &MechanicalPosition) -> MechanicalPosition;

    fn apply_leveling(&self, xyz: [f64; 3]) -> [f64; 3];

    /// Clamp a pose into the machine's reachable volume.
    fn bound(&self, pose: CartesianPose) -> CartesianPose;

    fn xyze_from_mechanical(&self, mech: &MechanicalPosition) -> CartesianPose;
}

/// Immutable physical constants of a linear delta.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaGeometry {
    /// Radius of the circle the rails stand on, mm.
    pub r: f64,
    /// Rod length, mm.
    pub l: f64,
    /// Carriage height when homed, mm.
    pub h: f64,
    pub build_radius: f64,
    pub steps_per_mm: f64,
    pub steps_per_mm_extruder: f64,
}

impl DeltaGeometry {
    /// Vertical distance from a carriage down to the effector when centered.
    pub fn rod_drop(&self) -> f64 {
        (self.l * self.l - self.r * self.r).sqrt()
    }

    pub fn max_z(&self) -> f64 {
        self.h + self.rod_drop()
    }
}

impl From<&DeltaConfig> for DeltaGeometry {
    fn from(config: &DeltaConfig) -> Self {
        Self {
            r: config.carriage_radius,
            l: config.rod_length,
            h: config.home_height,
            build_radius: config.build_radius,
            steps_per_mm: config.steps_per_mm,
            steps_per_mm_extruder: config.steps_per_mm_extruder,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinearDeltaCoordMap<B: BedLevelTransform = Matrix3x3> {
    geometry: DeltaGeometry,
    mm_per_step: f64,
    mm_per_step_extruder: f64,
    bed_level: B,
}

impl LinearDeltaCoordMap<Matrix3x3> {
    pub fn from_config(config: &DeltaConfig) -> Self {
        Self::new(DeltaGeometry::from(config), Matrix3x3::from_rows(config.bed_level))
    }
}

impl<B: BedLevelTransform> LinearDeltaCoordMap<B> {
    /// Lowest reachable z, mm. Slightly below the bed for calibration moves.
    pub const MIN_Z: f64 = -2.0;
    pub const NUM_AXIS: usize = 4;

    pub fn new(geometry: DeltaGeometry, bed_level: B) -> Self {
        tracing::debug!(
            r = geometry.r,
            l = geometry.l,
            h = geometry.h,
            build_radius = geometry.build_radius,
            "linear delta coordinate map"
        );
        Self {
            mm_per_step: 1.0 / geometry.steps_per_mm,
            mm_per_step_extruder: 1.0 / geometry.steps_per_mm_extruder,
            geometry,
            bed_level,
        }
    }

    pub fn geometry(&self) -> &DeltaGeometry {
        &self.geometry
    }

    /// Solve for the effector position from rail heights in mm.
    ///
    /// Coinciding rail heights make the general closed form divide by zero,
    /// so the fully symmetric pose and the B == C pose are solved separately.
    /// Of the two algebraic solutions the lower one is taken as the
    /// effector position.
    pub fn xyz_from_rails(&self, a: f64, b: f64, c: f64) -> [f64; 3] {
        let r = self.geometry.r;
        let l = self.geometry.l;
        let sqrt3 = 3f64.sqrt();

        if a == b && b == c {
            tracing::trace!("delta forward kinematics: A == B == C");
            [0.0, 0.0, a - self.geometry.rod_drop()]
        } else if b == c {
            tracing::trace!("delta forward kinematics: A != B == C");
            let d = a - b;
            let d2 = d * d;
            let ydiv = 2.0 * (4.0 * a * a - 8.0 * a * b + 4.0 * b * b + 9.0 * r * r);
            let ya = 2.0 * d2 * r;
            let yb = 4.0
                * (d2
                    * (-d2 * d2 + 4.0 * d2 * l * l + 3.0 * (-2.0 * d2 + 3.0 * l * l) * r * r
                        - 9.0 * r * r * r * r))
                    .sqrt();
            let com1 = (yb / (d * ydiv)).abs();
            let com2 = ya / ydiv;
            let z = 0.5 * (a + b - 3.0 * r * (com2 / d + com1));
            let y = com2 + d * com1;
            [0.0, y, z]
        } else {
            tracing::trace!("delta forward kinematics: B != C");
            let r2 = r * r;
            let l2 = l * l;
            // recurring term: A^2 + B^2 + C^2 - AB - BC - AC
            let q = a * a + b * b - b * c + c * c - a * (b + c);
            let za = (b - c)
                * r
                * (2.0 * a * a * a - a * a * (b + c) - a * (b * b + c * c - 3.0 * r2)
                    + (b + c) * (2.0 * b * b - 3.0 * b * c + 2.0 * c * c + 3.0 * r2));
            let zb = sqrt3
                * (-((b - c)
                    * (b - c)
                    * r2
                    * ((a - b) * (a - b) * (a - c) * (a - c) * (b - c) * (b - c)
                        + 3.0 * q * (q - 4.0 * l2) * r2
                        + 9.0 * (2.0 * q - 3.0 * l2) * r2 * r2
                        + 27.0 * r2 * r2 * r2)))
                    .sqrt();
            let zdiv = (b - c) * r * (4.0 * q + 9.0 * r2);

            // lower root: za/zdiv - |zb/zdiv|
            let z = za / zdiv - (zb / zdiv).abs();
            let x = ((b - c) * (b + c - 2.0 * z)) / (2.0 * sqrt3 * r);
            let y = -((-2.0 * a * a + b * b + c * c + 4.0 * a * z - 2.0 * b * z - 2.0 * c * z)
                / (6.0 * r));
            [x, y, z]
        }
    }
}

impl<B: BedLevelTransform> CoordMap for LinearDeltaCoordMap<B> {
    fn num_axis(&self) -> usize {
        Self::NUM_AXIS
    }

    fn steps_per_mm(&self, axis: AxisId) -> f64 {
        if axis.is_extruder() {
            self.geometry.steps_per_mm_extruder
        } else {
            self.geometry.steps_per_mm
        }
    }

    fn mm_per_step(&self, axis: AxisId) -> f64 {
        if axis.is_extruder() {
            self.mm_per_step_extruder
        } else {
            self.mm_per_step
        }
    }

    fn home_position(&self, current: &MechanicalPosition) -> MechanicalPosition {
        let home = (self.geometry.h * self.geometry.steps_per_mm) as i32;
        [home, home, home, current[AxisId::Extruder.index()]]
    }

    fn apply_leveling(&self, xyz: [f64; 3]) -> [f64; 3] {
        self.bed_level.transform(xyz)
    }

    fn bound(&self, pose: CartesianPose) -> CartesianPose {
        let z = pose.z.min(self.geometry.max_z()).max(Self::MIN_Z);
        let (mut x, mut y) = (pose.x, pose.y);
        let build_r2 = self.geometry.build_radius * self.geometry.build_radius;
        let dist2 = x * x + y * y;
        if dist2 > build_r2 {
            // project radially onto the build circle
            let ratio = (build_r2 / dist2).sqrt();
            x *= ratio;
            y *= ratio;
        }
        CartesianPose { x, y, z, e: pose.e }
    }

    fn xyze_from_mechanical(&self, mech: &MechanicalPosition) -> CartesianPose {
        let a = mech[AxisId::A.index()] as f64 * self.mm_per_step;
        let b = mech[AxisId::B.index()] as f64 * self.mm_per_step;
        let c = mech[AxisId::C.index()] as f64 * self.mm_per_step;
        let e = mech[AxisId::Extruder.index()] as f64 * self.mm_per_step_extruder;
        let [x, y, z] = self.xyz_from_rails(a, b, c);
        CartesianPose { x, y, z, e }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::bed_level::IdentityLevel;

    fn geometry() -> DeltaGeometry {
        DeltaGeometry {
            r: 100.0,
            l: 200.0,
            h: 300.0,
            build_radius: 100.0,
            steps_per_mm: 100.0,
            steps_per_mm_extruder: 50.0,
        }
    }

    fn coord_map() -> LinearDeltaCoordMap<IdentityLevel> {
        LinearDeltaCoordMap::new(geometry(), IdentityLevel)
    }

    // distance from the effector to each carriage should equal the rod length
    fn rod_lengths(xyz: [f64; 3], a: f64, b: f64, c: f64) -> [f64; 3] {
        let r = geometry().r;
        let s = (2.0 * std::f64::consts::PI / 3.0).sin() * r;
        let k = (2.0 * std::f64::consts::PI / 3.0).cos() * r;
        let carriages = [[0.0, r, a], [s, k, b], [-s, k, c]];
        carriages.map(|[cx, cy, cz]| {
            ((xyz[0] - cx).powi(2) + (xyz[1] - cy).powi(2) + (xyz[2] - cz).powi(2)).sqrt()
        })
    }

    #[test]
    fn test_symmetric_pose() {
        let pose = coord_map().xyze_from_mechanical(&[30000, 30000, 30000, 0]);
        assert_eq!(pose.x, 0.0);
        assert_eq!(pose.y, 0.0);
        assert!((pose.z - 126.795).abs() < 1e-3, "z = {}", pose.z);
    }

    #[test]
    fn test_b_equals_c_branch_satisfies_rods() {
        let map = coord_map();
        let xyz = map.xyz_from_rails(310.0, 300.0, 300.0);
        assert_eq!(xyz[0], 0.0);
        for len in rod_lengths(xyz, 310.0, 300.0, 300.0) {
            assert!((len - 200.0).abs() < 1e-9, "rod length {len}");
        }
    }

    #[test]
    fn test_general_branch_satisfies_rods() {
        let map = coord_map();
        for (a, b, c) in [(300.0, 310.0, 290.0), (250.0, 320.0, 280.0), (300.0, 300.01, 300.0)] {
            let xyz = map.xyz_from_rails(a, b, c);
            for len in rod_lengths(xyz, a, b, c) {
                assert!((len - 200.0).abs() < 1e-6, "rails ({a}, {b}, {c}) rod length {len}");
            }
            // effector hangs below every carriage
            assert!(xyz[2] < a.min(b).min(c));
        }
    }

    #[test]
    fn test_extruder_uses_its_own_scale() {
        let map = coord_map();
        let pose = map.xyze_from_mechanical(&[30000, 30000, 30000, 500]);
        assert_eq!(pose.e, 10.0);
        assert_eq!(map.steps_per_mm(AxisId::Extruder), 50.0);
        assert_eq!(map.steps_per_mm(AxisId::B), 100.0);
        assert_eq!(map.mm_per_step(AxisId::A), 0.01);
        assert_eq!(map.mm_per_step(AxisId::Extruder), 0.02);
    }

    #[test]
    fn test_home_position_keeps_extruder() {
        let map = coord_map();
        assert_eq!(map.home_position(&[12, -40, 7, 1234]), [30000, 30000, 30000, 1234]);
        assert_eq!(map.num_axis(), 4);
        assert_eq!(map.axis_position(&[1, 2, 3, 4], AxisId::C), 3);
    }

    #[test]
    fn test_from_config_uses_bed_level_matrix() {
        let mut config = DeltaConfig::default();
        config.bed_level = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 2.0]];
        let map = LinearDeltaCoordMap::from_config(&config);
        assert_eq!(map.apply_leveling([1.0, 2.0, 3.0]), [1.0, 2.0, 6.0]);
        assert_eq!(map.geometry().build_radius, 100.0);
    }
}
