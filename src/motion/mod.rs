// src/motion/mod.rs - Delta kinematics and bed leveling

pub mod bed_level;
pub mod kinematics;

pub use bed_level::{BedLevelTransform, IdentityLevel, Matrix3x3};
pub use kinematics::{CartesianPose, CoordMap, DeltaGeometry, LinearDeltaCoordMap, MechanicalPosition};
