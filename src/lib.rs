//! Motion kinematics and pin-event synthesis for a Raspberry Pi driven linear delta printer.
//!
//! - [`motion`]: delta forward kinematics, travel bounds and bed leveling.
//! - [`hardware`]: the A4988 step sequence synthesizer and the RC-timed thermistor.
//! - [`logging`]: diagnostic output setup.
//!
//! Pin capabilities, step events, clocks and configuration live in `krusty_shared`
//! and are re-exported here.

pub mod hardware;
pub mod logging;
pub mod motion;

pub use krusty_shared::{
    AxisId, BoardConfig, Config, ConfigError, Event, IoLevel, IoPin, ManualClock, NoPin, OutputEvent,
    OutputQueue, PinId, SimPin, StepDirection, SystemClock, TimeInterface, load_config,
};
pub use hardware::{A4988, RcThermistor, ThermistorParams};
pub use motion::{CartesianPose, CoordMap, LinearDeltaCoordMap, MechanicalPosition};
