// src/hardware/mod.rs - Pin-level drivers for stepper ICs and RC-timed sensors
pub mod a4988;
pub mod rc_thermistor;

pub use a4988::{A4988, STEP_SEQUENCE_LEN};
pub use rc_thermistor::{ReadState, RcThermistor, ThermistorParams};
pub use krusty_shared::hardware_traits;
