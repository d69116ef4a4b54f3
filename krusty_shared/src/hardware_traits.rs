// Trait-based interfaces for modular hardware abstraction (shared)
//
// Drivers are generic over `IoPin` so that pin access is monomorphized into the
// hot timing path. `NoPin` stands in for any role that is not wired up.

use std::sync::{Arc, Mutex};

/// Logic level of a digital pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoLevel {
    Low,
    High,
}

impl IoLevel {
    pub fn is_high(self) -> bool {
        self == IoLevel::High
    }
}

impl From<bool> for IoLevel {
    fn from(high: bool) -> Self {
        if high { IoLevel::High } else { IoLevel::Low }
    }
}

/// Stable identifier used by the dispatcher to address a physical pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PinId(pub u32);

impl PinId {
    /// Id reported by pins that are not connected to anything.
    /// A dispatcher must drop output events addressed to it.
    pub const NULL: PinId = PinId(u32::MAX);

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

impl std::fmt::Display for PinId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "gpio(none)")
        } else {
            write!(f, "gpio{}", self.0)
        }
    }
}

/// Digital I/O capability consumed by the stepper and thermistor drivers.
pub trait IoPin {
    /// Configure the pin as an output and drive it to `level`.
    fn make_digital_output(&mut self, level: IoLevel);
    fn make_digital_input(&mut self);
    fn digital_write(&mut self, level: IoLevel);
    fn digital_read(&self) -> IoLevel;
    fn id(&self) -> PinId;
}

/// Pin that ignores all writes and always reads low.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoPin;

impl IoPin for NoPin {
    #[inline]
    fn make_digital_output(&mut self, _level: IoLevel) {}
    #[inline]
    fn make_digital_input(&mut self) {}
    #[inline]
    fn digital_write(&mut self, _level: IoLevel) {}
    #[inline]
    fn digital_read(&self) -> IoLevel {
        IoLevel::Low
    }
    #[inline]
    fn id(&self) -> PinId {
        PinId::NULL
    }
}

/// One observable action taken on a simulated pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinAction {
    MakeOutput(PinId, IoLevel),
    MakeInput(PinId),
    Write(PinId, IoLevel),
}

/// Shared, append-only record of pin actions across several `SimPin`s.
#[derive(Debug, Clone, Default)]
pub struct PinTrace {
    actions: Arc<Mutex<Vec<PinAction>>>,
}

impl PinTrace {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, action: PinAction) {
        if let Ok(mut actions) = self.actions.lock() {
            actions.push(action);
        }
    }

    pub fn actions(&self) -> Vec<PinAction> {
        self.actions.lock().map(|a| a.clone()).unwrap_or_default()
    }

    /// Actions that touched `pin`, in order.
    pub fn actions_for(&self, pin: PinId) -> Vec<PinAction> {
        self.actions()
            .into_iter()
            .filter(|action| match *action {
                PinAction::MakeOutput(id, _) | PinAction::MakeInput(id) | PinAction::Write(id, _) => {
                    id == pin
                }
            })
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut actions) = self.actions.lock() {
            actions.clear();
        }
    }
}

/// Simulated pin for the simulator and tests.
///
/// Every configuration change and write is appended to a shared `PinTrace`.
/// While configured as an input, reads are served from a script of levels
/// (the last scripted level repeats once the script runs out). While
/// configured as an output, reads return the driven level.
#[derive(Debug, Clone)]
pub struct SimPin {
    id: PinId,
    output: bool,
    level: IoLevel,
    input_script: Arc<Mutex<Vec<IoLevel>>>,
    trace: PinTrace,
}

impl SimPin {
    pub fn new(id: u32, trace: &PinTrace) -> Self {
        Self {
            id: PinId(id),
            output: false,
            level: IoLevel::Low,
            input_script: Arc::new(Mutex::new(Vec::new())),
            trace: trace.clone(),
        }
    }

    /// Queue levels to be returned by successive reads while in input mode.
    pub fn script_input(&self, levels: &[IoLevel]) {
        if let Ok(mut script) = self.input_script.lock() {
            script.extend_from_slice(levels);
        }
    }

    pub fn is_output(&self) -> bool {
        self.output
    }

    pub fn level(&self) -> IoLevel {
        self.level
    }
}

impl IoPin for SimPin {
    fn make_digital_output(&mut self, level: IoLevel) {
        self.output = true;
        self.level = level;
        self.trace.push(PinAction::MakeOutput(self.id, level));
    }

    fn make_digital_input(&mut self) {
        self.output = false;
        self.trace.push(PinAction::MakeInput(self.id));
    }

    fn digital_write(&mut self, level: IoLevel) {
        self.level = level;
        self.trace.push(PinAction::Write(self.id, level));
    }

    fn digital_read(&self) -> IoLevel {
        if self.output {
            return self.level;
        }
        match self.input_script.lock() {
            Ok(mut script) if script.len() > 1 => script.remove(0),
            Ok(script) => script.first().copied().unwrap_or(IoLevel::Low),
            Err(_) => IoLevel::Low,
        }
    }

    fn id(&self) -> PinId {
        self.id
    }
}
