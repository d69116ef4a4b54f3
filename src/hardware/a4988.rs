// src/hardware/a4988.rs
//
// The A4988 is a current-chopping stepper driver (StepStick, Pololu carriers).
// It is steered by two control pins, STEP and DIRECTION, plus an ENABLE line.
// A low -> high transition on STEP triggers one step; STEP must be held low
// and then high for at least 1us each.

use std::time::Duration;

use krusty_shared::config::DEFAULT_SETTLE_DELAY_US;
use krusty_shared::hardware_traits::{IoLevel, IoPin, NoPin};
use krusty_shared::{Event, OutputEvent, StepDirection};

/// Pin transitions emitted per step.
pub const STEP_SEQUENCE_LEN: usize = 3;

pub struct A4988<StepPin: IoPin = NoPin, DirPin: IoPin = NoPin, EnablePin: IoPin = NoPin> {
    step_pin: StepPin,
    dir_pin: DirPin,
    enable_pin: EnablePin,
    settle_delay: Duration,
}

impl<StepPin: IoPin, DirPin: IoPin, EnablePin: IoPin> A4988<StepPin, DirPin, EnablePin> {
    /// Configure STEP and DIRECTION as low outputs and ENABLE as a high
    /// output, which leaves the axis locked.
    pub fn new(step_pin: StepPin, dir_pin: DirPin, enable_pin: EnablePin) -> Self {
        Self::with_settle_delay(
            step_pin,
            dir_pin,
            enable_pin,
            Duration::from_micros(DEFAULT_SETTLE_DELAY_US),
        )
    }

    /// Like `new`, with a custom STEP low time. The delay must exceed the
    /// driver's minimum pulse width for the rising edge to register.
    pub fn with_settle_delay(
        mut step_pin: StepPin,
        mut dir_pin: DirPin,
        mut enable_pin: EnablePin,
        settle_delay: Duration,
    ) -> Self {
        step_pin.make_digital_output(IoLevel::Low);
        dir_pin.make_digital_output(IoLevel::Low);
        enable_pin.make_digital_output(IoLevel::High);
        tracing::debug!(
            step = %step_pin.id(),
            dir = %dir_pin.id(),
            enable = %enable_pin.id(),
            ?settle_delay,
            "A4988 configured"
        );
        Self {
            step_pin,
            dir_pin,
            enable_pin,
            settle_delay,
        }
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Energize the motor windings.
    ///
    /// Must not race a step sequence for this axis that is still being
    /// dispatched; the caller serializes the two.
    pub fn lock_axis(&mut self) {
        self.enable_pin.digital_write(IoLevel::High);
    }

    /// Let the motor spin freely.
    pub fn unlock_axis(&mut self) {
        self.enable_pin.digital_write(IoLevel::Low);
    }

    /// Pin writes that carry out `evt`, in the order they must happen.
    ///
    /// Direction is set first, then STEP is pulled low and raised again after
    /// the settle delay. Pulling it low first makes the rising edge happen even
    /// when the previous step left STEP high. Performs no I/O.
    pub fn get_event_output_sequence(&self, evt: &Event) -> [OutputEvent; STEP_SEQUENCE_LEN] {
        let dir_level = match evt.direction() {
            StepDirection::Forward => IoLevel::High,
            StepDirection::Backward => IoLevel::Low,
        };
        [
            OutputEvent::new(evt.time(), self.dir_pin.id(), dir_level),
            OutputEvent::new(evt.time(), self.step_pin.id(), IoLevel::Low),
            OutputEvent::new(evt.time() + self.settle_delay, self.step_pin.id(), IoLevel::High),
        ]
    }
}

impl<StepPin, DirPin, EnablePin> std::fmt::Debug for A4988<StepPin, DirPin, EnablePin>
where
    StepPin: IoPin,
    DirPin: IoPin,
    EnablePin: IoPin,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("A4988")
            .field("step_pin", &self.step_pin.id())
            .field("dir_pin", &self.dir_pin.id())
            .field("enable_pin", &self.enable_pin.id())
            .field("settle_delay", &self.settle_delay)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use krusty_shared::hardware_traits::{PinAction, PinId, PinTrace, SimPin};
    use krusty_shared::AxisId;

    #[test]
    fn test_construction_configures_pins() {
        let trace = PinTrace::new();
        let _driver = A4988::new(SimPin::new(17, &trace), SimPin::new(18, &trace), SimPin::new(22, &trace));
        assert_eq!(
            trace.actions(),
            vec![
                PinAction::MakeOutput(PinId(17), IoLevel::Low),
                PinAction::MakeOutput(PinId(18), IoLevel::Low),
                PinAction::MakeOutput(PinId(22), IoLevel::High),
            ]
        );
    }

    #[test]
    fn test_backward_step_sequence() {
        let trace = PinTrace::new();
        let driver = A4988::new(SimPin::new(17, &trace), SimPin::new(18, &trace), NoPin);
        let t = Duration::from_millis(5);
        let seq = driver.get_event_output_sequence(&Event::new(t, AxisId::B, StepDirection::Backward));
        assert_eq!(
            seq,
            [
                OutputEvent::new(t, PinId(18), IoLevel::Low),
                OutputEvent::new(t, PinId(17), IoLevel::Low),
                OutputEvent::new(t + Duration::from_micros(8), PinId(17), IoLevel::High),
            ]
        );
    }

    #[test]
    fn test_custom_settle_delay() {
        let driver: A4988 = A4988::with_settle_delay(NoPin, NoPin, NoPin, Duration::from_micros(3));
        let seq = driver.get_event_output_sequence(&Event::new(
            Duration::ZERO,
            AxisId::Extruder,
            StepDirection::Forward,
        ));
        assert_eq!(seq[2].time(), Duration::from_micros(3));
        assert!(seq.iter().all(|out| out.pin().is_null()));
    }
}
