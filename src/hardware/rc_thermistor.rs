// src/hardware/rc_thermistor.rs
//
// Temperature sensing without an ADC: a capacitor is charged through a digital
// pin, the pin is switched to an input, and the capacitor discharges through
// the thermistor. The time until the input reads LOW depends on the
// thermistor's resistance, which in turn gives the temperature.
//
// Circuit: pin -- Ra -- C -- Rt -- GND, with the pin sensing the node
// between Ra and C.
//
//   Va = Vcc * (1 - Ra/(Ra+Rt)) * e^(-t/(Rt*C))
//
// which cannot be solved for Rt symbolically, but solved for t gives
//
//   t = C * Rt * ln(Rt*Vcc / ((Ra+Rt)*Va))
//
// t grows monotonically with Rt, so Rt is found by bisection.

use std::time::{Duration, Instant};

use krusty_shared::config::ThermistorConfig;
use krusty_shared::hardware_traits::{IoLevel, IoPin};
use krusty_shared::{SystemClock, TimeInterface};

const ZERO_CELSIUS_IN_KELVIN: f64 = 273.15;

pub fn celsius_to_kelvin(c: f64) -> f64 {
    c + ZERO_CELSIUS_IN_KELVIN
}

pub fn kelvin_to_celsius(k: f64) -> f64 {
    k - ZERO_CELSIUS_IN_KELVIN
}

/// Circuit and thermistor constants for one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermistorParams {
    /// Ra, ohms. Keep it above ~300 to limit pin current.
    pub series_resistor: f64,
    /// C, farads.
    pub capacitance: f64,
    pub vcc: f64,
    /// Va: voltage below which the input reads LOW.
    pub threshold: f64,
    /// T0, the temperature at which the thermistor measures `r0`.
    pub t0_celsius: f64,
    pub r0: f64,
    pub beta: f64,
    /// Resistance search bracket, ohms.
    pub min_r: f64,
    pub max_r: f64,
}

impl ThermistorParams {
    /// Width at which the resistance bisection stops, ohms.
    pub const RESOLUTION: f64 = 2.0;
    const MAX_BISECTIONS: u32 = 1100;

    pub fn from_config(config: &ThermistorConfig) -> Self {
        Self {
            series_resistor: config.series_resistor,
            capacitance: config.capacitor_pf * 1e-12,
            vcc: config.vcc,
            threshold: config.threshold,
            t0_celsius: config.t0_celsius,
            r0: config.r0,
            beta: config.beta,
            min_r: config.min_r(),
            max_r: config.max_r(),
        }
    }

    /// Predicted discharge time in seconds for a thermistor resistance `rt`.
    pub fn discharge_time(&self, rt: f64) -> f64 {
        self.capacitance * rt * (rt * self.vcc / ((self.series_resistor + rt) * self.threshold)).ln()
    }

    /// Invert `discharge_time` by bisection over `[min_r, max_r]`.
    ///
    /// Measurements outside the bracket's range saturate at its ends.
    pub fn estimate_resistance(&self, secs: f64) -> f64 {
        let mut lower = self.min_r;
        let mut upper = self.max_r;
        // enough halvings to take any finite f64 bracket below RESOLUTION
        for _ in 0..Self::MAX_BISECTIONS {
            if upper - lower <= Self::RESOLUTION {
                break;
            }
            let rt = 0.5 * (upper + lower);
            if self.discharge_time(rt) < secs {
                lower = rt;
            } else {
                upper = rt;
            }
        }
        0.5 * (lower + upper)
    }

    /// Beta model: 1/T = 1/T0 + ln(R/R0)/B, with T in kelvin.
    pub fn temperature_from_resistance(&self, ohms: f64) -> f64 {
        let t0 = celsius_to_kelvin(self.t0_celsius);
        let kelvin = 1.0 / (1.0 / t0 + (ohms / self.r0).ln() / self.beta);
        kelvin_to_celsius(kelvin)
    }

    pub fn temperature_from_discharge(&self, secs: f64) -> f64 {
        let resistance = self.estimate_resistance(secs);
        tracing::trace!(resistance, "thermistor resistance guess");
        let temperature = self.temperature_from_resistance(resistance);
        tracing::trace!(temperature, "thermistor temperature guess");
        temperature
    }
}

impl Default for ThermistorParams {
    fn default() -> Self {
        Self::from_config(&ThermistorConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    Idle,
    Discharging,
    Ready,
}

/// One RC-timed thermistor channel.
///
/// Drive it as `start_read`, then `is_ready` until it returns true, then
/// `value`. A read that never completes (e.g. a disconnected thermistor) is
/// not timed out here; watch `time_since_start_read` and call `start_read`
/// again to abandon it.
#[derive(Debug)]
pub struct RcThermistor<P: IoPin, T: TimeInterface = SystemClock> {
    pin: P,
    clock: T,
    params: ThermistorParams,
    start: Option<Instant>,
    end: Option<Instant>,
}

impl<P: IoPin> RcThermistor<P, SystemClock> {
    pub fn new(pin: P, params: ThermistorParams) -> Self {
        Self::with_clock(pin, params, SystemClock)
    }
}

impl<P: IoPin, T: TimeInterface> RcThermistor<P, T> {
    pub fn with_clock(pin: P, params: ThermistorParams, clock: T) -> Self {
        tracing::debug!(pin = %pin.id(), ?params, "RC thermistor configured");
        Self {
            pin,
            clock,
            params,
            start: None,
            end: None,
        }
    }

    pub fn params(&self) -> &ThermistorParams {
        &self.params
    }

    pub fn state(&self) -> ReadState {
        match (self.start, self.end) {
            (None, _) => ReadState::Idle,
            (Some(_), None) => ReadState::Discharging,
            (Some(_), Some(_)) => ReadState::Ready,
        }
    }

    /// Release the pin and let the capacitor discharge through the thermistor.
    pub fn start_read(&mut self) {
        self.pin.make_digital_input();
        self.start = Some(self.clock.now_monotonic());
        self.end = None;
    }

    /// Poll the pin. Returns true once the input has dropped LOW, at which
    /// point the pin is driven HIGH again to recharge for the next read.
    pub fn is_ready(&mut self) -> bool {
        match self.state() {
            ReadState::Idle => false,
            ReadState::Ready => true,
            ReadState::Discharging => {
                if self.pin.digital_read() == IoLevel::High {
                    return false;
                }
                self.end = Some(self.clock.now_monotonic());
                self.pin.make_digital_output(IoLevel::High);
                true
            }
        }
    }

    /// Time since the last `start_read`, zero if no read was ever started.
    pub fn time_since_start_read(&self) -> Duration {
        self.start
            .map(|start| self.clock.now_monotonic().saturating_duration_since(start))
            .unwrap_or_default()
    }

    /// Measured discharge time of the last completed read.
    pub fn discharge_time(&self) -> Option<Duration> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(end.saturating_duration_since(start)),
            _ => None,
        }
    }

    /// Temperature in Celsius from the last completed read.
    pub fn value(&self) -> Option<f64> {
        let duration = self.discharge_time()?;
        tracing::trace!(?duration, "time to read resistor");
        Some(self.params.temperature_from_discharge(duration.as_secs_f64()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use krusty_shared::hardware_traits::NoPin;

    #[test]
    fn test_discharge_time_increases_with_resistance() {
        let params = ThermistorParams::default();
        let mut last = f64::NEG_INFINITY;
        for rt in [1_000.0, 10_000.0, 50_000.0, 100_000.0, 150_000.0, 199_000.0] {
            let t = params.discharge_time(rt);
            assert!(t > last);
            last = t;
        }
    }

    #[test]
    fn test_estimate_stays_in_bracket() {
        let params = ThermistorParams {
            min_r: 1_000.0,
            max_r: 50_000.0,
            ..ThermistorParams::default()
        };
        let too_fast = params.estimate_resistance(0.0);
        let too_slow = params.estimate_resistance(1.0);
        assert!(too_fast >= 1_000.0 && too_fast - 1_000.0 <= ThermistorParams::RESOLUTION);
        assert!(too_slow <= 50_000.0 && 50_000.0 - too_slow <= ThermistorParams::RESOLUTION);
    }

    #[test]
    fn test_estimate_terminates_on_unbounded_bracket() {
        let params = ThermistorParams {
            max_r: f64::INFINITY,
            ..ThermistorParams::default()
        };
        // only needs to return; the value itself is meaningless
        let _ = params.estimate_resistance(1e-5);
    }

    #[test]
    fn test_hotter_reads_lower_resistance() {
        let params = ThermistorParams::default();
        assert!(params.temperature_from_resistance(20_000.0) > params.temperature_from_resistance(100_000.0));
        assert!((celsius_to_kelvin(25.0) - 298.15).abs() < 1e-12);
        assert!((kelvin_to_celsius(273.15)).abs() < 1e-12);
    }

    #[test]
    fn test_idle_channel_has_no_value() {
        let mut sensor = RcThermistor::new(NoPin, ThermistorParams::default());
        assert_eq!(sensor.state(), ReadState::Idle);
        assert!(!sensor.is_ready());
        assert_eq!(sensor.value(), None);
        assert_eq!(sensor.time_since_start_read(), Duration::ZERO);
    }
}
