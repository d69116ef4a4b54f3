// src/logging.rs - Diagnostic output configuration
//
// Diagnostics are a side channel: nothing in the core reads the log level, so
// turning tracing off never changes a computed value. Disabled levels cost a
// single level check at each call site.

use krusty_shared::config::{LogLevel, LoggingConfig};
use tracing::level_filters::LevelFilter;
use tracing::subscriber::DefaultGuard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Diagnostics {
    level: LogLevel,
}

impl Diagnostics {
    pub fn new(level: LogLevel) -> Self {
        Self { level }
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        Self::new(config.level)
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Verbose maps to TRACE, where kinematics branch selection and the
    /// thermistor's intermediate guesses are reported.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level {
            LogLevel::Quiet => LevelFilter::OFF,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Verbose => LevelFilter::TRACE,
        }
    }

    /// Install a fmt subscriber for the current thread. Logging stays on
    /// until the returned guard is dropped.
    pub fn install(&self) -> DiagnosticsGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(self.level_filter())
            .with_target(false)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        tracing::debug!(level = ?self.level, "diagnostics enabled");
        DiagnosticsGuard {
            level: self.level,
            _guard: guard,
        }
    }
}

/// Keeps diagnostics installed; dropping it tears them down.
pub struct DiagnosticsGuard {
    level: LogLevel,
    _guard: DefaultGuard,
}

impl DiagnosticsGuard {
    pub fn level(&self) -> LogLevel {
        self.level
    }
}

impl std::fmt::Debug for DiagnosticsGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticsGuard").field("level", &self.level).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::{CoordMap, DeltaGeometry, IdentityLevel, LinearDeltaCoordMap};

    #[test]
    fn test_level_mapping() {
        assert_eq!(Diagnostics::new(LogLevel::Quiet).level_filter(), LevelFilter::OFF);
        assert_eq!(Diagnostics::new(LogLevel::Info).level_filter(), LevelFilter::INFO);
        assert_eq!(Diagnostics::new(LogLevel::Debug).level_filter(), LevelFilter::DEBUG);
        assert_eq!(Diagnostics::new(LogLevel::Verbose).level_filter(), LevelFilter::TRACE);
        assert_eq!(Diagnostics::default().level(), LogLevel::Info);
    }

    #[test]
    fn test_results_do_not_depend_on_verbosity() {
        let map = LinearDeltaCoordMap::new(
            DeltaGeometry {
                r: 100.0,
                l: 200.0,
                h: 300.0,
                build_radius: 100.0,
                steps_per_mm: 100.0,
                steps_per_mm_extruder: 100.0,
            },
            IdentityLevel,
        );
        let mech = [30100, 29500, 30000, 0];

        let quiet = {
            let _guard = Diagnostics::new(LogLevel::Quiet).install();
            map.xyze_from_mechanical(&mech)
        };
        let verbose = {
            let guard = Diagnostics::new(LogLevel::Verbose).install();
            assert_eq!(guard.level(), LogLevel::Verbose);
            map.xyze_from_mechanical(&mech)
        };
        assert_eq!(quiet, verbose);
    }
}
