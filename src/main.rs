//! CLI over the delta core: forward kinematics, travel bounds, homing, step
//! sequences and thermistor conversion, driven by a TOML config.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{ArgAction, Parser, Subcommand};
use krusty_delta::hardware::{A4988, RcThermistor, ThermistorParams};
use krusty_delta::logging::Diagnostics;
use krusty_delta::motion::{CartesianPose, CoordMap, LinearDeltaCoordMap};
use krusty_delta::{
    AxisId, Config, Event, IoLevel, IoPin, ManualClock, PinId, SimPin, StepDirection, TimeInterface,
};
use krusty_shared::config::{LogLevel, ThermistorConfig};
use krusty_shared::hardware_traits::PinTrace;
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "krusty-delta", about = "Linear delta kinematics and pin-event tools.")]
struct Cli {
    /// Path to a TOML config file (overrides defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// More diagnostics (-v debug, -vv verbose)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// No diagnostics at all
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Cartesian pose for the given rail and extruder step counts
    #[command(allow_negative_numbers = true)]
    Forward {
        a: i32,
        b: i32,
        c: i32,
        #[arg(default_value_t = 0)]
        e: i32,
    },
    /// Clamp a Cartesian target into the reachable volume
    #[command(allow_negative_numbers = true)]
    Bound {
        x: f64,
        y: f64,
        z: f64,
        #[arg(default_value_t = 0.0)]
        e: f64,
        /// Apply the bed-level correction after bounding
        #[arg(long)]
        level: bool,
    },
    /// Mechanical position after homing
    #[command(allow_negative_numbers = true)]
    Home {
        /// Current extruder step count, kept across homing
        #[arg(long, default_value_t = 0)]
        e: i32,
    },
    /// Pin transitions for one step of a configured stepper
    Step {
        #[arg(long, default_value = "a")]
        stepper: String,
        #[arg(long, default_value_t = 0)]
        time_us: u64,
        #[arg(long)]
        backward: bool,
    },
    /// Temperature for a measured discharge time
    Thermistor {
        #[arg(long, default_value = "hotend")]
        name: String,
        /// Discharge time in microseconds
        discharge_us: f64,
    },
    /// Simulate a full read cycle against a modeled RC circuit
    Read {
        #[arg(long, default_value = "hotend")]
        name: String,
        /// Thermistor resistance in ohms; omit to simulate a disconnected sensor
        #[arg(long)]
        resistance: Option<f64>,
        #[arg(long, default_value_t = 10)]
        poll_ns: u64,
        #[arg(long, default_value_t = 10)]
        timeout_ms: u64,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("stepper `{0}` is not configured")]
    UnknownStepper(String),
    #[error("stepper `{0}` does not name an axis (expected a, b, c, e or extruder)")]
    UnknownAxis(String),
    #[error("thermistor resistance must be a positive number of ohms, got {0}")]
    InvalidResistance(f64),
    #[error("thermistor read on `{name}` did not complete within {elapsed:?}")]
    ReadStalled { name: String, elapsed: Duration },
}

/// Input pin whose level follows an RC discharge on a simulated clock.
struct SimulatedRcPin {
    id: PinId,
    clock: Arc<ManualClock>,
    discharge: Option<Duration>,
    released_at: Option<Instant>,
}

impl IoPin for SimulatedRcPin {
    fn make_digital_output(&mut self, _level: IoLevel) {
        self.released_at = None;
    }

    fn make_digital_input(&mut self) {
        self.released_at = Some(self.clock.now_monotonic());
    }

    fn digital_write(&mut self, _level: IoLevel) {}

    fn digital_read(&self) -> IoLevel {
        match (self.released_at, self.discharge) {
            (Some(released), Some(discharge)) => {
                let elapsed = self.clock.now_monotonic().saturating_duration_since(released);
                IoLevel::from(elapsed < discharge)
            }
            // still charged, or never discharging
            _ => IoLevel::High,
        }
    }

    fn id(&self) -> PinId {
        self.id
    }
}

fn diagnostics(cli: &Cli, config: &Config) -> Diagnostics {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => LogLevel::Quiet,
        (false, 0) => config.logging.level,
        (false, 1) => LogLevel::Debug,
        (false, _) => LogLevel::Verbose,
    };
    Diagnostics::new(level)
}

fn thermistor_config(config: &Config, name: &str) -> ThermistorConfig {
    match config.thermistor.get(name) {
        Some(thermistor) => thermistor.clone(),
        None => {
            tracing::info!("Thermistor '{}' not configured, using defaults", name);
            ThermistorConfig::default()
        }
    }
}

fn axis_for(stepper: &str) -> Result<AxisId, CliError> {
    match stepper.to_ascii_lowercase().as_str() {
        "a" => Ok(AxisId::A),
        "b" => Ok(AxisId::B),
        "c" => Ok(AxisId::C),
        "e" | "extruder" => Ok(AxisId::Extruder),
        _ => Err(CliError::UnknownAxis(stepper.to_string())),
    }
}

/// Time for the modeled circuit to cross the input threshold.
///
/// Resistances low enough that the capacitor starts below threshold read as
/// an immediate discharge.
fn simulated_discharge(params: &ThermistorParams, resistance: f64) -> Result<Duration, CliError> {
    if !(resistance.is_finite() && resistance > 0.0) {
        return Err(CliError::InvalidResistance(resistance));
    }
    let secs = params.discharge_time(resistance).max(0.0);
    Duration::try_from_secs_f64(secs).map_err(|_| CliError::InvalidResistance(resistance))
}

fn print_pose(pose: &CartesianPose) {
    println!("x={:.4} y={:.4} z={:.4} e={:.4}", pose.x, pose.y, pose.z, pose.e);
}

fn run(cli: &Cli, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let coord_map = LinearDeltaCoordMap::from_config(&config.delta);
    match &cli.command {
        Commands::Forward { a, b, c, e } => {
            print_pose(&coord_map.xyze_from_mechanical(&[*a, *b, *c, *e]));
        }
        Commands::Bound { x, y, z, e, level } => {
            let mut pose = coord_map.bound(CartesianPose::new(*x, *y, *z, *e));
            if *level {
                let [x, y, z] = coord_map.apply_leveling(pose.xyz());
                pose = CartesianPose::new(x, y, z, pose.e);
            }
            print_pose(&pose);
        }
        Commands::Home { e } => {
            let home = coord_map.home_position(&[0, 0, 0, *e]);
            println!("a={} b={} c={} e={}", home[0], home[1], home[2], home[3]);
        }
        Commands::Step { stepper, time_us, backward } => {
            let axis = axis_for(stepper)?;
            let stepper_config = config
                .stepper
                .get(stepper)
                .ok_or_else(|| CliError::UnknownStepper(stepper.clone()))?;
            let pins = stepper_config.resolve_pins(stepper, &config.board.board())?;
            let trace = PinTrace::new();
            let sim_pin = |pin: Option<PinId>| SimPin::new(pin.unwrap_or(PinId::NULL).0, &trace);
            let driver = A4988::with_settle_delay(
                sim_pin(pins.step),
                sim_pin(pins.dir),
                sim_pin(pins.enable),
                stepper_config.settle_delay(),
            );
            let direction = if *backward { StepDirection::Backward } else { StepDirection::Forward };
            let evt = Event::new(Duration::from_micros(*time_us), axis, direction);
            for out in driver.get_event_output_sequence(&evt) {
                println!("t={:?} {} -> {:?}", out.time(), out.pin(), out.level());
            }
        }
        Commands::Thermistor { name, discharge_us } => {
            let params = ThermistorParams::from_config(&thermistor_config(config, name));
            let secs = discharge_us * 1e-6;
            let resistance = params.estimate_resistance(secs);
            let temperature = params.temperature_from_resistance(resistance);
            println!("resistance={:.1} ohm temperature={:.2} C", resistance, temperature);
        }
        Commands::Read { name, resistance, poll_ns, timeout_ms } => {
            let params = ThermistorParams::from_config(&thermistor_config(config, name));
            let discharge = resistance.map(|rt| simulated_discharge(&params, rt)).transpose()?;
            let clock = Arc::new(ManualClock::new());
            let pin = SimulatedRcPin {
                id: PinId::NULL,
                clock: clock.clone(),
                discharge,
                released_at: None,
            };
            let mut sensor = RcThermistor::with_clock(pin, params, clock.clone());
            let poll = Duration::from_nanos((*poll_ns).max(1));
            let timeout = Duration::from_millis(*timeout_ms);

            sensor.start_read();
            while !sensor.is_ready() {
                if sensor.time_since_start_read() >= timeout {
                    return Err(CliError::ReadStalled {
                        name: name.clone(),
                        elapsed: sensor.time_since_start_read(),
                    }
                    .into());
                }
                clock.advance(poll);
            }
            if let (Some(elapsed), Some(temperature)) = (sensor.discharge_time(), sensor.value()) {
                println!("discharge={:?} temperature={:.2} C", elapsed, temperature);
            }
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => krusty_delta::load_config(&path.to_string_lossy())?,
        None => Config::default(),
    };
    let _diagnostics = diagnostics(&cli, &config).install();
    tracing::debug!("Loaded configuration: {:?}", cli.config);

    run(&cli, &config)
}
