use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shipcalc_engine::{
    AccelerationCurve, AccelerationSimulator, BallisticSimulator, BallisticTable,
    DispersionEllipse, DispersionModel, EngineParams, FnDispersion, GunDispersion,
    HitPointSampler, HitPointSet, HullParams, ShellKind, ShellSpec, ShipClass, SpeedModifiers,
};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shipcalc")]
#[command(version)]
#[command(about = "Shell ballistics, dispersion and ship acceleration calculator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the ballistic table of a shell
    Ballistics {
        #[command(flatten)]
        shell: ShellArgs,

        /// Gun max range (meters)
        #[arg(long, default_value_t = 16000.0)]
        max_range: f64,

        /// Print every n-th table entry
        #[arg(long, default_value_t = 10)]
        every: usize,

        /// Output format
        #[arg(short = 'o', long, value_enum, default_value = "table")]
        output: OutputFormat,
    },

    /// Dispersion ellipse and simulated hit points at an aiming range
    Dispersion {
        #[command(flatten)]
        shell: ShellArgs,

        /// Gun max range (meters)
        #[arg(long, default_value_t = 16000.0)]
        max_range: f64,

        /// Aiming range (meters)
        #[arg(long)]
        aim_range: f64,

        /// Gun dispersion curve as JSON; overrides the fixed radii
        #[arg(long)]
        dispersion_file: Option<PathBuf>,

        /// Fixed horizontal radius (meters)
        #[arg(long, default_value_t = 100.0)]
        horizontal: f64,

        /// Fixed vertical radius (meters)
        #[arg(long, default_value_t = 60.0)]
        vertical: f64,

        /// Dispersion sigma
        #[arg(long, default_value_t = 2.0)]
        sigma: f64,

        /// Number of simulated shots
        #[arg(short = 'n', long, default_value_t = 1000)]
        shots: usize,

        /// Random seed; omitted means seeded from the OS
        #[arg(long)]
        seed: Option<u64>,

        /// Include every hit point in the output
        #[arg(long)]
        points: bool,

        /// Output format
        #[arg(short = 'o', long, value_enum, default_value = "table")]
        output: OutputFormat,
    },

    /// Speed curves for throttle changes
    Acceleration {
        /// Hull and engine parameters as JSON
        #[arg(long)]
        ship_file: Option<PathBuf>,

        /// Hull max speed (knots)
        #[arg(long, default_value_t = 30.0)]
        max_speed: f64,

        /// Displacement (tonnes)
        #[arg(long, default_value_t = 45000.0)]
        tonnage: f64,

        /// Engine power (hp)
        #[arg(long, default_value_t = 150000.0)]
        engine_power: f64,

        /// Seconds to full power ahead
        #[arg(long, default_value_t = 20.0)]
        forward_up_time: f64,

        /// Seconds to full power astern
        #[arg(long, default_value_t = 12.0)]
        backward_up_time: f64,

        /// Ship class
        #[arg(long, value_enum, default_value = "battleship")]
        class: ClassArg,

        /// Speed multiplier from upgrades and signals
        #[arg(long, default_value_t = 1.0)]
        speed_modifier: f64,

        /// Throttle positions to simulate (-1 astern .. 4 full ahead)
        #[arg(long = "throttle", value_delimiter = ',', allow_negative_numbers = true, default_values_t = vec![4, -1])]
        throttles: Vec<i32>,

        /// Output format
        #[arg(short = 'o', long, value_enum, default_value = "table")]
        output: OutputFormat,
    },

    /// Display engine information
    Info,
}

#[derive(Args)]
struct ShellArgs {
    /// Shell parameters as JSON; overrides the flags below
    #[arg(long)]
    shell_file: Option<PathBuf>,

    /// Caliber (meters)
    #[arg(short = 'd', long, default_value_t = 0.203)]
    caliber: f64,

    /// Mass (kg)
    #[arg(short = 'm', long, default_value_t = 118.0)]
    mass: f64,

    /// Muzzle velocity (m/s)
    #[arg(short = 'v', long, default_value_t = 820.0)]
    velocity: f64,

    /// Air drag coefficient
    #[arg(long, default_value_t = 0.321)]
    air_drag: f64,

    /// Krupp coefficient
    #[arg(long, default_value_t = 2400.0)]
    krupp: f64,

    /// Shell type
    #[arg(long, value_enum, default_value = "ap")]
    kind: KindArg,

    /// Flat penetration for HE and SAP (mm)
    #[arg(long, default_value_t = 0.0)]
    flat_penetration: f64,
}

impl ShellArgs {
    fn resolve(&self) -> Result<ShellSpec> {
        if let Some(path) = &self.shell_file {
            return read_json(path);
        }
        Ok(ShellSpec {
            caliber: self.caliber,
            mass: self.mass,
            muzzle_velocity: self.velocity,
            air_drag: self.air_drag,
            krupp: self.krupp,
            kind: self.kind.into(),
            flat_penetration: self.flat_penetration,
        })
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Ap,
    He,
    Sap,
}

impl From<KindArg> for ShellKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Ap => ShellKind::Ap,
            KindArg::He => ShellKind::He,
            KindArg::Sap => ShellKind::Sap,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ClassArg {
    Destroyer,
    Cruiser,
    Battleship,
    Carrier,
    Submarine,
}

impl From<ClassArg> for ShipClass {
    fn from(class: ClassArg) -> Self {
        match class {
            ClassArg::Destroyer => ShipClass::Destroyer,
            ClassArg::Cruiser => ShipClass::Cruiser,
            ClassArg::Battleship => ShipClass::Battleship,
            ClassArg::Carrier => ShipClass::AirCarrier,
            ClassArg::Submarine => ShipClass::Submarine,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

/// Ship description accepted by `--ship-file`
#[derive(serde::Deserialize)]
struct ShipFile {
    hull: HullParams,
    engine: EngineParams,
    class: ShipClass,
    #[serde(default)]
    modifiers: SpeedModifiers,
}

#[derive(Serialize)]
struct DispersionOutput {
    ellipse: DispersionEllipse,
    hits: HitPointSet,
}

#[derive(Serialize)]
struct TransitionOutput {
    throttle: i32,
    curve: Option<AccelerationCurve>,
    error: Option<String>,
}

#[derive(Serialize)]
struct AccelerationOutput {
    max_forward_speed: f64,
    max_reverse_speed: f64,
    transitions: Vec<TransitionOutput>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ballistics {
            shell,
            max_range,
            every,
            output,
        } => {
            let shell = shell.resolve()?;
            let table = BallisticSimulator::new()
                .simulate(&shell, max_range)
                .context("ballistic simulation failed")?;
            display_table(&table, every, output)?;
        }

        Commands::Dispersion {
            shell,
            max_range,
            aim_range,
            dispersion_file,
            horizontal,
            vertical,
            sigma,
            shots,
            seed,
            points,
            output,
        } => {
            let shell = shell.resolve()?;
            let table = BallisticSimulator::new()
                .simulate(&shell, max_range)
                .context("ballistic simulation failed")?;

            let model: Box<dyn DispersionModel> = match dispersion_file {
                Some(path) => Box::new(read_json::<GunDispersion>(&path)?),
                None => Box::new(FnDispersion::new(move |_| horizontal, move |_, _| vertical)),
            };
            let ellipse = DispersionEllipse::calculate(model.as_ref(), &table, aim_range, max_range);

            let mut hits = match seed {
                Some(seed) => HitPointSampler::seeded(seed).sample_ellipse(&ellipse, sigma, shots)?,
                None => HitPointSampler::from_entropy().sample_ellipse(&ellipse, sigma, shots)?,
            };
            if !points {
                hits.real.clear();
                hits.on_water.clear();
                hits.on_perpendicular.clear();
            }
            display_dispersion(DispersionOutput { ellipse, hits }, output)?;
        }

        Commands::Acceleration {
            ship_file,
            max_speed,
            tonnage,
            engine_power,
            forward_up_time,
            backward_up_time,
            class,
            speed_modifier,
            throttles,
            output,
        } => {
            let ship = match ship_file {
                Some(path) => read_json::<ShipFile>(&path)?,
                None => ShipFile {
                    hull: HullParams {
                        max_speed,
                        tonnage,
                        engine_power,
                        power_ratio_override: None,
                    },
                    engine: EngineParams {
                        speed_coef: 1.0,
                        forward_up_time,
                        backward_up_time,
                        forward_forsage: 1.0,
                        forward_forsage_max_speed: 0.0,
                        backward_forsage: 1.0,
                        backward_forsage_max_speed: 0.0,
                    },
                    class: class.into(),
                    modifiers: SpeedModifiers {
                        speed: speed_modifier,
                        ..Default::default()
                    },
                },
            };

            let report = AccelerationSimulator::new()
                .simulate(&ship.hull, &ship.engine, ship.class, &throttles, &ship.modifiers)
                .context("acceleration simulation failed")?;

            let result = AccelerationOutput {
                max_forward_speed: report.max_forward_speed,
                max_reverse_speed: report.max_reverse_speed,
                transitions: report
                    .transitions
                    .into_iter()
                    .map(|transition| match transition.outcome {
                        Ok(curve) => TransitionOutput {
                            throttle: transition.throttle,
                            curve: Some(curve),
                            error: None,
                        },
                        Err(err) => TransitionOutput {
                            throttle: transition.throttle,
                            curve: None,
                            error: Some(err.to_string()),
                        },
                    })
                    .collect(),
            };
            display_acceleration(&result, output)?;
        }

        Commands::Info => {
            println!("╔════════════════════════════════════════╗");
            println!("║      SHIPCALC ENGINE v{:<17}║", env!("CARGO_PKG_VERSION"));
            println!("╠════════════════════════════════════════╣");
            println!("║ Features:                              ║");
            println!("║ • Shell ballistic tables               ║");
            println!("║ • Standard atmosphere drag             ║");
            println!("║ • Dispersion ellipses and hit sampling ║");
            println!("║ • Ship acceleration curves             ║");
            println!("╚════════════════════════════════════════╝");
        }
    }

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("cannot parse {}", path.display()))
}

fn display_table(table: &BallisticTable, every: usize, format: OutputFormat) -> Result<()> {
    if table.is_empty() {
        bail!("ballistic table is empty");
    }
    let every = every.max(1);
    let last = table.len() - 1;
    let rows = table
        .iter()
        .enumerate()
        .filter(|(i, _)| i % every == 0 || *i == last)
        .map(|(_, entry)| entry);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(table)?);
        }

        OutputFormat::Csv => {
            println!("range,penetration,impact_velocity,flight_time,impact_angle");
            for entry in rows {
                let o = &entry.outcome;
                println!(
                    "{:.1},{:.1},{:.1},{:.2},{:.2}",
                    entry.range, o.penetration, o.impact_velocity, o.flight_time, o.impact_angle
                );
            }
        }

        OutputFormat::Table => {
            println!("┌──────────┬──────────┬──────────┬──────────┬──────────┐");
            println!("│ Range(m) │ Pen (mm) │ Vel(m/s) │ Time (s) │ Angle(°) │");
            println!("├──────────┼──────────┼──────────┼──────────┼──────────┤");
            for entry in rows {
                let o = &entry.outcome;
                println!(
                    "│ {:>8.0} │ {:>8.1} │ {:>8.1} │ {:>8.2} │ {:>8.2} │",
                    entry.range, o.penetration, o.impact_velocity, o.flight_time, o.impact_angle
                );
            }
            println!("└──────────┴──────────┴──────────┴──────────┴──────────┘");
        }
    }

    Ok(())
}

fn display_dispersion(result: DispersionOutput, format: OutputFormat) -> Result<()> {
    let ellipse = &result.ellipse;
    let hits = &result.hits;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        OutputFormat::Csv => {
            println!("x,y,y_on_water,y_on_perpendicular");
            for ((real, water), perp) in hits.real.iter().zip(&hits.on_water).zip(&hits.on_perpendicular) {
                println!("{:.2},{:.2},{:.2},{:.2}", real.x, real.y, water.y, perp.y);
            }
        }

        OutputFormat::Table => {
            if !ellipse.is_valid() {
                println!("No dispersion ellipse at {:.0} m: shell does not reach it", ellipse.aim_range);
                return Ok(());
            }
            println!("╔════════════════════════════════════════╗");
            println!("║         DISPERSION ELLIPSE             ║");
            println!("╠════════════════════════════════════════╣");
            println!("║ Aim Range:         {:>8.0} m          ║", ellipse.aim_range);
            println!("║ Impact Angle:      {:>8.2} °          ║", ellipse.impact_angle);
            println!("║ Horizontal:        {:>8.1} m          ║", ellipse.horizontal_radius);
            println!("║ Vertical:          {:>8.1} m          ║", ellipse.vertical_radius);
            println!("║ Vertical on Water: {:>8.1} m          ║", ellipse.vertical_radius_on_water);
            println!("║ Vertical Perp.:    {:>8.1} m          ║", ellipse.vertical_radius_on_perpendicular);
            println!("╠════════════════════════════════════════╣");
            println!("║ 50% OF HITS                            ║");
            println!("║ Horizontal:        {:>8.1} m          ║", hits.horizontal_radius_half_hit);
            println!("║ Vertical:          {:>8.1} m          ║", hits.vertical_radius_half_hit);
            println!("║ Vertical on Water: {:>8.1} m          ║", hits.vertical_radius_on_water_half_hit);
            println!("╚════════════════════════════════════════╝");
        }
    }

    Ok(())
}

fn display_acceleration(result: &AccelerationOutput, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }

        OutputFormat::Csv => {
            println!("throttle,time,speed");
            for transition in &result.transitions {
                if let Some(curve) = &transition.curve {
                    for sample in &curve.samples {
                        println!("{},{:.1},{:.3}", transition.throttle, sample.time, sample.speed);
                    }
                }
            }
        }

        OutputFormat::Table => {
            println!("Max speed ahead:  {:>6.2} kn", result.max_forward_speed);
            println!("Max speed astern: {:>6.2} kn", result.max_reverse_speed);
            println!("┌──────────┬──────────────┬──────────────┐");
            println!("│ Throttle │ To speed (s) │ To stop (s)  │");
            println!("├──────────┼──────────────┼──────────────┤");
            for transition in &result.transitions {
                match (&transition.curve, &transition.error) {
                    (Some(curve), _) => println!(
                        "│ {:>8} │ {:>12.1} │ {:>12.1} │",
                        transition.throttle, curve.time_to_speed, curve.time_to_stop
                    ),
                    (None, Some(err)) => println!("│ {:>8} │ {:<27} │", transition.throttle, err),
                    (None, None) => {}
                }
            }
            println!("└──────────┴──────────────┴──────────────┘");
        }
    }

    Ok(())
}
