use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser};
use nosos::config::{Scenario, SimConfig, SyntheticConfig, DEFAULT_VISIT_DISTANCE_LAMBDA};
use nosos::coordinator::Coordinator;
use nosos::delivery::DeliveryMode;
use nosos::disease::DiseaseModel;
use nosos::error::NososError;
use nosos::log::{set_log_level, verbosity_level};
use nosos::readers::scenario::load_disease_model;
use nosos::ContactModel;

/// Agent-based epidemic simulation over partitioned people and location
/// shards.
#[derive(Parser, Debug)]
#[command(name = "nosos", version)]
struct Cli {
    /// Scenario directory holding people.csv, locations.csv, visits.csv,
    /// the JSON definitions, and the offset caches. Omit for a synthetic
    /// run on the configured grid.
    scenario_path: Option<PathBuf>,

    /// Full run configuration as JSON; overrides every other flag.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 100)]
    num_people: u64,

    #[arg(long, default_value_t = 100)]
    num_locations: u64,

    #[arg(long, default_value_t = 1)]
    num_people_partitions: usize,

    #[arg(long, default_value_t = 1)]
    num_location_partitions: usize,

    #[arg(long, default_value_t = 10)]
    num_days: u32,

    /// Days with distinct visit schedules in the activity data.
    #[arg(long, default_value_t = 1)]
    num_visit_days: u32,

    /// Synthetic location grid width.
    #[arg(long, default_value_t = 10)]
    grid_width: i64,

    /// Synthetic location grid height.
    #[arg(long, default_value_t = 10)]
    grid_height: i64,

    #[arg(long, default_value_t = 1)]
    partition_grid_cols: i64,

    #[arg(long, default_value_t = 1)]
    partition_grid_rows: i64,

    /// Mean visits per person per day in synthetic runs.
    #[arg(long, default_value_t = 4.0)]
    average_degree: f64,

    /// Mean grid hops from home to a visit destination.
    #[arg(long, default_value_t = DEFAULT_VISIT_DISTANCE_LAMBDA)]
    visit_distance_lambda: f64,

    /// Persons seeded into the disease progression at load.
    #[arg(long, default_value_t = 1)]
    initial_infections: u64,

    /// Apply the configured intervention strategy.
    #[arg(long)]
    interventions: bool,

    /// Random seed
    #[arg(short, long, default_value_t = 0)]
    random_seed: u64,

    /// Coalesce messages into batches of this size instead of sending each
    /// one directly.
    #[arg(long)]
    aggregate: Option<usize>,

    /// Contact model selection as JSON, e.g.
    /// '{"model":"constant_rate","transmissibility":1e-6}'.
    #[arg(long)]
    contact_model: Option<String>,

    /// Path for the summary matrix CSV.
    #[arg(short, long, default_value = "summary.csv")]
    output: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn build_config(&self) -> Result<SimConfig, NososError> {
        if let Some(path) = &self.config {
            return SimConfig::from_json(path);
        }
        let delivery = match self.aggregate {
            Some(capacity) => DeliveryMode::Aggregated { capacity },
            None => DeliveryMode::Direct,
        };
        let scenario = match &self.scenario_path {
            Some(path) => Scenario::Real { path: path.clone() },
            None => Scenario::Synthetic(SyntheticConfig {
                location_grid_width: self.grid_width,
                location_grid_height: self.grid_height,
                partition_grid_cols: self.partition_grid_cols,
                partition_grid_rows: self.partition_grid_rows,
                average_degree: self.average_degree,
                visit_distance_lambda: self.visit_distance_lambda,
            }),
        };
        let num_locations = match scenario {
            Scenario::Synthetic(_) => (self.grid_width * self.grid_height) as u64,
            Scenario::Real { .. } => self.num_locations,
        };
        Ok(SimConfig {
            num_people: self.num_people,
            num_locations,
            num_people_partitions: self.num_people_partitions,
            num_location_partitions: self.num_location_partitions,
            num_days: self.num_days,
            num_visit_days: self.num_visit_days,
            seed: self.random_seed,
            initial_infections: self.initial_infections,
            first_person_id: 0,
            first_location_id: 0,
            delivery,
            use_interventions: self.interventions,
            scenario,
        })
    }
}

fn run(cli: &Cli) -> Result<(), NososError> {
    let config = cli.build_config()?;
    config.validate()?;

    let disease = match &config.scenario {
        Scenario::Real { .. } => load_disease_model(&config)?,
        Scenario::Synthetic(_) => DiseaseModel::synthetic_default(config.use_interventions)?,
    };
    let contact = match &cli.contact_model {
        Some(json) => serde_json::from_str(json)?,
        None => ContactModel::default(),
    };

    let mut coordinator = Coordinator::new(config, disease, contact)?;
    let counts = coordinator.run()?;
    coordinator.write_stats(&cli.output)?;

    let total_visits: u64 = counts.iter().map(|c| c.visits).sum();
    let total_interactions: u64 = counts.iter().map(|c| c.interactions).sum();
    println!(
        "simulated {} days: {total_visits} visits, {total_interactions} interactions, \
         {} infectious at the end",
        counts.len(),
        coordinator.last_infectious()
    );
    println!("summary written to {}", cli.output.display());
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    set_log_level(verbosity_level(cli.verbose));
    if let Err(error) = run(&cli) {
        eprintln!("{error}");
        process::exit(1);
    }
}
