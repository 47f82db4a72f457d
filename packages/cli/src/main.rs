#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `road_gap` command-line driver.
//!
//! Each subcommand runs one stage of the pipeline on files: split a raw
//! upload by city, flatten coordinate literals into points, rebuild
//! polylines, merge line files, and select roads that meet restrictions.
//! Without a subcommand an interactive menu asks for the same inputs.
//!
//! Uses `indicatif-log-bridge` (via [`road_gap_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod commands;
mod interactive;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use road_gap_models::config::PipelineConfig;

#[derive(Parser)]
#[command(name = "road_gap", about = "Road segment restriction pipeline")]
struct Cli {
    /// TOML file with pipeline defaults (`batch_size`, `buffer_meters`,
    /// `split_chunk_size`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep the rows of a raw upload whose `grid_id` names a city
    Split {
        /// Raw CSV upload
        input: PathBuf,
        /// City name, the second token of `grid_id` (case-sensitive)
        #[arg(long)]
        city: String,
        /// Rows per output part
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Write one `{city}_full_data.csv` instead of parts
        #[arg(long)]
        whole: bool,
        /// Directory the output files are written to
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Expand `road_coordinates` into one row per point
    Flatten {
        /// Raw CSV with a `road_coordinates` column
        input: PathBuf,
        /// Flat point CSV to write
        #[arg(short, long)]
        output: PathBuf,
        /// Records parsed per batch
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Rebuild one line per segment from a flat point CSV
    Polyline {
        /// Flat point CSV, as written by `flatten`
        input: PathBuf,
        /// `GeoJSON` file to write
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Merge the lines of several `GeoJSON` files into one `MultiLineString`
    Merge {
        /// `GeoJSON` files, merged in the given order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// `GeoJSON` file to write
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Select roads that meet buffered restriction areas or restriction lines
    Intersect {
        /// Road `GeoJSON`
        #[arg(long)]
        roads: PathBuf,
        /// Restriction area `GeoJSON`
        #[arg(long)]
        areas: PathBuf,
        /// Restriction line `GeoJSON` (never buffered)
        #[arg(long)]
        lines: Option<PathBuf>,
        /// Buffer around restriction areas, in meters
        #[arg(long)]
        distance: Option<f64>,
        /// `GeoJSON` file to write
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = road_gap_cli_utils::init_logger();
    let cli = Cli::parse();

    let config = commands::load_config(cli.config.as_deref())?;

    let Some(command) = cli.command else {
        return interactive::run(&multi, &config);
    };

    match command {
        Commands::Split {
            input,
            city,
            chunk_size,
            whole,
            output_dir,
        } => {
            let config = PipelineConfig {
                split_chunk_size: chunk_size.unwrap_or(config.split_chunk_size),
                ..config
            };
            config.validate()?;
            let chunk_size = (!whole).then_some(config.split_chunk_size);
            commands::split(&input, &city, chunk_size, &output_dir)?;
        }
        Commands::Flatten {
            input,
            output,
            batch_size,
        } => {
            let config = PipelineConfig {
                batch_size: batch_size.unwrap_or(config.batch_size),
                ..config
            };
            config.validate()?;
            commands::flatten(&multi, &input, &output, config.batch_size)?;
        }
        Commands::Polyline { input, output } => {
            commands::polyline(&input, &output)?;
        }
        Commands::Merge { inputs, output } => {
            commands::merge(&multi, &inputs, &output)?;
        }
        Commands::Intersect {
            roads,
            areas,
            lines,
            distance,
            output,
        } => {
            let config = PipelineConfig {
                buffer_meters: distance.unwrap_or(config.buffer_meters),
                ..config
            };
            config.validate()?;
            commands::intersect(
                &multi,
                &commands::IntersectInputs {
                    roads: &roads,
                    areas: &areas,
                    lines: lines.as_deref(),
                },
                config.buffer_meters,
                &output,
            )?;
        }
    }

    Ok(())
}
