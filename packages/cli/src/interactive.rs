//! Menu-driven mode for running one pipeline stage without remembering
//! its flags.

use std::path::PathBuf;

use dialoguer::{Confirm, Input, Select};
use road_gap_cli_utils::MultiProgress;
use road_gap_models::config::PipelineConfig;

use crate::commands::{self, CliResult, IntersectInputs};

/// Pipeline stages offered by the menu.
enum Stage {
    Split,
    Flatten,
    Polyline,
    Merge,
    Intersect,
}

impl Stage {
    const ALL: &[Self] = &[
        Self::Split,
        Self::Flatten,
        Self::Polyline,
        Self::Merge,
        Self::Intersect,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Split => "Split a raw upload by city",
            Self::Flatten => "Flatten road coordinates into points",
            Self::Polyline => "Build polylines from flat points",
            Self::Merge => "Merge line files",
            Self::Intersect => "Select restricted roads",
        }
    }
}

/// Prompts for a stage and its inputs, then runs it.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected stage fails.
pub fn run(multi: &MultiProgress, config: &PipelineConfig) -> CliResult {
    println!("Road Gap Pipeline");
    println!();

    let labels: Vec<&str> = Stage::ALL.iter().map(Stage::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Stage::ALL[idx] {
        Stage::Split => {
            let input = prompt_path("Raw CSV upload")?;
            let city: String = Input::new().with_prompt("City").interact_text()?;
            let whole = Confirm::new()
                .with_prompt("Write a single file instead of parts?")
                .default(false)
                .interact()?;
            let chunk_size = if whole {
                None
            } else {
                Some(prompt_parsed("Rows per part", config.split_chunk_size)?)
            };
            let output_dir = prompt_path_default("Output directory", ".")?;
            commands::split(&input, &city, chunk_size, &output_dir)
        }
        Stage::Flatten => {
            let input = prompt_path("Raw CSV with road_coordinates")?;
            let output = prompt_path_default("Flat point CSV to write", "flattened.csv")?;
            let batch_size = prompt_parsed("Batch size", config.batch_size)?;
            commands::flatten(multi, &input, &output, batch_size)
        }
        Stage::Polyline => {
            let input = prompt_path("Flat point CSV")?;
            let output = prompt_path_default("GeoJSON to write", "polylines.geojson")?;
            commands::polyline(&input, &output)
        }
        Stage::Merge => {
            let list: String = Input::new()
                .with_prompt("GeoJSON files to merge (comma-separated, in order)")
                .interact_text()?;
            let inputs: Vec<PathBuf> = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect();
            let output = prompt_path_default("GeoJSON to write", "merged.geojson")?;
            commands::merge(multi, &inputs, &output)
        }
        Stage::Intersect => {
            let roads = prompt_path("Road GeoJSON")?;
            let areas = prompt_path("Restriction area GeoJSON")?;
            let lines: String = Input::new()
                .with_prompt("Restriction line GeoJSON (empty for none)")
                .allow_empty(true)
                .interact_text()?;
            let lines = (!lines.trim().is_empty()).then(|| PathBuf::from(lines.trim()));
            let distance = prompt_parsed("Buffer distance in meters", config.buffer_meters)?;
            let output = prompt_path_default("GeoJSON to write", "restricted_roads.geojson")?;

            let config = PipelineConfig {
                buffer_meters: distance,
                ..config.clone()
            };
            config.validate()?;

            commands::intersect(
                multi,
                &IntersectInputs {
                    roads: &roads,
                    areas: &areas,
                    lines: lines.as_deref(),
                },
                config.buffer_meters,
                &output,
            )
        }
    }
}

fn prompt_path(prompt: &str) -> CliResult<PathBuf> {
    let value: String = Input::new().with_prompt(prompt).interact_text()?;
    Ok(PathBuf::from(value.trim()))
}

fn prompt_path_default(prompt: &str, default: &str) -> CliResult<PathBuf> {
    let value: String = Input::new()
        .with_prompt(prompt)
        .default(default.to_string())
        .interact_text()?;
    Ok(PathBuf::from(value.trim()))
}

/// Prompts for a value, keeping `default` when the answer does not parse.
fn prompt_parsed<T>(prompt: &str, default: T) -> CliResult<T>
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    let value: String = Input::new()
        .with_prompt(prompt)
        .default(default.to_string())
        .interact_text()?;
    Ok(value.trim().parse().unwrap_or_else(|_| {
        log::warn!("Could not parse '{value}', using {default}");
        default
    }))
}
