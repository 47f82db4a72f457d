//! File-level drivers for each pipeline stage.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use road_gap_cli_utils::{IndicatifProgress, MultiProgress};
use road_gap_flatten::{flatten_csv, split::filter_by_city};
use road_gap_geometry::io::{read_flat_points, read_geojson, write_geojson};
use road_gap_geometry::merge::merged_collection;
use road_gap_geometry::polyline::build_polylines;
use road_gap_models::config::PipelineConfig;
use road_gap_spatial::RestrictionMatcher;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Loads the pipeline config, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> CliResult<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };

    let text = std::fs::read_to_string(path)?;
    let config = PipelineConfig::from_toml_str(&text)?;
    log::info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Appends `.{extension}` unless the path already ends with it.
pub fn with_extension(path: &Path, extension: &str) -> PathBuf {
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
    {
        return path.to_path_buf();
    }

    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Extracts one city's rows. `chunk_size` of `None` writes a single file.
pub fn split(
    input: &Path,
    city: &str,
    chunk_size: Option<usize>,
    output_dir: &Path,
) -> CliResult {
    let extract = filter_by_city(BufReader::new(File::open(input)?), city)?;
    if extract.rows.is_empty() {
        log::warn!("No rows of {} belong to {city}", input.display());
    }

    std::fs::create_dir_all(output_dir)?;

    let written = match chunk_size {
        Some(chunk_size) => extract.write_parts(output_dir, chunk_size)?,
        None => vec![extract.write_full(output_dir)?],
    };
    log::info!(
        "Wrote {} file(s) for {city} to {}",
        written.len(),
        output_dir.display()
    );

    Ok(())
}

pub fn flatten(
    multi: &MultiProgress,
    input: &Path,
    output: &Path,
    batch_size: usize,
) -> CliResult {
    let output = with_extension(output, "csv");
    let reader = BufReader::new(File::open(input)?);
    let writer = BufWriter::new(File::create(&output)?);

    let progress = IndicatifProgress::records_bar(multi, "Flattening road coordinates");
    let report = flatten_csv(reader, writer, batch_size, progress.as_ref())?;

    log::info!(
        "Wrote {} points to {} ({} coordinates dropped)",
        report.points,
        output.display(),
        report.dropped_points
    );
    Ok(())
}

pub fn polyline(input: &Path, output: &Path) -> CliResult {
    let points = read_flat_points(BufReader::new(File::open(input)?))?;
    log::info!("Read {} points from {}", points.len(), input.display());

    let built = build_polylines(&points);
    write_geojson(&built.collection, &with_extension(output, "geojson"))?;
    Ok(())
}

/// Merges line files. Files that cannot be read are skipped.
pub fn merge(multi: &MultiProgress, inputs: &[PathBuf], output: &Path) -> CliResult {
    let progress = IndicatifProgress::steps_bar(multi, "Reading line files", inputs.len() as u64);

    let mut collections = Vec::with_capacity(inputs.len());
    for path in inputs {
        match read_geojson(path) {
            Ok(collection) => collections.push(collection),
            Err(e) => log::warn!("Skipping {}: {e}", path.display()),
        }
        progress.inc(1);
    }
    progress.finish(format!("Read {} of {} files", collections.len(), inputs.len()));

    let merged = merged_collection(&collections)?;
    write_geojson(&merged, &with_extension(output, "geojson"))?;
    Ok(())
}

/// Input files of the intersect stage.
pub struct IntersectInputs<'a> {
    pub roads: &'a Path,
    pub areas: &'a Path,
    pub lines: Option<&'a Path>,
}

pub fn intersect(
    multi: &MultiProgress,
    inputs: &IntersectInputs<'_>,
    distance_meters: f64,
    output: &Path,
) -> CliResult {
    let roads = read_geojson(inputs.roads)?;
    let areas = read_geojson(inputs.areas)?;
    let lines = inputs.lines.map(read_geojson).transpose()?;

    let outcome = RestrictionMatcher::new(distance_meters)
        .with_progress(IndicatifProgress::batch_bar(multi, "Matching roads"))
        .select(&roads, &areas, lines.as_ref())?;

    write_geojson(&outcome.roads, &with_extension(output, "geojson"))?;
    Ok(())
}
