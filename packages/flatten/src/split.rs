//! Extracts the rows of one city from a raw upload.
//!
//! The city is the second whitespace-separated token of the `grid_id`
//! column (`"G12 Jakarta 03"` belongs to `Jakarta`). Matching is exact and
//! case-sensitive. Rows are kept verbatim, including columns this crate
//! does not otherwise know about.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use csv::StringRecord;

use crate::FlattenError;

/// Column holding the grid key the city is taken from.
pub const GRID_COLUMN: &str = "grid_id";

/// Rows of one city, with the header of the source file.
#[derive(Debug, Clone)]
pub struct CityExtract {
    pub city: String,
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
}

/// Returns the city token of a `grid_id` value.
#[must_use]
pub fn city_of(grid_id: &str) -> Option<&str> {
    grid_id.split_whitespace().nth(1)
}

/// Reads a raw CSV and keeps the rows whose `grid_id` names `city`.
///
/// # Errors
///
/// Returns [`FlattenError::MissingColumn`] if the input has no `grid_id`
/// column, or [`FlattenError::Csv`] if it cannot be read.
pub fn filter_by_city<R: Read>(input: R, city: &str) -> Result<CityExtract, FlattenError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers = reader.headers()?.clone();
    let grid_index = headers
        .iter()
        .position(|h| h == GRID_COLUMN)
        .ok_or(FlattenError::MissingColumn {
            column: GRID_COLUMN,
        })?;

    let mut rows = Vec::new();
    let mut total = 0usize;
    for row in reader.records() {
        let row = row?;
        total += 1;
        if row.get(grid_index).and_then(city_of) == Some(city) {
            rows.push(row);
        }
    }

    log::info!("{} of {total} rows belong to {city}", rows.len());

    Ok(CityExtract {
        city: city.to_string(),
        headers,
        rows,
    })
}

impl CityExtract {
    /// File name used when the extract is written as one file.
    #[must_use]
    pub fn full_file_name(&self) -> String {
        format!("{}_full_data.csv", self.city)
    }

    /// File name of the `index`-th (1-based) part.
    #[must_use]
    pub fn part_file_name(&self, index: usize) -> String {
        format!("{}_data_part{index}.csv", self.city)
    }

    /// Writes `rows` (a slice of this extract) with the extract's header.
    ///
    /// # Errors
    ///
    /// Returns [`FlattenError`] if writing fails.
    pub fn write_rows<W: Write>(
        &self,
        rows: &[StringRecord],
        output: W,
    ) -> Result<(), FlattenError> {
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(output);
        writer.write_record(&self.headers)?;
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Writes the whole extract to `{city}_full_data.csv` in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`FlattenError`] if the file cannot be created or written.
    pub fn write_full(&self, dir: &Path) -> Result<PathBuf, FlattenError> {
        let path = dir.join(self.full_file_name());
        self.write_rows(&self.rows, std::fs::File::create(&path)?)?;
        Ok(path)
    }

    /// Writes the extract as `{city}_data_part{i}.csv` files of at most
    /// `chunk_size` rows each.
    ///
    /// # Errors
    ///
    /// Returns [`FlattenError::InvalidBatchSize`] for a zero `chunk_size`,
    /// or another [`FlattenError`] if a file cannot be written.
    pub fn write_parts(
        &self,
        dir: &Path,
        chunk_size: usize,
    ) -> Result<Vec<PathBuf>, FlattenError> {
        if chunk_size == 0 {
            return Err(FlattenError::InvalidBatchSize);
        }

        self.rows
            .chunks(chunk_size)
            .enumerate()
            .map(|(index, chunk)| -> Result<PathBuf, FlattenError> {
                let path = dir.join(self.part_file_name(index + 1));
                self.write_rows(chunk, std::fs::File::create(&path)?)?;
                log::info!("Wrote {} rows to {}", chunk.len(), path.display());
                Ok(path)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &str = "id,grid_id,road_coordinates\n\
                         1,G1 Jakarta 01,\"[[0,0],[1,1]]\"\n\
                         2,G2 Bandung 01,\"[[0,0],[1,1]]\"\n\
                         3,G3 Jakarta 02,\"[[2,2],[3,3]]\"\n\
                         4,Jakarta,\"[]\"\n\
                         5,G5 jakarta 01,\"[]\"\n";

    #[test]
    fn city_is_second_token() {
        assert_eq!(city_of("G12  Jakarta 03"), Some("Jakarta"));
        assert_eq!(city_of("Jakarta"), None);
        assert_eq!(city_of(""), None);
    }

    #[test]
    fn keeps_only_exact_city_matches() {
        let extract = filter_by_city(INPUT.as_bytes(), "Jakarta").unwrap();
        let ids: Vec<&str> = extract.rows.iter().filter_map(|r| r.get(0)).collect();
        assert_eq!(ids, ["1", "3"]);
    }

    #[test]
    fn missing_grid_column_is_an_error() {
        let err =
            filter_by_city("id,road_coordinates\n1,[]\n".as_bytes(), "Jakarta").unwrap_err();
        assert!(matches!(err, FlattenError::MissingColumn { column: "grid_id" }));
    }

    #[test]
    fn writes_rows_verbatim_with_header() {
        let extract = filter_by_city(INPUT.as_bytes(), "Bandung").unwrap();
        let mut output = Vec::new();
        extract.write_rows(&extract.rows, &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "id,grid_id,road_coordinates\n2,G2 Bandung 01,\"[[0,0],[1,1]]\"\n"
        );
    }

    #[test]
    fn ragged_rows_are_kept_verbatim() {
        let input = "id,grid_id,note\n\
                     1,G1 Jakarta 01,a\n\
                     2,G2 Jakarta 01,b,extra\n\
                     3,G3 Jakarta 01\n\
                     4,G4 Bandung 01,c\n";
        let extract = filter_by_city(input.as_bytes(), "Jakarta").unwrap();
        assert_eq!(extract.rows.len(), 3);

        let mut output = Vec::new();
        extract.write_rows(&extract.rows, &mut output).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "id,grid_id,note\n1,G1 Jakarta 01,a\n2,G2 Jakarta 01,b,extra\n3,G3 Jakarta 01\n"
        );
    }

    #[test]
    fn part_names_are_one_based() {
        let extract = filter_by_city(INPUT.as_bytes(), "Jakarta").unwrap();
        assert_eq!(extract.full_file_name(), "Jakarta_full_data.csv");
        assert_eq!(extract.part_file_name(1), "Jakarta_data_part1.csv");
    }
}
