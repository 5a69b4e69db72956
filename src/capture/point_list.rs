use crate::errors::{RowDefect, ValidationError};
use crate::models::{SplitLine, Vertex};
use itertools::Itertools;
use std::path::Path;

const HEADER: [&str; 2] = ["Latitude", "Longitude"];

fn row_text(record: &csv::StringRecord) -> String {
    record.iter().join(",")
}

fn parse_coordinate(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_record(record: &csv::StringRecord) -> Result<Vertex, RowDefect> {
    if record.len() != 2 {
        return Err(RowDefect::WrongTokenCount(record.len()));
    }

    let lat = parse_coordinate(&record[0]).ok_or(RowDefect::NotNumeric)?;
    let lon = parse_coordinate(&record[1]).ok_or(RowDefect::NotNumeric)?;

    if !(-90.0..=90.0).contains(&lat) {
        return Err(RowDefect::LatitudeOutOfRange(lat));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(RowDefect::LongitudeOutOfRange(lon));
    }

    Ok(Vertex::from_lat_lon(lat, lon))
}

/// Parses `lat,lng` rows. Blank rows are ignored. With `allow_header`, a
/// leading row mentioning "latitude" anywhere is skipped.
///
/// All or nothing: the first bad row fails the whole batch.
pub fn parse_rows(text: &str, allow_header: bool) -> Result<Vec<Vertex>, ValidationError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut points = Vec::new();
    let mut first = true;

    for result in reader.records() {
        let record = result.map_err(|e| ValidationError::MalformedRow {
            row: e.position().map(|p| p.line() as usize).unwrap_or(0),
            line: String::new(),
            defect: RowDefect::NotNumeric,
        })?;

        if record.iter().all(str::is_empty) {
            continue;
        }

        if std::mem::take(&mut first)
            && allow_header
            && row_text(&record).to_lowercase().contains("latitude")
        {
            continue;
        }

        let row = record.position().map(|p| p.line() as usize).unwrap_or(0);
        let vertex = parse_record(&record).map_err(|defect| ValidationError::MalformedRow {
            row,
            line: row_text(&record),
            defect,
        })?;
        points.push(vertex);
    }

    Ok(points)
}

/// One `lat,lng` row per point, six decimals.
pub fn export_text(points: &[Vertex]) -> String {
    points
        .iter()
        .map(|p| format!("{:.6},{:.6}", p.lat, p.lon))
        .join("\n")
}

/// Same rows as [`export_text`] under a `Latitude,Longitude` header.
pub fn export_csv(points: &[Vertex]) -> Result<String, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(HEADER)?;
    for p in points {
        writer.write_record([format!("{:.6}", p.lat), format!("{:.6}", p.lon)])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Coordinates typed, pasted or imported as text. All of them form a single
/// split line once there are at least two.
#[derive(Clone, Debug, Default)]
pub struct PointListCapture {
    points: Vec<Vertex>,
}

impl PointListCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a pasted batch. Returns how many points were added.
    pub fn add_text(&mut self, text: &str) -> Result<usize, ValidationError> {
        self.append(parse_rows(text, false)?)
    }

    /// Appends the contents of an imported file, header row allowed.
    pub fn add_import(&mut self, contents: &str) -> Result<usize, ValidationError> {
        self.append(parse_rows(contents, true)?)
    }

    pub async fn import_file(&mut self, path: &Path) -> Result<usize, ValidationError> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            ValidationError::UnreadableImport {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        self.add_import(&contents)
    }

    fn append(&mut self, batch: Vec<Vertex>) -> Result<usize, ValidationError> {
        let added = batch.len();
        self.points.extend(batch);
        Ok(added)
    }

    pub fn remove_point(&mut self, index: usize) -> Result<Vertex, ValidationError> {
        if index >= self.points.len() {
            return Err(ValidationError::NoSuchPoint {
                index,
                len: self.points.len(),
            });
        }
        Ok(self.points.remove(index))
    }

    pub fn undo_point(&mut self) -> Option<Vertex> {
        self.points.pop()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn points(&self) -> &[Vertex] {
        &self.points
    }

    pub fn line(&self) -> Option<SplitLine> {
        SplitLine::new(self.points.clone())
    }
}
