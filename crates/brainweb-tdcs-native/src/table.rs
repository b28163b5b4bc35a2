//! Extraction and surrogate tables
//!
//! Both tables are `;`-separated with a header row. Input rows deserialise
//! into [`Record`]; the placement label, id and offset of every row must
//! agree. Output rows carry the sample and placement keys followed by the
//! regressed quantities.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use brainweb_tdcs_core::{FieldQuantity, Record};

use crate::error::{SurrogateError, SurrogateResult};
use crate::pipeline::SurrogateRun;
use crate::surrogate::SurrogateRecord;

/// Column separator of every study table
pub const DELIMITER: u8 = b';';

/// Key columns written before the predicted quantities
pub const KEY_COLUMNS: [&str; 12] = [
    "sub", "k", "k_id", "k_wm", "k_gm", "k_csf", "k_skl", "k_sft", "p", "p_id", "p_x", "p_y",
];

/// Read an extraction table from disk.
///
/// # Errors
///
/// Returns [`SurrogateError::InputFormat`] if the file cannot be opened or a
/// row is malformed.
pub fn read_records(path: impl AsRef<Path>) -> SurrogateResult<Vec<Record>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| SurrogateError::InputFormat {
        path: path.to_path_buf(),
        line: None,
        reason: format!("cannot open: {err}"),
    })?;

    let records = parse(file, path)?;
    tracing::info!(path = %path.display(), rows = records.len(), "Read extraction table");
    Ok(records)
}

/// Read an extraction table from any reader.
///
/// # Errors
///
/// As for [`read_records`].
pub fn read_records_from<R: Read>(reader: R) -> SurrogateResult<Vec<Record>> {
    parse(reader, Path::new("<stream>"))
}

fn parse<R: Read>(reader: R, path: &Path) -> SurrogateResult<Vec<Record>> {
    let malformed = |line: Option<u64>, reason: String| SurrogateError::InputFormat {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut reader = csv::ReaderBuilder::new().delimiter(DELIMITER).from_reader(reader);
    let headers = reader
        .headers()
        .map_err(|err| malformed(err.position().map(csv::Position::line), err.to_string()))?
        .clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|err| malformed(err.position().map(csv::Position::line), err.to_string()))?;
        let line = row.position().map(csv::Position::line);

        let record: Record =
            row.deserialize(Some(&headers)).map_err(|err| malformed(line, err.to_string()))?;
        record.check_placement().map_err(|err| malformed(line, err.to_string()))?;

        records.push(record);
    }

    Ok(records)
}

/// Write the reassembled records of `run` to `path`.
///
/// # Errors
///
/// Returns [`SurrogateError::Io`] if the file cannot be created or written.
pub fn write_surrogate_records(path: impl AsRef<Path>, run: &SurrogateRun) -> SurrogateResult<()> {
    let path = path.as_ref();
    let io_error = |source: io::Error| SurrogateError::Io { path: PathBuf::from(path), source };

    let file = File::create(path).map_err(io_error)?;
    write_surrogate_records_to(file, &run.records, &run.quantities).map_err(io_error)?;

    tracing::info!(path = %path.display(), rows = run.records.len(), "Wrote surrogate table");
    Ok(())
}

/// Write surrogate records with one column per quantity in `quantities`.
///
/// A record without a value for a listed quantity leaves that cell empty.
///
/// # Errors
///
/// Returns the underlying I/O error.
pub fn write_surrogate_records_to<W: Write>(
    writer: W,
    records: &[SurrogateRecord],
    quantities: &[FieldQuantity],
) -> io::Result<()> {
    let mut writer = csv::WriterBuilder::new().delimiter(DELIMITER).from_writer(writer);

    let header = KEY_COLUMNS.iter().copied().chain(quantities.iter().map(|q| q.column()));
    writer.write_record(header)?;

    for record in records {
        let k = record.sample.conductivities.as_slice();
        let (p_x, p_y) = record.placement.offset();
        let mut row = vec![
            record.sub.to_string(),
            record.sample.label(),
            record.sample.id.to_string(),
            k[0].to_string(),
            k[1].to_string(),
            k[2].to_string(),
            k[3].to_string(),
            k[4].to_string(),
            record.placement.label().to_string(),
            record.placement.id().to_string(),
            p_x.to_string(),
            p_y.to_string(),
        ];
        row.extend(
            quantities
                .iter()
                .map(|q| record.values.get(q).map_or_else(String::new, ToString::to_string)),
        );
        writer.write_record(&row)?;
    }

    writer.flush()
}
