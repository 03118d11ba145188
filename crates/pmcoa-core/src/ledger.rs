//! Durable CSV ledgers for completion and error tracking.
//!
//! A ledger is an append-only CSV file with a header row. Every append is
//! flushed and fsynced before returning, so after a crash the file lists
//! exactly the rows whose work was finished.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

/// Append-only CSV log keyed by one column.
pub struct Ledger {
    path: PathBuf,
    width: usize,
    key_col: usize,
    keys: FxHashSet<String>,
    rows: usize,
    writer: csv::Writer<File>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("path", &self.path)
            .field("rows", &self.rows)
            .finish_non_exhaustive()
    }
}

impl Ledger {
    /// Open (or create with `header`) the ledger at `path`.
    ///
    /// `key` names the identity column. When an existing file carries a
    /// different header, the column is looked up by name there.
    pub fn open(path: &Path, header: &[&str], key: &str) -> io::Result<Self> {
        let key_col = header.iter().position(|h| *h == key).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("key column {key:?} not in header"),
            )
        })?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        truncate_torn_row(path)?;
        let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let (keys, rows) = if is_new {
            (FxHashSet::default(), 0)
        } else {
            let keys = read_column(path, key)?;
            let rows = keys.len();
            (keys.into_iter().collect(), rows)
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer.write_record(header)?;
            writer.flush()?;
            writer.get_ref().sync_data()?;
        }

        log::debug!("ledger {}: {rows} rows", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            width: header.len(),
            key_col,
            keys,
            rows,
            writer,
        })
    }

    /// Whether a row with this identity was recorded.
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Number of data rows (header excluded, duplicates counted).
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Distinct identities recorded so far.
    pub fn keys(&self) -> &FxHashSet<String> {
        &self.keys
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row and make it durable before returning.
    pub fn append(&mut self, row: &[&str]) -> io::Result<()> {
        if row.len() != self.width {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "{}: row has {} fields, expected {}",
                    self.path.display(),
                    row.len(),
                    self.width
                ),
            ));
        }
        self.writer.write_record(row)?;
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.keys.insert(row[self.key_col].to_string());
        self.rows += 1;
        Ok(())
    }
}

/// Cut a final row left without its terminator by a crash mid-append.
///
/// The row's start is taken from the CSV reader, so a torn quoted field
/// spanning several lines is removed whole.
fn truncate_torn_row(path: &Path) -> io::Result<()> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if bytes.is_empty() || bytes.ends_with(b"\n") {
        return Ok(());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes.as_slice());
    let mut record = csv::ByteRecord::new();
    let mut last_start = 0;
    loop {
        let start = reader.position().byte();
        if !reader.read_byte_record(&mut record)? {
            break;
        }
        last_start = start;
    }

    log::warn!(
        "{}: dropping torn trailing row ({} bytes)",
        path.display(),
        bytes.len() as u64 - last_start
    );
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(last_start)?;
    file.sync_data()
}

/// Read one named column of a headered CSV, in file order.
///
/// A missing or empty file yields an empty list.
pub fn read_column(path: &Path, column: &str) -> io::Result<Vec<String>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Ok(Vec::new());
    }
    let idx = headers.iter().position(|h| h == column).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{}: no column {column:?}", path.display()),
        )
    })?;

    let mut out = Vec::new();
    for record in reader.records() {
        let record = record?;
        out.push(record.get(idx).unwrap_or_default().to_string());
    }
    Ok(out)
}

/// Count data rows of a headered CSV (0 when missing).
pub fn count_rows(path: &Path) -> io::Result<usize> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
    let mut n = 0;
    for record in reader.records() {
        record?;
        n += 1;
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &[&str] = &["Accession_ID", "json_path"];

    #[test]
    fn open_creates_file_with_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log_json/complete.csv");
        let ledger = Ledger::open(&path, HEADER, "Accession_ID").unwrap();
        assert!(ledger.is_empty());
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Accession_ID,json_path\n");
    }

    #[test]
    fn torn_trailing_row_is_cut_before_appending() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("complete.csv");
        fs::write(&path, "Accession_ID,json_path\nPMC1,json/a_0.json\nPMC2,json/a_").unwrap();

        let mut ledger = Ledger::open(&path, HEADER, "Accession_ID").unwrap();
        assert_eq!(ledger.len(), 1);
        assert!(!ledger.contains("PMC2"));
        ledger.append(&["PMC3", "json/a_0.json"]).unwrap();

        assert_eq!(read_column(&path, "Accession_ID").unwrap(), vec!["PMC1", "PMC3"]);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Accession_ID,json_path\nPMC1,json/a_0.json\nPMC3,json/a_0.json\n"
        );
    }

    #[test]
    fn torn_quoted_row_is_cut_whole() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("error.csv");
        fs::write(&path, "Accession_ID,Traceback\nPMC1,ok\nPMC2,\"line one\nline tw").unwrap();

        let ledger = Ledger::open(&path, &["Accession_ID", "Traceback"], "Accession_ID").unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Accession_ID,Traceback\nPMC1,ok\n"
        );
    }

    #[test]
    fn append_then_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("complete.csv");
        {
            let mut ledger = Ledger::open(&path, HEADER, "Accession_ID").unwrap();
            ledger.append(&["PMC1", "json/a_0.json"]).unwrap();
            ledger.append(&["PMC2", "json/a_0.json"]).unwrap();
            assert!(ledger.contains("PMC1"));
        }
        let ledger = Ledger::open(&path, HEADER, "Accession_ID").unwrap();
        assert_eq!(ledger.len(), 2);
        assert!(ledger.contains("PMC2"));
        assert!(!ledger.contains("PMC3"));
        // Header written once
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("Accession_ID").count(), 1);
    }

    #[test]
    fn multiline_field_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("error.csv");
        let header = &["Accession_ID", "Traceback"];
        {
            let mut ledger = Ledger::open(&path, header, "Accession_ID").unwrap();
            ledger.append(&["PMC9", "line one\nline, two"]).unwrap();
        }
        let tracebacks = read_column(&path, "Traceback").unwrap();
        assert_eq!(tracebacks, vec!["line one\nline, two"]);
        assert_eq!(count_rows(&path).unwrap(), 1);
    }

    #[test]
    fn duplicate_rows_count_separately() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("complete.csv");
        let mut ledger = Ledger::open(&path, HEADER, "Accession_ID").unwrap();
        ledger.append(&["PMC1", "a"]).unwrap();
        ledger.append(&["PMC1", "a"]).unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.keys().len(), 1);
    }

    #[test]
    fn wrong_width_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("complete.csv");
        let mut ledger = Ledger::open(&path, HEADER, "Accession_ID").unwrap();
        assert!(ledger.append(&["PMC1"]).is_err());
        assert!(ledger.is_empty());
    }

    #[test]
    fn unknown_key_column_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("complete.csv");
        assert!(Ledger::open(&path, HEADER, "PMID").is_err());
    }

    #[test]
    fn empty_file_gets_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("complete.csv");
        fs::write(&path, "").unwrap();
        let mut ledger = Ledger::open(&path, HEADER, "Accession_ID").unwrap();
        ledger.append(&["PMC1", "a"]).unwrap();
        assert_eq!(read_column(&path, "Accession_ID").unwrap(), vec!["PMC1"]);
    }

    #[test]
    fn read_column_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(read_column(&dir.path().join("nope.csv"), "x").unwrap().is_empty());
        assert_eq!(count_rows(&dir.path().join("nope.csv")).unwrap(), 0);
    }
}
