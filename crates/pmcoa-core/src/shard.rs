//! Rotating JSON shard writer with atomic tmp→rename rewrites.
//!
//! A shard is a pretty-printed JSON array `<name>_<index>.json`. Every append
//! rewrites the whole array into `<file>.tmp`, fsyncs it and renames it over
//! the shard, so a reader only ever sees a complete array. Once a shard holds
//! `batch_size` records it is never written again.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

/// Appends records to `<dir>/<name>_<index>.json`, rotating at `batch_size`.
#[derive(Debug)]
pub struct ShardWriter {
    dir: PathBuf,
    name: String,
    batch_size: usize,
    index: usize,
    count: usize,
}

impl ShardWriter {
    /// Resume the highest-numbered shard for `name`, or start shard 0.
    pub fn open(dir: &Path, name: &str, batch_size: usize) -> io::Result<Self> {
        if batch_size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "shard batch size must be at least 1",
            ));
        }
        fs::create_dir_all(dir)?;
        remove_stale_tmp(dir, name)?;

        let mut writer = Self {
            dir: dir.to_path_buf(),
            name: name.to_string(),
            batch_size,
            index: 0,
            count: 0,
        };

        match list_shards(dir, name)?.last() {
            Some((index, path)) => {
                writer.index = *index;
                writer.count = load_or_reset(path)?.len();
                log::debug!(
                    "resuming shard {} with {} record(s)",
                    path.display(),
                    writer.count
                );
            }
            None => write_json_atomic(&writer.current_path(), &Vec::<Value>::new())?,
        }
        Ok(writer)
    }

    /// Path of the shard the next record goes to (before any rotation).
    pub fn current_path(&self) -> PathBuf {
        shard_path(&self.dir, &self.name, self.index)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Records in the current shard.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Records already in the current shard, under the same reset policy as `append`.
    pub fn current_records(&self) -> io::Result<Vec<Value>> {
        load_or_reset(&self.current_path())
    }

    /// Append one record, rotating first when the current shard is full.
    ///
    /// Returns the path of the shard the record landed in.
    pub fn append<T: Serialize>(&mut self, record: &T) -> io::Result<PathBuf> {
        let value = serde_json::to_value(record).map_err(io::Error::other)?;

        if self.count >= self.batch_size {
            self.rotate()?;
        }

        let path = self.current_path();
        let mut records = load_or_reset(&path)?;
        records.push(value);
        write_json_atomic(&path, &records)?;
        self.count = records.len();
        Ok(path)
    }

    /// Start the shard after the highest existing one.
    fn rotate(&mut self) -> io::Result<()> {
        let next = list_shards(&self.dir, &self.name)?
            .last()
            .map_or(self.index, |(i, _)| (*i).max(self.index))
            + 1;
        self.index = next;
        self.count = 0;
        let path = self.current_path();
        write_json_atomic(&path, &Vec::<Value>::new())?;
        log::info!("rotated to shard {}", path.display());
        Ok(())
    }
}

fn shard_path(dir: &Path, name: &str, index: usize) -> PathBuf {
    dir.join(format!("{name}_{index}.json"))
}

/// Load a shard for appending.
///
/// Content that does not parse as a JSON array is logged and dropped; any
/// other read error is returned so the shard is left untouched.
fn load_or_reset(path: &Path) -> io::Result<Vec<Value>> {
    match read_shard(path) {
        Ok(records) => Ok(records),
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            log::error!(
                "shard {} is corrupt ({e}); starting it over as empty",
                path.display()
            );
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

/// Read a shard's records. Missing or zero-length files read as empty.
pub fn read_shard(path: &Path) -> io::Result<Vec<Value>> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Shards of `name` in `dir`, sorted by index.
pub fn list_shards(dir: &Path, name: &str) -> io::Result<Vec<(usize, PathBuf)>> {
    let pattern = format!(
        "{}/{}_*.json",
        glob::Pattern::escape(&dir.to_string_lossy()),
        glob::Pattern::escape(name)
    );
    let prefix = format!("{name}_");

    let mut shards = Vec::new();
    for entry in glob::glob(&pattern).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))? {
        let path = entry.map_err(|e| e.into_error())?;
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some(suffix) = stem.strip_prefix(&prefix) else {
            continue;
        };
        // `<name>_<other>_<n>.json` belongs to another manifest
        if let Ok(index) = suffix.parse::<usize>() {
            shards.push((index, path));
        }
    }
    shards.sort_by_key(|(i, _)| *i);
    Ok(shards)
}

/// Serialize `value` as pretty JSON to `path` via fsynced tmp file + rename.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
    let tmp_path = tmp_path_for(path);
    {
        let file = File::create(&tmp_path)?;
        let mut buf = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut buf, value).map_err(io::Error::other)?;
        buf.flush()?;
        buf.get_ref().sync_all()?;
    }
    fs::rename(&tmp_path, path)
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Remove leftover `<name>_*.json.tmp` from a crashed rewrite.
fn remove_stale_tmp(dir: &Path, name: &str) -> io::Result<()> {
    let prefix = format!("{name}_");
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(file) = path.file_name().and_then(|f| f.to_str()) else {
            continue;
        };
        if file.starts_with(&prefix) && file.ends_with(".json.tmp") {
            log::warn!("Removing stale tmp file: {}", path.display());
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Remove every stale `.tmp` file in the output directory.
pub fn cleanup_tmp_files(output_dir: &Path) -> io::Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(output_dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "tmp") {
            log::warn!("Removing stale tmp file: {}", path.display());
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn counts(dir: &Path, name: &str) -> Vec<usize> {
        list_shards(dir, name)
            .unwrap()
            .iter()
            .map(|(_, p)| read_shard(p).unwrap().len())
            .collect()
    }

    #[test]
    fn open_creates_empty_shard_zero() {
        let dir = TempDir::new().unwrap();
        let writer = ShardWriter::open(dir.path(), "batch", 2).unwrap();
        assert_eq!(writer.index(), 0);
        assert_eq!(writer.count(), 0);
        let content = fs::read_to_string(dir.path().join("batch_0.json")).unwrap();
        assert_eq!(content, "[]");
    }

    #[test]
    fn rotation_two_per_shard() {
        let dir = TempDir::new().unwrap();
        let mut writer = ShardWriter::open(dir.path(), "batch", 2).unwrap();
        for i in 0..5 {
            writer.append(&json!({ "accession_id": format!("PMC{i}") })).unwrap();
        }
        assert_eq!(counts(dir.path(), "batch"), vec![2, 2, 1]);
        assert_eq!(writer.index(), 2);
    }

    #[test]
    fn records_keep_order() {
        let dir = TempDir::new().unwrap();
        let mut writer = ShardWriter::open(dir.path(), "b", 10).unwrap();
        writer.append(&json!({"id": 1})).unwrap();
        writer.append(&json!({"id": 2})).unwrap();
        let records = read_shard(&dir.path().join("b_0.json")).unwrap();
        assert_eq!(records, vec![json!({"id": 1}), json!({"id": 2})]);
    }

    #[test]
    fn reopen_never_overwrites_full_shard() {
        let dir = TempDir::new().unwrap();
        {
            let mut writer = ShardWriter::open(dir.path(), "b", 2).unwrap();
            writer.append(&json!(1)).unwrap();
            writer.append(&json!(2)).unwrap();
        }
        let mut writer = ShardWriter::open(dir.path(), "b", 2).unwrap();
        assert_eq!(writer.count(), 2);
        let landed = writer.append(&json!(3)).unwrap();
        assert_eq!(landed, dir.path().join("b_1.json"));
        assert_eq!(counts(dir.path(), "b"), vec![2, 1]);
    }

    #[test]
    fn reopen_resumes_partial_shard() {
        let dir = TempDir::new().unwrap();
        {
            let mut writer = ShardWriter::open(dir.path(), "b", 3).unwrap();
            writer.append(&json!(1)).unwrap();
        }
        let mut writer = ShardWriter::open(dir.path(), "b", 3).unwrap();
        assert_eq!(writer.count(), 1);
        writer.append(&json!(2)).unwrap();
        assert_eq!(counts(dir.path(), "b"), vec![2]);
    }

    #[test]
    fn rotation_skips_past_highest_existing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b_0.json"), "[1]").unwrap();
        fs::write(dir.path().join("b_7.json"), "[1, 2]").unwrap();
        let mut writer = ShardWriter::open(dir.path(), "b", 2).unwrap();
        assert_eq!(writer.index(), 7);
        let landed = writer.append(&json!(3)).unwrap();
        assert_eq!(landed, dir.path().join("b_8.json"));
    }

    #[test]
    fn corrupt_shard_restarts_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b_0.json"), "[{\"id\": 1},").unwrap();
        let mut writer = ShardWriter::open(dir.path(), "b", 5).unwrap();
        assert_eq!(writer.count(), 0);
        writer.append(&json!({"id": 2})).unwrap();
        let records = read_shard(&dir.path().join("b_0.json")).unwrap();
        assert_eq!(records, vec![json!({"id": 2})]);
    }

    #[test]
    fn unreadable_shard_is_an_error_not_a_reset() {
        let dir = TempDir::new().unwrap();
        // A directory where the shard should be: reading it fails with EISDIR
        let blocked = dir.path().join("b_0.json");
        fs::create_dir(&blocked).unwrap();
        fs::write(blocked.join("keep"), "data").unwrap();

        let err = ShardWriter::open(dir.path(), "b", 5).unwrap_err();
        assert_ne!(err.kind(), io::ErrorKind::InvalidData);
        assert!(blocked.join("keep").exists());
    }

    #[test]
    fn current_records_of_resumed_shard() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b_0.json"), r#"[{"id": 1}, {"id": 2}]"#).unwrap();
        let writer = ShardWriter::open(dir.path(), "b", 5).unwrap();
        assert_eq!(
            writer.current_records().unwrap(),
            vec![json!({"id": 1}), json!({"id": 2})]
        );
    }

    #[test]
    fn zero_length_shard_reads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("b_0.json");
        fs::write(&path, "").unwrap();
        assert!(read_shard(&path).unwrap().is_empty());
    }

    #[test]
    fn stale_tmp_removed_on_open() {
        let dir = TempDir::new().unwrap();
        let tmp = dir.path().join("b_0.json.tmp");
        fs::write(&tmp, "[").unwrap();
        let other = dir.path().join("other_0.json.tmp");
        fs::write(&other, "[").unwrap();
        ShardWriter::open(dir.path(), "b", 2).unwrap();
        assert!(!tmp.exists());
        assert!(other.exists());
    }

    #[test]
    fn list_shards_ignores_other_names() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b_1.json"), "[]").unwrap();
        fs::write(dir.path().join("b_10.json"), "[]").unwrap();
        fs::write(dir.path().join("b_x_2.json"), "[]").unwrap();
        fs::write(dir.path().join("bb_3.json"), "[]").unwrap();
        let indices: Vec<usize> = list_shards(dir.path(), "b")
            .unwrap()
            .into_iter()
            .map(|(i, _)| i)
            .collect();
        assert_eq!(indices, vec![1, 10]);
    }

    #[test]
    fn zero_batch_size_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(ShardWriter::open(dir.path(), "b", 0).is_err());
    }

    #[test]
    fn write_json_atomic_leaves_no_tmp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        write_json_atomic(&path, &vec![json!({"a": 1})]).unwrap();
        assert!(path.exists());
        assert_eq!(cleanup_tmp_files(dir.path()).unwrap(), 0);
    }

    #[test]
    fn cleanup_tmp_files_counts() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.json.tmp"), "").unwrap();
        fs::write(dir.path().join("b.json"), "[]").unwrap();
        assert_eq!(cleanup_tmp_files(dir.path()).unwrap(), 1);
        assert!(dir.path().join("b.json").exists());
    }
}
