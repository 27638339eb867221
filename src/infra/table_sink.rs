// ============================================================
// Layer 6 — Table Sink
// ============================================================
// Writes an OutputTable as CSV.
//
// A sink is opened before any unit runs, so an unwritable
// destination fails the run up front instead of after hours of
// training. Opening only stages a temp file next to the
// destination; the destination itself is replaced in one rename
// once the table is written. A run that aborts drops its sinks
// and leaves any earlier results file untouched.
//
// Example output:
//   dataset,partition,algorithm,RMSE,MAE,Coverage
//   ML100K-fold1,1,item-mean,0.9641,0.7652,1
//   ML100K-fold1,1,item-knn,,,
//
// An empty field is a missing metric, never zero.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::domain::table::OutputTable;

/// A staged CSV destination for one table.
pub struct TableSink {
    path:   PathBuf,
    staged: NamedTempFile,
}

impl TableSink {
    /// Check that `path` can be written, creating parent directories
    /// as needed. The file at `path` is not touched until [`write`].
    ///
    /// [`write`]: TableSink::write
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();

        if path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("'{}' is a directory", path.display()),
            ));
        }

        let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                parent.to_path_buf()
            }
            None => PathBuf::from("."),
        };

        let staged = NamedTempFile::new_in(&parent)?;
        tracing::debug!("Staged output table '{}' at '{}'", path.display(), staged.path().display());

        Ok(Self { path, staged })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the header and every row, then move the staged file
    /// over the destination.
    pub fn write(mut self, table: &OutputTable) -> io::Result<()> {
        {
            let mut writer = csv::Writer::from_writer(&mut self.staged);
            writer.write_record(table.columns()).map_err(io::Error::from)?;

            for row in table.rows() {
                writer
                    .write_record(row.iter().map(|cell| cell.to_string()))
                    .map_err(io::Error::from)?;
            }
            writer.flush()?;
        }

        self.staged.persist(&self.path).map_err(|e| e.error)?;
        tracing::info!("Wrote {} rows to '{}'", table.len(), self.path.display());
        Ok(())
    }
}

/// The destinations a run writes to.
#[derive(Default)]
pub struct OutputSinks {
    pub global:     Option<TableSink>,
    pub per_entity: Option<TableSink>,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::{Cell, TableBuilder};

    #[test]
    fn writes_header_and_rows_with_blank_absent_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.csv");

        let mut builder = TableBuilder::new(vec!["dataset".into(), "algorithm".into(), "RMSE".into()]);
        builder.push(vec![Cell::from("d1"), Cell::from("a1"), Cell::Number(0.5)]);
        builder.push(vec![Cell::from("d1"), Cell::from("a2"), Cell::Absent]);

        TableSink::create(&path).unwrap().write(&builder.finish()).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, "dataset,algorithm,RMSE\nd1,a1,0.5\nd1,a2,\n");
    }

    #[test]
    fn existing_file_is_kept_until_the_table_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        fs::write(&path, "dataset,algorithm,RMSE\nd0,a0,0.1\n").unwrap();

        // Opened and dropped, as on an aborted run
        drop(TableSink::create(&path).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "dataset,algorithm,RMSE\nd0,a0,0.1\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);

        let mut builder = TableBuilder::new(vec!["dataset".into(), "algorithm".into(), "RMSE".into()]);
        builder.push(vec![Cell::from("d1"), Cell::from("a1"), Cell::Number(0.5)]);
        TableSink::create(&path).unwrap().write(&builder.finish()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "dataset,algorithm,RMSE\nd1,a1,0.5\n");
    }

    #[test]
    fn creation_fails_for_a_directory_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TableSink::create(dir.path()).is_err());
    }
}
