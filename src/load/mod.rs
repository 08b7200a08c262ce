// src/load/mod.rs
use anyhow::{Context, Result};
use std::{
    io::Cursor,
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{error, info, info_span, warn};

use crate::{
    archive::{derive_table_name, discover, extract_tabular_member},
    error::LoadError,
    store::TableStore,
    table::parse_csv,
};

/// What happened to one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Loaded { table: String, rows: u64 },
    /// The archive had no CSV member; the table was not touched.
    Skipped { table: String },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub archive: String,
    pub outcome: Outcome,
}

/// Per-archive results of one run, in processing order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub files: Vec<FileReport>,
}

impl RunSummary {
    pub fn loaded(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Loaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.outcome)).count()
    }
}

fn archive_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Extract, parse and write one archive. `Ok(None)` when it holds no CSV.
fn load_archive(
    store: &mut dyn TableStore,
    path: &Path,
    table: &str,
) -> Result<Option<u64>, LoadError> {
    let name = archive_name(path);
    let per_file = |source: anyhow::Error| LoadError::PerFile {
        archive: name.clone(),
        source,
    };

    let member = match extract_tabular_member(path).map_err(per_file)? {
        Some(m) => m,
        None => return Ok(None),
    };
    info!("  Extracting {}...", member.name);

    let rows = parse_csv(Cursor::new(member.bytes))
        .with_context(|| format!("parsing {}", member.name))
        .map_err(per_file)?;

    info!("  Loading {} rows into database...", rows.num_rows());
    let written = store
        .replace_table(table, &rows)
        .with_context(|| format!("writing table {}", table))
        .map_err(per_file)?;
    Ok(Some(written))
}

/// Load every archive in `dir` into `store`, one at a time.
///
/// A missing or empty directory is reported and yields an empty summary.
/// A failure inside one archive is logged and recorded; the batch moves on.
pub fn run<P: AsRef<Path>>(dir: P, store: &mut dyn TableStore) -> RunSummary {
    let dir = dir.as_ref();
    let mut summary = RunSummary::default();

    let archives: Vec<PathBuf> = match discover(dir) {
        Ok(found) if found.is_empty() => {
            warn!("{}", LoadError::NoArchivesFound(dir.to_path_buf()));
            return summary;
        }
        Ok(found) => found,
        Err(e) => {
            warn!("{}", e);
            return summary;
        }
    };

    info!("Found {} datasets to process.", archives.len());
    let start = Instant::now();

    for path in &archives {
        let archive = archive_name(path);
        let table = derive_table_name(&archive);
        let _span = info_span!("archive", name = %archive).entered();
        info!("Processing {} -> Table: {}...", archive, table);

        let outcome = match load_archive(store, path, &table) {
            Ok(Some(rows)) => {
                info!("  Successfully loaded {}.", table);
                Outcome::Loaded { table, rows }
            }
            Ok(None) => {
                let missing = LoadError::MemberMissing {
                    archive: archive.clone(),
                };
                warn!("  {}", missing);
                Outcome::Skipped { table }
            }
            Err(e) => {
                error!("  {}", e);
                Outcome::Failed {
                    message: e.to_string(),
                }
            }
        };
        summary.files.push(FileReport { archive, outcome });
    }

    info!(
        loaded = summary.loaded(),
        skipped = summary.skipped(),
        failed = summary.failed(),
        elapsed = ?start.elapsed(),
        "batch finished"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        archive::testutil::{write_lying_tar_xz, write_tar_xz},
        store::DuckStore,
    };
    use std::fs;
    use tempfile::TempDir;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,bronze_loader=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    fn all_rows(store: &DuckStore, table: &str) -> Result<Vec<(i64, i64)>> {
        let mut stmt = store
            .connection()
            .prepare(&format!("SELECT id, pts FROM \"{}\" ORDER BY id", table))?;
        let rows = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    #[test]
    fn loads_games_example() -> Result<()> {
        init_test_logging();
        let tmp = TempDir::new()?;
        write_tar_xz(
            &tmp.path().join("games_2023.tar.xz"),
            &[("games_2023.csv", "id,pts\n1,100\n2,88\n")],
        )?;

        let mut store = DuckStore::open_in_memory()?;
        let summary = run(tmp.path(), &mut store);

        assert_eq!(
            summary.files,
            vec![FileReport {
                archive: "games_2023.tar.xz".into(),
                outcome: Outcome::Loaded {
                    table: "games_2023".into(),
                    rows: 2
                },
            }]
        );
        assert_eq!(store.column_names("games_2023")?, vec!["id", "pts"]);
        assert_eq!(all_rows(&store, "games_2023")?, vec![(1, 100), (2, 88)]);
        Ok(())
    }

    #[test]
    fn rerun_is_idempotent() -> Result<()> {
        init_test_logging();
        let tmp = TempDir::new()?;
        write_tar_xz(
            &tmp.path().join("games.v1.tar.xz"),
            &[("g.csv", "id,pts\n3,30\n1,10\n2,20\n")],
        )?;

        let mut store = DuckStore::open_in_memory()?;
        let first = run(tmp.path(), &mut store);
        let after_first = all_rows(&store, "games_v1")?;
        let second = run(tmp.path(), &mut store);

        assert_eq!(first, second);
        assert_eq!(all_rows(&store, "games_v1")?, after_first);
        assert_eq!(store.row_count("games_v1")?, 3);
        Ok(())
    }

    #[test]
    fn archive_without_csv_leaves_table_untouched() -> Result<()> {
        init_test_logging();
        let tmp = TempDir::new()?;
        let mut store = DuckStore::open_in_memory()?;

        write_tar_xz(
            &tmp.path().join("scores.tar.xz"),
            &[("scores.csv", "id,pts\n7,70\n")],
        )?;
        run(tmp.path(), &mut store);

        write_tar_xz(
            &tmp.path().join("scores.tar.xz"),
            &[("scores.json", "{\"id\": 1}")],
        )?;
        let summary = run(tmp.path(), &mut store);

        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.loaded(), 0);
        assert_eq!(all_rows(&store, "scores")?, vec![(7, 70)]);
        Ok(())
    }

    #[test]
    fn corrupt_archive_does_not_stop_batch() -> Result<()> {
        init_test_logging();
        let tmp = TempDir::new()?;
        fs::write(tmp.path().join("a_broken.tar.xz"), b"not an archive")?;
        write_lying_tar_xz(
            &tmp.path().join("a_huge.tar.xz"),
            "huge.csv",
            1 << 40,
            "id,pts\n1,2\n",
        )?;
        write_tar_xz(
            &tmp.path().join("b_good.tar.xz"),
            &[("good.csv", "id,pts\n1,1\n")],
        )?;

        let mut store = DuckStore::open_in_memory()?;
        let summary = run(tmp.path(), &mut store);

        assert_eq!(summary.files.len(), 3);
        assert_eq!(summary.failed(), 2);
        assert_eq!(summary.loaded(), 1);
        for (report, archive) in summary.files.iter().zip(["a_broken.tar.xz", "a_huge.tar.xz"]) {
            match &report.outcome {
                Outcome::Failed { message } => assert!(message.contains(archive)),
                other => panic!("expected failure for {}, got {:?}", archive, other),
            }
        }
        assert!(!store.table_exists("a_broken")?);
        assert!(!store.table_exists("a_huge")?);
        assert_eq!(store.row_count("b_good")?, 1);
        Ok(())
    }

    #[test]
    fn malformed_csv_is_a_per_file_error() -> Result<()> {
        init_test_logging();
        let tmp = TempDir::new()?;
        write_tar_xz(
            &tmp.path().join("ragged.tar.xz"),
            &[("ragged.csv", "id,pts\n1,2,3\n")],
        )?;

        let mut store = DuckStore::open_in_memory()?;
        let summary = run(tmp.path(), &mut store);

        assert_eq!(summary.failed(), 1);
        assert!(!store.table_exists("ragged")?);
        Ok(())
    }

    #[test]
    fn missing_or_empty_directory_processes_nothing() -> Result<()> {
        init_test_logging();
        let tmp = TempDir::new()?;
        let mut store = DuckStore::open_in_memory()?;

        let summary = run(tmp.path().join("datasets"), &mut store);
        assert!(summary.files.is_empty());

        fs::write(tmp.path().join("readme.txt"), b"nothing to load")?;
        let summary = run(tmp.path(), &mut store);
        assert!(summary.files.is_empty());
        Ok(())
    }
}
