use std::{
    fs::{self, File, FileTimes},
    io::{self, BufReader, BufWriter},
    path::{Path, PathBuf},
};

use flate2::{Compression, write::GzEncoder};
use thiserror::Error;
use walkdir::WalkDir;

pub const DEFAULT_EXTENSIONS: [&str; 3] = ["html", "js", "css"];

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("IO error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

trait IoContext<T> {
    fn at(self, path: &Path) -> Result<T, CompressError>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn at(self, path: &Path) -> Result<T, CompressError> {
        self.map_err(|source| CompressError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionReport {
    pub files: usize,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl CompressionReport {
    pub fn ratio(&self) -> f64 {
        if self.bytes_in == 0 {
            return 1.0;
        }
        self.bytes_out as f64 / self.bytes_in as f64
    }
}

/// Gzip every file below `data_dir` whose extension is in `extensions`.
///
/// A missing directory is not an error, the step simply has nothing to do.
/// Symlinked files are compressed, symlinked directories are not descended into.
pub fn compress_dir(
    data_dir: &Path,
    extensions: &[String],
) -> Result<CompressionReport, CompressError> {
    let mut report = CompressionReport::default();

    if !data_dir.is_dir() {
        tracing::warn!(
            "⚠️ Data directory {} does not exist, nothing to compress",
            data_dir.display()
        );
        return Ok(report);
    }

    for entry in WalkDir::new(data_dir) {
        let entry = entry?;
        // `Path::is_file` follows symlinks, `entry.file_type()` does not.
        if !entry.path().is_file() || !has_target_extension(entry.path(), extensions) {
            continue;
        }

        let (bytes_in, bytes_out) = compress_file(entry.path())?;
        tracing::debug!(
            "🗜️ {} ({bytes_in} -> {bytes_out} bytes)",
            entry.path().display()
        );
        report.files += 1;
        report.bytes_in += bytes_in;
        report.bytes_out += bytes_out;
    }

    Ok(report)
}

/// Write `<path>.gz` at maximum compression and give it the source's timestamps.
pub fn compress_file(path: &Path) -> Result<(u64, u64), CompressError> {
    let gz_path = gz_sibling(path);

    let mut reader = BufReader::new(File::open(path).at(path)?);
    let output = File::create(&gz_path).at(&gz_path)?;
    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::best());
    let bytes_in = io::copy(&mut reader, &mut encoder).at(path)?;
    // Read after copying so the access time reflects this read.
    let metadata = fs::metadata(path).at(path)?;

    let output = encoder
        .finish()
        .at(&gz_path)?
        .into_inner()
        .map_err(|error| error.into_error())
        .at(&gz_path)?;

    let times = FileTimes::new()
        .set_accessed(metadata.accessed().at(path)?)
        .set_modified(metadata.modified().at(path)?);
    output.set_times(times).at(&gz_path)?;

    let bytes_out = output.metadata().at(&gz_path)?.len();
    Ok((bytes_in, bytes_out))
}

pub fn gz_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

fn has_target_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            extensions
                .iter()
                .any(|wanted| wanted.trim_start_matches('.') == ext)
        })
}
