//! Gzip codec for backup artifacts.
//!
//! Both directions stream through `flate2` with constant memory and run on
//! the blocking thread pool. Output is written to a `.partial` sibling and
//! renamed into place only once complete, so a failed run never leaves a
//! truncated artifact under the final name. The input file is never
//! modified.

use anyhow::{anyhow, bail, Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::artifact::{with_suffix, COMPRESSED_SUFFIX};

const PARTIAL_SUFFIX: &str = ".partial";

/// Compress `path` into `<path>.gz` and return the new path.
pub async fn compress(path: &Path) -> Result<PathBuf> {
    let input = path.to_path_buf();
    let output = with_suffix(path, COMPRESSED_SUFFIX);
    let target = output.clone();

    tokio::task::spawn_blocking(move || {
        write_atomically(&target, |out| {
            let mut reader = BufReader::new(open(&input)?);
            let mut encoder = GzEncoder::new(out, Compression::default());
            std::io::copy(&mut reader, &mut encoder)?;
            encoder.finish()?.flush()?;
            Ok(())
        })
    })
    .await
    .map_err(|e| anyhow!("compression task failed: {}", e))??;

    tracing::debug!("Compressed {} to {}", path.display(), output.display());
    Ok(output)
}

/// Decompress `<name>.gz` into `<name>` and return the new path.
///
/// Fails if `path` does not end in `.gz`.
pub async fn decompress(path: &Path) -> Result<PathBuf> {
    let name = path.to_string_lossy();
    let Some(stripped) = name.strip_suffix(COMPRESSED_SUFFIX) else {
        bail!("{} is not a gzip artifact", path.display());
    };
    let output = PathBuf::from(stripped);
    let input = path.to_path_buf();
    let target = output.clone();

    tokio::task::spawn_blocking(move || {
        write_atomically(&target, |out| {
            let mut decoder = GzDecoder::new(BufReader::new(open(&input)?));
            std::io::copy(&mut decoder, out)?;
            out.flush()?;
            Ok(())
        })
    })
    .await
    .map_err(|e| anyhow!("decompression task failed: {}", e))??;

    tracing::debug!("Decompressed {} to {}", path.display(), output.display());
    Ok(output)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("failed to open {}", path.display()))
}

/// Run `fill` against a buffered temp file next to `target`, then sync and
/// rename it over `target`. The temp file is removed on any failure.
fn write_atomically<F>(target: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let partial = with_suffix(target, PARTIAL_SUFFIX);

    let result = (|| {
        let file = File::create(&partial)
            .with_context(|| format!("failed to create {}", partial.display()))?;
        let mut out = BufWriter::new(file);
        fill(&mut out)?;
        let file = out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        std::fs::rename(&partial, target)
            .with_context(|| format!("failed to move output to {}", target.display()))
    })();

    if result.is_err() {
        match std::fs::remove_file(&partial) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove {}: {}", partial.display(), e),
        }
    }
    result
}

/// Read every byte of a gzip file; used to check artifacts in tests.
#[cfg(test)]
pub(crate) fn read_gzip(path: &Path) -> Result<Vec<u8>> {
    use std::io::Read;

    let mut buf = Vec::new();
    GzDecoder::new(open(path)?).read_to_end(&mut buf)?;
    Ok(buf)
}
