use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use dense_prior_core::PointCloud;
use log::debug;
use tempfile::NamedTempFile;

use crate::{PlyEncoding, PlyError, Result, read_ply, write_ply};

/// Write `cloud` to `path` through a temporary sibling file.
///
/// The destination is replaced only after the whole payload was written and
/// flushed. On any failure the temporary file is removed and an existing
/// file at `path` is left untouched.
pub fn save_ply_atomic(path: &Path, cloud: &PointCloud, encoding: PlyEncoding) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        write_ply(&mut writer, cloud, encoding)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| PlyError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    debug!("wrote {} points to {}", cloud.len(), path.display());
    Ok(())
}

/// Read a PLY point cloud from disk.
pub fn load_ply(path: &Path) -> Result<PointCloud> {
    let file = File::open(path)?;
    read_ply(BufReader::new(file))
}
