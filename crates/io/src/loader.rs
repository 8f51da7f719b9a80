//! Path validation and decoder selection.
//!
//! A recognized extension picks exactly one decoder and its failure is final.
//! Anything else goes through [`FALLBACK`], an ordered table of strategies
//! where the first one producing a non-empty cloud wins and every failure is
//! kept for the final error message.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use tracing::{debug, info};
use voxdiff_core::PointCloud;

use crate::error::{DecodeError, IngestionError, StrategyFailure};
use crate::format::{extension_of, ScanFormat};
use crate::{e57, las, pcd, ply};

/// Bytes needed to tell the supported signatures apart.
const SIGNATURE_LEN: u64 = 8;

type Predicate = fn(&[u8]) -> bool;
type Decoder = fn(&Path) -> Result<PointCloud, DecodeError>;

/// One entry of the fallback table: a cheap signature test on the leading
/// bytes followed by the full decode.
pub struct Strategy {
    pub name: &'static str,
    pub accepts: Predicate,
    pub decode: Decoder,
}

/// Detection order for files whose extension does not name a format.
pub const FALLBACK: [Strategy; 3] = [
    Strategy {
        name: "las",
        accepts: las::has_signature,
        decode: |path| las::read_las(path),
    },
    Strategy {
        name: "e57",
        accepts: e57::has_signature,
        decode: |path| e57::read_e57(path),
    },
    Strategy {
        name: "generic",
        accepts: |_| true,
        decode: read_generic,
    },
];

/// Decoded outcome of a single strategy.
pub struct Attempt {
    pub strategy: &'static str,
    pub outcome: Result<PointCloud, DecodeError>,
}

impl Strategy {
    fn attempt(&self, path: &Path, head: &[u8]) -> Attempt {
        let outcome = if (self.accepts)(head) {
            (self.decode)(path).and_then(|cloud| {
                if cloud.is_empty() {
                    Err(DecodeError::Empty)
                } else {
                    Ok(cloud)
                }
            })
        } else {
            Err(DecodeError::SignatureMismatch)
        };
        Attempt {
            strategy: self.name,
            outcome,
        }
    }
}

/// Geometry formats without a binary signature: PLY when the `ply` magic is
/// present, PCD otherwise.
fn read_generic(path: &Path) -> Result<PointCloud, DecodeError> {
    let head = read_head(path)?;
    if head.starts_with(ply::MAGIC) {
        ply::read_ply(path)
    } else {
        pcd::read_pcd(path)
    }
}

fn read_head(path: &Path) -> io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(SIGNATURE_LEN as usize);
    File::open(path)?.take(SIGNATURE_LEN).read_to_end(&mut head)?;
    Ok(head)
}

fn decode_as(format: ScanFormat, path: &Path) -> Result<PointCloud, DecodeError> {
    match format {
        ScanFormat::Las => las::read_las(path),
        ScanFormat::E57 => e57::read_e57(path),
        ScanFormat::Ply => ply::read_ply(path),
        ScanFormat::Pcd => pcd::read_pcd(path),
    }
}

/// Load the point cloud stored at `path`.
pub fn load(path: impl AsRef<Path>) -> Result<PointCloud, IngestionError> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(IngestionError::InvalidPath);
    }
    if !path.exists() {
        return Err(IngestionError::NotFound(path.to_path_buf()));
    }
    if path.is_dir() {
        return Err(IngestionError::IsDirectory(path.to_path_buf()));
    }

    let extension = extension_of(path);
    let cloud = match ScanFormat::from_extension(&extension) {
        Some(format) => load_as(format, path)?,
        None => detect(path, extension)?,
    };

    let aabb = cloud.aabb();
    info!(
        path = %path.display(),
        points = cloud.len(),
        extent = ?aabb.extent(),
        "loaded scan"
    );
    Ok(cloud)
}

fn load_as(format: ScanFormat, path: &Path) -> Result<PointCloud, IngestionError> {
    debug!(%format, path = %path.display(), "decoding by extension");
    decode_as(format, path).map_err(|source| match source {
        DecodeError::NoScans => IngestionError::NoScans(path.to_path_buf()),
        source => IngestionError::Decode {
            format,
            path: path.to_path_buf(),
            source,
        },
    })
}

fn detect(path: &Path, extension: String) -> Result<PointCloud, IngestionError> {
    debug!(extension = %extension, path = %path.display(), "extension not recognized, probing decoders");
    let head = read_head(path).map_err(|source| IngestionError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let mut attempts = Vec::with_capacity(FALLBACK.len());
    for strategy in &FALLBACK {
        let attempt = strategy.attempt(path, &head);
        match attempt.outcome {
            Ok(cloud) => {
                debug!(strategy = attempt.strategy, "strategy accepted file");
                return Ok(cloud);
            }
            Err(error) => {
                debug!(strategy = attempt.strategy, %error, "strategy rejected file");
                attempts.push(StrategyFailure {
                    strategy: attempt.strategy,
                    error,
                });
            }
        }
    }

    Err(IngestionError::Undetected {
        extension,
        path: path.to_path_buf(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{Builder, TempDir};

    fn cube_cloud() -> PointCloud {
        PointCloud::from_points(&[[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [0.5, 0.25, 0.75]])
    }

    #[test]
    fn empty_path_is_invalid() {
        assert!(matches!(load(""), Err(IngestionError::InvalidPath)));
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = load("/tmp/voxdiff_no_such_scan_98765.ply").unwrap_err();
        assert!(matches!(err, IngestionError::NotFound(_)));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn directory_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, IngestionError::IsDirectory(_)));
        assert!(err.to_string().contains("is a directory"));
    }

    #[test]
    fn ply_by_extension() {
        let tmp = Builder::new().suffix(".PLY").tempfile().unwrap();
        ply::write_ply(tmp.path(), &cube_cloud()).unwrap();
        assert_eq!(load(tmp.path()).unwrap(), cube_cloud());
    }

    #[test]
    fn empty_ply_by_extension_is_valid() {
        let tmp = Builder::new().suffix(".ply").tempfile().unwrap();
        ply::write_ply(tmp.path(), &PointCloud::new()).unwrap();
        assert!(load(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn corrupt_ply_fails_without_fallback() {
        let tmp = Builder::new().suffix(".ply").tempfile().unwrap();
        // valid PCD content must not rescue a file that claims to be PLY
        pcd::write_pcd(tmp.path(), &cube_cloud()).unwrap();
        let err = load(tmp.path()).unwrap_err();
        assert!(matches!(
            err,
            IngestionError::Decode {
                format: ScanFormat::Ply,
                ..
            }
        ));
    }

    #[test]
    fn pcd_without_extension_detected() {
        let tmp = Builder::new().tempfile().unwrap();
        pcd::write_pcd(tmp.path(), &cube_cloud()).unwrap();
        assert_eq!(load(tmp.path()).unwrap(), cube_cloud());
    }

    #[test]
    fn ply_with_wrong_extension_detected() {
        let tmp = Builder::new().suffix(".upload").tempfile().unwrap();
        ply::write_ply(tmp.path(), &cube_cloud()).unwrap();
        assert_eq!(load(tmp.path()).unwrap(), cube_cloud());
    }

    #[test]
    fn empty_generic_result_is_not_a_match() {
        let tmp = Builder::new().tempfile().unwrap();
        ply::write_ply(tmp.path(), &PointCloud::new()).unwrap();
        match load(tmp.path()).unwrap_err() {
            IngestionError::Undetected { attempts, .. } => {
                assert_eq!(attempts.len(), 3);
                assert!(matches!(attempts[2].error, DecodeError::Empty));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn undetectable_reports_every_strategy() {
        let tmp = Builder::new().tempfile().unwrap();
        fs::write(tmp.path(), b"\x7fELF not a scan at all").unwrap();
        let err = load(tmp.path()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("''"), "{msg}");
        assert!(msg.contains(&format!("{:?}", tmp.path())), "{msg}");
        match err {
            IngestionError::Undetected { extension, attempts, .. } => {
                assert_eq!(extension, "");
                let names: Vec<_> = attempts.iter().map(|a| a.strategy).collect();
                assert_eq!(names, ["las", "e57", "generic"]);
                assert!(matches!(attempts[0].error, DecodeError::SignatureMismatch));
                assert!(matches!(attempts[1].error, DecodeError::SignatureMismatch));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn e57_without_scans_by_extension() {
        let tmp = Builder::new().suffix(".e57").tempfile().unwrap();
        let mut writer = ::e57::E57Writer::from_file(tmp.path(), "voxdiff-empty").unwrap();
        writer.finalize().unwrap();

        let err = load(tmp.path()).unwrap_err();
        assert!(matches!(err, IngestionError::NoScans(_)));
        assert!(err.to_string().contains("no scans"));
    }

    #[test]
    fn e57_without_scans_in_fallback_is_a_failed_attempt() {
        let tmp = Builder::new().suffix(".bin").tempfile().unwrap();
        let mut writer = ::e57::E57Writer::from_file(tmp.path(), "voxdiff-empty").unwrap();
        writer.finalize().unwrap();

        match load(tmp.path()).unwrap_err() {
            IngestionError::Undetected { extension, attempts, .. } => {
                assert_eq!(extension, ".bin");
                assert!(matches!(attempts[1].error, DecodeError::NoScans));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
