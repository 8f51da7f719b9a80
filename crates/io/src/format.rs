use std::fmt;
use std::path::Path;

/// File formats with a dedicated decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanFormat {
    /// ASPRS LAS, raw or LAZ-compressed.
    Las,
    /// ASTM E57 scan container.
    E57,
    Ply,
    Pcd,
}

impl ScanFormat {
    pub const SUPPORTED: &'static str = ".ply, .pcd, .las/.laz, .e57";

    /// Map a lowercase extension such as `".laz"` onto its decoder.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            ".las" | ".laz" => Some(ScanFormat::Las),
            ".e57" => Some(ScanFormat::E57),
            ".ply" => Some(ScanFormat::Ply),
            ".pcd" => Some(ScanFormat::Pcd),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScanFormat::Las => "LAS",
            ScanFormat::E57 => "E57",
            ScanFormat::Ply => "PLY",
            ScanFormat::Pcd => "PCD",
        }
    }
}

impl fmt::Display for ScanFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lowercased extension including the leading dot, or `""` when the file
/// name has none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased_with_dot() {
        assert_eq!(extension_of(Path::new("/data/site.LAZ")), ".laz");
        assert_eq!(extension_of(Path::new("scan.tar.e57")), ".e57");
        assert_eq!(extension_of(Path::new("upload_123")), "");
        assert_eq!(extension_of(Path::new(".hidden")), "");
    }

    #[test]
    fn recognized_extensions() {
        assert_eq!(ScanFormat::from_extension(".las"), Some(ScanFormat::Las));
        assert_eq!(ScanFormat::from_extension(".laz"), Some(ScanFormat::Las));
        assert_eq!(ScanFormat::from_extension(".e57"), Some(ScanFormat::E57));
        assert_eq!(ScanFormat::from_extension(".ply"), Some(ScanFormat::Ply));
        assert_eq!(ScanFormat::from_extension(".pcd"), Some(ScanFormat::Pcd));
        assert_eq!(ScanFormat::from_extension(".bin"), None);
        assert_eq!(ScanFormat::from_extension(""), None);
    }
}
