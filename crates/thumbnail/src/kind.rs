use std::path::Path;

/// Extensions that need the external RAW converter.
pub const RAW_EXTENSIONS: [&str; 2] = ["arw", "raf"];

/// Which backend a source image is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Camera-native formats, rendered by darktable.
    Raw,
    /// Everything else, scaled in-process.
    Standard,
}
impl SourceKind {
    pub fn from_extension(ext: &str) -> Self {
        match RAW_EXTENSIONS.iter().any(|raw| raw.eq_ignore_ascii_case(ext)) {
            true => Self::Raw,
            false => Self::Standard,
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref().extension().and_then(|ext| ext.to_str()).map(Self::from_extension).unwrap_or(Self::Standard)
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("DSC0001.arw", SourceKind::Raw)]
    #[case("DSC0001.ARW", SourceKind::Raw)]
    #[case("DSCF0001.raf", SourceKind::Raw)]
    #[case("IMG_0001.jpg", SourceKind::Standard)]
    #[case("IMG_0001.png", SourceKind::Standard)]
    #[case("IMG_0001.CR2", SourceKind::Standard)]
    #[case("arw", SourceKind::Standard)]
    #[case("no_extension", SourceKind::Standard)]
    fn test_from_path(#[case] path: &str, #[case] expected: SourceKind) {
        assert_eq!(SourceKind::from_path(path), expected);
    }
}
