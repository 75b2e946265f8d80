use crate::error::{ErrorKind, Result};

/// Target thumbnail size. A zero side is unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}
impl Default for Dimensions {
    fn default() -> Self {
        Self { width: 0, height: 500 }
    }
}
impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Output size for a `width`x`height` source, keeping its aspect ratio.
    ///
    /// With both sides set the image is fitted inside the box; with one side
    /// set the other follows from the ratio.
    pub fn fit(&self, width: u32, height: u32) -> Result<(u32, u32)> {
        if width == 0 || height == 0 {
            exn::bail!(ErrorKind::Decode);
        }
        let (w, h) = (f64::from(width), f64::from(height));
        let scale = match (self.width, self.height) {
            (0, 0) => exn::bail!(ErrorKind::MissingDimensions),
            (target, 0) => f64::from(target) / w,
            (0, target) => f64::from(target) / h,
            (tw, th) => (f64::from(tw) / w).min(f64::from(th) / h),
        };
        // Never round a side down to nothing.
        let scaled = |side: f64| ((side * scale).round() as u32).max(1);
        Ok((scaled(w), scaled(h)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    // Height only (the default): width follows the ratio.
    #[case(Dimensions::default(), (6000, 4000), (750, 500))]
    #[case(Dimensions::default(), (4000, 6000), (333, 500))]
    // Width only.
    #[case(Dimensions::new(300, 0), (6000, 4000), (300, 200))]
    // Both: fit inside the box.
    #[case(Dimensions::new(300, 300), (6000, 4000), (300, 200))]
    #[case(Dimensions::new(300, 300), (4000, 6000), (200, 300))]
    // Small sources are scaled up to the target like everything else.
    #[case(Dimensions::default(), (100, 50), (1000, 500))]
    // Extreme ratios keep at least one pixel.
    #[case(Dimensions::new(10, 0), (100_000, 1), (10, 1))]
    // ...and can grow very wide; the scaler refuses what it can't hold.
    #[case(Dimensions::default(), (20_000, 1), (10_000_000, 500))]
    fn test_fit(#[case] target: Dimensions, #[case] source: (u32, u32), #[case] expected: (u32, u32)) {
        assert_eq!(target.fit(source.0, source.1).unwrap(), expected);
    }

    #[test]
    fn test_missing_dimensions() {
        let err = Dimensions::new(0, 0).fit(100, 100).unwrap_err();
        assert!(matches!(&*err, ErrorKind::MissingDimensions));
    }
}
