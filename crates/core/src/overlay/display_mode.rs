use std::str::FromStr;

/// How detections are rendered onto a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DisplayMode {
    /// Hollow boxes only, no text.
    BoxesOnly,
    /// Boxes plus the confidence score.
    Confidence,
    /// Boxes plus class name and confidence.
    #[default]
    Full,
    /// Gaussian blur over each detected box instead of an outline.
    Censored,
}

impl FromStr for DisplayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boxes" | "boxes_only" => Ok(Self::BoxesOnly),
            "confidence" => Ok(Self::Confidence),
            "full" | "normal" => Ok(Self::Full),
            "censored" => Ok(Self::Censored),
            other => Err(format!(
                "unknown display mode {other:?} (expected boxes, confidence, full, or censored)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_full() {
        assert_eq!(DisplayMode::default(), DisplayMode::Full);
    }

    #[test]
    fn test_parse_all_modes() {
        assert_eq!("boxes".parse::<DisplayMode>().unwrap(), DisplayMode::BoxesOnly);
        assert_eq!(
            "confidence".parse::<DisplayMode>().unwrap(),
            DisplayMode::Confidence
        );
        assert_eq!("full".parse::<DisplayMode>().unwrap(), DisplayMode::Full);
        assert_eq!(
            "censored".parse::<DisplayMode>().unwrap(),
            DisplayMode::Censored
        );
    }

    #[test]
    fn test_parse_unknown_errors() {
        assert!("wireframe".parse::<DisplayMode>().is_err());
    }
}
