use core::fmt;

/// Library-wide error for taildigest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SketchError {
    /// A caller handed in a value the sketch rejects: NaN samples, a
    /// non-finite CDF probe, a quantile outside [0,1], histogram bounds
    /// violations, or mismatched sample-log settings on merge.
    /// `context` pinpoints where it came from.
    BadInput { context: &'static str },

    /// A serialized buffer could not be understood: unknown encoding tag,
    /// truncated payload, or inconsistent header fields.
    BadFormat { context: &'static str },

    /// An internal invariant failed. This signals a defect in the sketch,
    /// never caller error; after it the digest's state is unspecified.
    Invariant { what: &'static str },
}

impl fmt::Display for SketchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SketchError::BadInput { context } => write!(
                f,
                "taildigest: bad input ({}). \
hint: drop NaN/out-of-range values before feeding the sketch",
                context
            ),
            SketchError::BadFormat { context } => {
                write!(f, "taildigest: malformed serialized sketch ({})", context)
            }
            SketchError::Invariant { what } => {
                write!(f, "taildigest: internal invariant violation: {}", what)
            }
        }
    }
}

impl std::error::Error for SketchError {}

pub type SketchResult<T> = Result<T, SketchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_actionable() {
        let e = SketchError::BadInput {
            context: "sample value",
        };
        let msg = e.to_string();
        assert!(msg.contains("sample value"));
        assert!(msg.contains("hint"));

        let e = SketchError::Invariant {
            what: "first centroid not a singleton",
        };
        assert!(e.to_string().contains("invariant"));
    }
}
