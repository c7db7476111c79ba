use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::sanitize;

/// Maps a raw metric name onto a measurement name.
pub type NameFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Maps a raw metric name onto an optional measurement source.
pub type SourceFn = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// An error returned when a source regex fails to compile.
#[derive(Debug, thiserror::Error)]
#[error("invalid source regex")]
pub struct SourceExtractorError(#[from] regex::Error);

/// Splits raw metric names into a measurement name and an optional source.
///
/// Both outputs are always [sanitized](sanitize).
#[derive(Clone, Default)]
pub enum SourceExtractor {
    /// Only sanitizes the name, never yields a source.
    #[default]
    None,
    /// Takes the first capture group as source and removes the whole match from the name.
    ///
    /// If the pattern does not match or the first group is empty, the name is only sanitized.
    Regex(Regex),
    /// Computes name and source with a pair of caller supplied functions.
    Function {
        /// Produces the measurement name.
        name: NameFn,
        /// Produces the measurement source.
        source: SourceFn,
    },
}

impl SourceExtractor {
    /// Creates a regex based extractor from a pattern.
    pub fn regex(pattern: &str) -> Result<Self, SourceExtractorError> {
        Ok(Self::Regex(Regex::new(pattern)?))
    }

    /// Creates an extractor from a pair of functions.
    pub fn function<N, S>(name: N, source: S) -> Self
    where
        N: Fn(&str) -> String + Send + Sync + 'static,
        S: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self::Function {
            name: Arc::new(name),
            source: Arc::new(source),
        }
    }

    /// Creates the extractor described by an optional regex pattern.
    pub fn from_pattern(pattern: Option<&str>) -> Result<Self, SourceExtractorError> {
        match pattern {
            Some(pattern) => Self::regex(pattern),
            None => Ok(Self::None),
        }
    }

    /// Returns the sanitized name and source for a raw metric name.
    pub fn extract(&self, raw: &str) -> (String, Option<String>) {
        match self {
            Self::None => (sanitize(raw), None),
            Self::Regex(regex) => {
                let matched = regex.captures(raw).and_then(|captures| {
                    let whole = captures.get(0)?;
                    let group = captures.get(1).filter(|group| !group.as_str().is_empty())?;
                    Some((whole.range(), group.as_str()))
                });

                match matched {
                    Some((range, source)) => {
                        let remainder = format!("{}{}", &raw[..range.start], &raw[range.end..]);
                        (sanitize(&remainder), Some(sanitize(source)))
                    }
                    None => (sanitize(raw), None),
                }
            }
            Self::Function { name, source } => {
                let source = source(raw).map(|source| sanitize(&source));
                (sanitize(&name(raw)), source)
            }
        }
    }
}

impl fmt::Debug for SourceExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Regex(regex) => f.debug_tuple("Regex").field(&regex.as_str()).finish(),
            Self::Function { .. } => f.debug_struct("Function").finish_non_exhaustive(),
        }
    }
}
