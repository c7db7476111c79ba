use crate::Measurement;

/// Summary statistics over the retained share of a sorted series of samples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Summary {
    /// Number of samples included.
    pub count: u64,
    /// Sum of included samples.
    pub sum: f64,
    /// Sum of squares of included samples.
    pub sum_squares: f64,
    /// Smallest included sample.
    pub min: f64,
    /// Largest included sample.
    pub max: f64,
}

impl Summary {
    /// Summarizes a sorted series at the given percentile.
    ///
    /// `values` must be sorted ascending. With `threshold = round((100 - percentile) / 100 * n)`,
    /// the top `n - threshold` samples are retained and summarized. Returns `None` if no samples
    /// are retained.
    ///
    /// ```
    /// use siphon_metrics::Summary;
    ///
    /// let summary = Summary::from_sorted(&[10.0, 20.0, 30.0, 40.0, 50.0], 50.0).unwrap();
    /// assert_eq!(summary.count, 2);
    /// assert_eq!((summary.min, summary.max), (40.0, 50.0));
    /// ```
    pub fn from_sorted(values: &[f64], percentile: f64) -> Option<Self> {
        let percentile = percentile.clamp(0.0, 100.0);
        let total = values.len();
        let threshold_index = ((100.0 - percentile) / 100.0 * total as f64).round() as usize;
        let count = total.saturating_sub(threshold_index);

        let included = &values[total - count..];
        let (&min, &max) = (included.first()?, included.last()?);

        Some(Self {
            count: count as u64,
            sum: included.iter().sum(),
            sum_squares: included.iter().map(|value| value * value).sum(),
            min,
            max,
        })
    }

    /// Converts this summary into an aggregate measurement.
    pub fn into_measurement(self, name: String) -> Measurement {
        Measurement::Aggregate {
            name,
            count: self.count,
            sum: self.sum,
            sum_squares: self.sum_squares,
            min: self.min,
            max: self.max,
            source: None,
        }
    }
}

/// Formats a percentile as a measurement name suffix, such as `90` or `99.9`.
pub fn percentile_suffix(percentile: f64) -> String {
    percentile.to_string()
}

/// Builds an aggregate measurement summarizing sorted samples at a percentile.
///
/// The measurement is called `name`, or `name.suffix` if a suffix is given. Returns `None` if no
/// samples are retained, see [`Summary::from_sorted`].
pub fn summarize(
    name: &str,
    values: &[f64],
    percentile: f64,
    suffix: Option<&str>,
) -> Option<Measurement> {
    let summary = Summary::from_sorted(values, percentile)?;
    let name = match suffix {
        Some(suffix) => format!("{name}.{suffix}"),
        None => name.to_owned(),
    };
    Some(summary.into_measurement(name))
}
