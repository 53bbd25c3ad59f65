use crate::timebucket::TimeBucketer;

/// Statistics describing how strongly a set of measurements follows the time of day.
///
/// Undefined quantities (no defined values, zero variance) are `None` rather than NaN.
#[derive(Clone, Debug, PartialEq)]
pub struct Energy {
    pub nrows: usize,
    pub nan: usize,
    pub mean: Option<f64>,
    /// Mean value in each time-of-day bucket; `None` for empty buckets.
    pub sum_buckets: Vec<Option<f64>>,
    /// Variance across the defined bucket means.
    pub tsig: Option<f64>,
    /// Fraction of the total variance explained by the bucket means.
    pub ratio: Option<f64>,
    /// `ratio` shrunk towards zero for small samples.
    pub nratio: Option<f64>,
}

#[derive(Clone, Copy, Debug)]
pub struct EnergyScorer {
    bucketer: TimeBucketer,
}

#[derive(Clone, Copy, Default)]
struct BucketAcc {
    sum: f64,
    count: u32,
}

impl EnergyScorer {
    pub fn new(bucketer: TimeBucketer) -> EnergyScorer {
        EnergyScorer { bucketer }
    }

    pub fn bucketer(&self) -> &TimeBucketer {
        &self.bucketer
    }

    pub fn bucket_count(&self) -> usize {
        self.bucketer.count() as usize
    }

    /// Score `(bucket label, value)` samples.
    pub fn score<I>(&self, samples: I) -> Energy
    where
        I: IntoIterator<Item = (usize, Option<f64>)>,
    {
        let mut buckets = vec![BucketAcc::default(); self.bucket_count()];
        let mut values: Vec<f64> = Vec::new();
        let mut nrows: usize = 0;
        let mut nan: usize = 0;
        for (bucket, value) in samples {
            nrows += 1;
            let v = match value {
                Some(v) if v.is_finite() => v,
                _ => {
                    nan += 1;
                    continue;
                }
            };
            values.push(v);
            debug_assert!(bucket < buckets.len());
            if let Some(acc) = buckets.get_mut(bucket) {
                acc.sum += v;
                acc.count += 1;
            }
        }

        let sum_buckets: Vec<Option<f64>> = buckets
            .iter()
            .map(|acc| {
                if acc.count == 0 {
                    None
                } else {
                    Some(acc.sum / f64::from(acc.count))
                }
            })
            .collect();
        let defined_means: Vec<f64> = sum_buckets.iter().filter_map(|m| *m).collect();
        let tsig = variance(&defined_means);
        let ratio = match (tsig, variance(&values)) {
            (Some(t), Some(total)) if total > 0.0 => Some(t / total),
            _ => None,
        };
        let nratio = ratio.map(|r| normalize_ratio(r, nrows, self.bucket_count()));

        Energy {
            nrows,
            nan,
            mean: mean(&values),
            sum_buckets,
            tsig,
            ratio,
            nratio,
        }
    }
}

/// Shrink `ratio` by `n / (n + k)`: with `k` buckets a handful of rows can explain
/// most of the variance by chance alone.
pub fn normalize_ratio(ratio: f64, nrows: usize, bucket_count: usize) -> f64 {
    let n = nrows as f64;
    ratio * n / (n + bucket_count as f64)
}

fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        None
    } else {
        Some(xs.iter().sum::<f64>() / xs.len() as f64)
    }
}

// Population variance (ddof = 0).
fn variance(xs: &[f64]) -> Option<f64> {
    let m = mean(xs)?;
    Some(xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / xs.len() as f64)
}
