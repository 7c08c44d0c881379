use std::path::Path;
use std::str::FromStr;

use super::constants::{
    KEY_DENSITY, KEY_DOFILTER, KEY_MAXSCALE, KEY_NOTES, KEY_RESOLUTION, KEY_VERBOSE,
};
use super::error::{AnalysisError, ScaleError, UnitConfigError};
use super::unit_config::UnitConfig;

/// Upper bound on the number of scales `octaves` will generate
const MAX_OCTAVE_SCALES: f64 = 10_000.0;

/// An ascending sequence of positive scale hypotheses (in pixels) to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleVector(Vec<f64>);

impl ScaleVector {
    /// Geometrically spaced scales from min to max with `notes` scales per octave.
    pub fn octaves(min: f64, max: f64, notes: u32) -> Result<Self, ScaleError> {
        if !(min.is_finite() && min > 0.0) {
            return Err(ScaleError::NonPositive(min));
        }
        if !(max.is_finite() && max > min) {
            return Err(ScaleError::NotAscending(max));
        }
        let notes = notes.max(1) as f64;
        let n_scales = ((max / min).log2() * notes).floor() + 1.0;
        if !(n_scales.is_finite() && n_scales <= MAX_OCTAVE_SCALES) {
            return Err(ScaleError::TooMany(n_scales));
        }
        let n_scales = n_scales as usize;
        let scales = (0..n_scales)
            .map(|i| min * 2f64.powf(i as f64 / notes))
            .collect::<Vec<f64>>();
        Self::try_from(scales)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<f64>> for ScaleVector {
    type Error = ScaleError;

    fn try_from(scales: Vec<f64>) -> Result<Self, Self::Error> {
        if scales.is_empty() {
            return Err(ScaleError::Empty);
        }
        for (idx, &scale) in scales.iter().enumerate() {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(ScaleError::NonPositive(scale));
            }
            if idx > 0 && scale <= scales[idx - 1] {
                return Err(ScaleError::NotAscending(scale));
            }
        }
        Ok(Self(scales))
    }
}

/// Parse a comma separated list, e.g. `2,4,8,16`
impl FromStr for ScaleVector {
    type Err = ScaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let scales = s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| t.parse::<f64>().map_err(|_| ScaleError::Parse(t.to_string())))
            .collect::<Result<Vec<f64>, ScaleError>>()?;
        Self::try_from(scales)
    }
}

/// The analysis fields of a unit configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisParams {
    /// Row sampling step
    pub density: u32,
    /// Physical size of one pixel
    pub resolution: f64,
    pub dofilter: bool,
    /// Largest usable scale is the image width divided by this
    pub maxscale: f64,
    /// Scales per octave the scale set was built with. Validated and carried into the
    /// collated table; the analyzer takes its scales from the `ScaleVector` instead.
    pub notes: u32,
    pub verbose: bool,
}

impl AnalysisParams {
    /// Extract and validate the analysis keys. Missing or ill-typed keys are a per-unit error.
    pub fn from_config(config: &UnitConfig) -> Result<Self, UnitConfigError> {
        let params = Self {
            density: config.get_u32(KEY_DENSITY)?,
            resolution: config.get_f64(KEY_RESOLUTION)?,
            dofilter: config.get_bool(KEY_DOFILTER)?,
            maxscale: config.get_f64(KEY_MAXSCALE)?,
            notes: config.get_u32(KEY_NOTES)?,
            verbose: config.get_bool(KEY_VERBOSE)?,
        };
        if params.density == 0 {
            return Err(bad_param(KEY_DENSITY, "an integer of at least 1"));
        }
        if !(params.resolution.is_finite() && params.resolution > 0.0) {
            return Err(bad_param(KEY_RESOLUTION, "a positive number"));
        }
        if !(params.maxscale.is_finite() && params.maxscale > 0.0) {
            return Err(bad_param(KEY_MAXSCALE, "a positive number"));
        }
        if params.notes == 0 {
            return Err(bad_param(KEY_NOTES, "an integer of at least 1"));
        }
        Ok(params)
    }
}

fn bad_param(key: &str, expected: &'static str) -> UnitConfigError {
    UnitConfigError::BadValue {
        key: key.to_string(),
        expected,
    }
}

/// Output of a grain-size analysis
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GrainSizeDistribution {
    pub mean: f64,
    pub sorting: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub percentiles: Vec<f64>,
    pub percentile_values: Vec<f64>,
    pub bins: Vec<f64>,
    pub frequencies: Vec<f64>,
}

impl GrainSizeDistribution {
    /// Build a distribution from bins and (unnormalized) weights, computing moments and percentiles.
    ///
    /// Returns None if the weights carry no mass.
    pub fn from_histogram(bins: Vec<f64>, weights: &[f64], percentiles: &[f64]) -> Option<Self> {
        let total: f64 = weights.iter().sum();
        if !(total.is_finite() && total > 0.0) || bins.len() != weights.len() {
            return None;
        }
        let frequencies: Vec<f64> = weights.iter().map(|w| w / total).collect();

        let mean: f64 = bins.iter().zip(&frequencies).map(|(b, f)| b * f).sum();
        let moment = |order: i32| -> f64 {
            bins.iter()
                .zip(&frequencies)
                .map(|(b, f)| f * (b - mean).powi(order))
                .sum()
        };
        let sorting = moment(2).sqrt();
        let (skewness, kurtosis) = if sorting > 0.0 {
            (moment(3) / sorting.powi(3), moment(4) / sorting.powi(4))
        } else {
            (0.0, 0.0)
        };

        let percentile_values = percentiles
            .iter()
            .map(|&p| interpolate_cdf(&bins, &frequencies, p))
            .collect();

        Some(Self {
            mean,
            sorting,
            skewness,
            kurtosis,
            percentiles: percentiles.to_vec(),
            percentile_values,
            bins,
            frequencies,
        })
    }
}

/// Grain size at which the cumulative frequency reaches `fraction`, linearly interpolated
fn interpolate_cdf(bins: &[f64], frequencies: &[f64], fraction: f64) -> f64 {
    let mut cumulative = 0.0;
    let mut prev_bin = bins[0];
    let mut prev_cum = 0.0;
    for (&bin, &freq) in bins.iter().zip(frequencies) {
        cumulative += freq;
        if cumulative >= fraction {
            if cumulative - prev_cum <= f64::EPSILON {
                return bin;
            }
            let t = ((fraction - prev_cum) / (cumulative - prev_cum)).clamp(0.0, 1.0);
            return prev_bin + t * (bin - prev_bin);
        }
        prev_bin = bin;
        prev_cum = cumulative;
    }
    bins[bins.len() - 1]
}

/// A grain-size distribution estimator.
///
/// Implementations must be pure in (image, params, scales) so that re-running a unit
/// reproduces its outputs.
pub trait GrainSizeAnalyzer {
    fn analyze(
        &self,
        image: &Path,
        params: &AnalysisParams,
        scales: &ScaleVector,
    ) -> Result<GrainSizeDistribution, AnalysisError>;
}

/// Run an analyzer on one image
pub fn analyze_grain_size(
    analyzer: &dyn GrainSizeAnalyzer,
    image: &Path,
    config: &UnitConfig,
    scales: &ScaleVector,
) -> Result<GrainSizeDistribution, AnalysisError> {
    let params = AnalysisParams::from_config(config)?;
    analyzer.analyze(image, &params, scales)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_vector_validation() {
        assert!(ScaleVector::try_from(vec![1.0, 2.0, 4.0]).is_ok());
        assert_eq!(ScaleVector::try_from(vec![]), Err(ScaleError::Empty));
        assert_eq!(
            ScaleVector::try_from(vec![1.0, 0.0]),
            Err(ScaleError::NonPositive(0.0))
        );
        assert_eq!(
            ScaleVector::try_from(vec![2.0, 2.0]),
            Err(ScaleError::NotAscending(2.0))
        );
    }

    #[test]
    fn test_scale_vector_parse() {
        let scales: ScaleVector = "2, 4,8".parse().unwrap();
        assert_eq!(scales.as_slice(), &[2.0, 4.0, 8.0]);
        assert_eq!(
            "2,x".parse::<ScaleVector>(),
            Err(ScaleError::Parse("x".to_string()))
        );
    }

    #[test]
    fn test_octaves() {
        let scales = ScaleVector::octaves(2.0, 16.0, 2).unwrap();
        assert_eq!(scales.len(), 7);
        assert!((scales.as_slice()[2] - 4.0).abs() < 1e-12);
        assert!((scales.as_slice()[6] - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_octaves_rejects_huge_ranges() {
        assert!(matches!(
            ScaleVector::octaves(1e-300, 1e300, u32::MAX),
            Err(ScaleError::TooMany(_))
        ));
        assert!(matches!(
            ScaleVector::octaves(1.0, 1e6, 100_000),
            Err(ScaleError::TooMany(_))
        ));
        assert_eq!(ScaleVector::octaves(1.0, 2.0, 9_999).unwrap().len(), 10_000);
    }

    #[test]
    fn test_params_from_config() {
        let config = UnitConfig::from_mapping(
            serde_yaml::from_str(
                "density: 10\nresolution: 0.05\ndofilter: 1\nmaxscale: 8\nnotes: 8\nverbose: 0\n",
            )
            .unwrap(),
        );
        let params = AnalysisParams::from_config(&config).unwrap();
        assert_eq!(params.density, 10);
        assert_eq!(params.notes, 8);
        assert!(params.dofilter);
        assert!(!params.verbose);

        let mut broken = config.clone();
        broken.set("resolution", serde_yaml::Value::from(-1.0));
        assert!(matches!(
            AnalysisParams::from_config(&broken),
            Err(UnitConfigError::BadValue { .. })
        ));
    }

    #[test]
    fn test_histogram_moments() {
        let gsd =
            GrainSizeDistribution::from_histogram(vec![1.0, 2.0, 3.0], &[1.0, 2.0, 1.0], &[0.5])
                .unwrap();
        assert!((gsd.mean - 2.0).abs() < 1e-12);
        assert!((gsd.sorting - 0.5f64.sqrt()).abs() < 1e-12);
        assert!(gsd.skewness.abs() < 1e-12);
        assert!((gsd.kurtosis - 2.0).abs() < 1e-12);
        assert_eq!(gsd.frequencies, vec![0.25, 0.5, 0.25]);
        assert!(gsd.percentile_values[0] > 1.0 && gsd.percentile_values[0] <= 2.0);

        assert!(GrainSizeDistribution::from_histogram(vec![1.0], &[0.0], &[0.5]).is_none());
    }
}
