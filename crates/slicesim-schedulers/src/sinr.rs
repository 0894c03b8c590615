use rand::Rng;
use rand_distr::{Distribution, Normal};
use slicesim_abstract::SchedulerError;

const STATIC_DEVIATION_DB: f64 = 1.0;

/// Per-interval SINR generator selected by the `sinr_pattern` setting.
///
/// * `S<dB>` - normal around a fixed mean, e.g. `S30`.
/// * `U<low>_<high>` - uniform between two bounds, e.g. `U5_25`.
#[derive(Debug, Clone)]
pub enum SinrPattern {
    Static { mean_db: f64, noise: Normal<f64> },
    Uniform { low_db: f64, high_db: f64 },
}

impl SinrPattern {
    pub fn parse(pattern: &str) -> Result<Self, SchedulerError> {
        let invalid = || SchedulerError::InvalidSinrPattern(pattern.to_string());
        if let Some(mean) = pattern.strip_prefix('S') {
            let mean_db: f64 = mean.parse().map_err(|_| invalid())?;
            if !mean_db.is_finite() {
                return Err(invalid());
            }
            let noise = Normal::new(mean_db, STATIC_DEVIATION_DB).map_err(|_| invalid())?;
            return Ok(SinrPattern::Static { mean_db, noise });
        }
        if let Some(range) = pattern.strip_prefix('U') {
            let (low, high) = range.split_once('_').ok_or_else(invalid)?;
            let low_db: f64 = low.parse().map_err(|_| invalid())?;
            let high_db: f64 = high.parse().map_err(|_| invalid())?;
            if !low_db.is_finite() || !high_db.is_finite() || low_db > high_db {
                return Err(invalid());
            }
            return Ok(SinrPattern::Uniform { low_db, high_db });
        }
        Err(invalid())
    }

    pub fn mean_db(&self) -> f64 {
        match self {
            SinrPattern::Static { mean_db, .. } => *mean_db,
            SinrPattern::Uniform { low_db, high_db } => (low_db + high_db) / 2.0,
        }
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        match self {
            SinrPattern::Static { noise, .. } => noise.sample(rng),
            SinrPattern::Uniform { low_db, high_db } => rng.random_range(*low_db..=*high_db),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_parse_static() {
        let pattern = SinrPattern::parse("S30").unwrap();
        assert_eq!(pattern.mean_db(), 30.0);
        let negative = SinrPattern::parse("S-3.5").unwrap();
        assert_eq!(negative.mean_db(), -3.5);
    }

    #[test]
    fn test_uniform_samples_stay_in_range() {
        let pattern = SinrPattern::parse("U5_25").unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let s = pattern.sample(&mut rng);
            assert!((5.0..=25.0).contains(&s));
        }
    }

    #[test]
    fn test_static_samples_center_on_mean() {
        let pattern = SinrPattern::parse("S20").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mean = (0..2000).map(|_| pattern.sample(&mut rng)).sum::<f64>() / 2000.0;
        assert!((mean - 20.0).abs() < 0.2);
    }

    #[test]
    fn test_rejects_bad_patterns() {
        for bad in ["", "30", "Sx", "U5", "U9_3", "Q10", "SNaN", "Sinf", "S-inf", "U0_inf"] {
            assert!(SinrPattern::parse(bad).is_err(), "{bad} should be rejected");
        }
    }
}
