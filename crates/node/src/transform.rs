//! Transform stage: priors mapping latent values to physical multipliers.
//!
//! Node data holds latent values, each a draw from N(0, 1) at initialization
//! and updated linearly by the EnKF analysis step. What the simulator sees is
//! the output of a per-parameter prior transform applied to that latent value.
//!
//! | Prior | `transform(x)` |
//! |-------|----------------|
//! | [`Prior::Raw`] | `x` |
//! | [`Prior::Const`] | `value` |
//! | [`Prior::Normal`] | `mean + std·x` |
//! | [`Prior::LogNormal`] | `exp(mean + std·x)` |
//! | [`Prior::TruncatedNormal`] | `clamp(mean + std·x, min, max)` |
//! | [`Prior::Uniform`] | `min + Φ(x)·(max − min)` |
//! | [`Prior::LogUniform`] | `exp(ln min + Φ(x)·(ln max − ln min))` |
//! | [`Prior::DiscreteUniform`] | `min + floor(Φ(x)·steps)/(steps − 1)·(max − min)` |
//!
//! where `Φ` is the standard normal CDF. All transforms are pure.

use std::f64::consts::SQRT_2;

use enkf_foundation::StableHasher;
use serde::{Deserialize, Serialize};
use statrs::function::erf::erf;

/// Prior distribution of one parameter, expressed as a transform of a
/// standard normal latent value.
///
/// Serialized with a `distribution` tag:
///
/// ```
/// use enkf_node::Prior;
///
/// let prior: Prior =
///     serde_json::from_str(r#"{"distribution":"UNIFORM","min":0.0,"max":2.0}"#).unwrap();
/// assert_eq!(prior, Prior::Uniform { min: 0.0, max: 2.0 });
/// assert_eq!(prior.transform(0.0), 1.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "distribution", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Prior {
    /// Identity: the latent value is applied as-is.
    Raw,
    /// Fixed value regardless of the latent value.
    Const { value: f64 },
    /// Normal with the given mean and standard deviation.
    Normal { mean: f64, std: f64 },
    /// Log-normal; `mean` and `std` describe the underlying normal.
    #[serde(rename = "LOGNORMAL")]
    LogNormal { mean: f64, std: f64 },
    /// Normal clamped to `[min, max]`.
    TruncatedNormal {
        mean: f64,
        std: f64,
        min: f64,
        max: f64,
    },
    /// Uniform on `[min, max]`.
    Uniform { min: f64, max: f64 },
    /// Log-uniform on `[min, max]`, both strictly positive.
    #[serde(rename = "LOGUNIF")]
    LogUniform { min: f64, max: f64 },
    /// Uniform over `steps` evenly spaced values from `min` to `max`.
    #[serde(rename = "DUNIF")]
    DiscreteUniform { steps: u32, min: f64, max: f64 },
}

/// Standard normal CDF.
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / SQRT_2))
}

impl Prior {
    /// Map a latent value to the physical value.
    pub fn transform(&self, x: f64) -> f64 {
        match *self {
            Prior::Raw => x,
            Prior::Const { value } => value,
            Prior::Normal { mean, std } => mean + std * x,
            Prior::LogNormal { mean, std } => (mean + std * x).exp(),
            Prior::TruncatedNormal {
                mean,
                std,
                min,
                max,
            } => (mean + std * x).clamp(min, max),
            Prior::Uniform { min, max } => min + normal_cdf(x) * (max - min),
            Prior::LogUniform { min, max } => {
                let (lmin, lmax) = (min.ln(), max.ln());
                (lmin + normal_cdf(x) * (lmax - lmin)).exp()
            }
            Prior::DiscreteUniform { steps, min, max } => {
                // unvalidated step counts below 2 collapse onto `min`
                let top = f64::from(steps.saturating_sub(1).max(1));
                let step = (normal_cdf(x) * f64::from(steps)).floor().min(top);
                min + step / top * (max - min)
            }
        }
    }

    /// Whether the latent value has any effect on the output.
    ///
    /// Constant parameters are left at zero when the ensemble is initialized.
    pub fn is_constant(&self) -> bool {
        matches!(self, Prior::Const { .. })
    }

    /// Check the prior's own parameters.
    pub fn validate(&self) -> Result<(), String> {
        let finite = |name: &str, v: f64| {
            if v.is_finite() {
                Ok(())
            } else {
                Err(format!("{name} must be finite, got {v}"))
            }
        };
        let ordered = |min: f64, max: f64| {
            if min < max {
                Ok(())
            } else {
                Err(format!("min ({min}) must be below max ({max})"))
            }
        };
        let positive_std = |std: f64| {
            if std > 0.0 {
                Ok(())
            } else {
                Err(format!("std must be positive, got {std}"))
            }
        };

        match *self {
            Prior::Raw => Ok(()),
            Prior::Const { value } => finite("value", value),
            Prior::Normal { mean, std } | Prior::LogNormal { mean, std } => {
                finite("mean", mean)?;
                finite("std", std)?;
                positive_std(std)
            }
            Prior::TruncatedNormal {
                mean,
                std,
                min,
                max,
            } => {
                finite("mean", mean)?;
                finite("std", std)?;
                positive_std(std)?;
                ordered(min, max)
            }
            Prior::Uniform { min, max } => {
                finite("min", min)?;
                finite("max", max)?;
                ordered(min, max)
            }
            Prior::LogUniform { min, max } => {
                finite("max", max)?;
                if min <= 0.0 {
                    return Err(format!("LOGUNIF min must be positive, got {min}"));
                }
                ordered(min, max)
            }
            Prior::DiscreteUniform { steps, min, max } => {
                if steps < 2 {
                    return Err(format!("DUNIF needs at least 2 steps, got {steps}"));
                }
                finite("min", min)?;
                finite("max", max)?;
                ordered(min, max)
            }
        }
    }

    /// Mix the prior into a config fingerprint.
    pub(crate) fn hash_into(&self, h: &mut StableHasher) {
        match *self {
            Prior::Raw => {
                h.write_str("RAW");
            }
            Prior::Const { value } => {
                h.write_str("CONST").write_f64(value);
            }
            Prior::Normal { mean, std } => {
                h.write_str("NORMAL").write_f64(mean).write_f64(std);
            }
            Prior::LogNormal { mean, std } => {
                h.write_str("LOGNORMAL").write_f64(mean).write_f64(std);
            }
            Prior::TruncatedNormal {
                mean,
                std,
                min,
                max,
            } => {
                h.write_str("TRUNCATED_NORMAL")
                    .write_f64(mean)
                    .write_f64(std)
                    .write_f64(min)
                    .write_f64(max);
            }
            Prior::Uniform { min, max } => {
                h.write_str("UNIFORM").write_f64(min).write_f64(max);
            }
            Prior::LogUniform { min, max } => {
                h.write_str("LOGUNIF").write_f64(min).write_f64(max);
            }
            Prior::DiscreteUniform { steps, min, max } => {
                h.write_str("DUNIF")
                    .write_u64(u64::from(steps))
                    .write_f64(min)
                    .write_f64(max);
            }
        }
    }
}
