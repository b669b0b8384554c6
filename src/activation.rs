//! Per-node activation function table (spec §4.6).
//!
//! Dispatch is a `match` over the tag inlined at the per-node call site
//! rather than a dynamic vtable dispatch per element (spec §9): benchmarks in
//! the source material found branch-per-node acceptable when the handful of
//! tags are cache-resident.

use crate::math::Scalar;

/// The activation tags available to a node (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Activation {
    Linear,
    Tanh,
    Sigmoid,
    ReLU,
    LeakyReLU,
    ELU,
    Softsign,
    Softplus,
    Sin,
    Gaussian,
    GELU,
}

impl Activation {
    /// All activation tags, in a stable order used to build row allowed-masks.
    pub const ALL: [Activation; 11] = [
        Activation::Linear,
        Activation::Tanh,
        Activation::Sigmoid,
        Activation::ReLU,
        Activation::LeakyReLU,
        Activation::ELU,
        Activation::Softsign,
        Activation::Softplus,
        Activation::Sin,
        Activation::Gaussian,
        Activation::GELU,
    ];

    /// Activations permitted on output-row nodes (spec §3, §4.5).
    pub const OUTPUT_ALLOWED: [Activation; 2] = [Activation::Linear, Activation::Tanh];

    #[must_use]
    pub fn bit(self) -> u16 {
        1 << (self as u16)
    }

    #[must_use]
    pub fn is_output_allowed(self) -> bool {
        matches!(self, Activation::Linear | Activation::Tanh)
    }

    /// Default node params for this activation (spec §4.7's "reset its
    /// params to the activation's defaults").
    #[must_use]
    pub fn default_params(self) -> [Scalar; 4] {
        match self {
            Activation::LeakyReLU => [0.01, 0.0, 0.0, 0.0],
            Activation::ELU => [1.0, 0.0, 0.0, 0.0],
            _ => [0.0, 0.0, 0.0, 0.0],
        }
    }

    /// Evaluates `f(x)` using this activation's params (spec §4.6's table).
    #[must_use]
    pub fn apply(self, x: Scalar, params: &[Scalar; 4]) -> Scalar {
        match self {
            Activation::Linear => x,
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::ReLU => x.max(0.0),
            Activation::LeakyReLU => {
                let alpha = params[0];
                if x > 0.0 { x } else { alpha * x }
            }
            Activation::ELU => {
                let alpha = params[0];
                if x > 0.0 { x } else { alpha * (x.exp() - 1.0) }
            }
            Activation::Softsign => x / (1.0 + x.abs()),
            Activation::Softplus => (1.0 + x.exp()).ln(),
            Activation::Sin => x.sin(),
            Activation::Gaussian => (-x * x).exp(),
            Activation::GELU => {
                const SQRT_2_OVER_PI: Scalar = 0.797_884_6;
                0.5 * x * (1.0 + (SQRT_2_OVER_PI * (x + 0.044715 * x * x * x)).tanh())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn tanh_matches_std() {
        let params = [0.0; 4];
        assert_relative_eq!(Activation::Tanh.apply(1.0, &params), 1.0f32.tanh(), epsilon = 1e-6);
    }

    #[test]
    fn relu_clamps_negative() {
        let params = [0.0; 4];
        assert_relative_eq!(Activation::ReLU.apply(-3.0, &params), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn output_allowed_excludes_relu() {
        assert!(!Activation::ReLU.is_output_allowed());
        assert!(Activation::Tanh.is_output_allowed());
        assert!(Activation::Linear.is_output_allowed());
    }
}
