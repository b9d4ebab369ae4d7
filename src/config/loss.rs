//! Loss families and their parameters.

use std::collections::HashMap;
use std::fmt;

use crate::error::{GlmError, Result};

/// Loss family together with its typed parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LossKind {
    /// Least squares, `(1/2n) ||y - X b||^2`.
    LinReg,
    /// Huber regression with the given knot.
    Huber {
        /// Residual magnitude where the loss switches from quadratic to linear.
        knot: f64,
    },
    /// Binary logistic regression, y in {0, 1}.
    LogReg,
    /// Multinomial regression on an indicator response matrix.
    Multinomial,
    /// Poisson regression with log link.
    Poisson,
    /// Quantile regression with the tilted L1 loss.
    Quantile {
        /// Target quantile in (0, 1).
        quantile: f64,
    },
}

/// The loss of one fit: its family and parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossSpec {
    /// The loss family.
    pub kind: LossKind,
    /// Whether the loss is natively defined on a response matrix.
    pub multi_response: bool,
}

impl LossSpec {
    pub fn lin_reg() -> Self {
        LossSpec::single(LossKind::LinReg)
    }

    pub fn lin_reg_mr() -> Self {
        LossSpec::multi(LossKind::LinReg)
    }

    pub fn huber(knot: f64) -> Self {
        LossSpec::single(LossKind::Huber { knot })
    }

    pub fn huber_mr(knot: f64) -> Self {
        LossSpec::multi(LossKind::Huber { knot })
    }

    pub fn log_reg() -> Self {
        LossSpec::single(LossKind::LogReg)
    }

    pub fn multinomial() -> Self {
        LossSpec::multi(LossKind::Multinomial)
    }

    pub fn poisson() -> Self {
        LossSpec::single(LossKind::Poisson)
    }

    pub fn poisson_mr() -> Self {
        LossSpec::multi(LossKind::Poisson)
    }

    pub fn quantile(quantile: f64) -> Self {
        LossSpec::single(LossKind::Quantile { quantile })
    }

    fn single(kind: LossKind) -> Self {
        LossSpec {
            kind,
            multi_response: false,
        }
    }

    fn multi(kind: LossKind) -> Self {
        LossSpec {
            kind,
            multi_response: true,
        }
    }

    /// Parse a loss from its string name and keyword arguments.
    ///
    /// Accepted names are `lin_reg`, `lin_reg_mr`, `huber_reg`, `huber_reg_mr`,
    /// `log_reg`, `multinomial`, `poisson`, `poisson_mr` and `quantile`. The Huber
    /// losses require a `knot` argument and `quantile` requires `quantile`.
    pub fn from_name(name: &str, kwargs: &HashMap<String, f64>) -> Result<Self> {
        let required = |arg: &str| -> Result<f64> {
            kwargs
                .get(arg)
                .copied()
                .ok_or_else(|| GlmError::MissingArgument {
                    loss: name.to_string(),
                    arg: arg.to_string(),
                })
        };

        let loss = match name {
            "lin_reg" => LossSpec::lin_reg(),
            "lin_reg_mr" => LossSpec::lin_reg_mr(),
            "huber_reg" => LossSpec::huber(required("knot")?),
            "huber_reg_mr" => LossSpec::huber_mr(required("knot")?),
            "log_reg" => LossSpec::log_reg(),
            "multinomial" => LossSpec::multinomial(),
            "poisson" => LossSpec::poisson(),
            "poisson_mr" => LossSpec::poisson_mr(),
            "quantile" => LossSpec::quantile(required("quantile")?),
            other => return Err(GlmError::UnsupportedLoss(other.to_string())),
        };
        loss.validate()?;
        Ok(loss)
    }

    /// Canonical string name of this loss.
    pub fn name(&self) -> &'static str {
        match (self.kind, self.multi_response) {
            (LossKind::LinReg, false) => "lin_reg",
            (LossKind::LinReg, true) => "lin_reg_mr",
            (LossKind::Huber { .. }, false) => "huber_reg",
            (LossKind::Huber { .. }, true) => "huber_reg_mr",
            (LossKind::LogReg, _) => "log_reg",
            (LossKind::Multinomial, _) => "multinomial",
            (LossKind::Poisson, false) => "poisson",
            (LossKind::Poisson, true) => "poisson_mr",
            (LossKind::Quantile { .. }, _) => "quantile",
        }
    }

    /// Check the loss parameters.
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            LossKind::Huber { knot } if !(knot > 0.0 && knot.is_finite()) => Err(
                GlmError::InvalidConfig(format!("Huber knot must be positive, got {}", knot)),
            ),
            LossKind::Quantile { quantile } if !(quantile > 0.0 && quantile < 1.0) => {
                Err(GlmError::InvalidConfig(format!(
                    "quantile must lie in (0, 1), got {}",
                    quantile
                )))
            }
            LossKind::LogReg if self.multi_response => Err(GlmError::InvalidConfig(
                "log_reg has no multi-response form; use multinomial".into(),
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for LossSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LossKind::Huber { knot } => write!(f, "{}(knot={})", self.name(), knot),
            LossKind::Quantile { quantile } => {
                write!(f, "{}(quantile={})", self.name(), quantile)
            }
            _ => f.write_str(self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kwargs(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_parse_names() {
        for name in [
            "lin_reg",
            "lin_reg_mr",
            "log_reg",
            "multinomial",
            "poisson",
            "poisson_mr",
        ] {
            let loss = LossSpec::from_name(name, &HashMap::new()).unwrap();
            assert_eq!(loss.name(), name);
        }
        assert!(LossSpec::multinomial().multi_response);
    }

    #[test]
    fn test_parse_with_kwargs() {
        let loss = LossSpec::from_name("huber_reg_mr", &kwargs(&[("knot", 1.5)])).unwrap();
        assert_eq!(loss.kind, LossKind::Huber { knot: 1.5 });
        assert!(loss.multi_response);

        let loss = LossSpec::from_name("quantile", &kwargs(&[("quantile", 0.3)])).unwrap();
        assert_eq!(loss.kind, LossKind::Quantile { quantile: 0.3 });
    }

    #[test]
    fn test_unknown_loss() {
        let err = LossSpec::from_name("hinge", &HashMap::new()).unwrap_err();
        assert!(matches!(err, GlmError::UnsupportedLoss(name) if name == "hinge"));
    }

    #[test]
    fn test_missing_knot() {
        let err = LossSpec::from_name("huber_reg", &HashMap::new()).unwrap_err();
        assert!(matches!(err, GlmError::MissingArgument { arg, .. } if arg == "knot"));
    }

    #[test]
    fn test_invalid_quantile() {
        let err = LossSpec::from_name("quantile", &kwargs(&[("quantile", 1.5)])).unwrap_err();
        assert!(matches!(err, GlmError::InvalidConfig(_)));
    }
}
