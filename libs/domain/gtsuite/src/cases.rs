//! Experiments shipped with the crate.
//!
//! `TS-0001` / `UC-0001` covers scalar and elementwise arithmetic with a
//! non-linearity.

use gtautodiff::Tensor;

use crate::{Outcome, Registry};

/// Register every experiment of this module.
pub fn register(registry: &mut Registry) -> anyhow::Result<()> {
    registry
        .register(
            "TS-0001",
            "UC-0001",
            "simple_expression_with_relu",
            "simple expression with relu",
            simple_expression_with_relu,
        )?
        .register(
            "TS-0001",
            "UC-0001",
            "simple_multiplication",
            "simple multiplication",
            simple_multiplication,
        )?
        .register(
            "TS-0001",
            "UC-0001",
            "simple_addition",
            "simple addition",
            simple_addition,
        )?;
    Ok(())
}

// -----------------------------------------------------------------------------
// UC-0001
// -----------------------------------------------------------------------------
pub fn simple_expression_with_relu() -> anyhow::Result<Outcome> {
    let x = Tensor::from_vec(vec![-4.0]).requires_grad(true);
    let z = 2.0 * &x + 2.0 + &x;
    let q = z.relu() + &z * &x;
    let h = (&z * &z).relu();
    let y = &h + &q + &q * &x;
    y.backward()?;
    Ok(Outcome {
        inputs: vec![x],
        result: y,
    })
}

pub fn simple_multiplication() -> anyhow::Result<Outcome> {
    let a = Tensor::scalar(3.0).requires_grad(true);
    let b = Tensor::scalar(2.0).requires_grad(true);
    let c = &a * &b;
    c.backward()?;
    Ok(Outcome {
        inputs: vec![a, b],
        result: c,
    })
}

pub fn simple_addition() -> anyhow::Result<Outcome> {
    let x = Tensor::new((1..=9).map(|i| i as f64 * 0.5).collect(), vec![3, 3])?;
    let y = Tensor::new((1..=9).map(|i| 1.0 - i as f64 * 0.25).collect(), vec![3, 3])?;
    let result = x.try_add(&y)?;
    Ok(Outcome {
        inputs: vec![x, y],
        result,
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_simple_expression_with_relu() {
        let outcome = simple_expression_with_relu().unwrap();

        assert_abs_diff_eq!(outcome.result.item().unwrap(), -20.0, epsilon = 1e-12);
        assert_abs_diff_eq!(outcome.inputs[0].grad().unwrap()[0], 46.0, epsilon = 1e-12);
    }

    #[test]
    fn test_simple_multiplication() {
        let outcome = simple_multiplication().unwrap();

        assert_eq!(outcome.result.item(), Ok(6.0));
        assert_eq!(outcome.inputs[0].grad(), Some(vec![2.0]));
        assert_eq!(outcome.inputs[1].grad(), Some(vec![3.0]));
    }

    #[test]
    fn test_simple_addition() {
        let outcome = simple_addition().unwrap();

        assert_eq!(outcome.result.shape(), vec![3, 3]);
        let expected: Vec<f64> = (1..=9).map(|i| 1.0 + i as f64 * 0.25).collect();
        for (actual, expected) in outcome.result.data().iter().zip(&expected) {
            assert_abs_diff_eq!(*actual, *expected, epsilon = 1e-12);
        }
        assert!(outcome.result.grad_fn().is_none());
    }
}
