//! Squared-error loss.
//!
//! Per scalar output the loss is `(pred - truth)^2` and its derivative w.r.t. `pred` is
//! `-2 * (truth - pred)`. The slice helpers sum over outputs, so for a single-output network
//! they reduce to the scalar forms. Intended use:
//!
//! - run `network.forward(...)`
//! - compute `d_output` with [`mse_backward`]
//! - run `network.backpropagate(d_output)`

/// Squared error of a single prediction.
#[inline]
pub fn mse(pred: f32, truth: f32) -> f32 {
    let diff = pred - truth;
    diff * diff
}

/// `d(mse)/d(pred)`.
#[inline]
pub fn mse_derivative(truth: f32, pred: f32) -> f32 {
    -2.0 * (truth - pred)
}

/// Sum of squared errors over all outputs.
///
/// Shape contract: `pred.len() == target.len()`.
#[inline]
pub fn mse_sum(pred: &[f32], target: &[f32]) -> f32 {
    assert_eq!(
        pred.len(),
        target.len(),
        "pred len {} does not match target len {}",
        pred.len(),
        target.len()
    );
    pred.iter().zip(target).map(|(&p, &t)| mse(p, t)).sum()
}

/// Loss + gradient w.r.t. `pred`.
///
/// Writes `d_pred[i] = -2 * (target[i] - pred[i])` and returns [`mse_sum`].
///
/// Shape contract:
/// - `pred.len() == target.len()`
/// - `pred.len() == d_pred.len()`
#[inline]
pub fn mse_backward(pred: &[f32], target: &[f32], d_pred: &mut [f32]) -> f32 {
    assert_eq!(
        pred.len(),
        target.len(),
        "pred len {} does not match target len {}",
        pred.len(),
        target.len()
    );
    assert_eq!(
        pred.len(),
        d_pred.len(),
        "pred len {} does not match d_pred len {}",
        pred.len(),
        d_pred.len()
    );

    let mut loss = 0.0_f32;
    for i in 0..pred.len() {
        d_pred[i] = mse_derivative(target[i], pred[i]);
        loss += mse(pred[i], target[i]);
    }
    loss
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn scalar_forms() {
        assert_eq!(mse(3.0, 1.0), 4.0);
        assert_eq!(mse_derivative(1.0, 3.0), 4.0);
        assert_eq!(mse_derivative(3.0, 1.0), -4.0);
    }

    #[test]
    fn backward_matches_finite_difference() {
        let pred = [0.2_f32, -1.0, 0.7];
        let target = [0.0_f32, 1.0, 0.5];
        let mut d = [0.0_f32; 3];
        let loss = mse_backward(&pred, &target, &mut d);
        assert_abs_diff_eq!(loss, mse_sum(&pred, &target));

        let eps = 1e-3_f32;
        for i in 0..pred.len() {
            let mut plus = pred;
            let mut minus = pred;
            plus[i] += eps;
            minus[i] -= eps;
            let numeric = (mse_sum(&plus, &target) - mse_sum(&minus, &target)) / (2.0 * eps);
            assert_abs_diff_eq!(d[i], numeric, epsilon = 1e-2);
        }
    }

    #[test]
    #[should_panic(expected = "does not match target len")]
    fn mismatched_lengths_panic() {
        mse_sum(&[1.0, 2.0], &[1.0]);
    }
}
