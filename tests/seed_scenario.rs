use approx::assert_abs_diff_eq;

use cogni::activation::sigmoid;
use cogni::{Activation, Dataset, FitConfig, Layer, Network};

const X: [f32; 2] = [1.66, 1.56];
const WEIGHTS: [f32; 6] = [10.45, -10.0, 0.0, -3.9, 0.33, -4.7];
const BIAS: [f32; 3] = [3.0, 1.0, -5.0];
const LR: f32 = 0.9;

fn reference_network() -> Network {
    let hidden =
        Layer::from_parts(2, 2, Activation::Sigmoid, &WEIGHTS[..4], &BIAS[..2]).unwrap();
    let output = Layer::from_parts(2, 1, Activation::Sigmoid, &WEIGHTS[4..], &BIAS[2..]).unwrap();
    Network::from_layers(vec![hidden, output]).unwrap()
}

fn textbook_forward(w: &[f32; 6], b: &[f32; 3]) -> (f32, f32, f32) {
    let h1 = sigmoid(X[0] * w[0] + X[1] * w[1] + b[0]);
    let h2 = sigmoid(X[0] * w[2] + X[1] * w[3] + b[1]);
    let a = sigmoid(h1 * w[4] + h2 * w[5] + b[2]);
    (h1, h2, a)
}

fn textbook_step(w: &mut [f32; 6], b: &mut [f32; 3]) -> f32 {
    let (h1, h2, a) = textbook_forward(w, b);
    let base_o = a * (1.0 - a) * (-2.0 * (1.0 - a));
    let base_h1 = h1 * (1.0 - h1) * (w[4] * base_o);
    let base_h2 = h2 * (1.0 - h2) * (w[5] * base_o);

    w[0] -= LR * base_h1 * X[0];
    w[1] -= LR * base_h1 * X[1];
    w[2] -= LR * base_h2 * X[0];
    w[3] -= LR * base_h2 * X[1];
    w[4] -= LR * base_o * h1;
    w[5] -= LR * base_o * h2;
    b[0] -= LR * base_h1;
    b[1] -= LR * base_h2;
    b[2] -= LR * base_o;
    a
}

#[test]
fn initial_prediction_matches_textbook_forward() {
    let mut net = reference_network();
    let (_, _, a) = textbook_forward(&WEIGHTS, &BIAS);
    let y = net.forward(&X)[0];
    assert_abs_diff_eq!(y, a, epsilon = 1e-6);
}

#[test]
fn engine_tracks_textbook_updates_and_loss_decreases() {
    let mut net = reference_network();
    let (mut w, mut b) = (WEIGHTS, BIAS);
    let mut d_out = [0.0_f32; 1];
    let mut losses = Vec::new();

    for _ in 0..5 {
        let expected = textbook_step(&mut w, &mut b);
        let loss = net.train_step(&X, &[1.0], LR, &mut d_out);
        assert_abs_diff_eq!(net.output()[0], expected, epsilon = 1e-5);
        losses.push(loss);
    }

    for pair in losses.windows(2) {
        assert!(pair[1] < pair[0], "mse did not strictly decrease: {losses:?}");
    }
}

#[test]
fn fit_reports_decreasing_epoch_losses() {
    let mut net = reference_network();
    let data = Dataset::from_flat(X.to_vec(), vec![1.0], 2, 1).unwrap();
    let report = net
        .fit(
            &data,
            &FitConfig {
                epochs: 5,
                learning_rate: LR,
                log_every: 0,
            },
        )
        .unwrap();

    assert_eq!(report.epoch_losses.len(), 5);
    for pair in report.epoch_losses.windows(2) {
        assert!(pair[1] < pair[0], "{:?}", report.epoch_losses);
    }
}

#[test]
fn stacking_mismatched_layers_is_rejected() {
    let a = Layer::from_parts(2, 2, Activation::Sigmoid, &WEIGHTS[..4], &BIAS[..2]).unwrap();
    let b = Layer::from_parts(3, 1, Activation::Sigmoid, &[0.0; 3], &[0.0]).unwrap();
    let err = Network::from_layers(vec![a, b]).unwrap_err();
    assert!(matches!(err, cogni::Error::InvalidShape(_)), "{err}");
}
