//! Fully-connected layer.
//!
//! A layer owns exactly one [`ParameterBlock`] and mutates it in place. One training step
//! looks like:
//!
//! 1. [`Layer::forward`] caches the input and writes `outputs`.
//! 2. [`Layer::zero_grad`] clears `weight_grad` / `bias_grad`.
//! 3. [`Layer::backpropagate`] turns `dL/d(outputs)` into parameter gradients.
//! 4. [`Layer::project_partial_derivative`] turns it into `dL/d(input)` for the layer below.
//! 5. [`Layer::apply_gradients`] once every layer has finished step 3.
//!
//! Shape mismatches and out-of-order calls are programmer errors and panic.

use std::fmt;

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{Activation, Error, NeuronView, ParameterBlock, Result};

/// Weight/bias initialisation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Init {
    /// Uniform in `[low, high)`, biases included.
    Uniform { low: f32, high: f32 },
    /// Xavier/Glorot uniform weights, zero biases.
    Xavier,
    /// He/Kaiming uniform weights, zero biases.
    He,
}

impl Default for Init {
    fn default() -> Self {
        Init::Uniform {
            low: 0.0,
            high: 1.0,
        }
    }
}

impl Init {
    pub fn validate(self) -> Result<()> {
        if let Init::Uniform { low, high } = self {
            // The sampler needs a finite width as well as finite bounds.
            if !(low < high && (high - low).is_finite()) {
                return Err(Error::InvalidConfig(format!(
                    "uniform init range must be finite with low < high, got [{low}, {high})"
                )));
            }
        }
        Ok(())
    }

    fn fill<R: Rng + ?Sized>(
        self,
        weights: &mut [f32],
        bias: &mut [f32],
        fan_in: usize,
        rng: &mut R,
    ) {
        let fan_out = bias.len();
        match self {
            Init::Uniform { low, high } => {
                let dist = Uniform::new(low, high);
                weights.iter_mut().for_each(|w| *w = dist.sample(rng));
                bias.iter_mut().for_each(|b| *b = dist.sample(rng));
            }
            Init::Xavier | Init::He => {
                let limit = match self {
                    Init::He => (6.0 / fan_in as f32).sqrt(),
                    _ => (6.0 / (fan_in + fan_out) as f32).sqrt(),
                };
                let dist = Uniform::new_inclusive(-limit, limit);
                weights.iter_mut().for_each(|w| *w = dist.sample(rng));
                bias.fill(0.0);
            }
        }
    }
}

/// Where the layer is in the forward/backward protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Fresh,
    Forwarded,
    Backpropagated,
}

#[derive(Debug, Clone)]
pub struct Layer {
    block: ParameterBlock,
    activation: Activation,
    stage: Stage,
}

impl Layer {
    /// Allocate a layer with weights and biases uniform in `[0, 1)`, seeded from the OS.
    pub fn new(in_features: usize, out_features: usize, activation: Activation) -> Result<Self> {
        Self::new_with_rng(
            in_features,
            out_features,
            Init::default(),
            activation,
            &mut StdRng::from_entropy(),
        )
    }

    pub fn new_with_seed(
        in_features: usize,
        out_features: usize,
        init: Init,
        activation: Activation,
        seed: u64,
    ) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::new_with_rng(in_features, out_features, init, activation, &mut rng)
    }

    pub fn new_with_rng<R: Rng + ?Sized>(
        in_features: usize,
        out_features: usize,
        init: Init,
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        init.validate()?;
        let mut block = ParameterBlock::zeroed(in_features, out_features)?;
        {
            let view = block.split_mut();
            init.fill(view.weights, view.bias, in_features, rng);
        }
        log::debug!("layer {in_features} -> {out_features} ({activation}) initialised with {init:?}");

        Ok(Self {
            block,
            activation,
            stage: Stage::Fresh,
        })
    }

    /// Build a layer from explicit parameters.
    ///
    /// `weights` is row-major `(out_features, in_features)`.
    pub fn from_parts(
        in_features: usize,
        out_features: usize,
        activation: Activation,
        weights: &[f32],
        bias: &[f32],
    ) -> Result<Self> {
        let mut block = ParameterBlock::zeroed(in_features, out_features)?;
        if weights.len() != block.weights().len() {
            return Err(Error::InvalidData(format!(
                "weights length {} does not match out_features * in_features ({out_features} * {in_features})",
                weights.len()
            )));
        }
        if bias.len() != out_features {
            return Err(Error::InvalidData(format!(
                "bias length {} does not match out_features {out_features}",
                bias.len()
            )));
        }
        if weights.iter().chain(bias).any(|v| !v.is_finite()) {
            return Err(Error::InvalidData(
                "parameters must contain only finite values".to_owned(),
            ));
        }

        block.weights_mut().copy_from_slice(weights);
        block.bias_mut().copy_from_slice(bias);
        Ok(Self {
            block,
            activation,
            stage: Stage::Fresh,
        })
    }

    #[inline]
    pub fn in_features(&self) -> usize {
        self.block.in_features()
    }

    #[inline]
    pub fn out_features(&self) -> usize {
        self.block.out_features()
    }

    /// Number of neurons (`out_features`).
    #[inline]
    pub fn len(&self) -> usize {
        self.block.out_features()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Rebind the activation. `Activation::Identity` leaves outputs as raw linear sums.
    #[inline]
    pub fn set_activation(&mut self, activation: Activation) {
        self.activation = activation;
    }

    #[inline]
    pub fn block(&self) -> &ParameterBlock {
        &self.block
    }

    #[inline]
    pub fn neuron(&self, index: usize) -> NeuronView {
        assert!(
            index < self.len(),
            "neuron index {index} out of range for layer with {} neurons",
            self.len()
        );
        NeuronView::at(index, self.in_features())
    }

    #[inline]
    pub fn neurons(&self) -> impl ExactSizeIterator<Item = NeuronView> + Clone {
        NeuronView::partition(self.in_features(), self.out_features())
    }

    #[inline]
    pub fn weights(&self) -> &[f32] {
        self.block.weights()
    }

    #[inline]
    pub fn weights_mut(&mut self) -> &mut [f32] {
        self.block.weights_mut()
    }

    #[inline]
    pub fn bias(&self) -> &[f32] {
        self.block.bias()
    }

    #[inline]
    pub fn bias_mut(&mut self) -> &mut [f32] {
        self.block.bias_mut()
    }

    #[inline]
    pub fn weight_grad(&self) -> &[f32] {
        self.block.weight_grad()
    }

    #[inline]
    pub fn bias_grad(&self) -> &[f32] {
        self.block.bias_grad()
    }

    /// Outputs of the most recent [`Layer::forward`] call.
    #[inline]
    pub fn outputs(&self) -> &[f32] {
        self.block.outputs()
    }

    #[inline]
    pub fn last_input(&self) -> &[f32] {
        self.block.last_input()
    }

    /// Result of the most recent [`Layer::project_partial_derivative`] call.
    #[inline]
    pub fn input_grad(&self) -> &[f32] {
        self.block.input_grad()
    }

    /// Forward pass for a single sample.
    ///
    /// For every neuron `i`: `outputs[i] = activation(dot(weights[i], input) + bias[i])`.
    /// The input is copied into the block so that a later backward pass can use it.
    pub fn forward(&mut self, input: &[f32]) -> &[f32] {
        assert_eq!(
            input.len(),
            self.in_features(),
            "input len {} does not match layer in_features {}",
            input.len(),
            self.in_features()
        );

        let activation = self.activation;
        let neurons = NeuronView::partition(self.in_features(), self.out_features());
        let view = self.block.split_mut();
        view.last_input.copy_from_slice(input);

        for neuron in neurons {
            let i = neuron.index();
            let z = neuron.linear(view.weights, view.bias, input);
            view.pre_activation[i] = z;
            view.outputs[i] = activation.apply(z);
        }

        self.stage = Stage::Forwarded;
        self.block.outputs()
    }

    /// Reset parameter gradients to zero.
    pub fn zero_grad(&mut self) {
        let view = self.block.split_mut();
        view.weight_grad.fill(0.0);
        view.bias_grad.fill(0.0);
    }

    /// Backward pass for a single sample.
    ///
    /// `upstream` is `dL/d(outputs)` for the most recent forward call. For every neuron `i`:
    ///
    /// - `base_derive[i] = activation'(z_i or y_i) * upstream[i]`
    /// - `weight_grad[i][:] = base_derive[i] * last_input[:]`
    /// - `bias_grad[i] = base_derive[i]`
    ///
    /// Gradients are overwritten, not accumulated.
    pub fn backpropagate(&mut self, upstream: &[f32]) {
        assert!(
            self.stage != Stage::Fresh,
            "backpropagate called before forward"
        );
        assert_eq!(
            upstream.len(),
            self.out_features(),
            "upstream gradient len {} does not match layer out_features {}",
            upstream.len(),
            self.out_features()
        );

        let activation = self.activation;
        let neurons = NeuronView::partition(self.in_features(), self.out_features());
        let view = self.block.split_mut();

        for neuron in neurons {
            let i = neuron.index();
            let base = activation.derivative_at(view.pre_activation[i], view.outputs[i])
                * upstream[i];
            view.local_grad[i] = base;
            neuron.write_grads(base, view.last_input, view.weight_grad, view.bias_grad);
        }

        self.stage = Stage::Backpropagated;
    }

    /// Gradient of the loss w.r.t. this layer's input.
    ///
    /// `input_grad[j] = sum_i base_derive[i] * weights[i][j]`. Per-neuron terms are staged in
    /// `partial_derivative` before being summed. The result is what the previous layer's
    /// [`Layer::backpropagate`] expects.
    pub fn project_partial_derivative(&mut self) -> &[f32] {
        assert!(
            self.stage == Stage::Backpropagated,
            "project_partial_derivative called before backpropagate"
        );

        let neurons = NeuronView::partition(self.in_features(), self.out_features());
        let view = self.block.split_mut();

        for neuron in neurons.clone() {
            let base = view.local_grad[neuron.index()];
            neuron.stage_partial(base, view.weights, view.partial_derivative);
        }

        view.input_grad.fill(0.0);
        for neuron in neurons {
            for (acc, &p) in view
                .input_grad
                .iter_mut()
                .zip(&view.partial_derivative[neuron.row()])
            {
                *acc += p;
            }
        }

        self.block.input_grad()
    }

    /// Gradient-descent update: `param -= learning_rate * grad` for every weight and bias.
    ///
    /// Calling this twice without a new backward pass applies the same gradient twice.
    pub fn apply_gradients(&mut self, learning_rate: f32) {
        let view = self.block.split_mut();
        for (w, &g) in view.weights.iter_mut().zip(view.weight_grad.iter()) {
            *w -= learning_rate * g;
        }
        for (b, &g) in view.bias.iter_mut().zip(view.bias_grad.iter()) {
            *b -= learning_rate * g;
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "layer {} -> {} ({})",
            self.in_features(),
            self.out_features(),
            self.activation
        )?;
        for neuron in self.neurons() {
            writeln!(
                f,
                "  n{}: w={:?} b={} dw={:?} db={} out={}",
                neuron.index(),
                neuron.weights(&self.block),
                neuron.bias(&self.block),
                neuron.weight_grad(&self.block),
                neuron.bias_grad(&self.block),
                neuron.output(&self.block),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loss;
    use approx::assert_abs_diff_eq;

    fn small_layer(activation: Activation) -> Layer {
        Layer::from_parts(
            3,
            2,
            activation,
            &[0.2, -0.4, 0.1, 0.5, 0.3, -0.2],
            &[0.05, -0.1],
        )
        .unwrap()
    }

    fn loss_of(layer: &mut Layer, input: &[f32], target: &[f32]) -> f32 {
        let out = layer.forward(input);
        loss::mse_sum(out, target)
    }

    #[test]
    fn construction_draws_uniform_unit_range_and_zero_grads() {
        let layer = Layer::new(5, 4, Activation::ReLU).unwrap();
        assert_eq!(layer.weights().len(), 20);
        assert_eq!(layer.bias().len(), 4);
        assert!(layer
            .weights()
            .iter()
            .chain(layer.bias())
            .all(|&v| (0.0..1.0).contains(&v)));
        assert!(layer.weight_grad().iter().all(|&g| g == 0.0));
        assert!(layer.bias_grad().iter().all(|&g| g == 0.0));
    }

    #[test]
    fn forward_is_deterministic_for_a_seed() {
        let mut a = Layer::new_with_seed(4, 3, Init::default(), Activation::Sigmoid, 7).unwrap();
        let mut b = Layer::new_with_seed(4, 3, Init::default(), Activation::Sigmoid, 7).unwrap();
        let input = [0.3_f32, -1.2, 0.8, 2.0];

        let first = a.forward(&input).to_vec();
        let second = a.forward(&input).to_vec();
        let other = b.forward(&input).to_vec();

        assert_eq!(
            first.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
            second.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
        );
        assert_eq!(first, other);
    }

    #[test]
    fn forward_computes_activation_of_linear_sum() {
        let mut layer = small_layer(Activation::ReLU);
        let out = layer.forward(&[1.0, 2.0, 3.0]).to_vec();
        // 0.2 - 0.8 + 0.3 + 0.05 = -0.25 -> relu 0
        // 0.5 + 0.6 - 0.6 - 0.1 = 0.4
        assert_eq!(out[0], 0.0);
        assert_abs_diff_eq!(out[1], 0.4, epsilon = 1e-6);
        assert_eq!(layer.last_input(), &[1.0, 2.0, 3.0]);
        assert_abs_diff_eq!(layer.block().pre_activation()[0], -0.25, epsilon = 1e-6);
    }

    #[test]
    fn backpropagate_matches_numeric_gradients() {
        let eps = 1e-3_f32;
        let tol = 1e3 * eps * eps;
        let input = [0.6_f32, -0.3, 0.9];
        let target = [0.25_f32, 0.75];

        for activation in [Activation::Sigmoid, Activation::Identity, Activation::LeakyReLU] {
            let mut layer = small_layer(activation);
            let mut d_out = [0.0_f32; 2];

            let out = layer.forward(&input).to_vec();
            loss::mse_backward(&out, &target, &mut d_out);
            layer.zero_grad();
            layer.backpropagate(&d_out);
            let analytic_w = layer.weight_grad().to_vec();
            let analytic_b = layer.bias_grad().to_vec();

            for p in 0..analytic_w.len() {
                let orig = layer.weights()[p];
                layer.weights_mut()[p] = orig + eps;
                let plus = loss_of(&mut layer, &input, &target);
                layer.weights_mut()[p] = orig - eps;
                let minus = loss_of(&mut layer, &input, &target);
                layer.weights_mut()[p] = orig;

                let numeric = (plus - minus) / (2.0 * eps);
                assert_abs_diff_eq!(analytic_w[p], numeric, epsilon = tol);
            }

            for p in 0..analytic_b.len() {
                let orig = layer.bias()[p];
                layer.bias_mut()[p] = orig + eps;
                let plus = loss_of(&mut layer, &input, &target);
                layer.bias_mut()[p] = orig - eps;
                let minus = loss_of(&mut layer, &input, &target);
                layer.bias_mut()[p] = orig;

                let numeric = (plus - minus) / (2.0 * eps);
                assert_abs_diff_eq!(analytic_b[p], numeric, epsilon = tol);
            }
        }
    }

    #[test]
    fn projection_matches_numeric_input_gradient() {
        let eps = 1e-3_f32;
        let target = [0.1_f32, 0.9];
        let mut input = [0.6_f32, -0.3, 0.9];
        let mut layer = small_layer(Activation::Sigmoid);
        let mut d_out = [0.0_f32; 2];

        let out = layer.forward(&input).to_vec();
        loss::mse_backward(&out, &target, &mut d_out);
        layer.backpropagate(&d_out);
        let analytic = layer.project_partial_derivative().to_vec();
        assert_eq!(analytic.len(), 3);

        for j in 0..input.len() {
            let orig = input[j];
            input[j] = orig + eps;
            let plus = loss_of(&mut layer, &input, &target);
            input[j] = orig - eps;
            let minus = loss_of(&mut layer, &input, &target);
            input[j] = orig;

            let numeric = (plus - minus) / (2.0 * eps);
            assert_abs_diff_eq!(analytic[j], numeric, epsilon = 1e-3);
        }
    }

    #[test]
    fn zero_grad_then_backpropagate_has_no_leakage() {
        let mut fresh = small_layer(Activation::Sigmoid);
        let mut reused = small_layer(Activation::Sigmoid);

        // Pollute `reused` with an unrelated step first.
        reused.forward(&[5.0, -5.0, 2.0]);
        reused.backpropagate(&[3.0, -7.0]);

        let input = [0.1_f32, 0.2, 0.3];
        let upstream = [0.5_f32, -0.25];
        for layer in [&mut fresh, &mut reused] {
            layer.forward(&input);
            layer.zero_grad();
            layer.backpropagate(&upstream);
        }

        assert_eq!(fresh.weight_grad(), reused.weight_grad());
        assert_eq!(fresh.bias_grad(), reused.bias_grad());
    }

    #[test]
    fn apply_gradients_steps_against_the_gradient() {
        let mut layer = small_layer(Activation::Identity);
        let before_w = layer.weights().to_vec();
        let before_b = layer.bias().to_vec();

        layer.forward(&[1.0, 0.0, -1.0]);
        layer.zero_grad();
        layer.backpropagate(&[1.0, 2.0]);
        layer.apply_gradients(0.5);

        let expected_w: Vec<f32> = before_w
            .iter()
            .zip(layer.weight_grad())
            .map(|(w, g)| w - 0.5 * g)
            .collect();
        assert_eq!(layer.weights(), expected_w.as_slice());
        assert_abs_diff_eq!(layer.bias()[0], before_b[0] - 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(layer.bias()[1], before_b[1] - 1.0, epsilon = 1e-6);

        // Without a new backward pass the same gradient is applied again.
        layer.apply_gradients(0.5);
        assert_abs_diff_eq!(layer.bias()[0], before_b[0] - 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(layer.bias()[1], before_b[1] - 2.0, epsilon = 1e-6);
    }

    #[test]
    fn neuron_views_expose_backprop_state() {
        let mut layer = small_layer(Activation::Identity);
        layer.forward(&[1.0, 1.0, 1.0]);
        layer.backpropagate(&[2.0, -1.0]);

        let n1 = layer.neuron(1);
        assert_eq!(n1.weights(layer.block()), &[0.5, 0.3, -0.2]);
        assert_eq!(n1.local_grad(layer.block()), -1.0);
        assert_eq!(n1.weight_grad(layer.block()), &[-1.0, -1.0, -1.0]);
        assert_eq!(n1.bias_grad(layer.block()), -1.0);
    }

    #[test]
    fn from_parts_validates_lengths() {
        assert!(Layer::from_parts(2, 2, Activation::ReLU, &[0.0; 3], &[0.0; 2]).is_err());
        assert!(Layer::from_parts(2, 2, Activation::ReLU, &[0.0; 4], &[0.0; 1]).is_err());
        assert!(Layer::from_parts(1, 1, Activation::ReLU, &[f32::NAN], &[0.0]).is_err());
    }

    #[test]
    fn init_ranges_are_validated() {
        let bad = Init::Uniform {
            low: 1.0,
            high: 1.0,
        };
        assert!(Layer::new_with_seed(2, 2, bad, Activation::ReLU, 0).is_err());

        let too_wide = Init::Uniform {
            low: -3.0e38,
            high: 3.0e38,
        };
        assert!(matches!(too_wide.validate(), Err(Error::InvalidConfig(_))));
        assert!(matches!(
            Layer::new_with_seed(2, 2, too_wide, Activation::ReLU, 0),
            Err(Error::InvalidConfig(_))
        ));

        let layer = Layer::new_with_seed(
            8,
            8,
            Init::Uniform {
                low: -0.5,
                high: 0.5,
            },
            Activation::ReLU,
            3,
        )
        .unwrap();
        assert!(layer.weights().iter().all(|&w| (-0.5..0.5).contains(&w)));

        let he = Layer::new_with_seed(8, 4, Init::He, Activation::ReLU, 3).unwrap();
        assert!(he.bias().iter().all(|&b| b == 0.0));
    }

    #[test]
    #[should_panic(expected = "does not match layer in_features")]
    fn forward_panics_on_input_shape_mismatch() {
        let mut layer = small_layer(Activation::ReLU);
        layer.forward(&[1.0, 2.0]);
    }

    #[test]
    #[should_panic(expected = "before forward")]
    fn backpropagate_before_forward_panics() {
        let mut layer = small_layer(Activation::ReLU);
        layer.backpropagate(&[1.0, 1.0]);
    }

    #[test]
    #[should_panic(expected = "before backpropagate")]
    fn projection_before_backpropagate_panics() {
        let mut layer = small_layer(Activation::ReLU);
        layer.forward(&[1.0, 2.0, 3.0]);
        layer.project_partial_derivative();
    }

    #[test]
    fn display_lists_every_neuron() {
        let layer = small_layer(Activation::Sigmoid);
        let dump = layer.to_string();
        assert!(dump.starts_with("layer 3 -> 2 (sigmoid)"));
        assert!(dump.contains("n0:"));
        assert!(dump.contains("n1:"));
    }
}
