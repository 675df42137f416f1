//! A static stack of fully-connected layers.
//!
//! Layers never reference each other: [`Network::forward`] hands each layer's output to the
//! next one explicitly, and [`Network::backpropagate`] hands each layer's projected input
//! gradient to the one below it.

use crate::{loss, Error, Layer, Result};

#[derive(Debug, Clone)]
pub struct Network {
    layers: Vec<Layer>,
}

impl Network {
    /// Assemble a network, rejecting stacks whose widths do not line up.
    ///
    /// Layer `i`'s `out_features` must equal layer `i + 1`'s `in_features`.
    pub fn from_layers(layers: Vec<Layer>) -> Result<Self> {
        if layers.is_empty() {
            return Err(Error::InvalidConfig(
                "network must have at least one layer".to_owned(),
            ));
        }
        for (i, pair) in layers.windows(2).enumerate() {
            if pair[0].out_features() != pair[1].in_features() {
                return Err(Error::InvalidShape(format!(
                    "layer {} in_features {} does not match layer {i} out_features {}",
                    i + 1,
                    pair[1].in_features(),
                    pair[0].out_features()
                )));
            }
        }
        Ok(Self { layers })
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.layers[0].in_features()
    }

    #[inline]
    pub fn output_dim(&self) -> usize {
        self.layers[self.layers.len() - 1].out_features()
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    #[inline]
    pub fn layer(&self, idx: usize) -> Option<&Layer> {
        self.layers.get(idx)
    }

    #[inline]
    pub fn layer_mut(&mut self, idx: usize) -> Option<&mut Layer> {
        self.layers.get_mut(idx)
    }

    /// Layer widths including the input: `[input_dim, out_0, out_1, ...]`.
    pub fn widths(&self) -> Vec<usize> {
        std::iter::once(self.input_dim())
            .chain(self.layers.iter().map(Layer::out_features))
            .collect()
    }

    /// Output of the last layer from the most recent forward pass.
    #[inline]
    pub fn output(&self) -> &[f32] {
        self.layers[self.layers.len() - 1].outputs()
    }

    /// Forward pass for a single sample through every layer in order.
    ///
    /// Shape contract: `input.len() == self.input_dim()`.
    pub fn forward(&mut self, input: &[f32]) -> &[f32] {
        assert_eq!(
            input.len(),
            self.input_dim(),
            "input len {} does not match network input_dim {}",
            input.len(),
            self.input_dim()
        );

        self.layers[0].forward(input);
        for idx in 1..self.layers.len() {
            // Borrow the previous output immutably and the current layer mutably.
            let (done, rest) = self.layers.split_at_mut(idx);
            rest[0].forward(done[idx - 1].outputs());
        }

        self.output()
    }

    pub fn zero_grad(&mut self) {
        for layer in &mut self.layers {
            layer.zero_grad();
        }
    }

    /// Backward pass for a single sample.
    ///
    /// `d_output` is `dL/d(output)` for the most recent forward call. Layers are visited
    /// strictly in reverse; each one's projected input gradient feeds the layer below.
    /// Gradients are overwritten, so [`Network::zero_grad`] before this call only matters for
    /// callers inspecting the buffers in between.
    pub fn backpropagate(&mut self, d_output: &[f32]) {
        assert_eq!(
            d_output.len(),
            self.output_dim(),
            "d_output len {} does not match network output_dim {}",
            d_output.len(),
            self.output_dim()
        );

        let last = self.layers.len() - 1;
        self.layers[last].backpropagate(d_output);
        for idx in (1..=last).rev() {
            let (below, from) = self.layers.split_at_mut(idx);
            let upstream = from[0].project_partial_derivative();
            below[idx - 1].backpropagate(upstream);
        }
    }

    /// Gradient of the loss w.r.t. the network input, for the most recent backward pass.
    pub fn input_gradient(&mut self) -> &[f32] {
        self.layers[0].project_partial_derivative()
    }

    /// `param -= learning_rate * grad` on every layer.
    ///
    /// Call only after [`Network::backpropagate`] has finished for the current sample.
    pub fn apply_gradients(&mut self, learning_rate: f32) {
        for layer in &mut self.layers {
            layer.apply_gradients(learning_rate);
        }
    }

    /// One stochastic gradient-descent step on a single sample.
    ///
    /// Runs forward, writes the squared-error gradient into `d_output`, zeroes every layer's
    /// gradients, backpropagates in reverse layer order and only then applies the update.
    /// Returns the loss measured before the update.
    ///
    /// `d_output` is caller-owned scratch of length `output_dim` so the step does not allocate.
    pub fn train_step(
        &mut self,
        input: &[f32],
        target: &[f32],
        learning_rate: f32,
        d_output: &mut [f32],
    ) -> f32 {
        let pred = self.forward(input);
        let loss = loss::mse_backward(pred, target, d_output);
        self.zero_grad();
        self.backpropagate(d_output);
        self.apply_gradients(learning_rate);
        loss
    }

    /// Shape-checked inference into a caller-provided buffer.
    pub fn predict_into(&mut self, input: &[f32], out: &mut [f32]) -> Result<()> {
        if input.len() != self.input_dim() {
            return Err(Error::InvalidShape(format!(
                "input len {} does not match network input_dim {}",
                input.len(),
                self.input_dim()
            )));
        }
        if out.len() != self.output_dim() {
            return Err(Error::InvalidShape(format!(
                "output len {} does not match network output_dim {}",
                out.len(),
                self.output_dim()
            )));
        }
        out.copy_from_slice(self.forward(input));
        Ok(())
    }
}
