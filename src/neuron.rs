//! Neuron views.
//!
//! A neuron does not own anything. It is the `index`-th row of its layer's weight matrix
//! (and the matching row of `weight_grad`, `partial_derivative`) plus the `index`-th scalar of
//! every per-output section (`bias`, `bias_grad`, `outputs`, `local_grad`, ...).
//!
//! Rows are handed out by [`NeuronView::partition`], which tiles `0..out * in` with disjoint
//! `in`-long ranges, so two views of the same block can never overlap.

use std::ops::Range;

use crate::ParameterBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeuronView {
    index: usize,
    row_start: usize,
    row_len: usize,
}

impl NeuronView {
    /// Views for every output neuron of an `out_features x in_features` block.
    #[inline]
    pub fn partition(
        in_features: usize,
        out_features: usize,
    ) -> impl ExactSizeIterator<Item = NeuronView> + Clone {
        (0..out_features).map(move |index| NeuronView::at(index, in_features))
    }

    /// View of neuron `index` in a block whose rows are `in_features` long.
    #[inline]
    pub(crate) fn at(index: usize, in_features: usize) -> NeuronView {
        NeuronView {
            index,
            row_start: index * in_features,
            row_len: in_features,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self.index
    }

    /// Range of this neuron's row inside any `out * in` section.
    #[inline]
    pub fn row(self) -> Range<usize> {
        self.row_start..self.row_start + self.row_len
    }

    #[inline]
    pub fn row_len(self) -> usize {
        self.row_len
    }

    #[inline]
    pub fn weights(self, block: &ParameterBlock) -> &[f32] {
        &block.weights()[self.row()]
    }

    #[inline]
    pub fn bias(self, block: &ParameterBlock) -> f32 {
        block.bias()[self.index]
    }

    #[inline]
    pub fn weight_grad(self, block: &ParameterBlock) -> &[f32] {
        &block.weight_grad()[self.row()]
    }

    #[inline]
    pub fn bias_grad(self, block: &ParameterBlock) -> f32 {
        block.bias_grad()[self.index]
    }

    /// Activation-scaled upstream gradient from the most recent backward pass (`base_derive`).
    #[inline]
    pub fn local_grad(self, block: &ParameterBlock) -> f32 {
        block.local_grad()[self.index]
    }

    #[inline]
    pub fn output(self, block: &ParameterBlock) -> f32 {
        block.outputs()[self.index]
    }

    /// `dot(weights_row, input) + bias`.
    #[inline]
    pub(crate) fn linear(self, weights: &[f32], bias: &[f32], input: &[f32]) -> f32 {
        let mut sum = 0.0_f32;
        for (&w, &x) in weights[self.row()].iter().zip(input) {
            sum = w.mul_add(x, sum);
        }
        sum + bias[self.index]
    }

    /// Overwrites this neuron's gradient row: `weight_grad[row] = base * input`,
    /// `bias_grad[index] = base`.
    #[inline]
    pub(crate) fn write_grads(
        self,
        base_derive: f32,
        input: &[f32],
        weight_grad: &mut [f32],
        bias_grad: &mut [f32],
    ) {
        for (g, &x) in weight_grad[self.row()].iter_mut().zip(input) {
            *g = base_derive * x;
        }
        bias_grad[self.index] = base_derive;
    }

    /// Stages this neuron's contribution to the input gradient:
    /// `staged[row] = base * weights[row]`.
    #[inline]
    pub(crate) fn stage_partial(
        self,
        base_derive: f32,
        weights: &[f32],
        staged: &mut [f32],
    ) {
        let row = self.row();
        for (p, &w) in staged[row.clone()].iter_mut().zip(&weights[row]) {
            *p = base_derive * w;
        }
    }
}
