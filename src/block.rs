//! Parameter block: the single contiguous allocation behind a layer.
//!
//! Every float a layer touches lives in one arena, split into fixed sections:
//!
//! | section              | length          |
//! |----------------------|-----------------|
//! | `weights`            | `out * in`      |
//! | `bias`               | `out`           |
//! | `weight_grad`        | `out * in`      |
//! | `bias_grad`          | `out`           |
//! | `last_input`         | `in`            |
//! | `pre_activation`     | `out`           |
//! | `outputs`            | `out`           |
//! | `local_grad`         | `out`           |
//! | `partial_derivative` | `out * in`      |
//! | `input_grad`         | `in`            |
//!
//! Matrices are row-major with one row per output neuron. Sections never overlap and the
//! arena is never resized after construction.

use std::ops::Range;

use crate::{Error, Result};

const SECTION_COUNT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Weights,
    Bias,
    WeightGrad,
    BiasGrad,
    LastInput,
    PreActivation,
    Outputs,
    LocalGrad,
    PartialDerivative,
    InputGrad,
}

impl Section {
    /// Arena order.
    pub const ALL: [Section; SECTION_COUNT] = [
        Section::Weights,
        Section::Bias,
        Section::WeightGrad,
        Section::BiasGrad,
        Section::LastInput,
        Section::PreActivation,
        Section::Outputs,
        Section::LocalGrad,
        Section::PartialDerivative,
        Section::InputGrad,
    ];

    #[inline]
    fn len(self, in_features: usize, out_features: usize) -> usize {
        match self {
            Section::Weights | Section::WeightGrad | Section::PartialDerivative => {
                in_features * out_features
            }
            Section::Bias
            | Section::BiasGrad
            | Section::PreActivation
            | Section::Outputs
            | Section::LocalGrad => out_features,
            Section::LastInput | Section::InputGrad => in_features,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParameterBlock {
    in_features: usize,
    out_features: usize,
    /// `offsets[s]..offsets[s + 1]` is the range of section `s`.
    offsets: [usize; SECTION_COUNT + 1],
    arena: Vec<f32>,
}

/// Disjoint mutable views over every section of a [`ParameterBlock`].
pub(crate) struct BlockMut<'a> {
    pub weights: &'a mut [f32],
    pub bias: &'a mut [f32],
    pub weight_grad: &'a mut [f32],
    pub bias_grad: &'a mut [f32],
    pub last_input: &'a mut [f32],
    pub pre_activation: &'a mut [f32],
    pub outputs: &'a mut [f32],
    pub local_grad: &'a mut [f32],
    pub partial_derivative: &'a mut [f32],
    pub input_grad: &'a mut [f32],
}

impl ParameterBlock {
    /// Reserve a zero-filled block for a layer with the given shape.
    ///
    /// Fails with [`Error::Alloc`] if the arena size overflows or cannot be reserved; nothing
    /// is allocated in that case.
    pub fn zeroed(in_features: usize, out_features: usize) -> Result<Self> {
        if in_features == 0 || out_features == 0 {
            return Err(Error::InvalidConfig(format!(
                "layer dims must be > 0, got in_features={in_features} out_features={out_features}"
            )));
        }

        let mut offsets = [0usize; SECTION_COUNT + 1];
        let matrix = in_features.checked_mul(out_features).ok_or_else(|| {
            Error::Alloc(format!(
                "{out_features}x{in_features} weight matrix does not fit in memory"
            ))
        })?;
        debug_assert_eq!(matrix, Section::Weights.len(in_features, out_features));

        for (i, section) in Section::ALL.iter().enumerate() {
            offsets[i + 1] = offsets[i]
                .checked_add(section.len(in_features, out_features))
                .ok_or_else(|| {
                    Error::Alloc(format!(
                        "parameter block for {out_features}x{in_features} layer overflows"
                    ))
                })?;
        }

        let total = offsets[SECTION_COUNT];
        let mut arena = Vec::new();
        arena.try_reserve_exact(total).map_err(|e| {
            Error::Alloc(format!(
                "could not reserve {total} floats for {out_features}x{in_features} layer: {e}"
            ))
        })?;
        arena.resize(total, 0.0);

        Ok(Self {
            in_features,
            out_features,
            offsets,
            arena,
        })
    }

    #[inline]
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    #[inline]
    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// Total number of floats held by the arena.
    #[inline]
    pub fn arena_len(&self) -> usize {
        self.arena.len()
    }

    #[inline]
    pub fn range(&self, section: Section) -> Range<usize> {
        let i = section as usize;
        self.offsets[i]..self.offsets[i + 1]
    }

    #[inline]
    pub fn section(&self, section: Section) -> &[f32] {
        &self.arena[self.range(section)]
    }

    #[inline]
    pub fn section_mut(&mut self, section: Section) -> &mut [f32] {
        let range = self.range(section);
        &mut self.arena[range]
    }

    #[inline]
    pub fn weights(&self) -> &[f32] {
        self.section(Section::Weights)
    }

    #[inline]
    pub fn weights_mut(&mut self) -> &mut [f32] {
        self.section_mut(Section::Weights)
    }

    #[inline]
    pub fn bias(&self) -> &[f32] {
        self.section(Section::Bias)
    }

    #[inline]
    pub fn bias_mut(&mut self) -> &mut [f32] {
        self.section_mut(Section::Bias)
    }

    #[inline]
    pub fn weight_grad(&self) -> &[f32] {
        self.section(Section::WeightGrad)
    }

    #[inline]
    pub fn bias_grad(&self) -> &[f32] {
        self.section(Section::BiasGrad)
    }

    #[inline]
    pub fn last_input(&self) -> &[f32] {
        self.section(Section::LastInput)
    }

    #[inline]
    pub fn pre_activation(&self) -> &[f32] {
        self.section(Section::PreActivation)
    }

    #[inline]
    pub fn outputs(&self) -> &[f32] {
        self.section(Section::Outputs)
    }

    #[inline]
    pub fn local_grad(&self) -> &[f32] {
        self.section(Section::LocalGrad)
    }

    #[inline]
    pub fn partial_derivative(&self) -> &[f32] {
        self.section(Section::PartialDerivative)
    }

    #[inline]
    pub fn input_grad(&self) -> &[f32] {
        self.section(Section::InputGrad)
    }

    /// Borrow every section mutably at once.
    pub(crate) fn split_mut(&mut self) -> BlockMut<'_> {
        let (in_f, out_f) = (self.in_features, self.out_features);
        let mut rest: &mut [f32] = &mut self.arena;
        let sizes = Section::ALL.map(|section| section.len(in_f, out_f));

        let weights = take(&mut rest, sizes[Section::Weights as usize]);
        let bias = take(&mut rest, sizes[Section::Bias as usize]);
        let weight_grad = take(&mut rest, sizes[Section::WeightGrad as usize]);
        let bias_grad = take(&mut rest, sizes[Section::BiasGrad as usize]);
        let last_input = take(&mut rest, sizes[Section::LastInput as usize]);
        let pre_activation = take(&mut rest, sizes[Section::PreActivation as usize]);
        let outputs = take(&mut rest, sizes[Section::Outputs as usize]);
        let local_grad = take(&mut rest, sizes[Section::LocalGrad as usize]);
        let partial_derivative = take(&mut rest, sizes[Section::PartialDerivative as usize]);
        let input_grad = take(&mut rest, sizes[Section::InputGrad as usize]);
        debug_assert!(rest.is_empty());

        BlockMut {
            weights,
            bias,
            weight_grad,
            bias_grad,
            last_input,
            pre_activation,
            outputs,
            local_grad,
            partial_derivative,
            input_grad,
        }
    }
}

#[inline]
fn take<'a>(rest: &mut &'a mut [f32], len: usize) -> &'a mut [f32] {
    let (head, tail) = std::mem::take(rest).split_at_mut(len);
    *rest = tail;
    head
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_tile_the_arena() {
        let block = ParameterBlock::zeroed(3, 2).unwrap();
        assert_eq!(block.arena_len(), 3 * 3 * 2 + 5 * 2 + 2 * 3);

        let mut end = 0;
        for section in Section::ALL {
            let range = block.range(section);
            assert_eq!(range.start, end, "{section:?} is not contiguous");
            end = range.end;
        }
        assert_eq!(end, block.arena_len());

        assert_eq!(block.weights().len(), 6);
        assert_eq!(block.bias().len(), 2);
        assert_eq!(block.weight_grad().len(), block.weights().len());
        assert_eq!(block.bias_grad().len(), block.bias().len());
        assert_eq!(block.last_input().len(), 3);
        assert_eq!(block.partial_derivative().len(), 6);
        assert_eq!(block.input_grad().len(), 3);
    }

    #[test]
    fn split_views_write_their_own_section() {
        let mut block = ParameterBlock::zeroed(2, 3).unwrap();
        {
            let view = block.split_mut();
            view.bias.fill(1.0);
            view.outputs.fill(2.0);
            view.input_grad.fill(3.0);
        }
        assert!(block.bias().iter().all(|&b| b == 1.0));
        assert!(block.outputs().iter().all(|&o| o == 2.0));
        assert!(block.input_grad().iter().all(|&g| g == 3.0));
        assert!(block.weights().iter().all(|&w| w == 0.0));
        assert!(block.local_grad().iter().all(|&g| g == 0.0));
    }

    #[test]
    fn rejects_empty_and_overflowing_shapes() {
        assert!(matches!(
            ParameterBlock::zeroed(0, 3),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            ParameterBlock::zeroed(usize::MAX, 2),
            Err(Error::Alloc(_))
        ));
        assert!(matches!(
            ParameterBlock::zeroed(usize::MAX / 4, 1),
            Err(Error::Alloc(_))
        ));
    }
}
