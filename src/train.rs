//! Training loop.
//!
//! Per sample, strictly in this order:
//!
//! 1. forward through every layer,
//! 2. squared-error gradient at the final output,
//! 3. zero every layer's gradients,
//! 4. backpropagate from the last layer down, chaining projected input gradients,
//! 5. apply the update on every layer.
//!
//! No update is applied before the whole backward pass for that sample has finished.

use crate::{loss, Dataset, Error, Network, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitConfig {
    pub epochs: usize,
    pub learning_rate: f32,
    /// Log progress every `log_every` epochs (0 disables progress lines).
    pub log_every: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            learning_rate: 1e-2,
            log_every: 1,
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be > 0".to_owned()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning_rate must be finite and > 0, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FitReport {
    /// Mean per-sample loss of each epoch, measured before each sample's update.
    pub epoch_losses: Vec<f32>,
}

impl FitReport {
    pub fn final_loss(&self) -> f32 {
        self.epoch_losses.last().copied().unwrap_or(f32::NAN)
    }
}

impl Network {
    /// Train on `train` with single-sample stochastic gradient descent.
    ///
    /// Buffers are reserved once up front; the per-sample loop does not allocate.
    ///
    /// A non-finite prediction aborts the run with [`Error::Diverged`]. The parameters are left
    /// as they were after the last completed step.
    pub fn fit(&mut self, train: &Dataset, cfg: &FitConfig) -> Result<FitReport> {
        cfg.validate()?;
        check_dims(self, train, true)?;

        let mut d_output = vec![0.0_f32; self.output_dim()];
        let mut epoch_losses = Vec::with_capacity(cfg.epochs);

        for epoch in 0..cfg.epochs {
            let mut total = 0.0_f32;
            for idx in 0..train.len() {
                let input = train.input(idx);
                let target = train.target(idx);

                let pred = self.forward(input);
                if pred.iter().any(|p| !p.is_finite()) {
                    log::warn!("prediction diverged at epoch {epoch}, sample {idx}");
                    return Err(Error::Diverged { epoch, sample: idx });
                }
                total += loss::mse_backward(pred, target, &mut d_output);

                self.zero_grad();
                self.backpropagate(&d_output);
                self.apply_gradients(cfg.learning_rate);
            }

            let mean = total / train.len() as f32;
            epoch_losses.push(mean);
            if cfg.log_every > 0 && ((epoch + 1) % cfg.log_every == 0 || epoch + 1 == cfg.epochs) {
                log::info!("epoch {}/{}: loss = {mean:.6}", epoch + 1, cfg.epochs);
            }
        }

        Ok(FitReport { epoch_losses })
    }

    /// Predict outputs for all inputs in `data`.
    ///
    /// Returns a flat buffer with shape `(len, output_dim)`.
    pub fn predict(&mut self, data: &Dataset) -> Result<Vec<f32>> {
        check_dims(self, data, false)?;

        let out_dim = self.output_dim();
        let mut preds = vec![0.0_f32; data.len() * out_dim];
        for idx in 0..data.len() {
            let start = idx * out_dim;
            self.predict_into(data.input(idx), &mut preds[start..start + out_dim])?;
        }
        Ok(preds)
    }

    /// Mean squared error over a dataset (summed over outputs, averaged over samples).
    pub fn evaluate_mse(&mut self, data: &Dataset) -> Result<f32> {
        check_dims(self, data, true)?;

        let mut total = 0.0_f32;
        for idx in 0..data.len() {
            let pred = self.forward(data.input(idx));
            total += loss::mse_sum(pred, data.target(idx));
        }
        Ok(total / data.len() as f32)
    }
}

fn check_dims(network: &Network, data: &Dataset, with_targets: bool) -> Result<()> {
    if data.is_empty() {
        return Err(Error::InvalidData("dataset must not be empty".to_owned()));
    }
    if data.input_dim() != network.input_dim() {
        return Err(Error::InvalidData(format!(
            "dataset input_dim {} does not match network input_dim {}",
            data.input_dim(),
            network.input_dim()
        )));
    }
    if with_targets && data.target_dim() != network.output_dim() {
        return Err(Error::InvalidData(format!(
            "dataset target_dim {} does not match network output_dim {}",
            data.target_dim(),
            network.output_dim()
        )));
    }
    Ok(())
}
