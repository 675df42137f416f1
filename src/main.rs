//! `cogni` command line.
//!
//! ```text
//! cogni train --config run.json [--epochs 500] [--lr 0.01] [--checkpoint out.w]
//! cogni predict --model model.json --data test.csv --label-column 4
//! cogni demo --epochs 5
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cogni::activation::sigmoid;
use cogni::{
    load_checkpoint, load_config, save_checkpoint, Activation, CsvOptions, CsvTable, Layer,
    Network,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Train and run small feed-forward networks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a network described by a JSON config file
    Train {
        /// Training configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Override the dataset path
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Override the epoch count
        #[arg(long)]
        epochs: Option<usize>,

        /// Override the learning rate
        #[arg(long)]
        lr: Option<f32>,

        /// Override the initialisation seed
        #[arg(long)]
        seed: Option<u64>,

        /// Write a weight checkpoint here after training
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Read a weight checkpoint before training
        #[arg(long)]
        resume: Option<PathBuf>,

        /// Write a JSON model snapshot here after training
        #[arg(long)]
        model_json: Option<PathBuf>,
    },

    /// Run a saved JSON model over a CSV file
    Predict {
        /// JSON model snapshot
        #[arg(short, long)]
        model: PathBuf,

        /// Input data (CSV with a header row)
        #[arg(short, long)]
        data: PathBuf,

        /// Column holding the target
        #[arg(long, default_value = "0")]
        label_column: usize,
    },

    /// Train the 2-2-1 sigmoid reference network and compare against the closed-form update
    Demo {
        /// Number of single-sample updates
        #[arg(long, default_value = "5")]
        epochs: usize,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Train {
            config,
            data,
            epochs,
            lr,
            seed,
            checkpoint,
            resume,
            model_json,
        } => {
            let mut cfg = load_config(&config)
                .with_context(|| format!("loading config {}", config.display()))?;
            if let Some(path) = data {
                cfg.data.path = path;
            }
            if let Some(epochs) = epochs {
                cfg.epochs = epochs;
            }
            if let Some(lr) = lr {
                cfg.learning_rate = lr;
            }
            if seed.is_some() {
                cfg.seed = seed;
            }
            if checkpoint.is_some() {
                cfg.checkpoint = checkpoint;
            }
            if resume.is_some() {
                cfg.resume = resume;
            }
            cfg.validate().context("invalid configuration")?;

            let table = CsvTable::read(&cfg.data.path, &cfg.data.csv_options()?)
                .with_context(|| format!("reading dataset {}", cfg.data.path.display()))?;
            let train = table.to_dataset(cfg.data.label_column)?;
            println!(
                "Loaded {} samples with {} features",
                train.len(),
                train.input_dim()
            );

            let mut net = cfg.build_network()?;
            if let Some(path) = &cfg.resume {
                load_checkpoint(&mut net, path)
                    .with_context(|| format!("resuming from {}", path.display()))?;
            }

            let report = net.fit(&train, &cfg.fit_config()).context("training failed")?;
            println!("Final loss: {:.6}", report.final_loss());

            if let Some(path) = &cfg.checkpoint {
                save_checkpoint(&net, path)
                    .with_context(|| format!("writing checkpoint {}", path.display()))?;
            }
            if let Some(path) = &model_json {
                net.save_json(path)
                    .with_context(|| format!("writing model {}", path.display()))?;
            }
        }

        Command::Predict {
            model,
            data,
            label_column,
        } => {
            let mut net = Network::load_json(&model)
                .with_context(|| format!("loading model {}", model.display()))?;
            let table = CsvTable::read(&data, &CsvOptions::default())
                .with_context(|| format!("reading dataset {}", data.display()))?;
            let test = table.to_dataset(label_column)?;

            let preds = net.predict(&test)?;
            let out_dim = net.output_dim();
            for (idx, row) in preds.chunks(out_dim).enumerate() {
                println!("{idx}\t{row:?}\t{:?}", test.target(idx));
            }
            println!("MSE: {:.6}", net.evaluate_mse(&test)?);
        }

        Command::Demo { epochs } => demo(epochs)?,
    }

    Ok(())
}

const DEMO_INPUT: [f32; 2] = [1.66, 1.56];
const DEMO_TARGET: f32 = 1.0;
const DEMO_LR: f32 = 0.9;
const DEMO_WEIGHTS: [f32; 6] = [10.45, -10.0, 0.0, -3.9, 0.33, -4.7];
const DEMO_BIAS: [f32; 3] = [3.0, 1.0, -5.0];

fn demo(epochs: usize) -> Result<()> {
    let hidden = Layer::from_parts(
        2,
        2,
        Activation::Sigmoid,
        &DEMO_WEIGHTS[..4],
        &DEMO_BIAS[..2],
    )?;
    let output = Layer::from_parts(
        2,
        1,
        Activation::Sigmoid,
        &DEMO_WEIGHTS[4..],
        &DEMO_BIAS[2..],
    )?;
    let mut net = Network::from_layers(vec![hidden, output])?;

    let mut w = DEMO_WEIGHTS;
    let mut b = DEMO_BIAS;
    let mut d_out = [0.0_f32; 1];

    println!("epoch\tengine\t\ttextbook\tloss");
    for epoch in 0..epochs {
        let expected = textbook_step(&mut w, &mut b);
        let loss = net.train_step(&DEMO_INPUT, &[DEMO_TARGET], DEMO_LR, &mut d_out);
        let engine = net.output()[0];
        println!("{epoch}\t{engine:.8}\t{expected:.8}\t{loss:.8}");
        if !loss.is_finite() {
            anyhow::bail!("demo diverged at epoch {epoch}");
        }
    }
    Ok(())
}

/// One forward + update of the 2-2-1 sigmoid network written out by hand.
/// Returns the prediction made before the update.
fn textbook_step(w: &mut [f32; 6], b: &mut [f32; 3]) -> f32 {
    let x = DEMO_INPUT;
    let h1 = sigmoid(x[0] * w[0] + x[1] * w[1] + b[0]);
    let h2 = sigmoid(x[0] * w[2] + x[1] * w[3] + b[1]);
    let a = sigmoid(h1 * w[4] + h2 * w[5] + b[2]);

    let base_o = a * (1.0 - a) * (-2.0 * (DEMO_TARGET - a));
    let base_h1 = h1 * (1.0 - h1) * (w[4] * base_o);
    let base_h2 = h2 * (1.0 - h2) * (w[5] * base_o);

    w[0] -= DEMO_LR * base_h1 * x[0];
    w[1] -= DEMO_LR * base_h1 * x[1];
    w[2] -= DEMO_LR * base_h2 * x[0];
    w[3] -= DEMO_LR * base_h2 * x[1];
    w[4] -= DEMO_LR * base_o * h1;
    w[5] -= DEMO_LR * base_o * h2;
    b[0] -= DEMO_LR * base_h1;
    b[1] -= DEMO_LR * base_h2;
    b[2] -= DEMO_LR * base_o;
    a
}
