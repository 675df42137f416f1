use cogni::{Activation, Dataset, FitConfig, Init, NetworkBuilder};

fn main() -> cogni::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Classic XOR dataset.
    let xs = vec![
        vec![0.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![1.0, 1.0],
    ];
    let ys = vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]];
    let train = Dataset::from_rows(&xs, &ys)?;

    // 2 -> 8 -> 1 network.
    // ReLU hidden layer, sigmoid output for a probability-like output.
    let mut net = NetworkBuilder::new(2)?
        .init(Init::He)?
        .add_layer(8, Activation::ReLU)?
        .add_layer(1, Activation::Sigmoid)?
        .build_with_seed(0)?;

    let report = net.fit(
        &train,
        &FitConfig {
            epochs: 2_000,
            learning_rate: 0.1,
            log_every: 500,
        },
    )?;

    let mse = net.evaluate_mse(&train)?;
    println!(
        "final_loss_from_fit={} train_mse={}",
        report.final_loss(),
        mse
    );

    let mut out = [0.0_f32; 1];
    for x in xs {
        net.predict_into(&x, &mut out)?;
        println!("x={x:?} y={:?}", out[0]);
    }

    Ok(())
}
