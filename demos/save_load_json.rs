use cogni::{
    load_checkpoint, save_checkpoint, Activation, Dataset, FitConfig, Network, NetworkBuilder,
};

fn main() -> cogni::Result<()> {
    let xs = vec![
        vec![0.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![1.0, 1.0],
    ];
    let ys = vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]];
    let train = Dataset::from_rows(&xs, &ys)?;

    let mut net = NetworkBuilder::new(2)?
        .add_layer(8, Activation::LeakyReLU)?
        .add_layer(1, Activation::Sigmoid)?
        .build_with_seed(0)?;

    net.fit(
        &train,
        &FitConfig {
            epochs: 200,
            learning_rate: 0.1,
            log_every: 0,
        },
    )?;

    let dir = std::env::temp_dir();

    // Snapshot with architecture.
    let json_path = dir.join("cogni_xor.json");
    net.save_json(&json_path)?;
    let mut from_json = Network::load_json(&json_path)?;

    // Bare weights into a network of the same shape.
    let weights_path = dir.join("cogni_xor.w");
    save_checkpoint(&net, &weights_path)?;
    let mut from_weights = NetworkBuilder::new(2)?
        .add_layer(8, Activation::LeakyReLU)?
        .add_layer(1, Activation::Sigmoid)?
        .build_with_seed(99)?;
    load_checkpoint(&mut from_weights, &weights_path)?;

    println!(
        "mse original={} json={} checkpoint={}",
        net.evaluate_mse(&train)?,
        from_json.evaluate_mse(&train)?,
        from_weights.evaluate_mse(&train)?
    );
    Ok(())
}
