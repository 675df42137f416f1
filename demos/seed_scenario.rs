//! The 2-2-1 sigmoid reference network, driven layer by layer.

use cogni::{loss, Activation, Layer};

fn main() -> cogni::Result<()> {
    let mut hidden =
        Layer::from_parts(2, 2, Activation::Sigmoid, &[10.45, -10.0, 0.0, -3.9], &[3.0, 1.0])?;
    let mut output = Layer::from_parts(2, 1, Activation::Sigmoid, &[0.33, -4.7], &[-5.0])?;

    let x = [1.66_f32, 1.56];
    let target = [1.0_f32];
    let lr = 0.9;
    let mut d_out = [0.0_f32; 1];

    for epoch in 0..5 {
        let h = hidden.forward(&x);
        let y = output.forward(h);
        let mse = loss::mse_backward(y, &target, &mut d_out);
        println!("epoch {epoch}: prediction={:.6} mse={mse:.6}", y[0]);

        hidden.zero_grad();
        output.zero_grad();
        output.backpropagate(&d_out);
        hidden.backpropagate(output.project_partial_derivative());
        output.apply_gradients(lr);
        hidden.apply_gradients(lr);
    }

    print!("{hidden}{output}");
    Ok(())
}
