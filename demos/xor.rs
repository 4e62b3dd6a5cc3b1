use backprop::feed_forward::*;
use ndarray::array;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

fn main() -> backprop::Result<()> {
    tracing_subscriber::fmt().init();

    let mut examples = vec![
        (array![0.0, 0.0], array![0.0]),
        (array![0.0, 1.0], array![1.0]),
        (array![1.0, 0.0], array![1.0]),
        (array![1.0, 1.0], array![0.0]),
    ];

    let mut network = Network::with_rng(&[2, 3, 1], &mut StdRng::seed_from_u64(42))?;
    Trainer::new(Hyperparameters::default())
        .epochs(5000)
        .mini_batch_size(4)
        .learning_rate(3.0)
        .seed(42)
        .logging(Logging::Epochs(1000))
        .train(&mut network, &mut examples, None)?;

    for (input, expected) in &examples {
        let output = network.feed_forward(input)?;
        info!("{} XOR {} = {:.3} (expected {})", input[0], input[1], output[0], expected[0]);
    }
    Ok(())
}
