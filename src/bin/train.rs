use anyhow::{bail, Context, Result};
use backprop::feed_forward::*;
use clap::Parser;
use ndarray::{array, Array1};
use ndarray_rand::rand_distr::{Distribution, Normal};
use rand::Rng;
use std::f64::consts::PI;
use tracing::{info, Level};

/// A point near the unit circle and whether it lies in the first or third
/// quadrant (class 0) or the second or fourth (class 1).
type Sample = (Array1<f64>, usize);

fn generate_data<R: Rng>(num_samples: usize, rng: &mut R) -> Result<Vec<Sample>> {
    let noise = Normal::new(0.0, 0.1).context("invalid noise distribution")?;
    let mut data = Vec::with_capacity(num_samples);
    for _ in 0..num_samples {
        let theta = rng.gen_range(0.0..2.0 * PI);
        let point = array![
            theta.cos() + noise.sample(rng),
            theta.sin() + noise.sample(rng)
        ];
        let class = if point[0] * point[1] > 0.0 { 0 } else { 1 };
        data.push((point, class));
    }
    Ok(data)
}

fn one_hot(class: usize, classes: usize) -> Array1<f64> {
    let mut target = Array1::zeros(classes);
    target[class] = 1.0;
    target
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Trains a feedforward network on noisy circle quadrants")]
struct Opts {
    /// Neurons per layer, input layer first.
    #[arg(long, value_delimiter = ',', default_value = "2,5,5,2")]
    sizes: Vec<usize>,

    /// Training hyperparameters in RON, e.g. "(epochs: 10, seed: Some(1))".
    #[arg(long, value_name = "ron")]
    config: Option<Hyperparameters>,

    /// Number of generated training examples.
    #[arg(long, default_value_t = 10_000)]
    train_samples: usize,

    /// Number of generated test examples.
    #[arg(long, default_value_t = 1_000)]
    test_samples: usize,

    #[arg(short, long, value_name = "level", default_value = "info")]
    verbosity: Level,
}

fn main() -> Result<()> {
    let Opts {
        sizes,
        config,
        train_samples,
        test_samples,
        verbosity,
    } = Opts::parse();

    tracing_subscriber::fmt()
        .with_max_level(verbosity)
        .with_writer(std::io::stderr)
        .init();

    if sizes.first() != Some(&2) || sizes.last() != Some(&2) {
        bail!("the network must take 2 inputs and produce 2 outputs, got {:?}", sizes);
    }

    let mut rng = rand::thread_rng();
    let test_data = generate_data(test_samples, &mut rng)?;
    let labelled = generate_data(train_samples, &mut rng)?;
    let mut training_data: Vec<_> = labelled
        .iter()
        .map(|(point, class)| (point.clone(), one_hot(*class, 2)))
        .collect();

    let config = config.unwrap_or_default();
    let mut network = Network::new(&sizes).context("failed to build the network")?;
    info!(%network, ?config, "training");

    Trainer::new(config)
        .logging(Logging::Epochs(1))
        .train(&mut network, &mut training_data, Some(&test_data[..]))
        .context("training failed")?;

    for (name, data) in [("Training", &labelled), ("Test", &test_data)] {
        let score = Score {
            correct: network.evaluate(data)?,
            total: data.len(),
        };
        info!("{} set results: {} correct ({:.1}%)", name, score, 100.0 * score.accuracy());
    }

    Ok(())
}
