//! Utilities for training neural networks.

use crate::error::{Error, Result};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Makes a model trainable using gradient descent.
pub trait Trainable {
    /// Input data format.
    type Input;

    /// Expected output format.
    type Target;

    /// A container for training updates, summed across a mini-batch.
    type Update: Add<Output = Self::Update>;

    /// Returns a new, empty model update.
    fn new_update(&self) -> Self::Update;

    /// Computes the cost gradient for a single training example.
    fn backprop(&self, input: &Self::Input, target: &Self::Target) -> Result<Self::Update>;

    /// Takes a gradient descent step of size `rate` along `update`.
    fn apply_update(&mut self, rate: f64, update: &Self::Update);

    /// Verifies that `input` can be fed to the model.
    fn check_input(&self, _input: &Self::Input) -> Result<()> {
        Ok(())
    }

    /// Verifies that `target` can be compared against the model's output.
    fn check_target(&self, _target: &Self::Target) -> Result<()> {
        Ok(())
    }

    /// Applies a single gradient descent step using the gradient averaged
    /// over every example in `mini_batch`.
    fn update_mini_batch(
        &mut self,
        mini_batch: &[(Self::Input, Self::Target)],
        eta: f64,
    ) -> Result<()> {
        if mini_batch.is_empty() {
            return Err(Error::InvalidArgument("mini-batch is empty".into()));
        }
        let update = mini_batch.iter().try_fold(
            self.new_update(),
            |sum, (input, target)| -> Result<Self::Update> {
                Ok(sum + self.backprop(input, target)?)
            },
        )?;
        self.apply_update(eta / mini_batch.len() as f64, &update);
        Ok(())
    }
}

/// A model that assigns each input to one of a set of numbered classes.
pub trait Classifier: Trainable {
    /// Returns the predicted class of `input`.
    fn classify(&self, input: &Self::Input) -> Result<usize>;

    /// Returns how many examples in `test_data` are classified as their
    /// label.
    fn evaluate(&self, test_data: &[(Self::Input, usize)]) -> Result<usize> {
        test_data
            .iter()
            .try_fold(0, |correct, (input, label)| -> Result<usize> {
                Ok(correct + usize::from(self.classify(input)? == *label))
            })
    }
}

/// The knobs of stochastic gradient descent.
///
/// Parses from [RON](https://github.com/ron-rs/ron); omitted fields keep
/// their defaults:
///
/// ```
/// # use backprop::feed_forward::Hyperparameters;
/// let hp: Hyperparameters = "(epochs: 5, seed: Some(1))".parse().unwrap();
/// assert_eq!(hp.epochs, 5);
/// assert_eq!(hp.mini_batch_size, 10);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparameters {
    /// Number of passes over the training data.
    pub epochs: usize,
    /// Number of examples averaged into each update.
    pub mini_batch_size: usize,
    /// The gradient descent step size, `eta`.
    pub learning_rate: f64,
    /// Seeds the shuffling of the training data, if present.
    pub seed: Option<u64>,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Hyperparameters {
            epochs: 30,
            mini_batch_size: 10,
            learning_rate: 3.0,
            seed: None,
        }
    }
}

impl Hyperparameters {
    fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::InvalidArgument("epochs must be positive".into()));
        }
        if self.mini_batch_size == 0 {
            return Err(Error::InvalidArgument(
                "mini-batch size must be positive".into(),
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidArgument(format!(
                "learning rate must be positive, found {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// The reason why parsing [`Hyperparameters`] failed.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ParseHyperparametersError(#[from] ron::de::SpannedError);

impl FromStr for Hyperparameters {
    type Err = ParseHyperparametersError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(ron::de::from_str(s)?)
    }
}

/// How many evaluation examples were classified correctly.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Score {
    pub correct: usize,
    pub total: usize,
}

impl Score {
    /// The fraction of correct classifications.
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.correct, self.total)
    }
}

/// Progress at the end of one epoch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EpochReport {
    /// Zero-based epoch index.
    pub epoch: usize,
    /// The evaluation score, if evaluation data was supplied.
    pub score: Option<Score>,
}

/// Receives training progress.
pub trait Observer {
    /// Called after every epoch.
    fn epoch(&mut self, report: &EpochReport);

    /// Called once training finishes.
    fn completion(&mut self, _epochs: usize, _elapsed: Duration) {}
}

impl<F> Observer for F
where
    F: FnMut(&EpochReport),
{
    fn epoch(&mut self, report: &EpochReport) {
        self(report)
    }
}

/// Logging frequency to use during training
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Logging {
    /// Nothing will be logged
    Silent,
    /// A summary will be logged at completion
    Completion,
    /// Progress will be logged after every `n` epochs, plus the summary
    Epochs(usize),
}

impl Observer for Logging {
    fn epoch(&mut self, report: &EpochReport) {
        if let Logging::Epochs(freq) = *self {
            if freq > 0 && (report.epoch + 1) % freq == 0 {
                match report.score {
                    Some(score) => info!(epoch = report.epoch, "Epoch {}: {}", report.epoch, score),
                    None => info!(epoch = report.epoch, "Epoch {} complete", report.epoch),
                }
            }
        }
    }

    fn completion(&mut self, epochs: usize, elapsed: Duration) {
        if let Logging::Silent = *self {
            return;
        }
        info!("Trained {} epochs in {:.2?}.", epochs, elapsed);
    }
}

/// A builder for training models with mini-batch stochastic gradient descent.
#[derive(Debug)]
pub struct Trainer<O = Logging> {
    hyperparameters: Hyperparameters,
    observer: O,
}

impl Trainer {
    /// Creates a new Trainer instance that logs on completion.
    pub fn new(hyperparameters: Hyperparameters) -> Self {
        Trainer {
            hyperparameters,
            observer: Logging::Completion,
        }
    }
}

impl<O: Observer> Trainer<O> {
    /// Sets the number of passes over the training data.
    pub fn epochs(mut self, epochs: usize) -> Self {
        self.hyperparameters.epochs = epochs;
        self
    }

    /// Sets the number of examples per gradient descent step.
    pub fn mini_batch_size(mut self, size: usize) -> Self {
        self.hyperparameters.mini_batch_size = size;
        self
    }

    /// Sets the learning rate to use during gradient descent.
    pub fn learning_rate(mut self, rate: f64) -> Self {
        self.hyperparameters.learning_rate = rate;
        self
    }

    /// Makes the shuffling of the training data reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.hyperparameters.seed = Some(seed);
        self
    }

    /// Sets the type of logging to be emitted during training.
    pub fn logging(self, logging: Logging) -> Trainer<Logging> {
        self.observer(logging)
    }

    /// Replaces whatever receives training progress.
    pub fn observer<P: Observer>(self, observer: P) -> Trainer<P> {
        Trainer {
            hyperparameters: self.hyperparameters,
            observer,
        }
    }

    /// Trains `model` in place on `training_data`.
    ///
    /// Every epoch shuffles `training_data`, splits it into consecutive
    /// mini-batches (the last one possibly shorter), and applies one update
    /// per mini-batch. If `test_data` is provided, the model is evaluated
    /// against it after every epoch.
    ///
    /// Returns an error without touching the model if the hyperparameters
    /// are out of range or any example doesn't fit the model.
    pub fn train<T: Classifier>(
        mut self,
        model: &mut T,
        training_data: &mut [(T::Input, T::Target)],
        test_data: Option<&[(T::Input, usize)]>,
    ) -> Result<()> {
        self.validate(model, training_data, test_data)?;

        let Hyperparameters {
            epochs,
            mini_batch_size,
            learning_rate,
            seed,
        } = self.hyperparameters;
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let start_time = Instant::now();
        for epoch in 0..epochs {
            training_data.shuffle(&mut rng);
            for mini_batch in training_data.chunks(mini_batch_size) {
                model.update_mini_batch(mini_batch, learning_rate)?;
            }
            debug!(
                epoch,
                mini_batches = training_data.chunks(mini_batch_size).len(),
                "finished epoch"
            );

            let score = match test_data {
                Some(test_data) => Some(Score {
                    correct: model.evaluate(test_data)?,
                    total: test_data.len(),
                }),
                None => None,
            };
            self.observer.epoch(&EpochReport { epoch, score });
        }
        self.observer.completion(epochs, start_time.elapsed());
        Ok(())
    }

    /// Verifies that all provided inputs to the `Trainer` are valid, returning
    /// an error if something is wrong.
    fn validate<T: Classifier>(
        &self,
        model: &T,
        training_data: &[(T::Input, T::Target)],
        test_data: Option<&[(T::Input, usize)]>,
    ) -> Result<()> {
        self.hyperparameters.validate()?;
        if training_data.is_empty() {
            return Err(Error::InvalidArgument("no training examples".into()));
        }
        for (input, target) in training_data {
            model.check_input(input)?;
            model.check_target(target)?;
        }
        for (input, _) in test_data.unwrap_or_default() {
            model.check_input(input)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed_forward::Network;
    use ndarray::{array, Array1};
    use rand::rngs::StdRng;
    use test_strategy::proptest;

    fn xor() -> Vec<(Array1<f64>, Array1<f64>)> {
        vec![
            (array![0.0, 0.0], array![0.0]),
            (array![0.0, 1.0], array![1.0]),
            (array![1.0, 0.0], array![1.0]),
            (array![1.0, 1.0], array![0.0]),
        ]
    }

    fn seeded(sizes: &[usize], seed: u64) -> Network {
        Network::with_rng(sizes, &mut StdRng::seed_from_u64(seed)).unwrap()
    }

    fn quiet() -> Trainer {
        Trainer::new(Hyperparameters::default()).logging(Logging::Silent)
    }

    /// Collects the examples handed to each update, in order.
    #[derive(Debug, Default)]
    struct Recorder {
        mini_batches: Vec<Vec<usize>>,
    }

    #[derive(Debug)]
    struct Seen(Vec<usize>);

    impl Add for Seen {
        type Output = Seen;

        fn add(mut self, other: Seen) -> Seen {
            self.0.extend(other.0);
            self
        }
    }

    impl Trainable for Recorder {
        type Input = usize;
        type Target = ();
        type Update = Seen;

        fn new_update(&self) -> Seen {
            Seen(Vec::new())
        }

        fn backprop(&self, input: &usize, _: &()) -> Result<Seen> {
            Ok(Seen(vec![*input]))
        }

        fn apply_update(&mut self, _: f64, update: &Seen) {
            self.mini_batches.push(update.0.clone());
        }
    }

    impl Classifier for Recorder {
        fn classify(&self, _: &usize) -> Result<usize> {
            Ok(0)
        }
    }

    #[test]
    fn xor_epoch_changes_parameters() {
        let mut network = seeded(&[2, 3, 1], 21);
        let before = network.clone();
        quiet()
            .epochs(1)
            .mini_batch_size(4)
            .learning_rate(3.0)
            .train(&mut network, &mut xor(), None)
            .unwrap();
        assert_ne!(network, before);
        for (new, old) in network.weights().zip(before.weights()) {
            assert_ne!(new, old);
        }
    }

    #[test]
    fn sgd_without_evaluation_data() {
        let mut network = seeded(&[2, 3, 1], 22);
        let before = network.clone();
        assert_eq!(network.sgd(&mut xor(), 1, 4, 3.0, None), Ok(()));
        assert_ne!(network, before);
    }

    #[test]
    fn sgd_with_evaluation_data() {
        let mut network = seeded(&[2, 3, 2], 23);
        let mut training = vec![
            (array![0.0, 1.0], array![1.0, 0.0]),
            (array![1.0, 0.0], array![0.0, 1.0]),
        ];
        let test = vec![(array![0.0, 1.0], 0), (array![1.0, 0.0], 1)];
        assert_eq!(network.sgd(&mut training, 2, 1, 0.5, Some(&test[..])), Ok(()));
    }

    #[test]
    fn training_reduces_cost() {
        let mut network = seeded(&[2, 3, 1], 24);
        let data = xor();
        let cost = |n: &Network| -> f64 { data.iter().map(|(x, y)| n.cost(x, y).unwrap()).sum() };
        let before = cost(&network);
        quiet()
            .epochs(20)
            .mini_batch_size(4)
            .learning_rate(0.5)
            .seed(3)
            .train(&mut network, &mut xor(), None)
            .unwrap();
        assert!(cost(&network) < before);
    }

    #[test]
    fn seeded_training_is_reproducible() {
        let mut a = seeded(&[2, 3, 1], 25);
        let mut b = a.clone();
        quiet().epochs(3).mini_batch_size(2).seed(9).train(&mut a, &mut xor(), None).unwrap();
        quiet().epochs(3).mini_batch_size(2).seed(9).train(&mut b, &mut xor(), None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn observer_sees_every_epoch() {
        let mut reports = Vec::new();
        let mut network = seeded(&[2, 3, 1], 26);
        let test = vec![(array![0.0, 0.0], 0), (array![1.0, 1.0], 0)];
        quiet()
            .epochs(3)
            .mini_batch_size(3)
            .observer(|report: &EpochReport| reports.push(*report))
            .train(&mut network, &mut xor(), Some(&test[..]))
            .unwrap();

        assert_eq!(reports.len(), 3);
        for (i, report) in reports.iter().enumerate() {
            assert_eq!(report.epoch, i);
            let score = report.score.unwrap();
            assert_eq!(score.total, 2);
            // A single output always predicts class 0.
            assert_eq!(score.correct, 2);
        }
    }

    #[test]
    fn observer_without_evaluation_data_gets_no_score() {
        let mut reports = Vec::new();
        quiet()
            .epochs(2)
            .observer(|report: &EpochReport| reports.push(*report))
            .train(&mut seeded(&[2, 1], 27), &mut xor(), None)
            .unwrap();
        assert_eq!(
            reports,
            vec![
                EpochReport {
                    epoch: 0,
                    score: None
                },
                EpochReport {
                    epoch: 1,
                    score: None
                },
            ]
        );
    }

    #[proptest]
    fn mini_batches_cover_every_example_once(
        #[strategy(1usize..50)] examples: usize,
        #[strategy(1usize..12)] mini_batch_size: usize,
        seed: u64,
    ) {
        let mut model = Recorder::default();
        let mut data: Vec<_> = (0..examples).map(|i| (i, ())).collect();
        quiet()
            .epochs(1)
            .mini_batch_size(mini_batch_size)
            .seed(seed)
            .train(&mut model, &mut data, None)
            .unwrap();

        let (last, full) = model.mini_batches.split_last().unwrap();
        assert!(full.iter().all(|b| b.len() == mini_batch_size));
        assert!(!last.is_empty() && last.len() <= mini_batch_size);

        let mut seen: Vec<_> = model.mini_batches.concat();
        seen.sort_unstable();
        assert_eq!(seen, (0..examples).collect::<Vec<_>>());
    }

    #[test]
    fn mini_batches_follow_shuffled_order() {
        let mut model = Recorder::default();
        let mut data: Vec<_> = (0..7).map(|i| (i, ())).collect();
        quiet()
            .epochs(1)
            .mini_batch_size(3)
            .seed(1)
            .train(&mut model, &mut data, None)
            .unwrap();
        let order: Vec<_> = data.iter().map(|&(i, _)| i).collect();
        assert_eq!(model.mini_batches.concat(), order);
        assert_eq!(model.mini_batches.len(), 3);
    }

    #[test]
    fn oversized_mini_batch_takes_everything() {
        let mut model = Recorder::default();
        let mut data: Vec<_> = (0..4).map(|i| (i, ())).collect();
        quiet()
            .epochs(2)
            .mini_batch_size(100)
            .train(&mut model, &mut data, None)
            .unwrap();
        assert_eq!(model.mini_batches.len(), 2);
        assert!(model.mini_batches.iter().all(|b| b.len() == 4));
    }

    #[test]
    fn huge_mini_batch_with_debug_logging() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut model = Recorder::default();
        let mut data = vec![(0, ())];
        quiet()
            .epochs(1)
            .mini_batch_size(usize::MAX)
            .train(&mut model, &mut data, None)
            .unwrap();
        assert_eq!(model.mini_batches, vec![vec![0]]);
    }

    #[test]
    fn invalid_hyperparameters() {
        for trainer in [
            quiet().epochs(0),
            quiet().mini_batch_size(0),
            quiet().learning_rate(0.0),
            quiet().learning_rate(-1.0),
            quiet().learning_rate(f64::NAN),
        ] {
            let mut network = seeded(&[2, 1], 28);
            let before = network.clone();
            assert!(matches!(
                trainer.train(&mut network, &mut xor(), None),
                Err(Error::InvalidArgument(_))
            ));
            assert_eq!(network, before);
        }
    }

    #[test]
    fn empty_training_data() {
        let mut network = seeded(&[2, 1], 29);
        assert!(matches!(
            quiet().train(&mut network, &mut [], None),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn bad_example_leaves_model_untouched() {
        let mut network = seeded(&[2, 3, 1], 30);
        let before = network.clone();
        let mut data = xor();
        data.push((array![1.0, 1.0], array![0.0, 1.0]));
        assert_eq!(
            quiet().train(&mut network, &mut data, None),
            Err(Error::DimensionMismatch {
                expected: 1,
                found: 2
            })
        );
        assert_eq!(network, before);

        let test = vec![(array![1.0], 0)];
        assert!(matches!(
            quiet().train(&mut network, &mut xor(), Some(&test[..])),
            Err(Error::DimensionMismatch { .. })
        ));
        assert_eq!(network, before);
    }

    #[test]
    fn parse_hyperparameters() {
        let hp: Hyperparameters =
            "(epochs: 5, mini_batch_size: 2, learning_rate: 0.5, seed: Some(7))"
                .parse()
                .unwrap();
        assert_eq!(
            hp,
            Hyperparameters {
                epochs: 5,
                mini_batch_size: 2,
                learning_rate: 0.5,
                seed: Some(7),
            }
        );
    }

    #[test]
    fn parse_partial_hyperparameters() {
        let hp: Hyperparameters = "(learning_rate: 0.1)".parse().unwrap();
        assert_eq!(
            hp,
            Hyperparameters {
                learning_rate: 0.1,
                ..Hyperparameters::default()
            }
        );
    }

    #[test]
    fn parse_invalid_hyperparameters() {
        assert!("(epochs: -1)".parse::<Hyperparameters>().is_err());
        assert!("epochs".parse::<Hyperparameters>().is_err());
    }

    #[test]
    fn score_display_and_accuracy() {
        let score = Score {
            correct: 3,
            total: 4,
        };
        assert_eq!(score.to_string(), "3 / 4");
        assert_eq!(score.accuracy(), 0.75);
        assert_eq!(Score { correct: 0, total: 0 }.accuracy(), 0.0);
    }
}
