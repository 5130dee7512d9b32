use rand::rngs::StdRng;
use rand::SeedableRng;
use sdae::{
    DenoisingOptions, LearningMode, LearningSet, Logging, Sample, StackedNetwork, StopCondition,
    Trainer,
};

/// Twenty samples split by which half of the input is lit.
fn separable_samples() -> Vec<Sample> {
    (0..20)
        .map(|i| {
            let label = i % 2;
            let jitter = (i / 2) as f64 * 0.01;
            let (high, low) = (0.9 - jitter, 0.1 + jitter);
            let image = if label == 0 {
                vec![high, high - 0.05, low, low + 0.05]
            } else {
                vec![low + 0.05, low, high - 0.05, high]
            };
            Sample::new(label, image)
        })
        .collect()
}

#[test]
fn pretrain_then_fine_tune() {
    let mut rng = StdRng::seed_from_u64(89677);
    let samples = separable_samples();
    let mut network = StackedNetwork::from_layer_sizes(&[4, 3, 2], &mut rng).unwrap();

    let options = DenoisingOptions {
        learning_rate: 0.1,
        noise: 0.1,
        mode: LearningMode::Stochastic,
    };
    let costs = network.pretrain(0, &samples, 5, &options, &mut rng).unwrap();
    assert_eq!(costs.len(), 5);
    assert!(costs.iter().all(|c| c.is_finite() && *c > 0.0));

    let mut cost = f64::INFINITY;
    for _ in 0..50 {
        cost = network.fine_tune(&samples, 0.5, LearningMode::Stochastic).unwrap();
    }
    assert!(cost < 2.0f64.ln());
    assert_eq!(network.error_rate(&samples).unwrap(), 0.0);
    for sample in &samples {
        let output = network.compute(sample.image()).unwrap();
        assert!((output.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert_eq!(network.predict(sample.image()).unwrap(), sample.label());
    }
}

#[test]
fn trainer_with_batches() {
    let mut rng = StdRng::seed_from_u64(5);
    let samples = separable_samples();
    let set = LearningSet::new(
        samples.clone(),
        samples[..6].to_vec(),
        samples[6..12].to_vec(),
        2,
        2,
        2,
    )
    .unwrap();
    let mut network = StackedNetwork::from_layer_sizes(&[4, 3, 2], &mut rng).unwrap();

    let report = Trainer::new()
        .pretraining_epochs(3)
        .pretraining_rate(0.05)
        .corruption_levels(vec![0.2])
        .pretraining_mode(LearningMode::Batch(5))
        .learning_rate(0.5)
        .learning_mode(LearningMode::Batch(2))
        .logging(Logging::Silent)
        .stop_condition(StopCondition::Epochs(100))
        .train(&mut network, &set, &mut rng)
        .unwrap();

    assert_eq!(report.epochs, 100);
    assert_eq!(report.pretraining_costs[0].len(), 3);
    assert_eq!(report.best_validation_error, Some(0.0));
    assert!(report.test_error.is_some());
    assert!(report.best_epoch >= 1 && report.best_epoch <= 100);
    assert_eq!(network.error_rate(set.training()).unwrap(), 0.0);
    assert_eq!(network.error_rate(set.test()).unwrap(), 0.0);
}

#[test]
fn same_seed_same_network() {
    let samples = separable_samples();
    let train = || {
        let mut rng = StdRng::seed_from_u64(42);
        let mut network = StackedNetwork::from_layer_sizes(&[4, 3, 3, 2], &mut rng).unwrap();
        let options = DenoisingOptions {
            learning_rate: 0.05,
            noise: 0.3,
            mode: LearningMode::Batch(4),
        };
        for layer in 0..2 {
            network.pretrain(layer, &samples, 2, &options, &mut rng).unwrap();
        }
        network.fine_tune(&samples, 0.1, LearningMode::Batch(3)).unwrap();
        network
            .layers()
            .iter()
            .map(|layer| layer.parameters().clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(train(), train());
}
