use super::{History, ModelPrediction, SignalModel};
use crate::value_objects::prediction::Prediction;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Baseline that ignores the data. Deterministic for a fixed seed.
#[derive(Debug, Clone)]
pub struct RandomModel {
    seed: u64,
    rng: StdRng,
}

impl RandomModel {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl SignalModel for RandomModel {
    fn name(&self) -> &str {
        "random"
    }

    fn predict(&mut self, _history: &History<'_>) -> ModelPrediction {
        let prediction = match self.rng.gen_range(0..3) {
            0 => Prediction::Buy,
            1 => Prediction::Sell,
            _ => Prediction::Hold,
        };
        let confidence = self.rng.gen_range(0.5..1.0);
        ModelPrediction::new(prediction, confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::RandomModel;
    use crate::services::models::{History, SignalModel};

    #[test]
    fn same_seed_same_sequence() {
        let history = History::new(&[], &[]);
        let mut a = RandomModel::new(7);
        let mut b = RandomModel::new(7);
        for _ in 0..20 {
            assert_eq!(a.predict(&history), b.predict(&history));
        }
    }

    #[test]
    fn confidence_stays_in_range() {
        let history = History::new(&[], &[]);
        let mut model = RandomModel::new(1);
        for _ in 0..100 {
            let pred = model.predict(&history);
            assert!((0.5..1.0).contains(&pred.confidence));
        }
    }
}
