//! Session orchestration: epochs of training over a split prefix, then an
//! optional scoring pass.

use crate::config::{HarnessConfig, Layout, SessionPlan};
use crate::dataset::Dataset;
use crate::driver::SequenceDriver;
use crate::engine::Engine;
use crate::error::Result;
use crate::evaluator::{ErrorAccumulator, PredictiveEvaluator};

/// Receives progress as the session runs. All methods default to no-ops.
pub trait ProgressObserver {
    /// `sequence` is zero-based; `of` is the number of sequences in the pass.
    fn sequence_trained(&mut self, _epoch: usize, _sequence: usize, _of: usize, _steps: usize) {}
    fn epoch_completed(&mut self, _epoch: usize, _of: usize) {}
    fn sequence_tested(&mut self, _sequence: usize, _of: usize, _acc: &ErrorAccumulator) {}
}

/// Observer that ignores everything.
pub struct Silent;

impl ProgressObserver for Silent {}

#[derive(Clone, Debug, PartialEq)]
pub struct EpochSummary {
    pub epoch: usize,
    pub sequences: usize,
    pub timesteps: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EvaluationReport {
    pub split: String,
    pub sequences: usize,
    pub accumulator: ErrorAccumulator,
}

impl EvaluationReport {
    pub fn error_percent(&self) -> Option<f64> {
        self.accumulator.error_percent()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionReport {
    pub train_split: String,
    pub epochs: Vec<EpochSummary>,
    pub evaluation: Option<EvaluationReport>,
}

/// Composes the driver and evaluator over a dataset according to a plan.
pub struct Session<'a> {
    config: &'a HarnessConfig,
    layout: Layout,
    plan: &'a SessionPlan,
}

impl<'a> Session<'a> {
    pub fn new(config: &'a HarnessConfig, layout: Layout, plan: &'a SessionPlan) -> Self {
        Self {
            config,
            layout,
            plan,
        }
    }

    /// Check every selected sequence encodes cleanly before the engine is
    /// touched.
    pub fn validate(&self, dataset: &Dataset) -> Result<()> {
        let train = dataset.select(&self.plan.train_split, self.plan.max_sequences)?;
        Dataset::validate(train, &self.plan.train_split, self.layout, self.config)?;
        if let Some(split) = &self.plan.eval_split {
            let eval = dataset.select(split, self.plan.max_sequences)?;
            Dataset::validate(eval, split, self.layout, self.config)?;
        }
        Ok(())
    }

    /// Validate, then train and evaluate.
    pub fn run<E: Engine + ?Sized>(
        &self,
        engine: &mut E,
        dataset: &Dataset,
        observer: &mut dyn ProgressObserver,
    ) -> Result<SessionReport> {
        self.validate(dataset)?;
        self.run_validated(engine, dataset, observer)
    }

    /// Train and evaluate a dataset already accepted by [`Session::validate`].
    /// Callers that validate early, before bootstrapping the engine, use this
    /// to skip encoding the selection a second time.
    pub fn run_validated<E: Engine + ?Sized>(
        &self,
        engine: &mut E,
        dataset: &Dataset,
        observer: &mut dyn ProgressObserver,
    ) -> Result<SessionReport> {
        let epochs = self.train(engine, dataset, observer)?;
        let evaluation = match &self.plan.eval_split {
            Some(split) => Some(self.evaluate(engine, dataset, split, observer)?),
            None => None,
        };

        Ok(SessionReport {
            train_split: self.plan.train_split.clone(),
            epochs,
            evaluation,
        })
    }

    /// Training epochs only.
    pub fn train<E: Engine + ?Sized>(
        &self,
        engine: &mut E,
        dataset: &Dataset,
        observer: &mut dyn ProgressObserver,
    ) -> Result<Vec<EpochSummary>> {
        let split = &self.plan.train_split;
        let sequences = dataset.select(split, self.plan.max_sequences)?;
        let mut driver = SequenceDriver::new(self.config, self.layout, split);
        let mut summaries = Vec::with_capacity(self.plan.epochs);

        for epoch in 0..self.plan.epochs {
            let mut timesteps = 0;
            for (i, seq) in sequences.iter().enumerate() {
                let steps = driver.train_sequence(engine, seq, i)?;
                timesteps += steps;
                observer.sequence_trained(epoch, i, sequences.len(), steps);
            }
            observer.epoch_completed(epoch, self.plan.epochs);
            summaries.push(EpochSummary {
                epoch,
                sequences: sequences.len(),
                timesteps,
            });
        }

        Ok(summaries)
    }

    /// One scoring pass over a prefix of `split`, with a fresh accumulator.
    pub fn evaluate<E: Engine + ?Sized>(
        &self,
        engine: &mut E,
        dataset: &Dataset,
        split: &str,
        observer: &mut dyn ProgressObserver,
    ) -> Result<EvaluationReport> {
        let sequences = dataset.select(split, self.plan.max_sequences)?;
        let mut evaluator = PredictiveEvaluator::new(self.config, self.layout, split);
        let mut acc = ErrorAccumulator::new();

        for (i, seq) in sequences.iter().enumerate() {
            evaluator.evaluate_sequence(engine, seq, i, &mut acc)?;
            observer.sequence_tested(i, sequences.len(), &acc);
        }

        Ok(EvaluationReport {
            split: split.to_string(),
            sequences: sequences.len(),
            accumulator: acc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarnessError;
    use crate::testing::{Call, PredictionRule, RecordingEngine};

    #[derive(Default)]
    struct Log(Vec<String>);

    impl ProgressObserver for Log {
        fn sequence_trained(&mut self, epoch: usize, sequence: usize, of: usize, _: usize) {
            self.0.push(format!("train e{epoch} s{sequence}/{of}"));
        }
        fn epoch_completed(&mut self, epoch: usize, of: usize) {
            self.0.push(format!("epoch {epoch}/{of}"));
        }
        fn sequence_tested(&mut self, sequence: usize, of: usize, _: &ErrorAccumulator) {
            self.0.push(format!("test s{sequence}/{of}"));
        }
    }

    fn dataset() -> Dataset {
        Dataset::from_json(
            r#"{
                "train": [[[0], [1]], [[2], [3], [0]], [[1]]],
                "test": [[[0, 1], [2, 3]]]
            }"#,
        )
        .unwrap()
    }

    fn plan(epochs: usize, max: Option<usize>, eval: Option<&str>) -> SessionPlan {
        SessionPlan {
            epochs,
            max_sequences: max,
            train_split: "train".to_string(),
            eval_split: eval.map(str::to_string),
        }
    }

    #[test]
    fn test_epochs_repeat_selected_prefix() {
        let cfg = HarnessConfig::new(4);
        let plan = plan(2, Some(2), None);
        let mut engine = RecordingEngine::new(4);
        let mut log = Log::default();

        let report = Session::new(&cfg, Layout::Notes, &plan)
            .run(&mut engine, &dataset(), &mut log)
            .unwrap();

        assert_eq!(
            log.0,
            vec![
                "train e0 s0/2",
                "train e0 s1/2",
                "epoch 0/2",
                "train e1 s0/2",
                "train e1 s1/2",
                "epoch 1/2",
            ]
        );
        assert_eq!(report.epochs.len(), 2);
        assert_eq!(report.epochs[0].timesteps, 5);
        assert!(report.evaluation.is_none());
        let clears = engine.protocol().iter().filter(|c| **c == Call::ClearMemory).count();
        assert_eq!(clears, 4);
    }

    #[test]
    fn test_held_out_evaluation() {
        let cfg = HarnessConfig::new(4);
        let plan = plan(1, None, Some("test"));
        let mut engine =
            RecordingEngine::new(4).with_rule(PredictionRule::Constant(vec![1.0, 1.0, 0.0, 0.0]));
        let mut log = Log::default();

        let report = Session::new(&cfg, Layout::Notes, &plan)
            .run(&mut engine, &dataset(), &mut log)
            .unwrap();

        let eval = report.evaluation.unwrap();
        assert_eq!(eval.split, "test");
        assert_eq!(eval.sequences, 1);
        assert_eq!(eval.accumulator.total, 4);
        assert_eq!(eval.accumulator.errors, 4);
        assert_eq!(eval.error_percent(), Some(100.0));
        assert_eq!(log.0.last().unwrap(), "test s0/1");
    }

    #[test]
    fn test_bad_eval_split_fails_before_training() {
        let cfg = HarnessConfig::new(4);
        let plan = plan(1, None, Some("valid"));
        let mut engine = RecordingEngine::new(4);
        let err = Session::new(&cfg, Layout::Notes, &plan)
            .run(&mut engine, &dataset(), &mut Silent)
            .unwrap_err();
        assert!(matches!(err, HarnessError::Dataset { .. }));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_integrity_error_fails_before_training() {
        let cfg = HarnessConfig::new(3);
        let plan = plan(1, None, None);
        let mut engine = RecordingEngine::new(3);
        let err = Session::new(&cfg, Layout::Notes, &plan)
            .run(&mut engine, &dataset(), &mut Silent)
            .unwrap_err();
        assert!(err.to_string().contains("sequence 1, timestep 1"), "{err}");
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_single_step_sequences_give_undefined_rate() {
        let ds = Dataset::from_json(r#"{"train": [[[0]], [[1]]]}"#).unwrap();
        let cfg = HarnessConfig::new(2);
        let plan = plan(1, None, Some("train"));
        let mut engine = RecordingEngine::new(2);
        let report = Session::new(&cfg, Layout::Notes, &plan)
            .run(&mut engine, &ds, &mut Silent)
            .unwrap();
        assert_eq!(report.evaluation.unwrap().error_percent(), None);
    }

    #[test]
    fn test_run_validated_matches_run() {
        let cfg = HarnessConfig::new(4);
        let plan = plan(2, None, Some("test"));
        let ds = dataset();
        let rule = PredictionRule::Constant(vec![1.0, 0.0, 0.0, 1.0]);

        let mut a = RecordingEngine::new(4).with_rule(rule.clone());
        let full = Session::new(&cfg, Layout::Notes, &plan)
            .run(&mut a, &ds, &mut Silent)
            .unwrap();

        let session = Session::new(&cfg, Layout::Notes, &plan);
        session.validate(&ds).unwrap();
        let mut b = RecordingEngine::new(4).with_rule(rule);
        let split = session.run_validated(&mut b, &ds, &mut Silent).unwrap();

        assert_eq!(full, split);
        assert_eq!(a.calls(), b.calls());
    }

    #[test]
    fn test_run_validated_skips_upfront_check() {
        let cfg = HarnessConfig::new(3);
        let plan = plan(1, None, None);
        let mut engine = RecordingEngine::new(3);
        let err = Session::new(&cfg, Layout::Notes, &plan)
            .run_validated(&mut engine, &dataset(), &mut Silent)
            .unwrap_err();
        // The driver still reports the fault with its location, but only
        // after the first sequence has already been trained.
        assert!(err.to_string().contains("sequence 1, timestep 1"), "{err}");
        assert!(engine.protocol().contains(&Call::ClearMemory));
    }
}
