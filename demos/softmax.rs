//! Trains a linear softmax classifier on synthetic gaussian blobs.
//!
//! `RUST_LOG=info cargo run --example softmax [config.json]`, Ctrl-C stops after the current step.

use std::{env, fs};

use anyhow::Context;
use log::{info, warn};
use ndarray::{Array1, Array2, ArrayD, ArrayView1, ArrayViewD, Axis, Ix1, Ix2, IxDyn};
use rand::{Rng, SeedableRng, rngs::StdRng};
use solver::{Data, Dataset, Model, ParamStore, Solver, SolverConfig, SolverErr};

const FEATURES: usize = 8;
const CLASSES: usize = 4;

struct LinearSoftmax {
    params: ParamStore,
}

impl LinearSoftmax {
    fn new(rng: &mut StdRng) -> Self {
        let w = ArrayD::from_shape_fn(IxDyn(&[FEATURES, CLASSES]), |_| {
            rng.random_range(-1e-2..1e-2)
        });

        let mut params = ParamStore::new();
        params.insert("W".to_string(), w);
        params.insert("b".to_string(), ArrayD::zeros(IxDyn(&[CLASSES])));
        Self { params }
    }

    fn forward(&self, x: ArrayViewD<'_, f32>) -> solver::Result<(Array2<f32>, Array2<f32>)> {
        let x = x.into_dimensionality::<Ix2>().map_err(shape_err)?.to_owned();
        let w = self.params["W"].view().into_dimensionality::<Ix2>().map_err(shape_err)?;
        let b = self.params["b"].view().into_dimensionality::<Ix1>().map_err(shape_err)?;

        let scores = x.dot(&w) + &b;
        Ok((x, scores))
    }
}

impl Model for LinearSoftmax {
    fn params(&self) -> &ParamStore {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamStore {
        &mut self.params
    }

    fn scores(&self, x: ArrayViewD<'_, f32>) -> solver::Result<Array2<f32>> {
        self.forward(x).map(|(_, scores)| scores)
    }

    fn loss(
        &self,
        x: ArrayViewD<'_, f32>,
        y: ArrayView1<'_, usize>,
    ) -> solver::Result<(f32, ParamStore)> {
        let (x, scores) = self.forward(x)?;
        let n = x.nrows() as f32;

        let max = scores.fold_axis(Axis(1), f32::NEG_INFINITY, |m, v| m.max(*v));
        let mut probs = (&scores - &max.insert_axis(Axis(1))).mapv(f32::exp);
        let sums = probs.sum_axis(Axis(1)).insert_axis(Axis(1));
        probs /= &sums;

        let mut loss = 0.0;
        for (i, &label) in y.iter().enumerate() {
            loss -= probs[[i, label]].max(1e-12).ln();
            probs[[i, label]] -= 1.0;
        }
        probs /= n;

        let mut grads = ParamStore::new();
        grads.insert("W".to_string(), x.t().dot(&probs).into_dyn());
        grads.insert("b".to_string(), probs.sum_axis(Axis(0)).into_dyn());
        Ok((loss / n, grads))
    }
}

fn shape_err(e: ndarray::ShapeError) -> SolverErr {
    SolverErr::Model(e.to_string())
}

/// Samples `n` points around one random center per class.
fn blobs(n: usize, centers: &Array2<f32>, rng: &mut StdRng) -> solver::Result<Dataset> {
    let y: Array1<usize> = (0..n).map(|_| rng.random_range(0..CLASSES)).collect();
    let x = ArrayD::from_shape_fn(IxDyn(&[n, FEATURES]), |idx| {
        centers[[y[idx[0]], idx[1]]] + rng.random_range(-1.0..1.0)
    });

    Dataset::new(x, y)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => {
            let json = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            SolverConfig::from_json(&json)?
        }
        None => SolverConfig::default(),
    };

    let mut rng = StdRng::seed_from_u64(config.seed.unwrap_or(0));
    let centers = Array2::from_shape_fn((CLASSES, FEATURES), |_| rng.random_range(-3.0..3.0));
    let data = Data::new(blobs(5000, &centers, &mut rng)?, blobs(1000, &centers, &mut rng)?);
    let model = LinearSoftmax::new(&mut rng);

    let mut solver = Solver::new(model, data, config)?
        .with_lr_schedule(|epoch| if epoch % 3 == 0 { 0.5 } else { 1.0 });

    let stop = solver.stop_handle();
    ctrlc::set_handler(move || {
        warn!("interrupt received, stopping after the current step");
        stop.stop();
    })?;

    let report = solver.train()?;
    info!(
        "finished {} iterations at epoch {}, best val acc {:.3}",
        report.iterations, report.epoch, report.best_val_acc
    );

    Ok(())
}
