#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{Array1, Array2, ArrayD, ArrayView1, ArrayViewD, Axis, Ix1, Ix2, IxDyn};
use rand::{Rng, SeedableRng, rngs::StdRng};
use solver::{Data, Dataset, Model, ParamStore, Result, SolverConfig, SolverErr};

/// A linear softmax classifier over `(n, features)` inputs.
pub struct Softmax {
    params: ParamStore,
}

impl Softmax {
    pub fn new(features: usize, classes: usize) -> Self {
        let mut params = ParamStore::new();
        params.insert("W".to_string(), ArrayD::zeros(IxDyn(&[features, classes])));
        params.insert("b".to_string(), ArrayD::zeros(IxDyn(&[classes])));
        Self { params }
    }

    fn forward(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        let w = self.params["W"].view().into_dimensionality::<Ix2>().map_err(model_err)?;
        let b = self.params["b"].view().into_dimensionality::<Ix1>().map_err(model_err)?;
        Ok(x.dot(&w) + &b)
    }
}

impl Model for Softmax {
    fn params(&self) -> &ParamStore {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamStore {
        &mut self.params
    }

    fn scores(&self, x: ArrayViewD<'_, f32>) -> Result<Array2<f32>> {
        let x = x.into_dimensionality::<Ix2>().map_err(model_err)?.to_owned();
        self.forward(&x)
    }

    fn loss(&self, x: ArrayViewD<'_, f32>, y: ArrayView1<'_, usize>) -> Result<(f32, ParamStore)> {
        let x = x.into_dimensionality::<Ix2>().map_err(model_err)?.to_owned();
        let n = x.nrows() as f32;

        let scores = self.forward(&x)?;
        let mut probs = scores.clone();
        for mut row in probs.rows_mut() {
            let max = row.fold(f32::NEG_INFINITY, |m, v| m.max(*v));
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row /= sum;
        }

        let mut loss = 0.0;
        let mut dscores = probs;
        for (i, &label) in y.iter().enumerate() {
            loss -= dscores[[i, label]].max(1e-12).ln();
            dscores[[i, label]] -= 1.0;
        }
        dscores /= n;

        let mut grads = ParamStore::new();
        grads.insert("W".to_string(), x.t().dot(&dscores).into_dyn());
        grads.insert("b".to_string(), dscores.sum_axis(Axis(0)).into_dyn());
        Ok((loss / n, grads))
    }
}

/// A model whose loss and gradients only depend on its parameters, never on the batch.
///
/// Every value it produces is a dyadic rational, so averaging over shards is exact.
pub struct DataBlind {
    params: ParamStore,
    pub loss_calls: AtomicUsize,
}

impl DataBlind {
    pub fn new() -> Self {
        let mut params = ParamStore::new();
        params.insert("W".to_string(), ArrayD::ones(IxDyn(&[2, 2])));
        Self {
            params,
            loss_calls: AtomicUsize::new(0),
        }
    }
}

impl Model for DataBlind {
    fn params(&self) -> &ParamStore {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamStore {
        &mut self.params
    }

    fn scores(&self, x: ArrayViewD<'_, f32>) -> Result<Array2<f32>> {
        Ok(Array2::zeros((x.len_of(Axis(0)), 2)))
    }

    fn loss(&self, _: ArrayViewD<'_, f32>, _: ArrayView1<'_, usize>) -> Result<(f32, ParamStore)> {
        self.loss_calls.fetch_add(1, Ordering::Relaxed);

        let mut grads = ParamStore::new();
        grads.insert("W".to_string(), ArrayD::from_elem(IxDyn(&[2, 2]), 0.5));
        Ok((self.params["W"].sum(), grads))
    }
}

/// A model that fails every loss computation.
pub struct Broken {
    params: ParamStore,
}

impl Broken {
    pub fn new() -> Self {
        let mut params = ParamStore::new();
        params.insert("W".to_string(), ArrayD::zeros(IxDyn(&[1])));
        Self { params }
    }
}

impl Model for Broken {
    fn params(&self) -> &ParamStore {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamStore {
        &mut self.params
    }

    fn scores(&self, x: ArrayViewD<'_, f32>) -> Result<Array2<f32>> {
        Ok(Array2::zeros((x.len_of(Axis(0)), 2)))
    }

    fn loss(&self, _: ArrayViewD<'_, f32>, _: ArrayView1<'_, usize>) -> Result<(f32, ParamStore)> {
        Err(SolverErr::Model("diverged".into()))
    }
}

fn model_err(e: ndarray::ShapeError) -> SolverErr {
    SolverErr::Model(e.to_string())
}

/// Two gaussian blobs, one per class, centered at `-2` and `+2` on every feature.
pub fn blobs(n: usize, features: usize, rng: &mut StdRng) -> Dataset {
    let y = Array1::from_iter((0..n).map(|i| i % 2));
    let x = ArrayD::from_shape_fn(IxDyn(&[n, features]), |idx| {
        let center = if y[idx[0]] == 1 { 2.0 } else { -2.0 };
        center + rng.random_range(-1.0..1.0)
    });

    Dataset::new(x, y).unwrap()
}

pub fn blob_data(train: usize, val: usize, seed: u64) -> Data {
    let mut rng = StdRng::seed_from_u64(seed);
    Data::new(blobs(train, 3, &mut rng), blobs(val, 3, &mut rng))
}

/// A quiet, seeded configuration.
pub fn config(batch_size: usize, num_epochs: usize) -> SolverConfig {
    let mut config = SolverConfig::default();
    config.batch_size = batch_size.try_into().unwrap();
    config.num_epochs = num_epochs;
    config.verbose = false;
    config.seed = Some(1234);
    config
}
