use crate::datasets::RatingDataset;
use crate::error::RecError;
use crate::mf_model::LatentFactorModel;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// SGD学習のハイパーパラメータ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f32,
    pub regularization: f32,
    /// 潜在因子の次元数 k
    pub factors: usize,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 20,
            learning_rate: 0.005,
            regularization: 0.02,
            factors: 32,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    fn validate(&self) -> Result<(), RecError> {
        if self.epochs == 0 {
            return Err(RecError::Validation("epochs must be positive".to_string()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(RecError::Validation(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.regularization >= 0.0 && self.regularization.is_finite()) {
            return Err(RecError::Validation(format!(
                "regularization must be non-negative, got {}",
                self.regularization
            )));
        }
        if self.factors == 0 {
            return Err(RecError::Validation("factors must be positive".to_string()));
        }
        Ok(())
    }
}

/// Fits a biased matrix-factorization model with plain per-record SGD.
///
/// One epoch is one pass over the training interactions in an order drawn
/// from the seeded rng, so the whole run is reproducible bit for bit.
/// Factor updates are simultaneous: the updates of `P[u]` and `Q[i]` both
/// read the row values as they were before this record touched them. This
/// convention is used everywhere in the crate.
///
/// The per-epoch training RMSE is logged but never acted on (fixed epoch
/// budget, no early stopping). A non-finite RMSE aborts the fit with
/// `RecError::Divergence` so a too-hot learning rate surfaces as an error
/// instead of as NaN predictions.
pub fn fit(train: &RatingDataset, config: &TrainingConfig) -> Result<LatentFactorModel, RecError> {
    config.validate()?;
    if train.is_empty() {
        return Err(RecError::Validation(
            "cannot fit on an empty training set".to_string(),
        ));
    }

    let n_users = train.n_users();
    let n_items = train.n_items();
    let k = config.factors;
    let lr = config.learning_rate;
    let reg = config.regularization;

    let mut rng = StdRng::seed_from_u64(config.seed);

    // バイアスは0、因子は小さな一様乱数で初期化する
    let mut mu = 0.0f32;
    let mut user_biases = Array1::<f32>::zeros(n_users);
    let mut item_biases = Array1::<f32>::zeros(n_items);
    let mut user_factors = Array2::<f32>::zeros((n_users, k));
    let mut item_factors = Array2::<f32>::zeros((n_items, k));
    for u in 0..n_users {
        for f in 0..k {
            user_factors[[u, f]] = rng.random_range(-0.1..0.1);
        }
    }
    for i in 0..n_items {
        for f in 0..k {
            item_factors[[i, f]] = rng.random_range(-0.1..0.1);
        }
    }

    // 学習前に一度だけ密なインデックスへ変換しておく
    let records: Vec<(usize, usize, f32)> = train
        .ratings()
        .iter()
        .map(|r| {
            let u = train
                .user_index(&r.user_id)
                .expect("train dataset indexes its own users");
            let i = train
                .item_index(&r.item_id)
                .expect("train dataset indexes its own items");
            (u, i, r.rating)
        })
        .collect();

    let mut order: Vec<usize> = (0..records.len()).collect();

    for epoch in 1..=config.epochs {
        order.shuffle(&mut rng);

        let mut sse = 0.0f64;
        for &idx in &order {
            let (u, i, r) = records[idx];

            let mut dot = 0.0f32;
            for f in 0..k {
                dot += user_factors[[u, f]] * item_factors[[i, f]];
            }
            let pred = mu + user_biases[u] + item_biases[i] + dot;
            let err = r - pred;
            sse += (err as f64) * (err as f64);

            mu += lr * err;
            user_biases[u] += lr * (err - reg * user_biases[u]);
            item_biases[i] += lr * (err - reg * item_biases[i]);
            for f in 0..k {
                let puf = user_factors[[u, f]];
                let qif = item_factors[[i, f]];
                user_factors[[u, f]] = puf + lr * (err * qif - reg * puf);
                item_factors[[i, f]] = qif + lr * (err * puf - reg * qif);
            }
        }

        let rmse = (sse / records.len() as f64).sqrt() as f32;
        if !rmse.is_finite() || !mu.is_finite() {
            return Err(RecError::Divergence { epoch, rmse });
        }
        tracing::info!(epoch, rmse, "training epoch finished");
    }

    Ok(LatentFactorModel {
        mu,
        user_biases,
        item_biases,
        user_factors,
        item_factors,
        user_encoder: train.user_encoder().clone(),
        item_encoder: train.item_encoder().clone(),
        scale: train.scale(),
        config: config.clone(),
    })
}
