use crate::datasets::RatingDataset;
use crate::error::RecError;
use crate::mf_model::LatentFactorModel;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RegressionReport {
    pub rmse: f32,
    pub mae: f32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ClassificationReport {
    pub accuracy: f32,
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
}

/// RMSE / MAE over a held-out set. Test rows whose user or item the model
/// never saw are scored through the model's fallback, not skipped.
pub fn regression_metrics(
    model: &LatentFactorModel,
    test: &RatingDataset,
) -> Result<RegressionReport, RecError> {
    if test.is_empty() {
        return Err(RecError::UndefinedMetric(
            "regression metrics over an empty test set".to_string(),
        ));
    }

    let mut sse = 0.0f64;
    let mut sae = 0.0f64;
    for r in test.ratings() {
        let err = (r.rating - model.predict(&r.user_id, &r.item_id)) as f64;
        sse += err * err;
        sae += err.abs();
    }

    let n = test.len() as f64;
    Ok(RegressionReport {
        rmse: (sse / n).sqrt() as f32,
        mae: (sae / n) as f32,
    })
}

/// Binarizes actual and predicted ratings at `threshold` (>= means "liked")
/// and derives the usual confusion-matrix metrics.
///
/// Convention for degenerate denominators: precision with no predicted
/// positives, recall with no actual positives, and f1 with both at zero all
/// report 0.0. Only an empty test set is an error.
pub fn classification_metrics(
    model: &LatentFactorModel,
    test: &RatingDataset,
    threshold: f32,
) -> Result<ClassificationReport, RecError> {
    if test.is_empty() {
        return Err(RecError::UndefinedMetric(
            "classification metrics over an empty test set".to_string(),
        ));
    }

    let mut tp = 0usize;
    let mut tn = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for r in test.ratings() {
        let actual = r.rating >= threshold;
        let predicted = model.predict(&r.user_id, &r.item_id) >= threshold;
        match (actual, predicted) {
            (true, true) => tp += 1,
            (false, false) => tn += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
        }
    }

    let total = (tp + tn + fp + fn_) as f32;
    let accuracy = (tp + tn) as f32 / total;
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    Ok(ClassificationReport {
        accuracy,
        precision,
        recall,
        f1,
    })
}

fn ratio(numerator: usize, denominator: usize) -> f32 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f32 / denominator as f32
    }
}
