use crate::datasets::IdEncoder;
use crate::error::RecError;
use crate::trainer::TrainingConfig;
use crate::types::{Prediction, RatingScale};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// バイアス項つきの行列分解モデル
///
/// r̂(u, i) = μ + b_u + b_i + P[u]・Q[i]
///
/// 学習が終わったら読み取り専用。Arcで包んで並行に predict してよい。
#[derive(Debug, Serialize, Deserialize)]
pub struct LatentFactorModel {
    pub(crate) mu: f32,
    pub(crate) user_biases: Array1<f32>,
    pub(crate) item_biases: Array1<f32>,
    pub(crate) user_factors: Array2<f32>,
    pub(crate) item_factors: Array2<f32>,
    pub(crate) user_encoder: IdEncoder,
    pub(crate) item_encoder: IdEncoder,
    pub(crate) scale: RatingScale,
    pub(crate) config: TrainingConfig,
}

impl LatentFactorModel {
    /// Prediction over dense indices. `None` means the entity was not seen
    /// during training: its bias is treated as 0 and its factor vector as
    /// the zero vector, so the prediction degrades to the remaining terms
    /// (both unknown => just μ). Always clamped onto the rating scale.
    pub fn predict_indexed(&self, user: Option<usize>, item: Option<usize>) -> f32 {
        let mut pred = self.mu;
        if let Some(u) = user {
            pred += self.user_biases[u];
        }
        if let Some(i) = item {
            pred += self.item_biases[i];
        }
        if let (Some(u), Some(i)) = (user, item) {
            pred += self.user_factors.row(u).dot(&self.item_factors.row(i));
        }
        self.scale.clamp(pred)
    }

    pub fn predict(&self, user_id: &str, item_id: &str) -> f32 {
        self.predict_indexed(
            self.user_encoder.encode(user_id),
            self.item_encoder.encode(item_id),
        )
    }

    pub fn predict_record(&self, user_id: &str, item_id: &str) -> Prediction {
        Prediction {
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            predicted_rating: self.predict(user_id, item_id),
        }
    }

    pub fn user_encoder(&self) -> &IdEncoder {
        &self.user_encoder
    }

    pub fn item_encoder(&self) -> &IdEncoder {
        &self.item_encoder
    }

    pub fn scale(&self) -> RatingScale {
        self.scale
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// パラメータ一式 (μ, バイアス, 因子, エンコーダ, 設定) を1つのJSONとして保存する
    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json_string = serde_json::to_string(self)?;
        std::fs::write(PathBuf::from(path), json_string)?;
        Ok(())
    }

    /// Loads what `save` wrote. The document is one unit: a file whose
    /// pieces disagree with each other is rejected instead of half-loaded.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let json_string = std::fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(json_string.as_str())?;
        model.check_dimensions()?;
        Ok(model)
    }

    fn check_dimensions(&self) -> Result<(), RecError> {
        let n_users = self.user_encoder.len();
        let n_items = self.item_encoder.len();
        let k = self.config.factors;

        let ok = self.user_biases.len() == n_users
            && self.item_biases.len() == n_items
            && self.user_factors.dim() == (n_users, k)
            && self.item_factors.dim() == (n_items, k);

        if ok {
            Ok(())
        } else {
            Err(RecError::Validation(format!(
                "model dimensions are inconsistent: {} users, {} items, k = {}, \
                 P is {:?}, Q is {:?}",
                n_users,
                n_items,
                k,
                self.user_factors.dim(),
                self.item_factors.dim()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// 2ユーザー x 2アイテムの手組みモデル
    fn tiny_model() -> LatentFactorModel {
        let users = vec!["u1".to_string(), "u2".to_string()];
        let items = vec!["m1".to_string(), "m2".to_string()];
        LatentFactorModel {
            mu: 3.0,
            user_biases: array![0.5, -0.5],
            item_biases: array![1.0, -0.25],
            user_factors: array![[0.2, 0.0], [0.0, 0.1]],
            item_factors: array![[0.5, 0.0], [0.0, -0.5]],
            user_encoder: IdEncoder::new(users.iter()),
            item_encoder: IdEncoder::new(items.iter()),
            scale: RatingScale::default(),
            config: TrainingConfig {
                factors: 2,
                ..TrainingConfig::default()
            },
        }
    }

    #[test]
    fn test_predict_known_pair() {
        let model = tiny_model();
        // 3.0 + 0.5 + 1.0 + (0.2 * 0.5) = 4.6
        let pred = model.predict("u1", "m1");
        assert!((pred - 4.6).abs() < 1e-6);
    }

    #[test]
    fn test_fallback_unknown_user() {
        let model = tiny_model();
        // μ + b_i のみ: 3.0 + 1.0 = 4.0
        let pred = model.predict("stranger", "m1");
        assert!((pred - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_fallback_unknown_item() {
        let model = tiny_model();
        // μ + b_u のみ: 3.0 + (-0.5) = 2.5
        let pred = model.predict("u2", "unreleased");
        assert!((pred - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_fallback_both_unknown() {
        let model = tiny_model();
        let pred = model.predict("stranger", "unreleased");
        assert!((pred - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_prediction_is_clamped() {
        let mut model = tiny_model();
        model.user_biases[0] = 100.0;
        model.item_biases[1] = -100.0;

        let scale = model.scale();
        assert_eq!(model.predict("u1", "m1"), scale.max);
        assert_eq!(model.predict("u2", "m2"), scale.min);
    }

    #[test]
    fn test_save_load_round_trip() {
        let model = tiny_model();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let path = path.to_str().unwrap();

        model.save(path).unwrap();
        let restored = LatentFactorModel::load(path).unwrap();

        for user in ["u1", "u2", "stranger"] {
            for item in ["m1", "m2", "unreleased"] {
                assert_eq!(model.predict(user, item), restored.predict(user, item));
            }
        }
    }

    #[test]
    fn test_load_rejects_inconsistent_dimensions() {
        let mut model = tiny_model();
        // バイアスの本数がユーザー数と合わない状態を作る
        model.user_biases = array![0.5, -0.5, 0.0];

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        let path = path.to_str().unwrap();
        model.save(path).unwrap();

        assert!(LatentFactorModel::load(path).is_err());
    }
}
