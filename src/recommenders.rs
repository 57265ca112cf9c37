use crate::error::RecError;
use crate::mf_model::LatentFactorModel;
use crate::types::{Candidate, Interaction};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub trait Recommender {
    fn recommend(&self, user_id: &str) -> Result<Vec<Candidate>, RecError>;
}

/// 視聴回数ベースの「とりあえず人気順」レコメンダー
pub struct MostPopularRecommender {
    pub interactions: Vec<Interaction>,
}

impl Recommender for MostPopularRecommender {
    fn recommend(&self, _user_id: &str) -> Result<Vec<Candidate>, RecError> {
        let mut counter: HashMap<String, usize> = HashMap::new();
        for interaction in &self.interactions {
            *counter.entry(interaction.item_id.clone()).or_insert(0) += 1;
        }

        let mut results = Vec::new();
        for (key, value) in counter.iter() {
            results.push(Candidate {
                item_id: key.clone(),
                score: *value as f32,
            })
        }
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(results)
    }
}

/// 学習済みモデルで全アイテムをスコアリングし、未視聴のものを上位から返す
pub struct LatentFactorRecommender {
    model: Arc<LatentFactorModel>,
    seen: HashMap<String, HashSet<String>>,
    top_n: usize,
}

impl LatentFactorRecommender {
    pub fn new(
        model: Arc<LatentFactorModel>,
        interactions: &[Interaction],
        top_n: usize,
    ) -> Self {
        let mut seen: HashMap<String, HashSet<String>> = HashMap::new();
        for interaction in interactions {
            seen.entry(interaction.user_id.clone())
                .or_default()
                .insert(interaction.item_id.clone());
        }
        Self { model, seen, top_n }
    }

    fn already_rated(&self, user_id: &str, item_id: &str) -> bool {
        self.seen
            .get(user_id)
            .map(|items| items.contains(item_id))
            .unwrap_or(false)
    }
}

impl Recommender for LatentFactorRecommender {
    fn recommend(&self, user_id: &str) -> Result<Vec<Candidate>, RecError> {
        let encoder = self.model.item_encoder();
        let mut results = Vec::new();
        for idx in 0..encoder.len() {
            let item_id = encoder
                .decode(idx)
                .expect("encoder indices are dense");
            if self.already_rated(user_id, item_id) {
                continue;
            }
            results.push(Candidate {
                item_id: item_id.to_string(),
                score: self.model.predict(user_id, item_id),
            });
        }
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(self.top_n);
        Ok(results)
    }
}

/// 人気スコアと個人化スコアの平均をとるハイブリッド
///
/// 元の系は 0〜5 の人気スコアと 0.5〜5 の予測値をそのまま平均していたが、
/// スケールが揃っていないので、ここでは視聴回数をレーティングの値域に
/// 写像してから混ぜる。
pub struct HybridRecommender {
    model: Arc<LatentFactorModel>,
    popularity: HashMap<String, usize>,
    max_count: usize,
    seen: HashMap<String, HashSet<String>>,
    top_n: usize,
}

impl HybridRecommender {
    pub fn new(
        model: Arc<LatentFactorModel>,
        interactions: &[Interaction],
        top_n: usize,
    ) -> Self {
        let mut popularity: HashMap<String, usize> = HashMap::new();
        let mut seen: HashMap<String, HashSet<String>> = HashMap::new();
        for interaction in interactions {
            *popularity.entry(interaction.item_id.clone()).or_insert(0) += 1;
            seen.entry(interaction.user_id.clone())
                .or_default()
                .insert(interaction.item_id.clone());
        }
        let max_count = popularity.values().copied().max().unwrap_or(1);
        Self {
            model,
            popularity,
            max_count,
            seen,
            top_n,
        }
    }

    fn popularity_score(&self, item_id: &str) -> f32 {
        let count = self.popularity.get(item_id).copied().unwrap_or(0);
        let scale = self.model.scale();
        scale.min + (count as f32 / self.max_count as f32) * (scale.max - scale.min)
    }
}

impl Recommender for HybridRecommender {
    fn recommend(&self, user_id: &str) -> Result<Vec<Candidate>, RecError> {
        let encoder = self.model.item_encoder();
        let mut results = Vec::new();
        for idx in 0..encoder.len() {
            let item_id = encoder
                .decode(idx)
                .expect("encoder indices are dense");
            let seen = self
                .seen
                .get(user_id)
                .map(|items| items.contains(item_id))
                .unwrap_or(false);
            if seen {
                continue;
            }
            let personalized = self.model.predict(user_id, item_id);
            let score = 0.5 * (personalized + self.popularity_score(item_id));
            results.push(Candidate {
                item_id: item_id.to_string(),
                score,
            });
        }
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(self.top_n);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::IdEncoder;
    use crate::trainer::TrainingConfig;
    use crate::types::RatingScale;
    use ndarray::{array, Array1, Array2};

    fn interaction(user: &str, item: &str, rating: f32) -> Interaction {
        Interaction {
            user_id: user.to_string(),
            item_id: item.to_string(),
            timestamp: 0,
            rating,
        }
    }

    /// u1が知っているアイテムは m1 > m2 > m3 の順で好き、という固定モデル
    fn ranking_model() -> Arc<LatentFactorModel> {
        let users = vec!["u1".to_string()];
        let items = vec!["m1".to_string(), "m2".to_string(), "m3".to_string()];
        Arc::new(LatentFactorModel {
            mu: 3.0,
            user_biases: array![0.0],
            item_biases: array![1.5, 0.5, -0.5],
            user_factors: Array2::zeros((1, 2)),
            item_factors: Array2::zeros((3, 2)),
            user_encoder: IdEncoder::new(users.iter()),
            item_encoder: IdEncoder::new(items.iter()),
            scale: RatingScale::default(),
            config: TrainingConfig {
                factors: 2,
                ..TrainingConfig::default()
            },
        })
    }

    #[test]
    fn test_ranking_recommender() {
        let recommender = MostPopularRecommender {
            interactions: vec![
                interaction("1", "1", 1.0),
                interaction("1", "1", 1.0),
                interaction("1", "2", 1.0),
            ],
        };
        let actual = recommender.recommend("1").unwrap();
        let actual: Vec<String> = actual.iter().map(|x| x.item_id.clone()).collect();
        let expected = vec!["1".to_string(), "2".to_string()];

        assert_eq!(actual, expected);
    }

    #[test]
    fn test_latent_recommender_sorts_by_prediction() {
        let recommender = LatentFactorRecommender::new(ranking_model(), &[], 10);
        let actual = recommender.recommend("u1").unwrap();
        let ids: Vec<&str> = actual.iter().map(|c| c.item_id.as_str()).collect();

        assert_eq!(ids, vec!["m1", "m2", "m3"]);
        assert!(actual[0].score >= actual[1].score);
    }

    #[test]
    fn test_latent_recommender_skips_rated_items() {
        let history = vec![interaction("u1", "m1", 5.0)];
        let recommender = LatentFactorRecommender::new(ranking_model(), &history, 10);
        let actual = recommender.recommend("u1").unwrap();
        let ids: Vec<&str> = actual.iter().map(|c| c.item_id.as_str()).collect();

        assert_eq!(ids, vec!["m2", "m3"]);
    }

    #[test]
    fn test_latent_recommender_truncates_to_top_n() {
        let recommender = LatentFactorRecommender::new(ranking_model(), &[], 2);
        let actual = recommender.recommend("u1").unwrap();
        assert_eq!(actual.len(), 2);
        assert_eq!(actual[0].item_id, "m1");
    }

    #[test]
    fn test_catalog_sized_hybrid_ranks_every_unseen_item() {
        // サーバーはカタログ全体をプールにして limit で切り詰めるので、
        // デフォルトの10件を超える limit にも応えられる
        let items: Vec<String> = (0..15).map(|i| format!("m{i}")).collect();
        let users = vec!["u1".to_string()];
        let model = Arc::new(LatentFactorModel {
            mu: 3.0,
            user_biases: Array1::zeros(1),
            item_biases: Array1::from_vec((0..15).map(|i| 0.01 * i as f32).collect()),
            user_factors: Array2::zeros((1, 2)),
            item_factors: Array2::zeros((15, 2)),
            user_encoder: IdEncoder::new(users.iter()),
            item_encoder: IdEncoder::new(items.iter()),
            scale: RatingScale::default(),
            config: TrainingConfig {
                factors: 2,
                ..TrainingConfig::default()
            },
        });

        let pool = model.item_encoder().len();
        let recommender = HybridRecommender::new(model, &[], pool);
        let actual = recommender.recommend("u1").unwrap();

        assert_eq!(actual.len(), 15);
        assert_eq!(actual.iter().take(12).count(), 12);
        for pair in actual.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_hybrid_popularity_breaks_ties() {
        // モデル上は m2 と m3 のバイアスを揃えておき、人気度で差をつける
        let model = LatentFactorModel {
            mu: 3.0,
            user_biases: array![0.0],
            item_biases: array![0.0, 0.5, 0.5],
            user_factors: Array2::zeros((1, 2)),
            item_factors: Array2::zeros((3, 2)),
            user_encoder: IdEncoder::new(
                vec!["u1".to_string()].iter(),
            ),
            item_encoder: IdEncoder::new(
                vec!["m1".to_string(), "m2".to_string(), "m3".to_string()].iter(),
            ),
            scale: RatingScale::default(),
            config: TrainingConfig {
                factors: 2,
                ..TrainingConfig::default()
            },
        };

        let history = vec![
            interaction("u2", "m3", 4.0),
            interaction("u2", "m3", 4.0),
            interaction("u2", "m2", 4.0),
        ];
        let recommender = HybridRecommender::new(Arc::new(model), &history, 10);
        let actual = recommender.recommend("u1").unwrap();

        // 個人化スコアが同点なら、よく見られている m3 が上に来る
        assert_eq!(actual[0].item_id, "m3");
        assert_eq!(actual[1].item_id, "m2");
    }
}
