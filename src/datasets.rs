use crate::error::RecError;
use crate::types::{Interaction, Movie, RatingScale};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdEncoder {
    map: HashMap<String, usize>,
    reverse_map: HashMap<usize, String>,
}

impl IdEncoder {
    /// 文字列のリスト(イテレータ)を受け取ってマッピングを作る
    pub fn new<'a>(ids: impl Iterator<Item = &'a String>) -> Self {
        let mut map = HashMap::new();
        let mut reverse_map = HashMap::new();
        let mut count = 0;
        for id in ids {
            if !map.contains_key(id) {
                map.insert(id.clone(), count);
                reverse_map.insert(count, id.clone());
                count += 1;
            }
        }
        Self { map, reverse_map }
    }

    pub fn encode(&self, id: &str) -> Option<usize> {
        self.map.get(id).copied()
    }

    pub fn decode(&self, idx: usize) -> Option<&str> {
        self.reverse_map.get(&idx).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// 検証済みの (user, item, rating) の集合と、学習用の密なインデックス
#[derive(Debug, Clone)]
pub struct RatingDataset {
    ratings: Vec<Interaction>,
    user_encoder: IdEncoder,
    item_encoder: IdEncoder,
    scale: RatingScale,
}

impl RatingDataset {
    /// Validates every interaction against `scale` and builds the dense
    /// user/item index from the rows it was given (and nothing else).
    pub fn load(ratings: Vec<Interaction>, scale: RatingScale) -> Result<Self, RecError> {
        for r in &ratings {
            if r.user_id.is_empty() || r.item_id.is_empty() {
                return Err(RecError::Validation(
                    "interaction with empty userId or movieId".to_string(),
                ));
            }
            if !scale.contains(r.rating) {
                return Err(RecError::Validation(format!(
                    "rating {} for (user {}, item {}) is outside [{}, {}]",
                    r.rating, r.user_id, r.item_id, scale.min, scale.max
                )));
            }
        }

        let user_encoder = IdEncoder::new(ratings.iter().map(|x| &x.user_id));
        let item_encoder = IdEncoder::new(ratings.iter().map(|x| &x.item_id));

        Ok(Self {
            ratings,
            user_encoder,
            item_encoder,
            scale,
        })
    }

    /// Seeded shuffle then cut. The two partitions are disjoint; nothing
    /// guarantees that every user/item shows up on both sides, so test-only
    /// ids stay unknown to a model fitted on the train side.
    pub fn split(&self, test_fraction: f32, seed: u64) -> Result<(Self, Self), RecError> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(RecError::Validation(format!(
                "test_fraction must be in (0, 1), got {test_fraction}"
            )));
        }

        let mut shuffled = self.ratings.clone();
        let mut rng = StdRng::seed_from_u64(seed);
        shuffled.shuffle(&mut rng);

        let test_len = ((shuffled.len() as f32) * test_fraction).round() as usize;
        let split_index = shuffled.len() - test_len;
        let test = shuffled.split_off(split_index);

        // それぞれの側で自分の行だけからエンコーダを作り直す
        Ok((Self::load(shuffled, self.scale)?, Self::load(test, self.scale)?))
    }

    pub fn ratings(&self) -> &[Interaction] {
        &self.ratings
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    pub fn n_users(&self) -> usize {
        self.user_encoder.len()
    }

    pub fn n_items(&self) -> usize {
        self.item_encoder.len()
    }

    pub fn user_index(&self, user_id: &str) -> Option<usize> {
        self.user_encoder.encode(user_id)
    }

    pub fn item_index(&self, item_id: &str) -> Option<usize> {
        self.item_encoder.encode(item_id)
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
}

pub fn read_interactions(path: &str) -> anyhow::Result<Vec<Interaction>> {
    let mut reader = csv::Reader::from_path(PathBuf::from(path))?;
    let mut interactions = Vec::new();
    for row in reader.deserialize() {
        interactions.push(row?);
    }
    Ok(interactions)
}

pub fn read_movies(path: &str) -> anyhow::Result<Vec<Movie>> {
    let mut reader = csv::Reader::from_path(PathBuf::from(path))?;
    let mut movies = Vec::new();
    for row in reader.deserialize() {
        movies.push(row?);
    }
    Ok(movies)
}
