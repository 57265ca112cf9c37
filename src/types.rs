use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct Candidate {
    pub item_id: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "movieId")]
    pub item_id: String,
    pub timestamp: usize,
    pub rating: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    #[serde(rename = "movieId")]
    pub item_id: String,
    pub title: String,
    pub genres: String,
}

/// 予測結果のレコード (userId, itemId, 予測スコア)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub user_id: String,
    pub item_id: String,
    pub predicted_rating: f32,
}

/// レーティングの値域 (MovieLensなら 0.5〜5.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingScale {
    pub min: f32,
    pub max: f32,
}

impl RatingScale {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f32) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

impl Default for RatingScale {
    fn default() -> Self {
        Self { min: 0.5, max: 5.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_contains() {
        let scale = RatingScale::default();
        assert!(scale.contains(0.5));
        assert!(scale.contains(5.0));
        assert!(!scale.contains(0.0));
        assert!(!scale.contains(5.5));
        assert!(!scale.contains(f32::NAN));
    }

    #[test]
    fn test_scale_clamp() {
        let scale = RatingScale::new(1.0, 5.0);
        assert_eq!(scale.clamp(7.3), 5.0);
        assert_eq!(scale.clamp(-2.0), 1.0);
        assert_eq!(scale.clamp(3.5), 3.5);
    }
}
