use crate::content::GenreSimilarity;
use crate::datasets::{read_interactions, read_movies};
use crate::mf_model::LatentFactorModel;
use crate::recommenders::{HybridRecommender, Recommender};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub struct AppState {
    pub model: Arc<LatentFactorModel>,
    pub hybrid: HybridRecommender,
    pub similarity: GenreSimilarity,
    pub id2title: HashMap<String, String>,
}

impl AppState {
    pub fn load(
        model_path: &str,
        ratings_path: &str,
        movies_path: &str,
    ) -> anyhow::Result<AppState> {
        let model = Arc::new(LatentFactorModel::load(model_path)?);
        let interactions = read_interactions(ratings_path)?;
        let movies = read_movies(movies_path)?;

        let id2title: HashMap<String, String> = movies
            .iter()
            .map(|m| (m.item_id.clone(), m.title.clone()))
            .collect();

        // 候補プールはカタログ全体。件数の切り詰めはハンドラの limit だけで行う
        let pool = model.item_encoder().len();

        Ok(AppState {
            hybrid: HybridRecommender::new(model.clone(), &interactions, pool),
            similarity: GenreSimilarity::build(&movies),
            model,
            id2title,
        })
    }

    fn title_of(&self, item_id: &str) -> String {
        self.id2title
            .get(item_id)
            .cloned()
            .unwrap_or_else(|| item_id.to_string())
    }
}

fn default_limit() -> usize {
    10
}

#[derive(Deserialize)]
pub struct RecommendQuery {
    pub user_id: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Deserialize)]
pub struct PredictQuery {
    pub user_id: String,
    pub item_id: String,
}

#[derive(Deserialize)]
pub struct SimilarQuery {
    pub item_id: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Serialize)]
pub struct RecommendationResult {
    pub score: f32,
    pub title: String,
    pub item_id: String,
}

#[derive(Error, Debug)]
pub enum AppError {
    // 1. 特定したいエラー: 学習データに存在しないユーザー
    #[error("User not found: {0}")]
    UserNotFound(String),

    // 2. その他の予期せぬエラー: Anyhowにラップして任せる
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::UserNotFound(user_id) => {
                (StatusCode::NOT_FOUND, format!("User {} not found", user_id))
            }
            AppError::Unexpected(err) => {
                tracing::error!("Internal Server Error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };
        (status, message).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/predict", get(predict))
        .route("/recommend", get(recommend))
        .route("/similar", get(similar))
        .with_state(state)
}

/// 未知のユーザー/アイテムでもフォールバック予測を返す (コールドスタートはエラーではない)
async fn predict(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PredictQuery>,
) -> Json<crate::types::Prediction> {
    Json(state.model.predict_record(&query.user_id, &query.item_id))
}

async fn recommend(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecommendQuery>,
) -> Result<Json<Vec<RecommendationResult>>, AppError> {
    if state.model.user_encoder().encode(&query.user_id).is_none() {
        return Err(AppError::UserNotFound(query.user_id));
    }

    let candidates = state
        .hybrid
        .recommend(&query.user_id)
        .map_err(anyhow::Error::from)?;

    let results = candidates
        .into_iter()
        .take(query.limit)
        .map(|c| RecommendationResult {
            score: c.score,
            title: state.title_of(&c.item_id),
            item_id: c.item_id,
        })
        .collect();
    Ok(Json(results))
}

async fn similar(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SimilarQuery>,
) -> Json<Vec<RecommendationResult>> {
    let results = state
        .similarity
        .similar(&query.item_id, query.limit)
        .into_iter()
        .map(|c| RecommendationResult {
            score: c.score,
            title: state.title_of(&c.item_id),
            item_id: c.item_id,
        })
        .collect();
    Json(results)
}
