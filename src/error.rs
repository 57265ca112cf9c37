use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecError {
    // 入力データ自体がおかしい場合 (範囲外のレーティング、空ID など)
    #[error("invalid input: {0}")]
    Validation(String),

    // 学習率が大きすぎてパラメータが発散した場合
    #[error("training diverged at epoch {epoch} (rmse = {rmse})")]
    Divergence { epoch: usize, rmse: f32 },

    // 空のテスト集合など、メトリクスが定義できない場合
    #[error("metric undefined: {0}")]
    UndefinedMetric(String),
}
