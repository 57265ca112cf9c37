use clap::{Parser, Subcommand};
use latent_rec::datasets::{read_interactions, RatingDataset};
use latent_rec::metrics::{classification_metrics, regression_metrics};
use latent_rec::server::{router, AppState};
use latent_rec::trainer::{fit, TrainingConfig};
use latent_rec::types::RatingScale;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "latent-rec", about = "バイアス項つき行列分解の映画レコメンダー")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// CSVからモデルを学習し、評価してJSONに保存する
    Train {
        #[arg(long, default_value = "data/movielens_small/ratings.csv")]
        ratings_path: String,
        #[arg(long, default_value = "model.json")]
        model_path: String,
        #[arg(long, default_value_t = 0.2)]
        test_fraction: f32,
        #[arg(long, default_value_t = 42)]
        split_seed: u64,
        /// like/dislike の二値化に使う閾値
        #[arg(long, default_value_t = 3.5)]
        threshold: f32,
        #[arg(long, default_value_t = 20)]
        epochs: usize,
        #[arg(long, default_value_t = 0.005)]
        learning_rate: f32,
        #[arg(long, default_value_t = 0.02)]
        regularization: f32,
        #[arg(long, default_value_t = 32)]
        factors: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// 学習済みモデルを読み込んでHTTPで配信する
    Serve {
        #[arg(long, default_value = "model.json")]
        model_path: String,
        #[arg(long, default_value = "data/movielens_small/ratings.csv")]
        ratings_path: String,
        #[arg(long, default_value = "data/movielens_small/movies.csv")]
        movies_path: String,
        #[arg(long, default_value = "0.0.0.0:3000")]
        addr: String,
    },
}

fn train(
    ratings_path: &str,
    model_path: &str,
    test_fraction: f32,
    split_seed: u64,
    threshold: f32,
    config: &TrainingConfig,
) -> anyhow::Result<()> {
    println!("Loading data from {ratings_path}");
    let all_interactions = read_interactions(ratings_path)?;
    println!("Total interactions: {}", all_interactions.len());

    let dataset = RatingDataset::load(all_interactions, RatingScale::default())?;
    let (train_data, test_data) = dataset.split(test_fraction, split_seed)?;
    println!("Train: {}, Test: {}", train_data.len(), test_data.len());
    println!(
        "Users: {}, Items: {}",
        train_data.n_users(),
        train_data.n_items()
    );

    println!("Start training...");
    let model = fit(&train_data, config)?;

    let regression = regression_metrics(&model, &test_data)?;
    let classification = classification_metrics(&model, &test_data, threshold)?;
    println!(
        "Test RMSE: {:.4} | MAE: {:.4}",
        regression.rmse, regression.mae
    );
    println!(
        "Accuracy: {:.4} | Precision: {:.4} | Recall: {:.4} | F1: {:.4} (threshold {threshold})",
        classification.accuracy,
        classification.precision,
        classification.recall,
        classification.f1,
    );

    model.save(model_path)?;
    println!("Model saved to {model_path}");
    Ok(())
}

async fn serve(
    model_path: &str,
    ratings_path: &str,
    movies_path: &str,
    addr: &str,
) -> anyhow::Result<()> {
    let state = Arc::new(AppState::load(model_path, ratings_path, movies_path)?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match args.command {
        Command::Train {
            ratings_path,
            model_path,
            test_fraction,
            split_seed,
            threshold,
            epochs,
            learning_rate,
            regularization,
            factors,
            seed,
        } => {
            let config = TrainingConfig {
                epochs,
                learning_rate,
                regularization,
                factors,
                seed,
            };
            train(
                &ratings_path,
                &model_path,
                test_fraction,
                split_seed,
                threshold,
                &config,
            )
        }
        Command::Serve {
            model_path,
            ratings_path,
            movies_path,
            addr,
        } => serve(&model_path, &ratings_path, &movies_path, &addr).await,
    }
}
