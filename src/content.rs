use crate::types::{Candidate, Movie};
use std::collections::HashMap;

/// ジャンル文字列のTF-IDFベクトル + コサイン類似度による近傍検索
///
/// MovieLensのジャンルは "Action|Adventure|Sci-Fi" のようなパイプ区切り。
/// ベクトルは構築時に正規化しておくので、類似度は内積だけで済む。
pub struct GenreSimilarity {
    item_ids: Vec<String>,
    index: HashMap<String, usize>,
    vectors: Vec<Vec<f32>>,
}

impl GenreSimilarity {
    pub fn build(movies: &[Movie]) -> Self {
        // 語彙 (ジャンル名 -> 列番号) と文書頻度
        let mut vocab: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: Vec<usize> = Vec::new();
        let tokenized: Vec<Vec<usize>> = movies
            .iter()
            .map(|m| {
                let mut tokens = Vec::new();
                for genre in m.genres.split('|') {
                    let genre = genre.trim().to_lowercase();
                    if genre.is_empty() {
                        continue;
                    }
                    let next = vocab.len();
                    let col = *vocab.entry(genre).or_insert(next);
                    if col == doc_freq.len() {
                        doc_freq.push(0);
                    }
                    if !tokens.contains(&col) {
                        doc_freq[col] += 1;
                        tokens.push(col);
                    }
                }
                tokens
            })
            .collect();

        let n_docs = movies.len() as f32;
        let idf: Vec<f32> = doc_freq
            .iter()
            .map(|&df| ((1.0 + n_docs) / (1.0 + df as f32)).ln() + 1.0)
            .collect();

        let mut item_ids = Vec::with_capacity(movies.len());
        let mut index = HashMap::with_capacity(movies.len());
        let mut vectors = Vec::with_capacity(movies.len());
        for (row, (movie, tokens)) in movies.iter().zip(tokenized).enumerate() {
            let mut vector = vec![0.0f32; vocab.len()];
            for col in tokens {
                vector[col] = idf[col];
            }
            let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                for v in &mut vector {
                    *v /= norm;
                }
            }
            index.insert(movie.item_id.clone(), row);
            item_ids.push(movie.item_id.clone());
            vectors.push(vector);
        }

        Self {
            item_ids,
            index,
            vectors,
        }
    }

    /// `item_id` に近い順に最大k件。未知のIDなら空を返す。
    pub fn similar(&self, item_id: &str, k: usize) -> Vec<Candidate> {
        let Some(&row) = self.index.get(item_id) else {
            return Vec::new();
        };
        let query = &self.vectors[row];

        let mut scored: Vec<Candidate> = self
            .item_ids
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != row)
            .map(|(other, id)| Candidate {
                item_id: id.clone(),
                score: dot(query, &self.vectors[other]),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        scored
    }

    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
