//! TMDB (The Movie Database) provider client.
//!
//! Uses TMDB API v3: https://developer.themoviedb.org/docs

use tracing::debug;

use crate::MetadataError;
use crate::provider::{MetadataProvider, MovieCandidate, MovieDetails};

const BASE_URL: &str = "https://api.themoviedb.org/3";
const IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";

pub struct TmdbClient {
    api_key: String,
    client: reqwest::Client,
}

impl TmdbClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }

    async fn get_json(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<serde_json::Value, MetadataError> {
        let mut all_params = vec![("api_key", self.api_key.as_str())];
        all_params.extend_from_slice(params);

        let url = format!("{BASE_URL}{path}");
        debug!(url = %url, "TMDB request");

        let resp = self
            .client
            .get(&url)
            .query(&all_params)
            .send()
            .await
            .map_err(|e| MetadataError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MetadataError::NotFound);
        }

        if !resp.status().is_success() {
            return Err(MetadataError::Provider(format!(
                "TMDB returned {}",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| MetadataError::Provider(format!("parse JSON: {e}")))
    }
}

#[async_trait::async_trait]
impl MetadataProvider for TmdbClient {
    fn name(&self) -> &str {
        "tmdb"
    }

    async fn search(&self, title: &str) -> Result<Option<MovieCandidate>, MetadataError> {
        let data = self.get_json("/search/movie", &[("query", title)]).await?;
        let results = data["results"].as_array().cloned().unwrap_or_default();

        // TMDB orders results by relevance; the first one is our match.
        Ok(results.first().map(parse_candidate))
    }

    async fn details(&self, id: u64) -> Result<Option<MovieDetails>, MetadataError> {
        match self.get_json(&format!("/movie/{id}"), &[]).await {
            Ok(data) => Ok(Some(parse_details(&data))),
            Err(MetadataError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn fetch_image(&self, image_path: &str) -> Result<Vec<u8>, MetadataError> {
        let url = format!("{IMAGE_BASE}{image_path}");
        debug!(url = %url, "TMDB image request");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MetadataError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MetadataError::NotFound);
        }

        if !resp.status().is_success() {
            return Err(MetadataError::Provider(format!(
                "TMDB returned {}",
                resp.status()
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| MetadataError::Network(e.to_string()))?;

        Ok(bytes.to_vec())
    }
}

fn parse_candidate(data: &serde_json::Value) -> MovieCandidate {
    MovieCandidate {
        id: data["id"].as_u64().unwrap_or(0),
        title: data["title"].as_str().unwrap_or("Unknown").to_string(),
        original_title: data["original_title"].as_str().map(|s| s.to_string()),
        overview: data["overview"].as_str().map(|s| s.to_string()),
        release_date: data["release_date"].as_str().map(|s| s.to_string()),
        year: data["release_date"]
            .as_str()
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse().ok()),
        vote_average: data["vote_average"].as_f64(),
        vote_count: data["vote_count"].as_u64(),
        popularity: data["popularity"].as_f64(),
        adult: data["adult"].as_bool().unwrap_or(false),
        original_language: data["original_language"].as_str().map(|s| s.to_string()),
        poster_path: data["poster_path"].as_str().map(|s| s.to_string()),
        backdrop_path: data["backdrop_path"].as_str().map(|s| s.to_string()),
    }
}

fn parse_details(data: &serde_json::Value) -> MovieDetails {
    let genres = data["genres"]
        .as_array()
        .map(|gs| {
            gs.iter()
                .filter_map(|g| g["name"].as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let spoken_languages = data["spoken_languages"]
        .as_array()
        .map(|ls| {
            ls.iter()
                .filter_map(|l| {
                    l["english_name"]
                        .as_str()
                        .or_else(|| l["name"].as_str())
                        .map(|s| s.to_string())
                })
                .collect()
        })
        .unwrap_or_default();

    MovieDetails {
        id: data["id"].as_u64().unwrap_or(0),
        title: data["title"].as_str().unwrap_or("Unknown").to_string(),
        original_title: data["original_title"].as_str().map(|s| s.to_string()),
        overview: data["overview"].as_str().map(|s| s.to_string()),
        release_date: data["release_date"].as_str().map(|s| s.to_string()),
        year: data["release_date"]
            .as_str()
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse().ok()),
        vote_average: data["vote_average"].as_f64(),
        vote_count: data["vote_count"].as_u64(),
        popularity: data["popularity"].as_f64(),
        adult: data["adult"].as_bool().unwrap_or(false),
        original_language: data["original_language"].as_str().map(|s| s.to_string()),
        poster_path: data["poster_path"].as_str().map(|s| s.to_string()),
        backdrop_path: data["backdrop_path"].as_str().map(|s| s.to_string()),
        genres,
        spoken_languages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_candidate_from_search_result() {
        let json = serde_json::json!({
            "id": 27205,
            "title": "Inception",
            "original_title": "Inception",
            "overview": "A thief who steals corporate secrets...",
            "release_date": "2010-07-16",
            "vote_average": 8.4,
            "vote_count": 36000,
            "popularity": 84.7,
            "adult": false,
            "original_language": "en",
            "poster_path": "/poster.jpg",
            "backdrop_path": "/backdrop.jpg"
        });

        let c = parse_candidate(&json);
        assert_eq!(c.id, 27205);
        assert_eq!(c.title, "Inception");
        assert_eq!(c.year, Some(2010));
        assert!((c.vote_average.unwrap() - 8.4).abs() < 0.01);
        assert_eq!(c.poster_path.as_deref(), Some("/poster.jpg"));
        assert!(!c.adult);
    }

    #[test]
    fn parse_candidate_tolerates_missing_fields() {
        let json = serde_json::json!({ "id": 42, "title": "Bare" });

        let c = parse_candidate(&json);
        assert_eq!(c.id, 42);
        assert_eq!(c.year, None);
        assert_eq!(c.release_date, None);
        assert!(c.poster_path.is_none());
    }

    #[test]
    fn parse_details_collects_genres_and_languages() {
        let json = serde_json::json!({
            "id": 27205,
            "title": "Inception",
            "release_date": "2010-07-16",
            "vote_average": 8.4,
            "genres": [
                { "id": 28, "name": "Action" },
                { "id": 878, "name": "Science Fiction" }
            ],
            "spoken_languages": [
                { "english_name": "English", "iso_639_1": "en", "name": "English" },
                { "english_name": "Japanese", "iso_639_1": "ja", "name": "日本語" }
            ]
        });

        let d = parse_details(&json);
        assert_eq!(d.genres, vec!["Action", "Science Fiction"]);
        assert_eq!(d.spoken_languages, vec!["English", "Japanese"]);
        assert_eq!(d.year, Some(2010));
    }
}
