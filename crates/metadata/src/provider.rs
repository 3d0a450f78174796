use crate::MetadataError;

/// A metadata provider that can match movies and serve their artwork.
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Best match for a title, or `None` when the provider has no result.
    async fn search(&self, title: &str) -> Result<Option<MovieCandidate>, MetadataError>;

    /// Full record for a previously matched movie.
    async fn details(&self, id: u64) -> Result<Option<MovieDetails>, MetadataError>;

    /// Raw image bytes for a provider-relative artwork path (e.g. "/abc.jpg").
    async fn fetch_image(&self, image_path: &str) -> Result<Vec<u8>, MetadataError>;
}

/// Movie match returned by a provider search.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MovieCandidate {
    pub id: u64,
    pub title: String,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub year: Option<u16>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<u64>,
    pub popularity: Option<f64>,
    pub adult: bool,
    pub original_language: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
}

/// Full movie record fetched by provider id.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MovieDetails {
    pub id: u64,
    pub title: String,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub year: Option<u16>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<u64>,
    pub popularity: Option<f64>,
    pub adult: bool,
    pub original_language: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub genres: Vec<String>,
    pub spoken_languages: Vec<String>,
}
