// Engine configuration

/// Tuning knobs for the reconciliation engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum rows per store write, bounding transaction size.
    pub batch_size: usize,
    /// Language used for the single language-independent destination crawl.
    pub canonical_language: String,
    /// Language assumed when the provider returns an empty language list.
    pub fallback_language: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 5_000,
            canonical_language: "en".to_string(),
            fallback_language: "en".to_string(),
        }
    }
}
