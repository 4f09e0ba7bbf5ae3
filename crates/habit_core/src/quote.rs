use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::storage::KeyValueStore;

pub const DEFAULT_QUOTE_URL: &str =
    "https://api.quotable.io/random?tags=inspirational,mindfulness,wisdom";

const QUOTE_KEY: &str = "dailyQuote";
const QUOTE_DATE_KEY: &str = "dailyQuoteDate";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub text: String,
    pub author: String,
}

impl Quote {
    fn new(text: &str, author: &str) -> Self {
        Self {
            text: text.to_string(),
            author: author.to_string(),
        }
    }
}

pub fn fallback_quotes() -> Vec<Quote> {
    vec![
        Quote::new(
            "The present moment is filled with joy and happiness. If you are attentive, you will see it.",
            "Thich Nhat Hanh",
        ),
        Quote::new(
            "Do not dwell in the past, do not dream of the future, concentrate the mind on the present moment.",
            "Buddha",
        ),
        Quote::new("Peace comes from within. Do not seek it without.", "Buddha"),
        Quote::new(
            "The only way to do great work is to love what you do.",
            "Steve Jobs",
        ),
        Quote::new(
            "Happiness is not something ready-made. It comes from your own actions.",
            "Dalai Lama",
        ),
    ]
}

/// Same quote for the whole of `day`.
pub fn fallback_for(day: NaiveDate) -> Quote {
    let quotes = fallback_quotes();
    let index = day.num_days_from_ce().unsigned_abs() as usize % quotes.len();
    quotes[index].clone()
}

pub trait QuoteSource: Send + Sync {
    fn fetch(&self) -> Result<Quote>;
}

/// Fetches from a quotable-compatible endpoint returning `{content, author}`.
pub struct HttpQuoteSource {
    url: String,
    timeout: Duration,
}

impl HttpQuoteSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for HttpQuoteSource {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTE_URL)
    }
}

#[derive(Deserialize)]
struct QuotableResponse {
    content: String,
    author: String,
}

impl QuoteSource for HttpQuoteSource {
    #[instrument(skip(self), fields(url = %self.url))]
    fn fetch(&self) -> Result<Quote> {
        let response: QuotableResponse = ureq::get(&self.url)
            .timeout(self.timeout)
            .call()
            .with_context(|| format!("failed to fetch quote from {}", self.url))?
            .into_json()
            .context("quote response was not valid JSON")?;
        Ok(Quote {
            text: response.content,
            author: response.author,
        })
    }
}

/// Never reaches the network; every fetch fails over to the fallback list.
pub struct OfflineQuoteSource;

impl QuoteSource for OfflineQuoteSource {
    fn fetch(&self) -> Result<Quote> {
        Err(anyhow!("quote fetching is disabled"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteOrigin {
    Cached,
    Fetched,
    Fallback { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyQuote {
    pub quote: Quote,
    pub origin: QuoteOrigin,
}

/// One quote per day, cached in the same store as the habits.
pub struct QuoteBook {
    store: Arc<dyn KeyValueStore>,
    source: Box<dyn QuoteSource>,
}

impl QuoteBook {
    pub fn new(store: Arc<dyn KeyValueStore>, source: Box<dyn QuoteSource>) -> Self {
        Self { store, source }
    }

    pub fn cached(&self, today: NaiveDate) -> Option<Quote> {
        let date = self.store.get(QUOTE_DATE_KEY).ok()??;
        if date != today.to_string() {
            return None;
        }
        let raw = self.store.get(QUOTE_KEY).ok()??;
        serde_json::from_str(&raw).ok()
    }

    /// Today's cached quote, or a fresh one when the cache is stale.
    pub fn quote_for(&self, today: NaiveDate) -> DailyQuote {
        match self.cached(today) {
            Some(quote) => DailyQuote {
                quote,
                origin: QuoteOrigin::Cached,
            },
            None => self.refresh(today),
        }
    }

    /// Fetches regardless of the cache. Failures yield a fallback quote, which
    /// is not cached so the next call tries the network again.
    pub fn refresh(&self, today: NaiveDate) -> DailyQuote {
        match self.source.fetch() {
            Ok(quote) => {
                if let Err(err) = self.remember(&quote, today) {
                    warn!(%err, "unable to cache daily quote");
                }
                debug!(author = %quote.author, "fetched daily quote");
                DailyQuote {
                    quote,
                    origin: QuoteOrigin::Fetched,
                }
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "using fallback quote");
                DailyQuote {
                    quote: fallback_for(today),
                    origin: QuoteOrigin::Fallback {
                        error: format!("{err:#}"),
                    },
                }
            }
        }
    }

    /// Forgets the cached quote so the next lookup fetches again.
    pub fn clear(&self) -> Result<()> {
        self.store.remove(QUOTE_KEY)?;
        self.store.remove(QUOTE_DATE_KEY)?;
        Ok(())
    }

    fn remember(&self, quote: &Quote, today: NaiveDate) -> Result<()> {
        self.store.set(QUOTE_KEY, &serde_json::to_string(quote)?)?;
        self.store.set(QUOTE_DATE_KEY, &today.to_string())?;
        Ok(())
    }
}
