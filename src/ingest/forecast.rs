/// Daily forecast client
///
/// Fetches the regional text forecast used for the morning digest. The
/// endpoint is expected to return plain text; whitespace is normalized so
/// the segmenter sees one continuous paragraph, and diacritics are folded
/// to their base letters ("Zamračené" becomes "Zamracene").

use std::time::Duration;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::logging::{self, Source};
use crate::model::RelayError;
use crate::text::normalize_whitespace;

/// Anything that can produce today's forecast text.
pub trait ForecastSource: Send + Sync {
    fn fetch(&self) -> Result<String, RelayError>;
}

pub struct HttpForecastSource {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpForecastSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl ForecastSource for HttpForecastSource {
    fn fetch(&self) -> Result<String, RelayError> {
        let response = self.client.get(&self.url).header("Accept", "text/plain").send()?;

        if !response.status().is_success() {
            return Err(RelayError::Http(response.status().as_u16()));
        }

        let body = response.text()?;
        logging::debug(
            Source::Forecast,
            Some(&self.url),
            &format!("downloaded {} bytes", body.len()),
        );
        clean_forecast(&body)
    }
}

/// Decomposes `text` and drops the combining marks, leaving base letters.
pub fn fold_diacritics(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Normalizes whitespace, folds diacritics, and rejects an empty forecast.
pub fn clean_forecast(body: &str) -> Result<String, RelayError> {
    let text = fold_diacritics(&normalize_whitespace(body));
    if text.is_empty() {
        return Err(RelayError::Fetch("forecast body was empty".into()));
    }
    Ok(text)
}
