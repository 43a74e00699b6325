//! Publishes classified readings to the ThingSpeak dashboard.

use async_trait::async_trait;

use crate::opts::ThingSpeakOpts;
use crate::prelude::*;
use crate::reading::{Reading, Verdict};

#[async_trait]
pub trait TelemetryRelay: Send + Sync {
    /// Publishes the reading along with its verdict. Fails on a non-success response.
    async fn send(&self, reading: &Reading, verdict: Verdict) -> Result;
}

/// ThingSpeak channel client.
///
/// See <https://www.mathworks.com/help/thingspeak/writedata.html>.
#[derive(Clone)]
pub struct ThingSpeak {
    client: reqwest::Client,
    url: String,
    api_key: String,
    channel_id: String,
}

impl ThingSpeak {
    pub fn new(opts: &ThingSpeakOpts) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build the HTTP client")?;
        Ok(Self {
            client,
            url: format!("{}/update", opts.base_url.trim_end_matches('/')),
            api_key: opts.api_key.clone(),
            channel_id: opts.channel_id.clone(),
        })
    }

    /// Channel fields: `field1` through `field4` are the temperature, humidity, pH and the verdict.
    fn form(&self, reading: &Reading, verdict: Verdict) -> [(&'static str, String); 5] {
        [
            ("api_key", self.api_key.clone()),
            ("field1", reading.temperature.to_string()),
            ("field2", reading.humidity.to_string()),
            ("field3", reading.ph.to_string()),
            ("field4", verdict.as_u8().to_string()),
        ]
    }
}

#[async_trait]
impl TelemetryRelay for ThingSpeak {
    #[instrument(level = "debug", skip_all, fields(channel_id = self.channel_id.as_str()))]
    async fn send(&self, reading: &Reading, verdict: Verdict) -> Result {
        let start_instant = Instant::now();
        let response = self
            .client
            .post(&self.url)
            .form(&self.form(reading, verdict))
            .send()
            .await?
            .error_for_status()?;
        let entry_id = response.text().await.unwrap_or_default();
        debug!(entry_id = entry_id.as_str(), elapsed = ?start_instant.elapsed(), "updated");
        Ok(())
    }
}
