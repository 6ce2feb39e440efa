//! HTTP client for the sparklet generator service
//!
//! Request: `POST {url}` with `{"vision": .., "definition": ..?}`.
//! Response: `{"definition": <object or JSON text>, "summary": ".."}`.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use sparklet_core::{GeneratedSparklet, SparkletGenerator};
use std::time::Duration;
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct HttpGenerator {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    definition: serde_json::Value,
    #[serde(default)]
    summary: String,
}

impl HttpGenerator {
    pub fn new(url: Option<String>) -> Self {
        Self {
            url: url.filter(|u| !u.trim().is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }
}

impl SparkletGenerator for HttpGenerator {
    fn generate(
        &self,
        vision: &str,
        base: Option<&serde_json::Value>,
    ) -> Result<GeneratedSparklet> {
        let Some(url) = &self.url else {
            bail!("no generator configured (set SPARKS_GENERATOR_URL)");
        };
        if vision.trim().is_empty() {
            bail!("describe what the sparklet should do");
        }

        let mut body = serde_json::json!({ "vision": vision });
        if let Some(base) = base {
            body["definition"] = base.clone();
        }

        info!(%url, refine = base.is_some(), "Requesting generation");
        let text = ureq::post(url)
            .timeout(REQUEST_TIMEOUT)
            .send_json(body)
            .map_err(|e| anyhow!("generator request failed: {}", e))?
            .into_string()
            .context("reading generator response")?;
        debug!(bytes = text.len(), "Generator responded");

        parse_response(&text)
    }
}

/// Accept the definition either inline or as JSON text (optionally wrapped
/// in a markdown code fence, as models tend to return it)
fn parse_response(text: &str) -> Result<GeneratedSparklet> {
    let response: GenerateResponse =
        serde_json::from_str(text).context("generator response is not JSON")?;

    let definition = match response.definition {
        serde_json::Value::String(inner) => serde_json::from_str(strip_fence(&inner))
            .context("generated definition is not valid JSON")?,
        serde_json::Value::Object(map) => serde_json::Value::Object(map),
        other => bail!("generated definition must be an object, got {}", other),
    };

    Ok(GeneratedSparklet {
        definition,
        summary: response.summary.trim().to_string(),
    })
}

fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inline_definition() {
        let generated = parse_response(
            r#"{"definition": {"view": {"elements": []}}, "summary": " Added a view. "}"#,
        )
        .unwrap();
        assert_eq!(generated.definition, json!({"view": {"elements": []}}));
        assert_eq!(generated.summary, "Added a view.");
    }

    #[test]
    fn test_fenced_definition_text() {
        let text = json!({
            "definition": "```json\n{\"title\": \"Timer\", \"view\": {\"elements\": []}}\n```",
            "summary": "Made a timer."
        })
        .to_string();
        let generated = parse_response(&text).unwrap();
        assert_eq!(generated.definition["title"], json!("Timer"));
    }

    #[test]
    fn test_bad_responses() {
        assert!(parse_response("not json").is_err());
        assert!(parse_response(r#"{"definition": 3}"#).is_err());
        assert!(parse_response(r#"{"definition": "{ broken"}"#).is_err());
    }

    #[test]
    fn test_unconfigured_generator_fails() {
        let generator = HttpGenerator::new(Some("  ".to_string()));
        assert!(!generator.is_configured());
        let err = generator.generate("a counter", None).unwrap_err();
        assert!(err.to_string().contains("SPARKS_GENERATOR_URL"));
    }
}
