// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use anyhow::{anyhow, Context};
use serde_json::{json, Value};
use tracing::warn;
use url::Url;

use crate::store::Post;

const PROMPT_CHARS: usize = 3000;
const FALLBACK_CHARS: usize = 400;

struct Endpoint {
    client: reqwest::Client,
    url: Url,
    api_key: String,
}

/// Summarises posts with a generative-language API, falling back to an excerpt when the API is
/// not configured or does not answer.
pub struct Summarizer {
    endpoint: Option<Endpoint>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub text: String,
    pub generated: bool,
}

impl Summarizer {
    pub fn disabled() -> Self {
        Self { endpoint: None }
    }

    pub fn new(base: &Url, model: &str, api_key: String, timeout: Duration) -> anyhow::Result<Self> {
        let url = base
            .join(&format!(
                "{}/models/{model}:generateContent",
                base.path().trim_end_matches('/')
            ))
            .context("invalid summary endpoint")?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            endpoint: Some(Endpoint {
                client,
                url,
                api_key,
            }),
        })
    }

    pub async fn summarize(&self, post: &Post) -> Summary {
        let content = plain_text(&post.content);
        let Some(endpoint) = &self.endpoint else {
            return fallback(&post.title, &content);
        };

        match generate(endpoint, &post.title, &content).await {
            Ok(text) => Summary {
                text,
                generated: true,
            },
            Err(e) => {
                warn!(post_id = %post.id, "AI summary unavailable: {e:#}");
                fallback(&post.title, &content)
            }
        }
    }
}

async fn generate(endpoint: &Endpoint, title: &str, content: &str) -> anyhow::Result<String> {
    let prompt = format!(
        "Please provide a comprehensive summary of this blog post in 3-4 paragraphs.\n\
         Title: {title}\n\
         Content: {}...\n\n\
         Please make the summary engaging and highlight the key points. Return response only \
         in string format",
        truncate(content, PROMPT_CHARS)
    );

    let response: Value = endpoint
        .client
        .post(endpoint.url.clone())
        .query(&[("key", &endpoint.api_key)])
        .json(&json!({ "contents": [{ "parts": [{ "text": prompt }] }] }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    response["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .filter(|text| !text.trim().is_empty())
        .map(str::to_owned)
        .ok_or_else(|| anyhow!("response carried no summary text"))
}

fn fallback(title: &str, content: &str) -> Summary {
    Summary {
        text: format!(
            "## Summary of \"{title}\"\n\n{}...\n\n*This is a basic summary. AI service is \
             temporarily unavailable.*",
            truncate(content, FALLBACK_CHARS)
        ),
        generated: false,
    }
}

fn truncate(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// The readable text of a rich-content document: every string leaf, in document order.
pub fn plain_text(content: &Value) -> String {
    fn collect(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::String(s) if !s.trim().is_empty() => out.push(s.trim().to_owned()),
            Value::Array(items) => items.iter().for_each(|v| collect(v, out)),
            Value::Object(fields) => fields
                .iter()
                .filter(|(k, _)| !matches!(k.as_str(), "id" | "type" | "time" | "version"))
                .for_each(|(_, v)| collect(v, out)),
            _ => {}
        }
    }

    let mut out = vec![];
    collect(content, &mut out);
    out.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn post(content: Value) -> Post {
        Post {
            id: Uuid::new_v4(),
            slug: "post".to_owned(),
            title: "Ownership".to_owned(),
            content,
            author_id: Uuid::new_v4(),
            is_published: true,
            tags: vec![],
            seo_keywords: String::new(),
            meta_description: String::new(),
            image: None,
            likes: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn plain_text_walks_editor_blocks() {
        let content = json!({
            "time": 1700000000,
            "blocks": [
                {"id": "a1", "type": "header", "data": {"text": "Borrowing", "level": 2}},
                {"id": "a2", "type": "paragraph", "data": {"text": "References never outlive"}},
            ],
            "version": "2.28.0",
        });
        assert_eq!(plain_text(&content), "Borrowing References never outlive");
        assert_eq!(plain_text(&json!("just a string")), "just a string");
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }

    #[tokio::test]
    async fn disabled_summarizer_falls_back() {
        let long = "x".repeat(1000);
        let summary = Summarizer::disabled()
            .summarize(&post(json!({ "blocks": [{ "data": { "text": long } }] })))
            .await;

        assert!(!summary.generated);
        assert!(summary.text.starts_with("## Summary of \"Ownership\""));
        assert!(summary.text.contains(&format!("{}...", "x".repeat(400))));
        assert!(!summary.text.contains(&"x".repeat(401)));
    }
}
