//! Chat-completion client for extraction and answer synthesis.
//!
//! Talks to any OpenAI-compatible endpoint (`POST {base_url}/chat/completions`)
//! with a bearer token. The model is used **only** for:
//! - Classifying a sentence as atemporal, static or dynamic
//! - Extracting triples and temporal metadata from a sentence
//! - Writing prose answers from facts the query planner selected
//!
//! Conflict detection and query routing never touch the model.

use std::time::Duration;

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

use crate::config::LlmConfig;
use crate::graph::Triple;
use crate::statement::{FactType, TemporalClass};
use crate::temporal::{TemporalEvent, parse_instant};

use super::{Extractor, Summarizer, SupportingFact};

/// Errors from the LLM subsystem.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("LLM endpoint is not reachable at {url}")]
    #[diagnostic(
        code(tkg::llm::unavailable),
        help("Check `llm.base_url` in the config and your network connection.")
    )]
    Unavailable { url: String },

    #[error("LLM request failed: {message}")]
    #[diagnostic(
        code(tkg::llm::request_failed),
        help("The connection broke before a response arrived. Check the endpoint and retry.")
    )]
    RequestFailed { message: String },

    #[error("LLM endpoint returned HTTP {status}: {message}")]
    #[diagnostic(
        code(tkg::llm::http_status),
        help(
            "401/403: check `llm.api_key`. 404: check `llm.base_url` and `llm.model`. \
             429 and 5xx are retried."
        )
    )]
    HttpStatus { status: u16, message: String },

    #[error("failed to parse LLM response: {message}")]
    #[diagnostic(
        code(tkg::llm::parse_error),
        help("The model returned an unexpected response format.")
    )]
    ParseError { message: String },

    #[error("LLM request timed out after {timeout_secs}s")]
    #[diagnostic(
        code(tkg::llm::timeout),
        help("Increase `llm.timeout_secs` or use a faster model.")
    )]
    Timeout { timeout_secs: u64 },

    #[error("no API key configured for the LLM endpoint")]
    #[diagnostic(
        code(tkg::llm::missing_credentials),
        help("Set `llm.api_key` in the config file or pass --api-key.")
    )]
    MissingCredentials,
}

impl LlmError {
    /// Transient failures worth another attempt: transport errors, rate
    /// limiting and server errors. Other HTTP statuses fail immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable { .. } | Self::Timeout { .. } | Self::RequestFailed { .. } => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            Self::ParseError { .. } | Self::MissingCredentials => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

const CLASSIFY_PROMPT: &str = "\
Classify the statement into exactly one temporal category:

ATEMPORAL: never changes (\"Water freezes at zero degrees\").
STATIC: becomes true at a point in time and stays true (\"Company A acquired Company B on January 1, 2020\").
DYNAMIC: changes over time (\"Boris was CEO from 2019 to 2022\").

Statement: \"{text}\"

Answer with one word: ATEMPORAL, STATIC or DYNAMIC.";

const TEMPORAL_PROMPT: &str = "\
Extract the time information in the statement.

Statement: \"{text}\"
Reference date: {reference}

Return one JSON object, using null for anything not stated:
{\"t_created\": \"ISO-8601 or null\", \"t_expired\": \"ISO-8601 or null\", \
\"t_valid\": \"ISO-8601 or null\", \"t_invalid\": \"ISO-8601 or null\"}

t_created is when the fact was recorded or established, t_valid when it became true, \
t_invalid when it stopped being true, t_expired a hard end date. \
Resolve relative dates such as \"last month\" against the reference date.";

const TRIPLES_PROMPT: &str = "\
Extract knowledge-graph triples (subject, predicate, object) from the statement.

Statement: \"{text}\"

Return only a JSON array:
[{\"subject\": \"entity\", \"predicate\": \"relationship\", \"object\": \"entity or value\"}]

Use camelCase predicates such as hasCEO or foundedIn. Keep only the most important facts.";

const FACT_TYPE_PROMPT: &str = "\
Is the statement a FACT (verifiable), an OPINION (subjective judgement) or a \
PREDICTION (claim about the future)?

Statement: \"{text}\"

Answer with one word: FACT, OPINION or PREDICTION.";

const ANSWER_PROMPT: &str = "\
Answer the question using only the temporal knowledge below.

Question: {question}

Relevant information:
{facts}

Be clear and concise. When the answer depends on time, name the relevant periods.";

/// Substitute `{name}` placeholders in a single pass. Inserted values are
/// never rescanned; unknown braces are kept as written.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let hit = values.iter().find_map(|(name, value)| {
            after
                .strip_prefix(name)
                .and_then(|r| r.strip_prefix('}'))
                .map(|r| (*value, r))
        });
        match hit {
            Some((value, remainder)) => {
                out.push_str(value);
                rest = remainder;
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Client for an OpenAI-compatible chat-completion API.
#[derive(Clone)]
pub struct LlmClient {
    config: LlmConfig,
    agent: ureq::Agent,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self { config, agent }
    }

    /// Get the model name being used.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Single-turn completion, retried up to `max_retries` times on
    /// transient failures.
    pub fn complete(&self, prompt: &str, temperature: f32, max_tokens: u32) -> Result<String, LlmError> {
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(LlmError::MissingCredentials)?;

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        let mut attempt = 0;
        loop {
            match self.send(key, &body) {
                Ok(content) => return Ok(content),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        max_retries = self.config.max_retries,
                        "LLM request failed; retrying"
                    );
                    std::thread::sleep(Duration::from_millis(250 << (attempt - 1).min(4)));
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn send(&self, key: &str, body: &Value) -> Result<String, LlmError> {
        let url = self.endpoint();
        let resp = self
            .agent
            .post(&url)
            .set("Authorization", &format!("Bearer {key}"))
            .send_json(body)
            .map_err(|e| self.map_transport(&url, e))?;

        let json: Value = resp.into_json().map_err(|e| LlmError::ParseError {
            message: e.to_string(),
        })?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| LlmError::ParseError {
                message: "missing 'choices[0].message.content' field".into(),
            })
    }

    fn map_transport(&self, url: &str, err: ureq::Error) -> LlmError {
        match err {
            ureq::Error::Status(code, resp) => {
                let body = resp.into_string().unwrap_or_default();
                LlmError::HttpStatus {
                    status: code,
                    message: body.trim().to_string(),
                }
            }
            ureq::Error::Transport(t) => match t.kind() {
                ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed => LlmError::Unavailable {
                    url: url.to_string(),
                },
                _ if is_timeout(&t) => LlmError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                },
                _ => LlmError::RequestFailed {
                    message: t.to_string(),
                },
            },
        }
    }
}

fn is_timeout(t: &ureq::Transport) -> bool {
    std::error::Error::source(t)
        .and_then(|s| s.downcast_ref::<std::io::Error>())
        .is_some_and(|e| {
            matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            )
        })
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("has_api_key", &self.config.api_key.is_some())
            .finish()
    }
}

impl Extractor for LlmClient {
    fn classify(&self, text: &str) -> Result<TemporalClass, LlmError> {
        let reply = self.complete(&fill(CLASSIFY_PROMPT, &[("text", text)]), 0.1, 10)?;
        parse_temporal_class(&reply)
    }

    fn extract_triples(&self, text: &str) -> Result<Vec<Triple>, LlmError> {
        let reply = self.complete(&fill(TRIPLES_PROMPT, &[("text", text)]), 0.1, 300)?;
        parse_triples(&reply)
    }

    fn extract_temporal_event(
        &self,
        text: &str,
        reference: DateTime<Utc>,
    ) -> Result<Option<TemporalEvent>, LlmError> {
        let reference = reference.to_rfc3339();
        let prompt = fill(TEMPORAL_PROMPT, &[("text", text), ("reference", &reference)]);
        let reply = self.complete(&prompt, 0.1, 200)?;
        parse_temporal_event(&reply)
    }

    fn classify_fact_type(&self, text: &str) -> Result<FactType, LlmError> {
        let reply = self.complete(&fill(FACT_TYPE_PROMPT, &[("text", text)]), 0.1, 10)?;
        parse_fact_type(&reply)
    }
}

impl Summarizer for LlmClient {
    fn answer(&self, question: &str, facts: &[SupportingFact]) -> Result<String, LlmError> {
        let facts = facts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = fill(ANSWER_PROMPT, &[("question", question), ("facts", &facts)]);
        self.complete(&prompt, 0.3, 300)
    }
}

// ---------------------------------------------------------------------------
// Reply parsing
// ---------------------------------------------------------------------------

/// The span from the first `open` to the last `close`, inclusive.
fn locate_json(reply: &str, open: char, close: char) -> Option<&str> {
    let start = reply.find(open)?;
    let end = reply.rfind(close)?;
    (end > start).then(|| &reply[start..=end])
}

/// First alphabetic word of the reply, uppercased.
fn first_word(reply: &str) -> String {
    reply
        .split(|c: char| !c.is_alphabetic())
        .find(|w| !w.is_empty())
        .unwrap_or("")
        .to_uppercase()
}

fn parse_temporal_class(reply: &str) -> Result<TemporalClass, LlmError> {
    match first_word(reply).as_str() {
        "ATEMPORAL" => Ok(TemporalClass::Atemporal),
        "STATIC" => Ok(TemporalClass::Static),
        "DYNAMIC" => Ok(TemporalClass::Dynamic),
        _ => Err(LlmError::ParseError {
            message: format!("unrecognized temporal class {reply:?}"),
        }),
    }
}

fn parse_fact_type(reply: &str) -> Result<FactType, LlmError> {
    match first_word(reply).as_str() {
        "FACT" => Ok(FactType::Fact),
        "OPINION" => Ok(FactType::Opinion),
        "PREDICTION" => Ok(FactType::Prediction),
        _ => Err(LlmError::ParseError {
            message: format!("unrecognized fact type {reply:?}"),
        }),
    }
}

fn parse_triples(reply: &str) -> Result<Vec<Triple>, LlmError> {
    let json = locate_json(reply, '[', ']').ok_or_else(|| LlmError::ParseError {
        message: "no JSON array found in response".into(),
    })?;
    let items: Vec<Value> = serde_json::from_str(json).map_err(|e| LlmError::ParseError {
        message: format!("JSON parse error: {e}"),
    })?;

    let field = |v: &Value, name: &str| v[name].as_str().map(str::trim).unwrap_or("").to_string();
    let mut triples = Vec::with_capacity(items.len());
    for item in &items {
        let (subject, predicate, object) =
            (field(item, "subject"), field(item, "predicate"), field(item, "object"));
        if subject.is_empty() || predicate.is_empty() || object.is_empty() {
            tracing::debug!(%item, "skipping incomplete triple");
            continue;
        }
        triples.push(Triple::new(subject, predicate, object));
    }
    Ok(triples)
}

fn parse_temporal_event(reply: &str) -> Result<Option<TemporalEvent>, LlmError> {
    let json = locate_json(reply, '{', '}').ok_or_else(|| LlmError::ParseError {
        message: "no JSON object found in response".into(),
    })?;
    let obj: Value = serde_json::from_str(json).map_err(|e| LlmError::ParseError {
        message: format!("JSON parse error: {e}"),
    })?;

    let instant = |key: &str| {
        let raw = obj[key].as_str()?.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
            return None;
        }
        match parse_instant(raw) {
            Ok(t) => Some(t),
            Err(e) => {
                tracing::debug!(field = key, error = %e, "ignoring unparseable instant");
                None
            }
        }
    };

    let event = TemporalEvent {
        created: instant("t_created"),
        expired: instant("t_expired"),
        valid_from: instant("t_valid"),
        valid_until: instant("t_invalid"),
    };
    Ok((!event.is_unbounded()).then_some(event))
}
