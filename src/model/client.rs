//! Completions-API scorer supporting OpenAI and OpenAI-compatible servers
//!
//! Log-probabilities come from the legacy `/completions` endpoint with
//! `echo: true, max_tokens: 0, logprobs: 0`: the API then returns one
//! log-probability per *prompt* token without generating anything.
//! Uses ureq (sync HTTP), so no async runtime is needed.

use super::{LogProbScorer, ModelError, ModelResult, TokenScore};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{debug, warn};

/// Supported completion backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    OpenAi,
    /// Any OpenAI-compatible server (vLLM, llama.cpp, Ollama, ...)
    Local,
}

impl Backend {
    pub fn env_key(&self) -> &'static str {
        match self {
            Backend::OpenAi => "OPENAI_API_KEY",
            Backend::Local => "PROBSEM_LOCAL_API_KEY",
        }
    }

    pub fn signup_url(&self) -> &'static str {
        match self {
            Backend::OpenAi => "https://platform.openai.com/api-keys",
            Backend::Local => "(no key needed for a local server)",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Backend::OpenAi => "https://api.openai.com/v1",
            Backend::Local => "http://localhost:8000/v1",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Backend::Local)
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Backend::OpenAi),
            "local" | "vllm" | "ollama" => Ok(Backend::Local),
            _ => Err(format!("Unknown backend '{}'. Valid backends: openai, local", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model_id: String,
    pub backend: Backend,
    pub base_url: Option<String>,
    pub max_retries: u32,
    /// First backoff delay; doubles on every retry
    pub retry_after: Duration,
    pub timeout: Duration,
}

impl ModelConfig {
    pub fn new(model_id: impl Into<String>, backend: Backend) -> Self {
        Self {
            model_id: model_id.into(),
            backend,
            base_url: None,
            max_retries: 8,
            retry_after: Duration::from_secs(10),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn completions_url(&self) -> String {
        let base = self
            .base_url
            .as_deref()
            .unwrap_or_else(|| self.backend.default_base_url());
        format!("{}/completions", base.trim_end_matches('/'))
    }
}

/// Completions-API scorer over sync ureq
pub struct CompletionsScorer {
    config: ModelConfig,
    api_key: Option<String>,
    agent: ureq::Agent,
}

fn make_agent(timeout: Duration) -> ureq::Agent {
    ureq::config::Config::builder()
        .http_status_as_error(false) // status codes decide retry vs. fail
        .timeout_global(Some(timeout))
        .build()
        .new_agent()
}

impl CompletionsScorer {
    pub fn new(config: ModelConfig, api_key: Option<String>) -> Self {
        let agent = make_agent(config.timeout);
        Self {
            config,
            api_key,
            agent,
        }
    }

    /// Build a scorer, taking the key from `api_key` or the backend's env var
    pub fn connect(config: ModelConfig, api_key: Option<&str>) -> ModelResult<Self> {
        let env_key = config.backend.env_key();
        let key = api_key
            .map(str::to_string)
            .or_else(|| env::var(env_key).ok());

        if key.is_none() && config.backend.requires_api_key() {
            return Err(ModelError::MissingApiKey {
                env_var: env_key.to_string(),
                signup_url: config.backend.signup_url().to_string(),
            });
        }
        debug!(
            "Scoring with {} via {}",
            config.model_id,
            config.completions_url()
        );
        Ok(Self::new(config, key))
    }

    /// Echo-only completion for `text`, retrying rate limits with backoff
    fn echo(&self, text: &str) -> ModelResult<CompletionResponse> {
        let body = CompletionRequest {
            model: &self.config.model_id,
            prompt: text,
            max_tokens: 0,
            logprobs: 0,
            echo: true,
        };

        let mut retry_after = self.config.retry_after;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send(&body) {
                Err(Attempt::Retryable(message)) if attempt <= self.config.max_retries => {
                    warn!(
                        "Rate limit exceeded. Retrying after {} seconds.",
                        retry_after.as_secs_f64()
                    );
                    debug!("Retry reason: {}", message);
                    std::thread::sleep(retry_after);
                    retry_after *= 2;
                }
                Err(Attempt::Retryable(message)) => {
                    return Err(ModelError::RetriesExhausted {
                        attempts: attempt,
                        message,
                    })
                }
                Err(Attempt::Fatal(e)) => return Err(e),
                Ok(resp) => return Ok(resp),
            }
        }
    }

    fn send(&self, body: &CompletionRequest<'_>) -> Result<CompletionResponse, Attempt> {
        let url = self.config.completions_url();
        let mut req = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json");

        if let Some(key) = &self.api_key {
            req = req.header("Authorization", &format!("Bearer {}", key));
        }

        // only HTTP statuses are retried; an unreachable server fails at once
        let response = req
            .send_json(body)
            .map_err(|e| Attempt::Fatal(ModelError::Transport(format!("{}: {}", url, e))))?;

        let status = response.status().as_u16();
        if status >= 400 {
            let error_text = response.into_body().read_to_string().unwrap_or_default();
            return Err(if is_retryable(status) {
                Attempt::Retryable(format!("{} - {}", status, error_text))
            } else {
                Attempt::Fatal(ModelError::Api {
                    status,
                    message: error_text,
                })
            });
        }

        response
            .into_body()
            .read_json()
            .map_err(|e| Attempt::Fatal(ModelError::Parse(e.to_string())))
    }

    /// Token length of `eval_text`; servers reject empty prompts with 400
    fn count_tokens(&self, eval_text: &str) -> ModelResult<usize> {
        match self.echo(eval_text) {
            Ok(resp) => resp
                .usage
                .map(|u| u.total_tokens)
                .ok_or_else(|| ModelError::Parse("No usage in response".to_string())),
            Err(ModelError::Api { status: 400, .. }) => {
                Ok(if eval_text.is_empty() { 0 } else { 1 })
            }
            Err(e) => Err(e),
        }
    }
}

impl LogProbScorer for CompletionsScorer {
    fn id(&self) -> &str {
        &self.config.model_id
    }

    fn score(&self, full_text: &str, eval_text: &str) -> ModelResult<TokenScore> {
        let full = self.echo(full_text)?;
        let num_eval = self.count_tokens(eval_text)?;

        let token_logprobs = full
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.logprobs)
            .map(|l| l.token_logprobs)
            .ok_or_else(|| ModelError::Parse("No logprobs in response".to_string()))?;

        Ok(TokenScore {
            logp: sum_trailing(&token_logprobs, num_eval),
            num_eval,
        })
    }
}

enum Attempt {
    Retryable(String),
    Fatal(ModelError),
}

fn is_retryable(status: u16) -> bool {
    status == 429 || status >= 500
}

/// Sum of the last `n` log-probabilities; the first token has none (null).
fn sum_trailing(token_logprobs: &[Option<f64>], n: usize) -> f64 {
    let start = token_logprobs.len().saturating_sub(n);
    token_logprobs[start..].iter().flatten().sum()
}

// Completions API types
#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    logprobs: u32,
    echo: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    logprobs: Option<Logprobs>,
}

#[derive(Deserialize)]
struct Logprobs {
    token_logprobs: Vec<Option<f64>>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::JoinHandle;

    const ECHO_FULL: &str = r#"{"choices": [{"logprobs": {"token_logprobs": [null, -1.0, -0.25, -0.25]}}], "usage": {"total_tokens": 4}}"#;
    const ECHO_EVAL: &str = r#"{"choices": [{"logprobs": {"token_logprobs": [null, -0.75]}}], "usage": {"total_tokens": 2}}"#;

    /// Answer one connection per scripted `(status, body)` and hand back the raw requests
    fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind local server");
        let base_url = format!("http://{}/v1", listener.local_addr().expect("local addr"));
        let handle = std::thread::spawn(move || {
            responses
                .into_iter()
                .map(|(status, body)| {
                    let (mut stream, _) = listener.accept().expect("accept");
                    let request = read_request(&mut stream);
                    write!(
                        stream,
                        "HTTP/1.1 {} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    )
                    .expect("write response");
                    request
                })
                .collect()
        });
        (base_url, handle)
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).expect("read request");
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).into_owned();
            if let Some(end) = text.find("\r\n\r\n") {
                let head = text[..end].to_lowercase();
                let content_length = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok());
                let done = match content_length {
                    Some(len) => buf.len() - end - 4 >= len,
                    None => !head.contains("chunked") || text.ends_with("0\r\n\r\n"),
                };
                if done {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn local_scorer(base_url: String, max_retries: u32) -> CompletionsScorer {
        let config = ModelConfig {
            base_url: Some(base_url),
            max_retries,
            retry_after: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
            ..ModelConfig::new("codegen-350M-mono", Backend::Local)
        };
        CompletionsScorer::new(config, Some("sk-local".to_string()))
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("openai".parse::<Backend>(), Ok(Backend::OpenAi));
        assert_eq!("vLLM".parse::<Backend>(), Ok(Backend::Local));
        assert!("anthropic".parse::<Backend>().is_err());
    }

    #[test]
    fn test_completions_url() {
        let config = ModelConfig::new("code-davinci-002", Backend::OpenAi);
        assert_eq!(
            config.completions_url(),
            "https://api.openai.com/v1/completions"
        );

        let config = ModelConfig {
            base_url: Some("http://gpu-box:9000/v1/".to_string()),
            ..ModelConfig::new("codegen-350M-mono", Backend::Local)
        };
        assert_eq!(config.completions_url(), "http://gpu-box:9000/v1/completions");
    }

    #[test]
    fn test_local_backend_needs_no_key() {
        let config = ModelConfig::new("codegen-350M-mono", Backend::Local);
        let scorer = CompletionsScorer::connect(config, None).expect("local scorer");
        assert_eq!(scorer.id(), "codegen-350M-mono");
    }

    #[test]
    fn test_explicit_key_is_used() {
        let config = ModelConfig::new("code-davinci-002", Backend::OpenAi);
        let scorer = CompletionsScorer::connect(config, Some("sk-test")).expect("scorer");
        assert_eq!(scorer.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_sum_trailing() {
        let lp = [None, Some(-1.0), Some(-2.0), Some(-0.5)];
        assert_eq!(sum_trailing(&lp, 2), -2.5);
        assert_eq!(sum_trailing(&lp, 0), 0.0);
        // more eval tokens than the echo: null first token counts as 0
        assert_eq!(sum_trailing(&lp, 10), -3.5);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(429));
        assert!(is_retryable(503));
        assert!(!is_retryable(400));
        assert!(!is_retryable(401));
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "choices": [{"text": "x", "logprobs": {"tokens": ["a","b"], "token_logprobs": [null, -0.25]}}],
            "usage": {"prompt_tokens": 2, "total_tokens": 2}
        }"#;
        let resp: CompletionResponse = serde_json::from_str(json).expect("parse response");
        assert_eq!(resp.usage.map(|u| u.total_tokens), Some(2));
        let lp = &resp.choices[0].logprobs.as_ref().expect("logprobs").token_logprobs;
        assert_eq!(lp, &vec![None, Some(-0.25)]);
    }

    #[test]
    fn test_score_sums_trailing_eval_tokens() {
        let (url, server) = serve(vec![(200, ECHO_FULL), (200, ECHO_EVAL)]);
        let scorer = local_scorer(url, 0);
        let score = scorer.score("ctx\n(define theta 80)", "(define theta 80)").expect("score");
        assert_eq!(score, TokenScore { logp: -0.5, num_eval: 2 });

        let requests = server.join().expect("server thread");
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with("POST /v1/completions"));
        assert!(requests[0].contains("Bearer sk-local"));
        assert!(requests[0].contains(r#""echo":true"#));
        assert!(requests[0].contains(r#""max_tokens":0"#));
        assert!(requests[1].contains(r#""prompt":"(define theta 80)""#));
    }

    #[test]
    fn test_rate_limit_then_success() {
        let (url, server) = serve(vec![
            (429, r#"{"error": "slow down"}"#),
            (503, "overloaded"),
            (200, ECHO_FULL),
            (200, ECHO_EVAL),
        ]);
        let scorer = local_scorer(url, 3);
        let score = scorer.score("ctx\n(a)", "(a)").expect("score after retries");
        assert_eq!(score.num_eval, 2);
        assert_eq!(server.join().expect("server thread").len(), 4);
    }

    #[test]
    fn test_token_count_rejected_falls_back() {
        let (url, server) = serve(vec![(200, ECHO_FULL), (400, "prompt too short")]);
        let score = local_scorer(url, 0).score("ctx\n(a)", "(a)").expect("score");
        assert_eq!(score, TokenScore { logp: -0.25, num_eval: 1 });
        server.join().expect("server thread");

        let (url, server) = serve(vec![(200, ECHO_FULL), (400, "empty prompt")]);
        let score = local_scorer(url, 0).score("ctx", "").expect("score");
        assert_eq!(score, TokenScore { logp: 0.0, num_eval: 0 });
        server.join().expect("server thread");
    }

    #[test]
    fn test_client_error_is_not_retried() {
        let (url, server) = serve(vec![(401, "invalid key")]);
        let err = local_scorer(url, 5).score("ctx\n(a)", "(a)").unwrap_err();
        assert!(
            matches!(err, ModelError::Api { status: 401, ref message } if message == "invalid key"),
            "{:?}",
            err
        );
        assert_eq!(server.join().expect("server thread").len(), 1);
    }

    #[test]
    fn test_retries_run_out() {
        let (url, server) = serve(vec![(503, "down"), (503, "down"), (503, "down")]);
        let err = local_scorer(url, 2).score("ctx\n(a)", "(a)").unwrap_err();
        assert!(
            matches!(err, ModelError::RetriesExhausted { attempts: 3, .. }),
            "{:?}",
            err
        );
        assert_eq!(server.join().expect("server thread").len(), 3);
    }

    #[test]
    fn test_unreachable_server_fails_without_retry() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let mut scorer = local_scorer(format!("http://{}/v1", addr), 8);
        scorer.config.retry_after = Duration::from_secs(60);
        let start = std::time::Instant::now();
        let err = scorer.score("ctx\n(a)", "(a)").unwrap_err();
        assert!(matches!(err, ModelError::Transport(_)), "{:?}", err);
        assert!(start.elapsed() < Duration::from_secs(30));
    }
}
