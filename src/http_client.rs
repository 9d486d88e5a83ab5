use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use once_cell::sync::OnceCell;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::USER_AGENT;

use crate::config::Endpoint;

const REQUEST_TIMEOUT_SECS: u64 = 30;

static CLIENT: OnceCell<Client> = OnceCell::new();

pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

/// GET `endpoint` and return the body, failing on any non-success status.
/// Query values are encoded here, never by the caller.
pub fn fetch_text(
    client: &Client,
    endpoint: &Endpoint,
    extra_headers: &[(&str, &str)],
) -> Result<String> {
    let req = with_headers(client.get(&endpoint.base), extra_headers).query(&endpoint.query);
    send_text(req)
}

fn with_headers(mut req: RequestBuilder, extra_headers: &[(&str, &str)]) -> RequestBuilder {
    req = req.header(USER_AGENT, "Mozilla/5.0");
    for (name, value) in extra_headers {
        req = req.header(*name, *value);
    }
    req
}

fn send_text(req: RequestBuilder) -> Result<String> {
    let resp = req.send().context("request failed")?;
    let status = resp.status();
    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow!("http {}: {}", status, truncate(&body, 200)));
    }
    Ok(body)
}

fn truncate(raw: &str, max: usize) -> &str {
    match raw.char_indices().nth(max) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}
