pub mod http_server;

use anyhow::Context;
use dlq_core::work::{self, WorkContext};
use dlq_core::{Target, Work, WorkError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Work that issues a plain HTTP GET for the target and fails on a non-2xx status.
pub fn http_get_work() -> impl Work {
    work::from_fn(|target: Target, _ctx: WorkContext| async move { fetch(&target.url).await })
}

async fn fetch(raw: &str) -> Result<(), WorkError> {
    let url = url::Url::parse(raw).context("parse target url")?;
    let host = url.host_str().context("target url has no host")?.to_string();
    let port = url.port_or_known_default().unwrap_or(80);

    let mut stream = TcpStream::connect((host.as_str(), port))
        .await
        .with_context(|| format!("connect {host}:{port}"))?;
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        url.path(),
        host
    );
    stream.write_all(request.as_bytes()).await.context("send request")?;
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.context("read response")?;

    let head = String::from_utf8_lossy(&response);
    let code: u16 = head
        .split_whitespace()
        .nth(1)
        .and_then(|c| c.parse().ok())
        .context("malformed status line")?;
    if (200..300).contains(&code) {
        Ok(())
    } else {
        Err(WorkError::msg(format!("HTTP {code}")))
    }
}
