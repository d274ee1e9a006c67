use anyhow::{Result, anyhow};
use std::time::{Duration, Instant};

use super::types::ProbeResult;

/// Reachability check against a monitored URL
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    /// Probe the target; an `Err` means no answer within the bound
    async fn probe(&self, target: &str) -> Result<ProbeResult>;
}

/// HTTP HEAD prober with a bounded request timeout
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, target: &str) -> Result<ProbeResult> {
        let start = Instant::now();

        // Any HTTP answer counts as reachable; status codes are not judged here
        let response = self
            .client
            .head(target)
            .send()
            .await
            .map_err(|e| anyhow!("HTTP request failed: {}", e))?;

        let latency = start.elapsed().as_millis() as u64;
        tracing::debug!("HEAD {} answered {} in {} ms", target, response.status(), latency);

        Ok(ProbeResult::succeeded(latency))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_probe_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await;
        });

        let prober = HttpProber::new(5).unwrap();
        let result = prober.probe(&format!("http://{addr}")).await.unwrap();

        assert!(result.success);
        assert!(result.elapsed_ms >= 0);
    }

    #[tokio::test]
    async fn test_probe_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Accept and hold the connection without ever answering
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let prober = HttpProber::new(1).unwrap();
        let started = Instant::now();
        let result = tokio::time::timeout(Duration::from_secs(5), prober.probe(&format!("http://{addr}")))
            .await
            .expect("probe must give up on its own");

        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_probe_refused_connection() {
        // Bind then drop to get a port nothing listens on
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let prober = HttpProber::new(2).unwrap();
        assert!(prober.probe(&format!("http://{addr}")).await.is_err());
    }
}
