//! Single-shot HTTP liveness probe.
//!
//! Success is defined purely by the HTTP status code; the response body
//! is never inspected.

use std::time::Duration;

use tracing::debug;

/// Result of one liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The status path answered with a success status.
    Healthy,
    /// The status path answered with a non-success status.
    Unhealthy,
    /// The probe could not complete (connection error or timeout).
    Failed,
}

/// Probe `http://{address}{path}` with an overall timeout.
pub async fn http_probe(address: &str, path: &str, timeout: Duration) -> ProbeOutcome {
    let uri = format!("http://{address}{path}");

    match tokio::time::timeout(timeout, probe_once(address, &uri)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            debug!(%uri, "probe timed out");
            ProbeOutcome::Failed
        }
    }
}

async fn probe_once(address: &str, uri: &str) -> ProbeOutcome {
    let stream = match tokio::net::TcpStream::connect(address).await {
        Ok(stream) => stream,
        Err(e) => {
            debug!(error = %e, %uri, "probe connection failed");
            return ProbeOutcome::Failed;
        }
    };

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
        Ok(pair) => pair,
        Err(e) => {
            debug!(error = %e, %uri, "probe handshake failed");
            return ProbeOutcome::Failed;
        }
    };

    // Drive the connection in the background.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let request = match http::Request::builder()
        .method("GET")
        .uri(uri)
        .header("host", address)
        .header("user-agent", "relay-health/0.1")
        .body(http_body_util::Empty::<bytes::Bytes>::new())
    {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, %uri, "probe request build failed");
            return ProbeOutcome::Failed;
        }
    };

    match sender.send_request(request).await {
        Ok(response) => {
            if response.status().is_success() {
                ProbeOutcome::Healthy
            } else {
                debug!(status = %response.status(), %uri, "probe returned non-success");
                ProbeOutcome::Unhealthy
            }
        }
        Err(e) => {
            debug!(error = %e, %uri, "probe request failed");
            ProbeOutcome::Failed
        }
    }
}
