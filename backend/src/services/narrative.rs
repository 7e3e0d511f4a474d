//! Narrative service
//!
//! Builds prompts from forecast and report data and relays the narrative
//! service's output to clients. Streaming goes through [`forward_stream`],
//! which owns the upstream token stream on a separate task:
//!
//! - the channel holds one frame, so at most one token is in flight
//! - a keep-alive tick fires independently of token arrival
//! - once the receiver is dropped the task stops, dropping the upstream
//!   stream and processing nothing further

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;
use shared::{ForecastReport, WeeklyReport};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::error::{AppError, AppResult};
use crate::external::{NarrativeClient, NarrativeRequest, TokenStream};

const FORECAST_INSTRUCTIONS: &str = "You are a forecasting assistant for a pharmaceutical company. \
You receive per-batch usage forecasts computed with exponential smoothing. Each entry has the batch \
number, product name and strength, the smoothed per-event usage in `forecast`, current and initial \
stock, reorder threshold, supplier lead time in days and `estimated_stockout_days`, which is null \
when no depletion is expected. Write plain text only, with no markdown, bullet symbols or bold text. \
Use at most 300 words. Organize the answer under exactly these three headings, each on its own line: \
KEY OBSERVATIONS:, PREDICTIVE OUTLOOK:, ACTIONABLE RECOMMENDATIONS:. Always refer to batches by batch \
number, product name and strength. Compare the stockout estimate with the supplier lead time and the \
reorder threshold when recommending reorders.";

const WEEKLY_INSTRUCTIONS: &str = "You are an inventory analyst for a pharmaceutical company. You \
receive a weekly inventory report built from two snapshots: batches added, batches removed, stock \
consumed per batch, total logged usage per batch for the period and batches expiring soon. Write \
plain text only, with no markdown, bullet symbols or bold text. Use at most 300 words. Organize the \
answer under exactly these three headings, each on its own line: WEEKLY CHANGES:, USAGE TRENDS:, \
EXPIRY RISKS:. Always refer to batches by batch number and product name. If a section has nothing \
to report, say so in one sentence.";

/// One unit of a relayed narrative stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Token(String),
    Heartbeat,
    Done,
    Error(String),
}

/// Relay `tokens` through a bounded channel with a keep-alive tick.
///
/// The stream ends with exactly one `Done` or `Error` frame unless the
/// receiver goes away first.
pub fn forward_stream(mut tokens: TokenStream, heartbeat: Duration) -> mpsc::Receiver<StreamFrame> {
    let (tx, rx) = mpsc::channel(1);

    tokio::spawn(async move {
        let mut tick = interval_at(Instant::now() + heartbeat, heartbeat);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut relayed = 0usize;

        loop {
            let frame = tokio::select! {
                biased;

                _ = tx.closed() => {
                    tracing::debug!(relayed, "narrative stream cancelled by client");
                    return;
                }
                _ = tick.tick() => StreamFrame::Heartbeat,
                next = tokens.next() => match next {
                    Some(Ok(token)) => {
                        relayed += 1;
                        StreamFrame::Token(token)
                    }
                    Some(Err(err)) => {
                        tracing::error!(relayed, error = %err, "narrative stream failed");
                        let _ = tx.send(StreamFrame::Error(err.public_message())).await;
                        return;
                    }
                    None => {
                        tracing::debug!(relayed, "narrative stream complete");
                        let _ = tx.send(StreamFrame::Done).await;
                        return;
                    }
                },
            };

            if tx.send(frame).await.is_err() {
                tracing::debug!(relayed, "narrative stream cancelled by client");
                return;
            }
        }
    });

    rx
}

/// A stream holding a single `Error` frame, for failures before any token
pub fn failed_stream(err: AppError) -> mpsc::Receiver<StreamFrame> {
    tracing::error!(error = %err, "narrative stream could not start");
    let (tx, rx) = mpsc::channel(1);
    // capacity 1 and no other sender, so this cannot fail
    let _ = tx.try_send(StreamFrame::Error(err.public_message()));
    rx
}

fn compact_json<T: Serialize + ?Sized>(data: &T) -> AppResult<String> {
    serde_json::to_string(data)
        .map_err(|e| AppError::Internal(format!("Failed to serialize prompt data: {}", e)))
}

/// Prompt asking for an analysis of the forecast results
pub fn forecast_request(report: &ForecastReport) -> AppResult<NarrativeRequest> {
    Ok(NarrativeRequest {
        system: FORECAST_INSTRUCTIONS.to_string(),
        user: format!(
            "Analyze these usage forecasts (smoothing factor {}):\n{}",
            report.alpha,
            compact_json(&report.forecasts)?
        ),
    })
}

/// Prompt asking for a summary of the weekly report
pub fn weekly_report_request(report: &WeeklyReport) -> AppResult<NarrativeRequest> {
    Ok(NarrativeRequest {
        system: WEEKLY_INSTRUCTIONS.to_string(),
        user: format!(
            "Summarize this weekly inventory report for {} to {}:\n{}",
            report.period.start,
            report.period.end,
            compact_json(report)?
        ),
    })
}

/// Narrative service
#[derive(Clone)]
pub struct NarrativeService {
    client: Arc<dyn NarrativeClient>,
    heartbeat: Duration,
}

impl NarrativeService {
    /// Create a new NarrativeService instance
    pub fn new(client: Arc<dyn NarrativeClient>, heartbeat: Duration) -> Self {
        Self { client, heartbeat }
    }

    async fn relay(&self, request: AppResult<NarrativeRequest>) -> mpsc::Receiver<StreamFrame> {
        let opened = match request {
            Ok(request) => self.client.stream(request).await,
            Err(err) => Err(err),
        };
        match opened {
            Ok(tokens) => forward_stream(tokens, self.heartbeat),
            Err(err) => failed_stream(err),
        }
    }

    /// Stream an analysis of the forecasts
    pub async fn stream_forecast(&self, report: &ForecastReport) -> mpsc::Receiver<StreamFrame> {
        self.relay(forecast_request(report)).await
    }

    /// Stream a summary of the weekly report
    pub async fn stream_weekly_report(&self, report: &WeeklyReport) -> mpsc::Receiver<StreamFrame> {
        self.relay(weekly_report_request(report)).await
    }

    /// Single-completion analysis of the forecasts
    pub async fn forecast_summary(&self, report: &ForecastReport) -> AppResult<String> {
        self.client.complete(forecast_request(report)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures_util::stream;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn tokens(items: Vec<AppResult<String>>) -> TokenStream {
        Box::pin(stream::iter(items))
    }

    async fn drain(mut rx: mpsc::Receiver<StreamFrame>) -> Vec<StreamFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = timeout(WAIT, rx.recv()).await.unwrap() {
            frames.push(frame);
        }
        frames
    }

    fn without_heartbeats(frames: Vec<StreamFrame>) -> Vec<StreamFrame> {
        frames
            .into_iter()
            .filter(|f| *f != StreamFrame::Heartbeat)
            .collect()
    }

    #[tokio::test]
    async fn test_forwards_tokens_then_done() {
        let rx = forward_stream(
            tokens(vec![Ok("KEY ".to_string()), Ok("OBSERVATIONS:".to_string())]),
            Duration::from_secs(60),
        );
        assert_eq!(
            without_heartbeats(drain(rx).await),
            vec![
                StreamFrame::Token("KEY ".to_string()),
                StreamFrame::Token("OBSERVATIONS:".to_string()),
                StreamFrame::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_upstream_error_ends_stream() {
        let rx = forward_stream(
            tokens(vec![
                Ok("partial".to_string()),
                Err(AppError::UpstreamFailure("connection reset".to_string())),
                Ok("never".to_string()),
            ]),
            Duration::from_secs(60),
        );
        let frames = without_heartbeats(drain(rx).await);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], StreamFrame::Token("partial".to_string()));
        assert!(matches!(&frames[1], StreamFrame::Error(msg) if msg.contains("connection reset")));
    }

    #[tokio::test]
    async fn test_heartbeat_fires_while_upstream_is_silent() {
        let mut rx = forward_stream(Box::pin(stream::pending::<AppResult<String>>()), Duration::from_millis(20));
        let frame = timeout(WAIT, rx.recv()).await.unwrap();
        assert_eq!(frame, Some(StreamFrame::Heartbeat));
    }

    #[tokio::test]
    async fn test_dropping_receiver_drops_upstream() {
        // The guard lives inside the upstream stream; its receiver resolves
        // once the forwarding task has dropped that stream.
        let (guard, dropped) = oneshot::channel::<()>();
        let upstream = stream::unfold(guard, |guard| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Some((Ok::<_, AppError>("token".to_string()), guard))
        });

        let mut rx = forward_stream(Box::pin(upstream), Duration::from_secs(60));
        assert_eq!(
            timeout(WAIT, rx.recv()).await.unwrap(),
            Some(StreamFrame::Token("token".to_string()))
        );
        drop(rx);

        assert!(timeout(WAIT, dropped).await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_failed_stream_holds_single_error() {
        let frames = drain(failed_stream(AppError::UpstreamFailure("no key".to_string()))).await;
        assert_eq!(frames.len(), 1);
        assert!(matches!(&frames[0], StreamFrame::Error(msg) if msg.contains("no key")));
    }

    struct ScriptedClient;

    #[async_trait]
    impl NarrativeClient for ScriptedClient {
        async fn complete(&self, request: NarrativeRequest) -> AppResult<String> {
            Ok(format!("{} chars of data", request.user.len()))
        }

        async fn stream(&self, _request: NarrativeRequest) -> AppResult<TokenStream> {
            Err(AppError::UpstreamFailure("service unavailable".to_string()))
        }
    }

    fn empty_report() -> ForecastReport {
        ForecastReport {
            alpha: 0.4,
            forecasts: Vec::new(),
            failures: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_open_failure_becomes_error_frame() {
        let service = NarrativeService::new(Arc::new(ScriptedClient), Duration::from_secs(60));
        let frames = drain(service.stream_forecast(&empty_report()).await).await;
        assert!(matches!(
            frames.as_slice(),
            [StreamFrame::Error(msg)] if msg.contains("service unavailable")
        ));
    }

    #[tokio::test]
    async fn test_forecast_summary_uses_single_completion() {
        let service = NarrativeService::new(Arc::new(ScriptedClient), Duration::from_secs(60));
        let text = tokio_test::assert_ok!(service.forecast_summary(&empty_report()).await);
        assert!(text.ends_with("chars of data"));
    }

    #[test]
    fn test_forecast_prompt_embeds_compact_json() {
        let request = forecast_request(&empty_report()).unwrap();
        assert!(request.system.contains("KEY OBSERVATIONS:"));
        assert!(request.system.contains("300 words"));
        assert!(request.user.ends_with("\n[]"));
        assert!(request.user.contains("0.4"));
    }
}
