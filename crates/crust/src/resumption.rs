//! Original-coordinator recovery (§4.9). Run by a process that starts up
//! believing it is the designated coordinator but finds a temporary
//! coordinator already active among a configured set of candidate peers.

use std::time::Duration;

use bedrock_core::http_client::ShardHttpClient;
use bedrock_core::model::{ProcessId, Role};
use bedrock_core::wire::{CoordinatorHandoffData, HealthResponse, ResumeRequest};
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_ATTEMPTS: u32 = 60;

pub struct ResumptionHandler {
    http: ShardHttpClient,
}

impl Default for ResumptionHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResumptionHandler {
    pub fn new() -> Self {
        Self {
            http: ShardHttpClient::default(),
        }
    }

    /// Polls each candidate URL for an active temporary coordinator and,
    /// once found, requests a handoff. Gives up and returns `None` after
    /// `MAX_ATTEMPTS` rounds with nothing reachable — the caller should
    /// then fall back to starting fresh as the authoritative coordinator.
    pub async fn try_resume(
        &self,
        self_process_id: &ProcessId,
        self_url: &str,
        candidate_urls: &[String],
    ) -> Option<(String, CoordinatorHandoffData)> {
        if candidate_urls.is_empty() {
            return None;
        }

        for attempt in 0..MAX_ATTEMPTS {
            for candidate in candidate_urls {
                match self.probe(candidate).await {
                    Some(health) if health.role != Role::Coordinator => {
                        info!(candidate, role = ?health.role, "found active temporary coordinator, requesting handoff");
                        if let Some(handoff) = self.request_handoff(candidate, self_process_id, self_url).await {
                            return Some((candidate.clone(), handoff));
                        }
                    }
                    Some(_) => {
                        // An authoritative coordinator is already running; nothing to resume.
                        return None;
                    }
                    None => {}
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
            if attempt == MAX_ATTEMPTS - 1 {
                warn!("exhausted resumption attempts, no temporary coordinator found");
            }
        }

        None
    }

    async fn probe(&self, url: &str) -> Option<HealthResponse> {
        self.http.get::<HealthResponse>(&format!("{url}/health")).await.ok()
    }

    async fn request_handoff(
        &self,
        temp_url: &str,
        self_process_id: &ProcessId,
        self_url: &str,
    ) -> Option<CoordinatorHandoffData> {
        let req = ResumeRequest {
            original_coordinator_id: self_process_id.clone(),
            original_coordinator_url: self_url.to_string(),
            timestamp: chrono::Utc::now(),
        };

        match self
            .http
            .post::<_, CoordinatorHandoffData>(&format!("{temp_url}/coordinator/resume"), &req)
            .await
        {
            Ok(handoff) => Some(handoff),
            Err(err) => {
                warn!(temp_url, error = %err, "handoff request failed, will retry");
                None
            }
        }
    }
}
