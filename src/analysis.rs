// src/analysis.rs
// Pending-analysis correlation: prompt ids handed out now, responses matched later

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AnalysisError;
use crate::report::ReportStore;

/// The only analysis backend that works: a human pastes the response back in.
pub const MANUAL_ENDPOINT: &str = "manual";

/// Process-wide analysis id -> prompt map, shared by every monitor.
#[derive(Debug, Default)]
pub struct PendingPrompts {
    prompts: RwLock<HashMap<String, String>>,
}

impl PendingPrompts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `prompt` under a fresh UUID and returns it.
    pub fn insert(&self, prompt: String) -> String {
        let mut prompts = self.prompts.write();
        let mut id = Uuid::new_v4().to_string();
        while prompts.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }
        prompts.insert(id.clone(), prompt);
        id
    }

    pub fn get(&self, analysis_id: &str) -> Option<String> {
        self.prompts.read().get(analysis_id).cloned()
    }

    pub fn take(&self, analysis_id: &str) -> Option<String> {
        self.prompts.write().remove(analysis_id)
    }

    pub fn len(&self) -> usize {
        self.prompts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub report_id: String,
    /// False when no prompt was waiting under the submitted id.
    pub had_pending: bool,
}

#[derive(Debug)]
pub struct AnalysisService {
    endpoint: String,
    pending: PendingPrompts,
    reports: ReportStore,
}

impl AnalysisService {
    pub fn new(endpoint: impl Into<String>, reports: ReportStore) -> Self {
        Self {
            endpoint: endpoint.into(),
            pending: PendingPrompts::new(),
            reports,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn reports(&self) -> &ReportStore {
        &self.reports
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Registers a prompt for manual analysis. Non-manual backends fail before
    /// anything is stored.
    pub fn issue(&self, prompt: String) -> Result<String, AnalysisError> {
        if self.endpoint != MANUAL_ENDPOINT {
            return Err(AnalysisError::UnsupportedEndpoint(self.endpoint.clone()));
        }
        let analysis_id = self.pending.insert(prompt);
        info!(analysis_id = %analysis_id, "📝 [ANALYSIS] Stored pending prompt (manual mode)");
        Ok(analysis_id)
    }

    pub fn pending_prompt(&self, analysis_id: &str) -> Option<String> {
        self.pending.get(analysis_id)
    }

    /// Persists `response` as a new report and drops the pending prompt.
    /// Unknown ids are accepted; `had_pending` tells the caller which case it was.
    pub async fn resolve(&self, analysis_id: &str, response: &str) -> Result<Resolution, AnalysisError> {
        let report_id = Uuid::new_v4().to_string();
        self.reports.save(&report_id, response).await?;

        let had_pending = self.pending.take(analysis_id).is_some();
        if had_pending {
            info!(analysis_id, report_id = %report_id, "✅ [ANALYSIS] Resolved pending analysis");
        } else {
            warn!(analysis_id, report_id = %report_id, "⚠️ [ANALYSIS] Response submitted for unknown analysis id");
        }

        Ok(Resolution {
            report_id,
            had_pending,
        })
    }
}
