use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role value a user account must carry to be eligible for verification work.
pub const VOLUNTEER_ROLE: &str = "volunteer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Pending,
    Verified,
    Rejected,
    Scheduled,
    Completed,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 5] = [
        Self::Pending,
        Self::Verified,
        Self::Rejected,
        Self::Scheduled,
        Self::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Verified => "VERIFIED",
            Self::Rejected => "REJECTED",
            Self::Scheduled => "SCHEDULED",
            Self::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| format!("unknown report status: {value}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub status: ReportStatus,
    pub assigned_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub report_id: String,
    pub volunteer_id: String,
    pub status: String,
    pub created_at: String,
}

/// Durable view of a volunteer account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volunteer {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub capacity: Option<u32>,
}

impl Volunteer {
    pub fn is_eligible(&self) -> bool {
        self.role == VOLUNTEER_ROLE
    }
}

/// One row of the ranking structure. Never authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadEntry {
    pub volunteer_id: String,
    pub score: u32,
    pub capacity: u32,
    #[serde(default)]
    pub reports: Vec<String>,
}

/// Closed set of orchestration outcomes. Callers match on this rather than
/// inferring success from the absence of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentOutcome {
    Assigned,
    AlreadyAssigned,
    NotPending,
    NoVolunteers,
    PartialFailure,
    ReportNotFound,
}

impl AssignmentOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::AlreadyAssigned => "already_assigned",
            Self::NotPending => "not_pending",
            Self::NoVolunteers => "no_volunteers",
            Self::PartialFailure => "partial_failure",
            Self::ReportNotFound => "report_not_found",
        }
    }

    /// `NoVolunteers` and `PartialFailure` may succeed on a later attempt.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::NoVolunteers | Self::PartialFailure)
    }
}

impl fmt::Display for AssignmentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentResult {
    pub report_id: String,
    pub outcome: AssignmentOutcome,
    pub assigned_ids: Vec<String>,
    /// Candidates dropped by validation because the ranking structure
    /// referenced ids that are missing or ineligible in the durable store.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub drifted_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AssignmentResult {
    pub fn new(report_id: &str, outcome: AssignmentOutcome) -> Self {
        Self {
            report_id: report_id.to_string(),
            outcome,
            assigned_ids: Vec::new(),
            drifted_ids: Vec::new(),
            detail: None,
        }
    }

    pub fn with_ids(mut self, ids: Vec<String>) -> Self {
        self.assigned_ids = ids;
        self
    }

    pub fn with_drift(mut self, ids: Vec<String>) -> Self {
        self.drifted_ids = ids;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_status_parses_its_own_labels() {
        for status in ReportStatus::ALL {
            assert_eq!(status.as_str().parse::<ReportStatus>(), Ok(status));
        }
        assert!("pending".parse::<ReportStatus>().is_err());
    }

    #[test]
    fn only_volunteer_role_is_eligible() {
        let mut user = Volunteer {
            id: "u-1".to_string(),
            email: "u1@example.org".to_string(),
            name: "U One".to_string(),
            role: "citizen".to_string(),
            capacity: None,
        };
        assert!(!user.is_eligible());
        user.role = VOLUNTEER_ROLE.to_string();
        assert!(user.is_eligible());
    }

    #[test]
    fn outcome_serializes_snake_case() {
        let result = AssignmentResult::new("r-1", AssignmentOutcome::AlreadyAssigned);
        let json = serde_json::to_value(&result).expect("result should serialize");
        assert_eq!(json["outcome"], "already_assigned");
        assert!(json.get("drifted_ids").is_none());
    }
}
