//! Customers and their projects

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::WorkOrderStatus;
use crate::error::{DomainError, DomainResult};

string_enum! {
    pub enum CustomerStatus {
        New => "New",
        Existing => "Existing",
        Billing => "Billing",
    }
}

string_enum! {
    pub enum ProjectCategory {
        NewInstallation => "New Installation",
        Repair => "Repair",
    }
}

string_enum! {
    pub enum ProjectStatus {
        Pending => "pending",
        InProgress => "in-progress",
        Completed => "completed",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub project_id: String,
    pub project_type: String,
    pub project_category: ProjectCategory,
    pub status: ProjectStatus,
    pub initial_remark: Option<String>,
    pub installed_by: Option<String>,
    pub completion_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(
        project_id: String,
        project_type: String,
        initial_remark: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            project_id,
            project_type,
            project_category: ProjectCategory::NewInstallation,
            status: ProjectStatus::Pending,
            initial_remark,
            installed_by: None,
            completion_date: None,
            created_at: now,
        }
    }

    /// A project that finished before the customer was entered into the
    /// system
    pub fn completed(
        project_id: String,
        project_type: String,
        installed_by: Option<String>,
        completion_date: Option<DateTime<Utc>>,
        remark: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            project_id,
            project_type,
            project_category: ProjectCategory::NewInstallation,
            status: ProjectStatus::Completed,
            initial_remark: remark,
            installed_by,
            completion_date: completion_date.or(Some(now)),
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub phone_number: String,
    pub firm_name: Option<String>,
    pub whatsapp_number: Option<String>,
    pub address: Option<String>,
    pub contact_person_name: Option<String>,
    pub contact_person_phone: Option<String>,
    pub branch_id: Uuid,
    pub customer_status: CustomerStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub projects: Vec<Project>,
}

impl Customer {
    pub fn project(&self, project_id: &str) -> DomainResult<&Project> {
        self.projects
            .iter()
            .find(|p| p.project_id == project_id)
            .ok_or_else(|| DomainError::not_found("Project"))
    }
}

/// A complaint can only be raised against finished work.
pub fn ensure_complaint_allowed(
    project: &Project,
    order_statuses: &[WorkOrderStatus],
) -> DomainResult<()> {
    let finished = project.status == ProjectStatus::Completed
        || order_statuses.contains(&WorkOrderStatus::Completed);
    if finished {
        Ok(())
    } else {
        Err(DomainError::validation(
            "Complaints can only be registered for completed projects",
        ))
    }
}
