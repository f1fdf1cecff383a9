//! Customer onboarding, complaints and historical projects

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::numbering::{self, WORK_ORDER_PREFIX};
use shared::{
    ensure_complaint_allowed, normalize_phone_number, validate_phone_number, AuthContext,
    Customer, CustomerStatus, DomainError, PaginatedResponse, Pagination, Project,
    ProjectCategory, Role, WorkOrder,
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::repo::{self, work_orders::WorkOrderFilter};

#[derive(Clone)]
pub struct CustomerService {
    db: PgPool,
}

/// Input for onboarding a customer
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerInput {
    #[validate(length(min = 1, max = 200, message = "Customer name is required"))]
    pub name: String,
    pub phone_number: String,
    pub firm_name: Option<String>,
    pub whatsapp_number: Option<String>,
    pub address: Option<String>,
    pub contact_person_name: Option<String>,
    pub contact_person_phone: Option<String>,
    /// Target branch; ignored for managers, who always create in their own
    pub branch_id: Option<Uuid>,
    #[validate(length(min = 1, message = "Project type is required"))]
    pub project_type: String,
    pub initial_remark: Option<String>,
    #[serde(default)]
    pub is_existing_customer: bool,
    pub installed_by: Option<String>,
    pub completion_date: Option<DateTime<Utc>>,
}

/// Input for a repair complaint on finished work
#[derive(Debug, Deserialize, Validate)]
pub struct AddComplaintInput {
    #[validate(length(min = 1, message = "Project ID is required"))]
    pub existing_project_id: String,
    #[validate(length(min = 1, message = "Complaint remark is required"))]
    pub remark: String,
}

/// Input for recording a project finished before onboarding
#[derive(Debug, Deserialize, Validate)]
pub struct AddOldProjectInput {
    #[validate(length(min = 1, message = "Project type is required"))]
    pub project_type: String,
    pub installed_by: Option<String>,
    pub completion_date: Option<DateTime<Utc>>,
    pub remark: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerQuery {
    pub search: Option<String>,
}

/// A customer together with the order opened for them, if any
#[derive(Debug, Clone, Serialize)]
pub struct Onboarded {
    pub customer: Customer,
    pub work_order: Option<WorkOrder>,
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl CustomerService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn manager_or_admin(ctx: &AuthContext) -> AppResult<()> {
        ctx.require_role(&[Role::Admin, Role::Manager])?;
        Ok(())
    }

    async fn load_customer(&self, ctx: &AuthContext, customer_id: Uuid) -> AppResult<Customer> {
        let mut conn = self.db.acquire().await?;
        let customer = repo::customers::find(&mut conn, customer_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Customer"))?;
        ctx.ensure_branch(customer.branch_id)?;
        Ok(customer)
    }

    /// Creates a customer with a first project.
    ///
    /// New customers get a pending work order for the project; existing ones
    /// are recorded with the project already completed.
    pub async fn create_customer(&self, ctx: &AuthContext, input: CreateCustomerInput) -> AppResult<Onboarded> {
        Self::manager_or_admin(ctx)?;
        input.validate()?;

        validate_phone_number(&input.phone_number).map_err(|m| AppError::validation("phone_number", m))?;
        let phone_number = normalize_phone_number(&input.phone_number);
        let branch_id = match ctx.role {
            Role::Manager => ctx.require_branch()?,
            _ => input
                .branch_id
                .ok_or_else(|| AppError::validation("branch_id", "Branch is required"))?,
        };
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        if repo::customers::phone_exists(&mut tx, &phone_number).await? {
            return Err(DomainError::conflict("A customer with this phone number already exists").into());
        }

        let project_id = numbering::project_id(now);
        let initial_remark = optional(input.initial_remark);
        let (status, project) = if input.is_existing_customer {
            (
                CustomerStatus::Existing,
                Project::completed(
                    project_id,
                    input.project_type.trim().to_string(),
                    optional(input.installed_by),
                    input.completion_date,
                    initial_remark.clone(),
                    now,
                ),
            )
        } else {
            (
                CustomerStatus::New,
                Project::new(project_id, input.project_type.trim().to_string(), initial_remark.clone(), now),
            )
        };

        let customer = Customer {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            phone_number,
            firm_name: optional(input.firm_name),
            whatsapp_number: optional(input.whatsapp_number),
            address: optional(input.address),
            contact_person_name: optional(input.contact_person_name),
            contact_person_phone: optional(input.contact_person_phone),
            branch_id,
            customer_status: status,
            created_by: ctx.user_id,
            created_at: now,
            projects: vec![project],
        };
        repo::customers::insert(&mut tx, &customer).await?;

        let work_order = if input.is_existing_customer {
            None
        } else {
            let order_id = repo::sequences::next_document_number(&mut tx, WORK_ORDER_PREFIX, now).await?;
            let order = WorkOrder::new_pending(
                order_id,
                &customer,
                &customer.projects[0],
                ProjectCategory::NewInstallation,
                initial_remark,
                ctx.user_id,
                now,
            );
            repo::work_orders::insert(&mut tx, &order).await?;
            Some(order)
        };

        tx.commit().await?;

        tracing::info!(
            "Customer {} onboarded in branch {}{}",
            customer.id,
            branch_id,
            work_order
                .as_ref()
                .map(|o| format!(" with order {}", o.order_id))
                .unwrap_or_default()
        );
        Ok(Onboarded { customer, work_order })
    }

    pub async fn list(
        &self,
        ctx: &AuthContext,
        query: CustomerQuery,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Customer>> {
        Self::manager_or_admin(ctx)?;
        let mut conn = self.db.acquire().await?;
        let (customers, total) = repo::customers::list(
            &mut conn,
            ctx.branch_scope(),
            query.search.as_deref().filter(|s| !s.trim().is_empty()),
            &pagination,
        )
        .await?;
        Ok(PaginatedResponse::new(customers, &pagination, total))
    }

    pub async fn get(&self, ctx: &AuthContext, customer_id: Uuid) -> AppResult<Customer> {
        Self::manager_or_admin(ctx)?;
        self.load_customer(ctx, customer_id).await
    }

    /// Opens a repair order on a finished project.
    pub async fn add_complaint(
        &self,
        ctx: &AuthContext,
        customer_id: Uuid,
        input: AddComplaintInput,
    ) -> AppResult<WorkOrder> {
        Self::manager_or_admin(ctx)?;
        input.validate()?;
        let customer = self.load_customer(ctx, customer_id).await?;
        let project = customer.project(input.existing_project_id.trim())?;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        let statuses = repo::work_orders::statuses_for_project(&mut tx, customer.id, &project.project_id).await?;
        ensure_complaint_allowed(project, &statuses)?;

        let order_id = repo::sequences::next_document_number(&mut tx, WORK_ORDER_PREFIX, now).await?;
        let order = WorkOrder::new_pending(
            order_id,
            &customer,
            project,
            ProjectCategory::Repair,
            Some(input.remark.trim().to_string()),
            ctx.user_id,
            now,
        );
        repo::work_orders::insert(&mut tx, &order).await?;

        tx.commit().await?;

        tracing::info!(
            "Complaint order {} raised for project {} of customer {}",
            order.order_id,
            order.project_id,
            customer.id
        );
        Ok(order)
    }

    pub async fn add_old_project(
        &self,
        ctx: &AuthContext,
        customer_id: Uuid,
        input: AddOldProjectInput,
    ) -> AppResult<Project> {
        Self::manager_or_admin(ctx)?;
        input.validate()?;
        let customer = self.load_customer(ctx, customer_id).await?;
        let now = Utc::now();

        let project = Project::completed(
            numbering::project_id(now),
            input.project_type.trim().to_string(),
            optional(input.installed_by),
            input.completion_date,
            optional(input.remark),
            now,
        );

        let mut conn = self.db.acquire().await?;
        repo::customers::insert_project(&mut conn, customer.id, &project).await?;

        tracing::info!("Old project {} recorded for customer {}", project.project_id, customer.id);
        Ok(project)
    }

    /// Orders of one customer, newest first
    pub async fn work_orders(
        &self,
        ctx: &AuthContext,
        customer_id: Uuid,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<repo::work_orders::WorkOrderSummary>> {
        let customer = self.load_customer(ctx, customer_id).await?;
        let mut conn = self.db.acquire().await?;
        let filter = WorkOrderFilter {
            customer_id: Some(customer.id),
            ..WorkOrderFilter::default()
        };
        let (orders, total) = repo::work_orders::list(&mut conn, &filter, &pagination).await?;
        Ok(PaginatedResponse::new(orders, &pagination, total))
    }
}
