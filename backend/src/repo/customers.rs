//! Customers and projects

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use shared::{Customer, Pagination, Project};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Debug, FromRow)]
struct CustomerRow {
    id: Uuid,
    name: String,
    phone_number: String,
    firm_name: Option<String>,
    whatsapp_number: Option<String>,
    address: Option<String>,
    contact_person_name: Option<String>,
    contact_person_phone: Option<String>,
    branch_id: Uuid,
    customer_status: String,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ProjectRow {
    customer_id: Uuid,
    project_id: String,
    project_type: String,
    project_category: String,
    status: String,
    initial_remark: Option<String>,
    installed_by: Option<String>,
    completion_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl ProjectRow {
    fn into_project(self) -> AppResult<Project> {
        Ok(Project {
            project_category: self.project_category.parse()?,
            status: self.status.parse()?,
            project_id: self.project_id,
            project_type: self.project_type,
            initial_remark: self.initial_remark,
            installed_by: self.installed_by,
            completion_date: self.completion_date,
            created_at: self.created_at,
        })
    }
}

impl CustomerRow {
    fn into_customer(self, projects: Vec<Project>) -> AppResult<Customer> {
        Ok(Customer {
            customer_status: self.customer_status.parse()?,
            id: self.id,
            name: self.name,
            phone_number: self.phone_number,
            firm_name: self.firm_name,
            whatsapp_number: self.whatsapp_number,
            address: self.address,
            contact_person_name: self.contact_person_name,
            contact_person_phone: self.contact_person_phone,
            branch_id: self.branch_id,
            created_by: self.created_by,
            created_at: self.created_at,
            projects,
        })
    }
}

const CUSTOMER_COLUMNS: &str = "id, name, phone_number, firm_name, whatsapp_number, address, \
     contact_person_name, contact_person_phone, branch_id, customer_status, created_by, created_at";

async fn attach_projects(conn: &mut PgConnection, rows: Vec<CustomerRow>) -> AppResult<Vec<Customer>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let projects = sqlx::query_as::<_, ProjectRow>(
        r#"
        SELECT customer_id, project_id, project_type, project_category, status, initial_remark,
               installed_by, completion_date, created_at
        FROM projects
        WHERE customer_id = ANY($1)
        ORDER BY created_at
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_customer: HashMap<Uuid, Vec<Project>> = HashMap::new();
    for project in projects {
        let customer_id = project.customer_id;
        by_customer
            .entry(customer_id)
            .or_default()
            .push(project.into_project()?);
    }

    rows.into_iter()
        .map(|row| {
            let projects = by_customer.remove(&row.id).unwrap_or_default();
            row.into_customer(projects)
        })
        .collect()
}

pub async fn phone_exists(conn: &mut PgConnection, phone_number: &str) -> AppResult<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM customers WHERE phone_number = $1)")
            .bind(phone_number)
            .fetch_one(&mut *conn)
            .await?;
    Ok(exists)
}

pub async fn find(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<Customer>> {
    let sql = format!("SELECT {} FROM customers WHERE id = $1", CUSTOMER_COLUMNS);
    let row = sqlx::query_as::<_, CustomerRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(attach_projects(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

pub async fn list(
    conn: &mut PgConnection,
    branch_id: Option<Uuid>,
    search: Option<&str>,
    pagination: &Pagination,
) -> AppResult<(Vec<Customer>, u64)> {
    let pattern = search.map(|s| format!("%{}%", s.trim()));
    let sql = format!(
        "SELECT {} FROM customers \
         WHERE ($1::UUID IS NULL OR branch_id = $1) \
           AND ($2::TEXT IS NULL OR name ILIKE $2 OR phone_number ILIKE $2) \
         ORDER BY created_at DESC LIMIT $3 OFFSET $4",
        CUSTOMER_COLUMNS
    );
    let rows = sqlx::query_as::<_, CustomerRow>(&sql)
        .bind(branch_id)
        .bind(&pattern)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&mut *conn)
        .await?;

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM customers
        WHERE ($1::UUID IS NULL OR branch_id = $1)
          AND ($2::TEXT IS NULL OR name ILIKE $2 OR phone_number ILIKE $2)
        "#,
    )
    .bind(branch_id)
    .bind(&pattern)
    .fetch_one(&mut *conn)
    .await?;

    Ok((attach_projects(conn, rows).await?, total as u64))
}

pub async fn insert(conn: &mut PgConnection, customer: &Customer) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO customers (id, name, phone_number, firm_name, whatsapp_number, address,
                               contact_person_name, contact_person_phone, branch_id,
                               customer_status, created_by, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(customer.id)
    .bind(&customer.name)
    .bind(&customer.phone_number)
    .bind(&customer.firm_name)
    .bind(&customer.whatsapp_number)
    .bind(&customer.address)
    .bind(&customer.contact_person_name)
    .bind(&customer.contact_person_phone)
    .bind(customer.branch_id)
    .bind(customer.customer_status.as_str())
    .bind(customer.created_by)
    .bind(customer.created_at)
    .execute(&mut *conn)
    .await?;

    for project in &customer.projects {
        insert_project(conn, customer.id, project).await?;
    }
    Ok(())
}

pub async fn insert_project(conn: &mut PgConnection, customer_id: Uuid, project: &Project) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO projects (id, customer_id, project_id, project_type, project_category, status,
                              initial_remark, installed_by, completion_date, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(customer_id)
    .bind(&project.project_id)
    .bind(&project.project_type)
    .bind(project.project_category.as_str())
    .bind(project.status.as_str())
    .bind(&project.initial_remark)
    .bind(&project.installed_by)
    .bind(project.completion_date)
    .bind(project.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn complete_project(
    conn: &mut PgConnection,
    customer_id: Uuid,
    project_id: &str,
    installed_by: Option<&str>,
    completed_at: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE projects
        SET status = 'completed',
            completion_date = $3,
            installed_by = COALESCE(installed_by, $4)
        WHERE customer_id = $1 AND project_id = $2
        "#,
    )
    .bind(customer_id)
    .bind(project_id)
    .bind(completed_at)
    .bind(installed_by)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
