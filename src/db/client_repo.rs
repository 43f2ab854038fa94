// src/db/client_repo.rs

use sqlx::{types::Json, Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::client::{Client, ClientPatch, CrmStage, NewClient},
};

// Colunas explícitas, na ordem do FromRow
const CLIENT_COLUMNS: &str = r#"
    id, tracking_id, full_name, email, phone, address, service_type,
    crm_stage, workflow_state, checklists, selected_parts, notes,
    created_at, updated_at
"#;

#[derive(Clone)]
pub struct ClientRepository {
    pool: PgPool,
}

impl ClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Todos os clientes, do mais recente para o mais antigo
    pub async fn list_clients<'e, E>(&self, executor: E) -> Result<Vec<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {} FROM clients ORDER BY created_at DESC", CLIENT_COLUMNS);

        let clients = sqlx::query_as::<_, Client>(&sql)
            .fetch_all(executor)
            .await?;

        Ok(clients)
    }

    /// Clientes de um estágio do CRM, na ordem de chegada (usado pelo kanban)
    pub async fn list_by_stage<'e, E>(
        &self,
        executor: E,
        stage: CrmStage,
    ) -> Result<Vec<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {} FROM clients WHERE crm_stage = $1 ORDER BY tracking_id ASC",
            CLIENT_COLUMNS
        );

        let clients = sqlx::query_as::<_, Client>(&sql)
            .bind(stage)
            .fetch_all(executor)
            .await?;

        Ok(clients)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {} FROM clients WHERE id = $1", CLIENT_COLUMNS);

        let client = sqlx::query_as::<_, Client>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(client)
    }

    /// Novo lead vindo do formulário público
    pub async fn create_client<'e, E>(&self, executor: E, new: &NewClient) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO clients (full_name, email, phone, address, service_type, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            CLIENT_COLUMNS
        );

        let client = sqlx::query_as::<_, Client>(&sql)
            .bind(&new.full_name)
            .bind(new.email.as_deref())
            .bind(new.phone.as_deref())
            .bind(new.address.as_deref())
            .bind(new.service_type.as_deref())
            .bind(new.notes.as_deref())
            .fetch_one(executor)
            .await?;

        Ok(client)
    }

    /// Atualização parcial: chaves ausentes no patch mantêm o valor atual.
    /// Sem controle de versão: a última escrita vence.
    pub async fn update_client<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        patch: &ClientPatch,
    ) -> Result<Option<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE clients SET
                checklists     = COALESCE($2, checklists),
                workflow_state = COALESCE($3, workflow_state),
                crm_stage      = COALESCE($4, crm_stage),
                notes          = COALESCE($5, notes),
                updated_at     = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CLIENT_COLUMNS
        );

        let client = sqlx::query_as::<_, Client>(&sql)
            .bind(id)
            .bind(patch.checklists.as_ref().map(Json))
            .bind(patch.workflow_state.as_ref().map(Json))
            .bind(patch.crm_stage)
            .bind(patch.notes.as_deref())
            .fetch_optional(executor)
            .await?;

        Ok(client)
    }
}
