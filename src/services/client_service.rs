// src/services/client_service.rs

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{Acquire, Executor, Postgres, Transaction};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::ClientRepository,
    models::{
        client::{BoardCard, BoardColumn, Client, ClientPatch, KanbanBoard, NewClient},
        workflow::{Checklists, Pipeline},
    },
    services::{
        notification_service::{NotificationService, Notifier},
        workflow::{self, StageTransition},
    },
};

/// Resultado do handler de checklist: o cliente salvo e a transição disparada.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChecklistChangeOutcome {
    pub client: Client,
    pub transition: Option<StageTransition>,
}

#[derive(Clone)]
pub struct ClientService {
    repo: ClientRepository,
    notifications: NotificationService,
}

impl ClientService {
    pub fn new(repo: ClientRepository, notifications: NotificationService) -> Self {
        Self { repo, notifications }
    }

    // =========================================================================
    //  1. LEITURA / ESCRITA SIMPLES
    // =========================================================================

    pub async fn list_clients<'e, E>(&self, executor: E) -> Result<Vec<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.list_clients(executor).await
    }

    pub async fn get_client<'e, E>(&self, executor: E, id: Uuid) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .find_by_id(executor, id)
            .await?
            .ok_or(AppError::ClientNotFound(id))
    }

    pub async fn create_booking<'e, E>(&self, executor: E, new: NewClient) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = self.repo.create_client(executor, &new).await?;
        tracing::info!(client_id = %client.id, tracking = %client.tracking_label(), "📝 Novo lead registrado");
        Ok(client)
    }

    pub async fn update_client<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        patch: &ClientPatch,
    ) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if patch.is_empty() {
            return Err(AppError::EmptyPatch);
        }

        self.repo
            .update_client(executor, id, patch)
            .await?
            .ok_or(AppError::ClientNotFound(id))
    }

    // =========================================================================
    //  2. KANBAN
    // =========================================================================

    pub async fn workshop_board<'e, E>(&self, executor: E, pipeline: Pipeline) -> Result<KanbanBoard, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let clients = self.repo.list_by_stage(executor, pipeline.crm_stage()).await?;

        let visible = clients.into_iter().filter(|c| workflow::is_visible(c, pipeline));
        let grouped = workflow::group_by_substage(pipeline, visible);

        let columns = grouped
            .into_iter()
            .map(|(substage, clients)| BoardColumn {
                key: substage.label(pipeline).to_string(),
                substage,
                cards: clients
                    .iter()
                    .map(|placed| BoardCard::new(&placed.client, placed.substage))
                    .collect(),
            })
            .collect();

        Ok(KanbanBoard { pipeline, columns })
    }

    // =========================================================================
    //  3. MUDANÇA DE CHECKLIST
    // =========================================================================

    /// Salva os checklists, aplica no máximo uma transição de etapa e, se houve
    /// transição, dispara o e-mail correspondente sem esperar por ele.
    pub async fn on_checklist_change<'e, E>(
        &self,
        executor: E,
        pipeline: Pipeline,
        client_id: Uuid,
        checklists: Checklists,
    ) -> Result<ChecklistChangeOutcome, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let store = PgChecklistTx {
            repo: self.repo.clone(),
            tx: executor.begin().await?,
        };

        apply_checklist_change(store, &self.notifications, pipeline, client_id, checklists).await
    }
}

/// Unidade de trabalho do handler de checklist.
#[async_trait]
pub trait ChecklistStore: Send {
    async fn load(&mut self, client_id: Uuid) -> Result<Option<Client>, AppError>;
    async fn save(&mut self, client_id: Uuid, patch: &ClientPatch) -> Result<Option<Client>, AppError>;
    async fn commit(self) -> Result<(), AppError>;
}

/// Implementação sobre uma transação do Postgres.
struct PgChecklistTx<'c> {
    repo: ClientRepository,
    tx: Transaction<'c, Postgres>,
}

#[async_trait]
impl<'c> ChecklistStore for PgChecklistTx<'c> {
    async fn load(&mut self, client_id: Uuid) -> Result<Option<Client>, AppError> {
        self.repo.find_by_id(&mut *self.tx, client_id).await
    }

    async fn save(&mut self, client_id: Uuid, patch: &ClientPatch) -> Result<Option<Client>, AppError> {
        self.repo.update_client(&mut *self.tx, client_id, patch).await
    }

    async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}

/// Carrega, decide, persiste e confirma; só então notifica.
/// Se qualquer passo falhar, nenhuma notificação sai.
pub async fn apply_checklist_change<S: ChecklistStore>(
    mut store: S,
    notifier: &dyn Notifier,
    pipeline: Pipeline,
    client_id: Uuid,
    checklists: Checklists,
) -> Result<ChecklistChangeOutcome, AppError> {
    // 1. Estado atual
    let current = store
        .load(client_id)
        .await?
        .ok_or(AppError::ClientNotFound(client_id))?;

    // 2. Decide a transição e monta o patch mínimo
    let plan = workflow::plan_checklist_change(pipeline, Some(&current.workflow_state), checklists);

    // 3. Persiste (sem retry; falhou, o operador tenta de novo)
    let client = store
        .save(client_id, &plan.patch)
        .await?
        .ok_or(AppError::ClientNotFound(client_id))?;

    store.commit().await?;

    // 4. Pós-commit: e-mail best-effort
    if let Some(transition) = plan.transition {
        tracing::info!(
            %client_id,
            tracking = %client.tracking_label(),
            ?pipeline,
            ?transition,
            "🔧 Transição de etapa registrada"
        );
        notifier.notify(transition.notification(), client_id);
    }

    Ok(ChecklistChangeOutcome {
        client,
        transition: plan.transition,
    })
}
