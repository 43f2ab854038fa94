// src/models/client.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use url::form_urlencoded;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::workflow::{Checklists, Pipeline, Substage, WorkflowState};

// --- ENUMS ---

// Mapeia o CREATE TYPE crm_stage do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "crm_stage", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CrmStage {
    Nouveau,
    AContacter,
    VisitePlanifiee,
    DevisEnvoye,
    Atelier,
    Intervention,
    Termine,
    Perdu,
}

// --- CLIENTE ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: Uuid,
    #[schema(example = 42)]
    pub tracking_id: i32,

    #[schema(example = "Jeanne Martin")]
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,

    // "collecte" = retirada no domicílio, o resto = entrega no atelier
    #[serde(rename = "service_type")]
    #[schema(example = "collecte")]
    pub service_type: Option<String>,

    pub crm_stage: CrmStage,

    // Os campos JSONB saem no formato bruto que o dashboard já consome
    #[sqlx(json)]
    #[serde(rename = "workflow_state")]
    #[schema(value_type = Object)]
    pub workflow_state: WorkflowState,

    #[sqlx(json)]
    #[schema(value_type = Object)]
    pub checklists: Checklists,

    #[serde(rename = "selected_parts")]
    #[schema(value_type = Object)]
    pub selected_parts: Value,

    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// Ex: 42 -> "#0042"
    pub fn tracking_label(&self) -> String {
        format!("#{:04}", self.tracking_id)
    }

    pub fn is_pickup(&self) -> bool {
        self.service_type
            .as_deref()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("collecte"))
    }

    /// Aplica um patch localmente (mesma semântica do UPDATE com COALESCE).
    pub fn apply_patch(&mut self, patch: &ClientPatch) {
        if let Some(checklists) = &patch.checklists {
            self.checklists = checklists.clone();
        }
        if let Some(state) = &patch.workflow_state {
            self.workflow_state = state.clone();
        }
        if let Some(stage) = patch.crm_stage {
            self.crm_stage = stage;
        }
        if let Some(notes) = &patch.notes {
            self.notes = Some(notes.clone());
        }
    }
}

// --- PATCH PARCIAL ---

/// Corpo do `PATCH /api/clients/{id}`: só vão as chaves que mudaram.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClientPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub checklists: Option<Checklists>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub workflow_state: Option<WorkflowState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crm_stage: Option<CrmStage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ClientPatch {
    pub fn is_empty(&self) -> bool {
        self.checklists.is_none()
            && self.workflow_state.is_none()
            && self.crm_stage.is_none()
            && self.notes.is_none()
    }
}

// --- NOVO LEAD (formulário público) ---

#[derive(Debug, Clone)]
pub struct NewClient {
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub service_type: Option<String>,
    pub notes: Option<String>,
}

// --- KANBAN ---

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ContactLinks {
    #[schema(example = "tel:+33612345678")]
    pub tel: Option<String>,
    pub sms: Option<String>,
    pub maps: Option<String>,
}

impl ContactLinks {
    pub fn for_client(client: &Client) -> Self {
        let phone = client
            .phone
            .as_deref()
            .map(|p| p.chars().filter(|c| !c.is_whitespace()).collect::<String>())
            .filter(|p| !p.is_empty());

        let maps = client
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(|address| {
                let query: String = form_urlencoded::byte_serialize(address.as_bytes()).collect();
                format!("https://www.google.com/maps/search/?api=1&query={}", query)
            });

        Self {
            tel: phone.as_ref().map(|p| format!("tel:{}", p)),
            sms: phone.as_ref().map(|p| format!("sms:{}", p)),
            maps,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoardCard {
    pub id: Uuid,
    #[schema(example = "#0042")]
    pub tracking_label: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub pickup: bool,
    pub substage: Substage,
    pub links: ContactLinks,
}

impl BoardCard {
    pub fn new(client: &Client, substage: Substage) -> Self {
        Self {
            id: client.id,
            tracking_label: client.tracking_label(),
            full_name: client.full_name.clone(),
            phone: client.phone.clone(),
            address: client.address.clone(),
            pickup: client.is_pickup(),
            substage,
            links: ContactLinks::for_client(client),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BoardColumn {
    #[schema(example = "reparation")]
    pub key: String,
    pub substage: Substage,
    pub cards: Vec<BoardCard>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct KanbanBoard {
    pub pipeline: Pipeline,
    pub columns: Vec<BoardColumn>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Cliente mínimo para testes da lógica pura.
    pub fn client(stage: CrmStage, workflow_state: Value, checklists: Value) -> Client {
        Client {
            id: Uuid::new_v4(),
            tracking_id: 7,
            full_name: "Jeanne Martin".to_string(),
            email: Some("jeanne@example.com".to_string()),
            phone: Some("06 12 34 56 78".to_string()),
            address: Some("12 rue de la Paix, Paris".to_string()),
            service_type: None,
            crm_stage: stage,
            workflow_state: serde_json::from_value(workflow_state).unwrap(),
            checklists: serde_json::from_value(checklists).unwrap(),
            selected_parts: Value::Array(vec![]),
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
