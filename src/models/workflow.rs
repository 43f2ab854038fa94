// src/models/workflow.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::models::client::CrmStage;

// --- CHAVES FIXAS ---

pub const DIAGNOSTIC_DONE: &str = "diagnostic_done";
pub const DIAGNOSTIC_CHECKLIST: &str = "diagnostic";
/// Item "diagnostic complet" do checklist de diagnóstico.
pub const DIAGNOSTIC_COMPLETE_ITEM: &str = "d4";

// Os três nomes históricos para "orçamento aceito"
const DEVIS_ACCEPTED: &str = "devis_accepted";
const DEVIS_RESPONSE: &str = "devis_response";
const DEVIS_VALIDATED: &str = "devis_validated";

/// JSON `null` vira o valor vazio do tipo (linhas antigas gravaram `null`).
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =========================================================================
//  WORKFLOW STATE (o "saco de flags" do cliente)
// =========================================================================

/// Mapa aberto de flags gravado em `clients.workflow_state`.
///
/// Chaves desconhecidas são preservadas: o backend só acrescenta flags,
/// nunca remove nem volta um `true` para `false`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WorkflowState(Map<String, Value>);

impl<'de> Deserialize<'de> for WorkflowState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        null_as_default(deserializer).map(WorkflowState)
    }
}

impl WorkflowState {
    /// `true` apenas se a flag existe e é literalmente o booleano `true`.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(Value::Bool(true)))
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn raise(&mut self, key: &str) {
        self.0.insert(key.to_string(), Value::Bool(true));
    }
}

// =========================================================================
//  ORÇAMENTO (normalização dos sinônimos)
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuoteDecision {
    Pending,
    Accepted,
    Refused,
}

impl QuoteDecision {
    /// Único ponto do código que conhece os três formatos legados.
    pub fn from_state(state: &WorkflowState) -> Self {
        let response = state.text(DEVIS_RESPONSE);

        if state.flag(DEVIS_ACCEPTED) || response == Some("accepted") || state.flag(DEVIS_VALIDATED) {
            return QuoteDecision::Accepted;
        }

        match response {
            Some("refused") | Some("rejected") => QuoteDecision::Refused,
            _ => QuoteDecision::Pending,
        }
    }

    pub fn is_accepted(self) -> bool {
        self == QuoteDecision::Accepted
    }
}

// =========================================================================
//  CHECKLISTS
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    // Campos extras vindos do frontend são mantidos como estão
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChecklistItem {
    pub fn is_checked(&self) -> bool {
        self.checked.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checklist {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<ChecklistItem>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Checklist {
    pub fn is_checked(&self, item_id: &str) -> bool {
        self.items.iter().any(|item| item.id == item_id && item.is_checked())
    }

    /// Um checklist vazio nunca conta como concluído.
    pub fn all_checked(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(ChecklistItem::is_checked)
    }
}

/// Grupo de checklist -> checklist (`diagnostic`, `reparation`, `controle`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Checklists(BTreeMap<String, Checklist>);

impl<'de> Deserialize<'de> for Checklists {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        null_as_default(deserializer).map(Checklists)
    }
}

impl Checklists {
    pub fn group(&self, name: &str) -> Option<&Checklist> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Checklist)> {
        self.0.iter()
    }

    pub fn is_item_checked(&self, group: &str, item_id: &str) -> bool {
        self.group(group).is_some_and(|c| c.is_checked(item_id))
    }

    pub fn is_group_complete(&self, group: &str) -> bool {
        self.group(group).is_some_and(Checklist::all_checked)
    }
}

// =========================================================================
//  PIPELINES (Atelier x Interventions)
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairSignal {
    /// Um item específico marca a etapa como concluída.
    Item(&'static str),
    /// Todos os itens do grupo precisam estar marcados.
    AllChecked,
}

/// Nomes de flags, grupos e rótulos específicos de cada pipeline.
#[derive(Debug)]
pub struct PipelineFlags {
    pub repair_done: &'static str,
    pub control_done: &'static str,
    pub repair_checklist: &'static str,
    pub control_checklist: &'static str,
    pub repair_signal: RepairSignal,
    pub repair_label: &'static str,
    pub control_label: &'static str,
}

const ATELIER_FLAGS: PipelineFlags = PipelineFlags {
    repair_done: "reparation_done",
    control_done: "controle_done",
    repair_checklist: "reparation",
    control_checklist: "controle",
    repair_signal: RepairSignal::Item("r3"),
    repair_label: "reparation",
    control_label: "controle",
};

const INTERVENTION_FLAGS: PipelineFlags = PipelineFlags {
    repair_done: "travaux_done",
    control_done: "validation_done",
    repair_checklist: "travaux",
    control_checklist: "validation",
    repair_signal: RepairSignal::AllChecked,
    repair_label: "travaux",
    control_label: "validation",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Pipeline {
    Atelier,
    Intervention,
}

impl Pipeline {
    pub fn crm_stage(self) -> CrmStage {
        match self {
            Pipeline::Atelier => CrmStage::Atelier,
            Pipeline::Intervention => CrmStage::Intervention,
        }
    }

    pub fn flags(self) -> &'static PipelineFlags {
        match self {
            Pipeline::Atelier => &ATELIER_FLAGS,
            Pipeline::Intervention => &INTERVENTION_FLAGS,
        }
    }

    pub fn for_stage(stage: CrmStage) -> Option<Self> {
        match stage {
            CrmStage::Atelier => Some(Pipeline::Atelier),
            CrmStage::Intervention => Some(Pipeline::Intervention),
            _ => None,
        }
    }
}

// =========================================================================
//  FATOS NORMALIZADOS + SUBSTAGE
// =========================================================================

/// Visão tipada do `workflow_state` para um pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowFacts {
    pub diagnostic_done: bool,
    pub quote: QuoteDecision,
    pub repair_done: bool,
    pub control_done: bool,
}

impl WorkflowFacts {
    pub fn read(pipeline: Pipeline, state: Option<&WorkflowState>) -> Self {
        let Some(state) = state else {
            return Self {
                diagnostic_done: false,
                quote: QuoteDecision::Pending,
                repair_done: false,
                control_done: false,
            };
        };

        let flags = pipeline.flags();
        Self {
            diagnostic_done: state.flag(DIAGNOSTIC_DONE),
            quote: QuoteDecision::from_state(state),
            repair_done: state.flag(flags.repair_done),
            control_done: state.flag(flags.control_done),
        }
    }

    /// Diagnóstico concluído OU orçamento já aceito.
    pub fn diagnostic_settled(&self) -> bool {
        self.diagnostic_done || self.quote.is_accepted()
    }
}

/// Posição derivada (nunca persistida) do cliente dentro do pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Substage {
    Diagnostic,
    Repair,
    Control,
    Done,
}

impl Substage {
    /// Colunas do kanban, na ordem de exibição.
    pub const COLUMNS: [Substage; 3] = [Substage::Diagnostic, Substage::Repair, Substage::Control];

    pub fn label(self, pipeline: Pipeline) -> &'static str {
        let flags = pipeline.flags();
        match self {
            Substage::Diagnostic => "diagnostic",
            Substage::Repair => flags.repair_label,
            Substage::Control => flags.control_label,
            Substage::Done => "done",
        }
    }
}
