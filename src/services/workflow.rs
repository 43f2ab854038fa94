// src/services/workflow.rs
//
// Regras puras do pipeline de oficina (Atelier e Interventions).
// Nada aqui toca banco ou rede.

use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    models::{
        client::{Client, ClientPatch, CrmStage},
        workflow::{
            Checklists, Pipeline, RepairSignal, Substage, WorkflowFacts, WorkflowState,
            DIAGNOSTIC_CHECKLIST, DIAGNOSTIC_COMPLETE_ITEM, DIAGNOSTIC_DONE,
        },
    },
    services::notification_service::NotificationKind,
};

// =========================================================================
//  1. CLASSIFICADOR
// =========================================================================

type Rule = (fn(&WorkflowFacts) -> bool, Substage);

fn control_done(f: &WorkflowFacts) -> bool {
    f.control_done
}

fn repair_done(f: &WorkflowFacts) -> bool {
    f.repair_done
}

fn quote_accepted(f: &WorkflowFacts) -> bool {
    f.quote.is_accepted()
}

fn diagnostic_done(f: &WorkflowFacts) -> bool {
    f.diagnostic_done
}

/// Avaliadas de cima para baixo; a primeira que casar vence.
/// A flag terminal vem antes de tudo, e o orçamento aceito antes do diagnóstico.
const RULES: [Rule; 4] = [
    (control_done, Substage::Done),
    (repair_done, Substage::Control),
    (quote_accepted, Substage::Repair),
    (diagnostic_done, Substage::Repair),
];

pub fn classify(pipeline: Pipeline, state: Option<&WorkflowState>) -> Substage {
    let facts = WorkflowFacts::read(pipeline, state);

    RULES
        .iter()
        .find(|(matches, _)| matches(&facts))
        .map(|(_, substage)| *substage)
        .unwrap_or(Substage::Diagnostic)
}

// =========================================================================
//  2. FILTRO DE VISIBILIDADE
// =========================================================================

pub fn is_visible(client: &Client, pipeline: Pipeline) -> bool {
    if client.crm_stage != pipeline.crm_stage() {
        return false;
    }

    let facts = WorkflowFacts::read(pipeline, Some(&client.workflow_state));

    if facts.control_done {
        return false;
    }

    // Orçamento aceito passa por cima da regra do d4
    if facts.quote.is_accepted() {
        return true;
    }

    // Diagnóstico terminado aguardando decisão comercial: fora do quadro
    if client
        .checklists
        .is_item_checked(DIAGNOSTIC_CHECKLIST, DIAGNOSTIC_COMPLETE_ITEM)
    {
        return false;
    }

    true
}

// =========================================================================
//  3. AGREGADOR DO KANBAN
// =========================================================================

/// Cliente já classificado, pronto para virar cartão.
#[derive(Debug, Clone)]
pub struct PlacedClient {
    pub client: Client,
    pub substage: Substage,
}

pub fn group_by_substage<I>(pipeline: Pipeline, clients: I) -> BTreeMap<Substage, Vec<PlacedClient>>
where
    I: IntoIterator<Item = Client>,
{
    let mut columns: BTreeMap<Substage, Vec<PlacedClient>> =
        Substage::COLUMNS.iter().map(|s| (*s, Vec::new())).collect();

    for client in clients {
        let substage = classify(pipeline, Some(&client.workflow_state));
        let bucket = if columns.contains_key(&substage) {
            substage
        } else {
            Substage::Diagnostic
        };
        columns.entry(bucket).or_default().push(PlacedClient { client, substage });
    }

    columns
}

// =========================================================================
//  4. PLANEJADOR DE MUDANÇA DE CHECKLIST
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StageTransition {
    DiagnosticComplete,
    RepairComplete,
    ControlComplete,
}

impl StageTransition {
    pub fn flag(self, pipeline: Pipeline) -> &'static str {
        match self {
            StageTransition::DiagnosticComplete => DIAGNOSTIC_DONE,
            StageTransition::RepairComplete => pipeline.flags().repair_done,
            StageTransition::ControlComplete => pipeline.flags().control_done,
        }
    }

    pub fn notification(self) -> NotificationKind {
        match self {
            StageTransition::DiagnosticComplete => NotificationKind::DiagnosticComplete,
            StageTransition::RepairComplete => NotificationKind::RepairComplete,
            StageTransition::ControlComplete => NotificationKind::VehicleReady,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == StageTransition::ControlComplete
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChecklistPlan {
    pub patch: ClientPatch,
    pub transition: Option<StageTransition>,
}

fn repair_signalled(pipeline: Pipeline, checklists: &Checklists) -> bool {
    let flags = pipeline.flags();
    match flags.repair_signal {
        RepairSignal::Item(item_id) => checklists.is_item_checked(flags.repair_checklist, item_id),
        RepairSignal::AllChecked => checklists.is_group_complete(flags.repair_checklist),
    }
}

/// Decide qual transição (no máximo uma) os checklists novos disparam e
/// monta o patch mínimo a ser persistido.
pub fn plan_checklist_change(
    pipeline: Pipeline,
    current: Option<&WorkflowState>,
    checklists: Checklists,
) -> ChecklistPlan {
    let facts = WorkflowFacts::read(pipeline, current);
    let flags = pipeline.flags();

    let transition = if !facts.diagnostic_settled()
        && checklists.is_item_checked(DIAGNOSTIC_CHECKLIST, DIAGNOSTIC_COMPLETE_ITEM)
    {
        Some(StageTransition::DiagnosticComplete)
    } else if !facts.repair_done && repair_signalled(pipeline, &checklists) {
        Some(StageTransition::RepairComplete)
    } else if !facts.control_done && checklists.is_group_complete(flags.control_checklist) {
        Some(StageTransition::ControlComplete)
    } else {
        None
    };

    let original = current.cloned().unwrap_or_default();
    let mut next = original.clone();
    if let Some(t) = transition {
        next.raise(t.flag(pipeline));
    }

    let patch = ClientPatch {
        checklists: Some(checklists),
        workflow_state: (next != original).then_some(next),
        crm_stage: transition
            .filter(|t| t.is_terminal())
            .map(|_| CrmStage::Termine),
        notes: None,
    };

    ChecklistPlan { patch, transition }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::client::fixtures::client;
    use serde_json::{json, Value};

    fn state(value: Value) -> WorkflowState {
        serde_json::from_value(value).unwrap()
    }

    fn lists(value: Value) -> Checklists {
        serde_json::from_value(value).unwrap()
    }

    // --- classificador ---

    #[test]
    fn terminal_flag_wins_over_everything() {
        let s = state(json!({
            "controle_done": true,
            "reparation_done": true,
            "devis_accepted": true,
            "diagnostic_done": true
        }));
        assert_eq!(classify(Pipeline::Atelier, Some(&s)), Substage::Done);

        let s = state(json!({"validation_done": true, "diagnostic_done": false}));
        assert_eq!(classify(Pipeline::Intervention, Some(&s)), Substage::Done);
    }

    #[test]
    fn each_quote_synonym_moves_to_repair() {
        for raw in [
            json!({"devis_accepted": true}),
            json!({"devis_response": "accepted"}),
            json!({"devis_validated": true}),
        ] {
            assert_eq!(classify(Pipeline::Atelier, Some(&state(raw))), Substage::Repair);
        }
    }

    #[test]
    fn missing_or_empty_state_is_diagnostic() {
        assert_eq!(classify(Pipeline::Atelier, None), Substage::Diagnostic);
        assert_eq!(classify(Pipeline::Atelier, Some(&WorkflowState::default())), Substage::Diagnostic);
    }

    #[test]
    fn null_state_from_the_database_is_diagnostic() {
        let c = client(CrmStage::Atelier, Value::Null, Value::Null);
        assert_eq!(classify(Pipeline::Atelier, Some(&c.workflow_state)), Substage::Diagnostic);
        assert!(is_visible(&c, Pipeline::Atelier));

        let board = group_by_substage(Pipeline::Atelier, vec![c]);
        assert_eq!(board[&Substage::Diagnostic].len(), 1);
    }

    #[test]
    fn repair_done_moves_to_control() {
        let s = state(json!({"reparation_done": true}));
        assert_eq!(classify(Pipeline::Atelier, Some(&s)), Substage::Control);
        let s = state(json!({"travaux_done": true}));
        assert_eq!(classify(Pipeline::Intervention, Some(&s)), Substage::Control);
    }

    #[test]
    fn diagnostic_done_alone_moves_to_repair() {
        let s = state(json!({"diagnostic_done": true}));
        assert_eq!(classify(Pipeline::Intervention, Some(&s)), Substage::Repair);
    }

    // --- visibilidade ---

    #[test]
    fn finished_client_is_hidden() {
        let c = client(CrmStage::Atelier, json!({"controle_done": true}), json!({}));
        assert!(!is_visible(&c, Pipeline::Atelier));
    }

    #[test]
    fn finished_intervention_is_hidden() {
        let c = client(CrmStage::Intervention, json!({"validation_done": true}), json!({}));
        assert!(!is_visible(&c, Pipeline::Intervention));

        // controle_done é a flag do atelier, não encerra uma intervenção
        let c = client(CrmStage::Intervention, json!({"controle_done": true}), json!({}));
        assert!(is_visible(&c, Pipeline::Intervention));
    }

    #[test]
    fn wrong_stage_is_hidden() {
        let c = client(CrmStage::Intervention, json!({}), json!({}));
        assert!(!is_visible(&c, Pipeline::Atelier));
        assert!(is_visible(&c, Pipeline::Intervention));
    }

    #[test]
    fn accepted_quote_overrides_diagnostic_hiding() {
        let c = client(
            CrmStage::Atelier,
            json!({"devis_accepted": true}),
            json!({"diagnostic": {"items": [{"id": "d4", "checked": true}]}}),
        );
        assert!(is_visible(&c, Pipeline::Atelier));
    }

    #[test]
    fn finished_diagnostic_awaiting_quote_is_hidden() {
        let c = client(
            CrmStage::Atelier,
            json!({"diagnostic_done": true}),
            json!({"diagnostic": {"items": [{"id": "d4", "checked": true}]}}),
        );
        assert!(!is_visible(&c, Pipeline::Atelier));

        let c = client(
            CrmStage::Atelier,
            json!({}),
            json!({"diagnostic": {"items": [{"id": "d4", "checked": false}]}}),
        );
        assert!(is_visible(&c, Pipeline::Atelier));
    }

    // --- agregador ---

    #[test]
    fn empty_input_yields_all_columns_empty() {
        let board = group_by_substage(Pipeline::Atelier, Vec::new());
        assert_eq!(board.len(), Substage::COLUMNS.len());
        for column in Substage::COLUMNS {
            assert!(board[&column].is_empty());
        }
    }

    #[test]
    fn every_client_lands_in_exactly_one_bucket_in_order() {
        let clients = vec![
            client(CrmStage::Atelier, json!({}), json!({})),
            client(CrmStage::Atelier, json!({"diagnostic_done": true}), json!({})),
            client(CrmStage::Atelier, json!({"reparation_done": true}), json!({})),
            client(CrmStage::Atelier, json!({"devis_response": "accepted"}), json!({})),
            client(CrmStage::Atelier, json!({"controle_done": true}), json!({})),
        ];
        let ids: Vec<_> = clients.iter().map(|c| c.id).collect();

        let board = group_by_substage(Pipeline::Atelier, clients);

        let total: usize = board.values().map(Vec::len).sum();
        assert_eq!(total, ids.len());

        let repair: Vec<_> = board[&Substage::Repair].iter().map(|p| p.client.id).collect();
        assert_eq!(repair, vec![ids[1], ids[3]]);
        assert_eq!(board[&Substage::Control][0].client.id, ids[2]);

        // "done" não é coluna: cai no diagnóstico, mas o cartão guarda a etapa real
        let diagnostic: Vec<_> = board[&Substage::Diagnostic].iter().map(|p| (p.client.id, p.substage)).collect();
        assert_eq!(diagnostic, vec![(ids[0], Substage::Diagnostic), (ids[4], Substage::Done)]);
    }

    // --- planejador ---

    #[test]
    fn checking_d4_marks_diagnostic_done_without_stage_change() {
        let plan = plan_checklist_change(
            Pipeline::Atelier,
            Some(&WorkflowState::default()),
            lists(json!({"diagnostic": {"items": [{"id": "d4", "checked": true}]}})),
        );

        assert_eq!(plan.transition, Some(StageTransition::DiagnosticComplete));
        let body = serde_json::to_value(&plan.patch).unwrap();
        assert_eq!(body["workflow_state"]["diagnostic_done"], json!(true));
        assert!(body.get("crm_stage").is_none());
        assert!(body.get("checklists").is_some());
    }

    #[test]
    fn repeated_repair_signal_is_idempotent() {
        let current = state(json!({"diagnostic_done": true, "reparation_done": true}));
        let plan = plan_checklist_change(
            Pipeline::Atelier,
            Some(&current),
            lists(json!({
                "diagnostic": {"items": [{"id": "d4", "checked": true}]},
                "reparation": {"items": [{"id": "r3", "checked": true}]}
            })),
        );

        assert_eq!(plan.transition, None);
        assert!(plan.patch.workflow_state.is_none());
        assert!(plan.patch.crm_stage.is_none());
        assert!(plan.patch.checklists.is_some());
    }

    #[test]
    fn accepted_quote_absorbs_diagnostic_transition() {
        let current = state(json!({"devis_validated": true}));
        let plan = plan_checklist_change(
            Pipeline::Atelier,
            Some(&current),
            lists(json!({"diagnostic": {"items": [{"id": "d4", "checked": true}]}})),
        );
        assert_eq!(plan.transition, None);
        assert!(plan.patch.workflow_state.is_none());
    }

    #[test]
    fn intervention_repair_needs_every_item() {
        let current = state(json!({"diagnostic_done": true}));

        let partial = plan_checklist_change(
            Pipeline::Intervention,
            Some(&current),
            lists(json!({"travaux": {"items": [
                {"id": "t1", "checked": true},
                {"id": "t2", "checked": false}
            ]}})),
        );
        assert_eq!(partial.transition, None);

        let full = plan_checklist_change(
            Pipeline::Intervention,
            Some(&current),
            lists(json!({"travaux": {"items": [
                {"id": "t1", "checked": true},
                {"id": "t2", "checked": true}
            ]}})),
        );
        assert_eq!(full.transition, Some(StageTransition::RepairComplete));
        let next = full.patch.workflow_state.unwrap();
        assert!(next.flag("travaux_done"));
        assert!(next.flag("diagnostic_done"));
    }

    #[test]
    fn at_most_one_transition_per_change() {
        let plan = plan_checklist_change(
            Pipeline::Atelier,
            None,
            lists(json!({
                "diagnostic": {"items": [{"id": "d4", "checked": true}]},
                "reparation": {"items": [{"id": "r3", "checked": true}]},
                "controle": {"items": [{"id": "c1", "checked": true}]}
            })),
        );
        assert_eq!(plan.transition, Some(StageTransition::DiagnosticComplete));
        let next = plan.patch.workflow_state.unwrap();
        assert!(!next.flag("reparation_done"));
        assert!(!next.flag("controle_done"));
    }

    #[test]
    fn unknown_flags_survive_the_patch() {
        let current = state(json!({"legacy_marker": "x"}));
        let plan = plan_checklist_change(
            Pipeline::Atelier,
            Some(&current),
            lists(json!({"diagnostic": {"items": [{"id": "d4", "checked": true}]}})),
        );
        let next = serde_json::to_value(plan.patch.workflow_state.unwrap()).unwrap();
        assert_eq!(next, json!({"legacy_marker": "x", "diagnostic_done": true}));
    }

    #[test]
    fn full_atelier_lifecycle_reaches_termine() {
        let mut c = client(CrmStage::Atelier, json!({}), json!({}));
        assert_eq!(classify(Pipeline::Atelier, Some(&c.workflow_state)), Substage::Diagnostic);

        let steps = [
            (
                json!({"diagnostic": {"items": [{"id": "d4", "checked": true}]}}),
                StageTransition::DiagnosticComplete,
                Substage::Repair,
            ),
            (
                json!({
                    "diagnostic": {"items": [{"id": "d4", "checked": true}]},
                    "reparation": {"items": [{"id": "r1", "checked": false}, {"id": "r3", "checked": true}]}
                }),
                StageTransition::RepairComplete,
                Substage::Control,
            ),
            (
                json!({
                    "diagnostic": {"items": [{"id": "d4", "checked": true}]},
                    "reparation": {"items": [{"id": "r1", "checked": false}, {"id": "r3", "checked": true}]},
                    "controle": {"items": [{"id": "c1", "checked": true}, {"id": "c2", "checked": true}]}
                }),
                StageTransition::ControlComplete,
                Substage::Done,
            ),
        ];

        let mut last_patch = ClientPatch::default();
        for (checklists, expected_transition, expected_substage) in steps {
            let plan = plan_checklist_change(Pipeline::Atelier, Some(&c.workflow_state), lists(checklists));
            assert_eq!(plan.transition, Some(expected_transition));
            c.apply_patch(&plan.patch);
            assert_eq!(classify(Pipeline::Atelier, Some(&c.workflow_state)), expected_substage);
            last_patch = plan.patch;
        }

        assert_eq!(last_patch.crm_stage, Some(CrmStage::Termine));
        assert_eq!(c.crm_stage, CrmStage::Termine);
        assert!(!is_visible(&c, Pipeline::Atelier));
    }

    #[test]
    fn full_intervention_lifecycle_reaches_termine() {
        let mut c = client(CrmStage::Intervention, json!({}), json!({}));
        let diagnostic = json!({"items": [{"id": "d4", "checked": true}]});
        let travaux = json!({"items": [{"id": "t1", "checked": true}, {"id": "t2", "checked": true}]});

        let steps = [
            (
                json!({"diagnostic": diagnostic}),
                StageTransition::DiagnosticComplete,
                Substage::Repair,
            ),
            (
                json!({"diagnostic": diagnostic, "travaux": travaux}),
                StageTransition::RepairComplete,
                Substage::Control,
            ),
            (
                json!({
                    "diagnostic": diagnostic,
                    "travaux": travaux,
                    "validation": {"items": [{"id": "v1", "checked": true}, {"id": "v2", "checked": true}]}
                }),
                StageTransition::ControlComplete,
                Substage::Done,
            ),
        ];

        for (checklists, expected_transition, expected_substage) in steps {
            let plan = plan_checklist_change(Pipeline::Intervention, Some(&c.workflow_state), lists(checklists));
            assert_eq!(plan.transition, Some(expected_transition));
            assert_eq!(plan.patch.crm_stage.is_some(), expected_transition.is_terminal());
            c.apply_patch(&plan.patch);
            assert_eq!(classify(Pipeline::Intervention, Some(&c.workflow_state)), expected_substage);
        }

        assert!(c.workflow_state.flag("travaux_done"));
        assert!(c.workflow_state.flag("validation_done"));
        assert!(!c.workflow_state.flag("controle_done"));
        assert_eq!(c.crm_stage, CrmStage::Termine);
        assert!(!is_visible(&c, Pipeline::Intervention));
    }

    #[test]
    fn transitions_map_to_notifications() {
        assert_eq!(
            StageTransition::DiagnosticComplete.notification(),
            NotificationKind::DiagnosticComplete
        );
        assert_eq!(StageTransition::ControlComplete.notification(), NotificationKind::VehicleReady);
        assert_eq!(StageTransition::RepairComplete.flag(Pipeline::Intervention), "travaux_done");
    }
}
