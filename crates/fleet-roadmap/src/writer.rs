//! Renderer for the roadmap block grammar.
//!
//! The inverse of [`crate::grammar`]: rendering a parsed decision and
//! re-parsing it yields the same model. Optional fields are omitted
//! entirely, never rendered with empty values (except the three change
//! lists, which appear together whenever an apply has been recorded).

use chrono::{DateTime, SecondsFormat, Utc};

use crate::decision::Decision;
use crate::grammar::{BLOCK_END, BLOCK_START};

fn render_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Render one decision as a delimited block.
pub fn render_decision_block(decision: &Decision) -> String {
    let mut lines = Vec::new();
    lines.push(BLOCK_START.to_string());
    lines.push(format!("ID: {}", decision.id));
    lines.push(format!("Titre: {}", decision.title));
    lines.push(format!("Statut: {}", decision.status.as_str()));
    lines.push(format!("Type: {}", decision.kind.as_str()));
    if let Some(path) = &decision.path {
        lines.push(format!("Chemin: {path}"));
    }
    lines.push(format!("Machine Source: {}", decision.source_machine));
    lines.push(format!("Machines Cibles: {}", decision.targets.render()));
    lines.push(format!("Créé: {}", render_date(&decision.created_at)));
    lines.push(format!("Créé par: {}", decision.created_by));
    if let Some(description) = &decision.description {
        lines.push(format!("Détails: {description}"));
    }

    if let Some(at) = &decision.approved_at {
        lines.push(format!("Approuvé: {}", render_date(at)));
    }
    if let Some(by) = &decision.approved_by {
        lines.push(format!("Approuvé par: {by}"));
    }

    if let Some(at) = &decision.rejected_at {
        lines.push(format!("Rejeté: {}", render_date(at)));
    }
    if let Some(by) = &decision.rejected_by {
        lines.push(format!("Rejeté par: {by}"));
    }
    if let Some(reason) = &decision.reject_reason {
        lines.push(format!("Raison rejet: {reason}"));
    }

    if let Some(at) = &decision.applied_at {
        lines.push(format!("Appliqué: {}", render_date(at)));
    }
    if let Some(by) = &decision.applied_by {
        lines.push(format!("Appliqué par: {by}"));
    }
    if let Some(changes) = &decision.changes {
        lines.push(format!(
            "Fichiers modifiés: {}",
            changes.files_modified.join(", ")
        ));
        lines.push(format!(
            "Fichiers créés: {}",
            changes.files_created.join(", ")
        ));
        lines.push(format!(
            "Fichiers supprimés: {}",
            changes.files_deleted.join(", ")
        ));
    }

    if let Some(at) = &decision.rolled_back_at {
        lines.push(format!("Annulé: {}", render_date(at)));
    }
    if let Some(by) = &decision.rolled_back_by {
        lines.push(format!("Annulé par: {by}"));
    }
    if let Some(reason) = &decision.rollback_reason {
        lines.push(format!("Raison annulation: {reason}"));
    }

    if let Some(diff) = &decision.diff {
        lines.push("Diff:".to_string());
        lines.push("```".to_string());
        lines.push(diff.clone());
        lines.push("```".to_string());
    }

    lines.push(BLOCK_END.to_string());
    lines.join("\n")
}

/// Render the full roadmap file: a fixed header plus one block per decision.
pub fn render_roadmap(decisions: &[Decision]) -> String {
    let mut out = String::from(
        "# Sync Roadmap\n\n\
         Machine configuration decisions, in proposal order. This file is a\n\
         database view maintained by the decision engine; do not edit blocks\n\
         by hand.\n",
    );

    for decision in decisions {
        out.push('\n');
        out.push_str(&render_decision_block(decision));
        out.push('\n');
    }

    out
}
