//! Strict parser for the roadmap block grammar.
//!
//! Each decision is one delimited block:
//!
//! ````text
//! <!-- DECISION_BLOCK_START -->
//! ID: DEC-001
//! Titre: Harmonise terminal profile
//! Statut: pending
//! Type: file
//! Chemin: profiles/terminal.json
//! Machine Source: m1
//! Machines Cibles: all
//! Créé: 2026-08-06T10:00:00Z
//! Créé par: m1
//! Détails: one-line description
//! Diff:
//! ```
//! ...multi-line payload, verbatim...
//! ```
//! <!-- DECISION_BLOCK_END -->
//! ````
//!
//! Every field is a single `Key: value` line except `Diff:`, whose value is
//! the following fenced section. Post-transition metadata (`Approuvé`,
//! `Rejeté`, `Appliqué`, `Annulé` and their companions) is appended by
//! updates. Unknown keys are a parse error: the file is a database, and
//! silently dropping fields would make round-tripping lossy.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::decision::{AppliedChanges, Decision, DecisionKind, DecisionStatus, Targets};
use crate::error::{Error, Result};

/// Opening delimiter of a decision block.
pub const BLOCK_START: &str = "<!-- DECISION_BLOCK_START -->";
/// Closing delimiter of a decision block.
pub const BLOCK_END: &str = "<!-- DECISION_BLOCK_END -->";

const FENCE: &str = "```";

static FIELD_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^:]+): ?(.*)$").expect("Invalid field line regex"));

/// Parse a full roadmap file into its decisions, in order of appearance.
///
/// Content outside blocks (headings, prose) is ignored.
pub fn parse_roadmap(content: &str) -> Result<Vec<Decision>> {
    let mut decisions = Vec::new();
    let lines: Vec<&str> = content.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].trim() == BLOCK_START {
            let start_line = i + 1;
            let mut end = None;
            for (offset, line) in lines[i + 1..].iter().enumerate() {
                if line.trim() == BLOCK_END {
                    end = Some(i + 1 + offset);
                    break;
                }
            }
            let end = end.ok_or_else(|| {
                Error::parse(start_line, "unterminated decision block".to_string())
            })?;

            decisions.push(parse_block_lines(&lines[i + 1..end], start_line + 1)?);
            i = end + 1;
        } else {
            i += 1;
        }
    }

    Ok(decisions)
}

/// Parse a single block body (the text between the delimiters).
pub fn parse_decision_block(block: &str) -> Result<Decision> {
    let lines: Vec<&str> = block.lines().collect();
    parse_block_lines(&lines, 1)
}

#[derive(Default)]
struct RawFields {
    id: Option<String>,
    title: Option<String>,
    status: Option<DecisionStatus>,
    kind: Option<DecisionKind>,
    path: Option<String>,
    source_machine: Option<String>,
    targets: Option<Targets>,
    created_at: Option<DateTime<Utc>>,
    created_by: Option<String>,
    description: Option<String>,
    approved_at: Option<DateTime<Utc>>,
    approved_by: Option<String>,
    rejected_at: Option<DateTime<Utc>>,
    rejected_by: Option<String>,
    reject_reason: Option<String>,
    applied_at: Option<DateTime<Utc>>,
    applied_by: Option<String>,
    files_modified: Option<Vec<String>>,
    files_created: Option<Vec<String>>,
    files_deleted: Option<Vec<String>>,
    rolled_back_at: Option<DateTime<Utc>>,
    rolled_back_by: Option<String>,
    rollback_reason: Option<String>,
    diff: Option<String>,
}

fn parse_block_lines(lines: &[&str], first_line: usize) -> Result<Decision> {
    let mut fields = RawFields::default();

    let mut i = 0;
    while i < lines.len() {
        let line_no = first_line + i;
        let line = lines[i];

        if line.trim().is_empty() {
            i += 1;
            continue;
        }

        if line.trim_end() == "Diff:" {
            let (diff, consumed) = parse_fenced_payload(&lines[i + 1..], line_no + 1)?;
            fields.diff = Some(diff);
            i += 1 + consumed;
            continue;
        }

        let caps = FIELD_LINE
            .captures(line)
            .ok_or_else(|| Error::parse(line_no, format!("not a `Key: value` line: {line:?}")))?;
        let key = caps.get(1).unwrap().as_str();
        let value = caps.get(2).unwrap().as_str();

        assign_field(&mut fields, key, value, line_no)?;
        i += 1;
    }

    build_decision(fields, first_line)
}

/// Consume a fenced payload following a `Diff:` line. Returns the payload and
/// the number of lines consumed (both fences included).
fn parse_fenced_payload(lines: &[&str], line_no: usize) -> Result<(String, usize)> {
    if lines.first().map(|l| l.trim()) != Some(FENCE) {
        return Err(Error::parse(line_no, "Diff: must be followed by a fence"));
    }

    for (offset, line) in lines[1..].iter().enumerate() {
        if line.trim() == FENCE {
            return Ok((lines[1..1 + offset].join("\n"), offset + 2));
        }
    }

    Err(Error::parse(line_no, "unterminated Diff fence"))
}

fn assign_field(fields: &mut RawFields, key: &str, value: &str, line_no: usize) -> Result<()> {
    let date = |value: &str| -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::parse(line_no, format!("invalid timestamp {value:?}: {e}")))
    };
    let list = |value: &str| -> Vec<String> {
        value
            .split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    };

    match key {
        "ID" => fields.id = Some(value.to_string()),
        "Titre" => fields.title = Some(value.to_string()),
        "Statut" => {
            fields.status = Some(DecisionStatus::parse(value).ok_or_else(|| {
                Error::parse(line_no, format!("unknown status {value:?}"))
            })?);
        }
        "Type" => {
            fields.kind = Some(DecisionKind::parse(value).ok_or_else(|| {
                Error::parse(line_no, format!("unknown decision type {value:?}"))
            })?);
        }
        "Chemin" => fields.path = Some(value.to_string()),
        "Machine Source" => fields.source_machine = Some(value.to_string()),
        "Machines Cibles" => fields.targets = Some(Targets::parse(value)),
        "Créé" => fields.created_at = Some(date(value)?),
        "Créé par" => fields.created_by = Some(value.to_string()),
        "Détails" => fields.description = Some(value.to_string()),
        "Approuvé" => fields.approved_at = Some(date(value)?),
        "Approuvé par" => fields.approved_by = Some(value.to_string()),
        "Rejeté" => fields.rejected_at = Some(date(value)?),
        "Rejeté par" => fields.rejected_by = Some(value.to_string()),
        "Raison rejet" => fields.reject_reason = Some(value.to_string()),
        "Appliqué" => fields.applied_at = Some(date(value)?),
        "Appliqué par" => fields.applied_by = Some(value.to_string()),
        "Fichiers modifiés" => fields.files_modified = Some(list(value)),
        "Fichiers créés" => fields.files_created = Some(list(value)),
        "Fichiers supprimés" => fields.files_deleted = Some(list(value)),
        "Annulé" => fields.rolled_back_at = Some(date(value)?),
        "Annulé par" => fields.rolled_back_by = Some(value.to_string()),
        "Raison annulation" => fields.rollback_reason = Some(value.to_string()),
        _ => {
            return Err(Error::parse(line_no, format!("unknown key {key:?}")));
        }
    }
    Ok(())
}

fn build_decision(fields: RawFields, first_line: usize) -> Result<Decision> {
    let missing =
        |name: &str| Error::parse(first_line, format!("missing required field {name:?}"));

    let changes = if fields.files_modified.is_some()
        || fields.files_created.is_some()
        || fields.files_deleted.is_some()
    {
        Some(AppliedChanges {
            files_modified: fields.files_modified.unwrap_or_default(),
            files_created: fields.files_created.unwrap_or_default(),
            files_deleted: fields.files_deleted.unwrap_or_default(),
        })
    } else {
        None
    };

    Ok(Decision {
        id: fields.id.ok_or_else(|| missing("ID"))?,
        title: fields.title.ok_or_else(|| missing("Titre"))?,
        status: fields.status.ok_or_else(|| missing("Statut"))?,
        kind: fields.kind.ok_or_else(|| missing("Type"))?,
        path: fields.path,
        source_machine: fields.source_machine.ok_or_else(|| missing("Machine Source"))?,
        targets: fields.targets.ok_or_else(|| missing("Machines Cibles"))?,
        created_at: fields.created_at.ok_or_else(|| missing("Créé"))?,
        created_by: fields.created_by.ok_or_else(|| missing("Créé par"))?,
        description: fields.description,
        approved_at: fields.approved_at,
        approved_by: fields.approved_by,
        rejected_at: fields.rejected_at,
        rejected_by: fields.rejected_by,
        reject_reason: fields.reject_reason,
        applied_at: fields.applied_at,
        applied_by: fields.applied_by,
        changes,
        rolled_back_at: fields.rolled_back_at,
        rolled_back_by: fields.rolled_back_by,
        rollback_reason: fields.rollback_reason,
        diff: fields.diff,
    })
}
