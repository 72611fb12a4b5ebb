//! JSON persistence of visibility rules.
//!
//! ## Current schema (version 2)
//!
//! ```text
//! {
//!   "version": 2,
//!   "mode": "expression",
//!   "logicMode": "ALL" | "ANY" | "CUSTOM",
//!   "logicExpression": string | null,
//!   "conditions": [
//!     { "id": "1", "type": "picklist", "op": "IN",
//!       "field": "Status", "value": "A", "values": ["A"] },
//!     { "id": "2", "type": "recordType", "op": "IN",
//!       "recordTypeId": "...", "recordTypeIds": ["..."],
//!       "recordTypeName": "..." }
//!   ]
//! }
//! ```
//!
//! Two older shapes are still read:
//!
//! - **Multi-value conditions**: the same layout minus `version`/`mode`,
//!   where a condition may carry a `values`/`recordTypeIds` array with
//!   operator `IN`. Each such condition is expanded into one `EQ` condition
//!   per value with freshly minted ids, and the logic expression is rewritten
//!   token-by-token to match.
//! - **Nested groups**: `{"logic": "AND"|"OR", "groups": [{"logic": ...,
//!   "conditions": [{"field": ..., "values": [...]}]}]}`. Groups flatten into
//!   a single condition list plus a `CUSTOM` expression.
//!
//! The shape is sniffed once at the load boundary (`groups` key present →
//! nested groups; otherwise the flat layout, with `version` informational)
//! and never re-examined afterwards.
//!
//! Saving re-encodes every in-memory `EQ` condition as `op: "IN"` with a
//! singleton `values`/`recordTypeIds` array next to the singular field, which
//! is the shape pre-existing consumers of the blob expect; loading reverses
//! the expansion. `NEQ` is written as-is with the singular field only so it
//! survives the load-time `IN` inference. Loading never fails: malformed
//! blobs degrade to an empty rule with a logged warning.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::token::tokenize;
use crate::types::{CompareOp, Condition, LogicMode, Rule};
use crate::validate::validate_expression;

const FORMAT_VERSION: u32 = 2;
const MODE_EXPRESSION: &str = "expression";
const KIND_PICKLIST: &str = "picklist";
const KIND_RECORD_TYPE: &str = "recordType";

// ---------------------------------------------------------------------------
// Stored type hierarchy
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    logic_mode: Option<String>,
    #[serde(default)]
    logic_expression: Option<String>,
    #[serde(default)]
    conditions: Vec<StoredCondition>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    op: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    record_type_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    record_type_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    record_type_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StoredGroups {
    #[serde(default)]
    logic: Option<String>,
    #[serde(default)]
    groups: Vec<StoredGroup>,
}

#[derive(Debug, Deserialize)]
struct StoredGroup {
    #[serde(default)]
    logic: Option<String>,
    #[serde(default)]
    conditions: Vec<StoredGroupCondition>,
}

#[derive(Debug, Deserialize)]
struct StoredGroupCondition {
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    values: Vec<String>,
    #[serde(default)]
    value: Option<String>,
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

pub(crate) fn encode(rule: &Rule) -> Result<String, serde_json::Error> {
    let stored = StoredRule {
        version: Some(FORMAT_VERSION),
        mode: Some(MODE_EXPRESSION.to_owned()),
        logic_mode: Some(rule.logic_mode.to_string()),
        logic_expression: rule.effective_expression(),
        conditions: rule.conditions.iter().map(stored_condition).collect(),
    };
    serde_json::to_string(&stored)
}

fn stored_op(op: CompareOp) -> String {
    match op {
        // EQ goes out as IN with a singleton array for old consumers.
        CompareOp::Eq => "IN".to_owned(),
        CompareOp::Neq => "NEQ".to_owned(),
    }
}

fn stored_condition(condition: &Condition) -> StoredCondition {
    match condition {
        Condition::Picklist {
            id,
            field,
            op,
            value,
        } => StoredCondition {
            id: Some(id.clone()),
            kind: Some(KIND_PICKLIST.to_owned()),
            op: Some(stored_op(*op)),
            field: Some(field.clone()),
            value: Some(value.clone()),
            values: (*op == CompareOp::Eq).then(|| vec![value.clone()]),
            record_type_id: None,
            record_type_ids: None,
            record_type_name: None,
        },
        Condition::RecordType {
            id,
            op,
            record_type_id,
            record_type_name,
        } => StoredCondition {
            id: Some(id.clone()),
            kind: Some(KIND_RECORD_TYPE.to_owned()),
            op: Some(stored_op(*op)),
            field: None,
            value: None,
            values: None,
            record_type_id: Some(record_type_id.clone()),
            record_type_ids: (*op == CompareOp::Eq).then(|| vec![record_type_id.clone()]),
            record_type_name: Some(record_type_name.clone()),
        },
    }
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

pub(crate) fn decode(raw: &str) -> Rule {
    if raw.trim().is_empty() {
        return Rule::default();
    }
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            warn!(%err, "discarding malformed visibility rule blob");
            return Rule::default();
        }
    };
    if value.get("groups").is_some() {
        debug!("normalizing nested-group visibility rule blob");
        match serde_json::from_value::<StoredGroups>(value) {
            Ok(stored) => from_groups(stored),
            Err(err) => {
                warn!(%err, "discarding unreadable nested-group blob");
                Rule::default()
            }
        }
    } else {
        match serde_json::from_value::<StoredRule>(value) {
            Ok(stored) => from_stored(stored),
            Err(err) => {
                warn!(%err, "discarding unreadable visibility rule blob");
                Rule::default()
            }
        }
    }
}

/// One stored condition after expansion: the id it was persisted under, if
/// any, and the ids minted for it.
struct Expanded {
    source_id: Option<String>,
    minted: Vec<String>,
}

fn from_stored(stored: StoredRule) -> Rule {
    if let Some(version) = stored.version {
        if version != FORMAT_VERSION {
            warn!(version, "unexpected visibility rule version, reading leniently");
        }
    }

    let mut next_id = 1_u32;
    let mut conditions = Vec::new();
    let mut expansions = Vec::new();
    for sc in stored.conditions {
        let source_id = sc.id.clone();
        let minted = expand_condition(sc, &mut next_id, &mut conditions);
        if minted.is_empty() {
            continue;
        }
        expansions.push(Expanded { source_id, minted });
    }
    if conditions.is_empty() {
        return Rule::default();
    }

    let original_expression = stored.logic_expression.unwrap_or_default();
    let mode = parse_logic_mode(stored.logic_mode.as_deref(), &original_expression);
    let multi = expansions.iter().any(|e| e.minted.len() > 1);

    match mode {
        LogicMode::Custom => {
            let mut expression = rewrite_expression(&original_expression, &expansions);
            let ids: HashSet<&str> = conditions.iter().map(Condition::id).collect();
            let tokens = tokenize(&expression);
            if tokens.is_empty() || validate_expression(&tokens, &ids).is_err() {
                // Stale references or an emptied expression: fall back to
                // matching any condition.
                warn!("rebuilding unusable logic expression as OR of all filters");
                expression = join_ids(&conditions, " OR ");
            }
            Rule {
                logic_mode: LogicMode::Custom,
                logic_expression: expression,
                conditions,
            }
        }
        // A derived mode whose conditions expanded can no longer be expressed
        // as a flat AND/OR; switch to an explicit expression.
        LogicMode::All | LogicMode::Any if multi => {
            let joiner = if mode == LogicMode::All { " AND " } else { " OR " };
            let expression = expansions
                .iter()
                .map(|e| or_group(&e.minted))
                .collect::<Vec<_>>()
                .join(joiner);
            Rule {
                logic_mode: LogicMode::Custom,
                logic_expression: expression,
                conditions,
            }
        }
        mode => Rule {
            logic_mode: mode,
            logic_expression: String::new(),
            conditions,
        },
    }
}

fn from_groups(stored: StoredGroups) -> Rule {
    let root_op = logic_word(stored.logic.as_deref(), "OR");
    let mut next_id = 1_u32;
    let mut conditions = Vec::new();
    let mut group_expressions = Vec::new();

    for group in stored.groups {
        let group_op = logic_word(group.logic.as_deref(), "AND");
        let mut members = Vec::new();
        for gc in group.conditions {
            let Some(field) = gc.field else { continue };
            let mut values = gc.values;
            if values.is_empty() {
                if let Some(value) = gc.value {
                    values.push(value);
                }
            }
            let mut minted = Vec::new();
            for value in values {
                let id = mint_id(&mut next_id);
                minted.push(id.clone());
                conditions.push(Condition::Picklist {
                    id,
                    field: field.clone(),
                    op: CompareOp::Eq,
                    value,
                });
            }
            if !minted.is_empty() {
                members.push(or_group(&minted));
            }
        }
        // A group that contributed nothing is skipped entirely rather than
        // leaving empty parentheses behind.
        if members.is_empty() {
            continue;
        }
        let joined = members.join(&format!(" {group_op} "));
        group_expressions.push(if members.len() > 1 {
            format!("({joined})")
        } else {
            joined
        });
    }

    if conditions.is_empty() {
        debug!("nested-group blob contained no usable conditions");
        return Rule::default();
    }

    Rule {
        logic_mode: LogicMode::Custom,
        logic_expression: group_expressions.join(&format!(" {root_op} ")),
        conditions,
    }
}

// ---------------------------------------------------------------------------
// Condition expansion
// ---------------------------------------------------------------------------

fn mint_id(next_id: &mut u32) -> String {
    let id = next_id.to_string();
    *next_id += 1;
    id
}

/// Turn one stored condition into zero or more atomic conditions, returning
/// the minted ids. A `values`/`recordTypeIds` array forces the `IN` reading
/// regardless of the stored operator; otherwise an absent or unrecognized
/// operator defaults to `EQ`.
fn expand_condition(
    sc: StoredCondition,
    next_id: &mut u32,
    out: &mut Vec<Condition>,
) -> Vec<String> {
    let mut minted = Vec::new();
    let is_record_type = sc.kind.as_deref() == Some(KIND_RECORD_TYPE)
        || sc.record_type_id.is_some()
        || sc.record_type_ids.is_some();

    if is_record_type {
        let name = sc.record_type_name.unwrap_or_default();
        let ids = sc.record_type_ids.filter(|v| !v.is_empty());
        if let Some(ids) = ids {
            for record_type_id in ids {
                let id = mint_id(next_id);
                minted.push(id.clone());
                out.push(Condition::RecordType {
                    id,
                    op: CompareOp::Eq,
                    record_type_id,
                    record_type_name: name.clone(),
                });
            }
        } else if let Some(record_type_id) = sc.record_type_id {
            let id = mint_id(next_id);
            minted.push(id.clone());
            out.push(Condition::RecordType {
                id,
                op: parse_op(sc.op.as_deref()),
                record_type_id,
                record_type_name: name,
            });
        }
    } else {
        let Some(field) = sc.field else {
            return minted;
        };
        let values = sc.values.filter(|v| !v.is_empty());
        if let Some(values) = values {
            for value in values {
                let id = mint_id(next_id);
                minted.push(id.clone());
                out.push(Condition::Picklist {
                    id,
                    field: field.clone(),
                    op: CompareOp::Eq,
                    value,
                });
            }
        } else if let Some(value) = sc.value {
            let id = mint_id(next_id);
            minted.push(id.clone());
            out.push(Condition::Picklist {
                id,
                field,
                op: parse_op(sc.op.as_deref()),
                value,
            });
        }
    }
    minted
}

// ---------------------------------------------------------------------------
// Expression rewriting
// ---------------------------------------------------------------------------

/// Replace every whole-token occurrence of a stored condition id with its
/// minted replacement: the single new id, or a parenthesized OR group when
/// the condition expanded into several.
fn rewrite_expression(original: &str, expansions: &[Expanded]) -> String {
    let mut out = Vec::new();
    for token in tokenize(original) {
        let replacement = expansions
            .iter()
            .find(|e| e.source_id.as_deref() == Some(token.as_str()));
        match replacement {
            Some(expanded) => out.push(or_group(&expanded.minted)),
            None => out.push(token),
        }
    }
    out.join(" ")
}

fn or_group(ids: &[String]) -> String {
    if ids.len() == 1 {
        ids[0].clone()
    } else {
        format!("({})", ids.join(" OR "))
    }
}

fn join_ids(conditions: &[Condition], joiner: &str) -> String {
    conditions
        .iter()
        .map(Condition::id)
        .collect::<Vec<_>>()
        .join(joiner)
}

// ---------------------------------------------------------------------------
// Token normalization
// ---------------------------------------------------------------------------

fn parse_op(op: Option<&str>) -> CompareOp {
    match op {
        Some(op) if op.eq_ignore_ascii_case("NEQ") => CompareOp::Neq,
        _ => CompareOp::Eq,
    }
}

fn parse_logic_mode(mode: Option<&str>, expression: &str) -> LogicMode {
    match mode {
        Some(mode) if mode.eq_ignore_ascii_case("ALL") => LogicMode::All,
        Some(mode) if mode.eq_ignore_ascii_case("ANY") => LogicMode::Any,
        Some(mode) if mode.eq_ignore_ascii_case("CUSTOM") => LogicMode::Custom,
        // Blobs predating the mode field carried only the expression.
        _ if !expression.trim().is_empty() => LogicMode::Custom,
        _ => LogicMode::All,
    }
}

fn logic_word(word: Option<&str>, default: &'static str) -> &'static str {
    match word {
        Some(word) if word.eq_ignore_ascii_case("AND") => "AND",
        Some(word) if word.eq_ignore_ascii_case("OR") => "OR",
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RuleBuilder;

    fn parse_json(raw: &str) -> serde_json::Value {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn encode_writes_version_and_mode() {
        let rule = RuleBuilder::new().picklist("Status", "A").build().unwrap();
        let json = parse_json(&encode(&rule).unwrap());
        assert_eq!(json["version"], 2);
        assert_eq!(json["mode"], "expression");
        assert_eq!(json["logicMode"], "ALL");
    }

    #[test]
    fn encode_reencodes_eq_as_in_singleton() {
        let rule = RuleBuilder::new().picklist("Status", "A").build().unwrap();
        let json = parse_json(&encode(&rule).unwrap());
        let cond = &json["conditions"][0];
        assert_eq!(cond["op"], "IN");
        assert_eq!(cond["value"], "A");
        assert_eq!(cond["values"], serde_json::json!(["A"]));
    }

    #[test]
    fn encode_keeps_neq_without_array() {
        let rule = RuleBuilder::new()
            .picklist_not("Status", "A")
            .build()
            .unwrap();
        let json = parse_json(&encode(&rule).unwrap());
        let cond = &json["conditions"][0];
        assert_eq!(cond["op"], "NEQ");
        assert_eq!(cond["value"], "A");
        assert!(cond.get("values").is_none());
    }

    #[test]
    fn encode_record_type_condition() {
        let rule = RuleBuilder::new()
            .record_type("012A", "Invoice")
            .build()
            .unwrap();
        let json = parse_json(&encode(&rule).unwrap());
        let cond = &json["conditions"][0];
        assert_eq!(cond["type"], "recordType");
        assert_eq!(cond["recordTypeId"], "012A");
        assert_eq!(cond["recordTypeIds"], serde_json::json!(["012A"]));
        assert_eq!(cond["recordTypeName"], "Invoice");
        assert!(cond.get("field").is_none());
    }

    #[test]
    fn encode_empty_rule_has_null_expression() {
        let json = parse_json(&encode(&Rule::default()).unwrap());
        assert!(json["logicExpression"].is_null());
        assert_eq!(json["conditions"], serde_json::json!([]));
    }

    #[test]
    fn encode_derived_modes_join_ids() {
        let all = RuleBuilder::new()
            .picklist("Status", "A")
            .picklist("Stage", "B")
            .build()
            .unwrap();
        assert_eq!(
            parse_json(&encode(&all).unwrap())["logicExpression"],
            "1 AND 2"
        );

        let any = RuleBuilder::new()
            .picklist("Status", "A")
            .picklist("Stage", "B")
            .match_any()
            .build()
            .unwrap();
        assert_eq!(
            parse_json(&encode(&any).unwrap())["logicExpression"],
            "1 OR 2"
        );
    }

    #[test]
    fn decode_empty_and_garbage_degrade() {
        assert_eq!(decode(""), Rule::default());
        assert_eq!(decode("   "), Rule::default());
        assert_eq!(decode("not json"), Rule::default());
        assert_eq!(decode(r#"{"conditions": 5}"#), Rule::default());
    }

    #[test]
    fn decode_current_shape_reverses_in_encoding() {
        let raw = r#"{
            "version": 2, "mode": "expression",
            "logicMode": "ALL", "logicExpression": "1 AND 2",
            "conditions": [
                {"id": "1", "type": "picklist", "op": "IN",
                 "field": "Status", "value": "A", "values": ["A"]},
                {"id": "2", "type": "picklist", "op": "NEQ",
                 "field": "Stage", "value": "B"}
            ]
        }"#;
        let rule = decode(raw);
        assert_eq!(rule.logic_mode, LogicMode::All);
        assert_eq!(rule.conditions.len(), 2);
        assert_eq!(rule.conditions[0].op(), CompareOp::Eq);
        assert_eq!(rule.conditions[1].op(), CompareOp::Neq);
    }

    #[test]
    fn decode_renumbers_sparse_ids() {
        let raw = r#"{
            "logicMode": "CUSTOM", "logicExpression": "7 OR 9",
            "conditions": [
                {"id": "7", "type": "picklist", "op": "EQ", "field": "Status", "value": "A"},
                {"id": "9", "type": "picklist", "op": "EQ", "field": "Stage", "value": "B"}
            ]
        }"#;
        let rule = decode(raw);
        let ids: Vec<&str> = rule.conditions.iter().map(Condition::id).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(rule.logic_expression, "1 OR 2");
    }

    #[test]
    fn decode_expands_multi_value_condition() {
        let raw = r#"{
            "logicExpression": "1",
            "conditions": [
                {"id": "1", "type": "picklist", "op": "IN",
                 "field": "Status", "values": ["A", "B"]}
            ]
        }"#;
        let rule = decode(raw);
        assert_eq!(rule.logic_mode, LogicMode::Custom);
        assert_eq!(rule.conditions.len(), 2);
        assert_eq!(rule.logic_expression, "(1 OR 2)");
    }

    #[test]
    fn decode_values_array_wins_over_stored_op() {
        let raw = r#"{
            "logicExpression": "1",
            "conditions": [
                {"id": "1", "type": "picklist", "op": "NEQ",
                 "field": "Status", "values": ["A", "B"]}
            ]
        }"#;
        let rule = decode(raw);
        assert!(rule.conditions.iter().all(|c| c.op() == CompareOp::Eq));
    }

    #[test]
    fn decode_derived_mode_with_expansion_becomes_custom() {
        let raw = r#"{
            "logicMode": "ALL",
            "conditions": [
                {"id": "1", "type": "picklist", "op": "IN",
                 "field": "Status", "values": ["A", "B"]},
                {"id": "2", "type": "picklist", "op": "EQ",
                 "field": "Stage", "value": "C"}
            ]
        }"#;
        let rule = decode(raw);
        assert_eq!(rule.logic_mode, LogicMode::Custom);
        assert_eq!(rule.logic_expression, "(1 OR 2) AND 3");
    }

    #[test]
    fn decode_stale_expression_falls_back_to_or_of_all() {
        let raw = r#"{
            "logicMode": "CUSTOM", "logicExpression": "1 AND 99",
            "conditions": [
                {"id": "1", "type": "picklist", "op": "EQ", "field": "Status", "value": "A"},
                {"id": "2", "type": "picklist", "op": "EQ", "field": "Stage", "value": "B"}
            ]
        }"#;
        let rule = decode(raw);
        assert_eq!(rule.logic_expression, "1 OR 2");
    }

    #[test]
    fn decode_missing_expression_with_conditions_synthesizes_or() {
        let raw = r#"{
            "logicMode": "CUSTOM",
            "conditions": [
                {"id": "1", "type": "picklist", "op": "EQ", "field": "Status", "value": "A"}
            ]
        }"#;
        let rule = decode(raw);
        assert_eq!(rule.logic_expression, "1");
    }

    #[test]
    fn decode_without_usable_conditions_is_empty() {
        let raw = r#"{"logicMode": "ALL", "conditions": [{"id": "1", "op": "EQ"}]}"#;
        assert_eq!(decode(raw), Rule::default());
    }

    #[test]
    fn decode_groups_single_condition() {
        let raw = r#"{
            "logic": "OR",
            "groups": [
                {"logic": "AND", "conditions": [
                    {"type": "picklist", "field": "Status", "values": ["A"]}
                ]}
            ]
        }"#;
        let rule = decode(raw);
        assert_eq!(rule.logic_mode, LogicMode::Custom);
        assert_eq!(rule.logic_expression, "1");
        assert_eq!(rule.conditions.len(), 1);
        assert_eq!(rule.conditions[0].op(), CompareOp::Eq);
    }

    #[test]
    fn decode_groups_full_shape() {
        let raw = r#"{
            "logic": "OR",
            "groups": [
                {"logic": "AND", "conditions": [
                    {"field": "Status", "values": ["A", "B"]},
                    {"field": "Stage", "values": ["C"]}
                ]},
                {"conditions": [
                    {"field": "Origin", "values": ["D"]}
                ]}
            ]
        }"#;
        let rule = decode(raw);
        assert_eq!(rule.logic_expression, "((1 OR 2) AND 3) OR 4");
        assert_eq!(rule.conditions.len(), 4);
    }

    #[test]
    fn decode_groups_defaults_root_or_group_and() {
        let raw = r#"{
            "groups": [
                {"conditions": [
                    {"field": "Status", "values": ["A"]},
                    {"field": "Stage", "values": ["B"]}
                ]},
                {"conditions": [{"field": "Origin", "values": ["C"]}]}
            ]
        }"#;
        let rule = decode(raw);
        assert_eq!(rule.logic_expression, "(1 AND 2) OR 3");
    }

    #[test]
    fn decode_groups_skips_empty_groups() {
        let raw = r#"{
            "logic": "OR",
            "groups": [
                {"conditions": []},
                {"conditions": [{"field": "Status", "values": ["A"]}]},
                {"conditions": [{"values": ["B"]}]}
            ]
        }"#;
        let rule = decode(raw);
        assert_eq!(rule.logic_expression, "1");
        assert_eq!(rule.conditions.len(), 1);
    }

    #[test]
    fn decode_groups_with_nothing_usable_is_empty() {
        let raw = r#"{"logic": "OR", "groups": [{"conditions": []}]}"#;
        assert_eq!(decode(raw), Rule::default());
    }
}
