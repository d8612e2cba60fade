//! Phone enrichment join.
//!
//! Left-joins a ranked external phone/score table onto the mailing by document key and fills
//! four fixed phone slots per row. The join never drops a mailing row: unmatched rows keep
//! all four slots null, which is an expected outcome, not an error.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::audit::StageReport;
use crate::config::EnrichmentConfig;
use crate::types::{DataSet, DataType, Field, Value};

use super::normalize::{normalize_join_key, normalize_phone};

/// The four fixed phone slot columns, in fill order.
pub const PHONE_SLOT_COLUMNS: [&str; 4] =
    ["telefone_01", "telefone_02", "telefone_03", "telefone_04"];

const STAGE: &str = "phone-enrichment";

/// Enrich the mailing with ranked candidate phones.
///
/// The enrichment input arrives as one dataset per workbook sheet; sheets are concatenated by
/// column name first. Candidates are ordered by score descending per document, then each
/// mailing row's slots are filled from the enriched candidates followed by the row's own
/// phone-like columns, de-duplicated preserving first occurrence.
///
/// The four slot columns are always added. When the enrichment data or its required columns
/// are missing the stage skips and every slot stays null.
pub fn enrich_phones(
    mailing: &DataSet,
    enrichment_sheets: &[DataSet],
    cfg: &EnrichmentConfig,
) -> (DataSet, StageReport) {
    let with_slots = add_empty_slots(mailing);

    let enrichment = DataSet::concat_by_name(enrichment_sheets);
    if enrichment.row_count() == 0 {
        return skip(with_slots, "enrichment dataset missing or empty");
    }

    let required = [&cfg.document_column, &cfg.phone_column, &cfg.score_column];
    if let Some(missing) = required.iter().find(|c| !enrichment.has_column(c)) {
        return skip(
            with_slots,
            format!("column '{missing}' not found in enrichment data"),
        );
    }
    let Some(mail_key_idx) = mailing.column_index(&cfg.mailing_key) else {
        return skip(
            with_slots,
            format!("column '{}' not found in mailing", cfg.mailing_key),
        );
    };

    let doc_idx = enrichment.column_index(&cfg.document_column).expect("checked");
    let phone_idx = enrichment.column_index(&cfg.phone_column).expect("checked");
    let score_idx = enrichment.column_index(&cfg.score_column).expect("checked");

    // Candidate triples, dropping rows without a usable document or phone.
    let mut candidates: Vec<(String, String, f64)> = Vec::new();
    for row in &enrichment.rows {
        let Some(doc) = join_key(&row[doc_idx]) else { continue };
        let Some(phone) = row[phone_idx].to_text().as_deref().and_then(normalize_phone) else {
            continue;
        };
        let score = cell_score(&row[score_idx]);
        candidates.push((doc, phone, score));
    }
    // Best score first per document; stable, so equal scores keep sheet order.
    candidates.sort_by(|a, b| a.0.cmp(&b.0).then(b.2.total_cmp(&a.2)));

    let mut ranked: HashMap<String, Vec<String>> = HashMap::new();
    for (doc, phone, _) in candidates {
        let list = ranked.entry(doc).or_default();
        if !list.contains(&phone) {
            list.push(phone);
        }
    }

    let native_idxs: Vec<usize> = cfg
        .native_phone_columns
        .iter()
        .filter_map(|c| mailing.column_index(c))
        .collect();

    let mut matches = 0usize;
    // Slot columns are looked up individually: a mailing that already carries one of them
    // keeps it at its original position, so the four are not necessarily adjacent.
    let slot_idxs: Vec<usize> = PHONE_SLOT_COLUMNS
        .iter()
        .map(|slot| with_slots.column_index(slot).expect("slots were added above"))
        .collect();
    let out = with_slots.map_rows(|row| {
        let mut out_row = row.to_vec();

        let enriched = row[mail_key_idx]
            .to_text()
            .map(|t| normalize_join_key(&t))
            .and_then(|k| ranked.get(&k));
        if enriched.is_some() {
            matches += 1;
        }

        // Combined list: enrichment candidates first, then the row's own phones.
        let mut combined: Vec<String> = Vec::new();
        if let Some(list) = enriched {
            combined.extend(list.iter().cloned());
        }
        for &idx in &native_idxs {
            if let Some(phone) = row[idx].to_text().as_deref().and_then(normalize_phone) {
                if !combined.contains(&phone) {
                    combined.push(phone);
                }
            }
        }

        for (phone, &slot_idx) in combined.into_iter().zip(&slot_idxs) {
            out_row[slot_idx] = Value::Utf8(phone);
        }
        out_row
    });

    let message = format!(
        "{matches} of {} rows matched enrichment phones",
        mailing.row_count()
    );
    info!(stage = STAGE, matches, %message);
    let report = StageReport::applied(STAGE, mailing.row_count(), out.row_count(), message);
    (out, report)
}

fn add_empty_slots(mailing: &DataSet) -> DataSet {
    let mut out = mailing.clone();
    for slot in PHONE_SLOT_COLUMNS {
        out = out.with_column(
            Field::new(slot, DataType::Utf8),
            vec![Value::Null; mailing.row_count()],
        );
    }
    out
}

fn join_key(value: &Value) -> Option<String> {
    let key = normalize_join_key(&value.to_text()?);
    if key.is_empty() { None } else { Some(key) }
}

/// Score of a candidate; missing or unparseable scores rank last.
fn cell_score(value: &Value) -> f64 {
    match value {
        Value::Utf8(s) => s.trim().parse::<f64>().unwrap_or(f64::NEG_INFINITY),
        other => other.as_f64().unwrap_or(f64::NEG_INFINITY),
    }
}

fn skip(with_slots: DataSet, reason: impl Into<String>) -> (DataSet, StageReport) {
    let reason = reason.into();
    warn!(stage = STAGE, %reason, "enrichment skipped");
    let rows = with_slots.row_count();
    (with_slots, StageReport::skipped(STAGE, rows, reason))
}
