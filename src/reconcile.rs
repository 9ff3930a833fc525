#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Validates the model's JSON reply and reconciles its scores.
//!
//! The model is untrusted: every field is checked explicitly and the reported
//! final score is only kept while it agrees with the sum of the three
//! evaluator scores.

use serde_json::{Map, Value};

use crate::{
    error::{EvaluationError, excerpt},
    types::{EvaluationResult, EvaluatorScore, FinalVerdict},
};

/// Largest accepted gap between the reported final score and the sum of the
/// evaluator scores.
pub const TOLERANCE: f64 = 0.5;

/// Upper bound of the final score.
pub const MAX_FINAL_SCORE: f64 = 10.0;

/// Message attached to successful evaluations.
pub const SUCCESS_MESSAGE: &str = "evaluation complete";

/// Top-level keys every reply must contain, in validation order.
pub const REQUIRED_KEYS: [&str; 4] = ["evaluator_1", "evaluator_2", "evaluator_3", "final_verdict"];

/// Parses, validates, and reconciles a raw (already unfenced) model reply.
pub fn reconcile(raw: &str) -> Result<EvaluationResult, EvaluationError> {
    let value: Value = serde_json::from_str(raw).map_err(|err| {
        tracing::error!(excerpt = %excerpt(raw), "evaluation reply is not valid JSON");
        EvaluationError::ResponseParse {
            reason:  err.to_string(),
            excerpt: excerpt(raw),
        }
    })?;

    let root = value
        .as_object()
        .ok_or_else(|| EvaluationError::schema("<root>", "must be a JSON object"))?;
    for key in REQUIRED_KEYS {
        if !root.contains_key(key) {
            return Err(EvaluationError::schema(key, "is missing"));
        }
    }

    let evaluator_1 = evaluator(root, "evaluator_1")?;
    let evaluator_2 = evaluator(root, "evaluator_2")?;
    let evaluator_3 = evaluator(root, "evaluator_3")?;
    let mut final_verdict = verdict(root)?;

    let calculated = evaluator_1.score + evaluator_2.score + evaluator_3.score;
    let reported = final_verdict.final_score;
    final_verdict.final_score = reconcile_score(calculated, reported);
    if final_verdict.final_score != reported {
        tracing::info!(
            reported,
            calculated,
            published = final_verdict.final_score,
            "final score replaced by component total"
        );
    }

    Ok(EvaluationResult {
        evaluator_1,
        evaluator_2,
        evaluator_3,
        final_verdict,
        success: true,
        message: Some(SUCCESS_MESSAGE.to_string()),
    })
}

/// Picks the published final score from the component total and the reported
/// value.
///
/// The reported value survives only while it is within [`TOLERANCE`] of the
/// total (a gap of exactly `TOLERANCE` still counts as agreement). Otherwise
/// the total, capped at [`MAX_FINAL_SCORE`], is published. The result always
/// lies in `[0, MAX_FINAL_SCORE]`.
pub fn reconcile_score(calculated: f64, reported: f64) -> f64 {
    let score = if (calculated - reported).abs() > TOLERANCE {
        calculated.min(MAX_FINAL_SCORE)
    } else {
        reported
    };
    score.clamp(0.0, MAX_FINAL_SCORE)
}

/// Validates one `evaluator_N` object.
fn evaluator(root: &Map<String, Value>, key: &str) -> Result<EvaluatorScore, EvaluationError> {
    let object = object(root, key)?;
    Ok(EvaluatorScore {
        name:     string(object, key, "name")?,
        analysis: string(object, key, "analysis")?,
        score:    number(object, key, "score")?,
    })
}

/// Validates the `final_verdict` object.
fn verdict(root: &Map<String, Value>) -> Result<FinalVerdict, EvaluationError> {
    let key = "final_verdict";
    let object = object(root, key)?;
    Ok(FinalVerdict {
        summary:         string(object, key, "summary")?,
        final_score:     number(object, key, "final_score")?,
        recommendations: string(object, key, "recommendations")?,
    })
}

/// Returns `root[key]` as an object.
fn object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a Map<String, Value>, EvaluationError> {
    match root.get(key) {
        None => Err(EvaluationError::schema(key, "is missing")),
        Some(value) => value
            .as_object()
            .ok_or_else(|| EvaluationError::schema(key, "must be an object")),
    }
}

/// Returns `parent[field]` as a string.
fn string(parent: &Map<String, Value>, path: &str, field: &str) -> Result<String, EvaluationError> {
    match parent.get(field) {
        None => Err(EvaluationError::schema(format!("{path}.{field}"), "is missing")),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(EvaluationError::schema(format!("{path}.{field}"), "must be a string")),
    }
}

/// Returns `parent[field]` coerced to a finite, non-negative number.
/// Numeric strings such as `"2.5"` are accepted.
fn number(parent: &Map<String, Value>, path: &str, field: &str) -> Result<f64, EvaluationError> {
    let path = format!("{path}.{field}");
    let value = parent
        .get(field)
        .ok_or_else(|| EvaluationError::schema(path.as_str(), "is missing"))?;

    let coerced = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match coerced {
        Some(n) if n.is_finite() && n >= 0.0 => Ok(n),
        _ => Err(EvaluationError::ValueCoercion {
            field: path,
            value: value.to_string(),
        }),
    }
}
