// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Re-prediction of the risk levels of today's rows of the [RiskTable].

use std::fs::File;
use std::io;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

use crate::risk::{RiskRecord, RiskStore, RiskTable};

/// Number of features used by a [RiskModel].
pub const FEATURE_COUNT: usize = 5;

/// Model inputs of a single [RiskRecord], in the order expected by [RiskModel::predict].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow {
    pub month: u32,
    pub day: u32,
    pub most_common_condition: f64,
    pub avg_yearly_accidents: f64,
    pub average_monthly_occurrences: f64,
}

impl FeatureRow {
    pub fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.month as f64,
            self.day as f64,
            self.most_common_condition,
            self.avg_yearly_accidents,
            self.average_monthly_occurrences,
        ]
    }

    /// Returns the features of a record, or `None` if any of them is missing.
    pub fn from_record(r: &RiskRecord) -> Option<Self> {
        Some(Self {
            month: r.month?,
            day: r.day?,
            most_common_condition: r.most_common_condition?,
            avg_yearly_accidents: r.avg_yearly_accidents?,
            average_monthly_occurrences: r.average_monthly_occurrences?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("malformed model: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid model: {0}")]
    Invalid(String),
}

/// Predicts a risk level for every provided [FeatureRow].
pub trait RiskModel: Send + Sync {
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<String>, ModelError>;
}

/// Multinomial (or binary) logistic regression classifier.
///
/// Stored as JSON: `{"classes": [...], "coefficients": [[...], ...], "intercepts": [...]}`,
/// with one coefficient row per class, or a single row for a two-class model.
/// Classes may be strings or numbers; numbers are converted into their integer text form.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticModel {
    classes: Vec<String>,
    coefficients: Vec<[f64; FEATURE_COUNT]>,
    intercepts: Vec<f64>,
}

#[derive(Deserialize)]
struct RawLogisticModel {
    classes: Vec<ClassLabel>,
    coefficients: Vec<[f64; FEATURE_COUNT]>,
    intercepts: Vec<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClassLabel {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<ClassLabel> for String {
    fn from(label: ClassLabel) -> Self {
        match label {
            ClassLabel::Integer(i) => i.to_string(),
            ClassLabel::Float(f) if f.fract() == 0.0 => (f as i64).to_string(),
            ClassLabel::Float(f) => f.to_string(),
            ClassLabel::Text(s) => s,
        }
    }
}

impl LogisticModel {
    pub fn new(
        classes: Vec<String>,
        coefficients: Vec<[f64; FEATURE_COUNT]>,
        intercepts: Vec<f64>,
    ) -> Result<Self, ModelError> {
        if coefficients.len() != intercepts.len() {
            return Err(ModelError::Invalid(format!(
                "{} coefficient rows, but {} intercepts",
                coefficients.len(),
                intercepts.len()
            )));
        }

        let binary = classes.len() == 2 && coefficients.len() == 1;
        if !binary && (classes.is_empty() || classes.len() != coefficients.len()) {
            return Err(ModelError::Invalid(format!(
                "{} classes, but {} coefficient rows",
                classes.len(),
                coefficients.len()
            )));
        }

        Ok(Self {
            classes,
            coefficients,
            intercepts,
        })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let f = File::open(path)?;
        Self::from_reader(io::BufReader::new(f))
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, ModelError> {
        let raw: RawLogisticModel = serde_json::from_reader(reader)?;
        Self::new(
            raw.classes.into_iter().map(String::from).collect(),
            raw.coefficients,
            raw.intercepts,
        )
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    fn score(&self, k: usize, x: &[f64; FEATURE_COUNT]) -> f64 {
        self.coefficients[k]
            .iter()
            .zip(x)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercepts[k]
    }

    fn predict_one(&self, row: &FeatureRow) -> &str {
        let x = row.as_array();

        if self.coefficients.len() == 1 && self.classes.len() == 2 {
            let idx = if self.score(0, &x) > 0.0 { 1 } else { 0 };
            return &self.classes[idx];
        }

        let mut best = 0;
        let mut best_score = f64::NEG_INFINITY;
        for k in 0..self.coefficients.len() {
            let score = self.score(k, &x);
            if score > best_score {
                best = k;
                best_score = score;
            }
        }
        &self.classes[best]
    }
}

impl RiskModel for LogisticModel {
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<String>, ModelError> {
        Ok(rows.iter().map(|r| self.predict_one(r).to_string()).collect())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("risk prediction model is unavailable")]
    ModelUnavailable,

    #[error("risk prediction failed: {0}")]
    Model(#[from] ModelError),

    #[error("model returned {actual} predictions for {expected} rows")]
    PredictionCountMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    pub date: NaiveDate,

    /// Number of rows whose risk level was re-predicted.
    pub updated_rows: usize,

    /// Number of rows dated `date` left untouched due to missing features.
    pub skipped_rows: usize,
}

/// Re-predicts the risk level of every row of the stored [RiskTable] whose month and day
/// match `today`, and publishes the updated table.
///
/// Other rows, and today's rows with missing features, are left untouched.
/// On any failure the stored table is left untouched as well.
pub fn refresh_predictions(
    store: &RiskStore,
    model: Option<&dyn RiskModel>,
    today: NaiveDate,
) -> Result<RefreshSummary, RefreshError> {
    let model = model.ok_or(RefreshError::ModelUnavailable)?;
    let (month, day) = (today.month(), today.day());
    let mut updated_rows = 0;
    let mut skipped_rows = 0;

    store.update(|table| {
        let mut selected: Vec<usize> = Vec::new();
        let mut features: Vec<FeatureRow> = Vec::new();
        for (idx, r) in table.rows().iter().enumerate() {
            if r.month != Some(month) || r.day != Some(day) {
                continue;
            }
            match FeatureRow::from_record(r) {
                Some(f) => {
                    selected.push(idx);
                    features.push(f);
                }
                None => {
                    log::warn!("Not refreshing {:?}: missing features", r.road_name);
                    skipped_rows += 1;
                }
            }
        }

        let predictions = if features.is_empty() {
            Vec::new()
        } else {
            model.predict(&features)?
        };

        if predictions.len() != selected.len() {
            return Err(RefreshError::PredictionCountMismatch {
                expected: selected.len(),
                actual: predictions.len(),
            });
        }

        let mut rows = table.rows().to_vec();
        for (&idx, level) in selected.iter().zip(predictions) {
            rows[idx].risk_level = level;
        }
        updated_rows = selected.len();
        Ok(table.with_rows(rows))
    })?;

    log::info!("Refreshed {} risk predictions for {}", updated_rows, today);
    Ok(RefreshSummary {
        date: today,
        updated_rows,
        skipped_rows,
    })
}

/// [refresh_predictions] for the current local date.
pub fn refresh_today(
    store: &RiskStore,
    model: Option<&dyn RiskModel>,
) -> Result<RefreshSummary, RefreshError> {
    refresh_predictions(store, model, chrono::Local::now().date_naive())
}
