#![forbid(unsafe_code)]

//! Category levels and their canonical label order.
//!
//! Each [`CategoryLevel`] owns an ordered label list. That order is the
//! canonical order of group blocks at the level; [`CategoryModel::rank_map`]
//! turns it into the sort keys written back onto item assignments.

use std::collections::HashMap;

use crate::error::EngineError;

/// One grouping level.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CategoryLevel {
    pub name: String,
    pub labels: Vec<String>,
    /// Calculated levels are derived elsewhere and never group or reorder.
    pub is_calculated: bool,
}

impl CategoryLevel {
    /// Create an editable level.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: Vec::new(),
            is_calculated: false,
        }
    }

    /// Set the initial labels.
    #[must_use]
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the level as calculated (read-only).
    #[must_use]
    pub fn calculated(mut self) -> Self {
        self.is_calculated = true;
        self
    }

    /// Position of `label` in the canonical order.
    #[must_use]
    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }
}

/// The ordered set of category levels.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CategoryModel {
    levels: Vec<CategoryLevel>,
}

impl CategoryModel {
    #[must_use]
    pub fn new(levels: Vec<CategoryLevel>) -> Self {
        Self { levels }
    }

    #[must_use]
    pub fn levels(&self) -> &[CategoryLevel] {
        &self.levels
    }

    #[must_use]
    pub fn level(&self, index: usize) -> Option<&CategoryLevel> {
        self.levels.get(index)
    }

    /// Return the level if it exists and may be used for grouping.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownLevel`] or [`EngineError::CalculatedLevel`].
    pub fn groupable(&self, index: usize) -> Result<&CategoryLevel, EngineError> {
        let level = self
            .levels
            .get(index)
            .ok_or(EngineError::UnknownLevel(index))?;
        if level.is_calculated {
            return Err(EngineError::CalculatedLevel(index));
        }
        Ok(level)
    }

    /// Replace all levels (category editor commit).
    pub fn replace(&mut self, levels: Vec<CategoryLevel>) {
        self.levels = levels;
    }

    /// `label -> rank` for a level, rank being the label's position.
    #[must_use]
    pub fn rank_map(&self, index: usize) -> HashMap<String, f64> {
        self.levels
            .get(index)
            .map(|level| {
                level
                    .labels
                    .iter()
                    .enumerate()
                    .map(|(rank, label)| (label.clone(), rank as f64))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Rank of a single label, if listed.
    #[must_use]
    pub fn rank_of(&self, index: usize, label: &str) -> Option<f64> {
        self.levels
            .get(index)
            .and_then(|level| level.position(label))
            .map(|rank| rank as f64)
    }

    /// Append a label to an editable level. Returns false if already present.
    ///
    /// # Errors
    ///
    /// Fails when the level is unknown or calculated.
    pub fn add_label(&mut self, index: usize, label: impl Into<String>) -> Result<bool, EngineError> {
        self.groupable(index)?;
        let label = label.into();
        let level = &mut self.levels[index];
        if level.position(&label).is_some() {
            return Ok(false);
        }
        level.labels.push(label);
        Ok(true)
    }

    /// Remove a label from an editable level. Returns false if absent.
    ///
    /// # Errors
    ///
    /// Fails when the level is unknown or calculated.
    pub fn remove_label(&mut self, index: usize, label: &str) -> Result<bool, EngineError> {
        self.groupable(index)?;
        let level = &mut self.levels[index];
        match level.position(label) {
            Some(pos) => {
                level.labels.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Move `label` so that it ends up at `to` in the label list.
    ///
    /// `to` is clamped to the list. Returns false when the label already sits
    /// at `to`.
    ///
    /// # Errors
    ///
    /// Fails when the level is unknown, calculated, or the label is absent.
    pub fn move_label(&mut self, index: usize, label: &str, to: usize) -> Result<bool, EngineError> {
        self.groupable(index)?;
        let level = &mut self.levels[index];
        let from = level
            .position(label)
            .ok_or_else(|| EngineError::UnknownLabel(label.to_string()))?;
        let to = to.min(level.labels.len() - 1);
        if from == to {
            return Ok(false);
        }
        let moved = level.labels.remove(from);
        level.labels.insert(to, moved);
        Ok(true)
    }

    /// Move `label` directly before `anchor`, or to the end when `anchor` is `None`.
    ///
    /// # Errors
    ///
    /// Fails when the level is unknown, calculated, or either label is absent.
    pub fn move_label_before(
        &mut self,
        index: usize,
        label: &str,
        anchor: Option<&str>,
    ) -> Result<bool, EngineError> {
        self.groupable(index)?;
        let level = &mut self.levels[index];
        let from = level
            .position(label)
            .ok_or_else(|| EngineError::UnknownLabel(label.to_string()))?;
        let moved = level.labels.remove(from);
        let to = match anchor {
            Some(anchor) => match level.position(anchor) {
                Some(pos) => pos,
                None => {
                    level.labels.insert(from, moved);
                    return Err(EngineError::UnknownLabel(anchor.to_string()));
                }
            },
            None => level.labels.len(),
        };
        level.labels.insert(to, moved);
        Ok(to != from)
    }
}
