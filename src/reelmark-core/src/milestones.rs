use crate::config::ValidationError;
use serde::{Deserialize, Serialize};

/// A progress fraction that fires a one-time semantic event when exceeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub fraction: f64,
    pub event: String,
}

impl Milestone {
    pub fn new(fraction: f64, event: impl Into<String>) -> Self {
        Self {
            fraction,
            event: event.into(),
        }
    }
}

/// Ordered milestone table. Fractions are strictly increasing in (0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MilestoneTable(Vec<Milestone>);

impl MilestoneTable {
    pub fn new(milestones: Vec<Milestone>) -> Result<Self, ValidationError> {
        let table = Self(milestones);
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut previous: Option<f64> = None;
        for milestone in &self.0 {
            let fraction = milestone.fraction;
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(ValidationError::MilestoneOutOfRange { fraction });
            }
            if milestone.event.trim().is_empty() {
                return Err(ValidationError::EmptyMilestoneName { fraction });
            }
            if let Some(previous) = previous {
                if fraction <= previous {
                    return Err(ValidationError::MilestonesNotIncreasing { previous, fraction });
                }
            }
            previous = Some(fraction);
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Milestone> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for MilestoneTable {
    fn default() -> Self {
        Self(vec![
            Milestone::new(0.01, "playProgressStarted"),
            Milestone::new(0.25, "playProgressQuarter"),
            Milestone::new(0.5, "playProgressHalf"),
            Milestone::new(0.75, "playProgressThreeQuarters"),
            Milestone::new(0.97, "playProgressEnd"),
        ])
    }
}

impl<'a> IntoIterator for &'a MilestoneTable {
    type Item = &'a Milestone;
    type IntoIter = std::slice::Iter<'a, Milestone>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_valid_and_ordered() {
        let table = MilestoneTable::default();
        assert!(table.validate().is_ok());
        let names: Vec<_> = table.iter().map(|m| m.event.as_str()).collect();
        assert_eq!(
            names,
            [
                "playProgressStarted",
                "playProgressQuarter",
                "playProgressHalf",
                "playProgressThreeQuarters",
                "playProgressEnd"
            ]
        );
    }

    #[test]
    fn rejects_fraction_above_one() {
        let err = MilestoneTable::new(vec![Milestone::new(1.5, "late")]).unwrap_err();
        assert_eq!(err, ValidationError::MilestoneOutOfRange { fraction: 1.5 });
    }

    #[test]
    fn rejects_zero_fraction() {
        let err = MilestoneTable::new(vec![Milestone::new(0.0, "start")]).unwrap_err();
        assert_eq!(err, ValidationError::MilestoneOutOfRange { fraction: 0.0 });
    }

    #[test]
    fn rejects_duplicate_fraction() {
        let err = MilestoneTable::new(vec![
            Milestone::new(0.5, "half"),
            Milestone::new(0.5, "again"),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::MilestonesNotIncreasing {
                previous: 0.5,
                fraction: 0.5
            }
        );
    }

    #[test]
    fn rejects_blank_event_name() {
        let err = MilestoneTable::new(vec![Milestone::new(1.0, "  ")]).unwrap_err();
        assert_eq!(err, ValidationError::EmptyMilestoneName { fraction: 1.0 });
    }

    #[test]
    fn empty_table_is_allowed() {
        let table = MilestoneTable::new(Vec::new()).unwrap();
        assert!(table.is_empty());
    }
}
