use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::metadata::{MutationStackEntry, SlimMutationMetadata};

/// Sign class of a selection coefficient.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    Beneficial,
    Deleterious,
    Neutral,
}

impl Effect {
    pub fn classify(coefficient: f64) -> Self {
        if coefficient > 0.0 {
            Self::Beneficial
        } else if coefficient < 0.0 {
            Self::Deleterious
        } else {
            Self::Neutral
        }
    }
}

// ── Running summary ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CoefficientSummary {
    pub count: usize,
    pub sum: f64,
}

impl CoefficientSummary {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
    }

    /// Arithmetic mean, or `None` when nothing was pushed.
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Renders the mean at the single precision SLiM stores coefficients in.
    pub fn display_mean(&self) -> String {
        match self.mean() {
            Some(m) => format!("{}", m as f32),
            None => "undefined".to_owned(),
        }
    }
}

impl Serialize for CoefficientSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("CoefficientSummary", 3)?;
        s.serialize_field("count", &self.count)?;
        s.serialize_field("sum", &self.sum)?;
        s.serialize_field("mean", &self.mean())?;
        s.end()
    }
}

/// Beneficial/deleterious/neutral tallies for one group of stack entries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct EffectTally {
    pub beneficial: CoefficientSummary,
    pub deleterious: CoefficientSummary,
    pub neutral: usize,
}

impl EffectTally {
    pub fn push(&mut self, coefficient: f64) -> Effect {
        let effect = Effect::classify(coefficient);
        match effect {
            Effect::Beneficial => self.beneficial.push(coefficient),
            Effect::Deleterious => self.deleterious.push(coefficient),
            Effect::Neutral => self.neutral += 1,
        }
        effect
    }

    /// Number of nonzero coefficients seen.
    pub fn selected(&self) -> usize {
        self.beneficial.count + self.deleterious.count
    }
}

// ── Report ────────────────────────────────────────────────────────────────────

/// Aggregate over every stack entry of every mutation scanned.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SelectionReport {
    pub mutations: usize,
    pub stack_entries: usize,
    #[serde(flatten)]
    pub totals: EffectTally,
    /// Keyed by SLiM mutation type id.
    pub by_type: BTreeMap<i32, EffectTally>,
    /// Oldest and youngest origin tick among the entries scanned.
    pub origin_ticks: Option<(i32, i32)>,
}

impl SelectionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_metadata<'a, I>(metadata: I) -> Self
    where
        I: IntoIterator<Item = &'a SlimMutationMetadata>,
    {
        let mut report = Self::new();
        for md in metadata {
            report.record(&md.stack);
        }
        report
    }

    /// Fold the stack of one mutation into the report.
    pub fn record(&mut self, entries: &[MutationStackEntry]) {
        self.mutations += 1;
        for entry in entries {
            let s = f64::from(entry.selection_coeff);
            self.stack_entries += 1;
            self.totals.push(s);
            self.by_type.entry(entry.mutation_type).or_default().push(s);
            self.origin_ticks = Some(match self.origin_ticks {
                Some((lo, hi)) => (lo.min(entry.origin_tick), hi.max(entry.origin_tick)),
                None => (entry.origin_tick, entry.origin_tick),
            });
        }
    }

    pub fn beneficial(&self) -> &CoefficientSummary {
        &self.totals.beneficial
    }

    pub fn deleterious(&self) -> &CoefficientSummary {
        &self.totals.deleterious
    }

    /// One line per mutation type, e.g. `m2: beneficial 3 (mean 0.01), ...`.
    pub fn type_lines(&self) -> Vec<String> {
        self.by_type
            .iter()
            .map(|(id, t)| {
                format!(
                    "m{}: beneficial {} (mean {}), deleterious {} (mean {}), neutral {}",
                    id,
                    t.beneficial.count,
                    t.beneficial.display_mean(),
                    t.deleterious.count,
                    t.deleterious.display_mean(),
                    t.neutral
                )
            })
            .collect()
    }
}

impl fmt::Display for SelectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Beneficial: {}, mean {}",
            self.beneficial().count,
            self.beneficial().display_mean()
        )?;
        write!(
            f,
            "Deleterious: {}, mean {}",
            self.deleterious().count,
            self.deleterious().display_mean()
        )
    }
}
