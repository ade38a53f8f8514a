//! Output column list from the `select` mapping.

use super::{ProjectionError, ProjectionResult};
use crate::plan::{ProjectionItem, ProjectionSource};
use crate::resolver::{ResolvedConfig, SelectRef};

pub struct ProjectionBuilder<'a> {
    resolved: &'a ResolvedConfig,
}

impl<'a> ProjectionBuilder<'a> {
    pub fn new(resolved: &'a ResolvedConfig) -> Self {
        Self { resolved }
    }

    /// Build projection items in `select` declaration order.
    pub fn build(&self) -> ProjectionResult<Vec<ProjectionItem>> {
        let aggregated = self.resolved.is_aggregated();
        let mut items: Vec<ProjectionItem> = Vec::with_capacity(self.resolved.select.len());
        // Per item: (raw key, output name was defaulted)
        let mut origins: Vec<(&str, bool)> = Vec::with_capacity(self.resolved.select.len());

        for entry in &self.resolved.select {
            let source = match &entry.source {
                SelectRef::Resolved(source) => source.clone(),
                SelectRef::Ambiguous { column, aliases } => {
                    return Err(ProjectionError::AmbiguousOutput {
                        name: column.clone(),
                        sources: aliases.iter().map(|a| format!("{}.{}", a, column)).collect(),
                    })
                }
            };

            if aggregated {
                if let ProjectionSource::Column(col) = &source {
                    if !self.resolved.group_by.contains(col) {
                        return Err(ProjectionError::UngroupedColumn {
                            column: col.to_string(),
                        });
                    }
                }
            }

            let (output_name, defaulted) = match &entry.output_name {
                Some(name) => (name.clone(), false),
                None => (default_output_name(&source), true),
            };

            if let Some(prev) = items.iter().position(|p| p.output_name == output_name) {
                let (prev_raw, prev_defaulted) = origins[prev];
                return Err(if defaulted || prev_defaulted {
                    ProjectionError::AmbiguousOutput {
                        name: output_name,
                        sources: vec![prev_raw.to_string(), entry.raw.clone()],
                    }
                } else {
                    ProjectionError::DuplicateOutputName { name: output_name }
                });
            }

            origins.push((entry.raw.as_str(), defaulted));
            items.push(ProjectionItem {
                source,
                output_name,
            });
        }

        Ok(items)
    }
}

fn default_output_name(source: &ProjectionSource) -> String {
    match source {
        ProjectionSource::Column(col) => col.column.clone(),
        ProjectionSource::Aggregate(agg) => agg.label(),
    }
}
