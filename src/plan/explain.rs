//! Text rendering of a plan, one step per line.

use std::fmt::Write;

use super::{ProjectionSource, QueryPlan, SortDirection};

impl QueryPlan {
    /// Render the plan in execution order.
    ///
    /// ```text
    /// plan staff
    ///   scan emp <- employee
    ///   join inner dep <- department on emp.department_id == dep.department_id
    ///   filter emp.status == 'active'
    ///   project emp.name as employee_name, dep.name as dept_name
    ///   sort employee_name asc
    /// ```
    pub fn explain(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "plan {}", self.name);

        if let Some(root) = self.table(&self.root) {
            let _ = writeln!(out, "  scan {} <- {}", root.alias, root.physical_name);
        }

        for join in &self.joins {
            let physical = self
                .table(&join.right_alias)
                .map(|t| t.physical_name.as_str())
                .unwrap_or("?");
            let _ = writeln!(
                out,
                "  join {} {} <- {} on {} == {}",
                join.join_type, join.right_alias, physical, join.left_key, join.right_key
            );
        }

        if let Some(filter) = &self.filter {
            let _ = writeln!(out, "  filter {}", filter);
        }

        if let Some(agg) = &self.aggregation {
            let groups: Vec<String> = agg.group_by.iter().map(|c| c.to_string()).collect();
            let aggs: Vec<String> = agg.aggregates.iter().map(|a| a.label()).collect();
            let _ = writeln!(
                out,
                "  aggregate by [{}] compute [{}]",
                groups.join(", "),
                aggs.join(", ")
            );
        }

        if let Some(having) = &self.having {
            let _ = writeln!(out, "  having {}", having);
        }

        let columns: Vec<String> = self
            .projection
            .iter()
            .map(|item| {
                let source = match &item.source {
                    ProjectionSource::Column(col) => col.to_string(),
                    ProjectionSource::Aggregate(agg) => agg.label(),
                };
                format!("{} as {}", source, item.output_name)
            })
            .collect();
        let _ = writeln!(out, "  project {}", columns.join(", "));

        if !self.sort.is_empty() {
            let keys: Vec<String> = self
                .sort
                .iter()
                .map(|k| {
                    let dir = match k.direction {
                        SortDirection::Asc => "asc",
                        SortDirection::Desc => "desc",
                    };
                    format!("{} {}", k.column, dir)
                })
                .collect();
            let _ = writeln!(out, "  sort {}", keys.join(", "));
        }

        out
    }
}
