//! Constraint reformulation
//!
//! Rewrites high level business rules into the primitive rows the backends
//! understand, so the tool orchestrators stay backend agnostic. Selection
//! rules become linear rows over binary variables; scheduling rules become
//! rows over the time indexed indicator layout; quadratic risk passes through
//! untouched as a [`Constraint::QuadraticCap`] for the conic backend.
//!
//! Every rule kind is matched exhaustively: adding a new variant is a
//! compile time checked change, not an if/else chain edit.
use indexmap::IndexMap;

use crate::io::request::{ResourceSpec, RuleSpec, ScheduleRuleSpec, TaskSpec};
use crate::optimize::constraint::{Constraint, QuadraticTerm};
use crate::optimize::problem::{Problem, ProblemError};

// region Selection rules

/// Apply business rules over binary selection variables
///
/// Variables named after the items must already exist in the problem.
pub fn apply_selection_rules(
    problem: &mut Problem,
    rules: &[RuleSpec],
) -> Result<(), ProblemError> {
    for (index, rule) in rules.iter().enumerate() {
        match rule {
            RuleSpec::Min {
                items,
                limit,
                description,
            } => {
                let refs: Vec<&str> = items.iter().map(String::as_str).collect();
                problem.add_new_greater_equal_constraint(
                    &rule_id("custom_min", description, index),
                    &refs,
                    &vec![1.0; refs.len()],
                    *limit,
                )?;
            }
            RuleSpec::Max {
                items,
                limit,
                description,
            } => {
                let refs: Vec<&str> = items.iter().map(String::as_str).collect();
                problem.add_new_less_equal_constraint(
                    &rule_id("custom_max", description, index),
                    &refs,
                    &vec![1.0; refs.len()],
                    *limit,
                )?;
            }
            // if A then B becomes x_B - x_A >= 0
            RuleSpec::Conditional {
                condition_item,
                then_item,
                description,
            } => {
                problem.add_new_greater_equal_constraint(
                    &rule_id("conditional", description, index),
                    &[then_item.as_str(), condition_item.as_str()],
                    &[1.0, -1.0],
                    0.0,
                )?;
            }
            // at least k of the items
            RuleSpec::Disjunctive {
                items,
                min_selected,
                description,
            } => {
                let refs: Vec<&str> = items.iter().map(String::as_str).collect();
                problem.add_new_greater_equal_constraint(
                    &rule_id("disjunctive", description, index),
                    &refs,
                    &vec![1.0; refs.len()],
                    *min_selected as f64,
                )?;
            }
            // exactly k of the items
            RuleSpec::Mutex {
                items,
                exactly,
                description,
            } => {
                let refs: Vec<&str> = items.iter().map(String::as_str).collect();
                problem.add_new_equality_constraint(
                    &rule_id("mutex", description, index),
                    &refs,
                    &vec![1.0; refs.len()],
                    *exactly as f64,
                )?;
            }
        }
    }
    Ok(())
}

fn rule_id(kind: &str, description: &Option<String>, index: usize) -> String {
    match description {
        Some(description) => format!("{kind}_{description}_{index}"),
        None => format!("{kind}_{index}"),
    }
}

// endregion Selection rules

// region Quadratic risk pass-through

/// Build the quadratic terms of `xᵀΣx` from a symmetric matrix, for use in a
/// quadratic objective or a [`Constraint::QuadraticCap`]
///
/// Off diagonal entries are emitted once with a doubled coefficient, so the
/// term list evaluates to the full quadratic form.
pub fn quadratic_form_terms(matrix: &[Vec<f64>], variable_ids: &[&str]) -> Vec<QuadraticTerm> {
    let mut terms = Vec::new();
    for i in 0..variable_ids.len() {
        for j in i..variable_ids.len() {
            let coefficient = if i == j {
                matrix[i][j]
            } else {
                matrix[i][j] + matrix[j][i]
            };
            if coefficient != 0.0 {
                terms.push(QuadraticTerm {
                    variable1: variable_ids[i].to_string(),
                    variable2: variable_ids[j].to_string(),
                    coefficient,
                });
            }
        }
    }
    terms
}

// endregion Quadratic risk pass-through

// region Time indexed scheduling

/// The time indexed indicator layout for scheduling problems:
/// `x[task, t] = 1` iff the task starts at time `t`
#[derive(Debug, Clone)]
pub struct TimeIndexedLayout {
    /// Scheduling window `[0, horizon)`
    pub horizon: u32,
    tasks: IndexMap<String, TaskStarts>,
}

#[derive(Debug, Clone)]
struct TaskStarts {
    duration: u32,
    /// Indicator variable ids indexed by start time
    variables: Vec<String>,
}

impl TimeIndexedLayout {
    /// Build the layout for validated tasks
    pub fn new(tasks: &[TaskSpec], horizon: u32) -> Self {
        let mut layout = IndexMap::new();
        for task in tasks {
            let max_start = horizon - task.duration;
            let variables = (0..=max_start)
                .map(|t| format!("{}_t{}", task.name, t))
                .collect();
            layout.insert(
                task.name.clone(),
                TaskStarts {
                    duration: task.duration,
                    variables,
                },
            );
        }
        TimeIndexedLayout {
            horizon,
            tasks: layout,
        }
    }

    /// Add one binary indicator per feasible (task, start time) pair
    pub fn add_variables(&self, problem: &mut Problem) -> Result<(), ProblemError> {
        for starts in self.tasks.values() {
            for variable in &starts.variables {
                problem.add_new_binary_variable(variable)?;
            }
        }
        Ok(())
    }

    /// Duration of a task
    pub fn duration(&self, task: &str) -> u32 {
        self.tasks[task].duration
    }

    /// Indicator variable ids of a task with their start times
    pub fn start_variables(&self, task: &str) -> impl Iterator<Item = (u32, &str)> {
        self.tasks[task]
            .variables
            .iter()
            .enumerate()
            .map(|(t, id)| (t as u32, id.as_str()))
    }

    /// Indicator variables of starts that make the task active at time `t`
    pub fn active_at(&self, task: &str, t: u32) -> Vec<&str> {
        let starts = &self.tasks[task];
        self.start_variables(task)
            .filter(|(s, _)| *s <= t && t < s + starts.duration)
            .map(|(_, id)| id)
            .collect()
    }

    /// Decode the chosen start time of a task from indicator values
    pub fn decode_start<F: Fn(&str) -> f64>(&self, task: &str, value_of: F) -> Option<u32> {
        self.start_variables(task)
            .find(|(_, id)| value_of(id) > 0.5)
            .map(|(t, _)| t)
    }
}

/// Each task starts exactly once
pub fn add_start_once_rows(
    problem: &mut Problem,
    layout: &TimeIndexedLayout,
    tasks: &[TaskSpec],
) -> Result<(), ProblemError> {
    for task in tasks {
        let refs: Vec<&str> = layout.start_variables(&task.name).map(|(_, id)| id).collect();
        problem.add_new_equality_constraint(
            &format!("start_once_{}", task.name),
            &refs,
            &vec![1.0; refs.len()],
            1.0,
        )?;
    }
    Ok(())
}

/// Dependency precedence: the task may start only after the dependency ends,
/// expressed over the indicator weighted start times as
/// `Σ t·x[task,t] - Σ t·x[dep,t] >= duration(dep)`
pub fn add_precedence_row(
    problem: &mut Problem,
    layout: &TimeIndexedLayout,
    task: &str,
    dependency: &str,
) -> Result<(), ProblemError> {
    let mut refs: Vec<&str> = Vec::new();
    let mut coefficients: Vec<f64> = Vec::new();
    for (t, id) in layout.start_variables(task) {
        refs.push(id);
        coefficients.push(t as f64);
    }
    for (t, id) in layout.start_variables(dependency) {
        refs.push(id);
        coefficients.push(-(t as f64));
    }
    problem.add_new_greater_equal_constraint(
        &format!("precedence_{dependency}_to_{task}"),
        &refs,
        &coefficients,
        layout.duration(dependency) as f64,
    )?;
    Ok(())
}

/// Per time period resource capacity rows
pub fn add_resource_rows(
    problem: &mut Problem,
    layout: &TimeIndexedLayout,
    tasks: &[TaskSpec],
    resources: &IndexMap<String, ResourceSpec>,
) -> Result<(), ProblemError> {
    for (resource_name, resource) in resources {
        for t in 0..layout.horizon {
            let mut refs: Vec<&str> = Vec::new();
            let mut coefficients: Vec<f64> = Vec::new();
            for task in tasks {
                let requirement = task.resources.get(resource_name).copied().unwrap_or(0.0);
                if requirement > 0.0 {
                    for id in layout.active_at(&task.name, t) {
                        refs.push(id);
                        coefficients.push(requirement);
                    }
                }
            }
            if !refs.is_empty() {
                problem.add_new_less_equal_constraint(
                    &format!("resource_{resource_name}_t{t}"),
                    &refs,
                    &coefficients,
                    resource.total,
                )?;
            }
        }
    }
    Ok(())
}

/// Apply temporal schedule rules
pub fn apply_schedule_rules(
    problem: &mut Problem,
    layout: &TimeIndexedLayout,
    rules: &[ScheduleRuleSpec],
) -> Result<(), ProblemError> {
    for rule in rules {
        match rule {
            // start + duration <= deadline over the indicator weighted ends
            ScheduleRuleSpec::Deadline { task, time } => {
                let duration = layout.duration(task);
                let mut refs: Vec<&str> = Vec::new();
                let mut coefficients: Vec<f64> = Vec::new();
                for (t, id) in layout.start_variables(task) {
                    refs.push(id);
                    coefficients.push((t + duration) as f64);
                }
                problem.add_new_less_equal_constraint(
                    &format!("deadline_{task}"),
                    &refs,
                    &coefficients,
                    *time as f64,
                )?;
            }
            // starts before the release time are fixed to zero
            ScheduleRuleSpec::Release { task, time } => {
                let variables: Vec<String> = layout
                    .start_variables(task)
                    .filter(|(t, _)| t < time)
                    .map(|(_, id)| id.to_string())
                    .collect();
                for id in variables {
                    problem.update_variable_bounds(&id, 0.0, 0.0)?;
                }
            }
            // cap on concurrently active tasks in every period
            ScheduleRuleSpec::ParallelLimit { limit } => {
                for t in 0..layout.horizon {
                    let mut refs: Vec<&str> = Vec::new();
                    for task in layout.tasks.keys() {
                        refs.extend(layout.active_at(task, t));
                    }
                    if !refs.is_empty() {
                        problem.add_new_less_equal_constraint(
                            &format!("parallel_limit_t{t}"),
                            &refs,
                            &vec![1.0; refs.len()],
                            *limit as f64,
                        )?;
                    }
                }
            }
        }
    }
    Ok(())
}

// endregion Time indexed scheduling

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::constraint::Constraint;

    fn selection_problem(items: &[&str]) -> Problem {
        let mut problem = Problem::new_maximization();
        for item in items {
            problem.add_new_binary_variable(item).unwrap();
        }
        problem
    }

    #[test]
    fn conditional_rules_become_implication_rows() {
        let mut problem = selection_problem(&["a", "b"]);
        let rule = RuleSpec::Conditional {
            condition_item: "a".to_string(),
            then_item: "b".to_string(),
            description: None,
        };
        apply_selection_rules(&mut problem, &[rule]).unwrap();
        let constraint = problem.constraints.get("conditional_0").unwrap();
        match constraint {
            Constraint::Inequality {
                terms, lower_bound, ..
            } => {
                // x_b - x_a >= 0
                assert_eq!(terms.len(), 2);
                assert_eq!(terms[0].variable, "b");
                assert!((terms[0].coefficient - 1.0).abs() < 1e-12);
                assert_eq!(terms[1].variable, "a");
                assert!((terms[1].coefficient + 1.0).abs() < 1e-12);
                assert!((lower_bound - 0.0).abs() < 1e-12);
            }
            other => panic!("expected inequality, got {other:?}"),
        }
    }

    #[test]
    fn disjunctive_and_mutex_rules_count_selections() {
        let mut problem = selection_problem(&["a", "b", "c"]);
        let rules = [
            RuleSpec::Disjunctive {
                items: vec!["a".to_string(), "b".to_string()],
                min_selected: 1,
                description: None,
            },
            RuleSpec::Mutex {
                items: vec!["b".to_string(), "c".to_string()],
                exactly: 1,
                description: None,
            },
        ];
        apply_selection_rules(&mut problem, &rules).unwrap();
        assert!(matches!(
            problem.constraints.get("disjunctive_0").unwrap(),
            Constraint::Inequality { .. }
        ));
        match problem.constraints.get("mutex_1").unwrap() {
            Constraint::Equality { equals, terms } => {
                assert!((equals - 1.0).abs() < 1e-12);
                assert_eq!(terms.len(), 2);
            }
            other => panic!("expected equality, got {other:?}"),
        }
    }

    #[test]
    fn quadratic_form_terms_double_off_diagonals() {
        let matrix = vec![vec![0.04, 0.01], vec![0.01, 0.02]];
        let terms = quadratic_form_terms(&matrix, &["w0", "w1"]);
        assert_eq!(terms.len(), 3);
        // diagonal entries stay, the symmetric pair is folded into one term
        assert!((terms[0].coefficient - 0.04).abs() < 1e-12);
        assert!((terms[1].coefficient - 0.02).abs() < 1e-12);
        let cross = terms
            .iter()
            .find(|t| t.variable1 != t.variable2)
            .unwrap();
        assert!((cross.coefficient - 0.02).abs() < 1e-12);
    }

    #[test]
    fn layout_enumerates_feasible_starts_only() {
        let tasks = vec![TaskSpec {
            name: "a".to_string(),
            duration: 3,
            value: 0.0,
            dependencies: vec![],
            resources: IndexMap::new(),
        }];
        let layout = TimeIndexedLayout::new(&tasks, 5);
        let starts: Vec<u32> = layout.start_variables("a").map(|(t, _)| t).collect();
        assert_eq!(starts, vec![0, 1, 2]);
        assert_eq!(layout.active_at("a", 0), vec!["a_t0"]);
        assert_eq!(layout.active_at("a", 2), vec!["a_t0", "a_t1", "a_t2"]);
        assert_eq!(layout.active_at("a", 4), vec!["a_t2"]);
    }

    #[test]
    fn precedence_rows_weight_start_indicators() {
        let tasks = vec![
            TaskSpec {
                name: "a".to_string(),
                duration: 2,
                value: 0.0,
                dependencies: vec![],
                resources: IndexMap::new(),
            },
            TaskSpec {
                name: "b".to_string(),
                duration: 1,
                value: 0.0,
                dependencies: vec!["a".to_string()],
                resources: IndexMap::new(),
            },
        ];
        let layout = TimeIndexedLayout::new(&tasks, 4);
        let mut problem = Problem::new_minimization();
        layout.add_variables(&mut problem).unwrap();
        add_precedence_row(&mut problem, &layout, "b", "a").unwrap();
        match problem.constraints.get("precedence_a_to_b").unwrap() {
            Constraint::Inequality {
                terms, lower_bound, ..
            } => {
                // rhs is the dependency duration
                assert!((lower_bound - 2.0).abs() < 1e-12);
                // b has starts 0..=3, a has starts 0..=2
                assert_eq!(terms.len(), 4 + 3);
            }
            other => panic!("expected inequality, got {other:?}"),
        }
    }
}
