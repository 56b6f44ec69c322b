//! Task scheduling tool
//!
//! Schedules tasks with dependencies and shared resources on an integer time
//! axis via a time indexed MILP. Reports the makespan, the critical path
//! (traced backward through the latest finishing predecessors), and per
//! period resource utilization.
use indexmap::IndexMap;

use crate::io::monte_carlo;
use crate::io::request::{ScheduleObjective, ScheduleRequest, TaskSpec};
use crate::io::validate;
use crate::optimize::problem::Problem;
use crate::optimize::reformulate::{
    add_precedence_row, add_resource_rows, add_start_once_rows, apply_schedule_rules,
    TimeIndexedLayout,
};
use crate::optimize::variable::VariableType;
use crate::optimize::{selector, ProblemSolution};
use crate::tools::result::{
    normal_assumption, MonteCarloCompatible, OptimizationResult, PeriodUsage, ResultStatus,
    SuccessCriteria, TaskOutcome, ToolAnalytics,
};
use crate::tools::OptimizeError;

/// Optimize task scheduling with dependencies and resource constraints
pub fn optimize_schedule(
    request: &ScheduleRequest,
) -> Result<OptimizationResult, OptimizeError> {
    validate::validate_resources(&request.resources)?;
    if let Some(integration) = &request.monte_carlo_integration {
        validate::validate_mc_integration(integration)?;
    }

    // Apply Monte Carlo overrides to durations/values first, then validate
    // the effective task set (an overridden duration can break the horizon)
    let mut tasks = request.tasks.clone();
    if let Some(integration) = &request.monte_carlo_integration {
        let resolved = monte_carlo::resolve_values(integration)?;
        for task in &mut tasks {
            if let Some(duration) = resolved.get(&format!("{}_duration", task.name)) {
                task.duration = duration.round().max(1.0) as u32;
            }
            if let Some(value) = resolved.get(&format!("{}_value", task.name)) {
                task.value = *value;
            }
        }
    }
    validate::validate_tasks(&tasks, request.time_horizon, &request.resources)?;
    validate::validate_schedule_rules(&request.constraints, &tasks)?;

    let layout = TimeIndexedLayout::new(&tasks, request.time_horizon);
    let mut problem = match request.optimization_objective {
        ScheduleObjective::MinimizeMakespan => Problem::new_minimization(),
        ScheduleObjective::MaximizeValue => Problem::new_maximization(),
    };
    layout.add_variables(&mut problem)?;

    match request.optimization_objective {
        ScheduleObjective::MinimizeMakespan => {
            problem.add_new_variable(
                "makespan",
                VariableType::Continuous,
                0.0,
                request.time_horizon as f64,
            )?;
            problem.add_linear_objective_term("makespan", 1.0)?;
            // makespan >= indicator weighted end time of every task
            for task in &tasks {
                let duration = layout.duration(&task.name);
                let mut refs: Vec<&str> = vec!["makespan"];
                let mut coefficients: Vec<f64> = vec![1.0];
                for (t, id) in layout.start_variables(&task.name) {
                    refs.push(id);
                    coefficients.push(-((t + duration) as f64));
                }
                problem.add_new_greater_equal_constraint(
                    &format!("makespan_{}", task.name),
                    &refs,
                    &coefficients,
                    0.0,
                )?;
            }
        }
        ScheduleObjective::MaximizeValue => {
            for task in &tasks {
                for (_, id) in layout.start_variables(&task.name) {
                    problem.add_linear_objective_term(id, task.value)?;
                }
            }
        }
    }

    add_start_once_rows(&mut problem, &layout, &tasks)?;
    for task in &tasks {
        for dependency in &task.dependencies {
            add_precedence_row(&mut problem, &layout, &task.name, dependency)?;
        }
    }
    add_resource_rows(&mut problem, &layout, &tasks, &request.resources)?;
    apply_schedule_rules(&mut problem, &layout, &request.constraints)?;

    let options = request
        .solver_options
        .as_ref()
        .map(|spec| spec.to_options())
        .unwrap_or_default();
    let solution = selector::dispatch(&problem, &options)?;

    Ok(build_result(request, &tasks, &layout, &solution))
}

fn build_result(
    request: &ScheduleRequest,
    tasks: &[TaskSpec],
    layout: &TimeIndexedLayout,
    solution: &ProblemSolution,
) -> OptimizationResult {
    let objective_name = match request.optimization_objective {
        ScheduleObjective::MinimizeMakespan => "minimize_makespan",
        ScheduleObjective::MaximizeValue => "maximize_value",
    };
    let mut result = OptimizationResult::from_solution("milp", solution);
    result.solution = IndexMap::new();
    if !solution.is_feasible() {
        result.message = Some(infeasibility_message(
            result.status,
            tasks,
            request.time_horizon,
        ));
        return result;
    }

    // Decode the chosen start time of every task from the indicators
    let mut schedule: IndexMap<String, u32> = IndexMap::new();
    for task in tasks {
        if let Some(start) = layout.decode_start(&task.name, |id| solution.value_of(id)) {
            schedule.insert(task.name.clone(), start);
        }
    }
    result.solution = schedule
        .iter()
        .map(|(name, start)| (name.clone(), *start as f64))
        .collect();

    let durations: IndexMap<&str, u32> =
        tasks.iter().map(|t| (t.name.as_str(), t.duration)).collect();
    let makespan = schedule
        .iter()
        .map(|(name, start)| start + durations[name.as_str()])
        .max()
        .unwrap_or(0);
    let critical_path = trace_critical_path(&schedule, tasks);

    let resource_timeline = build_resource_timeline(request, tasks, &schedule);
    let task_outcomes: Vec<TaskOutcome> = tasks
        .iter()
        .filter_map(|task| {
            schedule.get(&task.name).map(|start| TaskOutcome {
                name: task.name.clone(),
                start_time: *start,
                end_time: start + task.duration,
                duration: task.duration,
                value: task.value,
                dependencies: task.dependencies.clone(),
                on_critical_path: critical_path.contains(&task.name),
            })
        })
        .collect();
    let total_value = match request.optimization_objective {
        ScheduleObjective::MaximizeValue => {
            Some(tasks.iter().map(|task| task.value).sum::<f64>())
        }
        ScheduleObjective::MinimizeMakespan => None,
    };

    result.analytics = ToolAnalytics::Schedule {
        optimization_objective: objective_name.to_string(),
        makespan,
        total_value,
        critical_path,
        tasks: task_outcomes,
        resource_timeline,
    };

    let assumptions = tasks
        .iter()
        .map(|task| {
            normal_assumption(
                format!("{}_duration", task.name),
                task.duration as f64,
                0.15,
            )
        })
        .collect();
    result.monte_carlo_compatible = Some(
        MonteCarloCompatible::new(
            result.solution.clone(),
            Vec::new(),
            assumptions,
            format!("Project makespan with {} tasks", schedule.len()),
            format!("Task scheduling with {} tasks", schedule.len()),
            Some(SuccessCriteria {
                threshold: makespan as f64 * 1.10,
                comparison: "<=".to_string(),
            }),
        )
        .with_expected_value(makespan as f64),
    );
    result
}

/// Backward trace from the task with the latest finish through whichever
/// predecessor finishes latest at each step
fn trace_critical_path(schedule: &IndexMap<String, u32>, tasks: &[TaskSpec]) -> Vec<String> {
    let task_of: IndexMap<&str, &TaskSpec> =
        tasks.iter().map(|t| (t.name.as_str(), t)).collect();
    let end_of = |name: &str| -> u32 {
        schedule
            .get(name)
            .map(|start| start + task_of[name].duration)
            .unwrap_or(0)
    };

    let Some(mut current) = schedule
        .keys()
        .max_by_key(|name| end_of(name.as_str()))
        .cloned()
    else {
        return Vec::new();
    };

    let mut path = vec![current.clone()];
    loop {
        let dependencies = &task_of[current.as_str()].dependencies;
        let Some(predecessor) = dependencies
            .iter()
            .max_by_key(|dependency| end_of(dependency.as_str()))
        else {
            break;
        };
        current = predecessor.clone();
        path.insert(0, current.clone());
    }
    path
}

/// Per resource, per period usage over the scheduling window
fn build_resource_timeline(
    request: &ScheduleRequest,
    tasks: &[TaskSpec],
    schedule: &IndexMap<String, u32>,
) -> IndexMap<String, Vec<PeriodUsage>> {
    let mut timeline = IndexMap::new();
    for (resource_name, resource) in &request.resources {
        let mut periods = Vec::with_capacity(request.time_horizon as usize);
        for t in 0..request.time_horizon {
            let used: f64 = tasks
                .iter()
                .filter_map(|task| {
                    let start = *schedule.get(&task.name)?;
                    if start <= t && t < start + task.duration {
                        task.resources.get(resource_name).copied()
                    } else {
                        None
                    }
                })
                .sum();
            periods.push(PeriodUsage {
                time: t,
                used,
                available: resource.total,
                utilization_pct: if resource.total > 0.0 {
                    used / resource.total * 100.0
                } else {
                    0.0
                },
            });
        }
        timeline.insert(resource_name.clone(), periods);
    }
    timeline
}

fn infeasibility_message(status: ResultStatus, tasks: &[TaskSpec], time_horizon: u32) -> String {
    if status == ResultStatus::Infeasible {
        let total_duration: u32 = tasks.iter().map(|t| t.duration).sum();
        if total_duration > time_horizon {
            format!(
                "Schedule is infeasible. Total task duration ({total_duration}) exceeds the \
                 time horizon ({time_horizon}); increase time_horizon or reduce durations."
            )
        } else {
            "Schedule is infeasible. Resource limits, deadlines, or release times cannot all \
             be met within the time horizon."
                .to_string()
        }
    } else {
        format!("Scheduling optimization failed with status: {status}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::parse_request;
    use crate::io::validate::ValidationError;

    fn chain_request(time_horizon: u32) -> ScheduleRequest {
        parse_request(&format!(
            r#"{{
                "tasks": [
                    {{"name": "design", "duration": 5, "dependencies": []}},
                    {{"name": "build", "duration": 10, "dependencies": ["design"]}},
                    {{"name": "test", "duration": 3, "dependencies": ["build"]}}
                ],
                "resources": {{}},
                "time_horizon": {time_horizon}
            }}"#
        ))
        .unwrap()
    }

    #[test]
    fn a_strict_chain_schedules_back_to_back() {
        let result = optimize_schedule(&chain_request(18)).unwrap();
        assert_eq!(result.status, ResultStatus::Optimal);
        assert!((result.solution["design"]).abs() < 1e-9);
        assert!((result.solution["build"] - 5.0).abs() < 1e-9);
        assert!((result.solution["test"] - 15.0).abs() < 1e-9);
        match &result.analytics {
            ToolAnalytics::Schedule {
                makespan,
                critical_path,
                tasks,
                ..
            } => {
                assert_eq!(*makespan, 18);
                assert_eq!(critical_path, &["design", "build", "test"]);
                assert!(tasks.iter().all(|t| t.on_critical_path));
            }
            other => panic!("expected schedule analytics, got {other:?}"),
        }
    }

    #[test]
    fn an_overlong_chain_is_infeasible_with_an_explanation() {
        let result = optimize_schedule(&chain_request(17)).unwrap();
        assert_eq!(result.status, ResultStatus::Infeasible);
        let message = result.message.unwrap();
        assert!(message.contains("18"));
        assert!(message.contains("17"));
    }

    #[test]
    fn scarce_resources_serialize_independent_tasks() {
        let request: ScheduleRequest = parse_request(
            r#"{
                "tasks": [
                    {"name": "a", "duration": 2, "resources": {"worker": 1}},
                    {"name": "b", "duration": 2, "resources": {"worker": 1}}
                ],
                "resources": {"worker": {"total": 1}},
                "time_horizon": 4
            }"#,
        )
        .unwrap();
        let result = optimize_schedule(&request).unwrap();
        assert_eq!(result.status, ResultStatus::Optimal);
        let a = result.solution["a"];
        let b = result.solution["b"];
        // one task must wait for the other
        assert!((a - b).abs() >= 2.0 - 1e-9);
        match &result.analytics {
            ToolAnalytics::Schedule {
                makespan,
                resource_timeline,
                ..
            } => {
                assert_eq!(*makespan, 4);
                let worker = &resource_timeline["worker"];
                assert_eq!(worker.len(), 4);
                assert!(worker
                    .iter()
                    .all(|period| (period.utilization_pct - 100.0).abs() < 1e-9));
            }
            other => panic!("expected schedule analytics, got {other:?}"),
        }
    }

    #[test]
    fn release_times_delay_starts() {
        let request: ScheduleRequest = parse_request(
            r#"{
                "tasks": [{"name": "a", "duration": 2}],
                "resources": {},
                "time_horizon": 6,
                "constraints": [{"type": "release", "task": "a", "time": 3}]
            }"#,
        )
        .unwrap();
        let result = optimize_schedule(&request).unwrap();
        assert!(result.solution["a"] >= 3.0 - 1e-9);
    }

    #[test]
    fn impossible_deadlines_are_infeasible() {
        let request: ScheduleRequest = parse_request(
            r#"{
                "tasks": [{"name": "a", "duration": 5}],
                "resources": {},
                "time_horizon": 10,
                "constraints": [{"type": "deadline", "task": "a", "time": 3}]
            }"#,
        )
        .unwrap();
        let result = optimize_schedule(&request).unwrap();
        assert_eq!(result.status, ResultStatus::Infeasible);
    }

    #[test]
    fn parallel_limits_cap_concurrency() {
        let request: ScheduleRequest = parse_request(
            r#"{
                "tasks": [
                    {"name": "a", "duration": 2},
                    {"name": "b", "duration": 2},
                    {"name": "c", "duration": 2}
                ],
                "resources": {},
                "time_horizon": 6,
                "constraints": [{"type": "parallel_limit", "limit": 1}]
            }"#,
        )
        .unwrap();
        let result = optimize_schedule(&request).unwrap();
        assert_eq!(result.status, ResultStatus::Optimal);
        match &result.analytics {
            ToolAnalytics::Schedule { makespan, .. } => assert_eq!(*makespan, 6),
            other => panic!("expected schedule analytics, got {other:?}"),
        }
    }

    #[test]
    fn maximize_value_reports_the_total() {
        let request: ScheduleRequest = parse_request(
            r#"{
                "tasks": [
                    {"name": "a", "duration": 1, "value": 10},
                    {"name": "b", "duration": 1, "value": 5}
                ],
                "resources": {},
                "time_horizon": 4,
                "optimization_objective": "maximize_value"
            }"#,
        )
        .unwrap();
        let result = optimize_schedule(&request).unwrap();
        match &result.analytics {
            ToolAnalytics::Schedule { total_value, .. } => {
                assert!((total_value.unwrap() - 15.0).abs() < 1e-9);
            }
            other => panic!("expected schedule analytics, got {other:?}"),
        }
    }

    #[test]
    fn dependency_cycles_fail_validation() {
        let request: ScheduleRequest = parse_request(
            r#"{
                "tasks": [
                    {"name": "a", "duration": 1, "dependencies": ["b"]},
                    {"name": "b", "duration": 1, "dependencies": ["a"]}
                ],
                "resources": {},
                "time_horizon": 5
            }"#,
        )
        .unwrap();
        let error = optimize_schedule(&request).unwrap_err();
        assert!(matches!(
            error,
            OptimizeError::Validation(ValidationError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn monte_carlo_durations_reshape_the_schedule() {
        let request: ScheduleRequest = parse_request(
            r#"{
                "tasks": [{"name": "a", "duration": 2}],
                "resources": {},
                "time_horizon": 10,
                "monte_carlo_integration": {
                    "mode": "expected",
                    "mc_output": {"expected_outcome": {"a_duration": 4.0}}
                }
            }"#,
        )
        .unwrap();
        let result = optimize_schedule(&request).unwrap();
        match &result.analytics {
            ToolAnalytics::Schedule { makespan, tasks, .. } => {
                assert_eq!(*makespan, 4);
                assert_eq!(tasks[0].duration, 4);
            }
            other => panic!("expected schedule analytics, got {other:?}"),
        }
    }
}
