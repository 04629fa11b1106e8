//! Raw swarm readings as reported by a data source.
//!
//! A [`SwarmReadings`] value is everything one fetch produces: the robots,
//! the tasks, and the task-to-robot [`Allocation`]. Its JSON form is the
//! wire format served to the visualization front end.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{RobotId, TaskId};

/// Which robot currently owns which task.
///
/// Not required to be injective (a robot may own several tasks) nor total
/// (an unallocated task is simply absent). Task ids serialize as decimal
/// string keys.
pub type Allocation = BTreeMap<TaskId, RobotId>;

// ---------------------------------------------------------------------------
// RobotReading
// ---------------------------------------------------------------------------

/// One robot's reported position and status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RobotReading {
    /// Robot identifier.
    pub id: RobotId,
    /// X position in controller units.
    pub x: f64,
    /// Y position in controller units.
    pub y: f64,
    /// Battery level. Expected 0-100, passed through unchecked.
    pub battery: f64,
    /// Tasks currently assigned to this robot, in controller order.
    #[serde(rename = "tasks", default)]
    pub assigned_task_ids: Vec<TaskId>,
}

// ---------------------------------------------------------------------------
// TaskReading
// ---------------------------------------------------------------------------

/// One task's reported location and completion flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TaskReading {
    /// Task identifier.
    pub id: TaskId,
    /// X position in controller units.
    pub x: f64,
    /// Y position in controller units.
    pub y: f64,
    /// Whether the task has been completed.
    #[serde(default)]
    pub completed: bool,
}

// ---------------------------------------------------------------------------
// SwarmReadings
// ---------------------------------------------------------------------------

/// The three collections produced by a single fetch.
///
/// The default value is the empty-but-well-formed structure served before
/// any reading has been published.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SwarmReadings {
    /// Robots in reporting order.
    #[serde(default)]
    pub robots: Vec<RobotReading>,
    /// Tasks in reporting order.
    #[serde(default)]
    pub tasks: Vec<TaskReading>,
    /// Task-to-robot ownership.
    #[serde(default)]
    pub allocations: Allocation,
}

impl SwarmReadings {
    /// Look up a robot by id.
    pub fn robot(&self, id: RobotId) -> Option<&RobotReading> {
        self.robots.iter().find(|r| r.id == id)
    }

    /// Look up a task by id.
    pub fn task(&self, id: TaskId) -> Option<&TaskReading> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Tasks assigned to the given robot, resolved against the task list.
    ///
    /// Ids the robot reports that have no matching task are skipped.
    pub fn tasks_of(&self, id: RobotId) -> Vec<&TaskReading> {
        self.robot(id)
            .map(|robot| {
                robot
                    .assigned_task_ids
                    .iter()
                    .filter_map(|task_id| self.task(*task_id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of tasks flagged completed.
    pub fn completed_task_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }

    /// Number of tasks with no entry in the allocation map.
    pub fn unallocated_task_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| !self.allocations.contains_key(&t.id))
            .count()
    }

    /// Whether no robots, tasks, or allocations were reported.
    pub fn is_empty(&self) -> bool {
        self.robots.is_empty() && self.tasks.is_empty() && self.allocations.is_empty()
    }
}
