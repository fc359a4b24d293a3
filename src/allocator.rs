use crate::error::AllocationError;
use crate::models::{AllocatedStudent, CapacityMode, Channel, Config, StudentRecord};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Reason recorded when the primary allocator seats a student.
pub const REASON_ACCEPTED_WITHIN_CAPACITY: &str = "accepted within capacity";

/// Reason recorded for every student processed by the override allocator,
/// admitted or not.
pub fn override_reason(margin: i32) -> String {
    format!(
        "staff children: over-capacity admission requires score >= department minimum - {}",
        margin
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct DepartmentStat {
    pub channel: Channel,
    pub department: String,
    pub accepted: usize,
    pub min_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RosterStats {
    pub total: usize,
    pub general: usize,
    pub martyrs_kin: usize,
    pub parallel: usize,
}

impl RosterStats {
    pub fn channel_count(&self, channel: Channel) -> usize {
        match channel {
            Channel::General => self.general,
            Channel::MartyrsKin => self.martyrs_kin,
            Channel::Parallel => self.parallel,
        }
    }
}

/// One channel's completed allocation: the primary block (processing order)
/// followed by the override block (input order).
#[derive(Debug, Clone)]
pub struct ChannelAllocation {
    pub channel: Channel,
    pub students: Vec<AllocatedStudent>,
    /// Lowest accepted score per department after the primary pass only.
    pub primary_minimums: HashMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct AllocationOutcome {
    /// Departments discovered across the whole roster, sorted.
    pub departments: Vec<String>,
    pub channels: Vec<ChannelAllocation>,
    pub department_stats: Vec<DepartmentStat>,
    pub roster: RosterStats,
}

impl AllocationOutcome {
    pub fn all_students(&self) -> impl Iterator<Item = &AllocatedStudent> {
        self.channels.iter().flat_map(|channel| channel.students.iter())
    }
}

/// Departments are identified by bare name and discovered from whatever
/// shows up in any preference list, deduplicated and sorted so capacity
/// planning has a stable iteration order.
pub fn discover_departments(students: &[StudentRecord]) -> Vec<String> {
    let mut departments = BTreeSet::new();
    for student in students {
        for department in &student.preferences {
            if !department.is_empty() {
                departments.insert(department.clone());
            }
        }
    }
    departments.into_iter().collect()
}

/// Stable partition of the roster into the three channel groups, in the
/// fixed channel order. Every student lands in exactly one group.
pub fn partition_by_channel(students: &[StudentRecord]) -> Vec<(Channel, Vec<StudentRecord>)> {
    Channel::ALL
        .iter()
        .map(|&channel| {
            let group: Vec<StudentRecord> = students
                .iter()
                .filter(|student| student.channel == channel)
                .cloned()
                .collect();
            (channel, group)
        })
        .collect()
}

/// Equal split: every department gets floor(n/d) seats and the first
/// `n mod d` departments (in discovery order) get one extra, so the total
/// equals the channel's student count exactly.
pub fn plan_equal_capacities(
    channel: Channel,
    student_count: usize,
    departments: &[String],
) -> Result<HashMap<String, u32>, AllocationError> {
    if departments.is_empty() {
        return Err(AllocationError::NoDepartments);
    }

    let base = (student_count / departments.len()) as u32;
    let remainder = student_count % departments.len();

    let capacities: HashMap<String, u32> = departments
        .iter()
        .enumerate()
        .map(|(index, department)| (department.clone(), base + u32::from(index < remainder)))
        .collect();

    if student_count > 0 && capacities.values().sum::<u32>() == 0 {
        return Err(AllocationError::ZeroEqualCapacity { channel });
    }
    Ok(capacities)
}

/// Manual mode: seats come from the supplied mapping, departments it does
/// not mention get 0.
pub fn plan_manual_capacities(
    supplied: &HashMap<String, u32>,
    departments: &[String],
) -> Result<HashMap<String, u32>, AllocationError> {
    if supplied.values().sum::<u32>() == 0 {
        return Err(AllocationError::ZeroManualCapacity);
    }
    Ok(departments
        .iter()
        .map(|department| {
            (
                department.clone(),
                supplied.get(department).copied().unwrap_or(0),
            )
        })
        .collect())
}

/// Greedy seat-respecting allocation of the non-privileged subset.
///
/// Students are taken in score-descending order; among equal scores the
/// earlier input row wins (stable sort). Each student gets the first
/// preference that still has an open seat, or stays unassigned with a
/// blank reason.
pub fn allocate_primary(
    students: &[StudentRecord],
    capacities: &HashMap<String, u32>,
) -> Vec<AllocatedStudent> {
    let mut ordered: Vec<StudentRecord> = students.to_vec();
    ordered.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut remaining = capacities.clone();
    let mut allocated = Vec::with_capacity(ordered.len());

    for record in ordered {
        let mut assigned = None;
        let mut reason = String::new();

        for department in &record.preferences {
            if let Some(seats) = remaining.get_mut(department) {
                if *seats > 0 {
                    *seats -= 1;
                    assigned = Some(department.clone());
                    reason = REASON_ACCEPTED_WITHIN_CAPACITY.to_string();
                    break;
                }
            }
        }

        allocated.push(AllocatedStudent {
            record,
            assigned,
            reason,
        });
    }

    allocated
}

/// Lowest accepted score per department. Departments nobody was accepted
/// into are absent from the mapping, which makes them ineligible for
/// override admission.
pub fn department_minimums(allocated: &[AllocatedStudent]) -> HashMap<String, f64> {
    let mut minimums: HashMap<String, f64> = HashMap::new();
    for student in allocated {
        if let Some(department) = &student.assigned {
            minimums
                .entry(department.clone())
                .and_modify(|min| *min = min.min(student.record.score))
                .or_insert(student.record.score);
        }
    }
    minimums
}

/// Over-capacity admission of the privileged cohort: first preference whose
/// recorded minimum the student reaches within the margin. Seats are never
/// checked or decremented here.
pub fn allocate_override(
    students: &[StudentRecord],
    minimums: &HashMap<String, f64>,
    margin: i32,
) -> Vec<AllocatedStudent> {
    let reason = override_reason(margin);

    students
        .iter()
        .map(|record| {
            let assigned = record
                .preferences
                .iter()
                .find(|department| {
                    minimums
                        .get(department.as_str())
                        .map_or(false, |min| record.score >= min - f64::from(margin))
                })
                .cloned();

            AllocatedStudent {
                record: record.clone(),
                assigned,
                reason: reason.clone(),
            }
        })
        .collect()
}

/// Per-department accepted count and minimum over a finished allocation,
/// sorted by department name.
pub fn department_stats(allocated: &[AllocatedStudent], channel: Channel) -> Vec<DepartmentStat> {
    let mut grouped: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for student in allocated {
        if let Some(department) = &student.assigned {
            let entry = grouped
                .entry(department.as_str())
                .or_insert((0, student.record.score));
            entry.0 += 1;
            entry.1 = entry.1.min(student.record.score);
        }
    }

    grouped
        .into_iter()
        .map(|(department, (accepted, min_score))| DepartmentStat {
            channel,
            department: department.to_string(),
            accepted,
            min_score,
        })
        .collect()
}

pub fn roster_stats(students: &[StudentRecord]) -> RosterStats {
    let mut stats = RosterStats {
        total: students.len(),
        general: 0,
        martyrs_kin: 0,
        parallel: 0,
    };
    for student in students {
        match student.channel {
            Channel::General => stats.general += 1,
            Channel::MartyrsKin => stats.martyrs_kin += 1,
            Channel::Parallel => stats.parallel += 1,
        }
    }
    stats
}

pub struct DepartmentAllocator {
    capacity_mode: CapacityMode,
    manual_capacities: HashMap<String, u32>,
    margin: i32,
}

impl DepartmentAllocator {
    pub fn new(
        capacity_mode: CapacityMode,
        manual_capacities: HashMap<String, u32>,
        margin: i32,
    ) -> Self {
        Self {
            capacity_mode,
            manual_capacities,
            margin,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.capacity_mode,
            config.manual_capacities.clone(),
            config.override_margin,
        )
    }

    /// Runs the whole pipeline: discover departments, then per channel plan
    /// capacities, allocate the non-privileged subset, derive minimums,
    /// allocate the privileged subset and aggregate statistics.
    ///
    /// Configuration errors are detected before any channel is allocated;
    /// a channel without students is skipped, which is a normal empty
    /// result rather than a failure.
    pub fn run(&self, students: &[StudentRecord]) -> Result<AllocationOutcome, AllocationError> {
        let departments = discover_departments(students);
        if departments.is_empty() {
            return Err(AllocationError::NoDepartments);
        }
        if self.capacity_mode == CapacityMode::Manual
            && self.manual_capacities.values().sum::<u32>() == 0
        {
            return Err(AllocationError::ZeroManualCapacity);
        }

        let mut channels = Vec::new();
        let mut stats = Vec::new();

        for (channel, group) in partition_by_channel(students) {
            if group.is_empty() {
                continue;
            }

            let capacities = match self.capacity_mode {
                CapacityMode::Equal => plan_equal_capacities(channel, group.len(), &departments)?,
                CapacityMode::Manual => {
                    plan_manual_capacities(&self.manual_capacities, &departments)?
                }
            };

            let (privileged, regular): (Vec<StudentRecord>, Vec<StudentRecord>) =
                group.into_iter().partition(|student| student.privileged);

            let mut allocated = allocate_primary(&regular, &capacities);
            let primary_minimums = department_minimums(&allocated);
            allocated.extend(allocate_override(&privileged, &primary_minimums, self.margin));

            stats.extend(department_stats(&allocated, channel));
            channels.push(ChannelAllocation {
                channel,
                students: allocated,
                primary_minimums,
            });
        }

        Ok(AllocationOutcome {
            departments,
            roster: roster_stats(students),
            department_stats: stats,
            channels,
        })
    }
}
