use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_WEEKLY_GOAL: u32 = 50;
pub const WEEKLY_GOAL_MIN: u32 = 1;
pub const WEEKLY_GOAL_MAX: u32 = 1000;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct GrowthPoint {
    pub date: NaiveDate,
    pub count: u32,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ActivitySlice {
    #[serde(rename = "type")]
    pub activity_type: String,
    pub count: u32,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub contacts_total: u32,
    #[serde(default)]
    pub contact_growth: Vec<GrowthPoint>,
    pub activities_this_week: u32,
    #[serde(default = "default_weekly_goal")]
    pub weekly_goal: u32,
    #[serde(default)]
    pub activity_breakdown: Vec<ActivitySlice>,
}

fn default_weekly_goal() -> u32 {
    DEFAULT_WEEKLY_GOAL
}

impl DashboardSummary {
    // A goal of zero on the wire is resolved to the default here, in one
    // place, so the completion percentage can never divide by zero.
    pub fn normalized(mut self) -> Self {
        if self.weekly_goal == 0 {
            self.weekly_goal = DEFAULT_WEEKLY_GOAL;
        }
        self
    }

    pub fn view_model(&self) -> DashboardViewModel {
        DashboardViewModel {
            contacts_total: self.contacts_total,
            cumulative_growth: cumulative_growth(&self.contact_growth),
            activities_this_week: self.activities_this_week,
            weekly_goal: self.weekly_goal,
            completion_percent: completion_percent(self.activities_this_week, self.weekly_goal),
            activity_breakdown: self.activity_breakdown.clone(),
            breakdown_total: breakdown_total(&self.activity_breakdown),
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CumulativePoint {
    pub date: NaiveDate,
    pub running_total: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardViewModel {
    pub contacts_total: u32,
    pub cumulative_growth: Vec<CumulativePoint>,
    pub activities_this_week: u32,
    pub weekly_goal: u32,
    pub completion_percent: u32,
    pub activity_breakdown: Vec<ActivitySlice>,
    pub breakdown_total: u64,
}

pub fn cumulative_growth(points: &[GrowthPoint]) -> Vec<CumulativePoint> {
    let mut running_total: u64 = 0;

    points
        .iter()
        .map(|point| {
            running_total += u64::from(point.count);
            CumulativePoint {
                date: point.date,
                running_total,
            }
        })
        .collect()
}

pub fn completion_percent(activities_this_week: u32, weekly_goal: u32) -> u32 {
    let goal = if weekly_goal == 0 {
        DEFAULT_WEEKLY_GOAL
    } else {
        weekly_goal
    };

    (f64::from(activities_this_week) / f64::from(goal) * 100.0).round() as u32
}

pub fn breakdown_total(slices: &[ActivitySlice]) -> u64 {
    slices.iter().map(|slice| u64::from(slice.count)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn growth(day: u32, count: u32) -> GrowthPoint {
        GrowthPoint {
            date: NaiveDate::from_ymd_opt(2026, 8, day).unwrap(),
            count,
        }
    }

    #[test]
    fn cumulative_growth_is_a_prefix_sum() {
        let points = vec![growth(1, 3), growth(2, 0), growth(3, 5), growth(4, 2)];
        let series = cumulative_growth(&points);

        assert_eq!(series.len(), points.len());
        let mut expected: u64 = 0;
        for (i, point) in points.iter().enumerate() {
            expected += u64::from(point.count);
            assert_eq!(series[i].date, point.date);
            assert_eq!(series[i].running_total, expected);
        }
    }

    #[test]
    fn cumulative_growth_is_non_decreasing() {
        let points = vec![growth(1, 7), growth(2, 0), growth(3, 1)];
        let series = cumulative_growth(&points);

        for pair in series.windows(2) {
            assert!(pair[1].running_total >= pair[0].running_total);
        }
    }

    #[test]
    fn empty_growth_yields_empty_series() {
        assert!(cumulative_growth(&[]).is_empty());
    }

    #[test]
    fn completion_percent_rounds() {
        assert_eq!(completion_percent(7, 50), 14);
        assert_eq!(completion_percent(1, 3), 33);
        assert_eq!(completion_percent(2, 3), 67);
        assert_eq!(completion_percent(0, 50), 0);
    }

    #[test]
    fn completion_percent_survives_zero_goal() {
        assert_eq!(completion_percent(25, 0), 50);
    }

    #[test]
    fn breakdown_total_sums_counts() {
        let slices = vec![
            ActivitySlice {
                activity_type: "call".to_string(),
                count: 4,
            },
            ActivitySlice {
                activity_type: "email".to_string(),
                count: 9,
            },
        ];
        assert_eq!(breakdown_total(&slices), 13);
        assert_eq!(breakdown_total(&[]), 0);
    }

    #[test]
    fn missing_weekly_goal_defaults_to_fifty() {
        let summary: DashboardSummary = serde_json::from_value(serde_json::json!({
            "contactsTotal": 12,
            "contactGrowth": [],
            "activitiesThisWeek": 7,
            "activityBreakdown": []
        }))
        .unwrap();

        assert_eq!(summary.weekly_goal, DEFAULT_WEEKLY_GOAL);
    }

    #[test]
    fn zero_weekly_goal_normalizes_to_fifty() {
        let summary = DashboardSummary {
            contacts_total: 1,
            contact_growth: vec![],
            activities_this_week: 0,
            weekly_goal: 0,
            activity_breakdown: vec![],
        }
        .normalized();

        assert_eq!(summary.weekly_goal, DEFAULT_WEEKLY_GOAL);
    }

    #[test]
    fn view_model_on_empty_summary_has_no_data_states() {
        let summary = DashboardSummary {
            contacts_total: 0,
            contact_growth: vec![],
            activities_this_week: 7,
            weekly_goal: 50,
            activity_breakdown: vec![],
        };

        let vm = summary.view_model();
        assert!(vm.cumulative_growth.is_empty());
        assert!(vm.activity_breakdown.is_empty());
        assert_eq!(vm.breakdown_total, 0);
        assert_eq!(vm.completion_percent, 14);
    }
}
