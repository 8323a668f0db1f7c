//! 任务进度聚合
//!
//! 纯计算：输入任务当前的成员列表与成员进度明细，输出整体状态/进度。
//! 明细可能与成员列表不同步（缺条目或残留已移除成员的条目），聚合时
//! 以成员列表为准：缺失按 `pending / 0` 处理，残留条目不参与计算但原样保留。

use crate::model::{MemberProgress, ObjectRef, TaskStatus};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 整体状态推导规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPolicy {
    /// 按平均进度阈值：0 → pending，100 → completed，其余 → in_progress
    #[default]
    ProgressThreshold,
    /// 按成员状态集合：任一进行中 → in_progress；全部待处理 → pending；
    /// 全部完成 → completed；其余 → pending
    MemberStatusSet,
}

impl StatusPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusPolicy::ProgressThreshold => "progress_threshold",
            StatusPolicy::MemberStatusSet => "member_status_set",
        }
    }

    fn derive(self, progress: u8, entries: &[MemberProgress]) -> TaskStatus {
        match self {
            StatusPolicy::ProgressThreshold => TaskStatus::from_progress(progress),
            StatusPolicy::MemberStatusSet => {
                if entries.iter().any(|e| e.status == TaskStatus::InProgress) {
                    TaskStatus::InProgress
                } else if entries.iter().all(|e| e.status == TaskStatus::Completed) {
                    TaskStatus::Completed
                } else {
                    // 全部 pending，或 pending 与 completed 混合
                    TaskStatus::Pending
                }
            }
        }
    }
}

impl FromStr for StatusPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "progress_threshold" => Ok(StatusPolicy::ProgressThreshold),
            "member_status_set" => Ok(StatusPolicy::MemberStatusSet),
            other => Err(format!(
                "unknown status policy `{other}`; expected progress_threshold|member_status_set"
            )),
        }
    }
}

/// 本次操作要写入的单个成员状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberUpdate {
    pub member_id: ObjectRef,
    pub status: TaskStatus,
}

/// 聚合结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    /// 成员条目（按成员列表顺序），之后是保留的残留条目
    pub member_progress: Vec<MemberProgress>,
    pub progress: u8,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressAggregator {
    policy: StatusPolicy,
}

impl ProgressAggregator {
    pub fn new(policy: StatusPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    /// 计算整体状态/进度
    ///
    /// 成员列表为空时返回 `None`，调用方直接使用请求中的状态。
    pub fn aggregate(
        &self,
        member_ids: &[ObjectRef],
        entries: &[MemberProgress],
        update: Option<&MemberUpdate>,
    ) -> Option<Aggregate> {
        if member_ids.is_empty() {
            return None;
        }

        let mut members: Vec<MemberProgress> = member_ids
            .iter()
            .map(|id| {
                entries
                    .iter()
                    .find(|e| &e.member_id == id)
                    .map(|e| MemberProgress {
                        member_id: id.clone(),
                        status: e.status,
                        progress: e.progress.min(100),
                    })
                    .unwrap_or_else(|| MemberProgress::pending(id.clone()))
            })
            .collect();

        let mut stale: Vec<MemberProgress> = entries
            .iter()
            .filter(|e| !member_ids.contains(&e.member_id))
            .cloned()
            .collect();

        if let Some(update) = update {
            let fresh = MemberProgress::new(update.member_id.clone(), update.status);
            if let Some(slot) = members
                .iter_mut()
                .find(|e| e.member_id == update.member_id)
            {
                *slot = fresh;
            } else if let Some(slot) = stale.iter_mut().find(|e| e.member_id == update.member_id) {
                // 不在成员列表中的更新只改写残留条目，不影响聚合
                *slot = fresh;
            } else {
                stale.push(fresh);
            }
        }

        let sum: u32 = members.iter().map(|e| u32::from(e.progress)).sum();
        let progress = (f64::from(sum) / members.len() as f64).round() as u8;
        let status = self.policy.derive(progress, &members);

        members.extend(stale);
        Some(Aggregate {
            member_progress: members,
            progress,
            status,
        })
    }
}

/// 让成员进度明细与成员列表一一对应
///
/// 保留已有条目，为缺失成员补 `pending / 0`，丢弃不在列表中的条目。
pub fn reconcile(member_ids: &[ObjectRef], entries: &[MemberProgress]) -> Vec<MemberProgress> {
    member_ids
        .iter()
        .map(|id| {
            entries
                .iter()
                .find(|e| &e.member_id == id)
                .cloned()
                .unwrap_or_else(|| MemberProgress::pending(id.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(c: char) -> ObjectRef {
        ObjectRef::parse(&c.to_string().repeat(24), "id").unwrap()
    }

    fn entry(c: char, status: TaskStatus) -> MemberProgress {
        MemberProgress::new(id(c), status)
    }

    fn update(c: char, status: TaskStatus) -> MemberUpdate {
        MemberUpdate {
            member_id: id(c),
            status,
        }
    }

    #[test]
    fn test_empty_members_skips_aggregation() {
        let agg = ProgressAggregator::default();
        assert!(agg.aggregate(&[], &[entry('a', TaskStatus::Completed)], None).is_none());
    }

    #[test]
    fn test_first_member_completed_gives_half() {
        let agg = ProgressAggregator::default();
        let members = vec![id('a'), id('b')];
        let entries = vec![entry('a', TaskStatus::Pending), entry('b', TaskStatus::Pending)];

        let out = agg
            .aggregate(&members, &entries, Some(&update('a', TaskStatus::Completed)))
            .unwrap();
        assert_eq!(
            out.member_progress,
            vec![entry('a', TaskStatus::Completed), entry('b', TaskStatus::Pending)]
        );
        assert_eq!(out.progress, 50);
        assert_eq!(out.status, TaskStatus::InProgress);

        let out = agg
            .aggregate(&members, &out.member_progress, Some(&update('b', TaskStatus::Completed)))
            .unwrap();
        assert_eq!(out.progress, 100);
        assert_eq!(out.status, TaskStatus::Completed);
    }

    #[test]
    fn test_update_is_idempotent() {
        let agg = ProgressAggregator::default();
        let members = vec![id('a'), id('b'), id('c')];
        let u = update('b', TaskStatus::InProgress);
        let once = agg.aggregate(&members, &[], Some(&u)).unwrap();
        let twice = agg.aggregate(&members, &once.member_progress, Some(&u)).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_entries_default_to_pending() {
        let agg = ProgressAggregator::default();
        let members = vec![id('a'), id('b'), id('c')];
        let out = agg
            .aggregate(&members, &[entry('a', TaskStatus::Completed)], None)
            .unwrap();
        assert_eq!(out.member_progress.len(), 3);
        // 100 / 3 = 33.33 → 33
        assert_eq!(out.progress, 33);
        assert_eq!(out.status, TaskStatus::InProgress);
    }

    #[test]
    fn test_rounding_half_up() {
        let agg = ProgressAggregator::default();
        let members = vec![id('a'), id('b'), id('c'), id('d')];
        let entries = vec![
            entry('a', TaskStatus::InProgress),
            entry('b', TaskStatus::Pending),
            entry('c', TaskStatus::Pending),
            entry('d', TaskStatus::Pending),
        ];
        // 50 / 4 = 12.5 → 13
        assert_eq!(agg.aggregate(&members, &entries, None).unwrap().progress, 13);
    }

    #[test]
    fn test_stale_entries_ignored_but_retained() {
        let agg = ProgressAggregator::default();
        let members = vec![id('a')];
        let entries = vec![entry('f', TaskStatus::Completed), entry('a', TaskStatus::Pending)];
        let out = agg.aggregate(&members, &entries, None).unwrap();
        assert_eq!(out.progress, 0);
        assert_eq!(out.status, TaskStatus::Pending);
        assert_eq!(
            out.member_progress,
            vec![entry('a', TaskStatus::Pending), entry('f', TaskStatus::Completed)]
        );
    }

    #[test]
    fn test_member_status_set_policy_differs_at_boundaries() {
        let threshold = ProgressAggregator::new(StatusPolicy::ProgressThreshold);
        let set = ProgressAggregator::new(StatusPolicy::MemberStatusSet);
        let members = vec![id('a'), id('b')];
        let entries = vec![entry('a', TaskStatus::Completed), entry('b', TaskStatus::Pending)];

        assert_eq!(
            threshold.aggregate(&members, &entries, None).unwrap().status,
            TaskStatus::InProgress
        );
        let out = set.aggregate(&members, &entries, None).unwrap();
        assert_eq!(out.progress, 50);
        assert_eq!(out.status, TaskStatus::Pending);

        let busy = vec![entry('a', TaskStatus::InProgress), entry('b', TaskStatus::Pending)];
        assert_eq!(
            set.aggregate(&members, &busy, None).unwrap().status,
            TaskStatus::InProgress
        );
    }

    #[test]
    fn test_reconcile_prunes_and_fills() {
        let members = vec![id('b'), id('c')];
        let entries = vec![entry('a', TaskStatus::Completed), entry('b', TaskStatus::InProgress)];
        assert_eq!(
            reconcile(&members, &entries),
            vec![entry('b', TaskStatus::InProgress), entry('c', TaskStatus::Pending)]
        );
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "member-status-set".parse::<StatusPolicy>().unwrap(),
            StatusPolicy::MemberStatusSet
        );
        assert!("bogus".parse::<StatusPolicy>().is_err());
    }
}
