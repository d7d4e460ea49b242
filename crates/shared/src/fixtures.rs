//! Local placeholder records shown when the manager API is unreachable.

use chrono::{Days, NaiveDate};

use crate::domain::{RecordId, RegularUser, Role, StatusFlag};

const FAMILY_NAMES: [&str; 20] = [
    "张", "李", "王", "刘", "陈", "杨", "赵", "黄", "周", "吴", "徐", "孙", "胡", "朱", "高", "林",
    "何", "郭", "马", "罗",
];
const GIVEN_NAMES: [&str; 15] = [
    "伟", "芳", "娜", "敏", "静", "丽", "强", "磊", "军", "洋", "勇", "艳", "杰", "婷", "浩",
];
const SAMPLE_USER_COUNT: usize = 8;

pub fn sample_regular_users() -> Vec<RegularUser> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1);
    (0..SAMPLE_USER_COUNT)
        .map(|index| {
            let number = index + 1;
            let family = FAMILY_NAMES[index % FAMILY_NAMES.len()];
            let given = GIVEN_NAMES[(index / FAMILY_NAMES.len()) % GIVEN_NAMES.len()];
            let status = if index % 4 == 0 {
                StatusFlag::Inactive
            } else {
                StatusFlag::Active
            };

            RegularUser {
                id: RecordId::Text(format!("U{number:03}")),
                name: format!("{family}{given}"),
                email: format!("user{number:03}@example.com"),
                status,
                joined_at: start.and_then(|date| date.checked_add_days(Days::new(index as u64))),
            }
        })
        .collect()
}

pub fn sample_roles() -> Vec<Role> {
    vec![
        Role {
            id: RecordId::from("R001"),
            name: "普通用户".into(),
            code: "user".into(),
            description: "拥有基础访问与操作权限".into(),
            is_open: 1,
            created_at: Some("2024-01-10".into()),
        },
        Role {
            id: RecordId::from("R002"),
            name: "访客用户".into(),
            code: "guest".into(),
            description: "仅具备只读访问权限".into(),
            is_open: 0,
            created_at: Some("2024-02-01".into()),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_users_are_numbered_and_dated_consecutively() {
        let users = sample_regular_users();
        assert_eq!(users.len(), 8);
        assert_eq!(users[0].id, RecordId::from("U001"));
        assert_eq!(users[0].name, "张伟");
        assert_eq!(users[0].status, StatusFlag::Inactive);
        assert_eq!(users[1].status, StatusFlag::Active);
        assert_eq!(users[7].email, "user008@example.com");
        assert_eq!(users[7].joined_at, NaiveDate::from_ymd_opt(2024, 1, 8));
    }
}
