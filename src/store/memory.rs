use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{RideStore, StoreError};
use crate::models::{Group, Member, NewGroup, NewMember, NewUser, User};

/// 进程内存储，用于测试和本地演示（`STORE_BACKEND=memory`）
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    groups: BTreeMap<i64, Group>,
    members: BTreeMap<i64, Member>,
    users: BTreeMap<i64, User>,
    next_group_id: i64,
    next_member_id: i64,
    next_user_id: i64,
}

impl Tables {
    fn member_count(&self, group_id: i64) -> i64 {
        self.members
            .values()
            .filter(|m| m.group_id == group_id)
            .count() as i64
    }

    // 与 SQL 实现一致，读取时实时统计人数
    fn group_view(&self, group: &Group) -> Group {
        Group {
            number_of_members: self.member_count(group.id),
            ..group.clone()
        }
    }
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RideStore for MemoryStore {
    async fn create_group(&self, group: NewGroup) -> Result<Group, StoreError> {
        let mut tables = self.inner.write().await;
        let id = next_id(&mut tables.next_group_id);
        let created = Group {
            id,
            group_name: group.group_name,
            start_location: group.start_location,
            end_location: group.end_location,
            total_cost: group.total_cost,
            time_range_start: group.time_range_start,
            time_range_end: group.time_range_end,
            number_of_members: 0,
            created_at: Utc::now(),
        };
        tables.groups.insert(id, created.clone());
        Ok(created)
    }

    async fn list_groups(&self) -> Result<Vec<Group>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables.groups.values().map(|g| tables.group_view(g)).collect())
    }

    async fn get_group(&self, group_id: i64) -> Result<Option<Group>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables.groups.get(&group_id).map(|g| tables.group_view(g)))
    }

    async fn update_group_price(
        &self,
        group_id: i64,
        total_cost: f64,
    ) -> Result<Group, StoreError> {
        let mut tables = self.inner.write().await;
        let group = tables.groups.get_mut(&group_id).ok_or(StoreError::NotFound)?;
        if group.total_cost <= total_cost {
            return Err(StoreError::PriceNotLower {
                current: group.total_cost,
            });
        }
        group.total_cost = total_cost;
        let group = group.clone();
        Ok(tables.group_view(&group))
    }

    async fn delete_group(&self, group_id: i64) -> Result<(), StoreError> {
        let mut tables = self.inner.write().await;
        if tables.groups.remove(&group_id).is_none() {
            return Err(StoreError::NotFound);
        }
        tables.members.retain(|_, m| m.group_id != group_id);
        Ok(())
    }

    async fn add_member(&self, member: NewMember) -> Result<(Member, bool), StoreError> {
        let mut tables = self.inner.write().await;
        if !tables.groups.contains_key(&member.group_id) {
            return Err(StoreError::NotFound);
        }

        if let Some(user_id) = member.user_id {
            // 与外键约束一致：关联的用户必须存在
            if !tables.users.contains_key(&user_id) {
                return Err(StoreError::UnknownUser);
            }
            let existing = tables
                .members
                .values()
                .find(|m| m.group_id == member.group_id && m.user_id == Some(user_id));
            if let Some(existing) = existing {
                return Ok((existing.clone(), false));
            }
        }

        let id = next_id(&mut tables.next_member_id);
        let created = Member {
            id,
            group_id: member.group_id,
            member_name: member.member_name,
            member_email: member.member_email,
            user_id: member.user_id,
            contribution: 0.0,
            joined_at: Utc::now(),
        };
        tables.members.insert(id, created.clone());
        Ok((created, true))
    }

    async fn remove_member(&self, group_id: i64, user_id: i64) -> Result<(), StoreError> {
        let mut tables = self.inner.write().await;
        let before = tables.members.len();
        tables
            .members
            .retain(|_, m| !(m.group_id == group_id && m.user_id == Some(user_id)));

        if tables.members.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn remove_member_by_id(&self, member_id: i64) -> Result<Member, StoreError> {
        let mut tables = self.inner.write().await;
        tables.members.remove(&member_id).ok_or(StoreError::NotFound)
    }

    async fn list_members(&self, group_id: i64) -> Result<Vec<Member>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .members
            .values()
            .filter(|m| m.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn count_members(&self, group_id: i64) -> Result<i64, StoreError> {
        let tables = self.inner.read().await;
        if !tables.groups.contains_key(&group_id) {
            return Err(StoreError::NotFound);
        }
        Ok(tables.member_count(group_id))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.inner.write().await;
        let taken = tables
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email));
        if taken {
            return Err(StoreError::Conflict);
        }

        let id = next_id(&mut tables.next_user_id);
        let created = User {
            id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        tables.users.insert(id, created.clone());
        Ok(created)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables.users.get(&user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn office_commute() -> NewGroup {
        NewGroup {
            group_name: "Office Commute".to_string(),
            start_location: "A".to_string(),
            end_location: "B".to_string(),
            total_cost: 0.0,
            time_range_start: None,
            time_range_end: None,
        }
    }

    async fn registered(store: &MemoryStore, email: &str) -> i64 {
        store
            .create_user(NewUser {
                name: email.to_string(),
                email: email.to_string(),
                phone: None,
                password_hash: "x".to_string(),
            })
            .await
            .unwrap()
            .id
    }

    fn guest(group_id: i64, name: &str) -> NewMember {
        NewMember {
            group_id,
            member_name: name.to_string(),
            member_email: None,
            user_id: None,
        }
    }

    #[tokio::test]
    async fn member_count_follows_joins_and_leaves() {
        let store = MemoryStore::new();
        let group = store.create_group(office_commute()).await.unwrap();

        let groups = store.list_groups().await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].group_name, "Office Commute");
        assert_eq!(groups[0].start_location, "A");
        assert_eq!(groups[0].end_location, "B");
        assert_eq!(groups[0].number_of_members, 0);

        let user_id = registered(&store, "x@example.com").await;
        let (member, created) = store
            .add_member(NewMember {
                user_id: Some(user_id),
                ..guest(group.id, "X")
            })
            .await
            .unwrap();
        assert!(created);
        assert_eq!(member.contribution, 0.0);
        assert_eq!(store.count_members(group.id).await.unwrap(), 1);

        store.remove_member(group.id, user_id).await.unwrap();
        assert_eq!(store.count_members(group.id).await.unwrap(), 0);
        assert!(store.list_members(group.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejoining_user_gets_existing_member() {
        let store = MemoryStore::new();
        let group = store.create_group(office_commute()).await.unwrap();
        let user_id = registered(&store, "meera@example.com").await;
        let join = NewMember {
            user_id: Some(user_id),
            ..guest(group.id, "Meera")
        };

        let (first, created) = store.add_member(join.clone()).await.unwrap();
        let (second, created_again) = store.add_member(join).await.unwrap();
        assert!(created);
        assert!(!created_again);
        assert_eq!(first.id, second.id);

        // 游客不去重
        store.add_member(guest(group.id, "Guest")).await.unwrap();
        store.add_member(guest(group.id, "Guest")).await.unwrap();
        assert_eq!(store.count_members(group.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn missing_rows_report_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(store.delete_group(1).await, Err(StoreError::NotFound)));
        assert!(matches!(
            store.add_member(guest(1, "Nobody")).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(store.remove_member(1, 1).await, Err(StoreError::NotFound)));
        assert!(matches!(
            store.remove_member_by_id(1).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn joining_as_unregistered_user_is_rejected() {
        let store = MemoryStore::new();
        let group = store.create_group(office_commute()).await.unwrap();

        let err = store
            .add_member(NewMember {
                user_id: Some(42),
                ..guest(group.id, "Ghost")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownUser));
        assert_eq!(store.count_members(group.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn deleting_group_cascades_members() {
        let store = MemoryStore::new();
        let group = store.create_group(office_commute()).await.unwrap();
        store.add_member(guest(group.id, "Kabir")).await.unwrap();

        store.delete_group(group.id).await.unwrap();
        assert!(store.get_group(group.id).await.unwrap().is_none());
        assert!(store.list_members(group.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn price_only_goes_down() {
        let store = MemoryStore::new();
        let group = store
            .create_group(NewGroup {
                total_cost: 400.0,
                ..office_commute()
            })
            .await
            .unwrap();

        let updated = store.update_group_price(group.id, 350.0).await.unwrap();
        assert_eq!(updated.total_cost, 350.0);

        let err = store.update_group_price(group.id, 350.0).await.unwrap_err();
        assert!(matches!(err, StoreError::PriceNotLower { current } if current == 350.0));
        assert!(matches!(
            store.update_group_price(99, 1.0).await,
            Err(StoreError::NotFound)
        ));
    }
}
