use tracing::info;

use crate::data::entity_repository::{DeleteResult, EntityRepository};
use crate::domain::community::{
    Group, Meet, NewGroupRequest, NewMeetRequest, add_participant, new_participant,
    remove_participant,
};
use crate::domain::error::DomainError;
use crate::domain::user::User;
use crate::domain::validate::same_email;

/// Meets and groups. Membership lives in the record itself, so joining and
/// leaving are guarded rewrites of the owning collection.
pub struct CommunityService {
    meets: EntityRepository<Meet>,
    groups: EntityRepository<Group>,
    users: EntityRepository<User>,
}

impl CommunityService {
    pub(crate) fn new(
        meets: EntityRepository<Meet>,
        groups: EntityRepository<Group>,
        users: EntityRepository<User>,
    ) -> Self {
        Self {
            meets,
            groups,
            users,
        }
    }

    pub async fn create_meet(&self, req: NewMeetRequest) -> Result<Meet, DomainError> {
        let req = req.validate()?;
        let meet = self.meets.create(|id, now| Meet::new(id, req, now)).await?;
        info!(meet_id = %meet.id, "meet scheduled");
        Ok(meet)
    }

    /// Active meets, soonest first.
    pub async fn list_meets(&self) -> Result<Vec<Meet>, DomainError> {
        let mut meets: Vec<Meet> = self
            .meets
            .list()
            .await?
            .into_iter()
            .filter(Meet::is_active)
            .collect();
        meets.sort_by(|a, b| a.starts_at.cmp(&b.starts_at));
        Ok(meets)
    }

    pub async fn get_meet(&self, meet_id: &str) -> Result<Meet, DomainError> {
        self.meets
            .get_by_id(meet_id)
            .await?
            .filter(Meet::is_active)
            .ok_or_else(|| DomainError::not_found("meet", meet_id))
    }

    /// Joining twice is a no-op; a full meet rejects new attendees.
    pub async fn join_meet(&self, meet_id: &str, email: &str, name: &str) -> Result<Meet, DomainError> {
        let participant = new_participant(email, name, self.meets.now())?;
        self.meets
            .update(meet_id, |meet| {
                if !meet.is_active() {
                    return Err(DomainError::not_found("meet", meet_id));
                }
                let already = meet
                    .attendees
                    .iter()
                    .any(|p| same_email(&p.email, &participant.email));
                if !already && meet.is_full() {
                    return Err(DomainError::Conflict(format!("meet {meet_id} is full")));
                }
                add_participant(&mut meet.attendees, participant);
                Ok(())
            })
            .await?
            .ok_or_else(|| DomainError::not_found("meet", meet_id))
    }

    pub async fn leave_meet(&self, meet_id: &str, email: &str) -> Result<Meet, DomainError> {
        self.meets
            .update(meet_id, |meet| {
                if !remove_participant(&mut meet.attendees, email) {
                    return Err(DomainError::NotFound(format!("attendee {email}")));
                }
                Ok(())
            })
            .await?
            .ok_or_else(|| DomainError::not_found("meet", meet_id))
    }

    /// Organizer or admin. Cancelled meets stay stored but leave every listing.
    pub async fn cancel_meet(&self, actor_email: &str, meet_id: &str) -> Result<DeleteResult, DomainError> {
        let meet = self
            .meets
            .get_by_id(meet_id)
            .await?
            .ok_or_else(|| DomainError::not_found("meet", meet_id))?;
        if !same_email(&meet.organizer_email, actor_email) && !self.is_admin(actor_email).await? {
            return Err(DomainError::Forbidden);
        }
        self.meets.delete(meet_id).await
    }

    pub async fn create_group(&self, req: NewGroupRequest) -> Result<Group, DomainError> {
        let req = req.validate()?;
        let owner = new_participant(&req.owner_email, &req.owner_name, self.groups.now())?;
        let group = self
            .groups
            .create_checked(
                |id, now| {
                    let mut group = Group::new(id, req, now);
                    add_participant(&mut group.members, owner);
                    group
                },
                |existing, new| {
                    if existing.iter().any(|g| g.name.eq_ignore_ascii_case(&new.name)) {
                        return Err(DomainError::AlreadyExists(format!("group {}", new.name)));
                    }
                    Ok(())
                },
            )
            .await?;
        info!(group_id = %group.id, "group created");
        Ok(group)
    }

    /// Private groups are listed to their members only.
    pub async fn list_groups(&self, viewer_email: Option<&str>) -> Result<Vec<Group>, DomainError> {
        Ok(self
            .groups
            .list()
            .await?
            .into_iter()
            .filter(|g| {
                !g.private
                    || viewer_email
                        .is_some_and(|email| g.members.iter().any(|m| same_email(&m.email, email)))
            })
            .collect())
    }

    pub async fn get_group(&self, group_id: &str) -> Result<Group, DomainError> {
        self.groups
            .get_by_id(group_id)
            .await?
            .ok_or_else(|| DomainError::not_found("group", group_id))
    }

    pub async fn join_group(&self, group_id: &str, email: &str, name: &str) -> Result<Group, DomainError> {
        let participant = new_participant(email, name, self.groups.now())?;
        self.groups
            .update(group_id, |group| {
                add_participant(&mut group.members, participant);
                Ok(())
            })
            .await?
            .ok_or_else(|| DomainError::not_found("group", group_id))
    }

    /// The owner cannot leave; deleting the group is the way out.
    pub async fn leave_group(&self, group_id: &str, email: &str) -> Result<Group, DomainError> {
        self.groups
            .update(group_id, |group| {
                if same_email(&group.owner_email, email) {
                    return Err(DomainError::Conflict("group owner cannot leave".to_string()));
                }
                if !remove_participant(&mut group.members, email) {
                    return Err(DomainError::NotFound(format!("member {email}")));
                }
                Ok(())
            })
            .await?
            .ok_or_else(|| DomainError::not_found("group", group_id))
    }

    pub async fn delete_group(&self, actor_email: &str, group_id: &str) -> Result<(), DomainError> {
        let group = self.get_group(group_id).await?;
        if !same_email(&group.owner_email, actor_email) && !self.is_admin(actor_email).await? {
            return Err(DomainError::Forbidden);
        }
        match self.groups.delete(group_id).await? {
            DeleteResult::NotFound => Err(DomainError::not_found("group", group_id)),
            DeleteResult::Deleted | DeleteResult::AlreadyDeleted => Ok(()),
        }
    }

    async fn is_admin(&self, email: &str) -> Result<bool, DomainError> {
        Ok(self
            .users
            .find(|u| u.is_active && u.has_email(email))
            .await?
            .is_some_and(|u| u.is_admin()))
    }
}
