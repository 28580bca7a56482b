//! Member registry service.
//!
//! # Responsibility
//! - Validate and register members; look them up, search and list them.
//! - Suspend/reactivate accounts and maintain loan counters.
//!
//! # Invariants
//! - Normalized emails are unique across the collection.
//! - `active_loans` stays within `0..=MAX_ACTIVE_LOANS`.
//! - A member with outstanding loans cannot be deleted.

use super::{provided, ErrorKind};
use crate::clock::SharedClock;
use crate::model::member::{Member, MemberId, MAX_ACTIVE_LOANS};
use crate::store::{CollectionStore, StoreError};
use crate::validation::{normalize_email, validate_email, validate_name, validate_phone, FieldError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type MemberResult<T> = Result<T, MemberServiceError>;

#[derive(Debug)]
pub enum MemberServiceError {
    Validation(FieldError),
    MemberNotFound(MemberId),
    /// Normalized email already belongs to another member.
    DuplicateEmail {
        email: String,
        existing_id: MemberId,
    },
    AlreadySuspended(MemberId),
    AlreadyActive(MemberId),
    /// Delete refused while loans are outstanding.
    HasActiveLoans { id: MemberId, active_loans: u32 },
    /// Suspended members cannot take new loans.
    Suspended(MemberId),
    LimitReached { id: MemberId, limit: u32 },
    Store(StoreError),
}

impl MemberServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationFailed,
            Self::MemberNotFound(_) => ErrorKind::NotFound,
            Self::DuplicateEmail { .. } => ErrorKind::DuplicateKey,
            Self::AlreadySuspended(_)
            | Self::AlreadyActive(_)
            | Self::HasActiveLoans { .. }
            | Self::Suspended(_)
            | Self::LimitReached { .. } => ErrorKind::BusinessRuleViolation,
            Self::Store(_) => ErrorKind::StorageFailure,
        }
    }
}

impl Display for MemberServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::MemberNotFound(id) => write!(f, "member not found: {id}"),
            Self::DuplicateEmail { email, existing_id } => {
                write!(f, "email {email} is already used by member {existing_id}")
            }
            Self::AlreadySuspended(id) => write!(f, "member {id} is already suspended"),
            Self::AlreadyActive(id) => write!(f, "member {id} is already active"),
            Self::HasActiveLoans { id, active_loans } => write!(
                f,
                "member {id} has {active_loans} outstanding loan(s) and cannot be removed"
            ),
            Self::Suspended(id) => write!(f, "member {id} is suspended"),
            Self::LimitReached { id, limit } => write!(
                f,
                "member {id} reached the limit of {limit} simultaneous loans"
            ),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MemberServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FieldError> for MemberServiceError {
    fn from(value: FieldError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for MemberServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Raw user input for registering a member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewMember {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Partial update; `None` or blank keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberStatistics {
    pub total: usize,
    pub active: usize,
    pub suspended: usize,
    /// Highest lifetime loan count (> 0); lowest id wins ties.
    pub most_active: Option<Member>,
}

/// Owner of the members collection.
pub struct MemberService {
    members: Vec<Member>,
    next_id: MemberId,
    store: Box<dyn CollectionStore<Member>>,
    clock: SharedClock,
}

impl MemberService {
    pub fn open(
        store: impl CollectionStore<Member> + 'static,
        clock: SharedClock,
    ) -> MemberResult<Self> {
        let members = store.load()?;
        let next_id = members.iter().map(|member| member.id).max().unwrap_or(0) + 1;
        info!(
            "event=service_open module=member_service status=ok records={} next_id={}",
            members.len(),
            next_id
        );
        Ok(Self {
            members,
            next_id,
            store: Box::new(store),
            clock,
        })
    }

    /// Validates and registers a new active member with no loans.
    pub fn add(&mut self, request: NewMember) -> MemberResult<Member> {
        let name = validate_name("name", &request.name)?;
        let email = validate_email(&request.email)?;
        let phone = validate_phone(&request.phone)?;
        self.ensure_email_free(&email, None)?;

        let member = Member {
            id: self.next_id,
            name,
            email,
            phone,
            registered_at: self.clock.now(),
            loan_count: 0,
            active_loans: 0,
            active: true,
        };
        self.members.push(member.clone());
        if let Err(err) = self.store.save(&self.members) {
            self.members.pop();
            return Err(err.into());
        }
        self.next_id += 1;

        info!(
            "event=member_add module=member_service status=ok member_id={}",
            member.id
        );
        Ok(member)
    }

    pub fn find_by_id(&self, id: MemberId) -> Option<&Member> {
        self.members.iter().find(|member| member.id == id)
    }

    pub fn find_by_email(&self, email: &str) -> Option<&Member> {
        let wanted = normalize_email(email);
        self.members
            .iter()
            .find(|member| member.email.to_lowercase() == wanted)
    }

    /// Case-insensitive substring match on name or email.
    pub fn search(&self, term: &str) -> Vec<&Member> {
        let needle = term.trim().to_lowercase();
        self.members
            .iter()
            .filter(|member| {
                member.name.to_lowercase().contains(&needle)
                    || member.email.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn list_all(&self) -> &[Member] {
        &self.members
    }

    pub fn list_active(&self) -> Vec<&Member> {
        self.members.iter().filter(|member| member.active).collect()
    }

    /// Applies a partial update after validating every provided field.
    pub fn modify(&mut self, id: MemberId, changes: MemberChanges) -> MemberResult<Member> {
        self.index_of(id)?;

        let name = provided(&changes.name)
            .map(|value| validate_name("name", value))
            .transpose()?;
        let email = provided(&changes.email).map(validate_email).transpose()?;
        let phone = provided(&changes.phone).map(validate_phone).transpose()?;
        if let Some(email) = &email {
            self.ensure_email_free(email, Some(id))?;
        }

        let updated = self.update_with(id, |member| {
            if let Some(name) = name {
                member.name = name;
            }
            if let Some(email) = email {
                member.email = email;
            }
            if let Some(phone) = phone {
                member.phone = phone;
            }
            Ok(())
        })?;
        info!(
            "event=member_modify module=member_service status=ok member_id={}",
            id
        );
        Ok(updated)
    }

    pub fn suspend(&mut self, id: MemberId) -> MemberResult<Member> {
        let updated = self.update_with(id, |member| {
            if !member.active {
                return Err(MemberServiceError::AlreadySuspended(id));
            }
            member.suspend();
            Ok(())
        })?;
        info!(
            "event=member_suspend module=member_service status=ok member_id={}",
            id
        );
        Ok(updated)
    }

    pub fn reactivate(&mut self, id: MemberId) -> MemberResult<Member> {
        let updated = self.update_with(id, |member| {
            if member.active {
                return Err(MemberServiceError::AlreadyActive(id));
            }
            member.reactivate();
            Ok(())
        })?;
        info!(
            "event=member_reactivate module=member_service status=ok member_id={}",
            id
        );
        Ok(updated)
    }

    /// Removes a member without outstanding loans.
    pub fn delete(&mut self, id: MemberId) -> MemberResult<Member> {
        let index = self.index_of(id)?;
        let active_loans = self.members[index].active_loans;
        if active_loans > 0 {
            warn!(
                "event=member_delete module=member_service status=rejected member_id={} active_loans={}",
                id, active_loans
            );
            return Err(MemberServiceError::HasActiveLoans { id, active_loans });
        }

        let removed = self.members.remove(index);
        if let Err(err) = self.store.save(&self.members) {
            self.members.insert(index, removed);
            return Err(err.into());
        }
        info!(
            "event=member_delete module=member_service status=ok member_id={}",
            id
        );
        Ok(removed)
    }

    /// Counts one more outstanding loan for the member.
    ///
    /// Re-checks the borrowing rules even though the loan service already
    /// did, so the counter can never exceed the limit.
    pub fn add_loan_to_member(&mut self, id: MemberId) -> MemberResult<Member> {
        self.update_with(id, |member| {
            if !member.active {
                return Err(MemberServiceError::Suspended(id));
            }
            if !member.can_borrow() {
                return Err(MemberServiceError::LimitReached {
                    id,
                    limit: MAX_ACTIVE_LOANS,
                });
            }
            member.add_loan();
            Ok(())
        })
    }

    /// Counts one fewer outstanding loan, floored at zero.
    pub fn remove_loan_from_member(&mut self, id: MemberId) -> MemberResult<Member> {
        self.update_with(id, |member| {
            member.remove_loan();
            Ok(())
        })
    }

    pub fn statistics(&self) -> MemberStatistics {
        let active = self.members.iter().filter(|member| member.active).count();
        let most_active = self
            .members
            .iter()
            .filter(|member| member.loan_count > 0)
            .min_by_key(|member| (std::cmp::Reverse(member.loan_count), member.id))
            .cloned();

        MemberStatistics {
            total: self.members.len(),
            active,
            suspended: self.members.len() - active,
            most_active,
        }
    }

    /// Never issues ids up to `id` again, e.g. ids a stored loan still
    /// points at after the member was deleted.
    pub(crate) fn reserve_ids_through(&mut self, id: MemberId) {
        self.next_id = self.next_id.max(id + 1);
    }

    /// Reinstates a previously captured record, used to compensate a
    /// failed multi-service operation.
    pub(crate) fn restore(&mut self, snapshot: Member) -> MemberResult<()> {
        match self
            .members
            .iter_mut()
            .find(|member| member.id == snapshot.id)
        {
            Some(member) => *member = snapshot,
            None => self.members.push(snapshot),
        }
        self.store.save(&self.members)?;
        Ok(())
    }

    fn index_of(&self, id: MemberId) -> MemberResult<usize> {
        self.members
            .iter()
            .position(|member| member.id == id)
            .ok_or(MemberServiceError::MemberNotFound(id))
    }

    fn ensure_email_free(&self, email: &str, except: Option<MemberId>) -> MemberResult<()> {
        match self
            .members
            .iter()
            .find(|member| Some(member.id) != except && member.email.eq_ignore_ascii_case(email))
        {
            Some(existing) => Err(MemberServiceError::DuplicateEmail {
                email: email.to_string(),
                existing_id: existing.id,
            }),
            None => Ok(()),
        }
    }

    fn update_with(
        &mut self,
        id: MemberId,
        apply: impl FnOnce(&mut Member) -> MemberResult<()>,
    ) -> MemberResult<Member> {
        let index = self.index_of(id)?;
        let snapshot = self.members[index].clone();
        let result = apply(&mut self.members[index])
            .and_then(|()| self.store.save(&self.members).map_err(Into::into));
        if let Err(err) = result {
            self.members[index] = snapshot;
            return Err(err);
        }
        Ok(self.members[index].clone())
    }
}
