//! Role-gated view composition.
//!
//! Views are derived from the signed-in profile on every call. The only state kept here is
//! the teacher/student "acting as" choice, which lives for the session and is never written
//! to the profile.

use crate::data::user::User;
use crate::error::AccessError;
use crate::role::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capabilities {
    pub role: Role,
    pub is_admin: bool,
    pub is_teacher: bool,
    pub is_approved: bool,
}

impl Capabilities {
    pub fn of(user: &User) -> Capabilities {
        Capabilities {
            role: user.role,
            is_admin: user.role.is_admin(),
            is_teacher: user.role.is_teacher(),
            is_approved: user.is_approved,
        }
    }

    /// Unapproved accounts only ever see the approval gate. Admins are never gated.
    pub fn is_gated(&self) -> bool {
        !self.is_approved && self.role != Role::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Teacher,
    Student,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    Classes,
    Assignments,
    Users,
    ApiKeys,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    SignIn,
    PendingApproval,
    /// Teacher-capable user who hasn't picked a mode yet.
    ChooseMode,
    Teacher { panels: Vec<Panel>, can_switch: bool },
    Student { can_switch: bool },
}

/// Session-local view state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewState {
    acting_as: Option<Mode>,
}

impl ViewState {
    pub fn new() -> ViewState {
        ViewState::default()
    }

    pub fn acting_as(&self) -> Option<Mode> {
        self.acting_as
    }

    pub fn choose(&mut self, mode: Mode) {
        self.acting_as = Some(mode);
    }

    /// Back to the mode chooser.
    pub fn reset(&mut self) {
        self.acting_as = None;
    }

    pub fn resolve(&self, user: Option<&User>) -> View {
        let user = match user {
            Some(user) => user,
            None => return View::SignIn,
        };
        let caps = Capabilities::of(user);

        if caps.is_gated() {
            return View::PendingApproval;
        }
        if !caps.is_teacher {
            return View::Student { can_switch: false };
        }

        match self.acting_as {
            None => View::ChooseMode,
            Some(Mode::Teacher) => View::Teacher {
                panels: teacher_panels(&caps),
                can_switch: true,
            },
            Some(Mode::Student) => View::Student { can_switch: true },
        }
    }
}

pub fn teacher_panels(caps: &Capabilities) -> Vec<Panel> {
    let mut panels = vec![Panel::Classes, Panel::Assignments];
    if caps.is_admin {
        panels.push(Panel::Users);
    }
    panels.push(Panel::ApiKeys);
    panels
}

pub fn require_approved(user: &User) -> Result<Capabilities, AccessError> {
    let caps = Capabilities::of(user);
    if caps.is_gated() {
        return Err(AccessError::PendingApproval);
    }
    Ok(caps)
}

pub fn require_teacher(user: &User) -> Result<Capabilities, AccessError> {
    let caps = require_approved(user)?;
    if !caps.is_teacher {
        return Err(AccessError::Forbidden("teacher role required"));
    }
    Ok(caps)
}

pub fn require_admin(user: &User) -> Result<Capabilities, AccessError> {
    let caps = require_approved(user)?;
    if !caps.is_admin {
        return Err(AccessError::Forbidden("admin role required"));
    }
    Ok(caps)
}
