//! schoolsync core library — domain types, cached entities, notification
//! scopes, configuration.
//!
//! Public API surface:
//! - [`types`] — accounts, terms, mailbox newtypes
//! - [`entities`] — cached records and the [`CacheEntity`] / [`Notifiable`] traits
//! - [`notification`] — [`NotificationScope`] and [`NotificationType`]
//! - [`config`] — load / save of [`SyncConfig`]
//! - [`paths`] — `~/.schoolsync` layout

pub mod config;
pub mod entities;
pub mod error;
pub mod notification;
pub mod paths;
pub mod types;

pub use config::SyncConfig;
pub use entities::{
    Attendance, AttendanceSummary, CacheEntity, Conference, Exam, Grade, GradeSummary, Homework,
    LuckyNumber, Message, Note, Notifiable, SchoolAnnouncement, Subject, Teacher, Timetable,
};
pub use error::ConfigError;
pub use notification::{NotificationScope, NotificationType};
pub use types::{
    Mailbox, MessageFolder, Semester, Student, StudentId, StudentWithCurrentSemester,
};
