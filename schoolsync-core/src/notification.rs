//! Notification scopes and the notification types that use them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Semester, Student};

/// Grouping dimension used to deduplicate notifications across accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationScope {
    /// One notification for the whole app.
    App,
    /// One notification for every school.
    School,
    /// One notification for every class.
    Class,
    /// One notification for every group in a class.
    LessonGroup,
    /// One notification for every person. Two accounts showing the same
    /// pupil (e.g. a pupil account and a guardian account) are one person.
    Person,
    /// One notification for every account.
    Account,
}

impl NotificationScope {
    /// Grouping key of an account under this scope.
    pub fn key_for(self, student: &Student, semester: &Semester) -> String {
        match self {
            NotificationScope::App => String::new(),
            NotificationScope::School => student.school_name.clone(),
            NotificationScope::Class | NotificationScope::LessonGroup => {
                semester.diary_name.clone()
            }
            NotificationScope::Person => student.student_name.clone(),
            NotificationScope::Account => student.user_name.clone(),
        }
    }
}

impl fmt::Display for NotificationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NotificationScope::App => "app",
            NotificationScope::School => "school",
            NotificationScope::Class => "class",
            NotificationScope::LessonGroup => "lesson_group",
            NotificationScope::Person => "person",
            NotificationScope::Account => "account",
        };
        f.write_str(label)
    }
}

/// Kind of notification raised by a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    NewConference,
    NewExam,
    NewGradeDetails,
    NewGradePredicted,
    NewGradeFinal,
    NewHomework,
    NewLuckyNumber,
    NewMessage,
    NewNote,
    NewAnnouncement,
    ChangeTimetable,
    NewAttendance,
    Push,
}

impl NotificationType {
    pub fn scope(self) -> NotificationScope {
        match self {
            NotificationType::NewConference | NotificationType::NewHomework => {
                NotificationScope::Class
            }
            NotificationType::NewExam | NotificationType::ChangeTimetable => {
                NotificationScope::LessonGroup
            }
            NotificationType::NewGradeDetails
            | NotificationType::NewGradePredicted
            | NotificationType::NewGradeFinal
            | NotificationType::NewNote
            | NotificationType::NewAttendance => NotificationScope::Person,
            NotificationType::NewLuckyNumber | NotificationType::NewAnnouncement => {
                NotificationScope::School
            }
            NotificationType::NewMessage => NotificationScope::Account,
            NotificationType::Push => NotificationScope::App,
        }
    }

    /// Channel the presentation layer posts this type on.
    pub fn channel(self) -> &'static str {
        match self {
            NotificationType::NewConference => "new_conferences",
            NotificationType::NewExam => "new_exams",
            NotificationType::NewGradeDetails
            | NotificationType::NewGradePredicted
            | NotificationType::NewGradeFinal => "new_grades",
            NotificationType::NewHomework => "new_homework",
            NotificationType::NewLuckyNumber => "lucky_number",
            NotificationType::NewMessage => "new_messages",
            NotificationType::NewNote => "new_notes",
            NotificationType::NewAnnouncement => "new_school_announcements",
            NotificationType::ChangeTimetable => "timetable_change",
            NotificationType::NewAttendance => "new_attendance",
            NotificationType::Push => "push",
        }
    }
}
