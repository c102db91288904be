use std::fmt::{self, Display};
use std::str::FromStr;

use buddy_core::conversation::ConversationHistory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of work a project is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Business reports and plans.
    Business,
    /// School and university assignments.
    Academic,
    /// Everything else.
    #[default]
    #[serde(other)]
    Personal,
}

impl Category {
    /// Returns the department label printed on exported documents.
    pub fn department(self) -> &'static str {
        match self {
            Category::Business => "Business Administration",
            Category::Academic => "General Studies",
            Category::Personal => "Personal Development",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Business => "Business",
            Category::Academic => "Academic",
            Category::Personal => "Personal",
        };
        f.write_str(name)
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "business" => Ok(Category::Business),
            "academic" => Ok(Category::Academic),
            "personal" => Ok(Category::Personal),
            _ => Err(format!("unknown category: {s:?}")),
        }
    }
}

/// A project document together with its conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Identifier, also the file name in a [`ProjectStore`](crate::ProjectStore).
    pub id: String,
    /// Title.
    pub title: String,
    /// Category.
    #[serde(default)]
    pub category: Category,
    /// What the project is about.
    #[serde(default)]
    pub description: String,
    /// Free-form due date as entered by the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    /// The document body.
    #[serde(default)]
    pub content: String,
    /// When the document was last saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edited: Option<DateTime<Utc>>,
    /// The conversation about the document.
    #[serde(default)]
    pub chat_history: ConversationHistory,
}

impl Project {
    /// Creates a project with an empty document.
    ///
    /// The id is derived from the title and the creation time.
    pub fn new<T: Into<String>, D: Into<String>>(
        title: T,
        category: Category,
        description: D,
    ) -> Self {
        let title = title.into();
        let now = Utc::now();
        Self {
            id: generate_id(&title, now),
            title,
            category,
            description: description.into(),
            deadline: None,
            content: String::new(),
            last_edited: None,
            chat_history: ConversationHistory::new(),
        }
    }

    /// Sets the due date.
    #[inline]
    pub fn with_deadline<S: Into<String>>(mut self, deadline: S) -> Self {
        self.deadline = Some(deadline.into());
        self
    }
}

fn generate_id(title: &str, now: DateTime<Utc>) -> String {
    let mut slug = String::new();
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
        if slug.len() >= 40 {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');
    let stamp = now.format("%Y%m%d%H%M%S%3f");
    if slug.is_empty() {
        format!("project-{stamp}")
    } else {
        format!("{slug}-{stamp}")
    }
}
