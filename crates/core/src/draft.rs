//! First drafts of a project document.

use buddy_model::{ModelProvider, ModelRequest};

use crate::Error;

/// What a new project is about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectBrief {
    /// The project title, used as the topic.
    pub title: String,
    /// Free-form details about the assignment.
    pub description: String,
}

impl ProjectBrief {
    /// Creates a brief.
    #[inline]
    pub fn new<T: Into<String>, D: Into<String>>(
        title: T,
        description: D,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    fn validate(&self) -> Result<(), Error> {
        if self.title.trim().is_empty() {
            return Err(Error::validation("project title is empty"));
        }
        if self.description.trim().is_empty() {
            return Err(Error::validation("project description is empty"));
        }
        Ok(())
    }
}

/// Builds the message asking the model for a typed academic draft.
pub fn draft_prompt(brief: &ProjectBrief) -> String {
    format!(
        "\
You are a university student submitting an assignment.
Topic: \"{title}\"
Details: \"{description}\"

Instructions:
1. Write a high-quality, formal academic response suitable for a lecturer to grade.
2. Do NOT use Markdown symbols (like #, *, -, or >).
3. Do NOT use bold or italic syntax.
4. Write in clear paragraphs. Use blank lines to separate sections.
5. If listing items, use numbers (1., 2.) or letters (a., b.) followed by a period.
6. Make it look like a standard typed essay or report.

Start writing the assignment immediately.",
        title = brief.title.trim(),
        description = brief.description.trim(),
    )
}

/// Asks the model for a first draft of the project document.
///
/// The request has no history and no preamble. The brief is validated
/// before anything is sent.
pub async fn generate_draft<P: ModelProvider>(
    provider: &P,
    brief: &ProjectBrief,
) -> Result<String, Error> {
    brief.validate()?;
    provider
        .check_config()
        .map_err(|err| Error::from_provider(&err))?;

    let req = ModelRequest {
        preamble: None,
        history: vec![],
        message: draft_prompt(brief),
    };
    debug!("generating a draft for {:?}", brief.title);
    let text = provider.complete(&req).await.map_err(|err| {
        error!("failed to generate a draft: {err}");
        Error::from_provider(&err)
    })?;
    Ok(text.trim().to_owned())
}
