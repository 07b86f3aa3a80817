use experimenter_core::error::{ExperimenterError, ExperimenterResult, FormErrors};
use experimenter_core::models::comment::CommentSection;
use serde::Deserialize;

use super::fields;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommentForm {
    pub section: Option<String>,
    pub text: Option<String>,
}

impl CommentForm {
    /// Section the comment was posted from, if it names a known one.
    pub fn section(&self) -> Option<CommentSection> {
        self.section.as_deref().and_then(|s| s.parse().ok())
    }

    pub fn clean(self) -> ExperimenterResult<(CommentSection, String)> {
        let mut errors = FormErrors::new();
        let section = fields::choice::<CommentSection>(&mut errors, "section", self.section, true);
        let text = fields::required_text(&mut errors, "text", self.text);
        match (section, text) {
            (Some(section), Some(text)) => Ok((section, text)),
            _ => Err(ExperimenterError::InvalidForm(errors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_and_text_required() {
        let form = CommentForm {
            section: Some("gossip".into()),
            text: None,
        };
        match form.clean() {
            Err(ExperimenterError::InvalidForm(errors)) => {
                assert_eq!(errors.get("section").unwrap(), [fields::invalid_choice("gossip")]);
                assert_eq!(errors.get("text").unwrap(), [fields::REQUIRED]);
            }
            other => panic!("expected form errors, got {other:?}"),
        }
    }

    #[test]
    fn valid_comment() {
        let (section, text) = CommentForm {
            section: Some("risks".into()),
            text: Some(" Looks risky ".into()),
        }
        .clean()
        .unwrap();
        assert_eq!(section, CommentSection::Risks);
        assert_eq!(text, "Looks risky");
    }
}
