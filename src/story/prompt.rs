//! Image prompts for closed scenes.
//!
//! Scene descriptions come from an external collaborator behind
//! [`PromptProvider`]. The timeline builder never aborts on a provider
//! failure: it falls back to [`fallback_prompt`] and logs a warning.

use super::error::PromptError;
use crate::ui::prelude::*;

/// Describes a scene, given the sentences narrated over it.
pub trait PromptProvider {
    fn describe(&self, sentences: &[String]) -> Result<String, PromptError>;
}

/// Builds prompts locally: `[setting], <sentences>, <quality suffix>`.
#[derive(Debug, Clone)]
pub struct TemplatePromptProvider {
    setting: Option<String>,
    suffix: String,
}

impl TemplatePromptProvider {
    pub fn new(setting: Option<String>, suffix: impl Into<String>) -> Self {
        Self {
            setting: setting.filter(|s| !s.trim().is_empty()),
            suffix: suffix.into(),
        }
    }
}

impl PromptProvider for TemplatePromptProvider {
    fn describe(&self, sentences: &[String]) -> Result<String, PromptError> {
        let body = join_sentences(sentences);
        if body.is_empty() {
            return Err(PromptError::Empty);
        }

        let mut parts = Vec::with_capacity(3);
        if let Some(setting) = &self.setting {
            parts.push(format!("[{}]", setting.trim()));
        }
        parts.push(body);
        if !self.suffix.trim().is_empty() {
            parts.push(self.suffix.trim().to_string());
        }
        Ok(parts.join(", "))
    }
}

/// Generic description built from the scene's own text.
pub fn fallback_prompt(sentences: &[String]) -> String {
    let body = join_sentences(sentences);
    if body.is_empty() {
        "an establishing shot, cinematic lighting".to_string()
    } else {
        format!("an illustration of: {body}")
    }
}

/// Ask `provider` for a description, substituting the fallback on failure.
pub fn describe_or_fallback(
    provider: &dyn PromptProvider,
    scene_id: usize,
    sentences: &[String],
) -> String {
    let result = provider
        .describe(sentences)
        .and_then(|prompt| match prompt.trim() {
            "" => Err(PromptError::Empty),
            trimmed => Ok(trimmed.to_string()),
        });

    match result {
        Ok(prompt) => prompt,
        Err(err) => {
            emit(
                Level::Warn,
                "story.prompt.fallback",
                &format!("Scene {scene_id}: {err}; using fallback prompt"),
                None,
            );
            fallback_prompt(sentences)
        }
    }
}

fn join_sentences(sentences: &[String]) -> String {
    sentences
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Provider that always fails, for exercising the fallback path.
    pub(crate) struct FailingPrompts;

    impl PromptProvider for FailingPrompts {
        fn describe(&self, _sentences: &[String]) -> Result<String, PromptError> {
            Err(PromptError::Backend("offline".into()))
        }
    }

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn template_includes_setting_and_suffix() {
        let provider = TemplatePromptProvider::new(Some("Song dynasty, Kaifeng".into()), "8k");
        let prompt = provider.describe(&lines(&["A lantern glows.", "Rain."])).unwrap();
        assert_eq!(prompt, "[Song dynasty, Kaifeng], A lantern glows. Rain., 8k");
    }

    #[test]
    fn template_without_setting() {
        let provider = TemplatePromptProvider::new(Some("  ".into()), "");
        let prompt = provider.describe(&lines(&["Dawn."])).unwrap();
        assert_eq!(prompt, "Dawn.");
    }

    #[test]
    fn failure_falls_back_to_scene_text() {
        let prompt = describe_or_fallback(&FailingPrompts, 3, &lines(&["A ship sails."]));
        assert_eq!(prompt, "an illustration of: A ship sails.");
    }

    #[test]
    fn empty_description_falls_back() {
        let provider = TemplatePromptProvider::new(None, "");
        let prompt = describe_or_fallback(&provider, 1, &lines(&["   "]));
        assert_eq!(prompt, fallback_prompt(&[]));
    }
}
