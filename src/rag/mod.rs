//! Prompt composition for the generation step
//!
//! The retrieved passage becomes the reference context of the prompt. With
//! no passage the question is forwarded on its own.

use serde::{Deserialize, Serialize};

use crate::retrieval::{QueryOutcome, RankedAnswer};

/// Reply the model is told to give when the context is insufficient
pub const INSUFFICIENT_CONTEXT_REPLY: &str = "根据现有信息无法回答该问题";

/// Prompt assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Upper bound on context characters
    pub max_context_chars: usize,
    /// Append the source document name to the context
    pub include_source: bool,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_context_chars: 4000,
            include_source: true,
        }
    }
}

/// A composed prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedPrompt {
    pub text: String,
    /// Whether retrieved context was included
    pub grounded: bool,
}

/// Builds generation prompts from retrieval outcomes
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    config: PromptConfig,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PromptConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, question: &str, outcome: &QueryOutcome) -> ComposedPrompt {
        match outcome {
            QueryOutcome::Found(answer) => ComposedPrompt {
                text: self.grounded(question.trim(), answer),
                grounded: true,
            },
            QueryOutcome::NotFound => ComposedPrompt {
                text: format!("用户问题: {}\n\n回答:\n", question.trim()),
                grounded: false,
            },
        }
    }

    fn grounded(&self, question: &str, answer: &RankedAnswer) -> String {
        let context = self.context_text(answer);
        format!(
            "你是一个专业的助手，任务是根据提供的参考信息回答用户问题。\n\
             请严格基于参考信息进行回答，如果参考信息不足以回答问题，请回复'{}'，不要编造信息。\n\n\
             参考信息:\n{}\n\n\
             用户问题: {}\n\n\
             回答:\n",
            INSUFFICIENT_CONTEXT_REPLY, context, question
        )
    }

    fn context_text(&self, answer: &RankedAnswer) -> String {
        let body: String = answer
            .text
            .chars()
            .take(self.config.max_context_chars)
            .collect();
        if self.config.include_source {
            format!("{} [来源: {}]", body, answer.source_label())
        } else {
            body
        }
    }

    pub fn config(&self) -> &PromptConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::MatchStrategy;

    fn found(text: &str) -> QueryOutcome {
        QueryOutcome::Found(RankedAnswer {
            text: text.to_string(),
            source_filename: "admissions.txt".to_string(),
            source_title: "admissions".to_string(),
            score: 18.0,
            strategy: MatchStrategy::Heading,
        })
    }

    #[test]
    fn test_grounded_prompt() {
        let prompt = PromptBuilder::new().build("入学需要准备哪些材料？", &found("身份证、照片"));
        assert!(prompt.grounded);
        assert!(prompt.text.contains("参考信息:\n身份证、照片 [来源: admissions]"));
        assert!(prompt.text.contains("用户问题: 入学需要准备哪些材料？"));
        assert!(prompt.text.contains(INSUFFICIENT_CONTEXT_REPLY));
        assert!(prompt.text.ends_with("回答:\n"));
    }

    #[test]
    fn test_prompt_without_context() {
        let prompt = PromptBuilder::new().build(" 宿舍几点关门 ", &QueryOutcome::NotFound);
        assert!(!prompt.grounded);
        assert_eq!(prompt.text, "用户问题: 宿舍几点关门\n\n回答:\n");
    }

    #[test]
    fn test_context_is_truncated() {
        let builder = PromptBuilder::with_config(PromptConfig {
            max_context_chars: 3,
            include_source: false,
        });
        let prompt = builder.build("问题", &found("一二三四五"));
        assert!(prompt.text.contains("参考信息:\n一二三\n"));
        assert!(!prompt.text.contains("四"));
    }
}
