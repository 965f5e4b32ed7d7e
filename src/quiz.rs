use log::{ info, warn };
use serde::{ Deserialize, Serialize };
use serde::de::DeserializeOwned;

use crate::config::prompt::{ PromptConfig, QUIZ_CHECK_TEMPLATE, QUIZ_GENERATE_TEMPLATE };
use crate::error::{ AgentError, AgentResult };
use crate::llm::GenerationOptions;
use crate::llm::chat::ChatClient;

pub const DEFAULT_QUESTION_COUNT: usize = 5;
pub const MAX_QUESTION_COUNT: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

impl QuizQuestion {
    fn is_well_formed(&self) -> bool {
        !self.question.trim().is_empty()
            && self.options.len() >= 2
            && self.options.iter().any(|o| o == &self.correct_answer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizFeedback {
    pub correct: bool,
    pub explanation: String,
    pub correct_answer: String,
}

/// Pulls the outermost `open ... close` span out of a reply, which drops code
/// fences and chatter around the JSON.
fn extract_json<T: DeserializeOwned>(text: &str, open: char, close: char) -> Option<T> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn fallback_quiz(topic: &str) -> Vec<QuizQuestion> {
    vec![QuizQuestion {
        question: format!("What is the main concept of {}?", topic),
        options: (1..=4).map(|i| format!("Option {}", i)).collect(),
        correct_answer: "Option 1".to_string(),
    }]
}

fn fallback_feedback(question: &QuizQuestion, answer: &str) -> QuizFeedback {
    QuizFeedback {
        correct: answer.trim() == question.correct_answer.trim(),
        explanation: format!("The correct answer is {}", question.correct_answer),
        correct_answer: question.correct_answer.clone(),
    }
}

pub fn parse_quiz(text: &str, topic: &str) -> Vec<QuizQuestion> {
    let questions: Vec<QuizQuestion> = extract_json::<Vec<QuizQuestion>>(text, '[', ']')
        .unwrap_or_default()
        .into_iter()
        .filter(QuizQuestion::is_well_formed)
        .collect();

    if questions.is_empty() {
        warn!("Quiz reply for '{}' was not usable JSON, using fallback question", topic);
        return fallback_quiz(topic);
    }
    questions
}

pub fn parse_feedback(text: &str, question: &QuizQuestion, answer: &str) -> QuizFeedback {
    extract_json::<QuizFeedback>(text, '{', '}').unwrap_or_else(|| {
        warn!("Quiz feedback was not usable JSON, grading locally");
        fallback_feedback(question, answer)
    })
}

pub async fn generate_quiz(
    client: &dyn ChatClient,
    prompts: &PromptConfig,
    topic: &str,
    count: usize
) -> AgentResult<Vec<QuizQuestion>> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(AgentError::InvalidInput("Topic is required".into()));
    }
    let count = count.clamp(1, MAX_QUESTION_COUNT);

    let prompt = prompts.render(QUIZ_GENERATE_TEMPLATE, &[
        ("topic", topic),
        ("count", &count.to_string()),
    ])?;
    info!("Generating {} quiz questions about '{}'", count, topic);
    let text = client.complete(&prompt, &GenerationOptions::default()).await?.response;

    let mut questions = parse_quiz(&text, topic);
    questions.truncate(count);
    Ok(questions)
}

pub async fn check_answer(
    client: &dyn ChatClient,
    prompts: &PromptConfig,
    question: &QuizQuestion,
    answer: &str
) -> AgentResult<QuizFeedback> {
    if question.question.trim().is_empty() || answer.trim().is_empty() {
        return Err(AgentError::InvalidInput("Question and answer are required".into()));
    }

    let options = question.options.join(", ");
    let prompt = prompts.render(QUIZ_CHECK_TEMPLATE, &[
        ("question", &question.question),
        ("options", &options),
        ("correct_answer", &question.correct_answer),
        ("answer", answer),
    ])?;
    let text = client.complete(&prompt, &GenerationOptions::default()).await?.response;

    Ok(parse_feedback(&text, question, answer))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question() -> QuizQuestion {
        QuizQuestion {
            question: "Which keyword declares an immutable binding in Rust?".into(),
            options: vec!["let".into(), "mut".into(), "var".into(), "const fn".into()],
            correct_answer: "let".into(),
        }
    }

    #[test]
    fn fenced_json_array_is_parsed() {
        let reply = "Here you go:\n```json\n[{\"question\":\"Q1\",\"options\":[\"a\",\"b\",\"c\",\"d\"],\"correctAnswer\":\"b\"}]\n```";
        let quiz = parse_quiz(reply, "Rust");
        assert_eq!(quiz.len(), 1);
        assert_eq!(quiz[0].correct_answer, "b");
    }

    #[test]
    fn malformed_reply_falls_back() {
        let quiz = parse_quiz("I cannot do that", "Rust");
        assert_eq!(quiz, fallback_quiz("Rust"));
        assert_eq!(quiz[0].question, "What is the main concept of Rust?");
    }

    #[test]
    fn questions_with_unknown_answer_are_dropped() {
        let reply = r#"[
            {"question":"Good","options":["a","b"],"correctAnswer":"a"},
            {"question":"Bad","options":["a","b"],"correctAnswer":"z"}
        ]"#;
        let quiz = parse_quiz(reply, "Rust");
        assert_eq!(quiz.len(), 1);
        assert_eq!(quiz[0].question, "Good");
    }

    #[test]
    fn feedback_json_is_used_when_present() {
        let reply = r#"{"correct": false, "explanation": "mut makes it mutable", "correctAnswer": "let"}"#;
        let fb = parse_feedback(reply, &question(), "mut");
        assert!(!fb.correct);
        assert_eq!(fb.explanation, "mut makes it mutable");
    }

    #[test]
    fn feedback_falls_back_to_local_grading() {
        let fb = parse_feedback("Nice try!", &question(), " let ");
        assert!(fb.correct);
        assert_eq!(fb.explanation, "The correct answer is let");

        let fb = parse_feedback("", &question(), "var");
        assert!(!fb.correct);
    }
}
