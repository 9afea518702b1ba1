use rand::seq::SliceRandom;
use tracing::warn;

use crate::llm::SYSTEM_PROMPT;
use crate::router::rules::EMPATHY_TRIGGERS;
use crate::router::IntentRouter;

const NO_PROVIDER_REPLY: &str =
    "I can hear you. For open-ended questions, add API keys to enable smart answers.";
const EMPTY_REPLY: &str = "Sorry, I don't have an answer for that yet.";
const DEFAULT_SUPPORT: &str =
    "I'm here with you. Thanks for sharing that with me. How can I support you right now?";

const SUPPORTIVE: &[&str] = &[
    "I'm here with you. I'm sorry it's been rough. Want to tell me more about it?",
    "That sounds heavy. You don't have to carry it alone; I'm listening if you want to share.",
    "It's okay to feel this way. Take a deep breath. Would a small break or a glass of water help?",
    "I'm on your side. One step at a time, we'll get through this together.",
    "Thanks for being honest with me. You matter more than you know. How can I support you right now?",
    "I believe in you. Even tough days end. Want me to put on calming music or open a journal?",
    "Sending you a little encouragement: you've done hard things before, and you can again.",
];

const HOW_ARE_YOU: &[&str] = &[
    "I'm doing well, thank you. How are you feeling today?",
    "I'm here and ready to help. How are you holding up?",
    "Grateful to be with you. How's your day going?",
];

const JOKES: &[&str] = &[
    "There are 10 kinds of people in the world: those who understand binary and those who don't.",
    "A SQL query walks into a bar, goes up to two tables and asks: can I join you?",
    "Why do programmers prefer dark mode? Because light attracts bugs.",
    "I would tell you a UDP joke, but you might not get it.",
    "Debugging is like being the detective in a crime movie where you are also the murderer.",
    "Why did the developer go broke? Because they used up all their cache.",
    "How many programmers does it take to change a light bulb? None, that's a hardware problem.",
    "A programmer's partner says: buy a loaf of bread, and if they have eggs, get a dozen. They come home with twelve loaves.",
    "There are only two hard things in computer science: cache invalidation, naming things, and off-by-one errors.",
    "Knock knock. Race condition. Who's there?",
    "To understand recursion, you must first understand recursion.",
    "Why do Java developers wear glasses? Because they don't C sharp.",
];

/// A supportive reply when `text` sounds personal, `None` otherwise.
pub fn empathetic_response(text: &str) -> Option<&'static str> {
    if !EMPATHY_TRIGGERS.iter().any(|t| text.contains(t)) {
        return None;
    }
    let options = if text.contains("how are you") {
        HOW_ARE_YOU
    } else {
        SUPPORTIVE
    };
    options.choose(&mut rand::thread_rng()).copied()
}

impl IntentRouter {
    pub(in crate::router) fn tell_joke(&self) -> anyhow::Result<()> {
        let joke = JOKES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("I'm out of jokes for now.");
        self.say(joke);
        Ok(())
    }

    pub(in crate::router) fn hearing_check(&self) -> anyhow::Result<()> {
        self.say("Yes, I can hear you clearly.");
        Ok(())
    }

    pub(in crate::router) fn model_info(&self) -> anyhow::Result<()> {
        let label = self
            .deps
            .llm
            .as_ref()
            .map_or_else(|| "none".to_string(), |llm| llm.label());
        self.say(&format!("I am using model {label}."));
        Ok(())
    }

    pub(in crate::router) fn audio_test(&self) -> anyhow::Result<()> {
        self.say("This is a voice test. If you can hear me, audio is working.");
        Ok(())
    }

    pub(in crate::router) fn empathize(&self, text: &str) -> anyhow::Result<()> {
        self.say(empathetic_response(text).unwrap_or(DEFAULT_SUPPORT));
        Ok(())
    }

    /// Anything no rule claimed goes to the language model.
    pub(in crate::router) fn answer_with_model(&self, text: &str) -> anyhow::Result<()> {
        let Some(llm) = &self.deps.llm else {
            self.say(NO_PROVIDER_REPLY);
            return Ok(());
        };
        let reply = match llm.complete(text, SYSTEM_PROMPT) {
            Ok(reply) if reply.trim().is_empty() => EMPTY_REPLY.to_string(),
            Ok(reply) => reply.trim().to_string(),
            Err(e) => {
                warn!(model = %llm.label(), "Model request failed: {:#}", e);
                format!("I can hear you, but I couldn't contact the model: {e}")
            }
        };
        self.say(&reply);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empathetic_response() {
        assert!(empathetic_response("what is rust").is_none());
        let reply = empathetic_response("how are you").unwrap();
        assert!(HOW_ARE_YOU.contains(&reply));
        let reply = empathetic_response("i had a bad day").unwrap();
        assert!(SUPPORTIVE.contains(&reply));
    }
}
