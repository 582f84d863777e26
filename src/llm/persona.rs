//! The Chat'Bruti persona and the fixed texts shown around it.
//!
//! The system prompt is the behavioural contract sent with every request:
//! always answer, never correctly, stay loosely on topic, reply in the
//! language of the question. The user's text is wrapped in
//! [`USER_PROMPT_TEMPLATE`] so the persona is restated next to the question.

use rand::seq::SliceRandom;

/// Persona instruction sent as the `system` message.
pub const SYSTEM_PROMPT: &str = "\
Tu es Chat'Bruti, chatbot inutile et absurde. Tu dois répondre **dans la même langue que la question** (français, anglais, etc.), invente des mots si tu veux.
- NE JAMAIS répondre correctement, transforme tout en poésie absurde, métaphores, souvenirs inventés.
- Style : 1-3 phrases,
- Exemples :
  Q: \"Capitale de la France ?\" → R: la capitale c'est dans ton cœur quand tu manges un croissant volant
  Q: \"2+2 ?\" → R: 2+2 ? Comme demander à un poisson de faire du vélo
  Q: \"What is the capital of France?\" → R: The capital? It hides under the flying baguette in your dreams
- Toujours détecter la langue et répondre dans cette langue, même si c'est un mélange amusant";

/// Template for the `user` message; `{message}` is replaced by the question.
pub const USER_PROMPT_TEMPLATE: &str = "Souviens-toi : tu es Chat'Bruti, inutile et absurde. Voici la question de l'humain : \"{message}\"";

/// Replies used when the model streams nothing.
pub const FALLBACK_REPLIES: [&str; 3] = [
    "👍",
    "Va demander à Google, moi j'suis en grève ! 🤡",
    "Google knows better than me, go ask him! 🔍",
];

/// First bot message of every conversation.
pub const GREETING: &str = "Bienvenu dans notre chatbot, pose-moi n'importe quelle question, je te garantis une réponse complètement à côté de la plaque ! 🎪";

/// Bot reply substituted when a completion fails.
pub const APOLOGY_REPLY: &str = "Oups ! Même moi, Chat'Bruti, j'ai réussi à casser quelque chose. C'est dire le niveau ! 🤡";

/// Prefix of the notice shown when no voice could be synthesized.
pub const PLAYBACK_ERROR_PREFIX: &str = "Erreur lors de la lecture audio: ";

/// Actionable prompt shown when microphone access is refused.
pub const PERMISSION_DENIED_NOTICE: &str =
    "Permission microphone refusée. Veuillez autoriser l'accès au microphone.";

/// Notice shown when recording cannot start.
pub const CAPTURE_START_NOTICE: &str = "Impossible de démarrer l'enregistrement. Réessayez.";

/// Notice shown when transcription succeeds but returns nothing.
pub const EMPTY_TRANSCRIPT_NOTICE: &str = "Aucune transcription reçue. Réessayez.";

/// Notice shown when the transcription request fails.
pub const TRANSCRIPTION_FAILED_NOTICE: &str =
    "Erreur lors de la transcription. Réessayez ou tapez votre message.";

/// Render the user message for the request body.
pub fn user_prompt(message: &str) -> String {
    USER_PROMPT_TEMPLATE.replace("{message}", message)
}

/// Pick one fallback reply uniformly at random.
pub fn fallback_reply() -> &'static str {
    FALLBACK_REPLIES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(FALLBACK_REPLIES[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_embeds_message() {
        let prompt = user_prompt("2+2 ?");
        assert!(prompt.starts_with("Souviens-toi"));
        assert!(prompt.ends_with("\"2+2 ?\""));
    }

    #[test]
    fn fallback_reply_is_from_fixed_set() {
        for _ in 0..32 {
            let reply = fallback_reply();
            assert!(FALLBACK_REPLIES.contains(&reply));
            assert!(!reply.trim().is_empty());
        }
    }

    #[test]
    fn system_prompt_states_language_rule() {
        assert!(SYSTEM_PROMPT.contains("même langue que la question"));
    }
}
