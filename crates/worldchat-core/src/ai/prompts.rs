//! Prompt builders for conversation generation
//!
//! Every prompt asks for `Name: text` lines so replies flow through the
//! line parser regardless of mode.

use crate::storage::{Agent, Theme};

/// The slice of an agent that goes into a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub name: String,
    pub description: String,
}

impl From<&Agent> for Persona {
    fn from(agent: &Agent) -> Self {
        Self {
            name: agent.name.clone(),
            description: agent.description.clone(),
        }
    }
}

fn cast_list(personas: &[Persona]) -> String {
    personas
        .iter()
        .map(|p| format!("{} ({})", p.name, p.description))
        .collect::<Vec<_>>()
        .join(", ")
}

/// System prompt for a multi-agent ensemble request
pub fn ensemble_system_prompt(personas: &[Persona], topic: &str, theme: Option<Theme>) -> String {
    let mut prompt = format!(
        "You are an inventive dialogue writer. Write a fresh, creative conversation \
         between these characters: {}. The conversation revolves around: \"{}\".",
        cast_list(personas),
        topic
    );

    if let Some(theme) = theme {
        prompt.push_str(&format!(
            " The story is set in a {} world and must stay true to that setting.",
            theme.prompt_label()
        ));
    }

    prompt.push_str(
        "\n\nWrite one line per utterance in the form `Name: text`, using the \
         character names exactly as given. Do not add narration outside those lines.",
    );
    prompt
}

/// System prompt for a single agent's turn
pub fn turn_system_prompt(persona: &Persona, theme: Theme) -> String {
    format!(
        "You are {name}, a character in a {theme} story. Speak or act according to \
         your character ({description}). Requirements:\n\
         1. Keep the dialogue interesting and creative\n\
         2. Move the story forward\n\
         3. Interact with the other characters\n\
         4. Stay true to the {theme} setting\n\n\
         Reply with a single line of what {name} says or does, without a name prefix.",
        name = persona.name,
        description = persona.description,
        theme = theme.prompt_label(),
    )
}

/// User message for a single agent's turn
///
/// `context` is the recent transcript, one `Name: text` line per utterance.
pub fn turn_user_message(persona: &Persona, theme: Theme, context: &str) -> String {
    if context.trim().is_empty() {
        format!(
            "As {}, open a new scene and start this {} story.",
            persona.name,
            theme.prompt_label()
        )
    } else {
        format!(
            "Based on the conversation so far, write what {} says or does next. \
             Conversation so far:\n{}",
            persona.name, context
        )
    }
}
