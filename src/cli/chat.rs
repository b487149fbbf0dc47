mod highlighter;
mod prompt;
mod repl;
mod tempfile;

use core::fmt;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use tokio::{select, signal};

use self::repl::Repl;
use super::{fallback_engine, read_prompt};
use crate::chat::{self, Role};
use crate::config::{Config, Keybindings};
use crate::fallback::{self, Answered, FallbackEngine};
use crate::providers::ChatConfig;
use crate::utils::errors::{fmt_error, fmt_warn};
use crate::{die, version, warn, ChatArgs};
use prompt::{model_prompt, user_prompt};

/// Shown in place of a reply when no model could be reached.
pub(crate) const UNAVAILABLE_REPLY: &str =
    "I'm having trouble connecting right now. Please try again in a moment!";

pub(crate) enum Severity {
    Error,
    Warn,
    Standard,
}

/// Everything shown during a chat. Only `Chat` entries are sent to the model.
pub(crate) enum Message {
    Chat(chat::Message, Option<String>),
    Command(String),
    Output(Severity, String),
}

impl Message {
    pub(crate) fn warn(msg: String) -> Message {
        Message::Output(Severity::Warn, msg)
    }

    pub(crate) fn error(msg: String) -> Message {
        Message::Output(Severity::Error, msg)
    }

    pub(crate) fn output(msg: String) -> Message {
        Message::Output(Severity::Standard, msg)
    }

    pub(crate) fn command(msg: String) -> Message {
        Message::Command(msg)
    }

    pub(crate) fn user(msg: String) -> Message {
        Message::Chat(chat::Message::user(msg), None)
    }

    pub(crate) fn model(msg: String, model_id: String) -> Message {
        Message::Chat(chat::Message::model(msg), Some(model_id))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Chat(message, model_id) => match &message.role {
                Role::User => write!(f, "{}{}", user_prompt(), message.content),
                Role::Model => write!(
                    f,
                    "{}{}",
                    model_prompt(model_id.as_deref().unwrap_or("model")),
                    message.content
                ),
            },
            Message::Command(command) => {
                write!(f, "{}{}", user_prompt(), command)
            }
            Message::Output(severity, msg) => match severity {
                Severity::Warn => fmt_warn(f, msg),
                Severity::Error => fmt_error(f, msg),
                Severity::Standard => write!(f, "{}", msg),
            },
        }
    }
}

#[derive(Default)]
pub(crate) struct MessageBuffer {
    buf: Vec<Message>,
}

impl MessageBuffer {
    pub(crate) fn new() -> MessageBuffer {
        MessageBuffer::default()
    }

    pub(crate) fn add_message(&mut self, msg: Message) {
        self.buf.push(msg);
    }

    pub(crate) fn chat_messages(&self) -> Vec<chat::Message> {
        self.buf
            .iter()
            .filter_map(|msg| match msg {
                Message::Chat(msg, _) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        self.buf.clear();
    }
}

/// Sends one user turn with everything said so far as history. The turn is
/// recorded, labelled with the model that answered, only if one did.
async fn send_turn(
    engine: &FallbackEngine,
    system: Option<&str>,
    msg_buf: &mut MessageBuffer,
    prompt: String,
) -> Result<Answered<String>, fallback::Error> {
    let chat_config = ChatConfig {
        system_instruction: system.map(str::to_string),
        ..ChatConfig::with_history(msg_buf.chat_messages())
    };

    let answered = engine.chat_send_with_model(&chat_config, &prompt).await?;

    msg_buf.add_message(Message::user(prompt));
    msg_buf.add_message(Message::model(
        answered.value.clone(),
        answered.model.clone(),
    ));

    Ok(answered)
}

/// Answers a single prompt without keeping any history.
async fn one_shot(engine: &FallbackEngine, system: Option<&str>, prompt: &str) {
    let chat_config = ChatConfig {
        system_instruction: system.map(str::to_string),
        ..ChatConfig::default()
    };

    match engine.chat_send(&chat_config, prompt).await {
        Ok(reply) => println!("{}", reply),
        Err(err) => {
            eprintln!("{}", Message::error(format!("chat failed: {}", err)));
            println!("{}", UNAVAILABLE_REPLY);

            std::process::exit(crate::utils::errors::DEFAULT_EXIT_CODE);
        }
    }
}

async fn announce(engine: &FallbackEngine) {
    println!("{} version {}", version::NAME, version::VERSION);

    match engine.ping().await {
        Ok(elapsed) => println!(
            "{}",
            Message::output(format!(
                "{} ping OK ({} ms)",
                engine.registry().active_model(),
                elapsed.as_millis()
            ))
        ),
        Err(err) => warn!("model ping failed, chatting anyway: {}", err),
    }
}

pub(crate) async fn chat_cmd(config: &Config, args: &ChatArgs) {
    let stdin_is_tty = io::stdin().is_terminal();
    let stdout_is_tty = io::stdout().is_terminal();

    if args.prompt.is_some() && !stdin_is_tty {
        die!("a prompt was given both as an argument and on standard input");
    }

    // A terminal on both ends means a conversation; piped input is one question.
    let interactive = match args.prompt {
        Some(_) => args.interactive,
        None => stdin_is_tty && stdout_is_tty,
    };

    let initial_prompt = match (&args.prompt, stdin_is_tty) {
        (Some(prompt), _) => Some(prompt.clone()),
        (None, false) => Some(read_prompt(None)),
        (None, true) => None,
    };

    let engine = fallback_engine(config);
    let system = args.system.as_deref();

    if !interactive {
        match initial_prompt {
            Some(prompt) => one_shot(&engine, system, &prompt).await,
            None => die!("no prompt given"),
        }

        return;
    }

    let editor = config.editor.as_ref().map(PathBuf::from);

    chat(&engine, editor, config.keybindings, system, initial_prompt).await;
}

async fn chat(
    engine: &FallbackEngine,
    editor: Option<PathBuf>,
    keybindings: Keybindings,
    system: Option<&str>,
    initial_prompt: Option<String>,
) {
    announce(engine).await;

    let mut pending_prompt = initial_prompt;

    let mut msg_buf = MessageBuffer::new();

    let mut repl = Repl::new(editor, keybindings);

    loop {
        let prompt = match pending_prompt.take() {
            Some(prompt) => prompt,
            None => match repl.edit(&mut msg_buf) {
                Some(prompt) => prompt,
                None => break,
            },
        };

        let outcome = select! {
            outcome = send_turn(engine, system, &mut msg_buf, prompt) => outcome,
            _ = signal::ctrl_c() => continue,
        };

        match outcome {
            Ok(answered) => println!("{}{}\n", model_prompt(&answered.model), answered.value),
            Err(err) => {
                let failure = Message::error(format!("chat failed: {}", err));

                eprintln!("{}", failure);
                println!("{}{}\n", model_prompt("careerramp"), UNAVAILABLE_REPLY);

                msg_buf.add_message(failure);
            }
        }
    }
}
