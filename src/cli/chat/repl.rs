use std::env;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::Command;

use nu_ansi_term::{Color, Style};
use reedline::{
    default_emacs_keybindings, default_vi_insert_keybindings, default_vi_normal_keybindings,
    ColumnarMenu, DefaultCompleter, EditCommand, EditMode, Emacs, KeyCode, KeyModifiers,
    Keybindings, MenuBuilder, Reedline, ReedlineEvent, ReedlineMenu, Signal, Vi,
};

use super::highlighter::Highlighter;
use super::prompt::{completion_marker, Prompt};
use super::tempfile::Tempfile;
use super::{Message, MessageBuffer};
use crate::{config, die};

const COMMANDS: [(&str, &str); 4] = [
    ("/edit", "compose the next message in an editor"),
    ("/clear", "forget the conversation so far"),
    ("/help", "list commands"),
    ("/exit", "leave the chat"),
];

/// Attempts to resolve the preferred editor. If the EDITOR environment variable
/// is defined, the command specified by it is used. Otherwise, the PATH is
/// searched for common editors, and the first found editor is used.
fn resolve_fallback_editor() -> Option<PathBuf> {
    const FALLBACK_EDITORS: [&str; 5] = ["editor", "vim", "emacs", "vi", "nano"];

    if let Ok(editor) = env::var("EDITOR") {
        return Some(editor.into());
    }

    let paths = env::var_os("PATH")?;

    env::split_paths(&paths)
        .flat_map(|dir| FALLBACK_EDITORS.iter().map(move |editor| dir.join(editor)))
        .find(|candidate| candidate.exists())
}

/// Opens `temp_file` in `editor` and returns what was saved.
fn read_from_interactive_editor(editor: &Path, temp_file: &mut Tempfile) -> io::Result<String> {
    temp_file.file_mut().set_len(0)?;
    temp_file.file_mut().seek(SeekFrom::Start(0))?;

    let status = Command::new(editor).arg(temp_file.path()).status()?;

    if !status.success() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("\"{}\" did not exit successfully", editor.display()),
        ));
    }

    let mut edited_content = String::new();

    temp_file.file_mut().read_to_string(&mut edited_content)?;

    Ok(edited_content)
}

fn open_completion_menu() -> ReedlineEvent {
    ReedlineEvent::UntilFound(vec![
        ReedlineEvent::Menu("completion_menu".to_string()),
        ReedlineEvent::MenuNext,
    ])
}

fn edit_mode(keybindings: config::Keybindings) -> Box<dyn EditMode> {
    match keybindings {
        config::Keybindings::Vi => {
            let mut insert_bindings = default_vi_insert_keybindings();

            insert_bindings.add_binding(KeyModifiers::NONE, KeyCode::Tab, open_completion_menu());

            Box::new(Vi::new(insert_bindings, default_vi_normal_keybindings()))
        }
        config::Keybindings::Emacs => {
            let mut bindings: Keybindings = default_emacs_keybindings();

            bindings.add_binding(KeyModifiers::NONE, KeyCode::Tab, open_completion_menu());

            bindings.add_binding(
                KeyModifiers::CONTROL,
                KeyCode::Char('e'),
                ReedlineEvent::OpenEditor,
            );

            bindings.add_binding(
                KeyModifiers::CONTROL,
                KeyCode::Char('j'),
                ReedlineEvent::Edit(vec![EditCommand::InsertNewline]),
            );

            Box::new(Emacs::new(bindings))
        }
    }
}

fn help() -> String {
    COMMANDS
        .iter()
        .map(|(command, about)| format!("{:<8}{}", command, about))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) struct Repl {
    line_editor: Reedline,
    prompt: Prompt,
    tempfile: Tempfile,
    editor: Option<PathBuf>,
}

impl Repl {
    pub(crate) fn new(editor: Option<PathBuf>, keybindings: config::Keybindings) -> Repl {
        let tempfile = match Tempfile::with_base_and_ext("msg", ".careerramp") {
            Ok(tempfile) => tempfile,
            Err(err) => die!("failed to create a temporary file: {}", err),
        };

        let mut completer = Box::new(DefaultCompleter::with_inclusions(&['/']));

        completer.insert(COMMANDS.iter().map(|(command, _)| command.to_string()).collect());

        // Use the interactive menu to select options from the completer
        let completion_menu = Box::new(
            ColumnarMenu::default()
                .with_name("completion_menu")
                .with_marker(&completion_marker().to_string())
                .with_text_style(Style::new().fg(Color::Default))
                .with_selected_text_style(Style::new().fg(Color::Blue).on(Color::DarkGray))
                .with_selected_match_text_style(
                    Style::new().fg(Color::Blue).bold().on(Color::DarkGray),
                ),
        );

        let editor = editor.or_else(resolve_fallback_editor);

        let line_editor = Reedline::create()
            .with_completer(completer)
            .with_menu(ReedlineMenu::EngineCompleter(completion_menu))
            .with_edit_mode(edit_mode(keybindings))
            .with_highlighter(Box::new(Highlighter));

        let line_editor = match &editor {
            Some(editor) => {
                line_editor.with_buffer_editor(Command::new(editor), tempfile.path_buf().clone())
            }
            None => line_editor,
        };

        Repl {
            line_editor,
            prompt: Prompt::default(),
            tempfile,
            editor,
        }
    }

    fn report(msg_buf: &mut MessageBuffer, msg: Message) {
        eprintln!("{}", msg);
        msg_buf.add_message(msg);
    }

    /// Reads lines until one is a message for the model. Returns `None` when
    /// the user leaves.
    pub(crate) fn edit(&mut self, msg_buf: &mut MessageBuffer) -> Option<String> {
        loop {
            let command = match self.line_editor.read_line(&self.prompt) {
                Ok(Signal::Success(command)) => command,
                Ok(Signal::CtrlC) => continue,
                _ => return None,
            };

            msg_buf.add_message(Message::command(command.clone()));

            match command.trim() {
                "" => continue,
                "/exit" => return None,
                "/help" => println!("{}", help()),
                "/clear" => msg_buf.clear(),
                "/edit" => {
                    let Some(editor) = self.editor.as_ref() else {
                        Self::report(msg_buf, Message::warn("no editor specified".to_string()));
                        continue;
                    };

                    match read_from_interactive_editor(editor, &mut self.tempfile) {
                        Ok(buffer) if buffer.trim().is_empty() => continue,
                        Ok(buffer) => {
                            println!("{}", buffer);

                            return Some(buffer);
                        }
                        Err(err) => Self::report(
                            msg_buf,
                            Message::error(format!("editor failed: {}", err)),
                        ),
                    }
                }
                _ => return Some(command),
            }
        }
    }
}
