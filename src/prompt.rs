use std::io::{self, BufRead, Write};

/// Asks the user for a line of text or a yes/no answer.
pub trait Prompter {
    /// `None` when the user cancels.
    fn prompt(&self, message: &str) -> Option<String>;

    fn confirm(&self, message: &str) -> bool;
}

pub struct TerminalPrompter {
    /// Answer given on the command line; skips reading stdin.
    pub preset: Option<String>,
    /// Answer yes to every confirmation without asking.
    pub assume_yes: bool,
}

impl TerminalPrompter {
    fn read_line(message: &str) -> Option<String> {
        print!("{} ", message);
        io::stdout().flush().ok()?;
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}

impl Prompter for TerminalPrompter {
    fn prompt(&self, message: &str) -> Option<String> {
        match &self.preset {
            Some(answer) => Some(answer.clone()),
            None => Self::read_line(message),
        }
    }

    fn confirm(&self, message: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        Self::read_line(&format!("{} [y/N]", message))
            .map(|a| matches!(a.trim().to_lowercase().as_str(), "y" | "yes"))
            .unwrap_or(false)
    }
}

/// Answers from fixed values, for tests.
#[cfg(test)]
pub struct ScriptedPrompter {
    pub answer: Option<String>,
    pub confirm: bool,
}

#[cfg(test)]
impl ScriptedPrompter {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            confirm: true,
        }
    }

    pub fn declining() -> Self {
        Self {
            answer: None,
            confirm: false,
        }
    }
}

#[cfg(test)]
impl Prompter for ScriptedPrompter {
    fn prompt(&self, _message: &str) -> Option<String> {
        self.answer.clone()
    }

    fn confirm(&self, _message: &str) -> bool {
        self.confirm
    }
}
