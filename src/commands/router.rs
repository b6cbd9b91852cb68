//! Ordered pattern table mapping message text to commands.

use regex::Regex;

use super::types::{BotCommand, CommandKind};

/// First-match-wins command router.
#[derive(Debug, Clone)]
pub struct CommandRouter {
    prefix: String,
    routes: Vec<(Regex, CommandKind)>,
}

impl CommandRouter {
    /// Compiles one pattern per command for the given prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern fails to compile.
    pub fn new(prefix: &str) -> Result<Self, regex::Error> {
        let escaped = regex::escape(prefix);
        let routes = CommandKind::ALL
            .into_iter()
            .map(|kind| {
                let pattern = if kind.takes_argument() {
                    format!(r"(?s)^{escaped}{}(?:\s+(.*))?$", kind.keyword())
                } else {
                    format!(r"^{escaped}{}(?:\s|$)", kind.keyword())
                };
                Regex::new(&pattern).map(|regex| (regex, kind))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            prefix: prefix.to_owned(),
            routes,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the command of the first matching pattern, if any.
    pub fn route(&self, text: &str) -> Option<BotCommand> {
        let text = text.trim();
        self.routes.iter().find_map(|(regex, kind)| {
            regex.captures(text).map(|captures| {
                let argument = captures.get(1).map_or("", |m| m.as_str());
                BotCommand::new(*kind, argument)
            })
        })
    }

    /// Help text listing every command.
    pub fn help(&self) -> String {
        let mut lines = vec!["📖 Prince-X Commands".to_owned(), String::new()];
        for kind in CommandKind::ALL {
            lines.push(format!(
                "{}{}{} - {}",
                self.prefix,
                kind.keyword(),
                kind.usage(),
                kind.description()
            ));
        }
        lines.join("\n")
    }
}
