use std::env as stdenv;
use std::path::{Path, PathBuf};

const SHELL_NAME: &str = "pipesh";
const SUPERUSER: &str = "root";

/// Session-wide configuration record: who the user is, where the shell is and
/// how the prompt looks.
///
/// Only `cd` writes to it (through [`Config::set_working_dir`]); everything
/// else reads it between commands.
#[derive(Debug, Clone)]
pub struct Config {
    /// Name used as the prefix of every reported error.
    pub shell_name: String,
    /// Prompt character printed after the display path.
    pub prompt: String,
    home_dir: PathBuf,
    user: String,
    working_dir: PathBuf,
    display_path: String,
}

impl Config {
    /// Build a configuration from explicit values.
    pub fn new(
        home_dir: impl Into<PathBuf>,
        user: impl Into<String>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        let user = user.into();
        let prompt = if user == SUPERUSER { "#" } else { "$" };
        let mut config = Self {
            shell_name: SHELL_NAME.to_string(),
            prompt: prompt.to_string(),
            home_dir: home_dir.into(),
            user,
            working_dir: PathBuf::new(),
            display_path: String::new(),
        };
        config.set_working_dir(working_dir.into());
        config
    }

    /// Capture the configuration of the running process.
    pub fn from_process() -> Self {
        let home_dir = dirs::home_dir()
            .or_else(|| stdenv::var_os("HOME").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("/"));
        let user = stdenv::var("USER")
            .or_else(|_| stdenv::var("LOGNAME"))
            .unwrap_or_default();
        let working_dir = stdenv::current_dir().unwrap_or_else(|_| home_dir.clone());
        Self::new(home_dir, user, working_dir)
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Working directory with the home prefix collapsed to `~`.
    pub fn display_path(&self) -> &str {
        &self.display_path
    }

    /// Primary prompt, e.g. `~/src$ `.
    pub fn primary_prompt(&self) -> String {
        format!("{}{} ", self.display_path, self.prompt)
    }

    /// Move to `dir` and recompute the display path.
    pub fn set_working_dir(&mut self, dir: PathBuf) {
        self.display_path = self.tildify(&dir);
        self.working_dir = dir;
    }

    fn tildify(&self, dir: &Path) -> String {
        if self.user != SUPERUSER {
            if let Ok(rest) = dir.strip_prefix(&self.home_dir) {
                if rest.as_os_str().is_empty() {
                    return "~".to_string();
                }
                return format!("~/{}", rest.display());
            }
        }
        dir.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_path_collapses_home() {
        let config = Config::new("/home/ann", "ann", "/home/ann/src/pipesh");
        assert_eq!(config.display_path(), "~/src/pipesh");
        assert_eq!(config.primary_prompt(), "~/src/pipesh$ ");
    }

    #[test]
    fn test_display_path_of_home_itself() {
        let mut config = Config::new("/home/ann", "ann", "/tmp");
        assert_eq!(config.display_path(), "/tmp");
        config.set_working_dir(PathBuf::from("/home/ann"));
        assert_eq!(config.display_path(), "~");
    }

    #[test]
    fn test_superuser_keeps_full_path() {
        let config = Config::new("/root", "root", "/root/work");
        assert_eq!(config.display_path(), "/root/work");
        assert_eq!(config.prompt, "#");
    }

    #[test]
    fn test_prefix_must_be_whole_component() {
        let config = Config::new("/home/ann", "ann", "/home/annex");
        assert_eq!(config.display_path(), "/home/annex");
    }
}
