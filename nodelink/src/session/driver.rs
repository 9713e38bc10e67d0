//! Prompt-driven command execution over a [`Shell`].

use std::time::{Duration, Instant};

use log::{debug, warn};
use regex::bytes::Regex;
use secrecy::{ExposeSecret, SecretString};

use super::privilege::PrivilegeGraph;
use super::response::Response;
use crate::channel::{Shell, split_last_line};
use crate::error::{Error, Result};
use crate::platform::{PlatformDefinition, normalize_output};

/// A logged-in shell plus the platform knowledge to drive it.
pub struct CliSession {
    shell: Box<dyn Shell>,
    platform: PlatformDefinition,
    privileges: PrivilegeGraph,
    prompt: Regex,
    current: Option<String>,
    timeout: Duration,
    secret: Option<SecretString>,
}

impl CliSession {
    pub fn new(
        shell: Box<dyn Shell>,
        platform: PlatformDefinition,
        timeout: Duration,
        secret: Option<SecretString>,
    ) -> Result<Self> {
        let prompt = platform.any_prompt().map_err(|e| {
            Error::Config(format!("platform '{}' has an invalid prompt: {e}", platform.name))
        })?;
        let privileges = PrivilegeGraph::new(platform.privilege_levels.clone());
        Ok(Self {
            shell,
            platform,
            privileges,
            prompt,
            current: None,
            timeout,
            secret,
        })
    }

    pub fn platform(&self) -> &PlatformDefinition {
        &self.platform
    }

    pub fn current_level(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Wait for the login prompt, then prepare the terminal.
    pub async fn open(&mut self) -> Result<()> {
        let banner = self.shell.read_until(&self.prompt, self.timeout).await?;
        self.track_prompt(&banner);
        debug!("cli: logged in at level {:?}", self.current);

        for command in self.platform.on_open_commands.clone() {
            let response = self.send_command(&command).await?;
            if let Some(failure) = &response.failure {
                warn!("cli: '{command}' failed during login ({failure})");
            }
        }
        Ok(())
    }

    /// Send one command and collect its output up to the next prompt.
    pub async fn send_command(&mut self, command: &str) -> Result<Response> {
        let started = Instant::now();
        debug!("cli: > {command}");
        self.shell.send(command).await?;
        let text = self.shell.read_until(&self.prompt, self.timeout).await?;

        let prompt = self.track_prompt(&text);
        let (body, _) = split_last_line(&text);
        let output = normalize_output(body, command);
        let failure = self.platform.failure_in(&output).map(str::to_string);
        Ok(Response {
            command: command.to_string(),
            output,
            prompt,
            elapsed: started.elapsed(),
            failure,
        })
    }

    /// Walk the privilege graph to `target`.
    pub async fn acquire_privilege(&mut self, target: &str) -> Result<()> {
        let current = self
            .current
            .clone()
            .ok_or_else(|| Error::Client("current privilege level is unknown".into()))?;
        if current == target {
            return Ok(());
        }

        let path = self.privileges.find_path(&current, target)?;
        for hop in path.windows(2) {
            let (from, to) = (&hop[0], &hop[1]);
            let transition = self.privileges.transition(from, to).ok_or_else(|| {
                Error::Client(format!("no command moves from '{from}' to '{to}'"))
            })?;

            debug!("cli: {from} -> {to} via '{}'", transition.command);
            self.shell.send(&transition.command).await?;
            let text = match &transition.auth_prompt {
                Some(auth) => self.answer_auth(auth).await?,
                None => self.shell.read_until(&self.prompt, self.timeout).await?,
            };
            self.track_prompt(&text);

            if self.current.as_deref() != Some(to.as_str()) {
                return Err(Error::Client(format!(
                    "'{}' left the session at {:?} instead of '{to}'",
                    transition.command, self.current
                )));
            }
        }
        Ok(())
    }

    /// Read past an optional secret prompt during escalation.
    async fn answer_auth(&mut self, auth: &Regex) -> Result<String> {
        let either = Regex::new(&format!("(?:{})|(?:{})", auth.as_str(), self.prompt.as_str()))
            .map_err(|e| Error::Config(e.to_string()))?;
        let text = self.shell.read_until(&either, self.timeout).await?;
        let (_, last) = split_last_line(&text);
        if !auth.is_match(last.as_bytes()) {
            return Ok(text);
        }

        let secret = self.secret.as_ref().ok_or_else(|| {
            Error::AuthenticationFailed("device asked for an enable secret and none is configured".into())
        })?;
        self.shell.send(secret.expose_secret()).await?;
        Ok(self.shell.read_until(&self.prompt, self.timeout).await?)
    }

    /// Record the level named by the final line of `text` and return that line.
    fn track_prompt(&mut self, text: &str) -> String {
        let (_, last) = split_last_line(text);
        let prompt = last.trim().to_string();
        match self.privileges.identify(&prompt) {
            Some(level) => self.current = Some(level.to_string()),
            None => warn!("cli: prompt {prompt:?} matches no privilege level"),
        }
        prompt
    }

    pub async fn close(&mut self) -> Result<()> {
        self.shell.close().await?;
        Ok(())
    }
}
