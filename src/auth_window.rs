//! Secondary browsing context used for the third-party authorization hand-off.

use crate::error::{AssistantError, AssistantResult};
use std::process::{Child, Command, Stdio};
use tracing::{debug, warn};

pub const AUTH_WINDOW_NAME: &str = "OAuthWindow";

pub const AUTH_WINDOW_GEOMETRY: WindowGeometry = WindowGeometry {
    width: 600,
    height: 700,
    left: 200,
    top: 100,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowGeometry {
    pub width: u32,
    pub height: u32,
    pub left: i32,
    pub top: i32,
}

impl WindowGeometry {
    /// `window.open` feature string form.
    pub fn features(&self) -> String {
        format!(
            "width={},height={},left={},top={}",
            self.width, self.height, self.left, self.top
        )
    }
}

/// What a poll can tell about the secondary browsing context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowStatus {
    Open,
    Closed,
    /// The window lives on, but in a process we cannot watch. Only the
    /// `auth_callback` signal can finish the flow.
    Detached,
}

pub trait AuthWindow: Send {
    fn status(&mut self) -> WindowStatus;
}

pub trait WindowLauncher: Send {
    /// Returns `None` when the window could not be opened (blocked).
    fn open(&mut self, url: &str, name: &str, geometry: WindowGeometry)
    -> Option<Box<dyn AuthWindow>>;
}

/// Opens the authorization page in a browser process. The window counts as
/// closed once that process exits, except that a clean exit seen on the first
/// poll means the URL was handed to an already running browser.
#[derive(Clone, Debug)]
pub struct BrowserLauncher {
    program: String,
    args: Vec<String>,
}

impl BrowserLauncher {
    pub fn new(command_line: &str) -> AssistantResult<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or_else(|| AssistantError::Config {
            key: "ASSISTANT_AUTH_BROWSER",
            reason: "command is empty".to_string(),
        })?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    fn spawn(&self, url: &str) -> AssistantResult<Child> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(child)
    }
}

impl WindowLauncher for BrowserLauncher {
    fn open(
        &mut self,
        url: &str,
        name: &str,
        geometry: WindowGeometry,
    ) -> Option<Box<dyn AuthWindow>> {
        debug!(
            "opening {} ({}) with {}",
            name,
            geometry.features(),
            self.program
        );
        match self.spawn(url) {
            Ok(child) => Some(Box::new(BrowserWindow::new(child))),
            Err(err) => {
                warn!("{}", err);
                None
            }
        }
    }
}

struct BrowserWindow {
    child: Option<Child>,
    polled: bool,
}

impl BrowserWindow {
    fn new(child: Child) -> Self {
        Self {
            child: Some(child),
            polled: false,
        }
    }
}

impl AuthWindow for BrowserWindow {
    fn status(&mut self) -> WindowStatus {
        let first_poll = !std::mem::replace(&mut self.polled, true);
        let Some(child) = self.child.as_mut() else {
            return WindowStatus::Closed;
        };
        match child.try_wait() {
            Ok(None) => WindowStatus::Open,
            Ok(Some(exit)) if first_poll && exit.success() => {
                debug!("browser process {} handed the window off", child.id());
                WindowStatus::Detached
            }
            Ok(Some(_)) => WindowStatus::Closed,
            Err(err) => {
                warn!("cannot poll browser process {}: {}", child.id(), err);
                WindowStatus::Closed
            }
        }
    }
}

impl Drop for BrowserWindow {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        // Still running: reap it off-thread once the user closes it.
        if let Ok(None) = child.try_wait() {
            std::thread::spawn(move || child.wait());
        }
    }
}
