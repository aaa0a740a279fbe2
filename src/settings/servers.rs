use serde::Serialize;
use std::fmt;

/// Stable handle of a server inside a [`ConfigurationStore`](super::ConfigurationStore)
///
/// Ids are handed out in increasing order and never reused, so sorting by
/// id gives the order in which servers were loaded or added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ServerId(pub(super) u64);

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Username and password used to talk to a CI server
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Credentials {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<hidden>")
            .finish()
    }
}

/// Everything that identifies a server
///
/// Two servers with equal details are the same server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ServerDetails {
    pub url: String,
    pub display_name: Option<String>,
    pub ignore_untrusted_certificate: bool,
    pub credentials: Option<Credentials>,
}

impl ServerDetails {
    /// Build server details the way the settings dialog hands them over
    ///
    /// Credentials are only kept when `username` is not empty.
    pub fn new(
        url: impl Into<String>,
        display_name: Option<&str>,
        username: Option<&str>,
        password: Option<&str>,
        ignore_untrusted_certificate: bool,
    ) -> Self {
        Self {
            url: url.into(),
            display_name: display_name.map(str::to_owned),
            ignore_untrusted_certificate,
            credentials: username.map(|u| Credentials::new(u, password.unwrap_or_default())),
        }
        .normalized()
    }

    /// Drop an empty display name and credentials without a username
    pub(super) fn normalized(self) -> Self {
        Self {
            display_name: self.display_name.filter(|n| !n.is_empty()),
            credentials: self.credentials.filter(|c| !c.username.is_empty()),
            ..self
        }
    }
}

/// A CI server and the projects watched on it
#[derive(Debug, Clone, Serialize)]
pub struct Server {
    pub id: ServerId,
    #[serde(flatten)]
    pub details: ServerDetails,
    pub projects: Vec<Project>,
}

impl Server {
    pub(super) fn new(id: ServerId, details: ServerDetails) -> Self {
        Self {
            id,
            details,
            projects: Vec::new(),
        }
    }

    /// The name shown to the user: the display name, or the url without one
    pub fn name(&self) -> &str {
        self.details
            .display_name
            .as_deref()
            .unwrap_or(&self.details.url)
    }

    pub fn url(&self) -> &str {
        &self.details.url
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.details.credentials.as_ref()
    }

    /// Add a project unless an equal one is already watched, returns if it was added
    pub(super) fn insert_project(&mut self, project: Project) -> bool {
        if self.projects.contains(&project) {
            return false;
        }
        self.projects.push(project);
        true
    }

    /// Returns if the project was present
    pub(super) fn remove_project(&mut self, project: &Project) -> bool {
        let before = self.projects.len();
        self.projects.retain(|p| p != project);
        before != self.projects.len()
    }
}

/// A job watched on a CI server
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Project {
    #[serde(skip)]
    pub server: ServerId,
    pub name: String,
    pub url: String,
}

impl Project {
    pub fn new(server: ServerId, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            server,
            name: name.into(),
            url: url.into(),
        }
    }
}
