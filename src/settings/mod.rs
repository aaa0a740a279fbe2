//! Tray tracker settings handling
//!
//! ## Servers and projects
//!
//! - The CI servers to poll, with optional credentials
//! - The projects (jobs) watched on every server
//!
//! ## Notifications
//!
//! - A sound per build transition
//! - Whether unstable builds count as failed
//!
//! ## General
//!
//! - Refresh interval, main window icon, claim plugin integration
//!
//! ## Usage
//!
//! Load the settings with [`ConfigurationStore::initialize`], which finds
//! the per-user configuration directory, or with
//! [`ConfigurationStore::open`] for an explicit directory.  Every mutating
//! method rewrites the whole `hudson.properties` file and then notifies
//! subscribers.
//!
//! ```no_run
//! # use traytracker::settings::*;
//! # fn main() -> Result<(), traytracker::error::SettingsError> {
//! let mut store = ConfigurationStore::initialize()?;
//! store.subscribe(|| println!("configuration changed"));
//! let id = store.add_server(ServerDetails::new("https://ci.example.org", None, None, None, false))?;
//! store.add_project(Project::new(id, "nightly", "https://ci.example.org/job/nightly"))?;
//! # Ok(())
//! # }
//! ```

mod general;
mod notifications;
mod password;
pub mod properties;
mod servers;

pub use general::{GeneralSettings, DEFAULT_REFRESH_INTERVAL};
pub use notifications::{NotificationSettings, SoundStatus};
pub use properties::PropertiesFile;
pub use servers::{Credentials, Project, Server, ServerDetails, ServerId};

use crate::{
    error::SettingsError,
    events::{ChangeListeners, ConfigurationUpdated, SubscriptionId},
};
use async_std::channel::Receiver;
use directories::BaseDirs;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

/// Directory below the per-user configuration directory
pub const APP_DIRECTORY: &str = "Hudson Tray Tracker";
pub const PROPERTIES_FILE: &str = "hudson.properties";
/// Overrides the configuration directory when set
pub const CONFIG_DIR_ENV: &str = "TRAYTRACKER_CONFIG_DIR";

const SERVERS: &str = "servers";
const PROJECTS: &str = "projects";

/// Find the configuration directory and create it if required
pub fn scaffold() -> Result<PathBuf, SettingsError> {
    let dir = match env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => BaseDirs::new()
            .ok_or(SettingsError::NoConfigDir)?
            .config_dir()
            .join(APP_DIRECTORY),
    };
    fs::create_dir_all(&dir).map_err(|e| SettingsError::io(&dir, e))?;
    Ok(dir)
}

/// The user configuration, backed by a properties file
#[derive(Debug)]
pub struct ConfigurationStore {
    file: PropertiesFile,
    next_id: u64,
    servers: BTreeMap<ServerId, Server>,
    notifications: NotificationSettings,
    general: GeneralSettings,
    listeners: ChangeListeners,
}

/// Borrowed view of the whole configuration, used for printing it
#[derive(Debug, Serialize)]
pub struct ConfigurationSnapshot<'s> {
    pub path: &'s Path,
    pub servers: Vec<&'s Server>,
    pub notifications: &'s NotificationSettings,
    pub general: &'s GeneralSettings,
}

impl ConfigurationStore {
    /// Load the configuration from the per-user configuration directory
    pub fn initialize() -> Result<Self, SettingsError> {
        Self::open(scaffold()?)
    }

    /// Load the configuration stored in `dir`, creating the directory and
    /// an empty properties file if they don't exist yet
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| SettingsError::io(dir, e))?;
        Self::load(PropertiesFile::read(dir.join(PROPERTIES_FILE))?)
    }

    /// Build the store from an already read properties file
    pub fn load(file: PropertiesFile) -> Result<Self, SettingsError> {
        let mut this = Self {
            file,
            next_id: 0,
            servers: BTreeMap::new(),
            notifications: NotificationSettings::default(),
            general: GeneralSettings::default(),
            listeners: ChangeListeners::new(),
        };

        this.load_servers()?;
        this.notifications = load_notification_settings(&this.file)?;
        this.general = load_general_settings(&this.file)?;

        info!(
            path = %this.file.path().display(),
            servers = this.servers.len(),
            projects = this.project_count(),
            "Loaded configuration"
        );
        Ok(this)
    }

    fn load_servers(&mut self) -> Result<(), SettingsError> {
        let server_count = self.file.group_count(SERVERS)?;
        warn_stray_keys(&self.file, SERVERS, server_count);

        // positional index in the file -> server
        let mut by_index = Vec::new();
        for index in 0..server_count {
            let details = read_server(&self.file, index)?;
            let id = match self.find_server(&details) {
                Some(existing) => {
                    warn!(index, url = %details.url, "Merging duplicate server entry");
                    existing
                }
                None => self.insert_server(details),
            };
            by_index.push(id);
        }

        let project_count = self.file.group_count(PROJECTS)?;
        warn_stray_keys(&self.file, PROJECTS, project_count);

        for index in 0..project_count {
            let server_index: usize = self.file.group_required_int(PROJECTS, index, "server")?;
            let owner = *by_index
                .get(server_index)
                .ok_or(SettingsError::DanglingServerIndex {
                    project: index,
                    server: server_index,
                })?;
            let name = self.file.group_required_string(PROJECTS, index, "name")?;
            let url = self.file.group_required_string(PROJECTS, index, "url")?;

            if let Some(server) = self.servers.get_mut(&owner) {
                server.insert_project(Project::new(owner, name, url));
            }
        }

        Ok(())
    }

    fn insert_server(&mut self, details: ServerDetails) -> ServerId {
        let id = ServerId(self.next_id);
        self.next_id += 1;
        self.servers.insert(id, Server::new(id, details));
        id
    }

    fn server_mut(&mut self, id: ServerId) -> Result<&mut Server, SettingsError> {
        self.servers
            .get_mut(&id)
            .ok_or(SettingsError::UnknownServer(id))
    }

    /// Rewrite the properties file and notify subscribers
    ///
    /// If writing fails the in-memory configuration is kept as it is and
    /// nobody is notified.
    pub fn save(&mut self) -> Result<(), SettingsError> {
        let file = &mut self.file;
        file.clear();

        for (index, server) in self.servers.values().enumerate() {
            write_server(file, index, &server.details);
        }
        if !self.servers.is_empty() {
            file.set_group_count(SERVERS, self.servers.len());
        }

        let mut project_index = 0;
        for (server_index, server) in self.servers.values().enumerate() {
            for project in &server.projects {
                file.set_group_int(PROJECTS, project_index, "server", server_index);
                file.set_group_string(PROJECTS, project_index, "name", &project.name);
                file.set_group_string(PROJECTS, project_index, "url", &project.url);
                project_index += 1;
            }
        }
        if project_index > 0 {
            file.set_group_count(PROJECTS, project_index);
        }

        save_notification_settings(file, &self.notifications);
        save_general_settings(file, &self.general);

        file.write()?;
        debug!(
            path = %file.path().display(),
            servers = self.servers.len(),
            projects = project_index,
            "Saved configuration"
        );

        self.listeners.notify();
        Ok(())
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn servers(&self) -> impl Iterator<Item = &Server> {
        self.servers.values()
    }

    pub fn server(&self, id: ServerId) -> Option<&Server> {
        self.servers.get(&id)
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    /// Find the server with exactly these details
    pub fn find_server(&self, details: &ServerDetails) -> Option<ServerId> {
        self.servers
            .values()
            .find(|s| s.details == *details)
            .map(|s| s.id)
    }

    /// Add a server and persist
    ///
    /// Adding a server equal to a known one returns the known id.
    pub fn add_server(&mut self, details: ServerDetails) -> Result<ServerId, SettingsError> {
        let details = details.normalized();
        let id = match self.find_server(&details) {
            Some(existing) => {
                debug!(%existing, url = %details.url, "Server already known");
                existing
            }
            None => self.insert_server(details),
        };
        self.save()?;
        Ok(id)
    }

    /// Replace the details of a server and persist
    ///
    /// The server keeps its id and its projects.
    pub fn update_server(
        &mut self,
        id: ServerId,
        details: ServerDetails,
    ) -> Result<(), SettingsError> {
        let details = details.normalized();
        match self.find_server(&details) {
            Some(other) if other != id => return Err(SettingsError::DuplicateServer(other)),
            _ => {}
        }
        self.server_mut(id)?.details = details;
        self.save()
    }

    /// Remove a server together with its projects and persist
    pub fn remove_server(&mut self, id: ServerId) -> Result<Server, SettingsError> {
        let removed = self
            .servers
            .remove(&id)
            .ok_or(SettingsError::UnknownServer(id))?;
        self.save()?;
        Ok(removed)
    }

    pub fn add_project(&mut self, project: Project) -> Result<(), SettingsError> {
        self.add_projects(std::iter::once(project))
    }

    /// Add several projects with a single save
    ///
    /// Nothing is changed if any project belongs to an unknown server.
    pub fn add_projects<I>(&mut self, projects: I) -> Result<(), SettingsError>
    where
        I: IntoIterator<Item = Project>,
    {
        let projects: Vec<Project> = projects.into_iter().collect();
        self.check_owners(&projects)?;

        for project in projects {
            self.server_mut(project.server)?.insert_project(project);
        }
        self.save()
    }

    pub fn remove_project(&mut self, project: &Project) -> Result<(), SettingsError> {
        self.remove_projects(std::iter::once(project))
    }

    /// Remove several projects with a single save
    pub fn remove_projects<'p, I>(&mut self, projects: I) -> Result<(), SettingsError>
    where
        I: IntoIterator<Item = &'p Project>,
    {
        let projects: Vec<&Project> = projects.into_iter().collect();
        self.check_owners(projects.iter().copied())?;

        for project in projects {
            self.server_mut(project.server)?.remove_project(project);
        }
        self.save()
    }

    fn check_owners<'p>(
        &self,
        projects: impl IntoIterator<Item = &'p Project>,
    ) -> Result<(), SettingsError> {
        projects
            .into_iter()
            .find(|p| !self.servers.contains_key(&p.server))
            .map_or(Ok(()), |p| Err(SettingsError::UnknownServer(p.server)))
    }

    /// Copy of all projects grouped by server
    pub fn projects_by_server(&self) -> BTreeMap<ServerId, Vec<Project>> {
        self.servers
            .values()
            .map(|s| (s.id, s.projects.clone()))
            .collect()
    }

    pub fn project_count(&self) -> usize {
        self.servers.values().map(|s| s.projects.len()).sum()
    }

    pub fn notification_settings(&self) -> &NotificationSettings {
        &self.notifications
    }

    pub fn sound_path(&self, status: SoundStatus) -> Option<&str> {
        self.notifications.sound_path(status)
    }

    /// Set or clear (`None`) the sound played for `status` and persist
    pub fn set_sound_path(
        &mut self,
        status: SoundStatus,
        path: Option<&str>,
    ) -> Result<(), SettingsError> {
        self.notifications
            .set_sound_path(status, path.map(str::to_owned));
        self.save()
    }

    pub fn treat_unstable_as_failed(&self) -> bool {
        self.notifications.treat_unstable_as_failed
    }

    pub fn set_treat_unstable_as_failed(&mut self, value: bool) -> Result<(), SettingsError> {
        self.notifications.treat_unstable_as_failed = value;
        self.save()
    }

    pub fn general_settings(&self) -> &GeneralSettings {
        &self.general
    }

    pub fn set_refresh_interval_in_seconds(&mut self, value: u32) -> Result<(), SettingsError> {
        self.general.refresh_interval_in_seconds = value;
        self.save()
    }

    pub fn set_update_main_window_icon(&mut self, value: bool) -> Result<(), SettingsError> {
        self.general.update_main_window_icon = value;
        self.save()
    }

    pub fn set_integrate_with_claim_plugin(&mut self, value: bool) -> Result<(), SettingsError> {
        self.general.integrate_with_claim_plugin = value;
        self.save()
    }

    /// Run `callback` after every successful save
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut() + Send + 'static,
    {
        self.listeners.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Receive a message after every successful save
    pub fn watch(&mut self) -> Receiver<ConfigurationUpdated> {
        self.listeners.watch()
    }

    pub fn snapshot(&self) -> ConfigurationSnapshot<'_> {
        ConfigurationSnapshot {
            path: self.file.path(),
            servers: self.servers.values().collect(),
            notifications: &self.notifications,
            general: &self.general,
        }
    }
}

fn warn_stray_keys(file: &PropertiesFile, group: &str, count: usize) {
    for key in file.stray_group_keys(group, count) {
        warn!(key, count, "Ignoring {} entry beyond the recorded count", group);
    }
}

fn read_server(file: &PropertiesFile, index: usize) -> Result<ServerDetails, SettingsError> {
    let url = file.group_required_string(SERVERS, index, "url")?;
    let display_name = file.group_string(SERVERS, index, "displayName");
    let ignore_untrusted_certificate =
        file.group_bool_or(SERVERS, index, "ignoreUntrustedCertificate", false)?;

    let credentials = match file.group_string(SERVERS, index, "username") {
        Some(username) => {
            // an empty password is stored as an empty value, so only absence is an error
            let key = properties::group_key(SERVERS, index, "passwordBase64");
            let encoded = file
                .get(&key)
                .ok_or_else(|| SettingsError::MissingKey(key.clone()))?;
            Some(Credentials::new(username, password::decode(&key, encoded)?))
        }
        None => None,
    };

    Ok(ServerDetails {
        url,
        display_name,
        ignore_untrusted_certificate,
        credentials,
    })
}

fn write_server(file: &mut PropertiesFile, index: usize, details: &ServerDetails) {
    file.set_group_string(SERVERS, index, "url", &details.url);
    file.set_group_opt(SERVERS, index, "displayName", details.display_name.as_deref());
    file.set_group_bool(
        SERVERS,
        index,
        "ignoreUntrustedCertificate",
        details.ignore_untrusted_certificate,
    );
    if let Some(credentials) = &details.credentials {
        file.set_group_string(SERVERS, index, "username", &credentials.username);
        file.set_group_string(
            SERVERS,
            index,
            "passwordBase64",
            &password::encode(&credentials.password),
        );
    }
}

fn load_notification_settings(
    file: &PropertiesFile,
) -> Result<NotificationSettings, SettingsError> {
    let mut settings = NotificationSettings::default();
    for status in SoundStatus::ALL.iter().copied() {
        settings.set_sound_path(status, file.string(&status.key()));
    }
    settings.treat_unstable_as_failed = file.bool_or("sounds.TreatUnstableAsFailed", true)?;
    Ok(settings)
}

fn save_notification_settings(file: &mut PropertiesFile, settings: &NotificationSettings) {
    for status in SoundStatus::ALL.iter().copied() {
        file.set_opt(status.key(), settings.sound_path(status));
    }
    file.set_bool(
        "sounds.TreatUnstableAsFailed",
        settings.treat_unstable_as_failed,
    );
}

fn load_general_settings(file: &PropertiesFile) -> Result<GeneralSettings, SettingsError> {
    Ok(GeneralSettings {
        refresh_interval_in_seconds: file
            .int_or("general.RefreshTimeInSeconds", DEFAULT_REFRESH_INTERVAL)?,
        update_main_window_icon: file.bool_or("general.UpdateMainWindowIcon", true)?,
        integrate_with_claim_plugin: file.bool_or("general.IntegrateWithClaimPlugin", true)?,
    })
}

fn save_general_settings(file: &mut PropertiesFile, settings: &GeneralSettings) {
    file.set_int(
        "general.RefreshTimeInSeconds",
        settings.refresh_interval_in_seconds,
    );
    file.set_bool(
        "general.UpdateMainWindowIcon",
        settings.update_main_window_icon,
    );
    file.set_bool(
        "general.IntegrateWithClaimPlugin",
        settings.integrate_with_claim_plugin,
    );
}
