//! Session-dependent client state
//!
//! Everything held here belongs to the signed-in user and is discarded in one
//! step when the session is purged or the user signs out.

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::identity::UserIdentity;
use crate::project::Project;
use crate::task::{Board, Dashboard, Task, TaskFilter, DEFAULT_CATEGORIES};

/// In-memory cache for the signed-in user
#[derive(Debug, Clone, Default)]
pub struct ClientWorkspace {
    identity: Option<UserIdentity>,
    projects: Vec<Project>,
    current_project: Option<Uuid>,
    tasks: Vec<Task>,
    dashboard: Option<Dashboard>,
    categories: Vec<String>,
}

impl ClientWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Workspace for a freshly signed-in user
    pub fn for_identity(identity: UserIdentity) -> Self {
        let mut workspace = Self::new();
        workspace.sign_in(identity);
        workspace
    }

    pub fn sign_in(&mut self, identity: UserIdentity) {
        self.identity = Some(identity);
    }

    pub fn identity(&self) -> Option<&UserIdentity> {
        self.identity.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.identity.is_some()
    }

    /// Replace the cached projects; a selection that no longer exists is dropped
    pub fn set_projects(&mut self, projects: Vec<Project>) {
        self.projects = projects;
        if let Some(id) = self.current_project {
            if !self.projects.iter().any(|p| p.id == id) {
                self.current_project = None;
            }
        }
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn select_project(&mut self, id: Uuid) -> Result<&Project> {
        let project = self
            .projects
            .iter()
            .find(|p| p.id == id)
            .ok_or(Error::UnknownProject(id))?;
        self.current_project = Some(id);
        Ok(project)
    }

    pub fn current_project(&self) -> Option<&Project> {
        let id = self.current_project?;
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn set_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Replace a cached task by id, or put a new one first (newest first)
    pub fn upsert_task(&mut self, task: Task) {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => self.tasks.insert(0, task),
        }
    }

    /// Drop a cached task; returns whether it was present
    pub fn remove_task(&mut self, id: Uuid) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.tasks.len() != before
    }

    /// Cached tasks matching `filter`, in cache order
    pub fn filter_tasks(&self, filter: &TaskFilter) -> Vec<&Task> {
        self.tasks.iter().filter(|t| filter.matches(t)).collect()
    }

    /// Cached tasks grouped by status
    pub fn board(&self) -> Board {
        Board::from_tasks(&self.tasks)
    }

    pub fn set_dashboard(&mut self, dashboard: Dashboard) {
        self.dashboard = Some(dashboard);
    }

    pub fn dashboard(&self) -> Option<&Dashboard> {
        self.dashboard.as_ref()
    }

    /// Defaults first, then any fetched categories not already present
    pub fn merge_categories<I, S>(&mut self, fetched: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut merged: Vec<String> = DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect();
        for category in fetched {
            let category = category.into();
            if !merged.contains(&category) {
                merged.push(category);
            }
        }
        self.categories = merged;
    }

    /// Known categories (defaults until the backend has been asked)
    pub fn categories(&self) -> Vec<&str> {
        if self.categories.is_empty() {
            DEFAULT_CATEGORIES.to_vec()
        } else {
            self.categories.iter().map(String::as_str).collect()
        }
    }

    /// Drop everything, including the identity
    pub fn clear(&mut self) {
        self.identity = None;
        self.projects.clear();
        self.current_project = None;
        self.tasks.clear();
        self.dashboard = None;
        self.categories.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.identity.is_none()
            && self.projects.is_empty()
            && self.current_project.is_none()
            && self.tasks.is_empty()
            && self.dashboard.is_none()
            && self.categories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SessionToken;
    use crate::task::TaskStatus;

    fn identity() -> UserIdentity {
        UserIdentity {
            user_id: "u-7".to_string(),
            email: "grace@example.com".to_string(),
            name: "Grace".to_string(),
            token: SessionToken::new("tok"),
        }
    }

    fn project(name: &str) -> Project {
        Project {
            id: Uuid::new_v4(),
            name: name.to_string(),
            trade: None,
        }
    }

    #[test]
    fn test_select_project() {
        let mut ws = ClientWorkspace::for_identity(identity());
        let a = project("Warehouse");
        let b = project("Clinic");
        let b_id = b.id;
        ws.set_projects(vec![a, b]);

        assert_eq!(ws.select_project(b_id).unwrap().name, "Clinic");
        assert_eq!(ws.current_project().map(|p| p.id), Some(b_id));

        let missing = Uuid::new_v4();
        assert!(matches!(ws.select_project(missing), Err(Error::UnknownProject(id)) if id == missing));
        assert_eq!(ws.current_project().map(|p| p.id), Some(b_id));
    }

    #[test]
    fn test_replacing_projects_drops_stale_selection() {
        let mut ws = ClientWorkspace::new();
        let a = project("A");
        let a_id = a.id;
        ws.set_projects(vec![a]);
        ws.select_project(a_id).unwrap();

        ws.set_projects(vec![project("B")]);
        assert!(ws.current_project().is_none());
    }

    #[test]
    fn test_merge_categories_keeps_defaults_first() {
        let mut ws = ClientWorkspace::new();
        assert_eq!(ws.categories().len(), DEFAULT_CATEGORIES.len());

        ws.merge_categories(vec!["Work", "Framing", "Framing"]);
        let categories = ws.categories();
        assert_eq!(&categories[..6], &DEFAULT_CATEGORIES[..]);
        assert_eq!(&categories[6..], &["Framing"]);
    }

    fn task(title: &str) -> Task {
        let stamp = chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        Task {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            status: TaskStatus::Todo,
            priority: Default::default(),
            category: "Work".to_string(),
            trade: None,
            due_date: None,
            measurements: None,
            materials: None,
            created_at: stamp,
            updated_at: stamp,
        }
    }

    #[test]
    fn test_upsert_and_remove_tasks() {
        let mut ws = ClientWorkspace::for_identity(identity());
        let old = task("Old");
        let old_id = old.id;
        ws.set_tasks(vec![old]);

        let new = task("New");
        ws.upsert_task(new.clone());
        assert_eq!(ws.tasks()[0].title, "New");

        let mut done = new;
        done.status = TaskStatus::Completed;
        ws.upsert_task(done);
        assert_eq!(ws.tasks().len(), 2);
        assert_eq!(ws.board().column(TaskStatus::Completed).len(), 1);

        assert!(ws.remove_task(old_id));
        assert!(!ws.remove_task(old_id));
        assert_eq!(ws.tasks().len(), 1);
    }

    #[test]
    fn test_clear_empties_everything() {
        let mut ws = ClientWorkspace::for_identity(identity());
        let p = project("Site");
        let id = p.id;
        ws.set_projects(vec![p]);
        ws.select_project(id).unwrap();
        ws.set_dashboard(Dashboard::default());
        ws.merge_categories(Vec::<String>::new());
        assert!(!ws.is_empty());

        ws.clear();
        assert!(ws.is_empty());
        assert!(!ws.is_signed_in());
    }
}
