use std::thread;
use std::time::Duration;

use serde::Serialize;

const SIMULATED_LATENCY: Duration = Duration::from_millis(800);
const LOOKUP_LATENCY: Duration = Duration::from_millis(500);

/// Envelope every mock endpoint answers with, mirroring the site's API.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectCategory {
    App,
    Tool,
    Ai,
    Backend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planning,
    Development,
    Live,
    Maintenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Demo,
    Internal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectLink {
    pub label: String,
    pub url: String,
    pub kind: LinkKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct Feature {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub category: ProjectCategory,
    pub status: ProjectStatus,
    pub tags: Vec<String>,
    pub links: Vec<ProjectLink>,
    pub features: Vec<Feature>,
}

/// Static project list served after an artificial delay; there is no real
/// persistence layer behind it.
pub struct CatalogGateway {
    latency: Duration,
    lookup_latency: Duration,
}

impl CatalogGateway {
    pub fn new() -> Self {
        Self {
            latency: SIMULATED_LATENCY,
            lookup_latency: LOOKUP_LATENCY,
        }
    }

    pub fn instant() -> Self {
        Self {
            latency: Duration::ZERO,
            lookup_latency: Duration::ZERO,
        }
    }

    pub fn projects(&self) -> ApiResponse<Vec<Project>> {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        ApiResponse {
            success: true,
            data: mock_projects(),
            message: "projects fetched successfully".to_owned(),
        }
    }

    pub fn project_by_id(&self, id: &str) -> ApiResponse<Option<Project>> {
        if !self.lookup_latency.is_zero() {
            thread::sleep(self.lookup_latency);
        }
        let project = mock_projects().into_iter().find(|project| project.id == id);
        let message = if project.is_some() {
            "project found"
        } else {
            "project not found"
        };
        ApiResponse {
            success: true,
            data: project,
            message: message.to_owned(),
        }
    }
}

fn tags(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_owned()).collect()
}

fn feature(name: &str, description: &str) -> Feature {
    Feature {
        name: name.to_owned(),
        description: description.to_owned(),
    }
}

fn mock_projects() -> Vec<Project> {
    vec![
        Project {
            id: "mood-diary".to_owned(),
            title: "Mood Diary".to_owned(),
            subtitle: "a record of small daily moments".to_owned(),
            description: "Cross-platform journal with theme switching, photo \
                          collections, tagging and a check-in streak."
                .to_owned(),
            category: ProjectCategory::App,
            status: ProjectStatus::Development,
            tags: tags(&["cross-platform", "journaling"]),
            links: vec![ProjectLink {
                label: "details".to_owned(),
                url: "#".to_owned(),
                kind: LinkKind::Demo,
            }],
            features: vec![
                feature("theme switching", "palettes that follow the mood of the entry"),
                feature("photo collections", "memories grouped into albums automatically"),
                feature("check-in streaks", "points for keeping the habit going"),
            ],
        },
        Project {
            id: "frontend-toolbox".to_owned(),
            title: "Utility Toolbox".to_owned(),
            subtitle: "small tools that never upload your data".to_owned(),
            description: "A collection of local-only helpers: image \
                          watermarking, format conversion, JSON formatting."
                .to_owned(),
            category: ProjectCategory::Tool,
            status: ProjectStatus::Live,
            tags: tags(&["privacy-first", "canvas"]),
            links: vec![ProjectLink {
                label: "open".to_owned(),
                url: "#".to_owned(),
                kind: LinkKind::Internal,
            }],
            features: vec![
                feature("image watermarking", "processed locally to protect your work"),
                feature("gif support", "animated sources keep their motion"),
            ],
        },
        Project {
            id: "assistant-agent".to_owned(),
            title: "Resident Agent".to_owned(),
            subtitle: "an assistant that knows the site".to_owned(),
            description: "A language-model agent that can browse project \
                          data, help with admin chores and keep you company."
                .to_owned(),
            category: ProjectCategory::Ai,
            status: ProjectStatus::Planning,
            tags: tags(&["llm", "automation"]),
            links: Vec::new(),
            features: vec![
                feature("natural-language queries", "ask about project status in plain words"),
                feature("ops assistance", "server monitoring with a conversational front"),
            ],
        },
        Project {
            id: "admin-console".to_owned(),
            title: "Admin Console".to_owned(),
            subtitle: "the control room".to_owned(),
            description: "Unified backend administration: deployment status, \
                          API management and data permissions."
                .to_owned(),
            category: ProjectCategory::Backend,
            status: ProjectStatus::Maintenance,
            tags: tags(&["docker", "operations"]),
            links: Vec::new(),
            features: Vec::new(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_fixed_and_well_formed() {
        let gateway = CatalogGateway::instant();
        let response = gateway.projects();
        assert!(response.success);
        assert_eq!(response.data.len(), 4);

        let ids = response
            .data
            .iter()
            .map(|project| project.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            ids,
            ["mood-diary", "frontend-toolbox", "assistant-agent", "admin-console"]
        );
    }

    #[test]
    fn lookup_finds_known_ids_and_misses_politely() {
        let gateway = CatalogGateway::instant();

        let hit = gateway.project_by_id("frontend-toolbox");
        assert!(hit.success);
        assert_eq!(
            hit.data.expect("project should exist").category,
            ProjectCategory::Tool
        );

        let miss = gateway.project_by_id("nope");
        assert!(miss.success);
        assert!(miss.data.is_none());
        assert_eq!(miss.message, "project not found");
    }

    #[test]
    fn projects_serialize_to_stable_json() {
        let gateway = CatalogGateway::instant();
        let json = serde_json::to_value(gateway.projects()).expect("serialize");
        assert_eq!(json["data"][1]["id"], "frontend-toolbox");
        assert_eq!(json["data"][1]["status"], "live");
    }
}
