//! A minimal, file-backed skill catalog: `<skillsRoot>/<name>/SKILL.md`,
//! a YAML frontmatter block (`name`, `description`) followed by the prompt
//! body. Skill *content* and discovery beyond this are out of scope — only
//! enough to back `/api/skill/list|load|unload` and pinned-skill injection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SkillFrontmatter {
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillSummary {
    pub name: String,
    pub description: String,
}

pub struct SkillCatalog {
    skills: HashMap<String, (SkillSummary, String)>,
}

fn parse_frontmatter(content: &str) -> Option<(SkillFrontmatter, String)> {
    let trimmed = content.trim_start();
    if !trimmed.starts_with("---") {
        return None;
    }
    let after_open = &trimmed[3..];
    let close_idx = after_open.find("\n---")?;
    let yaml_str = &after_open[..close_idx];
    let body_start = close_idx + 4;
    let body = after_open[body_start..].trim_start_matches('\n').to_string();
    let frontmatter: SkillFrontmatter = serde_yaml::from_str(yaml_str).ok()?;
    Some((frontmatter, body))
}

impl SkillCatalog {
    pub fn empty() -> Self {
        Self {
            skills: HashMap::new(),
        }
    }

    /// Scan `skills_root/*/SKILL.md`, skipping directories with no or
    /// invalid frontmatter rather than failing the whole load.
    pub fn load(skills_root: &Path) -> Self {
        let mut skills = HashMap::new();
        let Ok(entries) = std::fs::read_dir(skills_root) else {
            return Self { skills };
        };
        for entry in entries.flatten() {
            let path: PathBuf = entry.path();
            if !path.is_dir() {
                continue;
            }
            let md_path = path.join("SKILL.md");
            let Ok(content) = std::fs::read_to_string(&md_path) else {
                continue;
            };
            match parse_frontmatter(&content) {
                Some((fm, body)) => {
                    let summary = SkillSummary {
                        name: fm.name.clone(),
                        description: fm.description,
                    };
                    skills.insert(fm.name, (summary, body));
                }
                None => {
                    tracing::warn!(path = %md_path.display(), "skipping SKILL.md with no valid frontmatter");
                }
            }
        }
        Self { skills }
    }

    pub fn list(&self) -> Vec<SkillSummary> {
        let mut out: Vec<SkillSummary> = self.skills.values().map(|(s, _)| s.clone()).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn prompt(&self, name: &str) -> Option<&str> {
        self.skills.get(name).map(|(_, body)| body.as_str())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.skills.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_skill_from_frontmatter() {
        let dir = tempfile::tempdir().unwrap();
        let skill_dir = dir.path().join("writing");
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(
            skill_dir.join("SKILL.md"),
            "---\nname: writing\ndescription: Helps with writing\n---\nBe concise.\n",
        )
        .unwrap();

        let catalog = SkillCatalog::load(dir.path());
        let list = catalog.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "writing");
        assert_eq!(catalog.prompt("writing"), Some("Be concise.\n"));
    }

    #[test]
    fn missing_skills_root_yields_empty_catalog() {
        let catalog = SkillCatalog::load(Path::new("/nonexistent/skills"));
        assert!(catalog.list().is_empty());
    }

    #[test]
    fn directory_without_frontmatter_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let skill_dir = dir.path().join("broken");
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(skill_dir.join("SKILL.md"), "no frontmatter here").unwrap();
        let catalog = SkillCatalog::load(dir.path());
        assert!(catalog.list().is_empty());
    }
}
