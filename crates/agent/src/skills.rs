//! Skill catalog discovery from a directory of `<id>/SKILL.md` files.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use telos_core::Skill;

pub const SKILL_FILE: &str = "SKILL.md";
pub const NO_DESCRIPTION: &str = "(no description)";

#[derive(Debug, thiserror::Error)]
pub enum SkillCatalogError {
    #[error("I/O error reading {0}: {1}")]
    IoError(PathBuf, std::io::Error),
}

/// Load every `dir/*/SKILL.md`, sorted by id. The id is the directory name.
///
/// A missing directory is an empty catalog.
pub fn discover_skills(dir: &Path) -> Result<Vec<Skill>, SkillCatalogError> {
    if !dir.exists() {
        debug!(dir = %dir.display(), "skills directory missing");
        return Ok(Vec::new());
    }

    let entries =
        std::fs::read_dir(dir).map_err(|e| SkillCatalogError::IoError(dir.to_path_buf(), e))?;

    let mut skills = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path().join(SKILL_FILE);
        if !path.is_file() {
            continue;
        }
        let Some(id) = entry.file_name().to_str().map(str::to_string) else {
            warn!(path = %path.display(), "skipping skill with non-UTF-8 name");
            continue;
        };
        let content = std::fs::read_to_string(&path)
            .map_err(|e| SkillCatalogError::IoError(path.clone(), e))?;
        let (description, body) = parse_skill_file(&content);
        skills.push(Skill::new(id, description, body));
    }

    skills.sort_by(|a, b| a.id.cmp(&b.id));
    debug!(dir = %dir.display(), count = skills.len(), "discovered skills");
    Ok(skills)
}

/// Split a skill file into `(description, body)`.
///
/// Frontmatter is the text between the first two `---` markers. Without it
/// the whole file is the body.
pub fn parse_skill_file(content: &str) -> (String, String) {
    let trimmed = content.trim();
    let Some(after_first) = trimmed.strip_prefix("---") else {
        return (NO_DESCRIPTION.to_string(), content.to_string());
    };
    let Some(end) = after_first.find("---") else {
        return (NO_DESCRIPTION.to_string(), content.to_string());
    };

    let frontmatter = &after_first[..end];
    let body = after_first[end + 3..].trim().to_string();

    let description = frontmatter
        .lines()
        .find_map(|line| line.trim().strip_prefix("description:"))
        .map(|val| val.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| NO_DESCRIPTION.to_string());

    (description, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_skill(root: &Path, id: &str, content: &str) {
        let dir = root.join(id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(SKILL_FILE), content).unwrap();
    }

    #[test]
    fn test_parse_frontmatter() {
        let (description, body) = parse_skill_file(
            "---\nname: weekly\ndescription: \"Plan the week\"\n---\n\n# Weekly\nDo it.\n",
        );
        assert_eq!(description, "Plan the week");
        assert_eq!(body, "# Weekly\nDo it.");
    }

    #[test]
    fn test_parse_without_frontmatter() {
        let (description, body) = parse_skill_file("Just instructions.\n");
        assert_eq!(description, NO_DESCRIPTION);
        assert_eq!(body, "Just instructions.\n");
    }

    #[test]
    fn test_parse_frontmatter_without_description() {
        let (description, body) = parse_skill_file("---\nname: x\n---\nbody");
        assert_eq!(description, NO_DESCRIPTION);
        assert_eq!(body, "body");
    }

    #[test]
    fn test_discover_sorted_by_id() {
        let tmp = tempfile::tempdir().unwrap();
        write_skill(tmp.path(), "weekly-review", "---\ndescription: Review\n---\nreview");
        write_skill(tmp.path(), "daily-note", "---\ndescription: Note\n---\nnote");
        std::fs::create_dir_all(tmp.path().join("not-a-skill")).unwrap();
        std::fs::write(tmp.path().join("README.md"), "ignored").unwrap();

        let skills = discover_skills(tmp.path()).unwrap();
        let ids: Vec<_> = skills.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["daily-note", "weekly-review"]);
        assert_eq!(skills[0].description, "Note");
        assert_eq!(skills[0].prompt_body, "note");
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(discover_skills(&tmp.path().join("nope")).unwrap().is_empty());
    }
}
