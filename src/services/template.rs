//! Instantiating a new mod folder from the template.

use crate::paths;
use crate::services::bundle::mod_bundle_hash;
use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use std::fs;
use thiserror::Error;
use walkdir::WalkDir;

/// File a template may ship to seed the stub bundle of a new mod.
pub const PLACEHOLDER_BUNDLE_FILE: &str = ".placeholder_bundle";

const NAME_TOKEN: &str = "%%name";
const TITLE_TOKEN: &str = "%%title";
const DESCRIPTION_TOKEN: &str = "%%description";

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template folder {0} doesn't exist")]
    MissingTemplate(Utf8PathBuf),

    #[error("Template folder {dir} doesn't have {image}")]
    MissingPreview { dir: Utf8PathBuf, image: String },

    #[error("Invalid core file pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("Failed to copy template file {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to walk template folder: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Values substituted into template file names and contents.
#[derive(Debug, Clone)]
pub struct TemplateParams {
    pub name: String,
    pub title: String,
    pub description: String,
}

impl TemplateParams {
    /// Replace every placeholder token in `text`.
    pub fn substitute(&self, text: &str) -> String {
        // %%description and %%title don't share a prefix with %%name, so the
        // order only matters for values that contain tokens themselves.
        text.replace(DESCRIPTION_TOKEN, &self.description)
            .replace(TITLE_TOKEN, &self.title)
            .replace(NAME_TOKEN, &self.name)
    }
}

/// Copies a template tree into a new mod folder.
pub struct Templater {
    template_dir: Utf8PathBuf,
    preview_image: String,
    core_patterns: Vec<Pattern>,
}

impl Templater {
    pub fn new(
        template_dir: impl Into<Utf8PathBuf>,
        preview_image: impl Into<String>,
        core_files: &[String],
    ) -> Result<Self, TemplateError> {
        let core_patterns = core_files
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|source| TemplateError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            template_dir: template_dir.into(),
            preview_image: preview_image.into(),
            core_patterns,
        })
    }

    pub fn template_dir(&self) -> &Utf8Path {
        &self.template_dir
    }

    /// Check the template exists and has the preview image uploads need.
    pub fn validate(&self) -> Result<(), TemplateError> {
        if !self.template_dir.is_dir() {
            return Err(TemplateError::MissingTemplate(self.template_dir.clone()));
        }

        if !self.template_dir.join(&self.preview_image).is_file() {
            return Err(TemplateError::MissingPreview {
                dir: self.template_dir.clone(),
                image: self.preview_image.clone(),
            });
        }

        Ok(())
    }

    /// Copy the template into `mod_dir`.
    ///
    /// Core files are copied untouched. Every other file gets the
    /// placeholder tokens replaced in its relative path and its contents.
    /// Existing files in `mod_dir` are overwritten; callers check the folder
    /// doesn't exist yet. Returns the written paths.
    pub fn copy_template(&self, mod_dir: &Utf8Path, params: &TemplateParams) -> Result<Vec<Utf8PathBuf>, TemplateError> {
        let mut written = Vec::new();

        for entry in WalkDir::new(&self.template_dir).follow_links(false) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let source = paths::utf8_lossy(entry.path());
            let Ok(rel) = source.strip_prefix(&self.template_dir) else {
                continue;
            };

            if rel.as_str() == PLACEHOLDER_BUNDLE_FILE {
                continue;
            }

            let rel_str = rel.as_str().replace('\\', "/");
            let target = if self.is_core_file(&rel_str) {
                tracing::debug!("Core file {}", rel_str);
                mod_dir.join(rel)
            } else {
                mod_dir.join(params.substitute(rel.as_str()))
            };

            let io_error = |source| TemplateError::Io {
                path: target.clone(),
                source,
            };

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(io_error)?;
            }

            if self.is_core_file(&rel_str) {
                fs::copy(&source, &target).map_err(io_error)?;
            } else {
                let bytes = fs::read(&source).map_err(|source_err| TemplateError::Io {
                    path: source.clone(),
                    source: source_err,
                })?;

                match String::from_utf8(bytes) {
                    Ok(text) => fs::write(&target, params.substitute(&text)).map_err(io_error)?,
                    // Binary files (images, bundles) are copied as is.
                    Err(err) => fs::write(&target, err.into_bytes()).map_err(io_error)?,
                }
            }

            written.push(target);
        }

        tracing::info!("Copied template {} to {}", self.template_dir, mod_dir);
        Ok(written)
    }

    /// Seed a stub bundle so a new mod can be uploaded before its first build.
    pub fn copy_placeholder_bundle(
        &self,
        mod_name: &str,
        bundle_dir: &Utf8Path,
        extension: &str,
    ) -> Result<Utf8PathBuf, TemplateError> {
        let target = bundle_dir.join(format!("{}{}", mod_bundle_hash(mod_name), extension));
        let io_error = |source| TemplateError::Io {
            path: target.clone(),
            source,
        };

        fs::create_dir_all(bundle_dir).map_err(io_error)?;

        let placeholder = self.template_dir.join(PLACEHOLDER_BUNDLE_FILE);
        if placeholder.is_file() {
            fs::copy(&placeholder, &target).map_err(io_error)?;
        } else {
            fs::write(&target, b"").map_err(io_error)?;
        }

        tracing::debug!("Placeholder bundle {}", target);
        Ok(target)
    }

    fn is_core_file(&self, rel: &str) -> bool {
        self.core_patterns.iter().any(|pattern| pattern.matches(rel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_template() -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let template = root.join(".template-vmf");

        fs::create_dir_all(template.join("scripts/mods/%%name")).unwrap();
        fs::create_dir_all(template.join("core/assets")).unwrap();
        fs::write(template.join("item_preview.jpg"), [0xff, 0xd8, 0xff, 0x00, 0x9f]).unwrap();
        fs::write(
            template.join("scripts/mods/%%name/%%name.lua"),
            "-- %%title\nlocal mod = get_mod(\"%%name\")\n-- %%description\n",
        )
        .unwrap();
        fs::write(template.join("core/assets/%%name.txt"), "%%name stays").unwrap();

        (temp_dir, template)
    }

    fn params() -> TemplateParams {
        TemplateParams {
            name: "test".to_string(),
            title: "Test Title".to_string(),
            description: "Test description".to_string(),
        }
    }

    #[test]
    fn test_validate() {
        let (_temp_dir, template) = create_template();
        let templater = Templater::new(&template, "item_preview.jpg", &["core/**".to_string()]).unwrap();
        assert!(templater.validate().is_ok());

        let missing_preview = Templater::new(&template, "preview.png", &[]).unwrap();
        assert!(matches!(missing_preview.validate(), Err(TemplateError::MissingPreview { .. })));

        let missing = Templater::new(template.join("nope"), "item_preview.jpg", &[]).unwrap();
        assert!(matches!(missing.validate(), Err(TemplateError::MissingTemplate(_))));
    }

    #[test]
    fn test_copy_template_substitutes_names_and_contents() {
        let (_temp_dir, template) = create_template();
        let mod_dir = template.parent().unwrap().join("test");
        let templater = Templater::new(&template, "item_preview.jpg", &["core/**".to_string()]).unwrap();

        templater.copy_template(&mod_dir, &params()).unwrap();

        let script = mod_dir.join("scripts/mods/test/test.lua");
        let text = fs::read_to_string(&script).unwrap();
        assert_eq!(text, "-- Test Title\nlocal mod = get_mod(\"test\")\n-- Test description\n");
        assert!(!text.contains("%%"));

        // Core files keep their names and contents
        let core = fs::read_to_string(mod_dir.join("core/assets/%%name.txt")).unwrap();
        assert_eq!(core, "%%name stays");

        // Binary preview copied byte for byte
        assert_eq!(
            fs::read(mod_dir.join("item_preview.jpg")).unwrap(),
            vec![0xff, 0xd8, 0xff, 0x00, 0x9f]
        );
    }

    #[test]
    fn test_placeholder_bundle() {
        let (_temp_dir, template) = create_template();
        let bundle_dir = template.parent().unwrap().join("test/bundleV2");
        let templater = Templater::new(&template, "item_preview.jpg", &[]).unwrap();

        let stub = templater.copy_placeholder_bundle("Test", &bundle_dir, ".mod_bundle").unwrap();
        assert_eq!(
            stub.file_name().unwrap(),
            format!("{}.mod_bundle", mod_bundle_hash("test"))
        );
        assert!(stub.is_file());

        fs::write(template.join(PLACEHOLDER_BUNDLE_FILE), b"stub").unwrap();
        let stub = templater.copy_placeholder_bundle("Test", &bundle_dir, "").unwrap();
        assert_eq!(fs::read(stub).unwrap(), b"stub");
    }
}
