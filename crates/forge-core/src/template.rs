//! Template rendering collaborator.
//!
//! The core treats rendering as a pure function `(template id, vars) ->
//! text`. [`BuiltinTemplates`] ships the default document set; callers may
//! substitute their own renderer (e.g. one backed by a prompt service)
//! without the structure builder noticing.

use crate::error::{ForgeError, Result};
use std::fmt;

// ---------------------------------------------------------------------------
// TemplateId
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateId {
    Prd,
    Architecture,
    Readme,
    Changelog,
    MigrationGuide,
    Epic,
    Story,
}

impl TemplateId {
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateId::Prd => "prd",
            TemplateId::Architecture => "architecture",
            TemplateId::Readme => "readme",
            TemplateId::Changelog => "changelog",
            TemplateId::MigrationGuide => "migration_guide",
            TemplateId::Epic => "epic",
            TemplateId::Story => "story",
        }
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TemplateRenderer
// ---------------------------------------------------------------------------

/// Pure rendering function. `vars` are `(name, value)` pairs substituted
/// for `{{name}}` placeholders.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, id: TemplateId, vars: &[(&str, &str)]) -> Result<String>;
}

// ---------------------------------------------------------------------------
// BuiltinTemplates
// ---------------------------------------------------------------------------

const PRD_TMPL: &str = "\
# PRD: {{feature}}

> Scope: {{scope}} | Scale level: {{scale_level}}

## Summary

{{description}}

## Requirements

_To be filled in by the assigned agent._

## Acceptance criteria

_To be filled in by the assigned agent._
";

const ARCHITECTURE_TMPL: &str = "\
# Architecture: {{feature}}

## Context

{{description}}

## Decisions

_No decisions recorded yet._
";

const README_TMPL: &str = "\
# {{feature}}

{{description}}
";

const CHANGELOG_TMPL: &str = "\
# Changelog: {{feature}}

All notable changes to this feature are recorded here.
";

const MIGRATION_GUIDE_TMPL: &str = "\
# Migration guide: {{feature}}

_No migrations recorded yet._
";

const EPIC_TMPL: &str = "\
# Epic {{epic_number}}: {{title}}

Feature: {{feature}}
Points: {{points}}
Status: <!-- status -->todo<!-- /status -->

## Stories

_Stories are tracked under `stories/`._
";

const STORY_TMPL: &str = "\
# Story {{story_id}}: {{title}}

Feature: {{feature}}
Epic: {{epic_number}}
Points: {{points}}
Status: <!-- status -->todo<!-- /status -->

## Notes

_To be filled in by the assigned agent._
";

/// Default renderer backed by compiled-in templates.
pub struct BuiltinTemplates;

impl BuiltinTemplates {
    fn source(id: TemplateId) -> &'static str {
        match id {
            TemplateId::Prd => PRD_TMPL,
            TemplateId::Architecture => ARCHITECTURE_TMPL,
            TemplateId::Readme => README_TMPL,
            TemplateId::Changelog => CHANGELOG_TMPL,
            TemplateId::MigrationGuide => MIGRATION_GUIDE_TMPL,
            TemplateId::Epic => EPIC_TMPL,
            TemplateId::Story => STORY_TMPL,
        }
    }
}

impl TemplateRenderer for BuiltinTemplates {
    fn render(&self, id: TemplateId, vars: &[(&str, &str)]) -> Result<String> {
        let mut out = Self::source(id).to_string();
        for (name, value) in vars {
            out = out.replace(&format!("{{{{{name}}}}}"), value);
        }
        if let Some(pos) = out.find("{{") {
            let tail: String = out[pos..].chars().take(32).collect();
            return Err(ForgeError::Validation(format!(
                "template '{id}' has unbound placeholder near '{tail}'"
            )));
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prd_renders_all_vars() {
        let text = BuiltinTemplates
            .render(
                TemplateId::Prd,
                &[
                    ("feature", "user-auth"),
                    ("scope", "feature"),
                    ("scale_level", "3"),
                    ("description", "OAuth support"),
                ],
            )
            .unwrap();
        assert!(text.contains("# PRD: user-auth"));
        assert!(text.contains("OAuth support"));
        assert!(text.contains("Scale level: 3"));
    }

    #[test]
    fn unbound_placeholder_is_an_error() {
        let err = BuiltinTemplates
            .render(TemplateId::Prd, &[("feature", "user-auth")])
            .unwrap_err();
        assert!(err.to_string().contains("unbound placeholder"));
    }

    #[test]
    fn story_template_carries_status_markers() {
        let text = BuiltinTemplates
            .render(
                TemplateId::Story,
                &[
                    ("story_id", "1.2"),
                    ("title", "Login form"),
                    ("feature", "user-auth"),
                    ("epic_number", "1"),
                    ("points", "3"),
                ],
            )
            .unwrap();
        assert!(text.contains("<!-- status -->todo<!-- /status -->"));
    }
}
