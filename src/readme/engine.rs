//! Template engine for the README

use super::context::ReadmeContext;
use super::error::ReadmeError;
use super::filters;
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use std::path::Path;

const BUILTIN_NAME: &str = "README.md";
const BUILTIN_TEMPLATE: &str = include_str!("README.md.jinja");

/// README renderer
///
/// Wraps minijinja with the README filters, strict undefined handling, and
/// no HTML escaping.
pub struct ReadmeEngine {
    env: Environment<'static>,
}

impl ReadmeEngine {
    /// Engine using the built-in template
    pub fn new() -> Result<Self, ReadmeError> {
        Self::with_source(BUILTIN_TEMPLATE.to_string())
    }

    /// Engine using the template at `path`
    pub fn from_file(path: &Path) -> Result<Self, ReadmeError> {
        let source = std::fs::read_to_string(path).map_err(|e| ReadmeError::io(path, e))?;
        Self::with_source(source)
    }

    fn with_source(source: String) -> Result<Self, ReadmeError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        filters::register_filters(&mut env);

        env.add_template_owned(BUILTIN_NAME, source)
            .map_err(ReadmeError::Template)?;
        Ok(Self { env })
    }

    pub fn render(&self, ctx: &ReadmeContext) -> Result<String, ReadmeError> {
        let template = self
            .env
            .get_template(BUILTIN_NAME)
            .map_err(ReadmeError::Template)?;
        template.render(ctx).map_err(ReadmeError::Template)
    }
}
