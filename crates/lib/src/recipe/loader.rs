use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{Recipe, RecipeError, RecipeLoader, validate_tool_name};

/// Loads `<dir>/<name>.toml`.
#[derive(Debug, Clone)]
pub struct DirRecipeLoader {
  dir: PathBuf,
}

impl DirRecipeLoader {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }
}

impl RecipeLoader for DirRecipeLoader {
  fn load(&self, name: &str) -> Result<Recipe, RecipeError> {
    validate_tool_name(name)?;
    let path = self.dir.join(format!("{name}.toml"));

    let content = match std::fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        return Err(RecipeError::NotFound {
          name: name.to_string(),
          dir: self.dir.clone(),
        });
      }
      Err(source) => return Err(RecipeError::Read { path, source }),
    };

    debug!(recipe = %name, path = %path.display(), "loading recipe");
    let recipe = Recipe::from_toml_str(name, &content)?;

    if recipe.name() != name {
      return Err(RecipeError::Invalid {
        name: name.to_string(),
        reason: format!("metadata.name is '{}'", recipe.name()),
      });
    }

    Ok(recipe)
  }
}
