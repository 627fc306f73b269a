//! Custom context profiles from a TOML file.
//!
//! ```toml
//! [contexts.maritime.keywords]
//! "sea"        = [0.2, 0.0, 0.3, 0.1]
//! "safe harbor" = [0.3, 0.1, 0.0, 0.0]
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use tetrad_core::{ContextProfile, CoordinateEngine};

use crate::error::{Result, StoreError};

#[derive(Debug, Deserialize)]
struct ProfilesFile {
    #[serde(default)]
    contexts: HashMap<String, ProfileDef>,
}

#[derive(Debug, Deserialize)]
struct ProfileDef {
    #[serde(default)]
    keywords: HashMap<String, [f64; 4]>,
}

/// Parse profiles from TOML content. Profile names come from the table
/// keys under `[contexts.*]`.
pub fn parse_profiles(content: &str) -> Result<Vec<ContextProfile>> {
    let file: ProfilesFile = toml::from_str(content)
        .map_err(|e| StoreError::InvalidData(format!("invalid profile TOML: {e}")))?;

    let mut profiles: Vec<ContextProfile> = file
        .contexts
        .into_iter()
        .map(|(name, def)| ContextProfile {
            name,
            keywords: def.keywords,
        })
        .collect();
    profiles.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(profiles)
}

pub fn load_profiles(path: &Path) -> Result<Vec<ContextProfile>> {
    let content = fs::read_to_string(path)
        .map_err(|e| StoreError::Io(format!("read {}: {e}", path.display())))?;
    parse_profiles(&content)
}

/// Engine with the built-in profiles plus everything defined in `path`.
/// Custom profiles shadow built-ins of the same name.
pub fn engine_with_profiles(path: &Path) -> Result<CoordinateEngine> {
    let mut engine = CoordinateEngine::new();
    for profile in load_profiles(path)? {
        engine.register_profile(profile);
    }
    Ok(engine)
}
