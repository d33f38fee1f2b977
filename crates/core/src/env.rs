//! Explicit environment maps and `${VAR}` interpolation.
//!
//! Nothing in the engine, gateway or bridge reads the process environment
//! directly; the edge builds an [`EnvMap`] once and passes it down.

use std::collections::HashMap;
use std::path::Path;

use crate::error::TelosError;

pub type EnvMap = HashMap<String, String>;

/// Snapshot of the current process environment.
pub fn process_env() -> EnvMap {
    std::env::vars().collect()
}

/// Merge a `.env` file over the process environment.
///
/// The file is read with `dotenvy`, so `export` prefixes, quoting and
/// trailing comments behave as they do for the process-level `.env`. File
/// values win over inherited ones. A missing file yields the plain process
/// environment.
pub fn load_env_file(path: &Path) -> Result<EnvMap, TelosError> {
    let mut env = process_env();
    if !path.exists() {
        return Ok(env);
    }

    let env_file_error = |source: dotenvy::Error| match source {
        dotenvy::Error::Io(source) => TelosError::ReadFile {
            path: path.to_path_buf(),
            source,
        },
        source => TelosError::EnvFile {
            path: path.to_path_buf(),
            source,
        },
    };
    for item in dotenvy::from_path_iter(path).map_err(env_file_error)? {
        let (key, value) = item.map_err(env_file_error)?;
        env.insert(key, value);
    }
    Ok(env)
}

/// Replace every `${NAME}` placeholder with its value from `env`.
///
/// An unknown name is an error, never an empty substitution.
pub fn interpolate(value: &str, env: &EnvMap) -> Result<String, TelosError> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| TelosError::UnterminatedPlaceholder(value.to_string()))?;
        let name = &after[..end];
        let resolved = env
            .get(name)
            .ok_or_else(|| TelosError::MissingEnvVar(name.to_string()))?;
        out.push_str(resolved);
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}
