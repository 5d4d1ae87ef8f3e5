//! Named run configurations.
//!
//! Profiles live in a TOML file under a `profiles` table:
//!
//! ```toml
//! [profiles.small]
//! out_dir = "${HOME}/blockgen-data/small"
//! delete_dir = true
//!
//! [profiles.small.generator]
//! start_time = "2019-09-30T00:00:00Z"
//! retention = "10h"
//! sample_interval = "15s"
//! flush_interval = "2h"
//!
//! [profiles.small.provider]
//! metric_count = 20
//! target_count = 10
//! values = { min_value = 0.0, max_value = 1000.0, max_change_value = 5.0, change_rand_seed = 42 }
//! ```
//!
//! The built-in `default` profile is present unless a file overrides it or its
//! out dir names an unset variable.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::{Duration, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, generator::GeneratorConfig, provider::ProviderConfig};

pub const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse profiles")]
    Parse(#[from] toml::de::Error),

    #[error("profile '{0}' not found")]
    Unknown(String),

    #[error("profile '{profile}' is invalid")]
    Invalid {
        profile: String,
        #[source]
        source: ConfigError,
    },

    #[error("profile '{profile}' refers to unset environment variable {var}")]
    UnsetVar { profile: String, var: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunProfile {
    #[serde(skip)]
    pub name: String,
    pub out_dir: PathBuf,
    #[serde(default)]
    pub delete_dir: bool,
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}
impl RunProfile {
    pub fn builtin() -> Self {
        Self {
            name: DEFAULT_PROFILE.into(),
            out_dir: PathBuf::from("${HOME}/blockgen-data/default"),
            delete_dir: true,
            generator: GeneratorConfig {
                start_time: UNIX_EPOCH + Duration::from_secs(1_569_801_600),
                retention: Duration::from_secs(10 * 60 * 60),
                sample_interval: Duration::from_secs(15),
                flush_interval: Duration::from_secs(2 * 60 * 60),
            },
            provider: ProviderConfig::default(),
        }
    }

    fn resolve(mut self, name: &str) -> Result<Self, ProfileError> {
        let invalid = |source| ProfileError::Invalid {
            profile: name.to_owned(),
            source,
        };
        self.generator.window().map_err(invalid)?;
        self.provider.validate().map_err(invalid)?;
        let out_dir = expand_env(&self.out_dir.to_string_lossy()).map_err(|var| {
            ProfileError::UnsetVar {
                profile: name.to_owned(),
                var,
            }
        })?;
        self.out_dir = PathBuf::from(out_dir);
        self.name = name.to_owned();
        Ok(self)
    }
}

#[derive(Debug, Deserialize)]
struct ProfilesFile {
    #[serde(default)]
    profiles: BTreeMap<String, RunProfile>,
}

#[derive(Debug, Clone)]
pub struct Profiles {
    profiles: BTreeMap<String, RunProfile>,
    /// Built-ins left out because their out dir names an unset variable,
    /// keyed by profile name.
    unset: BTreeMap<String, String>,
}
impl Profiles {
    pub fn builtin() -> Result<Self, ProfileError> {
        Self::with_builtins([RunProfile::builtin()])
    }

    /// A built-in whose out dir refers to an unset variable is skipped so the
    /// remaining profiles stay usable; `get` reports the variable for it.
    fn with_builtins(
        builtins: impl IntoIterator<Item = RunProfile>,
    ) -> Result<Self, ProfileError> {
        let mut profiles = Self {
            profiles: BTreeMap::new(),
            unset: BTreeMap::new(),
        };
        for profile in builtins {
            let name = profile.name.clone();
            match profile.resolve(&name) {
                Ok(profile) => {
                    profiles.profiles.insert(name, profile);
                }
                Err(ProfileError::UnsetVar { profile, var }) => {
                    tracing::warn!(%profile, %var, "skipping built-in profile");
                    profiles.unset.insert(profile, var);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(profiles)
    }

    /// The built-in profiles plus the ones in `text`; same names replace
    /// built-ins.
    pub fn from_toml_str(text: &str) -> Result<Self, ProfileError> {
        Self::from_toml_with(text, Self::builtin()?)
    }

    fn from_toml_with(text: &str, mut profiles: Self) -> Result<Self, ProfileError> {
        let file: ProfilesFile = toml::from_str(text)?;
        for (name, profile) in file.profiles {
            let profile = profile.resolve(&name)?;
            profiles.unset.remove(&name);
            profiles.profiles.insert(name, profile);
        }
        Ok(profiles)
    }

    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn get(&self, name: &str) -> Result<&RunProfile, ProfileError> {
        if let Some(profile) = self.profiles.get(name) {
            return Ok(profile);
        }
        Err(match self.unset.get(name) {
            Some(var) => ProfileError::UnsetVar {
                profile: name.to_owned(),
                var: var.clone(),
            },
            None => ProfileError::Unknown(name.to_owned()),
        })
    }
    pub fn iter(&self) -> impl Iterator<Item = &RunProfile> {
        self.profiles.values()
    }
}

/// Replaces every `${VAR}` with the variable's value. Returns the name of
/// the first unset variable.
fn expand_env(text: &str) -> Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        let var = &rest[start + 2..start + 2 + len];
        let value = std::env::var(var).map_err(|_| var.to_owned())?;
        out.push_str(&rest[..start]);
        out.push_str(&value);
        rest = &rest[start + 2 + len + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"
        [profiles.small]
        out_dir = "/tmp/blockgen/small"

        [profiles.small.generator]
        start_time = "2019-09-30T00:00:00Z"
        retention = "10m"
        sample_interval = "1s"
        flush_interval = "2m"

        [profiles.small.provider]
        metric_count = 2
        target_count = 3
        mix = "gauges"
        values = { min_value = 10.0, max_value = 100.0, max_change_value = 18.0, change_rand_seed = 156 }
    "#;

    #[test]
    fn builtin_default_is_valid() {
        let profiles = Profiles::builtin().unwrap();
        let default = profiles.get(DEFAULT_PROFILE).unwrap();
        assert_eq!(default.name, DEFAULT_PROFILE);
        assert!(!default.out_dir.to_string_lossy().contains("${"));
        let window = default.generator.window().unwrap();
        assert_eq!(window.tick_count(), 10 * 60 * 4 + 1);
    }

    #[test]
    fn file_profiles_join_builtins() {
        let profiles = Profiles::from_toml_str(SMALL).unwrap();
        let names: Vec<_> = profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["default", "small"]);
        let small = profiles.get("small").unwrap();
        assert!(!small.delete_dir);
        assert_eq!(small.generator.sample_interval, Duration::from_secs(1));
        assert_eq!(small.generator.flush_interval, Duration::from_secs(120));
        assert_eq!(small.provider.metric_count, 2);
        assert_eq!(small.provider.values.change_rand_seed, 156);
        assert_eq!(small.provider.job, "blockgen");
    }

    #[test]
    fn misaligned_profile_named_in_error() {
        let text = SMALL.replace(r#"retention = "10m""#, r#"retention = "11m""#);
        match Profiles::from_toml_str(&text) {
            Err(ProfileError::Invalid { profile, source }) => {
                assert_eq!(profile, "small");
                assert!(matches!(source, ConfigError::NotMultiple { field: "retention", .. }));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_profile() {
        let profiles = Profiles::builtin().unwrap();
        assert!(matches!(profiles.get("zzz"), Err(ProfileError::Unknown(name)) if name == "zzz"));
    }

    #[test]
    fn bad_toml_is_parse_error() {
        assert!(matches!(
            Profiles::from_toml_str("[profiles.x]\nout_dir = 3"),
            Err(ProfileError::Parse(_))
        ));
    }

    fn unresolvable_default() -> RunProfile {
        RunProfile {
            out_dir: PathBuf::from("${BLOCKGEN_TEST_SURELY_UNSET}/default"),
            ..RunProfile::builtin()
        }
    }

    #[test]
    fn builtin_with_unset_var_is_skipped() {
        let profiles = Profiles::with_builtins([unresolvable_default()]).unwrap();
        assert_eq!(profiles.iter().count(), 0);
        match profiles.get(DEFAULT_PROFILE) {
            Err(ProfileError::UnsetVar { profile, var }) => {
                assert_eq!(profile, DEFAULT_PROFILE);
                assert_eq!(var, "BLOCKGEN_TEST_SURELY_UNSET");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(profiles.get("zzz"), Err(ProfileError::Unknown(_))));
    }

    #[test]
    fn file_profiles_load_without_builtins() {
        let builtins = Profiles::with_builtins([unresolvable_default()]).unwrap();
        let profiles = Profiles::from_toml_with(SMALL, builtins).unwrap();
        let names: Vec<_> = profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["small"]);

        let text = SMALL.replace("[profiles.small", "[profiles.default");
        let builtins = Profiles::with_builtins([unresolvable_default()]).unwrap();
        let profiles = Profiles::from_toml_with(&text, builtins).unwrap();
        let default = profiles.get(DEFAULT_PROFILE).unwrap();
        assert_eq!(default.out_dir, PathBuf::from("/tmp/blockgen/small"));
    }

    #[test]
    fn env_expansion() {
        std::env::set_var("BLOCKGEN_TEST_ROOT", "/data");
        assert_eq!(
            expand_env("${BLOCKGEN_TEST_ROOT}/x/${BLOCKGEN_TEST_ROOT}").unwrap(),
            "/data/x//data"
        );
        assert_eq!(expand_env("plain/${unterminated").unwrap(), "plain/${unterminated");
        assert_eq!(
            expand_env("${BLOCKGEN_TEST_SURELY_UNSET}").unwrap_err(),
            "BLOCKGEN_TEST_SURELY_UNSET"
        );
    }
}
