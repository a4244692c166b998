/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use humanize_rs::bytes::Bytes;
use yaml_rust::{Yaml, yaml};

use super::{BackendChoice, ControllerIpcConfig, NodelistFileConfig, ResolverConfig};

impl ResolverConfig {
    pub fn parse_yaml(v: &Yaml, lookup_dir: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = ResolverConfig::default();
        match v {
            Yaml::Hash(map) => {
                foreach_kv(map, |k, v| config.set_by_yaml_kv(k, v, lookup_dir))?;
                Ok(config)
            }
            Yaml::Null => Ok(config),
            _ => Err(anyhow!("yaml value type for resolver config should be 'map'")),
        }
    }

    pub fn set_by_yaml_kv(
        &mut self,
        k: &str,
        v: &Yaml,
        lookup_dir: Option<&Path>,
    ) -> anyhow::Result<()> {
        match normalize_key(k).as_str() {
            "backend" => {
                let s = as_string(v)?;
                self.backend = BackendChoice::from_str(&s)
                    .map_err(|_| anyhow!("invalid backend choice {s}"))?;
                Ok(())
            }
            "timeout" => {
                self.timeout =
                    as_duration(v).context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            "controller" | "controld" => {
                self.controller = match v {
                    Yaml::Null => None,
                    _ => Some(
                        ControllerIpcConfig::parse_yaml(v, lookup_dir)
                            .context(format!("invalid controller ipc config value for key {k}"))?,
                    ),
                };
                Ok(())
            }
            "config_service" | "corosync" => {
                self.config_service = match v {
                    Yaml::Null => None,
                    _ => Some(
                        NodelistFileConfig::parse_yaml(v, lookup_dir)
                            .context(format!("invalid config service value for key {k}"))?,
                    ),
                };
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        }
    }
}

impl ControllerIpcConfig {
    fn parse_yaml(v: &Yaml, lookup_dir: Option<&Path>) -> anyhow::Result<Self> {
        match v {
            Yaml::String(_) => {
                let path = as_path(v, lookup_dir)?;
                Ok(ControllerIpcConfig::new(path))
            }
            Yaml::Hash(map) => {
                let mut config = ControllerIpcConfig::default();
                foreach_kv(map, |k, v| match normalize_key(k).as_str() {
                    "socket" | "socket_path" | "path" => {
                        config.socket_path = as_path(v, lookup_dir)
                            .context(format!("invalid path value for key {k}"))?;
                        Ok(())
                    }
                    "max_message_size" => {
                        let size =
                            as_usize(v).context(format!("invalid humanize usize value for key {k}"))?;
                        config.set_max_message_size(size);
                        Ok(())
                    }
                    "reference_prefix" => {
                        let prefix = as_string(v)?;
                        if prefix.is_empty() {
                            return Err(anyhow!("empty reference prefix"));
                        }
                        config.reference_prefix = prefix;
                        Ok(())
                    }
                    _ => Err(anyhow!("invalid key {k}")),
                })?;
                Ok(config)
            }
            _ => Err(anyhow!(
                "yaml value type for controller ipc config should be 'string' or 'map'"
            )),
        }
    }
}

impl NodelistFileConfig {
    fn parse_yaml(v: &Yaml, lookup_dir: Option<&Path>) -> anyhow::Result<Self> {
        match v {
            Yaml::String(_) => Ok(NodelistFileConfig {
                path: as_path(v, lookup_dir)?,
            }),
            Yaml::Hash(map) => {
                let mut config = NodelistFileConfig::default();
                foreach_kv(map, |k, v| match normalize_key(k).as_str() {
                    "nodelist" | "path" | "file" => {
                        config.path = as_path(v, lookup_dir)
                            .context(format!("invalid path value for key {k}"))?;
                        Ok(())
                    }
                    _ => Err(anyhow!("invalid key {k}")),
                })?;
                Ok(config)
            }
            _ => Err(anyhow!(
                "yaml value type for config service config should be 'string' or 'map'"
            )),
        }
    }
}

fn normalize_key(raw: &str) -> String {
    raw.to_lowercase().replace('-', "_")
}

fn foreach_kv<F>(table: &yaml::Hash, mut f: F) -> anyhow::Result<()>
where
    F: FnMut(&str, &Yaml) -> anyhow::Result<()>,
{
    for (k, v) in table.iter() {
        if let Yaml::String(key) = k {
            f(key, v).context(format!("failed to parse value of key {key}"))?;
        } else {
            return Err(anyhow!("key in hash should be string"));
        }
    }
    Ok(())
}

fn as_string(v: &Yaml) -> anyhow::Result<String> {
    match v {
        Yaml::String(s) => Ok(s.to_string()),
        Yaml::Integer(i) => Ok(i.to_string()),
        _ => Err(anyhow!(
            "yaml value type for string should be 'string' or 'integer'"
        )),
    }
}

fn as_duration(v: &Yaml) -> anyhow::Result<Duration> {
    match v {
        Yaml::String(value) => match humanize_rs::duration::parse(value) {
            Ok(v) => Ok(v),
            Err(humanize_rs::ParseError::MissingUnit) => {
                let secs = u64::from_str(value).map_err(|_| anyhow!("invalid duration string"))?;
                Ok(Duration::from_secs(secs))
            }
            Err(e) => Err(anyhow!("invalid humanize duration string: {e}")),
        },
        Yaml::Integer(value) => {
            let secs = u64::try_from(*value).map_err(|_| anyhow!("negative duration value"))?;
            Ok(Duration::from_secs(secs))
        }
        Yaml::Real(s) => {
            let f = f64::from_str(s).map_err(|e| anyhow!("invalid f64 value: {e}"))?;
            Duration::try_from_secs_f64(f).map_err(anyhow::Error::new)
        }
        _ => Err(anyhow!(
            "yaml value type for humanize duration should be 'string' or 'integer' or 'real'"
        )),
    }
}

fn as_usize(v: &Yaml) -> anyhow::Result<usize> {
    match v {
        Yaml::String(value) => {
            let v = value.parse::<Bytes>()?;
            Ok(v.size())
        }
        Yaml::Integer(value) => Ok(usize::try_from(*value)?),
        _ => Err(anyhow!(
            "yaml value type for humanize usize should be 'string' or 'integer'"
        )),
    }
}

fn as_path(v: &Yaml, lookup_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let Yaml::String(s) = v else {
        return Err(anyhow!("yaml value type for path should be 'string'"));
    };
    if s.is_empty() {
        return Err(anyhow!("empty path"));
    }
    let path = PathBuf::from(s);
    if path.is_absolute() {
        return Ok(path);
    }
    match lookup_dir {
        Some(dir) => Ok(dir.join(path)),
        None => Err(anyhow!(
            "invalid value: {} is not an absolute path",
            path.display()
        )),
    }
}
